//! Runtime group instances.
//!
//! [`GroupTree`] is an arena: every [`Group`] is addressed by a [`GroupId`]
//! and parent, sibling and subreport relations are stored as ids. The tree
//! owns its [`Schema`] and lives for exactly one report run.

use std::collections::HashMap;
use std::slice;

use crate::group::field::{DataField, FieldLookup, FieldSlot};
use crate::group::model::{GroupModel, ModelId, Schema};
use crate::value::{DistinctKey, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupId(pub(crate) u32);

impl GroupId {
    fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone)]
pub struct Group {
    pub id: GroupId,
    pub model: ModelId,
    pub parent: Option<GroupId>,
    /// For a subreport root: the instance the subreport is attached to
    pub host: Option<GroupId>,
    /// 0-based position in the owning list, renumbered after every reorder
    pub index: usize,
    /// Position at creation time, used to break ordering ties
    pub arrival: usize,
    pub has_data: bool,
    fields: HashMap<String, DataField>,
    children: Vec<GroupList>,
    subreports: Vec<GroupId>,
}

impl Group {
    pub fn field(&self, name: &str) -> Option<&DataField> {
        self.fields.get(name)
    }

    /// Roots of the subreport trees attached to this instance.
    pub fn subreports(&self) -> &[GroupId] {
        &self.subreports
    }
}

/// Ordered siblings of one child model under one parent instance.
#[derive(Debug, Clone)]
pub struct GroupList {
    pub model: ModelId,
    members: Vec<GroupId>,
    by_key: HashMap<Vec<DistinctKey>, GroupId>,
    last_created: Option<GroupId>,
}

impl GroupList {
    fn new(model: ModelId) -> Self {
        GroupList {
            model,
            members: Vec::new(),
            by_key: HashMap::new(),
            last_created: None,
        }
    }

    pub fn members(&self) -> &[GroupId] {
        &self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct GroupTree {
    schema: Schema,
    groups: Vec<Group>,
    root: GroupId,
}

impl GroupTree {
    /// An empty tree holding only the main report root instance.
    pub fn new(schema: Schema) -> Self {
        let mut tree = GroupTree {
            schema,
            groups: Vec::new(),
            root: GroupId(0),
        };
        let root_model = tree.schema.root();
        tree.root = tree.alloc(root_model, None, None, 0);
        tree
    }

    fn alloc(
        &mut self,
        model: ModelId,
        parent: Option<GroupId>,
        host: Option<GroupId>,
        index: usize,
    ) -> GroupId {
        let id = GroupId(self.groups.len() as u32);
        let children = self
            .schema
            .model(model)
            .children
            .iter()
            .map(|&c| GroupList::new(c))
            .collect();
        self.groups.push(Group {
            id,
            model,
            parent,
            host,
            index,
            arrival: index,
            has_data: false,
            fields: HashMap::new(),
            children,
            subreports: Vec::new(),
        });
        id
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub(crate) fn schema_mut(&mut self) -> &mut Schema {
        &mut self.schema
    }

    pub fn root(&self) -> GroupId {
        self.root
    }

    pub fn group(&self, id: GroupId) -> &Group {
        &self.groups[id.index()]
    }

    pub(crate) fn group_mut(&mut self, id: GroupId) -> &mut Group {
        &mut self.groups[id.index()]
    }

    pub fn model_of(&self, id: GroupId) -> &GroupModel {
        self.schema.model(self.group(id).model)
    }

    pub fn name_of(&self, id: GroupId) -> &str {
        &self.model_of(id).name
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Append a new instance of `model` to `parent`'s list for that model.
    pub fn create_group(&mut self, parent: GroupId, model: ModelId) -> GroupId {
        let index = self.list(parent, model).map_or(0, GroupList::len);
        let id = self.alloc(model, Some(parent), None, index);
        if let Some(list) = self.list_mut(parent, model) {
            list.members.push(id);
            list.last_created = Some(id);
        }
        id
    }

    /// Create the root instance of a subreport tree and attach it to `host`.
    pub fn attach_subreport(&mut self, host: GroupId, model: ModelId) -> GroupId {
        let id = self.alloc(model, None, Some(host), 0);
        self.group_mut(host).subreports.push(id);
        id
    }

    /// The attached root of subreport `model` on `host`, if loaded.
    pub fn subreport_root(&self, host: GroupId, model: ModelId) -> Option<GroupId> {
        self.group(host)
            .subreports
            .iter()
            .copied()
            .find(|&s| self.group(s).model == model)
    }

    pub(crate) fn list(&self, parent: GroupId, model: ModelId) -> Option<&GroupList> {
        self.group(parent).children.iter().find(|l| l.model == model)
    }

    fn list_mut(&mut self, parent: GroupId, model: ModelId) -> Option<&mut GroupList> {
        self.group_mut(parent)
            .children
            .iter_mut()
            .find(|l| l.model == model)
    }

    /// The instance a row with `key` merges into, if any. Under
    /// control-break keying only the most recently created instance counts.
    pub(crate) fn find_by_key(
        &self,
        parent: GroupId,
        model: ModelId,
        key: &[DistinctKey],
    ) -> Option<GroupId> {
        let list = self.list(parent, model)?;
        let found = list.by_key.get(key).copied()?;
        if self.schema().model(model).control_break && list.last_created != Some(found) {
            return None;
        }
        Some(found)
    }

    pub(crate) fn register_key(
        &mut self,
        parent: GroupId,
        model: ModelId,
        key: Vec<DistinctKey>,
        id: GroupId,
    ) {
        if let Some(list) = self.list_mut(parent, model) {
            list.by_key.insert(key, id);
        }
    }

    /// Instances of `model` under `parent`, in current order.
    pub fn children(&self, parent: GroupId, model: ModelId) -> &[GroupId] {
        self.list(parent, model).map_or(&[], GroupList::members)
    }

    /// Instances of the child level called `name` under `parent`.
    pub fn children_named(&self, parent: GroupId, name: &str) -> &[GroupId] {
        match self.schema.find(name) {
            Some(model) => self.children(parent, model),
            None => &[],
        }
    }

    /// The list `id` belongs to. A root instance is its own single-member
    /// list.
    pub fn siblings(&self, id: GroupId) -> &[GroupId] {
        let group = self.group(id);
        match group.parent {
            Some(parent) => self.children(parent, group.model),
            None => slice::from_ref(&group.id),
        }
    }

    /// Replace the member order of a list and renumber indices.
    pub(crate) fn set_order(&mut self, parent: GroupId, model: ModelId, members: Vec<GroupId>) {
        for (i, &id) in members.iter().enumerate() {
            self.group_mut(id).index = i;
        }
        if let Some(list) = self.list_mut(parent, model) {
            list.members = members;
        }
    }

    /// The enclosing instance one level up, crossing from a subreport root
    /// into its host.
    pub fn outer(&self, id: GroupId) -> Option<GroupId> {
        let group = self.group(id);
        group.parent.or(group.host)
    }

    /// Nearest instance called `name` among `id` and its ancestors,
    /// crossing subreport boundaries outwards.
    pub fn ancestor_or_self(&self, id: GroupId, name: &str) -> Option<GroupId> {
        let mut cursor = Some(id);
        while let Some(g) = cursor {
            if self.name_of(g) == name {
                return Some(g);
            }
            cursor = self.outer(g);
        }
        None
    }

    /// Root instance of the report tree `id` belongs to (main report or
    /// subreport).
    pub fn report_root(&self, id: GroupId) -> GroupId {
        let mut g = id;
        while let Some(parent) = self.group(g).parent {
            g = parent;
        }
        g
    }

    /// Every instance called `name` strictly below `id`, depth first. When
    /// none exists in `id`'s own tree, visible subreports attached at or
    /// below `id` are scanned.
    pub fn descendants(&self, id: GroupId, name: &str) -> Vec<GroupId> {
        let mut found = Vec::new();
        self.collect_local(id, name, &mut found);
        if found.is_empty() {
            self.collect_in_subreports(id, name, &mut found);
        }
        found
    }

    fn collect_local(&self, id: GroupId, name: &str, found: &mut Vec<GroupId>) {
        for list in &self.group(id).children {
            for &child in &list.members {
                if self.name_of(child) == name {
                    found.push(child);
                }
                self.collect_local(child, name, found);
            }
        }
    }

    fn collect_in_subreports(&self, id: GroupId, name: &str, found: &mut Vec<GroupId>) {
        let group = self.group(id);
        for &sub in &group.subreports {
            if !self.model_of(sub).visible {
                continue;
            }
            if self.name_of(sub) == name {
                found.push(sub);
            }
            self.collect_local(sub, name, found);
        }
        for list in &group.children {
            for &child in &list.members {
                self.collect_in_subreports(child, name, found);
            }
        }
    }

    /// First phase of a field read, see [`FieldLookup`].
    pub fn lookup(&self, id: GroupId, field: &str) -> FieldLookup {
        if let Some(data) = self.group(id).fields.get(field) {
            return data.lookup();
        }
        match self.model_of(id).field(field) {
            Some(decl) => match &decl.auto {
                Some(symbol) => FieldLookup::Pending(symbol.clone()),
                None => FieldLookup::Empty,
            },
            None => FieldLookup::Undeclared,
        }
    }

    /// Memoize a computed value on `id`. Also used to write named field
    /// values back into the current group.
    pub fn store_computed(&mut self, id: GroupId, field: &str, value: Value) {
        let field_type = self
            .model_of(id)
            .field(field)
            .map(|d| d.field_type)
            .unwrap_or_default();
        let slot = FieldSlot::Computed(value);
        match self.group_mut(id).fields.get_mut(field) {
            Some(data) => data.slot = slot,
            None => {
                let mut data = DataField::empty(field, field_type);
                data.slot = slot;
                self.group_mut(id).fields.insert(field.to_string(), data);
            }
        }
    }

    /// Store a row value, coerced to the declared type. Only empty slots
    /// are filled: the first row delivering a field wins.
    pub fn set_value(&mut self, id: GroupId, field: &str, value: Value) {
        let field_type = self
            .model_of(id)
            .field(field)
            .map(|d| d.field_type)
            .unwrap_or_default();
        let value = field_type.coerce(value);
        let group = self.group_mut(id);
        match group.fields.get_mut(field) {
            Some(data) if data.slot == FieldSlot::Empty => data.slot = FieldSlot::Value(value),
            Some(_) => {}
            None => {
                let mut data = DataField::empty(field, field_type);
                data.slot = FieldSlot::Value(value);
                group.fields.insert(field.to_string(), data);
            }
        }
    }

    /// Key tuple re-derived from an instance's stored key fields.
    pub fn key_tuple(&self, id: GroupId) -> Vec<DistinctKey> {
        self.model_of(id)
            .keys
            .fields()
            .iter()
            .map(|k| match self.lookup(id, k) {
                FieldLookup::Ready(v) => DistinctKey::from(&v),
                _ => DistinctKey::Null,
            })
            .collect()
    }
}
