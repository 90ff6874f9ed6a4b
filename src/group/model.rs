//! Group schema: one [`GroupModel`] per nesting level.
//!
//! Models live in a [`Schema`] arena and reference each other by
//! [`ModelId`]. A schema holds the main report tree plus one tree per
//! subreport; a subreport root records the model that declared it in
//! `host`.

use std::collections::HashMap;
use std::rc::Rc;

use crate::ast::Symbol;
use crate::error::ValidationError;
use crate::group::field::FieldType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModelId(pub(crate) u32);

impl ModelId {
    fn index(self) -> usize {
        self.0 as usize
    }
}

/// How consecutive rows are split into instances.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeySpec {
    /// Rows with equal key tuples share one instance
    Fields(Vec<String>),
    /// Every row starts a new instance (`keys="*"`)
    EveryRow,
}

impl KeySpec {
    /// Parse the template `keys` attribute: `"*"` or a comma separated list.
    pub fn parse(group: &str, keys: &str) -> Result<Self, ValidationError> {
        let trimmed = keys.trim();
        if trimmed == "*" {
            return Ok(KeySpec::EveryRow);
        }
        let fields: Vec<String> = trimmed
            .split(',')
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(str::to_string)
            .collect();
        if fields.is_empty() {
            return Err(ValidationError::EmptyKeys {
                group: group.to_string(),
            });
        }
        if fields.iter().any(|f| f == "*" || f.contains(char::is_whitespace)) {
            return Err(ValidationError::InvalidKeys {
                group: group.to_string(),
                keys: keys.to_string(),
            });
        }
        Ok(KeySpec::Fields(fields))
    }

    pub fn fields(&self) -> &[String] {
        match self {
            KeySpec::Fields(f) => f,
            KeySpec::EveryRow => &[],
        }
    }
}

#[derive(Debug, Clone)]
pub struct FieldDecl {
    pub name: String,
    pub field_type: FieldType,
    /// Expression of a lazily computed field
    pub auto: Option<Rc<Symbol>>,
}

#[derive(Debug, Clone)]
pub struct GroupModel {
    pub name: String,
    fields: Vec<FieldDecl>,
    field_index: HashMap<String, usize>,
    pub keys: KeySpec,
    /// A row only merges into the most recently created instance, so a key
    /// that comes back after a different one starts a new instance
    pub control_break: bool,
    pub parent: Option<ModelId>,
    pub children: Vec<ModelId>,
    /// Roots of subreport trees declared at this level
    pub subreports: Vec<ModelId>,
    /// For a subreport root: the model that declares it
    pub host: Option<ModelId>,
    pub root: bool,
    /// Whether descendant scans from outside may enter this subreport
    pub visible: bool,
}

impl GroupModel {
    fn new(name: &str, keys: KeySpec, parent: Option<ModelId>, root: bool) -> Self {
        GroupModel {
            name: name.to_string(),
            fields: Vec::new(),
            field_index: HashMap::new(),
            keys,
            control_break: false,
            parent,
            children: Vec::new(),
            subreports: Vec::new(),
            host: None,
            root,
            visible: true,
        }
    }

    /// Declared fields in declaration order.
    pub fn fields(&self) -> &[FieldDecl] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldDecl> {
        self.field_index.get(name).map(|&i| &self.fields[i])
    }

    pub fn declares(&self, name: &str) -> bool {
        self.field_index.contains_key(name)
    }

    fn declare(&mut self, decl: FieldDecl) {
        match self.field_index.get(&decl.name) {
            Some(&i) => {
                let existing = &mut self.fields[i];
                if existing.field_type == FieldType::Unknown {
                    existing.field_type = decl.field_type;
                }
                if decl.auto.is_some() {
                    existing.auto = decl.auto;
                }
            }
            None => {
                self.field_index.insert(decl.name.clone(), self.fields.len());
                self.fields.push(decl);
            }
        }
    }
}

/// Arena of group models.
#[derive(Debug, Clone)]
pub struct Schema {
    models: Vec<GroupModel>,
    by_name: HashMap<String, ModelId>,
}

impl Schema {
    /// A schema with a single root model.
    pub fn new(root_name: &str) -> Self {
        let mut by_name = HashMap::new();
        by_name.insert(root_name.to_string(), ModelId(0));
        Schema {
            models: vec![GroupModel::new(root_name, KeySpec::EveryRow, None, true)],
            by_name,
        }
    }

    pub fn root(&self) -> ModelId {
        ModelId(0)
    }

    pub fn model(&self, id: ModelId) -> &GroupModel {
        &self.models[id.index()]
    }

    pub fn models(&self) -> impl Iterator<Item = (ModelId, &GroupModel)> {
        self.models
            .iter()
            .enumerate()
            .map(|(i, m)| (ModelId(i as u32), m))
    }

    pub fn find(&self, name: &str) -> Option<ModelId> {
        self.by_name.get(name).copied()
    }

    fn register(&mut self, model: GroupModel) -> Result<ModelId, ValidationError> {
        if self.by_name.contains_key(&model.name) {
            return Err(ValidationError::DuplicateGroup(model.name));
        }
        let id = ModelId(self.models.len() as u32);
        self.by_name.insert(model.name.clone(), id);
        self.models.push(model);
        Ok(id)
    }

    /// Declare a nested group level. Key fields become declared fields.
    pub fn add_group(
        &mut self,
        parent: ModelId,
        name: &str,
        keys: KeySpec,
    ) -> Result<ModelId, ValidationError> {
        if let KeySpec::Fields(f) = &keys
            && f.is_empty()
        {
            return Err(ValidationError::EmptyKeys {
                group: name.to_string(),
            });
        }
        let key_fields = keys.fields().to_vec();
        let id = self.register(GroupModel::new(name, keys, Some(parent), false))?;
        self.models[parent.index()].children.push(id);
        for key in key_fields {
            self.declare_field(id, &key, FieldType::Unknown);
        }
        Ok(id)
    }

    pub fn set_control_break(&mut self, model: ModelId, on: bool) {
        self.models[model.index()].control_break = on;
    }

    /// Declare a subreport root under `host`.
    pub fn add_subreport(
        &mut self,
        host: ModelId,
        name: &str,
        visible: bool,
    ) -> Result<ModelId, ValidationError> {
        let mut model = GroupModel::new(name, KeySpec::EveryRow, None, true);
        model.host = Some(host);
        model.visible = visible;
        let id = self.register(model)?;
        self.models[host.index()].subreports.push(id);
        Ok(id)
    }

    pub fn declare_field(&mut self, model: ModelId, name: &str, field_type: FieldType) {
        self.models[model.index()].declare(FieldDecl {
            name: name.to_string(),
            field_type,
            auto: None,
        });
    }

    pub fn declare_auto_field(&mut self, model: ModelId, name: &str, symbol: Rc<Symbol>) {
        self.models[model.index()].declare(FieldDecl {
            name: name.to_string(),
            field_type: FieldType::Unknown,
            auto: Some(symbol),
        });
    }

    /// True if `name` is a strict descendant level of `model` within the
    /// same report tree.
    pub fn has_descendant(&self, model: ModelId, name: &str) -> bool {
        self.model(model)
            .children
            .iter()
            .any(|&c| self.model(c).name == name || self.has_descendant(c, name))
    }

    /// True if `name` is `model` itself or one of its ancestors (no
    /// subreport crossing).
    pub fn has_ancestor_or_self(&self, model: ModelId, name: &str) -> bool {
        let mut cursor = Some(model);
        while let Some(id) = cursor {
            let m = self.model(id);
            if m.name == name {
                return true;
            }
            cursor = m.parent;
        }
        false
    }

    /// Subreport declared on `model` whose tree contains the level `name`.
    pub fn subreport_containing(&self, model: ModelId, name: &str) -> Option<ModelId> {
        self.model(model).subreports.iter().copied().find(|&sub| {
            self.model(sub).name == name || self.has_descendant(sub, name)
        })
    }

    /// Root of the report tree `model` belongs to.
    pub fn report_root(&self, model: ModelId) -> ModelId {
        let mut id = model;
        while let Some(parent) = self.model(id).parent {
            id = parent;
        }
        id
    }

    /// Model path from the report root down to `model`, inclusive.
    pub fn path_from_root(&self, model: ModelId) -> Vec<ModelId> {
        let mut path = vec![model];
        let mut id = model;
        while let Some(parent) = self.model(id).parent {
            path.push(parent);
            id = parent;
        }
        path.reverse();
        path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn orders() -> (Schema, ModelId, ModelId) {
        let mut schema = Schema::new("report");
        let customer = schema
            .add_group(schema.root(), "customer", KeySpec::parse("customer", "cust_id").unwrap())
            .unwrap();
        let order = schema
            .add_group(customer, "order", KeySpec::parse("order", "order_id").unwrap())
            .unwrap();
        (schema, customer, order)
    }

    #[test]
    fn key_fields_are_declared() {
        let (schema, customer, _) = orders();
        assert!(schema.model(customer).declares("cust_id"));
    }

    #[test]
    fn empty_keys_are_rejected() {
        assert_eq!(
            KeySpec::parse("order", " , "),
            Err(ValidationError::EmptyKeys { group: "order".into() })
        );
        assert_eq!(KeySpec::parse("line", "*"), Ok(KeySpec::EveryRow));
        assert!(matches!(
            KeySpec::parse("line", "a,*"),
            Err(ValidationError::InvalidKeys { .. })
        ));
    }

    #[test]
    fn duplicate_group_names_are_rejected() {
        let (mut schema, customer, _) = orders();
        let err = schema
            .add_group(customer, "order", KeySpec::EveryRow)
            .unwrap_err();
        assert_eq!(err, ValidationError::DuplicateGroup("order".into()));
    }

    #[test]
    fn descendant_and_subreport_queries() {
        let (mut schema, customer, order) = orders();
        let notes = schema.add_subreport(customer, "notes", true).unwrap();
        schema.add_group(notes, "note", KeySpec::EveryRow).unwrap();

        assert!(schema.has_descendant(schema.root(), "order"));
        assert!(!schema.has_descendant(order, "customer"));
        assert!(!schema.has_descendant(customer, "note"));
        assert_eq!(schema.subreport_containing(customer, "note"), Some(notes));
        assert_eq!(schema.report_root(order), schema.root());
        assert!(schema.has_ancestor_or_self(order, "customer"));
        assert_eq!(schema.path_from_root(order), vec![schema.root(), customer, order]);
    }
}
