//! Row ingestion.
//!
//! Rows arrive flat, one map of column name to value per row. Each row is
//! pushed down the model tree from a report root: at every level the key
//! tuple decides whether the row merges into an existing instance or starts
//! a new one.

use std::collections::{HashMap, HashSet};

use tracing::trace;

use crate::group::field::FieldType;
use crate::group::model::{KeySpec, ModelId};
use crate::group::tree::{GroupId, GroupTree};
use crate::value::{DistinctKey, Value};

/// One data row: column name to value.
pub type Row = HashMap<String, Value>;

impl GroupTree {
    /// Load rows under the report root `root` (the main root or an attached
    /// subreport root).
    ///
    /// A row joins any earlier instance with the same key tuple, wherever
    /// it sits in the list; levels marked `control_break` only compare
    /// against the instance created last.
    ///
    /// Declared fields are stored on the level that declares them. Columns
    /// no level on the row's path declares are stored on the deepest
    /// instance the row reached and declared on that level.
    pub fn load_rows(&mut self, root: GroupId, rows: &[Row]) {
        if !rows.is_empty() {
            self.group_mut(root).has_data = true;
        }
        for row in rows {
            self.merge_declared(root, row);
            if !self.ingest(root, row) {
                self.merge_undeclared(root, row);
            }
        }
    }

    /// Push one row below `group`. Returns whether any child level took it.
    fn ingest(&mut self, group: GroupId, row: &Row) -> bool {
        let children = self.model_of(group).children.clone();
        let mut taken = false;

        for child_model in children {
            let Some(key) = self.row_key(child_model, row) else {
                continue;
            };
            let child = match key {
                Some(key) => match self.find_by_key(group, child_model, &key) {
                    Some(existing) => existing,
                    None => {
                        let id = self.create_group(group, child_model);
                        self.register_key(group, child_model, key, id);
                        id
                    }
                },
                None => self.create_group(group, child_model),
            };
            trace!(
                group = %self.name_of(child),
                index = self.group(child).index,
                "row merged"
            );
            self.group_mut(child).has_data = true;
            self.merge_declared(child, row);
            if !self.ingest(child, row) {
                self.merge_undeclared(child, row);
            }
            taken = true;
        }
        taken
    }

    /// `None` when the row does not feed `model`. `Some(None)` for levels
    /// where every row is a new instance.
    fn row_key(&self, model: ModelId, row: &Row) -> Option<Option<Vec<DistinctKey>>> {
        let m = self.schema().model(model);
        match &m.keys {
            KeySpec::Fields(keys) => {
                let mut tuple = Vec::with_capacity(keys.len());
                for key in keys {
                    let raw = row.get(key)?;
                    let field_type = m.field(key).map(|d| d.field_type).unwrap_or_default();
                    tuple.push(DistinctKey::from(&field_type.coerce(raw.clone())));
                }
                Some(Some(tuple))
            }
            KeySpec::EveryRow => {
                let declared = m.fields();
                let feeds = declared.iter().all(|d| d.auto.is_some())
                    || declared.iter().any(|d| row.contains_key(&d.name));
                feeds.then_some(None)
            }
        }
    }

    fn merge_declared(&mut self, group: GroupId, row: &Row) {
        let names: Vec<String> = self
            .model_of(group)
            .fields()
            .iter()
            .filter(|d| d.auto.is_none())
            .map(|d| d.name.clone())
            .collect();
        for name in names {
            if let Some(value) = row.get(&name) {
                self.set_value(group, &name, value.clone());
            }
        }
    }

    fn merge_undeclared(&mut self, group: GroupId, row: &Row) {
        let model = self.group(group).model;
        let declared_on_path: HashSet<String> = self
            .schema()
            .path_from_root(model)
            .into_iter()
            .flat_map(|m| self.schema().model(m).fields().iter().map(|d| d.name.clone()))
            .collect();

        let mut extra: Vec<(&String, &Value)> = row
            .iter()
            .filter(|(name, _)| !declared_on_path.contains(*name))
            .collect();
        extra.sort_by(|a, b| a.0.cmp(b.0));

        for (name, value) in extra {
            self.schema_mut().declare_field(model, name, FieldType::Unknown);
            self.set_value(group, name, value.clone());
        }
    }
}
