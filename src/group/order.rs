//! Stable ordering of sibling lists.

use std::cmp::Ordering;

use crate::group::model::ModelId;
use crate::group::tree::{GroupId, GroupTree};
use crate::value::Value;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum OrderBy {
    /// Arrival order
    #[default]
    Natural,
    /// The level's key fields
    Key,
    Fields(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupOrder {
    pub by: OrderBy,
    pub descending: bool,
    pub case_sensitive: bool,
}

impl Default for GroupOrder {
    fn default() -> Self {
        GroupOrder {
            by: OrderBy::Natural,
            descending: false,
            case_sensitive: true,
        }
    }
}

impl GroupOrder {
    /// Field names compared, in priority order.
    pub fn sort_fields(&self, tree: &GroupTree, model: ModelId) -> Vec<String> {
        match &self.by {
            OrderBy::Natural => Vec::new(),
            OrderBy::Key => tree.schema().model(model).keys.fields().to_vec(),
            OrderBy::Fields(fields) => fields.clone(),
        }
    }
}

impl GroupTree {
    /// Sort the instances of `model` under `parent` and renumber their
    /// indices 0..n-1.
    ///
    /// `value_of` yields the value of one sort field on one instance; it may
    /// realize lazy fields, hence the mutable tree. Ties keep arrival order,
    /// also when sorting descending.
    pub fn reorder<E, F>(
        &mut self,
        parent: GroupId,
        model: ModelId,
        order: &GroupOrder,
        mut value_of: F,
    ) -> Result<(), E>
    where
        F: FnMut(&mut GroupTree, GroupId, &str) -> Result<Value, E>,
    {
        let fields = order.sort_fields(self, model);
        let members = self.children(parent, model).to_vec();

        let mut keyed = Vec::with_capacity(members.len());
        for id in members {
            let mut values = Vec::with_capacity(fields.len());
            for field in &fields {
                values.push(value_of(self, id, field)?);
            }
            keyed.push((values, self.group(id).arrival, id));
        }

        let natural = fields.is_empty();
        keyed.sort_by(|a, b| {
            let by_values = compare_values(&a.0, &b.0, order.case_sensitive);
            let primary = if natural {
                a.1.cmp(&b.1)
            } else {
                by_values
            };
            let primary = if order.descending {
                primary.reverse()
            } else {
                primary
            };
            primary.then(a.1.cmp(&b.1))
        });

        let ordered = keyed.into_iter().map(|(_, _, id)| id).collect();
        self.set_order(parent, model, ordered);
        Ok(())
    }
}

fn compare_values(a: &[Value], b: &[Value], case_sensitive: bool) -> Ordering {
    a.iter()
        .zip(b)
        .map(|(x, y)| x.sort_compare(y, case_sensitive))
        .find(|o| *o != Ordering::Equal)
        .unwrap_or(Ordering::Equal)
}
