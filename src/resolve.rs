//! Collaborators supplied by the caller of a report run: report parameters,
//! user methods, the current-value tracker and subreport data.

use std::collections::HashMap;

use thiserror::Error;

use crate::ast::MethodCall;
use crate::error::ResolveError;
use crate::group::{GroupId, GroupTree, Row};
use crate::value::Value;

/// Resolves `$NAME` constants.
pub trait ParameterResolver {
    fn resolve(&self, name: &str) -> Option<Value>;
}

impl ParameterResolver for HashMap<String, Value> {
    fn resolve(&self, name: &str) -> Option<Value> {
        self.get(name).cloned()
    }
}

/// Parameter resolver for runs without parameters.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoParameters;

impl ParameterResolver for NoParameters {
    fn resolve(&self, _name: &str) -> Option<Value> {
        None
    }
}

/// Runs `Class.method` calls against the current group.
pub trait MethodResolver {
    fn invoke(
        &self,
        call: &MethodCall,
        tree: &GroupTree,
        group: GroupId,
        node: &str,
    ) -> Result<Value, ResolveError>;
}

/// Method resolver for runs without user methods: every call fails.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoMethods;

impl MethodResolver for NoMethods {
    fn invoke(
        &self,
        call: &MethodCall,
        _tree: &GroupTree,
        _group: GroupId,
        _node: &str,
    ) -> Result<Value, ResolveError> {
        Err(ResolveError::Method {
            class: call.class.clone(),
            method: call.method.clone(),
            message: "no method resolver configured".into(),
        })
    }
}

/// Values actually emitted on the current page, by trace tag. Backs
/// `current()` and `currentStart()`.
pub trait TraceTracker {
    /// Last value emitted on this page for `tag`.
    fn current_value(&self, tag: &str) -> Option<String>;
    /// First value emitted on this page for `tag`.
    fn current_start_value(&self, tag: &str) -> Option<String>;
    fn record(&mut self, tag: &str, text: &str);
    fn reset_page(&mut self);
}

#[derive(Debug, Default, Clone)]
pub struct PageTrace {
    first: HashMap<String, String>,
    last: HashMap<String, String>,
}

impl TraceTracker for PageTrace {
    fn current_value(&self, tag: &str) -> Option<String> {
        self.last.get(tag).cloned()
    }

    fn current_start_value(&self, tag: &str) -> Option<String> {
        self.first.get(tag).cloned()
    }

    fn record(&mut self, tag: &str, text: &str) {
        self.first
            .entry(tag.to_string())
            .or_insert_with(|| text.to_string());
        self.last.insert(tag.to_string(), text.to_string());
    }

    fn reset_page(&mut self) {
        self.first.clear();
        self.last.clear();
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
#[error("{0}")]
pub struct DataError(pub String);

/// Supplies the rows of a subreport when it is first traversed.
///
/// `params` holds the subreport's link values evaluated in the host group.
pub trait DataProvider {
    fn fetch(&self, source: &str, params: &Row) -> Result<Vec<Row>, DataError>;
}

/// Data provider for templates without subreports.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoData;

impl DataProvider for NoData {
    fn fetch(&self, source: &str, _params: &Row) -> Result<Vec<Row>, DataError> {
        Err(DataError(format!("no data provider configured for source '{}'", source)))
    }
}

/// In-memory data provider: source name to rows. Rows are filtered on the
/// link parameters, each parameter naming a column that must be equal.
#[derive(Debug, Default, Clone)]
pub struct JsonDataProvider {
    sources: HashMap<String, Vec<Row>>,
}

impl JsonDataProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, source: &str, rows: Vec<Row>) {
        self.sources.insert(source.to_string(), rows);
    }

    /// Build from a JSON object mapping source names to arrays of row
    /// objects.
    pub fn from_json(json: &serde_json::Value) -> Result<Self, DataError> {
        let serde_json::Value::Object(map) = json else {
            return Err(DataError("subreport data must be an object of row arrays".into()));
        };
        let mut provider = JsonDataProvider::new();
        for (source, rows) in map {
            provider.insert(source, rows_from_json(rows)?);
        }
        Ok(provider)
    }
}

impl DataProvider for JsonDataProvider {
    fn fetch(&self, source: &str, params: &Row) -> Result<Vec<Row>, DataError> {
        let rows = self
            .sources
            .get(source)
            .ok_or_else(|| DataError(format!("unknown data source '{}'", source)))?;
        Ok(rows
            .iter()
            .filter(|row| {
                params
                    .iter()
                    .all(|(column, want)| row.get(column).is_some_and(|v| v.loose_eq(want)))
            })
            .cloned()
            .collect())
    }
}

/// Convert a JSON array of objects into rows.
pub fn rows_from_json(json: &serde_json::Value) -> Result<Vec<Row>, DataError> {
    let serde_json::Value::Array(items) = json else {
        return Err(DataError("rows must be a JSON array".into()));
    };
    items
        .iter()
        .enumerate()
        .map(|(i, item)| match item {
            serde_json::Value::Object(obj) => Ok(obj
                .iter()
                .map(|(k, v)| (k.clone(), value_from_json(v)))
                .collect()),
            _ => Err(DataError(format!("row {} is not a JSON object", i))),
        })
        .collect()
}

/// Scalar view of a JSON value. Nested arrays and objects are kept as
/// their JSON text.
pub fn value_from_json(json: &serde_json::Value) -> Value {
    match json {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Boolean(*b),
        serde_json::Value::Number(n) => match n.as_i64() {
            Some(i) => Value::Long(i),
            None => n.as_f64().map_or(Value::Null, Value::Double),
        },
        serde_json::Value::String(s) => Value::String(s.clone()),
        other => Value::String(other.to_string()),
    }
}
