//! Error taxonomy of a report run.
//!
//! - [`ValidationError`] - the template is malformed; raised while loading,
//!   before any output is produced
//! - [`ResolveError`] - an expression cannot be evaluated
//! - [`GenerateError`] - producing output for a node failed

use thiserror::Error;

use crate::parser::ParseError;
use crate::value::ValueError;

/// Malformed template. Fatal at load time.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("group '{group}' must declare at least one key field or keys=\"*\"")]
    EmptyKeys { group: String },

    #[error("group '{group}': invalid keys attribute '{keys}'")]
    InvalidKeys { group: String, keys: String },

    #[error("group name '{0}' is declared more than once")]
    DuplicateGroup(String),

    #[error("element name '{0}' is declared more than once")]
    DuplicateElement(String),

    #[error("group '{group}' orders by undeclared field '{field}'")]
    UnknownOrderField { group: String, field: String },

    #[error("group '{group}' declares field '{field}' with unknown type '{type_name}'")]
    UnknownFieldType {
        group: String,
        field: String,
        type_name: String,
    },

    #[error("element '{node}': attribute '{attribute}' is not a valid expression: {source}")]
    Expression {
        node: String,
        attribute: &'static str,
        #[source]
        source: ParseError,
    },

    #[error("element '{node}': {message}")]
    Attribute { node: String, message: String },

    #[error("unknown group model '{0}'")]
    UnknownModel(String),

    #[error("invalid template definition: {0}")]
    Definition(String),
}

/// An expression could not be evaluated.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ResolveError {
    #[error("group '{0}' not found")]
    GroupNotFound(String),

    #[error("field '{group}#{field}' not found")]
    FieldNotFound { group: String, field: String },

    #[error("index {index} out of range for group '{group}' ({len} instances)")]
    IndexOutOfRange { group: String, index: i64, len: usize },

    #[error("type error: {0}")]
    TypeError(String),

    #[error("invalid argument for {function}(): {message}")]
    InvalidArgument { function: String, message: String },

    #[error("{function}() takes {expected} argument(s), got {got}")]
    Arity {
        function: String,
        expected: String,
        got: usize,
    },

    #[error("filter of {function}() is not a boolean expression")]
    AmbiguousGroupFilter { function: String },

    #[error("unknown parameter '${0}'")]
    UnknownParameter(String),

    #[error("method {class}.{method} failed: {message}")]
    Method {
        class: String,
        method: String,
        message: String,
    },

    #[error("division by zero")]
    DivisionByZero,

    #[error("expression nesting exceeds {0} levels (cyclic field reference?)")]
    RecursionLimit(usize),

    #[error("element '{node}': {source}")]
    InNode {
        node: String,
        #[source]
        source: Box<ResolveError>,
    },
}

impl ResolveError {
    /// Attach the originating template node. An error already carrying a
    /// node keeps the innermost one.
    pub fn in_node(self, node: &str) -> Self {
        match self {
            e @ ResolveError::InNode { .. } => e,
            e => ResolveError::InNode {
                node: node.to_string(),
                source: Box::new(e),
            },
        }
    }

    /// The error without node context.
    pub fn root_cause(&self) -> &ResolveError {
        match self {
            ResolveError::InNode { source, .. } => source.root_cause(),
            e => e,
        }
    }

    pub fn node(&self) -> Option<&str> {
        match self {
            ResolveError::InNode { node, .. } => Some(node),
            _ => None,
        }
    }

    /// Recursion-limit failures are programming errors and abort the run.
    pub fn is_fatal(&self) -> bool {
        matches!(self.root_cause(), ResolveError::RecursionLimit(_))
    }
}

impl From<ValueError> for ResolveError {
    fn from(e: ValueError) -> Self {
        match e {
            ValueError::DivisionByZero => ResolveError::DivisionByZero,
            e @ ValueError::Incompatible { .. } => ResolveError::TypeError(e.to_string()),
        }
    }
}

/// Producing output for a template node failed.
#[derive(Debug, Error)]
pub enum GenerateError {
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error("element '{node}': backend failure: {message}")]
    Backend { node: String, message: String },

    #[error("subreport '{subreport}': data source '{source_name}' failed: {message}")]
    Data {
        subreport: String,
        source_name: String,
        message: String,
    },

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

impl GenerateError {
    pub fn backend(node: &str, message: impl Into<String>) -> Self {
        GenerateError::Backend {
            node: node.to_string(),
            message: message.into(),
        }
    }
}
