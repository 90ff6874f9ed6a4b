pub mod aggregate;
pub mod ast;
pub mod cli;
pub mod config;
pub mod error;
pub mod evaluator;
pub mod group;
pub mod lexer;
pub mod output;
pub mod parser;
pub mod resolve;
pub mod template;
pub mod traverse;
pub mod value;

pub use aggregate::Accumulator;
pub use ast::{FieldRef, Function, MethodCall, MethodTag, Operator, Symbol, Token};
pub use config::{ConfigError, EngineConfig, MAX_EVAL_DEPTH};
pub use error::{GenerateError, ResolveError, ValidationError};
pub use evaluator::{Environment, Evaluator};
pub use group::{
    FieldLookup, FieldType, Group, GroupId, GroupList, GroupModel, GroupOrder, GroupTree, KeySpec,
    ModelId, OrderBy, Row, Schema,
};
pub use lexer::{LexError, Lexer, Position};
pub use output::{OutputBackend, TextBackend, TextLine};
pub use parser::{ParseError, Parser, parse_expression};
pub use resolve::{
    DataError, DataProvider, JsonDataProvider, MethodResolver, NoData, NoMethods, NoParameters,
    PageTrace, ParameterResolver, TraceTracker,
};
pub use template::{Element, ElementId, ElementKind, Template, TemplateDef};
pub use traverse::{GenerationStatus, Page, ReportRun, Scope};
pub use value::Value;
