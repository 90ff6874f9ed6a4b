//! # Expression language - Abstract Syntax Tree
//!
//! Report templates carry small expressions in their attributes: print-when
//! conditions, field values, group filters. This module defines the tree
//! those expressions parse into.
//!
//! ## Architecture Overview
//!
//! - **[tokens]** - Lexical tokens produced by the lexer
//! - **[symbol]** - Expression nodes (field references, functions, operations)
//! - **[operators]** - Unary and binary operators
//!
//! ## Quick Start
//!
//! ```text
//! sum(line#amount[#qty > 0]) / count(line#*)
//! ```
//!
//! sums `amount` over the `line` instances with a positive quantity and
//! divides by the number of lines.
//!
//! ## Field references
//!
//! - `#name` - field of the current group instance
//! - `order#name` - field of the nearest `order` ancestor
//! - `line#name[2]` - field of the third `line` instance
//! - `line#*` - the `line` instances themselves (for `count`)
//!
//! ## Functions
//!
//! Aggregates (`sum`, `count`, `countDistinct`, `minvalue`, `maxvalue` and
//! their `All` variants), navigation (`prev`, `next`, `first`, `last`),
//! page tracking (`current`, `currentStart`, `pagenum`) and `recnum`,
//! `exist`.
pub mod operators;
pub mod symbol;
pub mod tokens;

pub use operators::Operator;
pub use symbol::{FieldRef, Function, MethodCall, MethodTag, Symbol};
pub use tokens::Token;
