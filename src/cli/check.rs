//! Syntax validation of expression text

use crate::ast::{Function, Symbol};
use crate::parser::parse_expression;

use super::CliError;

/// A successfully parsed expression
#[derive(Debug)]
pub struct CheckResult {
    pub symbol: Symbol,
    /// Aggregate functions used, in order of appearance
    pub aggregates: Vec<Function>,
}

/// Parse an expression without evaluating it
pub fn execute_check(expression: &str) -> Result<CheckResult, CliError> {
    let symbol = parse_expression(expression)?;
    let mut aggregates = Vec::new();
    collect_aggregates(&symbol, &mut aggregates);
    Ok(CheckResult { symbol, aggregates })
}

fn collect_aggregates(symbol: &Symbol, found: &mut Vec<Function>) {
    match symbol {
        Symbol::Function { func, args } => {
            if func.is_aggregate() {
                found.push(*func);
            }
            for arg in args {
                collect_aggregates(arg, found);
            }
        }
        Symbol::Operation { operands, .. } => {
            for operand in operands {
                collect_aggregates(operand, found);
            }
        }
        Symbol::Field(field_ref) => {
            if let Some(qualifier) = &field_ref.qualifier {
                collect_aggregates(qualifier, found);
            }
        }
        Symbol::Literal(_)
        | Symbol::Identifier(_)
        | Symbol::Constant { .. }
        | Symbol::MethodCall(_) => {}
    }
}
