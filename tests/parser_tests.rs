// tests/parser_tests.rs

use banded_report::ast::{FieldRef, Function, MethodCall, MethodTag, Operator, Symbol};
use banded_report::value::Value;
use banded_report::{Lexer, Parser, parse_expression};
use pretty_assertions::assert_eq;

fn parse(input: &str) -> Symbol {
    parse_expression(input).unwrap_or_else(|e| panic!("failed to parse {:?}: {}", input, e))
}

fn field(group: Option<&str>, name: &str) -> Symbol {
    Symbol::Field(FieldRef::new(group, name))
}

fn binary(op: Operator, left: Symbol, right: Symbol) -> Symbol {
    Symbol::Operation {
        op,
        operands: vec![left, right],
    }
}

fn long(n: i64) -> Symbol {
    Symbol::Literal(Value::Long(n))
}

// ============================================================================
// Literals and Constants
// ============================================================================

#[test]
fn test_literals() {
    assert_eq!(parse("42"), long(42));
    assert_eq!(parse("2.5"), Symbol::Literal(Value::Double(2.5)));
    assert_eq!(parse("'EUR'"), Symbol::Literal(Value::from("EUR")));
    assert_eq!(parse("true"), Symbol::Literal(Value::Boolean(true)));
    assert_eq!(parse("null"), Symbol::Literal(Value::Null));
}

#[test]
fn test_negative_literals_fold() {
    assert_eq!(parse("-7"), long(-7));
    assert_eq!(parse("-1.5"), Symbol::Literal(Value::Double(-1.5)));
    assert_eq!(
        parse("-#amount"),
        Symbol::Operation {
            op: Operator::Negate,
            operands: vec![field(None, "amount")]
        }
    );
}

#[test]
fn test_parameter() {
    assert_eq!(
        parse("$TITLE"),
        Symbol::Constant {
            name: "TITLE".to_string()
        }
    );
}

#[test]
fn test_identifier() {
    assert_eq!(parse("customer"), Symbol::Identifier("customer".to_string()));
}

// ============================================================================
// Field References
// ============================================================================

#[test]
fn test_current_group_field() {
    assert_eq!(parse("#amount"), field(None, "amount"));
}

#[test]
fn test_group_field() {
    assert_eq!(parse("order#amount"), field(Some("order"), "amount"));
}

#[test]
fn test_wildcard_field() {
    assert_eq!(
        parse("line#*"),
        Symbol::Field(FieldRef {
            group: Some("line".to_string()),
            field: None,
            qualifier: None,
        })
    );
}

#[test]
fn test_qualified_field() {
    assert_eq!(
        parse("line#qty[#n + 1]"),
        Symbol::Field(FieldRef {
            group: Some("line".to_string()),
            field: Some("qty".to_string()),
            qualifier: Some(Box::new(binary(Operator::Add, field(None, "n"), long(1)))),
        })
    );
}

#[test]
fn test_field_needs_a_name() {
    let err = parse_expression("order#").unwrap_err();
    assert!(err.message.contains("field name"), "{}", err);
}

// ============================================================================
// Functions and Methods
// ============================================================================

#[test]
fn test_function_call() {
    assert_eq!(
        parse("sum(line#amount)"),
        Symbol::Function {
            func: Function::Sum,
            args: vec![field(Some("line"), "amount")]
        }
    );
}

#[test]
fn test_function_names_are_case_insensitive() {
    assert_eq!(
        parse("SUMALL(#x)"),
        Symbol::Function {
            func: Function::SumAll,
            args: vec![field(None, "x")]
        }
    );
    assert_eq!(
        parse("min(#x)"),
        Symbol::Function {
            func: Function::MinValue,
            args: vec![field(None, "x")]
        }
    );
}

#[test]
fn test_nullary_and_binary_calls() {
    assert_eq!(
        parse("recnum()"),
        Symbol::Function {
            func: Function::RecNum,
            args: vec![]
        }
    );
    assert_eq!(
        parse("current(#cust, 'customer')"),
        Symbol::Function {
            func: Function::Current,
            args: vec![field(None, "cust"), Symbol::Literal(Value::from("customer"))]
        }
    );
}

#[test]
fn test_unknown_function() {
    let err = parse_expression("median(#a)").unwrap_err();
    assert!(err.message.contains("Unknown function 'median'"));
}

#[test]
fn test_method_calls() {
    assert_eq!(
        parse("Totals.vat"),
        Symbol::MethodCall(MethodCall {
            class: "Totals".to_string(),
            method: "vat".to_string(),
            tag: MethodTag::Value,
        })
    );
    assert_eq!(
        parse("bool:Rules.isVip()"),
        Symbol::MethodCall(MethodCall {
            class: "Rules".to_string(),
            method: "isVip".to_string(),
            tag: MethodTag::Boolean,
        })
    );
    assert_eq!(
        parse("text:Fmt.money()"),
        Symbol::MethodCall(MethodCall {
            class: "Fmt".to_string(),
            method: "money".to_string(),
            tag: MethodTag::Text,
        })
    );
}

#[test]
fn test_unknown_method_tag() {
    let err = parse_expression("num:Totals.vat").unwrap_err();
    assert!(err.message.contains("Unknown method tag 'num'"));
}

// ============================================================================
// Operator Precedence
// ============================================================================

#[test]
fn test_multiplication_binds_tighter() {
    assert_eq!(
        parse("1 + 2 * 3"),
        binary(Operator::Add, long(1), binary(Operator::Multiply, long(2), long(3)))
    );
}

#[test]
fn test_left_associative() {
    assert_eq!(
        parse("10 - 4 - 3"),
        binary(Operator::Subtract, binary(Operator::Subtract, long(10), long(4)), long(3))
    );
}

#[test]
fn test_parentheses() {
    assert_eq!(
        parse("(1 + 2) * 3"),
        binary(Operator::Multiply, binary(Operator::Add, long(1), long(2)), long(3))
    );
}

#[test]
fn test_logical_precedence() {
    // a or b and not c  ==  a or (b and (not c))
    assert_eq!(
        parse("#a or #b and not #c"),
        binary(
            Operator::Or,
            field(None, "a"),
            binary(
                Operator::And,
                field(None, "b"),
                Symbol::Operation {
                    op: Operator::Not,
                    operands: vec![field(None, "c")]
                }
            )
        )
    );
}

#[test]
fn test_comparison_below_arithmetic() {
    assert_eq!(
        parse("#a + 1 >= #b"),
        binary(
            Operator::GreaterEqual,
            binary(Operator::Add, field(None, "a"), long(1)),
            field(None, "b")
        )
    );
}

// ============================================================================
// Errors and Display
// ============================================================================

#[test]
fn test_trailing_input() {
    let err = parse_expression("#a #b").unwrap_err();
    assert!(err.message.contains("Expected Eof"));
}

#[test]
fn test_unclosed_call() {
    assert!(parse_expression("sum(#a").is_err());
    assert!(parse_expression("(1 + 2").is_err());
}

#[test]
fn test_lex_errors_surface_as_parse_errors() {
    let err = parse_expression("#a + \"open").unwrap_err();
    assert!(err.message.contains("Unterminated string"));
}

#[test]
fn test_parser_from_lexer() {
    let mut parser = Parser::new(Lexer::new("count(order#*) > 2")).unwrap();
    let symbol = parser.parse().unwrap();
    assert_eq!(symbol.to_string(), "(count(order#*) > 2)");
}

#[test]
fn test_display_is_reparseable() {
    for text in [
        "sum(line#amount[#amount > 100])",
        "prev(#date)",
        "bool:Rules.isVip()",
        "$VAT * 2",
    ] {
        let symbol = parse(text);
        assert_eq!(parse(&symbol.to_string()), symbol, "{}", text);
    }
}
