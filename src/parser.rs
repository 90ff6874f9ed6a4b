use std::mem;

use thiserror::Error;

use crate::{
    ast::{FieldRef, Function, MethodCall, MethodTag, Operator, Symbol, Token},
    lexer::{LexError, Lexer, Position},
    value::Value,
};

#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message} at position {position}")]
pub struct ParseError {
    pub message: String,
    pub position: Position,
}

impl From<LexError> for ParseError {
    fn from(e: LexError) -> Self {
        ParseError {
            message: e.message,
            position: e.position,
        }
    }
}

/// Recursive-descent parser for template expressions.
///
/// # Examples
///
/// ```
/// use banded_report::{Lexer, Parser, Symbol};
///
/// let mut parser = Parser::new(Lexer::new("sum(line#amount) > 100")).unwrap();
/// let symbol = parser.parse().unwrap();
/// assert!(matches!(symbol, Symbol::Operation { .. }));
/// ```
pub struct Parser {
    lexer: Lexer,
    current_token: Token,
    peeked: Option<Token>,
}

impl Parser {
    pub fn new(mut lexer: Lexer) -> Result<Self, ParseError> {
        let current_token = lexer.next_token()?;
        Ok(Parser {
            lexer,
            current_token,
            peeked: None,
        })
    }

    fn error(&self, message: impl Into<String>) -> ParseError {
        ParseError {
            message: message.into(),
            position: self.lexer.position(),
        }
    }

    fn advance(&mut self) -> Result<(), ParseError> {
        self.current_token = match self.peeked.take() {
            Some(token) => token,
            None => self.lexer.next_token()?,
        };
        Ok(())
    }

    fn peek(&mut self) -> Result<&Token, ParseError> {
        if self.peeked.is_none() {
            self.peeked = Some(self.lexer.next_token()?);
        }
        Ok(self.peeked.as_ref().unwrap_or(&Token::Eof))
    }

    fn expect(&mut self, expected: Token) -> Result<(), ParseError> {
        if !self.check(&expected) {
            return Err(self.error(format!(
                "Expected {:?}, got {:?}",
                expected, self.current_token
            )));
        }
        self.advance()
    }

    fn check(&self, token: &Token) -> bool {
        mem::discriminant(&self.current_token) == mem::discriminant(token)
    }

    fn expect_identifier(&mut self, what: &str) -> Result<String, ParseError> {
        match mem::replace(&mut self.current_token, Token::Eof) {
            Token::Identifier(name) => {
                self.advance()?;
                Ok(name)
            }
            token => {
                self.current_token = token;
                Err(self.error(format!(
                    "Expected {}, got {:?}",
                    what, self.current_token
                )))
            }
        }
    }

    /// Parse primary expressions: literals, parameters, field references,
    /// function and method calls, parenthesized expressions.
    fn parse_primary(&mut self) -> Result<Symbol, ParseError> {
        match mem::replace(&mut self.current_token, Token::Eof) {
            // Literals
            Token::Integer(n) => {
                self.advance()?;
                Ok(Symbol::Literal(Value::Long(n)))
            }
            Token::Float(n) => {
                self.advance()?;
                Ok(Symbol::Literal(Value::Double(n)))
            }
            Token::String(s) => {
                self.advance()?;
                Ok(Symbol::Literal(Value::String(s)))
            }
            Token::Boolean(b) => {
                self.advance()?;
                Ok(Symbol::Literal(Value::Boolean(b)))
            }
            Token::Null => {
                self.advance()?;
                Ok(Symbol::Literal(Value::Null))
            }

            // References
            Token::Parameter(name) => {
                self.advance()?;
                Ok(Symbol::Constant { name })
            }
            Token::Hash => {
                self.advance()?;
                self.parse_field_tail(None)
            }
            Token::Identifier(name) => {
                // Disambiguate 'group#field', 'fn(...)', 'tag:Class.method', 'Class.method'
                let next = self.peek()?.clone();
                match next {
                    Token::Hash => {
                        self.advance()?; // name
                        self.advance()?; // '#'
                        self.parse_field_tail(Some(name))
                    }
                    Token::LParen => {
                        self.advance()?;
                        self.parse_function_call(name)
                    }
                    Token::Colon => {
                        let tag = match name.as_str() {
                            "bool" | "boolean" => MethodTag::Boolean,
                            "value" => MethodTag::Value,
                            "text" => MethodTag::Text,
                            other => {
                                return Err(self.error(format!(
                                    "Unknown method tag '{}' (expected bool, value or text)",
                                    other
                                )));
                            }
                        };
                        self.advance()?; // tag
                        self.advance()?; // ':'
                        let class = self.expect_identifier("class name after method tag")?;
                        self.parse_method_tail(class, tag)
                    }
                    Token::Dot => {
                        self.advance()?;
                        self.parse_method_tail(name, MethodTag::Value)
                    }
                    _ => {
                        self.advance()?;
                        Ok(Symbol::Identifier(name))
                    }
                }
            }

            Token::LParen => {
                self.advance()?;
                let expr = self.parse_expression()?;
                self.expect(Token::RParen)?;
                Ok(expr)
            }

            token => {
                self.current_token = token;
                Err(self.error(format!(
                    "Unexpected token in expression: {:?}",
                    self.current_token
                )))
            }
        }
    }

    /// After `#` (or `group#`): field name or `*`, then an optional `[qualifier]`.
    fn parse_field_tail(&mut self, group: Option<String>) -> Result<Symbol, ParseError> {
        let field = if self.check(&Token::Star) {
            self.advance()?;
            None
        } else {
            Some(self.expect_identifier("field name after '#'")?)
        };

        let qualifier = if self.check(&Token::LBracket) {
            self.advance()?;
            let q = self.parse_expression()?;
            self.expect(Token::RBracket)?;
            Some(Box::new(q))
        } else {
            None
        };

        Ok(Symbol::Field(FieldRef {
            group,
            field,
            qualifier,
        }))
    }

    fn parse_function_call(&mut self, name: String) -> Result<Symbol, ParseError> {
        let func = Function::from_name(&name)
            .ok_or_else(|| self.error(format!("Unknown function '{}'", name)))?;
        self.expect(Token::LParen)?;

        let mut args = vec![];
        while !self.check(&Token::RParen) {
            args.push(self.parse_expression()?);

            if !self.check(&Token::RParen) {
                self.expect(Token::Comma)?;
            }
        }
        self.expect(Token::RParen)?;

        Ok(Symbol::Function { func, args })
    }

    /// After the class name: `.method` with optional empty parentheses.
    fn parse_method_tail(&mut self, class: String, tag: MethodTag) -> Result<Symbol, ParseError> {
        self.expect(Token::Dot)?;
        let method = self.expect_identifier("method name after '.'")?;
        if self.check(&Token::LParen) {
            self.advance()?;
            self.expect(Token::RParen)?;
        }
        Ok(Symbol::MethodCall(MethodCall { class, method, tag }))
    }

    fn parse_unary(&mut self) -> Result<Symbol, ParseError> {
        if self.check(&Token::Minus) {
            self.advance()?;
            let operand = self.parse_unary()?;
            return Ok(match operand {
                Symbol::Literal(Value::Long(n)) => Symbol::Literal(Value::Long(-n)),
                Symbol::Literal(Value::Double(n)) => Symbol::Literal(Value::Double(-n)),
                operand => Symbol::Operation {
                    op: Operator::Negate,
                    operands: vec![operand],
                },
            });
        }
        self.parse_primary()
    }

    fn parse_binary_level(
        &mut self,
        next: fn(&mut Self) -> Result<Symbol, ParseError>,
        op_for: fn(&Token) -> Option<Operator>,
    ) -> Result<Symbol, ParseError> {
        let mut left = next(self)?;

        while let Some(op) = op_for(&self.current_token) {
            self.advance()?;
            let right = next(self)?;
            left = Symbol::Operation {
                op,
                operands: vec![left, right],
            };
        }
        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> Result<Symbol, ParseError> {
        self.parse_binary_level(Self::parse_unary, |t| match t {
            Token::Star => Some(Operator::Multiply),
            Token::Slash => Some(Operator::Divide),
            Token::Percent => Some(Operator::Modulo),
            _ => None,
        })
    }

    fn parse_additive(&mut self) -> Result<Symbol, ParseError> {
        self.parse_binary_level(Self::parse_multiplicative, |t| match t {
            Token::Plus => Some(Operator::Add),
            Token::Minus => Some(Operator::Subtract),
            _ => None,
        })
    }

    fn parse_comparison(&mut self) -> Result<Symbol, ParseError> {
        let left = self.parse_additive()?;

        let op = match &self.current_token {
            Token::EqEq => Operator::Equal,
            Token::NotEq => Operator::NotEqual,
            Token::Lt => Operator::LessThan,
            Token::Gt => Operator::GreaterThan,
            Token::LtEq => Operator::LessEqual,
            Token::GtEq => Operator::GreaterEqual,
            _ => return Ok(left),
        };
        self.advance()?;
        let right = self.parse_additive()?;

        Ok(Symbol::Operation {
            op,
            operands: vec![left, right],
        })
    }

    fn parse_not(&mut self) -> Result<Symbol, ParseError> {
        if self.check(&Token::Not) {
            self.advance()?;
            let operand = self.parse_not()?;
            return Ok(Symbol::Operation {
                op: Operator::Not,
                operands: vec![operand],
            });
        }
        self.parse_comparison()
    }

    fn parse_and(&mut self) -> Result<Symbol, ParseError> {
        self.parse_binary_level(Self::parse_not, |t| match t {
            Token::And => Some(Operator::And),
            _ => None,
        })
    }

    fn parse_or(&mut self) -> Result<Symbol, ParseError> {
        self.parse_binary_level(Self::parse_and, |t| match t {
            Token::Or => Some(Operator::Or),
            _ => None,
        })
    }

    pub fn parse_expression(&mut self) -> Result<Symbol, ParseError> {
        self.parse_or()
    }

    /// Parse a complete expression; trailing input is an error.
    pub fn parse(&mut self) -> Result<Symbol, ParseError> {
        let expr = self.parse_expression()?;
        self.expect(Token::Eof)?;
        Ok(expr)
    }
}

/// Parse an expression string in one call.
pub fn parse_expression(text: &str) -> Result<Symbol, ParseError> {
    Parser::new(Lexer::new(text))?.parse()
}
