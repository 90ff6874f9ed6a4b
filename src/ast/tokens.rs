/// Lexical tokens of the expression language.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // Literals
    /// Integer
    ///
    /// # Examples
    /// ```text
    /// 42
    /// 0
    /// ```
    Integer(i64),

    /// Floating-point number
    ///
    /// # Examples
    /// ```text
    /// 3.14
    /// 0.5
    /// ```
    Float(f64),

    /// String literal enclosed in double or single quotes
    ///
    /// # Examples
    /// ```text
    /// "hello"
    /// 'item #1'
    /// ```
    String(String),

    /// `true` / `false`
    Boolean(bool),

    /// `null`
    Null,

    /// Report parameter reference (`$NAME`)
    ///
    /// # Examples
    /// ```text
    /// $TITLE
    /// $min_amount
    /// ```
    Parameter(String),

    // Identifiers and References
    /// Group name, field name, function name or bare identifier
    Identifier(String),

    /// Field marker (`#`), as in `#amount` or `order#amount`
    Hash,

    // Operators
    /// `+`
    Plus,
    /// `-`
    Minus,
    /// `*` (also the field wildcard in `group#*`)
    Star,
    /// `/`
    Slash,
    /// `%`
    Percent,
    /// `==`
    EqEq,
    /// `!=`
    NotEq,
    /// `<`
    Lt,
    /// `>`
    Gt,
    /// `<=`
    LtEq,
    /// `>=`
    GtEq,
    /// `and`
    And,
    /// `or`
    Or,
    /// `not` or `!`
    Not,

    // Delimiters
    /// `(`
    LParen,
    /// `)`
    RParen,
    /// `[`
    LBracket,
    /// `]`
    RBracket,
    /// `,`
    Comma,
    /// `.`
    Dot,
    /// `:`
    Colon,

    /// End of input
    Eof,
}
