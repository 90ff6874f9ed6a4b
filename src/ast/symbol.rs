use std::fmt;

use crate::ast::Operator;
use crate::value::Value;

/// Parsed expression node.
///
/// A symbol tree is immutable once parsed; evaluation only reads it. Trees
/// attached to templates and lazy fields are shared through `Rc<Symbol>`.
#[derive(Debug, Clone, PartialEq)]
pub enum Symbol {
    /// Literal constant written in the expression text
    ///
    /// # Examples
    /// ```text
    /// 42
    /// "EUR"
    /// null
    /// ```
    Literal(Value),

    /// Field reference
    ///
    /// # Examples
    /// ```text
    /// #amount
    /// order#amount
    /// line#qty[2]
    /// order#*
    /// ```
    Field(FieldRef),

    /// Report parameter, resolved by the caller-supplied parameter resolver
    ///
    /// # Example
    /// ```text
    /// $TITLE
    /// ```
    Constant { name: String },

    /// Built-in function call
    ///
    /// # Examples
    /// ```text
    /// sum(line#amount)
    /// prev(#date)
    /// recnum()
    /// ```
    Function { func: Function, args: Vec<Symbol> },

    /// Call into a user-supplied method, tagged with the expected result kind
    ///
    /// # Examples
    /// ```text
    /// Totals.vat
    /// bool:Rules.isVip()
    /// ```
    MethodCall(MethodCall),

    /// Boolean or arithmetic operation
    Operation { op: Operator, operands: Vec<Symbol> },

    /// Bare identifier, used as a group name or trace tag argument
    Identifier(String),
}

/// `group#field[qualifier]` with every part optional.
///
/// Outside aggregates the qualifier is an instance index; inside aggregate
/// arguments it is a per-candidate boolean filter.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FieldRef {
    pub group: Option<String>,
    /// `None` for the wildcard `group#*`
    pub field: Option<String>,
    pub qualifier: Option<Box<Symbol>>,
}

impl FieldRef {
    pub fn new(group: Option<&str>, field: &str) -> Self {
        FieldRef {
            group: group.map(str::to_string),
            field: Some(field.to_string()),
            qualifier: None,
        }
    }

    /// Group name used in diagnostics (empty when the reference is unqualified).
    pub fn group_label(&self) -> &str {
        self.group.as_deref().unwrap_or("")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodTag {
    /// Result must be a boolean
    Boolean,
    /// Result is used as-is
    Value,
    /// Result is converted to text
    Text,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MethodCall {
    pub class: String,
    pub method: String,
    pub tag: MethodTag,
}

/// Built-in functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Function {
    Sum,
    SumAll,
    Count,
    CountAll,
    CountDistinct,
    CountDistinctAll,
    MinValue,
    MinValueAll,
    MaxValue,
    MaxValueAll,
    Prev,
    Next,
    First,
    Last,
    Current,
    CurrentStart,
    Exist,
    RecNum,
    PageNum,
}

impl Function {
    /// Resolves a function name (case-insensitive).
    pub fn from_name(name: &str) -> Option<Self> {
        let f = match name.to_ascii_lowercase().as_str() {
            "sum" => Function::Sum,
            "sumall" => Function::SumAll,
            "count" => Function::Count,
            "countall" => Function::CountAll,
            "countdistinct" => Function::CountDistinct,
            "countdistinctall" => Function::CountDistinctAll,
            "min" | "minvalue" => Function::MinValue,
            "minall" | "minvalueall" => Function::MinValueAll,
            "max" | "maxvalue" => Function::MaxValue,
            "maxall" | "maxvalueall" => Function::MaxValueAll,
            "prev" => Function::Prev,
            "next" => Function::Next,
            "first" => Function::First,
            "last" => Function::Last,
            "current" => Function::Current,
            "currentstart" => Function::CurrentStart,
            "exist" | "exists" => Function::Exist,
            "recnum" => Function::RecNum,
            "pagenum" => Function::PageNum,
            _ => return None,
        };
        Some(f)
    }

    pub fn name(self) -> &'static str {
        match self {
            Function::Sum => "sum",
            Function::SumAll => "sumAll",
            Function::Count => "count",
            Function::CountAll => "countAll",
            Function::CountDistinct => "countDistinct",
            Function::CountDistinctAll => "countDistinctAll",
            Function::MinValue => "minvalue",
            Function::MinValueAll => "minvalueAll",
            Function::MaxValue => "maxvalue",
            Function::MaxValueAll => "maxvalueAll",
            Function::Prev => "prev",
            Function::Next => "next",
            Function::First => "first",
            Function::Last => "last",
            Function::Current => "current",
            Function::CurrentStart => "currentStart",
            Function::Exist => "exist",
            Function::RecNum => "recnum",
            Function::PageNum => "pagenum",
        }
    }

    /// Accepted argument counts, inclusive.
    pub fn arity(self) -> (usize, usize) {
        match self {
            Function::RecNum | Function::PageNum => (0, 0),
            Function::Count | Function::First | Function::Last => (0, 1),
            Function::Current | Function::CurrentStart => (0, 2),
            _ => (1, 1),
        }
    }

    /// Aggregates that reduce over a set of group instances.
    pub fn is_aggregate(self) -> bool {
        matches!(
            self,
            Function::Sum
                | Function::SumAll
                | Function::Count
                | Function::CountAll
                | Function::CountDistinct
                | Function::CountDistinctAll
                | Function::MinValue
                | Function::MinValueAll
                | Function::MaxValue
                | Function::MaxValueAll
        )
    }

    /// The "All" variants start from the report root instead of the parent.
    pub fn spans_report(self) -> bool {
        matches!(
            self,
            Function::SumAll
                | Function::CountAll
                | Function::CountDistinctAll
                | Function::MinValueAll
                | Function::MaxValueAll
        )
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl fmt::Display for FieldRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.group_label(), self.field.as_deref().unwrap_or("*"))?;
        if let Some(q) = &self.qualifier {
            write!(f, "[{}]", q)?;
        }
        Ok(())
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Symbol::Literal(Value::String(s)) => write!(f, "{:?}", s),
            Symbol::Literal(Value::Null) => f.write_str("null"),
            Symbol::Literal(v) => write!(f, "{}", v),
            Symbol::Field(r) => write!(f, "{}", r),
            Symbol::Constant { name } => write!(f, "${}", name),
            Symbol::Function { func, args } => {
                write!(f, "{}(", func)?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                f.write_str(")")
            }
            Symbol::MethodCall(call) => {
                let tag = match call.tag {
                    MethodTag::Boolean => "bool:",
                    MethodTag::Text => "text:",
                    MethodTag::Value => "",
                };
                write!(f, "{}{}.{}()", tag, call.class, call.method)
            }
            Symbol::Operation { op, operands } => match operands.as_slice() {
                [only] => write!(f, "{}({})", if *op == Operator::Not { "not " } else { "-" }, only),
                [left, right] => write!(f, "({} {} {})", left, op, right),
                _ => write!(f, "<{} with {} operands>", op, operands.len()),
            },
            Symbol::Identifier(name) => f.write_str(name),
        }
    }
}
