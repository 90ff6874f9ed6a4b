use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use chrono::NaiveDate;
use rust_decimal::{Decimal, prelude::FromPrimitive, prelude::ToPrimitive};

/// A scalar value produced by field access or expression evaluation.
///
/// The numeric variants mirror the field types a data source can deliver:
/// `Long` for integral columns, `Double` for floating point columns and
/// `Decimal` for exact (BIGDECIMAL) columns.
///
/// # Type Preservation
///
/// - Arithmetic between two `Long`s stays integral and widens to `Decimal`
///   on overflow
/// - Mixed `Long`/`Double` arithmetic is computed in decimal and collapses
///   back to `Long` when the result is whole
/// - Anything combined with a `Decimal` stays `Decimal`
///
/// # Examples
///
/// ```
/// use banded_report::Value;
///
/// let price = Value::Long(100);
/// let rate = Value::Double(1.1);
/// assert_eq!(price.mul(&rate).unwrap(), Value::Long(110));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Present but without a value
    Null,

    Boolean(bool),

    /// Integral number
    Long(i64),

    /// Floating-point number
    Double(f64),

    /// Exact decimal number
    Decimal(Decimal),

    /// Calendar date without time zone
    Date(NaiveDate),

    String(String),
}

/// Failure of a value-level operation. The evaluator turns it into a
/// `ResolveError` carrying node context.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValueError {
    #[error("cannot {op} {left} and {right}")]
    Incompatible {
        op: &'static str,
        left: &'static str,
        right: &'static str,
    },

    #[error("division by zero")]
    DivisionByZero,
}

impl Value {
    /// Human-readable type name, used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Boolean(_) => "boolean",
            Value::Long(_) => "long",
            Value::Double(_) => "double",
            Value::Decimal(_) => "decimal",
            Value::Date(_) => "date",
            Value::String(_) => "string",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Value::Long(_) | Value::Double(_) | Value::Decimal(_))
    }

    /// True for numeric zero. Strings and dates are never zero.
    pub fn is_zero(&self) -> bool {
        match self {
            Value::Long(n) => *n == 0,
            Value::Double(n) => *n == 0.0,
            Value::Decimal(d) => d.is_zero(),
            _ => false,
        }
    }

    /// Check if the value is truthy (for visibility and filter conditions)
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Boolean(b) => *b,
            Value::Long(n) => *n != 0,
            Value::Double(n) => *n != 0.0,
            Value::Decimal(d) => !d.is_zero(),
            Value::Date(_) => true,
            Value::String(s) => !s.is_empty(),
        }
    }

    /// Strict boolean view: only `Boolean` answers.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Long(n) => Some(*n as f64),
            Value::Double(n) => Some(*n),
            Value::Decimal(d) => d.to_f64(),
            _ => None,
        }
    }

    /// Integral view of a numeric value. Fractional values have none.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Long(n) => Some(*n),
            Value::Double(n)
                if n.fract() == 0.0 && *n >= i64::MIN as f64 && *n < i64::MAX as f64 =>
            {
                Some(*n as i64)
            }
            Value::Decimal(d) if d.fract().is_zero() => d.to_i64(),
            _ => None,
        }
    }

    pub fn as_decimal(&self) -> Option<Decimal> {
        match self {
            Value::Long(n) => Some(Decimal::from(*n)),
            Value::Double(n) => Decimal::from_f64(*n),
            Value::Decimal(d) => Some(*d),
            _ => None,
        }
    }

    /// Rank of a numeric type on the widening ladder long < double < decimal.
    fn numeric_rank(&self) -> Option<u8> {
        match self {
            Value::Long(_) => Some(0),
            Value::Double(_) => Some(1),
            Value::Decimal(_) => Some(2),
            _ => None,
        }
    }

    pub fn add(&self, other: &Value) -> Result<Value, ValueError> {
        match (self, other) {
            (Value::String(a), Value::String(b)) => Ok(Value::String(format!("{}{}", a, b))),
            (Value::String(a), b) if !b.is_null() => Ok(Value::String(format!("{}{}", a, b))),
            _ => self.numeric_op(other, "add", |a, b| a.checked_add(b), |a, b| a + b, i64::checked_add),
        }
    }

    pub fn sub(&self, other: &Value) -> Result<Value, ValueError> {
        self.numeric_op(other, "subtract", |a, b| a.checked_sub(b), |a, b| a - b, i64::checked_sub)
    }

    pub fn mul(&self, other: &Value) -> Result<Value, ValueError> {
        self.numeric_op(other, "multiply", |a, b| a.checked_mul(b), |a, b| a * b, i64::checked_mul)
    }

    pub fn div(&self, other: &Value) -> Result<Value, ValueError> {
        if other.is_zero() && self.is_numeric() {
            return Err(ValueError::DivisionByZero);
        }
        if let (Value::Long(a), Value::Long(b)) = (self, other) {
            // Exact integer division stays integral
            if a.checked_rem(*b) == Some(0)
                && let Some(q) = a.checked_div(*b)
            {
                return Ok(Value::Long(q));
            }
            return Ok(Value::Double(*a as f64 / *b as f64));
        }
        self.numeric_op(other, "divide", |a, b| a.checked_div(b), |a, b| a / b, i64::checked_div)
    }

    pub fn rem(&self, other: &Value) -> Result<Value, ValueError> {
        if other.is_zero() && self.is_numeric() {
            return Err(ValueError::DivisionByZero);
        }
        self.numeric_op(other, "compute modulo of", |a, b| a.checked_rem(b), |a, b| a % b, i64::checked_rem)
    }

    fn numeric_op(
        &self,
        other: &Value,
        op: &'static str,
        dec: impl Fn(Decimal, Decimal) -> Option<Decimal>,
        float: impl Fn(f64, f64) -> f64,
        long: impl Fn(i64, i64) -> Option<i64>,
    ) -> Result<Value, ValueError> {
        let incompatible = || ValueError::Incompatible {
            op,
            left: self.type_name(),
            right: other.type_name(),
        };

        if self.is_null() || other.is_null() {
            if self.is_numeric() || other.is_numeric() || (self.is_null() && other.is_null()) {
                return Ok(Value::Null);
            }
            return Err(incompatible());
        }

        match (self, other) {
            (Value::Long(a), Value::Long(b)) => match long(*a, *b) {
                Some(r) => Ok(Value::Long(r)),
                None => dec(Decimal::from(*a), Decimal::from(*b))
                    .map(Value::Decimal)
                    .ok_or_else(incompatible),
            },
            (Value::Double(a), Value::Double(b)) => Ok(Value::Double(float(*a, *b))),
            (a, b) => {
                let (Some(ra), Some(rb)) = (a.numeric_rank(), b.numeric_rank()) else {
                    return Err(incompatible());
                };
                let widest = ra.max(rb);
                if let Some(ad) = a.as_decimal()
                    && let Some(bd) = b.as_decimal()
                    && let Some(rd) = dec(ad, bd)
                {
                    if widest == 2 {
                        return Ok(Value::Decimal(rd));
                    }
                    if rd.is_integer()
                        && let Some(r) = rd.to_i64()
                    {
                        return Ok(Value::Long(r));
                    } else if let Some(r) = rd.to_f64() {
                        return Ok(Value::Double(r));
                    }
                }
                match (a.as_f64(), b.as_f64()) {
                    (Some(x), Some(y)) => Ok(Value::Double(float(x, y))),
                    _ => Err(incompatible()),
                }
            }
        }
    }

    /// Comparison used by the relational operators. `None` when the two
    /// values are not comparable (including any comparison with null).
    pub fn partial_compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Null, _) | (_, Value::Null) => None,
            (Value::Long(a), Value::Long(b)) => Some(a.cmp(b)),
            (Value::Double(a), Value::Double(b)) => a.partial_cmp(b),
            (a, b) if a.is_numeric() && b.is_numeric() => match (a.as_decimal(), b.as_decimal()) {
                (Some(x), Some(y)) => Some(x.cmp(&y)),
                _ => a.as_f64()?.partial_cmp(&b.as_f64()?),
            },
            (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
            (Value::Date(a), Value::Date(b)) => Some(a.cmp(b)),
            (Value::Boolean(a), Value::Boolean(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }

    /// Equality used by `==`: numerics compare by value across types.
    pub fn loose_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (a, b) if a.is_numeric() && b.is_numeric() => {
                a.partial_compare(b) == Some(Ordering::Equal)
            }
            (a, b) => a == b,
        }
    }

    /// Total order used when sorting group lists. Nulls sort first, then
    /// values are grouped by kind so heterogeneous columns still sort
    /// deterministically.
    pub fn sort_compare(&self, other: &Value, case_sensitive: bool) -> Ordering {
        fn kind(v: &Value) -> u8 {
            match v {
                Value::Null => 0,
                Value::Boolean(_) => 1,
                Value::Long(_) | Value::Double(_) | Value::Decimal(_) => 2,
                Value::Date(_) => 3,
                Value::String(_) => 4,
            }
        }

        match (self, other) {
            (Value::String(a), Value::String(b)) if !case_sensitive => {
                a.to_lowercase().cmp(&b.to_lowercase())
            }
            _ => match kind(self).cmp(&kind(other)) {
                Ordering::Equal => self.partial_compare(other).unwrap_or(Ordering::Equal),
                ord => ord,
            },
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Long(n) => write!(f, "{}", n),
            Value::Double(n) => write!(f, "{}", n),
            Value::Decimal(d) => write!(f, "{}", d.normalize()),
            Value::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            Value::String(s) => f.write_str(s),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Long(n)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Double(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

/// Hashable projection of a value.
///
/// Used for key tuples when rows are grouped and for `countDistinct`.
/// Numbers are normalized through `Decimal` so `1`, `1.0` and `1.00`
/// collapse to one key; NaN values are equal to each other.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DistinctKey {
    Null,
    Boolean(bool),
    Number(Decimal),
    /// Floats that do not fit a decimal (NaN, infinities, huge exponents)
    Float(OrderedFloat),
    Date(NaiveDate),
    String(String),
}

impl From<&Value> for DistinctKey {
    fn from(value: &Value) -> Self {
        match value {
            Value::Null => DistinctKey::Null,
            Value::Boolean(b) => DistinctKey::Boolean(*b),
            Value::Long(n) => DistinctKey::Number(Decimal::from(*n)),
            Value::Double(n) => match Decimal::from_f64(*n) {
                Some(d) => DistinctKey::Number(d.normalize()),
                None => DistinctKey::Float(OrderedFloat(*n)),
            },
            Value::Decimal(d) => DistinctKey::Number(d.normalize()),
            Value::Date(d) => DistinctKey::Date(*d),
            Value::String(s) => DistinctKey::String(s.clone()),
        }
    }
}

/// Wrapper around f64 that implements Eq and Hash.
/// NaN values are treated as equal to each other.
#[derive(Debug, Clone, Copy)]
pub struct OrderedFloat(pub f64);

impl PartialEq for OrderedFloat {
    fn eq(&self, other: &Self) -> bool {
        if self.0.is_nan() && other.0.is_nan() {
            true
        } else {
            self.0 == other.0
        }
    }
}

impl Eq for OrderedFloat {}

impl Hash for OrderedFloat {
    fn hash<H: Hasher>(&self, state: &mut H) {
        if self.0.is_nan() {
            u64::MAX.hash(state);
        } else {
            self.0.to_bits().hash(state);
        }
    }
}
