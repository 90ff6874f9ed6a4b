use std::rc::Rc;
use std::str::FromStr;

use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::ast::Symbol;
use crate::value::Value;

/// Declared type of a data field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FieldType {
    Long,
    Double,
    BigDecimal,
    Date,
    String,
    #[default]
    Unknown,
}

impl FieldType {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "long" | "int" | "integer" => Some(FieldType::Long),
            "double" | "float" => Some(FieldType::Double),
            "bigdecimal" | "decimal" => Some(FieldType::BigDecimal),
            "date" => Some(FieldType::Date),
            "string" | "text" => Some(FieldType::String),
            "unknown" | "auto" => Some(FieldType::Unknown),
            _ => None,
        }
    }

    /// Type of a value as delivered by a data source.
    pub fn of(value: &Value) -> Self {
        match value {
            Value::Long(_) => FieldType::Long,
            Value::Double(_) => FieldType::Double,
            Value::Decimal(_) => FieldType::BigDecimal,
            Value::Date(_) => FieldType::Date,
            Value::String(_) => FieldType::String,
            Value::Null | Value::Boolean(_) => FieldType::Unknown,
        }
    }

    /// Convert a raw row value to this type. Values that cannot be
    /// converted are kept as delivered.
    pub fn coerce(self, value: Value) -> Value {
        match (self, value) {
            (_, Value::Null) => Value::Null,
            // 2^63 itself is out of range
            (FieldType::Long, Value::Double(n))
                if n.fract() == 0.0 && n >= i64::MIN as f64 && n < i64::MAX as f64 =>
            {
                Value::Long(n as i64)
            }
            (FieldType::Long, Value::String(s)) => match s.trim().parse::<i64>() {
                Ok(n) => Value::Long(n),
                Err(_) => Value::String(s),
            },
            (FieldType::Double, Value::Long(n)) => Value::Double(n as f64),
            (FieldType::Double, Value::String(s)) => match s.trim().parse::<f64>() {
                Ok(n) => Value::Double(n),
                Err(_) => Value::String(s),
            },
            (FieldType::BigDecimal, Value::Long(n)) => Value::Decimal(Decimal::from(n)),
            // Through the shortest textual form so 0.1 stays exactly 0.1
            (FieldType::BigDecimal, Value::Double(n)) => match Decimal::from_str(&n.to_string()) {
                Ok(d) => Value::Decimal(d),
                Err(_) => Value::Double(n),
            },
            (FieldType::BigDecimal, Value::String(s)) => match Decimal::from_str(s.trim()) {
                Ok(d) => Value::Decimal(d),
                Err(_) => Value::String(s),
            },
            (FieldType::Date, Value::String(s)) => {
                match NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d") {
                    Ok(d) => Value::Date(d),
                    Err(_) => Value::String(s),
                }
            }
            (FieldType::String, Value::String(s)) => Value::String(s),
            (FieldType::String, v) => Value::String(v.to_string()),
            (_, v) => v,
        }
    }
}

/// Storage state of one field on one group instance.
///
/// "Empty" (the row never delivered the field) is distinct from a present
/// `Value::Null`, which is distinct from zero.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldSlot {
    Empty,
    Value(Value),
    /// Lazy field not computed yet
    Auto(Rc<Symbol>),
    /// Lazy or written-back field, memoized
    Computed(Value),
}

#[derive(Debug, Clone, PartialEq)]
pub struct DataField {
    pub name: String,
    pub field_type: FieldType,
    pub slot: FieldSlot,
}

impl DataField {
    pub fn empty(name: &str, field_type: FieldType) -> Self {
        DataField {
            name: name.to_string(),
            field_type,
            slot: FieldSlot::Empty,
        }
    }

    pub fn lookup(&self) -> FieldLookup {
        match &self.slot {
            FieldSlot::Empty => FieldLookup::Empty,
            FieldSlot::Value(v) | FieldSlot::Computed(v) => FieldLookup::Ready(v.clone()),
            FieldSlot::Auto(symbol) => FieldLookup::Pending(Rc::clone(symbol)),
        }
    }
}

/// First phase of a field read.
///
/// `Pending` hands the lazy field's expression back to the caller, which
/// evaluates it against the owning group and stores the result with
/// `GroupTree::store_computed`.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldLookup {
    /// The group's model does not declare the field
    Undeclared,
    Empty,
    Ready(Value),
    Pending(Rc<Symbol>),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coerce_declared_types() {
        assert_eq!(FieldType::Long.coerce(Value::Double(3.0)), Value::Long(3));
        assert_eq!(FieldType::Long.coerce(Value::Double(2.5)), Value::Double(2.5));
        assert_eq!(
            FieldType::BigDecimal.coerce(Value::Double(0.1)),
            Value::Decimal(Decimal::new(1, 1))
        );
        assert_eq!(
            FieldType::Date.coerce(Value::from("2024-02-29")),
            Value::Date(NaiveDate::from_ymd_opt(2024, 2, 29).unwrap())
        );
        assert_eq!(FieldType::Date.coerce(Value::from("soon")), Value::from("soon"));
        assert_eq!(FieldType::String.coerce(Value::Long(7)), Value::from("7"));
        assert_eq!(FieldType::Double.coerce(Value::Null), Value::Null);
    }

    #[test]
    fn long_coercion_keeps_out_of_range_doubles() {
        assert_eq!(FieldType::Long.coerce(Value::Double(1e19)), Value::Double(1e19));
        assert_eq!(FieldType::Long.coerce(Value::Double(-1e19)), Value::Double(-1e19));
        assert_eq!(
            FieldType::Long.coerce(Value::Double(9_223_372_036_854_775_808.0)),
            Value::Double(9_223_372_036_854_775_808.0)
        );
        assert_eq!(
            FieldType::Long.coerce(Value::Double(-9_223_372_036_854_775_808.0)),
            Value::Long(i64::MIN)
        );
        assert_eq!(
            FieldType::Long.coerce(Value::Double(f64::INFINITY)),
            Value::Double(f64::INFINITY)
        );
    }

    #[test]
    fn lookup_distinguishes_empty_null_and_pending() {
        let mut field = DataField::empty("amount", FieldType::Long);
        assert_eq!(field.lookup(), FieldLookup::Empty);
        field.slot = FieldSlot::Value(Value::Null);
        assert_eq!(field.lookup(), FieldLookup::Ready(Value::Null));

        field.slot = FieldSlot::Auto(Rc::new(Symbol::Literal(Value::Long(1))));
        assert!(matches!(field.lookup(), FieldLookup::Pending(_)));
        field.slot = FieldSlot::Computed(Value::Long(1));
        assert_eq!(field.lookup(), FieldLookup::Ready(Value::Long(1)));
    }
}
