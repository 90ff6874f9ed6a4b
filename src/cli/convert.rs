//! JSON <-> report value conversion utilities

use crate::group::Row;
use crate::resolve::{rows_from_json, value_from_json};
use crate::value::Value;

use super::CliError;

/// Parse a JSON array of row objects
pub fn rows_from_json_text(text: &str) -> Result<Vec<Row>, CliError> {
    let json: serde_json::Value = serde_json::from_str(text)?;
    Ok(rows_from_json(&json)?)
}

/// Parse `NAME=VALUE`. The value is read as a JSON scalar when it is one,
/// otherwise as a string.
pub fn parse_param(text: &str) -> Result<(String, Value), CliError> {
    let (name, raw) = text
        .split_once('=')
        .filter(|(name, _)| !name.trim().is_empty())
        .ok_or_else(|| CliError::InvalidParam(text.to_string()))?;
    let value = match serde_json::from_str::<serde_json::Value>(raw) {
        Ok(json) if !json.is_array() && !json.is_object() => value_from_json(&json),
        _ => Value::String(raw.to_string()),
    };
    Ok((name.trim().to_string(), value))
}

/// Convert a report value to serde_json::Value
pub fn value_to_json(v: &Value) -> serde_json::Value {
    match v {
        Value::Null => serde_json::Value::Null,
        Value::Boolean(b) => serde_json::Value::Bool(*b),
        Value::Long(i) => serde_json::Value::Number((*i).into()),
        Value::Double(f) => serde_json::Number::from_f64(*f)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        Value::Decimal(_) | Value::Date(_) | Value::String(_) => {
            serde_json::Value::String(v.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn params_are_json_scalars_or_text() {
        assert_eq!(parse_param("VAT=22").unwrap(), ("VAT".into(), Value::Long(22)));
        assert_eq!(
            parse_param("TITLE=Sales 2024").unwrap(),
            ("TITLE".into(), Value::from("Sales 2024"))
        );
        assert_eq!(parse_param("FLAG=true").unwrap().1, Value::Boolean(true));
        assert!(parse_param("=1").is_err());
        assert!(parse_param("novalue").is_err());
    }

    #[test]
    fn rows_must_be_objects() {
        let rows = rows_from_json_text(r#"[{"a": 1}, {"a": "x"}]"#).unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows_from_json_text("[1]").is_err());
        assert!(matches!(rows_from_json_text("{"), Err(CliError::Json(_))));
    }
}
