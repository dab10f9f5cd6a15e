use serde_json::Value;
use time::OffsetDateTime;

/// Loosely typed column value of a time-series sample.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Null,
    Bool(bool),
    Float(f64),
    Text(String),
}

impl From<Value> for FieldValue {
    fn from(v: Value) -> Self {
        match v {
            Value::Null => FieldValue::Null,
            Value::Bool(b) => FieldValue::Bool(b),
            Value::Number(n) => n.as_f64().map(FieldValue::Float).unwrap_or(FieldValue::Null),
            Value::String(s) => FieldValue::Text(s),
            other => FieldValue::Text(other.to_string()),
        }
    }
}

impl FieldValue {
    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }
}

/// One sample returned by the time-series database, tagged with the
/// measurement it was read from.
///
/// `time` is `None` when the database returned a timestamp that does not
/// parse as RFC 3339.
#[derive(Debug, Clone, PartialEq)]
pub struct MeasurementRow {
    pub time: Option<OffsetDateTime>,
    pub measurement: String,
    pub fields: Vec<(String, FieldValue)>,
}

impl MeasurementRow {
    pub fn field(&self, name: &str) -> Option<&FieldValue> {
        self.fields.iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn json_values_map_to_field_values() {
        assert_eq!(FieldValue::from(json!(null)), FieldValue::Null);
        assert_eq!(FieldValue::from(json!(true)), FieldValue::Bool(true));
        assert_eq!(FieldValue::from(json!(3)), FieldValue::Float(3.0));
        assert_eq!(FieldValue::from(json!(1.5)), FieldValue::Float(1.5));
        assert_eq!(
            FieldValue::from(json!("sensor")),
            FieldValue::Text("sensor".to_string())
        );
        assert_eq!(
            FieldValue::from(json!([1, 2])),
            FieldValue::Text("[1,2]".to_string())
        );
    }
}
