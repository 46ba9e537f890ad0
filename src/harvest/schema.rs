//! Record schema enforced at the harvest boundary.
//!
//! Remote payloads arrive as loosely-typed JSON. Each harvest declares the
//! fields it needs up front; missing required fields and unknown field
//! lookups are typed errors instead of silently propagated nulls.

use crate::error::{Rep365Error, Result};
use chrono::{DateTime, Utc};
use serde_json::Value;

/// Kind of a declared field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Int,
    Float,
    Timestamp,
    /// JSON array of strings (e.g. a machine's IP address list)
    List,
}

/// One declared field of a harvest schema
#[derive(Debug, Clone)]
pub struct FieldSpec {
    pub name: String,
    pub kind: FieldKind,
    pub required: bool,
}

/// Ordered set of fields a harvest extracts from each remote item.
///
/// Field order here is the column order of every downstream export.
#[derive(Debug, Clone, Default)]
pub struct RecordSchema {
    fields: Vec<FieldSpec>,
}

impl RecordSchema {
    pub fn new() -> Self {
        Self { fields: Vec::new() }
    }

    pub fn field(mut self, name: &str, kind: FieldKind) -> Self {
        self.fields.push(FieldSpec {
            name: name.to_string(),
            kind,
            required: true,
        });
        self
    }

    pub fn optional_field(mut self, name: &str, kind: FieldKind) -> Self {
        self.fields.push(FieldSpec {
            name: name.to_string(),
            kind,
            required: false,
        });
        self
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    pub fn field_names(&self) -> Vec<String> {
        self.fields.iter().map(|f| f.name.clone()).collect()
    }

    /// Validate one remote item against the schema.
    ///
    /// A required field that is absent (or JSON null) fails validation; an
    /// optional one becomes `FieldValue::Missing`. A present field of the
    /// wrong JSON type always fails.
    pub fn validate(&self, item: &Value) -> Result<RawRecord> {
        let obj = item.as_object().ok_or_else(|| {
            Rep365Error::Schema(format!("expected a JSON object, got: {}", item))
        })?;

        let mut values = Vec::with_capacity(self.fields.len());

        for spec in &self.fields {
            let raw = obj.get(&spec.name).unwrap_or(&Value::Null);

            if raw.is_null() {
                if spec.required {
                    return Err(Rep365Error::Schema(format!(
                        "required field '{}' missing from record",
                        spec.name
                    )));
                }
                values.push((spec.name.clone(), FieldValue::Missing));
                continue;
            }

            let value = match spec.kind {
                FieldKind::Text => raw
                    .as_str()
                    .map(|s| FieldValue::Text(s.to_string()))
                    .ok_or_else(|| type_error(&spec.name, "string", raw))?,
                FieldKind::Int => raw
                    .as_i64()
                    .map(FieldValue::Int)
                    .ok_or_else(|| type_error(&spec.name, "integer", raw))?,
                FieldKind::Float => raw
                    .as_f64()
                    .map(FieldValue::Float)
                    .ok_or_else(|| type_error(&spec.name, "number", raw))?,
                FieldKind::Timestamp => {
                    let s = raw
                        .as_str()
                        .ok_or_else(|| type_error(&spec.name, "RFC 3339 timestamp", raw))?;
                    let ts = DateTime::parse_from_rfc3339(s).map_err(|e| {
                        Rep365Error::Schema(format!(
                            "field '{}' is not a valid timestamp ('{}'): {}",
                            spec.name, s, e
                        ))
                    })?;
                    FieldValue::Timestamp(ts.with_timezone(&Utc))
                }
                FieldKind::List => {
                    let arr = raw
                        .as_array()
                        .ok_or_else(|| type_error(&spec.name, "array", raw))?;
                    let mut items = Vec::with_capacity(arr.len());
                    for entry in arr {
                        let s = entry
                            .as_str()
                            .ok_or_else(|| type_error(&spec.name, "array of strings", entry))?;
                        items.push(s.to_string());
                    }
                    FieldValue::List(items)
                }
            };

            values.push((spec.name.clone(), value));
        }

        Ok(RawRecord { values })
    }
}

fn type_error(field: &str, expected: &str, got: &Value) -> Rep365Error {
    Rep365Error::Schema(format!(
        "field '{}' expected {}, got: {}",
        field, expected, got
    ))
}

/// Typed value of one record field
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    Int(i64),
    Float(f64),
    Timestamp(DateTime<Utc>),
    List(Vec<String>),
    Missing,
}

impl FieldValue {
    /// Deterministic string form used for CSV export.
    /// List entries join on ';' so the field stays a single CSV column.
    pub fn to_export_string(&self) -> String {
        match self {
            FieldValue::Text(s) => s.clone(),
            FieldValue::Int(i) => i.to_string(),
            FieldValue::Float(f) => f.to_string(),
            FieldValue::Timestamp(ts) => ts.to_rfc3339(),
            FieldValue::List(items) => items.join(";"),
            FieldValue::Missing => String::new(),
        }
    }
}

/// One harvested record, validated against its schema.
///
/// Immutable once produced; field order follows the schema declaration.
#[derive(Debug, Clone)]
pub struct RawRecord {
    values: Vec<(String, FieldValue)>,
}

impl RawRecord {
    /// Look up a field by name. Asking for a field the schema never
    /// declared is a typed error, not a silent empty value.
    pub fn get(&self, name: &str) -> Result<&FieldValue> {
        self.values
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
            .ok_or_else(|| {
                Rep365Error::Schema(format!("field '{}' is not part of the record schema", name))
            })
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.values.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn field_names(&self) -> Vec<String> {
        self.values.iter().map(|(n, _)| n.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn device_schema() -> RecordSchema {
        RecordSchema::new()
            .field("id", FieldKind::Text)
            .field("computerDnsName", FieldKind::Text)
            .optional_field("ipAddresses", FieldKind::List)
            .optional_field("exposureScore", FieldKind::Int)
            .optional_field("firstSeen", FieldKind::Timestamp)
    }

    #[test]
    fn test_validate_full_record() {
        let schema = device_schema();
        let record = schema
            .validate(&json!({
                "id": "m-1",
                "computerDnsName": "ws-042.corp.local",
                "ipAddresses": ["10.120.26.55", "192.168.1.4"],
                "exposureScore": 42,
                "firstSeen": "2024-03-01T09:30:00Z",
            }))
            .unwrap();

        assert_eq!(
            record.get("computerDnsName").unwrap(),
            &FieldValue::Text("ws-042.corp.local".to_string())
        );
        assert_eq!(record.get("exposureScore").unwrap(), &FieldValue::Int(42));
        assert!(matches!(
            record.get("firstSeen").unwrap(),
            FieldValue::Timestamp(_)
        ));
    }

    #[test]
    fn test_missing_required_field_is_error() {
        let schema = device_schema();
        let err = schema
            .validate(&json!({"computerDnsName": "ws-042"}))
            .unwrap_err();
        assert!(err.to_string().contains("'id'"));
    }

    #[test]
    fn test_null_optional_field_becomes_missing() {
        let schema = device_schema();
        let record = schema
            .validate(&json!({
                "id": "m-1",
                "computerDnsName": "ws-042",
                "ipAddresses": null,
            }))
            .unwrap();
        assert_eq!(record.get("ipAddresses").unwrap(), &FieldValue::Missing);
        assert_eq!(record.get("ipAddresses").unwrap().to_export_string(), "");
    }

    #[test]
    fn test_wrong_type_is_error() {
        let schema = device_schema();
        let err = schema
            .validate(&json!({
                "id": 12345,
                "computerDnsName": "ws-042",
            }))
            .unwrap_err();
        assert!(err.to_string().contains("expected string"));
    }

    #[test]
    fn test_unknown_field_lookup_is_error() {
        let schema = device_schema();
        let record = schema
            .validate(&json!({"id": "m-1", "computerDnsName": "ws-042"}))
            .unwrap();
        let err = record.get("osPlatform").unwrap_err();
        assert!(err.to_string().contains("not part of the record schema"));
    }

    #[test]
    fn test_bad_timestamp_is_error() {
        let schema = device_schema();
        let err = schema
            .validate(&json!({
                "id": "m-1",
                "computerDnsName": "ws-042",
                "firstSeen": "yesterday",
            }))
            .unwrap_err();
        assert!(err.to_string().contains("not a valid timestamp"));
    }

    #[test]
    fn test_field_order_follows_schema() {
        let schema = device_schema();
        let record = schema
            .validate(&json!({
                "exposureScore": 10,
                "computerDnsName": "ws-042",
                "id": "m-1",
            }))
            .unwrap();
        assert_eq!(
            record.field_names(),
            vec![
                "id",
                "computerDnsName",
                "ipAddresses",
                "exposureScore",
                "firstSeen"
            ]
        );
    }
}
