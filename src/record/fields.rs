//! Lenient accessors over raw protocol documents.
//!
//! Every accessor returns `None` (or an empty collection) when the key is
//! missing or holds a value of the wrong type.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};

pub fn str_at<'a>(doc: &'a Value, key: &str) -> Option<&'a str> {
    doc.get(key).and_then(Value::as_str)
}

pub fn bool_at(doc: &Value, key: &str) -> Option<bool> {
    doc.get(key).and_then(Value::as_bool)
}

pub fn u64_at(doc: &Value, key: &str) -> Option<u64> {
    doc.get(key).and_then(Value::as_u64)
}

/// Number at `key`; numeric strings (`"7.5"`) are accepted too.
pub fn f64_at(doc: &Value, key: &str) -> Option<f64> {
    match doc.get(key)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

pub fn object_at<'a>(doc: &'a Value, key: &str) -> Option<&'a Map<String, Value>> {
    doc.get(key).and_then(Value::as_object)
}

pub fn array_at<'a>(doc: &'a Value, key: &str) -> &'a [Value] {
    doc.get(key)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

/// String elements of the array at `key`; non-string elements are skipped.
pub fn strings_at<'a>(doc: &'a Value, key: &str) -> impl Iterator<Item = &'a str> {
    array_at(doc, key).iter().filter_map(Value::as_str)
}

/// Truthiness the way the service encodes flags: `true`, non-zero numbers
/// and non-empty strings/collections.
pub fn is_truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(a)) => !a.is_empty(),
        Some(Value::Object(o)) => !o.is_empty(),
    }
}

/// Render a scalar as display text (`"abc"` -> `abc`, `3` -> `3`).
pub fn display_scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Deserialize a field, falling back to the type's default when the value
/// is `null` or of the wrong shape.
pub fn lenient<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).unwrap_or_default())
}

/// Deserialize a list, dropping elements of the wrong shape. A non-list
/// reads as empty.
pub fn lenient_seq<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Array(items) => items
            .into_iter()
            .filter_map(|item| serde_json::from_value(item).ok())
            .collect(),
        _ => Vec::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn wrong_types_read_as_absent() {
        let doc = json!({"name": 5, "flag": "yes", "list": "nope"});
        assert_eq!(str_at(&doc, "name"), None);
        assert_eq!(bool_at(&doc, "flag"), None);
        assert!(array_at(&doc, "list").is_empty());
        assert_eq!(strings_at(&doc, "missing").count(), 0);
    }

    #[test]
    fn numeric_strings_parse() {
        let doc = json!({"a": "7.5", "b": 3, "c": "x"});
        assert_eq!(f64_at(&doc, "a"), Some(7.5));
        assert_eq!(f64_at(&doc, "b"), Some(3.0));
        assert_eq!(f64_at(&doc, "c"), None);
    }

    #[derive(Debug, Deserialize)]
    struct Loose {
        #[serde(default, deserialize_with = "lenient")]
        name: Option<String>,
        #[serde(default, deserialize_with = "lenient_seq")]
        ports: Vec<u16>,
    }

    #[test]
    fn lenient_fields_absorb_bad_types() {
        let loose: Loose = serde_json::from_value(json!({"name": 5, "ports": [22, "x", 70000, 443]})).unwrap();
        assert_eq!(loose.name, None);
        assert_eq!(loose.ports, vec![22, 443]);

        let loose: Loose = serde_json::from_value(json!({"name": null, "ports": "22"})).unwrap();
        assert_eq!(loose.name, None);
        assert!(loose.ports.is_empty());
    }

    #[test]
    fn truthiness() {
        assert!(is_truthy(Some(&json!(true))));
        assert!(is_truthy(Some(&json!(["x"]))));
        assert!(!is_truthy(Some(&json!(0))));
        assert!(!is_truthy(Some(&json!(""))));
        assert!(!is_truthy(None));
    }
}
