//! Property values and intrinsic functions

use std::collections::BTreeMap;

use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};

/// Attribute value of a resource property
///
/// Intrinsic variants are rendered as the provisioning engine's function
/// objects (`{"Ref": ...}`, `{"Fn::GetAtt": [...]}` and so on) and are only
/// resolved at deploy time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    String(String),
    Int(i64),
    Bool(bool),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
    /// Reference to another resource or a pseudo parameter
    Ref(String),
    /// Attribute of another resource (logical_id, attribute_name)
    GetAtt(String, String),
    /// Values joined with a delimiter
    Join(String, Vec<Value>),
    /// Element of a list value
    Select(usize, Box<Value>),
    /// Availability zones of the deployment region
    GetAzs,
    /// String with `${...}` substitutions
    Sub(String),
}

impl Value {
    pub fn str(value: impl Into<String>) -> Self {
        Value::String(value.into())
    }

    pub fn reference(logical_id: impl Into<String>) -> Self {
        Value::Ref(logical_id.into())
    }

    pub fn get_att(logical_id: impl Into<String>, attribute: impl Into<String>) -> Self {
        Value::GetAtt(logical_id.into(), attribute.into())
    }

    pub fn join(delimiter: impl Into<String>, parts: impl IntoIterator<Item = Value>) -> Self {
        Value::Join(delimiter.into(), parts.into_iter().collect())
    }

    pub fn sub(template: impl Into<String>) -> Self {
        Value::Sub(template.into())
    }

    /// Availability zone by index in the current region
    pub fn availability_zone(index: usize) -> Self {
        Value::Select(index, Box::new(Value::GetAzs))
    }

    pub fn list(items: impl IntoIterator<Item = Value>) -> Self {
        Value::List(items.into_iter().collect())
    }

    pub fn map<K: Into<String>>(entries: impl IntoIterator<Item = (K, Value)>) -> Self {
        Value::Map(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    /// Looks up a key when this is a map
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Value::Map(map) => map.get(key),
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<&String> for Value {
    fn from(value: &String) -> Self {
        Value::String(value.clone())
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<u32> for Value {
    fn from(value: u32) -> Self {
        Value::Int(i64::from(value))
    }
}

impl From<u16> for Value {
    fn from(value: u16) -> Self {
        Value::Int(i64::from(value))
    }
}

impl From<Vec<Value>> for Value {
    fn from(value: Vec<Value>) -> Self {
        Value::List(value)
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::String(s) => serializer.serialize_str(s),
            Value::Int(i) => serializer.serialize_i64(*i),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Value::Map(entries) => {
                let mut map = serializer.serialize_map(Some(entries.len()))?;
                for (key, value) in entries {
                    map.serialize_entry(key, value)?;
                }
                map.end()
            }
            Value::Ref(id) => single_entry(serializer, "Ref", id),
            Value::GetAtt(id, attribute) => single_entry(serializer, "Fn::GetAtt", &(id, attribute)),
            Value::Join(delimiter, parts) => {
                single_entry(serializer, "Fn::Join", &(delimiter, parts))
            }
            Value::Select(index, value) => {
                single_entry(serializer, "Fn::Select", &(*index as u64, value.as_ref()))
            }
            Value::GetAzs => single_entry(serializer, "Fn::GetAZs", ""),
            Value::Sub(template) => single_entry(serializer, "Fn::Sub", template),
        }
    }
}

fn single_entry<S: Serializer, V: Serialize + ?Sized>(
    serializer: S,
    key: &str,
    value: &V,
) -> Result<S::Ok, S::Error> {
    let mut map = serializer.serialize_map(Some(1))?;
    map.serialize_entry(key, value)?;
    map.end()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_plain_values() {
        let value = Value::map([
            ("Name", Value::str("vpc")),
            ("Port", Value::from(5432u16)),
            ("Enabled", Value::from(true)),
        ]);
        assert_eq!(
            serde_json::to_value(&value).unwrap(),
            json!({ "Name": "vpc", "Port": 5432, "Enabled": true })
        );
    }

    #[test]
    fn test_intrinsics() {
        assert_eq!(
            serde_json::to_value(Value::reference("Vpc")).unwrap(),
            json!({ "Ref": "Vpc" })
        );
        assert_eq!(
            serde_json::to_value(Value::get_att("Db", "Endpoint.Address")).unwrap(),
            json!({ "Fn::GetAtt": ["Db", "Endpoint.Address"] })
        );
        assert_eq!(
            serde_json::to_value(Value::availability_zone(1)).unwrap(),
            json!({ "Fn::Select": [1, { "Fn::GetAZs": "" }] })
        );
        assert_eq!(
            serde_json::to_value(Value::join(",", [Value::str("a"), Value::reference("B")]))
                .unwrap(),
            json!({ "Fn::Join": [",", ["a", { "Ref": "B" }]] })
        );
    }

    #[test]
    fn test_map_lookup() {
        let value = Value::map([("Key", Value::str("name"))]);
        assert_eq!(value.get("Key").and_then(Value::as_str), Some("name"));
        assert!(Value::str("x").get("Key").is_none());
    }
}
