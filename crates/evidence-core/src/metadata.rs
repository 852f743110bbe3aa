//! Typed metadata values
//!
//! Free-form metadata returned by the compliance platform. A key that is
//! absent from the map and a key holding an explicit `null` stay distinct.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
    List(Vec<MetadataValue>),
    Map(BTreeMap<String, MetadataValue>),
}

impl MetadataValue {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl From<&str> for MetadataValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for MetadataValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for MetadataValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<bool> for MetadataValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

pub type Metadata = BTreeMap<String, MetadataValue>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_and_absent_are_distinct() {
        let yaml = "reviewer: ~\nqueue: audit\nattempts: 2\n";
        let meta: Metadata = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(meta.get("reviewer"), Some(&MetadataValue::Null));
        assert!(meta.get("missing").is_none());
        assert_eq!(meta.get("queue").and_then(|v| v.as_str()), Some("audit"));
        assert_eq!(meta.get("attempts"), Some(&MetadataValue::Integer(2)));
    }

    #[test]
    fn test_nested_values_parse() {
        let json = r#"{"tags":["a","b"],"extra":{"ok":true,"ratio":0.5}}"#;
        let meta: Metadata = serde_json::from_str(json).unwrap();
        assert_eq!(
            meta.get("tags"),
            Some(&MetadataValue::List(vec!["a".into(), "b".into()]))
        );
        let MetadataValue::Map(extra) = &meta["extra"] else {
            panic!("expected map");
        };
        assert_eq!(extra.get("ok"), Some(&MetadataValue::Bool(true)));
        assert_eq!(extra.get("ratio"), Some(&MetadataValue::Float(0.5)));
    }
}
