//! Ordered document metadata extracted from front matter.

use std::fmt;

use indexmap::IndexMap;
use serde::ser::{Serialize, SerializeMap, Serializer};

/// A single metadata value. Mirrors the YAML data model, minus anchors and tags.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(untagged)]
pub enum MetaValue {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
    List(Vec<MetaValue>),
    Map(Metadata),
}

impl MetaValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(value) => Some(value),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Self::Null => true,
            Self::String(value) => value.is_empty(),
            Self::List(items) => items.is_empty(),
            Self::Map(map) => map.is_empty(),
            _ => false,
        }
    }
}

impl fmt::Display for MetaValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => Ok(()),
            Self::Bool(value) => write!(f, "{value}"),
            Self::Integer(value) => write!(f, "{value}"),
            Self::Float(value) => write!(f, "{value}"),
            Self::String(value) => f.write_str(value),
            Self::List(items) => {
                for (index, item) in items.iter().enumerate() {
                    if index > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                Ok(())
            }
            Self::Map(map) => {
                for (index, (key, value)) in map.iter().enumerate() {
                    if index > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{key}: {value}")?;
                }
                Ok(())
            }
        }
    }
}

impl From<&str> for MetaValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for MetaValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<serde_yaml_ng::Value> for MetaValue {
    fn from(value: serde_yaml_ng::Value) -> Self {
        use serde_yaml_ng::Value;

        match value {
            Value::Null => Self::Null,
            Value::Bool(flag) => Self::Bool(flag),
            Value::Number(number) => {
                if let Some(int) = number.as_i64() {
                    Self::Integer(int)
                } else if let Some(float) = number.as_f64() {
                    Self::Float(float)
                } else {
                    Self::String(number.to_string())
                }
            }
            Value::String(text) => Self::String(text),
            Value::Sequence(items) => Self::List(items.into_iter().map(Self::from).collect()),
            Value::Mapping(mapping) => Self::Map(Metadata::from_yaml_mapping(mapping)),
            Value::Tagged(tagged) => Self::from(tagged.value),
        }
    }
}

/// Insertion-ordered key/value mapping. Inserting an existing key replaces
/// its value in place.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Metadata {
    entries: IndexMap<String, MetaValue>,
}

impl Metadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: MetaValue) {
        self.entries.insert(key.into(), value);
    }

    pub fn get(&self, key: &str) -> Option<&MetaValue> {
        self.entries.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &MetaValue)> {
        self.entries.iter().map(|(key, value)| (key.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Builds metadata from a YAML mapping, stringifying non-string keys.
    pub fn from_yaml_mapping(mapping: serde_yaml_ng::Mapping) -> Self {
        let mut metadata = Self {
            entries: IndexMap::with_capacity(mapping.len()),
        };
        for (key, value) in mapping {
            let key = match key {
                serde_yaml_ng::Value::String(text) => text,
                other => MetaValue::from(other).to_string(),
            };
            metadata.insert(key, MetaValue::from(value));
        }
        metadata
    }
}

impl<K: Into<String>> FromIterator<(K, MetaValue)> for Metadata {
    fn from_iter<T: IntoIterator<Item = (K, MetaValue)>>(iter: T) -> Self {
        let mut metadata = Self::new();
        for (key, value) in iter {
            metadata.insert(key, value);
        }
        metadata
    }
}

impl IntoIterator for Metadata {
    type Item = (String, MetaValue);
    type IntoIter = indexmap::map::IntoIter<String, MetaValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl Serialize for Metadata {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, value) in &self.entries {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_replaces_existing_key_in_place() {
        let mut metadata = Metadata::new();
        metadata.insert("title", "First".into());
        metadata.insert("author", "Jane".into());
        metadata.insert("title", "Second".into());

        let keys: Vec<&str> = metadata.iter().map(|(key, _)| key).collect();
        assert_eq!(keys, ["title", "author"]);
        assert_eq!(metadata.get("title"), Some(&MetaValue::from("Second")));
    }

    #[test]
    fn yaml_mapping_keeps_document_order() {
        let yaml: serde_yaml_ng::Value =
            serde_yaml_ng::from_str("zeta: 1\nalpha: [a, b]\n7: seven\nnested:\n  x: 1.5\n")
                .unwrap();
        let serde_yaml_ng::Value::Mapping(mapping) = yaml else {
            panic!("expected mapping");
        };
        let metadata = Metadata::from_yaml_mapping(mapping);

        let keys: Vec<&str> = metadata.iter().map(|(key, _)| key).collect();
        assert_eq!(keys, ["zeta", "alpha", "7", "nested"]);
        assert_eq!(metadata.get("zeta"), Some(&MetaValue::Integer(1)));
        assert_eq!(metadata.get("alpha").unwrap().to_string(), "a, b");
        assert_eq!(metadata.get("nested").unwrap().to_string(), "x: 1.5");
    }

    #[test]
    fn serializes_as_ordered_json_object() {
        let metadata: Metadata = [
            ("title", MetaValue::from("Report")),
            ("draft", MetaValue::Bool(false)),
        ]
        .into_iter()
        .collect();

        let json = serde_json::to_string(&metadata).unwrap();
        assert_eq!(json, r#"{"title":"Report","draft":false}"#);
    }

    #[test]
    fn many_keys_build_and_look_up_in_linear_time() {
        let count = 200_000;
        let metadata: Metadata = (0..count)
            .map(|index| (format!("key_{index}"), MetaValue::Integer(index)))
            .collect();

        assert_eq!(metadata.len(), count as usize);
        assert_eq!(
            metadata.get("key_199999"),
            Some(&MetaValue::Integer(199_999))
        );
        assert_eq!(metadata.iter().next().map(|(key, _)| key), Some("key_0"));
    }
}
