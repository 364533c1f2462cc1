use std::fmt;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A single frontmatter value. YAML scalars, sequences and nested mappings
/// each get an explicit case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FrontmatterValue {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
    Sequence(Vec<FrontmatterValue>),
    Mapping(Frontmatter),
}

impl FrontmatterValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FrontmatterValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_sequence(&self) -> Option<&[FrontmatterValue]> {
        match self {
            FrontmatterValue::Sequence(items) => Some(items),
            _ => None,
        }
    }
}

impl From<&str> for FrontmatterValue {
    fn from(value: &str) -> Self {
        FrontmatterValue::String(value.to_string())
    }
}

impl From<String> for FrontmatterValue {
    fn from(value: String) -> Self {
        FrontmatterValue::String(value)
    }
}

impl From<bool> for FrontmatterValue {
    fn from(value: bool) -> Self {
        FrontmatterValue::Bool(value)
    }
}

impl From<i64> for FrontmatterValue {
    fn from(value: i64) -> Self {
        FrontmatterValue::Integer(value)
    }
}

impl From<f64> for FrontmatterValue {
    fn from(value: f64) -> Self {
        FrontmatterValue::Float(value)
    }
}

impl<T: Into<FrontmatterValue>> From<Vec<T>> for FrontmatterValue {
    fn from(items: Vec<T>) -> Self {
        FrontmatterValue::Sequence(items.into_iter().map(Into::into).collect())
    }
}

/// Frontmatter mapping. Keys keep the order in which they were inserted,
/// which is also the order they are written back to disk.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Frontmatter {
    entries: Vec<(String, FrontmatterValue)>,
}

impl Frontmatter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn get(&self, key: &str) -> Option<&FrontmatterValue> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Insert or replace `key`. A replaced key keeps its original position.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<FrontmatterValue>) -> Option<FrontmatterValue> {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, existing)) => Some(std::mem::replace(existing, value)),
            None => {
                self.entries.push((key, value));
                None
            }
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<FrontmatterValue> {
        let idx = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(idx).1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FrontmatterValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    /// Shallow key-wise merge: keys from `other` overwrite in place,
    /// unseen keys are appended in `other`'s order.
    pub fn merge(&mut self, other: Frontmatter) {
        for (key, value) in other.entries {
            self.insert(key, value);
        }
    }

    /// The `title` key, when it holds a string.
    pub fn title(&self) -> Option<&str> {
        self.get("title").and_then(FrontmatterValue::as_str)
    }
}

impl<K: Into<String>, V: Into<FrontmatterValue>> FromIterator<(K, V)> for Frontmatter {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut fm = Frontmatter::new();
        for (k, v) in iter {
            fm.insert(k, v);
        }
        fm
    }
}

impl Serialize for Frontmatter {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (k, v) in &self.entries {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Frontmatter {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct FrontmatterVisitor;

        impl<'de> Visitor<'de> for FrontmatterVisitor {
            type Value = Frontmatter;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a frontmatter mapping with string keys")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut fm = Frontmatter::new();
                while let Some((key, value)) = access.next_entry::<String, FrontmatterValue>()? {
                    fm.insert(key, value);
                }
                Ok(fm)
            }
        }

        deserializer.deserialize_map(FrontmatterVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_preserves_order_and_position() {
        let mut fm = Frontmatter::new();
        fm.insert("title", "Plan");
        fm.insert("tags", vec!["project", "urgent"]);
        fm.insert("draft", true);
        fm.insert("title", "Final Plan");

        let keys: Vec<&str> = fm.keys().collect();
        assert_eq!(keys, vec!["title", "tags", "draft"]);
        assert_eq!(fm.title(), Some("Final Plan"));
    }

    #[test]
    fn test_merge_overwrites_and_appends() {
        let mut fm: Frontmatter = vec![("title", "A"), ("status", "draft")].into_iter().collect();
        let update: Frontmatter = vec![("status", "done"), ("owner", "sam")].into_iter().collect();
        fm.merge(update);

        let pairs: Vec<(&str, Option<&str>)> = fm.iter().map(|(k, v)| (k, v.as_str())).collect();
        assert_eq!(
            pairs,
            vec![("title", Some("A")), ("status", Some("done")), ("owner", Some("sam"))]
        );
    }

    #[test]
    fn test_json_round_trip_keeps_variants() {
        let json = r#"{"title":"Note","count":3,"ratio":0.5,"done":false,"tags":["a","b"],"meta":{"nested":null}}"#;
        let fm: Frontmatter = serde_json::from_str(json).unwrap();

        assert_eq!(fm.get("count"), Some(&FrontmatterValue::Integer(3)));
        assert_eq!(fm.get("ratio"), Some(&FrontmatterValue::Float(0.5)));
        assert_eq!(fm.get("done"), Some(&FrontmatterValue::Bool(false)));
        match fm.get("meta") {
            Some(FrontmatterValue::Mapping(inner)) => {
                assert_eq!(inner.get("nested"), Some(&FrontmatterValue::Null))
            }
            other => panic!("expected nested mapping, got {:?}", other),
        }
        assert_eq!(serde_json::to_string(&fm).unwrap(), json);
    }
}
