//! Index key patterns and index descriptions.

use crate::{Error, Result};
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::fmt;

/// Direction or type of one indexed field.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum KeyDirection {
    Ascending,
    Descending,
    /// Non-ordered index types such as `"hashed"` or `"text"`.
    Special(String),
}

impl KeyDirection {
    /// Interprets the value stored for a field in a key pattern.
    ///
    /// Numeric values compare by sign, so `1`, `1.0` and `NumberLong(1)`
    /// rendered as `1` are all ascending.
    pub fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Number(n) => match n.as_f64() {
                Some(v) if v > 0.0 => Ok(Self::Ascending),
                Some(v) if v < 0.0 => Ok(Self::Descending),
                _ => Err(Error::InvalidKeyPattern(format!(
                    "direction must be non-zero, got {n}"
                ))),
            },
            Value::String(s) => Ok(Self::Special(s.clone())),
            other => Err(Error::InvalidKeyPattern(format!(
                "unsupported direction {other}"
            ))),
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            Self::Ascending => Value::from(1),
            Self::Descending => Value::from(-1),
            Self::Special(s) => Value::from(s.clone()),
        }
    }
}

/// One `field: direction` entry of a key pattern.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IndexKey {
    pub field: String,
    pub direction: KeyDirection,
}

/// Ordered list of indexed fields, e.g. `{a: 1}`.
///
/// Equality is positional: `{a: 1, b: 1}` and `{b: 1, a: 1}` differ.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct KeyPattern {
    keys: Vec<IndexKey>,
}

impl KeyPattern {
    pub fn new(keys: Vec<IndexKey>) -> Self {
        Self { keys }
    }

    /// Single-field ascending pattern.
    pub fn ascending(field: impl Into<String>) -> Self {
        Self {
            keys: vec![IndexKey {
                field: field.into(),
                direction: KeyDirection::Ascending,
            }],
        }
    }

    pub fn keys(&self) -> &[IndexKey] {
        &self.keys
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Default index name the store derives from a pattern (`a_1`, `a_-1_b_1`).
    pub fn default_index_name(&self) -> String {
        self.keys
            .iter()
            .map(|k| match &k.direction {
                KeyDirection::Ascending => format!("{}_1", k.field),
                KeyDirection::Descending => format!("{}_-1", k.field),
                KeyDirection::Special(kind) => format!("{}_{kind}", k.field),
            })
            .collect::<Vec<_>>()
            .join("_")
    }

    /// Renders the pattern as a JSON object with field order preserved.
    pub fn to_json(&self) -> Value {
        let mut map = Map::new();
        for key in &self.keys {
            map.insert(key.field.clone(), key.direction.to_value());
        }
        Value::Object(map)
    }
}

impl fmt::Display for KeyPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, key) in self.keys.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}: {}", key.field, key.direction.to_value())?;
        }
        f.write_str("}")
    }
}

impl Serialize for KeyPattern {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.keys.len()))?;
        for key in &self.keys {
            map.serialize_entry(&key.field, &key.direction.to_value())?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for KeyPattern {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct PatternVisitor;

        impl<'de> Visitor<'de> for PatternVisitor {
            type Value = KeyPattern;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("an index key pattern object")
            }

            // Entries arrive in document order, which is what the store indexes by.
            fn visit_map<A: MapAccess<'de>>(
                self,
                mut access: A,
            ) -> std::result::Result<KeyPattern, A::Error> {
                let mut keys = Vec::new();
                while let Some((field, value)) = access.next_entry::<String, Value>()? {
                    let direction =
                        KeyDirection::from_value(&value).map_err(serde::de::Error::custom)?;
                    keys.push(IndexKey { field, direction });
                }
                Ok(KeyPattern { keys })
            }
        }

        deserializer.deserialize_map(PatternVisitor)
    }
}

/// An index as reported by `listIndexes`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexSpec {
    pub name: String,
    pub key: KeyPattern,
    /// Remaining index options (`v`, `ns`, `unique`, ...).
    #[serde(flatten)]
    pub options: Map<String, Value>,
}

impl IndexSpec {
    pub fn new(key: KeyPattern) -> Self {
        Self {
            name: key.default_index_name(),
            key,
            options: Map::new(),
        }
    }
}

/// Finds the index whose key pattern equals `pattern`, ignoring name and options.
pub fn find_by_key_pattern<'a>(
    indexes: &'a [IndexSpec],
    pattern: &KeyPattern,
) -> Option<&'a IndexSpec> {
    indexes.iter().find(|index| &index.key == pattern)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use test_case::test_case;

    #[test_case(json!(1), KeyDirection::Ascending; "int ascending")]
    #[test_case(json!(1.0), KeyDirection::Ascending; "double ascending")]
    #[test_case(json!(-1), KeyDirection::Descending; "descending")]
    #[test_case(json!("hashed"), KeyDirection::Special("hashed".into()); "hashed")]
    fn direction_from_value(value: Value, expected: KeyDirection) {
        assert_eq!(KeyDirection::from_value(&value).unwrap(), expected);
    }

    #[test]
    fn zero_direction_is_rejected() {
        assert!(KeyDirection::from_value(&json!(0)).is_err());
    }

    #[test]
    fn list_indexes_reply_parses() {
        let raw = json!([
            {"v": 2, "key": {"_id": 1}, "name": "_id_", "ns": "test.four_zero"},
            {"v": 2, "key": {"a": 1.0}, "name": "a_1", "ns": "test.four_zero"}
        ]);
        let indexes: Vec<IndexSpec> = serde_json::from_value(raw).unwrap();

        assert_eq!(indexes.len(), 2);
        assert_eq!(indexes[1].options.get("ns"), Some(&json!("test.four_zero")));

        let found = find_by_key_pattern(&indexes, &KeyPattern::ascending("a")).unwrap();
        assert_eq!(found.name, "a_1");
    }

    #[test]
    fn match_ignores_name_and_options() {
        let mut spec = IndexSpec::new(KeyPattern::ascending("a"));
        spec.name = "custom".into();
        spec.options.insert("unique".into(), json!(true));

        assert!(find_by_key_pattern(&[spec], &KeyPattern::ascending("a")).is_some());
    }

    #[test]
    fn match_respects_field_order() {
        let ab: KeyPattern = serde_json::from_value(json!({"a": 1, "b": 1})).unwrap();
        let ba: KeyPattern = serde_json::from_value(json!({"b": 1, "a": 1})).unwrap();

        assert_ne!(ab, ba);
        assert_eq!(ab.default_index_name(), "a_1_b_1");
    }

    #[test]
    fn descending_does_not_match_ascending() {
        let desc: KeyPattern = serde_json::from_value(json!({"a": -1})).unwrap();
        let indexes = vec![IndexSpec::new(desc)];

        assert!(find_by_key_pattern(&indexes, &KeyPattern::ascending("a")).is_none());
    }

    #[test]
    fn display_renders_pattern() {
        assert_eq!(KeyPattern::ascending("a").to_string(), "{a: 1}");
    }
}
