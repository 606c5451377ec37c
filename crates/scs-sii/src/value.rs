//! Materialized values.

use std::fmt;

use num_bigint::BigInt;

/// A materialized SII value.
#[derive(Debug, Clone, PartialEq)]
pub enum SiiValue {
    Nil,
    Bool(bool),
    Int(i64),
    Float(f64),
    /// Integers that do not fit in 53 bits.
    BigInt(BigInt),
    String(String),
    Array(Vec<SiiValue>),
    Object(SiiMap),
}

impl SiiValue {
    pub fn is_nil(&self) -> bool {
        matches!(self, SiiValue::Nil)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            SiiValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            SiiValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            SiiValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Any numeric value as a float. Big integers lose precision.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            SiiValue::Int(i) => Some(*i as f64),
            SiiValue::Float(f) => Some(*f),
            SiiValue::BigInt(b) => b.to_string().parse().ok(),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[SiiValue]> {
        match self {
            SiiValue::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&SiiMap> {
        match self {
            SiiValue::Object(map) => Some(map),
            _ => None,
        }
    }

    /// Short type name for messages.
    pub fn kind(&self) -> &'static str {
        match self {
            SiiValue::Nil => "nil",
            SiiValue::Bool(_) => "bool",
            SiiValue::Int(_) | SiiValue::BigInt(_) => "integer",
            SiiValue::Float(_) => "float",
            SiiValue::String(_) => "string",
            SiiValue::Array(_) => "array",
            SiiValue::Object(_) => "object",
        }
    }
}

impl fmt::Display for SiiValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SiiValue::Nil => f.write_str("nil"),
            SiiValue::Bool(b) => write!(f, "{b}"),
            SiiValue::Int(i) => write!(f, "{i}"),
            SiiValue::Float(x) => write!(f, "{x}"),
            SiiValue::BigInt(b) => write!(f, "{b}"),
            SiiValue::String(s) => write!(f, "{s:?}"),
            SiiValue::Array(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            SiiValue::Object(map) => write!(f, "{{{} keys}}", map.len()),
        }
    }
}

/// An insertion-ordered string map.
///
/// Objects are small, so lookups are linear.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SiiMap {
    entries: Vec<(String, SiiValue)>,
}

impl SiiMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace, keeping the original position on replace.
    pub fn insert(&mut self, key: impl Into<String>, value: SiiValue) -> Option<SiiValue> {
        let key = key.into();
        match self.get_mut(&key) {
            Some(slot) => Some(std::mem::replace(slot, value)),
            None => {
                self.entries.push((key, value));
                None
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<&SiiValue> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut SiiValue> {
        self.entries
            .iter_mut()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// The object stored under `key`, created empty if absent or not an object.
    pub fn object_mut(&mut self, key: &str) -> &mut SiiMap {
        let index = match self.entries.iter().position(|(k, _)| k == key) {
            Some(index) => {
                if !matches!(self.entries[index].1, SiiValue::Object(_)) {
                    self.entries[index].1 = SiiValue::Object(SiiMap::new());
                }
                index
            }
            None => {
                self.entries
                    .push((key.to_string(), SiiValue::Object(SiiMap::new())));
                self.entries.len() - 1
            }
        };
        match &mut self.entries[index].1 {
            SiiValue::Object(map) => map,
            _ => unreachable!("slot was just set to an object"),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &SiiValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(String, SiiValue)> for SiiMap {
    fn from_iter<I: IntoIterator<Item = (String, SiiValue)>>(iter: I) -> Self {
        let mut map = SiiMap::new();
        for (k, v) in iter {
            map.insert(k, v);
        }
        map
    }
}

#[cfg(feature = "serde")]
mod ser {
    use serde::ser::{Serialize, SerializeMap, Serializer};

    use super::{SiiMap, SiiValue};

    impl Serialize for SiiValue {
        fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
            match self {
                SiiValue::Nil => serializer.serialize_unit(),
                SiiValue::Bool(b) => serializer.serialize_bool(*b),
                SiiValue::Int(i) => serializer.serialize_i64(*i),
                SiiValue::Float(f) => serializer.serialize_f64(*f),
                // Decimal text keeps every digit in JSON.
                SiiValue::BigInt(b) => serializer.collect_str(b),
                SiiValue::String(s) => serializer.serialize_str(s),
                SiiValue::Array(items) => serializer.collect_seq(items),
                SiiValue::Object(map) => map.serialize(serializer),
            }
        }
    }

    impl Serialize for SiiMap {
        fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
            let mut map = serializer.serialize_map(Some(self.len()))?;
            for (k, v) in self.iter() {
                map.serialize_entry(k, v)?;
            }
            map.end()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_keeps_position() {
        let mut map = SiiMap::new();
        map.insert("a", SiiValue::Int(1));
        map.insert("b", SiiValue::Int(2));
        assert_eq!(map.insert("a", SiiValue::Int(3)), Some(SiiValue::Int(1)));
        assert_eq!(map.keys().collect::<Vec<_>>(), ["a", "b"]);
        assert_eq!(map.get("a"), Some(&SiiValue::Int(3)));
    }

    #[test]
    fn test_object_mut_creates_and_reuses() {
        let mut map = SiiMap::new();
        map.object_mut("city_data").insert("x", SiiValue::Nil);
        map.object_mut("city_data").insert("y", SiiValue::Nil);
        assert_eq!(map.len(), 1);
        assert_eq!(map.get("city_data").and_then(SiiValue::as_object).map(SiiMap::len), Some(2));
    }

    #[test]
    fn test_as_f64() {
        assert_eq!(SiiValue::Int(3).as_f64(), Some(3.0));
        assert_eq!(SiiValue::String("3".into()).as_f64(), None);
        assert_eq!(SiiValue::BigInt(BigInt::from(1u64 << 60)).as_f64(), Some((1u64 << 60) as f64));
    }
}
