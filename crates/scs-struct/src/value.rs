//! Decoded values.
//!
//! The interpreter produces a generic [`Value`] tree. Format crates turn
//! these into typed Rust structs through the accessor helpers on [`Record`],
//! each of which reports the record's offset on failure.

use scs_common::Token;

use crate::{DecodeError, Result};

/// A decoded value.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize), serde(untagged))]
pub enum Value {
    UInt(u64),
    Int(i64),
    Float(f64),
    Str(String),
    Token(Token),
    Bytes(Vec<u8>),
    Array(Vec<Value>),
    Struct(Record),
    Flags(Flags),
    Variant(Box<VariantValue>),
    /// An optional member whose predicate was false.
    Absent,
}

impl Value {
    pub fn as_u64(&self) -> Option<u64> {
        match *self {
            Value::UInt(v) => Some(v),
            Value::Int(v) if v >= 0 => Some(v as u64),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Value::Int(v) => Some(v),
            Value::UInt(v) => i64::try_from(v).ok(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Value::Float(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&Record> {
        match self {
            Value::Struct(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_variant(&self) -> Option<&VariantValue> {
        match self {
            Value::Variant(v) => Some(v),
            _ => None,
        }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, Value::Absent)
    }
}

/// Named booleans decoded from an integer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Flags {
    pub bits: u64,
    pub names: Vec<&'static str>,
}

impl Flags {
    /// Whether the flag with this name is set. Unknown names are never set.
    pub fn get(&self, name: &str) -> bool {
        self.names
            .iter()
            .position(|n| *n == name)
            .map(|bit| self.bits & (1 << bit) != 0)
            .unwrap_or(false)
    }

    /// Names of all set flags, in bit order.
    pub fn set(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.names
            .iter()
            .enumerate()
            .filter(|(bit, _)| self.bits & (1 << bit) != 0)
            .map(|(_, name)| *name)
    }
}

/// The decoded variant of a versioned layout.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct VariantValue {
    pub tag: u64,
    pub name: &'static str,
    /// Shared header fields followed by the variant's own fields.
    pub record: Record,
}

/// A decoded struct: ordered named fields plus the offset it started at.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Record {
    offset: usize,
    fields: Vec<(&'static str, Value)>,
}

impl Record {
    pub fn new(offset: usize) -> Self {
        Self {
            offset,
            fields: Vec::new(),
        }
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn push(&mut self, name: &'static str, value: Value) {
        self.fields.push((name, value));
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields
            .iter()
            .rev()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| v)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&'static str, &Value)> {
        self.fields.iter().map(|(n, v)| (*n, v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    fn require(&self, name: &'static str) -> Result<&Value> {
        self.get(name)
            .ok_or_else(|| DecodeError::missing_field(self.offset, name))
    }

    fn mismatch(&self, name: &'static str, expected: &'static str) -> DecodeError {
        DecodeError::type_mismatch(self.offset, name, expected)
    }

    pub fn u64(&self, name: &'static str) -> Result<u64> {
        self.require(name)?
            .as_u64()
            .ok_or_else(|| self.mismatch(name, "an unsigned integer"))
    }

    pub fn u32(&self, name: &'static str) -> Result<u32> {
        u32::try_from(self.u64(name)?).map_err(|_| self.mismatch(name, "a u32"))
    }

    pub fn u16(&self, name: &'static str) -> Result<u16> {
        u16::try_from(self.u64(name)?).map_err(|_| self.mismatch(name, "a u16"))
    }

    pub fn u8(&self, name: &'static str) -> Result<u8> {
        u8::try_from(self.u64(name)?).map_err(|_| self.mismatch(name, "a u8"))
    }

    pub fn i64(&self, name: &'static str) -> Result<i64> {
        self.require(name)?
            .as_i64()
            .ok_or_else(|| self.mismatch(name, "a signed integer"))
    }

    pub fn i32(&self, name: &'static str) -> Result<i32> {
        i32::try_from(self.i64(name)?).map_err(|_| self.mismatch(name, "an i32"))
    }

    pub fn f32(&self, name: &'static str) -> Result<f32> {
        self.require(name)?
            .as_f64()
            .map(|v| v as f32)
            .ok_or_else(|| self.mismatch(name, "a float"))
    }

    pub fn token(&self, name: &'static str) -> Result<Token> {
        match self.require(name)? {
            Value::Token(t) => Ok(*t),
            _ => Err(self.mismatch(name, "a token")),
        }
    }

    pub fn str(&self, name: &'static str) -> Result<&str> {
        match self.require(name)? {
            Value::Str(s) => Ok(s),
            _ => Err(self.mismatch(name, "a string")),
        }
    }

    pub fn bytes(&self, name: &'static str) -> Result<&[u8]> {
        match self.require(name)? {
            Value::Bytes(b) => Ok(b),
            _ => Err(self.mismatch(name, "bytes")),
        }
    }

    pub fn record(&self, name: &'static str) -> Result<&Record> {
        self.require(name)?
            .as_record()
            .ok_or_else(|| self.mismatch(name, "a struct"))
    }

    pub fn array(&self, name: &'static str) -> Result<&[Value]> {
        self.require(name)?
            .as_array()
            .ok_or_else(|| self.mismatch(name, "an array"))
    }

    pub fn flags(&self, name: &'static str) -> Result<&Flags> {
        match self.require(name)? {
            Value::Flags(f) => Ok(f),
            _ => Err(self.mismatch(name, "a bitfield")),
        }
    }

    pub fn variant(&self, name: &'static str) -> Result<&VariantValue> {
        self.require(name)?
            .as_variant()
            .ok_or_else(|| self.mismatch(name, "a versioned struct"))
    }

    /// An optional member, `None` when its predicate was false.
    pub fn optional(&self, name: &'static str) -> Result<Option<&Value>> {
        let value = self.require(name)?;
        Ok(if value.is_absent() { None } else { Some(value) })
    }

    /// Every element of an array field as a record.
    pub fn records(&self, name: &'static str) -> Result<Vec<&Record>> {
        self.array(name)?
            .iter()
            .map(|v| v.as_record().ok_or_else(|| self.mismatch(name, "an array of structs")))
            .collect()
    }

    /// An array of unsigned integers.
    pub fn u64s(&self, name: &'static str) -> Result<Vec<u64>> {
        self.array(name)?
            .iter()
            .map(|v| v.as_u64().ok_or_else(|| self.mismatch(name, "an array of integers")))
            .collect()
    }

    /// An array of signed integers.
    pub fn i32s(&self, name: &'static str) -> Result<Vec<i32>> {
        self.array(name)?
            .iter()
            .map(|v| {
                v.as_i64()
                    .and_then(|i| i32::try_from(i).ok())
                    .ok_or_else(|| self.mismatch(name, "an array of i32"))
            })
            .collect()
    }

    /// An array of tokens.
    pub fn tokens(&self, name: &'static str) -> Result<Vec<Token>> {
        self.array(name)?
            .iter()
            .map(|v| match v {
                Value::Token(t) => Ok(*t),
                _ => Err(self.mismatch(name, "an array of tokens")),
            })
            .collect()
    }

    /// A fixed-length float array, e.g. a position or quaternion.
    pub fn floats<const N: usize>(&self, name: &'static str) -> Result<[f32; N]> {
        let items = self.array(name)?;
        if items.len() != N {
            return Err(self.mismatch(name, "a float array of the declared length"));
        }
        let mut out = [0f32; N];
        for (slot, item) in out.iter_mut().zip(items) {
            *slot = item
                .as_f64()
                .ok_or_else(|| self.mismatch(name, "a float array"))? as f32;
        }
        Ok(out)
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for Flags {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_seq(self.set())
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for Record {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_map(self.fields.iter().map(|(name, value)| (*name, value)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DecodeErrorKind;

    fn sample() -> Record {
        let mut r = Record::new(40);
        r.push("count", Value::UInt(3));
        r.push("delta", Value::Int(-2));
        r.push("pos", Value::Array(vec![Value::Float(1.0), Value::Float(2.5)]));
        r.push(
            "flags",
            Value::Flags(Flags {
                bits: 0b10,
                names: vec!["a", "b"],
            }),
        );
        r
    }

    #[test]
    fn test_typed_accessors() {
        let r = sample();
        assert_eq!(r.u32("count").unwrap(), 3);
        assert_eq!(r.i32("delta").unwrap(), -2);
        assert_eq!(r.floats::<2>("pos").unwrap(), [1.0, 2.5]);
        assert!(r.flags("flags").unwrap().get("b"));
        assert!(!r.flags("flags").unwrap().get("a"));
    }

    #[test]
    fn test_errors_carry_record_offset() {
        let r = sample();
        let err = r.u32("missing").unwrap_err();
        assert_eq!(err.offset, 40);
        assert_eq!(err.kind, DecodeErrorKind::MissingField { name: "missing" });

        let err = r.u32("delta").unwrap_err();
        assert!(matches!(err.kind, DecodeErrorKind::TypeMismatch { .. }));
        assert!(r.floats::<3>("pos").is_err());
    }
}
