//! Binding layouts to Rust types.

use scs_common::BinaryReader;

use crate::decode::decode_from;
use crate::layout::Layout;
use crate::value::Value;
use crate::Result;

/// A Rust type with a declared binary layout.
///
/// Implementors build their layout once (typically in a `LazyLock`) and
/// convert the decoded [`Value`] into themselves.
pub trait Schema: Sized {
    /// The declared layout.
    fn layout() -> &'static Layout;

    /// Build `Self` from the value produced by decoding [`Schema::layout`].
    fn from_value(value: &Value) -> Result<Self>;

    /// Decode from the start of `data`.
    fn decode(data: &[u8]) -> Result<Self> {
        let mut reader = BinaryReader::new(data);
        Self::decode_from(&mut reader)
    }

    /// Decode at the reader's position, advancing it.
    fn decode_from(reader: &mut BinaryReader<'_>) -> Result<Self> {
        let value = decode_from(Self::layout(), reader)?;
        Self::from_value(&value)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::LazyLock;

    use super::*;
    use crate::layout::dsl::*;
    use crate::DecodeError;

    #[derive(Debug, PartialEq)]
    struct Point {
        x: f32,
        y: f32,
    }

    impl Schema for Point {
        fn layout() -> &'static Layout {
            static LAYOUT: LazyLock<Layout> =
                LazyLock::new(|| strukt(vec![field("x", f32()), field("y", f32())]));
            &LAYOUT
        }

        fn from_value(value: &Value) -> Result<Self> {
            let record = value
                .as_record()
                .ok_or_else(|| DecodeError::type_mismatch(0, "point", "a struct"))?;
            Ok(Point {
                x: record.f32("x")?,
                y: record.f32("y")?,
            })
        }
    }

    #[test]
    fn test_decode_consecutive_records() {
        let data: Vec<u8> = [1.0f32, 2.0, 3.0, 4.0]
            .iter()
            .flat_map(|f| f.to_le_bytes())
            .collect();
        let mut reader = BinaryReader::new(&data);
        assert_eq!(
            Point::decode_from(&mut reader).unwrap(),
            Point { x: 1.0, y: 2.0 }
        );
        assert_eq!(
            Point::decode_from(&mut reader).unwrap(),
            Point { x: 3.0, y: 4.0 }
        );
        assert!(reader.is_empty());
    }
}
