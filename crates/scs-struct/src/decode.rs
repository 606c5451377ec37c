//! The layout interpreter.

use byteorder::{BigEndian, LittleEndian};
use scs_common::{BinaryReader, Token};

use crate::layout::{
    Endian, Field, Layout, Length, OffsetSource, PointerBase, Prim, PrimKind, StrLayout,
};
use crate::value::{Flags, Record, Value, VariantValue};
use crate::{DecodeError, DecodeErrorKind, Result};

/// Read-only view of what has been decoded so far.
///
/// Each struct being decoded contributes one level: its partially filled
/// record and its start offset. Lookups walk outward, so a field inside a
/// nested struct or a pointer target can see counts declared by an
/// enclosing header.
#[derive(Debug, Clone, Copy)]
pub struct Context<'a> {
    record: &'a Record,
    start: usize,
    parent: Option<&'a Context<'a>>,
}

impl<'a> Context<'a> {
    pub fn new(record: &'a Record, start: usize, parent: Option<&'a Context<'a>>) -> Self {
        Self {
            record,
            start,
            parent,
        }
    }

    /// Look up a field in the innermost struct that has it.
    pub fn lookup(&self, name: &str) -> Option<&'a Value> {
        let mut ctx = Some(self);
        while let Some(c) = ctx {
            if let Some(v) = c.record.get(name) {
                return Some(v);
            }
            ctx = c.parent;
        }
        None
    }

    /// An integer field, if present.
    pub fn int(&self, name: &str) -> Option<u64> {
        self.lookup(name).and_then(Value::as_u64)
    }

    /// Start offset of the innermost struct.
    pub fn start(&self) -> usize {
        self.start
    }
}

/// Decode `layout` from the start of `data`.
pub fn decode(layout: &Layout, data: &[u8]) -> Result<Value> {
    let mut reader = BinaryReader::new(data);
    decode_from(layout, &mut reader)
}

/// Decode `layout` at the reader's current position.
pub fn decode_from(layout: &Layout, reader: &mut BinaryReader<'_>) -> Result<Value> {
    let root = Record::new(reader.position());
    let ctx = Context::new(&root, reader.position(), None);
    decode_with(layout, reader, &ctx)
}

/// Decode `layout` with an explicit outer context.
pub fn decode_with(layout: &Layout, reader: &mut BinaryReader<'_>, ctx: &Context<'_>) -> Result<Value> {
    match layout {
        Layout::Prim(p) => read_prim(reader, *p),
        Layout::Array { element, len } => {
            let offset = reader.position();
            let count = resolve_length(len, reader, ctx)?;
            decode_array(element, count, offset, reader, ctx)
        }
        Layout::Struct(fields) => {
            let start = reader.position();
            decode_fields(fields, Record::new(start), start, reader, ctx).map(Value::Struct)
        }
        Layout::Pointer {
            offset,
            base,
            target,
        } => decode_pointer(offset, *base, target, reader, ctx),
        Layout::Bitfield { int, names } => {
            let start = reader.position();
            let Value::UInt(bits) = read_prim(reader, *int)? else {
                return Err(DecodeError::type_mismatch(start, "bitfield", "an unsigned integer"));
            };
            Ok(Value::Flags(Flags {
                bits,
                names: names.clone(),
            }))
        }
        Layout::Versioned {
            tag,
            header,
            variants,
        } => {
            let start = reader.position();
            let tag_value = read_prim(reader, *tag)?
                .as_u64()
                .ok_or_else(|| DecodeError::type_mismatch(start, "tag", "an unsigned integer"))?;
            let variant = variants
                .get(&tag_value)
                .ok_or_else(|| DecodeError::unknown_variant(start, tag_value))?;
            let record = decode_fields(header, Record::new(start), start, reader, ctx)?;
            let record = decode_fields(&variant.fields, record, start, reader, ctx)?;
            Ok(Value::Variant(Box::new(VariantValue {
                tag: tag_value,
                name: variant.name,
                record,
            })))
        }
        Layout::Optional { inner, when } => {
            if when(ctx) {
                decode_with(inner, reader, ctx)
            } else {
                Ok(Value::Absent)
            }
        }
        Layout::Reserved { inner, count } => {
            match inner.fixed_size() {
                Some(size) => {
                    reader.read_bytes(size * count)?;
                }
                None => {
                    for _ in 0..*count {
                        decode_with(inner, reader, ctx)?;
                    }
                }
            }
            Ok(Value::Absent)
        }
        Layout::Magic(expected) => {
            reader.expect_magic(expected)?;
            Ok(Value::Absent)
        }
        Layout::Str(s) => read_str(s, reader, ctx),
        Layout::Token => Ok(Value::Token(Token(reader.read_u64()?))),
        Layout::Bytes(len) => {
            let count = resolve_length(len, reader, ctx)?;
            Ok(Value::Bytes(reader.read_bytes(count)?.to_vec()))
        }
        Layout::Deferred(resolve) => decode_with(resolve(), reader, ctx),
    }
}

fn decode_fields(
    fields: &[Field],
    mut record: Record,
    start: usize,
    reader: &mut BinaryReader<'_>,
    parent: &Context<'_>,
) -> Result<Record> {
    for field in fields {
        let value = {
            let ctx = Context::new(&record, start, Some(parent));
            decode_with(&field.layout, reader, &ctx)?
        };
        if !field.layout.is_discarded() {
            record.push(field.name, value);
        }
    }
    Ok(record)
}

fn decode_array(
    element: &Layout,
    count: usize,
    offset: usize,
    reader: &mut BinaryReader<'_>,
    ctx: &Context<'_>,
) -> Result<Value> {
    // A corrupt count must not turn into a huge allocation.
    if let Some(size) = element.fixed_size() {
        let needed = size.saturating_mul(count);
        if needed > reader.remaining() {
            return Err(DecodeError::new(
                offset,
                DecodeErrorKind::Eof {
                    needed,
                    available: reader.remaining(),
                },
            ));
        }
    }
    let capacity = count.min(reader.remaining().max(1));
    let mut items = Vec::with_capacity(capacity);
    for _ in 0..count {
        items.push(decode_with(element, reader, ctx)?);
    }
    Ok(Value::Array(items))
}

fn decode_pointer(
    offset: &OffsetSource,
    base: PointerBase,
    target: &Layout,
    reader: &mut BinaryReader<'_>,
    ctx: &Context<'_>,
) -> Result<Value> {
    let at = reader.position();
    let raw = match offset {
        OffsetSource::Field(name) => ctx
            .int(name)
            .ok_or_else(|| DecodeError::missing_field(at, name))?,
        OffsetSource::Inline(p) => read_prim(reader, *p)?
            .as_u64()
            .ok_or_else(|| DecodeError::type_mismatch(at, "offset", "an unsigned integer"))?,
    };
    let origin = match base {
        PointerBase::Absolute => 0,
        PointerBase::Struct => ctx.start() as u64,
    };
    let target_offset = origin.saturating_add(raw);
    if target_offset > reader.len() as u64 {
        return Err(DecodeError::new(
            at,
            DecodeErrorKind::OffsetOutOfBounds {
                target: target_offset,
            },
        ));
    }

    let resume = reader.position();
    reader.seek(target_offset as usize);
    let value = decode_with(target, reader, ctx);
    reader.seek(resume);
    value
}

fn resolve_length(len: &Length, reader: &mut BinaryReader<'_>, ctx: &Context<'_>) -> Result<usize> {
    let at = reader.position();
    let count = match len {
        Length::Fixed(n) => return Ok(*n),
        Length::Field(name) => ctx
            .int(name)
            .ok_or_else(|| DecodeError::missing_field(at, name))?,
        Length::Prefixed(p) => read_prim(reader, *p)?
            .as_u64()
            .ok_or_else(|| DecodeError::type_mismatch(at, "length", "an unsigned integer"))?,
    };
    usize::try_from(count).map_err(|_| {
        DecodeError::new(
            at,
            DecodeErrorKind::Eof {
                needed: usize::MAX,
                available: reader.remaining(),
            },
        )
    })
}

fn read_str(layout: &StrLayout, reader: &mut BinaryReader<'_>, ctx: &Context<'_>) -> Result<Value> {
    let text = match layout {
        StrLayout::Prefixed(p) => {
            let len = resolve_length(&Length::Prefixed(*p), reader, ctx)?;
            reader.read_string(len)?
        }
        StrLayout::Fixed(width) => reader.read_string_in_buffer(*width)?,
        StrLayout::NulTerminated => reader.read_cstring()?,
    };
    Ok(Value::Str(text.to_string()))
}

fn read_prim(reader: &mut BinaryReader<'_>, prim: Prim) -> Result<Value> {
    macro_rules! endian {
        ($method:ident) => {
            match prim.endian {
                Endian::Little => reader.$method::<LittleEndian>()?,
                Endian::Big => reader.$method::<BigEndian>()?,
            }
        };
    }

    Ok(match prim.kind {
        PrimKind::U8 => Value::UInt(reader.read_u8()? as u64),
        PrimKind::I8 => Value::Int(reader.read_i8()? as i64),
        PrimKind::U16 => Value::UInt(endian!(read_u16_as) as u64),
        PrimKind::U24 => Value::UInt(endian!(read_u24_as) as u64),
        PrimKind::U32 => Value::UInt(endian!(read_u32_as) as u64),
        PrimKind::U64 => Value::UInt(endian!(read_u64_as)),
        PrimKind::I16 => Value::Int(endian!(read_i16_as) as i64),
        PrimKind::I32 => Value::Int(endian!(read_i32_as) as i64),
        PrimKind::I64 => Value::Int(endian!(read_i64_as)),
        PrimKind::F32 => Value::Float(endian!(read_f32_as) as f64),
        PrimKind::F64 => Value::Float(endian!(read_f64_as)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::dsl::*;

    fn bytes(parts: &[&[u8]]) -> Vec<u8> {
        parts.concat()
    }

    #[test]
    fn test_struct_with_counted_array() {
        let layout = strukt(vec![
            field("count", u16()),
            field("items", counted(u32(), "count")),
            field("tail", u8()),
        ]);
        let data = bytes(&[&2u16.to_le_bytes(), &7u32.to_le_bytes(), &9u32.to_le_bytes(), &[0xAA]]);

        let value = decode(&layout, &data).unwrap();
        let record = value.as_record().unwrap();
        assert_eq!(record.u64s("items").unwrap(), vec![7, 9]);
        assert_eq!(record.u8("tail").unwrap(), 0xAA);
    }

    #[test]
    fn test_pointer_restores_cursor_and_sees_header() {
        // header: count, offset, then a trailing marker; payload lives at the offset
        let layout = strukt(vec![
            field("count", u32()),
            field("offset", u32()),
            field("items", pointer("offset", counted(u16(), "count"))),
            field("marker", u8()),
        ]);
        let data = bytes(&[
            &2u32.to_le_bytes(),
            &9u32.to_le_bytes(),
            &[0x55],
            &1u16.to_le_bytes(),
            &2u16.to_le_bytes(),
        ]);

        let record = decode(&layout, &data).unwrap();
        let record = record.as_record().unwrap();
        assert_eq!(record.u64s("items").unwrap(), vec![1, 2]);
        assert_eq!(record.u8("marker").unwrap(), 0x55);
    }

    #[test]
    fn test_pointer_out_of_bounds() {
        let layout = strukt(vec![
            field("offset", u32()),
            field("value", pointer("offset", u32())),
        ]);
        let err = decode(&layout, &100u32.to_le_bytes()).unwrap_err();
        assert_eq!(err.kind, DecodeErrorKind::OffsetOutOfBounds { target: 100 });
    }

    #[test]
    fn test_inline_relative_pointer() {
        let layout = strukt(vec![
            field("pad", u8()),
            field(
                "value",
                inline_pointer(Prim::U8, PointerBase::Struct, u8()),
            ),
        ]);
        let data = [0x00, 0x03, 0xFF, 0x42];
        let record = decode(&layout, &data).unwrap();
        assert_eq!(record.as_record().unwrap().u8("value").unwrap(), 0x42);
    }

    #[test]
    fn test_signed_bitfield_is_rejected() {
        let err = decode(&bitfield(Prim::I8, &["flag"]), &[0xFF]).unwrap_err();
        assert_eq!(err.offset, 0);
        assert_eq!(
            err.kind,
            DecodeErrorKind::TypeMismatch {
                name: "bitfield",
                expected: "an unsigned integer"
            }
        );
    }

    #[test]
    fn test_bitfield_bit_zero_is_first_name() {
        let layout = bitfield(Prim::U8, &["is_directory", "reserved"]);
        let Value::Flags(flags) = decode(&layout, &[0x01]).unwrap() else {
            panic!("expected flags");
        };
        assert!(flags.get("is_directory"));
        assert!(!flags.get("reserved"));
        assert_eq!(flags.set().collect::<Vec<_>>(), vec!["is_directory"]);
    }

    #[test]
    fn test_versioned_header_then_variant() {
        let layout = versioned(
            Prim::U32_LE,
            vec![field("uid", u64())],
            vec![
                variant(1, "one", vec![field("a", u8())]),
                variant(2, "two", vec![field("b", u16())]),
            ],
        );
        let data = bytes(&[&2u32.to_le_bytes(), &77u64.to_le_bytes(), &513u16.to_le_bytes()]);
        let value = decode(&layout, &data).unwrap();
        let variant = value.as_variant().unwrap();
        assert_eq!(variant.tag, 2);
        assert_eq!(variant.name, "two");
        assert_eq!(variant.record.u64("uid").unwrap(), 77);
        assert_eq!(variant.record.u16("b").unwrap(), 513);
    }

    #[test]
    fn test_versioned_unknown_tag() {
        let layout = versioned(Prim::U8, vec![], vec![variant(1, "one", vec![])]);
        let err = decode(&layout, &[0x00, 0x09]).map(|_| ()).unwrap_err();
        // tag 0 is read at offset 0
        assert_eq!(err, DecodeError::unknown_variant(0, 0));
    }

    #[test]
    fn test_optional_depends_on_sibling() {
        fn has_extra(ctx: &Context<'_>) -> bool {
            ctx.int("version").unwrap_or(0) >= 24
        }
        let layout = strukt(vec![
            field("version", u32()),
            field("extra", optional(u8(), has_extra)),
        ]);

        let old = decode(&layout, &23u32.to_le_bytes()).unwrap();
        assert!(old.as_record().unwrap().optional("extra").unwrap().is_none());

        let new = decode(&layout, &bytes(&[&24u32.to_le_bytes(), &[5]])).unwrap();
        assert_eq!(
            new.as_record().unwrap().optional("extra").unwrap(),
            Some(&Value::UInt(5))
        );
    }

    #[test]
    fn test_reserved_and_magic_are_dropped() {
        let layout = strukt(vec![
            field("magic", magic(b"Pmg")),
            field("_pad", reserved(u32(), 2)),
            field("value", u8()),
        ]);
        let data = bytes(&[b"Pmg", &[0; 8], &[3]]);
        let record = decode(&layout, &data).unwrap();
        let record = record.as_record().unwrap();
        assert_eq!(record.len(), 1);
        assert_eq!(record.u8("value").unwrap(), 3);

        let err = decode(&layout, b"Pmx").unwrap_err();
        assert!(matches!(err.kind, DecodeErrorKind::InvalidMagic { .. }));
    }

    #[test]
    fn test_strings_and_tokens() {
        let layout = strukt(vec![
            field("name", string_prefixed(Prim::U8)),
            field("fixed", string_fixed(6)),
            field("token", token()),
        ]);
        let token = Token::encode("road").unwrap();
        let data = bytes(&[&[3], b"abc", b"ab\0\0\0\0", &token.value().to_le_bytes()]);
        let record = decode(&layout, &data).unwrap();
        let record = record.as_record().unwrap();
        assert_eq!(record.str("name").unwrap(), "abc");
        assert_eq!(record.str("fixed").unwrap(), "ab");
        assert_eq!(record.token("token").unwrap().to_string(), "road");
    }

    #[test]
    fn test_short_data_reports_offset() {
        let layout = strukt(vec![field("a", u32()), field("b", u64())]);
        let err = decode(&layout, &[0u8; 6]).unwrap_err();
        assert_eq!(err.offset, 4);
        assert!(matches!(err.kind, DecodeErrorKind::Eof { needed: 8, .. }));
    }

    #[test]
    fn test_huge_count_fails_before_allocating() {
        let layout = prefixed(u64(), Prim::U32_LE);
        let err = decode(&layout, &u32::MAX.to_le_bytes()).unwrap_err();
        assert_eq!(err.offset, 0);
        assert!(matches!(err.kind, DecodeErrorKind::Eof { .. }));
    }

    #[test]
    fn test_deferred_recursion() {
        use std::sync::LazyLock;

        fn tree() -> &'static Layout {
            static TREE: LazyLock<Layout> = LazyLock::new(|| {
                strukt(vec![
                    field("id", u8()),
                    field("children", prefixed(deferred(tree), Prim::U8)),
                ])
            });
            &TREE
        }

        // 1 { 2 {}, 3 {} }
        let data = [1, 2, 2, 0, 3, 0];
        let root = decode(tree(), &data).unwrap();
        let root = root.as_record().unwrap();
        let ids: Vec<u8> = root
            .records("children")
            .unwrap()
            .iter()
            .map(|c| c.u8("id").unwrap())
            .collect();
        assert_eq!(ids, vec![2, 3]);
    }

    #[test]
    fn test_big_endian_float() {
        let value = decode(&prim(Prim::F32_BE), &[0xc7, 0x2b, 0xb4, 0x52]).unwrap();
        let expected = f32::from_bits(0xc72bb452) as f64;
        assert_eq!(value, Value::Float(expected));
    }

    proptest::proptest! {
        #[test]
        fn test_prefixed_array_and_truncation(
            values in proptest::collection::vec(proptest::num::u32::ANY, 0..64),
            cut in 1usize..8,
        ) {
            let layout = strukt(vec![field("items", prefixed(u32(), Prim::U32_LE))]);
            let mut data = (values.len() as u32).to_le_bytes().to_vec();
            for v in &values {
                data.extend_from_slice(&v.to_le_bytes());
            }

            let value = decode(&layout, &data).unwrap();
            let items = value.as_record().unwrap().u64s("items").unwrap();
            let expected: Vec<u64> = values.iter().map(|&v| v as u64).collect();
            proptest::prop_assert_eq!(items, expected);

            let short = &data[..data.len().saturating_sub(cut)];
            proptest::prop_assert!(decode(&layout, short).is_err());
        }
    }
}
