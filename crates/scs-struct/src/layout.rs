//! Layout descriptors.
//!
//! A [`Layout`] describes the shape of some bytes. Formats are declared once
//! as a tree of layouts and decoded by [`crate::decode`]; nothing in this
//! module reads data.

use std::collections::BTreeMap;

use crate::decode::Context;

/// Byte order of a primitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endian {
    Little,
    Big,
}

/// Primitive numeric kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimKind {
    U8,
    U16,
    U24,
    U32,
    U64,
    I8,
    I16,
    I32,
    I64,
    F32,
    F64,
}

/// A fixed-width number with a declared byte order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Prim {
    pub kind: PrimKind,
    pub endian: Endian,
}

impl Prim {
    pub const U8: Prim = Prim::le(PrimKind::U8);
    pub const I8: Prim = Prim::le(PrimKind::I8);
    pub const U16_LE: Prim = Prim::le(PrimKind::U16);
    pub const U24_LE: Prim = Prim::le(PrimKind::U24);
    pub const U32_LE: Prim = Prim::le(PrimKind::U32);
    pub const U64_LE: Prim = Prim::le(PrimKind::U64);
    pub const I16_LE: Prim = Prim::le(PrimKind::I16);
    pub const I32_LE: Prim = Prim::le(PrimKind::I32);
    pub const I64_LE: Prim = Prim::le(PrimKind::I64);
    pub const F32_LE: Prim = Prim::le(PrimKind::F32);
    pub const F64_LE: Prim = Prim::le(PrimKind::F64);
    pub const U16_BE: Prim = Prim::be(PrimKind::U16);
    pub const U32_BE: Prim = Prim::be(PrimKind::U32);
    pub const U64_BE: Prim = Prim::be(PrimKind::U64);
    pub const F32_BE: Prim = Prim::be(PrimKind::F32);

    pub const fn le(kind: PrimKind) -> Self {
        Self {
            kind,
            endian: Endian::Little,
        }
    }

    pub const fn be(kind: PrimKind) -> Self {
        Self {
            kind,
            endian: Endian::Big,
        }
    }

    /// Width in bytes.
    pub const fn size(&self) -> usize {
        match self.kind {
            PrimKind::U8 | PrimKind::I8 => 1,
            PrimKind::U16 | PrimKind::I16 => 2,
            PrimKind::U24 => 3,
            PrimKind::U32 | PrimKind::I32 | PrimKind::F32 => 4,
            PrimKind::U64 | PrimKind::I64 | PrimKind::F64 => 8,
        }
    }

    pub const fn is_float(&self) -> bool {
        matches!(self.kind, PrimKind::F32 | PrimKind::F64)
    }
}

/// Where an array gets its element count from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Length {
    /// A constant count.
    Fixed(usize),
    /// An already decoded integer field, looked up through the context.
    Field(&'static str),
    /// A count read immediately before the elements.
    Prefixed(Prim),
}

/// Where a pointer gets its offset from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OffsetSource {
    /// An already decoded integer field.
    Field(&'static str),
    /// An offset read in place.
    Inline(Prim),
}

/// What a pointer offset is measured from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerBase {
    /// Start of the buffer being decoded.
    Absolute,
    /// Start of the enclosing struct.
    Struct,
}

/// String encodings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StrLayout {
    /// Byte length read first.
    Prefixed(Prim),
    /// Fixed-width buffer, trailing NUL bytes trimmed.
    Fixed(usize),
    /// Runs to a NUL byte.
    NulTerminated,
}

/// A condition evaluated against already decoded siblings.
pub type Predicate = fn(&Context<'_>) -> bool;

/// One named member of a struct.
#[derive(Debug, Clone)]
pub struct Field {
    pub name: &'static str,
    pub layout: Layout,
}

/// One alternative of a [`Layout::Versioned`].
#[derive(Debug, Clone)]
pub struct Variant {
    pub name: &'static str,
    pub fields: Vec<Field>,
}

/// A binary shape.
#[derive(Debug, Clone)]
pub enum Layout {
    Prim(Prim),
    Array {
        element: Box<Layout>,
        len: Length,
    },
    Struct(Vec<Field>),
    Pointer {
        offset: OffsetSource,
        base: PointerBase,
        target: Box<Layout>,
    },
    /// Named flags, bit 0 is the first name.
    Bitfield {
        int: Prim,
        names: Vec<&'static str>,
    },
    /// Tag, shared header fields, then the fields of the variant the tag selects.
    Versioned {
        tag: Prim,
        header: Vec<Field>,
        variants: BTreeMap<u64, Variant>,
    },
    Optional {
        inner: Box<Layout>,
        when: Predicate,
    },
    /// Skipped and discarded.
    Reserved {
        inner: Box<Layout>,
        count: usize,
    },
    /// Magic bytes that must match exactly; decodes to nothing.
    Magic(&'static [u8]),
    Str(StrLayout),
    /// Base-38 packed u64 identifier.
    Token,
    Bytes(Length),
    /// A layout resolved at decode time, for self-referential formats.
    Deferred(fn() -> &'static Layout),
}

impl Layout {
    /// Size in bytes if it does not depend on the data.
    pub fn fixed_size(&self) -> Option<usize> {
        match self {
            Layout::Prim(p) => Some(p.size()),
            Layout::Array {
                element,
                len: Length::Fixed(n),
            } => element.fixed_size().map(|s| s * n),
            Layout::Array { .. } => None,
            Layout::Struct(fields) => fields
                .iter()
                .try_fold(0usize, |acc, f| f.layout.fixed_size().map(|s| acc + s)),
            Layout::Pointer { offset, .. } => match offset {
                OffsetSource::Field(_) => Some(0),
                OffsetSource::Inline(p) => Some(p.size()),
            },
            Layout::Bitfield { int, .. } => Some(int.size()),
            Layout::Versioned { .. } | Layout::Optional { .. } => None,
            Layout::Reserved { inner, count } => inner.fixed_size().map(|s| s * count),
            Layout::Magic(bytes) => Some(bytes.len()),
            Layout::Str(StrLayout::Fixed(n)) => Some(*n),
            Layout::Str(_) => None,
            Layout::Token => Some(8),
            Layout::Bytes(Length::Fixed(n)) => Some(*n),
            Layout::Bytes(_) | Layout::Deferred(_) => None,
        }
    }

    /// Whether decoding this layout yields no value (it is only skipped or checked).
    pub fn is_discarded(&self) -> bool {
        matches!(self, Layout::Reserved { .. } | Layout::Magic(_))
    }
}

/// Builder helpers so schemas read as data.
pub mod dsl {
    use super::*;

    pub fn field(name: &'static str, layout: Layout) -> Field {
        Field { name, layout }
    }

    pub fn prim(p: Prim) -> Layout {
        Layout::Prim(p)
    }

    pub fn u8() -> Layout {
        Layout::Prim(Prim::U8)
    }

    pub fn i8() -> Layout {
        Layout::Prim(Prim::I8)
    }

    pub fn u16() -> Layout {
        Layout::Prim(Prim::U16_LE)
    }

    pub fn i16() -> Layout {
        Layout::Prim(Prim::I16_LE)
    }

    pub fn u24() -> Layout {
        Layout::Prim(Prim::U24_LE)
    }

    pub fn u32() -> Layout {
        Layout::Prim(Prim::U32_LE)
    }

    pub fn i32() -> Layout {
        Layout::Prim(Prim::I32_LE)
    }

    pub fn u64() -> Layout {
        Layout::Prim(Prim::U64_LE)
    }

    pub fn i64() -> Layout {
        Layout::Prim(Prim::I64_LE)
    }

    pub fn f32() -> Layout {
        Layout::Prim(Prim::F32_LE)
    }

    pub fn token() -> Layout {
        Layout::Token
    }

    /// `n` consecutive little-endian f32 values.
    pub fn floats(n: usize) -> Layout {
        fixed_array(f32(), n)
    }

    pub fn fixed_array(element: Layout, n: usize) -> Layout {
        Layout::Array {
            element: Box::new(element),
            len: Length::Fixed(n),
        }
    }

    /// Array whose length is an earlier field.
    pub fn counted(element: Layout, count_field: &'static str) -> Layout {
        Layout::Array {
            element: Box::new(element),
            len: Length::Field(count_field),
        }
    }

    /// Array preceded by its own count.
    pub fn prefixed(element: Layout, count: Prim) -> Layout {
        Layout::Array {
            element: Box::new(element),
            len: Length::Prefixed(count),
        }
    }

    pub fn strukt(fields: Vec<Field>) -> Layout {
        Layout::Struct(fields)
    }

    /// Decode `target` at the absolute offset held by an earlier field.
    pub fn pointer(offset_field: &'static str, target: Layout) -> Layout {
        Layout::Pointer {
            offset: OffsetSource::Field(offset_field),
            base: PointerBase::Absolute,
            target: Box::new(target),
        }
    }

    /// Read an offset in place and decode `target` relative to `base`.
    pub fn inline_pointer(offset: Prim, base: PointerBase, target: Layout) -> Layout {
        Layout::Pointer {
            offset: OffsetSource::Inline(offset),
            base,
            target: Box::new(target),
        }
    }

    pub fn bitfield(int: Prim, names: &[&'static str]) -> Layout {
        Layout::Bitfield {
            int,
            names: names.to_vec(),
        }
    }

    pub fn variant(tag: u64, name: &'static str, fields: Vec<Field>) -> (u64, Variant) {
        (tag, Variant { name, fields })
    }

    pub fn versioned(tag: Prim, header: Vec<Field>, variants: Vec<(u64, Variant)>) -> Layout {
        Layout::Versioned {
            tag,
            header,
            variants: variants.into_iter().collect(),
        }
    }

    pub fn optional(inner: Layout, when: Predicate) -> Layout {
        Layout::Optional {
            inner: Box::new(inner),
            when,
        }
    }

    pub fn reserved(inner: Layout, count: usize) -> Layout {
        Layout::Reserved {
            inner: Box::new(inner),
            count,
        }
    }

    pub fn magic(bytes: &'static [u8]) -> Layout {
        Layout::Magic(bytes)
    }

    pub fn string_prefixed(len: Prim) -> Layout {
        Layout::Str(StrLayout::Prefixed(len))
    }

    pub fn string_fixed(width: usize) -> Layout {
        Layout::Str(StrLayout::Fixed(width))
    }

    pub fn bytes(len: Length) -> Layout {
        Layout::Bytes(len)
    }

    /// Refer to a layout that may contain this one.
    pub fn deferred(layout: fn() -> &'static Layout) -> Layout {
        Layout::Deferred(layout)
    }
}

#[cfg(test)]
mod tests {
    use super::dsl::*;
    use super::*;

    #[test]
    fn test_fixed_sizes() {
        let entry = strukt(vec![
            field("hash", u64()),
            field("metadata_index", u32()),
            field("metadata_count", u16()),
            field("flags", bitfield(Prim::U8, &["is_directory"])),
            field("_", reserved(u8(), 1)),
        ]);
        assert_eq!(entry.fixed_size(), Some(16));

        assert_eq!(fixed_array(floats(3), 4).fixed_size(), Some(48));
        assert_eq!(counted(u32(), "count").fixed_size(), None);
        assert_eq!(string_fixed(12).fixed_size(), Some(12));
        assert_eq!(token().fixed_size(), Some(8));
        assert_eq!(pointer("offset", counted(u32(), "n")).fixed_size(), Some(0));
    }

    #[test]
    fn test_variable_members_poison_struct_size() {
        let layout = strukt(vec![
            field("count", u32()),
            field("items", counted(u32(), "count")),
        ]);
        assert_eq!(layout.fixed_size(), None);
    }
}
