//! Concrete syntax tree.
//!
//! Literals keep their source spelling; turning them into numbers is the
//! materializer's job.

use crate::error::Span;

/// A parsed document.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SiiFile {
    /// Whether the objects were wrapped in `SiiNunit { ... }`.
    pub wrapped: bool,
    pub items: Vec<Item>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Item {
    Include(Include),
    Object(Object),
    Property(Property),
}

/// `@include "path"`
#[derive(Debug, Clone, PartialEq)]
pub struct Include {
    pub path: String,
    pub span: Span,
}

/// `class : name { ... }`
#[derive(Debug, Clone, PartialEq)]
pub struct Object {
    pub class: String,
    pub name: String,
    pub body: Vec<Item>,
    pub span: Span,
}

/// `key: value` or `key[index]: value`
#[derive(Debug, Clone, PartialEq)]
pub struct Property {
    pub key: String,
    pub index: Option<Index>,
    pub value: PropertyValue,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Index {
    /// `key[]`
    Append,
    /// `key[n]`
    Explicit(u32),
}

#[derive(Debug, Clone, PartialEq)]
pub enum NumberLit {
    Decimal(String),
    /// Hex digits without the `0x`.
    Hex(String),
    BinaryFloat(u32),
}

#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    Nil,
    String(String),
    Number(NumberLit),
    Ident(String),
    /// `(a, b, c)`
    Tuple(Vec<NumberLit>),
    /// `(w; x, y, z)`, a quaternion.
    AuxTuple(Vec<NumberLit>),
    /// `(x, y, z) (w; x, y, z)`, a position followed by a rotation.
    Placement {
        position: Vec<NumberLit>,
        rotation: Vec<NumberLit>,
    },
}
