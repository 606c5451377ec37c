//! Declarative binary structure codec.
//!
//! Binary formats are described as a tree of [`Layout`] values and decoded by
//! a single interpreter, [`decode`]. The result is a generic [`Value`] tree
//! that format crates convert into typed structs via [`Schema`].
//!
//! ```
//! use scs_struct::dsl::*;
//! use scs_struct::decode;
//!
//! let layout = strukt(vec![
//!     field("count", u8()),
//!     field("items", counted(u16(), "count")),
//! ]);
//! let value = decode(&layout, &[2, 1, 0, 2, 0]).unwrap();
//! let record = value.as_record().unwrap();
//! assert_eq!(record.u64s("items").unwrap(), vec![1, 2]);
//! ```

mod decode;
mod error;
mod layout;
mod schema;
mod value;

pub use decode::{decode, decode_from, decode_with, Context};
pub use error::{DecodeError, DecodeErrorKind, Result};
pub use layout::{
    dsl, Endian, Field, Layout, Length, OffsetSource, PointerBase, Predicate, Prim, PrimKind,
    StrLayout, Variant,
};
pub use schema::Schema;
pub use value::{Flags, Record, Value, VariantValue};
