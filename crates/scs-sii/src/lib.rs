//! Front end for the SII configuration language.
//!
//! The pipeline is:
//!
//! 1. [`decode_text`] - strip `3nK` obfuscation and a UTF-8 BOM
//! 2. [`parse_sii`] - lex and parse into a [`cst::SiiFile`]
//! 3. [`materialize`] - fold the tree into nested [`SiiMap`]s
//! 4. [`Shape::validate`] - check the structure, listing every violation
//!
//! [`decode_records`] runs all four for the typed units in [`records`].
//!
//! # Example
//!
//! ```
//! use scs_common::Diagnostics;
//! use scs_sii::{decode_records, CityData};
//!
//! let text = br#"SiiNunit {
//! city_data : city.berlin {
//!     city_name: "Berlin"
//!     country: germany
//! }
//! }"#;
//! let cities: Vec<CityData> = decode_records(text, &mut Diagnostics::new())?;
//! assert_eq!(cities[0].name, "Berlin");
//! # Ok::<(), scs_sii::Error>(())
//! ```

pub mod cst;
mod decrypt;
mod error;
mod includes;
pub mod lexer;
mod materialize;
mod parser;
pub mod records;
mod shape;
mod value;
pub mod visitor;

pub use decrypt::{decode_text, decrypt_3nk, is_encrypted, MAGIC};
pub use error::{Error, LexError, ParseError, Result, Span, Violation, Violations};
pub use includes::{resolve_include, IncludeCollector};
pub use materialize::{camel_case, materialize, Materializer, MAX_SAFE_INTEGER};
pub use parser::{parse_sii, ParseOutcome};
pub use records::{
    decode_records, records_from, CityData, CompanyPermanent, CountryData, FerryData,
    LocalizationDb, PrefabModel, SiiRecord,
};
pub use shape::{ObjectShape, Shape};
pub use value::{SiiMap, SiiValue};
pub use visitor::Visitor;

/// Re-export for callers matching on [`SiiValue::BigInt`].
pub use num_bigint::BigInt;
