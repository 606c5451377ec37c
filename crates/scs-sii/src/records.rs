//! Typed decoders for known SII units.
//!
//! Each decoder runs the full pipeline: decrypt, parse, materialize,
//! validate against the record's [`Shape`], then convert.

use std::sync::LazyLock;

use regex::Regex;
use scs_common::{Diagnostics, Token};

use crate::decrypt::decode_text;
use crate::error::{Error, Result, Violation, Violations};
use crate::materialize::materialize;
use crate::parser::parse_sii;
use crate::shape::Shape;
use crate::value::{SiiMap, SiiValue};

static TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9_]{1,12}$").expect("token pattern"));

fn unit_name(prefix: &str) -> Shape {
    let pattern = format!(r"^{}[a-z0-9_]{{1,12}}$", regex::escape(prefix));
    match Regex::new(&pattern) {
        Ok(re) => Shape::Pattern(re),
        Err(_) => Shape::String,
    }
}

/// A unit class with a fixed layout.
pub trait SiiRecord: Sized {
    /// Class name as written in the file, e.g. `city_data`.
    const CLASS: &'static str;

    /// Shape of the unit name.
    fn name_shape() -> Shape {
        Shape::String
    }

    /// Shape of the unit's properties.
    fn shape() -> Shape;

    /// Convert a validated unit.
    fn from_object(name: &str, props: &SiiMap) -> Result<Self>;
}

/// Decode every `T` unit in a file's raw bytes.
///
/// Units of other classes are ignored. A file with no `T` units yields an
/// empty list.
pub fn decode_records<T: SiiRecord>(bytes: &[u8], diagnostics: &mut Diagnostics) -> Result<Vec<T>> {
    let text = decode_text(bytes)?;
    let tree = parse_sii(&text).into_result()?;
    let root = materialize(&tree, diagnostics);
    records_from(&root)
}

/// Validate and convert the `T` units of an already materialized file.
pub fn records_from<T: SiiRecord>(root: &SiiMap) -> Result<Vec<T>> {
    let Some(units) = root.get(T::CLASS) else {
        return Ok(Vec::new());
    };
    let Some(units) = units.as_object() else {
        return Err(Error::SchemaValidation(Violations(vec![Violation {
            path: T::CLASS.into(),
            message: format!("expected object, found {}", units.kind()),
        }])));
    };

    let name_shape = T::name_shape();
    let shape = T::shape();
    let mut violations = Vec::new();
    for (name, props) in units.iter() {
        let path = format!("{}.{name}", T::CLASS);
        name_shape.check(&SiiValue::String(name.to_string()), &path, &mut violations);
        shape.check(props, &path, &mut violations);
    }
    if !violations.is_empty() {
        return Err(Error::SchemaValidation(Violations(violations)));
    }

    let records = units
        .iter()
        .filter_map(|(name, props)| props.as_object().map(|p| T::from_object(name, p)))
        .collect::<Result<Vec<_>>>()?;
    tracing::debug!(class = T::CLASS, count = records.len(), "decoded records");
    Ok(records)
}

fn missing(name: &str, key: &str) -> Error {
    Error::SchemaValidation(Violations(vec![Violation {
        path: format!("{name}.{key}"),
        message: "required key is missing".into(),
    }]))
}

fn string(props: &SiiMap, name: &str, key: &str) -> Result<String> {
    props
        .get(key)
        .and_then(SiiValue::as_str)
        .map(str::to_string)
        .ok_or_else(|| missing(name, key))
}

fn opt_string(props: &SiiMap, key: &str) -> Option<String> {
    props.get(key).and_then(SiiValue::as_str).map(str::to_string)
}

fn opt_i64(props: &SiiMap, key: &str) -> Option<i64> {
    props.get(key).and_then(SiiValue::as_i64)
}

fn i64s(props: &SiiMap, key: &str) -> Vec<i64> {
    props
        .get(key)
        .and_then(SiiValue::as_array)
        .map(|items| items.iter().filter_map(SiiValue::as_i64).collect())
        .unwrap_or_default()
}

fn strings(props: &SiiMap, key: &str) -> Vec<String> {
    props
        .get(key)
        .and_then(SiiValue::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(SiiValue::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn opt_vec3(props: &SiiMap, key: &str) -> Option<[f64; 3]> {
    let items = props.get(key)?.as_array()?;
    match items {
        [x, y, z] => Some([x.as_f64()?, y.as_f64()?, z.as_f64()?]),
        _ => None,
    }
}

/// The last dot-separated part of a unit name, as a token.
fn name_token(name: &str) -> Result<Token> {
    let last = name.rsplit('.').next().unwrap_or(name);
    Token::encode(last).map_err(|e| {
        Error::SchemaValidation(Violations(vec![Violation {
            path: name.to_string(),
            message: e.to_string(),
        }]))
    })
}

fn token(props: &SiiMap, name: &str, key: &str) -> Result<Token> {
    let text = string(props, name, key)?;
    Token::encode(&text).map_err(|e| {
        Error::SchemaValidation(Violations(vec![Violation {
            path: format!("{name}.{key}"),
            message: e.to_string(),
        }]))
    })
}

/// `city_data : city.<token>`
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct CityData {
    pub token: Token,
    pub name: String,
    /// Localization key such as `@@city_berlin@@`.
    pub name_localized: Option<String>,
    pub country: Token,
    pub population: Option<i64>,
    /// Label offsets on the in-game map.
    pub map_x_offsets: Vec<i64>,
    pub map_y_offsets: Vec<i64>,
}

impl SiiRecord for CityData {
    const CLASS: &'static str = "city_data";

    fn name_shape() -> Shape {
        unit_name("city.")
    }

    fn shape() -> Shape {
        Shape::object()
            .required("cityName", Shape::String)
            .required("country", Shape::Pattern(TOKEN.clone()))
            .optional("cityNameLocalized", Shape::String)
            .optional("population", Shape::Integer)
            .optional("mapXOffsets", Shape::list(Shape::Integer))
            .optional("mapYOffsets", Shape::list(Shape::Integer))
            .into()
    }

    fn from_object(name: &str, props: &SiiMap) -> Result<Self> {
        Ok(Self {
            token: name_token(name)?,
            name: string(props, name, "cityName")?,
            name_localized: opt_string(props, "cityNameLocalized"),
            country: token(props, name, "country")?,
            population: opt_i64(props, "population"),
            map_x_offsets: i64s(props, "mapXOffsets"),
            map_y_offsets: i64s(props, "mapYOffsets"),
        })
    }
}

/// `country_data : country.data.<token>`
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct CountryData {
    pub token: Token,
    pub id: i64,
    pub name: String,
    pub name_localized: Option<String>,
    /// Licence plate code, e.g. `D`.
    pub code: String,
    pub position: Option<[f64; 3]>,
}

impl SiiRecord for CountryData {
    const CLASS: &'static str = "country_data";

    fn name_shape() -> Shape {
        unit_name("country.data.")
    }

    fn shape() -> Shape {
        Shape::object()
            .required("countryId", Shape::Integer)
            .required("name", Shape::String)
            .required("countryCode", Shape::String)
            .optional("nameLocalized", Shape::String)
            .optional("pos", Shape::Tuple(3))
            .into()
    }

    fn from_object(name: &str, props: &SiiMap) -> Result<Self> {
        Ok(Self {
            token: name_token(name)?,
            id: opt_i64(props, "countryId").ok_or_else(|| missing(name, "countryId"))?,
            name: string(props, name, "name")?,
            name_localized: opt_string(props, "nameLocalized"),
            code: string(props, name, "countryCode")?,
            position: opt_vec3(props, "pos"),
        })
    }
}

/// `company_permanent : company.permanent.<token>`
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct CompanyPermanent {
    pub token: Token,
    pub name: String,
    pub sort_name: Option<String>,
    pub trailer_look: Option<String>,
}

impl SiiRecord for CompanyPermanent {
    const CLASS: &'static str = "company_permanent";

    fn name_shape() -> Shape {
        unit_name("company.permanent.")
    }

    fn shape() -> Shape {
        Shape::object()
            .required("name", Shape::String)
            .optional("sortName", Shape::String)
            .optional("trailerLook", Shape::String)
            .into()
    }

    fn from_object(name: &str, props: &SiiMap) -> Result<Self> {
        Ok(Self {
            token: name_token(name)?,
            name: string(props, name, "name")?,
            sort_name: opt_string(props, "sortName"),
            trailer_look: opt_string(props, "trailerLook"),
        })
    }
}

/// `ferry_data : ferry.<token>`
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct FerryData {
    pub token: Token,
    pub name: String,
    pub name_localized: Option<String>,
    pub country: Option<Token>,
    /// Train crossings share the unit class with boat lines.
    pub train: bool,
}

impl SiiRecord for FerryData {
    const CLASS: &'static str = "ferry_data";

    fn name_shape() -> Shape {
        unit_name("ferry.")
    }

    fn shape() -> Shape {
        Shape::object()
            .required("ferryName", Shape::String)
            .optional("ferryNameLocalized", Shape::String)
            .optional("country", Shape::Pattern(TOKEN.clone()))
            .optional("transportType", Shape::Literal(&["ferry", "train"]))
            .into()
    }

    fn from_object(name: &str, props: &SiiMap) -> Result<Self> {
        let country = match props.get("country") {
            Some(_) => Some(token(props, name, "country")?),
            None => None,
        };
        Ok(Self {
            token: name_token(name)?,
            name: string(props, name, "ferryName")?,
            name_localized: opt_string(props, "ferryNameLocalized"),
            country,
            train: props.get("transportType").and_then(SiiValue::as_str) == Some("train"),
        })
    }
}

/// `prefab_model : prefab.<token>`
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct PrefabModel {
    pub token: Token,
    /// Archive path of the `.ppd` prefab description.
    pub prefab_desc: String,
    pub model_desc: Option<String>,
    pub category: Option<String>,
    pub corner0: Vec<String>,
    pub corner1: Vec<String>,
}

impl SiiRecord for PrefabModel {
    const CLASS: &'static str = "prefab_model";

    fn name_shape() -> Shape {
        unit_name("prefab.")
    }

    fn shape() -> Shape {
        Shape::object()
            .required("prefabDesc", Shape::String)
            .optional("modelDesc", Shape::String)
            .optional("category", Shape::String)
            .optional("corner0", Shape::list(Shape::String))
            .optional("corner1", Shape::list(Shape::String))
            .into()
    }

    fn from_object(name: &str, props: &SiiMap) -> Result<Self> {
        Ok(Self {
            token: name_token(name)?,
            prefab_desc: string(props, name, "prefabDesc")?,
            model_desc: opt_string(props, "modelDesc"),
            category: opt_string(props, "category"),
            corner0: strings(props, "corner0"),
            corner1: strings(props, "corner1"),
        })
    }
}

/// `localization_db : .localization`, the key/value string table.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct LocalizationDb {
    pub entries: Vec<(String, String)>,
}

impl LocalizationDb {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Merge several tables, later ones overriding earlier keys.
    pub fn merge(tables: impl IntoIterator<Item = LocalizationDb>) -> LocalizationDb {
        let mut merged = LocalizationDb::default();
        for table in tables {
            for (key, value) in table.entries {
                match merged.entries.iter_mut().find(|(k, _)| *k == key) {
                    Some(slot) => slot.1 = value,
                    None => merged.entries.push((key, value)),
                }
            }
        }
        merged
    }
}

impl SiiRecord for LocalizationDb {
    const CLASS: &'static str = "localization_db";

    fn shape() -> Shape {
        Shape::object()
            .optional("key", Shape::list(Shape::String))
            .optional("val", Shape::list(Shape::String))
            .into()
    }

    fn from_object(name: &str, props: &SiiMap) -> Result<Self> {
        let keys = strings(props, "key");
        let values = strings(props, "val");
        if keys.len() != values.len() {
            return Err(Error::SchemaValidation(Violations(vec![Violation {
                path: format!("{name}.val"),
                message: format!("{} keys but {} values", keys.len(), values.len()),
            }])));
        }
        Ok(Self {
            entries: keys.into_iter().zip(values).collect(),
        })
    }
}
