//! Turns a syntax tree into nested [`SiiMap`]s.
//!
//! The result maps `class -> name -> properties`. Objects declared inside
//! another object land in that object's map under the same two levels.
//! `@include` directives are ignored here, see [`crate::IncludeCollector`].

use std::collections::HashSet;

use num_bigint::BigInt;
use scs_common::Diagnostics;

use crate::cst::{Index, NumberLit, Object, Property, PropertyValue, SiiFile};
use crate::value::{SiiMap, SiiValue};
use crate::visitor::{walk_object, Visitor};

/// Largest integer a double represents exactly.
pub const MAX_SAFE_INTEGER: u64 = (1 << 53) - 1;

/// `city_name_localized` -> `cityNameLocalized`.
pub fn camel_case(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    let mut upper = false;
    for ch in key.chars() {
        if ch == '_' {
            upper = !out.is_empty();
            continue;
        }
        if upper {
            out.extend(ch.to_uppercase());
            upper = false;
        } else {
            out.push(ch);
        }
    }
    out
}

pub fn number(lit: &NumberLit) -> SiiValue {
    match lit {
        NumberLit::BinaryFloat(bits) => SiiValue::Float(f32::from_bits(*bits) as f64),
        NumberLit::Hex(digits) => match u64::from_str_radix(digits, 16) {
            Ok(n) if n <= MAX_SAFE_INTEGER => SiiValue::Int(n as i64),
            _ => BigInt::parse_bytes(digits.as_bytes(), 16)
                .map(SiiValue::BigInt)
                .unwrap_or(SiiValue::Nil),
        },
        NumberLit::Decimal(text) => {
            let integral = !text.contains(['.', 'e', 'E']);
            if integral {
                if let Ok(i) = text.parse::<i64>() {
                    return SiiValue::Int(i);
                }
                if let Ok(b) = text.trim_start_matches('+').parse::<BigInt>() {
                    return SiiValue::BigInt(b);
                }
            }
            text.parse::<f64>().map(SiiValue::Float).unwrap_or(SiiValue::Nil)
        }
    }
}

fn numbers(lits: &[NumberLit]) -> SiiValue {
    SiiValue::Array(lits.iter().map(number).collect())
}

pub fn value(value: &PropertyValue) -> SiiValue {
    match value {
        PropertyValue::Nil => SiiValue::Nil,
        PropertyValue::String(s) => SiiValue::String(s.clone()),
        PropertyValue::Ident(i) => match i.as_str() {
            "true" => SiiValue::Bool(true),
            "false" => SiiValue::Bool(false),
            _ => SiiValue::String(i.clone()),
        },
        PropertyValue::Number(n) => number(n),
        PropertyValue::Tuple(items) | PropertyValue::AuxTuple(items) => numbers(items),
        PropertyValue::Placement { position, rotation } => {
            SiiValue::Array(vec![numbers(position), numbers(rotation)])
        }
    }
}

/// Properties of one object, plus the keys filled by `key[]` lines.
#[derive(Default)]
struct Frame {
    props: SiiMap,
    lists: HashSet<String>,
}

/// Collects objects and their properties.
pub struct Materializer<'d> {
    stack: Vec<Frame>,
    diagnostics: &'d mut Diagnostics,
}

impl<'d> Materializer<'d> {
    pub fn new(diagnostics: &'d mut Diagnostics) -> Self {
        Self {
            stack: vec![Frame::default()],
            diagnostics,
        }
    }

    pub fn finish(mut self) -> SiiMap {
        self.stack.pop().unwrap_or_default().props
    }

    fn current(&mut self) -> &mut Frame {
        if self.stack.is_empty() {
            self.stack.push(Frame::default());
        }
        let last = self.stack.len() - 1;
        &mut self.stack[last]
    }

    fn set_indexed(&mut self, key: String, value: SiiValue, property: &Property) {
        let frame = self.current();
        if frame.lists.contains(&key) {
            if let Some(SiiValue::Array(items)) = frame.props.get_mut(&key) {
                items.push(value);
                return;
            }
        }
        // A leading `key: n` is the element count; the elements replace it.
        let replaces_other = !matches!(frame.props.get(&key), None | Some(SiiValue::Int(_)));
        frame.lists.insert(key.clone());
        frame.props.insert(key, SiiValue::Array(vec![value]));
        if replaces_other {
            self.diagnostics.warn(format!(
                "{}: `{}[]` follows a value that is not a count, replacing it",
                property.span, property.key
            ));
        }
    }

    fn set_scalar(&mut self, key: String, value: SiiValue, property: &Property) {
        let frame = self.current();
        let is_list = frame.lists.contains(&key);
        let exists = frame.props.contains_key(&key);
        if is_list && matches!(value, SiiValue::Int(_)) {
            self.diagnostics.warn(format!(
                "{}: count for `{}` after its elements, ignoring",
                property.span, property.key
            ));
            return;
        }
        frame.lists.remove(&key);
        frame.props.insert(key, value);
        if exists {
            self.diagnostics.warn(format!(
                "{}: `{}` assigned twice, keeping the last value",
                property.span, property.key
            ));
        }
    }
}

impl Visitor for Materializer<'_> {
    fn visit_object(&mut self, object: &Object) {
        self.stack.push(Frame::default());
        walk_object(self, object);
        let props = self.stack.pop().unwrap_or_default().props;

        let class = self.current().props.object_mut(&object.class);
        if class
            .insert(object.name.clone(), SiiValue::Object(props))
            .is_some()
        {
            self.diagnostics.warn(format!(
                "{}: duplicate object `{} : {}`, keeping the last one",
                object.span, object.class, object.name
            ));
        }
    }

    fn visit_property(&mut self, property: &Property) {
        let key = camel_case(&property.key);
        let value = value(&property.value);
        match property.index {
            Some(Index::Append | Index::Explicit(_)) => self.set_indexed(key, value, property),
            None => self.set_scalar(key, value, property),
        }
    }
}

/// Materialize a whole file.
pub fn materialize(file: &SiiFile, diagnostics: &mut Diagnostics) -> SiiMap {
    let mut materializer = Materializer::new(diagnostics);
    materializer.visit_file(file);
    materializer.finish()
}
