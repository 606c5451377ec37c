//! Structural validation of materialized values.
//!
//! Validation never stops at the first problem; every violation is reported
//! with the path that produced it.

use regex::Regex;

use crate::error::{Violation, Violations};
use crate::value::{SiiMap, SiiValue};

/// Expected shape of a value.
#[derive(Debug, Clone)]
pub enum Shape {
    Any,
    String,
    /// Int, float or big integer.
    Number,
    /// Int or big integer.
    Integer,
    Bool,
    /// One of a fixed set of strings.
    Literal(&'static [&'static str]),
    /// A string matching the regex.
    Pattern(Regex),
    /// An array of exactly `n` numbers.
    Tuple(usize),
    List(Box<Shape>),
    Object(ObjectShape),
    /// An object whose values all have the given shape.
    Map(Box<Shape>),
    /// `nil` or the inner shape.
    Nullable(Box<Shape>),
}

/// Keys of an object. Keys not listed are allowed.
#[derive(Debug, Clone, Default)]
pub struct ObjectShape {
    required: Vec<(&'static str, Shape)>,
    optional: Vec<(&'static str, Shape)>,
}

impl ObjectShape {
    pub fn required(mut self, key: &'static str, shape: Shape) -> Self {
        self.required.push((key, shape));
        self
    }

    pub fn optional(mut self, key: &'static str, shape: Shape) -> Self {
        self.optional.push((key, shape));
        self
    }

    fn check(&self, map: &SiiMap, path: &str, out: &mut Vec<Violation>) {
        for (key, shape) in &self.required {
            match map.get(key) {
                Some(value) => shape.check(value, &join(path, key), out),
                None => out.push(Violation {
                    path: join(path, key),
                    message: "required key is missing".into(),
                }),
            }
        }
        for (key, shape) in &self.optional {
            if let Some(value) = map.get(key) {
                shape.check(value, &join(path, key), out);
            }
        }
    }
}

fn join(path: &str, key: &str) -> String {
    if path.is_empty() {
        key.to_string()
    } else {
        format!("{path}.{key}")
    }
}

impl Shape {
    pub fn object() -> ObjectShape {
        ObjectShape::default()
    }

    pub fn list(inner: Shape) -> Shape {
        Shape::List(Box::new(inner))
    }

    pub fn map(inner: Shape) -> Shape {
        Shape::Map(Box::new(inner))
    }

    pub fn nullable(inner: Shape) -> Shape {
        Shape::Nullable(Box::new(inner))
    }

    /// Check `value`, returning every violation found.
    pub fn validate(&self, value: &SiiValue, path: &str) -> Result<(), Violations> {
        let mut out = Vec::new();
        self.check(value, path, &mut out);
        if out.is_empty() {
            Ok(())
        } else {
            Err(Violations(out))
        }
    }

    pub(crate) fn check(&self, value: &SiiValue, path: &str, out: &mut Vec<Violation>) {
        let violation = |message: String| Violation {
            path: path.to_string(),
            message,
        };
        let is_number = |v: &SiiValue| {
            matches!(v, SiiValue::Int(_) | SiiValue::Float(_) | SiiValue::BigInt(_))
        };

        match (self, value) {
            (Shape::Any, _) => {}
            (Shape::Nullable(_), SiiValue::Nil) => {}
            (Shape::Nullable(inner), v) => inner.check(v, path, out),
            (Shape::String, SiiValue::String(_)) => {}
            (Shape::Bool, SiiValue::Bool(_)) => {}
            (Shape::Number, v) if is_number(v) => {}
            (Shape::Integer, SiiValue::Int(_) | SiiValue::BigInt(_)) => {}
            (Shape::Literal(allowed), SiiValue::String(s)) => {
                if !allowed.contains(&s.as_str()) {
                    let allowed = allowed.join(", ");
                    out.push(violation(format!("`{s}` is not one of {allowed}")));
                }
            }
            (Shape::Pattern(re), SiiValue::String(s)) => {
                if !re.is_match(s) {
                    out.push(violation(format!("`{s}` does not match `{}`", re.as_str())));
                }
            }
            (Shape::Tuple(n), SiiValue::Array(items)) => {
                if items.len() != *n {
                    let found = items.len();
                    out.push(violation(format!("expected {n} numbers, found {found}")));
                } else if let Some(bad) = items.iter().position(|v| !is_number(v)) {
                    out.push(violation(format!("tuple element {bad} is not a number")));
                }
            }
            (Shape::List(inner), SiiValue::Array(items)) => {
                for (i, item) in items.iter().enumerate() {
                    inner.check(item, &format!("{path}[{i}]"), out);
                }
            }
            // An empty array is written as its bare count.
            (Shape::List(_), SiiValue::Int(0)) => {}
            (Shape::List(_), SiiValue::Int(n)) => {
                out.push(violation(format!("count of {n} elements but none follow")));
            }
            (Shape::Object(object), SiiValue::Object(map)) => object.check(map, path, out),
            (Shape::Map(inner), SiiValue::Object(map)) => {
                for (key, item) in map.iter() {
                    inner.check(item, &join(path, key), out);
                }
            }
            (shape, v) => out.push(violation(format!(
                "expected {}, found {}",
                shape.describe(),
                v.kind()
            ))),
        }
    }

    fn describe(&self) -> &'static str {
        match self {
            Shape::Any => "anything",
            Shape::String | Shape::Literal(_) | Shape::Pattern(_) => "string",
            Shape::Number => "number",
            Shape::Integer => "integer",
            Shape::Bool => "bool",
            Shape::Tuple(_) => "tuple",
            Shape::List(_) => "array",
            Shape::Object(_) | Shape::Map(_) => "object",
            Shape::Nullable(_) => "nil or value",
        }
    }
}

impl From<ObjectShape> for Shape {
    fn from(object: ObjectShape) -> Self {
        Shape::Object(object)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn obj(pairs: &[(&str, SiiValue)]) -> SiiValue {
        SiiValue::Object(pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect())
    }

    fn s(v: &str) -> SiiValue {
        SiiValue::String(v.into())
    }

    fn shape() -> Shape {
        Shape::object()
            .required("name", Shape::String)
            .required("kind", Shape::Literal(&["city", "village"]))
            .required("token", Shape::Pattern(Regex::new(r"^[a-z0-9_]{1,12}$").unwrap()))
            .optional("pos", Shape::Tuple(3))
            .optional("tags", Shape::list(Shape::String))
            .into()
    }

    #[test]
    fn test_valid() {
        let value = obj(&[
            ("name", s("Berlin")),
            ("kind", s("city")),
            ("token", s("berlin")),
            ("pos", SiiValue::Array(vec![SiiValue::Int(1), SiiValue::Float(2.0), SiiValue::Int(3)])),
            ("extra", SiiValue::Nil),
        ]);
        assert!(shape().validate(&value, "city.berlin").is_ok());
    }

    #[test]
    fn test_collects_every_violation() {
        let value = obj(&[
            ("kind", s("town")),
            ("token", s("Not A Token")),
            ("pos", SiiValue::Array(vec![SiiValue::Int(1)])),
            ("tags", SiiValue::Array(vec![s("a"), SiiValue::Int(2)])),
        ]);
        let violations = shape().validate(&value, "city.x").unwrap_err().0;
        let paths: Vec<&str> = violations.iter().map(|v| v.path.as_str()).collect();
        assert_eq!(
            paths,
            ["city.x.name", "city.x.kind", "city.x.token", "city.x.pos", "city.x.tags[1]"]
        );
        assert_eq!(violations[0].message, "required key is missing");
        assert!(violations[3].message.contains("expected 3 numbers"));
        assert_eq!(violations[4].message, "expected string, found integer");
    }

    #[test]
    fn test_zero_count_is_an_empty_list() {
        let shape = Shape::list(Shape::String);
        assert!(shape.validate(&SiiValue::Int(0), "tags").is_ok());

        let err = shape.validate(&SiiValue::Int(2), "tags").unwrap_err();
        assert_eq!(err.0[0].message, "count of 2 elements but none follow");
        assert!(Shape::Tuple(3).validate(&SiiValue::Int(0), "pos").is_err());
    }

    #[test]
    fn test_map_and_nullable() {
        let shape = Shape::map(Shape::nullable(Shape::Integer));
        assert!(shape
            .validate(&obj(&[("a", SiiValue::Int(1)), ("b", SiiValue::Nil)]), "")
            .is_ok());
        let err = shape.validate(&obj(&[("a", s("x"))]), "").unwrap_err();
        assert_eq!(err.0[0].path, "a");
    }
}
