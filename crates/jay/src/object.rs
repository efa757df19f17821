//! The public value type used at the API boundary.
//!
//! [`Object`] owns all its data and can be freely cloned, stored or
//! serialized; unlike the internal runtime value it carries no shared
//! references into the interpreter. Inputs (`set_global`, native-function
//! returns) and outputs (`evaluate` results, `get_global`) both use it.
//!
//! # JSON serialization
//!
//! `Object` has a natural JSON mapping:
//!
//! - `Null` ↔ JSON `null` (and `Undefined` serializes to `null`, like
//!   `JSON.stringify`)
//! - `Bool` ↔ `true`/`false`
//! - `Number` ↔ JSON number
//! - `String` ↔ JSON string
//! - `Array` ↔ JSON array
//! - `Object` ↔ JSON object (insertion order preserved)
//! - `Function` → `{"$function": "<name>"}` (output-only)

use std::{fmt, rc::Rc};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize, ser::SerializeMap, ser::SerializeSeq};

use crate::value::{self, JsObject, Payload, Value};

/// A value crossing the interpreter boundary.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Object {
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Array(Vec<Self>),
    Object(IndexMap<String, Self>),
    /// A function value. Only the name survives the boundary; calling it
    /// from the host is not supported.
    Function {
        #[serde(rename = "$function")]
        name: String,
    },
    /// The `undefined` value. Listed last so untagged deserialization
    /// never picks it over `Null`.
    Undefined,
}

impl Serialize for Object {
    /// The natural JSON mapping. Numbers with an exact integer value
    /// serialize without a decimal point, like the language's own
    /// `JSON.stringify`; non-finite numbers become `null`.
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Undefined | Self::Null => serializer.serialize_unit(),
            Self::Bool(b) => serializer.serialize_bool(*b),
            Self::Number(n) => {
                if n.is_finite() && n.fract() == 0.0 && n.abs() < 9.007_199_254_740_992e15 {
                    serializer.serialize_i64(*n as i64)
                } else {
                    serializer.serialize_f64(*n)
                }
            }
            Self::String(s) => serializer.serialize_str(s),
            Self::Array(elements) => {
                let mut seq = serializer.serialize_seq(Some(elements.len()))?;
                for element in elements {
                    seq.serialize_element(element)?;
                }
                seq.end()
            }
            Self::Object(entries) => {
                let mut map = serializer.serialize_map(Some(entries.len()))?;
                for (key, value) in entries {
                    map.serialize_entry(key, value)?;
                }
                map.end()
            }
            Self::Function { name } => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("$function", name)?;
                map.end()
            }
        }
    }
}

impl Object {
    /// The `typeof`-style name of this variant, for error messages.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Undefined => "undefined",
            Self::Null => "null",
            Self::Bool(_) => "boolean",
            Self::Number(_) => "number",
            Self::String(_) => "string",
            Self::Array(_) => "array",
            Self::Object(_) => "object",
            Self::Function { .. } => "function",
        }
    }
}

impl fmt::Display for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Undefined => write!(f, "undefined"),
            Self::Null => write!(f, "null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Number(n) => write!(f, "{}", value::number_to_string(*n)),
            Self::String(s) => write!(f, "{s}"),
            Self::Array(elements) => {
                write!(f, "[")?;
                for (i, element) in elements.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{element}")?;
                }
                write!(f, "]")
            }
            Self::Object(entries) => {
                write!(f, "{{")?;
                for (i, (key, val)) in entries.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{key}: {val}")?;
                }
                write!(f, "}}")
            }
            Self::Function { name } => write!(f, "[Function: {name}]"),
        }
    }
}

/// Error converting an [`Object`] to a concrete Rust type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeMismatch {
    pub expected: &'static str,
    pub found: &'static str,
}

impl fmt::Display for TypeMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "expected {}, found {}", self.expected, self.found)
    }
}

impl std::error::Error for TypeMismatch {}

impl TryFrom<&Object> for f64 {
    type Error = TypeMismatch;

    fn try_from(object: &Object) -> Result<Self, TypeMismatch> {
        match object {
            Object::Number(n) => Ok(*n),
            other => Err(TypeMismatch {
                expected: "number",
                found: other.type_name(),
            }),
        }
    }
}

impl TryFrom<&Object> for i64 {
    type Error = TypeMismatch;

    /// Succeeds only for numbers with an exact integer value.
    fn try_from(object: &Object) -> Result<Self, TypeMismatch> {
        match object {
            Object::Number(n) if n.fract() == 0.0 && n.abs() < 9.007_199_254_740_992e15 => Ok(*n as Self),
            other => Err(TypeMismatch {
                expected: "integer",
                found: other.type_name(),
            }),
        }
    }
}

impl TryFrom<&Object> for bool {
    type Error = TypeMismatch;

    fn try_from(object: &Object) -> Result<Self, TypeMismatch> {
        match object {
            Object::Bool(b) => Ok(*b),
            other => Err(TypeMismatch {
                expected: "boolean",
                found: other.type_name(),
            }),
        }
    }
}

impl TryFrom<&Object> for String {
    type Error = TypeMismatch;

    fn try_from(object: &Object) -> Result<Self, TypeMismatch> {
        match object {
            Object::String(s) => Ok(s.clone()),
            other => Err(TypeMismatch {
                expected: "string",
                found: other.type_name(),
            }),
        }
    }
}

impl From<&str> for Object {
    fn from(s: &str) -> Self {
        Self::String(s.to_owned())
    }
}

impl From<f64> for Object {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<bool> for Object {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

/// Converts a runtime value into an owned [`Object`].
///
/// Object graphs are walked depth-first; a reference already on the
/// current path (a cycle) converts to the string `"[Circular]"`.
pub(crate) fn from_value(value: &Value) -> Object {
    let mut path = Vec::new();
    from_value_inner(value, &mut path)
}

fn from_value_inner(value: &Value, path: &mut Vec<*const ()>) -> Object {
    match value {
        Value::Undefined => Object::Undefined,
        Value::Null => Object::Null,
        Value::Bool(b) => Object::Bool(*b),
        Value::Number(n) => Object::Number(*n),
        Value::String(s) => Object::String(s.to_string()),
        Value::Object(obj) => {
            let ptr = Rc::as_ptr(obj).cast::<()>();
            if path.contains(&ptr) {
                return Object::String("[Circular]".to_owned());
            }
            path.push(ptr);
            let converted = {
                let object = obj.borrow();
                match &object.payload {
                    Payload::Array(elements) => {
                        Object::Array(elements.iter().map(|v| from_value_inner(v, path)).collect())
                    }
                    Payload::Function(f) => Object::Function {
                        name: f.name.to_string(),
                    },
                    Payload::Native(f) => Object::Function {
                        name: f.name.to_string(),
                    },
                    Payload::Plain => {
                        let mut entries = IndexMap::new();
                        for (key, prop) in &object.properties {
                            if prop.enumerable && !prop.is_accessor() {
                                entries.insert(key.to_string(), from_value_inner(&prop.value, path));
                            }
                        }
                        Object::Object(entries)
                    }
                }
            };
            path.pop();
            converted
        }
    }
}

/// Converts an owned [`Object`] into a runtime value.
pub(crate) fn to_value(object: &Object) -> Value {
    match object {
        Object::Undefined | Object::Function { .. } => Value::Undefined,
        Object::Null => Value::Null,
        Object::Bool(b) => Value::Bool(*b),
        Object::Number(n) => Value::Number(*n),
        Object::String(s) => Value::string(s.as_str()),
        Object::Array(elements) => Value::new_array(elements.iter().map(to_value).collect()),
        Object::Object(entries) => {
            let mut obj = JsObject::plain();
            for (key, val) in entries {
                obj.set(key.as_str(), to_value(val));
            }
            Value::Object(obj.into_ref())
        }
    }
}
