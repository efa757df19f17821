//! `JSON.parse` and `JSON.stringify` via serde.
//!
//! Values cross through the public [`Object`](crate::object::Object)
//! type, whose serde mapping is the natural JSON one with key order
//! preserved.

use crate::{
    flow::Flow,
    function::native_value,
    object::{self, Object},
    value::{JsObject, Value, to_js_string},
};

pub(super) fn json_object() -> Value {
    let mut json = JsObject::plain();
    json.set(
        "parse",
        native_value("parse", |_, _, args| {
            let text = args.first().map(to_js_string).unwrap_or_default();
            match serde_json::from_str::<Object>(&text) {
                Ok(parsed) => Ok(object::to_value(&parsed)),
                Err(err) => Err(Flow::syntax_error(format!("JSON.parse: {err}"))),
            }
        }),
    );
    json.set(
        "stringify",
        native_value("stringify", |_, _, args| {
            let Some(value) = args.first() else {
                return Ok(Value::Undefined);
            };
            let object = object::from_value(value);
            // Like the host JSON.stringify, undefined and functions at the
            // top level produce undefined rather than text.
            if matches!(object, Object::Undefined | Object::Function { .. }) {
                return Ok(Value::Undefined);
            }
            match serde_json::to_string(&object) {
                Ok(text) => Ok(Value::string(text.as_str())),
                Err(err) => Err(Flow::type_error(format!("JSON.stringify: {err}"))),
            }
        }),
    );
    Value::Object(json.into_ref())
}
