//! The default host environment installed into the global object.
//!
//! Scripts run sandboxed: nothing here touches the filesystem, network or
//! process. `console` routes through the machine's [`ConsoleWriter`],
//! `JSON` goes through serde, and the rest is pure computation.

mod array;
mod json;
mod math;
mod string;

pub(crate) use string::string_method;

use std::rc::Rc;

use crate::{
    flow::Flow,
    function::native_value,
    io::ConsoleStream,
    value::{JsObject, ObjRef, Payload, Value, array_index, to_js_string, to_number},
};

/// Installs the default globals: `console`, `Math`, `JSON`, the global
/// conversion functions, and the `Array`/`Object` namespaces.
pub(crate) fn install_globals(global: &ObjRef) {
    let mut g = global.borrow_mut();
    g.set("undefined", Value::Undefined);
    g.set("NaN", Value::Number(f64::NAN));
    g.set("Infinity", Value::Number(f64::INFINITY));

    g.set("console", console_object());
    g.set("Math", math::math_object());
    g.set("JSON", json::json_object());

    g.set(
        "parseInt",
        native_value("parseInt", |_, _, args| {
            let input = args.first().map(to_js_string).unwrap_or_default();
            let radix = args.get(1).map(to_number);
            Ok(Value::Number(parse_int(&input, radix)))
        }),
    );
    g.set(
        "parseFloat",
        native_value("parseFloat", |_, _, args| {
            let input = args.first().map(to_js_string).unwrap_or_default();
            Ok(Value::Number(parse_float(&input)))
        }),
    );
    g.set(
        "isNaN",
        native_value("isNaN", |_, _, args| {
            Ok(Value::Bool(args.first().map(to_number).unwrap_or(f64::NAN).is_nan()))
        }),
    );
    g.set(
        "isFinite",
        native_value("isFinite", |_, _, args| {
            Ok(Value::Bool(
                args.first().map(to_number).unwrap_or(f64::NAN).is_finite(),
            ))
        }),
    );
    g.set(
        "String",
        native_value("String", |_, _, args| {
            Ok(args.first().map_or_else(
                || Value::string(""),
                |v| Value::string(to_js_string(v).as_str()),
            ))
        }),
    );
    g.set(
        "Number",
        native_value("Number", |_, _, args| {
            Ok(Value::Number(args.first().map(to_number).unwrap_or(0.0)))
        }),
    );
    g.set(
        "Boolean",
        native_value("Boolean", |_, _, args| {
            Ok(Value::Bool(args.first().is_some_and(Value::truthy)))
        }),
    );
    g.set("Array", array::array_constructor());
    g.set("Object", object_namespace());
}

/// `console` with `log` and `error` routed to the machine's writer.
fn console_object() -> Value {
    let mut console = JsObject::plain();
    console.set(
        "log",
        native_value("log", |m, _, args| {
            let line = args.iter().map(to_js_string).collect::<Vec<_>>().join(" ");
            m.console.write_line(ConsoleStream::Out, &line);
            Ok(Value::Undefined)
        }),
    );
    console.set(
        "error",
        native_value("error", |m, _, args| {
            let line = args.iter().map(to_js_string).collect::<Vec<_>>().join(" ");
            m.console.write_line(ConsoleStream::Err, &line);
            Ok(Value::Undefined)
        }),
    );
    Value::Object(console.into_ref())
}

/// The `Object` callable with its `keys` helper attached.
fn object_namespace() -> Value {
    let ctor = native_value("Object", |_, _, args| {
        Ok(match args.first() {
            Some(Value::Object(obj)) => Value::Object(Rc::clone(obj)),
            _ => Value::new_object(),
        })
    });
    if let Some(obj) = ctor.as_object() {
        obj.borrow_mut().set(
            "keys",
            native_value("keys", |_, _, args| {
                let Some(Value::Object(target)) = args.first() else {
                    return Err(Flow::type_error("Object.keys called on non-object".to_owned()));
                };
                let keys = target
                    .borrow()
                    .enumerable_keys()
                    .into_iter()
                    .map(Value::String)
                    .collect();
                Ok(Value::new_array(keys))
            }),
        );
    }
    ctor
}

/// Built-in method lookup for property reads that found nothing on the
/// object or its prototype chain.
pub(crate) fn object_method(target: &Value, key: &str) -> Option<Value> {
    let obj = target.as_object()?;
    enum Kind {
        Array,
        Function,
        Plain,
    }
    let kind = match &obj.borrow().payload {
        Payload::Array(_) => Kind::Array,
        Payload::Function(_) | Payload::Native(_) => Kind::Function,
        Payload::Plain => Kind::Plain,
    };
    match kind {
        Kind::Array => array::array_method(key).or_else(|| common_method(key)),
        Kind::Function => function_method(key).or_else(|| common_method(key)),
        Kind::Plain => common_method(key),
    }
}

/// Methods shared by every object: `hasOwnProperty`, `toString`,
/// `valueOf`.
fn common_method(key: &str) -> Option<Value> {
    match key {
        "hasOwnProperty" => Some(native_value("hasOwnProperty", |_, this, args| {
            let key = args.first().map(to_js_string).unwrap_or_default();
            let Some(obj) = this.as_object() else {
                return Ok(Value::Bool(false));
            };
            let object = obj.borrow();
            let has = object.properties.contains_key(key.as_str())
                || match &object.payload {
                    Payload::Array(elements) => {
                        key == "length" || array_index(&key).is_some_and(|i| i < elements.len())
                    }
                    _ => false,
                };
            Ok(Value::Bool(has))
        })),
        "toString" => Some(native_value("toString", |_, this, _| {
            Ok(Value::string(to_js_string(&this).as_str()))
        })),
        "valueOf" => Some(native_value("valueOf", |_, this, _| Ok(this))),
        _ => None,
    }
}

/// Methods on function objects: `call`, `apply`, and the source-slicing
/// `toString`/`valueOf` handled by `common_method` via `to_js_string`.
fn function_method(key: &str) -> Option<Value> {
    match key {
        "call" => Some(native_value("call", |m, this, args| {
            let receiver = args.first().cloned().unwrap_or(Value::Undefined);
            m.call(&this, receiver, args.get(1..).unwrap_or(&[]))
        })),
        "apply" => Some(native_value("apply", |m, this, args| {
            let receiver = args.first().cloned().unwrap_or(Value::Undefined);
            let call_args = match args.get(1) {
                Some(Value::Object(obj)) => match &obj.borrow().payload {
                    Payload::Array(elements) => elements.clone(),
                    _ => return Err(Flow::type_error("apply expects an array of arguments".to_owned())),
                },
                Some(Value::Undefined | Value::Null) | None => Vec::new(),
                Some(_) => return Err(Flow::type_error("apply expects an array of arguments".to_owned())),
            };
            m.call(&this, receiver, &call_args)
        })),
        _ => None,
    }
}

/// The `parseInt` grammar: optional sign, optional `0x` (radix 16), then
/// as many digits of the radix as appear.
fn parse_int(input: &str, radix: Option<f64>) -> f64 {
    let mut s = input.trim_start();
    let mut sign = 1.0;
    if let Some(rest) = s.strip_prefix('-') {
        sign = -1.0;
        s = rest;
    } else if let Some(rest) = s.strip_prefix('+') {
        s = rest;
    }
    let mut radix = match radix {
        Some(r) if r.is_finite() && r.trunc() != 0.0 => r.trunc() as u32,
        _ => 0,
    };
    if !(radix == 0 || (2..=36).contains(&radix)) {
        return f64::NAN;
    }
    if (radix == 0 || radix == 16)
        && let Some(rest) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X"))
    {
        s = rest;
        radix = 16;
    }
    if radix == 0 {
        radix = 10;
    }
    let mut value = 0.0;
    let mut any = false;
    for ch in s.chars() {
        let Some(digit) = ch.to_digit(radix) else { break };
        value = value * f64::from(radix) + f64::from(digit);
        any = true;
    }
    if any { sign * value } else { f64::NAN }
}

/// `parseFloat`: the longest leading decimal literal, else `NaN`.
fn parse_float(input: &str) -> f64 {
    let s = input.trim_start();
    let bytes = s.as_bytes();
    let mut i = 0;
    if i < bytes.len() && (bytes[i] == b'+' || bytes[i] == b'-') {
        i += 1;
    }
    if s[i..].starts_with("Infinity") {
        return if s.starts_with('-') { f64::NEG_INFINITY } else { f64::INFINITY };
    }
    let digits_start = i;
    while i < bytes.len() && bytes[i].is_ascii_digit() {
        i += 1;
    }
    if i < bytes.len() && bytes[i] == b'.' {
        i += 1;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
    }
    if i == digits_start || !s[digits_start..i].bytes().any(|b| b.is_ascii_digit()) {
        return f64::NAN;
    }
    let mantissa_end = i;
    if i < bytes.len() && (bytes[i] == b'e' || bytes[i] == b'E') {
        let mut j = i + 1;
        if j < bytes.len() && (bytes[j] == b'+' || bytes[j] == b'-') {
            j += 1;
        }
        let exp_start = j;
        while j < bytes.len() && bytes[j].is_ascii_digit() {
            j += 1;
        }
        if j > exp_start {
            i = j;
        }
    }
    let literal = if i > mantissa_end { &s[..i] } else { &s[..mantissa_end] };
    literal.parse().unwrap_or(f64::NAN)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_int_radix() {
        assert_eq!(parse_int("42", None), 42.0);
        assert_eq!(parse_int("  -12px", None), -12.0);
        assert_eq!(parse_int("0xff", None), 255.0);
        assert_eq!(parse_int("ff", Some(16.0)), 255.0);
        assert_eq!(parse_int("101", Some(2.0)), 5.0);
        assert!(parse_int("px", None).is_nan());
    }

    #[test]
    fn parse_float_prefix() {
        assert_eq!(parse_float("3.25rem"), 3.25);
        assert_eq!(parse_float("-2e3x"), -2000.0);
        assert_eq!(parse_float(".5"), 0.5);
        assert!(parse_float("rem").is_nan());
    }
}
