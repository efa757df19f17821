//! The `String.prototype` method subset.
//!
//! String methods receive their receiver through `this` and coerce it
//! with `ToString`, so they also work when called on other primitives.

use crate::{
    function::native_value,
    value::{Value, to_js_string, to_number},
};

/// Resolves a possibly-negative index against `len`.
fn index_bound(raw: Option<f64>, default: usize, len: usize) -> usize {
    match raw {
        None => default,
        Some(n) if n.is_nan() => 0,
        Some(n) if n < 0.0 => len.saturating_sub(-n as usize),
        Some(n) => (n as usize).min(len),
    }
}

pub(crate) fn string_method(key: &str) -> Option<Value> {
    match key {
        "charAt" => Some(native_value("charAt", |_, this, args| {
            let s = to_js_string(&this);
            let index = args.first().map(to_number).unwrap_or(0.0);
            let ch = if index >= 0.0 {
                s.chars().nth(index as usize)
            } else {
                None
            };
            Ok(Value::string(ch.map(String::from).unwrap_or_default().as_str()))
        })),
        "charCodeAt" => Some(native_value("charCodeAt", |_, this, args| {
            let s = to_js_string(&this);
            let index = args.first().map(to_number).unwrap_or(0.0);
            let code = if index >= 0.0 {
                s.chars().nth(index as usize).map(|ch| ch as u32 as f64)
            } else {
                None
            };
            Ok(Value::Number(code.unwrap_or(f64::NAN)))
        })),
        "indexOf" => Some(native_value("indexOf", |_, this, args| {
            let s = to_js_string(&this);
            let needle = args.first().map(to_js_string).unwrap_or_default();
            let index = s.find(&needle).map_or(-1.0, |byte| s[..byte].chars().count() as f64);
            Ok(Value::Number(index))
        })),
        "slice" => Some(native_value("slice", |_, this, args| {
            let chars: Vec<char> = to_js_string(&this).chars().collect();
            let start = index_bound(args.first().map(to_number), 0, chars.len());
            let end = index_bound(args.get(1).map(to_number), chars.len(), chars.len());
            let out: String = chars.get(start..end.max(start)).unwrap_or(&[]).iter().collect();
            Ok(Value::string(out.as_str()))
        })),
        "substring" => Some(native_value("substring", |_, this, args| {
            let chars: Vec<char> = to_js_string(&this).chars().collect();
            let len = chars.len();
            let clamp = |raw: Option<f64>, default: usize| match raw {
                None => default,
                Some(n) if n.is_nan() || n < 0.0 => 0,
                Some(n) => (n as usize).min(len),
            };
            let a = clamp(args.first().map(to_number), 0);
            let b = clamp(args.get(1).map(to_number), len);
            let (start, end) = if a <= b { (a, b) } else { (b, a) };
            let out: String = chars[start..end].iter().collect();
            Ok(Value::string(out.as_str()))
        })),
        "split" => Some(native_value("split", |_, this, args| {
            let s = to_js_string(&this);
            let parts = match args.first() {
                None | Some(Value::Undefined) => vec![Value::string(s.as_str())],
                Some(separator) => {
                    let separator = to_js_string(separator);
                    if separator.is_empty() {
                        s.chars().map(|ch| Value::string(ch.to_string().as_str())).collect()
                    } else {
                        s.split(separator.as_str())
                            .map(|part| Value::string(part))
                            .collect()
                    }
                }
            };
            Ok(Value::new_array(parts))
        })),
        "toUpperCase" => Some(native_value("toUpperCase", |_, this, _| {
            Ok(Value::string(to_js_string(&this).to_uppercase().as_str()))
        })),
        "toLowerCase" => Some(native_value("toLowerCase", |_, this, _| {
            Ok(Value::string(to_js_string(&this).to_lowercase().as_str()))
        })),
        "trim" => Some(native_value("trim", |_, this, _| {
            Ok(Value::string(to_js_string(&this).trim()))
        })),
        "toString" | "valueOf" => Some(native_value(key, |_, this, _| {
            Ok(Value::string(to_js_string(&this).as_str()))
        })),
        _ => None,
    }
}
