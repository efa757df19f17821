//! Array construction and the `Array.prototype` method subset.

use std::rc::Rc;

use crate::{
    flow::{ExecResult, Flow},
    function::native_value,
    value::{self, Payload, Value, to_js_string, to_number},
};

/// The `Array` callable: `Array(n)` makes a sparse-length array,
/// `Array(a, b, ...)` an array of its arguments. `Array.isArray` hangs
/// off the function object.
pub(super) fn array_constructor() -> Value {
    let ctor = native_value("Array", |_, _, args| {
        if let [Value::Number(n)] = args {
            if n.fract() != 0.0 || *n < 0.0 {
                return Err(Flow::range_error("invalid array length".to_owned()));
            }
            return Ok(Value::new_array(vec![Value::Undefined; *n as usize]));
        }
        Ok(Value::new_array(args.to_vec()))
    });
    if let Some(obj) = ctor.as_object() {
        obj.borrow_mut().set(
            "isArray",
            native_value("isArray", |_, _, args| {
                let is_array = args
                    .first()
                    .and_then(Value::as_object)
                    .is_some_and(|o| matches!(o.borrow().payload, Payload::Array(_)));
                Ok(Value::Bool(is_array))
            }),
        );
    }
    ctor
}

/// Borrows the receiver's elements, or throws if it is not an array.
fn with_elements<T>(this: &Value, f: impl FnOnce(&mut Vec<Value>) -> T) -> ExecResult<T> {
    let Some(obj) = this.as_object() else {
        return Err(Flow::type_error("array method called on non-array".to_owned()));
    };
    let mut object = obj.borrow_mut();
    match &mut object.payload {
        Payload::Array(elements) => Ok(f(elements)),
        _ => Err(Flow::type_error("array method called on non-array".to_owned())),
    }
}

/// Normalizes a possibly-negative slice bound against `len`.
fn slice_bound(raw: Option<f64>, default: usize, len: usize) -> usize {
    match raw {
        None => default,
        Some(n) if n.is_nan() => 0,
        Some(n) if n < 0.0 => len.saturating_sub(-n as usize),
        Some(n) => (n as usize).min(len),
    }
}

pub(super) fn array_method(key: &str) -> Option<Value> {
    match key {
        "push" => Some(native_value("push", |_, this, args| {
            with_elements(&this, |elements| {
                elements.extend(args.iter().cloned());
                Value::Number(elements.len() as f64)
            })
        })),
        "pop" => Some(native_value("pop", |_, this, _| {
            with_elements(&this, |elements| elements.pop().unwrap_or(Value::Undefined))
        })),
        "shift" => Some(native_value("shift", |_, this, _| {
            with_elements(&this, |elements| {
                if elements.is_empty() {
                    Value::Undefined
                } else {
                    elements.remove(0)
                }
            })
        })),
        "unshift" => Some(native_value("unshift", |_, this, args| {
            with_elements(&this, |elements| {
                elements.splice(0..0, args.iter().cloned());
                Value::Number(elements.len() as f64)
            })
        })),
        "join" => Some(native_value("join", |_, this, args| {
            let separator = match args.first() {
                None | Some(Value::Undefined) => ",".to_owned(),
                Some(v) => to_js_string(v),
            };
            with_elements(&this, |elements| {
                Value::string(value::join_values(elements, &separator).as_str())
            })
        })),
        "indexOf" => Some(native_value("indexOf", |_, this, args| {
            let needle = args.first().cloned().unwrap_or(Value::Undefined);
            with_elements(&this, |elements| {
                let index = elements
                    .iter()
                    .position(|v| value::strict_eq(v, &needle))
                    .map_or(-1.0, |i| i as f64);
                Value::Number(index)
            })
        })),
        "slice" => Some(native_value("slice", |_, this, args| {
            let start = args.first().map(to_number);
            let end = args.get(1).map(to_number);
            with_elements(&this, |elements| {
                let len = elements.len();
                let start = slice_bound(start, 0, len);
                let end = slice_bound(end, len, len);
                Value::new_array(elements.get(start..end.max(start)).unwrap_or(&[]).to_vec())
            })
        })),
        "concat" => Some(native_value("concat", |_, this, args| {
            let mut combined = with_elements(&this, |elements| elements.clone())?;
            for arg in args {
                match arg.as_object().map(Rc::clone) {
                    Some(obj) if matches!(obj.borrow().payload, Payload::Array(_)) => {
                        if let Payload::Array(elements) = &obj.borrow().payload {
                            combined.extend(elements.iter().cloned());
                        }
                    }
                    _ => combined.push(arg.clone()),
                }
            }
            Ok(Value::new_array(combined))
        })),
        _ => None,
    }
}
