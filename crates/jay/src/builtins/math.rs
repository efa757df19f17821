//! The `Math` namespace object.

use crate::{
    function::native_value,
    value::{JsObject, Value, to_number},
};

pub(super) fn math_object() -> Value {
    let mut math = JsObject::plain();
    math.set("PI", Value::Number(std::f64::consts::PI));
    math.set("E", Value::Number(std::f64::consts::E));

    math.set("abs", unary("abs", f64::abs));
    math.set("floor", unary("floor", f64::floor));
    math.set("ceil", unary("ceil", f64::ceil));
    math.set("sqrt", unary("sqrt", f64::sqrt));
    // Math.round rounds half-up, including for negative values, which is
    // not f64::round.
    math.set("round", unary("round", |n| (n + 0.5).floor()));
    math.set(
        "pow",
        native_value("pow", |_, _, args| {
            let base = args.first().map(to_number).unwrap_or(f64::NAN);
            let exponent = args.get(1).map(to_number).unwrap_or(f64::NAN);
            Ok(Value::Number(base.powf(exponent)))
        }),
    );
    math.set(
        "max",
        native_value("max", |_, _, args| {
            let mut best = f64::NEG_INFINITY;
            for arg in args {
                let n = to_number(arg);
                if n.is_nan() {
                    return Ok(Value::Number(f64::NAN));
                }
                best = best.max(n);
            }
            Ok(Value::Number(best))
        }),
    );
    math.set(
        "min",
        native_value("min", |_, _, args| {
            let mut best = f64::INFINITY;
            for arg in args {
                let n = to_number(arg);
                if n.is_nan() {
                    return Ok(Value::Number(f64::NAN));
                }
                best = best.min(n);
            }
            Ok(Value::Number(best))
        }),
    );
    Value::Object(math.into_ref())
}

fn unary(name: &str, f: impl Fn(f64) -> f64 + 'static) -> Value {
    native_value(name, move |_, _, args| {
        Ok(Value::Number(f(args.first().map(to_number).unwrap_or(f64::NAN))))
    })
}
