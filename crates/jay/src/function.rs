//! Function values: interpreted functions compiled from source, and
//! native functions implemented in Rust.
//!
//! An interpreted function owns its compiled body thunk, the scope it
//! closed over, and its hoist set (the `var` names and nested function
//! declarations installed into every fresh activation frame). Invocation
//! itself lives on the machine; this module only defines the values.

use std::rc::Rc;

use crate::{
    compile::{HoistSet, StmtThunk},
    flow::ExecResult,
    machine::Machine,
    scope::Scope,
    value::{JsObject, Property, Value},
};

/// A function produced by a function expression or declaration.
#[derive(Clone)]
pub(crate) struct JsFunction {
    /// Source name; empty for anonymous expressions, unless inherited
    /// from the identifier an anonymous expression was assigned to.
    pub name: Rc<str>,
    /// Declared parameter names. Their count is the `length` the function
    /// object reports.
    pub params: Rc<[Rc<str>]>,
    pub body: StmtThunk,
    /// The lexical scope in effect where the function was created; each
    /// call's activation frame is parented here.
    pub scope: Rc<Scope>,
    /// `var` and function declarations hoisted into each activation frame.
    pub hoist: Rc<HoistSet>,
    /// The full program source; `start..end` slices this function's text
    /// for `toString`/`valueOf`.
    pub source: Rc<str>,
    pub start: usize,
    pub end: usize,
    /// Named function expressions bind their own name inside the frame so
    /// the function can recurse through it.
    pub self_binding: bool,
}

impl JsFunction {
    /// The source text slice backing `toString` and `valueOf`.
    pub fn source_text(&self) -> String {
        self.source.get(self.start..self.end).unwrap_or_default().to_owned()
    }

    /// The call-stack frame label, `"<name>(<start>,<end>)"`.
    pub fn frame_label(&self) -> String {
        let name = if self.name.is_empty() { "anonymous" } else { &self.name };
        format!("{name}({},{})", self.start, self.end)
    }
}

/// A function implemented in Rust. Receives the machine, the `this`
/// value, and the evaluated arguments.
#[derive(Clone)]
pub(crate) struct NativeFunction {
    pub name: Rc<str>,
    pub func: NativeCallback,
}

pub(crate) type NativeCallback = Rc<dyn Fn(&mut Machine, Value, &[Value]) -> ExecResult<Value>>;

/// Wraps an interpreted function into its function object, with the
/// `prototype` property `new` and `instanceof` consult.
pub(crate) fn make_function_value(function: JsFunction) -> Value {
    let object = JsObject::function(function).into_ref();
    let prototype = Property {
        value: Value::new_object(),
        get: None,
        set: None,
        enumerable: false,
        configurable: false,
    };
    object.borrow_mut().properties.insert(Rc::from("prototype"), prototype);
    Value::Object(object)
}

/// Wraps a Rust closure into a callable value.
pub(crate) fn native_value(
    name: &str,
    func: impl Fn(&mut Machine, Value, &[Value]) -> ExecResult<Value> + 'static,
) -> Value {
    Value::Object(
        JsObject::native(NativeFunction {
            name: Rc::from(name),
            func: Rc::new(func),
        })
        .into_ref(),
    )
}
