//! Runtime state threaded through every thunk.
//!
//! The machine owns what the compile layer cannot know statically: the
//! current scope frame, the `this` context, the call stack of frame
//! labels, and the last-expression-value slot the top-level driver
//! reports. It also implements the operations that need to re-enter
//! evaluation: property access with getter/setter dispatch, function
//! invocation, and constructor calls.

use std::{mem, rc::Rc};

use crate::{
    builtins,
    compile::install_hoist,
    flow::{ExecResult, Flow},
    function::{JsFunction, NativeCallback},
    io::ConsoleWriter,
    resource::ResourceTracker,
    scope::Scope,
    tracer::EvalTracer,
    value::{self, Payload, Value, array_index, to_js_string},
};

/// Mutable evaluator state for one run.
pub(crate) struct Machine<'a> {
    /// The current scope frame. Function calls and `with` swap it and
    /// restore it on exit.
    pub scope: Rc<Scope>,
    /// The current `this` value.
    pub context: Value,
    /// The `this` of plain (non-method) calls: the global object.
    pub root_context: Value,
    /// Frame labels of active calls, innermost last.
    pub call_stack: Vec<Rc<str>>,
    /// The last recorded top-level statement value.
    pub value: Value,
    pub tracker: &'a mut dyn ResourceTracker,
    pub tracer: &'a mut dyn EvalTracer,
    pub console: &'a mut dyn ConsoleWriter,
}

/// Resolved callee payload, cloned out so no object borrow is held
/// across the call.
enum Callee {
    Js(JsFunction),
    Native(NativeCallback),
    NotCallable,
}

impl<'a> Machine<'a> {
    pub fn new(
        root_scope: &Rc<Scope>,
        tracker: &'a mut dyn ResourceTracker,
        tracer: &'a mut dyn EvalTracer,
        console: &'a mut dyn ConsoleWriter,
    ) -> Self {
        let root_context = Value::Object(Rc::clone(&root_scope.data));
        Self {
            scope: Rc::clone(root_scope),
            context: root_context.clone(),
            root_context,
            call_stack: Vec::new(),
            value: Value::Undefined,
            tracker,
            tracer,
            console,
        }
    }

    /// One resource tick; loops and calls pay it.
    pub fn step(&mut self) -> ExecResult<()> {
        self.tracker.on_step().map_err(Flow::from)
    }

    /// Records a top-level statement value.
    ///
    /// Suppressed while any call frame is active, so the driver reports
    /// the value of the last *top-level* statement expression, not of
    /// expressions inside called functions. Control-flow signals never
    /// reach this method: they travel in the `Err` arm.
    pub fn record(&mut self, value: &Value) {
        if self.call_stack.is_empty() {
            self.value = value.clone();
        }
    }

    /// Property read with getter dispatch and prototype-chain walk.
    pub fn get_property(&mut self, target: &Value, key: &str) -> ExecResult<Value> {
        enum Found {
            Plain(Value),
            Getter(Value),
        }

        match target {
            Value::Undefined | Value::Null => Err(Flow::type_error(format!(
                "cannot read property '{key}' of {}",
                to_js_string(target)
            ))),
            Value::String(s) => {
                if key == "length" {
                    return Ok(Value::Number(s.chars().count() as f64));
                }
                if let Some(index) = array_index(key) {
                    return Ok(s
                        .chars()
                        .nth(index)
                        .map_or(Value::Undefined, |ch| Value::string(ch.to_string().as_str())));
                }
                Ok(builtins::string_method(key).unwrap_or(Value::Undefined))
            }
            Value::Bool(_) | Value::Number(_) => Ok(Value::Undefined),
            Value::Object(obj) => {
                let mut current = Some(Rc::clone(obj));
                while let Some(link) = current {
                    let found = {
                        let object = link.borrow();
                        let intrinsic = match &object.payload {
                            Payload::Array(elements) => match key {
                                "length" => Some(Found::Plain(Value::Number(elements.len() as f64))),
                                _ => array_index(key)
                                    .map(|i| Found::Plain(elements.get(i).cloned().unwrap_or(Value::Undefined))),
                            },
                            Payload::Function(f) => match key {
                                "length" => Some(Found::Plain(Value::Number(f.params.len() as f64))),
                                "name" => Some(Found::Plain(Value::String(Rc::clone(&f.name)))),
                                _ => None,
                            },
                            Payload::Native(f) => match key {
                                "length" => Some(Found::Plain(Value::Number(0.0))),
                                "name" => Some(Found::Plain(Value::String(Rc::clone(&f.name)))),
                                _ => None,
                            },
                            Payload::Plain => None,
                        };
                        intrinsic.or_else(|| {
                            object.properties.get(key).map(|prop| {
                                if let Some(getter) = &prop.get {
                                    Found::Getter(getter.clone())
                                } else if prop.is_accessor() {
                                    // Setter-only property reads as undefined.
                                    Found::Plain(Value::Undefined)
                                } else {
                                    Found::Plain(prop.value.clone())
                                }
                            })
                        })
                    };
                    match found {
                        Some(Found::Plain(v)) => return Ok(v),
                        Some(Found::Getter(getter)) => return self.call(&getter, target.clone(), &[]),
                        None => {}
                    }
                    current = link.borrow().prototype.clone();
                }
                Ok(builtins::object_method(target, key).unwrap_or(Value::Undefined))
            }
        }
    }

    /// Property write with setter dispatch.
    ///
    /// Writes to primitives are silently ignored, as in non-strict code.
    pub fn set_property(&mut self, target: &Value, key: &str, value: Value) -> ExecResult<()> {
        let Value::Object(obj) = target else {
            return match target {
                Value::Undefined | Value::Null => Err(Flow::type_error(format!(
                    "cannot set property '{key}' of {}",
                    to_js_string(target)
                ))),
                _ => Ok(()),
            };
        };

        // Array element and length writes map straight onto the Vec.
        {
            let mut object = obj.borrow_mut();
            if let Payload::Array(elements) = &mut object.payload {
                if let Some(index) = array_index(key) {
                    if index >= elements.len() {
                        elements.resize(index + 1, Value::Undefined);
                    }
                    elements[index] = value;
                    return Ok(());
                }
                if key == "length" {
                    let new_len = value::to_uint32(&value) as usize;
                    elements.resize(new_len, Value::Undefined);
                    return Ok(());
                }
            }
        }

        // Own property: setter or data overwrite.
        let own = {
            let object = obj.borrow();
            object.properties.get(key).map(|prop| (prop.is_accessor(), prop.set.clone()))
        };
        match own {
            Some((true, Some(setter))) => {
                self.call(&setter, target.clone(), &[value])?;
                return Ok(());
            }
            Some((true, None)) => return Ok(()), // getter-only: silent no-op
            Some((false, _)) => {
                let mut object = obj.borrow_mut();
                if let Some(prop) = object.properties.get_mut(key) {
                    prop.value = value;
                }
                return Ok(());
            }
            None => {}
        }

        // Inherited setter, else a fresh own data property.
        let mut current = obj.borrow().prototype.clone();
        while let Some(link) = current {
            let inherited = {
                let object = link.borrow();
                object.properties.get(key).filter(|p| p.is_accessor()).map(|p| p.set.clone())
            };
            if let Some(setter) = inherited {
                if let Some(setter) = setter {
                    self.call(&setter, target.clone(), &[value])?;
                }
                return Ok(());
            }
            current = link.borrow().prototype.clone();
        }
        obj.borrow_mut().set(key, value);
        Ok(())
    }

    /// The `delete obj.key` primitive.
    pub fn delete_property(&mut self, target: &Value, key: &str) -> ExecResult<Value> {
        match target {
            Value::Undefined | Value::Null => Err(Flow::type_error(format!(
                "cannot delete property '{key}' of {}",
                to_js_string(target)
            ))),
            Value::Object(obj) => {
                let mut object = obj.borrow_mut();
                if let Payload::Array(elements) = &mut object.payload
                    && let Some(index) = array_index(key)
                {
                    if index < elements.len() {
                        elements[index] = Value::Undefined;
                    }
                    return Ok(Value::Bool(true));
                }
                match object.properties.get(key).map(|prop| prop.configurable) {
                    Some(false) => Ok(Value::Bool(false)),
                    Some(true) => {
                        object.properties.shift_remove(key);
                        Ok(Value::Bool(true))
                    }
                    None => Ok(Value::Bool(true)),
                }
            }
            _ => Ok(Value::Bool(true)),
        }
    }

    /// Enumerable keys for `for-in`, snapshotted before the body runs.
    pub fn enumerate(&self, target: &Value) -> Vec<Rc<str>> {
        match target {
            Value::Object(obj) => obj.borrow().enumerable_keys(),
            Value::String(s) => (0..s.chars().count()).map(|i| Rc::from(i.to_string())).collect(),
            _ => Vec::new(),
        }
    }

    /// Invokes `callee` with the given receiver and arguments.
    pub fn call(&mut self, callee: &Value, this: Value, args: &[Value]) -> ExecResult<Value> {
        let resolved = match callee {
            Value::Object(obj) => {
                let object = obj.borrow();
                match &object.payload {
                    Payload::Function(f) => Callee::Js(f.clone()),
                    Payload::Native(f) => Callee::Native(Rc::clone(&f.func)),
                    _ => Callee::NotCallable,
                }
            }
            _ => Callee::NotCallable,
        };
        match resolved {
            Callee::Js(function) => self.call_interpreted(&function, callee, this, args),
            Callee::Native(func) => {
                self.step()?;
                func(self, this, args)
            }
            Callee::NotCallable => Err(Flow::type_error(format!("{} is not a function", to_js_string(callee)))),
        }
    }

    /// Invokes an interpreted function: push a frame label, build the
    /// activation frame, bind `arguments` and parameters, swap
    /// scope/context, run the body, restore, convert the body signal.
    fn call_interpreted(
        &mut self,
        function: &JsFunction,
        callee: &Value,
        this: Value,
        args: &[Value],
    ) -> ExecResult<Value> {
        self.step()?;
        let label: Rc<str> = Rc::from(function.frame_label());
        self.tracer.on_call(&label, self.call_stack.len() + 1);
        self.call_stack.push(label);

        let frame_name: &str = if function.name.is_empty() { "anonymous" } else { &function.name };
        let frame = Scope::child(&function.scope, frame_name);
        if function.self_binding && !function.name.is_empty() {
            frame.declare(Rc::clone(&function.name), callee.clone());
        }
        frame.declare("arguments", Value::new_array(args.to_vec()));
        for (i, param) in function.params.iter().enumerate() {
            frame.declare(Rc::clone(param), args.get(i).cloned().unwrap_or(Value::Undefined));
        }

        let saved_scope = mem::replace(&mut self.scope, frame);
        let saved_context = mem::replace(&mut self.context, this);
        install_hoist(self, &function.hoist);
        let result = (function.body)(self);
        self.scope = saved_scope;
        self.context = saved_context;
        self.call_stack.pop();
        self.tracer.on_return(self.call_stack.len());

        match result {
            Err(Flow::Return(value)) => Ok(value),
            Err(signal) => Err(signal),
            Ok(_) => Ok(Value::Undefined),
        }
    }

    /// The `new` primitive: allocate an instance linked to the
    /// constructor's `prototype`, call with it as `this`, and keep the
    /// instance unless the constructor returned an object.
    pub fn construct(&mut self, callee: &Value, args: &[Value]) -> ExecResult<Value> {
        if !callee.is_callable() {
            return Err(Flow::type_error(format!("{} is not a constructor", to_js_string(callee))));
        }
        let prototype = callee.as_object().and_then(|obj| {
            obj.borrow()
                .properties
                .get("prototype")
                .and_then(|p| p.value.as_object().map(Rc::clone))
        });
        let instance = Value::new_object();
        if let (Some(obj), Some(proto)) = (instance.as_object(), prototype) {
            obj.borrow_mut().prototype = Some(proto);
        }
        let result = self.call(callee, instance.clone(), args)?;
        Ok(match result {
            Value::Object(_) => result,
            _ => instance,
        })
    }
}
