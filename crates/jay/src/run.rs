//! Public interface for running scripts.

use std::rc::Rc;

use crate::{
    ast::Program,
    builtins,
    compile::compile_program,
    exception::{CodeLoc, Exception},
    flow::Flow,
    io::{ConsoleWriter, StdConsole},
    machine::Machine,
    object::{self, Object},
    parse,
    resource::{LimitedTracker, NoLimitTracker, ResourceTracker},
    scope::Scope,
    tracer::{EvalTracer, NoopTracer},
    value::{JsObject, ObjRef},
};

/// Execution options.
///
/// A zero disables the corresponding limit; the default runs unlimited.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Options {
    /// Wall-clock budget in milliseconds.
    pub timeout_ms: u64,
    /// Evaluation step budget (loop iterations plus function calls).
    pub max_steps: u64,
}

/// Primary interface for running scripts.
///
/// The interpreter owns a persistent global object: bindings survive
/// across `evaluate` calls, and mutations scripts make to globals are
/// visible through [`Interpreter::get_global`] afterwards.
///
/// # Example
/// ```
/// use jay::{Interpreter, Object};
///
/// let mut interp = Interpreter::new();
/// interp.set_global("x", Object::Number(41.0));
/// let result = interp.evaluate("x + 1").unwrap();
/// assert_eq!(result, Object::Number(42.0));
/// ```
pub struct Interpreter {
    options: Options,
    global: ObjRef,
    root_scope: Rc<Scope>,
    console: Box<dyn ConsoleWriter>,
    tracer: Box<dyn EvalTracer>,
    last_value: Object,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter {
    /// An interpreter with no resource limits.
    #[must_use]
    pub fn new() -> Self {
        Self::with_options(Options::default())
    }

    #[must_use]
    pub fn with_options(options: Options) -> Self {
        let global = JsObject::plain().into_ref();
        builtins::install_globals(&global);
        let root_scope = Scope::root(Rc::clone(&global));
        Self {
            options,
            global,
            root_scope,
            console: Box::new(StdConsole),
            tracer: Box::new(NoopTracer),
            last_value: Object::Undefined,
        }
    }

    /// Parses and runs `source`, returning the value of its last
    /// completed statement expression.
    pub fn evaluate(&mut self, source: &str) -> Result<Object, Exception> {
        let program = parse::parse(source)
            .map_err(|err| Exception::syntax(err.message, Some(CodeLoc::from_offset(source, err.offset))))?;
        self.evaluate_program(&program, source)
    }

    /// Runs an already-parsed ESTree program.
    ///
    /// `source` must be the text the program was parsed from: function
    /// values slice it by their `start`/`end` offsets for `toString`.
    pub fn evaluate_program(&mut self, program: &Program, source: &str) -> Result<Object, Exception> {
        let thunk = compile_program(program, source)
            .map_err(|err| Exception::syntax(err.message, Some(CodeLoc::from_offset(source, err.offset))))?;

        let mut tracker: Box<dyn ResourceTracker> = if self.options.timeout_ms == 0 && self.options.max_steps == 0 {
            Box::new(NoLimitTracker)
        } else {
            let timeout = (self.options.timeout_ms > 0)
                .then(|| std::time::Duration::from_millis(self.options.timeout_ms));
            let max_steps = (self.options.max_steps > 0).then_some(self.options.max_steps);
            Box::new(LimitedTracker::new(max_steps, timeout))
        };

        let mut machine = Machine::new(
            &self.root_scope,
            tracker.as_mut(),
            self.tracer.as_mut(),
            self.console.as_mut(),
        );
        let result = thunk(&mut machine);
        let value = machine.value.clone();
        debug_assert!(machine.call_stack.is_empty());
        match result {
            Ok(_) => {
                self.last_value = object::from_value(&value);
                Ok(self.last_value.clone())
            }
            Err(Flow::Throw(thrown)) => Err(Exception::Thrown(object::from_value(&thrown))),
            Err(Flow::Resource(err)) => Err(Exception::Resource(err)),
            // Loose break/continue/return signals are rejected at compile
            // time and cannot reach the driver.
            Err(_) => Err(Exception::syntax("unexpected control flow at top level", None)),
        }
    }

    /// The last recorded top-level statement value.
    #[must_use]
    pub fn value(&self) -> &Object {
        &self.last_value
    }

    /// Binds a global before (or between) runs.
    pub fn set_global(&mut self, name: &str, value: Object) {
        self.global.borrow_mut().set(name, object::to_value(&value));
    }

    /// Reads a global after a run; `Object::Undefined` when unbound.
    #[must_use]
    pub fn get_global(&self, name: &str) -> Object {
        self.global
            .borrow()
            .properties
            .get(name)
            .map_or(Object::Undefined, |prop| object::from_value(&prop.value))
    }

    /// Binds a Rust function as a global. The callback receives the
    /// evaluated arguments; an `Err` value is thrown into the script.
    pub fn set_native(&mut self, name: &str, func: impl Fn(&[Object]) -> Result<Object, Object> + 'static) {
        let native = crate::function::native_value(name, move |_, _, args| {
            let args: Vec<Object> = args.iter().map(object::from_value).collect();
            match func(&args) {
                Ok(result) => Ok(object::to_value(&result)),
                Err(thrown) => Err(Flow::Throw(object::to_value(&thrown))),
            }
        });
        self.global.borrow_mut().set(name, native);
    }

    /// Replaces the console writer scripts print through.
    pub fn set_console(&mut self, console: Box<dyn ConsoleWriter>) {
        self.console = console;
    }

    /// Replaces the execution tracer.
    pub fn set_tracer(&mut self, tracer: Box<dyn EvalTracer>) {
        self.tracer = tracer;
    }
}
