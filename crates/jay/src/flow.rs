//! Control-flow signals threaded through thunk results.
//!
//! Non-local transfers (`break`, `continue`, `return`, `throw`, labeled or
//! not) are ordinary tagged values, not host panics or exceptions: a thunk
//! that wants to short-circuit its enclosing statements returns the signal,
//! and each enclosing statement either swallows it (a loop catching
//! `Break`), transforms it (a labeled statement consuming its own
//! `BreakLabel`), or re-propagates it with `?`.
//!
//! The sum type is `Result`: `Ok` carries normal completion, [`Flow`] is
//! the signal arm. Signals can never collide with user values by
//! construction.

use std::rc::Rc;

use crate::{resource::ResourceError, value::Value};

/// Result alias every thunk returns: normal completion or a signal.
pub(crate) type ExecResult<T> = Result<T, Flow>;

/// A control-flow signal in flight.
#[derive(Debug, Clone)]
pub(crate) enum Flow {
    /// Unlabeled `break`.
    Break,
    /// Unlabeled `continue`.
    Continue,
    /// `break name;`
    BreakLabel(Rc<str>),
    /// `continue name;`
    ContinueLabel(Rc<str>),
    /// `return expr;` with the value being returned.
    Return(Value),
    /// An exception in flight, carrying the thrown value.
    Throw(Value),
    /// A resource-limit violation. Unlike `Throw`, this signal passes
    /// through `try/catch` uncaught so scripts cannot outlive their budget.
    Resource(ResourceError),
}

impl Flow {
    /// A thrown `TypeError`-shaped object: `{name: "TypeError", message}`.
    pub fn type_error(message: impl Into<String>) -> Self {
        Self::Throw(Value::new_error("TypeError", message.into()))
    }

    /// A thrown `RangeError`-shaped object.
    pub fn range_error(message: impl Into<String>) -> Self {
        Self::Throw(Value::new_error("RangeError", message.into()))
    }

    /// A thrown `SyntaxError`-shaped object (used by `JSON.parse`).
    pub fn syntax_error(message: impl Into<String>) -> Self {
        Self::Throw(Value::new_error("SyntaxError", message.into()))
    }
}

impl From<ResourceError> for Flow {
    fn from(err: ResourceError) -> Self {
        Self::Resource(err)
    }
}
