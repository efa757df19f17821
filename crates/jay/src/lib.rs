#![doc = include_str!("../../../README.md")]
#![expect(clippy::cast_possible_truncation, reason = "numeric narrowing follows the language's ToInt32/ToUint32 rules")]
#![expect(clippy::cast_sign_loss, reason = "sign-changing casts implement the unsigned coercions")]

pub mod ast;
mod builtins;
mod compile;
mod exception;
mod flow;
mod function;
mod io;
mod machine;
mod object;
mod parse;
mod resource;
mod run;
mod scope;
mod tracer;
mod value;

pub use crate::{
    exception::{CodeLoc, Exception},
    io::{CollectStringConsole, ConsoleStream, ConsoleWriter, StdConsole},
    object::{Object, TypeMismatch},
    resource::{LimitedTracker, NoLimitTracker, ResourceError, ResourceTracker},
    run::{Interpreter, Options},
    tracer::{EvalTracer, NoopTracer, RecordingTracer, StderrTracer, TraceEvent},
};
