//! Output plumbing for the `console` builtin.
//!
//! Implement [`ConsoleWriter`] to capture or redirect output from sandboxed
//! scripts. The default implementation [`StdConsole`] writes to
//! stdout/stderr.

use std::{cell::RefCell, rc::Rc};

/// Destination stream for a console call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleStream {
    /// `console.log`
    Out,
    /// `console.error`
    Err,
}

/// Receives one formatted line per `console.log`/`console.error` call.
///
/// The line is the space-joined string conversion of the call's arguments,
/// without a trailing newline; the writer decides how to terminate it.
pub trait ConsoleWriter {
    fn write_line(&mut self, stream: ConsoleStream, line: &str);
}

/// Default writer: `console.log` to stdout, `console.error` to stderr.
#[derive(Debug, Default)]
pub struct StdConsole;

impl ConsoleWriter for StdConsole {
    fn write_line(&mut self, stream: ConsoleStream, line: &str) {
        match stream {
            ConsoleStream::Out => println!("{line}"),
            ConsoleStream::Err => eprintln!("{line}"),
        }
    }
}

/// Writer that collects every line into a shared buffer, for tests and
/// embedders that want to inspect script output.
#[derive(Debug, Default, Clone)]
pub struct CollectStringConsole {
    lines: Rc<RefCell<Vec<String>>>,
}

impl CollectStringConsole {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All lines written so far, in order, both streams interleaved.
    #[must_use]
    pub fn lines(&self) -> Vec<String> {
        self.lines.borrow().clone()
    }
}

impl ConsoleWriter for CollectStringConsole {
    fn write_line(&mut self, _stream: ConsoleStream, line: &str) {
        self.lines.borrow_mut().push(line.to_owned());
    }
}
