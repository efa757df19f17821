//! Public error type raised by the interpreter.

use std::fmt;

use crate::{object::Object, resource::ResourceError};

/// A 1-based source position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodeLoc {
    pub line: u32,
    pub column: u32,
}

impl CodeLoc {
    /// Computes the line/column of a byte offset into `source`.
    #[must_use]
    pub fn from_offset(source: &str, offset: usize) -> Self {
        let mut line = 1;
        let mut column = 1;
        for (i, ch) in source.char_indices() {
            if i >= offset {
                break;
            }
            if ch == '\n' {
                line += 1;
                column = 1;
            } else {
                column += 1;
            }
        }
        Self { line, column }
    }
}

impl fmt::Display for CodeLoc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// Why an `evaluate` call failed.
#[derive(Debug, Clone, PartialEq)]
pub enum Exception {
    /// The source failed to parse, or the AST failed to compile (unknown
    /// node kind, unsupported pattern, misplaced `break`/`continue`).
    Syntax {
        message: String,
        loc: Option<CodeLoc>,
    },
    /// The script threw a value nothing caught.
    Thrown(Object),
    /// A resource limit cut execution short.
    Resource(ResourceError),
}

impl Exception {
    pub(crate) fn syntax(message: impl Into<String>, loc: Option<CodeLoc>) -> Self {
        Self::Syntax {
            message: message.into(),
            loc,
        }
    }

    /// The thrown value, if this exception carries one.
    #[must_use]
    pub fn thrown(&self) -> Option<&Object> {
        match self {
            Self::Thrown(value) => Some(value),
            _ => None,
        }
    }
}

impl fmt::Display for Exception {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Syntax { message, loc: Some(loc) } => write!(f, "SyntaxError: {message} at {loc}"),
            Self::Syntax { message, loc: None } => write!(f, "SyntaxError: {message}"),
            Self::Thrown(Object::Object(entries)) => {
                // Error-shaped objects print like host exceptions.
                match (entries.get("name"), entries.get("message")) {
                    (Some(Object::String(name)), Some(Object::String(message))) => {
                        write!(f, "Uncaught {name}: {message}")
                    }
                    _ => write!(f, "Uncaught {}", Object::Object(entries.clone())),
                }
            }
            Self::Thrown(value) => write!(f, "Uncaught {value}"),
            Self::Resource(err) => write!(f, "ResourceError: {err}"),
        }
    }
}

impl std::error::Error for Exception {}

impl From<ResourceError> for Exception {
    fn from(err: ResourceError) -> Self {
        Self::Resource(err)
    }
}
