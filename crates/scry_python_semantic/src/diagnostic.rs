//! Non-fatal observations made during inference.
//!
//! Missing attributes, slots, or call capability never raise; they produce
//! an empty context set and, where useful for observability, one of these.

use std::fmt;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum DiagnosticKind {
    /// `__call__` was looked up on an instance's class and not found.
    NotCallable,
    /// `__getitem__` was looked up and not found.
    MissingGetitem,
    /// An `__iter__` result had no `__next__`/`next` slot.
    MissingNext,
    /// A value with neither `__iter__` nor container elements was iterated.
    NotIterable,
    /// An `import` referred to a module the evaluator doesn't know.
    UnknownModule,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub message: String,
}

impl Diagnostic {
    pub(crate) fn new(kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}
