//! Static instance-and-attribute inference for a Python subset.
//!
//! The engine answers "what can this expression be?" without running any
//! code: modules are parsed, classes are linearized, instances resolve
//! attributes through filter chains, and the special method protocol
//! (`__call__`, `__get__`, `__getitem__`, `__iter__`) is dispatched
//! statically. Every answer is a [`ContextSet`]: a deduplicated union of
//! candidate values, empty when nothing is known.
//!
//! The entry point is [`Evaluator`]: register modules with
//! [`Evaluator::add_module`], then query attributes, executions, and
//! iteration on the returned contexts.

mod arguments;
mod builtins;
mod class;
mod context;
mod diagnostic;
pub mod docstrings;
mod evaluator;
mod filters;
mod function;
mod generics;
mod infer;
mod instance;
mod settings;

pub use arguments::Arguments;
pub use builtins::BuiltinClassId;
pub use context::{ContextId, ContextSet, Name, SourceId, TreeNode};
pub use diagnostic::{Diagnostic, DiagnosticKind};
pub use evaluator::Evaluator;
pub use filters::{Filter, FilterOptions, NameBinding};
pub use settings::{PythonVersion, Settings};
