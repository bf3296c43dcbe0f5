//! The inference graph: contexts and context sets.
//!
//! A [`Context`] is a node in the inference graph, representing a possible
//! runtime entity (module, class, function, instance, ...). Contexts live in
//! an arena owned by the evaluator and are referred to by [`ContextId`];
//! the `parent` link is a non-owning reference used only for scope-chain
//! walks.

use std::rc::Rc;

use compact_str::CompactString;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use scry_python_syntax::NodeId;

use crate::arguments::Arguments;
use crate::builtins::BuiltinClassId;

/// An attribute or binding name.
pub type Name = CompactString;

/// Id uniquely identifying a context in the evaluator's arena.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContextId(u32);

impl ContextId {
    pub(crate) fn new(index: usize) -> Self {
        Self(u32::try_from(index).expect("context arena too large"))
    }

    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Id of a registered source (module or synthetic snippet).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourceId(u32);

impl SourceId {
    pub(crate) fn new(index: usize) -> Self {
        Self(u32::try_from(index).expect("source arena too large"))
    }

    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// A node handle: which source, which node within its tree.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct TreeNode {
    pub source: SourceId,
    pub node: NodeId,
}

impl TreeNode {
    pub const fn new(source: SourceId, node: NodeId) -> Self {
        Self { source, node }
    }
}

/// A deduplicated, insertion-ordered set of contexts: "one of these,
/// statically unknown which".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContextSet(SmallVec<[ContextId; 4]>);

impl ContextSet {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn single(context: ContextId) -> Self {
        let mut set = Self::default();
        set.insert(context);
        set
    }

    pub fn insert(&mut self, context: ContextId) {
        if !self.0.contains(&context) {
            self.0.push(context);
        }
    }

    pub fn extend(&mut self, other: impl IntoIterator<Item = ContextId>) {
        for context in other {
            self.insert(context);
        }
    }

    pub fn union(sets: impl IntoIterator<Item = ContextSet>) -> Self {
        let mut result = Self::default();
        for set in sets {
            result.extend(set);
        }
        result
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn contains(&self, context: ContextId) -> bool {
        self.0.contains(&context)
    }

    pub fn iter(&self) -> impl Iterator<Item = ContextId> + '_ {
        self.0.iter().copied()
    }
}

impl IntoIterator for ContextSet {
    type Item = ContextId;
    type IntoIter = smallvec::IntoIter<[ContextId; 4]>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl FromIterator<ContextId> for ContextSet {
    fn from_iter<I: IntoIterator<Item = ContextId>>(iter: I) -> Self {
        let mut set = Self::default();
        set.extend(iter);
        set
    }
}

/// A type-variable binding: type-variable name to inferred context set.
pub(crate) type TypeVarMap = FxHashMap<Name, ContextSet>;

#[derive(Debug, Clone)]
pub(crate) struct Context {
    pub(crate) kind: ContextKind,
    pub(crate) parent: Option<ContextId>,
}

/// Closed tagged variant over every kind of context the engine models.
/// Capabilities are dispatched by matching on the tag.
#[derive(Debug, Clone, is_macro::Is)]
pub(crate) enum ContextKind {
    Module(ModuleData),
    Class(ClassData),
    Function(FunctionData),
    BoundMethod(BoundMethodData),
    Execution(ExecutionData),
    Instance(InstanceData),
    CompiledClass(BuiltinClassId),
    CompiledValue(CompiledValue),
}

#[derive(Debug, Clone)]
pub(crate) struct ModuleData {
    pub(crate) source: SourceId,
    pub(crate) name: Name,
}

#[derive(Debug, Clone)]
pub(crate) struct ClassData {
    pub(crate) node: TreeNode,
    /// Present on the "annotated class view": the class read with its type
    /// variables substituted.
    pub(crate) generics: Option<Rc<TypeVarMap>>,
}

#[derive(Debug, Clone)]
pub(crate) struct FunctionData {
    pub(crate) node: TreeNode,
}

#[derive(Debug, Clone)]
pub(crate) struct BoundMethodData {
    pub(crate) instance: ContextId,
    pub(crate) function: ContextId,
}

/// A function body being evaluated with a concrete (or synthesized)
/// argument list; acts as the lexical parent of names inside the body.
#[derive(Debug, Clone)]
pub(crate) struct ExecutionData {
    pub(crate) function: ContextId,
    pub(crate) arguments: Rc<Arguments>,
}

#[derive(Debug, Clone)]
pub(crate) struct InstanceData {
    pub(crate) class: ContextId,
    pub(crate) arguments: Rc<Arguments>,
    pub(crate) kind: InstanceKind,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum InstanceKind {
    /// Backed by a builtin/native class.
    Compiled,
    /// Backed by a user-defined class with a real call site.
    Tree,
    /// No call site exists; constructor arguments are synthesized.
    Anonymous,
}

#[derive(Debug, Clone)]
pub(crate) enum CompiledValue {
    /// The `None` object.
    None,
    /// An unbound builtin routine, e.g. `list.append`.
    Function {
        class: BuiltinClassId,
        method: usize,
    },
    /// A builtin routine bound to an instance. Reported signatures drop the
    /// receiver parameter.
    BoundMethod {
        instance: ContextId,
        class: BuiltinClassId,
        method: usize,
    },
}

/// The contexts of an evaluator, indexed by [`ContextId`].
#[derive(Debug, Default)]
pub(crate) struct Contexts {
    contexts: Vec<Context>,
}

impl Contexts {
    pub(crate) fn alloc(&mut self, context: Context) -> ContextId {
        let id = ContextId::new(self.contexts.len());
        self.contexts.push(context);
        id
    }

    pub(crate) fn get(&self, id: ContextId) -> &Context {
        &self.contexts[id.index()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_set_deduplicates() {
        let a = ContextId::new(0);
        let b = ContextId::new(1);
        let set: ContextSet = [a, b, a, b].into_iter().collect();
        assert_eq!(set.len(), 2);
        assert_eq!(set.iter().collect::<Vec<_>>(), vec![a, b]);
    }

    #[test]
    fn union_preserves_first_insertion_order() {
        let a = ContextId::new(0);
        let b = ContextId::new(1);
        let c = ContextId::new(2);
        let set = ContextSet::union([
            ContextSet::single(b),
            [a, b].into_iter().collect(),
            ContextSet::single(c),
        ]);
        assert_eq!(set.iter().collect::<Vec<_>>(), vec![b, a, c]);
    }
}
