//! Call argument representations.
//!
//! Arguments come in three flavors: none at all (anonymous executions of a
//! callable whose call site is unknown), pre-inferred value sets, and a
//! pointer to a call node whose children are inferred lazily. A fourth
//! wrapper prepends the receiver when a bound method forwards to its
//! underlying function.

use scry_python_syntax::NodeKind;

use crate::context::{ContextId, ContextSet, Name, TreeNode};
use crate::evaluator::Evaluator;
use crate::infer;

#[derive(Debug, Clone)]
pub enum Arguments {
    /// No call site: parameters fall back to annotations and docstrings.
    Anonymous,
    /// Positional values that were already inferred.
    Values(Vec<ContextSet>),
    /// A call expression in a tree, inferred on demand.
    Tree { context: ContextId, call: TreeNode },
    /// Receiver prepended to the wrapped arguments.
    Instance {
        instance: ContextId,
        inner: Box<Arguments>,
    },
}

impl Arguments {
    pub(crate) fn is_anonymous(&self) -> bool {
        match self {
            Arguments::Anonymous => true,
            Arguments::Instance { inner, .. } => inner.is_anonymous(),
            _ => false,
        }
    }

    /// The inferred values at a positional index, if an argument is there.
    pub(crate) fn positional(&self, ev: &Evaluator, index: usize) -> Option<ContextSet> {
        match self {
            Arguments::Anonymous => None,
            Arguments::Values(values) => values.get(index).cloned(),
            Arguments::Tree { context, call } => {
                let tree = ev.tree(call.source);
                let argument = tree
                    .children(call.node)
                    .iter()
                    .skip(1) // callee
                    .filter(|&&child| tree.kind(child) != NodeKind::Keyword)
                    .nth(index)
                    .copied()?;
                Some(infer::infer_expression(ev, *context, call.source, argument))
            }
            Arguments::Instance { instance, inner } => {
                if index == 0 {
                    Some(ContextSet::single(*instance))
                } else {
                    inner.positional(ev, index - 1)
                }
            }
        }
    }

    pub(crate) fn keyword(&self, ev: &Evaluator, name: &str) -> Option<ContextSet> {
        match self {
            Arguments::Anonymous | Arguments::Values(_) => None,
            Arguments::Tree { context, call } => {
                let tree = ev.tree(call.source);
                for &child in tree.children(call.node).iter().skip(1) {
                    if tree.kind(child) != NodeKind::Keyword {
                        continue;
                    }
                    let children = tree.children(child);
                    let (&key, &value) = match (children.first(), children.get(1)) {
                        (Some(key), Some(value)) => (key, value),
                        _ => continue,
                    };
                    if tree.value(key) == name {
                        return Some(infer::infer_expression(ev, *context, call.source, value));
                    }
                }
                None
            }
            Arguments::Instance { inner, .. } => inner.keyword(ev, name),
        }
    }

    pub(crate) fn positional_count(&self, ev: &Evaluator) -> usize {
        match self {
            Arguments::Anonymous => 0,
            Arguments::Values(values) => values.len(),
            Arguments::Tree { call, .. } => {
                let tree = ev.tree(call.source);
                tree.children(call.node)
                    .iter()
                    .skip(1)
                    .filter(|&&child| tree.kind(child) != NodeKind::Keyword)
                    .count()
            }
            Arguments::Instance { inner, .. } => 1 + inner.positional_count(ev),
        }
    }

    pub(crate) fn keyword_names(&self, ev: &Evaluator) -> Vec<Name> {
        match self {
            Arguments::Anonymous | Arguments::Values(_) => Vec::new(),
            Arguments::Tree { call, .. } => {
                let tree = ev.tree(call.source);
                tree.children(call.node)
                    .iter()
                    .skip(1)
                    .filter(|&&child| tree.kind(child) == NodeKind::Keyword)
                    .filter_map(|&child| {
                        let key = *tree.children(child).first()?;
                        Some(Name::from(tree.value(key)))
                    })
                    .collect()
            }
            Arguments::Instance { inner, .. } => inner.keyword_names(ev),
        }
    }

    /// The first positional argument, skipping the bound receiver.
    pub(crate) fn first_non_receiver(&self, ev: &Evaluator) -> Option<ContextSet> {
        match self {
            Arguments::Instance { inner, .. } => inner.first_non_receiver(ev),
            _ => self.positional(ev, 0),
        }
    }
}
