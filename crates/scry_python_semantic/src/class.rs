//! Class linearization and class-level lookup.

use rustc_hash::FxHashSet;

use crate::builtins::{self, BuiltinClassId};
use crate::context::{ContextId, ContextKind, ContextSet, TreeNode};
use crate::evaluator::Evaluator;
use crate::filters::Filter;
use crate::{infer, instance};

/// Identity of a class for linearization purposes. Specializations of the
/// same definition collapse onto one key.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
enum MroKey {
    Node(TreeNode),
    Builtin(BuiltinClassId),
}

/// The method resolution order of a class: the class itself, then its bases
/// depth-first with duplicates dropped, ending in `object`.
pub(crate) fn mro(ev: &Evaluator, class: ContextId) -> Vec<ContextId> {
    let mut result = Vec::new();
    let mut seen = FxHashSet::default();
    ev.guard(|| visit(ev, class, &mut result, &mut seen));
    if !seen.contains(&MroKey::Builtin(builtins::OBJECT)) {
        result.push(ev.compiled_class(builtins::OBJECT));
    }
    result
}

fn visit(
    ev: &Evaluator,
    class: ContextId,
    result: &mut Vec<ContextId>,
    seen: &mut FxHashSet<MroKey>,
) {
    match ev.kind(class) {
        ContextKind::Class(data) => {
            if !seen.insert(MroKey::Node(data.node)) {
                return;
            }
            result.push(class);
            let tree = ev.tree(data.node.source);
            let parent = ev.parent(class);
            for &base in tree.class_bases(data.node.node) {
                let Some(parent) = parent else { break };
                let values = infer::infer_expression(ev, parent, data.node.source, base);
                for value in values {
                    if matches!(
                        ev.kind(value),
                        ContextKind::Class(_) | ContextKind::CompiledClass(_)
                    ) {
                        visit(ev, value, result, seen);
                    }
                }
            }
        }
        ContextKind::CompiledClass(id) => {
            let mut current = Some(id);
            while let Some(id) = current {
                if seen.insert(MroKey::Builtin(id)) {
                    result.push(ev.compiled_class(id));
                }
                current = builtins::class(id).base;
            }
        }
        _ => {}
    }
}

/// The base chain of a builtin class, the class itself first.
pub(crate) fn compiled_mro(id: BuiltinClassId) -> Vec<BuiltinClassId> {
    let mut chain = vec![id];
    let mut current = builtins::class(id).base;
    while let Some(base) = current {
        chain.push(base);
        current = builtins::class(base).base;
    }
    chain
}

/// Lookup layers of a class context: one filter per MRO entry.
pub(crate) fn class_filters(ev: &Evaluator, class: ContextId) -> Vec<Filter> {
    mro(ev, class)
        .into_iter()
        .filter_map(|entry| match ev.kind(entry) {
            ContextKind::Class(data) => Some(Filter::Class {
                context: entry,
                node: data.node,
            }),
            ContextKind::CompiledClass(id) => Some(Filter::CompiledClass { class: id }),
            _ => None,
        })
        .collect()
}

/// Applies the descriptor step to class-level values accessed through an
/// instance: functions bind to the receiver, data descriptors run their
/// `__get__`, everything else passes through unchanged.
pub(crate) fn apply_get(
    ev: &Evaluator,
    instance: ContextId,
    owner: ContextId,
    values: ContextSet,
) -> ContextSet {
    let mut result = ContextSet::empty();
    for value in values {
        match ev.kind(value) {
            ContextKind::Function(_) => {
                result.insert(ev.bound_method(instance, value));
            }
            ContextKind::Instance(_) => {
                result.extend(instance::py_get(ev, value, instance, owner));
            }
            _ => result.insert(value),
        }
    }
    result
}
