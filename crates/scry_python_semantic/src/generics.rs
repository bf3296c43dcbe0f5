//! Type-variable inference from constructor call sites.
//!
//! A class whose `__init__` annotates parameters with type variables gets a
//! specialized view when an instance's call site pins those variables down:
//! `Box(1)` with `def __init__(self, item: T)` reads as `Box` with `T = int`.

use scry_python_syntax::NodeKind;

use crate::arguments::Arguments;
use crate::context::{ContextId, ContextKind, ContextSet, Name, TreeNode, TypeVarMap};
use crate::evaluator::{CacheState, Evaluator};
use crate::filters::{Filter, NameBinding};
use crate::{function, infer, instance};

/// The specialized class view of an instance, if its constructor binds any
/// type variables. Re-entrant queries see the plain class.
pub(crate) fn annotated_class(ev: &Evaluator, instance: ContextId) -> Option<ContextId> {
    match ev.annotated_class_cache.borrow().get(&instance) {
        Some(CacheState::Done(result)) => return *result,
        Some(CacheState::InProgress) => return None,
        None => {}
    }
    ev.annotated_class_cache
        .borrow_mut()
        .insert(instance, CacheState::InProgress);
    let result = compute_annotated_class(ev, instance);
    ev.annotated_class_cache
        .borrow_mut()
        .insert(instance, CacheState::Done(result));
    result
}

fn compute_annotated_class(ev: &Evaluator, instance: ContextId) -> Option<ContextId> {
    let ContextKind::Instance(data) = ev.kind(instance) else {
        return None;
    };
    let ContextKind::Class(class_data) = ev.kind(data.class) else {
        return None;
    };
    if class_data.generics.is_some() {
        return None;
    }
    let arguments = Arguments::Instance {
        instance,
        inner: Box::new((*data.arguments).clone()),
    };
    if arguments.is_anonymous() {
        return None;
    }

    // Only constructors defined on the class itself specialize it, and the
    // first one whose signature matches the call decides the bindings.
    let constructors = Filter::Class {
        context: data.class,
        node: class_data.node,
    }
    .get(ev, "__init__");
    for binding in &constructors {
        for function in binding.infer(ev) {
            if !ev.kind(function).is_function() {
                continue;
            }
            if !function::matches_signature(ev, function, &arguments) {
                continue;
            }
            let mut map = TypeVarMap::default();
            bind_type_vars(ev, data.class, function, &arguments, &mut map);
            if map.is_empty() {
                return None;
            }
            let specialized = ev.specialized_class(data.class, map);
            tracing::debug!(
                class = %ev.describe(specialized),
                "inferred specialized class from constructor call site"
            );
            return Some(specialized);
        }
    }
    None
}

/// Collects `param: T` bindings where `T` is a type variable and the call
/// site supplies a value for `param`.
fn bind_type_vars(
    ev: &Evaluator,
    class: ContextId,
    function: ContextId,
    arguments: &Arguments,
    map: &mut TypeVarMap,
) {
    let Some(node) = function::function_node(ev, function) else {
        return;
    };
    let tree = ev.tree(node.source);
    let lookup_context = ev.parent(class).unwrap_or(class);
    for (index, param) in tree.params(node.node).into_iter().enumerate() {
        if index == 0 {
            // The receiver.
            continue;
        }
        let Some(annotation) = tree.param_annotation(param) else {
            continue;
        };
        if tree.kind(annotation) != NodeKind::Name {
            continue;
        }
        let var = tree.value(annotation);
        if !is_type_var(ev, lookup_context, var) {
            continue;
        }
        let values = arguments.positional(ev, index).or_else(|| {
            let target = *tree.children(param).first()?;
            arguments.keyword(ev, tree.value(target))
        });
        let Some(values) = values else {
            continue;
        };
        map.entry(Name::from(var)).or_default().extend(values);
    }
}

/// Whether `name` resolves to a `TypeVar(...)` assignment. The check is
/// syntactic; the right-hand side is never executed.
pub(crate) fn is_type_var(ev: &Evaluator, context: ContextId, name: &str) -> bool {
    infer::resolve_name(ev, context, name)
        .iter()
        .any(|binding| match binding {
            NameBinding::Tree { name, .. } => is_type_var_definition(ev, *name),
            _ => false,
        })
}

fn is_type_var_definition(ev: &Evaluator, name: TreeNode) -> bool {
    let tree = ev.tree(name.source);
    let Some(assignment) = tree.parent(name.node) else {
        return false;
    };
    if tree.kind(assignment) != NodeKind::Assignment {
        return false;
    }
    let Some(&value) = tree.children(assignment).get(1) else {
        return false;
    };
    if tree.kind(value) != NodeKind::Call {
        return false;
    }
    tree.children(value)
        .first()
        .is_some_and(|&callee| {
            tree.kind(callee) == NodeKind::Name && tree.value(callee) == "TypeVar"
        })
}

/// Resolves a type variable name against the enclosing context chain: the
/// specialized class itself, or the instance behind a method execution.
pub(crate) fn resolve_type_var(
    ev: &Evaluator,
    owner: ContextId,
    name: &str,
) -> Option<ContextSet> {
    let mut current = Some(owner);
    while let Some(context) = current {
        match ev.kind(context) {
            ContextKind::Class(data) => {
                if let Some(generics) = &data.generics {
                    if let Some(values) = generics.get(name) {
                        return Some(values.clone());
                    }
                }
            }
            ContextKind::Execution(data) => {
                let receiver = match ev.kind(data.function) {
                    ContextKind::BoundMethod(method) => Some(method.instance),
                    _ => match &*data.arguments {
                        Arguments::Instance { instance, .. } => Some(*instance),
                        _ => None,
                    },
                };
                if let Some(receiver) = receiver {
                    let class = instance::annotated_class_object(ev, receiver);
                    if let ContextKind::Class(class_data) = ev.kind(class) {
                        if let Some(generics) = &class_data.generics {
                            if let Some(values) = generics.get(name) {
                                return Some(values.clone());
                            }
                        }
                    }
                }
            }
            _ => {}
        }
        current = ev.parent(context);
    }
    None
}
