//! Instances: attribute lookup through the MRO, the special method
//! protocol, iteration, and element tracking for builtin containers.

use scry_python_syntax::NodeKind;

use crate::arguments::Arguments;
use crate::builtins;
use crate::context::{ContextId, ContextKind, ContextSet, TreeNode};
use crate::diagnostic::{Diagnostic, DiagnosticKind};
use crate::evaluator::{CacheState, Evaluator};
use crate::filters::{Filter, FilterOptions};
use crate::{class, generics, infer};

/// Lookup layers of an instance: the self-assigned attributes of every MRO
/// class (when enabled), then every class's members seen through the
/// instance. The two groups are not interleaved: a `self.x` assigned in a
/// base-class method shadows a class-level `x` anywhere in the MRO.
pub(crate) fn instance_filters(
    ev: &Evaluator,
    instance: ContextId,
    include_self_names: bool,
) -> Vec<Filter> {
    let class = annotated_class_object(ev, instance);
    let mro = class::mro(ev, class);
    let mut filters = Vec::new();
    if include_self_names {
        for &entry in &mro {
            if ev.kind(entry).is_class() {
                filters.push(Filter::SelfAttributes {
                    instance,
                    class: entry,
                });
            }
        }
    }
    for &entry in &mro {
        match ev.kind(entry) {
            ContextKind::Class(_) => {
                filters.push(Filter::InstanceClass {
                    instance,
                    class: entry,
                });
            }
            ContextKind::CompiledClass(id) => {
                filters.push(Filter::CompiledInstanceClass {
                    instance,
                    class: id,
                });
            }
            _ => {}
        }
    }
    filters
}

/// The class an instance is read through: for tree instances this is the
/// class with inferred type variables substituted, when there are any.
pub(crate) fn annotated_class_object(ev: &Evaluator, instance: ContextId) -> ContextId {
    let ContextKind::Instance(data) = ev.kind(instance) else {
        return instance;
    };
    if !ev.kind(data.class).is_class() {
        return data.class;
    }
    generics::annotated_class(ev, instance).unwrap_or(data.class)
}

/// Class-level bindings for a special method. Self-assigned names never
/// satisfy the protocol.
fn slot_values(ev: &Evaluator, instance: ContextId, name: &str) -> ContextSet {
    let bindings = ev.attribute_bindings(
        instance,
        name,
        FilterOptions {
            include_self_names: false,
        },
    );
    ContextSet::union(bindings.iter().map(|binding| binding.infer(ev)))
}

/// Executes a special method, or `None` if the slot is absent.
fn execute_slot(
    ev: &Evaluator,
    instance: ContextId,
    name: &str,
    arguments: &Arguments,
) -> Option<ContextSet> {
    let callables = slot_values(ev, instance, name);
    if callables.is_empty() {
        return None;
    }
    Some(ContextSet::union(
        callables
            .iter()
            .map(|callable| ev.execute(callable, arguments.clone())),
    ))
}

/// `instance(...)`: dispatches to `__call__`.
pub(crate) fn py_call(ev: &Evaluator, instance: ContextId, arguments: Arguments) -> ContextSet {
    match execute_slot(ev, instance, "__call__", &arguments) {
        Some(values) => values,
        None => {
            ev.add_diagnostic(Diagnostic::new(
                DiagnosticKind::NotCallable,
                format!("{} is not callable", ev.describe(instance)),
            ));
            ContextSet::empty()
        }
    }
}

/// The descriptor read step: `descriptor.__get__(obj, owner)`. Values whose
/// class defines no `__get__` pass through unchanged.
pub(crate) fn py_get(
    ev: &Evaluator,
    descriptor: ContextId,
    obj: ContextId,
    owner: ContextId,
) -> ContextSet {
    let arguments = Arguments::Values(vec![ContextSet::single(obj), ContextSet::single(owner)]);
    match execute_slot(ev, descriptor, "__get__", &arguments) {
        Some(values) => values,
        None => ContextSet::single(descriptor),
    }
}

/// `instance[index]`: dispatches to `__getitem__`.
pub(crate) fn py_getitem(ev: &Evaluator, instance: ContextId, index: ContextSet) -> ContextSet {
    let arguments = Arguments::Values(vec![index]);
    match execute_slot(ev, instance, "__getitem__", &arguments) {
        Some(values) => values,
        None => {
            ev.add_diagnostic(Diagnostic::new(
                DiagnosticKind::MissingGetitem,
                format!("{} is not subscriptable", ev.describe(instance)),
            ));
            ContextSet::empty()
        }
    }
}

/// Iterates every value in `values`, yielding the union of element types.
///
/// The protocol runs `__iter__` once per instance and drains the resulting
/// iterators through the version-selected `next` slot.
pub(crate) fn py_iter(ev: &Evaluator, values: ContextSet) -> ContextSet {
    let mut elements = ContextSet::empty();
    for value in values {
        if !ev.kind(value).is_instance() {
            ev.add_diagnostic(Diagnostic::new(
                DiagnosticKind::NotIterable,
                format!("{} is not iterable", ev.describe(value)),
            ));
            continue;
        }
        match execute_slot(ev, value, "__iter__", &Arguments::Values(Vec::new())) {
            Some(iterators) => {
                let next_slot = ev.settings().python_version.next_slot_name();
                for iterator in iterators {
                    if !ev.kind(iterator).is_instance() {
                        continue;
                    }
                    match execute_slot(ev, iterator, next_slot, &Arguments::Values(Vec::new())) {
                        Some(next_values) => elements.extend(next_values),
                        None => {
                            ev.add_diagnostic(Diagnostic::new(
                                DiagnosticKind::MissingNext,
                                format!(
                                    "iterator {} has no {next_slot} method",
                                    ev.describe(iterator)
                                ),
                            ));
                        }
                    }
                }
            }
            None => elements.extend(default_iteration(ev, value)),
        }
    }
    elements
}

/// Iteration fallback for values without `__iter__`.
fn default_iteration(ev: &Evaluator, instance: ContextId) -> ContextSet {
    if let ContextKind::Instance(data) = ev.kind(instance) {
        if let ContextKind::CompiledClass(id) = ev.kind(data.class) {
            if builtins::is_container(id) {
                return element_types(ev, instance);
            }
        }
    }
    ev.add_diagnostic(Diagnostic::new(
        DiagnosticKind::NotIterable,
        format!("{} is not iterable", ev.describe(instance)),
    ));
    ContextSet::empty()
}

/// The element types of a container instance, drawn from its construction
/// site and, for lists and sets built at module level, from later mutating
/// calls on the bound name.
pub(crate) fn element_types(ev: &Evaluator, instance: ContextId) -> ContextSet {
    let ContextKind::Instance(data) = ev.kind(instance) else {
        return ContextSet::empty();
    };
    let mut elements = match &*data.arguments {
        Arguments::Anonymous => ContextSet::empty(),
        Arguments::Values(values) => ContextSet::union(values.iter().cloned()),
        arguments @ (Arguments::Tree { .. } | Arguments::Instance { .. }) => {
            match arguments.first_non_receiver(ev) {
                // dict(x)/list(x): the elements come from iterating x.
                Some(values) => ev.guard(|| py_iter(ev, values)),
                None => ContextSet::empty(),
            }
        }
    };
    if ev.settings().dynamic_array_additions {
        elements.extend(dynamic_addition_types(ev, instance, &data.arguments));
    }
    elements
}

/// Finds `name.append(...)`/`name.add(...)`/`name.insert(...)` calls on a
/// container bound to a module-level name and infers the added values.
fn dynamic_addition_types(
    ev: &Evaluator,
    instance: ContextId,
    arguments: &Arguments,
) -> ContextSet {
    let ContextKind::Instance(data) = ev.kind(instance) else {
        return ContextSet::empty();
    };
    let ContextKind::CompiledClass(id) = ev.kind(data.class) else {
        return ContextSet::empty();
    };
    if id != builtins::LIST && id != builtins::SET {
        return ContextSet::empty();
    }
    let Arguments::Tree { context, call } = arguments else {
        return ContextSet::empty();
    };
    if !ev.kind(*context).is_module() {
        return ContextSet::empty();
    }
    let tree = ev.tree(call.source);
    // The construction must bind a plain module-level name.
    let Some(assignment) = tree.parent(call.node) else {
        return ContextSet::empty();
    };
    if tree.kind(assignment) != NodeKind::Assignment {
        return ContextSet::empty();
    }
    let Some(&target) = tree.children(assignment).first() else {
        return ContextSet::empty();
    };
    if tree.kind(target) != NodeKind::Name {
        return ContextSet::empty();
    }
    let bound_name = tree.value(target).to_string();

    let mut added = ContextSet::empty();
    for node in tree.descendants(tree.root()) {
        if tree.kind(node) != NodeKind::Call {
            continue;
        }
        let children = tree.children(node);
        let Some(&callee) = children.first() else {
            continue;
        };
        if tree.kind(callee) != NodeKind::Attribute {
            continue;
        }
        let attr_children = tree.children(callee);
        let (Some(&base), Some(&method)) = (attr_children.first(), attr_children.get(1)) else {
            continue;
        };
        if tree.kind(base) != NodeKind::Name || tree.value(base) != bound_name {
            continue;
        }
        // insert(index, value) carries the value second.
        let value_index = match tree.value(method) {
            "append" | "add" => 1,
            "insert" => 2,
            _ => continue,
        };
        let Some(&argument) = children.get(value_index) else {
            continue;
        };
        added.extend(ev.guard(|| infer::infer_expression(ev, *context, call.source, argument)));
    }
    added
}

/// Rebuilds the context chain for a node inside one of `class`'s methods so
/// that inference there sees the receiver bound to `instance`. The `__init__`
/// execution additionally sees the instance's constructor arguments.
///
/// Re-entrant lookups resolve to the class itself while a chain is still
/// being built.
pub(crate) fn create_instance_context(
    ev: &Evaluator,
    instance: ContextId,
    class: ContextId,
    node: scry_python_syntax::NodeId,
) -> ContextId {
    let ContextKind::Class(data) = ev.kind(class) else {
        return class;
    };
    let key = (
        instance,
        TreeNode {
            source: data.node.source,
            node,
        },
    );
    match ev.instance_context_cache.borrow().get(&key) {
        Some(CacheState::Done(context)) => return *context,
        Some(CacheState::InProgress) => return class,
        None => {}
    }
    ev.instance_context_cache
        .borrow_mut()
        .insert(key, CacheState::InProgress);
    let context = build_instance_context(ev, instance, class, node);
    ev.instance_context_cache
        .borrow_mut()
        .insert(key, CacheState::Done(context));
    context
}

fn build_instance_context(
    ev: &Evaluator,
    instance: ContextId,
    class: ContextId,
    node: scry_python_syntax::NodeId,
) -> ContextId {
    let ContextKind::Class(data) = ev.kind(class) else {
        return class;
    };
    let tree = ev.tree(data.node.source);
    let Some(scope) = tree.parent_scope(node) else {
        // The node escaped the class body. Filters only hand out nodes from
        // inside it, so this is a broken invariant, not bad user input.
        panic!("node has no enclosing scope inside its class");
    };
    if scope == data.node.node {
        return class;
    }
    match tree.kind(scope) {
        NodeKind::FuncDef => {
            let parent = create_instance_context(ev, instance, class, scope);
            let function = ev.function_context(
                parent,
                TreeNode {
                    source: data.node.source,
                    node: scope,
                },
            );
            let bound = ev.bound_method(instance, function);
            // Only the constructor replays the instance's call site; other
            // methods run without known arguments.
            let is_init = tree.value(tree.definition_name(scope)) == "__init__"
                && tree.parent_scope(scope) == Some(data.node.node);
            let inner = if is_init {
                instance_arguments(ev, instance)
            } else {
                Arguments::Anonymous
            };
            ev.execution(
                bound,
                Arguments::Instance {
                    instance,
                    inner: Box::new(inner),
                },
            )
        }
        NodeKind::ClassDef => {
            let parent = create_instance_context(ev, instance, class, scope);
            ev.class_context(
                parent,
                TreeNode {
                    source: data.node.source,
                    node: scope,
                },
            )
        }
        NodeKind::Comprehension => create_instance_context(ev, instance, class, scope),
        kind => panic!("unexpected scope kind {kind:?} inside a class body"),
    }
}

fn instance_arguments(ev: &Evaluator, instance: ContextId) -> Arguments {
    match ev.kind(instance) {
        ContextKind::Instance(data) => (*data.arguments).clone(),
        _ => Arguments::Anonymous,
    }
}
