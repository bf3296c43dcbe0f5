//! Expression and definition inference.

use scry_python_syntax::{NodeId, NodeKind};

use crate::arguments::Arguments;
use crate::builtins;
use crate::context::{ContextId, ContextKind, ContextSet, InstanceKind, SourceId, TreeNode};
use crate::diagnostic::{Diagnostic, DiagnosticKind};
use crate::evaluator::Evaluator;
use crate::filters::{FilterOptions, NameBinding};
use crate::{function, instance};

/// Infers the values an expression can evaluate to.
pub(crate) fn infer_expression(
    ev: &Evaluator,
    context: ContextId,
    source: SourceId,
    node: NodeId,
) -> ContextSet {
    ev.guard(|| infer_expression_inner(ev, context, source, node))
}

fn infer_expression_inner(
    ev: &Evaluator,
    context: ContextId,
    source: SourceId,
    node: NodeId,
) -> ContextSet {
    let tree = ev.tree(source);
    match tree.kind(node) {
        NodeKind::Name => infer_name(ev, context, tree.value(node)),
        NodeKind::Number => {
            let class = if tree[node].is_float_literal() {
                builtins::FLOAT
            } else {
                builtins::INT
            };
            ContextSet::single(ev.compiled_instance(
                class,
                Arguments::Anonymous,
                InstanceKind::Compiled,
            ))
        }
        NodeKind::String => ContextSet::single(ev.compiled_instance(
            builtins::STR,
            Arguments::Anonymous,
            InstanceKind::Compiled,
        )),
        NodeKind::Attribute => {
            let children = tree.children(node);
            let (Some(&base), Some(&attr)) = (children.first(), children.get(1)) else {
                return ContextSet::empty();
            };
            let name = tree.value(attr).to_string();
            let bases = infer_expression_inner(ev, context, source, base);
            ContextSet::union(bases.iter().map(|value| ev.attribute(value, &name)))
        }
        NodeKind::Call => {
            let Some(&callee) = tree.children(node).first() else {
                return ContextSet::empty();
            };
            let callees = infer_expression_inner(ev, context, source, callee);
            let arguments = Arguments::Tree {
                context,
                call: TreeNode { source, node },
            };
            ContextSet::union(
                callees
                    .iter()
                    .map(|value| ev.execute(value, arguments.clone())),
            )
        }
        NodeKind::Subscript => {
            let children = tree.children(node);
            let (Some(&base), Some(&index)) = (children.first(), children.get(1)) else {
                return ContextSet::empty();
            };
            let bases = infer_expression_inner(ev, context, source, base);
            let mut result = ContextSet::empty();
            for value in bases {
                match ev.kind(value) {
                    ContextKind::Instance(_) => {
                        let index = infer_expression_inner(ev, context, source, index);
                        result.extend(instance::py_getitem(ev, value, index));
                    }
                    // Subscripting a class (`list[int]`) reads as the class.
                    ContextKind::Class(_) | ContextKind::CompiledClass(_) => {
                        result.insert(value);
                    }
                    _ => {}
                }
            }
            result
        }
        NodeKind::BinaryOp => {
            let children = tree.children(node);
            ContextSet::union(
                children
                    .iter()
                    .map(|&child| infer_expression_inner(ev, context, source, child)),
            )
        }
        NodeKind::ListDisplay => display_instance(ev, context, source, node, builtins::LIST),
        NodeKind::TupleDisplay => display_instance(ev, context, source, node, builtins::TUPLE),
        NodeKind::SetDisplay => display_instance(ev, context, source, node, builtins::SET),
        NodeKind::DictDisplay => ContextSet::single(ev.compiled_instance(
            builtins::DICT,
            Arguments::Values(Vec::new()),
            InstanceKind::Compiled,
        )),
        NodeKind::Comprehension => {
            let children = tree.children(node);
            let (Some(&element), Some(&target), Some(&iterable)) =
                (children.first(), children.get(1), children.get(2))
            else {
                return ContextSet::empty();
            };
            let iterated = instance::py_iter(
                ev,
                infer_expression_inner(ev, context, source, iterable),
            );
            // `[x for x in xs]` yields the iterated elements directly; other
            // element shapes are inferred in the enclosing scope, with the
            // target unknown.
            let elements = if tree.kind(element) == NodeKind::Name
                && tree.value(element) == tree.value(target)
            {
                iterated
            } else {
                infer_expression_inner(ev, context, source, element)
            };
            ContextSet::single(ev.compiled_instance(
                builtins::LIST,
                Arguments::Values(vec![elements]),
                InstanceKind::Compiled,
            ))
        }
        _ => ContextSet::empty(),
    }
}

fn display_instance(
    ev: &Evaluator,
    context: ContextId,
    source: SourceId,
    node: NodeId,
    class: builtins::BuiltinClassId,
) -> ContextSet {
    let tree = ev.tree(source);
    let elements = tree
        .children(node)
        .iter()
        .map(|&child| infer_expression_inner(ev, context, source, child))
        .collect();
    ContextSet::single(ev.compiled_instance(
        class,
        Arguments::Values(elements),
        InstanceKind::Compiled,
    ))
}

fn infer_name(ev: &Evaluator, context: ContextId, name: &str) -> ContextSet {
    let bindings = resolve_name(ev, context, name);
    if !bindings.is_empty() {
        return ContextSet::union(bindings.iter().map(|binding| binding.infer(ev)));
    }
    // Builtin namespace fallback.
    match name {
        "None" => ContextSet::single(ev.none_object()),
        "True" | "False" => ContextSet::single(ev.compiled_instance(
            builtins::BOOL,
            Arguments::Anonymous,
            InstanceKind::Compiled,
        )),
        _ => {
            if let Some(id) = builtins::by_name(name) {
                return ContextSet::single(ev.compiled_class(id));
            }
            // Registered modules act as an importable namespace.
            if let Some(module) = ev.module(name) {
                return ContextSet::single(module);
            }
            ContextSet::empty()
        }
    }
}

/// Resolves a plain name against the lexical chain. Class scopes are only
/// visible to names written directly in the class body, never to nested
/// function bodies.
pub(crate) fn resolve_name(ev: &Evaluator, context: ContextId, name: &str) -> Vec<NameBinding> {
    let mut current = Some(context);
    let mut innermost = true;
    while let Some(ctx) = current {
        if innermost || !ev.kind(ctx).is_class() {
            for filter in ev.filters(ctx, FilterOptions::default()) {
                let bindings = filter.get(ev, name);
                if !bindings.is_empty() {
                    return bindings;
                }
            }
        }
        innermost = false;
        current = ev.parent(ctx);
    }
    Vec::new()
}

/// Infers the values bound to a definition name: what a `def` or `class`
/// statement binds, what a parameter holds, what an assignment target or
/// loop target takes.
pub(crate) fn infer_tree_name(ev: &Evaluator, parent: ContextId, name: TreeNode) -> ContextSet {
    let tree = ev.tree(name.source);
    let Some(definition) = tree.parent(name.node) else {
        return ContextSet::empty();
    };
    match tree.kind(definition) {
        NodeKind::FuncDef => ContextSet::single(ev.function_context(
            parent,
            TreeNode {
                source: name.source,
                node: definition,
            },
        )),
        NodeKind::ClassDef => ContextSet::single(ev.class_context(
            parent,
            TreeNode {
                source: name.source,
                node: definition,
            },
        )),
        NodeKind::Param => function::infer_param(
            ev,
            parent,
            TreeNode {
                source: name.source,
                node: definition,
            },
        ),
        NodeKind::Import => {
            let module_name = tree.value(name.node);
            match ev.module(module_name) {
                Some(module) => ContextSet::single(module),
                None => {
                    ev.add_diagnostic(Diagnostic::new(
                        DiagnosticKind::UnknownModule,
                        format!("unknown module {module_name}"),
                    ));
                    ContextSet::empty()
                }
            }
        }
        NodeKind::For => {
            let Some(&iterable) = tree.children(definition).get(1) else {
                return ContextSet::empty();
            };
            let values = infer_expression(ev, parent, name.source, iterable);
            instance::py_iter(ev, values)
        }
        NodeKind::Comprehension => {
            let Some(&iterable) = tree.children(definition).get(2) else {
                return ContextSet::empty();
            };
            let values = infer_expression(ev, parent, name.source, iterable);
            instance::py_iter(ev, values)
        }
        NodeKind::Assignment => {
            let Some(&value) = tree.children(definition).get(1) else {
                return ContextSet::empty();
            };
            infer_expression(ev, parent, name.source, value)
        }
        _ => ContextSet::empty(),
    }
}
