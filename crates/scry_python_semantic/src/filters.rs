//! Filters and name bindings.
//!
//! A filter is one layer of a context's lookup chain; asking a context for an
//! attribute walks its filters in order and takes the first layer that knows
//! the name. Filters return [`NameBinding`]s, which locate a definition
//! without inferring it; inference happens separately so callers can ask for
//! positions or names cheaply.

use scry_python_syntax::{NodeId, NodeKind, Position, Tree};

use crate::builtins::{self, BuiltinClassId};
use crate::context::{CompiledValue, Context, ContextId, ContextKind, ContextSet, Name, TreeNode};
use crate::evaluator::Evaluator;
use crate::{class, infer, instance};

/// Options controlling which filter layers take part in a lookup.
#[derive(Debug, Copy, Clone)]
pub struct FilterOptions {
    /// Whether self-assigned attributes participate. Slot lookups like
    /// `__call__` and `__iter__` disable this: only class-level definitions
    /// count for the special method protocol.
    pub include_self_names: bool,
}

impl Default for FilterOptions {
    fn default() -> Self {
        Self {
            include_self_names: true,
        }
    }
}

/// One layer of a context's lookup chain.
#[derive(Debug, Clone)]
pub enum Filter {
    /// Names defined directly in a module or function scope.
    Scope { context: ContextId, scope: TreeNode },
    /// Names defined in a class body.
    Class { context: ContextId, node: TreeNode },
    /// `self.x = ...` assignments found in the methods of one class.
    SelfAttributes { instance: ContextId, class: ContextId },
    /// One class of an instance's MRO, seen through the instance: results
    /// go through the descriptor protocol on inference.
    InstanceClass { instance: ContextId, class: ContextId },
    /// Methods of a builtin class.
    CompiledClass { class: BuiltinClassId },
    /// Methods of a builtin class, bound to an instance.
    CompiledInstanceClass {
        instance: ContextId,
        class: BuiltinClassId,
    },
}

impl Filter {
    /// The bindings for `name` in this layer.
    pub fn get(&self, ev: &Evaluator, name: &str) -> Vec<NameBinding> {
        match *self {
            Filter::Scope { context, scope } => scope_definitions(ev, context, scope, Some(name)),
            Filter::Class { context, node } => class_definitions(ev, context, node, Some(name)),
            Filter::SelfAttributes { instance, class } => {
                self_attribute_definitions(ev, instance, class, Some(name))
            }
            Filter::InstanceClass { instance, class } => {
                class_node(ev, class)
                    .map(|node| class_definitions(ev, class, node, Some(name)))
                    .unwrap_or_default()
                    .into_iter()
                    .map(|inner| NameBinding::InstanceMember {
                        instance,
                        class,
                        inner: Box::new(inner),
                    })
                    .collect()
            }
            Filter::CompiledClass { class } => builtins::find_method(class, name)
                .map(|method| vec![NameBinding::Compiled { class, method }])
                .unwrap_or_default(),
            Filter::CompiledInstanceClass { instance, class } => {
                builtins::find_method(class, name)
                    .map(|method| {
                        vec![NameBinding::CompiledInstanceMember {
                            instance,
                            class,
                            method,
                        }]
                    })
                    .unwrap_or_default()
            }
        }
    }

    /// Every binding this layer knows, in source order.
    pub fn values(&self, ev: &Evaluator) -> Vec<NameBinding> {
        match *self {
            Filter::Scope { context, scope } => scope_definitions(ev, context, scope, None),
            Filter::Class { context, node } => class_definitions(ev, context, node, None),
            Filter::SelfAttributes { instance, class } => {
                self_attribute_definitions(ev, instance, class, None)
            }
            Filter::InstanceClass { instance, class } => class_node(ev, class)
                .map(|node| class_definitions(ev, class, node, None))
                .unwrap_or_default()
                .into_iter()
                .map(|inner| NameBinding::InstanceMember {
                    instance,
                    class,
                    inner: Box::new(inner),
                })
                .collect(),
            Filter::CompiledClass { class } => (0..builtins::class(class).methods.len())
                .map(|method| NameBinding::Compiled { class, method })
                .collect(),
            Filter::CompiledInstanceClass { instance, class } => {
                (0..builtins::class(class).methods.len())
                    .map(|method| NameBinding::CompiledInstanceMember {
                        instance,
                        class,
                        method,
                    })
                    .collect()
            }
        }
    }
}

/// A located definition of one name, before inference.
#[derive(Debug, Clone, is_macro::Is)]
pub enum NameBinding {
    /// A definition node in a tree: a def/class name, parameter, assignment
    /// target, import, or loop target.
    Tree { parent: ContextId, name: TreeNode },
    /// A `self.x = ...` target inside a method of `class`.
    SelfAttribute {
        instance: ContextId,
        class: ContextId,
        name: TreeNode,
    },
    /// A class-level binding accessed through an instance; inference applies
    /// the descriptor protocol to the inner result.
    InstanceMember {
        instance: ContextId,
        class: ContextId,
        inner: Box<NameBinding>,
    },
    /// A method of a builtin class.
    Compiled { class: BuiltinClassId, method: usize },
    /// A method of a builtin class, bound to an instance.
    CompiledInstanceMember {
        instance: ContextId,
        class: BuiltinClassId,
        method: usize,
    },
    /// A registered module reached via attribute access on its package.
    Module(ContextId),
}

impl NameBinding {
    pub fn name(&self, ev: &Evaluator) -> Name {
        match self {
            NameBinding::Tree { name, .. } | NameBinding::SelfAttribute { name, .. } => {
                let tree = ev.tree(name.source);
                Name::from(tree.value(name.node))
            }
            NameBinding::InstanceMember { inner, .. } => inner.name(ev),
            NameBinding::Compiled { class, method }
            | NameBinding::CompiledInstanceMember { class, method, .. } => {
                Name::from(builtins::method(*class, *method).name)
            }
            NameBinding::Module(module) => match ev.kind(*module) {
                ContextKind::Module(data) => data.name,
                _ => Name::default(),
            },
        }
    }

    /// Source position of the definition, when it has one.
    pub fn position(&self, ev: &Evaluator) -> Option<Position> {
        match self {
            NameBinding::Tree { name, .. } | NameBinding::SelfAttribute { name, .. } => {
                let tree = ev.tree(name.source);
                Some(tree[name.node].start)
            }
            NameBinding::InstanceMember { inner, .. } => inner.position(ev),
            _ => None,
        }
    }

    /// Infers the values this binding can hold.
    pub(crate) fn infer(&self, ev: &Evaluator) -> ContextSet {
        match self {
            NameBinding::Tree { parent, name } => infer::infer_tree_name(ev, *parent, *name),
            NameBinding::SelfAttribute {
                instance,
                class,
                name,
            } => infer_self_attribute(ev, *instance, *class, *name),
            NameBinding::InstanceMember {
                instance,
                class,
                inner,
            } => {
                let values = inner.infer(ev);
                class::apply_get(ev, *instance, *class, values)
            }
            NameBinding::Compiled { class, method } => {
                ContextSet::single(ev.alloc(Context {
                    kind: ContextKind::CompiledValue(CompiledValue::Function {
                        class: *class,
                        method: *method,
                    }),
                    parent: None,
                }))
            }
            NameBinding::CompiledInstanceMember {
                instance,
                class,
                method,
            } => ContextSet::single(ev.alloc(Context {
                kind: ContextKind::CompiledValue(CompiledValue::BoundMethod {
                    instance: *instance,
                    class: *class,
                    method: *method,
                }),
                parent: None,
            })),
            NameBinding::Module(module) => ContextSet::single(*module),
        }
    }
}

/// Infers a `self.x = value` attribute: the method body is re-read with the
/// receiver bound, then the assignment's right-hand side is inferred there.
fn infer_self_attribute(
    ev: &Evaluator,
    instance: ContextId,
    class: ContextId,
    name: TreeNode,
) -> ContextSet {
    let tree = ev.tree(name.source);
    let Some(assignment) = enclosing_assignment(&tree, name.node) else {
        return ContextSet::empty();
    };
    let children = tree.children(assignment);
    let Some(&value) = children.get(1) else {
        return ContextSet::empty();
    };
    let parent = instance::create_instance_context(ev, instance, class, name.node);
    infer::infer_expression(ev, parent, name.source, value)
}

fn enclosing_assignment(tree: &Tree, mut node: NodeId) -> Option<NodeId> {
    while let Some(parent) = tree.parent(node) {
        if tree.kind(parent) == NodeKind::Assignment {
            // Only targets count; a read on the right-hand side is not a
            // definition.
            if tree.children(parent).first() == Some(&find_target_root(tree, node, parent)) {
                return Some(parent);
            }
            return None;
        }
        node = parent;
    }
    None
}

fn find_target_root(tree: &Tree, node: NodeId, assignment: NodeId) -> NodeId {
    let mut current = node;
    while let Some(parent) = tree.parent(current) {
        if parent == assignment {
            return current;
        }
        current = parent;
    }
    current
}

fn class_node(ev: &Evaluator, class: ContextId) -> Option<TreeNode> {
    match ev.kind(class) {
        ContextKind::Class(data) => Some(data.node),
        _ => None,
    }
}

/// Collects the definitions of a module or function scope. Compound
/// statements are transparent; nested class and function bodies are not.
pub(crate) fn scope_definitions(
    ev: &Evaluator,
    context: ContextId,
    scope: TreeNode,
    name: Option<&str>,
) -> Vec<NameBinding> {
    let tree = ev.tree(scope.source);
    let mut bindings = Vec::new();
    if tree.kind(scope.node) == NodeKind::FuncDef {
        for param in tree.params(scope.node) {
            if let Some(&target) = tree.children(param).first() {
                push_if_named(&tree, scope.source, context, target, name, &mut bindings);
            }
        }
    }
    collect_statements(
        &tree,
        scope.source,
        context,
        tree.body(scope.node),
        name,
        &mut bindings,
    );
    bindings
}

fn class_definitions(
    ev: &Evaluator,
    context: ContextId,
    node: TreeNode,
    name: Option<&str>,
) -> Vec<NameBinding> {
    let tree = ev.tree(node.source);
    let mut bindings = Vec::new();
    collect_statements(
        &tree,
        node.source,
        context,
        tree.body(node.node),
        name,
        &mut bindings,
    );
    bindings
}

fn collect_statements(
    tree: &Tree,
    source: crate::context::SourceId,
    context: ContextId,
    statements: &[NodeId],
    name: Option<&str>,
    bindings: &mut Vec<NameBinding>,
) {
    for &statement in statements {
        match tree.kind(statement) {
            NodeKind::Assignment => {
                if let Some(&target) = tree.children(statement).first() {
                    push_if_named(tree, source, context, target, name, bindings);
                }
            }
            NodeKind::FuncDef | NodeKind::ClassDef => {
                push_if_named(
                    tree,
                    source,
                    context,
                    tree.definition_name(statement),
                    name,
                    bindings,
                );
            }
            NodeKind::Import => {
                if let Some(&first) = tree.children(statement).first() {
                    push_if_named(tree, source, context, first, name, bindings);
                }
            }
            NodeKind::For => {
                if let Some(&target) = tree.children(statement).first() {
                    push_if_named(tree, source, context, target, name, bindings);
                }
                if let Some(&suite) = tree.children(statement).get(2) {
                    collect_statements(tree, source, context, tree.children(suite), name, bindings);
                }
            }
            NodeKind::If | NodeKind::While => {
                for &child in tree.children(statement) {
                    if tree.kind(child) == NodeKind::Suite {
                        collect_statements(
                            tree,
                            source,
                            context,
                            tree.children(child),
                            name,
                            bindings,
                        );
                    }
                }
            }
            _ => {}
        }
    }
}

fn push_if_named(
    tree: &Tree,
    source: crate::context::SourceId,
    context: ContextId,
    target: NodeId,
    name: Option<&str>,
    bindings: &mut Vec<NameBinding>,
) {
    if tree.kind(target) != NodeKind::Name || !tree[target].is_definition() {
        return;
    }
    if let Some(wanted) = name {
        if tree.value(target) != wanted {
            return;
        }
    }
    bindings.push(NameBinding::Tree {
        parent: context,
        name: TreeNode {
            source,
            node: target,
        },
    });
}

/// Finds `self.<attr> = ...` targets inside the methods of `class`.
fn self_attribute_definitions(
    ev: &Evaluator,
    instance: ContextId,
    class: ContextId,
    name: Option<&str>,
) -> Vec<NameBinding> {
    let Some(node) = class_node(ev, class) else {
        return Vec::new();
    };
    let tree = ev.tree(node.source);
    let class_span = (tree[node.node].start, tree[node.node].end);
    let mut bindings = Vec::new();
    for &statement in tree.body(node.node) {
        if tree.kind(statement) != NodeKind::FuncDef {
            continue;
        }
        let Some(receiver) = tree
            .params(statement)
            .first()
            .and_then(|&param| tree.children(param).first())
            .map(|&target| tree.value(target).to_string())
        else {
            continue;
        };
        for descendant in tree.descendants(statement) {
            if tree.kind(descendant) != NodeKind::Attribute {
                continue;
            }
            let children = tree.children(descendant);
            let (Some(&base), Some(&attr)) = (children.first(), children.get(1)) else {
                continue;
            };
            if tree.kind(base) != NodeKind::Name || tree.value(base) != receiver {
                continue;
            }
            if !tree[attr].is_definition() {
                continue;
            }
            if let Some(wanted) = name {
                if tree.value(attr) != wanted {
                    continue;
                }
            }
            let start = tree[attr].start;
            // The definition must sit inside the class body itself.
            if start <= class_span.0 || start >= class_span.1 {
                continue;
            }
            bindings.push(NameBinding::SelfAttribute {
                instance,
                class,
                name: TreeNode {
                    source: node.source,
                    node: attr,
                },
            });
        }
    }
    bindings
}
