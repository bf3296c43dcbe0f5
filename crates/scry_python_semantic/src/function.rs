//! Function execution: running a body under concrete arguments and
//! inferring its returns and parameters.

use scry_python_syntax::{NodeId, NodeKind, Tree};

use crate::arguments::Arguments;
use crate::context::{ContextId, ContextKind, ContextSet, TreeNode};
use crate::evaluator::Evaluator;
use crate::{docstrings, generics, infer};

/// Executes a function: allocates an execution context and infers what the
/// body returns under these arguments.
pub(crate) fn execute_function(
    ev: &Evaluator,
    function: ContextId,
    arguments: Arguments,
) -> ContextSet {
    let execution = ev.execution(function, arguments);
    infer_execution_returns(ev, execution)
}

/// The return types of an execution: the return annotation wins, then the
/// union of `return` expressions, then a `:rtype:` docstring clause.
pub(crate) fn infer_execution_returns(ev: &Evaluator, execution: ContextId) -> ContextSet {
    let Some(node) = execution_function_node(ev, execution) else {
        return ContextSet::empty();
    };
    let tree = ev.tree(node.source);
    if let Some(annotation) = tree.return_annotation(node.node) {
        return annotation_values(ev, execution, node.source, annotation);
    }
    let mut returns = Vec::new();
    collect_returns(&tree, tree.body(node.node), &mut returns);
    if !returns.is_empty() {
        return ContextSet::union(returns.into_iter().map(|statement| {
            match tree.children(statement).first() {
                Some(&expr) => infer::infer_expression(ev, execution, node.source, expr),
                // A bare `return` yields None.
                None => ContextSet::single(ev.none_object()),
            }
        }));
    }
    docstrings::infer_return_from_docstring(ev, execution, node)
}

fn collect_returns(tree: &Tree, statements: &[NodeId], returns: &mut Vec<NodeId>) {
    for &statement in statements {
        match tree.kind(statement) {
            NodeKind::Return => returns.push(statement),
            NodeKind::If | NodeKind::While => {
                for &child in tree.children(statement) {
                    if tree.kind(child) == NodeKind::Suite {
                        collect_returns(tree, tree.children(child), returns);
                    }
                }
            }
            NodeKind::For => {
                if let Some(&suite) = tree.children(statement).get(2) {
                    collect_returns(tree, tree.children(suite), returns);
                }
            }
            // Nested defs return for themselves.
            _ => {}
        }
    }
}

/// Infers one parameter of a function owned by `owner` (an execution or a
/// plain function context). Precedence: the call site's argument, the
/// annotation, the `:type:` docstring clause, then the default value.
pub(crate) fn infer_param(ev: &Evaluator, owner: ContextId, param: TreeNode) -> ContextSet {
    let Some(node) = owner_function_node(ev, owner) else {
        return ContextSet::empty();
    };
    let tree = ev.tree(node.source);
    let params = tree.params(node.node);
    let Some(index) = params.iter().position(|&candidate| candidate == param.node) else {
        return ContextSet::empty();
    };
    let name = params
        .get(index)
        .and_then(|&p| tree.children(p).first())
        .map(|&target| tree.value(target).to_string())
        .unwrap_or_default();

    // The receiver is bound even when the rest of the call is unknown:
    // anonymous executions of a method still fill slot 0.
    if let ContextKind::Execution(data) = ev.kind(owner) {
        if let Some(values) = data.arguments.positional(ev, index) {
            return values;
        }
        if let Some(values) = data.arguments.keyword(ev, &name) {
            return values;
        }
    }
    if let Some(annotation) = tree.param_annotation(param.node) {
        return annotation_values(ev, owner, node.source, annotation);
    }
    let from_docstring = docstrings::infer_param_from_docstring(ev, owner, node, &name);
    if !from_docstring.is_empty() {
        return from_docstring;
    }
    if let Some(default) = tree.param_default(param.node) {
        return infer::infer_expression(ev, owner, node.source, default);
    }
    ContextSet::empty()
}

/// Evaluates an annotation expression to instances of the named classes.
/// Plain names that turn out to be bound type variables resolve to the
/// inferred bindings instead.
pub(crate) fn annotation_values(
    ev: &Evaluator,
    owner: ContextId,
    source: crate::context::SourceId,
    annotation: NodeId,
) -> ContextSet {
    let tree = ev.tree(source);
    if tree.kind(annotation) == NodeKind::Name {
        if let Some(values) = generics::resolve_type_var(ev, owner, tree.value(annotation)) {
            return values;
        }
    }
    let classes = ev.guard(|| infer::infer_expression(ev, owner, source, annotation));
    instances_of(ev, classes)
}

/// Maps classes to anonymous instances; non-class values pass through.
pub(crate) fn instances_of(ev: &Evaluator, classes: ContextSet) -> ContextSet {
    let mut instances = ContextSet::empty();
    for value in classes {
        match ev.kind(value) {
            ContextKind::Class(_) | ContextKind::CompiledClass(_) => {
                instances.insert(ev.anonymous_instance(value));
            }
            _ => {
                instances.insert(value);
            }
        }
    }
    instances
}

/// Whether `arguments` plausibly satisfy the signature of `function`.
/// Anonymous arguments match everything.
pub(crate) fn matches_signature(
    ev: &Evaluator,
    function: ContextId,
    arguments: &Arguments,
) -> bool {
    if arguments.is_anonymous() {
        return true;
    }
    let Some(node) = owner_function_node(ev, function) else {
        return true;
    };
    let tree = ev.tree(node.source);
    let params = tree.params(node.node);
    let positional = arguments.positional_count(ev);
    if positional > params.len() {
        return false;
    }
    let keywords = arguments.keyword_names(ev);
    for (index, &param) in params.iter().enumerate() {
        if index < positional {
            continue;
        }
        if tree.param_default(param).is_some() {
            continue;
        }
        let Some(&target) = tree.children(param).first() else {
            continue;
        };
        if !keywords.iter().any(|keyword| keyword == tree.value(target)) {
            return false;
        }
    }
    true
}

/// The definition node of a function, seen through bound methods.
pub(crate) fn function_node(ev: &Evaluator, function: ContextId) -> Option<TreeNode> {
    match ev.kind(function) {
        ContextKind::Function(data) => Some(data.node),
        ContextKind::BoundMethod(data) => function_node(ev, data.function),
        _ => None,
    }
}

fn execution_function_node(ev: &Evaluator, execution: ContextId) -> Option<TreeNode> {
    match ev.kind(execution) {
        ContextKind::Execution(data) => function_node(ev, data.function),
        _ => None,
    }
}

fn owner_function_node(ev: &Evaluator, owner: ContextId) -> Option<TreeNode> {
    match ev.kind(owner) {
        ContextKind::Execution(data) => function_node(ev, data.function),
        _ => function_node(ev, owner),
    }
}
