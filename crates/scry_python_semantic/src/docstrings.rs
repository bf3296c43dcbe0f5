//! Type extraction from docstrings.
//!
//! Sphinx-style `:type param:` and `:rtype:` clauses (and their epydoc
//! `@type`/`@rtype` spellings) are parsed out of a function's docstring and
//! evaluated as expressions in the function's module. reST roles like
//! ``:class:`Foo``` are unwrapped before evaluation.

use std::sync::LazyLock;

use regex::Regex;

use crate::context::{ContextId, ContextKind, ContextSet, TreeNode};
use crate::evaluator::Evaluator;
use crate::{function, infer};

static RETURN_PATTERNS: LazyLock<[Regex; 2]> = LazyLock::new(|| {
    [
        Regex::new(r"(?m)^\s*:rtype:\s*([^\n]+)").unwrap(),
        Regex::new(r"(?m)^\s*@rtype:\s*([^\n]+)").unwrap(),
    ]
});

static REST_ROLE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r":[^`]+:`([^`]+)`").unwrap());

fn param_patterns(param: &str) -> [Regex; 2] {
    let param = regex::escape(param);
    [
        Regex::new(&format!(r"(?m)^\s*:type\s+{param}:\s*([^\n]+)"))
            .expect("escaped name produces a valid pattern"),
        Regex::new(&format!(r"(?m)^\s*@type\s+{param}:\s*([^\n]+)"))
            .expect("escaped name produces a valid pattern"),
    ]
}

/// The type string declared for `param` in a docstring. The patterns are
/// tried in priority order; the first matching form wins.
pub fn search_param_in_docstring(docstring: &str, param: &str) -> Option<String> {
    param_patterns(param).iter().find_map(|pattern| {
        pattern
            .captures(docstring)
            .map(|captures| strip_rest_roles(captures[1].trim()))
    })
}

/// The return type string declared in a docstring, from the first matching
/// pattern.
pub fn search_return_in_docstring(docstring: &str) -> Option<String> {
    RETURN_PATTERNS.iter().find_map(|pattern| {
        pattern
            .captures(docstring)
            .map(|captures| strip_rest_roles(captures[1].trim()))
    })
}

fn strip_rest_roles(type_string: &str) -> String {
    match REST_ROLE.captures(type_string) {
        Some(captures) => captures[1].trim().to_string(),
        None => type_string.to_string(),
    }
}

pub(crate) fn infer_param_from_docstring(
    ev: &Evaluator,
    owner: ContextId,
    node: TreeNode,
    param: &str,
) -> ContextSet {
    let tree = ev.tree(node.source);
    let Some(docstring) = tree.docstring(node.node) else {
        return ContextSet::empty();
    };
    let Some(type_string) = search_param_in_docstring(docstring, param) else {
        return ContextSet::empty();
    };
    infer_type_string(ev, owner, &type_string)
}

pub(crate) fn infer_return_from_docstring(
    ev: &Evaluator,
    owner: ContextId,
    node: TreeNode,
) -> ContextSet {
    let tree = ev.tree(node.source);
    let Some(docstring) = tree.docstring(node.node) else {
        return ContextSet::empty();
    };
    let Some(type_string) = search_return_in_docstring(docstring) else {
        return ContextSet::empty();
    };
    infer_type_string(ev, owner, &type_string)
}

/// Evaluates one extracted type string as an expression in the module that
/// holds `owner`. Malformed strings infer to nothing.
fn infer_type_string(ev: &Evaluator, owner: ContextId, type_string: &str) -> ContextSet {
    let Ok(tree) = scry_python_syntax::parse_module(type_string) else {
        return ContextSet::empty();
    };
    let Some(&statement) = tree.body(tree.root()).last() else {
        return ContextSet::empty();
    };
    if tree.kind(statement) != scry_python_syntax::NodeKind::ExprStmt {
        return ContextSet::empty();
    }
    let Some(&expr) = tree.children(statement).first() else {
        return ContextSet::empty();
    };
    let source = ev.add_source(tree);
    let module = enclosing_module(ev, owner);
    let values = ev.guard(|| infer::infer_expression(ev, module, source, expr));
    function::instances_of(ev, values)
}

fn enclosing_module(ev: &Evaluator, owner: ContextId) -> ContextId {
    let mut current = owner;
    while !matches!(ev.kind(current), ContextKind::Module(_)) {
        match ev.parent(current) {
            Some(parent) => current = parent,
            None => return owner,
        }
    }
    current
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn param_type_clause() {
        let docstring = "Summary.\n\n:type param: int\n:param param: the value\n";
        assert_eq!(
            search_param_in_docstring(docstring, "param"),
            Some("int".to_string())
        );
    }

    #[test]
    fn epydoc_param_type_clause() {
        let docstring = "@type param: str\n";
        assert_eq!(
            search_param_in_docstring(docstring, "param"),
            Some("str".to_string())
        );
    }

    #[test]
    fn first_matching_pattern_wins() {
        let docstring = ":type param: int\n@type param: str\n";
        assert_eq!(
            search_param_in_docstring(docstring, "param"),
            Some("int".to_string())
        );
        assert_eq!(
            search_return_in_docstring(":rtype: int\n@rtype: str\n"),
            Some("int".to_string())
        );
    }

    #[test]
    fn rest_role_is_unwrapped() {
        let docstring = ":type param: :class:`threading.Thread`\n";
        assert_eq!(
            search_param_in_docstring(docstring, "param"),
            Some("threading.Thread".to_string())
        );
    }

    #[test]
    fn return_type_clauses() {
        assert_eq!(
            search_return_in_docstring(":rtype: list of str\n"),
            Some("list of str".to_string())
        );
        assert_eq!(
            search_return_in_docstring("@rtype: bool\n"),
            Some("bool".to_string())
        );
    }

    #[test]
    fn unrelated_docstring_yields_nothing() {
        assert_eq!(search_param_in_docstring("just words", "param"), None);
        assert_eq!(search_return_in_docstring("just words"), None);
    }
}
