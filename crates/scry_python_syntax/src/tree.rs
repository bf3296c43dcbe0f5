use std::fmt;
use std::ops::Index;

use bitflags::bitflags;
use compact_str::CompactString;

/// A source position: one-based line, zero-based column.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Position {
    pub line: u32,
    pub column: u32,
}

impl Position {
    pub const fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// Id of a node within one [`Tree`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    pub(crate) fn new(index: usize) -> Self {
        Self(u32::try_from(index).expect("tree too large"))
    }

    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Kind tag of a node.
///
/// Child layout conventions (fixed, relied on by accessors here and by the
/// semantic crate):
///
/// - `Module`: statements.
/// - `ClassDef`: `[Name, base-expr*, Suite]`.
/// - `FuncDef`: `[Name, Param*, Annotation?, Suite]` (the trailing
///   `Annotation` holds the return annotation).
/// - `Param`: `[Name, Annotation?, Default?]`.
/// - `Assignment`: `[target, value]`.
/// - `Return`: `[expr?]`.
/// - `Import`: `[Name+]` (dotted path segments; the first segment binds).
/// - `If`: `[cond, Suite, (cond, Suite)*, Suite?]` (trailing suite = `else`).
/// - `For`: `[Name, iterable, Suite]`; `While`: `[cond, Suite]`.
/// - `Attribute`: `[base, Name]`; `Call`: `[callee, (expr | Keyword)*]`;
///   `Keyword`: `[Name, value]`; `Subscript`: `[base, index]`;
///   `BinaryOp`: `[lhs, rhs]`.
/// - `Comprehension`: `[element, Name, iterable]` (a scope of its own).
/// - Displays: element expressions.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Module,
    ClassDef,
    FuncDef,
    Suite,
    Param,
    Annotation,
    Default,
    Assignment,
    Return,
    Import,
    ExprStmt,
    Pass,
    If,
    For,
    While,
    Name,
    Number,
    String,
    Attribute,
    Call,
    Keyword,
    Subscript,
    BinaryOp,
    Comprehension,
    ListDisplay,
    TupleDisplay,
    SetDisplay,
    DictDisplay,
}

impl NodeKind {
    /// Whether this node opens a lexical scope.
    pub const fn is_scope(self) -> bool {
        matches!(
            self,
            NodeKind::Module | NodeKind::ClassDef | NodeKind::FuncDef | NodeKind::Comprehension
        )
    }
}

bitflags! {
    /// Flags on a [`Node`].
    #[derive(Debug, Default, Copy, Clone, Eq, PartialEq)]
    pub struct NodeFlags: u8 {
        /// The name is a definition site (assignment target, `def`/`class`
        /// name, parameter, `for`/comprehension target, import).
        const DEFINITION = 1 << 0;
        /// The number literal is a float.
        const FLOAT = 1 << 1;
    }
}

#[derive(Debug, Clone)]
pub struct Node {
    pub kind: NodeKind,
    pub parent: Option<NodeId>,
    pub start: Position,
    pub end: Position,
    pub(crate) children: Vec<NodeId>,
    pub(crate) value: Option<CompactString>,
    pub(crate) flags: NodeFlags,
}

impl Node {
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// The string payload of a `Name`, `Number`, or `String` node.
    pub fn value(&self) -> &str {
        self.value.as_deref().unwrap_or("")
    }

    pub fn is_definition(&self) -> bool {
        self.flags.contains(NodeFlags::DEFINITION)
    }

    pub fn is_float_literal(&self) -> bool {
        self.flags.contains(NodeFlags::FLOAT)
    }
}

/// A parsed module: an arena of nodes, the root being the `Module` node.
#[derive(Debug, Clone)]
pub struct Tree {
    nodes: Vec<Node>,
    root: NodeId,
}

impl Index<NodeId> for Tree {
    type Output = Node;

    fn index(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }
}

impl Tree {
    pub(crate) fn new(nodes: Vec<Node>, root: NodeId) -> Self {
        Self { nodes, root }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn kind(&self, id: NodeId) -> NodeKind {
        self[id].kind
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self[id].parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self[id].children
    }

    pub fn value(&self, id: NodeId) -> &str {
        self[id].value()
    }

    /// The nearest enclosing scope node, not counting `node` itself.
    pub fn parent_scope(&self, node: NodeId) -> Option<NodeId> {
        let mut current = self[node].parent;
        while let Some(id) = current {
            if self[id].kind.is_scope() {
                return Some(id);
            }
            current = self[id].parent;
        }
        None
    }

    /// The `Name` child naming a `ClassDef`/`FuncDef`.
    pub fn definition_name(&self, def: NodeId) -> NodeId {
        debug_assert!(matches!(
            self[def].kind,
            NodeKind::ClassDef | NodeKind::FuncDef
        ));
        self[def].children[0]
    }

    /// The statement list of a scope node's body.
    pub fn body(&self, def: NodeId) -> &[NodeId] {
        match self[def].kind {
            NodeKind::Module => &self[def].children,
            NodeKind::ClassDef | NodeKind::FuncDef => {
                match self[def]
                    .children
                    .iter()
                    .rev()
                    .copied()
                    .find(|&child| self[child].kind == NodeKind::Suite)
                {
                    Some(suite) => &self[suite].children,
                    None => &[],
                }
            }
            _ => &[],
        }
    }

    /// Base-class expressions of a `ClassDef`.
    pub fn class_bases(&self, class: NodeId) -> &[NodeId] {
        debug_assert_eq!(self[class].kind, NodeKind::ClassDef);
        let children = &self[class].children;
        // children = [Name, base*, Suite]
        &children[1..children.len() - 1]
    }

    /// Parameter nodes of a `FuncDef`.
    pub fn params(&self, func: NodeId) -> Vec<NodeId> {
        debug_assert_eq!(self[func].kind, NodeKind::FuncDef);
        self[func]
            .children
            .iter()
            .copied()
            .filter(|&child| self[child].kind == NodeKind::Param)
            .collect()
    }

    /// The return annotation expression of a `FuncDef`, if any.
    pub fn return_annotation(&self, func: NodeId) -> Option<NodeId> {
        debug_assert_eq!(self[func].kind, NodeKind::FuncDef);
        self[func]
            .children
            .iter()
            .copied()
            .find(|&child| self[child].kind == NodeKind::Annotation)
            .map(|annotation| self[annotation].children[0])
    }

    /// The annotation expression of a `Param`, if any.
    pub fn param_annotation(&self, param: NodeId) -> Option<NodeId> {
        debug_assert_eq!(self[param].kind, NodeKind::Param);
        self[param]
            .children
            .iter()
            .copied()
            .find(|&child| self[child].kind == NodeKind::Annotation)
            .map(|annotation| self[annotation].children[0])
    }

    /// The default-value expression of a `Param`, if any.
    pub fn param_default(&self, param: NodeId) -> Option<NodeId> {
        debug_assert_eq!(self[param].kind, NodeKind::Param);
        self[param]
            .children
            .iter()
            .copied()
            .find(|&child| self[child].kind == NodeKind::Default)
            .map(|default| self[default].children[0])
    }

    /// The docstring of a `FuncDef` or `ClassDef` body, if its first
    /// statement is a string expression.
    pub fn docstring(&self, def: NodeId) -> Option<&str> {
        let first = *self.body(def).first()?;
        if self[first].kind != NodeKind::ExprStmt {
            return None;
        }
        let expr = self[first].children[0];
        if self[expr].kind == NodeKind::String {
            Some(self[expr].value())
        } else {
            None
        }
    }

    /// Pre-order traversal of the subtree rooted at `node`, including `node`.
    pub fn descendants(&self, node: NodeId) -> Descendants<'_> {
        Descendants {
            tree: self,
            stack: vec![node],
        }
    }
}

pub struct Descendants<'a> {
    tree: &'a Tree,
    stack: Vec<NodeId>,
}

impl Iterator for Descendants<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let id = self.stack.pop()?;
        let children = &self.tree[id].children;
        self.stack.extend(children.iter().rev().copied());
        Some(id)
    }
}
