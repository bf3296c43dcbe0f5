//! Syntax-tree collaborator for the `scry` inference engine.
//!
//! The semantic crate treats the tree as read-only: nodes expose a kind tag,
//! `start`/`end` positions, a parent link, and `is_definition()` for names.
//! The lexer/parser here covers the Python subset the engine consumes;
//! everything it cannot parse is a [`ParseError`], never a panic.

pub use crate::tree::{Node, NodeFlags, NodeId, NodeKind, Position, Tree};

pub mod lexer;
mod parser;
mod tree;

use thiserror::Error;

/// A syntax error, reported with the position the parser gave up at.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message} at {position}")]
pub struct ParseError {
    pub message: String,
    pub position: Position,
}

/// Parses `source` as a module and returns its tree.
pub fn parse_module(source: &str) -> Result<Tree, ParseError> {
    let tokens = lexer::lex(source)?;
    parser::Parser::new(tokens).parse_module()
}
