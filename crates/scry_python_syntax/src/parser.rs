//! Recursive-descent parser producing the arena [`Tree`].

use compact_str::CompactString;

use crate::lexer::{Token, TokenKind};
use crate::tree::{Node, NodeFlags, NodeId, NodeKind, Position, Tree};

pub(crate) struct Parser {
    tokens: Vec<Token>,
    cursor: usize,
    nodes: Vec<Node>,
}

type ParseResult<T> = Result<T, crate::ParseError>;

impl Parser {
    pub(crate) fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            cursor: 0,
            nodes: Vec::new(),
        }
    }

    pub(crate) fn parse_module(mut self) -> ParseResult<Tree> {
        let root = self.alloc(NodeKind::Module, Position::new(1, 0));
        let mut statements = Vec::new();
        while !self.at(TokenKind::EndOfFile) {
            statements.push(self.statement()?);
        }
        let end = self.current().end;
        self.attach(root, statements, end);
        Ok(Tree::new(self.nodes, root))
    }

    // -- token plumbing ----------------------------------------------------

    fn current(&self) -> &Token {
        &self.tokens[self.cursor.min(self.tokens.len() - 1)]
    }

    fn at(&self, kind: TokenKind) -> bool {
        self.current().kind == kind
    }

    fn at_keyword(&self, keyword: &str) -> bool {
        self.current().is_keyword(keyword)
    }

    fn bump(&mut self) -> Token {
        let token = self.current().clone();
        if self.cursor < self.tokens.len() - 1 {
            self.cursor += 1;
        }
        token
    }

    fn expect(&mut self, kind: TokenKind, what: &str) -> ParseResult<Token> {
        if self.at(kind) {
            Ok(self.bump())
        } else {
            Err(self.error(format!("expected {what}")))
        }
    }

    fn error(&self, message: impl Into<String>) -> crate::ParseError {
        crate::ParseError {
            message: message.into(),
            position: self.current().start,
        }
    }

    // -- node plumbing -----------------------------------------------------

    fn alloc(&mut self, kind: NodeKind, start: Position) -> NodeId {
        let id = NodeId::new(self.nodes.len());
        self.nodes.push(Node {
            kind,
            parent: None,
            start,
            end: start,
            children: Vec::new(),
            value: None,
            flags: NodeFlags::default(),
        });
        id
    }

    fn attach(&mut self, parent: NodeId, children: Vec<NodeId>, end: Position) {
        for &child in &children {
            self.nodes[child.index()].parent = Some(parent);
        }
        let node = &mut self.nodes[parent.index()];
        node.children = children;
        node.end = end;
    }

    fn leaf(
        &mut self,
        kind: NodeKind,
        value: CompactString,
        start: Position,
        end: Position,
    ) -> NodeId {
        let id = self.alloc(kind, start);
        let node = &mut self.nodes[id.index()];
        node.value = Some(value);
        node.end = end;
        id
    }

    fn end_of(&self, id: NodeId) -> Position {
        self.nodes[id.index()].end
    }

    fn mark_definition(&mut self, id: NodeId) {
        self.nodes[id.index()].flags |= NodeFlags::DEFINITION;
    }

    /// Marks assignment-target names: a plain name, or the attribute name of
    /// a `recv.name` target.
    fn mark_target(&mut self, id: NodeId) {
        match self.nodes[id.index()].kind {
            NodeKind::Name => self.mark_definition(id),
            NodeKind::Attribute => {
                let attr = self.nodes[id.index()].children[1];
                self.mark_definition(attr);
            }
            _ => {}
        }
    }

    // -- statements --------------------------------------------------------

    fn statement(&mut self) -> ParseResult<NodeId> {
        if self.at_keyword("class") {
            self.class_def()
        } else if self.at_keyword("def") {
            self.func_def()
        } else if self.at_keyword("return") {
            self.return_stmt()
        } else if self.at_keyword("import") {
            self.import_stmt()
        } else if self.at_keyword("pass") {
            let token = self.bump();
            let id = self.alloc(NodeKind::Pass, token.start);
            self.nodes[id.index()].end = token.end;
            self.expect(TokenKind::Newline, "newline")?;
            Ok(id)
        } else if self.at_keyword("if") {
            self.if_stmt()
        } else if self.at_keyword("for") {
            self.for_stmt()
        } else if self.at_keyword("while") {
            self.while_stmt()
        } else {
            self.simple_stmt()
        }
    }

    fn class_def(&mut self) -> ParseResult<NodeId> {
        let start = self.bump().start; // class
        let id = self.alloc(NodeKind::ClassDef, start);
        let name = self.name(true)?;
        let mut children = vec![name];
        if self.at(TokenKind::LeftParen) {
            self.bump();
            while !self.at(TokenKind::RightParen) {
                children.push(self.expression()?);
                if self.at(TokenKind::Comma) {
                    self.bump();
                }
            }
            self.expect(TokenKind::RightParen, ")")?;
        }
        self.expect(TokenKind::Colon, ":")?;
        let suite = self.suite()?;
        children.push(suite);
        let end = self.end_of(suite);
        self.attach(id, children, end);
        Ok(id)
    }

    fn func_def(&mut self) -> ParseResult<NodeId> {
        let start = self.bump().start; // def
        let id = self.alloc(NodeKind::FuncDef, start);
        let name = self.name(true)?;
        let mut children = vec![name];
        self.expect(TokenKind::LeftParen, "(")?;
        while !self.at(TokenKind::RightParen) {
            // `*args` / `**kwargs` markers are skipped; the engine treats
            // such parameters as ordinary names.
            while self.at(TokenKind::Star) || self.at(TokenKind::DoubleStar) {
                self.bump();
            }
            children.push(self.param()?);
            if self.at(TokenKind::Comma) {
                self.bump();
            }
        }
        self.expect(TokenKind::RightParen, ")")?;
        if self.at(TokenKind::Arrow) {
            let arrow = self.bump();
            let annotation = self.alloc(NodeKind::Annotation, arrow.start);
            let expr = self.expression()?;
            let end = self.end_of(expr);
            self.attach(annotation, vec![expr], end);
            children.push(annotation);
        }
        self.expect(TokenKind::Colon, ":")?;
        let suite = self.suite()?;
        children.push(suite);
        let end = self.end_of(suite);
        self.attach(id, children, end);
        Ok(id)
    }

    fn param(&mut self) -> ParseResult<NodeId> {
        let name = self.name(true)?;
        let start = self.nodes[name.index()].start;
        let id = self.alloc(NodeKind::Param, start);
        let mut children = vec![name];
        if self.at(TokenKind::Colon) {
            let colon = self.bump();
            let annotation = self.alloc(NodeKind::Annotation, colon.start);
            let expr = self.expression()?;
            let end = self.end_of(expr);
            self.attach(annotation, vec![expr], end);
            children.push(annotation);
        }
        if self.at(TokenKind::Equal) {
            let equal = self.bump();
            let default = self.alloc(NodeKind::Default, equal.start);
            let expr = self.expression()?;
            let end = self.end_of(expr);
            self.attach(default, vec![expr], end);
            children.push(default);
        }
        let end = self.end_of(*children.last().unwrap_or(&name));
        self.attach(id, children, end);
        Ok(id)
    }

    fn suite(&mut self) -> ParseResult<NodeId> {
        let start = self.current().start;
        let id = self.alloc(NodeKind::Suite, start);
        let mut statements = Vec::new();
        if self.at(TokenKind::Newline) {
            self.bump();
            self.expect(TokenKind::Indent, "indented block")?;
            while !self.at(TokenKind::Dedent) && !self.at(TokenKind::EndOfFile) {
                statements.push(self.statement()?);
            }
            self.expect(TokenKind::Dedent, "dedent")?;
        } else {
            // Single-line suite: `def f(): return 1`.
            statements.push(self.statement()?);
        }
        let end = statements
            .last()
            .map_or(start, |&statement| self.end_of(statement));
        self.attach(id, statements, end);
        Ok(id)
    }

    fn return_stmt(&mut self) -> ParseResult<NodeId> {
        let token = self.bump();
        let id = self.alloc(NodeKind::Return, token.start);
        let mut children = Vec::new();
        if !self.at(TokenKind::Newline) {
            children.push(self.expression()?);
        }
        let end = children.last().map_or(token.end, |&expr| self.end_of(expr));
        self.attach(id, children, end);
        self.expect(TokenKind::Newline, "newline")?;
        Ok(id)
    }

    fn import_stmt(&mut self) -> ParseResult<NodeId> {
        let token = self.bump();
        let id = self.alloc(NodeKind::Import, token.start);
        let mut segments = vec![self.name(true)?];
        while self.at(TokenKind::Dot) {
            self.bump();
            segments.push(self.name(true)?);
        }
        let end = self.end_of(*segments.last().unwrap_or(&id));
        self.attach(id, segments, end);
        self.expect(TokenKind::Newline, "newline")?;
        Ok(id)
    }

    fn if_stmt(&mut self) -> ParseResult<NodeId> {
        let token = self.bump();
        let id = self.alloc(NodeKind::If, token.start);
        let mut children = vec![self.expression()?];
        self.expect(TokenKind::Colon, ":")?;
        children.push(self.suite()?);
        loop {
            if self.at_keyword("elif") {
                self.bump();
                children.push(self.expression()?);
                self.expect(TokenKind::Colon, ":")?;
                children.push(self.suite()?);
            } else if self.at_keyword("else") {
                self.bump();
                self.expect(TokenKind::Colon, ":")?;
                children.push(self.suite()?);
                break;
            } else {
                break;
            }
        }
        let end = self.end_of(*children.last().unwrap_or(&id));
        self.attach(id, children, end);
        Ok(id)
    }

    fn for_stmt(&mut self) -> ParseResult<NodeId> {
        let token = self.bump();
        let id = self.alloc(NodeKind::For, token.start);
        let target = self.name(true)?;
        if !self.bump().is_keyword("in") {
            return Err(self.error("expected `in`"));
        }
        let iterable = self.expression()?;
        self.expect(TokenKind::Colon, ":")?;
        let suite = self.suite()?;
        let end = self.end_of(suite);
        self.attach(id, vec![target, iterable, suite], end);
        Ok(id)
    }

    fn while_stmt(&mut self) -> ParseResult<NodeId> {
        let token = self.bump();
        let id = self.alloc(NodeKind::While, token.start);
        let cond = self.expression()?;
        self.expect(TokenKind::Colon, ":")?;
        let suite = self.suite()?;
        let end = self.end_of(suite);
        self.attach(id, vec![cond, suite], end);
        Ok(id)
    }

    /// Assignment or bare expression statement.
    fn simple_stmt(&mut self) -> ParseResult<NodeId> {
        let start = self.current().start;
        let first = self.expression()?;
        if self.at(TokenKind::Equal) {
            self.bump();
            let id = self.alloc(NodeKind::Assignment, start);
            self.mark_target(first);
            let value = self.expression()?;
            let end = self.end_of(value);
            self.attach(id, vec![first, value], end);
            self.expect(TokenKind::Newline, "newline")?;
            Ok(id)
        } else {
            let id = self.alloc(NodeKind::ExprStmt, start);
            let end = self.end_of(first);
            self.attach(id, vec![first], end);
            self.expect(TokenKind::Newline, "newline")?;
            Ok(id)
        }
    }

    // -- expressions -------------------------------------------------------

    fn expression(&mut self) -> ParseResult<NodeId> {
        let mut lhs = self.postfix()?;
        while self.at(TokenKind::Operator)
            || self.at(TokenKind::Star)
            || self.at(TokenKind::DoubleStar)
            || self.at_keyword("in")
            || self.at_keyword("not")
            || self.at_keyword("and")
            || self.at_keyword("or")
            || self.at_keyword("is")
        {
            self.bump();
            let id = self.alloc(NodeKind::BinaryOp, self.nodes[lhs.index()].start);
            let rhs = self.postfix()?;
            let end = self.end_of(rhs);
            self.attach(id, vec![lhs, rhs], end);
            lhs = id;
        }
        Ok(lhs)
    }

    fn postfix(&mut self) -> ParseResult<NodeId> {
        let mut expr = self.atom()?;
        loop {
            if self.at(TokenKind::Dot) {
                self.bump();
                let name = self.name(false)?;
                let id = self.alloc(NodeKind::Attribute, self.nodes[expr.index()].start);
                let end = self.end_of(name);
                self.attach(id, vec![expr, name], end);
                expr = id;
            } else if self.at(TokenKind::LeftParen) {
                self.bump();
                let id = self.alloc(NodeKind::Call, self.nodes[expr.index()].start);
                let mut children = vec![expr];
                while !self.at(TokenKind::RightParen) {
                    children.push(self.call_argument()?);
                    if self.at(TokenKind::Comma) {
                        self.bump();
                    }
                }
                let close = self.expect(TokenKind::RightParen, ")")?;
                self.attach(id, children, close.end);
                expr = id;
            } else if self.at(TokenKind::LeftBracket) {
                self.bump();
                let id = self.alloc(NodeKind::Subscript, self.nodes[expr.index()].start);
                let index = self.expression()?;
                let close = self.expect(TokenKind::RightBracket, "]")?;
                self.attach(id, vec![expr, index], close.end);
                expr = id;
            } else {
                return Ok(expr);
            }
        }
    }

    fn call_argument(&mut self) -> ParseResult<NodeId> {
        // `name=expr` keyword arguments; starred arguments collapse to the
        // inner expression.
        while self.at(TokenKind::Star) || self.at(TokenKind::DoubleStar) {
            self.bump();
        }
        if self.at(TokenKind::Name)
            && self.tokens[(self.cursor + 1).min(self.tokens.len() - 1)].kind == TokenKind::Equal
        {
            let name = self.name(false)?;
            let id = self.alloc(NodeKind::Keyword, self.nodes[name.index()].start);
            self.bump(); // =
            let value = self.expression()?;
            let end = self.end_of(value);
            self.attach(id, vec![name, value], end);
            Ok(id)
        } else {
            self.expression()
        }
    }

    fn atom(&mut self) -> ParseResult<NodeId> {
        match self.current().kind {
            TokenKind::Name => self.name(false),
            TokenKind::Number => {
                let token = self.bump();
                let id = self.leaf(NodeKind::Number, token.value.clone(), token.start, token.end);
                if token.value.contains('.') || token.value.contains('e') {
                    self.nodes[id.index()].flags |= NodeFlags::FLOAT;
                }
                Ok(id)
            }
            TokenKind::String => {
                let token = self.bump();
                Ok(self.leaf(NodeKind::String, token.value, token.start, token.end))
            }
            TokenKind::Operator => {
                // Unary operator: `-x`, `~x`, `not x`.
                self.bump();
                self.postfix()
            }
            TokenKind::LeftParen => {
                let open = self.bump();
                if self.at(TokenKind::RightParen) {
                    let close = self.bump();
                    let id = self.alloc(NodeKind::TupleDisplay, open.start);
                    self.nodes[id.index()].end = close.end;
                    return Ok(id);
                }
                let first = self.expression()?;
                if self.at(TokenKind::Comma) {
                    let id = self.alloc(NodeKind::TupleDisplay, open.start);
                    let mut children = vec![first];
                    while self.at(TokenKind::Comma) {
                        self.bump();
                        if self.at(TokenKind::RightParen) {
                            break;
                        }
                        children.push(self.expression()?);
                    }
                    let close = self.expect(TokenKind::RightParen, ")")?;
                    self.attach(id, children, close.end);
                    Ok(id)
                } else {
                    self.expect(TokenKind::RightParen, ")")?;
                    Ok(first)
                }
            }
            TokenKind::LeftBracket => {
                let open = self.bump();
                if self.at(TokenKind::RightBracket) {
                    let close = self.bump();
                    let id = self.alloc(NodeKind::ListDisplay, open.start);
                    self.nodes[id.index()].end = close.end;
                    return Ok(id);
                }
                let first = self.expression()?;
                if self.at_keyword("for") {
                    let id = self.comprehension(open.start, first)?;
                    self.expect(TokenKind::RightBracket, "]")?;
                    return Ok(id);
                }
                let id = self.alloc(NodeKind::ListDisplay, open.start);
                let mut children = vec![first];
                while self.at(TokenKind::Comma) {
                    self.bump();
                    if self.at(TokenKind::RightBracket) {
                        break;
                    }
                    children.push(self.expression()?);
                }
                let close = self.expect(TokenKind::RightBracket, "]")?;
                self.attach(id, children, close.end);
                Ok(id)
            }
            TokenKind::LeftBrace => {
                let open = self.bump();
                if self.at(TokenKind::RightBrace) {
                    let close = self.bump();
                    let id = self.alloc(NodeKind::DictDisplay, open.start);
                    self.nodes[id.index()].end = close.end;
                    return Ok(id);
                }
                let first = self.expression()?;
                if self.at(TokenKind::Colon) {
                    // Dict display; values are parsed but not modeled.
                    let id = self.alloc(NodeKind::DictDisplay, open.start);
                    let mut children = vec![first];
                    self.bump();
                    children.push(self.expression()?);
                    while self.at(TokenKind::Comma) {
                        self.bump();
                        if self.at(TokenKind::RightBrace) {
                            break;
                        }
                        children.push(self.expression()?);
                        self.expect(TokenKind::Colon, ":")?;
                        children.push(self.expression()?);
                    }
                    let close = self.expect(TokenKind::RightBrace, "}")?;
                    self.attach(id, children, close.end);
                    Ok(id)
                } else {
                    let id = self.alloc(NodeKind::SetDisplay, open.start);
                    let mut children = vec![first];
                    while self.at(TokenKind::Comma) {
                        self.bump();
                        if self.at(TokenKind::RightBrace) {
                            break;
                        }
                        children.push(self.expression()?);
                    }
                    let close = self.expect(TokenKind::RightBrace, "}")?;
                    self.attach(id, children, close.end);
                    Ok(id)
                }
            }
            _ => Err(self.error("expected expression")),
        }
    }

    fn comprehension(&mut self, start: Position, element: NodeId) -> ParseResult<NodeId> {
        let id = self.alloc(NodeKind::Comprehension, start);
        self.bump(); // for
        let target = self.name(true)?;
        if !self.bump().is_keyword("in") {
            return Err(self.error("expected `in`"));
        }
        let iterable = self.expression()?;
        let end = self.end_of(iterable);
        self.attach(id, vec![element, target, iterable], end);
        Ok(id)
    }

    fn name(&mut self, definition: bool) -> ParseResult<NodeId> {
        let token = self.expect(TokenKind::Name, "name")?;
        let id = self.leaf(NodeKind::Name, token.value, token.start, token.end);
        if definition {
            self.mark_definition(id);
        }
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use crate::tree::NodeKind;
    use crate::parse_module;

    #[test]
    fn class_with_method() {
        let tree = parse_module("class A:\n    def f(self):\n        return 1\n").unwrap();
        let class = tree.body(tree.root())[0];
        assert_eq!(tree.kind(class), NodeKind::ClassDef);
        assert_eq!(tree.value(tree.definition_name(class)), "A");
        let method = tree.body(class)[0];
        assert_eq!(tree.kind(method), NodeKind::FuncDef);
        assert_eq!(tree.params(method).len(), 1);
    }

    #[test]
    fn attribute_target_is_definition() {
        let tree = parse_module("class A:\n    def f(self):\n        self.x = 1\n").unwrap();
        let class = tree.body(tree.root())[0];
        let method = tree.body(class)[0];
        let assignment = tree.body(method)[0];
        assert_eq!(tree.kind(assignment), NodeKind::Assignment);
        let target = tree.children(assignment)[0];
        assert_eq!(tree.kind(target), NodeKind::Attribute);
        let attr = tree.children(target)[1];
        assert!(tree[attr].is_definition());
        assert_eq!(tree.value(attr), "x");
    }

    #[test]
    fn annotations_and_defaults() {
        let tree = parse_module("def f(a: int, b=1) -> str:\n    return b\n").unwrap();
        let func = tree.body(tree.root())[0];
        let params = tree.params(func);
        assert!(tree.param_annotation(params[0]).is_some());
        assert!(tree.param_default(params[1]).is_some());
        assert!(tree.return_annotation(func).is_some());
    }

    #[test]
    fn call_with_keyword_argument() {
        let tree = parse_module("f(1, key=2)\n").unwrap();
        let stmt = tree.body(tree.root())[0];
        let call = tree.children(stmt)[0];
        assert_eq!(tree.kind(call), NodeKind::Call);
        let children = tree.children(call);
        assert_eq!(children.len(), 3);
        assert_eq!(tree.kind(children[2]), NodeKind::Keyword);
    }

    #[test]
    fn docstring_extraction() {
        let tree = parse_module("def f():\n    \"\"\"doc\"\"\"\n    return 1\n").unwrap();
        let func = tree.body(tree.root())[0];
        assert_eq!(tree.docstring(func), Some("doc"));
    }

    #[test]
    fn comprehension_scope() {
        let tree = parse_module("xs = [x for x in ys]\n").unwrap();
        let assignment = tree.body(tree.root())[0];
        let comp = tree.children(assignment)[1];
        assert_eq!(tree.kind(comp), NodeKind::Comprehension);
        assert_eq!(tree.parent_scope(tree.children(comp)[0]), Some(comp));
    }

    #[test]
    fn parent_scope_of_nested_name() {
        let tree = parse_module("class A:\n    def f(self):\n        return self\n").unwrap();
        let class = tree.body(tree.root())[0];
        let method = tree.body(class)[0];
        let ret = tree.body(method)[0];
        let name = tree.children(ret)[0];
        assert_eq!(tree.parent_scope(name), Some(method));
        assert_eq!(tree.parent_scope(method), Some(class));
    }

    #[test]
    fn import_dotted() {
        let tree = parse_module("import threading.local\n").unwrap();
        let import = tree.body(tree.root())[0];
        assert_eq!(tree.kind(import), NodeKind::Import);
        let segments = tree.children(import);
        assert_eq!(segments.len(), 2);
        assert_eq!(tree.value(segments[0]), "threading");
    }

    #[test]
    fn malformed_input_is_an_error() {
        assert!(parse_module("def f(:\n").is_err());
        assert!(parse_module("class :\n    pass\n").is_err());
    }
}
