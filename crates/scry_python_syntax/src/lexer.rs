//! Lexer for the Python subset the engine consumes.
//!
//! Indentation is tracked with a stack, emitting `Indent`/`Dedent` tokens the
//! way CPython's tokenizer does; newlines inside brackets are ignored.

use compact_str::CompactString;

use crate::{ParseError, Position};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TokenKind {
    Name,
    Number,
    String,
    Newline,
    Indent,
    Dedent,
    EndOfFile,
    Dot,
    Comma,
    Colon,
    Equal,
    Arrow,
    LeftParen,
    RightParen,
    LeftBracket,
    RightBracket,
    LeftBrace,
    RightBrace,
    Star,
    DoubleStar,
    Operator,
}

#[derive(Debug, Clone)]
pub struct Token {
    pub kind: TokenKind,
    pub value: CompactString,
    pub start: Position,
    pub end: Position,
}

impl Token {
    pub fn is_keyword(&self, keyword: &str) -> bool {
        self.kind == TokenKind::Name && self.value == keyword
    }
}

pub fn lex(source: &str) -> Result<Vec<Token>, ParseError> {
    Lexer::new(source).run()
}

struct Lexer {
    chars: Vec<char>,
    offset: usize,
    line: u32,
    column: u32,
    indents: Vec<u32>,
    brackets: u32,
    tokens: Vec<Token>,
    at_line_start: bool,
}

impl Lexer {
    fn new(source: &str) -> Self {
        Self {
            chars: source.chars().collect(),
            offset: 0,
            line: 1,
            column: 0,
            indents: vec![0],
            brackets: 0,
            tokens: Vec::new(),
            at_line_start: true,
        }
    }

    fn position(&self) -> Position {
        Position::new(self.line, self.column)
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.offset).copied()
    }

    fn peek_at(&self, ahead: usize) -> Option<char> {
        self.chars.get(self.offset + ahead).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.offset += 1;
        if c == '\n' {
            self.line += 1;
            self.column = 0;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn error(&self, message: impl Into<String>) -> ParseError {
        ParseError {
            message: message.into(),
            position: self.position(),
        }
    }

    fn push(&mut self, kind: TokenKind, value: CompactString, start: Position) {
        self.tokens.push(Token {
            kind,
            value,
            start,
            end: self.position(),
        });
    }

    fn push_simple(&mut self, kind: TokenKind, start: Position) {
        self.push(kind, CompactString::default(), start);
    }

    fn run(mut self) -> Result<Vec<Token>, ParseError> {
        loop {
            if self.at_line_start && self.brackets == 0 {
                if !self.handle_indentation()? {
                    break;
                }
                self.at_line_start = false;
            }
            let start = self.position();
            let Some(c) = self.peek() else {
                break;
            };
            match c {
                '#' => {
                    while self.peek().is_some_and(|c| c != '\n') {
                        self.bump();
                    }
                }
                '\n' => {
                    self.bump();
                    if self.brackets == 0 {
                        // Collapse blank lines into the preceding newline.
                        if matches!(
                            self.tokens.last().map(|token| token.kind),
                            Some(TokenKind::Newline | TokenKind::Indent) | None
                        ) {
                            // no-op
                        } else {
                            self.push_simple(TokenKind::Newline, start);
                        }
                        self.at_line_start = true;
                    }
                }
                ' ' | '\t' | '\r' => {
                    self.bump();
                }
                '\\' if self.peek_at(1) == Some('\n') => {
                    self.bump();
                    self.bump();
                }
                '\'' | '"' => self.lex_string()?,
                c if c.is_ascii_digit() => self.lex_number(),
                c if is_identifier_start(c) => self.lex_name(),
                _ => self.lex_operator()?,
            }
        }
        // Close the final line and any open indentation levels.
        if !matches!(
            self.tokens.last().map(|token| token.kind),
            Some(TokenKind::Newline | TokenKind::Dedent) | None
        ) {
            let position = self.position();
            self.push_simple(TokenKind::Newline, position);
        }
        while self.indents.len() > 1 {
            self.indents.pop();
            let position = self.position();
            self.push_simple(TokenKind::Dedent, position);
        }
        let position = self.position();
        self.push_simple(TokenKind::EndOfFile, position);
        Ok(self.tokens)
    }

    /// Measures the indentation of the upcoming line and emits
    /// `Indent`/`Dedent` tokens. Returns `false` at end of input.
    fn handle_indentation(&mut self) -> Result<bool, ParseError> {
        loop {
            let mut width = 0u32;
            let mut ahead = 0usize;
            loop {
                match self.peek_at(ahead) {
                    Some(' ') => width += 1,
                    Some('\t') => width += 8 - width % 8,
                    _ => break,
                }
                ahead += 1;
            }
            match self.peek_at(ahead) {
                None => {
                    for _ in 0..ahead {
                        self.bump();
                    }
                    return Ok(false);
                }
                // Blank or comment-only lines don't affect indentation.
                Some('\n') | Some('#') => {
                    for _ in 0..ahead {
                        self.bump();
                    }
                    while self.peek().is_some_and(|c| c != '\n') {
                        self.bump();
                    }
                    if self.bump().is_none() {
                        return Ok(false);
                    }
                    continue;
                }
                Some(_) => {
                    for _ in 0..ahead {
                        self.bump();
                    }
                    let current = *self.indents.last().unwrap_or(&0);
                    if width > current {
                        self.indents.push(width);
                        let position = self.position();
                        self.push_simple(TokenKind::Indent, position);
                    } else if width < current {
                        while self.indents.last().is_some_and(|&level| level > width) {
                            self.indents.pop();
                            let position = self.position();
                            self.push_simple(TokenKind::Dedent, position);
                        }
                        if self.indents.last() != Some(&width) {
                            return Err(self.error("unindent does not match any outer level"));
                        }
                    }
                    return Ok(true);
                }
            }
        }
    }

    fn lex_name(&mut self) {
        let start = self.position();
        let mut value = CompactString::default();
        while let Some(c) = self.peek() {
            if is_identifier_continue(c) {
                value.push(c);
                self.bump();
            } else {
                break;
            }
        }
        self.push(TokenKind::Name, value, start);
    }

    fn lex_number(&mut self) {
        let start = self.position();
        let mut value = CompactString::default();
        while let Some(c) = self.peek() {
            if c.is_ascii_alphanumeric() || c == '.' || c == '_' {
                value.push(c);
                self.bump();
            } else {
                break;
            }
        }
        self.push(TokenKind::Number, value, start);
    }

    fn lex_string(&mut self) -> Result<(), ParseError> {
        let start = self.position();
        let quote = self.bump().unwrap_or('"');
        let triple = self.peek() == Some(quote) && self.peek_at(1) == Some(quote);
        if triple {
            self.bump();
            self.bump();
        }
        let mut value = CompactString::default();
        loop {
            let Some(c) = self.peek() else {
                return Err(self.error("unterminated string literal"));
            };
            if c == quote {
                if triple {
                    if self.peek_at(1) == Some(quote) && self.peek_at(2) == Some(quote) {
                        self.bump();
                        self.bump();
                        self.bump();
                        break;
                    }
                    value.push(c);
                    self.bump();
                } else {
                    self.bump();
                    break;
                }
            } else if c == '\\' {
                self.bump();
                if let Some(escaped) = self.bump() {
                    match escaped {
                        'n' => value.push('\n'),
                        't' => value.push('\t'),
                        other => value.push(other),
                    }
                }
            } else if c == '\n' && !triple {
                return Err(self.error("unterminated string literal"));
            } else {
                value.push(c);
                self.bump();
            }
        }
        self.push(TokenKind::String, value, start);
        Ok(())
    }

    fn lex_operator(&mut self) -> Result<(), ParseError> {
        let start = self.position();
        let c = self.bump().unwrap_or_default();
        let kind = match c {
            '.' => TokenKind::Dot,
            ',' => TokenKind::Comma,
            ':' => TokenKind::Colon,
            '(' => {
                self.brackets += 1;
                TokenKind::LeftParen
            }
            ')' => {
                self.brackets = self.brackets.saturating_sub(1);
                TokenKind::RightParen
            }
            '[' => {
                self.brackets += 1;
                TokenKind::LeftBracket
            }
            ']' => {
                self.brackets = self.brackets.saturating_sub(1);
                TokenKind::RightBracket
            }
            '{' => {
                self.brackets += 1;
                TokenKind::LeftBrace
            }
            '}' => {
                self.brackets = self.brackets.saturating_sub(1);
                TokenKind::RightBrace
            }
            '=' => {
                if self.peek() == Some('=') {
                    self.bump();
                    TokenKind::Operator
                } else {
                    TokenKind::Equal
                }
            }
            '-' => {
                if self.peek() == Some('>') {
                    self.bump();
                    TokenKind::Arrow
                } else {
                    TokenKind::Operator
                }
            }
            '*' => {
                if self.peek() == Some('*') {
                    self.bump();
                    TokenKind::DoubleStar
                } else {
                    TokenKind::Star
                }
            }
            '+' | '/' | '%' | '<' | '>' | '!' | '&' | '|' | '^' | '~' | '@' | ';' => {
                if self.peek() == Some('=') {
                    self.bump();
                }
                TokenKind::Operator
            }
            other => return Err(self.error(format!("unexpected character {other:?}"))),
        };
        self.push_simple(kind, start);
        Ok(())
    }
}

fn is_identifier_start(c: char) -> bool {
    c == '_' || c.is_alphabetic()
}

fn is_identifier_continue(c: char) -> bool {
    c == '_' || c.is_alphanumeric()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        lex(source)
            .unwrap()
            .into_iter()
            .map(|token| token.kind)
            .collect()
    }

    #[test]
    fn simple_assignment() {
        assert_eq!(
            kinds("x = 1\n"),
            vec![
                TokenKind::Name,
                TokenKind::Equal,
                TokenKind::Number,
                TokenKind::Newline,
                TokenKind::EndOfFile,
            ]
        );
    }

    #[test]
    fn indentation_tokens() {
        let source = "def f():\n    pass\n";
        assert_eq!(
            kinds(source),
            vec![
                TokenKind::Name,
                TokenKind::Name,
                TokenKind::LeftParen,
                TokenKind::RightParen,
                TokenKind::Colon,
                TokenKind::Newline,
                TokenKind::Indent,
                TokenKind::Name,
                TokenKind::Newline,
                TokenKind::Dedent,
                TokenKind::EndOfFile,
            ]
        );
    }

    #[test]
    fn blank_lines_do_not_dedent() {
        let source = "def f():\n    a = 1\n\n    b = 2\n";
        let dedents = kinds(source)
            .into_iter()
            .filter(|kind| *kind == TokenKind::Dedent)
            .count();
        assert_eq!(dedents, 1);
    }

    #[test]
    fn newlines_inside_brackets_are_ignored() {
        let source = "f(1,\n  2)\n";
        assert!(!kinds(source).contains(&TokenKind::Indent));
    }

    #[test]
    fn triple_quoted_string() {
        let tokens = lex("x = \"\"\"doc\nstring\"\"\"\n").unwrap();
        let string = tokens
            .iter()
            .find(|token| token.kind == TokenKind::String)
            .unwrap();
        assert_eq!(string.value, "doc\nstring");
    }

    #[test]
    fn positions_are_tracked() {
        let tokens = lex("x = 1\ny = 2\n").unwrap();
        let y = &tokens[4];
        assert_eq!(y.start, Position::new(2, 0));
    }

    #[test]
    fn unterminated_string_is_an_error() {
        assert!(lex("x = 'oops\n").is_err());
    }
}
