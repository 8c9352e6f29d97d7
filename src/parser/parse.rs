//! Main parser coordinator
//!
//! This module provides the [`Parser`] struct and core parsing infrastructure,
//! including the syntax error type, token helpers, and the main parse entry
//! point.
//!
//! # Parser Architecture
//!
//! The Parser uses a recursive descent approach with the following organization:
//! - This module: Parser struct, helper methods, and coordination
//! - `declarations`: modules, interfaces, valuetypes and type declarations
//! - `members`: attributes, operations and parameter lists
//! - `types`: type specs, declarators, scoped names and property lists
//! - `expressions`: constant expressions with a precedence ladder
//!
//! # Implementation
//!
//! Parser methods are split across multiple files using `impl Parser` blocks,
//! allowing each module to extend the Parser with related functionality while
//! maintaining access to the shared parser state.
//!
//! Tokens are pulled from the [`Lexer`] one at a time and at most one token is
//! buffered. Consuming a token never reads the next one, which lets the
//! parser switch the lexer into its property state right after a `[`.

use crate::error::{with_line, Error};
use crate::options::Dialect;
use crate::parser::ast::*;
use crate::parser::lexer::{Lexer, Token, TokenKind};
use rustc_hash::FxHashMap;
use std::fmt;
use tracing::debug;

/// Grammar or validation failure. No partial tree is produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxError {
    pub message: String,
    /// `None` when the input ended unexpectedly.
    pub line: Option<usize>,
}

impl SyntaxError {
    pub fn new(message: impl Into<String>, line: Option<usize>) -> Self {
        SyntaxError {
            message: message.into(),
            line,
        }
    }
}

impl fmt::Display for SyntaxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&with_line(&self.message, self.line))
    }
}

impl std::error::Error for SyntaxError {}

pub(crate) type ParseResult<T> = Result<T, Error>;

/// Modifiers and properties collected ahead of a declaration.
#[derive(Debug, Default)]
pub(crate) struct Prefix {
    pub(crate) modifiers: Vec<Modifier>,
    pub(crate) properties: Vec<Property>,
}

impl Prefix {
    pub(crate) fn is_empty(&self) -> bool {
        self.modifiers.is_empty() && self.properties.is_empty()
    }
}

/// Recursive descent parser for IDL
pub struct Parser {
    pub(crate) lexer: Lexer,
    pub(crate) lookahead: Option<Token>,
    pub(crate) dialect: Dialect,
    /// Line of the most recently consumed token.
    pub(crate) last_line: usize,
    /// Open `<` of template types; `>>` inside them closes two levels.
    pub(crate) angle_depth: usize,
}

impl Parser {
    pub fn new(source: &str, dialect: Dialect) -> Self {
        Self::from_lexer(Lexer::new(source, dialect))
    }

    pub fn from_lexer(lexer: Lexer) -> Self {
        let dialect = lexer.dialect();
        Self {
            lexer,
            lookahead: None,
            dialect,
            last_line: 1,
            angle_depth: 0,
        }
    }

    /// Parse the entire input as a specification.
    pub fn parse_specification(&mut self) -> ParseResult<Specification> {
        let mut definitions = Vec::new();

        while self.peek()?.is_some() {
            if let Some(definition) = self.parse_definition()? {
                definitions.push(definition);
            }
        }

        debug!(definitions = definitions.len(), "parsed specification");
        Ok(Specification::new(definitions))
    }

    /// Pragmas recorded by the lexer and not yet consumed.
    pub fn pragmas(&self) -> &FxHashMap<String, Option<String>> {
        self.lexer.pragmas()
    }

    // ===== Helper methods =====

    pub(crate) fn webidl(&self) -> bool {
        self.dialect.is_webidl()
    }

    pub(crate) fn peek(&mut self) -> ParseResult<Option<&Token>> {
        if self.lookahead.is_none() {
            self.lookahead = self.lexer.next_token()?;
        }
        Ok(self.lookahead.as_ref())
    }

    pub(crate) fn peek_kind(&mut self) -> ParseResult<Option<TokenKind>> {
        Ok(self.peek()?.map(|token| token.kind))
    }

    pub(crate) fn check(&mut self, kind: TokenKind) -> ParseResult<bool> {
        Ok(self.peek_kind()? == Some(kind))
    }

    /// True when the next token is the identifier `word`.
    pub(crate) fn check_word(&mut self, word: &str) -> ParseResult<bool> {
        Ok(self
            .peek()?
            .is_some_and(|token| token.kind == TokenKind::Ident && token.value == word))
    }

    pub(crate) fn advance(&mut self) -> ParseResult<Token> {
        self.peek()?;
        match self.lookahead.take() {
            Some(token) => {
                self.last_line = token.line;
                Ok(token)
            }
            None => Err(self.unexpected_end()),
        }
    }

    pub(crate) fn match_token(&mut self, kind: TokenKind) -> ParseResult<bool> {
        if self.check(kind)? {
            self.advance()?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    pub(crate) fn expect_token(&mut self, kind: TokenKind, ctx: &str) -> ParseResult<Token> {
        if self.check(kind)? {
            self.advance()
        } else {
            Err(self.unexpected(&format!("expected {} {}", kind, ctx)))
        }
    }

    pub(crate) fn expect_semicolon(&mut self, ctx: &str) -> ParseResult<()> {
        self.expect_token(TokenKind::Semicolon, ctx).map(|_| ())
    }

    pub(crate) fn expect_identifier(&mut self, ctx: &str) -> ParseResult<String> {
        self.expect_token(TokenKind::Ident, ctx)
            .map(|token| token.value)
    }

    /// Consume one `>`, splitting a `>>` token in two.
    pub(crate) fn expect_closing_angle(&mut self, ctx: &str) -> ParseResult<()> {
        self.peek()?;
        if let Some(token) = self.lookahead.as_mut().filter(|t| t.kind == TokenKind::Shr) {
            token.kind = TokenKind::Gt;
            token.value = ">".to_string();
            self.last_line = token.line;
            return Ok(());
        }
        self.expect_token(TokenKind::Gt, ctx).map(|_| ())
    }

    /// Line of the next token, or of the last one when nothing is buffered.
    pub(crate) fn line(&self) -> usize {
        self.lookahead
            .as_ref()
            .map_or(self.last_line, |token| token.line)
    }

    pub(crate) fn error(&self, message: impl Into<String>) -> Error {
        SyntaxError::new(message, Some(self.line())).into()
    }

    pub(crate) fn unexpected_end(&self) -> Error {
        SyntaxError::new("Unexpected end of input", None).into()
    }

    /// Error about the buffered token.
    pub(crate) fn unexpected(&mut self, detail: &str) -> Error {
        match self.peek() {
            Ok(Some(token)) => {
                let found = format!("'{}'", token.value);
                self.error(format!("Syntax error: {}, found {}", detail, found))
            }
            Ok(None) => self.unexpected_end(),
            Err(err) => err,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(source: &str) -> ParseResult<Specification> {
        Parser::new(source, Dialect::OmgIdl).parse_specification()
    }

    #[test]
    fn test_parse_empty() {
        let spec = parse("").unwrap();
        assert!(spec.definitions.is_empty());

        let spec = parse(";;\n;").unwrap();
        assert!(spec.definitions.is_empty());
    }

    #[test]
    fn test_parse_simple_interface() {
        let spec = parse("interface Foo { void ping(); };").unwrap();

        assert_eq!(spec.definitions.len(), 1);
        match &spec.definitions[0] {
            Definition::Interface(interface) => {
                assert_eq!(interface.name, "Foo");
                assert_eq!(interface.supers, Some(vec![]));
                assert_eq!(interface.body.as_ref().map(Vec::len), Some(1));
            }
            _ => panic!("Expected interface definition"),
        }
    }

    #[test]
    fn test_unexpected_end() {
        let err = parse("interface Foo {").unwrap_err();
        assert_eq!(err.message(), "Unexpected end of input");
        assert_eq!(err.line(), None);
    }

    #[test]
    fn test_syntax_error_line() {
        let err = parse("module M {\n  interface ;\n};").unwrap_err();
        assert!(matches!(err, Error::Syntax(_)));
        assert_eq!(err.line(), Some(2));
    }

    #[test]
    fn test_lexical_error_propagates() {
        let err = parse("interface @").unwrap_err();
        assert!(matches!(err, Error::Lexical(_)));
    }

    #[test]
    fn test_split_shift_right() {
        let mut parser = Parser::new(">> x", Dialect::OmgIdl);
        parser.peek().unwrap();
        parser.expect_closing_angle("in test").unwrap();
        parser.expect_closing_angle("in test").unwrap();
        assert_eq!(parser.expect_identifier("in test").unwrap(), "x");
    }
}
