//! Constant expression parsing implementation
//!
//! Constant expressions appear in `const` declarations, array and template
//! bounds, union case labels and parameter default values.
//!
//! # Precedence
//!
//! From loosest to tightest binding, all binary levels left-associative:
//!
//! ```text
//! or_expr    ::= xor_expr ("|" xor_expr)*
//! xor_expr   ::= and_expr ("^" and_expr)*
//! and_expr   ::= shift_expr ("&" shift_expr)*
//! shift_expr ::= add_expr (("<<" | ">>") add_expr)*
//! add_expr   ::= mult_expr (("+" | "-") mult_expr)*
//! mult_expr  ::= unary_expr (("*" | "/" | "%") unary_expr)*
//! unary_expr ::= ("-" | "+" | "~")? primary
//! primary    ::= scoped_name | literal | "(" or_expr ")"
//! ```
//!
//! Inside an open template bracket `>>` is left alone so that it can close
//! two templates at once.
//!
//! All parsing methods are implemented as `pub(crate)` methods on the [`Parser`] struct.

use crate::parser::ast::*;
use crate::parser::lexer::TokenKind;
use crate::parser::parse::{ParseResult, Parser};
use crate::parser::types::unquote;

/// Binary operator levels, loosest first.
const LEVELS: &[&[(TokenKind, BinOp)]] = &[
    &[(TokenKind::Pipe, BinOp::Or)],
    &[(TokenKind::Caret, BinOp::Xor)],
    &[(TokenKind::Ampersand, BinOp::And)],
    &[(TokenKind::Shl, BinOp::Shl), (TokenKind::Shr, BinOp::Shr)],
    &[(TokenKind::Plus, BinOp::Add), (TokenKind::Minus, BinOp::Sub)],
    &[
        (TokenKind::Asterisk, BinOp::Mul),
        (TokenKind::Slash, BinOp::Div),
        (TokenKind::Percent, BinOp::Mod),
    ],
];

impl Parser {
    /// Parse a constant expression (top-level entry point)
    pub(crate) fn parse_const_expr(&mut self) -> ParseResult<ConstExpr> {
        self.parse_binary(0)
    }

    fn parse_binary(&mut self, level: usize) -> ParseResult<ConstExpr> {
        let Some(operators) = LEVELS.get(level) else {
            return self.parse_unary();
        };

        let mut lhs = self.parse_binary(level + 1)?;
        while let Some(op) = self.match_binary_operator(operators)? {
            let rhs = self.parse_binary(level + 1)?;
            lhs = ConstExpr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn match_binary_operator(&mut self, operators: &[(TokenKind, BinOp)]) -> ParseResult<Option<BinOp>> {
        let Some(kind) = self.peek_kind()? else {
            return Ok(None);
        };
        if kind == TokenKind::Shr && self.angle_depth > 0 {
            return Ok(None);
        }
        match operators.iter().find(|(candidate, _)| *candidate == kind) {
            Some(&(_, op)) => {
                self.advance()?;
                Ok(Some(op))
            }
            None => Ok(None),
        }
    }

    fn parse_unary(&mut self) -> ParseResult<ConstExpr> {
        let op = match self.peek_kind()? {
            Some(TokenKind::Minus) => UnOp::Negate,
            Some(TokenKind::Plus) => UnOp::Plus,
            Some(TokenKind::Tilde) => UnOp::Invert,
            _ => return self.parse_primary(),
        };
        self.advance()?;
        let operand = self.parse_primary()?;
        Ok(ConstExpr::Unary {
            op,
            operand: Box::new(operand),
        })
    }

    fn parse_primary(&mut self) -> ParseResult<ConstExpr> {
        let Some(kind) = self.peek_kind()? else {
            return Err(self.unexpected_end());
        };

        match kind {
            TokenKind::Ident | TokenKind::Scope => Ok(ConstExpr::Name(self.parse_scoped_name()?)),
            TokenKind::LParen => {
                self.advance()?;
                // Parentheses shield a `>>` from any enclosing template
                let depth = std::mem::replace(&mut self.angle_depth, 0);
                let inner = self.parse_const_expr();
                self.angle_depth = depth;
                let inner = inner?;
                self.expect_token(TokenKind::RParen, "to close expression")?;
                Ok(inner)
            }
            TokenKind::DqString => self.parse_string_literal(),
            _ => {
                let literal: fn(String) -> Literal = match kind {
                    TokenKind::Integer => Literal::Integer,
                    TokenKind::FloatingPt => Literal::Float,
                    TokenKind::FixedPt => Literal::FixedPoint,
                    TokenKind::SqString => |text: String| Literal::Char(unquote(&text)),
                    TokenKind::True => |_| Literal::Boolean(true),
                    TokenKind::False => |_| Literal::Boolean(false),
                    _ => return Err(self.unexpected("expected an expression")),
                };
                let token = self.advance()?;
                Ok(ConstExpr::Literal(literal(token.value)))
            }
        }
    }

    /// One or more adjacent string literals, folded left into `Concat`.
    fn parse_string_literal(&mut self) -> ParseResult<ConstExpr> {
        let first = self.expect_token(TokenKind::DqString, "for string literal")?;
        let mut expr = ConstExpr::Literal(Literal::String(unquote(&first.value)));
        while self.check(TokenKind::DqString)? {
            let next = self.advance()?;
            expr = ConstExpr::Concat(
                Box::new(expr),
                Box::new(ConstExpr::Literal(Literal::String(unquote(&next.value)))),
            );
        }
        Ok(expr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::Dialect;

    fn expr(source: &str) -> ConstExpr {
        Parser::new(source, Dialect::OmgIdl).parse_const_expr().unwrap()
    }

    fn int(value: &str) -> ConstExpr {
        ConstExpr::Literal(Literal::Integer(value.to_string()))
    }

    #[test]
    fn test_precedence() {
        // 1 | 2 + 3 * 4  =>  1 | (2 + (3 * 4))
        match expr("1 | 2 + 3 * 4") {
            ConstExpr::Binary { op: BinOp::Or, lhs, rhs } => {
                assert_eq!(*lhs, int("1"));
                match *rhs {
                    ConstExpr::Binary { op: BinOp::Add, rhs, .. } => {
                        assert!(matches!(*rhs, ConstExpr::Binary { op: BinOp::Mul, .. }));
                    }
                    other => panic!("Expected addition, got {:?}", other),
                }
            }
            other => panic!("Expected or, got {:?}", other),
        }
    }

    #[test]
    fn test_left_associative() {
        match expr("8 - 4 - 2") {
            ConstExpr::Binary { op: BinOp::Sub, lhs, rhs } => {
                assert!(matches!(*lhs, ConstExpr::Binary { op: BinOp::Sub, .. }));
                assert_eq!(*rhs, int("2"));
            }
            other => panic!("Expected subtraction, got {:?}", other),
        }
    }

    #[test]
    fn test_unary_and_parens() {
        assert!(matches!(expr("-5"), ConstExpr::Unary { op: UnOp::Negate, .. }));
        assert!(matches!(expr("~(1 << 2)"), ConstExpr::Unary { op: UnOp::Invert, .. }));
        assert!(matches!(expr("(1 + 2) * 3"), ConstExpr::Binary { op: BinOp::Mul, .. }));
    }

    #[test]
    fn test_literals() {
        assert_eq!(expr("0x1F"), int("0x1F"));
        assert_eq!(expr("TRUE"), ConstExpr::Name(ScopedName::from_segments(&["TRUE".to_string()], false).unwrap()));
        assert_eq!(expr("'a'"), ConstExpr::Literal(Literal::Char("a".to_string())));
        assert!(matches!(expr("1.5"), ConstExpr::Literal(Literal::Float(_))));
        assert!(matches!(expr("1.5d"), ConstExpr::Literal(Literal::FixedPoint(_))));
        assert!(matches!(expr("::m::X"), ConstExpr::Name(name) if name.is_absolute()));
    }

    #[test]
    fn test_boolean_literals() {
        assert_eq!(expr("true"), ConstExpr::Literal(Literal::Boolean(true)));
        assert_eq!(expr("false"), ConstExpr::Literal(Literal::Boolean(false)));
    }

    #[test]
    fn test_string_concatenation() {
        match expr("\"ab\" \"cd\" \"ef\"") {
            ConstExpr::Concat(lhs, rhs) => {
                assert!(matches!(*lhs, ConstExpr::Concat(_, _)));
                assert_eq!(*rhs, ConstExpr::Literal(Literal::String("ef".to_string())));
            }
            other => panic!("Expected concatenation, got {:?}", other),
        }
    }

    #[test]
    fn test_shift_inside_template() {
        let mut parser = Parser::new("1 >> 2", Dialect::OmgIdl);
        parser.angle_depth = 1;
        assert_eq!(parser.parse_const_expr().unwrap(), int("1"));

        assert!(matches!(expr("1 >> 2"), ConstExpr::Binary { op: BinOp::Shr, .. }));
    }

    #[test]
    fn test_missing_operand() {
        let err = Parser::new("1 +", Dialect::OmgIdl).parse_const_expr().unwrap_err();
        assert_eq!(err.message(), "Unexpected end of input");
    }
}
