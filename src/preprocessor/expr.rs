//! `#if` / `#elif` expression evaluation
//!
//! Conditions are evaluated by a small integer-only parser over the already
//! macro-expanded text. Identifiers that survive expansion evaluate to `0`.
//!
//! ```text
//! expr    := or ('?' expr ':' expr)?
//! or      := and ('||' and)*
//! and     := bitor ('&&' bitor)*
//! bitor   := bitxor ('|' bitxor)*
//! bitxor  := bitand ('^' bitand)*
//! bitand  := equal ('&' equal)*
//! equal   := rel (('==' | '!=') rel)*
//! rel     := shift (('<' | '>' | '<=' | '>=') shift)*
//! shift   := add (('<<' | '>>') add)*
//! add     := mul (('+' | '-') mul)*
//! mul     := unary (('*' | '/' | '%') unary)*
//! unary   := ('!' | '~' | '-' | '+') unary | primary
//! primary := number | char | identifier | '(' expr ')'
//! ```

use std::iter::Peekable;
use std::str::Chars;

#[derive(Debug, Clone, PartialEq)]
enum Tok {
    Num(i64),
    Ident,
    Op(&'static str),
}

#[derive(Debug, Clone, PartialEq)]
enum Expr {
    Num(i64),
    Unary(&'static str, Box<Expr>),
    Binary(&'static str, Box<Expr>, Box<Expr>),
    Ternary(Box<Expr>, Box<Expr>, Box<Expr>),
}

const OPERATORS: [&str; 24] = [
    "||", "&&", "==", "!=", "<=", ">=", "<<", ">>", "|", "^", "&", "<", ">", "+", "-", "*", "/",
    "%", "!", "~", "(", ")", "?", ":",
];

/// Evaluate a controlling expression. Errors describe what went wrong without
/// location; the caller adds it.
pub fn evaluate(text: &str) -> Result<i64, String> {
    let tokens = scan(text)?;
    let mut parser = ExprParser { tokens, pos: 0 };
    let expr = parser.parse_ternary()?;
    if parser.pos != parser.tokens.len() {
        return Err("unexpected trailing tokens".to_string());
    }
    eval(&expr)
}

fn scan(text: &str) -> Result<Vec<Tok>, String> {
    let mut tokens = Vec::new();
    let mut chars = text.chars().peekable();

    while let Some(&c) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
        } else if c.is_ascii_digit() {
            tokens.push(Tok::Num(scan_number(&mut chars)?));
        } else if c.is_ascii_alphabetic() || c == '_' {
            while chars.peek().is_some_and(|c| c.is_ascii_alphanumeric() || *c == '_') {
                chars.next();
            }
            tokens.push(Tok::Ident);
        } else if c == '\'' {
            tokens.push(Tok::Num(scan_char(&mut chars)?));
        } else {
            let rest: String = chars.clone().take(2).collect();
            let op = OPERATORS
                .iter()
                .find(|op| rest.starts_with(*op))
                .ok_or_else(|| format!("unexpected character '{}'", c))?;
            for _ in 0..op.len() {
                chars.next();
            }
            tokens.push(Tok::Op(*op));
        }
    }

    Ok(tokens)
}

fn scan_number(chars: &mut Peekable<Chars>) -> Result<i64, String> {
    let mut text = String::new();
    while chars.peek().is_some_and(|c| c.is_ascii_alphanumeric()) {
        text.extend(chars.next());
    }

    let digits = text.trim_end_matches(['u', 'U', 'l', 'L']);
    let parsed = if let Some(hex) = digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
        i64::from_str_radix(hex, 16)
    } else if digits.len() > 1 && digits.starts_with('0') {
        i64::from_str_radix(&digits[1..], 8)
    } else {
        digits.parse::<i64>()
    };
    parsed.map_err(|_| format!("invalid number '{}'", text))
}

fn scan_char(chars: &mut Peekable<Chars>) -> Result<i64, String> {
    chars.next();
    let value = match chars.next() {
        Some('\\') => match chars.next() {
            Some('n') => '\n',
            Some('t') => '\t',
            Some('r') => '\r',
            Some('0') => '\0',
            Some(c) => c,
            None => return Err("unterminated character constant".to_string()),
        },
        Some(c) => c,
        None => return Err("unterminated character constant".to_string()),
    };
    if chars.next() != Some('\'') {
        return Err("unterminated character constant".to_string());
    }
    Ok(value as i64)
}

struct ExprParser {
    tokens: Vec<Tok>,
    pos: usize,
}

/// Binary precedence levels, loosest first.
const LEVELS: [&[&str]; 10] = [
    &["||"],
    &["&&"],
    &["|"],
    &["^"],
    &["&"],
    &["==", "!="],
    &["<", ">", "<=", ">="],
    &["<<", ">>"],
    &["+", "-"],
    &["*", "/", "%"],
];

impl ExprParser {
    fn peek_op(&self) -> Option<&'static str> {
        match self.tokens.get(self.pos) {
            Some(Tok::Op(op)) => Some(*op),
            _ => None,
        }
    }

    fn parse_ternary(&mut self) -> Result<Expr, String> {
        let cond = self.parse_level(0)?;
        if self.peek_op() != Some("?") {
            return Ok(cond);
        }
        self.pos += 1;
        let then = self.parse_ternary()?;
        if self.peek_op() != Some(":") {
            return Err("expected ':'".to_string());
        }
        self.pos += 1;
        let otherwise = self.parse_ternary()?;
        Ok(Expr::Ternary(Box::new(cond), Box::new(then), Box::new(otherwise)))
    }

    fn parse_level(&mut self, level: usize) -> Result<Expr, String> {
        if level == LEVELS.len() {
            return self.parse_unary();
        }

        let mut left = self.parse_level(level + 1)?;
        while let Some(op) = self.peek_op().filter(|op| LEVELS[level].contains(op)) {
            self.pos += 1;
            let right = self.parse_level(level + 1)?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr, String> {
        if let Some(op) = self.peek_op().filter(|op| matches!(*op, "!" | "~" | "-" | "+")) {
            self.pos += 1;
            let operand = self.parse_unary()?;
            return Ok(Expr::Unary(op, Box::new(operand)));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Expr, String> {
        let token = self
            .tokens
            .get(self.pos)
            .cloned()
            .ok_or_else(|| "unexpected end of expression".to_string())?;
        self.pos += 1;

        match token {
            Tok::Num(n) => Ok(Expr::Num(n)),
            Tok::Ident => Ok(Expr::Num(0)),
            Tok::Op("(") => {
                let inner = self.parse_ternary()?;
                if self.peek_op() != Some(")") {
                    return Err("expected ')'".to_string());
                }
                self.pos += 1;
                Ok(inner)
            }
            Tok::Op(op) => Err(format!("unexpected '{}'", op)),
        }
    }
}

fn eval(expr: &Expr) -> Result<i64, String> {
    match expr {
        Expr::Num(n) => Ok(*n),
        Expr::Unary(op, operand) => {
            let v = eval(operand)?;
            Ok(match *op {
                "!" => (v == 0) as i64,
                "~" => !v,
                "-" => v.wrapping_neg(),
                _ => v,
            })
        }
        Expr::Ternary(cond, then, otherwise) => {
            if eval(cond)? != 0 {
                eval(then)
            } else {
                eval(otherwise)
            }
        }
        Expr::Binary("&&", l, r) => Ok((eval(l)? != 0 && eval(r)? != 0) as i64),
        Expr::Binary("||", l, r) => Ok((eval(l)? != 0 || eval(r)? != 0) as i64),
        Expr::Binary(op, l, r) => {
            let (a, b) = (eval(l)?, eval(r)?);
            Ok(match *op {
                "|" => a | b,
                "^" => a ^ b,
                "&" => a & b,
                "==" => (a == b) as i64,
                "!=" => (a != b) as i64,
                "<" => (a < b) as i64,
                ">" => (a > b) as i64,
                "<=" => (a <= b) as i64,
                ">=" => (a >= b) as i64,
                "<<" | ">>" => {
                    let shift = u32::try_from(b)
                        .ok()
                        .filter(|s| *s < 64)
                        .ok_or_else(|| "shift count out of range".to_string())?;
                    if *op == "<<" {
                        a.wrapping_shl(shift)
                    } else {
                        a.wrapping_shr(shift)
                    }
                }
                "+" => a.wrapping_add(b),
                "-" => a.wrapping_sub(b),
                "*" => a.wrapping_mul(b),
                "/" | "%" => {
                    if b == 0 {
                        return Err("division by zero".to_string());
                    }
                    if *op == "/" {
                        a.wrapping_div(b)
                    } else {
                        a.wrapping_rem(b)
                    }
                }
                _ => return Err(format!("unknown operator '{}'", op)),
            })
        }
    }
}
