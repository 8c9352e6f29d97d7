//! Lexer (tokenizer) for preprocessed IDL text
//!
//! The lexer is pull-based: [`Lexer::next_token`] produces one [`Token`] at a
//! time so the parser can switch lexer states between tokens (property lists
//! are lexed in their own state, entered by the parser right after `[`).
//!
//! # States
//!
//! States form an explicit stack. Each state owns an ordered rule table and
//! every state additionally sees the cross-state rules (pragmas, line
//! markers, newlines, comments). At each position the longest match wins;
//! among equally long matches the rule declared first wins.
//!
//! | state        | entered by                | left by                  |
//! |--------------|---------------------------|--------------------------|
//! | `INITIAL`    | start                     |                          |
//! | `PROP`       | parser, after `[`         | `]`                      |
//! | `NATIVE`     | the `native` keyword      | `;`, or `(` → NATIVETYPE |
//! | `NATIVETYPE` | `(` in NATIVE             | `)`                      |
//! | `CFRG`       | `%{`                      | fragment body → CFRGX    |
//! | `CFRGX`      | fragment body             | `%}`                     |

use crate::error::with_line;
use crate::options::Dialect;
use rustc_hash::FxHashMap;
use std::fmt;
use tracing::trace;

/// All token kinds produced by the lexer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    // Keywords
    Any,
    Attribute,
    Boolean,
    Case,
    Char,
    Const,
    Context,
    Default,
    Double,
    Enum,
    Exception,
    False,
    Fixed,
    Float,
    In,
    InOut,
    Interface,
    Long,
    Module,
    Native,
    Object,
    Octet,
    Oneway,
    Optional,
    Out,
    Raises,
    Readonly,
    Sequence,
    Short,
    String,
    Struct,
    Switch,
    True,
    TypeCode,
    Typedef,
    Union,
    Unsigned,
    ValueType,
    Varargs,
    Void,
    WChar,
    WString,

    // Literals and raw text
    Ident,
    Integer,
    FloatingPt,
    FixedPt,
    SqString,
    DqString,
    PropValue,
    NativeType,
    CodeFrag,

    // Punctuation
    Colon,     // :
    Scope,     // ::
    Semicolon, // ;
    Comma,     // ,
    LBrace,    // {
    RBrace,    // }
    LParen,    // (
    RParen,    // )
    LBracket,  // [
    RBracket,  // ]
    Lt,        // <
    Gt,        // >
    Shl,       // <<
    Shr,       // >>
    Equal,     // =
    Question,  // ?
    Ellipsis,  // ...

    // Operators
    Pipe,      // |
    Caret,     // ^
    Ampersand, // &
    Plus,      // +
    Minus,     // -
    Asterisk,  // *
    Slash,     // /
    Percent,   // %
    Tilde,     // ~
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            TokenKind::Ident => "identifier",
            TokenKind::Integer => "integer literal",
            TokenKind::FloatingPt => "floating-point literal",
            TokenKind::FixedPt => "fixed-point literal",
            TokenKind::SqString => "character literal",
            TokenKind::DqString => "string literal",
            TokenKind::PropValue => "property arguments",
            TokenKind::NativeType => "native type",
            TokenKind::CodeFrag => "code fragment",
            TokenKind::Colon => "':'",
            TokenKind::Scope => "'::'",
            TokenKind::Semicolon => "';'",
            TokenKind::Comma => "','",
            TokenKind::LBrace => "'{'",
            TokenKind::RBrace => "'}'",
            TokenKind::LParen => "'('",
            TokenKind::RParen => "')'",
            TokenKind::LBracket => "'['",
            TokenKind::RBracket => "']'",
            TokenKind::Lt => "'<'",
            TokenKind::Gt => "'>'",
            TokenKind::Shl => "'<<'",
            TokenKind::Shr => "'>>'",
            TokenKind::Equal => "'='",
            TokenKind::Question => "'?'",
            TokenKind::Ellipsis => "'...'",
            TokenKind::Pipe => "'|'",
            TokenKind::Caret => "'^'",
            TokenKind::Ampersand => "'&'",
            TokenKind::Plus => "'+'",
            TokenKind::Minus => "'-'",
            TokenKind::Asterisk => "'*'",
            TokenKind::Slash => "'/'",
            TokenKind::Percent => "'%'",
            TokenKind::Tilde => "'~'",
            keyword => return write!(f, "keyword '{}'", keyword_text(*keyword)),
        };
        f.write_str(text)
    }
}

const COMMON_KEYWORDS: &[(&str, TokenKind)] = &[
    ("any", TokenKind::Any),
    ("attribute", TokenKind::Attribute),
    ("boolean", TokenKind::Boolean),
    ("case", TokenKind::Case),
    ("const", TokenKind::Const),
    ("context", TokenKind::Context),
    ("default", TokenKind::Default),
    ("double", TokenKind::Double),
    ("enum", TokenKind::Enum),
    ("exception", TokenKind::Exception),
    ("false", TokenKind::False),
    ("fixed", TokenKind::Fixed),
    ("float", TokenKind::Float),
    ("in", TokenKind::In),
    ("inout", TokenKind::InOut),
    ("interface", TokenKind::Interface),
    ("long", TokenKind::Long),
    ("module", TokenKind::Module),
    ("native", TokenKind::Native),
    ("object", TokenKind::Object),
    ("Object", TokenKind::Object),
    ("octet", TokenKind::Octet),
    ("oneway", TokenKind::Oneway),
    ("out", TokenKind::Out),
    ("raises", TokenKind::Raises),
    ("readonly", TokenKind::Readonly),
    ("sequence", TokenKind::Sequence),
    ("short", TokenKind::Short),
    ("string", TokenKind::String),
    ("struct", TokenKind::Struct),
    ("switch", TokenKind::Switch),
    ("true", TokenKind::True),
    ("typecode", TokenKind::TypeCode),
    ("TypeCode", TokenKind::TypeCode),
    ("typedef", TokenKind::Typedef),
    ("union", TokenKind::Union),
    ("unsigned", TokenKind::Unsigned),
    ("valuetype", TokenKind::ValueType),
    ("varargs", TokenKind::Varargs),
    ("void", TokenKind::Void),
    ("wstring", TokenKind::WString),
];

const OMG_KEYWORDS: &[(&str, TokenKind)] = &[("char", TokenKind::Char), ("wchar", TokenKind::WChar)];

const WEBIDL_KEYWORDS: &[(&str, TokenKind)] = &[("optional", TokenKind::Optional)];

/// Classify a word under `dialect`; `None` means a plain identifier.
pub fn keyword(word: &str, dialect: Dialect) -> Option<TokenKind> {
    let dialect_table = match dialect {
        Dialect::OmgIdl => OMG_KEYWORDS,
        Dialect::WebIdl => WEBIDL_KEYWORDS,
    };
    COMMON_KEYWORDS
        .iter()
        .chain(dialect_table)
        .find(|(text, _)| *text == word)
        .map(|(_, kind)| *kind)
}

fn keyword_text(kind: TokenKind) -> &'static str {
    COMMON_KEYWORDS
        .iter()
        .chain(OMG_KEYWORDS)
        .chain(WEBIDL_KEYWORDS)
        .find(|(_, k)| *k == kind)
        .map_or("?", |(text, _)| *text)
}

/// A token with its source text and the line it starts on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub value: String,
    pub line: usize,
}

impl Token {
    pub fn new(kind: TokenKind, value: impl Into<String>, line: usize) -> Self {
        Token {
            kind,
            value: value.into(),
            line,
        }
    }
}

/// Exclusive lexer states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LexState {
    Initial,
    Prop,
    Native,
    NativeType,
    CodeFrag,
    CodeFragEnd,
}

impl fmt::Display for LexState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LexState::Initial => "INITIAL",
            LexState::Prop => "PROP",
            LexState::Native => "NATIVE",
            LexState::NativeType => "NATIVETYPE",
            LexState::CodeFrag => "CFRG",
            LexState::CodeFragEnd => "CFRGX",
        })
    }
}

/// No rule of the active state matches the input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LexicalError {
    pub text: String,
    pub state: LexState,
    pub line: usize,
}

impl LexicalError {
    pub fn message(&self) -> String {
        format!("Illegal token (state={}): {}", self.state, self.text)
    }
}

impl fmt::Display for LexicalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&with_line(&self.message(), Some(self.line)))
    }
}

impl std::error::Error for LexicalError {}

type Scanner = fn(&[char], usize) -> Option<usize>;

#[derive(Clone, Copy)]
enum Pattern {
    Literal(&'static str),
    Scan(Scanner),
}

impl Pattern {
    fn match_len(&self, input: &[char], pos: usize) -> Option<usize> {
        match self {
            Pattern::Literal(text) => {
                let mut len = 0;
                for c in text.chars() {
                    if input.get(pos + len) != Some(&c) {
                        return None;
                    }
                    len += 1;
                }
                Some(len)
            }
            Pattern::Scan(scanner) => scanner(input, pos),
        }
    }
}

#[derive(Clone, Copy)]
enum Action {
    /// Whitespace and comments.
    Skip,
    /// `#pragma name [value]` at line start.
    Pragma,
    /// `# N ...` or `#line N ...` at line start.
    LineMarker,
    Emit(TokenKind),
    /// Identifier or keyword; `native` enters NATIVE.
    Word,
    /// Identifier that is never a keyword.
    PlainWord,
    /// Decimal literal classified as integer, float or fixed-point.
    Number,
    EmitPop(TokenKind),
    EmitSwitch(TokenKind, LexState),
    Push(LexState),
    Pop,
}

#[derive(Clone, Copy)]
struct Rule {
    pattern: Pattern,
    action: Action,
}

const fn lit(text: &'static str, kind: TokenKind) -> Rule {
    Rule {
        pattern: Pattern::Literal(text),
        action: Action::Emit(kind),
    }
}

const fn scan(scanner: Scanner, action: Action) -> Rule {
    Rule {
        pattern: Pattern::Scan(scanner),
        action,
    }
}

const INITIAL_RULES: &[Rule] = &[
    scan(scan_whitespace, Action::Skip),
    Rule {
        pattern: Pattern::Literal("%{"),
        action: Action::Push(LexState::CodeFrag),
    },
    scan(scan_ident, Action::Word),
    scan(scan_octal, Action::Emit(TokenKind::Integer)),
    scan(scan_hex, Action::Emit(TokenKind::Integer)),
    scan(scan_decimal, Action::Number),
    scan(scan_sqstring, Action::Emit(TokenKind::SqString)),
    scan(scan_dqstring, Action::Emit(TokenKind::DqString)),
    lit("::", TokenKind::Scope),
    lit("<<", TokenKind::Shl),
    lit(">>", TokenKind::Shr),
    lit("...", TokenKind::Ellipsis),
    lit(":", TokenKind::Colon),
    lit(";", TokenKind::Semicolon),
    lit(",", TokenKind::Comma),
    lit("{", TokenKind::LBrace),
    lit("}", TokenKind::RBrace),
    lit("(", TokenKind::LParen),
    lit(")", TokenKind::RParen),
    lit("[", TokenKind::LBracket),
    lit("]", TokenKind::RBracket),
    lit("<", TokenKind::Lt),
    lit(">", TokenKind::Gt),
    lit("=", TokenKind::Equal),
    lit("?", TokenKind::Question),
    lit("|", TokenKind::Pipe),
    lit("^", TokenKind::Caret),
    lit("&", TokenKind::Ampersand),
    lit("+", TokenKind::Plus),
    lit("-", TokenKind::Minus),
    lit("*", TokenKind::Asterisk),
    lit("/", TokenKind::Slash),
    lit("%", TokenKind::Percent),
    lit("~", TokenKind::Tilde),
];

const PROP_RULES: &[Rule] = &[
    scan(scan_whitespace, Action::Skip),
    scan(scan_prop_value, Action::Emit(TokenKind::PropValue)),
    Rule {
        pattern: Pattern::Literal("]"),
        action: Action::EmitPop(TokenKind::RBracket),
    },
    scan(scan_ident, Action::PlainWord),
    scan(scan_octal, Action::Emit(TokenKind::Integer)),
    scan(scan_hex, Action::Emit(TokenKind::Integer)),
    scan(scan_decimal, Action::Number),
    scan(scan_sqstring, Action::Emit(TokenKind::SqString)),
    scan(scan_dqstring, Action::Emit(TokenKind::DqString)),
    lit("=", TokenKind::Equal),
    lit(",", TokenKind::Comma),
];

const NATIVE_RULES: &[Rule] = &[
    scan(scan_whitespace, Action::Skip),
    scan(scan_ident, Action::PlainWord),
    Rule {
        pattern: Pattern::Literal(";"),
        action: Action::EmitPop(TokenKind::Semicolon),
    },
    Rule {
        pattern: Pattern::Literal("("),
        action: Action::EmitSwitch(TokenKind::LParen, LexState::NativeType),
    },
];

const NATIVE_TYPE_RULES: &[Rule] = &[
    Rule {
        pattern: Pattern::Literal(")"),
        action: Action::EmitPop(TokenKind::RParen),
    },
    scan(scan_native_type, Action::Emit(TokenKind::NativeType)),
];

const CODE_FRAG_RULES: &[Rule] = &[scan(
    scan_code_body,
    Action::EmitSwitch(TokenKind::CodeFrag, LexState::CodeFragEnd),
)];

const CODE_FRAG_END_RULES: &[Rule] = &[Rule {
    pattern: Pattern::Literal("%}"),
    action: Action::Pop,
}];

/// Rules active in every state, tried after the state's own rules.
const ANY_RULES: &[Rule] = &[
    scan(scan_pragma, Action::Pragma),
    scan(scan_line_marker, Action::LineMarker),
    scan(scan_newline, Action::Skip),
    scan(scan_line_comment, Action::Skip),
    scan(scan_block_comment, Action::Skip),
];

fn rules_for(state: LexState) -> &'static [Rule] {
    match state {
        LexState::Initial => INITIAL_RULES,
        LexState::Prop => PROP_RULES,
        LexState::Native => NATIVE_RULES,
        LexState::NativeType => NATIVE_TYPE_RULES,
        LexState::CodeFrag => CODE_FRAG_RULES,
        LexState::CodeFragEnd => CODE_FRAG_END_RULES,
    }
}

/// Stateful IDL lexer
pub struct Lexer {
    input: Vec<char>,
    position: usize,
    line: usize,
    states: Vec<LexState>,
    dialect: Dialect,
    pragmas: FxHashMap<String, Option<String>>,
}

impl Lexer {
    pub fn new(input: &str, dialect: Dialect) -> Self {
        Self {
            input: input.chars().collect(),
            position: 0,
            line: 1,
            states: vec![LexState::Initial],
            dialect,
            pragmas: FxHashMap::default(),
        }
    }

    /// Line the next token will be read from.
    pub fn line(&self) -> usize {
        self.line
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub fn state(&self) -> LexState {
        self.states.last().copied().unwrap_or(LexState::Initial)
    }

    pub fn push_state(&mut self, state: LexState) {
        trace!(from = %self.state(), to = %state, "push lexer state");
        self.states.push(state);
    }

    /// Leave the current state. The initial state is never popped.
    pub fn pop_state(&mut self) {
        if self.states.len() > 1 {
            let left = self.states.pop();
            trace!(left = ?left, to = %self.state(), "pop lexer state");
        }
    }

    /// Pragmas seen so far, keyed by name.
    pub fn pragmas(&self) -> &FxHashMap<String, Option<String>> {
        &self.pragmas
    }

    /// Remove a recorded pragma; the outer `Option` says whether it was seen.
    pub fn take_pragma(&mut self, name: &str) -> Option<Option<String>> {
        self.pragmas.remove(name)
    }

    /// Lex the whole input in the initial state.
    pub fn tokenize(&mut self) -> Result<Vec<Token>, LexicalError> {
        let mut tokens = Vec::new();
        while let Some(token) = self.next_token()? {
            tokens.push(token);
        }
        Ok(tokens)
    }

    /// Produce the next token, or `None` at end of input.
    pub fn next_token(&mut self) -> Result<Option<Token>, LexicalError> {
        loop {
            if self.position >= self.input.len() {
                return Ok(None);
            }

            let state = self.state();
            let mut best: Option<(usize, Action)> = None;
            for rule in rules_for(state).iter().chain(ANY_RULES) {
                if let Some(len) = rule.pattern.match_len(&self.input, self.position) {
                    if best.map_or(true, |(longest, _)| len > longest) {
                        best = Some((len, rule.action));
                    }
                }
            }

            let Some((len, action)) = best else {
                return Err(self.illegal(state));
            };

            let start_line = self.line;
            let text: String = self.input[self.position..self.position + len].iter().collect();
            self.position += len;
            self.line += count_newlines(&text);

            let token = match action {
                Action::Skip => None,
                Action::Pragma => {
                    self.record_pragma(&text);
                    None
                }
                Action::LineMarker => {
                    if let Some(line) = marker_line(&text) {
                        self.line = line;
                    }
                    None
                }
                Action::Emit(kind) => Some(Token::new(kind, text, start_line)),
                Action::Word => {
                    let kind = keyword(&text, self.dialect).unwrap_or(TokenKind::Ident);
                    if kind == TokenKind::Native {
                        self.push_state(LexState::Native);
                    }
                    Some(Token::new(kind, text, start_line))
                }
                Action::PlainWord => Some(Token::new(TokenKind::Ident, text, start_line)),
                Action::Number => Some(Token::new(classify_decimal(&text), text, start_line)),
                Action::EmitPop(kind) => {
                    self.pop_state();
                    Some(Token::new(kind, text, start_line))
                }
                Action::EmitSwitch(kind, next) => {
                    self.pop_state();
                    self.push_state(next);
                    Some(Token::new(kind, text, start_line))
                }
                Action::Push(next) => {
                    self.push_state(next);
                    None
                }
                Action::Pop => {
                    self.pop_state();
                    None
                }
            };

            if let Some(token) = token {
                return Ok(Some(token));
            }
        }
    }

    fn illegal(&self, state: LexState) -> LexicalError {
        let text: String = self.input[self.position..]
            .iter()
            .take_while(|c| !c.is_whitespace())
            .take(32)
            .collect();
        LexicalError {
            text,
            state,
            line: self.line,
        }
    }

    fn record_pragma(&mut self, text: &str) {
        let Some((_, rest)) = text.split_once("pragma") else {
            return;
        };
        let rest = rest.trim_end_matches(['\r', '\n']).trim_start_matches(is_blank);
        if rest.is_empty() {
            return;
        }
        let (name, value) = match rest.split_once(is_blank) {
            Some((name, value)) => (name, Some(value.trim_start_matches(is_blank).to_string())),
            None => (rest, None),
        };
        trace!(pragma = name, value = ?value, "pragma");
        self.pragmas.insert(name.to_string(), value);
    }
}

impl Iterator for Lexer {
    type Item = Result<Token, LexicalError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_token().transpose()
    }
}

/// Decide the kind of a literal matched by [`scan_decimal`].
pub fn classify_decimal(text: &str) -> TokenKind {
    if text.ends_with(['d', 'D']) {
        TokenKind::FixedPt
    } else if text.contains(['.', 'e', 'E']) {
        TokenKind::FloatingPt
    } else {
        TokenKind::Integer
    }
}

fn count_newlines(text: &str) -> usize {
    let bytes = text.as_bytes();
    bytes
        .iter()
        .enumerate()
        .filter(|&(i, &b)| b == b'\n' || (b == b'\r' && bytes.get(i + 1) != Some(&b'\n')))
        .count()
}

fn marker_line(text: &str) -> Option<usize> {
    let after_hash = text.split_once('#')?.1.trim_start_matches(is_blank);
    let after_line = after_hash
        .strip_prefix("line")
        .unwrap_or(after_hash)
        .trim_start_matches(is_blank);
    let digits: String = after_line.chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().ok()
}

fn is_blank(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\x0b' | '\x0c')
}

fn at_line_start(input: &[char], pos: usize) -> bool {
    pos == 0 || matches!(input[pos - 1], '\r' | '\n')
}

fn skip_while(input: &[char], mut pos: usize, pred: impl Fn(char) -> bool) -> usize {
    while pos < input.len() && pred(input[pos]) {
        pos += 1;
    }
    pos
}

fn newline_len(input: &[char], pos: usize) -> usize {
    match (input.get(pos), input.get(pos + 1)) {
        (Some('\r'), Some('\n')) => 2,
        (Some('\r' | '\n'), _) => 1,
        _ => 0,
    }
}

fn scan_whitespace(input: &[char], pos: usize) -> Option<usize> {
    let end = skip_while(input, pos, is_blank);
    (end > pos).then_some(end - pos)
}

fn scan_newline(input: &[char], pos: usize) -> Option<usize> {
    match newline_len(input, pos) {
        0 => None,
        len => Some(len),
    }
}

fn scan_ident(input: &[char], pos: usize) -> Option<usize> {
    let first = *input.get(pos)?;
    if !(first.is_ascii_alphabetic() || first == '_') {
        return None;
    }
    Some(skip_while(input, pos + 1, |c| c.is_ascii_alphanumeric() || c == '_') - pos)
}

/// `0[0-9]+`
fn scan_octal(input: &[char], pos: usize) -> Option<usize> {
    if input.get(pos) != Some(&'0') {
        return None;
    }
    let end = skip_while(input, pos + 1, |c| c.is_ascii_digit());
    (end > pos + 1).then_some(end - pos)
}

/// `0[xX][0-9A-Fa-f]+`
fn scan_hex(input: &[char], pos: usize) -> Option<usize> {
    if input.get(pos) != Some(&'0') || !matches!(input.get(pos + 1), Some('x' | 'X')) {
        return None;
    }
    let end = skip_while(input, pos + 2, |c| c.is_ascii_hexdigit());
    (end > pos + 2).then_some(end - pos)
}

/// `(int)?.frac | int`, then `[eE]-?digits` and a `[dD]` suffix, both optional.
/// `int` is `0` or a digit sequence without a leading zero.
fn scan_decimal(input: &[char], pos: usize) -> Option<usize> {
    let int_end = match input.get(pos) {
        Some('0') => pos + 1,
        Some('1'..='9') => skip_while(input, pos + 1, |c| c.is_ascii_digit()),
        _ => pos,
    };

    let mut end = if input.get(int_end) == Some(&'.')
        && input.get(int_end + 1).is_some_and(|c| c.is_ascii_digit())
    {
        skip_while(input, int_end + 1, |c| c.is_ascii_digit())
    } else if int_end > pos {
        int_end
    } else {
        return None;
    };

    if matches!(input.get(end), Some('e' | 'E')) {
        let digits = if input.get(end + 1) == Some(&'-') { end + 2 } else { end + 1 };
        let exp_end = skip_while(input, digits, |c| c.is_ascii_digit());
        if exp_end > digits {
            end = exp_end;
        }
    }

    if matches!(input.get(end), Some('d' | 'D')) {
        end += 1;
    }
    Some(end - pos)
}

fn scan_quoted(input: &[char], pos: usize, quote: char) -> Option<usize> {
    if input.get(pos) != Some(&quote) {
        return None;
    }
    let mut i = pos + 1;
    while i < input.len() {
        match input[i] {
            '\\' => i += 2,
            c if c == quote => return Some(i + 1 - pos),
            _ => i += 1,
        }
    }
    None
}

fn scan_sqstring(input: &[char], pos: usize) -> Option<usize> {
    scan_quoted(input, pos, '\'')
}

fn scan_dqstring(input: &[char], pos: usize) -> Option<usize> {
    scan_quoted(input, pos, '"')
}

/// `\([^)]*\)`
fn scan_prop_value(input: &[char], pos: usize) -> Option<usize> {
    if input.get(pos) != Some(&'(') {
        return None;
    }
    let close = skip_while(input, pos + 1, |c| c != ')');
    (close < input.len()).then_some(close + 1 - pos)
}

/// `[^);]+`
fn scan_native_type(input: &[char], pos: usize) -> Option<usize> {
    let end = skip_while(input, pos, |c| c != ')' && c != ';');
    (end > pos).then_some(end - pos)
}

/// Everything up to, not including, the closing `%}`. May be empty.
fn scan_code_body(input: &[char], pos: usize) -> Option<usize> {
    (pos..input.len().saturating_sub(1))
        .find(|&i| input[i] == '%' && input[i + 1] == '}')
        .map(|close| close - pos)
}

fn scan_line_comment(input: &[char], pos: usize) -> Option<usize> {
    if input.get(pos) != Some(&'/') || input.get(pos + 1) != Some(&'/') {
        return None;
    }
    Some(skip_while(input, pos, |c| c != '\n' && c != '\r') - pos)
}

fn scan_block_comment(input: &[char], pos: usize) -> Option<usize> {
    if input.get(pos) != Some(&'/') || input.get(pos + 1) != Some(&'*') {
        return None;
    }
    (pos + 2..input.len().saturating_sub(1))
        .find(|&i| input[i] == '*' && input[i + 1] == '/')
        .map(|close| close + 2 - pos)
}

/// Position right after `ws* # ws*` at the start of a line.
fn directive_start(input: &[char], pos: usize) -> Option<usize> {
    if !at_line_start(input, pos) {
        return None;
    }
    let hash = skip_while(input, pos, is_blank);
    if input.get(hash) != Some(&'#') {
        return None;
    }
    Some(skip_while(input, hash + 1, is_blank))
}

fn matches_word(input: &[char], pos: usize, word: &str) -> bool {
    word.chars().enumerate().all(|(k, c)| input.get(pos + k) == Some(&c))
}

/// `ws* # ws* pragma ws* rest (newline | end)`
fn scan_pragma(input: &[char], pos: usize) -> Option<usize> {
    let start = directive_start(input, pos)?;
    if !matches_word(input, start, "pragma") {
        return None;
    }
    let end = skip_while(input, start + 6, |c| c != '\n' && c != '\r');
    Some(end + newline_len(input, end) - pos)
}

/// `ws* # ws* (line ws*)? digits rest newline`
fn scan_line_marker(input: &[char], pos: usize) -> Option<usize> {
    let mut start = directive_start(input, pos)?;
    if matches_word(input, start, "line") {
        start = skip_while(input, start + 4, is_blank);
    }
    let digits_end = skip_while(input, start, |c| c.is_ascii_digit());
    if digits_end == start {
        return None;
    }
    let end = skip_while(input, digits_end, |c| c != '\n' && c != '\r');
    match newline_len(input, end) {
        0 => None,
        len => Some(end + len - pos),
    }
}
