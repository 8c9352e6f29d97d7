//! Preprocessor tokenizer
//!
//! Raw source goes through three passes before directives are looked at:
//!
//! 1. [`replace_trigraphs`] rewrites the nine `??x` sequences.
//! 2. [`join_continuations`] merges lines ending in `\` with their successor.
//!    The swallowed line is left empty so physical line numbers stay put.
//! 3. [`tokenize`] splits the text into [`PpToken`]s and [`group_lines`]
//!    bundles them into logical lines, each ending with its newline token.

/// Token categories of the C preprocessor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PpTokenKind {
    Ident,
    Number,
    String,
    Char,
    Punct,
    Whitespace,
    Newline,
    Comment,
}

/// A single preprocessor token with the physical line it starts on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PpToken {
    pub kind: PpTokenKind,
    pub text: String,
    pub line: usize,
}

impl PpToken {
    pub fn new(kind: PpTokenKind, text: impl Into<String>, line: usize) -> Self {
        PpToken {
            kind,
            text: text.into(),
            line,
        }
    }

    /// Whitespace, newlines and comments carry no meaning for directives.
    pub fn is_blank(&self) -> bool {
        matches!(
            self.kind,
            PpTokenKind::Whitespace | PpTokenKind::Newline | PpTokenKind::Comment
        )
    }

    pub fn is_punct(&self, text: &str) -> bool {
        self.kind == PpTokenKind::Punct && self.text == text
    }
}

const TRIGRAPHS: [(char, char); 9] = [
    ('=', '#'),
    ('/', '\\'),
    ('\'', '^'),
    ('(', '['),
    (')', ']'),
    ('!', '|'),
    ('<', '{'),
    ('>', '}'),
    ('-', '~'),
];

/// Replace `??=`, `??/`, `??'`, `??(`, `??)`, `??!`, `??<`, `??>` and `??-`.
pub fn replace_trigraphs(input: &str) -> String {
    let chars: Vec<char> = input.chars().collect();
    let mut out = String::with_capacity(input.len());
    let mut i = 0;

    while i < chars.len() {
        if chars[i] == '?' && i + 2 < chars.len() && chars[i + 1] == '?' {
            if let Some(&(_, replacement)) = TRIGRAPHS.iter().find(|(c, _)| *c == chars[i + 2]) {
                out.push(replacement);
                i += 3;
                continue;
            }
        }
        out.push(chars[i]);
        i += 1;
    }

    out
}

/// Join backslash-continued lines.
///
/// Every physical line has its trailing whitespace stripped. A line ending in
/// `\` absorbs the following line, which is replaced by an empty line.
/// `\r\n`, `\r` and `\n` all end a line; the result only uses `\n`.
pub fn join_continuations(input: &str) -> String {
    let mut lines: Vec<String> = physical_lines(input)
        .map(|l| l.trim_end().to_string())
        .collect();

    for i in 0..lines.len() {
        let mut j = i + 1;
        while lines[i].ends_with('\\') && j < lines.len() {
            lines[i].pop();
            let next = std::mem::take(&mut lines[j]);
            lines[i].push_str(&next);
            j += 1;
        }
    }

    let mut joined = lines.join("\n");
    if input.ends_with('\n') || input.ends_with('\r') {
        joined.push('\n');
    }
    joined
}

fn physical_lines(input: &str) -> impl Iterator<Item = &str> {
    let mut rest = input;
    std::iter::from_fn(move || {
        if rest.is_empty() {
            return None;
        }
        let (line, tail) = match rest.find(['\r', '\n']) {
            Some(end) if rest[end..].starts_with("\r\n") => (&rest[..end], &rest[end + 2..]),
            Some(end) => (&rest[..end], &rest[end + 1..]),
            None => (rest, ""),
        };
        rest = tail;
        Some(line)
    })
}

/// Split preprocessed-ready text into tokens.
pub fn tokenize(input: &str) -> Vec<PpToken> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut pos = 0;
    let mut line = 1;

    while pos < chars.len() {
        let start = pos;
        let start_line = line;
        let ch = chars[pos];

        let kind = match ch {
            '\n' => {
                pos += 1;
                line += 1;
                PpTokenKind::Newline
            }
            ' ' | '\t' | '\r' | '\x0b' | '\x0c' => {
                while pos < chars.len() && matches!(chars[pos], ' ' | '\t' | '\r' | '\x0b' | '\x0c') {
                    pos += 1;
                }
                PpTokenKind::Whitespace
            }
            '/' if chars.get(pos + 1) == Some(&'*') => {
                pos += 2;
                while pos < chars.len() && !(chars[pos] == '*' && chars.get(pos + 1) == Some(&'/')) {
                    if chars[pos] == '\n' {
                        line += 1;
                    }
                    pos += 1;
                }
                pos = (pos + 2).min(chars.len());
                PpTokenKind::Comment
            }
            '/' if chars.get(pos + 1) == Some(&'/') => {
                while pos < chars.len() && chars[pos] != '\n' {
                    pos += 1;
                }
                PpTokenKind::Comment
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                while pos < chars.len() && (chars[pos].is_ascii_alphanumeric() || chars[pos] == '_') {
                    pos += 1;
                }
                PpTokenKind::Ident
            }
            c if c.is_ascii_digit()
                || (c == '.' && chars.get(pos + 1).is_some_and(|n| n.is_ascii_digit())) =>
            {
                pos += 1;
                while pos < chars.len() {
                    let c = chars[pos];
                    if (c == '+' || c == '-') && matches!(chars[pos - 1], 'e' | 'E' | 'p' | 'P') {
                        pos += 1;
                    } else if c.is_ascii_alphanumeric() || c == '_' || c == '.' {
                        pos += 1;
                    } else {
                        break;
                    }
                }
                PpTokenKind::Number
            }
            '"' | '\'' => {
                pos = scan_quoted(&chars, pos, ch);
                if ch == '"' {
                    PpTokenKind::String
                } else {
                    PpTokenKind::Char
                }
            }
            '#' => {
                pos += if chars.get(pos + 1) == Some(&'#') { 2 } else { 1 };
                PpTokenKind::Punct
            }
            _ => {
                pos += 1;
                PpTokenKind::Punct
            }
        };

        let text: String = chars[start..pos].iter().collect();
        tokens.push(PpToken::new(kind, text, start_line));
    }

    tokens
}

/// Scan a quoted literal starting at `start`; stops at the closing quote or
/// before an unescaped newline.
fn scan_quoted(chars: &[char], start: usize, quote: char) -> usize {
    let mut pos = start + 1;
    while pos < chars.len() {
        match chars[pos] {
            '\\' if pos + 1 < chars.len() && chars[pos + 1] != '\n' => pos += 2,
            '\n' => return pos,
            c if c == quote => return pos + 1,
            _ => pos += 1,
        }
    }
    pos
}

/// Group tokens into logical lines. Each group ends with its newline token,
/// except possibly the last.
pub fn group_lines(tokens: Vec<PpToken>) -> Vec<Vec<PpToken>> {
    let mut lines = Vec::new();
    let mut current = Vec::new();

    for token in tokens {
        let is_newline = token.kind == PpTokenKind::Newline;
        current.push(token);
        if is_newline {
            lines.push(std::mem::take(&mut current));
        }
    }

    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

/// Trim blank tokens from both ends of a slice.
pub fn strip_blank(tokens: &[PpToken]) -> &[PpToken] {
    let start = tokens.iter().position(|t| !t.is_blank()).unwrap_or(tokens.len());
    let end = tokens.iter().rposition(|t| !t.is_blank()).map_or(start, |i| i + 1);
    &tokens[start..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(tokens: &[PpToken]) -> Vec<PpTokenKind> {
        tokens.iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_trigraphs() {
        assert_eq!(replace_trigraphs("??=define X ??( ??)"), "#define X [ ]");
        assert_eq!(replace_trigraphs("what??"), "what??");
        assert_eq!(replace_trigraphs("a ??? b"), "a ??? b");
    }

    #[test]
    fn test_continuations_keep_line_count() {
        let joined = join_continuations("#define A 1 \\\n  + 2\nx\n");
        assert_eq!(joined, "#define A 1   + 2\n\nx\n");
    }

    #[test]
    fn test_carriage_return_line_endings() {
        assert_eq!(join_continuations("a\rb\r"), "a\nb\n");
        assert_eq!(join_continuations("a\r\nb\r\n"), "a\nb\n");
        assert_eq!(join_continuations("a\r\rb"), "a\n\nb");
        assert_eq!(join_continuations("#define A 1 \\\r+ 2\rx"), "#define A 1 + 2\n\nx");
    }

    #[test]
    fn test_tokenize_basic() {
        let tokens = tokenize("#define X(a) a+1 // c\n");
        assert_eq!(
            kinds(&tokens),
            vec![
                PpTokenKind::Punct,
                PpTokenKind::Ident,
                PpTokenKind::Whitespace,
                PpTokenKind::Ident,
                PpTokenKind::Punct,
                PpTokenKind::Ident,
                PpTokenKind::Punct,
                PpTokenKind::Whitespace,
                PpTokenKind::Ident,
                PpTokenKind::Punct,
                PpTokenKind::Number,
                PpTokenKind::Whitespace,
                PpTokenKind::Comment,
                PpTokenKind::Newline,
            ]
        );
    }

    #[test]
    fn test_block_comment_tracks_lines() {
        let tokens = tokenize("/* a\nb */ x\ny");
        let x = tokens.iter().find(|t| t.text == "x").unwrap();
        let y = tokens.iter().find(|t| t.text == "y").unwrap();
        assert_eq!(x.line, 2);
        assert_eq!(y.line, 3);
    }

    #[test]
    fn test_strings_and_numbers() {
        let tokens = tokenize(r#""a\"b" 'c' 0x1FUL 1.5e+3"#);
        let texts: Vec<&str> = tokens
            .iter()
            .filter(|t| !t.is_blank())
            .map(|t| t.text.as_str())
            .collect();
        assert_eq!(texts, vec![r#""a\"b""#, "'c'", "0x1FUL", "1.5e+3"]);
    }

    #[test]
    fn test_group_lines() {
        let lines = group_lines(tokenize("a\n#if X\nb"));
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[1][0].text, "#");
        assert_eq!(lines[2][0].line, 3);
    }
}
