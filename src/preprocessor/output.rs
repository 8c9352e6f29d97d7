//! Normalized output and line resynchronisation
//!
//! Expanded tokens are written out one by one. Whenever the next significant
//! token does not sit on the line (or in the file) the reader would assume, a
//! `# <line> "<source>"` marker line is written first so the lexer picks the
//! right line number back up. Comments collapse to a single space, so a
//! multi-line comment is always followed by a marker.

use super::tokens::{PpToken, PpTokenKind};
use std::fmt::Write;
use std::rc::Rc;

/// Escape a source name for use inside a line marker.
///
/// Control characters, backslash and U+00FF are escaped; those with a short
/// form (`\n`, `\t`, ...) use it, the rest become `\uXXXX`.
pub fn escape_source_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.chars() {
        match c {
            '\x07' => out.push_str("\\a"),
            '\x08' => out.push_str("\\b"),
            '\x0c' => out.push_str("\\f"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\x0b' => out.push_str("\\v"),
            '\x00'..='\x1f' | '\\' | '\u{ff}' => {
                let _ = write!(out, "\\u{:04x}", c as u32);
            }
            _ => out.push(c),
        }
    }
    out
}

/// Accumulates the normalized text.
#[derive(Debug, Default)]
pub struct LineSync {
    text: String,
    file: Option<Rc<str>>,
    /// Line the lexer will assign to the current output line.
    line: usize,
    at_line_start: bool,
    pending_space: bool,
}

impl LineSync {
    pub fn new() -> Self {
        LineSync {
            at_line_start: true,
            ..LineSync::default()
        }
    }

    pub fn push_all(&mut self, tokens: &[PpToken], file: &Rc<str>) {
        for token in tokens {
            self.push(token, file);
        }
    }

    pub fn push(&mut self, token: &PpToken, file: &Rc<str>) {
        match token.kind {
            // Nothing is written before the first significant token.
            PpTokenKind::Newline => {
                if self.file.is_some() {
                    self.text.push('\n');
                    self.line += 1;
                    self.at_line_start = true;
                    self.pending_space = false;
                }
            }
            PpTokenKind::Whitespace | PpTokenKind::Comment => self.pending_space = true,
            _ => {
                let in_sync = self.file.as_ref().is_some_and(|f| f == file) && self.line == token.line;
                if !in_sync {
                    self.write_marker(token.line, file);
                }
                if self.pending_space && !self.at_line_start {
                    self.text.push(' ');
                }
                self.pending_space = false;
                self.text.push_str(&token.text);
                self.at_line_start = false;
            }
        }
    }

    fn write_marker(&mut self, line: usize, file: &Rc<str>) {
        if !self.at_line_start {
            self.text.push('\n');
        }
        let _ = writeln!(self.text, "# {} \"{}\"", line, escape_source_name(file));
        self.file = Some(Rc::clone(file));
        self.line = line;
        self.at_line_start = true;
    }

    pub fn finish(self) -> String {
        self.text
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preprocessor::tokens::tokenize;

    fn render(input: &str, name: &str) -> String {
        let file: Rc<str> = Rc::from(name);
        let mut sync = LineSync::new();
        sync.push_all(&tokenize(input), &file);
        sync.finish()
    }

    #[test]
    fn test_escape_source_name() {
        assert_eq!(escape_source_name("a.idl"), "a.idl");
        assert_eq!(escape_source_name("C:\\x\n"), "C:\\u005cx\\n");
        assert_eq!(escape_source_name("\x01\u{ff}"), "\\u0001\\u00ff");
    }

    #[test]
    fn test_marker_at_start() {
        assert_eq!(render("long x;\n", "t.idl"), "# 1 \"t.idl\"\nlong x;\n");
    }

    #[test]
    fn test_leading_blank_lines_become_marker() {
        assert_eq!(render("\n\n  a\nb\n", "t"), "# 3 \"t\"\na\nb\n");
    }

    #[test]
    fn test_multiline_comment_resyncs() {
        assert_eq!(
            render("a /* x\ny */ b\nc\n", "t"),
            "# 1 \"t\"\na\n# 2 \"t\"\nb\nc\n"
        );
    }

    #[test]
    fn test_file_switch_resyncs() {
        let outer: Rc<str> = Rc::from("outer");
        let inner: Rc<str> = Rc::from("inner");
        let mut sync = LineSync::new();
        sync.push_all(&tokenize("a\n"), &outer);
        sync.push_all(&tokenize("b\n"), &inner);
        assert_eq!(sync.finish(), "# 1 \"outer\"\na\n# 1 \"inner\"\nb\n");
    }
}
