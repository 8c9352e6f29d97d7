//! C-style preprocessor
//!
//! Runs ahead of the IDL lexer and turns raw source into normalized text:
//! directives are executed, disabled regions are dropped, macros are expanded
//! and `# <line> "<source>"` markers are inserted wherever the output would
//! otherwise drift away from the original line numbering.
//!
//! # Directives
//!
//! - `#define`, `#undef`: only while the current region is enabled
//! - `#include "file"` / `#include <file>`: resolved through an
//!   [`IncludeLoader`]; an include cycle is an error
//! - `#if`, `#ifdef`, `#ifndef`, `#elif`, `#else`, `#endif`
//! - `#pragma`: passed through unexpanded for the lexer
//! - `#line N ["file"]` / `# N ["file"]`: renumbers the following lines
//!
//! Anything else after a `#` is ignored.

pub mod expr;
pub mod loader;
pub mod macros;
pub mod output;
pub mod tokens;

pub use loader::{FsLoader, IncludeLoader, MemoryLoader};

use crate::error::with_line;
use crate::options::ParseOptions;
use macros::MacroTable;
use output::LineSync;
use std::fmt;
use std::rc::Rc;
use tokens::{group_lines, join_continuations, replace_trigraphs, strip_blank, tokenize, PpToken, PpTokenKind};
use tracing::{debug, trace};

/// A malformed directive, a misplaced conditional or an expression that
/// cannot be evaluated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreprocessorError {
    pub message: String,
    pub line: usize,
}

impl PreprocessorError {
    pub fn new(message: impl Into<String>, line: usize) -> Self {
        PreprocessorError {
            message: message.into(),
            line,
        }
    }
}

impl fmt::Display for PreprocessorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&with_line(&self.message, Some(self.line)))
    }
}

impl std::error::Error for PreprocessorError {}

/// Preprocess `source` with no predefined macros, searching only the
/// directory of `source_name` for quoted includes.
pub fn preprocess(source: &str, source_name: Option<&str>) -> Result<String, PreprocessorError> {
    preprocess_with_options(source, source_name, &ParseOptions::default())
}

/// Preprocess using the defines and include directories from `options`.
pub fn preprocess_with_options(
    source: &str,
    source_name: Option<&str>,
    options: &ParseOptions,
) -> Result<String, PreprocessorError> {
    let loader = FsLoader::new(options.include_dirs.clone());
    preprocess_with_loader(source, source_name, options, &loader)
}

/// Preprocess resolving includes through `loader`.
pub fn preprocess_with_loader(
    source: &str,
    source_name: Option<&str>,
    options: &ParseOptions,
    loader: &dyn IncludeLoader,
) -> Result<String, PreprocessorError> {
    let mut preprocessor = Preprocessor::new(loader);
    for (name, value) in &options.defines {
        preprocessor.define(name, value.as_deref())?;
    }
    preprocessor.run(source, source_name.unwrap_or(""))?;
    Ok(preprocessor.finish())
}

/// Saved state of the enclosing region, pushed by `#if`/`#ifdef`/`#ifndef`.
#[derive(Debug, Clone, Copy)]
struct Frame {
    enabled: bool,
    triggered: bool,
    directive: &'static str,
    line: usize,
}

/// Conditional-compilation state of one source file.
///
/// `enabled` says whether text is currently kept; `triggered` whether some
/// branch of the innermost conditional has already been taken.
#[derive(Debug)]
struct ConditionalStack {
    saved: Vec<Frame>,
    enabled: bool,
    triggered: bool,
}

impl ConditionalStack {
    fn new() -> Self {
        ConditionalStack {
            saved: Vec::new(),
            enabled: true,
            triggered: false,
        }
    }

    fn enabled(&self) -> bool {
        self.enabled
    }

    fn push_if(
        &mut self,
        directive: &'static str,
        line: usize,
        condition: impl FnOnce() -> Result<bool, PreprocessorError>,
    ) -> Result<(), PreprocessorError> {
        self.saved.push(Frame {
            enabled: self.enabled,
            triggered: self.triggered,
            directive,
            line,
        });
        if self.enabled {
            let taken = condition()?;
            self.enabled = taken;
            self.triggered = taken;
        }
        Ok(())
    }

    fn elif(
        &mut self,
        line: usize,
        condition: impl FnOnce() -> Result<bool, PreprocessorError>,
    ) -> Result<(), PreprocessorError> {
        let outer = self
            .saved
            .last()
            .ok_or_else(|| PreprocessorError::new("Misplaced #elif", line))?;
        if outer.enabled {
            if self.enabled {
                self.enabled = false;
            } else if !self.triggered && condition()? {
                self.enabled = true;
                self.triggered = true;
            }
        }
        Ok(())
    }

    fn else_branch(&mut self, line: usize) -> Result<(), PreprocessorError> {
        let outer = self
            .saved
            .last()
            .ok_or_else(|| PreprocessorError::new("Misplaced #else", line))?;
        if outer.enabled {
            if self.enabled {
                self.enabled = false;
            } else if !self.triggered {
                self.enabled = true;
                self.triggered = true;
            }
        }
        Ok(())
    }

    fn endif(&mut self, line: usize) -> Result<(), PreprocessorError> {
        let outer = self
            .saved
            .pop()
            .ok_or_else(|| PreprocessorError::new("Misplaced #endif", line))?;
        self.enabled = outer.enabled;
        self.triggered = outer.triggered;
        Ok(())
    }

    fn finish(&self) -> Result<(), PreprocessorError> {
        match self.saved.last() {
            Some(frame) => Err(PreprocessorError::new(
                format!("Unterminated #{}", frame.directive),
                frame.line,
            )),
            None => Ok(()),
        }
    }
}

/// Preprocessor state shared across a file and everything it includes.
pub struct Preprocessor<'a> {
    macros: MacroTable,
    loader: &'a dyn IncludeLoader,
    /// Resolved names of the files currently being read, outermost first.
    include_stack: Vec<String>,
    output: LineSync,
}

impl<'a> Preprocessor<'a> {
    pub fn new(loader: &'a dyn IncludeLoader) -> Self {
        Preprocessor {
            macros: MacroTable::new(),
            loader,
            include_stack: Vec::new(),
            output: LineSync::new(),
        }
    }

    /// Predefine `name`, like `-D name=value`.
    pub fn define(&mut self, name: &str, value: Option<&str>) -> Result<(), PreprocessorError> {
        self.macros
            .define_text(&format!("{} {}", name, value.unwrap_or("")))
    }

    pub fn macros(&self) -> &MacroTable {
        &self.macros
    }

    /// Preprocess a top-level source.
    pub fn run(&mut self, source: &str, source_name: &str) -> Result<(), PreprocessorError> {
        self.include_stack.push(source_name.to_string());
        let result = self.run_file(source, source_name);
        self.include_stack.pop();
        result
    }

    /// The normalized text produced so far.
    pub fn finish(self) -> String {
        self.output.finish()
    }

    fn run_file(&mut self, source: &str, source_name: &str) -> Result<(), PreprocessorError> {
        debug!(source = source_name, "preprocessing");
        let mut file: Rc<str> = Rc::from(source_name);
        self.define_file_macro(&file)?;

        let text = join_continuations(&replace_trigraphs(source));
        let mut conditionals = ConditionalStack::new();
        let mut chunk: Vec<PpToken> = Vec::new();
        let mut line_delta: isize = 0;

        for mut group in group_lines(tokenize(&text)) {
            if line_delta != 0 {
                for token in &mut group {
                    token.line = shift_line(token.line, line_delta);
                }
            }

            let first = group.iter().position(|t| t.kind != PpTokenKind::Whitespace);
            let Some(hash) = first.filter(|&i| group[i].is_punct("#")) else {
                if conditionals.enabled() {
                    chunk.extend(group);
                }
                continue;
            };

            let line = group[hash].line;
            let newline = group
                .last()
                .filter(|t| t.kind == PpTokenKind::Newline)
                .cloned();
            let directive = strip_blank(&group[hash + 1..]);
            let (name, args) = match directive.split_first() {
                Some((first, rest)) => (first.text.as_str(), strip_blank(rest)),
                None => ("", directive),
            };
            let enabled = conditionals.enabled();
            trace!(directive = name, line, enabled, "directive");

            match name {
                "define" if enabled => {
                    self.flush(&mut chunk, &file)?;
                    self.macros.define_tokens(args, line)?;
                }
                "undef" if enabled => {
                    self.flush(&mut chunk, &file)?;
                    let target = args
                        .first()
                        .filter(|t| t.kind == PpTokenKind::Ident)
                        .ok_or_else(|| PreprocessorError::new("Malformed #undef", line))?;
                    self.macros.undef(&target.text);
                }
                "include" if enabled => {
                    self.flush(&mut chunk, &file)?;
                    self.include(args, line)?;
                    self.define_file_macro(&file)?;
                }
                "ifdef" | "ifndef" => {
                    let directive = if name == "ifdef" { "ifdef" } else { "ifndef" };
                    let macros = &self.macros;
                    conditionals.push_if(directive, line, || {
                        let target = args
                            .first()
                            .filter(|t| t.kind == PpTokenKind::Ident)
                            .ok_or_else(|| {
                                PreprocessorError::new(format!("Malformed #{}", directive), line)
                            })?;
                        Ok(macros.is_defined(&target.text) == (directive == "ifdef"))
                    })?;
                }
                "if" => conditionals.push_if("if", line, || self.eval_condition(args, line))?,
                "elif" => conditionals.elif(line, || self.eval_condition(args, line))?,
                "else" => conditionals.else_branch(line)?,
                "endif" => conditionals.endif(line)?,
                "pragma" if enabled => {
                    self.flush(&mut chunk, &file)?;
                    let pragma: Vec<PpToken> = group
                        .iter()
                        .filter(|t| !matches!(t.kind, PpTokenKind::Comment | PpTokenKind::Newline))
                        .cloned()
                        .collect();
                    self.output.push_all(&pragma, &file);
                }
                _ if enabled && is_line_directive(directive) => {
                    let target = if name == "line" { args } else { directive };
                    let (next_line, renamed) = parse_line_directive(target, line)?;
                    self.flush(&mut chunk, &file)?;
                    // The physical line after the directive becomes `next_line`.
                    let physical = shift_line(line, -line_delta) + 1;
                    line_delta = isize::try_from(next_line)
                        .ok()
                        .zip(isize::try_from(physical).ok())
                        .and_then(|(next, physical)| next.checked_sub(physical))
                        .ok_or_else(|| PreprocessorError::new("Malformed #line", line))?;
                    if let Some(renamed) = renamed {
                        file = Rc::from(renamed.as_str());
                        self.define_file_macro(&file)?;
                    }
                }
                _ => trace!(directive = name, line, "ignoring directive"),
            }

            chunk.extend(newline);
        }

        self.flush(&mut chunk, &file)?;
        conditionals.finish()
    }

    fn flush(&mut self, chunk: &mut Vec<PpToken>, file: &Rc<str>) -> Result<(), PreprocessorError> {
        if chunk.is_empty() {
            return Ok(());
        }
        let expanded = self.macros.expand(chunk)?;
        chunk.clear();
        self.output.push_all(&expanded, file);
        Ok(())
    }

    fn define_file_macro(&mut self, file: &str) -> Result<(), PreprocessorError> {
        let quoted = file.replace('\\', "\\\\").replace('"', "\\\"");
        self.macros.define_text(&format!("__FILE__ \"{}\"", quoted))
    }

    fn include(&mut self, args: &[PpToken], line: usize) -> Result<(), PreprocessorError> {
        let (name, quoted) = match include_target(args) {
            Some(target) => target,
            None => {
                let expanded = self.macros.expand(args)?;
                include_target(strip_blank(&expanded))
                    .ok_or_else(|| PreprocessorError::new("Malformed #include", line))?
            }
        };

        let from = self.include_stack.last().cloned().unwrap_or_default();
        let (resolved, contents) = self
            .loader
            .load(&name, &from, quoted)
            .ok_or_else(|| PreprocessorError::new(format!("Couldn't find '{}'", name), line))?;

        if self.include_stack.contains(&resolved) {
            return Err(PreprocessorError::new(
                format!("Recursive inclusion of '{}'", name),
                line,
            ));
        }

        debug!(file = %resolved, "entering include");
        self.include_stack.push(resolved.clone());
        let result = self.run_file(&contents, &resolved);
        self.include_stack.pop();
        debug!(file = %resolved, "leaving include");
        result
    }

    /// Evaluate the controlling expression of `#if` / `#elif`.
    fn eval_condition(&self, args: &[PpToken], line: usize) -> Result<bool, PreprocessorError> {
        let mut resolved = Vec::with_capacity(args.len());
        let mut i = 0;

        while i < args.len() {
            let token = &args[i];
            if token.kind == PpTokenKind::Ident && token.text == "defined" {
                let (name, next) = parse_defined(args, i + 1)
                    .ok_or_else(|| PreprocessorError::new("Malformed defined()", line))?;
                let value = if self.macros.is_defined(name) { "1" } else { "0" };
                resolved.push(PpToken::new(PpTokenKind::Number, value, token.line));
                i = next;
            } else {
                if token.kind != PpTokenKind::Comment {
                    resolved.push(token.clone());
                }
                i += 1;
            }
        }

        let expanded = self.macros.expand(&resolved)?;
        let text: String = expanded
            .iter()
            .map(|t| if t.is_blank() { " " } else { t.text.as_str() })
            .collect();

        let value = expr::evaluate(&text).map_err(|reason| {
            debug!(%reason, line, "expression evaluation failed");
            PreprocessorError::new(format!("Couldn't evaluate expression: {}", text.trim()), line)
        })?;
        Ok(value != 0)
    }
}

/// `defined NAME` or `defined ( NAME )` starting after the `defined` token.
fn parse_defined(tokens: &[PpToken], start: usize) -> Option<(&str, usize)> {
    let skip = |from: usize| (from..tokens.len()).find(|&j| !tokens[j].is_blank());

    let j = skip(start)?;
    if tokens[j].kind == PpTokenKind::Ident {
        return Some((tokens[j].text.as_str(), j + 1));
    }
    if !tokens[j].is_punct("(") {
        return None;
    }
    let name = skip(j + 1).filter(|&k| tokens[k].kind == PpTokenKind::Ident)?;
    let close = skip(name + 1).filter(|&k| tokens[k].is_punct(")"))?;
    Some((tokens[name].text.as_str(), close + 1))
}

/// `"name"` or `<name>`.
fn include_target(args: &[PpToken]) -> Option<(String, bool)> {
    let first = args.first()?;
    if first.kind == PpTokenKind::String {
        return unquote(&first.text).map(|name| (name.to_string(), true));
    }
    if first.is_punct("<") {
        let close = args.iter().position(|t| t.is_punct(">"))?;
        let name: String = args[1..close].iter().map(|t| t.text.as_str()).collect();
        return Some((name, false));
    }
    None
}

fn is_line_directive(directive: &[PpToken]) -> bool {
    directive.first().is_some_and(|t| {
        t.kind == PpTokenKind::Number || (t.kind == PpTokenKind::Ident && t.text == "line")
    })
}

/// `N ["file"]` following `#line` or a bare `#`.
fn parse_line_directive(args: &[PpToken], line: usize) -> Result<(usize, Option<String>), PreprocessorError> {
    let malformed = || PreprocessorError::new("Malformed #line", line);
    let mut significant = args.iter().filter(|t| !t.is_blank());

    let number = significant
        .next()
        .filter(|t| t.kind == PpTokenKind::Number)
        .and_then(|t| t.text.parse::<usize>().ok())
        .ok_or_else(malformed)?;
    let file = match significant.next() {
        Some(t) if t.kind == PpTokenKind::String => {
            Some(unquote(&t.text).ok_or_else(malformed)?.to_string())
        }
        Some(_) => return Err(malformed()),
        None => None,
    };
    Ok((number, file))
}

/// Body of a terminated string literal; `None` when the closing quote is missing.
fn unquote(text: &str) -> Option<&str> {
    text.strip_prefix('"')?.strip_suffix('"')
}

fn shift_line(line: usize, delta: isize) -> usize {
    line.checked_add_signed(delta).unwrap_or(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(source: &str) -> Result<String, PreprocessorError> {
        preprocess_with_loader(source, Some("t.idl"), &ParseOptions::default(), &MemoryLoader::new())
    }

    #[test]
    fn test_conditional_stack_semantics() {
        let mut stack = ConditionalStack::new();
        stack.push_if("if", 1, || Ok(false)).unwrap();
        assert!(!stack.enabled());
        stack.elif(2, || Ok(true)).unwrap();
        assert!(stack.enabled());
        stack.elif(3, || Ok(true)).unwrap();
        assert!(!stack.enabled());
        stack.else_branch(4).unwrap();
        assert!(!stack.enabled());
        stack.endif(5).unwrap();
        assert!(stack.enabled());
        assert!(stack.finish().is_ok());
    }

    #[test]
    fn test_nested_disabled_region_skips_evaluation() {
        let mut stack = ConditionalStack::new();
        stack.push_if("if", 1, || Ok(false)).unwrap();
        stack
            .push_if("if", 2, || Err(PreprocessorError::new("evaluated", 2)))
            .unwrap();
        stack.else_branch(3).unwrap();
        assert!(!stack.enabled());
    }

    #[test]
    fn test_misplaced_directives() {
        assert_eq!(run("#endif\n").unwrap_err().message, "Misplaced #endif");
        assert_eq!(run("\n#else\n").unwrap_err(), PreprocessorError::new("Misplaced #else", 2));
        assert_eq!(run("#elif 1\n").unwrap_err().message, "Misplaced #elif");
    }

    #[test]
    fn test_unterminated_conditional() {
        let err = run("long a;\n#ifdef X\nlong b;\n").unwrap_err();
        assert_eq!(err, PreprocessorError::new("Unterminated #ifdef", 2));
    }

    #[test]
    fn test_defined_operator() {
        let out = run("#define A\n#if defined(A) && !defined B\nyes\n#else\nno\n#endif\n").unwrap();
        assert!(out.contains("yes"));
        assert!(!out.contains("no"));
    }

    #[test]
    fn test_bad_expression() {
        let err = run("#if 1 +\n#endif\n").unwrap_err();
        assert_eq!(err.line, 1);
        assert!(err.message.starts_with("Couldn't evaluate expression"));
    }

    #[test]
    fn test_line_directive_renumbers() {
        let out = run("a\n#line 40\nb\n").unwrap();
        assert_eq!(out, "# 1 \"t.idl\"\na\n\n# 40 \"t.idl\"\nb\n");
    }

    #[test]
    fn test_unterminated_include_name() {
        let err = run("#include \"\u{e9}\n").unwrap_err();
        assert_eq!(err.message, "Malformed #include");
        assert_eq!(err.line, 1);

        let err = run("#include \"ab\n").unwrap_err();
        assert_eq!(err.message, "Malformed #include");
    }

    #[test]
    fn test_unterminated_line_file_name() {
        let err = run("#line 5 \"\u{e9}\nx\n").unwrap_err();
        assert_eq!(err.message, "Malformed #line");
        assert_eq!(err.line, 1);
    }

    #[test]
    fn test_line_number_out_of_range() {
        let err = run("x\n#line 9223372036854775808\ny\n").unwrap_err();
        assert_eq!(err.message, "Malformed #line");
        assert_eq!(err.line, 2);

        let out = run("#line 9223372036854775807\ny\n").unwrap();
        assert!(out.ends_with("# 9223372036854775807 \"t.idl\"\ny\n"));
    }

    #[test]
    fn test_file_macro() {
        let out = run("__FILE__\n").unwrap();
        assert_eq!(out, "# 1 \"t.idl\"\n\"t.idl\"\n");
    }

    #[test]
    fn test_error_display() {
        let err = PreprocessorError::new("Malformed #include", 4);
        assert_eq!(err.to_string(), "Malformed #include at line 4");
    }
}
