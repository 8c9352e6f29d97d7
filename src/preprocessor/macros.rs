//! Macro table and expansion
//!
//! Object-like and function-like macros (including `...` / `__VA_ARGS__`)
//! are supported. Expansion is recursive: arguments are fully expanded before
//! substitution and the substituted body is rescanned with the macro's own
//! name hidden, so a self-referencing macro expands exactly once.
//!
//! Every token produced by an expansion is stamped with the line of the
//! invoking identifier.

use super::tokens::{strip_blank, tokenize, PpToken, PpTokenKind};
use super::PreprocessorError;
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::trace;

const VA_ARGS: &str = "__VA_ARGS__";

/// A `#define`d macro.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Macro {
    pub name: String,
    /// `None` for object-like macros.
    pub params: Option<Vec<String>>,
    /// The last parameter collects any surplus arguments.
    pub variadic: bool,
    pub body: Vec<PpToken>,
}

/// All macros currently defined.
#[derive(Debug, Clone, Default)]
pub struct MacroTable {
    macros: FxHashMap<String, Macro>,
}

impl MacroTable {
    pub fn new() -> Self {
        MacroTable::default()
    }

    pub fn is_defined(&self, name: &str) -> bool {
        self.macros.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&Macro> {
        self.macros.get(name)
    }

    pub fn undef(&mut self, name: &str) {
        self.macros.remove(name);
    }

    /// Define from command-line style text: `NAME body` or `NAME(a, b) body`.
    pub fn define_text(&mut self, text: &str) -> Result<(), PreprocessorError> {
        let tokens = tokenize(text);
        self.define_tokens(&tokens, 0)
    }

    /// Define from the tokens following `#define`.
    pub fn define_tokens(&mut self, args: &[PpToken], line: usize) -> Result<(), PreprocessorError> {
        let args = strip_blank(args);
        let Some(name_token) = args.first().filter(|t| t.kind == PpTokenKind::Ident) else {
            return Err(PreprocessorError::new("Invalid macro definition", line));
        };
        let name = name_token.text.clone();

        // A parameter list only exists when `(` touches the name.
        let (params, variadic, body_start) = if args.get(1).is_some_and(|t| t.is_punct("(")) {
            let (params, variadic, close) = parse_params(args, &name, line)?;
            (Some(params), variadic, close + 1)
        } else {
            (None, false, 1)
        };

        let body = strip_blank(&args[body_start..])
            .iter()
            .map(|t| match t.kind {
                PpTokenKind::Comment | PpTokenKind::Newline => {
                    PpToken::new(PpTokenKind::Whitespace, " ", t.line)
                }
                _ => t.clone(),
            })
            .collect();

        trace!(macro_name = %name, "define");
        self.macros.insert(
            name.clone(),
            Macro {
                name,
                params,
                variadic,
                body,
            },
        );
        Ok(())
    }

    /// Expand every macro invocation in `tokens`.
    pub fn expand(&self, tokens: &[PpToken]) -> Result<Vec<PpToken>, PreprocessorError> {
        let mut hidden = FxHashSet::default();
        self.expand_with(tokens, &mut hidden)
    }

    fn expand_with(
        &self,
        tokens: &[PpToken],
        hidden: &mut FxHashSet<String>,
    ) -> Result<Vec<PpToken>, PreprocessorError> {
        let mut out = Vec::with_capacity(tokens.len());
        let mut i = 0;

        while i < tokens.len() {
            let token = &tokens[i];
            if token.kind != PpTokenKind::Ident || hidden.contains(&token.text) {
                out.push(token.clone());
                i += 1;
                continue;
            }

            if token.text == "__LINE__" && !self.is_defined("__LINE__") {
                out.push(PpToken::new(PpTokenKind::Number, token.line.to_string(), token.line));
                i += 1;
                continue;
            }

            let Some(def) = self.macros.get(&token.text) else {
                out.push(token.clone());
                i += 1;
                continue;
            };

            match &def.params {
                None => {
                    trace!(macro_name = %def.name, line = token.line, "expand");
                    hidden.insert(def.name.clone());
                    let body = restamp(&def.body, token.line);
                    let expanded = self.expand_with(&body, hidden);
                    hidden.remove(&def.name);
                    out.extend(expanded?);
                    i += 1;
                }
                Some(params) => {
                    // Without a following `(` the name is left alone.
                    let Some(open) = tokens[i + 1..]
                        .iter()
                        .position(|t| !t.is_blank())
                        .map(|offset| i + 1 + offset)
                        .filter(|&j| tokens[j].is_punct("("))
                    else {
                        out.push(token.clone());
                        i += 1;
                        continue;
                    };

                    let (args, next) = collect_args(tokens, open).ok_or_else(|| {
                        PreprocessorError::new(
                            format!("Unterminated argument list invoking macro '{}'", def.name),
                            token.line,
                        )
                    })?;
                    let args = bind_args(def, params, args, token.line)?;

                    let mut expanded_args = Vec::with_capacity(args.len());
                    for arg in &args {
                        expanded_args.push(self.expand_with(arg, hidden)?);
                    }

                    let mut substituted = Vec::new();
                    for body_token in &def.body {
                        let param = (body_token.kind == PpTokenKind::Ident)
                            .then(|| params.iter().position(|p| *p == body_token.text))
                            .flatten();
                        match param {
                            Some(index) => substituted.extend(restamp(&expanded_args[index], token.line)),
                            None => {
                                let mut t = body_token.clone();
                                t.line = token.line;
                                substituted.push(t);
                            }
                        }
                    }

                    trace!(macro_name = %def.name, line = token.line, "expand");
                    hidden.insert(def.name.clone());
                    let expanded = self.expand_with(&substituted, hidden);
                    hidden.remove(&def.name);
                    out.extend(expanded?);
                    i = next;
                }
            }
        }

        Ok(out)
    }
}

/// Parse `(a, b, ...)` after a macro name. Returns the parameter names, the
/// variadic flag and the index of the closing parenthesis.
fn parse_params(
    args: &[PpToken],
    name: &str,
    line: usize,
) -> Result<(Vec<String>, bool, usize), PreprocessorError> {
    let malformed = || PreprocessorError::new(format!("Invalid parameter list for macro '{}'", name), line);
    let mut params = Vec::new();
    let mut variadic = false;
    let mut expect_name = true;
    let mut i = 2;

    while i < args.len() {
        let t = &args[i];
        if t.is_blank() {
            i += 1;
            continue;
        }
        if t.is_punct(")") {
            if expect_name && !params.is_empty() {
                return Err(malformed());
            }
            return Ok((params, variadic, i));
        }
        if variadic {
            return Err(malformed());
        }
        if expect_name {
            if t.kind == PpTokenKind::Ident {
                params.push(t.text.clone());
            } else if is_ellipsis(args, i) {
                params.push(VA_ARGS.to_string());
                variadic = true;
                i += 2;
            } else {
                return Err(malformed());
            }
            expect_name = false;
        } else if t.is_punct(",") {
            expect_name = true;
        } else if is_ellipsis(args, i) {
            // GNU named variadic: `args...`
            variadic = true;
            i += 2;
        } else {
            return Err(malformed());
        }
        i += 1;
    }

    Err(malformed())
}

fn is_ellipsis(tokens: &[PpToken], i: usize) -> bool {
    (0..3).all(|k| tokens.get(i + k).is_some_and(|t| t.is_punct(".")))
}

/// Collect the comma-separated arguments of an invocation whose `(` is at
/// `open`. Returns the raw arguments and the index after the closing `)`.
fn collect_args(tokens: &[PpToken], open: usize) -> Option<(Vec<Vec<PpToken>>, usize)> {
    let mut args = vec![Vec::new()];
    let mut depth = 0usize;

    for (j, t) in tokens.iter().enumerate().skip(open + 1) {
        if t.is_punct("(") {
            depth += 1;
        } else if t.is_punct(")") {
            if depth == 0 {
                let args = args
                    .into_iter()
                    .map(|arg: Vec<PpToken>| strip_blank(&arg).to_vec())
                    .collect();
                return Some((args, j + 1));
            }
            depth -= 1;
        } else if t.is_punct(",") && depth == 0 {
            args.push(Vec::new());
            continue;
        }

        if let Some(current) = args.last_mut() {
            if t.kind == PpTokenKind::Newline {
                current.push(PpToken::new(PpTokenKind::Whitespace, " ", t.line));
            } else {
                current.push(t.clone());
            }
        }
    }

    None
}

/// Match invocation arguments to parameters, folding surplus arguments into
/// the variadic parameter.
fn bind_args(
    def: &Macro,
    params: &[String],
    mut args: Vec<Vec<PpToken>>,
    line: usize,
) -> Result<Vec<Vec<PpToken>>, PreprocessorError> {
    if params.is_empty() && args.len() == 1 && args[0].is_empty() {
        return Ok(Vec::new());
    }

    if def.variadic {
        let fixed = params.len() - 1;
        if args.len() < fixed {
            return Err(arity_error(def, params.len(), args.len(), line));
        }
        let rest = args.split_off(fixed.min(args.len()));
        let mut joined = Vec::new();
        for (k, arg) in rest.into_iter().enumerate() {
            if k > 0 {
                joined.push(PpToken::new(PpTokenKind::Punct, ",", line));
            }
            joined.extend(arg);
        }
        args.push(joined);
        return Ok(args);
    }

    if args.len() != params.len() {
        return Err(arity_error(def, params.len(), args.len(), line));
    }
    Ok(args)
}

fn arity_error(def: &Macro, expected: usize, found: usize, line: usize) -> PreprocessorError {
    PreprocessorError::new(
        format!(
            "Macro '{}' expects {} argument(s), {} given",
            def.name, expected, found
        ),
        line,
    )
}

fn restamp(tokens: &[PpToken], line: usize) -> Vec<PpToken> {
    tokens
        .iter()
        .map(|t| PpToken::new(t.kind, t.text.clone(), line))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expand_text(table: &MacroTable, text: &str) -> String {
        table
            .expand(&tokenize(text))
            .unwrap()
            .iter()
            .map(|t| t.text.as_str())
            .collect()
    }

    #[test]
    fn test_object_like() {
        let mut table = MacroTable::new();
        table.define_text("SIZE 10").unwrap();
        assert_eq!(expand_text(&table, "long x[SIZE];"), "long x[10];");
    }

    #[test]
    fn test_function_like() {
        let mut table = MacroTable::new();
        table.define_text("PAIR(a, b) a b").unwrap();
        assert_eq!(expand_text(&table, "PAIR(long, x);"), "long x;");
        // Name without arguments is not an invocation.
        assert_eq!(expand_text(&table, "PAIR;"), "PAIR;");
    }

    #[test]
    fn test_nested_arguments() {
        let mut table = MacroTable::new();
        table.define_text("ID(x) x").unwrap();
        assert_eq!(expand_text(&table, "ID(f(a, b))"), "f(a, b)");
        assert_eq!(expand_text(&table, "ID(ID(7))"), "7");
    }

    #[test]
    fn test_self_reference_terminates() {
        let mut table = MacroTable::new();
        table.define_text("foo foo + 1").unwrap();
        table.define_text("a b").unwrap();
        table.define_text("b a").unwrap();
        assert_eq!(expand_text(&table, "foo"), "foo + 1");
        assert_eq!(expand_text(&table, "a"), "a");
    }

    #[test]
    fn test_variadic() {
        let mut table = MacroTable::new();
        table.define_text("CALL(f, ...) f(__VA_ARGS__)").unwrap();
        assert_eq!(expand_text(&table, "CALL(g, 1, 2)"), "g(1,2)");
    }

    #[test]
    fn test_arity_mismatch() {
        let mut table = MacroTable::new();
        table.define_text("TWO(a, b) a").unwrap();
        let err = table.expand(&tokenize("TWO(1)")).unwrap_err();
        assert!(err.message.contains("expects 2"));
    }

    #[test]
    fn test_line_builtin() {
        let table = MacroTable::new();
        assert_eq!(expand_text(&table, "\n\n__LINE__"), "\n\n3");
    }

    #[test]
    fn test_multiline_invocation_is_stamped_with_name_line() {
        let mut table = MacroTable::new();
        table.define_text("ID(x) x").unwrap();
        let out = table.expand(&tokenize("ID(\nvalue)")).unwrap();
        let value = out.iter().find(|t| t.text == "value").unwrap();
        assert_eq!(value.line, 1);
    }
}
