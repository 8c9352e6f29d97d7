//! Front-end configuration
//!
//! [`ParseOptions`] carries everything a parse needs besides the source text:
//! the grammar [`Dialect`], the `#include` search path and any macros that
//! should be defined before the first line is read.

use std::path::PathBuf;

/// Grammar variant selected for a parse.
///
/// The dialects differ in keyword recognition and in a few legality rules:
///
/// | rule                                   | `OmgIdl` | `WebIdl` |
/// |----------------------------------------|----------|----------|
/// | `char` / `wchar` are keywords          | yes      | no       |
/// | `optional` is a keyword                | no       | yes      |
/// | parameters may omit a direction        | no       | yes      |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Dialect {
    #[default]
    OmgIdl,
    WebIdl,
}

impl Dialect {
    /// Map the boolean "webidl" switch onto a dialect.
    pub fn from_webidl(webidl: bool) -> Self {
        if webidl {
            Dialect::WebIdl
        } else {
            Dialect::OmgIdl
        }
    }

    pub fn is_webidl(self) -> bool {
        self == Dialect::WebIdl
    }
}

/// Options for a single run of the pipeline.
#[derive(Debug, Clone, Default)]
pub struct ParseOptions {
    pub dialect: Dialect,
    pub include_dirs: Vec<PathBuf>,
    /// Predefined macros as `(name, replacement)`; `None` defines the name empty.
    pub defines: Vec<(String, Option<String>)>,
}

impl ParseOptions {
    pub fn new() -> Self {
        ParseOptions::default()
    }

    pub fn with_dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = dialect;
        self
    }

    pub fn with_include_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.include_dirs.push(dir.into());
        self
    }

    pub fn with_define(mut self, name: impl Into<String>, value: Option<&str>) -> Self {
        self.defines.push((name.into(), value.map(str::to_string)));
        self
    }

    /// Parse a `-D` style argument: `NAME` or `NAME=VALUE`.
    pub fn with_define_arg(self, arg: &str) -> Self {
        match arg.split_once('=') {
            Some((name, value)) => self.with_define(name.trim(), Some(value)),
            None => self.with_define(arg.trim(), None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dialect_from_flag() {
        assert_eq!(Dialect::from_webidl(true), Dialect::WebIdl);
        assert_eq!(Dialect::from_webidl(false), Dialect::OmgIdl);
        assert_eq!(Dialect::default(), Dialect::OmgIdl);
    }

    #[test]
    fn test_define_arg() {
        let options = ParseOptions::new()
            .with_define_arg("FOO")
            .with_define_arg("BAR=1 + 2");

        assert_eq!(options.defines[0], ("FOO".to_string(), None));
        assert_eq!(
            options.defines[1],
            ("BAR".to_string(), Some("1 + 2".to_string()))
        );
    }
}
