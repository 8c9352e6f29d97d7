//! # Introduction
//!
//! `omgidl` parses OMG IDL (and a WebIDL-leaning dialect of it) into a
//! syntax tree describing modules, interfaces, valuetypes, structs, unions,
//! enums, exceptions, typedefs, constants, operations and attributes.
//!
//! ## Pipeline
//!
//! ```text
//! Source → Preprocessor → Lexer → Parser → AST → NodeVisitor
//! ```
//!
//! 1. [`preprocessor`]: runs `#include`, `#define`, conditionals and
//!    `#pragma` passthrough, producing normalized text with line markers.
//! 2. [`parser::lexer`]: a stateful lexer with explicit state push/pop.
//! 3. [`parser::parse`]: recursive descent into [`parser::ast`] nodes.
//! 4. [`parser::visitor`]: pre-order walk for renderers and checks.
//!
//! Every stage fails fast: the first problem aborts the whole parse with a
//! single [`Error`] and no partial tree.
//!
//! ```
//! use omgidl::{parse, Dialect};
//!
//! let spec = parse("interface Foo { void ping(); };", None, Dialect::OmgIdl).unwrap();
//! assert_eq!(spec.definitions.len(), 1);
//! ```

pub mod error;
pub mod options;
pub mod parser;
pub mod preprocessor;

pub use error::Error;
pub use options::{Dialect, ParseOptions};
pub use parser::ast::Specification;
pub use parser::visitor::{walk, NodeVisitor};
pub use preprocessor::{FsLoader, IncludeLoader, MemoryLoader};

use parser::parse::Parser;
use std::fs;
use std::path::Path;
use tracing::debug;

/// Preprocess and parse `source`. `source_name` is used for `__FILE__`,
/// line markers and resolving quoted includes.
pub fn parse(source: &str, source_name: Option<&str>, dialect: Dialect) -> Result<Specification, Error> {
    parse_with_options(source, source_name, &ParseOptions::new().with_dialect(dialect))
}

/// Like [`parse`], with include directories and predefined macros.
pub fn parse_with_options(
    source: &str,
    source_name: Option<&str>,
    options: &ParseOptions,
) -> Result<Specification, Error> {
    let loader = FsLoader::new(options.include_dirs.clone());
    parse_with_loader(source, source_name, options, &loader)
}

/// Like [`parse_with_options`], resolving includes through `loader`.
pub fn parse_with_loader(
    source: &str,
    source_name: Option<&str>,
    options: &ParseOptions,
    loader: &dyn IncludeLoader,
) -> Result<Specification, Error> {
    let text = preprocessor::preprocess_with_loader(source, source_name, options, loader)?;
    debug!(bytes = text.len(), dialect = ?options.dialect, "preprocessed source");
    Parser::new(&text, options.dialect).parse_specification()
}

/// Read and parse a file from disk.
pub fn parse_file(path: impl AsRef<Path>, options: &ParseOptions) -> Result<Specification, Error> {
    let path = path.as_ref();
    let name = path.to_string_lossy();
    let source = fs::read_to_string(path).map_err(|e| Error::Io {
        path: name.to_string(),
        message: e.to_string(),
    })?;
    parse_with_options(&source, Some(&*name), options)
}
