//! IDL parser
//!
//! This module transforms preprocessed IDL text into an Abstract Syntax Tree (AST):
//! - [`lexer`]: Tokenization (text → tokens), with explicit lexer states
//! - [`parse`]: Parsing (tokens → AST), split across `impl Parser` files
//! - [`ast`]: AST node definitions
//! - [`visitor`]: Pre-order traversal of a finished tree
//!
//! # Dialects
//!
//! The default dialect is OMG IDL. The WebIDL-leaning dialect adds the
//! `optional` parameter attribute, treats `char`/`wchar` as plain
//! identifiers and no longer requires a direction on every parameter.
//!
//! # Parser Implementation
//!
//! Hand-written recursive descent with a table of precedence levels for
//! constant expressions. No external parser generator dependencies.

pub mod ast;
pub mod lexer;
pub mod parse;
pub mod visitor;

mod declarations;
mod expressions;
mod members;
mod types;
