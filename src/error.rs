//! Crate-level error type
//!
//! Every stage of the pipeline fails fast with its own error struct; [`Error`]
//! wraps whichever one aborted the parse so callers deal with a single type.

use crate::parser::lexer::LexicalError;
use crate::parser::parse::SyntaxError;
use crate::preprocessor::PreprocessorError;
use thiserror::Error;

/// The single error surfaced by [`crate::parse`] and friends.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error(transparent)]
    Preprocessor(#[from] PreprocessorError),

    #[error(transparent)]
    Lexical(#[from] LexicalError),

    #[error(transparent)]
    Syntax(#[from] SyntaxError),

    /// The top-level file could not be read.
    #[error("Couldn't read '{path}': {message}")]
    Io { path: String, message: String },
}

impl Error {
    /// The message without the line suffix.
    pub fn message(&self) -> String {
        match self {
            Error::Preprocessor(e) => e.message.clone(),
            Error::Lexical(e) => e.message(),
            Error::Syntax(e) => e.message.clone(),
            Error::Io { .. } => self.to_string(),
        }
    }

    /// Source line the error was reported at, when known.
    pub fn line(&self) -> Option<usize> {
        match self {
            Error::Preprocessor(e) => Some(e.line),
            Error::Lexical(e) => Some(e.line),
            Error::Syntax(e) => e.line,
            Error::Io { .. } => None,
        }
    }
}

/// Render `"<message> at line <n>"`, or just the message when no line is known.
pub(crate) fn with_line(message: &str, line: Option<usize>) -> String {
    match line {
        Some(line) => format!("{} at line {}", message, line),
        None => message.to_string(),
    }
}
