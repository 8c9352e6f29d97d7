//! `#include` resolution
//!
//! The preprocessor never touches the filesystem directly; it asks an
//! [`IncludeLoader`]. [`FsLoader`] searches directories on disk and
//! [`MemoryLoader`] serves a fixed set of named sources.

use rustc_hash::FxHashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::trace;

/// Resolves and reads included files.
pub trait IncludeLoader {
    /// Look up `name` as written in the directive. `from` is the resolved
    /// name of the including source; `quoted` is true for `"name"` and false
    /// for `<name>`. Returns the resolved name and the file contents.
    fn load(&self, name: &str, from: &str, quoted: bool) -> Option<(String, String)>;
}

/// Searches the including file's directory (quoted form only), then each
/// include directory in order.
#[derive(Debug, Clone, Default)]
pub struct FsLoader {
    include_dirs: Vec<PathBuf>,
}

impl FsLoader {
    pub fn new(include_dirs: Vec<PathBuf>) -> Self {
        FsLoader { include_dirs }
    }

    fn candidates(&self, name: &str, from: &str, quoted: bool) -> Vec<PathBuf> {
        let mut candidates = Vec::new();
        if quoted {
            let base = Path::new(from).parent().unwrap_or_else(|| Path::new(""));
            candidates.push(base.join(name));
        }
        candidates.extend(self.include_dirs.iter().map(|dir| dir.join(name)));
        candidates
    }
}

impl IncludeLoader for FsLoader {
    fn load(&self, name: &str, from: &str, quoted: bool) -> Option<(String, String)> {
        self.candidates(name, from, quoted).into_iter().find_map(|path| {
            trace!(path = %path.display(), "trying include path");
            let contents = fs::read_to_string(&path).ok()?;
            Some((path.to_string_lossy().into_owned(), contents))
        })
    }
}

/// In-memory sources keyed by the exact name used in the directive.
#[derive(Debug, Clone, Default)]
pub struct MemoryLoader {
    files: FxHashMap<String, String>,
}

impl MemoryLoader {
    pub fn new() -> Self {
        MemoryLoader::default()
    }

    pub fn with_file(mut self, name: impl Into<String>, contents: impl Into<String>) -> Self {
        self.files.insert(name.into(), contents.into());
        self
    }
}

impl IncludeLoader for MemoryLoader {
    fn load(&self, name: &str, _from: &str, _quoted: bool) -> Option<(String, String)> {
        self.files
            .get(name)
            .map(|contents| (name.to_string(), contents.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_loader() {
        let loader = MemoryLoader::new().with_file("a.idl", "long x;");
        assert_eq!(
            loader.load("a.idl", "main.idl", true),
            Some(("a.idl".to_string(), "long x;".to_string()))
        );
        assert_eq!(loader.load("b.idl", "main.idl", true), None);
    }

    #[test]
    fn test_fs_candidates_order() {
        let loader = FsLoader::new(vec![PathBuf::from("inc")]);
        assert_eq!(
            loader.candidates("x.idl", "src/main.idl", true),
            vec![PathBuf::from("src/x.idl"), PathBuf::from("inc/x.idl")]
        );
        assert_eq!(
            loader.candidates("x.idl", "src/main.idl", false),
            vec![PathBuf::from("inc/x.idl")]
        );
    }

    #[test]
    fn test_fs_loader_missing_file() {
        let loader = FsLoader::new(Vec::new());
        assert_eq!(loader.load("no/such/file.idl", "", true), None);
    }
}
