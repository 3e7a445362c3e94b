//! Source access for the module resolver.
//!
//! All file access goes through [`SourceLoader`], so hosts can serve modules
//! from memory (tests, editors) or from disk ([`FsLoader`]).

use std::cell::Cell;
use std::collections::HashMap;
use std::io;
use std::path::{Component, Path, PathBuf};

pub trait SourceLoader {
    fn read(&self, path: &Path) -> io::Result<String>;
    fn canonicalize(&self, path: &Path) -> io::Result<PathBuf>;
    fn exists(&self, path: &Path) -> bool;
}

/// Reads modules from the file system.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsLoader;

impl SourceLoader for FsLoader {
    fn read(&self, path: &Path) -> io::Result<String> {
        std::fs::read_to_string(path)
    }

    fn canonicalize(&self, path: &Path) -> io::Result<PathBuf> {
        path.canonicalize()
    }

    fn exists(&self, path: &Path) -> bool {
        path.is_file()
    }
}

/// In-memory module tree. Paths are normalized lexically; every read is
/// counted.
#[derive(Debug, Default)]
pub struct MemoryLoader {
    files: HashMap<PathBuf, String>,
    reads: Cell<usize>,
}

impl MemoryLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(mut self, path: impl AsRef<Path>, content: impl Into<String>) -> Self {
        self.insert(path, content);
        self
    }

    pub fn insert(&mut self, path: impl AsRef<Path>, content: impl Into<String>) {
        self.files
            .insert(normalize_path(path.as_ref()), content.into());
    }

    /// Number of successful reads so far.
    pub fn reads(&self) -> usize {
        self.reads.get()
    }
}

impl SourceLoader for MemoryLoader {
    fn read(&self, path: &Path) -> io::Result<String> {
        let content = self
            .files
            .get(&normalize_path(path))
            .cloned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no such module"))?;
        self.reads.set(self.reads.get() + 1);
        Ok(content)
    }

    fn canonicalize(&self, path: &Path) -> io::Result<PathBuf> {
        let normalized = normalize_path(path);
        if self.files.contains_key(&normalized) {
            Ok(normalized)
        } else {
            Err(io::Error::new(io::ErrorKind::NotFound, "no such module"))
        }
    }

    fn exists(&self, path: &Path) -> bool {
        self.files.contains_key(&normalize_path(path))
    }
}

/// Resolves `.` and `..` without touching the file system.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_dots() {
        assert_eq!(
            normalize_path(Path::new("/a/./b/../c.hql")),
            PathBuf::from("/a/c.hql")
        );
    }

    #[test]
    fn memory_loader_counts_reads() {
        let loader = MemoryLoader::new().with_file("/m/a.hql", "(def a 1)");
        assert!(loader.exists(Path::new("/m/./a.hql")));
        assert_eq!(loader.read(Path::new("/m/a.hql")).unwrap(), "(def a 1)");
        assert!(loader.read(Path::new("/m/b.hql")).is_err());
        assert_eq!(loader.reads(), 1);
    }

    #[test]
    fn fs_loader_reads_real_files() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("x.hql");
        std::fs::write(&file, "(def x 1)").unwrap();
        assert!(FsLoader.exists(&file));
        assert_eq!(FsLoader.read(&file).unwrap(), "(def x 1)");
        assert!(!FsLoader.exists(&dir.path().join("y.hql")));
    }
}
