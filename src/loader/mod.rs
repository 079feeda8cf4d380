//! Template sources
//!
//! Templates are addressed by normalized, `/`-separated paths. An include is
//! resolved against the directory of the including template before it is read.

use crate::cache;
use crate::error::{FigError, Result};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

/// Template text with its modification time (unix seconds)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Source {
    pub text: String,
    pub modified: u64,
}

/// Where templates come from
pub trait TemplateSource: Send + Sync {
    /// Read a template by normalized path
    fn read(&self, path: &str) -> Result<Source>;

    /// Modification time of a template, without reading it
    fn modified(&self, path: &str) -> Result<u64> {
        self.read(path).map(|source| source.modified)
    }

    /// Path of `relative` as seen from the template at `base`
    fn resolve(&self, base: &str, relative: &str) -> String {
        resolve_path(base, relative)
    }
}

/// Join `relative` to the directory of `base` and normalize the result
pub fn resolve_path(base: &str, relative: &str) -> String {
    if relative.starts_with('/') {
        return normalize(relative);
    }
    let dir = match base.rfind('/') {
        Some(index) => &base[..index],
        None => "",
    };
    if dir.is_empty() {
        normalize(relative)
    } else {
        normalize(&format!("{}/{}", dir, relative))
    }
}

/// Collapse `.` and `..` segments and duplicate separators
pub fn normalize(path: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for segment in path.split(|c| c == '/' || c == '\\') {
        match segment {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            other => parts.push(other),
        }
    }
    parts.join("/")
}

/// Normalize a path that must stay below its root. Returns `None` when a `..`
/// segment would climb above it.
pub fn confine(path: &str) -> Option<String> {
    let mut depth = 0usize;
    for segment in path.split(|c| c == '/' || c == '\\') {
        match segment {
            "" | "." => {}
            ".." => depth = depth.checked_sub(1)?,
            _ => depth += 1,
        }
    }
    if path.starts_with('/') || path.starts_with('\\') {
        return None;
    }
    Some(normalize(path))
}

/// Templates read from a directory tree
#[derive(Debug, Clone)]
pub struct FileSystemSource {
    root: PathBuf,
}

impl FileSystemSource {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn full_path(&self, path: &str) -> PathBuf {
        self.root.join(normalize(path))
    }

    fn not_found(&self, path: &str) -> FigError {
        FigError::SourceNotFound {
            location: None,
            path: self.full_path(path).display().to_string(),
        }
    }
}

impl TemplateSource for FileSystemSource {
    fn read(&self, path: &str) -> Result<Source> {
        let full = self.full_path(path);
        if !full.is_file() {
            return Err(self.not_found(path));
        }
        let text = fs::read_to_string(&full)?;
        let modified = cache::get_mtime(&full)?;
        Ok(Source { text, modified })
    }

    fn modified(&self, path: &str) -> Result<u64> {
        let full = self.full_path(path);
        if !full.is_file() {
            return Err(self.not_found(path));
        }
        cache::get_mtime(&full)
    }
}

/// Templates held in memory, for embedding and tests
#[derive(Debug, Default)]
pub struct MemorySource {
    templates: RwLock<HashMap<String, Source>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a template. Each replacement bumps its modification time.
    pub fn insert(&self, path: &str, text: &str) {
        let mut templates = self.templates.write().unwrap_or_else(|e| e.into_inner());
        let path = normalize(path);
        let modified = templates.get(&path).map(|s| s.modified + 1).unwrap_or(0);
        templates.insert(
            path,
            Source {
                text: text.to_string(),
                modified,
            },
        );
    }

    pub fn with(self, path: &str, text: &str) -> Self {
        self.insert(path, text);
        self
    }
}

impl TemplateSource for MemorySource {
    fn read(&self, path: &str) -> Result<Source> {
        let templates = self.templates.read().unwrap_or_else(|e| e.into_inner());
        let path = normalize(path);
        templates
            .get(&path)
            .cloned()
            .ok_or(FigError::SourceNotFound {
                location: None,
                path,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use tempfile::TempDir;

    #[test]
    fn test_resolve_path() {
        assert_eq!(resolve_path("pages/index.xml", "header.xml"), "pages/header.xml");
        assert_eq!(resolve_path("pages/index.xml", "../common/./nav.xml"), "common/nav.xml");
        assert_eq!(resolve_path("index.xml", "parts/a.xml"), "parts/a.xml");
        assert_eq!(resolve_path("pages/index.xml", "/root.xml"), "root.xml");
    }

    #[test]
    fn test_confine() {
        assert_eq!(confine("fr/a/../site.xml").as_deref(), Some("fr/site.xml"));
        assert_eq!(confine("./fr/site.xml").as_deref(), Some("fr/site.xml"));
        assert_eq!(confine("fr/../../x.xml"), None);
        assert_eq!(confine("../x.xml"), None);
        assert_eq!(confine("/etc/passwd"), None);
    }

    #[test]
    fn test_memory_source() {
        let source = MemorySource::new().with("a/b.xml", "<b/>");
        assert_eq!(source.read("a/./b.xml").unwrap().text, "<b/>");
        source.insert("a/b.xml", "<c/>");
        assert_eq!(source.read("a/b.xml").unwrap().modified, 1);
        let err = source.read("missing.xml").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SourceNotFound);
    }

    #[test]
    fn test_file_system_source() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("views")).unwrap();
        fs::write(dir.path().join("views/page.xml"), "<html/>").unwrap();

        let source = FileSystemSource::new(dir.path());
        let page = source.read("views/page.xml").unwrap();
        assert_eq!(page.text, "<html/>");
        assert_eq!(source.modified("views/page.xml").unwrap(), page.modified);
        assert_eq!(
            source.read("views/none.xml").unwrap_err().kind(),
            ErrorKind::SourceNotFound
        );
    }
}
