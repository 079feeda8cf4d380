//! On-disk cache for compiled templates and dictionaries
//!
//! Entries are JSON files keyed by a hash of the source identity. An entry is
//! used only when its format version and the recorded source modification
//! time both match; anything else is treated as a miss.

use crate::compiler::CompiledTemplate;
use crate::error::{FigError, Result};
use crate::i18n::Dictionary;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

const TEMPLATES_DIR: &str = "templates";
const DICTIONARIES_DIR: &str = "dictionaries";

#[derive(Serialize)]
struct StoredEntry<'a, T> {
    version: u32,
    source: &'a str,
    mtime: u64,
    payload: &'a T,
}

#[derive(Deserialize)]
struct LoadedEntry<T> {
    version: u32,
    source: String,
    mtime: u64,
    payload: T,
}

/// Cache directory handle
#[derive(Debug, Clone)]
pub struct CompileCache {
    dir: PathBuf,
}

impl CompileCache {
    /// Current cache format version
    const VERSION: u32 = 1;

    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn load_template(&self, source: &str, mtime: u64) -> Option<CompiledTemplate> {
        self.load(TEMPLATES_DIR, source, mtime)
    }

    pub fn store_template(&self, template: &CompiledTemplate, mtime: u64) {
        self.store(TEMPLATES_DIR, &template.path, mtime, template);
    }

    /// `key` identifies the dictionary file, language included
    pub fn load_dictionary(&self, key: &str, mtime: u64) -> Option<Dictionary> {
        self.load(DICTIONARIES_DIR, key, mtime)
    }

    pub fn store_dictionary(&self, key: &str, dictionary: &Dictionary, mtime: u64) {
        self.store(DICTIONARIES_DIR, key, mtime, dictionary);
    }

    /// Remove every cached entry
    pub fn clear(&self) -> Result<()> {
        for sub in [TEMPLATES_DIR, DICTIONARIES_DIR] {
            let path = self.dir.join(sub);
            if path.exists() {
                fs::remove_dir_all(&path)?;
            }
        }
        Ok(())
    }

    fn entry_path(&self, kind: &str, source: &str) -> PathBuf {
        self.dir
            .join(kind)
            .join(format!("{:016x}.json", hash_content(source)))
    }

    fn load<T: DeserializeOwned>(&self, kind: &str, source: &str, mtime: u64) -> Option<T> {
        let path = self.entry_path(kind, source);
        let content = fs::read_to_string(&path).ok()?;
        match serde_json::from_str::<LoadedEntry<T>>(&content) {
            Ok(entry)
                if entry.version == Self::VERSION && entry.mtime == mtime && entry.source == source =>
            {
                tracing::debug!("Cache hit for {}", source);
                Some(entry.payload)
            }
            Ok(_) => {
                tracing::debug!("Stale cache entry for {}", source);
                None
            }
            Err(e) => {
                tracing::warn!("Unreadable cache entry {:?}: {}", path, e);
                None
            }
        }
    }

    fn store<T: Serialize>(&self, kind: &str, source: &str, mtime: u64, payload: &T) {
        let entry = StoredEntry {
            version: Self::VERSION,
            source,
            mtime,
            payload,
        };
        if let Err(e) = self.write_entry(kind, source, &entry) {
            tracing::warn!("Failed to write cache entry for {}: {}", source, e);
        }
    }

    fn write_entry<T: Serialize>(&self, kind: &str, source: &str, entry: &StoredEntry<'_, T>) -> Result<()> {
        let path = self.entry_path(kind, source);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string(entry).map_err(|e| FigError::Cache(e.to_string()))?;
        fs::write(&path, content)?;
        tracing::debug!("Cached {} at {:?}", source, path);
        Ok(())
    }
}

/// Calculate a hash for a cache key
pub fn hash_content(content: &str) -> u64 {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    let mut hasher = DefaultHasher::new();
    content.hash(&mut hasher);
    hasher.finish()
}

/// Get file modification time as unix timestamp
pub fn get_mtime(path: &Path) -> Result<u64> {
    let metadata = fs::metadata(path)?;
    let mtime = metadata.modified()?;
    Ok(mtime
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::compile_str;
    use tempfile::TempDir;

    #[test]
    fn test_template_round_trip_through_cache() {
        let dir = TempDir::new().unwrap();
        let cache = CompileCache::new(dir.path());
        let template = compile_str("<a fig:cond=\"/x\">hi</a>", "page.xml", "fig:").unwrap();

        assert!(cache.load_template("page.xml", 10).is_none());
        cache.store_template(&template, 10);
        assert_eq!(cache.load_template("page.xml", 10).unwrap(), template);
        assert!(cache.load_template("page.xml", 11).is_none());
    }

    #[test]
    fn test_dictionary_cache_and_clear() {
        let dir = TempDir::new().unwrap();
        let cache = CompileCache::new(dir.path());
        let mut dictionary = Dictionary::new("messages.xml", "fr");
        dictionary.insert("hello", "bonjour");

        cache.store_dictionary("fr/messages.xml", &dictionary, 5);
        assert_eq!(cache.load_dictionary("fr/messages.xml", 5).unwrap(), dictionary);

        cache.clear().unwrap();
        assert!(cache.load_dictionary("fr/messages.xml", 5).is_none());
    }

    #[test]
    fn test_corrupt_entry_is_a_miss() {
        let dir = TempDir::new().unwrap();
        let cache = CompileCache::new(dir.path());
        let path = cache.entry_path(TEMPLATES_DIR, "x.xml");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "not json").unwrap();
        assert!(cache.load_template("x.xml", 0).is_none());
    }

    #[test]
    fn test_get_mtime() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("a.txt");
        fs::write(&file, "x").unwrap();
        assert!(get_mtime(&file).unwrap() > 0);
        assert!(get_mtime(&dir.path().join("missing")).is_err());
    }
}
