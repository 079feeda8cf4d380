//! Translation dictionaries
//!
//! A dictionary maps keys to translated strings for one language. Files live
//! under `<translation_path>/<language>/` and may be written as XML
//! (`<fig:entry key="...">value</fig:entry>`), YAML or JSON; nested YAML and
//! JSON maps are flattened into dot-separated keys.

use crate::cache::{self, CompileCache};
use crate::error::{FigError, Result};
use crate::loader;
use crate::markup::{self, Element, Node};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Key → translation table for one language
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dictionary {
    /// File the dictionary was loaded from, relative to its language folder
    pub file: String,
    pub language: String,
    entries: IndexMap<String, String>,
    #[serde(default)]
    duplicates: Vec<String>,
}

impl Dictionary {
    pub fn new(file: &str, language: &str) -> Self {
        Self {
            file: file.to_string(),
            language: language.to_string(),
            ..Default::default()
        }
    }

    /// Add an entry. The first value of a key wins; duplicates are recorded.
    pub fn insert(&mut self, key: &str, value: &str) -> bool {
        if self.entries.contains_key(key) {
            tracing::error!("Duplicate key \"{}\" in dictionary {}", key, self.file);
            self.duplicates.push(key.to_string());
            return false;
        }
        self.entries.insert(key.to_string(), value.to_string());
        true
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(|s| s.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Keys that appeared more than once in the source
    pub fn duplicates(&self) -> &[String] {
        &self.duplicates
    }

    /// Parse dictionary text, choosing the format from the file extension
    pub fn parse(text: &str, file: &str, language: &str) -> Result<Self> {
        let extension = Path::new(file)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("xml");
        match extension {
            "yml" | "yaml" => Self::from_yaml(text, file, language),
            "json" => Self::from_json(text, file, language),
            _ => Self::from_xml(text, file, language),
        }
    }

    pub fn from_xml(text: &str, file: &str, language: &str) -> Result<Self> {
        let document = markup::parse(text, file)?;
        let mut dictionary = Self::new(file, language);
        collect_entries(&document.root, &mut dictionary);
        Ok(dictionary)
    }

    pub fn from_yaml(text: &str, file: &str, language: &str) -> Result<Self> {
        let data: serde_json::Value =
            serde_yaml::from_str(text).map_err(|e| FigError::DictionaryFormat {
                file: file.to_string(),
                message: e.to_string(),
            })?;
        Self::from_tree(&data, file, language)
    }

    pub fn from_json(text: &str, file: &str, language: &str) -> Result<Self> {
        let data: serde_json::Value =
            serde_json::from_str(text).map_err(|e| FigError::DictionaryFormat {
                file: file.to_string(),
                message: e.to_string(),
            })?;
        Self::from_tree(&data, file, language)
    }

    fn from_tree(data: &serde_json::Value, file: &str, language: &str) -> Result<Self> {
        if !data.is_object() && !data.is_null() {
            return Err(FigError::DictionaryFormat {
                file: file.to_string(),
                message: "top level must be a map".to_string(),
            });
        }
        let mut dictionary = Self::new(file, language);
        flatten_translations(data, "", &mut dictionary);
        Ok(dictionary)
    }
}

/// Every `entry` element with a `key`, at any depth
fn collect_entries(element: &Element, dictionary: &mut Dictionary) {
    if element.local_name() == "entry" {
        if let Some(key) = element.attribute("key") {
            dictionary.insert(&markup::unescape(key), &element.inner_markup());
            return;
        }
    }
    for child in &element.children {
        if let Node::Element(child) = child {
            collect_entries(child, dictionary);
        }
    }
}

/// Flatten nested maps into dot-notation keys
fn flatten_translations(value: &serde_json::Value, prefix: &str, dictionary: &mut Dictionary) {
    match value {
        serde_json::Value::Object(map) => {
            for (key, value) in map {
                let full_key = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{}.{}", prefix, key)
                };
                flatten_translations(value, &full_key, dictionary);
            }
        }
        serde_json::Value::String(s) => {
            dictionary.insert(prefix, s);
        }
        serde_json::Value::Number(n) => {
            dictionary.insert(prefix, &n.to_string());
        }
        serde_json::Value::Bool(b) => {
            dictionary.insert(prefix, &b.to_string());
        }
        serde_json::Value::Null => {
            if !prefix.is_empty() {
                dictionary.insert(prefix, "");
            }
        }
        serde_json::Value::Array(_) => {
            tracing::warn!("Ignoring list value for key {} in {}", prefix, dictionary.file);
        }
    }
}

/// Loads dictionary files by language and relative path
pub trait DictionaryLoader: Send + Sync {
    fn load(&self, language: &str, file: &str) -> Result<Dictionary>;
}

/// Reads `<root>/<language>/<file>`, optionally through the compile cache
#[derive(Debug, Clone)]
pub struct FileDictionaryLoader {
    root: PathBuf,
    cache: Option<CompileCache>,
}

impl FileDictionaryLoader {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            cache: None,
        }
    }

    pub fn with_cache(mut self, cache: CompileCache) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl DictionaryLoader for FileDictionaryLoader {
    fn load(&self, language: &str, file: &str) -> Result<Dictionary> {
        let requested = format!("{}/{}", language, file);
        let Some(key) = loader::confine(&requested) else {
            tracing::error!("Dictionary path {} leaves {:?}", requested, self.root);
            return Err(FigError::SourceNotFound {
                location: None,
                path: requested,
            });
        };
        let path = self.root.join(&key);
        if !path.is_file() {
            return Err(FigError::SourceNotFound {
                location: None,
                path: path.display().to_string(),
            });
        }
        let mtime = cache::get_mtime(&path).ok();
        if let (Some(cache), Some(mtime)) = (&self.cache, mtime) {
            if let Some(dictionary) = cache.load_dictionary(&key, mtime) {
                return Ok(dictionary);
            }
        }

        let text = fs::read_to_string(&path)?;
        let dictionary = Dictionary::parse(&text, file, language)?;
        tracing::debug!("Loaded dictionary {:?} ({} entries)", path, dictionary.len());
        if let (Some(cache), Some(mtime)) = (&self.cache, mtime) {
            cache.store_dictionary(&key, &dictionary, mtime);
        }
        Ok(dictionary)
    }
}

/// In-memory dictionaries keyed by (language, file)
#[derive(Debug, Clone, Default)]
pub struct MemoryDictionaryLoader {
    dictionaries: HashMap<(String, String), Dictionary>,
}

impl MemoryDictionaryLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, dictionary: Dictionary) -> &mut Self {
        self.dictionaries.insert(
            (dictionary.language.clone(), dictionary.file.clone()),
            dictionary,
        );
        self
    }

    /// Parse and add a dictionary from source text
    pub fn insert_source(&mut self, language: &str, file: &str, text: &str) -> Result<&mut Self> {
        let dictionary = Dictionary::parse(text, file, language)?;
        Ok(self.insert(dictionary))
    }
}

impl DictionaryLoader for MemoryDictionaryLoader {
    fn load(&self, language: &str, file: &str) -> Result<Dictionary> {
        self.dictionaries
            .get(&(language.to_string(), file.to_string()))
            .cloned()
            .ok_or_else(|| FigError::SourceNotFound {
                location: None,
                path: format!("{}/{}", language, file),
            })
    }
}
