//! Engine configuration (figdice.yml)

use anyhow::Result;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Control prefix used when a template declares none
    pub namespace: String,
    /// Directory template paths are resolved against
    pub template_root: PathBuf,
    /// Dictionaries live in `<translation_path>/<language>/`
    pub translation_path: PathBuf,
    /// Default target language
    pub language: Option<String>,
    /// Enables the on-disk compile cache
    pub cache_dir: Option<PathBuf>,
    /// Values exposed to templates through `const(name)`
    pub constants: IndexMap<String, serde_json::Value>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            namespace: "fig:".to_string(),
            template_root: PathBuf::from("."),
            translation_path: PathBuf::from("lang"),
            language: None,
            cache_dir: None,
            constants: IndexMap::new(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from a YAML file. A missing file yields the defaults.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::debug!("No config at {:?}, using defaults", path);
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)?;
        let mut config: EngineConfig = serde_yaml::from_str(&content)?;
        if !config.namespace.ends_with(':') {
            config.namespace.push(':');
        }
        tracing::debug!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// Resolve relative directories against `base`
    pub fn relative_to<P: AsRef<Path>>(mut self, base: P) -> Self {
        let base = base.as_ref();
        for dir in [&mut self.template_root, &mut self.translation_path] {
            if dir.is_relative() {
                *dir = base.join(&*dir);
            }
        }
        if let Some(dir) = self.cache_dir.as_mut() {
            if dir.is_relative() {
                *dir = base.join(&*dir);
            }
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let config = EngineConfig::load(dir.path().join("figdice.yml")).unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.namespace, "fig:");
    }

    #[test]
    fn test_partial_config() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("figdice.yml");
        fs::write(
            &path,
            "namespace: tpl\nlanguage: fr\ncache_dir: .cache\nconstants:\n  SITE: Demo\n",
        )
        .unwrap();
        let config = EngineConfig::load(&path).unwrap().relative_to(dir.path());
        assert_eq!(config.namespace, "tpl:");
        assert_eq!(config.language.as_deref(), Some("fr"));
        assert_eq!(config.translation_path, dir.path().join("lang"));
        assert_eq!(config.cache_dir, Some(dir.path().join(".cache")));
        assert_eq!(config.constants["SITE"], serde_json::json!("Demo"));
    }
}
