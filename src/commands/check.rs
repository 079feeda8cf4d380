//! Check dictionary files

use anyhow::Result;
use std::fs;
use std::path::Path;
use walkdir::WalkDir;

use crate::i18n::Dictionary;
use crate::Workspace;

const DICTIONARY_EXTENSIONS: &[&str] = &["xml", "yml", "yaml", "json"];

/// Problems found in a translation folder
#[derive(Debug, Default)]
pub struct CheckReport {
    pub files: usize,
    pub entries: usize,
    /// (file, key)
    pub duplicates: Vec<(String, String)>,
    /// (file, message)
    pub errors: Vec<(String, String)>,
}

impl CheckReport {
    pub fn is_clean(&self) -> bool {
        self.duplicates.is_empty() && self.errors.is_empty()
    }
}

/// Parse every dictionary under `folder` (the translation path by default).
/// Files are expected at `<folder>/<language>/<file>`.
pub fn run(workspace: &Workspace, folder: Option<&Path>) -> Result<CheckReport> {
    let root = folder
        .map(|f| f.to_path_buf())
        .unwrap_or_else(|| workspace.config.translation_path.clone());
    let mut report = CheckReport::default();

    for entry in WalkDir::new(&root)
        .follow_links(true)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        if !path.is_file() || !DICTIONARY_EXTENSIONS.contains(&ext) {
            continue;
        }
        let relative = path.strip_prefix(&root)?;
        let mut components = relative.components();
        let language = components
            .next()
            .and_then(|c| c.as_os_str().to_str())
            .unwrap_or_default()
            .to_string();
        let file = components.as_path().to_string_lossy().replace('\\', "/");
        let shown = relative.display().to_string();
        report.files += 1;

        let parsed = fs::read_to_string(path)
            .map_err(|e| e.to_string())
            .and_then(|text| Dictionary::parse(&text, &file, &language).map_err(|e| e.to_string()));
        match parsed {
            Ok(dictionary) => {
                tracing::debug!("{}: {} entries", shown, dictionary.len());
                report.entries += dictionary.len();
                for key in dictionary.duplicates() {
                    report.duplicates.push((shown.clone(), key.clone()));
                }
            }
            Err(message) => {
                tracing::error!("{}: {}", shown, message);
                report.errors.push((shown, message));
            }
        }
    }
    Ok(report)
}
