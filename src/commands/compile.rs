//! Compile every template of a folder

use anyhow::Result;
use std::path::Path;
use walkdir::WalkDir;

use crate::Workspace;

/// Outcome of a compile run
#[derive(Debug, Default)]
pub struct CompileReport {
    pub compiled: usize,
    /// (template, message)
    pub failures: Vec<(String, String)>,
}

/// Compile each `.xml` file under `folder` (the template root by default),
/// filling the compile cache when one is configured
pub fn run(workspace: &Workspace, folder: Option<&Path>) -> Result<CompileReport> {
    let engine = workspace.engine();
    let root = workspace.config.template_root.clone();
    let start = folder.map(|f| f.to_path_buf()).unwrap_or_else(|| root.clone());
    if engine.cache().is_none() {
        tracing::warn!("No cache_dir configured, templates are only checked");
    }

    let mut report = CompileReport::default();
    for entry in WalkDir::new(&start)
        .follow_links(true)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();
        if !path.is_file() || path.extension().and_then(|e| e.to_str()) != Some("xml") {
            continue;
        }
        let relative = match path.strip_prefix(&root) {
            Ok(relative) => relative.to_string_lossy().replace('\\', "/"),
            Err(_) => {
                tracing::warn!("Skipping {:?}: outside of the template root", path);
                continue;
            }
        };
        match engine.load(&relative) {
            Ok(_) => {
                tracing::debug!("Compiled {}", relative);
                report.compiled += 1;
            }
            Err(e) => {
                tracing::error!("{}", e);
                report.failures.push((relative, e.to_string()));
            }
        }
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_compile_fills_cache_and_reports_failures() {
        let dir = TempDir::new().unwrap();
        let views = dir.path().join("views");
        fs::create_dir_all(views.join("parts")).unwrap();
        fs::write(views.join("index.xml"), "<html fig:cond=\"true\"/>").unwrap();
        fs::write(views.join("parts/bad.xml"), "<a fig:cond=\"1 +\"/>").unwrap();
        fs::write(views.join("readme.md"), "skip").unwrap();

        let config = EngineConfig {
            template_root: views.clone(),
            cache_dir: Some(dir.path().join("cache")),
            ..Default::default()
        };
        let workspace = Workspace::with_config(dir.path(), config);
        let report = run(&workspace, None).unwrap();
        assert_eq!(report.compiled, 1);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].0, "parts/bad.xml");
        assert!(dir.path().join("cache").join("templates").is_dir());
    }
}
