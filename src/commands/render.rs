//! Render a template to stdout or a file

use anyhow::{bail, Context, Result};
use std::fs;
use std::io::Write;
use std::path::Path;

use crate::value::Value;
use crate::Workspace;

/// Render `template` (relative to the template root) against a data file
pub fn run(
    workspace: &Workspace,
    template: &str,
    data: Option<&Path>,
    language: Option<&str>,
    output: Option<&Path>,
) -> Result<()> {
    let data = match data {
        Some(path) => load_data(path)?,
        None => Value::Null,
    };
    let engine = workspace.engine();
    let compiled = engine.load(template)?;
    let rendered = engine.render_with_report(&compiled, data, language)?;
    for warning in &rendered.warnings {
        tracing::warn!("{}", warning);
    }

    match output {
        Some(path) => {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(path, &rendered.output)?;
            tracing::info!("Rendered {} to {:?}", template, path);
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(rendered.output.as_bytes())?;
            stdout.flush()?;
        }
    }
    Ok(())
}

/// Read template data from a JSON or YAML file
pub fn load_data(path: &Path) -> Result<Value> {
    let content =
        fs::read_to_string(path).with_context(|| format!("Failed to read data file {:?}", path))?;
    let json: serde_json::Value = match path.extension().and_then(|e| e.to_str()) {
        Some("json") => serde_json::from_str(&content)?,
        Some("yml") | Some("yaml") => serde_yaml::from_str(&content)?,
        _ => bail!("Unsupported data file {:?} (expected .json, .yml or .yaml)", path),
    };
    Ok(Value::from_json(&json))
}
