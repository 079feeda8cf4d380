//! Clean the compile cache

use anyhow::Result;

use crate::Workspace;

/// Remove every cached template and dictionary
pub fn run(workspace: &Workspace) -> Result<()> {
    let Some(cache) = workspace.engine().cache().cloned() else {
        tracing::info!("No cache_dir configured, nothing to clean");
        return Ok(());
    };
    cache.clear()?;
    tracing::info!("Deleted: {:?}", cache.dir());
    Ok(())
}
