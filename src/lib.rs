//! figdice: an XML template language with an embedded expression language
//!
//! Templates are compiled once into an immutable tag tree, then rendered any
//! number of times against a data graph:
//!
//! ```no_run
//! use figdice::{Engine, Value};
//!
//! let engine = Engine::default();
//! let template = engine.compile_str("<p fig:text=\"/name\"/>", "inline.xml").unwrap();
//! let data = Value::from_json(&serde_json::json!({"name": "World"}));
//! assert_eq!(engine.render(&template, data, None).unwrap(), "<p>World</p>");
//! ```

pub mod cache;
pub mod commands;
pub mod compiler;
pub mod config;
pub mod engine;
pub mod error;
pub mod expr;
pub mod feed;
pub mod filter;
pub mod functions;
pub mod i18n;
pub mod loader;
pub mod markup;
pub mod render;
pub mod value;

pub use compiler::CompiledTemplate;
pub use config::EngineConfig;
pub use engine::Engine;
pub use error::{ErrorKind, FigError, Location};
pub use render::Rendered;
pub use value::Value;

use anyhow::Result;
use std::path::{Path, PathBuf};

/// Name of the configuration file looked up in the base directory
pub const CONFIG_FILE: &str = "figdice.yml";

/// A folder of templates and dictionaries, as seen by the command line
pub struct Workspace {
    /// Engine configuration, directories resolved against `base_dir`
    pub config: EngineConfig,
    /// Base directory
    pub base_dir: PathBuf,
    engine: Engine,
}

impl Workspace {
    /// Open a workspace, reading `figdice.yml` (or `config`) when present
    pub fn new<P: AsRef<Path>>(base_dir: P, config: Option<&Path>) -> Result<Self> {
        let base_dir = base_dir.as_ref().to_path_buf();
        let config_path = match config {
            Some(path) => path.to_path_buf(),
            None => base_dir.join(CONFIG_FILE),
        };
        let config = EngineConfig::load(&config_path)?.relative_to(&base_dir);
        Ok(Self::with_config(base_dir, config))
    }

    pub fn with_config<P: AsRef<Path>>(base_dir: P, config: EngineConfig) -> Self {
        let engine = Engine::new(config.clone());
        Self {
            config,
            base_dir: base_dir.as_ref().to_path_buf(),
            engine,
        }
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut Engine {
        &mut self.engine
    }

    /// Render a template to stdout or a file
    pub fn render(
        &self,
        template: &str,
        data: Option<&Path>,
        language: Option<&str>,
        output: Option<&Path>,
    ) -> Result<()> {
        commands::render::run(self, template, data, language, output)
    }

    /// Check the dictionaries of a translation folder
    pub fn check(&self, folder: Option<&Path>) -> Result<commands::check::CheckReport> {
        commands::check::run(self, folder)
    }

    /// Compile every template of a folder
    pub fn compile(&self, folder: Option<&Path>) -> Result<commands::compile::CompileReport> {
        commands::compile::run(self, folder)
    }

    /// Empty the compile cache
    pub fn clean(&self) -> Result<()> {
        commands::clean::run(self)
    }
}
