//! Template engine
//!
//! The [`Engine`] owns everything that outlives a single render: where
//! templates and dictionaries come from, the registered function, feed and
//! filter factories, constants, and the compiled templates seen so far. It is
//! `Sync`, so one engine can serve renders on several threads at once; each
//! render gets its own [`Renderer`].

use crate::cache::CompileCache;
use crate::compiler::{self, CompiledTemplate};
use crate::config::EngineConfig;
use crate::error::{FigError, Result};
use crate::expr;
use crate::feed::FeedFactory;
use crate::filter::FilterFactory;
use crate::functions::{FunctionFactory, NativeFunctionFactory};
use crate::i18n::{DictionaryLoader, FileDictionaryLoader};
use crate::loader::{self, FileSystemSource, TemplateSource};
use crate::render::{Rendered, Renderer};
use crate::value::Value;
use indexmap::IndexMap;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Compiles, caches and renders templates
pub struct Engine {
    config: EngineConfig,
    source: Arc<dyn TemplateSource>,
    dictionaries: Arc<dyn DictionaryLoader>,
    /// Most recently registered first; the native factory stays last
    functions: Vec<Arc<dyn FunctionFactory>>,
    feeds: Vec<Arc<dyn FeedFactory>>,
    filters: Vec<Arc<dyn FilterFactory>>,
    constants: IndexMap<String, Value>,
    cache: Option<CompileCache>,
    /// Path → (modification time, compiled template)
    templates: RwLock<HashMap<String, (u64, Arc<CompiledTemplate>)>>,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl Engine {
    /// Engine reading templates and dictionaries from the configured folders
    pub fn new(config: EngineConfig) -> Self {
        let cache = config.cache_dir.as_ref().map(CompileCache::new);
        let mut dictionaries = FileDictionaryLoader::new(&config.translation_path);
        if let Some(cache) = &cache {
            dictionaries = dictionaries.with_cache(cache.clone());
        }
        let constants = config
            .constants
            .iter()
            .map(|(name, value)| (name.clone(), Value::from_json(value)))
            .collect();
        Self {
            source: Arc::new(FileSystemSource::new(&config.template_root)),
            dictionaries: Arc::new(dictionaries),
            functions: vec![Arc::new(NativeFunctionFactory) as Arc<dyn FunctionFactory>],
            feeds: Vec::new(),
            filters: Vec::new(),
            constants,
            cache,
            templates: RwLock::new(HashMap::new()),
            config,
        }
    }

    /// Replace the template source
    pub fn with_source<S: TemplateSource + 'static>(mut self, source: S) -> Self {
        self.source = Arc::new(source);
        self.clear();
        self
    }

    /// Replace the dictionary loader
    pub fn with_dictionaries<L: DictionaryLoader + 'static>(mut self, loader: L) -> Self {
        self.dictionaries = Arc::new(loader);
        self
    }

    pub fn register_function_factory<F: FunctionFactory + 'static>(&mut self, factory: F) -> &mut Self {
        self.functions.insert(0, Arc::new(factory));
        self
    }

    pub fn register_feed_factory<F: FeedFactory + 'static>(&mut self, factory: F) -> &mut Self {
        self.feeds.insert(0, Arc::new(factory));
        self
    }

    pub fn register_filter_factory<F: FilterFactory + 'static>(&mut self, factory: F) -> &mut Self {
        self.filters.insert(0, Arc::new(factory));
        self
    }

    /// Define a constant readable through `const(name)`
    pub fn set_constant<V: Into<Value>>(&mut self, name: &str, value: V) -> &mut Self {
        self.constants.insert(name.to_string(), value.into());
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn source(&self) -> &dyn TemplateSource {
        self.source.as_ref()
    }

    pub fn dictionaries(&self) -> &dyn DictionaryLoader {
        self.dictionaries.as_ref()
    }

    pub fn constants(&self) -> &IndexMap<String, Value> {
        &self.constants
    }

    pub fn cache(&self) -> Option<&CompileCache> {
        self.cache.as_ref()
    }

    /// User factories first, built-in functions last
    pub(crate) fn function_factories(&self) -> impl Iterator<Item = &Arc<dyn FunctionFactory>> {
        self.functions.iter()
    }

    pub(crate) fn feed_factories(&self) -> impl Iterator<Item = &Arc<dyn FeedFactory>> {
        self.feeds.iter()
    }

    pub(crate) fn filter_factories(&self) -> impl Iterator<Item = &Arc<dyn FilterFactory>> {
        self.filters.iter()
    }

    /// Forget every template compiled so far
    pub fn clear(&self) {
        self.templates
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }

    // ========================================================================
    // Compilation
    // ========================================================================

    /// Compile template text that does not come from the source
    pub fn compile_str(&self, text: &str, path: &str) -> Result<Arc<CompiledTemplate>> {
        let template = compiler::compile_str(text, path, &self.config.namespace)?;
        Ok(Arc::new(template))
    }

    /// Load a template by path, compiling it only when it changed
    pub fn load(&self, path: &str) -> Result<Arc<CompiledTemplate>> {
        let path = loader::normalize(path);
        let modified = self.source.modified(&path)?;

        if let Some((mtime, template)) = self
            .templates
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&path)
        {
            if *mtime == modified {
                return Ok(Arc::clone(template));
            }
        }

        let template = match self.cache.as_ref().and_then(|c| c.load_template(&path, modified)) {
            Some(template) => template,
            None => {
                let source = self.source.read(&path)?;
                tracing::debug!("Compiling {}", path);
                let template = compiler::compile_str(&source.text, &path, &self.config.namespace)?;
                if let Some(cache) = &self.cache {
                    cache.store_template(&template, source.modified);
                }
                template
            }
        };

        let template = Arc::new(template);
        self.templates
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(path, (modified, Arc::clone(&template)));
        Ok(template)
    }

    // ========================================================================
    // Rendering
    // ========================================================================

    /// Render a compiled template. `language` falls back to the configured one.
    pub fn render(&self, template: &Arc<CompiledTemplate>, data: Value, language: Option<&str>) -> Result<String> {
        self.render_with_report(template, data, language)
            .map(|rendered| rendered.output)
    }

    /// Render, keeping the recoverable problems met along the way
    pub fn render_with_report(
        &self,
        template: &Arc<CompiledTemplate>,
        data: Value,
        language: Option<&str>,
    ) -> Result<Rendered> {
        let language = language.or(self.config.language.as_deref());
        let rendered = Renderer::new(self, data, language).render(Arc::clone(template))?;
        if !rendered.warnings.is_empty() {
            tracing::info!(
                "Rendered {} with {} warning(s)",
                template.path,
                rendered.warnings.len()
            );
        }
        Ok(rendered)
    }

    /// Load and render a template by path
    pub fn render_file(&self, path: &str, data: Value, language: Option<&str>) -> Result<String> {
        let template = self.load(path)?;
        self.render(&template, data, language)
    }

    /// Evaluate a standalone expression against `data`
    pub fn evaluate_str(&self, expression: &str, data: Value) -> Result<Value> {
        let expr = expr::parse(expression).map_err(|e| FigError::Syntax {
            location: Default::default(),
            expression: expression.to_string(),
            offset: e.offset,
            message: e.message,
        })?;
        Renderer::new(self, data, self.config.language.as_deref()).evaluate_expression(&expr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::functions::{Anchor, FunctionMap};
    use crate::loader::MemorySource;
    use tempfile::TempDir;

    #[test]
    fn test_evaluate_str() {
        let engine = Engine::default();
        let data = Value::from_json(&serde_json::json!({"a": 2, "b": "x"}));
        assert_eq!(engine.evaluate_str("/a * 3", data.clone()).unwrap(), Value::Int(6));
        assert_eq!(engine.evaluate_str("b + a", data.clone()).unwrap(), Value::from("x2"));
        assert_eq!(
            engine.evaluate_str("1 +", data).unwrap_err().kind(),
            ErrorKind::Syntax
        );
    }

    #[test]
    fn test_user_functions_shadow_native_ones() {
        let mut engine = Engine::default();
        let mut functions = FunctionMap::new();
        functions.insert("count", answer);
        engine.register_function_factory(functions);
        assert_eq!(engine.evaluate_str("count(/x)", Value::Null).unwrap(), Value::Int(42));
        assert_eq!(
            engine.evaluate_str("nope()", Value::Null).unwrap_err().kind(),
            ErrorKind::FunctionNotFound
        );
    }

    #[test]
    fn test_load_memoizes_until_source_changes() {
        let source = Arc::new(MemorySource::new().with("page.xml", "<a>1</a>"));
        let engine = Engine::default().with_source(SharedSource(Arc::clone(&source)));

        let first = engine.load("page.xml").unwrap();
        let again = engine.load("./page.xml").unwrap();
        assert!(Arc::ptr_eq(&first, &again));

        source.insert("page.xml", "<a>2</a>");
        let changed = engine.load("page.xml").unwrap();
        assert!(!Arc::ptr_eq(&first, &changed));
        assert_eq!(engine.render(&changed, Value::Null, None).unwrap(), "<a>2</a>");
    }

    #[test]
    fn test_load_through_disk_cache() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("page.xml"), "<p fig:text=\"/n\"/>").unwrap();
        let config = EngineConfig {
            template_root: dir.path().to_path_buf(),
            cache_dir: Some(dir.path().join("cache")),
            ..Default::default()
        };

        let engine = Engine::new(config.clone());
        let compiled = engine.load("page.xml").unwrap();
        assert!(dir.path().join("cache").join("templates").is_dir());

        let fresh = Engine::new(config);
        let cached = fresh.load("page.xml").unwrap();
        assert_eq!(*cached, *compiled);
        let data = Value::from_json(&serde_json::json!({"n": 5}));
        assert_eq!(fresh.render(&cached, data, None).unwrap(), "<p>5</p>");
    }

    #[test]
    fn test_missing_template() {
        let engine = Engine::default().with_source(MemorySource::new());
        let err = engine.load("nope.xml").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SourceNotFound);
    }

    fn answer(_: &Anchor<'_>, _: usize, _: &[Value]) -> Result<Value> {
        Ok(Value::Int(42))
    }

    /// Lets a test keep a handle on the source it gave to the engine
    struct SharedSource(Arc<MemorySource>);

    impl TemplateSource for SharedSource {
        fn read(&self, path: &str) -> Result<crate::loader::Source> {
            self.0.read(path)
        }
    }
}
