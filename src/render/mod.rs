//! Renderer
//!
//! Walks a compiled tag tree against a data graph and produces text. One
//! [`Renderer`] is one render session: the scope stack, the iteration stack,
//! macros, slots, plugs and dictionaries are shared by the root template and
//! every template it includes, and are discarded when the render finishes.
//!
//! Directives are applied in a fixed order on each tag: `walk`, `cond`,
//! `macro`, `call`, `slot`, then the tag's own rendering, then `plug`.

mod iteration;
mod views;

pub use iteration::Iteration;

use crate::compiler::{CompiledTemplate, Directive, Node, Tag, TagKind};
use crate::engine::Engine;
use crate::error::{FigError, Location, Result};
use crate::expr::{Environment, Expr};
use crate::functions::{Anchor, FigFunction};
use crate::markup;
use crate::value::{html_escape, Value};
use indexmap::IndexMap;
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashMap;
use std::sync::Arc;
use views::{Lookup, Views};

lazy_static! {
    /// `{expression}` runs inside plain attribute values
    static ref AD_HOC: Regex = Regex::new(r"\{([^\{]+)\}").unwrap();
    /// `{name}` placeholders inside translations
    static ref PLACEHOLDER: Regex = Regex::new(r"\{([^}]+)\}").unwrap();
    static ref LINE_BREAKS: Regex = Regex::new(r"[\n\r\t]+").unwrap();
}

/// Result of a render, with the recoverable problems met along the way
#[derive(Debug)]
pub struct Rendered {
    pub output: String,
    pub warnings: Vec<FigError>,
}

fn slot_begin(name: &str) -> String {
    format!("/==SLOT=={}==BEGIN/", name)
}

fn slot_end(name: &str) -> String {
    format!("/==SLOT=={}==END/", name)
}

/// Directives switched off for one rendering of a tag
#[derive(Debug, Clone, Copy, Default)]
struct Suppress {
    walk: bool,
    macro_definition: bool,
}

/// One render session
pub struct Renderer<'e> {
    engine: &'e Engine,
    language: Option<String>,
    /// Data scope frames; index 0 is the root data
    scopes: Vec<Value>,
    views: Views,
    iterations: Vec<Iteration>,
    /// Macro name → (view, tag id)
    macros: HashMap<String, (usize, usize)>,
    /// Slot names, once per occurrence
    slots: Vec<String>,
    plugs: HashMap<String, String>,
    functions: HashMap<String, Arc<dyn FigFunction>>,
    /// Feed class → index of the factory that handled it
    feed_classes: HashMap<String, usize>,
    warnings: Vec<FigError>,
}

impl<'e> Renderer<'e> {
    pub fn new(engine: &'e Engine, data: Value, language: Option<&str>) -> Self {
        let root = match data {
            Value::Null => Value::Object(IndexMap::new()),
            other => other,
        };
        Self {
            engine,
            language: language.map(|l| l.to_string()),
            scopes: vec![root],
            views: Views::default(),
            iterations: Vec::new(),
            macros: HashMap::new(),
            slots: Vec::new(),
            plugs: HashMap::new(),
            functions: HashMap::new(),
            feed_classes: HashMap::new(),
            warnings: Vec::new(),
        }
    }

    /// Render a root template
    pub fn render(mut self, template: Arc<CompiledTemplate>) -> Result<Rendered> {
        tracing::debug!("Rendering {} (language: {:?})", template.path, self.language);
        let view = self.views.push(Arc::clone(&template), None);
        let body = self.render_view(view)?;
        let body = self.splice(body);

        let mut output = String::new();
        for instruction in &template.processing_instructions {
            output.push_str(instruction);
            output.push('\n');
        }
        output.push_str(&body);
        Ok(Rendered {
            output,
            warnings: self.warnings,
        })
    }

    /// Evaluate an expression against the session data, outside of any template
    pub fn evaluate_expression(&mut self, expr: &Expr) -> Result<Value> {
        self.evaluate(expr, 0, 1)
    }

    fn render_view(&mut self, view: usize) -> Result<String> {
        let template = self.views.template(view);
        Ok(self
            .render_tag(&template.root, view, Suppress::default())?
            .unwrap_or_default())
    }

    /// Replace slot markers with plugged content, or drop them
    fn splice(&self, mut document: String) -> String {
        for name in &self.slots {
            let begin = slot_begin(name);
            let end = slot_end(name);
            match self.plugs.get(name) {
                Some(content) => {
                    let Some(start) = document.find(&begin) else {
                        continue;
                    };
                    let stop = match document[start..].find(&end) {
                        Some(offset) => start + offset + end.len(),
                        None => continue,
                    };
                    document.replace_range(start..stop, content);
                }
                None => {
                    document = document.replace(&begin, "").replace(&end, "");
                }
            }
        }
        document
    }

    // ========================================================================
    // Expressions
    // ========================================================================

    fn location(&self, view: usize, line: usize) -> Location {
        Location::new(self.views.path(view), line)
    }

    fn evaluate(&mut self, expr: &Expr, view: usize, line: usize) -> Result<Value> {
        let mut env = Evaluator {
            renderer: self,
            view,
            line,
        };
        expr.evaluate(&mut env)
    }

    /// Evaluate expression text found in a plain attribute
    fn evaluate_source(&mut self, source: &str, view: usize, line: usize) -> Result<Value> {
        let template = self.views.template(view);
        let expr = template
            .expression(source)
            .map_err(|e| FigError::Syntax {
                location: self.location(view, line),
                expression: source.to_string(),
                offset: e.offset,
                message: e.message,
            })?;
        self.evaluate(&expr, view, line)
    }

    fn flag(&mut self, directive: &Option<Directive>, view: usize, line: usize) -> Result<bool> {
        match directive {
            Some(directive) => Ok(self.evaluate(&directive.expr, view, line)?.is_truthy()),
            None => Ok(false),
        }
    }

    fn text(&self, value: &Value, view: usize, line: usize) -> Result<String> {
        value.to_text().ok_or_else(|| FigError::ArrayToString {
            location: self.location(view, line),
        })
    }

    fn resolve_function(&mut self, name: &str, location: &Location) -> Result<Arc<dyn FigFunction>> {
        if let Some(function) = self.functions.get(name) {
            return Ok(Arc::clone(function));
        }
        let function = self
            .engine
            .function_factories()
            .find_map(|factory| factory.create(name))
            .ok_or_else(|| FigError::FunctionNotFound {
                location: location.clone(),
                name: name.to_string(),
            })?;
        self.functions.insert(name.to_string(), Arc::clone(&function));
        Ok(function)
    }

    fn lookup(&self, name: &str) -> Value {
        match name {
            "/" => self.scopes.first().cloned().unwrap_or_default(),
            "." => self.scopes.last().cloned().unwrap_or_default(),
            ".." => {
                let depth = self.scopes.len();
                if depth >= 2 {
                    self.scopes[depth - 2].clone()
                } else {
                    Value::Null
                }
            }
            _ => self
                .scopes
                .iter()
                .rev()
                .find_map(|scope| match scope {
                    Value::Object(map) => map.get(name).cloned(),
                    Value::Opaque(object) => object.get(name),
                    _ => None,
                })
                .unwrap_or_default(),
        }
    }

    /// Write a value under a root scope key
    fn mount(&mut self, target: &str, value: Value) {
        if !matches!(self.scopes[0], Value::Object(_)) {
            self.scopes[0] = Value::Object(IndexMap::new());
        }
        if let Value::Object(root) = &mut self.scopes[0] {
            root.insert(target.to_string(), value);
        }
    }

    // ========================================================================
    // Directives
    // ========================================================================

    /// Render one tag. `None` means the tag produced nothing at its position
    /// (failed condition, or content handed to a plug).
    fn render_tag(&mut self, tag: &Tag, view: usize, suppress: Suppress) -> Result<Option<String>> {
        let d = &tag.directives;
        if let Some(walk) = d.walk.as_ref().filter(|_| !suppress.walk) {
            return self.walk(tag, walk, view, suppress).map(Some);
        }

        if !self.condition(tag, view)? {
            return Ok(None);
        }

        if let Some(name) = d.macro_name.as_ref().filter(|_| !suppress.macro_definition) {
            tracing::debug!("Defining macro {} at {}", name, self.location(view, tag.line));
            self.macros.insert(name.clone(), (view, tag.id));
            return Ok(Some(String::new()));
        }

        if let Some(name) = &d.call {
            return self.call_macro(tag, name, view).map(Some);
        }

        let mut output = String::new();
        if let Some(slot) = &d.slot {
            self.slots.push(slot.clone());
            output.push_str(&slot_begin(slot));
        }

        output.push_str(&self.render_kind(tag, view)?);

        if let Some(slot) = &d.slot {
            output.push_str(&slot_end(slot));
        } else if let Some(plug) = &d.plug {
            let append = self.flag(&d.append, view, tag.line)?;
            match self.plugs.get_mut(plug) {
                Some(existing) if append => existing.push_str(&output),
                _ => {
                    self.plugs.insert(plug.clone(), output);
                }
            }
            return Ok(None);
        }
        Ok(Some(output))
    }

    fn condition(&mut self, tag: &Tag, view: usize) -> Result<bool> {
        match &tag.directives.cond {
            Some(cond) => Ok(self.evaluate(&cond.expr, view, tag.line)?.is_truthy()),
            None => Ok(true),
        }
    }

    fn walk(&mut self, tag: &Tag, walk: &Directive, view: usize, suppress: Suppress) -> Result<String> {
        let items: Vec<(Value, Value)> = match self.evaluate(&walk.expr, view, tag.line)? {
            Value::Null => return Ok(String::new()),
            Value::Array(items) => items
                .into_iter()
                .enumerate()
                .map(|(index, item)| (Value::from(index), item))
                .collect(),
            Value::Object(map) => map
                .into_iter()
                .map(|(key, item)| (Value::String(key), item))
                .collect(),
            scalar => vec![(Value::Int(0), scalar)],
        };

        let suppress = Suppress {
            walk: true,
            ..suppress
        };
        self.iterations.push(Iteration::new(items.len()));
        let mut output = String::new();
        let mut first = true;
        for (key, item) in items {
            if let Some(iteration) = self.iterations.last_mut() {
                iteration.advance(key);
            }
            self.scopes.push(item);
            let fragment = self.render_tag(tag, view, suppress)?;
            self.scopes.pop();

            let Some(fragment) = fragment.filter(|f| !f.is_empty()) else {
                continue;
            };
            if !first {
                if let Some(indent) = &tag.indent {
                    output.push_str(indent);
                }
            }
            first = false;
            output.push_str(&fragment);
        }
        self.iterations.pop();
        Ok(output)
    }

    fn call_macro(&mut self, tag: &Tag, name: &str, view: usize) -> Result<String> {
        let mut arguments = IndexMap::new();
        for (key, source) in &tag.attributes {
            let value = self.evaluate_source(&markup::unescape(source), view, tag.line)?;
            arguments.insert(key.clone(), value);
        }
        arguments.extend(self.parameters(tag, view)?);

        let Some(&(macro_view, id)) = self.macros.get(name) else {
            let location = self.location(view, tag.line);
            tracing::warn!("Macro not found: {} ({})", name, location);
            self.warnings.push(FigError::MacroNotFound {
                location,
                name: name.to_string(),
            });
            return Ok(String::new());
        };
        let template = self.views.template(macro_view);
        let Some(body) = template.find(id) else {
            return Ok(String::new());
        };

        self.scopes.push(Value::Object(arguments));
        // The macro body must not see the caller's loops as its own.
        let outer = std::mem::take(&mut self.iterations);
        let suppress = Suppress {
            walk: false,
            macro_definition: true,
        };
        let output = self.render_tag(body, macro_view, suppress)?;
        self.iterations = outer;
        self.scopes.pop();
        Ok(output.unwrap_or_default())
    }

    /// `fig:param` children, evaluated
    fn parameters(&mut self, tag: &Tag, view: usize) -> Result<IndexMap<String, Value>> {
        let mut parameters = IndexMap::new();
        for child in tag.child_tags() {
            let TagKind::Param { name, value } = &child.kind else {
                continue;
            };
            if !self.condition(child, view)? {
                continue;
            }
            let value = match value {
                Some(directive) => self.evaluate(&directive.expr, view, child.line)?,
                None => {
                    let text = self.render_children(child, view)?;
                    Value::String(LINE_BREAKS.replace_all(&text, " ").trim().to_string())
                }
            };
            parameters.insert(name.clone(), value);
        }
        Ok(parameters)
    }

    // ========================================================================
    // Tag kinds
    // ========================================================================

    fn render_kind(&mut self, tag: &Tag, view: usize) -> Result<String> {
        match &tag.kind {
            TagKind::Element | TagKind::Control => self.render_element(tag, view),
            TagKind::Include { file } => self.include(tag, file, view),
            TagKind::CData { file } => self.cdata(tag, file, view),
            // Consumed by their parent
            TagKind::Attr { .. } | TagKind::Param { .. } => Ok(String::new()),
            TagKind::Feed { class, target } => {
                self.feed(tag, class, target.as_deref(), view)?;
                Ok(String::new())
            }
            TagKind::Dictionary { file, name, source } => {
                self.dictionary(tag, file, name.as_deref(), source.as_deref(), view)?;
                Ok(String::new())
            }
            TagKind::Mount { target, value } => {
                let value = match value {
                    Some(directive) => self.evaluate(&directive.expr, view, tag.line)?,
                    None => Value::String(self.render_children(tag, view)?),
                };
                self.mount(target, value);
                Ok(String::new())
            }
            TagKind::Trans { key, dict, source } => {
                self.translate(tag, key.as_deref(), dict.as_deref(), source.as_deref(), view)
            }
        }
    }

    fn render_children(&mut self, tag: &Tag, view: usize) -> Result<String> {
        let mut output = String::new();
        for child in &tag.children {
            match child {
                Node::Text(text) => output.push_str(text),
                Node::Tag(child) => {
                    if matches!(child.kind, TagKind::Attr { .. } | TagKind::Param { .. }) {
                        continue;
                    }
                    if let Some(fragment) = self.render_tag(child, view, Suppress::default())? {
                        output.push_str(&fragment);
                    }
                }
            }
        }
        Ok(output)
    }

    fn render_element(&mut self, tag: &Tag, view: usize) -> Result<String> {
        let d = &tag.directives;
        let muted = tag.kind == TagKind::Control || self.flag(&d.mute, view, tag.line)?;

        let mut output = String::new();
        if !muted {
            output.push('<');
            output.push_str(&tag.name);
            for (name, value) in self.attributes(tag, view)? {
                output.push_str(&format!(" {}=\"{}\"", name, value));
            }
        }

        let mut content = match &d.text {
            Some(text) => {
                let value = self.evaluate(&text.expr, view, tag.line)?;
                self.text(&value, view, tag.line)?
            }
            None => self.render_children(tag, view)?,
        };
        if let Some(name) = &d.filter {
            content = self.filter(name, &content, view, tag.line)?;
        }

        if muted {
            output.push_str(&content);
        } else if self.flag(&d.void, view, tag.line)? {
            output.push('>');
        } else if content.is_empty() && (tag.self_closing || self.flag(&d.auto, view, tag.line)?) {
            output.push_str(" />");
        } else if content.is_empty() {
            output.push_str(&format!("></{}>", tag.name));
        } else {
            output.push('>');
            output.push_str(&content);
            output.push_str(&format!("</{}>", tag.name));
        }
        Ok(output)
    }

    /// Plain attributes after interpolation, overridden by `fig:attr` children
    fn attributes(&mut self, tag: &Tag, view: usize) -> Result<IndexMap<String, String>> {
        let mut attributes = IndexMap::new();
        for (name, raw) in &tag.attributes {
            let value = self.ad_hoc(raw, view, tag.line)?;
            attributes.insert(name.clone(), value);
        }
        for child in tag.child_tags() {
            let TagKind::Attr { name, value } = &child.kind else {
                continue;
            };
            if !self.condition(child, view)? {
                continue;
            }
            let value = match value {
                Some(directive) => {
                    let value = self.evaluate(&directive.expr, view, child.line)?;
                    self.text(&value, view, child.line)?
                }
                None => match &child.directives.text {
                    Some(text) => {
                        let value = self.evaluate(&text.expr, view, child.line)?;
                        self.text(&value, view, child.line)?
                    }
                    None => self.render_children(child, view)?,
                },
            };
            attributes.insert(name.clone(), value);
        }
        Ok(attributes)
    }

    /// Substitute every `{expression}` run of an attribute value
    fn ad_hoc(&mut self, raw: &str, view: usize, line: usize) -> Result<String> {
        let mut replacements = Vec::new();
        for captures in AD_HOC.captures_iter(raw) {
            let (Some(whole), Some(inner)) = (captures.get(0), captures.get(1)) else {
                continue;
            };
            let value = self.evaluate_source(&markup::unescape(inner.as_str()), view, line)?;
            let text = self.text(&value, view, line)?;
            replacements.push((whole.range(), html_escape(&text)));
        }
        let mut value = raw.to_string();
        for (range, text) in replacements.into_iter().rev() {
            value.replace_range(range, &text);
        }
        Ok(value)
    }

    fn filter(&mut self, name: &str, content: &str, view: usize, line: usize) -> Result<String> {
        let filter = self
            .engine
            .filter_factories()
            .find_map(|factory| factory.create(name))
            .ok_or_else(|| FigError::FilterNotFound {
                location: self.location(view, line),
                name: name.to_string(),
            })?;
        Ok(filter.transform(content))
    }

    fn include(&mut self, tag: &Tag, file: &str, view: usize) -> Result<String> {
        let path = self.engine.source().resolve(self.views.path(view), file);
        let location = self.location(view, tag.line);
        tracing::debug!("Including {} from {}", path, location);
        let template = self
            .engine
            .load(&path)
            .map_err(|e| with_location(e, &location))?;
        let child = self.views.push(template, Some(view));
        self.render_view(child)
    }

    fn cdata(&mut self, tag: &Tag, file: &str, view: usize) -> Result<String> {
        let source = self.engine.source();
        let path = source.resolve(self.views.path(view), file);
        let location = self.location(view, tag.line);
        source
            .read(&path)
            .map(|source| source.text)
            .map_err(|e| with_location(e, &location))
    }

    fn feed(&mut self, tag: &Tag, class: &str, target: Option<&str>, view: usize) -> Result<()> {
        let mut parameters = IndexMap::new();
        for (key, source) in &tag.attributes {
            let value = self.evaluate_source(&markup::unescape(source), view, tag.line)?;
            parameters.insert(key.clone(), value);
        }

        let engine = self.engine;
        let factories: Vec<_> = engine.feed_factories().collect();
        let feed = match self.feed_classes.get(class) {
            Some(&index) => factories[index].create(class, &parameters),
            None => factories.iter().enumerate().find_map(|(index, factory)| {
                let feed = factory.create(class, &parameters)?;
                self.feed_classes.insert(class.to_string(), index);
                Some(feed)
            }),
        };
        let location = self.location(view, tag.line);
        let mut feed = feed.ok_or_else(|| FigError::FeedClassNotFound {
            location: location.clone(),
            class: class.to_string(),
        })?;

        feed.set_parameters(parameters);
        let result = feed.run().map_err(|e| FigError::Feed {
            location,
            class: class.to_string(),
            message: e.to_string(),
        })?;
        if let Some(target) = target {
            self.mount(target, result);
        }
        Ok(())
    }

    fn dictionary(
        &mut self,
        tag: &Tag,
        file: &str,
        name: Option<&str>,
        source: Option<&str>,
        view: usize,
    ) -> Result<()> {
        let Some(language) = self.language.clone() else {
            return Ok(());
        };
        if source == Some(language.as_str()) {
            return Ok(());
        }
        let location = self.location(view, tag.line);
        let dictionary = self
            .engine
            .dictionaries()
            .load(&language, file)
            .map_err(|e| with_location(e, &location))?;
        for key in dictionary.duplicates() {
            self.warnings.push(FigError::DictionaryDuplicateKey {
                file: dictionary.file.clone(),
                key: key.clone(),
            });
        }
        tracing::debug!("Attaching dictionary {} ({:?}) at {}", file, name, location);
        self.views.attach(view, name, Arc::new(dictionary));
        Ok(())
    }

    fn translate(
        &mut self,
        tag: &Tag,
        key: Option<&str>,
        dict: Option<&str>,
        source: Option<&str>,
        view: usize,
    ) -> Result<String> {
        let location = self.location(view, tag.line);
        let (key, value) = if source == self.language.as_deref() {
            (key.unwrap_or_default().to_string(), self.render_children(tag, view)?)
        } else {
            let key = match key {
                Some(key) => key.to_string(),
                None => self.render_children(tag, view)?,
            };
            match self.views.translate(view, &key, dict) {
                Lookup::Found(value) => (key, value),
                Lookup::MissingEntry => {
                    tracing::error!(
                        "Translation not found: key={}, dictionary={:?}, language={:?} ({})",
                        key,
                        dict,
                        self.language,
                        location
                    );
                    self.warnings.push(FigError::DictionaryEntryNotFound {
                        location,
                        key: key.clone(),
                    });
                    return Ok(key);
                }
                Lookup::MissingDictionary => {
                    return Err(FigError::DictionaryNotFound {
                        location,
                        name: dict.unwrap_or_default().to_string(),
                    })
                }
            }
        };

        let value = self.fill_placeholders(tag, &value, view)?;
        if value.is_empty() {
            tracing::error!("Empty translation: key={} ({})", key, location);
            self.warnings.push(FigError::EmptyTranslation {
                location,
                key: key.clone(),
            });
            return Ok(key);
        }
        Ok(value)
    }

    /// `{name}` from `fig:param` children first, then from plain attributes
    fn fill_placeholders(&mut self, tag: &Tag, value: &str, view: usize) -> Result<String> {
        if !PLACEHOLDER.is_match(value) {
            return Ok(value.to_string());
        }
        let parameters = self.parameters(tag, view)?;
        let mut replacements: HashMap<String, String> = HashMap::new();
        for captures in PLACEHOLDER.captures_iter(value) {
            let name = &captures[1];
            if replacements.contains_key(name) {
                continue;
            }
            let text = match parameters.get(name) {
                Some(value) => self.text(value, view, tag.line)?,
                None => match tag.attributes.iter().find(|(key, _)| key == name) {
                    Some((_, source)) => {
                        let value =
                            self.evaluate_source(&markup::unescape(source), view, tag.line)?;
                        self.text(&value, view, tag.line)?
                    }
                    None => String::new(),
                },
            };
            replacements.insert(name.to_string(), text);
        }
        Ok(PLACEHOLDER
            .replace_all(value, |captures: &regex::Captures| {
                replacements.get(&captures[1]).cloned().unwrap_or_default()
            })
            .into_owned())
    }
}

/// Attach the including tag's location to a missing-source error
fn with_location(error: FigError, location: &Location) -> FigError {
    match error {
        FigError::SourceNotFound { location: None, path } => FigError::SourceNotFound {
            location: Some(location.clone()),
            path,
        },
        other => other,
    }
}

/// Expression environment bound to one tag of one view
struct Evaluator<'r, 'e> {
    renderer: &'r mut Renderer<'e>,
    view: usize,
    line: usize,
}

impl Environment for Evaluator<'_, '_> {
    fn lookup(&self, name: &str) -> Value {
        self.renderer.lookup(name)
    }

    fn call(&mut self, name: &str, args: Vec<Value>) -> Result<Value> {
        let location = self.location();
        let function = self.renderer.resolve_function(name, &location)?;
        let empty = Iteration::default();
        let renderer = &*self.renderer;
        let anchor = Anchor {
            location,
            iteration: renderer.iterations.last().unwrap_or(&empty),
            language: renderer.language.as_deref(),
            constants: renderer.engine.constants(),
        };
        function.evaluate(&anchor, args.len(), &args)
    }

    fn location(&self) -> Location {
        self.renderer.location(self.view, self.line)
    }
}
