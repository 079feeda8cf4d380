//! Compiled tag tree

use crate::expr::{self, Expr, SyntaxError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};

/// An expression attribute, kept with its source text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Directive {
    pub source: String,
    pub expr: Expr,
}

/// Control attributes of a tag
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Directives {
    pub walk: Option<Directive>,
    pub cond: Option<Directive>,
    pub text: Option<Directive>,
    pub mute: Option<Directive>,
    pub void: Option<Directive>,
    pub auto: Option<Directive>,
    pub append: Option<Directive>,
    pub macro_name: Option<String>,
    pub call: Option<String>,
    pub slot: Option<String>,
    pub plug: Option<String>,
    pub filter: Option<String>,
}

/// What a tag does when rendered
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TagKind {
    /// Plain markup element
    Element,
    /// Control-namespace wrapper with no behavior of its own; never emitted
    Control,
    Include {
        file: String,
    },
    CData {
        file: String,
    },
    Attr {
        name: String,
        value: Option<Directive>,
    },
    Param {
        name: String,
        value: Option<Directive>,
    },
    Feed {
        class: String,
        target: Option<String>,
    },
    Dictionary {
        file: String,
        name: Option<String>,
        source: Option<String>,
    },
    Mount {
        target: String,
        value: Option<Directive>,
    },
    Trans {
        key: Option<String>,
        dict: Option<String>,
        source: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tag {
    /// Pre-order index within the template
    pub id: usize,
    pub name: String,
    pub line: usize,
    pub kind: TagKind,
    /// Plain attributes, raw values
    pub attributes: Vec<(String, String)>,
    pub directives: Directives,
    pub children: Vec<Node>,
    pub self_closing: bool,
    /// Whitespace re-emitted before every iteration after the first
    pub indent: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Node {
    Tag(Tag),
    Text(String),
}

impl Tag {
    /// Depth-first search by id
    pub fn find(&self, id: usize) -> Option<&Tag> {
        if self.id == id {
            return Some(self);
        }
        // Ids are assigned in pre-order, so the subtree holding `id` is the
        // last child whose id does not exceed it.
        let mut candidate = None;
        for child in &self.children {
            if let Node::Tag(tag) = child {
                if tag.id > id {
                    break;
                }
                candidate = Some(tag);
            }
        }
        candidate.and_then(|tag| tag.find(id))
    }

    /// Child tags, text runs skipped
    pub fn child_tags(&self) -> impl Iterator<Item = &Tag> {
        self.children.iter().filter_map(|child| match child {
            Node::Tag(tag) => Some(tag),
            Node::Text(_) => None,
        })
    }

    /// Whether the tag has no children besides whitespace
    pub fn is_blank(&self) -> bool {
        self.children.iter().all(|child| match child {
            Node::Text(text) => text.trim().is_empty(),
            Node::Tag(_) => false,
        })
    }
}

/// Parsed ad-hoc expressions, shared by every render of one template
#[derive(Default)]
pub struct ExpressionCache {
    entries: Mutex<HashMap<String, Arc<Expr>>>,
}

impl ExpressionCache {
    pub fn get_or_parse(&self, source: &str) -> Result<Arc<Expr>, SyntaxError> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(expr) = entries.get(source) {
            return Ok(Arc::clone(expr));
        }
        let expr = Arc::new(expr::parse(source)?);
        entries.insert(source.to_string(), Arc::clone(&expr));
        Ok(expr)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for ExpressionCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ExpressionCache({} entries)", self.len())
    }
}

/// The unit of caching: one template, compiled
#[derive(Debug, Serialize, Deserialize)]
pub struct CompiledTemplate {
    /// Normalized template path
    pub path: String,
    /// Control namespace prefix, colon included
    pub namespace: String,
    pub root: Tag,
    pub processing_instructions: Vec<String>,
    #[serde(skip)]
    pub(crate) expressions: ExpressionCache,
}

impl CompiledTemplate {
    pub fn find(&self, id: usize) -> Option<&Tag> {
        self.root.find(id)
    }

    /// Parse (or fetch) an expression found in a plain attribute
    pub fn expression(&self, source: &str) -> Result<Arc<Expr>, SyntaxError> {
        self.expressions.get_or_parse(source)
    }
}

impl PartialEq for CompiledTemplate {
    fn eq(&self, other: &Self) -> bool {
        self.path == other.path
            && self.namespace == other.namespace
            && self.root == other.root
            && self.processing_instructions == other.processing_instructions
    }
}
