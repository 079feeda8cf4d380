//! Template compiler
//!
//! Turns a parsed markup tree into an immutable [`CompiledTemplate`]. Control
//! tags are dispatched by name, control attributes become typed
//! [`Directives`], and every directive expression is parsed up front so that
//! malformed templates fail here rather than halfway through a render.

mod tag;

pub use tag::{CompiledTemplate, Directive, Directives, ExpressionCache, Node, Tag, TagKind};

use crate::error::{FigError, Location, Result};
use crate::expr;
use crate::markup::{self, Document, Element};

/// Marker looked for in `xmlns:` declarations to override the control prefix
const NAMESPACE_MARKER: &str = "figdice";

/// Compile a parsed document
pub fn compile(document: &Document, path: &str, default_namespace: &str) -> Result<CompiledTemplate> {
    let declared = declared_namespace(&document.root);
    let namespace = declared
        .clone()
        .unwrap_or_else(|| default_namespace.to_string());

    let mut compiler = Compiler {
        path,
        namespace,
        declaration: declared.map(|prefix| format!("xmlns:{}", prefix.trim_end_matches(':'))),
        next_id: 0,
    };
    let root = compiler.compile_element(&document.root, None)?;
    tracing::debug!("Compiled {} ({} tags)", path, compiler.next_id);

    Ok(CompiledTemplate {
        path: path.to_string(),
        namespace: compiler.namespace,
        root,
        processing_instructions: document.processing_instructions.clone(),
        expressions: ExpressionCache::default(),
    })
}

/// Parse and compile markup text
pub fn compile_str(source: &str, path: &str, default_namespace: &str) -> Result<CompiledTemplate> {
    let document = markup::parse(source, path)?;
    compile(&document, path, default_namespace)
}

/// `xmlns:x="...figdice..."` on the root element sets the prefix to `x:`
fn declared_namespace(root: &Element) -> Option<String> {
    root.attributes.iter().find_map(|(key, value)| {
        key.strip_prefix("xmlns:")
            .filter(|_| value.contains(NAMESPACE_MARKER))
            .map(|prefix| format!("{}:", prefix))
    })
}

struct Compiler<'a> {
    path: &'a str,
    namespace: String,
    /// Namespace declaration attribute, removed from the output
    declaration: Option<String>,
    next_id: usize,
}

impl<'a> Compiler<'a> {
    fn location(&self, line: usize) -> Location {
        Location::new(self.path, line)
    }

    fn compile_element(&mut self, element: &Element, indent: Option<String>) -> Result<Tag> {
        let id = self.next_id;
        self.next_id += 1;
        let line = element.line;

        let mut plain = Vec::new();
        let mut control = Vec::new();
        for (key, value) in &element.attributes {
            if Some(key) == self.declaration.as_ref() {
                continue;
            }
            match key.strip_prefix(self.namespace.as_str()) {
                Some(directive) => control.push((directive.to_string(), markup::unescape(value))),
                None => plain.push((key.clone(), value.clone())),
            }
        }

        let directives = self.directives(control, line)?;
        let kind = match element.name.strip_prefix(self.namespace.as_str()) {
            Some(suffix) => self.control_kind(suffix, element, &mut plain)?,
            None => TagKind::Element,
        };

        let mut children = Vec::with_capacity(element.children.len());
        for child in &element.children {
            match child {
                markup::Node::Text(text) => children.push(Node::Text(text.clone())),
                markup::Node::Element(child) => {
                    let indent = match children.last() {
                        Some(Node::Text(text)) => trailing_indent(text),
                        _ => None,
                    };
                    children.push(Node::Tag(self.compile_element(child, indent)?));
                }
            }
        }

        let tag = Tag {
            id,
            name: element.name.clone(),
            line,
            kind,
            attributes: plain,
            indent: indent.filter(|_| directives.walk.is_some()),
            directives,
            children,
            self_closing: element.self_closing,
        };
        self.validate(&tag)?;
        Ok(tag)
    }

    fn directive(&self, source: String, line: usize) -> Result<Directive> {
        match expr::parse(&source) {
            Ok(expr) => Ok(Directive { source, expr }),
            Err(e) => Err(FigError::Syntax {
                location: self.location(line),
                expression: source,
                offset: e.offset,
                message: e.message,
            }),
        }
    }

    fn directives(&self, control: Vec<(String, String)>, line: usize) -> Result<Directives> {
        let mut directives = Directives::default();
        for (name, value) in control {
            match name.as_str() {
                "walk" => directives.walk = Some(self.directive(value, line)?),
                "cond" => directives.cond = Some(self.directive(value, line)?),
                "text" => directives.text = Some(self.directive(value, line)?),
                "mute" => directives.mute = Some(self.directive(value, line)?),
                "void" => directives.void = Some(self.directive(value, line)?),
                "auto" => directives.auto = Some(self.directive(value, line)?),
                "append" => directives.append = Some(self.directive(value, line)?),
                "macro" => directives.macro_name = Some(value),
                "call" => directives.call = Some(value),
                "slot" => directives.slot = Some(value),
                "plug" => directives.plug = Some(value),
                "filter" => directives.filter = Some(value),
                other => tracing::warn!(
                    "Ignoring unknown attribute {}{} at {}",
                    self.namespace,
                    other,
                    self.location(line)
                ),
            }
        }
        Ok(directives)
    }

    fn control_kind(
        &self,
        suffix: &str,
        element: &Element,
        plain: &mut Vec<(String, String)>,
    ) -> Result<TagKind> {
        let line = element.line;
        let kind = match suffix {
            "include" => TagKind::Include {
                file: self.required(element, plain, "file")?,
            },
            "cdata" => TagKind::CData {
                file: self.required(element, plain, "file")?,
            },
            "attr" => TagKind::Attr {
                name: self.required(element, plain, "name")?,
                value: self.optional_directive(plain, "value", line)?,
            },
            "param" => TagKind::Param {
                name: self.required(element, plain, "name")?,
                value: self.optional_directive(plain, "value", line)?,
            },
            "feed" => TagKind::Feed {
                class: self.required(element, plain, "class")?,
                target: take_attribute(plain, "target"),
            },
            "dictionary" => TagKind::Dictionary {
                file: self.required(element, plain, "file")?,
                name: take_attribute(plain, "name"),
                source: take_attribute(plain, "source"),
            },
            "mount" => TagKind::Mount {
                target: self.required(element, plain, "target")?,
                value: self.optional_directive(plain, "value", line)?,
            },
            "trans" => TagKind::Trans {
                key: take_attribute(plain, "key"),
                dict: take_attribute(plain, "dict"),
                source: take_attribute(plain, "source"),
            },
            _ => TagKind::Control,
        };
        Ok(kind)
    }

    fn required(
        &self,
        element: &Element,
        plain: &mut Vec<(String, String)>,
        attribute: &str,
    ) -> Result<String> {
        take_attribute(plain, attribute).ok_or_else(|| FigError::RequiredAttribute {
            location: self.location(element.line),
            tag: element.name.clone(),
            attribute: attribute.to_string(),
        })
    }

    fn optional_directive(
        &self,
        plain: &mut Vec<(String, String)>,
        attribute: &str,
        line: usize,
    ) -> Result<Option<Directive>> {
        take_attribute(plain, attribute)
            .map(|source| self.directive(source, line))
            .transpose()
    }

    fn validate(&self, tag: &Tag) -> Result<()> {
        let d = &tag.directives;
        let conflict = if d.walk.is_some() && d.macro_name.is_some() {
            Some("walk and macro")
        } else if d.macro_name.is_some() && d.call.is_some() {
            Some("macro and call")
        } else if d.slot.is_some() && d.plug.is_some() {
            Some("slot and plug")
        } else {
            None
        };
        if let Some(pair) = conflict {
            return Err(FigError::Validation {
                location: self.location(tag.line),
                message: format!("<{}> cannot combine {}", tag.name, pair),
            });
        }
        if d.append.is_some() && d.plug.is_none() {
            tracing::warn!(
                "{}append without {}plug is ignored at {}",
                self.namespace,
                self.namespace,
                self.location(tag.line)
            );
        }
        Ok(())
    }
}

/// Remove an attribute, returning its unescaped value
fn take_attribute(plain: &mut Vec<(String, String)>, name: &str) -> Option<String> {
    let index = plain.iter().position(|(key, _)| key == name)?;
    let (_, value) = plain.remove(index);
    Some(markup::unescape(&value))
}

/// Whitespace after the last line break of a text run, line break included
fn trailing_indent(text: &str) -> Option<String> {
    let tail = match text.rfind('\n') {
        Some(index) => &text[index..],
        None => text,
    };
    if !tail.is_empty() && tail.trim().is_empty() {
        Some(tail.to_string())
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn compile_text(source: &str) -> Result<CompiledTemplate> {
        compile_str(source, "test.xml", "fig:")
    }

    #[test]
    fn test_classifies_tags_and_attributes() {
        let template = compile_text(
            "<html fig:cond=\"true\" lang=\"en\"><fig:include file=\"a.xml\"/><fig:x/></html>",
        )
        .unwrap();
        let root = &template.root;
        assert_eq!(root.kind, TagKind::Element);
        assert_eq!(root.attributes, vec![("lang".to_string(), "en".to_string())]);
        assert_eq!(root.directives.cond.as_ref().unwrap().source, "true");
        let kinds: Vec<&TagKind> = root.child_tags().map(|t| &t.kind).collect();
        assert_eq!(
            kinds,
            vec![
                &TagKind::Include {
                    file: "a.xml".to_string()
                },
                &TagKind::Control,
            ]
        );
    }

    #[test]
    fn test_declared_namespace_overrides_default() {
        let template = compile_text(
            "<html xmlns:t=\"http://www.figdice.org/\"><t:trans key=\"k\" who=\"/n\"/></html>",
        )
        .unwrap();
        assert_eq!(template.namespace, "t:");
        assert!(template.root.attributes.is_empty());
        let trans = template.root.child_tags().next().unwrap();
        assert_eq!(
            trans.kind,
            TagKind::Trans {
                key: Some("k".to_string()),
                dict: None,
                source: None,
            }
        );
        assert_eq!(trans.attributes, vec![("who".to_string(), "/n".to_string())]);
    }

    #[test]
    fn test_required_attributes() {
        for source in [
            "<fig:include/>",
            "<fig:cdata/>",
            "<fig:dictionary/>",
            "<fig:feed target=\"x\"/>",
            "<fig:mount value=\"1\"/>",
            "<fig:attr value=\"1\"/>",
            "<fig:param/>",
        ] {
            let err = compile_text(source).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::RequiredAttribute, "{}", source);
        }
    }

    #[test]
    fn test_directive_conflicts() {
        for source in [
            "<a fig:walk=\"/x\" fig:macro=\"m\"/>",
            "<a fig:macro=\"m\" fig:call=\"m\"/>",
            "<a fig:slot=\"s\" fig:plug=\"s\"/>",
        ] {
            let err = compile_text(source).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Validation, "{}", source);
        }
    }

    #[test]
    fn test_syntax_error_location() {
        let err = compile_text("<a>\n  <b fig:cond=\"1 +\"/>\n</a>").unwrap_err();
        match err {
            FigError::Syntax {
                location, offset, ..
            } => {
                assert_eq!(location, Location::new("test.xml", 2));
                assert_eq!(offset, 3);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_directive_values_are_unescaped() {
        let template = compile_text("<a fig:cond=\"/x &lt; 2\"/>").unwrap();
        assert_eq!(template.root.directives.cond.as_ref().unwrap().source, "/x < 2");
    }

    #[test]
    fn test_indent_is_captured_for_walked_tags() {
        let template =
            compile_text("<ul>\n  <li fig:walk=\"/items\"/>\n  <li/>\n</ul>").unwrap();
        let tags: Vec<&Tag> = template.root.child_tags().collect();
        assert_eq!(tags[0].indent.as_deref(), Some("\n  "));
        assert_eq!(tags[1].indent, None);
    }

    #[test]
    fn test_ids_and_find() {
        let template = compile_text("<a><b><c/></b><d fig:macro=\"m\"/></a>").unwrap();
        assert_eq!(template.find(2).unwrap().name, "c");
        assert_eq!(template.find(3).unwrap().name, "d");
        assert!(template.find(4).is_none());
    }

    #[test]
    fn test_compilation_is_deterministic() {
        let source = "<a fig:walk=\"/x\">\n <b title=\"{.}\" fig:text=\"position()\"/>\n</a>";
        let first = compile_text(source).unwrap();
        let second = compile_text(source).unwrap();
        assert_eq!(first, second);

        let json = serde_json::to_string(&first).unwrap();
        let restored: CompiledTemplate = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, first);
    }

    #[test]
    fn test_expression_cache() {
        let template = compile_text("<a/>").unwrap();
        let first = template.expression("1 + 1").unwrap();
        let second = template.expression("1 + 1").unwrap();
        assert!(std::sync::Arc::ptr_eq(&first, &second));
        assert_eq!(template.expressions.len(), 1);
    }
}
