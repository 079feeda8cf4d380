//! Generic markup tree built from quick-xml events
//!
//! Text and attribute values are kept in their source (escaped) form so that
//! entity references survive to the output untouched.

use crate::error::{FigError, Location, Result};
use quick_xml::events::Event;
use quick_xml::Reader;

/// A parsed element
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    /// Qualified name, prefix included
    pub name: String,
    /// Attributes in document order, raw values
    pub attributes: Vec<(String, String)>,
    pub children: Vec<Node>,
    /// 1-based line of the opening tag
    pub line: usize,
    /// Written as `<name ... />` in the source
    pub self_closing: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Element(Element),
    Text(String),
}

/// A parsed template or dictionary file
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub root: Element,
    /// Processing instructions, as written (`<?target data?>`)
    pub processing_instructions: Vec<String>,
}

impl Element {
    fn new(name: String, attributes: Vec<(String, String)>, line: usize, self_closing: bool) -> Self {
        Self {
            name,
            attributes,
            children: Vec::new(),
            line,
            self_closing,
        }
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Name without its namespace prefix
    pub fn local_name(&self) -> &str {
        self.name
            .split_once(':')
            .map(|(_, local)| local)
            .unwrap_or(&self.name)
    }

    /// Children serialized back to markup
    pub fn inner_markup(&self) -> String {
        let mut out = String::new();
        for child in &self.children {
            write_node(child, &mut out);
        }
        out
    }

    fn push_text(&mut self, text: &str) {
        if let Some(Node::Text(last)) = self.children.last_mut() {
            last.push_str(text);
        } else {
            self.children.push(Node::Text(text.to_string()));
        }
    }
}

fn write_node(node: &Node, out: &mut String) {
    match node {
        Node::Text(text) => out.push_str(text),
        Node::Element(element) => {
            out.push('<');
            out.push_str(&element.name);
            for (key, value) in &element.attributes {
                out.push_str(&format!(" {}=\"{}\"", key, value));
            }
            if element.children.is_empty() && element.self_closing {
                out.push_str("/>");
            } else {
                out.push('>');
                for child in &element.children {
                    write_node(child, out);
                }
                out.push_str(&format!("</{}>", element.name));
            }
        }
    }
}

/// Decode XML entities, keeping the raw text when it holds unknown ones
pub fn unescape(raw: &str) -> String {
    quick_xml::escape::unescape(raw)
        .map(|text| text.into_owned())
        .unwrap_or_else(|_| raw.to_string())
}

/// Tracks line numbers as the reader advances
struct LineCounter<'a> {
    source: &'a str,
    pos: usize,
    line: usize,
}

impl<'a> LineCounter<'a> {
    fn advance_to(&mut self, pos: usize) -> usize {
        let pos = pos.min(self.source.len());
        if pos > self.pos {
            self.line += self.source.as_bytes()[self.pos..pos]
                .iter()
                .filter(|&&b| b == b'\n')
                .count();
            self.pos = pos;
        }
        self.line
    }
}

/// Parse markup text into a document
pub fn parse(source: &str, origin: &str) -> Result<Document> {
    let mut reader = Reader::from_str(source);
    reader.config_mut().trim_text(false);

    let mut lines = LineCounter {
        source,
        pos: 0,
        line: 1,
    };
    let error = |line: usize, message: String| FigError::XmlParse {
        location: Location::new(origin, line),
        message,
    };

    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;
    let mut processing_instructions = Vec::new();

    loop {
        let line = lines.advance_to(reader.buffer_position() as usize);
        let event = reader
            .read_event()
            .map_err(|e| error(line, e.to_string()))?;
        match event {
            Event::Start(ref e) | Event::Empty(ref e) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                let mut attributes = Vec::new();
                for attr in e.attributes() {
                    let attr = attr.map_err(|e| error(line, e.to_string()))?;
                    attributes.push((
                        String::from_utf8_lossy(attr.key.as_ref()).into_owned(),
                        String::from_utf8_lossy(&attr.value).into_owned(),
                    ));
                }
                let self_closing = matches!(event, Event::Empty(_));
                let element = Element::new(name, attributes, line, self_closing);
                if self_closing {
                    close(element, &mut stack, &mut root).map_err(|m| error(line, m))?;
                } else {
                    stack.push(element);
                }
            }
            Event::End(_) => {
                if let Some(element) = stack.pop() {
                    close(element, &mut stack, &mut root).map_err(|m| error(line, m))?;
                }
            }
            Event::Text(e) => {
                let text = e.decode().map_err(|e| error(line, e.to_string()))?;
                append_text(&mut stack, &text).map_err(|m| error(line, m))?;
            }
            Event::GeneralRef(e) => {
                let name = e.decode().map_err(|e| error(line, e.to_string()))?;
                append_text(&mut stack, &format!("&{};", name)).map_err(|m| error(line, m))?;
            }
            Event::CData(e) => {
                let text = String::from_utf8_lossy(e.as_ref()).into_owned();
                append_text(&mut stack, &text).map_err(|m| error(line, m))?;
            }
            Event::PI(e) => {
                let content = String::from_utf8_lossy(e.as_ref()).into_owned();
                processing_instructions.push(format!("<?{}?>", content));
            }
            Event::Eof => break,
            // comments, declaration, doctype
            _ => {}
        }
    }

    if let Some(open) = stack.last() {
        return Err(error(
            lines.line,
            format!("unclosed element <{}> opened at line {}", open.name, open.line),
        ));
    }
    let root = root.ok_or_else(|| error(lines.line, "no root element".to_string()))?;
    tracing::debug!("Parsed markup {} (root <{}>)", origin, root.name);

    Ok(Document {
        root,
        processing_instructions,
    })
}

fn close(
    element: Element,
    stack: &mut [Element],
    root: &mut Option<Element>,
) -> std::result::Result<(), String> {
    match stack.last_mut() {
        Some(parent) => {
            parent.children.push(Node::Element(element));
            Ok(())
        }
        None if root.is_none() => {
            *root = Some(element);
            Ok(())
        }
        None => Err(format!("unexpected second root element <{}>", element.name)),
    }
}

fn append_text(stack: &mut [Element], text: &str) -> std::result::Result<(), String> {
    match stack.last_mut() {
        Some(parent) => {
            parent.push_text(text);
            Ok(())
        }
        None if text.trim().is_empty() => Ok(()),
        None => Err("text outside the root element".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_parse_tree_with_lines() {
        let doc = parse("<html>\n  <body class=\"main\">hi</body>\n  <br/>\n</html>", "t.xml").unwrap();
        assert_eq!(doc.root.name, "html");
        assert_eq!(doc.root.line, 1);
        let elements: Vec<&Element> = doc
            .root
            .children
            .iter()
            .filter_map(|n| match n {
                Node::Element(e) => Some(e),
                Node::Text(_) => None,
            })
            .collect();
        assert_eq!(elements[0].name, "body");
        assert_eq!(elements[0].line, 2);
        assert_eq!(elements[0].attribute("class"), Some("main"));
        assert_eq!(elements[1].line, 3);
        assert!(elements[1].self_closing);
    }

    #[test]
    fn test_entities_are_kept_raw() {
        let doc = parse("<p a=\"x &amp; y\">1 &lt; 2 &nbsp;</p>", "t.xml").unwrap();
        assert_eq!(doc.root.children, vec![Node::Text("1 &lt; 2 &nbsp;".to_string())]);
        assert_eq!(doc.root.attribute("a"), Some("x &amp; y"));
        assert_eq!(unescape("x &amp; y"), "x & y");
        assert_eq!(unescape("&nbsp;"), "&nbsp;");
    }

    #[test]
    fn test_processing_instructions_and_comments() {
        let doc = parse(
            "<?xml version=\"1.0\"?>\n<?render mode=\"fast\"?>\n<r><!-- c -->x</r>",
            "t.xml",
        )
        .unwrap();
        assert_eq!(
            doc.processing_instructions,
            vec!["<?render mode=\"fast\"?>".to_string()]
        );
        assert_eq!(doc.root.children, vec![Node::Text("x".to_string())]);
    }

    #[test]
    fn test_inner_markup() {
        let doc = parse("<entry key=\"k\">Hello <b>you</b><br/></entry>", "t.xml").unwrap();
        assert_eq!(doc.root.inner_markup(), "Hello <b>you</b><br/>");
        assert_eq!(doc.root.local_name(), "entry");
    }

    #[test]
    fn test_errors() {
        let err = parse("<a>\n<b></a>", "bad.xml").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::XmlParse);
        assert!(parse("<a></a><b/>", "bad.xml").is_err());
        assert!(parse("<a>", "bad.xml").is_err());
        assert!(parse("", "bad.xml").is_err());
    }
}
