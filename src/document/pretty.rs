//! Indented rendering of a parsed document.
//!
//! Text-only elements are kept on the same line as their tags. Common
//! prettifiers put such text on its own line with one-space indents, so
//! regexes written against their output may need adjusting here.

use super::{Document, Element, Node};
use quick_xml::escape::escape;

const DECLARATION: &str = r#"<?xml version="1.0" encoding="utf-8"?>"#;
const INDENT: &str = "  ";

impl Document {
    /// Human readable serialization.
    ///
    /// An XML declaration line comes first, then one element per line,
    /// indented by two spaces per level. An element holding only text is
    /// written inline as `<name>Widget</name>`, an element with no children
    /// as `<tag/>`. Text and attribute values are escaped.
    pub fn prettify(&self) -> String {
        let mut out = String::from(DECLARATION);
        out.push('\n');
        write_element(self.root(), 0, &mut out);
        out
    }
}

fn write_element(element: &Element, depth: usize, out: &mut String) {
    let indent = INDENT.repeat(depth);
    out.push_str(&indent);
    out.push('<');
    out.push_str(&element.name);
    for (key, value) in &element.attributes {
        out.push_str(&format!(" {}=\"{}\"", key, escape(value.as_str())));
    }

    if element.children.is_empty() {
        out.push_str("/>\n");
        return;
    }
    out.push('>');

    let text_only = element
        .children
        .iter()
        .all(|child| matches!(child, Node::Text(_)));
    if text_only {
        out.push_str(&escape(element.text().as_str()));
    } else {
        out.push('\n');
        for child in &element.children {
            match child {
                Node::Element(inner) => write_element(inner, depth + 1, out),
                Node::Text(text) => {
                    out.push_str(&INDENT.repeat(depth + 1));
                    out.push_str(&escape(text.as_str()));
                    out.push('\n');
                }
            }
        }
        out.push_str(&indent);
    }
    out.push_str("</");
    out.push_str(&element.name);
    out.push_str(">\n");
}
