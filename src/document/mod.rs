//! Typed markup tree that response bodies are parsed into.
//!
//! Validators never look at raw text except through [`Document::prettify`];
//! everything structural goes through the traversal helpers here.

mod parser;
mod pretty;

pub use parser::{XmlParser, MAX_DEPTH};

use indexmap::IndexMap;

/// Turns response text into a [`Document`].
///
/// Implementations must not panic on malformed input; `None` means the text
/// could not be parsed (or was empty).
pub trait DocumentParser: Send + Sync {
    fn parse(&self, text: &str) -> Option<Document>;
}

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Element(Element),
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Element {
    pub name: String,
    pub attributes: IndexMap<String, String>,
    pub children: Vec<Node>,
}

impl Element {
    pub fn new(name: &str) -> Self {
        Element {
            name: name.to_string(),
            ..Default::default()
        }
    }

    /// Name without any namespace prefix.
    pub fn local_name(&self) -> &str {
        self.name
            .rsplit_once(':')
            .map_or(self.name.as_str(), |(_, local)| local)
    }

    /// True if `name` is either the qualified or the local name of this element.
    pub fn has_name(&self, name: &str) -> bool {
        self.name == name || self.local_name() == name
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    pub fn child_elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|node| match node {
            Node::Element(element) => Some(element),
            Node::Text(_) => None,
        })
    }

    /// This element and everything below it, in document order.
    pub fn descendants(&self) -> Descendants<'_> {
        Descendants { stack: vec![self] }
    }

    /// Concatenated text of this element and all of its descendants.
    pub fn text(&self) -> String {
        let mut out = String::new();
        collect_text(self, &mut out);
        out
    }
}

fn collect_text(element: &Element, out: &mut String) {
    for child in &element.children {
        match child {
            Node::Text(text) => out.push_str(text),
            Node::Element(inner) => collect_text(inner, out),
        }
    }
}

/// Pre-order walk over an element subtree.
pub struct Descendants<'a> {
    stack: Vec<&'a Element>,
}

impl<'a> Iterator for Descendants<'a> {
    type Item = &'a Element;

    fn next(&mut self) -> Option<Self::Item> {
        let element = self.stack.pop()?;
        let children: Vec<&Element> = element.child_elements().collect();
        self.stack.extend(children.into_iter().rev());
        Some(element)
    }
}

/// A parsed response body with a single root element.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    root: Element,
}

impl Document {
    pub fn new(root: Element) -> Self {
        Document { root }
    }

    pub fn root(&self) -> &Element {
        &self.root
    }

    /// Every element of the document, root first.
    pub fn elements(&self) -> Descendants<'_> {
        self.root.descendants()
    }

    pub fn find(&self, name: &str) -> Option<&Element> {
        self.elements().find(|element| element.has_name(name))
    }
}
