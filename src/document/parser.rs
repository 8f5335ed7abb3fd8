use super::{Document, DocumentParser, Element, Node};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use tracing::debug;

/// Deepest element nesting accepted, the root being depth 1.
pub const MAX_DEPTH: usize = 256;

/// Builds a [`Document`] from XML text with `quick-xml`.
///
/// Anything that is not a single well-formed element tree (mismatched tags,
/// unclosed elements, stray text outside the root, a second root) is reported
/// as unparseable. So is a tree nested deeper than [`MAX_DEPTH`].
#[derive(Debug, Clone, Copy, Default)]
pub struct XmlParser;

impl DocumentParser for XmlParser {
    fn parse(&self, text: &str) -> Option<Document> {
        if text.trim().is_empty() {
            return None;
        }
        match build_tree(text) {
            Ok(doc) => Some(doc),
            Err(reason) => {
                debug!("Response body is not parseable XML: {}", reason);
                None
            }
        }
    }
}

fn build_tree(text: &str) -> Result<Document, String> {
    let mut reader = Reader::from_str(text);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        let event = reader
            .read_event()
            .map_err(|e| format!("at byte {}: {}", reader.buffer_position(), e))?;
        match event {
            Event::Start(start) => {
                check_depth(&stack)?;
                stack.push(open_element(&start)?);
            }
            Event::Empty(start) => {
                check_depth(&stack)?;
                let element = open_element(&start)?;
                close_element(element, &mut stack, &mut root)?;
            }
            Event::End(_) => {
                let element = stack.pop().ok_or("closing tag without an open element")?;
                close_element(element, &mut stack, &mut root)?;
            }
            Event::Text(content) => {
                let text = content.unescape().map_err(|e| e.to_string())?;
                push_text(&mut stack, &text)?;
            }
            Event::CData(content) => {
                let text = String::from_utf8_lossy(&content.into_inner()).into_owned();
                push_text(&mut stack, &text)?;
            }
            Event::Eof => break,
            // declarations, comments, processing instructions and doctypes carry no structure
            _ => {}
        }
    }

    if let Some(open) = stack.last() {
        return Err(format!("unclosed element <{}>", open.name));
    }
    root.map(Document::new).ok_or_else(|| "no root element".to_string())
}

// the tree walkers recurse once per level
fn check_depth(stack: &[Element]) -> Result<(), String> {
    if stack.len() >= MAX_DEPTH {
        return Err(format!("elements nested deeper than {}", MAX_DEPTH));
    }
    Ok(())
}

fn open_element(start: &BytesStart) -> Result<Element, String> {
    let mut element = Element::new(&String::from_utf8_lossy(start.name().as_ref()));
    for attribute in start.attributes() {
        let attribute = attribute.map_err(|e| e.to_string())?;
        let key = String::from_utf8_lossy(attribute.key.as_ref()).into_owned();
        let value = attribute.unescape_value().map_err(|e| e.to_string())?;
        element.attributes.insert(key, value.into_owned());
    }
    Ok(element)
}

fn close_element(
    element: Element,
    stack: &mut [Element],
    root: &mut Option<Element>,
) -> Result<(), String> {
    match stack.last_mut() {
        Some(parent) => {
            parent.children.push(Node::Element(element));
            Ok(())
        }
        None if root.is_none() => {
            *root = Some(element);
            Ok(())
        }
        None => Err(format!("second root element <{}>", element.name)),
    }
}

fn push_text(stack: &mut [Element], text: &str) -> Result<(), String> {
    match stack.last_mut() {
        Some(parent) => {
            // merge adjacent text and CDATA runs
            if let Some(Node::Text(previous)) = parent.children.last_mut() {
                previous.push_str(text);
            } else {
                parent.children.push(Node::Text(text.to_string()));
            }
            Ok(())
        }
        None if text.trim().is_empty() => Ok(()),
        None => Err("text outside of the root element".to_string()),
    }
}
