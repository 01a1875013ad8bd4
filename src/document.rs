//! Generic document tree for ESPA XML metadata.
//!
//! The metadata document is parsed into a loosely-typed tree of text, map
//! and list nodes before any schema decoding happens. Attribute and text
//! markers of the XML syntax are normalized away here: attributes become
//! plain-named map entries, element text becomes the node value (or a
//! `text` entry when attributes are also present), and repeated sibling
//! elements are promoted to lists in document order.

use std::fs;
use std::path::Path;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::{EspaError, Result};

/// A single node of the parsed metadata document.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// Scalar text content, from an attribute value or element text.
    Text(String),
    /// Repeated sibling elements, in document order.
    List(Vec<Node>),
    /// Attributes and child elements of one element, in document order.
    Map(NodeMap),
}

impl Node {
    /// The node as a map, if it is one.
    pub fn as_map(&self) -> Option<&NodeMap> {
        match self {
            Node::Map(map) => Some(map),
            _ => None,
        }
    }

    /// Mutable access to the node's map, if it is one.
    pub fn as_map_mut(&mut self) -> Option<&mut NodeMap> {
        match self {
            Node::Map(map) => Some(map),
            _ => None,
        }
    }

    /// The node as a list of elements, if it is one.
    pub fn as_list(&self) -> Option<&[Node]> {
        match self {
            Node::List(items) => Some(items),
            _ => None,
        }
    }

    /// The node's scalar text, if it is one.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Node::Text(text) => Some(text),
            _ => None,
        }
    }
}

/// String-keyed map of child nodes preserving document order.
///
/// Backed by a vector so iteration follows document order; lookups scan
/// linearly, which is fine at metadata scale.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeMap {
    entries: Vec<(String, Node)>,
}

impl NodeMap {
    /// Create an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the map has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Look up an entry by key.
    pub fn get(&self, key: &str) -> Option<&Node> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, node)| node)
    }

    /// Remove and return an entry by key.
    pub fn remove(&mut self, key: &str) -> Option<Node> {
        let index = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(index).1)
    }

    /// Replace an entry's value, or append it when the key is new.
    pub fn set(&mut self, key: impl Into<String>, node: Node) {
        let key = key.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, slot)) => *slot = node,
            None => self.entries.push((key, node)),
        }
    }

    /// Append a child node, promoting repeated keys to a list.
    pub fn push_child(&mut self, key: impl Into<String>, node: Node) {
        let key = key.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, Node::List(items))) => items.push(node),
            Some((_, slot)) => {
                let first = std::mem::replace(slot, Node::List(Vec::new()));
                *slot = Node::List(vec![first, node]);
            }
            None => self.entries.push((key, node)),
        }
    }

    /// Iterate entries in document order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Node)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// Parse a metadata document from a file.
///
/// Returns the root element name alongside its node.
pub fn parse_file(path: &Path) -> Result<(String, Node)> {
    let xml = fs::read_to_string(path)?;
    parse_str(&xml)
}

/// Parse a metadata document from a string.
///
/// Returns the root element name alongside its node.
pub fn parse_str(xml: &str) -> Result<(String, Node)> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    loop {
        match reader.read_event()? {
            Event::Start(start) => {
                let name = element_name(&start);
                let attrs = attribute_entries(&start)?;
                let node = parse_element(&mut reader, attrs, &name)?;
                return Ok((name, node));
            }
            Event::Empty(start) => {
                let name = element_name(&start);
                let node = finalize(attribute_entries(&start)?, String::new());
                return Ok((name, node));
            }
            Event::Eof => {
                return Err(EspaError::schema_mismatch(
                    "document",
                    "no root element found",
                ))
            }
            // Declarations, comments and stray text before the root
            _ => {}
        }
    }
}

/// Parse the contents of one element until its end tag.
fn parse_element(reader: &mut Reader<&[u8]>, mut map: NodeMap, name: &str) -> Result<Node> {
    let mut text = String::new();

    loop {
        match reader.read_event()? {
            Event::Start(start) => {
                let child_name = element_name(&start);
                let attrs = attribute_entries(&start)?;
                let child = parse_element(reader, attrs, &child_name)?;
                map.push_child(child_name, child);
            }
            Event::Empty(start) => {
                let child_name = element_name(&start);
                let child = finalize(attribute_entries(&start)?, String::new());
                map.push_child(child_name, child);
            }
            Event::Text(t) => {
                text.push_str(t.unescape()?.trim());
            }
            Event::End(_) => return Ok(finalize(map, text)),
            Event::Eof => {
                return Err(EspaError::schema_mismatch(
                    "document",
                    format!("unexpected end of input inside `{name}`"),
                ))
            }
            _ => {}
        }
    }
}

/// Collapse attributes, children and text into one node.
///
/// An element with neither attributes nor children is its text; when both
/// are present the text lands under a plain `text` key, mirroring how the
/// source format's `#text` marker is normalized.
fn finalize(map: NodeMap, text: String) -> Node {
    if map.is_empty() {
        Node::Text(text)
    } else if text.is_empty() {
        Node::Map(map)
    } else {
        let mut map = map;
        map.push_child("text", Node::Text(text));
        Node::Map(map)
    }
}

fn element_name(start: &BytesStart<'_>) -> String {
    normalize_key(&String::from_utf8_lossy(start.name().as_ref()))
}

fn attribute_entries(start: &BytesStart<'_>) -> Result<NodeMap> {
    let mut map = NodeMap::new();
    for attr in start.attributes() {
        let attr = attr.map_err(quick_xml::Error::InvalidAttr)?;
        let key = normalize_key(&String::from_utf8_lossy(attr.key.as_ref()));
        let value = attr.unescape_value()?.into_owned();
        map.push_child(key, Node::Text(value));
    }
    Ok(map)
}

/// Strip attribute/text sigil characters from a key.
fn normalize_key(key: &str) -> String {
    key.trim_start_matches(['@', '#']).to_string()
}
