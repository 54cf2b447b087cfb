//! Generic XML tree for the bus information API.
//!
//! The upstream envelope changes shape depending on how many results a query
//! produced: `itemList` can be absent, an empty element, a single element or a
//! run of repeated sibling elements. Decoding into a fixed struct would have to
//! special-case every one of those, so responses are decoded into a [`Node`]
//! tree instead and callers walk it with [`Node::path`] and
//! [`Node::as_sequence`].
//!
//! Decoding rules:
//! - the root element's name is dropped, the returned node is its content
//! - an element with only text becomes [`Node::Scalar`]
//! - an element with no content becomes `Scalar("")`
//! - attributes become scalar children of their element
//! - repeated sibling elements with the same name become [`Node::Array`]
//! - text mixed with child elements is kept under the empty key `""`

use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};

static MISSING: Node = Node::Missing;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    /// Result of looking up a path that does not exist
    Missing,
    Scalar(String),
    /// Child elements in document order
    Object(Vec<(String, Node)>),
    Array(Vec<Node>),
}

#[derive(Debug, thiserror::Error)]
#[error("malformed XML: {0}")]
pub struct XmlError(String);

impl Node {
    /// Look up a child by element name, returning [`Node::Missing`] if absent.
    pub fn path(&self, key: &str) -> &Node {
        match self {
            Node::Object(fields) => fields
                .iter()
                .find(|(name, _)| name == key)
                .map(|(_, node)| node)
                .unwrap_or(&MISSING),
            _ => &MISSING,
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Node::Missing)
    }

    /// Lift any node into a sequence of item nodes.
    ///
    /// Missing and scalar nodes carry no items and yield an empty slice, an
    /// object is a single item, an array is returned as is.
    pub fn as_sequence(&self) -> &[Node] {
        match self {
            Node::Missing | Node::Scalar(_) => &[],
            Node::Object(_) => std::slice::from_ref(self),
            Node::Array(items) => items,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Node::Scalar(text) => Some(text),
            _ => None,
        }
    }

    /// Scalar text of the node, or `""` for anything else.
    pub fn text(&self) -> &str {
        self.as_text().unwrap_or_default()
    }
}

impl Serialize for Node {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Node::Missing => serializer.serialize_none(),
            Node::Scalar(text) => serializer.serialize_str(text),
            Node::Object(fields) => {
                let mut map = serializer.serialize_map(Some(fields.len()))?;
                for (name, node) in fields {
                    map.serialize_entry(name, node)?;
                }
                map.end()
            }
            Node::Array(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
        }
    }
}

/// An element that has been opened but not yet closed
struct Frame {
    name: String,
    fields: Vec<(String, Node)>,
    text: String,
}

impl Frame {
    fn open(start: &BytesStart<'_>) -> Result<Self, XmlError> {
        let name = String::from_utf8_lossy(start.local_name().as_ref()).into_owned();
        let mut fields = Vec::new();

        for attr in start.attributes() {
            let attr = attr.map_err(|e| XmlError(e.to_string()))?;
            if attr.key.as_ref().starts_with(b"xmlns") {
                continue;
            }
            let key = String::from_utf8_lossy(attr.key.local_name().as_ref()).into_owned();
            let value = attr
                .unescape_value()
                .map_err(|e| XmlError(e.to_string()))?
                .into_owned();
            insert_field(&mut fields, key, Node::Scalar(value));
        }

        Ok(Self {
            name,
            fields,
            text: String::new(),
        })
    }

    fn close(self) -> (String, Node) {
        let Frame {
            name,
            mut fields,
            text,
        } = self;

        if fields.is_empty() {
            return (name, Node::Scalar(text));
        }
        if !text.is_empty() {
            insert_field(&mut fields, String::new(), Node::Scalar(text));
        }
        (name, Node::Object(fields))
    }
}

/// Add a child, folding repeated names into an array.
fn insert_field(fields: &mut Vec<(String, Node)>, name: String, node: Node) {
    match fields.iter_mut().find(|(existing, _)| *existing == name) {
        Some((_, Node::Array(items))) => items.push(node),
        Some((_, slot)) => {
            let first = std::mem::replace(slot, Node::Missing);
            *slot = Node::Array(vec![first, node]);
        }
        None => fields.push((name, node)),
    }
}

/// Decode an XML document into a [`Node`] tree rooted at the document element's content.
pub fn decode(bytes: &[u8]) -> Result<Node, XmlError> {
    let text = std::str::from_utf8(bytes).map_err(|e| XmlError(e.to_string()))?;

    let mut reader = Reader::from_str(text);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<Frame> = Vec::new();
    let mut root: Option<Node> = None;

    loop {
        let event = reader
            .read_event()
            .map_err(|e| XmlError(format!("at byte {}: {}", reader.buffer_position(), e)))?;

        match event {
            Event::Start(start) => stack.push(Frame::open(&start)?),
            Event::Empty(start) => {
                let element = Frame::open(&start)?.close();
                attach(&mut stack, &mut root, element);
            }
            Event::Text(text) => {
                if let Some(frame) = stack.last_mut() {
                    let unescaped = text.unescape().map_err(|e| XmlError(e.to_string()))?;
                    frame.text.push_str(&unescaped);
                }
            }
            Event::CData(data) => {
                if let Some(frame) = stack.last_mut() {
                    frame.text.push_str(&String::from_utf8_lossy(&data));
                }
            }
            Event::End(_) => {
                let frame = stack
                    .pop()
                    .ok_or_else(|| XmlError("unbalanced closing tag".to_string()))?;
                attach(&mut stack, &mut root, frame.close());
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if let Some(open) = stack.last() {
        return Err(XmlError(format!("unclosed element <{}>", open.name)));
    }

    root.ok_or_else(|| XmlError("document has no root element".to_string()))
}

fn attach(stack: &mut [Frame], root: &mut Option<Node>, (name, node): (String, Node)) {
    match stack.last_mut() {
        Some(parent) => insert_field(&mut parent.fields, name, node),
        // Only the first document element counts
        None if root.is_none() => *root = Some(node),
        None => {}
    }
}
