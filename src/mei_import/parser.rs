//! XML parsing layer for MEI documents
//!
//! This module provides a thin wrapper around roxmltree: document parsing with
//! root validation, and small helpers for walking MEI-namespaced elements.

use crate::mei_import::errors::{MeiError, MeiResult};
use roxmltree::{Document, Node, ParsingOptions};

/// The MEI namespace
pub const MEI_NS: &str = "http://www.music-encoding.org/ns/mei";

/// The XML namespace, home of `xml:id`
pub const XML_NS: &str = "http://www.w3.org/XML/1998/namespace";

// ============================================================================
// XML DOCUMENT WRAPPER
// ============================================================================

/// A parsed document whose root is known to be `<mei>`
pub struct MeiDocument<'input> {
    doc: Document<'input>,
}

impl<'input> MeiDocument<'input> {
    /// Parse and validate the root element
    pub fn parse(xml: &'input str) -> MeiResult<Self> {
        Self::parse_with_limit(xml, u32::MAX)
    }

    /// Parse with a cap on the number of XML nodes
    pub fn parse_with_limit(xml: &'input str, nodes_limit: u32) -> MeiResult<Self> {
        // DTDs are allowed so that a MusicXML file with its DOCTYPE is reported
        // as the wrong kind of document rather than as broken XML
        let mut options = ParsingOptions::default();
        options.allow_dtd = true;
        options.nodes_limit = nodes_limit;

        let doc = Document::parse_with_options(xml, options)
            .map_err(|e| MeiError::InvalidXml(e.to_string()))?;

        let root = doc.root_element();
        if root.tag_name().name() != "mei" || root.tag_name().namespace() != Some(MEI_NS) {
            return Err(MeiError::WrongRootElement(root.tag_name().name().to_string()));
        }

        Ok(MeiDocument { doc })
    }

    /// The `<mei>` element
    pub fn root(&self) -> Node<'_, 'input> {
        self.doc.root_element()
    }

    /// The first `<score>` found under `<music>`
    pub fn music_score(&self) -> Option<Node<'_, 'input>> {
        self.root()
            .descendants()
            .filter(|n| is_tag(*n, "music"))
            .find_map(|music| music.descendants().find(|n| is_tag(*n, "score")))
    }

    /// The `<meiHead>` element, if present
    pub fn head(&self) -> Option<Node<'_, 'input>> {
        get_child(self.root(), "meiHead")
    }
}

// ============================================================================
// ELEMENT HELPERS
// ============================================================================

/// Local name of an MEI-namespaced element
pub fn mei_tag<'a>(node: Node<'a, '_>) -> Option<&'a str> {
    if node.is_element() && node.tag_name().namespace() == Some(MEI_NS) {
        Some(node.tag_name().name())
    } else {
        None
    }
}

/// Whether `node` is the MEI element `<tag>`
pub fn is_tag(node: Node, tag: &str) -> bool {
    mei_tag(node) == Some(tag)
}

/// Immediate element children, in document order
pub fn child_elements<'a, 'input>(node: Node<'a, 'input>) -> impl Iterator<Item = Node<'a, 'input>> {
    node.children().filter(|n| n.is_element())
}

/// First MEI child element with the given tag
pub fn get_child<'a, 'input>(node: Node<'a, 'input>, tag: &str) -> Option<Node<'a, 'input>> {
    node.children().find(|n| is_tag(*n, tag))
}

/// All MEI descendants (excluding `node` itself) with the given tag
pub fn find_descendants<'a, 'input: 'a>(
    node: Node<'a, 'input>,
    tag: &'a str,
) -> impl Iterator<Item = Node<'a, 'input>> + 'a {
    node.descendants().skip(1).filter(move |n| is_tag(*n, tag))
}

/// Concatenated, trimmed text content; `None` when empty
pub fn get_text(node: Node) -> Option<String> {
    let text: String = node
        .descendants()
        .filter(|n| n.is_text())
        .filter_map(|n| n.text())
        .collect();
    let trimmed = text.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// The element's `xml:id`
pub fn xml_id<'a>(node: Node<'a, '_>) -> Option<&'a str> {
    node.attribute((XML_NS, "id"))
}

/// Strip the leading `#` of an id reference
pub fn remove_octothorpe(xmlid: &str) -> &str {
    xmlid.strip_prefix('#').unwrap_or(xmlid)
}

/// Human-readable tag for log messages
pub fn display_tag(node: Node) -> String {
    match node.tag_name().namespace() {
        Some(ns) if ns != MEI_NS => format!("{{{}}}{}", ns, node.tag_name().name()),
        _ => node.tag_name().name().to_string(),
    }
}
