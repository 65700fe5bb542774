//! OAI-PMH record parsing for the `arXiv` metadata format.
//!
//! A harvested `<record>` carries an OAI `<header>` and a `<metadata>` payload
//! whose `<arXiv>` block holds the paper fields. Mirrors and snapshots are not
//! consistent about namespacing the payload, so every field is looked up in
//! three tiers:
//!
//! 1. a direct child in the arXiv namespace,
//! 2. a direct child with no namespace,
//! 3. the first descendant with that local name, in any namespace.
//!
//! A record that yields no identifier is rejected with `None`; this is the
//! normal outcome for malformed entries and is not an error.

use crate::models::NormalizedDocument;
use crate::xml::Element;

/// OAI-PMH 2.0 envelope namespace.
pub const OAI_NS: &str = "http://www.openarchives.org/OAI/2.0/";
/// arXiv metadata format namespace.
pub const ARXIV_NS: &str = "http://arxiv.org/OAI/arXiv/";

/// One `<record>` element as returned by the endpoint.
#[derive(Debug, Clone)]
pub struct RawRecord {
    element: Element,
}

impl RawRecord {
    pub fn new(element: Element) -> Self {
        Self { element }
    }

    pub fn element(&self) -> &Element {
        &self.element
    }

    /// True when the OAI header marks this record as a deletion tombstone.
    pub fn is_deleted(&self) -> bool {
        self.header()
            .and_then(|h| h.attr("status"))
            .is_some_and(|s| s == "deleted")
    }

    /// The OAI header identifier (`oai:arXiv.org:...`), for diagnostics.
    pub fn identifier(&self) -> Option<&str> {
        self.header()
            .and_then(|h| h.child_ns(OAI_NS, "identifier"))
            .and_then(Element::text)
    }

    fn header(&self) -> Option<&Element> {
        self.element
            .child_ns(OAI_NS, "header")
            .or_else(|| self.element.find_ns(OAI_NS, "header"))
    }
}

/// Parse a record into a [`NormalizedDocument`], or `None` when no usable
/// identifier can be found.
pub fn parse_record(record: &RawRecord) -> Option<NormalizedDocument> {
    let metadata = record.element().find_ns(OAI_NS, "metadata")?;
    let arxiv = metadata
        .child_ns(ARXIV_NS, "arXiv")
        .or_else(|| metadata.find_local("arXiv"))
        .unwrap_or(metadata);

    let id = field_text(arxiv, "id").map(strip_version_suffix)?;
    if id.is_empty() {
        return None;
    }

    let categories = field_text(arxiv, "categories")
        .map(|c| c.split_whitespace().map(str::to_string).collect())
        .unwrap_or_default();

    let authors = first(arxiv, "authors")
        .map(|list| {
            all(list, "author")
                .into_iter()
                .filter_map(author_name)
                .collect()
        })
        .unwrap_or_default();

    Some(NormalizedDocument {
        id: id.to_string(),
        title: field_text(arxiv, "title").unwrap_or_default().to_string(),
        authors,
        abstract_text: field_text(arxiv, "abstract").unwrap_or_default().to_string(),
        categories,
        created: field_text(arxiv, "created").unwrap_or_default().to_string(),
    })
}

/// Three-tier lookup: namespaced child, bare child, then subtree scan.
fn first<'a>(el: &'a Element, tag: &str) -> Option<&'a Element> {
    el.child_ns(ARXIV_NS, tag)
        .or_else(|| el.child_bare(tag))
        .or_else(|| el.find_local(tag))
}

/// Namespaced children if any exist, else every descendant with that local name.
fn all<'a>(el: &'a Element, tag: &str) -> Vec<&'a Element> {
    let found = el.children_ns(ARXIV_NS, tag);
    if !found.is_empty() {
        return found;
    }
    el.descendants().filter(|c| c.name == tag).collect()
}

fn field_text<'a>(el: &'a Element, tag: &str) -> Option<&'a str> {
    first(el, tag).and_then(Element::text)
}

/// `"{forenames} {keyname}"`, falling back to whichever part exists.
fn author_name(author: &Element) -> Option<String> {
    let keyname = field_text(author, "keyname").unwrap_or_default();
    let forenames = field_text(author, "forenames").unwrap_or_default();
    let name = format!("{} {}", forenames, keyname).trim().to_string();
    if name.is_empty() {
        None
    } else {
        Some(name)
    }
}

/// Strip a trailing `v<digits>` revision suffix.
pub fn strip_version_suffix(id: &str) -> &str {
    let digits = id.len() - id.trim_end_matches(|c: char| c.is_ascii_digit()).len();
    if digits == 0 {
        return id;
    }
    let head = &id[..id.len() - digits];
    head.strip_suffix('v').unwrap_or(id)
}
