//! A small owned XML element tree with resolved namespaces.
//!
//! Built on `quick-xml`'s namespace-aware reader. Every element records its
//! resolved namespace URI (if any) and local name, which is what lookups key
//! on; prefixes are discarded. Mismatched end tags are tolerated, but a syntax
//! error or a document that ends with elements still open is rejected: a page
//! cut short must not look like a complete one.

use quick_xml::events::{BytesStart, Event};
use quick_xml::name::{Namespace, ResolveResult};
use quick_xml::NsReader;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum XmlError {
    #[error("malformed XML: {0}")]
    Malformed(String),
    #[error("document has no root element")]
    Empty,
    #[error("document ends inside <{0}>")]
    Truncated(String),
}

/// One element of a parsed document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Element {
    /// Resolved namespace URI; `None` for unqualified elements.
    pub namespace: Option<String>,
    /// Local name, without prefix.
    pub name: String,
    /// Attributes keyed by local name (namespace declarations excluded).
    pub attributes: Vec<(String, String)>,
    /// Concatenated direct text content (entities unescaped, CDATA inlined).
    pub text: String,
    pub children: Vec<Element>,
}

impl Element {
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Trimmed text, or `None` when the element holds only whitespace.
    pub fn text(&self) -> Option<&str> {
        let t = self.text.trim();
        if t.is_empty() {
            None
        } else {
            Some(t)
        }
    }

    fn is_ns(&self, ns: &str, name: &str) -> bool {
        self.name == name && self.namespace.as_deref() == Some(ns)
    }

    /// First direct child in namespace `ns` with local name `name`.
    pub fn child_ns(&self, ns: &str, name: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.is_ns(ns, name))
    }

    /// First direct child with no namespace and local name `name`.
    pub fn child_bare(&self, name: &str) -> Option<&Element> {
        self.children
            .iter()
            .find(|c| c.namespace.is_none() && c.name == name)
    }

    /// Direct children in namespace `ns` with local name `name`.
    pub fn children_ns(&self, ns: &str, name: &str) -> Vec<&Element> {
        self.children.iter().filter(|c| c.is_ns(ns, name)).collect()
    }

    /// All elements below this one in document order (self excluded).
    pub fn descendants(&self) -> Descendants<'_> {
        Descendants {
            stack: self.children.iter().rev().collect(),
        }
    }

    /// First descendant with local name `name`, in any namespace.
    pub fn find_local(&self, name: &str) -> Option<&Element> {
        self.descendants().find(|e| e.name == name)
    }

    /// First descendant in namespace `ns` with local name `name`.
    pub fn find_ns(&self, ns: &str, name: &str) -> Option<&Element> {
        self.descendants().find(|e| e.is_ns(ns, name))
    }

    pub fn find_all_ns<'a>(
        &'a self,
        ns: &'a str,
        name: &'a str,
    ) -> impl Iterator<Item = &'a Element> + 'a {
        self.descendants().filter(move |e| e.is_ns(ns, name))
    }
}

/// Pre-order iterator over an element's descendants.
pub struct Descendants<'a> {
    stack: Vec<&'a Element>,
}

impl<'a> Iterator for Descendants<'a> {
    type Item = &'a Element;

    fn next(&mut self) -> Option<&'a Element> {
        let el = self.stack.pop()?;
        self.stack.extend(el.children.iter().rev());
        Some(el)
    }
}

/// Parse a complete document and return its root element.
pub fn parse_document(xml: &[u8]) -> Result<Element, XmlError> {
    let mut reader = NsReader::from_reader(xml);
    reader.config_mut().check_end_names = false;

    let mut buf = Vec::new();
    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        match reader.read_resolved_event_into(&mut buf) {
            Ok((ns, Event::Start(e))) => stack.push(open_element(ns, &e)),
            Ok((ns, Event::Empty(e))) => {
                let el = open_element(ns, &e);
                attach(&mut stack, &mut root, el);
            }
            Ok((_, Event::End(_))) => {
                if let Some(el) = stack.pop() {
                    attach(&mut stack, &mut root, el);
                }
            }
            Ok((_, Event::Text(t))) => {
                if let Some(top) = stack.last_mut() {
                    match t.unescape() {
                        Ok(s) => top.text.push_str(&s),
                        Err(_) => top.text.push_str(&String::from_utf8_lossy(&t)),
                    }
                }
            }
            Ok((_, Event::CData(c))) => {
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(&String::from_utf8_lossy(&c.into_inner()));
                }
            }
            Ok((_, Event::Eof)) => break,
            Ok(_) => {}
            Err(e) => {
                return Err(XmlError::Malformed(format!(
                    "{} at byte {}",
                    e,
                    reader.buffer_position()
                )))
            }
        }
        buf.clear();
    }

    if let Some(open) = stack.last() {
        return Err(XmlError::Truncated(open.name.clone()));
    }
    root.ok_or(XmlError::Empty)
}

fn open_element(ns: ResolveResult, e: &BytesStart) -> Element {
    let namespace = match ns {
        ResolveResult::Bound(Namespace(uri)) => Some(String::from_utf8_lossy(uri).into_owned()),
        _ => None,
    };
    let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
    let attributes = e
        .attributes()
        .with_checks(false)
        .flatten()
        .filter(|a| a.key.as_namespace_binding().is_none())
        .map(|a| {
            let key = String::from_utf8_lossy(a.key.local_name().as_ref()).into_owned();
            let value = match a.unescape_value() {
                Ok(v) => v.into_owned(),
                Err(_) => String::from_utf8_lossy(&a.value).into_owned(),
            };
            (key, value)
        })
        .collect();

    Element {
        namespace,
        name,
        attributes,
        ..Element::default()
    }
}

fn attach(stack: &mut [Element], root: &mut Option<Element>, el: Element) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(el),
        None => {
            if root.is_none() {
                *root = Some(el);
            }
        }
    }
}
