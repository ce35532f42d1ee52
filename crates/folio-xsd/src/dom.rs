//! A small namespace-aware element tree.
//!
//! Both the schema and the instance document are read into this tree with
//! `quick-xml`'s pull reader. Prefixes are resolved while reading, so every
//! element and attribute carries its namespace URI. Each element also keeps
//! its in-scope prefix bindings, which schema compilation needs to resolve
//! QName-valued attributes such as `type="xs:string"`.

use quick_xml::{
  Reader,
  events::{BytesStart, Event},
};

use crate::error::{Error, Result};

// ─── Namespaces ──────────────────────────────────────────────────────────────

pub const NS_XSD: &str = "http://www.w3.org/2001/XMLSchema";
pub const NS_XSI: &str = "http://www.w3.org/2001/XMLSchema-instance";
pub const NS_XML: &str = "http://www.w3.org/XML/1998/namespace";

/// Deepest element nesting accepted. The tree, its drop, and validation all
/// recurse per level.
pub const MAX_DEPTH: usize = 256;

/// A prefix binding; the default namespace uses the empty prefix. An empty
/// URI undeclares the default namespace.
#[derive(Debug, Clone)]
struct Binding {
  prefix: String,
  uri:    String,
}

// ─── Tree ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct Attribute {
  pub namespace: Option<String>,
  pub local:     String,
  pub value:     String,
}

#[derive(Debug, Clone)]
pub enum Node {
  Element(Element),
  Text(String),
}

#[derive(Debug, Clone)]
pub struct Element {
  pub namespace:  Option<String>,
  pub local:      String,
  /// Attributes other than namespace declarations.
  pub attributes: Vec<Attribute>,
  pub children:   Vec<Node>,
  scope:          Vec<Binding>,
}

impl Element {
  pub fn is(&self, namespace: &str, local: &str) -> bool {
    self.namespace.as_deref() == Some(namespace) && self.local == local
  }

  /// Value of an unqualified attribute.
  pub fn attr(&self, local: &str) -> Option<&str> {
    self
      .attributes
      .iter()
      .find(|a| a.namespace.is_none() && a.local == local)
      .map(|a| a.value.as_str())
  }

  /// Value of a namespace-qualified attribute.
  pub fn attr_ns(&self, namespace: &str, local: &str) -> Option<&str> {
    self
      .attributes
      .iter()
      .find(|a| a.namespace.as_deref() == Some(namespace) && a.local == local)
      .map(|a| a.value.as_str())
  }

  pub fn elements(&self) -> impl Iterator<Item = &Element> {
    self.children.iter().filter_map(|n| match n {
      Node::Element(e) => Some(e),
      Node::Text(_) => None,
    })
  }

  /// Concatenated character data of the direct children.
  pub fn text(&self) -> String {
    self
      .children
      .iter()
      .filter_map(|n| match n {
        Node::Text(t) => Some(t.as_str()),
        Node::Element(_) => None,
      })
      .collect()
  }

  /// Resolve a QName appearing in an attribute value against this element's
  /// in-scope bindings. An unprefixed name takes the default namespace.
  pub fn resolve_qname(&self, qname: &str) -> Result<(Option<String>, String)> {
    let qname = qname.trim();
    let (prefix, local) = split_qname(qname);
    let namespace = lookup(&self.scope, prefix.unwrap_or(""))
      .or_else(|| (prefix == Some("xml")).then(|| NS_XML.to_owned()));
    if prefix.is_some() && namespace.is_none() {
      return Err(Error::UnboundPrefix(prefix.unwrap_or_default().to_owned()));
    }
    Ok((namespace, local.to_owned()))
  }
}

// ─── Parsing ─────────────────────────────────────────────────────────────────

fn split_qname(raw: &str) -> (Option<&str>, &str) {
  match raw.split_once(':') {
    Some((prefix, local)) => (Some(prefix), local),
    None => (None, raw),
  }
}

/// Innermost binding for `prefix`; `None` if unbound or undeclared.
fn lookup(scope: &[Binding], prefix: &str) -> Option<String> {
  scope
    .iter()
    .rev()
    .find(|b| b.prefix == prefix)
    .filter(|b| !b.uri.is_empty())
    .map(|b| b.uri.clone())
}

fn xml_err(e: impl std::fmt::Display) -> Error { Error::Xml(e.to_string()) }

fn open_element(start: &BytesStart<'_>, parent_scope: &[Binding]) -> Result<Element> {
  let mut scope = parent_scope.to_vec();
  let mut raw_attrs: Vec<(String, String)> = Vec::new();

  for attr in start.attributes() {
    let attr = attr.map_err(xml_err)?;
    let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
    let value = attr.unescape_value().map_err(xml_err)?.into_owned();
    if key == "xmlns" {
      scope.push(Binding { prefix: String::new(), uri: value });
    } else if let Some(prefix) = key.strip_prefix("xmlns:") {
      scope.push(Binding { prefix: prefix.to_owned(), uri: value });
    } else {
      raw_attrs.push((key, value));
    }
  }

  let mut attributes = Vec::with_capacity(raw_attrs.len());
  for (key, value) in raw_attrs {
    let (prefix, local) = split_qname(&key);
    // Unprefixed attributes are in no namespace, regardless of the default.
    let namespace = match prefix {
      None => None,
      Some("xml") => Some(NS_XML.to_owned()),
      Some(p) => Some(lookup(&scope, p).ok_or_else(|| Error::UnboundPrefix(p.to_owned()))?),
    };
    attributes.push(Attribute { namespace, local: local.to_owned(), value });
  }

  let raw_name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
  let (prefix, local) = split_qname(&raw_name);
  let namespace = match prefix {
    None => lookup(&scope, ""),
    Some(p) => Some(lookup(&scope, p).ok_or_else(|| Error::UnboundPrefix(p.to_owned()))?),
  };

  Ok(Element {
    namespace,
    local: local.to_owned(),
    attributes,
    children: Vec::new(),
    scope,
  })
}

fn push_text(parent: &mut Element, text: &str) {
  if let Some(Node::Text(prev)) = parent.children.last_mut() {
    prev.push_str(text);
  } else {
    parent.children.push(Node::Text(text.to_owned()));
  }
}

/// Read a complete, well-formed document and return its root element.
pub fn parse(xml: &str) -> Result<Element> {
  let mut reader = Reader::from_str(xml);
  reader.config_mut().trim_text(false);

  let mut stack: Vec<Element> = Vec::new();
  let mut root: Option<Element> = None;

  loop {
    match reader.read_event().map_err(xml_err)? {
      Event::Start(ref e) => {
        if root.is_some() {
          return Err(Error::TrailingContent);
        }
        if stack.len() >= MAX_DEPTH {
          return Err(Error::TooDeep(MAX_DEPTH));
        }
        let scope = stack.last().map(|p| p.scope.as_slice()).unwrap_or(&[]);
        let element = open_element(e, scope)?;
        stack.push(element);
      }
      Event::Empty(ref e) => {
        if root.is_some() {
          return Err(Error::TrailingContent);
        }
        if stack.len() >= MAX_DEPTH {
          return Err(Error::TooDeep(MAX_DEPTH));
        }
        let scope = stack.last().map(|p| p.scope.as_slice()).unwrap_or(&[]);
        let element = open_element(e, scope)?;
        match stack.last_mut() {
          Some(parent) => parent.children.push(Node::Element(element)),
          None => root = Some(element),
        }
      }
      Event::End(_) => {
        let element = stack.pop().ok_or_else(|| xml_err("unmatched end tag"))?;
        match stack.last_mut() {
          Some(parent) => parent.children.push(Node::Element(element)),
          None => root = Some(element),
        }
      }
      Event::Text(ref t) => {
        let text = t.unescape().map_err(xml_err)?;
        match stack.last_mut() {
          Some(parent) => push_text(parent, &text),
          None if text.trim().is_empty() => {}
          None if root.is_some() => return Err(Error::TrailingContent),
          None => return Err(xml_err("text before the root element")),
        }
      }
      Event::CData(c) => {
        let text = String::from_utf8_lossy(&c.into_inner()).into_owned();
        match stack.last_mut() {
          Some(parent) => push_text(parent, &text),
          None => return Err(xml_err("CDATA outside the root element")),
        }
      }
      Event::Eof => break,
      // Declarations, comments, processing instructions, doctypes.
      _ => {}
    }
  }

  if let Some(open) = stack.last() {
    return Err(xml_err(format!("unclosed element <{}>", open.local)));
  }
  root.ok_or(Error::MissingRoot)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn resolves_default_and_prefixed_namespaces() {
    let doc = parse(
      r#"<inv:invoice xmlns:inv="urn:inv" xmlns="urn:default">
           <line qty="2"/>
         </inv:invoice>"#,
    )
    .unwrap();
    assert!(doc.is("urn:inv", "invoice"));
    let line = doc.elements().next().unwrap();
    assert_eq!(line.namespace.as_deref(), Some("urn:default"));
    assert_eq!(line.attr("qty"), Some("2"));
    assert!(line.attributes[0].namespace.is_none());
  }

  #[test]
  fn empty_default_namespace_undeclares() {
    let doc = parse(r#"<a xmlns="urn:a"><b xmlns=""/></a>"#).unwrap();
    let b = doc.elements().next().unwrap();
    assert!(b.namespace.is_none());
  }

  #[test]
  fn text_is_unescaped_and_merged() {
    let doc = parse("<note>fish &amp; <![CDATA[<chips>]]></note>").unwrap();
    assert_eq!(doc.text(), "fish & <chips>");
  }

  #[test]
  fn qname_values_resolve_against_scope() {
    let doc = parse(r#"<x:schema xmlns:x="urn:x"><x:e type="x:string"/></x:schema>"#)
      .unwrap();
    let e = doc.elements().next().unwrap();
    let (ns, local) = e.resolve_qname(e.attr("type").unwrap()).unwrap();
    assert_eq!(ns.as_deref(), Some("urn:x"));
    assert_eq!(local, "string");
    assert!(matches!(
      e.resolve_qname("nope:thing"),
      Err(Error::UnboundPrefix(p)) if p == "nope"
    ));
  }

  #[test]
  fn rejects_malformed_documents() {
    assert!(parse("").is_err());
    assert!(parse("<a><b></a>").is_err());
    assert!(parse("<a>").is_err());
    assert!(matches!(parse("<a/><b/>"), Err(Error::TrailingContent)));
    assert!(matches!(parse("<p:a/>"), Err(Error::UnboundPrefix(_))));
    assert!(parse("hello").is_err());
  }

  #[test]
  fn nesting_is_bounded() {
    let nested = |depth: usize| "<a>".repeat(depth) + &"</a>".repeat(depth);
    assert!(parse(&nested(MAX_DEPTH)).is_ok());
    assert!(matches!(parse(&nested(MAX_DEPTH + 1)), Err(Error::TooDeep(MAX_DEPTH))));
    let empty_leaf = "<a>".repeat(MAX_DEPTH) + "<b/>" + &"</a>".repeat(MAX_DEPTH);
    assert!(matches!(parse(&empty_leaf), Err(Error::TooDeep(_))));
    assert!(matches!(parse(&nested(200_000)), Err(Error::TooDeep(_))));
  }
}
