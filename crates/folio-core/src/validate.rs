//! The `ContentValidator` trait.
//!
//! Validation is a pure function of two documents: the content XML and the
//! schema XML it is bound to. Engines live in their own crates
//! (e.g. `folio-xsd`).

use std::fmt;

use serde::{Deserialize, Serialize};

/// One reason a document failed validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
  /// Slash-separated element path, e.g. `/invoice/line[2]`. Empty when the
  /// problem is not tied to an element (e.g. the document is not XML).
  pub path:    String,
  pub message: String,
}

impl Violation {
  pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
    Self { path: path.into(), message: message.into() }
  }
}

impl fmt::Display for Violation {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if self.path.is_empty() {
      f.write_str(&self.message)
    } else {
      write!(f, "{}: {}", self.path, self.message)
    }
  }
}

/// Checks content XML against a schema XML document.
///
/// Implementations must be side-effect free; the service calls them before
/// any write and never rolls anything back.
pub trait ContentValidator: Send + Sync {
  /// Every way `content_xml` fails to conform to `schema_xml`. Empty means
  /// the content is valid.
  fn violations(&self, content_xml: &str, schema_xml: &str) -> Vec<Violation>;

  /// Problems with `schema_xml` itself. The default accepts every schema.
  fn schema_violations(&self, _schema_xml: &str) -> Vec<Violation> {
    Vec::new()
  }

  /// Pass/fail view of [`ContentValidator::violations`].
  fn validate_content(&self, content_xml: &str, schema_xml: &str) -> bool {
    self.violations(content_xml, schema_xml).is_empty()
  }
}

impl<V: ContentValidator + ?Sized> ContentValidator for std::sync::Arc<V> {
  fn violations(&self, content_xml: &str, schema_xml: &str) -> Vec<Violation> {
    (**self).violations(content_xml, schema_xml)
  }

  fn schema_violations(&self, schema_xml: &str) -> Vec<Violation> {
    (**self).schema_violations(schema_xml)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  struct RejectEmpty;

  impl ContentValidator for RejectEmpty {
    fn violations(&self, content_xml: &str, _schema_xml: &str) -> Vec<Violation> {
      if content_xml.trim().is_empty() {
        vec![Violation::new("", "document is empty")]
      } else {
        Vec::new()
      }
    }
  }

  #[test]
  fn validate_content_follows_violations() {
    assert!(RejectEmpty.validate_content("<a/>", ""));
    assert!(!RejectEmpty.validate_content("  ", ""));
  }

  #[test]
  fn violation_display_includes_path() {
    let v = Violation::new("/invoice/total", "expected a decimal");
    assert_eq!(v.to_string(), "/invoice/total: expected a decimal");
    assert_eq!(Violation::new("", "not XML").to_string(), "not XML");
  }
}
