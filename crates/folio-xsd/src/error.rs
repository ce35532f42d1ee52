//! Error types for the folio-xsd engine.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("malformed XML: {0}")]
  Xml(String),

  #[error("unbound namespace prefix: {0:?}")]
  UnboundPrefix(String),

  #[error("document has no root element")]
  MissingRoot,

  #[error("elements nested deeper than {0} levels")]
  TooDeep(usize),

  #[error("content after the root element")]
  TrailingContent,

  #[error("not an XML Schema document: root element is <{0}>")]
  NotASchema(String),

  #[error("unsupported schema construct: xs:{0}")]
  Unsupported(String),

  #[error("invalid schema: {0}")]
  InvalidSchema(String),

  #[error("invalid pattern {pattern:?}: {source}")]
  Pattern {
    pattern: String,
    #[source]
    source:  regex::Error,
  },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
