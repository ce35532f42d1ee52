//! Schemas and their immutable, numbered versions.
//!
//! A schema is only a name. Its structure lives in [`SchemaVersion`] records,
//! which are append-only: a schema evolves by adding a higher version, never
//! by editing an existing one.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A named family of content structure definitions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
  pub schema_id:  i64,
  pub name:       String,
  pub created_at: DateTime<Utc>,
}

/// One immutable XML Schema document registered under a [`Schema`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaVersion {
  pub schema_version_id: i64,
  pub schema_id:         i64,
  /// Strictly increasing per schema; the highest is the "latest" version.
  pub version:           i64,
  /// The XSD body content is validated against.
  pub xml_content:       String,
  pub created_at:        DateTime<Utc>,
}
