//! Encoding and decoding helpers between Folio domain types and the
//! plain-text representations stored in SQLite columns.
//!
//! Timestamps are stored as RFC 3339 strings and content status as its
//! lowercase name. Each `Raw*` struct mirrors one table row; the matching
//! `*_COLUMNS` constant lists the columns in the order `from_row` reads them.

use chrono::{DateTime, Utc};
use folio_core::{
  content::{Content, ContentStatus},
  relationship::ContentRelationship,
  schema::{Schema, SchemaVersion},
};
use rusqlite::Row;

use crate::{Error, Result};

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── ContentStatus ───────────────────────────────────────────────────────────

pub fn encode_status(s: ContentStatus) -> &'static str {
  match s {
    ContentStatus::Active => "active",
    ContentStatus::Archived => "archived",
  }
}

pub fn decode_status(s: &str) -> Result<ContentStatus> {
  match s {
    "active" => Ok(ContentStatus::Active),
    "archived" => Ok(ContentStatus::Archived),
    other => Err(Error::Status(other.to_owned())),
  }
}

// ─── Rows ────────────────────────────────────────────────────────────────────

pub const SCHEMA_COLUMNS: &str = "schema_id, name, created_at";

/// Raw values read directly from a `schemas` row.
pub struct RawSchema {
  pub schema_id:  i64,
  pub name:       String,
  pub created_at: String,
}

impl RawSchema {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self { schema_id: row.get(0)?, name: row.get(1)?, created_at: row.get(2)? })
  }

  pub fn into_schema(self) -> Result<Schema> {
    Ok(Schema {
      schema_id:  self.schema_id,
      name:       self.name,
      created_at: decode_dt(&self.created_at)?,
    })
  }
}

pub const SCHEMA_VERSION_COLUMNS: &str =
  "schema_version_id, schema_id, version, xml_content, created_at";

/// Raw values read directly from a `schema_versions` row.
pub struct RawSchemaVersion {
  pub schema_version_id: i64,
  pub schema_id:         i64,
  pub version:           i64,
  pub xml_content:       String,
  pub created_at:        String,
}

impl RawSchemaVersion {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      schema_version_id: row.get(0)?,
      schema_id:         row.get(1)?,
      version:           row.get(2)?,
      xml_content:       row.get(3)?,
      created_at:        row.get(4)?,
    })
  }

  pub fn into_schema_version(self) -> Result<SchemaVersion> {
    Ok(SchemaVersion {
      schema_version_id: self.schema_version_id,
      schema_id:         self.schema_id,
      version:           self.version,
      xml_content:       self.xml_content,
      created_at:        decode_dt(&self.created_at)?,
    })
  }
}

pub const CONTENT_COLUMNS: &str = "content_id, parent_id, name, schema_version_id, content_xml, \
                                   status, created_at, updated_at, archived_at";

/// Raw values read directly from a `content` row.
pub struct RawContent {
  pub content_id:        String,
  pub parent_id:         Option<String>,
  pub name:              String,
  pub schema_version_id: i64,
  pub content_xml:       String,
  pub status:            String,
  pub created_at:        String,
  pub updated_at:        String,
  pub archived_at:       Option<String>,
}

impl RawContent {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      content_id:        row.get(0)?,
      parent_id:         row.get(1)?,
      name:              row.get(2)?,
      schema_version_id: row.get(3)?,
      content_xml:       row.get(4)?,
      status:            row.get(5)?,
      created_at:        row.get(6)?,
      updated_at:        row.get(7)?,
      archived_at:       row.get(8)?,
    })
  }

  pub fn into_content(self) -> Result<Content> {
    Ok(Content {
      content_id:        self.content_id,
      parent_id:         self.parent_id,
      name:              self.name,
      schema_version_id: self.schema_version_id,
      content_xml:       self.content_xml,
      status:            decode_status(&self.status)?,
      created_at:        decode_dt(&self.created_at)?,
      updated_at:        decode_dt(&self.updated_at)?,
      archived_at:       self.archived_at.as_deref().map(decode_dt).transpose()?,
    })
  }
}

pub const RELATIONSHIP_COLUMNS: &str =
  "relationship_id, source_content_id, target_content_id, created_at";

/// Raw values read directly from a `content_relationships` row.
pub struct RawRelationship {
  pub relationship_id:   i64,
  pub source_content_id: String,
  pub target_content_id: String,
  pub created_at:        String,
}

impl RawRelationship {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      relationship_id:   row.get(0)?,
      source_content_id: row.get(1)?,
      target_content_id: row.get(2)?,
      created_at:        row.get(3)?,
    })
  }

  pub fn into_relationship(self) -> Result<ContentRelationship> {
    Ok(ContentRelationship {
      relationship_id:   self.relationship_id,
      source_content_id: self.source_content_id,
      target_content_id: self.target_content_id,
      created_at:        decode_dt(&self.created_at)?,
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn timestamps_round_trip_through_text() {
    let now = Utc::now();
    assert_eq!(decode_dt(&encode_dt(now)).unwrap(), now);
    assert!(matches!(decode_dt("yesterday"), Err(Error::DateParse(_))));
  }

  #[test]
  fn unknown_status_is_rejected() {
    assert_eq!(decode_status(encode_status(ContentStatus::Archived)).unwrap(), ContentStatus::Archived);
    assert!(matches!(decode_status("deleted"), Err(Error::Status(s)) if s == "deleted"));
  }
}
