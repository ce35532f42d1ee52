//! Content items and their lifecycle.
//!
//! Content forms a forest: each item may name a parent by id. The reference
//! is non-owning and resolved by lookup, so reparenting is a single field
//! change.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ─── Status ──────────────────────────────────────────────────────────────────

/// Lifecycle status. The only transition is `Active` → `Archived`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentStatus {
  #[default]
  Active,
  Archived,
}

impl ContentStatus {
  pub fn is_active(&self) -> bool { matches!(self, Self::Active) }
}

// ─── Content ─────────────────────────────────────────────────────────────────

/// A stored document bound to exactly one schema version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Content {
  pub content_id:        String,
  pub parent_id:         Option<String>,
  pub name:              String,
  pub schema_version_id: i64,
  pub content_xml:       String,
  pub status:            ContentStatus,
  pub created_at:        DateTime<Utc>,
  pub updated_at:        DateTime<Utc>,
  /// Set once, by the first archive call.
  pub archived_at:       Option<DateTime<Utc>>,
}

// ─── NewContent ──────────────────────────────────────────────────────────────

/// Input to [`crate::store::FolioStore::create_content`].
/// Timestamps and status are always set by the store.
#[derive(Debug, Clone)]
pub struct NewContent {
  pub content_id:        String,
  pub parent_id:         Option<String>,
  pub name:              String,
  pub schema_version_id: i64,
  pub content_xml:       String,
}

// ─── ContentUpdate ───────────────────────────────────────────────────────────

/// A partial update. Fields left as `None` keep their stored value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContentUpdate {
  pub name:              Option<String>,
  /// `Some(None)` moves the item to the root; `Some(Some(id))` reparents it.
  pub parent_id:         Option<Option<String>>,
  pub schema_version_id: Option<i64>,
  pub content_xml:       Option<String>,
}

impl ContentUpdate {
  /// True when no field would change.
  pub fn is_empty(&self) -> bool {
    self.name.is_none()
      && self.parent_id.is_none()
      && self.schema_version_id.is_none()
      && self.content_xml.is_none()
  }

  /// True when the update touches what the content is validated on.
  pub fn needs_revalidation(&self) -> bool {
    self.content_xml.is_some() || self.schema_version_id.is_some()
  }

  pub fn with_name(mut self, name: impl Into<String>) -> Self {
    self.name = Some(name.into());
    self
  }

  pub fn with_parent(mut self, parent_id: Option<String>) -> Self {
    self.parent_id = Some(parent_id);
    self
  }

  pub fn with_schema_version(mut self, schema_version_id: i64) -> Self {
    self.schema_version_id = Some(schema_version_id);
    self
  }

  pub fn with_content_xml(mut self, content_xml: impl Into<String>) -> Self {
    self.content_xml = Some(content_xml.into());
    self
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn empty_update_needs_nothing() {
    let update = ContentUpdate::default();
    assert!(update.is_empty());
    assert!(!update.needs_revalidation());
  }

  #[test]
  fn renaming_does_not_revalidate() {
    let update = ContentUpdate::default().with_name("Renamed");
    assert!(!update.is_empty());
    assert!(!update.needs_revalidation());
  }

  #[test]
  fn xml_or_version_change_revalidates() {
    assert!(
      ContentUpdate::default()
        .with_content_xml("<a/>")
        .needs_revalidation()
    );
    assert!(
      ContentUpdate::default()
        .with_schema_version(2)
        .needs_revalidation()
    );
  }
}
