//! Directed links between two content items.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A directed, non-hierarchical link from one content item to another.
/// Never updated or deleted once recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentRelationship {
  pub relationship_id:   i64,
  pub source_content_id: String,
  pub target_content_id: String,
  pub created_at:        DateTime<Utc>,
}
