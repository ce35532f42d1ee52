//! Error types for `folio-core`.
//!
//! These are the domain failures shared by every backend. Storage backends
//! wrap them in their own error type (see [`crate::store::FolioStore`]).

use thiserror::Error;

use crate::validate::Violation;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
  #[error("content not found: {0}")]
  NotFound(String),

  #[error("schema name already exists: {0:?}")]
  DuplicateName(String),

  #[error("content id already exists: {0}")]
  DuplicateId(String),

  #[error("schema {schema_id} already has version {version}")]
  DuplicateVersion { schema_id: i64, version: i64 },

  #[error("unknown schema: {0}")]
  UnknownSchema(i64),

  #[error("unknown schema version: {0}")]
  UnknownSchemaVersion(i64),

  #[error("unknown parent content: {0}")]
  UnknownParent(String),

  #[error("unknown relationship source: {0}")]
  UnknownSource(String),

  #[error("unknown relationship target: {0}")]
  UnknownTarget(String),

  #[error(
    "version {version} of schema {schema_id} must be greater than the \
     latest version {latest}"
  )]
  InvalidVersion { schema_id: i64, version: i64, latest: i64 },

  #[error(
    "content does not conform to schema version {schema_version_id} ({} \
     violation(s))",
    .violations.len()
  )]
  ValidationFailed {
    schema_version_id: i64,
    violations:        Vec<Violation>,
  },

  #[error("schema document is not usable ({} violation(s))", .0.len())]
  InvalidSchema(Vec<Violation>),

  #[error("content {0} is archived and cannot be modified")]
  ArchivedImmutable(String),

  #[error("content {0} cannot be related to itself")]
  SelfRelationship(String),

  #[error("content {0} cannot be its own parent")]
  SelfParent(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
