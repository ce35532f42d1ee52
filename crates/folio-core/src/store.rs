//! The `FolioStore` trait.
//!
//! The trait is implemented by storage backends (e.g. `folio-store-sqlite`).
//! `folio-service` and the CLI depend on this abstraction, not on any
//! concrete backend.
//!
//! Lookups that find nothing return `Ok(None)` or an empty `Vec`; absence is
//! never an error. Domain failures ([`crate::Error`]) travel inside the
//! backend's own error type, which is why `Self::Error` must be constructible
//! from one.

use std::future::Future;

use crate::{
  content::{Content, ContentUpdate, NewContent},
  relationship::ContentRelationship,
  schema::{Schema, SchemaVersion},
};

/// Abstraction over a Folio storage backend.
///
/// Every method is expected to execute as one atomic unit against the
/// backing store. All methods return `Send` futures so the trait can be used
/// from multi-threaded async runtimes.
pub trait FolioStore: Send + Sync {
  type Error: std::error::Error + From<crate::Error> + Send + Sync + 'static;

  // ── Schemas ───────────────────────────────────────────────────────────

  /// Register a new schema name.
  ///
  /// Fails with [`crate::Error::DuplicateName`] if the name is taken.
  fn create_schema<'a>(
    &'a self,
    name: &'a str,
  ) -> impl Future<Output = Result<Schema, Self::Error>> + Send + 'a;

  /// Exact-match lookup by name.
  fn get_schema_by_name<'a>(
    &'a self,
    name: &'a str,
  ) -> impl Future<Output = Result<Option<Schema>, Self::Error>> + Send + 'a;

  fn get_schema(
    &self,
    schema_id: i64,
  ) -> impl Future<Output = Result<Option<Schema>, Self::Error>> + Send + '_;

  /// All schemas, oldest first.
  fn list_schemas(
    &self,
  ) -> impl Future<Output = Result<Vec<Schema>, Self::Error>> + Send + '_;

  // ── Schema versions ───────────────────────────────────────────────────

  /// Append a version to a schema.
  ///
  /// Fails with `UnknownSchema` if the schema does not exist,
  /// `DuplicateVersion` if the number is taken, and `InvalidVersion` if it
  /// is not greater than the current latest version.
  fn create_schema_version(
    &self,
    schema_id: i64,
    version: i64,
    xml_content: String,
  ) -> impl Future<Output = Result<SchemaVersion, Self::Error>> + Send + '_;

  fn get_schema_version_by_id(
    &self,
    schema_version_id: i64,
  ) -> impl Future<Output = Result<Option<SchemaVersion>, Self::Error>> + Send + '_;

  /// The version with the highest number, or `None` if the schema has no
  /// versions (or does not exist).
  fn get_latest_schema_version_by_schema_id(
    &self,
    schema_id: i64,
  ) -> impl Future<Output = Result<Option<SchemaVersion>, Self::Error>> + Send + '_;

  /// Every version of a schema in ascending version order.
  fn list_schema_versions(
    &self,
    schema_id: i64,
  ) -> impl Future<Output = Result<Vec<SchemaVersion>, Self::Error>> + Send + '_;

  // ── Content ───────────────────────────────────────────────────────────

  /// Persist new, active content. Does not validate the XML.
  ///
  /// Fails with `DuplicateId`, `UnknownSchemaVersion`, or `UnknownParent`.
  fn create_content(
    &self,
    input: NewContent,
  ) -> impl Future<Output = Result<Content, Self::Error>> + Send + '_;

  /// Point lookup; archived content is returned too.
  fn get_content_by_id<'a>(
    &'a self,
    content_id: &'a str,
  ) -> impl Future<Output = Result<Option<Content>, Self::Error>> + Send + 'a;

  /// Apply a partial update and return the stored result.
  ///
  /// Fails with `NotFound` or `ArchivedImmutable`, and with
  /// `UnknownParent` / `UnknownSchemaVersion` / `SelfParent` when the update
  /// points somewhere invalid.
  fn update_content<'a>(
    &'a self,
    content_id: &'a str,
    update: ContentUpdate,
  ) -> impl Future<Output = Result<Content, Self::Error>> + Send + 'a;

  /// Move content to `Archived`. Archiving archived content is a no-op.
  ///
  /// Fails with `NotFound`.
  fn archive_content<'a>(
    &'a self,
    content_id: &'a str,
  ) -> impl Future<Output = Result<Content, Self::Error>> + Send + 'a;

  /// Direct children of `parent_id` (root content when `None`) in insertion
  /// order. Archived children are skipped unless `include_archived`.
  fn get_content_by_parent_id<'a>(
    &'a self,
    parent_id: Option<&'a str>,
    include_archived: bool,
  ) -> impl Future<Output = Result<Vec<Content>, Self::Error>> + Send + 'a;

  // ── Relationships ─────────────────────────────────────────────────────

  /// Record a directed link. Duplicate pairs get distinct ids.
  ///
  /// Fails with `UnknownSource`, `UnknownTarget`, or `SelfRelationship`.
  fn create_content_relationship<'a>(
    &'a self,
    source_content_id: &'a str,
    target_content_id: &'a str,
  ) -> impl Future<Output = Result<ContentRelationship, Self::Error>> + Send + 'a;

  fn get_content_relationships_by_source_id<'a>(
    &'a self,
    source_content_id: &'a str,
  ) -> impl Future<Output = Result<Vec<ContentRelationship>, Self::Error>> + Send + 'a;

  fn get_content_relationships_by_target_id<'a>(
    &'a self,
    target_content_id: &'a str,
  ) -> impl Future<Output = Result<Vec<ContentRelationship>, Self::Error>> + Send + 'a;
}
