//! The Folio content service.
//!
//! [`ContentService`] is the entry point for writes that must respect the
//! schema binding: new content is checked against the latest version of its
//! schema before it is stored, and updates that change the document or its
//! schema version are checked again. Everything else passes straight through
//! to the [`FolioStore`].
//!
//! Validation and the store write are separate steps. Validation has no side
//! effects, so a failed check leaves nothing behind.

use std::sync::Arc;

use folio_core::{
  Error,
  content::{Content, ContentUpdate, NewContent},
  relationship::ContentRelationship,
  schema::{Schema, SchemaVersion},
  store::FolioStore,
  validate::ContentValidator,
};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Domain operations over a store `S`, validated by `V`.
///
/// Every error is reported in the store's own error type; domain failures
/// arrive as `S::Error::from(folio_core::Error)`.
pub struct ContentService<S, V> {
  store:     Arc<S>,
  validator: Arc<V>,
}

impl<S, V> Clone for ContentService<S, V> {
  fn clone(&self) -> Self {
    Self { store: Arc::clone(&self.store), validator: Arc::clone(&self.validator) }
  }
}

impl<S, V> ContentService<S, V>
where
  S: FolioStore,
  V: ContentValidator,
{
  pub fn new(store: S, validator: V) -> Self {
    Self::from_arcs(Arc::new(store), Arc::new(validator))
  }

  /// Build a service around an already shared store and validator.
  pub fn from_arcs(store: Arc<S>, validator: Arc<V>) -> Self { Self { store, validator } }

  pub fn store(&self) -> &S { &self.store }

  /// Check `content_xml` against a stored schema version.
  fn check(&self, version: &SchemaVersion, content_xml: &str) -> Result<(), S::Error> {
    let violations = self.validator.violations(content_xml, &version.xml_content);
    if violations.is_empty() {
      return Ok(());
    }
    warn!(
      schema_version_id = version.schema_version_id,
      violations = violations.len(),
      "content rejected by schema"
    );
    Err(
      Error::ValidationFailed { schema_version_id: version.schema_version_id, violations }.into(),
    )
  }

  // ── Schemas ───────────────────────────────────────────────────────────────

  pub async fn create_schema(&self, name: &str) -> Result<Schema, S::Error> {
    let schema = self.store.create_schema(name).await?;
    info!(schema_id = schema.schema_id, name = %schema.name, "created schema");
    Ok(schema)
  }

  pub async fn get_schema_by_name(&self, name: &str) -> Result<Option<Schema>, S::Error> {
    debug!(name, "get schema by name");
    self.store.get_schema_by_name(name).await
  }

  pub async fn get_schema(&self, schema_id: i64) -> Result<Option<Schema>, S::Error> {
    debug!(schema_id, "get schema");
    self.store.get_schema(schema_id).await
  }

  pub async fn list_schemas(&self) -> Result<Vec<Schema>, S::Error> {
    debug!("list schemas");
    self.store.list_schemas().await
  }

  /// Register a new version after checking that the body is a usable
  /// schema document.
  pub async fn create_schema_version(
    &self,
    schema_id: i64,
    version: i64,
    xml_content: String,
  ) -> Result<SchemaVersion, S::Error> {
    let violations = self.validator.schema_violations(&xml_content);
    if !violations.is_empty() {
      warn!(schema_id, version, violations = violations.len(), "schema document rejected");
      return Err(Error::InvalidSchema(violations).into());
    }
    let created = self.store.create_schema_version(schema_id, version, xml_content).await?;
    info!(
      schema_id,
      version,
      schema_version_id = created.schema_version_id,
      "created schema version"
    );
    Ok(created)
  }

  pub async fn get_schema_version_by_id(
    &self,
    schema_version_id: i64,
  ) -> Result<Option<SchemaVersion>, S::Error> {
    debug!(schema_version_id, "get schema version");
    self.store.get_schema_version_by_id(schema_version_id).await
  }

  pub async fn get_latest_schema_version_by_schema_id(
    &self,
    schema_id: i64,
  ) -> Result<Option<SchemaVersion>, S::Error> {
    debug!(schema_id, "get latest schema version");
    self.store.get_latest_schema_version_by_schema_id(schema_id).await
  }

  pub async fn list_schema_versions(&self, schema_id: i64) -> Result<Vec<SchemaVersion>, S::Error> {
    debug!(schema_id, "list schema versions");
    self.store.list_schema_versions(schema_id).await
  }

  // ── Content ───────────────────────────────────────────────────────────────

  /// Validate `content_xml` against the latest version of `schema_id` and
  /// store it under a fresh UUID. Returns the new content id.
  pub async fn create_content(
    &self,
    name: &str,
    parent_id: Option<&str>,
    schema_id: i64,
    content_xml: &str,
  ) -> Result<String, S::Error> {
    let content_id = Uuid::new_v4().to_string();
    self.create_content_with_id(&content_id, name, parent_id, schema_id, content_xml).await
  }

  /// Like [`ContentService::create_content`], with a caller-chosen id.
  pub async fn create_content_with_id(
    &self,
    content_id: &str,
    name: &str,
    parent_id: Option<&str>,
    schema_id: i64,
    content_xml: &str,
  ) -> Result<String, S::Error> {
    let version = self
      .store
      .get_latest_schema_version_by_schema_id(schema_id)
      .await?
      .ok_or(Error::UnknownSchema(schema_id))?;

    self.check(&version, content_xml)?;

    let content = self
      .store
      .create_content(NewContent {
        content_id:        content_id.to_owned(),
        parent_id:         parent_id.map(str::to_owned),
        name:              name.to_owned(),
        schema_version_id: version.schema_version_id,
        content_xml:       content_xml.to_owned(),
      })
      .await?;

    info!(
      content_id = %content.content_id,
      schema_version_id = content.schema_version_id,
      "created content"
    );
    Ok(content.content_id)
  }

  pub async fn get_content_by_id(&self, content_id: &str) -> Result<Option<Content>, S::Error> {
    debug!(content_id, "get content");
    self.store.get_content_by_id(content_id).await
  }

  /// Apply a partial update. When the document or its schema version
  /// changes, the resulting pair is validated first and written as a whole.
  pub async fn update_content(
    &self,
    content_id: &str,
    mut update: ContentUpdate,
  ) -> Result<Content, S::Error> {
    if update.needs_revalidation() {
      let current = self
        .store
        .get_content_by_id(content_id)
        .await?
        .ok_or_else(|| Error::NotFound(content_id.to_owned()))?;
      if !current.status.is_active() {
        return Err(Error::ArchivedImmutable(content_id.to_owned()).into());
      }

      let schema_version_id = update.schema_version_id.unwrap_or(current.schema_version_id);
      let version = self
        .store
        .get_schema_version_by_id(schema_version_id)
        .await?
        .ok_or(Error::UnknownSchemaVersion(schema_version_id))?;
      let content_xml = update.content_xml.take().unwrap_or(current.content_xml);
      self.check(&version, &content_xml)?;
      update.content_xml = Some(content_xml);
      update.schema_version_id = Some(version.schema_version_id);
    }

    let content = self.store.update_content(content_id, update).await?;
    info!(content_id, "updated content");
    Ok(content)
  }

  pub async fn archive_content(&self, content_id: &str) -> Result<Content, S::Error> {
    let content = self.store.archive_content(content_id).await?;
    info!(content_id, "archived content");
    Ok(content)
  }

  /// Active children of `parent_id`, or root content when `None`.
  pub async fn get_content_by_parent_id(
    &self,
    parent_id: Option<&str>,
  ) -> Result<Vec<Content>, S::Error> {
    debug!(parent_id, "list children");
    self.store.get_content_by_parent_id(parent_id, false).await
  }

  /// Like [`ContentService::get_content_by_parent_id`], archived included.
  pub async fn get_all_content_by_parent_id(
    &self,
    parent_id: Option<&str>,
  ) -> Result<Vec<Content>, S::Error> {
    debug!(parent_id, "list children including archived");
    self.store.get_content_by_parent_id(parent_id, true).await
  }

  // ── Relationships ─────────────────────────────────────────────────────────

  pub async fn create_content_relationship(
    &self,
    source_content_id: &str,
    target_content_id: &str,
  ) -> Result<ContentRelationship, S::Error> {
    let relationship =
      self.store.create_content_relationship(source_content_id, target_content_id).await?;
    info!(
      relationship_id = relationship.relationship_id,
      source = source_content_id,
      target = target_content_id,
      "created relationship"
    );
    Ok(relationship)
  }

  pub async fn get_content_relationships_by_source_id(
    &self,
    source_content_id: &str,
  ) -> Result<Vec<ContentRelationship>, S::Error> {
    debug!(source_content_id, "list relationships by source");
    self.store.get_content_relationships_by_source_id(source_content_id).await
  }

  pub async fn get_content_relationships_by_target_id(
    &self,
    target_content_id: &str,
  ) -> Result<Vec<ContentRelationship>, S::Error> {
    debug!(target_content_id, "list relationships by target");
    self.store.get_content_relationships_by_target_id(target_content_id).await
  }
}
