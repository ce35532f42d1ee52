//! [`SqliteStore`], the SQLite implementation of [`FolioStore`].

use std::path::Path;

use chrono::Utc;
use folio_core::{
  content::{Content, ContentStatus, ContentUpdate, NewContent},
  relationship::ContentRelationship,
  schema::{Schema, SchemaVersion},
  store::FolioStore,
};
use rusqlite::{Connection, OptionalExtension as _, Params, params};

use crate::{
  Result,
  encode::{
    CONTENT_COLUMNS, RELATIONSHIP_COLUMNS, RawContent, RawRelationship, RawSchema,
    RawSchemaVersion, SCHEMA_COLUMNS, SCHEMA_VERSION_COLUMNS, encode_dt, encode_status,
  },
  schema::SCHEMA,
};

/// Outcome of a closure run on the connection thread: a database failure
/// on the outside, a domain failure on the inside.
type Checked<T> = tokio_rusqlite::Result<std::result::Result<T, folio_core::Error>>;

// ─── Row helpers ─────────────────────────────────────────────────────────────
//
// These run on the connection thread. They take `&Connection` so they work
// with a plain connection or an open transaction alike.

fn exists(conn: &Connection, sql: &str, params: impl Params) -> rusqlite::Result<bool> {
  Ok(conn.query_row(sql, params, |_| Ok(())).optional()?.is_some())
}

fn content_exists(conn: &Connection, content_id: &str) -> rusqlite::Result<bool> {
  exists(conn, "SELECT 1 FROM content WHERE content_id = ?1", params![content_id])
}

fn schema_version_exists(conn: &Connection, schema_version_id: i64) -> rusqlite::Result<bool> {
  exists(
    conn,
    "SELECT 1 FROM schema_versions WHERE schema_version_id = ?1",
    params![schema_version_id],
  )
}

fn content_row(conn: &Connection, content_id: &str) -> rusqlite::Result<Option<RawContent>> {
  conn
    .query_row(
      &format!("SELECT {CONTENT_COLUMNS} FROM content WHERE content_id = ?1"),
      params![content_id],
      RawContent::from_row,
    )
    .optional()
}

/// Walk up from `parent_id` and report whether `content_id` is on the way,
/// which would make the content its own ancestor.
fn is_ancestor_or_self(
  conn: &Connection,
  content_id: &str,
  parent_id: &str,
) -> rusqlite::Result<bool> {
  let mut current = Some(parent_id.to_owned());
  while let Some(id) = current {
    if id == content_id {
      return Ok(true);
    }
    current = conn
      .query_row(
        "SELECT parent_id FROM content WHERE content_id = ?1",
        params![id],
        |row| row.get::<_, Option<String>>(0),
      )
      .optional()?
      .flatten();
  }
  Ok(false)
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Folio repository backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store; useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn relationships_where(
    &self,
    column: &'static str,
    content_id: &str,
  ) -> Result<Vec<ContentRelationship>> {
    let content_id = content_id.to_owned();

    let raws: Vec<RawRelationship> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {RELATIONSHIP_COLUMNS} FROM content_relationships
           WHERE {column} = ?1
           ORDER BY relationship_id"
        ))?;
        let rows = stmt
          .query_map(params![content_id], RawRelationship::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawRelationship::into_relationship).collect()
  }
}

// ─── FolioStore impl ─────────────────────────────────────────────────────────

impl FolioStore for SqliteStore {
  type Error = crate::Error;

  // ── Schemas ───────────────────────────────────────────────────────────────

  async fn create_schema(&self, name: &str) -> Result<Schema> {
    let name = name.to_owned();
    let created_at = Utc::now();
    let at_str = encode_dt(created_at);

    let (schema_id, name) = self
      .conn
      .call(move |conn| -> Checked<(i64, String)> {
        let tx = conn.transaction()?;
        if exists(&tx, "SELECT 1 FROM schemas WHERE name = ?1", params![name])? {
          return Ok(Err(folio_core::Error::DuplicateName(name)));
        }
        tx.execute(
          "INSERT INTO schemas (name, created_at) VALUES (?1, ?2)",
          params![name, at_str],
        )?;
        let schema_id = tx.last_insert_rowid();
        tx.commit()?;
        Ok(Ok((schema_id, name)))
      })
      .await??;

    Ok(Schema { schema_id, name, created_at })
  }

  async fn get_schema_by_name(&self, name: &str) -> Result<Option<Schema>> {
    let name = name.to_owned();

    let raw: Option<RawSchema> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {SCHEMA_COLUMNS} FROM schemas WHERE name = ?1"),
              params![name],
              RawSchema::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawSchema::into_schema).transpose()
  }

  async fn get_schema(&self, schema_id: i64) -> Result<Option<Schema>> {
    let raw: Option<RawSchema> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {SCHEMA_COLUMNS} FROM schemas WHERE schema_id = ?1"),
              params![schema_id],
              RawSchema::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawSchema::into_schema).transpose()
  }

  async fn list_schemas(&self) -> Result<Vec<Schema>> {
    let raws: Vec<RawSchema> = self
      .conn
      .call(|conn| {
        let mut stmt =
          conn.prepare(&format!("SELECT {SCHEMA_COLUMNS} FROM schemas ORDER BY schema_id"))?;
        let rows = stmt
          .query_map([], RawSchema::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawSchema::into_schema).collect()
  }

  // ── Schema versions ───────────────────────────────────────────────────────

  async fn create_schema_version(
    &self,
    schema_id:   i64,
    version:     i64,
    xml_content: String,
  ) -> Result<SchemaVersion> {
    let created_at = Utc::now();
    let at_str = encode_dt(created_at);

    let (schema_version_id, xml_content) = self
      .conn
      .call(move |conn| -> Checked<(i64, String)> {
        let tx = conn.transaction()?;

        if !exists(&tx, "SELECT 1 FROM schemas WHERE schema_id = ?1", params![schema_id])? {
          return Ok(Err(folio_core::Error::UnknownSchema(schema_id)));
        }

        if exists(
          &tx,
          "SELECT 1 FROM schema_versions WHERE schema_id = ?1 AND version = ?2",
          params![schema_id, version],
        )? {
          return Ok(Err(folio_core::Error::DuplicateVersion { schema_id, version }));
        }

        let latest: i64 = tx.query_row(
          "SELECT COALESCE(MAX(version), 0) FROM schema_versions WHERE schema_id = ?1",
          params![schema_id],
          |row| row.get(0),
        )?;
        if version <= latest {
          return Ok(Err(folio_core::Error::InvalidVersion { schema_id, version, latest }));
        }

        tx.execute(
          "INSERT INTO schema_versions (schema_id, version, xml_content, created_at)
           VALUES (?1, ?2, ?3, ?4)",
          params![schema_id, version, xml_content, at_str],
        )?;
        let schema_version_id = tx.last_insert_rowid();
        tx.commit()?;
        Ok(Ok((schema_version_id, xml_content)))
      })
      .await??;

    Ok(SchemaVersion { schema_version_id, schema_id, version, xml_content, created_at })
  }

  async fn get_schema_version_by_id(&self, schema_version_id: i64) -> Result<Option<SchemaVersion>> {
    let raw: Option<RawSchemaVersion> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!(
                "SELECT {SCHEMA_VERSION_COLUMNS} FROM schema_versions WHERE schema_version_id = ?1"
              ),
              params![schema_version_id],
              RawSchemaVersion::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawSchemaVersion::into_schema_version).transpose()
  }

  async fn get_latest_schema_version_by_schema_id(
    &self,
    schema_id: i64,
  ) -> Result<Option<SchemaVersion>> {
    let raw: Option<RawSchemaVersion> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!(
                "SELECT {SCHEMA_VERSION_COLUMNS} FROM schema_versions
                 WHERE schema_id = ?1
                 ORDER BY version DESC
                 LIMIT 1"
              ),
              params![schema_id],
              RawSchemaVersion::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawSchemaVersion::into_schema_version).transpose()
  }

  async fn list_schema_versions(&self, schema_id: i64) -> Result<Vec<SchemaVersion>> {
    let raws: Vec<RawSchemaVersion> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {SCHEMA_VERSION_COLUMNS} FROM schema_versions
           WHERE schema_id = ?1
           ORDER BY version"
        ))?;
        let rows = stmt
          .query_map(params![schema_id], RawSchemaVersion::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawSchemaVersion::into_schema_version).collect()
  }

  // ── Content ───────────────────────────────────────────────────────────────

  async fn create_content(&self, input: NewContent) -> Result<Content> {
    let now = encode_dt(Utc::now());
    let status = encode_status(ContentStatus::Active);

    let raw: RawContent = self
      .conn
      .call(move |conn| -> Checked<RawContent> {
        let tx = conn.transaction()?;

        if content_exists(&tx, &input.content_id)? {
          return Ok(Err(folio_core::Error::DuplicateId(input.content_id)));
        }
        if !schema_version_exists(&tx, input.schema_version_id)? {
          return Ok(Err(folio_core::Error::UnknownSchemaVersion(input.schema_version_id)));
        }
        if let Some(parent_id) = &input.parent_id
          && !content_exists(&tx, parent_id)?
        {
          return Ok(Err(folio_core::Error::UnknownParent(parent_id.clone())));
        }

        tx.execute(
          "INSERT INTO content (
             content_id, parent_id, name, schema_version_id, content_xml,
             status, created_at, updated_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
          params![
            input.content_id,
            input.parent_id,
            input.name,
            input.schema_version_id,
            input.content_xml,
            status,
            now,
          ],
        )?;
        let raw = content_row(&tx, &input.content_id)?
          .ok_or(rusqlite::Error::QueryReturnedNoRows)?;
        tx.commit()?;
        Ok(Ok(raw))
      })
      .await??;

    raw.into_content()
  }

  async fn get_content_by_id(&self, content_id: &str) -> Result<Option<Content>> {
    let content_id = content_id.to_owned();

    let raw: Option<RawContent> = self
      .conn
      .call(move |conn| Ok(content_row(conn, &content_id)?))
      .await?;

    raw.map(RawContent::into_content).transpose()
  }

  async fn update_content(&self, content_id: &str, update: ContentUpdate) -> Result<Content> {
    let content_id = content_id.to_owned();
    let now = encode_dt(Utc::now());

    let raw: RawContent = self
      .conn
      .call(move |conn| -> Checked<RawContent> {
        let tx = conn.transaction()?;

        let Some(current) = content_row(&tx, &content_id)? else {
          return Ok(Err(folio_core::Error::NotFound(content_id)));
        };
        if current.status != encode_status(ContentStatus::Active) {
          return Ok(Err(folio_core::Error::ArchivedImmutable(content_id)));
        }

        if let Some(Some(parent_id)) = &update.parent_id {
          if !content_exists(&tx, parent_id)? {
            return Ok(Err(folio_core::Error::UnknownParent(parent_id.clone())));
          }
          if is_ancestor_or_self(&tx, &content_id, parent_id)? {
            return Ok(Err(folio_core::Error::SelfParent(content_id)));
          }
        }
        if let Some(schema_version_id) = update.schema_version_id
          && !schema_version_exists(&tx, schema_version_id)?
        {
          return Ok(Err(folio_core::Error::UnknownSchemaVersion(schema_version_id)));
        }

        let parent_id = update.parent_id.unwrap_or(current.parent_id);
        tx.execute(
          "UPDATE content
           SET name = ?2, parent_id = ?3, schema_version_id = ?4, content_xml = ?5,
               updated_at = ?6
           WHERE content_id = ?1",
          params![
            content_id,
            update.name.unwrap_or(current.name),
            parent_id,
            update.schema_version_id.unwrap_or(current.schema_version_id),
            update.content_xml.unwrap_or(current.content_xml),
            now,
          ],
        )?;
        let raw = content_row(&tx, &content_id)?.ok_or(rusqlite::Error::QueryReturnedNoRows)?;
        tx.commit()?;
        Ok(Ok(raw))
      })
      .await??;

    raw.into_content()
  }

  async fn archive_content(&self, content_id: &str) -> Result<Content> {
    let content_id = content_id.to_owned();
    let now = encode_dt(Utc::now());
    let archived = encode_status(ContentStatus::Archived);

    let raw: RawContent = self
      .conn
      .call(move |conn| -> Checked<RawContent> {
        let tx = conn.transaction()?;
        let Some(current) = content_row(&tx, &content_id)? else {
          return Ok(Err(folio_core::Error::NotFound(content_id)));
        };
        if current.status == archived {
          return Ok(Ok(current));
        }
        tx.execute(
          "UPDATE content SET status = ?2, archived_at = ?3, updated_at = ?3
           WHERE content_id = ?1",
          params![content_id, archived, now],
        )?;
        let raw = content_row(&tx, &content_id)?.ok_or(rusqlite::Error::QueryReturnedNoRows)?;
        tx.commit()?;
        Ok(Ok(raw))
      })
      .await??;

    raw.into_content()
  }

  async fn get_content_by_parent_id(
    &self,
    parent_id:        Option<&str>,
    include_archived: bool,
  ) -> Result<Vec<Content>> {
    let parent_id = parent_id.map(str::to_owned);
    let active = encode_status(ContentStatus::Active);

    let raws: Vec<RawContent> = self
      .conn
      .call(move |conn| {
        // `IS` compares NULL to NULL, so `None` selects root content.
        let mut stmt = conn.prepare(&format!(
          "SELECT {CONTENT_COLUMNS} FROM content
           WHERE parent_id IS ?1
             AND (?2 OR status = ?3)
           ORDER BY rowid"
        ))?;
        let rows = stmt
          .query_map(params![parent_id, include_archived, active], RawContent::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawContent::into_content).collect()
  }

  // ── Relationships ─────────────────────────────────────────────────────────

  async fn create_content_relationship(
    &self,
    source_content_id: &str,
    target_content_id: &str,
  ) -> Result<ContentRelationship> {
    let source = source_content_id.to_owned();
    let target = target_content_id.to_owned();
    let created_at = Utc::now();
    let at_str = encode_dt(created_at);

    let (relationship_id, source_content_id, target_content_id) = self
      .conn
      .call(move |conn| -> Checked<(i64, String, String)> {
        let tx = conn.transaction()?;
        if !content_exists(&tx, &source)? {
          return Ok(Err(folio_core::Error::UnknownSource(source)));
        }
        if !content_exists(&tx, &target)? {
          return Ok(Err(folio_core::Error::UnknownTarget(target)));
        }
        if source == target {
          return Ok(Err(folio_core::Error::SelfRelationship(source)));
        }
        tx.execute(
          "INSERT INTO content_relationships (source_content_id, target_content_id, created_at)
           VALUES (?1, ?2, ?3)",
          params![source, target, at_str],
        )?;
        let relationship_id = tx.last_insert_rowid();
        tx.commit()?;
        Ok(Ok((relationship_id, source, target)))
      })
      .await??;

    Ok(ContentRelationship { relationship_id, source_content_id, target_content_id, created_at })
  }

  async fn get_content_relationships_by_source_id(
    &self,
    source_content_id: &str,
  ) -> Result<Vec<ContentRelationship>> {
    self.relationships_where("source_content_id", source_content_id).await
  }

  async fn get_content_relationships_by_target_id(
    &self,
    target_content_id: &str,
  ) -> Result<Vec<ContentRelationship>> {
    self.relationships_where("target_content_id", target_content_id).await
  }
}
