//! SQL schema for the Folio SQLite store.
//!
//! Executed once at connection startup. `PRAGMA user_version` records the
//! layout so later migrations can be gated on it.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS schemas (
    schema_id   INTEGER PRIMARY KEY AUTOINCREMENT,
    name        TEXT NOT NULL UNIQUE,
    created_at  TEXT NOT NULL
);

-- Versions are immutable once written.
CREATE TABLE IF NOT EXISTS schema_versions (
    schema_version_id INTEGER PRIMARY KEY AUTOINCREMENT,
    schema_id         INTEGER NOT NULL REFERENCES schemas(schema_id),
    version           INTEGER NOT NULL,
    xml_content       TEXT NOT NULL,
    created_at        TEXT NOT NULL,
    UNIQUE (schema_id, version)
);

-- Rows are never deleted; archiving flips status.
CREATE TABLE IF NOT EXISTS content (
    content_id        TEXT PRIMARY KEY,
    parent_id         TEXT REFERENCES content(content_id),
    name              TEXT NOT NULL,
    schema_version_id INTEGER NOT NULL REFERENCES schema_versions(schema_version_id),
    content_xml       TEXT NOT NULL,
    status            TEXT NOT NULL DEFAULT 'active',   -- 'active' | 'archived'
    created_at        TEXT NOT NULL,
    updated_at        TEXT NOT NULL,
    archived_at       TEXT
);

CREATE TABLE IF NOT EXISTS content_relationships (
    relationship_id   INTEGER PRIMARY KEY AUTOINCREMENT,
    source_content_id TEXT NOT NULL REFERENCES content(content_id),
    target_content_id TEXT NOT NULL REFERENCES content(content_id),
    created_at        TEXT NOT NULL,
    CHECK (source_content_id != target_content_id)
);

CREATE INDEX IF NOT EXISTS schema_versions_schema_idx ON schema_versions(schema_id);
CREATE INDEX IF NOT EXISTS content_parent_idx         ON content(parent_id);
CREATE INDEX IF NOT EXISTS relationships_source_idx   ON content_relationships(source_content_id);
CREATE INDEX IF NOT EXISTS relationships_target_idx   ON content_relationships(target_content_id);

PRAGMA user_version = 1;
";
