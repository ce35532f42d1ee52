//! `folio`: command-line access to a Folio content repository.
//!
//! # Usage
//!
//! ```text
//! folio schema create invoice
//! folio schema add-version 1 1 invoice.xsd
//! folio content create --name "March" --schema-id 1 march.xml
//! folio --store :memory: validate march.xml invoice.xsd
//! ```
//!
//! Records are printed to stdout as pretty JSON. Logs go to stderr and are
//! filtered with `RUST_LOG` (default `info`).

mod settings;

use std::{
  path::{Path, PathBuf},
  process::ExitCode,
};

use anyhow::{Context as _, bail};
use clap::{Args, Parser, Subcommand};
use folio_core::{
  content::ContentUpdate,
  validate::{ContentValidator, Violation},
};
use folio_service::ContentService;
use folio_store_sqlite::SqliteStore;
use folio_xsd::XsdValidator;
use serde::Serialize;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use crate::settings::Settings;

type Service = ContentService<SqliteStore, XsdValidator>;

// ─── CLI args ────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "folio", version, about = "Schema-versioned XML content repository")]
struct Cli {
  /// Path to a TOML config file.
  #[arg(short, long, value_name = "FILE", default_value = "folio.toml")]
  config: PathBuf,

  /// SQLite database to use; `:memory:` for a throwaway store.
  #[arg(long, value_name = "PATH")]
  store: Option<PathBuf>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Manage schemas and their versions.
  #[command(subcommand)]
  Schema(SchemaCommand),

  /// Create, inspect, and archive content.
  #[command(subcommand)]
  Content(ContentCommand),

  /// Link content items to each other.
  #[command(subcommand)]
  Relation(RelationCommand),

  /// Check an XML file against an XSD file without touching the store.
  Validate {
    xml: PathBuf,
    xsd: PathBuf,
  },
}

#[derive(Subcommand, Debug)]
enum SchemaCommand {
  /// Register a new schema name.
  Create { name: String },
  /// Look a schema up by name.
  Show { name: String },
  /// List every schema.
  List,
  /// Add a version to a schema from an XSD file.
  AddVersion {
    schema_id: i64,
    version:   i64,
    xsd_file:  PathBuf,
  },
  /// Show a schema version by its id.
  Version { version_id: i64 },
  /// Show the latest version of a schema.
  Latest { schema_id: i64 },
  /// List the versions of a schema.
  Versions { schema_id: i64 },
}

#[derive(Subcommand, Debug)]
enum ContentCommand {
  /// Validate an XML file against the latest schema version and store it.
  Create {
    #[arg(long)]
    name:      String,
    #[arg(long)]
    schema_id: i64,
    #[arg(long)]
    parent:    Option<String>,
    /// Use this id instead of a generated UUID.
    #[arg(long)]
    id:        Option<String>,
    xml_file:  PathBuf,
  },
  /// Show one content item, archived or not.
  Get { content_id: String },
  /// Change fields of an active content item.
  Update {
    content_id:     String,
    #[arg(long)]
    name:           Option<String>,
    #[arg(long, conflicts_with = "root")]
    parent:         Option<String>,
    /// Move the item to the top level.
    #[arg(long)]
    root:           bool,
    #[arg(long, value_name = "VERSION_ID")]
    schema_version: Option<i64>,
    /// Replace the document with the contents of this file.
    #[arg(long)]
    file:           Option<PathBuf>,
  },
  /// Archive a content item. It stays readable but can no longer change.
  Archive { content_id: String },
  /// List the children of an item, or top-level content.
  Children {
    #[arg(long)]
    parent: Option<String>,
    /// Include archived content.
    #[arg(long)]
    all:    bool,
  },
}

#[derive(Subcommand, Debug)]
enum RelationCommand {
  /// Record a link from SOURCE to TARGET.
  Create { source: String, target: String },
  /// List links by one endpoint.
  List {
    #[command(flatten)]
    end: Endpoint,
  },
}

#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
struct Endpoint {
  #[arg(long)]
  source: Option<String>,
  #[arg(long)]
  target: Option<String>,
}

// ─── Entry point ─────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
  // Logs go to stderr so stdout stays machine-readable.
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .with_writer(std::io::stderr)
    .init();

  let cli = Cli::parse();

  let result = run(cli).await;
  if let Err(err) = &result {
    for violation in violations_of(err) {
      eprintln!("  {violation}");
    }
  }
  result
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
  let service = || open_service(&cli.config, cli.store.as_deref());
  match cli.command {
    Command::Validate { xml, xsd } => return validate_files(&xml, &xsd),
    Command::Schema(cmd) => schema(&service().await?, cmd).await?,
    Command::Content(cmd) => content(&service().await?, cmd).await?,
    Command::Relation(cmd) => relation(&service().await?, cmd).await?,
  }
  Ok(ExitCode::SUCCESS)
}

async fn open_service(config: &Path, store: Option<&Path>) -> anyhow::Result<Service> {
  let settings = Settings::load(config, store)?;
  let store = if settings.in_memory() {
    SqliteStore::open_in_memory().await
  } else {
    SqliteStore::open(&settings.store_path).await
  }
  .with_context(|| format!("failed to open store at {:?}", settings.store_path))?;
  tracing::debug!(path = ?settings.store_path, "opened store");
  Ok(ContentService::new(store, XsdValidator))
}

// ─── Commands ────────────────────────────────────────────────────────────────

async fn schema(service: &Service, cmd: SchemaCommand) -> anyhow::Result<()> {
  match cmd {
    SchemaCommand::Create { name } => print_json(&service.create_schema(&name).await?),
    SchemaCommand::Show { name } => {
      let schema = service.get_schema_by_name(&name).await?;
      print_json(&found(schema, || format!("no schema named {name:?}"))?)
    }
    SchemaCommand::List => print_json(&service.list_schemas().await?),
    SchemaCommand::AddVersion { schema_id, version, xsd_file } => {
      let xml = read_file(&xsd_file)?;
      print_json(&service.create_schema_version(schema_id, version, xml).await?)
    }
    SchemaCommand::Version { version_id } => {
      let version = service.get_schema_version_by_id(version_id).await?;
      print_json(&found(version, || format!("no schema version {version_id}"))?)
    }
    SchemaCommand::Latest { schema_id } => {
      let version = service.get_latest_schema_version_by_schema_id(schema_id).await?;
      print_json(&found(version, || format!("schema {schema_id} has no versions"))?)
    }
    SchemaCommand::Versions { schema_id } => {
      print_json(&service.list_schema_versions(schema_id).await?)
    }
  }
}

async fn content(service: &Service, cmd: ContentCommand) -> anyhow::Result<()> {
  match cmd {
    ContentCommand::Create { name, schema_id, parent, id, xml_file } => {
      let xml = read_file(&xml_file)?;
      let parent = parent.as_deref();
      let content_id = match id {
        Some(id) => service.create_content_with_id(&id, &name, parent, schema_id, &xml).await?,
        None => service.create_content(&name, parent, schema_id, &xml).await?,
      };
      let created = service.get_content_by_id(&content_id).await?;
      print_json(&found(created, || format!("content {content_id} vanished after create"))?)
    }
    ContentCommand::Get { content_id } => {
      let content = service.get_content_by_id(&content_id).await?;
      print_json(&found(content, || format!("no content with id {content_id}"))?)
    }
    ContentCommand::Update { content_id, name, parent, root, schema_version, file } => {
      let mut update = ContentUpdate { name, schema_version_id: schema_version, ..Default::default() };
      if root {
        update.parent_id = Some(None);
      } else if let Some(parent) = parent {
        update.parent_id = Some(Some(parent));
      }
      if let Some(file) = file {
        update.content_xml = Some(read_file(&file)?);
      }
      if update.is_empty() {
        bail!("nothing to update; pass at least one of --name, --parent, --root, --schema-version, --file");
      }
      print_json(&service.update_content(&content_id, update).await?)
    }
    ContentCommand::Archive { content_id } => {
      print_json(&service.archive_content(&content_id).await?)
    }
    ContentCommand::Children { parent, all } => {
      let parent = parent.as_deref();
      let children = if all {
        service.get_all_content_by_parent_id(parent).await?
      } else {
        service.get_content_by_parent_id(parent).await?
      };
      print_json(&children)
    }
  }
}

async fn relation(service: &Service, cmd: RelationCommand) -> anyhow::Result<()> {
  match cmd {
    RelationCommand::Create { source, target } => {
      print_json(&service.create_content_relationship(&source, &target).await?)
    }
    RelationCommand::List { end: Endpoint { source: Some(source), .. } } => {
      print_json(&service.get_content_relationships_by_source_id(&source).await?)
    }
    RelationCommand::List { end: Endpoint { target: Some(target), .. } } => {
      print_json(&service.get_content_relationships_by_target_id(&target).await?)
    }
    RelationCommand::List { .. } => bail!("pass --source or --target"),
  }
}

fn validate_files(xml: &Path, xsd: &Path) -> anyhow::Result<ExitCode> {
  let violations = XsdValidator.violations(&read_file(xml)?, &read_file(xsd)?);
  if violations.is_empty() {
    println!("{}: valid", xml.display());
    return Ok(ExitCode::SUCCESS);
  }
  for violation in &violations {
    println!("{violation}");
  }
  tracing::warn!(violations = violations.len(), file = %xml.display(), "document is not valid");
  Ok(ExitCode::FAILURE)
}

// ─── Helpers ─────────────────────────────────────────────────────────────────

fn read_file(path: &Path) -> anyhow::Result<String> {
  std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

fn found<T>(value: Option<T>, missing: impl FnOnce() -> String) -> anyhow::Result<T> {
  value.ok_or_else(|| anyhow::anyhow!(missing()))
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
  println!("{}", serde_json::to_string_pretty(value).context("failed to encode output")?);
  Ok(())
}

/// Violations carried by a validation failure, for printing under the error.
fn violations_of(err: &anyhow::Error) -> &[Violation] {
  let core = err
    .downcast_ref::<folio_store_sqlite::Error>()
    .and_then(folio_store_sqlite::Error::core);
  match core {
    Some(folio_core::Error::ValidationFailed { violations, .. }) => violations.as_slice(),
    Some(folio_core::Error::InvalidSchema(violations)) => violations.as_slice(),
    _ => &[],
  }
}
