//! Runtime settings.
//!
//! Layered with the `config` crate: an optional TOML file, then `FOLIO_*`
//! environment variables, then command-line overrides.

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use serde::Deserialize;

/// Store path that selects an in-memory database.
pub const IN_MEMORY: &str = ":memory:";

#[derive(Debug, Deserialize)]
pub struct Settings {
  /// SQLite database file, or `:memory:`.
  #[serde(default = "default_store_path")]
  pub store_path: PathBuf,
}

fn default_store_path() -> PathBuf { PathBuf::from("folio.db") }

impl Settings {
  /// Load settings from `file` (if it exists) and the environment, with
  /// `store_override` taking precedence over both.
  pub fn load(file: &Path, store_override: Option<&Path>) -> anyhow::Result<Self> {
    let settings = config::Config::builder()
      .add_source(config::File::from(file).required(false))
      .add_source(config::Environment::with_prefix("FOLIO"))
      .set_override_option(
        "store_path",
        store_override.map(|p| p.to_string_lossy().into_owned()),
      )
      .context("failed to apply --store")?
      .build()
      .with_context(|| format!("failed to read config file {}", file.display()))?;

    let mut settings: Settings =
      settings.try_deserialize().context("failed to deserialise settings")?;
    settings.store_path = expand_tilde(&settings.store_path);
    Ok(settings)
  }

  pub fn in_memory(&self) -> bool { self.store_path.as_os_str() == IN_MEMORY }
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn defaults_without_a_file() {
    let settings = Settings::load(Path::new("/nonexistent/folio.toml"), None).unwrap();
    if std::env::var_os("FOLIO_STORE_PATH").is_none() {
      assert_eq!(settings.store_path, PathBuf::from("folio.db"));
    }
  }

  #[test]
  fn override_wins() {
    let settings =
      Settings::load(Path::new("/nonexistent/folio.toml"), Some(Path::new(IN_MEMORY))).unwrap();
    assert!(settings.in_memory());
  }

  #[test]
  fn file_values_are_read() {
    let dir = std::env::temp_dir().join(format!("folio-config-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let file = dir.join("folio.toml");
    std::fs::write(&file, "store_path = \"/var/lib/folio/content.db\"\n").unwrap();

    let settings = Settings::load(&file, None).unwrap();
    if std::env::var_os("FOLIO_STORE_PATH").is_none() {
      assert_eq!(settings.store_path, PathBuf::from("/var/lib/folio/content.db"));
    }
    let _ = std::fs::remove_dir_all(&dir);
  }

  #[test]
  fn tilde_expands_to_home() {
    let Ok(home) = std::env::var("HOME") else { return };
    assert_eq!(expand_tilde(Path::new("~/folio.db")), PathBuf::from(home).join("folio.db"));
    assert_eq!(expand_tilde(Path::new("/abs/folio.db")), PathBuf::from("/abs/folio.db"));
  }
}
