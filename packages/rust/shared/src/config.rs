//! Application configuration for Markfold.
//!
//! User config lives at `~/.markfold/markfold.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{MarkfoldError, Result};
use crate::types::{FolderId, TOOLBAR_FOLDER_ID};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "markfold.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".markfold";

/// Model used when none is configured.
pub const DEFAULT_MODEL: &str = "gpt-4.1-mini";

/// Default OpenAI-compatible API root.
pub const DEFAULT_API_BASE_URL: &str = "https://api.openai.com/v1";

// ---------------------------------------------------------------------------
// Config structs (matching markfold.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Remote classifier settings.
    #[serde(default)]
    pub classifier: ClassifierConfig,

    /// Page snapshot settings.
    #[serde(default)]
    pub snapshot: SnapshotConfig,

    /// Bookmark library settings.
    #[serde(default)]
    pub library: LibraryConfig,
}

/// `[classifier]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    /// Name of the env var holding the API key (never store the key itself).
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// OpenAI-compatible API root, without the `/chat/completions` suffix.
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Chat model used for classification.
    #[serde(default = "default_model")]
    pub model_name: String,

    /// Upper bound for one classification request.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_api_key_env(),
            api_base_url: default_api_base_url(),
            model_name: default_model(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

fn default_api_key_env() -> String {
    "MARKFOLD_API_KEY".into()
}
fn default_api_base_url() -> String {
    DEFAULT_API_BASE_URL.into()
}
fn default_model() -> String {
    DEFAULT_MODEL.into()
}
fn default_request_timeout() -> u64 {
    60
}

/// `[snapshot]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotConfig {
    /// How long to wait for the extraction agent's reply.
    #[serde(default = "default_snapshot_timeout")]
    pub timeout_ms: u64,

    /// HTTP timeout used by the fetching extraction agent.
    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout_secs: u64,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_snapshot_timeout(),
            fetch_timeout_secs: default_fetch_timeout(),
        }
    }
}

impl SnapshotConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

fn default_snapshot_timeout() -> u64 {
    5000
}
fn default_fetch_timeout() -> u64 {
    15
}

/// `[library]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LibraryConfig {
    /// Bookmark database location (`~` expands to the home directory).
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Container new category folders are created under.
    #[serde(default = "default_root_folder_id")]
    pub root_folder_id: String,

    /// Names a classifier may use for the root container.
    #[serde(default = "default_root_aliases")]
    pub root_aliases: Vec<String>,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            root_folder_id: default_root_folder_id(),
            root_aliases: default_root_aliases(),
        }
    }
}

impl LibraryConfig {
    pub fn root_folder(&self) -> FolderId {
        FolderId(self.root_folder_id.clone())
    }

    /// The database path with a leading `~` expanded.
    pub fn database_file(&self) -> Result<PathBuf> {
        expand_home(&self.database_path)
    }
}

fn default_database_path() -> String {
    "~/.markfold/bookmarks.db".into()
}
fn default_root_folder_id() -> String {
    TOOLBAR_FOLDER_ID.into()
}
fn default_root_aliases() -> Vec<String> {
    vec!["Bookmarks Bar".into(), "书签栏".into()]
}

// ---------------------------------------------------------------------------
// Classifier settings (runtime, merged from config + environment)
// ---------------------------------------------------------------------------

/// Settings handed to the classification client.
#[derive(Clone, Default)]
pub struct ClassifierSettings {
    pub api_key: Option<String>,
    pub api_base_url: Option<String>,
    pub model_name: Option<String>,
}

impl std::fmt::Debug for ClassifierSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClassifierSettings")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("api_base_url", &self.api_base_url)
            .field("model_name", &self.model_name)
            .finish()
    }
}

impl ClassifierSettings {
    /// Merge the config file with the environment; `lookup` reads a variable.
    pub fn resolve(config: &AppConfig, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |s: &str| {
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_string())
        };
        Self {
            api_key: lookup(&config.classifier.api_key_env).and_then(|k| non_empty(&k)),
            api_base_url: non_empty(&config.classifier.api_base_url),
            model_name: non_empty(&config.classifier.model_name),
        }
    }

    /// Resolve against the process environment.
    pub fn from_env(config: &AppConfig) -> Self {
        Self::resolve(config, |name| std::env::var(name).ok())
    }

    /// Check that both the API key and the base URL are present.
    pub fn validate(&self) -> Result<()> {
        if self.api_key.is_none() {
            return Err(MarkfoldError::ConfigurationMissing("API key".into()));
        }
        if self.api_base_url.is_none() {
            return Err(MarkfoldError::ConfigurationMissing("API base URL".into()));
        }
        Ok(())
    }

    /// Configured model or [`DEFAULT_MODEL`].
    pub fn model(&self) -> &str {
        self.model_name.as_deref().unwrap_or(DEFAULT_MODEL)
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.markfold/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| MarkfoldError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.markfold/markfold.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| MarkfoldError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| MarkfoldError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| MarkfoldError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| MarkfoldError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| MarkfoldError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Expand a leading `~/` to the user's home directory.
fn expand_home(path: &str) -> Result<PathBuf> {
    match path.strip_prefix("~/") {
        Some(rest) => {
            let home = dirs::home_dir()
                .ok_or_else(|| MarkfoldError::config("could not determine home directory"))?;
            Ok(home.join(rest))
        }
        None => Ok(PathBuf::from(path)),
    }
}
