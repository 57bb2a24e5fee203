//! Bootstrap configuration and root folder resolution
//!
//! The TOML file only carries bootstrap concerns plus the tracker options. It is
//! read once at startup; changing it requires a restart.
//!
//! # Root folder priority
//!
//! 1. Command-line argument (highest priority)
//! 2. `T2K_ROOT_FOLDER` environment variable
//! 3. `root_folder` key of the TOML config file
//! 4. OS-dependent compiled default (fallback)

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Environment variable overriding the root folder
pub const ROOT_FOLDER_ENV: &str = "T2K_ROOT_FOLDER";

/// File name of the chart database inside the root folder
pub const DATABASE_FILE_NAME: &str = "top2000.db";

/// Bootstrap configuration loaded from TOML
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Root folder holding the chart database (optional)
    #[serde(default)]
    pub root_folder: Option<PathBuf>,

    /// Explicit database path; defaults to `<root_folder>/top2000.db`
    #[serde(default)]
    pub database_path: Option<PathBuf>,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Polling, matching and notification options
    #[serde(default)]
    pub tracker: TrackerSection,

    /// Upstream source endpoints, timeouts and cache lifetimes
    #[serde(default)]
    pub sources: SourcesSection,

    /// Read-only HTTP API
    #[serde(default)]
    pub http: HttpSection,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log file path (optional, logs to stderr if not specified)
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

/// Order in which the station broadcasts the chart
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BroadcastOrder {
    /// Upcoming songs have numerically greater positions
    #[default]
    Ascending,
    /// Upcoming songs have numerically smaller positions (2000 down to 1)
    Countdown,
}

/// `[tracker]` section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackerSection {
    /// Number of upcoming songs to resolve (10 or 20)
    #[serde(default = "default_upcoming_count")]
    pub upcoming_count: u32,

    /// Poll interval in seconds (15-120)
    #[serde(default = "default_update_interval")]
    pub update_interval_seconds: u64,

    /// Master switch for the rule engine
    #[serde(default = "default_true")]
    pub notifications_enabled: bool,

    /// Minimum combined similarity for a match to count as resolved
    #[serde(default = "default_match_threshold")]
    pub match_threshold: f64,

    /// Scores closer than this are treated as a tie
    #[serde(default = "default_tie_epsilon")]
    pub tie_epsilon: f64,

    /// Consecutive unresolved polls tolerated before `current` is cleared
    #[serde(default = "default_unresolved_clear_after")]
    pub unresolved_clear_after: u32,

    /// Chart edition being broadcast
    #[serde(default = "default_edition_year")]
    pub edition_year: i32,

    /// Broadcast direction used to compute upcoming songs
    #[serde(default)]
    pub broadcast_order: BroadcastOrder,

    /// Number of prior editions exposed in position history
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
}

impl Default for TrackerSection {
    fn default() -> Self {
        Self {
            upcoming_count: default_upcoming_count(),
            update_interval_seconds: default_update_interval(),
            notifications_enabled: true,
            match_threshold: default_match_threshold(),
            tie_epsilon: default_tie_epsilon(),
            unresolved_clear_after: default_unresolved_clear_after(),
            edition_year: default_edition_year(),
            broadcast_order: BroadcastOrder::default(),
            history_limit: default_history_limit(),
        }
    }
}

/// `[sources]` section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourcesSection {
    /// Tier 1: structured "now playing" JSON endpoint
    #[serde(default = "default_structured_url")]
    pub structured_url: String,

    /// Tier 2: station page carrying embedded `__NEXT_DATA__` JSON
    #[serde(default = "default_embedded_url")]
    pub embedded_url: String,

    /// Tier 3: third-party playlist page scraped heuristically
    #[serde(default = "default_html_url")]
    pub html_url: String,

    /// Timeout applied to each tier independently
    #[serde(default = "default_tier_timeout")]
    pub tier_timeout_seconds: u64,

    /// Lifetime of a cached "now playing" observation
    #[serde(default = "default_metadata_cache")]
    pub metadata_cache_seconds: u64,

    /// Lifetime of a cached cover art lookup
    #[serde(default = "default_cover_art_cache")]
    pub cover_art_cache_hours: u64,

    /// Upper bound on one cover art lookup; a slower lookup publishes without art
    #[serde(default = "default_cover_art_timeout")]
    pub cover_art_timeout_seconds: u64,

    /// MusicBrainz web service root
    #[serde(default = "default_musicbrainz_url")]
    pub musicbrainz_url: String,

    /// Cover Art Archive root
    #[serde(default = "default_cover_art_archive_url")]
    pub cover_art_archive_url: String,
}

impl Default for SourcesSection {
    fn default() -> Self {
        Self {
            structured_url: default_structured_url(),
            embedded_url: default_embedded_url(),
            html_url: default_html_url(),
            tier_timeout_seconds: default_tier_timeout(),
            metadata_cache_seconds: default_metadata_cache(),
            cover_art_cache_hours: default_cover_art_cache(),
            cover_art_timeout_seconds: default_cover_art_timeout(),
            musicbrainz_url: default_musicbrainz_url(),
            cover_art_archive_url: default_cover_art_archive_url(),
        }
    }
}

/// `[http]` section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpSection {
    /// Serve the read-only API
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Bind address for the read-only API
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for HttpSection {
    fn default() -> Self {
        Self {
            enabled: true,
            bind: default_bind(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

fn default_upcoming_count() -> u32 {
    10
}

fn default_update_interval() -> u64 {
    30
}

fn default_match_threshold() -> f64 {
    0.75
}

fn default_tie_epsilon() -> f64 {
    0.02
}

fn default_unresolved_clear_after() -> u32 {
    2
}

fn default_edition_year() -> i32 {
    2025
}

fn default_history_limit() -> usize {
    5
}

fn default_structured_url() -> String {
    "https://www.nporadio2.nl/api/miniplayer/info?channel=npo-radio-2".to_string()
}

fn default_embedded_url() -> String {
    "https://www.nporadio2.nl/".to_string()
}

fn default_html_url() -> String {
    "https://onlineradiobox.com/nl/radio2/".to_string()
}

fn default_tier_timeout() -> u64 {
    5
}

fn default_metadata_cache() -> u64 {
    30
}

fn default_cover_art_cache() -> u64 {
    24
}

fn default_cover_art_timeout() -> u64 {
    10
}

fn default_musicbrainz_url() -> String {
    "https://musicbrainz.org/ws/2".to_string()
}

fn default_cover_art_archive_url() -> String {
    "https://coverartarchive.org".to_string()
}

fn default_bind() -> String {
    "127.0.0.1:5730".to_string()
}

/// Compiled-in defaults for the current platform
#[derive(Debug, Clone)]
pub struct CompiledDefaults {
    pub root_folder: PathBuf,
    pub log_level: String,
    pub log_file: Option<PathBuf>,
}

impl CompiledDefaults {
    pub fn for_current_platform() -> Self {
        Self {
            root_folder: default_root_folder(),
            log_level: default_log_level(),
            log_file: None,
        }
    }
}

/// OS-dependent default root folder
fn default_root_folder() -> PathBuf {
    if cfg!(target_os = "linux") {
        dirs::data_local_dir()
            .map(|d| d.join("t2k"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/t2k"))
    } else if cfg!(target_os = "macos") {
        dirs::data_dir()
            .map(|d| d.join("t2k"))
            .unwrap_or_else(|| PathBuf::from("/Library/Application Support/t2k"))
    } else if cfg!(target_os = "windows") {
        dirs::data_local_dir()
            .map(|d| d.join("t2k"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\t2k"))
    } else {
        PathBuf::from("./t2k_data")
    }
}

/// Per-user config location, whether or not the file exists
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("t2k").join("config.toml"))
}

/// Locate the TOML config file for this platform
///
/// Linux checks `~/.config/t2k/config.toml` then `/etc/t2k/config.toml`.
/// Returns `None` when no file exists; a missing file is never an error.
pub fn config_file_path() -> Option<PathBuf> {
    if let Some(path) = user_config_path() {
        if path.exists() {
            return Some(path);
        }
    }

    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc/t2k/config.toml");
        if system_config.exists() {
            return Some(system_config);
        }
    }

    None
}

/// Read and parse a TOML config file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read TOML failed ({}): {}", path.display(), e)))?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse TOML failed ({}): {}", path.display(), e)))
}

/// Load the config file if one exists, otherwise fall back to defaults
///
/// A missing file logs a warning and yields defaults. A file that exists but
/// does not parse is an error.
pub fn load_toml_config_or_default(explicit: Option<&Path>) -> Result<TomlConfig> {
    let path = match explicit {
        Some(path) => Some(path.to_path_buf()),
        None => config_file_path(),
    };

    match path {
        Some(path) if path.exists() => {
            debug!("Loading config from {}", path.display());
            load_toml_config(&path)
        }
        Some(path) => {
            warn!("Config file {} not found, using defaults", path.display());
            Ok(TomlConfig::default())
        }
        None => {
            warn!("No config file found, using defaults");
            Ok(TomlConfig::default())
        }
    }
}

/// Write a TOML config file atomically (temp file + rename)
pub fn write_toml_config(config: &TomlConfig, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)
        .map_err(|e| Error::Config(format!("Serialize TOML failed: {}", e)))?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let tmp_path = path.with_extension("toml.tmp");
    std::fs::write(&tmp_path, content)?;
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

/// Resolves the root folder from CLI, environment, TOML and compiled defaults
#[derive(Debug, Clone)]
pub struct RootFolderResolver {
    module_name: String,
    cli_arg: Option<PathBuf>,
    toml_root: Option<PathBuf>,
}

impl RootFolderResolver {
    pub fn new(module_name: &str) -> Self {
        Self {
            module_name: module_name.to_string(),
            cli_arg: None,
            toml_root: None,
        }
    }

    /// Command-line override (highest priority)
    pub fn with_cli_arg(mut self, path: Option<PathBuf>) -> Self {
        self.cli_arg = path;
        self
    }

    /// `root_folder` taken from an already loaded TOML config
    pub fn with_toml_root(mut self, path: Option<PathBuf>) -> Self {
        self.toml_root = path;
        self
    }

    pub fn resolve(&self) -> PathBuf {
        if let Some(path) = &self.cli_arg {
            debug!(module = %self.module_name, "Root folder from command line");
            return path.clone();
        }

        if let Ok(path) = std::env::var(ROOT_FOLDER_ENV) {
            if !path.trim().is_empty() {
                debug!(module = %self.module_name, "Root folder from {}", ROOT_FOLDER_ENV);
                return PathBuf::from(path);
            }
        }

        if let Some(path) = &self.toml_root {
            debug!(module = %self.module_name, "Root folder from TOML config");
            return path.clone();
        }

        CompiledDefaults::for_current_platform().root_folder
    }
}

/// Creates the root folder and derives paths inside it
#[derive(Debug, Clone)]
pub struct RootFolderInitializer {
    root_folder: PathBuf,
}

impl RootFolderInitializer {
    pub fn new(root_folder: PathBuf) -> Self {
        Self { root_folder }
    }

    /// Create the root folder if missing (idempotent)
    pub fn ensure_directory_exists(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.root_folder)
    }

    pub fn database_path(&self) -> PathBuf {
        self.root_folder.join(DATABASE_FILE_NAME)
    }

    pub fn database_exists(&self) -> bool {
        self.database_path().exists()
    }
}

/// User-Agent for MusicBrainz and other well-behaved API clients
pub fn get_user_agent() -> String {
    format!(
        "t2k-tracker/{} ( https://github.com/joeni/ha-top2000 )",
        env!("CARGO_PKG_VERSION")
    )
}
