//! Configuration for the docgate server, read from `docgate.toml`.
//!
//! Layering is defaults → file → environment → CLI flags. The environment
//! layer reads `DOCGATE_*` variables (a `.env` file is loaded first by the
//! binary); CLI flags are applied by the command that owns them.
//!
//! # Configuration File Format
//!
//! ```toml
//! [server]
//! host = "127.0.0.1"
//! port = 8000
//! cors_permissive = false
//!
//! [store]
//! db_path = "docgate.db"
//! schema_file = "record_types.yaml"
//!
//! [query]
//! default_page_length = 10
//! max_page_length = 500
//! default_order_by = "modified desc"
//! link_keying = "field_name"
//!
//! [logging]
//! level = "info"
//! format = "pretty"
//! dir = "logs"
//!
//! [context]
//! default_user = "Guest"
//!
//! [hooks]
//! activity_log = true
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::gateway::query::OrderBy;
use crate::gateway::service::{GatewayOptions, LinkKeying};

pub const DEFAULT_CONFIG_FILE: &str = "docgate.toml";

/// Console log format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable, coloured when attached to a terminal
    #[default]
    Pretty,
    /// One JSON object per event
    Json,
}

impl std::fmt::Display for LogFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogFormat::Pretty => write!(f, "pretty"),
            LogFormat::Json => write!(f, "json"),
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pretty" | "text" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            _ => anyhow::bail!("Invalid log format '{}'. Valid values: pretty, json", s),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSection {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Allow any origin (for local frontends)
    #[serde(default)]
    pub cors_permissive: bool,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8000
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_permissive: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreSection {
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,
    /// Record types registered at startup (YAML or JSON)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_file: Option<PathBuf>,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("docgate.db")
}

impl Default for StoreSection {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            schema_file: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuerySection {
    #[serde(default = "default_page_length")]
    pub default_page_length: u64,
    #[serde(default = "default_max_page_length")]
    pub max_page_length: u64,
    #[serde(default = "default_order_by")]
    pub default_order_by: String,
    #[serde(default)]
    pub link_keying: LinkKeying,
}

fn default_page_length() -> u64 {
    10
}

fn default_max_page_length() -> u64 {
    500
}

fn default_order_by() -> String {
    "modified desc".to_string()
}

impl Default for QuerySection {
    fn default() -> Self {
        Self {
            default_page_length: default_page_length(),
            max_page_length: default_max_page_length(),
            default_order_by: default_order_by(),
            link_keying: LinkKeying::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSection {
    /// Filter directive used when `RUST_LOG` is unset
    #[serde(default = "default_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
    /// Directory for daily-rolling log files; console only when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
}

fn default_level() -> String {
    "info".to_string()
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: default_level(),
            format: LogFormat::default(),
            dir: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextSection {
    /// User recorded on writes when no user header is sent
    #[serde(default = "default_user")]
    pub default_user: String,
}

fn default_user() -> String {
    "Guest".to_string()
}

impl Default for ContextSection {
    fn default() -> Self {
        Self {
            default_user: default_user(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HooksSection {
    #[serde(default = "default_activity_log")]
    pub activity_log: bool,
}

fn default_activity_log() -> bool {
    true
}

impl Default for HooksSection {
    fn default() -> Self {
        Self {
            activity_log: default_activity_log(),
        }
    }
}

/// The complete docgate.toml configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocgateConfig {
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub store: StoreSection,
    #[serde(default)]
    pub query: QuerySection,
    #[serde(default)]
    pub logging: LoggingSection,
    #[serde(default)]
    pub context: ContextSection,
    #[serde(default)]
    pub hooks: HooksSection,
}

impl DocgateConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse docgate.toml")
    }

    /// Load an explicit config file, or `docgate.toml` in the working
    /// directory when present, else defaults. Environment overrides are
    /// applied on top.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        let mut config = match explicit {
            Some(path) => Self::load(path)?,
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                Self::load(Path::new(DEFAULT_CONFIG_FILE))?
            }
            None => Self::default(),
        };
        config.apply_env()?;
        Ok(config)
    }

    /// Save configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_toml()?)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize docgate.toml")
    }

    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_env_from(|key| std::env::var(key).ok())
    }

    /// Apply `DOCGATE_*` overrides looked up through `lookup`.
    pub fn apply_env_from(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(host) = get("DOCGATE_HOST") {
            self.server.host = host;
        }
        if let Some(port) = get("DOCGATE_PORT") {
            self.server.port = port
                .parse()
                .with_context(|| format!("Invalid DOCGATE_PORT '{}'", port))?;
        }
        if let Some(path) = get("DOCGATE_DB_PATH") {
            self.store.db_path = PathBuf::from(path);
        }
        if let Some(path) = get("DOCGATE_SCHEMA_FILE") {
            self.store.schema_file = Some(PathBuf::from(path));
        }
        if let Some(format) = get("DOCGATE_LOG_FORMAT") {
            self.logging.format = format.parse()?;
        }
        if let Some(user) = get("DOCGATE_DEFAULT_USER") {
            self.context.default_user = user;
        }
        Ok(())
    }

    pub fn gateway_options(&self) -> GatewayOptions {
        GatewayOptions {
            default_page_length: self.query.default_page_length,
            max_page_length: self.query.max_page_length,
            default_order_by: self.query.default_order_by.clone(),
            link_keying: self.query.link_keying,
        }
    }

    /// Validate the configuration and return any warnings.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.query.max_page_length == 0 {
            warnings.push("max_page_length is 0; every page will hold one row".to_string());
        }
        if self.query.default_page_length > self.query.max_page_length {
            warnings.push(format!(
                "default_page_length {} exceeds max_page_length {}; pages will be capped",
                self.query.default_page_length, self.query.max_page_length
            ));
        }
        if let Err(e) = OrderBy::parse(&self.query.default_order_by) {
            warnings.push(format!("Invalid default_order_by: {}", e));
        }
        if tracing_subscriber::EnvFilter::try_new(&self.logging.level).is_err() {
            warnings.push(format!("Invalid logging level '{}'", self.logging.level));
        }
        if let Some(ref schema_file) = self.store.schema_file
            && !schema_file.exists()
        {
            warnings.push(format!(
                "Schema file {} does not exist",
                schema_file.display()
            ));
        }
        if self.context.default_user.trim().is_empty() {
            warnings.push("default_user is empty".to_string());
        }

        warnings
    }
}
