//! Configuration for the Taskboard server.
//!
//! Values are layered, highest priority first:
//! 1. CLI arguments
//! 2. Environment variables (via clap `env` attribute)
//! 3. TOML config file (`~/.config/taskboard/config.toml`)
//! 4. Compiled defaults

use std::path::{Path, PathBuf};

use taskboard_proto::query::MAX_PAGE_SIZE;
use taskboard_proto::task::OwnerId;

/// Errors that can occur when loading server configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadFile {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The file was read but is not valid TOML for this schema.
    #[error("invalid config file {path}: {source}")]
    Parse {
        /// File that failed to parse.
        path: PathBuf,
        /// Underlying TOML error.
        source: toml::de::Error,
    },
}

/// Top-level TOML config file. Every field is optional.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct ConfigFile {
    server: ServerSection,
}

/// `[server]` section.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct ServerSection {
    bind_addr: Option<String>,
    owner_id: Option<String>,
    max_page_size: Option<usize>,
    max_body_size: Option<usize>,
    cors_origins: Option<Vec<String>>,
}

/// CLI arguments for the server.
#[derive(clap::Parser, Debug, Default)]
#[command(version, about = "Taskboard task service")]
pub struct ServerCliArgs {
    /// Address to bind to.
    #[arg(short, long, env = "TASKBOARD_ADDR")]
    pub bind: Option<String>,

    /// Path to config file (default: `~/.config/taskboard/config.toml`).
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Owner every request acts on behalf of.
    #[arg(long, env = "TASKBOARD_OWNER")]
    pub owner_id: Option<String>,

    /// Largest accepted `limit` on the task list.
    #[arg(long)]
    pub max_page_size: Option<usize>,

    /// Largest accepted request body in bytes.
    #[arg(long)]
    pub max_body_size: Option<usize>,

    /// Allowed CORS origin; repeat for several. `*` allows any.
    #[arg(long = "cors-origin")]
    pub cors_origins: Vec<String>,

    /// Log level filter (trace, debug, info, warn, error).
    #[arg(long, default_value = "info", env = "TASKBOARD_LOG")]
    pub log_level: String,
}

/// Fully resolved server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind the server to.
    pub bind_addr: String,
    /// Owner every request acts on behalf of.
    pub owner_id: OwnerId,
    /// Largest accepted `limit`, never above [`MAX_PAGE_SIZE`].
    pub max_page_size: usize,
    /// Largest accepted request body in bytes.
    pub max_body_size: usize,
    /// Allowed CORS origins; empty disables CORS headers.
    pub cors_origins: Vec<String>,
    /// Log level filter string.
    pub log_level: String,
    /// Config file the settings were read from, if any.
    pub source: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8000".to_string(),
            owner_id: OwnerId::default(),
            max_page_size: MAX_PAGE_SIZE,
            max_body_size: 64 * 1024,
            cors_origins: vec!["http://localhost:3000".to_string()],
            log_level: "info".to_string(),
            source: None,
        }
    }
}

impl ServerConfig {
    /// Load configuration by merging CLI args, env vars, and a TOML file.
    ///
    /// An explicit `--config` that does not exist is an error; a missing
    /// default file is treated as empty.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the config file cannot be read or parsed.
    pub fn load(cli: &ServerCliArgs) -> Result<Self, ConfigError> {
        let (file, source) = load_config_file(cli.config.as_deref())?;
        Ok(Self {
            source,
            ..Self::resolve(cli, &file)
        })
    }

    /// Priority: CLI > file > default.
    fn resolve(cli: &ServerCliArgs, file: &ConfigFile) -> Self {
        let defaults = Self::default();
        let max_page_size = cli
            .max_page_size
            .or(file.server.max_page_size)
            .unwrap_or(defaults.max_page_size);

        Self {
            bind_addr: cli
                .bind
                .clone()
                .or_else(|| file.server.bind_addr.clone())
                .unwrap_or(defaults.bind_addr),
            owner_id: cli
                .owner_id
                .clone()
                .or_else(|| file.server.owner_id.clone())
                .map_or(defaults.owner_id, OwnerId::new),
            max_page_size: max_page_size.clamp(1, MAX_PAGE_SIZE),
            max_body_size: cli
                .max_body_size
                .or(file.server.max_body_size)
                .unwrap_or(defaults.max_body_size),
            cors_origins: if cli.cors_origins.is_empty() {
                file.server
                    .cors_origins
                    .clone()
                    .unwrap_or(defaults.cors_origins)
            } else {
                cli.cors_origins.clone()
            },
            log_level: cli.log_level.clone(),
            source: None,
        }
    }
}

/// `~/.config/taskboard/config.toml`, or `None` when the platform has no
/// config directory.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("taskboard").join("config.toml"))
}

/// Reads the config file, returning its contents and the path actually
/// read. Only an explicitly named file is required to exist.
fn load_config_file(
    explicit_path: Option<&Path>,
) -> Result<(ConfigFile, Option<PathBuf>), ConfigError> {
    let (path, required) = match explicit_path {
        Some(p) => (p.to_path_buf(), true),
        None => match default_config_path() {
            Some(p) => (p, false),
            None => return Ok((ConfigFile::default(), None)),
        },
    };

    let contents = match std::fs::read_to_string(&path) {
        Ok(contents) => contents,
        Err(e) if !required && e.kind() == std::io::ErrorKind::NotFound => {
            return Ok((ConfigFile::default(), None));
        }
        Err(source) => return Err(ConfigError::ReadFile { path, source }),
    };
    match toml::from_str(&contents) {
        Ok(file) => Ok((file, Some(path))),
        Err(source) => Err(ConfigError::Parse { path, source }),
    }
}
