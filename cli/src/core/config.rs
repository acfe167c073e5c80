//! # Dockyard Configuration System
//!
//! File: cli/src/core/config.rs
//!
//! ## Overview
//!
//! This module implements the configuration system for Dockyard: where the
//! engine daemon lives, how to authenticate against registries, and what the
//! localhost machine variant needs to compute its server URLs.
//!
//! ## Architecture
//!
//! - Configuration is loaded from multiple sources in order of precedence
//! - Paths are expanded (e.g., `~` to the home directory)
//! - Environment variables override file values
//! - Configuration is validated for correctness before use
//!
//! Configuration sources (in order of precedence):
//! 1. `DOCKYARD_DOCKER_HOST` / `DOCKYARD_API_ENDPOINT` environment variables
//! 2. Project-specific `.dockyard.toml` in current directory or ancestors
//! 3. User-specific `config.toml` in the platform config directory
//! 4. Default values defined in the code
//!
//! ## Examples
//!
//! ```rust,ignore
//! let cfg = config::load_config()?;
//! let connector = DockerConnector::new(&cfg.engine)?;
//! ```
//!
use crate::engine::connection::DaemonUri;
use crate::engine::json::AuthConfig;
use crate::machine::ServerConf;
use anyhow::{anyhow, Context, Result};
use directories::ProjectDirs;
use serde::Deserialize;
use std::{
    fs,
    path::{Path, PathBuf},
};
use tracing::{debug, info, warn};

use super::error::DockyardError;

/// Environment variable replacing `engine.daemon_uri`.
pub const DOCKER_HOST_ENV: &str = "DOCKYARD_DOCKER_HOST";
/// Environment variable replacing `localhost.api_endpoint`.
pub const API_ENDPOINT_ENV: &str = "DOCKYARD_API_ENDPOINT";

/// Represents the main configuration structure, loaded from TOML files.
#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub localhost: LocalhostConfig,
    #[serde(default)]
    pub snapshot: SnapshotConfig,
}

/// Where the engine daemon is and how to talk to it.
#[derive(Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    /// `unix:///path/to/socket`, `tcp://host:port` or `http://host:port`.
    #[serde(default = "default_daemon_uri")]
    pub daemon_uri: String,
    /// Optional API version; when set every path is prefixed with `/v<version>`.
    #[serde(default)]
    pub api_version: Option<String>,
    /// Credentials for private registries.
    #[serde(default)]
    pub registry_auth: Vec<AuthConfig>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            daemon_uri: default_daemon_uri(),
            api_version: None,
            registry_auth: Vec::new(),
        }
    }
}

/// Settings for machines backed by local OS processes.
#[derive(Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct LocalhostConfig {
    /// API endpoint; its host becomes the host part of every server URL.
    #[serde(default = "default_api_endpoint")]
    pub api_endpoint: String,
    /// Shell used to run process command lines.
    #[serde(default = "default_shell")]
    pub shell: String,
    /// Servers exposed by every localhost machine.
    #[serde(default)]
    pub machine_servers: Vec<ServerConf>,
    /// Servers exposed by dev machines only, in addition to the defaults.
    #[serde(default)]
    pub dev_machine_servers: Vec<ServerConf>,
}

impl Default for LocalhostConfig {
    fn default() -> Self {
        Self {
            api_endpoint: default_api_endpoint(),
            shell: default_shell(),
            machine_servers: Vec::new(),
            dev_machine_servers: Vec::new(),
        }
    }
}

/// Where machine snapshots (committed containers) are stored.
#[derive(Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct SnapshotConfig {
    #[serde(default = "default_snapshot_prefix")]
    pub repository_prefix: String,
    /// Registry (`host:port`) snapshots are pushed to. Local only when unset.
    #[serde(default)]
    pub registry: Option<String>,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            repository_prefix: default_snapshot_prefix(),
            registry: None,
        }
    }
}

fn default_daemon_uri() -> String {
    "unix:///var/run/docker.sock".to_string()
}
fn default_api_endpoint() -> String {
    "http://localhost:8080/api".to_string()
}
fn default_shell() -> String {
    "/bin/sh".to_string()
}
fn default_snapshot_prefix() -> String {
    "machine_snapshot".to_string()
}

const PROJECT_CONFIG_FILENAME: &str = ".dockyard.toml";

/// Loads, merges, overrides and validates the configuration.
pub fn load_config() -> Result<Config> {
    let user_config = load_user_config()?;
    let project_config = load_project_config()?;
    let mut merged_config = merge_configs(user_config.unwrap_or_default(), project_config);
    apply_env_overrides(&mut merged_config);
    expand_config_paths(&mut merged_config).context("Failed to expand paths in configuration")?;
    validate_config(&merged_config).context("Configuration validation failed")?;
    debug!("Final loaded configuration: {:?}", merged_config);
    Ok(merged_config)
}

/// Loads a single configuration file and validates it, without merging.
pub fn load_config_file(path: &Path) -> Result<Config> {
    let mut config = load_config_from_path(path)?;
    apply_env_overrides(&mut config);
    expand_config_paths(&mut config).context("Failed to expand paths in configuration")?;
    validate_config(&config).context("Configuration validation failed")?;
    Ok(config)
}

fn load_user_config() -> Result<Option<Config>> {
    if let Some(proj_dirs) = ProjectDirs::from("dev", "Dockyard", "dockyard") {
        let config_path = proj_dirs.config_dir().join("config.toml");
        if config_path.exists() {
            info!("Loading user configuration from: {}", config_path.display());
            load_config_from_path(&config_path).map(Some)
        } else {
            debug!(
                "User configuration file not found at {}",
                config_path.display()
            );
            Ok(None)
        }
    } else {
        warn!("Could not determine user config directory.");
        Ok(None)
    }
}

fn load_project_config() -> Result<Option<Config>> {
    if let Some(project_config_path) = find_project_config_path()? {
        info!(
            "Loading project configuration from: {}",
            project_config_path.display()
        );
        load_config_from_path(&project_config_path).map(Some)
    } else {
        debug!("No project configuration file (.dockyard.toml) found.");
        Ok(None)
    }
}

fn find_project_config_path() -> Result<Option<PathBuf>> {
    let current_dir = std::env::current_dir().context("Failed to get current directory")?;
    let mut path: &Path = &current_dir;
    loop {
        let project_config = path.join(PROJECT_CONFIG_FILENAME);
        if project_config.is_file() {
            return Ok(Some(project_config));
        }
        if path.join(".git").is_dir() {
            debug!(
                "Found .git directory at {}, stopping project config search.",
                path.display()
            );
            return Ok(None);
        }
        match path.parent() {
            Some(parent) => path = parent,
            None => break,
        }
    }
    Ok(None)
}

fn load_config_from_path(path: &Path) -> Result<Config> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read configuration file: {}", path.display()))?;
    toml::from_str(&content)
        .with_context(|| format!("Failed to parse TOML from file: {}", path.display()))
}

/// Project values win wherever they differ from the defaults.
fn merge_configs(user: Config, project: Option<Config>) -> Config {
    let project_cfg = match project {
        Some(p) => p,
        None => return user,
    };
    let mut merged = Config::default();
    merged.engine.daemon_uri = if project_cfg.engine.daemon_uri != default_daemon_uri() {
        project_cfg.engine.daemon_uri
    } else {
        user.engine.daemon_uri
    };
    merged.engine.api_version = project_cfg.engine.api_version.or(user.engine.api_version);
    merged.engine.registry_auth = if !project_cfg.engine.registry_auth.is_empty() {
        project_cfg.engine.registry_auth
    } else {
        user.engine.registry_auth
    };
    merged.localhost.api_endpoint =
        if project_cfg.localhost.api_endpoint != default_api_endpoint() {
            project_cfg.localhost.api_endpoint
        } else {
            user.localhost.api_endpoint
        };
    merged.localhost.shell = if project_cfg.localhost.shell != default_shell() {
        project_cfg.localhost.shell
    } else {
        user.localhost.shell
    };
    merged.localhost.machine_servers = if !project_cfg.localhost.machine_servers.is_empty() {
        project_cfg.localhost.machine_servers
    } else {
        user.localhost.machine_servers
    };
    merged.localhost.dev_machine_servers =
        if !project_cfg.localhost.dev_machine_servers.is_empty() {
            project_cfg.localhost.dev_machine_servers
        } else {
            user.localhost.dev_machine_servers
        };
    merged.snapshot.repository_prefix =
        if project_cfg.snapshot.repository_prefix != default_snapshot_prefix() {
            project_cfg.snapshot.repository_prefix
        } else {
            user.snapshot.repository_prefix
        };
    merged.snapshot.registry = project_cfg.snapshot.registry.or(user.snapshot.registry);
    merged
}

fn apply_env_overrides(config: &mut Config) {
    if let Ok(host) = std::env::var(DOCKER_HOST_ENV) {
        debug!("{} overrides daemon URI: {}", DOCKER_HOST_ENV, host);
        config.engine.daemon_uri = host;
    }
    if let Ok(endpoint) = std::env::var(API_ENDPOINT_ENV) {
        debug!("{} overrides API endpoint: {}", API_ENDPOINT_ENV, endpoint);
        config.localhost.api_endpoint = endpoint;
    }
}

fn expand_config_paths(config: &mut Config) -> Result<()> {
    if let Some(path) = config.engine.daemon_uri.strip_prefix("unix://") {
        if path.starts_with('~') {
            let expanded = shellexpand::tilde(path).into_owned();
            config.engine.daemon_uri = format!("unix://{}", expanded);
            debug!("Expanded daemon socket path: {}", expanded);
        }
    }
    config.localhost.shell = shellexpand::tilde(&config.localhost.shell).into_owned();
    Ok(())
}

fn validate_config(config: &Config) -> Result<()> {
    debug!("Validating final configuration...");
    config
        .engine
        .daemon_uri
        .parse::<DaemonUri>()
        .map_err(|e| anyhow!(e))?;
    url::Url::parse(&config.localhost.api_endpoint).map_err(|e| {
        anyhow!(DockyardError::Config(format!(
            "Invalid API endpoint '{}': {}",
            config.localhost.api_endpoint, e
        )))
    })?;
    for server in config
        .localhost
        .machine_servers
        .iter()
        .chain(config.localhost.dev_machine_servers.iter())
    {
        server.port_number().map_err(|e| anyhow!(e))?;
    }
    if config.localhost.shell.is_empty() {
        return Err(anyhow!(DockyardError::Config(
            "Localhost shell cannot be empty.".to_string()
        )));
    }
    for auth in &config.engine.registry_auth {
        if auth.server_address.is_empty() {
            return Err(anyhow!(DockyardError::Config(format!(
                "Registry auth entry for user '{}' has an empty server.",
                auth.username
            ))));
        }
    }
    debug!("Configuration validation successful.");
    Ok(())
}
