//! # Dockyard Wire Models (`engine::json`)
//!
//! File: cli/src/engine/json.rs
//!
//! ## Overview
//!
//! JSON shapes exchanged with the daemon that are specific to this client:
//! streamed progress and event messages, exec requests and registry
//! credentials. Response documents with a stable public schema (container
//! and image inspection, system info, ...) come from `bollard::models`.
//!
//! The daemon's own naming convention upper-cases the first letter of most
//! request fields (`AttachStdout`, `Detach`), while streamed messages use
//! lower-case keys (`status`, `progressDetail`). Each struct states its
//! convention through `serde(rename_all)`.
//!
use base64::{engine::general_purpose::URL_SAFE, Engine as _};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Progress details attached to a pull/push layer update.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct ProgressDetail {
    #[serde(default)]
    pub current: Option<i64>,
    #[serde(default)]
    pub total: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct ErrorDetail {
    #[serde(default)]
    pub code: Option<i64>,
    #[serde(default)]
    pub message: Option<String>,
}

/// One message of a build, pull or push progress stream.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressStatus {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub progress: Option<String>,
    #[serde(default)]
    pub stream: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub progress_detail: Option<ProgressDetail>,
    #[serde(default)]
    pub error_detail: Option<ErrorDetail>,
}

/// Body of `POST /containers/<id>/exec`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ExecConfig {
    pub attach_stdin: bool,
    pub attach_stdout: bool,
    pub attach_stderr: bool,
    pub tty: bool,
    pub cmd: Vec<String>,
}

/// Body of `POST /exec/<id>/start`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ExecStart {
    pub detach: bool,
    pub tty: bool,
}

/// `{"Id": ...}` reply of `POST /containers/<id>/exec` and `POST /commit`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Created {
    pub id: String,
}

/// An exec instance: the command it runs and the daemon-assigned id.
#[derive(Debug, Clone, PartialEq)]
pub struct Exec {
    pub cmd: Vec<String>,
    pub id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct EventActor {
    #[serde(rename = "ID", default)]
    pub id: Option<String>,
    #[serde(default)]
    pub attributes: HashMap<String, String>,
}

/// One message of the `/events` stream.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Event {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default)]
    pub time: Option<i64>,
    #[serde(rename = "Type", default)]
    pub kind: Option<String>,
    #[serde(rename = "Action", default)]
    pub action: Option<String>,
    #[serde(rename = "Actor", default)]
    pub actor: Option<EventActor>,
}

/// Event filters, e.g. `{"event": ["die", "start"]}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Filters {
    filters: HashMap<String, Vec<String>>,
}

impl Filters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds values under `key`, keeping the ones already there.
    pub fn with_filter(mut self, key: &str, values: &[&str]) -> Self {
        self.filters
            .entry(key.to_string())
            .or_default()
            .extend(values.iter().map(|v| v.to_string()));
        self
    }

    pub fn filters(&self) -> &HashMap<String, Vec<String>> {
        &self.filters
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }
}

/// Credentials for one registry.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AuthConfig {
    #[serde(rename = "serveraddress", alias = "server")]
    pub server_address: String,
    pub username: String,
    pub password: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// All configured registry credentials, keyed by server address.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthConfigs {
    configs: HashMap<String, AuthConfig>,
}

impl AuthConfigs {
    pub fn new(configs: impl IntoIterator<Item = AuthConfig>) -> Self {
        Self {
            configs: configs
                .into_iter()
                .map(|c| (c.server_address.clone(), c))
                .collect(),
        }
    }

    pub fn get(&self, registry: &str) -> Option<&AuthConfig> {
        self.configs.get(registry)
    }

    pub fn is_empty(&self) -> bool {
        self.configs.is_empty()
    }

    /// Merges `other` on top of these configs.
    pub fn merged_with(&self, other: &AuthConfigs) -> AuthConfigs {
        let mut configs = self.configs.clone();
        configs.extend(other.configs.clone());
        AuthConfigs { configs }
    }

    /// `X-Registry-Config` value: every config, keyed by server.
    pub fn registry_config_header(&self) -> String {
        let json = serde_json::to_vec(&self.configs).unwrap_or_else(|_| b"{}".to_vec());
        URL_SAFE.encode(json)
    }

    /// `X-Registry-Auth` value for `registry`: its credentials, or `{}`.
    pub fn registry_auth_header(&self, registry: Option<&str>) -> String {
        let json = registry
            .and_then(|r| self.configs.get(r))
            .and_then(|c| serde_json::to_vec(c).ok())
            .unwrap_or_else(|| b"{}".to_vec());
        URL_SAFE.encode(json)
    }
}
