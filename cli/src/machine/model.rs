//! # Machine Model Types
//!
//! File: cli/src/machine/model.rs
//!
//! ## Overview
//!
//! Plain data describing a workspace machine: what it is (`Machine`,
//! `MachineConfig`), how to build it (`Recipe`), what it exposes once running
//! (`MachineRuntimeInfo`, `Server`) and how a saved copy is found again
//! (`InstanceKey`). Commands run inside a machine are described by `Command`.
//!
//! These types carry no behaviour beyond small derivations (server port
//! parsing, snapshot image naming); the instance implementations own all
//! side effects.
//!
use crate::core::error::{DockyardError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// A command line to run inside a machine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Command {
    pub name: String,
    pub command_line: String,
    #[serde(default)]
    pub command_type: Option<String>,
}

impl Command {
    pub fn new(name: impl Into<String>, command_line: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            command_line: command_line.into(),
            command_type: None,
        }
    }
}

/// A server a machine is expected to expose.
///
/// `port` is `<number>` or `<number>/<transport>` (e.g. `4401/tcp`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConf {
    #[serde(default)]
    pub reference: Option<String>,
    pub port: String,
    #[serde(default)]
    pub protocol: Option<String>,
    #[serde(default)]
    pub path: Option<String>,
}

impl ServerConf {
    pub fn new(port: impl Into<String>) -> Self {
        Self {
            reference: None,
            port: port.into(),
            protocol: None,
            path: None,
        }
    }

    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }

    pub fn with_protocol(mut self, protocol: impl Into<String>) -> Self {
        self.protocol = Some(protocol.into());
        self
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// The numeric part of `port`.
    ///
    /// # Errors
    ///
    /// Returns `Config` if the part before `/` is not a valid port number.
    pub fn port_number(&self) -> Result<u16> {
        let number = self.port.split('/').next().unwrap_or_default();
        number.parse::<u16>().map_err(|_| {
            DockyardError::Config(format!(
                "Invalid server port '{}', expected <number>[/<transport>]",
                self.port
            ))
        })
    }

    /// The port with an explicit transport, `tcp` when none is given.
    /// This is the key format the engine uses for exposed ports.
    pub fn port_with_transport(&self) -> String {
        if self.port.contains('/') {
            self.port.clone()
        } else {
            format!("{}/tcp", self.port)
        }
    }
}

/// Where a machine's recipe came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MachineSource {
    pub source_type: String,
    #[serde(default)]
    pub location: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MachineConfig {
    pub name: String,
    /// Dev machines also expose the terminal and workspace agent servers.
    #[serde(default)]
    pub dev: bool,
    pub machine_type: String,
    #[serde(default)]
    pub env_variables: HashMap<String, String>,
    #[serde(default)]
    pub servers: Vec<ServerConf>,
    #[serde(default)]
    pub source: Option<MachineSource>,
}

impl MachineConfig {
    pub fn new(name: impl Into<String>, machine_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            machine_type: machine_type.into(),
            ..Default::default()
        }
    }

    pub fn with_dev(mut self, dev: bool) -> Self {
        self.dev = dev;
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env_variables.insert(key.into(), value.into());
        self
    }

    pub fn with_server(mut self, server: ServerConf) -> Self {
        self.servers.push(server);
        self
    }
}

/// A workspace machine as the workspace layer sees it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Machine {
    pub id: String,
    pub workspace_id: String,
    pub owner: String,
    pub env_name: String,
    pub config: MachineConfig,
}

impl Machine {
    pub fn new(id: impl Into<String>, config: MachineConfig) -> Self {
        Self {
            id: id.into(),
            config,
            ..Default::default()
        }
    }

    pub fn with_workspace(mut self, workspace_id: impl Into<String>) -> Self {
        self.workspace_id = workspace_id.into();
        self
    }

    pub fn with_owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = owner.into();
        self
    }

    pub fn with_env_name(mut self, env_name: impl Into<String>) -> Self {
        self.env_name = env_name.into();
        self
    }
}

/// How to build a machine: the recipe type picks the provider, the script
/// is provider specific (an image name, a Dockerfile, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipe {
    pub recipe_type: String,
    pub script: String,
}

impl Recipe {
    pub fn new(recipe_type: impl Into<String>, script: impl Into<String>) -> Self {
        Self {
            recipe_type: recipe_type.into(),
            script: script.into(),
        }
    }
}

/// A server a running machine exposes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Server {
    pub reference: Option<String>,
    pub protocol: Option<String>,
    /// `host:port`.
    pub address: String,
    pub path: Option<String>,
    /// Full URL, only known when the protocol is.
    pub url: Option<String>,
}

/// What a running machine looks like from the outside.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MachineRuntimeInfo {
    pub env_variables: HashMap<String, String>,
    pub properties: HashMap<String, String>,
    /// Keyed by the configured port string (e.g. `4401/tcp`).
    pub servers: HashMap<String, Server>,
}

/// Locates a machine snapshot in an image registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceKey {
    pub repository: String,
    #[serde(default)]
    pub tag: Option<String>,
    #[serde(default)]
    pub registry: Option<String>,
    #[serde(default)]
    pub digest: Option<String>,
}

impl InstanceKey {
    pub fn new(repository: impl Into<String>) -> Self {
        Self {
            repository: repository.into(),
            tag: None,
            registry: None,
            digest: None,
        }
    }

    /// `<registry>/<repository>` or just `<repository>`.
    pub fn full_repository(&self) -> String {
        match &self.registry {
            Some(registry) => format!("{}/{}", registry, self.repository),
            None => self.repository.clone(),
        }
    }

    /// The image reference a container can be created from. The digest is
    /// preferred over the tag when both are known.
    pub fn image_reference(&self) -> String {
        match (&self.digest, &self.tag) {
            (Some(digest), _) => format!("{}@{}", self.full_repository(), digest),
            (None, Some(tag)) => format!("{}:{}", self.full_repository(), tag),
            (None, None) => self.full_repository(),
        }
    }
}

impl fmt::Display for InstanceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.image_reference())
    }
}

// --- Unit Tests ---
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_port_number() {
        assert_eq!(ServerConf::new("4401/tcp").port_number().unwrap(), 4401);
        assert_eq!(ServerConf::new("8080").port_number().unwrap(), 8080);

        let err = ServerConf::new("http/tcp").port_number().unwrap_err();
        assert!(err.to_string().contains("Invalid server port"));
        assert!(ServerConf::new("70000/tcp").port_number().is_err());
    }

    #[test]
    fn test_port_with_transport() {
        assert_eq!(ServerConf::new("8080").port_with_transport(), "8080/tcp");
        assert_eq!(ServerConf::new("53/udp").port_with_transport(), "53/udp");
    }

    #[test]
    fn test_server_conf_from_toml() {
        let conf: ServerConf =
            toml::from_str("reference = \"wsagent\"\nport = \"4401/tcp\"\npath = \"api/ext\"")
                .unwrap();
        assert_eq!(conf.reference.as_deref(), Some("wsagent"));
        assert_eq!(conf.protocol, None);
        assert_eq!(conf.path.as_deref(), Some("api/ext"));
    }

    #[test]
    fn test_instance_key_reference() {
        let key = InstanceKey::new("machine_snapshot/m1");
        assert_eq!(key.image_reference(), "machine_snapshot/m1");

        let key = InstanceKey {
            tag: Some("latest".into()),
            registry: Some("localhost:5000".into()),
            ..key
        };
        assert_eq!(key.image_reference(), "localhost:5000/machine_snapshot/m1:latest");

        let key = InstanceKey {
            digest: Some("sha256:abcd".into()),
            ..key
        };
        assert_eq!(key.to_string(), "localhost:5000/machine_snapshot/m1@sha256:abcd");
    }
}
