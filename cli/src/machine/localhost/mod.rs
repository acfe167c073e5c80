//! # Localhost Machines (`machine::localhost`)
//!
//! File: cli/src/machine/localhost/mod.rs
//!
//! ## Overview
//!
//! Machines whose processes run directly on the host running Dockyard.
//! Useful where no engine daemon is available, at the cost of isolation:
//! there is no snapshot support and destroying the machine does not reach
//! grandchildren of the processes it started.
//!
//! ## Architecture
//!
//! - `LocalhostInstanceProvider`: type `localhost`, recipe type
//!   `localhost-config`.
//! - `LocalhostInstance`: see `instance`.
//! - `LocalhostProcess`: see `process`.
//!
use crate::common::output::LineConsumer;
use crate::core::config::LocalhostConfig;
use crate::core::error::{DockyardError, Result};
use crate::machine::{Instance, InstanceKey, InstanceProvider, Machine, PidSequence, Recipe, ServerConf};
use async_trait::async_trait;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::info;

pub mod instance;
pub mod process;

pub use instance::LocalhostInstance;
pub use process::LocalhostProcess;

pub const PROVIDER_TYPE: &str = "localhost";
pub const RECIPE_TYPE: &str = "localhost-config";

pub const TERMINAL_REFERENCE: &str = "terminal";
pub const TERMINAL_PORT: &str = "4411/tcp";
pub const WSAGENT_REFERENCE: &str = "wsagent";
pub const WSAGENT_PORT: &str = "4401/tcp";
pub const WSAGENT_PATH: &str = "api/ext";

const SNAPSHOT_UNSUPPORTED: &str =
    "Snapshot feature is unsupported for localhost machine implementation";

/// Terminal and workspace agent servers every dev machine exposes. Their
/// protocol is the scheme of the API endpoint.
pub fn default_dev_servers(api_endpoint: &str) -> Vec<ServerConf> {
    let scheme = url::Url::parse(api_endpoint)
        .map(|url| url.scheme().to_string())
        .ok();
    let with_scheme = |conf: ServerConf| match &scheme {
        Some(scheme) => conf.with_protocol(scheme.clone()),
        None => conf,
    };
    vec![
        with_scheme(ServerConf::new(TERMINAL_PORT).with_reference(TERMINAL_REFERENCE)),
        with_scheme(
            ServerConf::new(WSAGENT_PORT)
                .with_reference(WSAGENT_REFERENCE)
                .with_path(WSAGENT_PATH),
        ),
    ]
}

pub struct LocalhostInstanceProvider {
    config: LocalhostConfig,
    sequence: Arc<PidSequence>,
}

impl LocalhostInstanceProvider {
    /// A provider whose instances draw pids from the process-wide sequence.
    pub fn new(config: LocalhostConfig) -> Self {
        Self::with_pid_sequence(config, PidSequence::global())
    }

    pub fn with_pid_sequence(config: LocalhostConfig, sequence: Arc<PidSequence>) -> Self {
        Self { config, sequence }
    }
}

#[async_trait]
impl InstanceProvider for LocalhostInstanceProvider {
    fn provider_type(&self) -> &str {
        PROVIDER_TYPE
    }

    fn recipe_types(&self) -> BTreeSet<String> {
        BTreeSet::from([RECIPE_TYPE.to_string()])
    }

    async fn create_instance(
        &self,
        _recipe: &Recipe,
        machine: Machine,
        logs: Arc<dyn LineConsumer>,
    ) -> Result<Arc<dyn Instance>> {
        let instance = LocalhostInstance::new(machine, logs, &self.config, self.sequence.clone());
        info!(
            "Created localhost machine {} for '{}'",
            instance.id(),
            instance.machine().config.name
        );
        Ok(Arc::new(instance))
    }

    async fn create_instance_from_snapshot(
        &self,
        _key: &InstanceKey,
        _machine: Machine,
        _logs: Arc<dyn LineConsumer>,
    ) -> Result<Arc<dyn Instance>> {
        Err(DockyardError::Machine(SNAPSHOT_UNSUPPORTED.into()))
    }

    async fn remove_instance_snapshot(&self, _key: &InstanceKey) -> Result<()> {
        Err(DockyardError::Snapshot(SNAPSHOT_UNSUPPORTED.into()))
    }
}

// --- Unit Tests ---
#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::output::DevNullLineConsumer;
    use crate::machine::MachineConfig;

    #[test]
    fn test_provider_identity() {
        let provider = LocalhostInstanceProvider::new(LocalhostConfig::default());
        assert_eq!(provider.provider_type(), "localhost");
        assert_eq!(
            provider.recipe_types(),
            BTreeSet::from(["localhost-config".to_string()])
        );
    }

    #[test]
    fn test_dev_servers_follow_endpoint_scheme() {
        let servers = default_dev_servers("https://ide.example.com/api");
        assert_eq!(servers.len(), 2);
        assert!(servers.iter().all(|s| s.protocol.as_deref() == Some("https")));
        assert_eq!(servers[1].path.as_deref(), Some("api/ext"));
    }

    #[tokio::test]
    async fn test_snapshots_unsupported() {
        let provider = LocalhostInstanceProvider::new(LocalhostConfig::default());
        let key = InstanceKey::new("machine_snapshot/m1");

        let err = provider
            .create_instance_from_snapshot(&key, Machine::default(), Arc::new(DevNullLineConsumer))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, DockyardError::Machine(_)));
        assert_eq!(err.to_string(), SNAPSHOT_UNSUPPORTED);

        let err = provider.remove_instance_snapshot(&key).await.unwrap_err();
        assert!(matches!(err, DockyardError::Snapshot(_)));
    }

    #[tokio::test]
    async fn test_instances_get_distinct_ids() {
        let provider = LocalhostInstanceProvider::new(LocalhostConfig::default());
        let recipe = Recipe::new(RECIPE_TYPE, "");
        let machine = Machine::new("m", MachineConfig::new("ws", "localhost"));
        let a = provider
            .create_instance(&recipe, machine.clone(), Arc::new(DevNullLineConsumer))
            .await
            .unwrap();
        let b = provider
            .create_instance(&recipe, machine, Arc::new(DevNullLineConsumer))
            .await
            .unwrap();
        assert_ne!(a.id(), b.id());
        assert_eq!(a.machine().id, "m");
    }
}
