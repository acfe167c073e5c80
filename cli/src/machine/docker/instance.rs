//! # Docker Instance
//!
//! File: cli/src/machine/docker/instance.rs
//!
//! ## Overview
//!
//! A machine backed by one engine container. The instance id is the
//! container id. Processes are exec instances in that container, runtime
//! info comes from inspecting it, snapshots are commits of it, and
//! destroying the machine removes it along with its volumes.
//!
//! The container's own output is attached to the machine logger by a pump
//! started when the container starts; `destroy` stops that pump.
//!
use super::process::DockerProcess;
use crate::common::output::LineConsumer;
use crate::core::config::SnapshotConfig;
use crate::core::error::{DockyardError, Result};
use crate::engine::log_frames::LogMessage;
use crate::engine::params::{CommitParams, InspectContainerParams, PushParams, RemoveContainerParams};
use crate::engine::progress::LoggingProgressMonitor;
use crate::engine::{DaemonUri, DockerConnector};
use crate::machine::{
    Command, Instance, InstanceKey, InstanceProcess, Machine, MachineRuntimeInfo, PidSequence,
    ProcessTable, Server, ServerConf,
};
use async_trait::async_trait;
use bollard::models::{ContainerInspectResponse, PortBinding};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::OnceCell;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Tag given to every snapshot image.
pub const SNAPSHOT_TAG: &str = "latest";

pub struct DockerInstance {
    container: String,
    machine: Machine,
    logger: Arc<dyn LineConsumer>,
    connector: DockerConnector,
    snapshot: SnapshotConfig,
    runtime: OnceCell<MachineRuntimeInfo>,
    processes: ProcessTable,
    log_pump: Mutex<Option<CancellationToken>>,
}

impl DockerInstance {
    pub fn new(
        container: impl Into<String>,
        machine: Machine,
        logger: Arc<dyn LineConsumer>,
        connector: DockerConnector,
        snapshot: SnapshotConfig,
        sequence: Arc<PidSequence>,
    ) -> Self {
        Self {
            container: container.into(),
            machine,
            logger,
            connector,
            snapshot,
            runtime: OnceCell::new(),
            processes: ProcessTable::with_sequence(sequence),
            log_pump: Mutex::new(None),
        }
    }

    /// Remembers the pump forwarding container output to the logger, so
    /// `destroy` can stop it.
    pub(crate) fn set_log_pump(&self, cancel: CancellationToken) {
        if let Ok(mut slot) = self.log_pump.lock() {
            *slot = Some(cancel);
        }
    }

    /// Forwards container output lines to the machine logger.
    pub(crate) fn log_forwarder(&self) -> impl FnMut(LogMessage) + Send + 'static {
        let logger = self.logger.clone();
        let container = self.container.clone();
        move |message: LogMessage| {
            if let Err(e) = logger.write_line(&message.content) {
                warn!("Failed to write log of container {}: {}", container, e);
            }
        }
    }

    /// Image repository snapshots of this machine are committed to.
    pub fn snapshot_repository(&self) -> String {
        format!(
            "{}/{}",
            self.snapshot.repository_prefix,
            self.machine.id.to_lowercase()
        )
    }

    async fn compute_runtime(&self) -> Result<MachineRuntimeInfo> {
        let inspect = self
            .connector
            .inspect_container(&InspectContainerParams::new(self.container.as_str())?)
            .await?;
        Ok(runtime_from_inspect(
            &inspect,
            &self.machine.config.servers,
            &daemon_host(self.connector.daemon_uri()),
        ))
    }
}

/// Host under which published ports are reachable.
fn daemon_host(uri: &DaemonUri) -> String {
    match uri {
        DaemonUri::Tcp { host, .. } => host.clone(),
        DaemonUri::Unix(_) => "localhost".to_string(),
    }
}

/// Builds runtime info from an inspection. `servers` supplies reference,
/// protocol and path for the ports the machine was configured with.
pub fn runtime_from_inspect(
    inspect: &ContainerInspectResponse,
    servers: &[ServerConf],
    host: &str,
) -> MachineRuntimeInfo {
    let env_variables = inspect
        .config
        .as_ref()
        .and_then(|config| config.env.as_ref())
        .map(|env| {
            env.iter()
                .filter_map(|entry| entry.split_once('='))
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect()
        })
        .unwrap_or_default();

    let mut properties = HashMap::new();
    if let Some(id) = &inspect.id {
        properties.insert("id".to_string(), id.clone());
    }
    if let Some(name) = &inspect.name {
        properties.insert("name".to_string(), name.trim_start_matches('/').to_string());
    }
    if let Some(created) = &inspect.created {
        properties.insert("created".to_string(), created.clone());
    }
    if let Some(image) = inspect.config.as_ref().and_then(|c| c.image.as_ref()) {
        properties.insert("config.image".to_string(), image.clone());
    }

    let mut published = HashMap::new();
    let ports = inspect
        .network_settings
        .as_ref()
        .and_then(|settings| settings.ports.as_ref());
    for (port, bindings) in ports.into_iter().flatten() {
        if let Some(binding) = bindings.as_ref().and_then(|b| b.first()) {
            if let Some(server) = server_from_binding(port, binding, servers, host) {
                published.insert(port.clone(), server);
            }
        }
    }

    MachineRuntimeInfo {
        env_variables,
        properties,
        servers: published,
    }
}

fn server_from_binding(
    port: &str,
    binding: &PortBinding,
    servers: &[ServerConf],
    host: &str,
) -> Option<Server> {
    let host_port = binding.host_port.as_deref().filter(|p| !p.is_empty())?;
    let host = match binding.host_ip.as_deref() {
        Some(ip) if !ip.is_empty() && ip != "0.0.0.0" && ip != "::" => ip,
        _ => host,
    };
    let conf = servers.iter().find(|s| s.port_with_transport() == port);
    let address = format!("{}:{}", host, host_port);
    let path = conf
        .and_then(|c| c.path.as_deref())
        .map(|p| format!("/{}", p.trim_start_matches('/')));
    let protocol = conf.and_then(|c| c.protocol.clone());
    let url = protocol
        .as_ref()
        .map(|proto| format!("{}://{}{}", proto, address, path.as_deref().unwrap_or("")));
    Some(Server {
        reference: conf.and_then(|c| c.reference.clone()),
        protocol,
        address,
        path,
        url,
    })
}

#[async_trait]
impl Instance for DockerInstance {
    fn id(&self) -> &str {
        &self.container
    }

    fn machine(&self) -> &Machine {
        &self.machine
    }

    fn logger(&self) -> Arc<dyn LineConsumer> {
        self.logger.clone()
    }

    async fn runtime(&self) -> Result<&MachineRuntimeInfo> {
        self.runtime
            .get_or_try_init(|| self.compute_runtime())
            .await
    }

    async fn get_process(&self, pid: u32) -> Result<Arc<dyn InstanceProcess>> {
        self.processes.get(pid).await
    }

    async fn get_processes(&self) -> Result<Vec<Arc<dyn InstanceProcess>>> {
        Ok(self.processes.alive().await)
    }

    async fn create_process(
        &self,
        command: Command,
        output_channel: Option<String>,
    ) -> Result<Arc<dyn InstanceProcess>> {
        let pid = self.processes.next_pid();
        let process: Arc<dyn InstanceProcess> = Arc::new(DockerProcess::new(
            self.connector.clone(),
            self.container.as_str(),
            pid,
            command,
            output_channel,
        ));
        self.processes.insert(process.clone());
        Ok(process)
    }

    /// Commits the container as `<prefix>/<machine id>:latest`, and pushes
    /// it when a snapshot registry is configured.
    #[instrument(skip(self), fields(container = %self.container))]
    async fn save_to_snapshot(&self, owner: &str) -> Result<InstanceKey> {
        let repository = self.snapshot_repository();
        let registry = self.snapshot.registry.clone();
        let committed_repository = match &registry {
            Some(registry) => format!("{}/{}", registry, repository),
            None => repository.clone(),
        };
        let comment = format!("Snapshot of machine {}", self.machine.id);
        let image = self
            .connector
            .commit(
                &CommitParams::new(self.container.as_str(), committed_repository)?
                    .with_tag(SNAPSHOT_TAG)
                    .with_author(owner)
                    .with_comment(comment),
            )
            .await
            .map_err(|e| DockyardError::Snapshot(format!("Failed to commit container: {}", e)))?;
        info!("Committed machine {} as image {}", self.machine.id, image);

        let mut key = InstanceKey::new(repository.as_str());
        key.tag = Some(SNAPSHOT_TAG.to_string());
        if let Some(registry) = registry {
            let digest = self
                .connector
                .push(
                    &PushParams::new(repository)?
                        .with_tag(SNAPSHOT_TAG)
                        .with_registry(registry.as_str()),
                    Arc::new(LoggingProgressMonitor),
                    &CancellationToken::new(),
                )
                .await
                .map_err(|e| DockyardError::Snapshot(format!("Failed to push snapshot: {}", e)))?;
            key.registry = Some(registry);
            key.digest = Some(digest);
        }
        Ok(key)
    }

    #[instrument(skip(self), fields(container = %self.container))]
    async fn destroy(&self) -> Result<()> {
        if let Some(cancel) = self.log_pump.lock().ok().and_then(|mut slot| slot.take()) {
            cancel.cancel();
        }
        self.connector
            .remove_container(
                &RemoveContainerParams::new(self.container.as_str())?
                    .with_force(true)
                    .with_remove_volumes(true),
            )
            .await?;
        debug!("Machine {} destroyed", self.machine.id);
        Ok(())
    }
}
