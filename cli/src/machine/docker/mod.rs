//! # Docker Machines (`machine::docker`)
//!
//! File: cli/src/machine/docker/mod.rs
//!
//! ## Overview
//!
//! Machines backed by engine containers, created through `DockerConnector`.
//!
//! ## Architecture
//!
//! Provisioning a machine:
//! 1. Get an image: `image` recipes pull the image named by the script,
//!    `dockerfile` recipes build the script as a Dockerfile, snapshots pull
//!    the snapshot image when it lives in a registry.
//! 2. Create the container with the machine's environment, its server ports
//!    exposed and published, and labels naming the machine.
//! 3. Start it and attach its output to the machine logger.
//!
//! A container that fails to start, or whose output cannot be attached, is
//! removed again before the error is returned.
//!
use crate::common::output::LineConsumer;
use crate::core::config::SnapshotConfig;
use crate::core::error::{DockyardError, Result};
use crate::engine::json::ProgressStatus;
use crate::engine::params::{
    AttachContainerParams, BuildImageParams, CreateContainerParams, PullParams,
    RemoveContainerParams, RemoveImageParams, StartContainerParams,
};
use crate::engine::progress::{describe, ProgressMonitor};
use crate::engine::DockerConnector;
use crate::machine::{Instance, InstanceKey, InstanceProvider, Machine, PidSequence, Recipe};
use async_trait::async_trait;
use bollard::container::Config;
use bollard::models::HostConfig;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

pub mod instance;
pub mod process;

pub use instance::DockerInstance;
pub use process::DockerProcess;

pub const PROVIDER_TYPE: &str = "docker";
pub const DOCKERFILE_RECIPE: &str = "dockerfile";
pub const IMAGE_RECIPE: &str = "image";

pub const MACHINE_ID_LABEL: &str = "dockyard.machine.id";
pub const MACHINE_NAME_LABEL: &str = "dockyard.machine.name";
pub const WORKSPACE_ID_LABEL: &str = "dockyard.workspace.id";

pub struct DockerInstanceProvider {
    connector: DockerConnector,
    snapshot: SnapshotConfig,
    sequence: Arc<PidSequence>,
    cancel: CancellationToken,
}

/// Splits `name[:tag]` without mistaking a registry port for a tag.
pub fn split_image_tag(image: &str) -> (&str, Option<&str>) {
    match image.rsplit_once(':') {
        Some((name, tag)) if !tag.contains('/') => (name, Some(tag)),
        _ => (image, None),
    }
}

/// Container configuration for `image` running `machine`.
pub fn container_config(image: &str, machine: &Machine) -> Config<String> {
    let mut env: Vec<String> = machine
        .config
        .env_variables
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect();
    env.sort();

    let exposed_ports: HashMap<String, HashMap<(), ()>> = machine
        .config
        .servers
        .iter()
        .map(|server| (server.port_with_transport(), HashMap::new()))
        .collect();

    let labels = HashMap::from([
        (MACHINE_ID_LABEL.to_string(), machine.id.clone()),
        (MACHINE_NAME_LABEL.to_string(), machine.config.name.clone()),
        (WORKSPACE_ID_LABEL.to_string(), machine.workspace_id.clone()),
    ]);

    Config {
        image: Some(image.to_string()),
        env: Some(env),
        exposed_ports: Some(exposed_ports),
        labels: Some(labels),
        host_config: Some(HostConfig {
            publish_all_ports: Some(true),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Progress monitor writing each readable update to the machine logs.
fn logs_monitor(logs: Arc<dyn LineConsumer>) -> Arc<dyn ProgressMonitor> {
    Arc::new(move |status: &ProgressStatus| {
        if let Some(line) = describe(status) {
            if let Err(e) = logs.write_line(&line) {
                warn!("Failed to write progress to machine logs: {}", e);
            }
        }
    })
}

impl DockerInstanceProvider {
    pub fn new(connector: DockerConnector, snapshot: SnapshotConfig) -> Self {
        Self {
            connector,
            snapshot,
            sequence: PidSequence::global(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_pid_sequence(mut self, sequence: Arc<PidSequence>) -> Self {
        self.sequence = sequence;
        self
    }

    /// Token that aborts image pulls and builds in progress.
    pub fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }

    async fn pull_image(&self, image: &str, logs: Arc<dyn LineConsumer>) -> Result<()> {
        let (name, tag) = split_image_tag(image);
        let mut params = PullParams::new(name)?;
        if let Some(tag) = tag {
            params = params.with_tag(tag);
        }
        self.connector
            .pull(&params, logs_monitor(logs), &self.cancel)
            .await
    }

    async fn build_image(
        &self,
        dockerfile: &str,
        machine: &Machine,
        logs: Arc<dyn LineConsumer>,
    ) -> Result<String> {
        let context = tempfile::tempdir()?;
        let path = context.path().join("Dockerfile");
        tokio::fs::write(&path, dockerfile).await?;
        let params = BuildImageParams::new(vec![path])?
            .with_repository(format!("dockyard-machine/{}", machine.id.to_lowercase()));
        self.connector
            .build_image(&params, logs_monitor(logs), &self.cancel)
            .await
    }

    /// Force-removes a container no instance owns, logging any failure.
    async fn discard_container(&self, container: &str) {
        let cleanup = match RemoveContainerParams::new(container) {
            Ok(params) => params.with_force(true).with_remove_volumes(true),
            Err(e) => {
                warn!("Cannot remove container '{}': {}", container, e);
                return;
            }
        };
        if let Err(e) = self.connector.remove_container(&cleanup).await {
            warn!("Failed to remove container {}: {}", container, e);
        }
    }

    /// Creates and starts the machine's container, then attaches its output
    /// to the logger.
    #[instrument(skip(self, machine, logs), fields(machine = %machine.id))]
    async fn launch(
        &self,
        image: &str,
        machine: Machine,
        logs: Arc<dyn LineConsumer>,
    ) -> Result<Arc<dyn Instance>> {
        let created = self
            .connector
            .create_container(&CreateContainerParams::new(container_config(image, &machine)))
            .await?;
        let container = created.id;

        if let Err(e) = self
            .connector
            .start_container(&StartContainerParams::new(container.as_str())?)
            .await
        {
            warn!("Removing container {} which failed to start", container);
            self.discard_container(&container).await;
            return Err(e);
        }

        let instance = DockerInstance::new(
            container.as_str(),
            machine,
            logs,
            self.connector.clone(),
            self.snapshot.clone(),
            self.sequence.clone(),
        );
        let pump = match self
            .connector
            .attach_container(
                &AttachContainerParams::new(container.as_str())?.with_stream(true),
                instance.log_forwarder(),
            )
            .await
        {
            Ok(pump) => pump,
            Err(e) => {
                warn!("Removing container {} whose output could not be attached", container);
                self.discard_container(&container).await;
                return Err(e);
            }
        };
        instance.set_log_pump(pump.cancellation());
        info!("Machine {} running in container {}", instance.machine().id, container);
        Ok(Arc::new(instance))
    }
}

#[async_trait]
impl InstanceProvider for DockerInstanceProvider {
    fn provider_type(&self) -> &str {
        PROVIDER_TYPE
    }

    fn recipe_types(&self) -> BTreeSet<String> {
        BTreeSet::from([DOCKERFILE_RECIPE.to_string(), IMAGE_RECIPE.to_string()])
    }

    async fn create_instance(
        &self,
        recipe: &Recipe,
        machine: Machine,
        logs: Arc<dyn LineConsumer>,
    ) -> Result<Arc<dyn Instance>> {
        let image = match recipe.recipe_type.as_str() {
            IMAGE_RECIPE => {
                let image = recipe.script.trim().to_string();
                self.pull_image(&image, logs.clone()).await?;
                image
            }
            DOCKERFILE_RECIPE => self.build_image(&recipe.script, &machine, logs.clone()).await?,
            other => {
                return Err(DockyardError::InvalidArgument(format!(
                    "Unsupported recipe type '{}', expected one of: {}, {}",
                    other, DOCKERFILE_RECIPE, IMAGE_RECIPE
                )))
            }
        };
        self.launch(&image, machine, logs).await
    }

    async fn create_instance_from_snapshot(
        &self,
        key: &InstanceKey,
        machine: Machine,
        logs: Arc<dyn LineConsumer>,
    ) -> Result<Arc<dyn Instance>> {
        if key.registry.is_some() {
            let mut params = PullParams::new(key.full_repository())?;
            // The daemon accepts a digest wherever it accepts a tag.
            if let Some(reference) = key.digest.as_deref().or(key.tag.as_deref()) {
                params = params.with_tag(reference);
            }
            self.connector
                .pull(&params, logs_monitor(logs.clone()), &self.cancel)
                .await?;
        }
        self.launch(&key.image_reference(), machine, logs).await
    }

    async fn remove_instance_snapshot(&self, key: &InstanceKey) -> Result<()> {
        let params = RemoveImageParams::new(key.image_reference())?.with_force(true);
        match self.connector.remove_image(&params).await {
            Ok(()) => Ok(()),
            Err(e) if e.is_not_found() => {
                debug!("Snapshot {} was already removed", key);
                Ok(())
            }
            Err(e) => Err(DockyardError::Snapshot(format!(
                "Failed to remove snapshot {}: {}",
                key, e
            ))),
        }
    }
}
