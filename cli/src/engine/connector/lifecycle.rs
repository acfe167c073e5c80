//! # Container Lifecycle
//!
//! File: cli/src/engine/connector/lifecycle.rs
//!
//! ## Overview
//!
//! Create, start, stop, kill, remove and wait. Start and stop treat 304
//! (Not Modified, "already in that state") as success, the same as 204.
//!
//! ## Usage
//!
//! ```rust,ignore
//! let created = connector
//!     .create_container(&CreateContainerParams::new(config).with_container_name("ws-1"))
//!     .await?;
//! connector.start_container(&StartContainerParams::new(&created.id)?).await?;
//! let exit_code = connector.wait_container(&WaitContainerParams::new(&created.id)?).await?;
//! ```
//!
use super::DockerConnector;
use crate::core::error::Result;
use crate::engine::params::{
    CreateContainerParams, KillContainerParams, RemoveContainerParams, StartContainerParams,
    StopContainerParams, WaitContainerParams,
};
use bollard::models::{ContainerCreateResponse, ContainerWaitResponse};
use hyper::Method;
use tracing::{debug, info, instrument, warn};

impl DockerConnector {
    /// Creates a container (`POST /containers/create`, 201).
    ///
    /// # Returns
    ///
    /// * `Result<ContainerCreateResponse>` - The new container id and any
    ///   warnings the daemon produced.
    #[instrument(skip(self, params), fields(name = ?params.container_name()))]
    pub async fn create_container(
        &self,
        params: &CreateContainerParams,
    ) -> Result<ContainerCreateResponse> {
        let response = self
            .connection()
            .method(Method::POST)
            .path("/containers/create")
            .query_if_set("name", params.container_name())
            .json_entity(params.config())?
            .request()
            .await?
            .accept(&[201])
            .await?;
        let created: ContainerCreateResponse = response.json().await?;
        for warning in &created.warnings {
            warn!("Daemon warning for container {}: {}", created.id, warning);
        }
        info!("Created container {}", created.id);
        Ok(created)
    }

    /// Starts a container (`POST /containers/<id>/start`, 204 or 304).
    ///
    /// A 200 is also accepted: some daemon versions answer 200 with a
    /// warning about the loopback storage backend. The warning is logged.
    #[instrument(skip(self, params), fields(container = %params.container()))]
    pub async fn start_container(&self, params: &StartContainerParams) -> Result<()> {
        let response = self
            .connection()
            .method(Method::POST)
            .path(format!("/containers/{}/start", params.container()))
            .request()
            .await?;
        match response.status() {
            204 => info!("Container '{}' started", params.container()),
            304 => info!("Container '{}' was already started", params.container()),
            200 => {
                let warning = response.into_engine_error().await;
                warn!("{}", warning);
            }
            _ => return Err(response.into_engine_error().await),
        }
        Ok(())
    }

    /// Stops a container (`POST /containers/<id>/stop`, 204 or 304).
    ///
    /// The optional timeout is sent in whole seconds; the daemon kills the
    /// container once it expires.
    #[instrument(skip(self, params), fields(container = %params.container()))]
    pub async fn stop_container(&self, params: &StopContainerParams) -> Result<()> {
        let response = self
            .connection()
            .method(Method::POST)
            .path(format!("/containers/{}/stop", params.container()))
            .query_if_set("t", params.timeout().map(|t| t.as_secs()))
            .request()
            .await?
            .accept(&[204, 304])
            .await?;
        if response.status() == 304 {
            info!("Container '{}' was already stopped", params.container());
        } else {
            info!("Container '{}' stopped", params.container());
        }
        Ok(())
    }

    /// Sends a signal to a container (`POST /containers/<id>/kill`, 204).
    #[instrument(skip(self, params), fields(container = %params.container()))]
    pub async fn kill_container(&self, params: &KillContainerParams) -> Result<()> {
        self.connection()
            .method(Method::POST)
            .path(format!("/containers/{}/kill", params.container()))
            .query_if_set("signal", params.signal())
            .request()
            .await?
            .accept(&[204])
            .await?;
        debug!("Signalled container '{}'", params.container());
        Ok(())
    }

    /// Removes a container (`DELETE /containers/<id>`, 204).
    #[instrument(skip(self, params), fields(container = %params.container()))]
    pub async fn remove_container(&self, params: &RemoveContainerParams) -> Result<()> {
        self.connection()
            .method(Method::DELETE)
            .path(format!("/containers/{}", params.container()))
            .flag_if_set("force", params.force())
            .flag_if_set("v", params.remove_volumes())
            .request()
            .await?
            .accept(&[204])
            .await?;
        info!("Removed container '{}'", params.container());
        Ok(())
    }

    /// Blocks until a container stops (`POST /containers/<id>/wait`, 200).
    ///
    /// # Returns
    ///
    /// * `Result<i64>` - The container's exit code.
    #[instrument(skip(self, params), fields(container = %params.container()))]
    pub async fn wait_container(&self, params: &WaitContainerParams) -> Result<i64> {
        let response = self
            .connection()
            .method(Method::POST)
            .path(format!("/containers/{}/wait", params.container()))
            .request()
            .await?
            .accept(&[200])
            .await?;
        let exit: ContainerWaitResponse = response.json().await?;
        Ok(exit.status_code)
    }
}
