//! # Container and Exec State
//!
//! File: cli/src/engine/connector/state.rs
//!
//! Read-only queries: container inspection, the process list of a running
//! container and exec inspection. All of them accept only 200.
//!
use super::DockerConnector;
use crate::core::error::Result;
use crate::engine::params::{GetExecInfoParams, InspectContainerParams, TopParams};
use bollard::models::{ContainerInspectResponse, ContainerTopResponse, ExecInspectResponse};
use tracing::instrument;

impl DockerConnector {
    /// Inspects a container (`GET /containers/<id>/json`, 200).
    ///
    /// # Errors
    ///
    /// `Engine` with status 404 if the container does not exist
    /// (see [`DockyardError::is_not_found`](crate::core::error::DockyardError::is_not_found)).
    #[instrument(skip(self, params), fields(container = %params.container()))]
    pub async fn inspect_container(
        &self,
        params: &InspectContainerParams,
    ) -> Result<ContainerInspectResponse> {
        let response = self
            .connection()
            .path(format!("/containers/{}/json", params.container()))
            .flag_if_set("size", params.return_container_size())
            .request()
            .await?;
        response.accept(&[200]).await?.json().await
    }

    /// Lists processes running in a container (`GET /containers/<id>/top`, 200).
    ///
    /// `ps_args` are sent as one space-separated `ps_args` value.
    #[instrument(skip(self, params), fields(container = %params.container()))]
    pub async fn top(&self, params: &TopParams) -> Result<ContainerTopResponse> {
        let response = self
            .connection()
            .path(format!("/containers/{}/top", params.container()))
            .query_if_set("ps_args", params.ps_args().map(|args| args.join(" ")))
            .request()
            .await?;
        response.accept(&[200]).await?.json().await
    }

    /// Inspects an exec instance (`GET /exec/<id>/json`, 200).
    #[instrument(skip(self, params), fields(exec = %params.exec_id()))]
    pub async fn get_exec_info(&self, params: &GetExecInfoParams) -> Result<ExecInspectResponse> {
        let response = self
            .connection()
            .path(format!("/exec/{}/json", params.exec_id()))
            .request()
            .await?;
        response.accept(&[200]).await?.json().await
    }
}
