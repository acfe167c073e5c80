//! # Long-Running Image Operations
//!
//! File: cli/src/engine/connector/operations.rs
//!
//! ## Overview
//!
//! Build, pull and push answer with 200 as soon as the daemon accepts the
//! request and then stream JSON progress messages until the work is done.
//! Each of them runs in three stages:
//!
//! 1. Issue the request and check the status.
//! 2. Pump the progress stream on a background task, feeding every message
//!    to the caller's `ProgressMonitor`.
//! 3. Wait for the pump, or cancel it when the caller's token fires, then
//!    judge the outcome.
//!
//! A 200 does not mean success. The stream itself can carry the verdict:
//! a build succeeded only if a `Successfully built <id>` line went by, and
//! a push succeeded only if it reported a digest and no message carried an
//! `error` field.
//!
use super::DockerConnector;
use crate::common::archive::tar::create_context_tar;
use crate::core::error::{DockyardError, Result};
use crate::engine::json::ProgressStatus;
use crate::engine::params::{BuildImageParams, PullParams, PushParams};
use crate::engine::progress::ProgressMonitor;
use crate::engine::pump::{JsonMessageDecoder, MessageProcessor};
use hyper::{header::CONTENT_TYPE, Method};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

const BUILD_SUCCESS_MARKER: &str = "Successfully built ";

/// Extracts the image id from a `Successfully built <hex>` stream line.
pub fn build_image_id(status: &ProgressStatus) -> Option<String> {
    let stream = status.stream.as_deref()?;
    let rest = stream.strip_prefix(BUILD_SUCCESS_MARKER)?;
    let id: String = rest.chars().take_while(|c| c.is_ascii_hexdigit()).collect();
    Some(id)
}

/// Extracts the digest from a `<tag>: digest: <digest> size: <n>` status.
pub fn push_digest(status: &ProgressStatus, digest_prefix: &str) -> Option<String> {
    let text = status.status.as_deref()?;
    let rest = text.strip_prefix(digest_prefix)?;
    let digest = match rest.find(' ') {
        Some(end) => &rest[..end],
        None => rest.trim_end(),
    };
    Some(digest.to_string())
}

struct BuildProgress {
    monitor: Arc<dyn ProgressMonitor>,
    image_id: Option<String>,
}

impl MessageProcessor<ProgressStatus> for BuildProgress {
    fn process(&mut self, status: ProgressStatus) {
        if let Some(id) = build_image_id(&status) {
            self.image_id = Some(id);
        }
        self.monitor.update_progress(&status);
    }
}

struct PullProgress {
    monitor: Arc<dyn ProgressMonitor>,
}

impl MessageProcessor<ProgressStatus> for PullProgress {
    fn process(&mut self, status: ProgressStatus) {
        self.monitor.update_progress(&status);
    }
}

struct PushProgress {
    monitor: Arc<dyn ProgressMonitor>,
    digest_prefix: String,
    digest: Option<String>,
    error: Option<String>,
}

impl MessageProcessor<ProgressStatus> for PushProgress {
    fn process(&mut self, status: ProgressStatus) {
        // Once the daemon reported an error the rest of the stream is noise.
        if self.error.is_some() {
            return;
        }
        self.monitor.update_progress(&status);
        if let Some(err) = &status.error {
            self.error = Some(err.clone());
            return;
        }
        if let Some(digest) = push_digest(&status, &self.digest_prefix) {
            self.digest = Some(digest);
        }
    }
}

impl DockerConnector {
    /// Builds an image from a set of files (`POST /build`, 200).
    ///
    /// The files are packed into a gzipped tar and sent as the build
    /// context. Registry credentials for base images go in
    /// `X-Registry-Config`: the ones on `params` if given, otherwise the
    /// connector's.
    ///
    /// # Arguments
    ///
    /// * `params` - Build context files and build options.
    /// * `monitor` - Receives every progress message.
    /// * `cancel` - Stops waiting (and closes the stream) when cancelled.
    ///
    /// # Returns
    ///
    /// * `Result<String>` - The id of the built image.
    ///
    /// # Errors
    ///
    /// * `Engine` - The daemon rejected the request.
    /// * `Stream` - The progress stream broke or could not be decoded.
    /// * `BuildFailed` - The stream ended without a success line.
    /// * `Cancelled` - `cancel` fired first.
    #[instrument(skip(self, params, monitor, cancel), fields(repository = ?params.repository()))]
    pub async fn build_image(
        &self,
        params: &BuildImageParams,
        monitor: Arc<dyn ProgressMonitor>,
        cancel: &CancellationToken,
    ) -> Result<String> {
        let files = params.files().to_vec();
        let context = tokio::task::spawn_blocking(move || create_context_tar(&files))
            .await
            .map_err(|e| DockyardError::Task(format!("build context packing failed: {}", e)))??;
        debug!("Build context is {} bytes", context.len());

        let auth_configs = params.auth_configs().unwrap_or(&self.auth_configs);
        let response = self
            .connection()
            .method(Method::POST)
            .path("/build")
            .query("rm", 1)
            .query("forcerm", 1)
            .query_if_set("t", params.repository())
            .query_if_set("memory", params.memory_limit())
            .query_if_set("memswap", params.memory_swap_limit())
            .flag_if_set("pull", params.do_force_pull())
            .header(CONTENT_TYPE.as_str(), "application/x-compressed-tar")
            .header("X-Registry-Config", auth_configs.registry_config_header())
            .entity(context)
            .request()
            .await?
            .accept(&[200])
            .await?;

        let handle = self.spawn_pump(
            response.into_body(),
            JsonMessageDecoder::<ProgressStatus>::new(),
            BuildProgress {
                monitor,
                image_id: None,
            },
        );
        let outcome = handle.wait_or_cancel(cancel).await?;
        outcome.result?;
        match outcome.processor.image_id {
            Some(id) => {
                info!("Built image {}", id);
                Ok(id)
            }
            None => {
                warn!("Build stream ended without a success marker");
                Err(DockyardError::BuildFailed)
            }
        }
    }

    /// Pulls an image (`POST /images/create`, 200).
    ///
    /// `fromImage` is `<registry>/<image>` when a registry is given, and the
    /// credentials for that registry (or `{}`) go in `X-Registry-Auth`.
    ///
    /// # Errors
    ///
    /// * `Engine` - The daemon rejected the request.
    /// * `Stream` - The progress stream broke or could not be decoded.
    /// * `Cancelled` - `cancel` fired first.
    #[instrument(skip(self, params, monitor, cancel), fields(image = %params.image()))]
    pub async fn pull(
        &self,
        params: &PullParams,
        monitor: Arc<dyn ProgressMonitor>,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let response = self
            .connection()
            .method(Method::POST)
            .path("/images/create")
            .query("fromImage", params.full_image())
            .query_if_set("tag", params.tag())
            .header(
                "X-Registry-Auth",
                self.auth_configs.registry_auth_header(params.registry()),
            )
            .request()
            .await?
            .accept(&[200])
            .await?;

        let handle = self.spawn_pump(
            response.into_body(),
            JsonMessageDecoder::<ProgressStatus>::new(),
            PullProgress { monitor },
        );
        handle.wait_or_cancel(cancel).await?.result?;
        info!("Pulled image {}", params.full_image());
        Ok(())
    }

    /// Pushes a repository to its registry (`POST /images/<repo>/push`, 200).
    ///
    /// # Returns
    ///
    /// * `Result<String>` - The digest the registry reported, e.g.
    ///   `sha256:9a70e6...`.
    ///
    /// # Errors
    ///
    /// * `Engine` - The daemon rejected the request.
    /// * `Progress` - A progress message carried an `error` field.
    /// * `Stream` - The progress stream broke or could not be decoded.
    /// * `DigestMissing` - The push finished but no digest was reported.
    /// * `Cancelled` - `cancel` fired first.
    #[instrument(skip(self, params, monitor, cancel), fields(repository = %params.repository()))]
    pub async fn push(
        &self,
        params: &PushParams,
        monitor: Arc<dyn ProgressMonitor>,
        cancel: &CancellationToken,
    ) -> Result<String> {
        let full_repo = params.full_repo();
        let tag = params.tag().unwrap_or("latest");
        let response = self
            .connection()
            .method(Method::POST)
            .path(format!("/images/{}/push", full_repo))
            .query_if_set("tag", params.tag())
            .header(
                "X-Registry-Auth",
                self.auth_configs.registry_auth_header(params.registry()),
            )
            .request()
            .await?
            .accept(&[200])
            .await?;

        let handle = self.spawn_pump(
            response.into_body(),
            JsonMessageDecoder::<ProgressStatus>::new(),
            PushProgress {
                monitor,
                digest_prefix: format!("{}: digest: ", tag),
                digest: None,
                error: None,
            },
        );
        let outcome = handle.wait_or_cancel(cancel).await?;
        if let Some(err) = outcome.processor.error {
            error!("Push of {}:{} failed: {}", full_repo, tag, err);
            return Err(DockyardError::Progress(err));
        }
        outcome.result?;
        match outcome.processor.digest {
            Some(digest) => {
                info!("Pushed {}:{} ({})", full_repo, tag, digest);
                Ok(digest)
            }
            None => {
                error!(
                    "Docker image {}:{} was successfully pushed, but its digest wasn't obtained",
                    full_repo, tag
                );
                Err(DockyardError::DigestMissing)
            }
        }
    }
}
