//! # Archive Transfer
//!
//! File: cli/src/engine/connector/resources.rs
//!
//! ## Overview
//!
//! Copies files out of and into containers as tar streams, through
//! `/containers/<id>/archive`.
//!
//! Uploads need a `Content-Length` up front, but the caller's source is an
//! arbitrary stream. `put_resource` therefore spools the source into a
//! temporary file first, then streams that file to the daemon. The file is
//! removed when the call ends, whatever the outcome; a failed removal is
//! logged and does not hide the real result.
//!
use super::DockerConnector;
use crate::core::error::Result;
use crate::engine::connection::ResponseBody;
use crate::engine::params::{GetResourceParams, PutResourceParams};
use hyper::{header::CONTENT_TYPE, Method};
use tokio::io::AsyncWriteExt;
use tracing::{debug, instrument, warn};

impl DockerConnector {
    /// Downloads a path from a container as a tar stream
    /// (`GET /containers/<id>/archive`, 200).
    ///
    /// # Returns
    ///
    /// * `Result<ResponseBody>` - The archive. The connection stays open
    ///   until the body is dropped.
    #[instrument(skip(self, params), fields(container = %params.container()))]
    pub async fn get_resource(&self, params: &GetResourceParams) -> Result<ResponseBody> {
        let response = self
            .connection()
            .path(format!("/containers/{}/archive", params.container()))
            .query("path", params.source_path())
            .request()
            .await?
            .accept(&[200])
            .await?;
        Ok(response.into_body())
    }

    /// Extracts a tar stream into a container directory
    /// (`PUT /containers/<id>/archive`, 200).
    ///
    /// # Errors
    ///
    /// * `Io` - The source could not be read or spooled.
    /// * `Engine` - The daemon rejected the archive (e.g. 404 for a
    ///   missing target directory).
    #[instrument(skip(self, params), fields(container = %params.container()))]
    pub async fn put_resource(&self, params: PutResourceParams) -> Result<()> {
        let container = params.container().to_string();
        let target_path = params.target_path().to_string();
        let no_overwrite = params.no_overwrite_dir_non_dir();
        let mut source = params.into_source();

        let spool = tempfile::Builder::new()
            .prefix("dockyard-put-")
            .suffix(".tar")
            .tempfile()?;
        let spool_path = spool.path().to_path_buf();

        let result = async {
            let mut file = tokio::fs::File::from_std(spool.reopen()?);
            let length = tokio::io::copy(&mut source, &mut file).await?;
            file.flush().await?;
            debug!("Spooled {} bytes for upload to {}", length, target_path);

            let upload = tokio::fs::File::open(&spool_path).await?;
            self.connection()
                .method(Method::PUT)
                .path(format!("/containers/{}/archive", container))
                .query("path", &target_path)
                .flag_if_set("noOverwriteDirNonDir", no_overwrite)
                .header(CONTENT_TYPE.as_str(), "application/x-tar")
                .entity_reader(upload, length)
                .request()
                .await?
                .accept(&[200])
                .await?;
            Ok(())
        }
        .await;

        if let Err(e) = spool.close() {
            warn!(
                "Failed to remove temporary archive {}: {}",
                spool_path.display(),
                e
            );
        }
        result
    }
}
