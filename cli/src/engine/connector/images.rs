//! # Image Management
//!
//! File: cli/src/engine/connector/images.rs
//!
//! Short image operations: listing, inspection, tagging, removal and
//! committing a container into a new image. The long-running build, pull
//! and push live in `operations`.
//!
use super::DockerConnector;
use crate::core::error::Result;
use crate::engine::json::Created;
use crate::engine::params::{CommitParams, InspectImageParams, RemoveImageParams, TagParams};
use bollard::models::{ImageInspect, ImageSummary};
use hyper::Method;
use tracing::{info, instrument};

impl DockerConnector {
    /// Lists local images (`GET /images/json`, 200).
    #[instrument(skip(self))]
    pub async fn list_images(&self) -> Result<Vec<ImageSummary>> {
        let response = self.connection().path("/images/json").request().await?;
        response.accept(&[200]).await?.json().await
    }

    /// Inspects one image (`GET /images/<image>/json`, 200).
    #[instrument(skip(self, params), fields(image = %params.image()))]
    pub async fn inspect_image(&self, params: &InspectImageParams) -> Result<ImageInspect> {
        let response = self
            .connection()
            .path(format!("/images/{}/json", params.image()))
            .request()
            .await?;
        response.accept(&[200]).await?.json().await
    }

    /// Tags an image into a repository (`POST /images/<image>/tag`, any 2xx).
    #[instrument(skip(self, params), fields(image = %params.image()))]
    pub async fn tag(&self, params: &TagParams) -> Result<()> {
        self.connection()
            .method(Method::POST)
            .path(format!("/images/{}/tag", params.image()))
            .query("repo", params.repository())
            .query_if_set("tag", params.tag())
            .flag_if_set("force", params.force())
            .request()
            .await?
            .accept_success()
            .await?;
        info!(
            "Tagged '{}' as '{}:{}'",
            params.image(),
            params.repository(),
            params.tag().unwrap_or("latest")
        );
        Ok(())
    }

    /// Removes an image (`DELETE /images/<image>`, 200).
    #[instrument(skip(self, params), fields(image = %params.image()))]
    pub async fn remove_image(&self, params: &RemoveImageParams) -> Result<()> {
        self.connection()
            .method(Method::DELETE)
            .path(format!("/images/{}", params.image()))
            .flag_if_set("force", params.force())
            .request()
            .await?
            .accept(&[200])
            .await?;
        info!("Removed image '{}'", params.image());
        Ok(())
    }

    /// Creates an image from a container's changes (`POST /commit`, 201).
    ///
    /// # Returns
    ///
    /// * `Result<String>` - The id of the new image.
    #[instrument(skip(self, params), fields(container = %params.container()))]
    pub async fn commit(&self, params: &CommitParams) -> Result<String> {
        let response = self
            .connection()
            .method(Method::POST)
            .path("/commit")
            .query("container", params.container())
            .query("repo", params.repository())
            .query_if_set("tag", params.tag())
            .query_if_set("comment", params.comment())
            .query_if_set("author", params.author())
            .request()
            .await?
            .accept(&[201])
            .await?;
        let created: Created = response.json().await?;
        info!(
            "Committed container '{}' as image {}",
            params.container(),
            created.id
        );
        Ok(created.id)
    }
}
