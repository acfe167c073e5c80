//! # Image Operation Parameters
//!
//! File: cli/src/engine/params/image.rs
//!
use super::{require, require_non_empty};
use crate::core::error::Result;
use crate::engine::json::AuthConfigs;
use std::path::PathBuf;

/// Parameters for `POST /build`.
#[derive(Debug, Clone)]
pub struct BuildImageParams {
    files: Vec<PathBuf>,
    repository: Option<String>,
    auth_configs: Option<AuthConfigs>,
    do_force_pull: Option<bool>,
    memory_limit: Option<i64>,
    memory_swap_limit: Option<i64>,
}

impl BuildImageParams {
    /// `files` become the build context; one of them is normally a `Dockerfile`.
    pub fn new(files: Vec<PathBuf>) -> Result<Self> {
        Ok(Self {
            files: require_non_empty("files", files)?,
            repository: None,
            auth_configs: None,
            do_force_pull: None,
            memory_limit: None,
            memory_swap_limit: None,
        })
    }

    /// Name (and optional `:tag`) given to the built image.
    pub fn with_repository(mut self, repository: impl Into<String>) -> Self {
        self.repository = Some(repository.into());
        self
    }

    /// Registry credentials used instead of the connector's configured ones.
    pub fn with_auth_configs(mut self, auth_configs: AuthConfigs) -> Self {
        self.auth_configs = Some(auth_configs);
        self
    }

    pub fn with_do_force_pull(mut self, do_force_pull: bool) -> Self {
        self.do_force_pull = Some(do_force_pull);
        self
    }

    /// Memory limit in bytes.
    pub fn with_memory_limit(mut self, bytes: i64) -> Self {
        self.memory_limit = Some(bytes);
        self
    }

    /// Memory plus swap limit in bytes, `-1` for unlimited swap.
    pub fn with_memory_swap_limit(mut self, bytes: i64) -> Self {
        self.memory_swap_limit = Some(bytes);
        self
    }

    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    pub fn repository(&self) -> Option<&str> {
        self.repository.as_deref()
    }

    pub fn auth_configs(&self) -> Option<&AuthConfigs> {
        self.auth_configs.as_ref()
    }

    pub fn do_force_pull(&self) -> Option<bool> {
        self.do_force_pull
    }

    pub fn memory_limit(&self) -> Option<i64> {
        self.memory_limit
    }

    pub fn memory_swap_limit(&self) -> Option<i64> {
        self.memory_swap_limit
    }
}

/// Parameters for `POST /images/create`.
#[derive(Debug, Clone)]
pub struct PullParams {
    image: String,
    tag: Option<String>,
    registry: Option<String>,
}

impl PullParams {
    pub fn new(image: impl Into<String>) -> Result<Self> {
        Ok(Self {
            image: require("image", image)?,
            tag: None,
            registry: None,
        })
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    /// Registry host (`host:port`) to pull from instead of the default one.
    pub fn with_registry(mut self, registry: impl Into<String>) -> Self {
        self.registry = Some(registry.into());
        self
    }

    pub fn image(&self) -> &str {
        &self.image
    }

    pub fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }

    pub fn registry(&self) -> Option<&str> {
        self.registry.as_deref()
    }

    /// `fromImage` value: `<registry>/<image>` or just `<image>`.
    pub fn full_image(&self) -> String {
        match &self.registry {
            Some(registry) => format!("{}/{}", registry, self.image),
            None => self.image.clone(),
        }
    }
}

/// Parameters for `POST /images/<name>/push`.
#[derive(Debug, Clone)]
pub struct PushParams {
    repository: String,
    tag: Option<String>,
    registry: Option<String>,
}

impl PushParams {
    pub fn new(repository: impl Into<String>) -> Result<Self> {
        Ok(Self {
            repository: require("repository", repository)?,
            tag: None,
            registry: None,
        })
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    pub fn with_registry(mut self, registry: impl Into<String>) -> Self {
        self.registry = Some(registry.into());
        self
    }

    pub fn repository(&self) -> &str {
        &self.repository
    }

    pub fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }

    pub fn registry(&self) -> Option<&str> {
        self.registry.as_deref()
    }

    /// Pushed name: `<registry>/<repository>` or just `<repository>`.
    pub fn full_repo(&self) -> String {
        match &self.registry {
            Some(registry) => format!("{}/{}", registry, self.repository),
            None => self.repository.clone(),
        }
    }
}

/// Parameters for `POST /images/<image>/tag`.
#[derive(Debug, Clone)]
pub struct TagParams {
    image: String,
    repository: String,
    tag: Option<String>,
    force: Option<bool>,
}

impl TagParams {
    pub fn new(image: impl Into<String>, repository: impl Into<String>) -> Result<Self> {
        Ok(Self {
            image: require("image", image)?,
            repository: require("repository", repository)?,
            tag: None,
            force: None,
        })
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    pub fn with_force(mut self, force: bool) -> Self {
        self.force = Some(force);
        self
    }

    pub fn image(&self) -> &str {
        &self.image
    }

    pub fn repository(&self) -> &str {
        &self.repository
    }

    pub fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }

    pub fn force(&self) -> Option<bool> {
        self.force
    }
}

/// Parameters for `DELETE /images/<image>`.
#[derive(Debug, Clone)]
pub struct RemoveImageParams {
    image: String,
    force: Option<bool>,
}

impl RemoveImageParams {
    pub fn new(image: impl Into<String>) -> Result<Self> {
        Ok(Self {
            image: require("image", image)?,
            force: None,
        })
    }

    pub fn with_force(mut self, force: bool) -> Self {
        self.force = Some(force);
        self
    }

    pub fn image(&self) -> &str {
        &self.image
    }

    pub fn force(&self) -> Option<bool> {
        self.force
    }
}

/// Parameters for `GET /images/<image>/json`.
#[derive(Debug, Clone)]
pub struct InspectImageParams {
    image: String,
}

impl InspectImageParams {
    pub fn new(image: impl Into<String>) -> Result<Self> {
        Ok(Self {
            image: require("image", image)?,
        })
    }

    pub fn image(&self) -> &str {
        &self.image
    }
}

// --- Unit Tests ---
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_requires_files() {
        assert!(BuildImageParams::new(vec![]).is_err());
        let params = BuildImageParams::new(vec![PathBuf::from("Dockerfile")])
            .unwrap()
            .with_repository("app:dev")
            .with_memory_limit(1 << 30);
        assert_eq!(params.repository(), Some("app:dev"));
        assert_eq!(params.memory_limit(), Some(1 << 30));
        assert_eq!(params.memory_swap_limit(), None);
    }

    #[test]
    fn test_registry_prefix() {
        let pull = PullParams::new("busybox").unwrap();
        assert_eq!(pull.full_image(), "busybox");
        let pull = pull.with_registry("localhost:5000");
        assert_eq!(pull.full_image(), "localhost:5000/busybox");

        let push = PushParams::new("snap/abc")
            .unwrap()
            .with_registry("localhost:5000");
        assert_eq!(push.full_repo(), "localhost:5000/snap/abc");
    }

    #[test]
    fn test_required_identifiers() {
        assert!(PullParams::new("").is_err());
        assert!(PushParams::new("").is_err());
        assert!(TagParams::new("img", "").is_err());
        assert!(RemoveImageParams::new("").is_err());
        assert!(InspectImageParams::new(" ").is_err());
    }
}
