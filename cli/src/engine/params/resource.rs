//! # Archive Copy Parameters
//!
//! File: cli/src/engine/params/resource.rs
//!
use super::require;
use crate::core::error::Result;
use std::fmt;
use tokio::io::AsyncRead;

/// Parameters for `GET /containers/<id>/archive`.
#[derive(Debug, Clone)]
pub struct GetResourceParams {
    container: String,
    source_path: String,
}

impl GetResourceParams {
    pub fn new(container: impl Into<String>, source_path: impl Into<String>) -> Result<Self> {
        Ok(Self {
            container: require("container", container)?,
            source_path: require("source_path", source_path)?,
        })
    }

    pub fn container(&self) -> &str {
        &self.container
    }

    pub fn source_path(&self) -> &str {
        &self.source_path
    }
}

/// Parameters for `PUT /containers/<id>/archive`.
///
/// The source is a tar stream of unknown length; the connector spools it
/// to a temporary file before sending.
pub struct PutResourceParams {
    container: String,
    target_path: String,
    source: Box<dyn AsyncRead + Send + Unpin>,
    no_overwrite_dir_non_dir: Option<bool>,
}

impl PutResourceParams {
    pub fn new(
        container: impl Into<String>,
        target_path: impl Into<String>,
        source: Box<dyn AsyncRead + Send + Unpin>,
    ) -> Result<Self> {
        Ok(Self {
            container: require("container", container)?,
            target_path: require("target_path", target_path)?,
            source,
            no_overwrite_dir_non_dir: None,
        })
    }

    /// Refuse to replace a directory with a non-directory (and vice versa).
    pub fn with_no_overwrite_dir_non_dir(mut self, value: bool) -> Self {
        self.no_overwrite_dir_non_dir = Some(value);
        self
    }

    pub fn container(&self) -> &str {
        &self.container
    }

    pub fn target_path(&self) -> &str {
        &self.target_path
    }

    pub fn no_overwrite_dir_non_dir(&self) -> Option<bool> {
        self.no_overwrite_dir_non_dir
    }

    /// Consumes the parameters, handing the source stream to the caller.
    pub fn into_source(self) -> Box<dyn AsyncRead + Send + Unpin> {
        self.source
    }
}

impl fmt::Debug for PutResourceParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PutResourceParams")
            .field("container", &self.container)
            .field("target_path", &self.target_path)
            .field("no_overwrite_dir_non_dir", &self.no_overwrite_dir_non_dir)
            .finish_non_exhaustive()
    }
}

// --- Unit Tests ---
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_resource_requires_target() {
        let source: Box<dyn AsyncRead + Send + Unpin> = Box::new(&b""[..]);
        assert!(PutResourceParams::new("c1", "", source).is_err());
    }

    #[test]
    fn test_get_resource_fields() {
        let params = GetResourceParams::new("c1", "/etc/hosts").unwrap();
        assert_eq!(params.container(), "c1");
        assert_eq!(params.source_path(), "/etc/hosts");
        assert!(GetResourceParams::new("c1", "").is_err());
    }
}
