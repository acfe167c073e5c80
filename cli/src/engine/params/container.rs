//! # Container Operation Parameters
//!
//! File: cli/src/engine/params/container.rs
//!
use super::require;
use crate::core::error::Result;
use bollard::container::Config;
use std::time::Duration;

/// Parameters for `POST /containers/create`.
#[derive(Debug, Clone)]
pub struct CreateContainerParams {
    config: Config<String>,
    container_name: Option<String>,
}

impl CreateContainerParams {
    pub fn new(config: Config<String>) -> Self {
        Self {
            config,
            container_name: None,
        }
    }

    pub fn with_container_name(mut self, name: impl Into<String>) -> Self {
        self.container_name = Some(name.into());
        self
    }

    pub fn config(&self) -> &Config<String> {
        &self.config
    }

    pub fn container_name(&self) -> Option<&str> {
        self.container_name.as_deref()
    }
}

/// Parameters for `POST /containers/<id>/start`.
#[derive(Debug, Clone)]
pub struct StartContainerParams {
    container: String,
}

impl StartContainerParams {
    pub fn new(container: impl Into<String>) -> Result<Self> {
        Ok(Self {
            container: require("container", container)?,
        })
    }

    pub fn container(&self) -> &str {
        &self.container
    }
}

/// Parameters for `POST /containers/<id>/stop`.
#[derive(Debug, Clone)]
pub struct StopContainerParams {
    container: String,
    timeout: Option<Duration>,
}

impl StopContainerParams {
    pub fn new(container: impl Into<String>) -> Result<Self> {
        Ok(Self {
            container: require("container", container)?,
            timeout: None,
        })
    }

    /// Time to wait before the daemon kills the container. Sent in whole seconds.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn container(&self) -> &str {
        &self.container
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }
}

/// Parameters for `POST /containers/<id>/kill`.
#[derive(Debug, Clone)]
pub struct KillContainerParams {
    container: String,
    signal: Option<i32>,
}

impl KillContainerParams {
    pub fn new(container: impl Into<String>) -> Result<Self> {
        Ok(Self {
            container: require("container", container)?,
            signal: None,
        })
    }

    /// Signal number; the daemon sends `SIGKILL` when unset.
    pub fn with_signal(mut self, signal: i32) -> Self {
        self.signal = Some(signal);
        self
    }

    pub fn container(&self) -> &str {
        &self.container
    }

    pub fn signal(&self) -> Option<i32> {
        self.signal
    }
}

/// Parameters for `DELETE /containers/<id>`.
#[derive(Debug, Clone)]
pub struct RemoveContainerParams {
    container: String,
    force: Option<bool>,
    remove_volumes: Option<bool>,
}

impl RemoveContainerParams {
    pub fn new(container: impl Into<String>) -> Result<Self> {
        Ok(Self {
            container: require("container", container)?,
            force: None,
            remove_volumes: None,
        })
    }

    pub fn with_force(mut self, force: bool) -> Self {
        self.force = Some(force);
        self
    }

    pub fn with_remove_volumes(mut self, remove_volumes: bool) -> Self {
        self.remove_volumes = Some(remove_volumes);
        self
    }

    pub fn container(&self) -> &str {
        &self.container
    }

    pub fn force(&self) -> Option<bool> {
        self.force
    }

    pub fn remove_volumes(&self) -> Option<bool> {
        self.remove_volumes
    }
}

/// Parameters for `POST /containers/<id>/wait`.
#[derive(Debug, Clone)]
pub struct WaitContainerParams {
    container: String,
}

impl WaitContainerParams {
    pub fn new(container: impl Into<String>) -> Result<Self> {
        Ok(Self {
            container: require("container", container)?,
        })
    }

    pub fn container(&self) -> &str {
        &self.container
    }
}

/// Parameters for `GET /containers/<id>/json`.
#[derive(Debug, Clone)]
pub struct InspectContainerParams {
    container: String,
    return_container_size: Option<bool>,
}

impl InspectContainerParams {
    pub fn new(container: impl Into<String>) -> Result<Self> {
        Ok(Self {
            container: require("container", container)?,
            return_container_size: None,
        })
    }

    pub fn with_return_container_size(mut self, size: bool) -> Self {
        self.return_container_size = Some(size);
        self
    }

    pub fn container(&self) -> &str {
        &self.container
    }

    pub fn return_container_size(&self) -> Option<bool> {
        self.return_container_size
    }
}

/// Parameters for `POST /containers/<id>/attach`.
#[derive(Debug, Clone)]
pub struct AttachContainerParams {
    container: String,
    stream: Option<bool>,
}

impl AttachContainerParams {
    pub fn new(container: impl Into<String>) -> Result<Self> {
        Ok(Self {
            container: require("container", container)?,
            stream: None,
        })
    }

    /// When true the attach follows live output (and replays past logs);
    /// the pump then runs until the container stops.
    pub fn with_stream(mut self, stream: bool) -> Self {
        self.stream = Some(stream);
        self
    }

    pub fn container(&self) -> &str {
        &self.container
    }

    pub fn stream(&self) -> Option<bool> {
        self.stream
    }
}

/// Parameters for `GET /containers/<id>/top`.
#[derive(Debug, Clone)]
pub struct TopParams {
    container: String,
    ps_args: Vec<String>,
}

impl TopParams {
    pub fn new(container: impl Into<String>) -> Result<Self> {
        Ok(Self {
            container: require("container", container)?,
            ps_args: Vec::new(),
        })
    }

    /// Arguments handed to `ps` inside the container, e.g. `["aux"]`.
    pub fn with_ps_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ps_args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn container(&self) -> &str {
        &self.container
    }

    pub fn ps_args(&self) -> Option<&[String]> {
        if self.ps_args.is_empty() {
            None
        } else {
            Some(&self.ps_args)
        }
    }
}

/// Parameters for `POST /commit`.
#[derive(Debug, Clone)]
pub struct CommitParams {
    container: String,
    repository: String,
    tag: Option<String>,
    comment: Option<String>,
    author: Option<String>,
}

impl CommitParams {
    pub fn new(container: impl Into<String>, repository: impl Into<String>) -> Result<Self> {
        Ok(Self {
            container: require("container", container)?,
            repository: require("repository", repository)?,
            tag: None,
            comment: None,
            author: None,
        })
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    pub fn container(&self) -> &str {
        &self.container
    }

    pub fn repository(&self) -> &str {
        &self.repository
    }

    pub fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }

    pub fn comment(&self) -> Option<&str> {
        self.comment.as_deref()
    }

    pub fn author(&self) -> Option<&str> {
        self.author.as_deref()
    }
}
