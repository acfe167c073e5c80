//! # Exec Operation Parameters
//!
//! File: cli/src/engine/params/exec.rs
//!
use super::{require, require_non_empty};
use crate::core::error::Result;

/// Parameters for `POST /containers/<id>/exec`.
#[derive(Debug, Clone)]
pub struct CreateExecParams {
    container: String,
    cmd: Vec<String>,
    detach: Option<bool>,
}

impl CreateExecParams {
    pub fn new<I, S>(container: impl Into<String>, cmd: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Ok(Self {
            container: require("container", container)?,
            cmd: require_non_empty("cmd", cmd.into_iter().map(Into::into).collect())?,
            detach: None,
        })
    }

    /// `false` attaches stdout and stderr to the exec.
    pub fn with_detach(mut self, detach: bool) -> Self {
        self.detach = Some(detach);
        self
    }

    pub fn container(&self) -> &str {
        &self.container
    }

    pub fn cmd(&self) -> &[String] {
        &self.cmd
    }

    pub fn detach(&self) -> Option<bool> {
        self.detach
    }
}

/// Parameters for `POST /exec/<id>/start`.
#[derive(Debug, Clone)]
pub struct StartExecParams {
    exec_id: String,
    detach: Option<bool>,
    tty: Option<bool>,
}

impl StartExecParams {
    pub fn new(exec_id: impl Into<String>) -> Result<Self> {
        Ok(Self {
            exec_id: require("exec_id", exec_id)?,
            detach: None,
            tty: None,
        })
    }

    pub fn with_detach(mut self, detach: bool) -> Self {
        self.detach = Some(detach);
        self
    }

    pub fn with_tty(mut self, tty: bool) -> Self {
        self.tty = Some(tty);
        self
    }

    pub fn exec_id(&self) -> &str {
        &self.exec_id
    }

    pub fn detach(&self) -> Option<bool> {
        self.detach
    }

    pub fn tty(&self) -> Option<bool> {
        self.tty
    }
}

/// Parameters for `GET /exec/<id>/json`.
#[derive(Debug, Clone)]
pub struct GetExecInfoParams {
    exec_id: String,
}

impl GetExecInfoParams {
    pub fn new(exec_id: impl Into<String>) -> Result<Self> {
        Ok(Self {
            exec_id: require("exec_id", exec_id)?,
        })
    }

    pub fn exec_id(&self) -> &str {
        &self.exec_id
    }
}

// --- Unit Tests ---
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_exec_requires_command() {
        assert!(CreateExecParams::new("c1", Vec::<String>::new()).is_err());
        assert!(CreateExecParams::new("", ["ls"]).is_err());
        let params = CreateExecParams::new("c1", ["ls", "-la"])
            .unwrap()
            .with_detach(false);
        assert_eq!(params.cmd(), ["ls", "-la"]);
        assert_eq!(params.detach(), Some(false));
    }

    #[test]
    fn test_start_exec_defaults() {
        let params = StartExecParams::new("e1").unwrap();
        assert_eq!(params.detach(), None);
        assert_eq!(params.tty(), None);
        assert!(GetExecInfoParams::new("").is_err());
    }
}
