//! # Docker Process
//!
//! File: cli/src/machine/docker/process.rs
//!
//! ## Overview
//!
//! An `InstanceProcess` backed by an exec instance in the machine's
//! container. The exec reports whether it is still running, but has no kill
//! operation, so the command line is wrapped in a shell that first writes
//! its own pid to a file; `kill` then runs a second exec that signals the
//! pid in that file.
//!
use crate::common::output::LineConsumer;
use crate::core::error::{DockyardError, Result};
use crate::engine::log_frames::LogMessage;
use crate::engine::params::{CreateExecParams, GetExecInfoParams, StartExecParams};
use crate::engine::DockerConnector;
use crate::machine::{Command, InstanceProcess};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use tracing::{debug, instrument, warn};

/// Directory inside the container holding one pid file per process.
pub const PID_FILE_DIR: &str = "/tmp/dockyard/pids";

pub struct DockerProcess {
    connector: DockerConnector,
    container: String,
    pid: u32,
    command: Command,
    output_channel: Option<String>,
    started: AtomicBool,
    exec_id: OnceLock<String>,
}

/// Quotes `value` as a single POSIX shell word.
pub fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

impl DockerProcess {
    pub fn new(
        connector: DockerConnector,
        container: impl Into<String>,
        pid: u32,
        command: Command,
        output_channel: Option<String>,
    ) -> Self {
        Self {
            connector,
            container: container.into(),
            pid,
            command,
            output_channel,
            started: AtomicBool::new(false),
            exec_id: OnceLock::new(),
        }
    }

    fn pid_file(&self) -> String {
        format!("{}/{}.pid", PID_FILE_DIR, self.pid)
    }

    /// The shell script the exec runs: record the shell's pid, then replace
    /// the shell with the command line.
    pub fn wrapped_command_line(&self) -> String {
        format!(
            "mkdir -p {} && echo $$ > {} && exec /bin/sh -c {}",
            PID_FILE_DIR,
            self.pid_file(),
            shell_quote(&self.command.command_line)
        )
    }

    fn not_found(&self) -> DockyardError {
        DockyardError::NotFound(format!("Process with pid {} not found", self.pid))
    }
}

#[async_trait]
impl InstanceProcess for DockerProcess {
    fn pid(&self) -> u32 {
        self.pid
    }

    fn command(&self) -> &Command {
        &self.command
    }

    fn output_channel(&self) -> Option<&str> {
        self.output_channel.as_deref()
    }

    async fn check_alive(&self) -> Result<()> {
        if !self.started.load(Ordering::SeqCst) {
            return Err(DockyardError::NotFound("Process is not started yet".into()));
        }
        let Some(exec_id) = self.exec_id.get() else {
            return Err(self.not_found());
        };
        match self
            .connector
            .get_exec_info(&GetExecInfoParams::new(exec_id.as_str())?)
            .await
        {
            Ok(info) if info.running == Some(true) => Ok(()),
            Ok(_) => Err(self.not_found()),
            Err(e) if e.is_not_found() => Err(self.not_found()),
            Err(e) => Err(e),
        }
    }

    #[instrument(skip(self, output), fields(container = %self.container, pid = self.pid))]
    async fn start(&self, output: Option<Arc<dyn LineConsumer>>) -> Result<()> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(DockyardError::Conflict("Process already started.".into()));
        }

        let exec = self
            .connector
            .create_exec(
                &CreateExecParams::new(
                    self.container.as_str(),
                    ["/bin/sh".to_string(), "-c".to_string(), self.wrapped_command_line()],
                )?
                .with_detach(false),
            )
            .await?;
        // `started` admits a single caller, so the cell is still empty.
        if self.exec_id.set(exec.id.clone()).is_err() {
            warn!("Process {} already had an exec id", self.pid);
        }
        debug!("Process {} runs as exec {}", self.pid, exec.id);

        let pid = self.pid;
        let forward = move |message: LogMessage| {
            if let Some(output) = &output {
                if let Err(e) = output.write_line(&message.content) {
                    warn!("Failed to write output of process {}: {}", pid, e);
                }
            }
        };
        let pump = self
            .connector
            .start_exec(&StartExecParams::new(exec.id.as_str())?, Some(forward))
            .await?;
        if let Some(pump) = pump {
            pump.wait().await?.result?;
        }
        Ok(())
    }

    async fn kill(&self) -> Result<()> {
        if self.exec_id.get().is_none() {
            debug!("Kill requested for process {} which never ran", self.pid);
            return Ok(());
        }
        let script = format!("kill -9 $(cat {})", self.pid_file());
        let exec = self
            .connector
            .create_exec(
                &CreateExecParams::new(
                    self.container.as_str(),
                    ["/bin/sh".to_string(), "-c".to_string(), script],
                )?
                .with_detach(true),
            )
            .await?;
        self.connector
            .start_exec(&StartExecParams::new(exec.id)?, None::<fn(LogMessage)>)
            .await?;
        Ok(())
    }
}
