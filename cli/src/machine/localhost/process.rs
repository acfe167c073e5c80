//! # Localhost Process
//!
//! File: cli/src/machine/localhost/process.rs
//!
//! ## Overview
//!
//! An `InstanceProcess` backed by a real OS process. The command line runs
//! under the configured shell with stderr folded into stdout, so the
//! consumer sees one combined stream in the order the process wrote it.
//!
//! ## Architecture
//!
//! `start` spawns the child and hands it to a supervisor task that owns it
//! until it exits. The supervisor publishes the exit through a `watch`
//! channel (read by `check_alive`) and listens on a `CancellationToken`
//! (fired by `kill`). `start` itself reads the output to the end and then
//! waits for the supervisor to observe the exit, so it returns only once the
//! process is gone.
//!
use crate::common::output::LineConsumer;
use crate::core::error::{DockyardError, Result};
use crate::machine::{Command, InstanceProcess};
use async_trait::async_trait;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Child;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

/// Handles to a spawned child, set once by `start`.
#[derive(Debug)]
struct Running {
    kill: CancellationToken,
    exited: watch::Receiver<bool>,
}

/// A command run as a local OS process.
#[derive(Debug)]
pub struct LocalhostProcess {
    pid: u32,
    command: Command,
    output_channel: Option<String>,
    shell: String,
    started: AtomicBool,
    running: OnceLock<Running>,
}

impl LocalhostProcess {
    pub fn new(pid: u32, command: Command, output_channel: Option<String>, shell: impl Into<String>) -> Self {
        Self {
            pid,
            command,
            output_channel,
            shell: shell.into(),
            started: AtomicBool::new(false),
            running: OnceLock::new(),
        }
    }

    fn spawn(&self) -> Result<Child> {
        // `exec 2>&1` merges stderr into the stdout pipe for the whole script.
        let script = format!("exec 2>&1\n{}", self.command.command_line);
        tokio::process::Command::new(&self.shell)
            .arg("-c")
            .arg(script)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .spawn()
            .map_err(|e| {
                DockyardError::Machine(format!(
                    "Localhost machine command execution error: {}",
                    e
                ))
            })
    }
}

/// Owns the child until it exits, killing it first if asked to.
async fn supervise(mut child: Child, kill: CancellationToken, exited: watch::Sender<bool>, pid: u32) {
    let finished = tokio::select! {
        status = child.wait() => Some(status),
        _ = kill.cancelled() => None,
    };
    let status = match finished {
        Some(status) => status,
        None => {
            debug!("Killing process {}", pid);
            if let Err(e) = child.start_kill() {
                warn!("Failed to kill process {}: {}", pid, e);
            }
            child.wait().await
        }
    };
    match status {
        Ok(status) => debug!("Process {} exited with {}", pid, status),
        Err(e) => warn!("Failed to wait for process {}: {}", pid, e),
    }
    exited.send_replace(true);
}

#[async_trait]
impl InstanceProcess for LocalhostProcess {
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
        match self.running.get() {
            Some(running) if !*running.exited.borrow() => Ok(()),
            _ => Err(DockyardError::NotFound(format!(
                "Process with pid {} not found",
                self.pid
            ))),
        }
    }

    #[instrument(skip(self, output), fields(pid = self.pid))]
    async fn start(&self, output: Option<Arc<dyn LineConsumer>>) -> Result<()> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(DockyardError::Conflict("Process already started.".into()));
        }

        let mut child = self.spawn()?;
        let stdout = child.stdout.take().ok_or_else(|| {
            DockyardError::Machine("Localhost machine command execution error: no output pipe".into())
        })?;

        let kill = CancellationToken::new();
        let (exited_tx, exited_rx) = watch::channel(false);
        let mut exited = exited_rx.clone();
        // `started` admits a single caller, so the cell is still empty.
        if self
            .running
            .set(Running {
                kill: kill.clone(),
                exited: exited_rx,
            })
            .is_err()
        {
            warn!("Process {} was already running", self.pid);
        }
        tokio::spawn(supervise(child, kill.clone(), exited_tx, self.pid));
        debug!("Started '{}'", self.command.command_line);

        let mut reader = BufReader::new(stdout);
        let mut buf = Vec::new();
        loop {
            buf.clear();
            // Background children of a killed shell may keep the pipe open.
            let read = tokio::select! {
                read = reader.read_until(b'\n', &mut buf) => read?,
                _ = kill.cancelled() => break,
            };
            if read == 0 {
                break;
            }
            let line = String::from_utf8_lossy(&buf);
            let line = line.trim_end_matches('\n').trim_end_matches('\r');
            if let Some(output) = &output {
                if let Err(e) = output.write_line(line) {
                    warn!("Failed to write output of process {}: {}", self.pid, e);
                }
            }
        }

        // The supervisor may still be reaping the child after the pipe closed.
        if exited.wait_for(|done| *done).await.is_err() {
            debug!("Supervisor of process {} ended without reporting", self.pid);
        }
        Ok(())
    }

    async fn kill(&self) -> Result<()> {
        match self.running.get() {
            Some(running) => running.kill.cancel(),
            None => debug!("Kill requested for process {} which never ran", self.pid),
        }
        Ok(())
    }
}

// --- Unit Tests ---
#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::output::CollectingLineConsumer;

    fn process(command_line: &str) -> LocalhostProcess {
        LocalhostProcess::new(7, Command::new("test", command_line), None, "/bin/sh")
    }

    #[tokio::test]
    async fn test_not_started() {
        let process = process("true");
        assert!(!process.is_alive().await);
        let err = process.check_alive().await.unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "Process is not started yet");
    }

    #[tokio::test]
    async fn test_output_combines_streams() {
        let process = process("echo out; echo err 1>&2; printf 'no newline'");
        let collector = Arc::new(CollectingLineConsumer::new());
        process.start(Some(collector.clone())).await.unwrap();
        assert_eq!(collector.lines(), vec!["out", "err", "no newline"]);
    }

    #[tokio::test]
    async fn test_ended_process_stays_not_found() {
        let process = process("exit 3");
        process.start(None).await.unwrap();
        for _ in 0..3 {
            let err = process.check_alive().await.unwrap_err();
            assert_eq!(err.to_string(), "Process with pid 7 not found");
        }
    }

    #[tokio::test]
    async fn test_restart_after_exit_conflicts() {
        let process = process("true");
        process.start(None).await.unwrap();
        let err = process.start(None).await.unwrap_err();
        assert!(matches!(err, DockyardError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_spawn_failure() {
        let process = LocalhostProcess::new(1, Command::new("t", "true"), None, "/nonexistent/shell");
        let err = process.start(None).await.unwrap_err();
        assert!(err.to_string().contains("Localhost machine command execution error"));
        // Started, but no process behind it.
        assert!(process.check_alive().await.unwrap_err().is_not_found());
    }
}
