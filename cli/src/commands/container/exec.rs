//! # Dockyard Container Exec Handler
//!
//! File: cli/src/commands/container/exec.rs
//!
//! ## Overview
//!
//! Implements `dockyard container exec <container> -- <cmd...>`: creates an
//! exec instance with output attached, starts it, prints its output, then
//! exits with the command's exit code.
//!
use crate::commands::connect;
use anyhow::{Context, Result};
use clap::Parser;
use dockyard::engine::log_frames::{LogKind, LogMessage};
use dockyard::engine::params::{CreateExecParams, GetExecInfoParams, StartExecParams};
use tokio_util::sync::CancellationToken;
use tracing::debug;

#[derive(Parser, Debug)]
pub struct ExecArgs {
    container: String,
    /// Allocate a TTY; output is then one raw stream.
    #[arg(long, short)]
    tty: bool,
    /// Command and arguments to run.
    #[arg(required = true, last = true)]
    command: Vec<String>,
}

pub async fn handle_exec(args: ExecArgs, cancel: &CancellationToken) -> Result<()> {
    let (_, connector) = connect()?;
    let exec = connector
        .create_exec(&CreateExecParams::new(args.container.as_str(), args.command.clone())?.with_detach(false))
        .await
        .with_context(|| format!("Failed to create exec in '{}'", args.container))?;
    debug!("Created exec {}", exec.id);

    let print = |message: LogMessage| match message.kind {
        LogKind::Stderr => eprintln!("{}", message.content),
        _ => println!("{}", message.content),
    };
    let pump = connector
        .start_exec(&StartExecParams::new(exec.id.as_str())?.with_tty(args.tty), Some(print))
        .await
        .context("Failed to start exec")?;
    if let Some(pump) = pump {
        let outcome = pump.wait_or_cancel(cancel).await?;
        if cancel.is_cancelled() {
            return Ok(());
        }
        outcome.result.context("Exec output stream failed")?;
    }

    let info = connector
        .get_exec_info(&GetExecInfoParams::new(exec.id.as_str())?)
        .await
        .context("Failed to inspect exec")?;
    match info.exit_code {
        Some(0) | None => Ok(()),
        Some(code) => {
            // Mirror the command's status like `docker exec` does.
            std::process::exit(i32::try_from(code).unwrap_or(1));
        }
    }
}
