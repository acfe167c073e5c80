//! # Dockyard Container Logs Handler
//!
//! File: cli/src/commands/container/logs.rs
//!
//! ## Overview
//!
//! Implements `dockyard container logs` by attaching to the container. With
//! `--follow` the attach replays what the container already wrote and keeps
//! streaming until the container stops or Ctrl-C is pressed; stderr lines go
//! to stderr.
//!
use crate::commands::connect;
use anyhow::{Context, Result};
use clap::Parser;
use dockyard::engine::log_frames::{LogKind, LogMessage};
use dockyard::engine::params::AttachContainerParams;
use tokio_util::sync::CancellationToken;

#[derive(Parser, Debug)]
pub struct LogsArgs {
    container: String,
    /// Replay existing output and keep streaming.
    #[arg(short, long)]
    follow: bool,
}

pub async fn handle_logs(args: LogsArgs, cancel: &CancellationToken) -> Result<()> {
    let (_, connector) = connect()?;
    let params = AttachContainerParams::new(args.container.as_str())?.with_stream(args.follow);
    let pump = connector
        .attach_container(&params, |message: LogMessage| match message.kind {
            LogKind::Stderr => eprintln!("{}", message.content),
            _ => println!("{}", message.content),
        })
        .await
        .with_context(|| format!("Failed to attach to container '{}'", args.container))?;
    let outcome = pump.wait_or_cancel(cancel).await?;
    if !cancel.is_cancelled() {
        outcome.result.context("Log stream failed")?;
    }
    connector.shutdown().await;
    Ok(())
}
