//! # Dockyard Command Modules
//!
//! File: cli/src/commands/mod.rs
//!
//! ## Overview
//!
//! This module aggregates the command groups of the `dockyard` CLI. Every
//! group is a thin layer over the library: it parses arguments with `clap`,
//! calls the engine client or the machine layer, and prints the result.
//!
//! ## Command Groups
//!
//! - `system`: daemon info, version and the event stream
//! - `image`: list, build, pull, push, tag, remove
//! - `container`: inspect, stop, kill, rm, top, wait, logs, exec, archive copy
//! - `machine`: run a command line in a localhost machine
//!
//! Handlers return `anyhow::Result` so library errors reach the user with
//! context attached. Each handler receives the process-wide cancellation
//! token that Ctrl-C fires.
//!
use anyhow::{Context, Result};
use dockyard::core::config::{self, Config};
use dockyard::engine::DockerConnector;
use tracing::debug;

/// Container inspection, lifecycle, logs, exec and archive copy.
pub mod container;
/// Image listing, build, pull, push, tag and removal.
pub mod image;
/// Running commands in a localhost machine.
pub mod machine;
/// Daemon info, version and events.
pub mod system;

/// Loads the configuration and creates a connector for its daemon.
pub(crate) fn connect() -> Result<(Config, DockerConnector)> {
    let cfg = config::load_config().context("Failed to load configuration")?;
    let connector =
        DockerConnector::new(&cfg.engine).context("Failed to create docker connector")?;
    debug!("Using docker daemon at {}", connector.daemon_uri());
    Ok((cfg, connector))
}

/// Pretty-prints any serializable response as JSON.
pub(crate) fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(value).context("Failed to format response")?
    );
    Ok(())
}
