//! # Dockyard Container Lifecycle Handlers
//!
//! File: cli/src/commands/container/lifecycle.rs
//!
//! ## Overview
//!
//! Implements `inspect`, `stop`, `kill`, `rm`, `top` and `wait`. Commands that
//! take several containers act on all of them concurrently and report every
//! failure before returning the first one.
//!
use crate::commands::{connect, print_json};
use anyhow::{anyhow, Context, Result};
use clap::Parser;
use dockyard::engine::params::{
    InspectContainerParams, KillContainerParams, RemoveContainerParams, StopContainerParams,
    TopParams, WaitContainerParams,
};
use dockyard::engine::DockerConnector;
use futures_util::future::join_all;
use std::future::Future;
use std::time::Duration;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
pub struct InspectArgs {
    container: String,
    /// Include the container's size on disk.
    #[arg(long, short)]
    size: bool,
}

#[derive(Parser, Debug)]
pub struct StopArgs {
    #[arg(required = true, num_args = 1..)]
    containers: Vec<String>,
    /// Seconds to wait before the daemon kills the container.
    #[arg(long, short)]
    time: Option<u64>,
}

#[derive(Parser, Debug)]
pub struct KillArgs {
    container: String,
    /// Signal number (the daemon defaults to SIGKILL).
    #[arg(long, short)]
    signal: Option<i32>,
}

#[derive(Parser, Debug)]
pub struct RmArgs {
    #[arg(required = true, num_args = 1..)]
    containers: Vec<String>,
    /// Kill running containers first.
    #[arg(long, short)]
    force: bool,
    /// Also remove anonymous volumes.
    #[arg(short = 'v', long = "volumes")]
    volumes: bool,
}

#[derive(Parser, Debug)]
pub struct TopArgs {
    container: String,
    /// Arguments passed to `ps` inside the container, after `--`.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    ps_args: Vec<String>,
}

#[derive(Parser, Debug)]
pub struct WaitArgs {
    container: String,
}

pub async fn handle_inspect(args: InspectArgs) -> Result<()> {
    let (_, connector) = connect()?;
    let params =
        InspectContainerParams::new(args.container.as_str())?.with_return_container_size(args.size);
    let inspect = connector
        .inspect_container(&params)
        .await
        .with_context(|| format!("Failed to inspect container '{}'", args.container))?;
    print_json(&inspect)
}

/// Runs `op` for every container concurrently; succeeds only if all did.
async fn for_each_container<F, Fut>(
    connector: &DockerConnector,
    containers: &[String],
    verb: &str,
    op: F,
) -> Result<()>
where
    F: Fn(DockerConnector, String) -> Fut,
    Fut: Future<Output = dockyard::core::error::Result<()>> + Send + 'static,
{
    let tasks: Vec<_> = containers
        .iter()
        .map(|name| tokio::spawn(op(connector.clone(), name.clone())))
        .collect();

    let mut failures = Vec::new();
    for (name, joined) in containers.iter().zip(join_all(tasks).await) {
        match joined {
            Ok(Ok(())) => println!("{} '{}'", verb, name),
            Ok(Err(e)) if e.is_not_found() => warn!("Container '{}' not found.", name),
            Ok(Err(e)) => {
                error!("Failed on container '{}': {}", name, e);
                failures.push(anyhow!(e).context(format!("Container '{}'", name)));
            }
            Err(e) => failures.push(anyhow!("Task for container '{}' failed: {}", name, e)),
        }
    }
    match failures.into_iter().next() {
        None => Ok(()),
        Some(first) => Err(first),
    }
}

pub async fn handle_stop(args: StopArgs) -> Result<()> {
    info!("Stopping containers {:?}", args.containers);
    let (_, connector) = connect()?;
    let timeout = args.time.map(Duration::from_secs);
    for_each_container(&connector, &args.containers, "Stopped", move |connector, name| async move {
        let mut params = StopContainerParams::new(name)?;
        if let Some(timeout) = timeout {
            params = params.with_timeout(timeout);
        }
        connector.stop_container(&params).await
    })
    .await
}

pub async fn handle_kill(args: KillArgs) -> Result<()> {
    let (_, connector) = connect()?;
    let mut params = KillContainerParams::new(args.container.as_str())?;
    if let Some(signal) = args.signal {
        params = params.with_signal(signal);
    }
    connector
        .kill_container(&params)
        .await
        .with_context(|| format!("Failed to kill container '{}'", args.container))?;
    println!("Killed '{}'", args.container);
    Ok(())
}

pub async fn handle_rm(args: RmArgs) -> Result<()> {
    let (_, connector) = connect()?;
    let (force, volumes) = (args.force, args.volumes);
    for_each_container(&connector, &args.containers, "Removed", move |connector, name| async move {
        let params = RemoveContainerParams::new(name)?
            .with_force(force)
            .with_remove_volumes(volumes);
        connector.remove_container(&params).await
    })
    .await
}

pub async fn handle_top(args: TopArgs) -> Result<()> {
    let (_, connector) = connect()?;
    let mut params = TopParams::new(args.container.as_str())?;
    if !args.ps_args.is_empty() {
        params = params.with_ps_args(args.ps_args);
    }
    let top = connector
        .top(&params)
        .await
        .with_context(|| format!("Failed to list processes of '{}'", args.container))?;
    if let Some(titles) = top.titles {
        println!("{}", titles.join("\t"));
    }
    for process in top.processes.unwrap_or_default() {
        println!("{}", process.join("\t"));
    }
    Ok(())
}

pub async fn handle_wait(args: WaitArgs) -> Result<()> {
    let (_, connector) = connect()?;
    let code = connector
        .wait_container(&WaitContainerParams::new(args.container.as_str())?)
        .await
        .with_context(|| format!("Failed to wait for container '{}'", args.container))?;
    println!("{}", code);
    Ok(())
}
