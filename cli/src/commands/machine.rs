//! # Dockyard Machine Command
//!
//! File: cli/src/commands/machine.rs
//!
//! ## Overview
//!
//! `dockyard machine run -- <command line>` creates a throwaway localhost
//! machine, runs the command line in it through the configured shell and
//! streams its output. It exercises the same lifecycle a workspace server
//! drives: provider, instance, process, destroy.
//!
//! ## Examples
//!
//! ```bash
//! dockyard machine run -- 'echo $HOME && ls'
//! dockyard machine run --dev --show-servers -- make test
//! ```
//!
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dockyard::common::output::{LineConsumer, StdoutLineConsumer};
use dockyard::core::config;
use dockyard::machine::localhost::{LocalhostInstanceProvider, RECIPE_TYPE};
use dockyard::machine::{Command, InstanceProvider, Machine, MachineConfig, Recipe};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Parser, Debug)]
pub struct MachineArgs {
    #[command(subcommand)]
    command: MachineCommand,
}

#[derive(Subcommand, Debug)]
enum MachineCommand {
    /// Run a command line in a fresh localhost machine.
    Run(RunArgs),
}

#[derive(Parser, Debug)]
struct RunArgs {
    /// Machine name shown in logs.
    #[arg(long, default_value = "local")]
    name: String,
    /// Create a dev machine (adds the terminal and agent servers).
    #[arg(long)]
    dev: bool,
    /// Print the machine's servers before running.
    #[arg(long)]
    show_servers: bool,
    /// Command line, joined with spaces and run by the shell.
    #[arg(required = true, last = true)]
    command: Vec<String>,
}

pub async fn handle_machine(args: MachineArgs, cancel: &CancellationToken) -> Result<()> {
    match args.command {
        MachineCommand::Run(args) => handle_run(args, cancel).await,
    }
}

async fn handle_run(args: RunArgs, cancel: &CancellationToken) -> Result<()> {
    let cfg = config::load_config().context("Failed to load configuration")?;
    let provider = LocalhostInstanceProvider::new(cfg.localhost);

    let machine_id = format!("machine{}", uuid::Uuid::new_v4().simple());
    let machine = Machine::new(
        machine_id,
        MachineConfig::new(args.name.as_str(), provider.provider_type()).with_dev(args.dev),
    );
    let logger: Arc<dyn LineConsumer> =
        Arc::new(StdoutLineConsumer::with_prefix(format!("[{}] ", args.name)));
    let instance = provider
        .create_instance(&Recipe::new(RECIPE_TYPE, ""), machine, logger)
        .await
        .context("Failed to create localhost machine")?;

    if args.show_servers {
        let runtime = instance.runtime().await?;
        let mut refs: Vec<_> = runtime.servers.iter().collect();
        refs.sort_by(|a, b| a.0.cmp(b.0));
        for (port, server) in refs {
            println!(
                "{}\t{}\t{}",
                port,
                server.reference.as_deref().unwrap_or("-"),
                server.url.as_deref().unwrap_or(&server.address)
            );
        }
    }

    let command = Command::new("run", args.command.join(" "));
    let process = instance
        .create_process(command, None)
        .await
        .context("Failed to create process")?;
    info!("Running pid {} in machine {}", process.pid(), instance.id());

    let output: Arc<dyn LineConsumer> = Arc::new(StdoutLineConsumer::default());
    let result = tokio::select! {
        result = process.start(Some(output)) => result.context("Command failed"),
        _ = cancel.cancelled() => {
            if let Err(e) = process.kill().await {
                warn!("Failed to kill pid {}: {}", process.pid(), e);
            }
            Ok(())
        }
    };

    instance
        .destroy()
        .await
        .context("Failed to destroy localhost machine")?;
    result
}
