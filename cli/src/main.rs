//! # Dockyard Main Entry Point
//!
//! File: cli/src/main.rs
//!
//! ## Overview
//!
//! This file is the entry point of the `dockyard` binary. It handles:
//! - Command-line argument parsing using Clap
//! - Setting up the logging system based on verbosity flags
//! - Wiring Ctrl-C to a cancellation token shared by every handler
//! - Routing execution to the command handlers
//!
//! ## Architecture
//!
//! The library (`dockyard::engine`, `dockyard::machine`) does the work; the
//! `commands` module of this binary parses arguments and prints results.
//! Each top-level command is a variant of `Commands` and all errors are
//! propagated here for consistent reporting.
//!
//! ## Examples
//!
//! ```bash
//! # Get help
//! dockyard --help
//!
//! # Follow daemon events with debug logging
//! dockyard -vv system events
//! ```
//!
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{fmt, EnvFilter};

mod commands;

#[derive(Parser, Debug)]
#[command(
    name = "dockyard",
    about = "Dockyard: container engine client and machine lifecycle",
    long_about = "Talk to a container engine daemon (images, containers, exec, archives, events)\n\
                  and run commands in machines backed by the engine or by the local host.",
    propagate_version = true,
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Parser, Debug)]
enum Commands {
    #[command(alias = "sys")]
    System(commands::system::SystemArgs),
    #[command(alias = "i")]
    Image(commands::image::ImageArgs),
    #[command(alias = "c")]
    Container(commands::container::ContainerArgs),
    #[command(alias = "m")]
    Machine(commands::machine::MachineArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
    fmt::Subscriber::builder()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();

    tracing::debug!("Parsed CLI arguments: {:?}", cli);

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupted, cancelling");
            on_interrupt.cancel();
        }
    });

    let command_result = match cli.command {
        Commands::System(args) => commands::system::handle_system(args, &cancel).await,
        Commands::Image(args) => commands::image::handle_image(args, &cancel).await,
        Commands::Container(args) => commands::container::handle_container(args, &cancel).await,
        Commands::Machine(args) => commands::machine::handle_machine(args, &cancel).await,
    };

    if let Err(e) = command_result {
        tracing::error!("Command execution failed: {:?}", e);
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }

    Ok(())
}
