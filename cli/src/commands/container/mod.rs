//! # Dockyard Container Command Group
//!
//! File: cli/src/commands/container/mod.rs
//!
//! ## Overview
//!
//! This module is the router for `dockyard container`. It defines the
//! subcommands and hands each one to the submodule implementing it.
//!
//! ## Architecture
//!
//! - `lifecycle`: `inspect`, `stop`, `kill`, `rm`, `top`, `wait`
//! - `logs`: attach to a container's output
//! - `exec`: run a command in a running container
//! - `copy`: `cp-out` / `cp-in` tar archive transfer
//!
//! ## Examples
//!
//! ```bash
//! dockyard container stop -t 5 web-1 web-2
//! dockyard container logs web-1 --follow
//! dockyard container exec web-1 -- ls -la /srv
//! dockyard container cp-out web-1 /etc/nginx conf.tar
//! ```
//!
use anyhow::Result;
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;

/// Archive copy out of and into containers.
mod copy;
/// Running commands in containers.
mod exec;
/// Inspection and lifecycle operations.
mod lifecycle;
/// Following container output.
mod logs;

#[derive(Parser, Debug)]
pub struct ContainerArgs {
    #[command(subcommand)]
    command: ContainerCommand,
}

#[derive(Subcommand, Debug)]
enum ContainerCommand {
    /// Show low-level information about a container.
    Inspect(lifecycle::InspectArgs),
    /// Stop one or more containers.
    Stop(lifecycle::StopArgs),
    /// Send a signal to a container.
    Kill(lifecycle::KillArgs),
    /// Remove one or more containers.
    Rm(lifecycle::RmArgs),
    /// List the processes running in a container.
    Top(lifecycle::TopArgs),
    /// Wait for a container to stop and print its exit code.
    Wait(lifecycle::WaitArgs),
    /// Print a container's output.
    Logs(logs::LogsArgs),
    /// Run a command in a running container.
    Exec(exec::ExecArgs),
    /// Copy a path out of a container into a tar file.
    #[command(name = "cp-out")]
    CopyOut(copy::CopyOutArgs),
    /// Extract a tar file into a container directory.
    #[command(name = "cp-in")]
    CopyIn(copy::CopyInArgs),
}

pub async fn handle_container(args: ContainerArgs, cancel: &CancellationToken) -> Result<()> {
    match args.command {
        ContainerCommand::Inspect(args) => lifecycle::handle_inspect(args).await,
        ContainerCommand::Stop(args) => lifecycle::handle_stop(args).await,
        ContainerCommand::Kill(args) => lifecycle::handle_kill(args).await,
        ContainerCommand::Rm(args) => lifecycle::handle_rm(args).await,
        ContainerCommand::Top(args) => lifecycle::handle_top(args).await,
        ContainerCommand::Wait(args) => lifecycle::handle_wait(args).await,
        ContainerCommand::Logs(args) => logs::handle_logs(args, cancel).await,
        ContainerCommand::Exec(args) => exec::handle_exec(args, cancel).await,
        ContainerCommand::CopyOut(args) => copy::handle_copy_out(args).await,
        ContainerCommand::CopyIn(args) => copy::handle_copy_in(args).await,
    }
}

// --- Unit Tests ---
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_container_stop() {
        let result = ContainerArgs::try_parse_from(["container", "stop", "-t", "3", "a", "b"]);
        match result.unwrap().command {
            ContainerCommand::Stop(_) => {}
            _ => panic!("Incorrect subcommand parsed for 'stop'"),
        }
    }

    #[test]
    fn test_parses_copy_commands() {
        let result = ContainerArgs::try_parse_from(["container", "cp-out", "c1", "/etc", "etc.tar"]);
        assert!(matches!(result.unwrap().command, ContainerCommand::CopyOut(_)));
        let result = ContainerArgs::try_parse_from(["container", "cp-in", "c1", "/srv", "srv.tar"]);
        assert!(matches!(result.unwrap().command, ContainerCommand::CopyIn(_)));
    }

    #[test]
    fn test_exec_requires_command() {
        assert!(ContainerArgs::try_parse_from(["container", "exec", "c1"]).is_err());
        assert!(ContainerArgs::try_parse_from(["container", "exec", "c1", "--", "ls", "-la"]).is_ok());
    }
}
