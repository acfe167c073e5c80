//! # Dockyard Image Command Group
//!
//! File: cli/src/commands/image.rs
//!
//! ## Overview
//!
//! `dockyard image` manages images on the daemon. `build`, `pull` and `push`
//! print the daemon's progress as it arrives and stop when Ctrl-C fires the
//! cancellation token.
//!
//! ## Usage
//!
//! ```bash
//! dockyard image build app:dev Dockerfile src/
//! dockyard image pull busybox --tag 1.36
//! dockyard image push snapshots/m1 --tag latest --registry localhost:5000
//! dockyard image tag busybox mirror/busybox --tag stable
//! dockyard image rm mirror/busybox:stable --force
//! ```
//!
use super::{connect, print_json};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dockyard::engine::params::{BuildImageParams, PullParams, PushParams, RemoveImageParams, TagParams};
use dockyard::engine::progress::{LoggingProgressMonitor, ProgressMonitor};
use dockyard::engine::json::ProgressStatus;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[derive(Parser, Debug)]
pub struct ImageArgs {
    #[command(subcommand)]
    command: ImageCommand,
}

#[derive(Subcommand, Debug)]
enum ImageCommand {
    /// List images.
    Ls,
    /// Build an image from files and directories (one must be a Dockerfile).
    Build(BuildArgs),
    /// Pull an image.
    Pull(PullArgs),
    /// Push an image and print its digest.
    Push(PushArgs),
    /// Add a repository/tag to an image.
    Tag(TagArgs),
    /// Remove an image.
    Rm(RmArgs),
}

#[derive(Parser, Debug)]
struct BuildArgs {
    /// Name (and optional `:tag`) of the built image.
    tag: String,
    /// Build context entries, each stored under its file name.
    #[arg(required = true, num_args = 1..)]
    paths: Vec<PathBuf>,
    /// Always pull newer versions of base images.
    #[arg(long)]
    pull: bool,
    /// Memory limit in bytes.
    #[arg(long)]
    memory: Option<i64>,
    /// Memory plus swap limit in bytes, -1 for unlimited swap.
    #[arg(long)]
    memswap: Option<i64>,
}

#[derive(Parser, Debug)]
struct PullArgs {
    image: String,
    #[arg(long)]
    tag: Option<String>,
    /// Registry host (`host:port`) to pull from.
    #[arg(long)]
    registry: Option<String>,
}

#[derive(Parser, Debug)]
struct PushArgs {
    repository: String,
    #[arg(long)]
    tag: Option<String>,
    #[arg(long)]
    registry: Option<String>,
}

#[derive(Parser, Debug)]
struct TagArgs {
    image: String,
    repository: String,
    #[arg(long)]
    tag: Option<String>,
    #[arg(long)]
    force: bool,
}

#[derive(Parser, Debug)]
struct RmArgs {
    image: String,
    #[arg(long, short)]
    force: bool,
}

/// Prints build output to stdout and everything else through the logger.
fn console_monitor() -> Arc<dyn ProgressMonitor> {
    Arc::new(|status: &ProgressStatus| match &status.stream {
        Some(stream) => print!("{}", stream),
        None => LoggingProgressMonitor.update_progress(status),
    })
}

pub async fn handle_image(args: ImageArgs, cancel: &CancellationToken) -> Result<()> {
    let (_, connector) = connect()?;
    match args.command {
        ImageCommand::Ls => {
            let images = connector.list_images().await.context("Failed to list images")?;
            for image in images {
                let tags = if image.repo_tags.is_empty() {
                    "<none>".to_string()
                } else {
                    image.repo_tags.join(", ")
                };
                println!("{:<20} {:>12}  {}", short_id(&image.id), image.size, tags);
            }
        }
        ImageCommand::Build(build) => {
            let mut params = BuildImageParams::new(build.paths)?
                .with_repository(build.tag.as_str())
                .with_do_force_pull(build.pull);
            if let Some(memory) = build.memory {
                params = params.with_memory_limit(memory);
            }
            if let Some(memswap) = build.memswap {
                params = params.with_memory_swap_limit(memswap);
            }
            let image_id = connector
                .build_image(&params, console_monitor(), cancel)
                .await
                .with_context(|| format!("Failed to build image '{}'", build.tag))?;
            println!("{}", image_id);
        }
        ImageCommand::Pull(pull) => {
            let mut params = PullParams::new(pull.image.as_str())?;
            if let Some(tag) = pull.tag {
                params = params.with_tag(tag);
            }
            if let Some(registry) = pull.registry {
                params = params.with_registry(registry);
            }
            connector
                .pull(&params, console_monitor(), cancel)
                .await
                .with_context(|| format!("Failed to pull '{}'", params.full_image()))?;
        }
        ImageCommand::Push(push) => {
            let mut params = PushParams::new(push.repository.as_str())?;
            if let Some(tag) = push.tag {
                params = params.with_tag(tag);
            }
            if let Some(registry) = push.registry {
                params = params.with_registry(registry);
            }
            let digest = connector
                .push(&params, console_monitor(), cancel)
                .await
                .with_context(|| format!("Failed to push '{}'", params.full_repo()))?;
            println!("{}", digest);
        }
        ImageCommand::Tag(tag) => {
            let mut params =
                TagParams::new(tag.image.as_str(), tag.repository.as_str())?.with_force(tag.force);
            if let Some(t) = tag.tag {
                params = params.with_tag(t);
            }
            connector.tag(&params).await.context("Failed to tag image")?;
        }
        ImageCommand::Rm(rm) => {
            connector
                .remove_image(&RemoveImageParams::new(rm.image.as_str())?.with_force(rm.force))
                .await
                .with_context(|| format!("Failed to remove image '{}'", rm.image))?;
            println!("Removed image '{}'", rm.image);
        }
    }
    Ok(())
}

/// `sha256:0123456789ab...` -> `0123456789ab`.
fn short_id(id: &str) -> &str {
    let id = id.strip_prefix("sha256:").unwrap_or(id);
    &id[..id.len().min(12)]
}
