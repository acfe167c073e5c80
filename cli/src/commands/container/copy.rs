//! # Dockyard Container Copy Handlers
//!
//! File: cli/src/commands/container/copy.rs
//!
//! ## Overview
//!
//! `cp-out` saves a container path as a tar file; `cp-in` extracts a tar file
//! into a directory of the container. Both stream: the archive never has to
//! fit in memory.
//!
use crate::commands::connect;
use anyhow::{Context, Result};
use clap::Parser;
use dockyard::engine::params::{GetResourceParams, PutResourceParams};
use std::path::PathBuf;

#[derive(Parser, Debug)]
pub struct CopyOutArgs {
    container: String,
    /// Path inside the container.
    source: String,
    /// Tar file to write.
    destination: PathBuf,
}

#[derive(Parser, Debug)]
pub struct CopyInArgs {
    container: String,
    /// Existing directory inside the container.
    target: String,
    /// Tar file to extract.
    archive: PathBuf,
    /// Refuse to replace a directory with a non-directory (and vice versa).
    #[arg(long)]
    no_overwrite_dir_non_dir: bool,
}

pub async fn handle_copy_out(args: CopyOutArgs) -> Result<()> {
    let (_, connector) = connect()?;
    let mut archive = connector
        .get_resource(&GetResourceParams::new(args.container.as_str(), args.source.as_str())?)
        .await
        .with_context(|| format!("Failed to read '{}' from '{}'", args.source, args.container))?;
    let mut file = tokio::fs::File::create(&args.destination)
        .await
        .with_context(|| format!("Failed to create {}", args.destination.display()))?;
    let written = tokio::io::copy(&mut archive, &mut file)
        .await
        .context("Failed to save archive")?;
    println!("Wrote {} bytes to {}", written, args.destination.display());
    Ok(())
}

pub async fn handle_copy_in(args: CopyInArgs) -> Result<()> {
    let (_, connector) = connect()?;
    let file = tokio::fs::File::open(&args.archive)
        .await
        .with_context(|| format!("Failed to open {}", args.archive.display()))?;
    let params = PutResourceParams::new(args.container.as_str(), args.target.as_str(), Box::new(file))?
        .with_no_overwrite_dir_non_dir(args.no_overwrite_dir_non_dir);
    connector
        .put_resource(params)
        .await
        .with_context(|| format!("Failed to extract into '{}' of '{}'", args.target, args.container))?;
    println!("Extracted {} into {}:{}", args.archive.display(), args.container, args.target);
    Ok(())
}
