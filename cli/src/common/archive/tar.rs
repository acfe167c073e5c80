//! # Dockyard TAR Archive Operations (`common::archive::tar`)
//!
//! File: cli/src/common/archive/tar.rs
//!
//! ## Overview
//!
//! Builds the gzipped tarball (`.tar.gz`) that the image build endpoint
//! expects as its request body.
//!
//! ## Architecture
//!
//! The `tar` crate builds the archive structure and `flate2` compresses it.
//! Each listed path lands at the archive root under its own file name:
//! regular files directly, directories recursively with their contents
//! below that name. This matches how build files are handed over, e.g. a
//! `Dockerfile` next to a few support files taken from different places.
//!
//! ## Usage
//!
//! ```rust,ignore
//! let files = vec![PathBuf::from("/tmp/recipe/Dockerfile")];
//! let tar_gz_bytes = tar::create_context_tar(&files)?;
//! ```
//!
use crate::core::error::{DockyardError, Result};
use std::path::{Path, PathBuf};
use tracing::debug;

/// # Create Gzipped TAR Build Context (`create_context_tar`)
///
/// Creates a gzipped TAR archive in memory containing every path in `files`.
///
/// ## Arguments
///
/// * `files` - Files or directories to include. Each one is stored under its
///   final path component.
///
/// ## Returns
///
/// * `Result<Vec<u8>>` - The raw bytes of the `.tar.gz` archive.
///
/// ## Errors
///
/// Returns `InvalidArgument` for a path without a file name, and `Io` if a
/// path cannot be read or the archive cannot be finalized.
pub fn create_context_tar(files: &[PathBuf]) -> Result<Vec<u8>> {
    let mut tar_gz_bytes = Vec::new();
    let enc = flate2::write::GzEncoder::new(&mut tar_gz_bytes, flate2::Compression::default());
    let mut tar_builder = tar::Builder::new(enc);

    for path in files {
        let name = entry_name(path)?;
        if path.is_dir() {
            debug!("Adding directory {} as '{}'", path.display(), name);
            tar_builder.append_dir_all(&name, path)?;
        } else {
            debug!("Adding file {} as '{}'", path.display(), name);
            tar_builder.append_path_with_name(path, &name)?;
        }
    }

    // Closing records first, then the gzip footer.
    let encoder = tar_builder.into_inner()?;
    encoder.finish()?;

    Ok(tar_gz_bytes)
}

fn entry_name(path: &Path) -> Result<String> {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| {
            DockyardError::InvalidArgument(format!(
                "Build file '{}' has no file name",
                path.display()
            ))
        })
}
