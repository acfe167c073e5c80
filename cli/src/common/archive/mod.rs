//! # Dockyard Archive Utilities Module (`common::archive`)
//!
//! File: cli/src/common/archive/mod.rs
//!
//! ## Overview
//!
//! Archive helpers. The only consumer today is image building, which sends
//! its context to the daemon as a gzipped tarball.
//!
//! ```rust,ignore
//! let bytes = archive::tar::create_context_tar(&[PathBuf::from("Dockerfile")])?;
//! ```
//!

pub mod tar;
