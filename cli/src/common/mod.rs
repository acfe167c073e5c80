//! # Dockyard Common Utilities (`common`)
//!
//! File: cli/src/common/mod.rs
//!
//! ## Overview
//!
//! Shared helpers that are neither engine protocol nor machine lifecycle:
//! line-oriented output sinks and build-context archives.
//!
//! ## Architecture
//!
//! - **`archive`**: Creation of gzipped tar archives for image build contexts.
//! - **`output`**: The `LineConsumer` sink used for machine logs and process output.
//!

/// Utilities for handling archive files (e.g., tarballs).
pub mod archive;
/// Line-oriented output sinks.
pub mod output;
