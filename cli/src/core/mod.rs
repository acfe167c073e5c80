//! # Dockyard Core Infrastructure
//!
//! File: cli/src/core/mod.rs
//!
//! ## Overview
//!
//! Foundational pieces shared by the engine client, the machine lifecycle
//! layer and the command-line front end.
//!
//! ## Architecture
//!
//! - `config`: Configuration loading, merging, and validation
//! - `error`: The `DockyardError` enum and the library `Result` alias
//!
//! ## Usage
//!
//! ```rust,ignore
//! use crate::core::config; // For loading configuration
//! use crate::core::error::{DockyardError, Result}; // For error handling
//! ```
//!
pub mod config;
pub mod error;
