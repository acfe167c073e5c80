//! # Dockyard Library
//!
//! File: cli/src/lib.rs
//!
//! ## Overview
//!
//! Dockyard talks to a container engine daemon over its HTTP remote API and
//! builds a machine lifecycle abstraction on top of it. The `dockyard` binary
//! is a thin front end over this library.
//!
//! ## Architecture
//!
//! - **`core`**: configuration and the `DockyardError` type.
//! - **`engine`**: the remote API client. `DockerConnector` exposes one async
//!   method per daemon operation; long-lived responses (attach, exec output,
//!   events) are consumed by background pumps.
//! - **`machine`**: `InstanceProvider` / `Instance` / `InstanceProcess` with
//!   an engine-backed (`docker`) and a host-process (`localhost`) variant.
//! - **`common`**: output sinks and build-context archives.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use dockyard::core::config::EngineConfig;
//! use dockyard::engine::DockerConnector;
//!
//! # async fn run() -> dockyard::core::error::Result<()> {
//! let connector = DockerConnector::new(&EngineConfig::default())?;
//! let version = connector.get_version().await?;
//! println!("{:?}", version.version);
//! # Ok(())
//! # }
//! ```
//!
pub mod common;
pub mod core;
pub mod engine;
pub mod machine;
