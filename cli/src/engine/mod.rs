//! # Dockyard Engine Client (`engine`)
//!
//! File: cli/src/engine/mod.rs
//!
//! ## Overview
//!
//! Everything needed to talk to a container engine daemon over its remote
//! API, from the raw HTTP exchange up to typed operations.
//!
//! ## Architecture
//!
//! - **`connection`**: one HTTP/1.1 exchange per request over TCP or a unix
//!   socket, built with a chained request builder.
//! - **`params`**: validated parameter objects, one per operation.
//! - **`json`**: wire models not covered by `bollard::models`.
//! - **`pump`**: background readers that decode a body into messages and
//!   hand them to a processor in wire order.
//! - **`log_frames`**: the multiplexed stdout/stderr framing of attach and
//!   exec output.
//! - **`progress`**: the `ProgressMonitor` collaborator for build, pull and
//!   push.
//! - **`connector`**: `DockerConnector`, the client itself.
//!
pub mod connection;
pub mod connector;
pub mod json;
pub mod log_frames;
pub mod params;
pub mod progress;
pub mod pump;

pub use connection::DaemonUri;
pub use connector::DockerConnector;
pub use log_frames::{LogKind, LogMessage};
pub use progress::ProgressMonitor;
pub use pump::{MessageProcessor, PumpHandle, PumpOutcome};
