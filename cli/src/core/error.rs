//! # Dockyard Error Types
//!
//! File: cli/src/core/error.rs
//!
//! ## Overview
//!
//! This module defines the error type shared by the engine client and the
//! machine lifecycle layer. Every failure carries the stage it happened in,
//! so callers can tell a refused connection from a daemon rejection, or a
//! daemon rejection from an application error reported inside a successful
//! progress stream.
//!
//! ## Architecture
//!
//! - `DockyardError`: a `thiserror` enum, one variant per failure stage.
//! - `Result<T>`: alias used by all library code.
//!
//! The variants fall into four groups:
//! - Transport failures (`Connect`, `Http`, `Io`, `Stream`)
//! - Protocol failures (`Engine`, carrying the status and raw body text)
//! - Application failures inside 2xx streams (`BuildFailed`, `DigestMissing`, `Progress`)
//! - Lifecycle-state failures (`NotFound`, `Conflict`)
//!
//! ## Examples
//!
//! ```rust,ignore
//! match connector.stop_container(params).await {
//!     Ok(()) => {}
//!     Err(DockyardError::Engine { status: 404, .. }) => println!("already gone"),
//!     Err(e) => return Err(e),
//! }
//! ```
//!
use thiserror::Error;

/// Custom error type for the Dockyard library.
#[derive(Error, Debug)]
pub enum DockyardError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Failed to connect to docker daemon at '{uri}': {source}")]
    Connect {
        uri: String,
        #[source]
        source: std::io::Error,
    },

    #[error("HTTP exchange with docker daemon failed: {source}")]
    Http {
        #[from]
        source: hyper::Error,
    },

    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    #[error("Failed to read message stream: {0}")]
    Stream(#[source] std::io::Error),

    #[error("Error response from docker API, status: {status}, message: {message}")]
    Engine { status: u16, message: String },

    #[error("Docker image build failed")]
    BuildFailed,

    #[error("Docker image was successfully pushed, but its digest wasn't obtained")]
    DigestMissing,

    #[error("Docker reported an error: {0}")]
    Progress(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Machine(String),

    #[error("{0}")]
    Snapshot(String),

    #[error("Operation was cancelled")]
    Cancelled,

    #[error("Failed to parse JSON: {source}")]
    Json {
        #[from]
        source: serde_json::Error,
    },

    #[error("Background task failed: {0}")]
    Task(String),
}

impl DockyardError {
    /// Status code of an `Engine` error, if this is one.
    pub fn status(&self) -> Option<u16> {
        match self {
            DockyardError::Engine { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, DockyardError::NotFound(_)) || self.status() == Some(404)
    }
}

/// Result alias used throughout the library.
pub type Result<T> = std::result::Result<T, DockyardError>;

// --- Unit Tests ---
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let engine = DockyardError::Engine {
            status: 409,
            message: "conflict: name in use".into(),
        };
        assert_eq!(
            engine.to_string(),
            "Error response from docker API, status: 409, message: conflict: name in use"
        );

        assert_eq!(
            DockyardError::BuildFailed.to_string(),
            "Docker image build failed"
        );

        let conflict = DockyardError::Conflict("Process already started.".into());
        assert_eq!(conflict.to_string(), "Process already started.");
    }

    #[test]
    fn test_status_and_not_found() {
        let engine = DockyardError::Engine {
            status: 404,
            message: "no such container".into(),
        };
        assert_eq!(engine.status(), Some(404));
        assert!(engine.is_not_found());
        assert!(DockyardError::NotFound("gone".into()).is_not_found());
        assert!(!DockyardError::Cancelled.is_not_found());
        assert_eq!(DockyardError::Cancelled.status(), None);
    }
}
