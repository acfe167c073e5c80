//! # Dockyard Output Sinks (`common::output`)
//!
//! File: cli/src/common/output.rs
//!
//! ## Overview
//!
//! Machine logs and process output are delivered one line at a time to a
//! `LineConsumer`. The machine layer owns some consumers (a machine logger
//! lives as long as its instance) and borrows others (a process started by a
//! caller writes into the caller's sink), so closing is part of the contract
//! and can be suppressed with [`NoCloseLineConsumer`].
//!
//! ## Architecture
//!
//! - `LineConsumer`: append-only sink, `Send + Sync` so it can be shared with
//!   background pumps through an `Arc`.
//! - `NoCloseLineConsumer`: forwards lines, swallows `close`.
//! - `DevNullLineConsumer`, `StdoutLineConsumer`, `CollectingLineConsumer`:
//!   the sinks used by the CLI and by tests.
//!
use std::io::{self, Write};
use std::sync::{Arc, Mutex};

/// Append-only, line-oriented output sink.
pub trait LineConsumer: Send + Sync {
    /// Appends one line (without its terminator).
    fn write_line(&self, line: &str) -> io::Result<()>;

    /// Releases whatever the sink holds. Writing after `close` is up to the
    /// implementation; most sinks ignore it.
    fn close(&self) -> io::Result<()> {
        Ok(())
    }
}

/// Wraps another consumer and ignores `close`, for sinks owned elsewhere.
pub struct NoCloseLineConsumer {
    delegate: Arc<dyn LineConsumer>,
}

impl NoCloseLineConsumer {
    pub fn new(delegate: Arc<dyn LineConsumer>) -> Self {
        Self { delegate }
    }
}

impl LineConsumer for NoCloseLineConsumer {
    fn write_line(&self, line: &str) -> io::Result<()> {
        self.delegate.write_line(line)
    }
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct DevNullLineConsumer;

impl LineConsumer for DevNullLineConsumer {
    fn write_line(&self, _line: &str) -> io::Result<()> {
        Ok(())
    }
}

/// Prints lines to stdout, optionally behind a prefix such as `[machine] `.
#[derive(Debug, Default, Clone)]
pub struct StdoutLineConsumer {
    prefix: String,
}

impl StdoutLineConsumer {
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }
}

impl LineConsumer for StdoutLineConsumer {
    fn write_line(&self, line: &str) -> io::Result<()> {
        let mut out = io::stdout().lock();
        writeln!(out, "{}{}", self.prefix, line)
    }

    fn close(&self) -> io::Result<()> {
        io::stdout().lock().flush()
    }
}

/// Keeps every line in memory.
#[derive(Debug, Default)]
pub struct CollectingLineConsumer {
    lines: Mutex<Vec<String>>,
    closed: Mutex<bool>,
}

impl CollectingLineConsumer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the lines written so far.
    pub fn lines(&self) -> Vec<String> {
        self.lines
            .lock()
            .map(|l| l.clone())
            .unwrap_or_default()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.lock().map(|c| *c).unwrap_or(false)
    }
}

impl LineConsumer for CollectingLineConsumer {
    fn write_line(&self, line: &str) -> io::Result<()> {
        let mut lines = self
            .lines
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "line buffer poisoned"))?;
        lines.push(line.to_string());
        Ok(())
    }

    fn close(&self) -> io::Result<()> {
        if let Ok(mut closed) = self.closed.lock() {
            *closed = true;
        }
        Ok(())
    }
}

// --- Unit Tests ---
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collecting_consumer_keeps_order() {
        let sink = CollectingLineConsumer::new();
        sink.write_line("one").unwrap();
        sink.write_line("two").unwrap();
        assert_eq!(sink.lines(), vec!["one", "two"]);
    }

    #[test]
    fn test_no_close_wrapper_suppresses_close() {
        let inner = Arc::new(CollectingLineConsumer::new());
        let wrapper = NoCloseLineConsumer::new(inner.clone());
        wrapper.write_line("hello").unwrap();
        wrapper.close().unwrap();
        assert_eq!(inner.lines(), vec!["hello"]);
        assert!(!inner.is_closed());

        inner.close().unwrap();
        assert!(inner.is_closed());
    }

    #[test]
    fn test_dev_null_accepts_everything() {
        assert!(DevNullLineConsumer.write_line("ignored").is_ok());
        assert!(DevNullLineConsumer.close().is_ok());
    }
}
