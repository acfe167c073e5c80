//! # Dockyard Progress Monitoring (`engine::progress`)
//!
//! File: cli/src/engine/progress.rs
//!
//! ## Overview
//!
//! Build, pull and push report every progress message to a
//! `ProgressMonitor` before the connector looks at it. Monitors are shared
//! with the pump task, so they take `&self` and must be `Send + Sync`.
//!
use crate::engine::json::ProgressStatus;
use tracing::info;

/// Receives progress updates from long-running image operations.
pub trait ProgressMonitor: Send + Sync {
    fn update_progress(&self, status: &ProgressStatus);
}

/// Ignores every update.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopProgressMonitor;

impl ProgressMonitor for NoopProgressMonitor {
    fn update_progress(&self, _status: &ProgressStatus) {}
}

impl<F> ProgressMonitor for F
where
    F: Fn(&ProgressStatus) + Send + Sync,
{
    fn update_progress(&self, status: &ProgressStatus) {
        self(status)
    }
}

/// Logs each update through `tracing`, one line per message.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingProgressMonitor;

impl ProgressMonitor for LoggingProgressMonitor {
    fn update_progress(&self, status: &ProgressStatus) {
        if let Some(line) = describe(status) {
            info!("{}", line);
        }
    }
}

/// Human-readable summary of one progress message, if it says anything.
pub fn describe(status: &ProgressStatus) -> Option<String> {
    if let Some(error) = &status.error {
        return Some(format!("ERROR: {}", error));
    }
    if let Some(stream) = &status.stream {
        let trimmed = stream.trim_end();
        return (!trimmed.is_empty()).then(|| trimmed.to_string());
    }
    let text = status.status.as_deref()?;
    let mut line = match &status.id {
        Some(id) => format!("{}: {}", id, text),
        None => text.to_string(),
    };
    if let Some(progress) = &status.progress {
        line.push(' ');
        line.push_str(progress);
    }
    Some(line)
}

// --- Unit Tests ---
#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_describe() {
        let status = ProgressStatus {
            id: Some("a1b2".into()),
            status: Some("Downloading".into()),
            progress: Some("[==>   ]".into()),
            ..Default::default()
        };
        assert_eq!(describe(&status).unwrap(), "a1b2: Downloading [==>   ]");

        let stream = ProgressStatus {
            stream: Some("Step 1/2 : FROM busybox\n".into()),
            ..Default::default()
        };
        assert_eq!(describe(&stream).unwrap(), "Step 1/2 : FROM busybox");

        let blank = ProgressStatus {
            stream: Some("\n".into()),
            ..Default::default()
        };
        assert!(describe(&blank).is_none());
    }

    #[test]
    fn test_closure_monitor() {
        let seen = Mutex::new(Vec::new());
        let monitor = |s: &ProgressStatus| seen.lock().unwrap().push(s.status.clone());
        monitor.update_progress(&ProgressStatus {
            status: Some("Pulling".into()),
            ..Default::default()
        });
        assert_eq!(seen.lock().unwrap().len(), 1);
    }
}
