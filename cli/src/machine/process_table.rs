//! # Process Table
//!
//! File: cli/src/machine/process_table.rs
//!
//! ## Overview
//!
//! Bookkeeping shared by every instance variant: a pid sequence and a
//! concurrent map from pid to process handle.
//!
//! Pids come from one process-wide sequence starting at 1, so a pid is
//! unique across all machines of the running program, not per machine.
//! Instances can be given their own `PidSequence` instead (tests do this to
//! get predictable numbering).
//!
//! Lookups check liveness; a process found to be dead is removed, so dead
//! entries disappear the first time someone asks for them.
//!
use super::InstanceProcess;
use crate::core::error::{DockyardError, Result};
use dashmap::DashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, OnceLock};
use tracing::debug;

/// Monotonically increasing pid source, starting at 1.
#[derive(Debug)]
pub struct PidSequence {
    next: AtomicU32,
}

impl PidSequence {
    pub fn new() -> Self {
        Self {
            next: AtomicU32::new(1),
        }
    }

    /// The sequence shared by every instance that was not given its own.
    pub fn global() -> Arc<PidSequence> {
        static GLOBAL: OnceLock<Arc<PidSequence>> = OnceLock::new();
        GLOBAL.get_or_init(|| Arc::new(PidSequence::new())).clone()
    }

    pub fn next_pid(&self) -> u32 {
        self.next.fetch_add(1, Ordering::SeqCst)
    }
}

impl Default for PidSequence {
    fn default() -> Self {
        Self::new()
    }
}

/// Processes of one machine instance, keyed by pid.
pub struct ProcessTable {
    sequence: Arc<PidSequence>,
    processes: DashMap<u32, Arc<dyn InstanceProcess>>,
}

impl ProcessTable {
    /// A table drawing pids from the process-wide sequence.
    pub fn new() -> Self {
        Self::with_sequence(PidSequence::global())
    }

    pub fn with_sequence(sequence: Arc<PidSequence>) -> Self {
        Self {
            sequence,
            processes: DashMap::new(),
        }
    }

    pub fn next_pid(&self) -> u32 {
        self.sequence.next_pid()
    }

    pub fn insert(&self, process: Arc<dyn InstanceProcess>) {
        self.processes.insert(process.pid(), process);
    }

    /// Looks up a live process.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown pid, or the process's own `check_alive`
    /// error if it has ended (the entry is removed in that case).
    pub async fn get(&self, pid: u32) -> Result<Arc<dyn InstanceProcess>> {
        // Clone out of the map; never hold a shard guard across an await.
        let process = self
            .processes
            .get(&pid)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| DockyardError::NotFound(format!("Process with pid {} not found", pid)))?;
        match process.check_alive().await {
            Ok(()) => Ok(process),
            Err(e) => {
                if e.is_not_found() {
                    debug!("Dropping ended process {} from table", pid);
                    self.processes.remove(&pid);
                }
                Err(e)
            }
        }
    }

    /// Live processes, in no particular order.
    pub async fn alive(&self) -> Vec<Arc<dyn InstanceProcess>> {
        let all: Vec<_> = self
            .processes
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        let mut alive = Vec::with_capacity(all.len());
        for process in all {
            if process.is_alive().await {
                alive.push(process);
            }
        }
        alive
    }

    /// Every registered process, alive or not.
    pub fn all(&self) -> Vec<Arc<dyn InstanceProcess>> {
        self.processes
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.processes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.processes.is_empty()
    }
}

impl Default for ProcessTable {
    fn default() -> Self {
        Self::new()
    }
}

// --- Unit Tests ---
#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::output::LineConsumer;
    use crate::machine::Command;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicBool;

    struct FakeProcess {
        pid: u32,
        command: Command,
        alive: AtomicBool,
    }

    #[async_trait]
    impl InstanceProcess for FakeProcess {
        fn pid(&self) -> u32 {
            self.pid
        }
        fn command(&self) -> &Command {
            &self.command
        }
        fn output_channel(&self) -> Option<&str> {
            None
        }
        async fn check_alive(&self) -> Result<()> {
            if self.alive.load(Ordering::SeqCst) {
                Ok(())
            } else {
                Err(DockyardError::NotFound(format!("Process with pid {} not found", self.pid)))
            }
        }
        async fn start(&self, _output: Option<Arc<dyn LineConsumer>>) -> Result<()> {
            Ok(())
        }
        async fn kill(&self) -> Result<()> {
            self.alive.store(false, Ordering::SeqCst);
            Ok(())
        }
    }

    fn fake(table: &ProcessTable, alive: bool) -> Arc<FakeProcess> {
        let process = Arc::new(FakeProcess {
            pid: table.next_pid(),
            command: Command::new("fake", "true"),
            alive: AtomicBool::new(alive),
        });
        table.insert(process.clone());
        process
    }

    #[test]
    fn test_sequence_starts_at_one() {
        let sequence = PidSequence::new();
        assert_eq!(sequence.next_pid(), 1);
        assert_eq!(sequence.next_pid(), 2);
        assert_eq!(sequence.next_pid(), 3);
    }

    #[test]
    fn test_tables_share_a_sequence() {
        let sequence = Arc::new(PidSequence::new());
        let a = ProcessTable::with_sequence(sequence.clone());
        let b = ProcessTable::with_sequence(sequence);
        assert_eq!(a.next_pid(), 1);
        assert_eq!(b.next_pid(), 2);
        assert_eq!(a.next_pid(), 3);
    }

    #[tokio::test]
    async fn test_get_removes_dead_process() {
        let table = ProcessTable::with_sequence(Arc::new(PidSequence::new()));
        let live = fake(&table, true);
        let dead = fake(&table, false);
        assert_eq!(table.len(), 2);

        assert_eq!(table.get(live.pid).await.unwrap().pid(), 1);
        assert!(table.get(dead.pid).await.err().unwrap().is_not_found());
        assert_eq!(table.len(), 1);
        // Unknown from now on.
        let err = table.get(dead.pid).await.err().unwrap();
        assert_eq!(err.to_string(), "Process with pid 2 not found");
    }

    #[tokio::test]
    async fn test_alive_filters_without_removing() {
        let table = ProcessTable::with_sequence(Arc::new(PidSequence::new()));
        let first = fake(&table, true);
        fake(&table, true);
        first.kill().await.unwrap();

        let alive = table.alive().await;
        assert_eq!(alive.len(), 1);
        assert_eq!(alive[0].pid(), 2);
        assert_eq!(table.all().len(), 2);
    }
}
