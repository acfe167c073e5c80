//! # Dockyard Machine Lifecycle (`machine`)
//!
//! File: cli/src/machine/mod.rs
//!
//! ## Overview
//!
//! A machine is a workspace-level execution environment. It is backed either
//! by an engine container (`docker`) or by processes on the local host
//! (`localhost`). Both variants implement the same capabilities: identity, a
//! logger, lazily computed runtime info, a table of processes keyed by a
//! locally assigned pid, process creation, snapshots and destruction.
//!
//! ## Architecture
//!
//! - **`Instance`**: a running machine.
//! - **`InstanceProcess`**: a command run inside an instance. A handle is
//!   created unstarted, started exactly once, and ends by exiting or being
//!   killed. `start` returns when the process output ends, so long-running
//!   commands are started on their own task.
//! - **`InstanceProvider`**: creates instances from recipes or snapshots.
//! - **`process_table`**: the pid sequence and per-instance process map that
//!   both variants share.
//! - **`model`**: plain data (`Machine`, `ServerConf`, `MachineRuntimeInfo`, ...).
//!
//! Lifecycle-state failures use `DockyardError::NotFound` (process never
//! started, exited, or unknown pid) and `DockyardError::Conflict` (second
//! start). Callers can treat `NotFound` as "already terminated".
//!
//! ## Usage
//!
//! ```rust,ignore
//! let instance = provider.create_instance(&recipe, machine, logs).await?;
//! let process = instance.create_process(Command::new("build", "make"), None).await?;
//! let runner = process.clone();
//! tokio::spawn(async move { runner.start(Some(output)).await });
//! // ...
//! process.kill().await?;
//! ```
//!
use crate::common::output::LineConsumer;
use crate::core::error::Result;
use async_trait::async_trait;
use std::collections::BTreeSet;
use std::sync::Arc;

pub mod docker;
pub mod localhost;
pub mod model;
pub mod process_table;

pub use model::{
    Command, InstanceKey, Machine, MachineConfig, MachineRuntimeInfo, MachineSource, Recipe,
    Server, ServerConf,
};
pub use process_table::{PidSequence, ProcessTable};

/// A command running (or about to run) inside a machine instance.
#[async_trait]
pub trait InstanceProcess: Send + Sync {
    /// Locally assigned pid, unrelated to any OS or container pid.
    fn pid(&self) -> u32;

    fn command(&self) -> &Command;

    /// Channel name the output is published under, if any.
    fn output_channel(&self) -> Option<&str>;

    /// `true` while the process has been started and has not ended.
    async fn is_alive(&self) -> bool {
        self.check_alive().await.is_ok()
    }

    /// # Errors
    ///
    /// `NotFound` if the process was never started or has ended. Once a
    /// process has ended this keeps failing on every call.
    async fn check_alive(&self) -> Result<()>;

    /// Runs the process and forwards each output line to `output`.
    ///
    /// Returns when the output ends.
    ///
    /// # Errors
    ///
    /// `Conflict` if the process was already started, whether or not the
    /// first start is still running.
    async fn start(&self, output: Option<Arc<dyn LineConsumer>>) -> Result<()>;

    /// Requests termination. Children spawned by the command line are not
    /// guaranteed to be terminated with it.
    async fn kill(&self) -> Result<()>;
}

/// A running machine.
#[async_trait]
pub trait Instance: Send + Sync {
    fn id(&self) -> &str;

    fn machine(&self) -> &Machine;

    /// Sink for the machine's own log output.
    fn logger(&self) -> Arc<dyn LineConsumer>;

    /// Servers, environment and properties of the machine. Computed on the
    /// first call and cached for the instance's lifetime.
    async fn runtime(&self) -> Result<&MachineRuntimeInfo>;

    /// # Errors
    ///
    /// `NotFound` if no process has that pid, or it has ended (in which case
    /// it is also dropped from the table).
    async fn get_process(&self, pid: u32) -> Result<Arc<dyn InstanceProcess>>;

    /// Processes that are still alive.
    async fn get_processes(&self) -> Result<Vec<Arc<dyn InstanceProcess>>>;

    /// Registers a new, unstarted process under the next pid.
    async fn create_process(
        &self,
        command: Command,
        output_channel: Option<String>,
    ) -> Result<Arc<dyn InstanceProcess>>;

    /// Saves the machine's current state so it can be recreated later.
    async fn save_to_snapshot(&self, owner: &str) -> Result<InstanceKey>;

    async fn destroy(&self) -> Result<()>;
}

/// Creates instances of one machine type.
#[async_trait]
pub trait InstanceProvider: Send + Sync {
    /// Machine type served by this provider (e.g. `docker`).
    fn provider_type(&self) -> &str;

    /// Recipe types `create_instance` understands.
    fn recipe_types(&self) -> BTreeSet<String>;

    async fn create_instance(
        &self,
        recipe: &Recipe,
        machine: Machine,
        logs: Arc<dyn LineConsumer>,
    ) -> Result<Arc<dyn Instance>>;

    async fn create_instance_from_snapshot(
        &self,
        key: &InstanceKey,
        machine: Machine,
        logs: Arc<dyn LineConsumer>,
    ) -> Result<Arc<dyn Instance>>;

    async fn remove_instance_snapshot(&self, key: &InstanceKey) -> Result<()>;
}
