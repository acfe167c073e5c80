//! # Localhost Instance
//!
//! File: cli/src/machine/localhost/instance.rs
//!
//! ## Overview
//!
//! A machine made of processes on the local host. Its id is a generated
//! token; it has no container behind it, so there is nothing to snapshot and
//! nothing to tear down beyond the processes it started itself.
//!
//! Runtime info is derived once from configuration: every server the machine
//! is configured with is reachable at the host of the configured API
//! endpoint, on the server's port.
//!
use super::{default_dev_servers, SNAPSHOT_UNSUPPORTED};
use super::process::LocalhostProcess;
use crate::common::output::LineConsumer;
use crate::core::config::LocalhostConfig;
use crate::core::error::{DockyardError, Result};
use crate::machine::{
    Command, Instance, InstanceKey, InstanceProcess, Machine, MachineRuntimeInfo, PidSequence,
    ProcessTable, Server, ServerConf,
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};
use tracing::{debug, error, info, warn};

pub struct LocalhostInstance {
    id: String,
    machine: Machine,
    logger: Arc<dyn LineConsumer>,
    host: String,
    shell: String,
    servers: Vec<ServerConf>,
    runtime: OnceLock<MachineRuntimeInfo>,
    processes: ProcessTable,
}

impl LocalhostInstance {
    /// Creates an instance for `machine`.
    ///
    /// The exposed servers are the machine's own, then the configured
    /// `machine_servers`, then (for dev machines only) the terminal and
    /// workspace agent defaults and the configured `dev_machine_servers`.
    pub fn new(
        machine: Machine,
        logger: Arc<dyn LineConsumer>,
        config: &LocalhostConfig,
        sequence: Arc<PidSequence>,
    ) -> Self {
        let mut servers: Vec<ServerConf> = machine
            .config
            .servers
            .iter()
            .chain(config.machine_servers.iter())
            .cloned()
            .collect();
        if machine.config.dev {
            servers.extend(default_dev_servers(&config.api_endpoint));
            servers.extend(config.dev_machine_servers.iter().cloned());
        }
        Self {
            id: uuid::Uuid::new_v4().simple().to_string(),
            machine,
            logger,
            host: endpoint_host(&config.api_endpoint),
            shell: config.shell.clone(),
            servers,
            runtime: OnceLock::new(),
            processes: ProcessTable::with_sequence(sequence),
        }
    }

    fn compute_runtime(&self) -> Result<MachineRuntimeInfo> {
        let mut servers = HashMap::new();
        for conf in &self.servers {
            servers.insert(conf.port.clone(), server_from_conf(conf, &self.host)?);
        }
        Ok(MachineRuntimeInfo {
            servers,
            ..Default::default()
        })
    }
}

/// Host part of the API endpoint, `localhost` if it has none.
fn endpoint_host(api_endpoint: &str) -> String {
    match url::Url::parse(api_endpoint) {
        Ok(url) => url.host_str().unwrap_or("localhost").to_string(),
        Err(e) => {
            error!("Invalid API endpoint '{}': {}", api_endpoint, e);
            "localhost".to_string()
        }
    }
}

fn server_from_conf(conf: &ServerConf, host: &str) -> Result<Server> {
    let port = conf.port_number()?;
    let address = format!("{}:{}", host, port);
    let path = conf
        .path
        .as_deref()
        .map(|p| format!("/{}", p.trim_start_matches('/')));
    let url = conf
        .protocol
        .as_ref()
        .map(|_| format!("http://{}{}", address, path.as_deref().unwrap_or("")));
    Ok(Server {
        reference: conf.reference.clone(),
        protocol: conf.protocol.clone(),
        address,
        path,
        url,
    })
}

#[async_trait]
impl Instance for LocalhostInstance {
    fn id(&self) -> &str {
        &self.id
    }

    fn machine(&self) -> &Machine {
        &self.machine
    }

    fn logger(&self) -> Arc<dyn LineConsumer> {
        self.logger.clone()
    }

    async fn runtime(&self) -> Result<&MachineRuntimeInfo> {
        if let Some(runtime) = self.runtime.get() {
            return Ok(runtime);
        }
        let computed = self.compute_runtime()?;
        Ok(self.runtime.get_or_init(|| computed))
    }

    async fn get_process(&self, pid: u32) -> Result<Arc<dyn InstanceProcess>> {
        self.processes.get(pid).await
    }

    async fn get_processes(&self) -> Result<Vec<Arc<dyn InstanceProcess>>> {
        Ok(self.processes.alive().await)
    }

    async fn create_process(
        &self,
        command: Command,
        output_channel: Option<String>,
    ) -> Result<Arc<dyn InstanceProcess>> {
        let pid = self.processes.next_pid();
        debug!("Creating process {} for '{}'", pid, command.command_line);
        let process: Arc<dyn InstanceProcess> = Arc::new(LocalhostProcess::new(
            pid,
            command,
            output_channel,
            self.shell.clone(),
        ));
        self.processes.insert(process.clone());
        Ok(process)
    }

    async fn save_to_snapshot(&self, _owner: &str) -> Result<InstanceKey> {
        Err(DockyardError::Machine(SNAPSHOT_UNSUPPORTED.into()))
    }

    /// Kills the processes this instance started. Anything those processes
    /// spawned in turn is left to the host session.
    async fn destroy(&self) -> Result<()> {
        let alive = self.processes.alive().await;
        info!(
            "Destroying localhost machine {} ({} live process(es))",
            self.id,
            alive.len()
        );
        for process in alive {
            if let Err(e) = process.kill().await {
                warn!("Failed to kill process {}: {}", process.pid(), e);
            }
        }
        Ok(())
    }
}
