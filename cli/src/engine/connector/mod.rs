//! # Dockyard Engine Client (`engine::connector`)
//!
//! File: cli/src/engine/connector/mod.rs
//!
//! ## Overview
//!
//! `DockerConnector` issues every engine operation as one request/response
//! exchange and turns the HTTP status into success or a structured
//! `Engine` error. Each operation declares its own accepted statuses.
//!
//! Operations that stream (attach, exec output, events) hand the response
//! body to a message pump and return its handle right away. Build, pull and
//! push also pump their progress stream, but wait for it, racing the wait
//! against a caller-supplied `CancellationToken`.
//!
//! ## Architecture
//!
//! The connector's methods are split over submodules by concern:
//!
//! - **`system`**: daemon info, version and the event stream.
//! - **`images`**: list, inspect, tag, remove, commit.
//! - **`operations`**: the long-running build, pull and push.
//! - **`lifecycle`**: create, start, stop, kill, remove, wait.
//! - **`state`**: container inspection, `top`, exec inspection.
//! - **`interaction`**: attach and exec.
//! - **`resources`**: archive copy out of and into containers.
//!
//! The connector is cheap to clone; clones share one `TaskTracker` for
//! background pumps and one shutdown token. `shutdown()` cancels and
//! awaits every pump started through any clone.
//!
//! ## Usage
//!
//! ```rust,ignore
//! let connector = DockerConnector::new(&cfg.engine)?;
//! let info = connector.get_system_info().await?;
//! connector
//!     .stop_container(&StopContainerParams::new("web-1")?.with_timeout(Duration::from_secs(5)))
//!     .await?;
//! connector.shutdown().await;
//! ```
//!
use crate::core::config::EngineConfig;
use crate::core::error::Result;
use crate::engine::connection::{DaemonUri, DockerConnection, ResponseBody};
use crate::engine::json::AuthConfigs;
use crate::engine::pump::{MessageProcessor, MessagePump, PumpHandle};
use std::io;
use tokio_util::{codec::Decoder, sync::CancellationToken, task::TaskTracker};
use tracing::{debug, info};

/// Daemon information, version and events.
pub mod system;
/// Image listing, inspection, tagging, removal and commit.
pub mod images;
/// Long-running image operations: build, pull and push.
pub mod operations;
/// Container create/start/stop/kill/remove/wait.
pub mod lifecycle;
/// Container and exec inspection.
pub mod state;
/// Attach and exec.
pub mod interaction;
/// Archive transfer in and out of containers.
pub mod resources;

/// Client for the engine daemon's remote API.
#[derive(Debug, Clone)]
pub struct DockerConnector {
    uri: DaemonUri,
    api_version: Option<String>,
    auth_configs: AuthConfigs,
    tracker: TaskTracker,
    shutdown: CancellationToken,
}

impl DockerConnector {
    /// Creates a connector from the `[engine]` configuration section.
    ///
    /// # Errors
    ///
    /// Returns `Config` if `daemon_uri` cannot be parsed.
    pub fn new(config: &EngineConfig) -> Result<Self> {
        let uri: DaemonUri = config.daemon_uri.parse()?;
        Ok(Self::with_uri(uri)
            .with_api_version(config.api_version.clone())
            .with_auth_configs(AuthConfigs::new(config.registry_auth.iter().cloned())))
    }

    /// Creates a connector for `uri` with no API version and no credentials.
    pub fn with_uri(uri: DaemonUri) -> Self {
        Self {
            uri,
            api_version: None,
            auth_configs: AuthConfigs::default(),
            tracker: TaskTracker::new(),
            shutdown: CancellationToken::new(),
        }
    }

    pub fn with_api_version(mut self, api_version: Option<String>) -> Self {
        self.api_version = api_version;
        self
    }

    pub fn with_auth_configs(mut self, auth_configs: AuthConfigs) -> Self {
        self.auth_configs = auth_configs;
        self
    }

    pub fn daemon_uri(&self) -> &DaemonUri {
        &self.uri
    }

    pub fn auth_configs(&self) -> &AuthConfigs {
        &self.auth_configs
    }

    /// Starts a request builder aimed at this connector's daemon.
    pub(crate) fn connection(&self) -> DockerConnection {
        DockerConnection::open(&self.uri).api_version(self.api_version.as_deref())
    }

    /// Starts a pump over `body` on the connector's task tracker. The pump
    /// stops on its own token or on connector shutdown.
    pub(crate) fn spawn_pump<D, P>(&self, body: ResponseBody, decoder: D, processor: P) -> PumpHandle<P>
    where
        D: Decoder<Error = io::Error> + Send + 'static,
        D::Item: Send,
        P: MessageProcessor<D::Item>,
    {
        MessagePump::spawn(
            &self.tracker,
            body,
            decoder,
            processor,
            self.shutdown.child_token(),
        )
    }

    /// Number of pumps still running.
    pub fn running_pumps(&self) -> usize {
        self.tracker.len()
    }

    /// Cancels every running pump and waits for all of them to finish.
    /// Operations started afterwards still work; their pumps start
    /// cancelled and end right away.
    pub async fn shutdown(&self) {
        info!("Shutting down docker connector ({} pump(s) running)", self.tracker.len());
        self.tracker.close();
        self.shutdown.cancel();
        self.tracker.wait().await;
        debug!("All message pumps finished");
    }
}
