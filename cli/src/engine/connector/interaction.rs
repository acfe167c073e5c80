//! # Container Interaction
//!
//! File: cli/src/engine/connector/interaction.rs
//!
//! ## Overview
//!
//! Attaching to a container's output and running extra commands in it via
//! exec instances. Output arrives as log frames (see `log_frames`) and is
//! delivered line by line to a `MessageProcessor<LogMessage>` running on a
//! background pump. These methods return once the stream is open; the
//! returned `PumpHandle` tells the caller when the output ends.
//!
//! An exec takes two requests: `create_exec` registers the command and
//! returns its id, `start_exec` runs it.
//!
//! ## Usage
//!
//! ```rust,ignore
//! let exec = connector
//!     .create_exec(&CreateExecParams::new(container, ["ls", "-la"])?.with_detach(false))
//!     .await?;
//! let handle = connector
//!     .start_exec(&StartExecParams::new(&exec.id)?, Some(|m: LogMessage| println!("{}", m.content)))
//!     .await?;
//! if let Some(handle) = handle {
//!     handle.wait().await?.result?;
//! }
//! ```
//!
use super::DockerConnector;
use crate::core::error::Result;
use crate::engine::json::{Created, Exec, ExecConfig, ExecStart};
use crate::engine::log_frames::{LogFrameDecoder, LogMessage};
use crate::engine::params::{AttachContainerParams, CreateExecParams, StartExecParams};
use crate::engine::pump::{MessageProcessor, PumpHandle};
use hyper::Method;
use tracing::{debug, instrument};

impl DockerConnector {
    /// Attaches to a container's stdout and stderr
    /// (`POST /containers/<id>/attach`, 200).
    ///
    /// With `stream` set the attach also replays the existing logs and then
    /// follows live output until the container stops.
    #[instrument(skip(self, params, processor), fields(container = %params.container()))]
    pub async fn attach_container<P>(
        &self,
        params: &AttachContainerParams,
        processor: P,
    ) -> Result<PumpHandle<P>>
    where
        P: MessageProcessor<LogMessage>,
    {
        let response = self
            .connection()
            .method(Method::POST)
            .path(format!("/containers/{}/attach", params.container()))
            .query("stdout", 1)
            .query("stderr", 1)
            .flag_if_set("stream", params.stream())
            .flag_if_set("logs", params.stream())
            .request()
            .await?
            .accept(&[200])
            .await?;
        Ok(self.spawn_pump(response.into_body(), LogFrameDecoder::new(), processor))
    }

    /// Registers a command to run in a container
    /// (`POST /containers/<id>/exec`, any 2xx).
    ///
    /// An explicit `detach = false` attaches stdout and stderr so the
    /// output can be read when the exec is started.
    #[instrument(skip(self, params), fields(container = %params.container()))]
    pub async fn create_exec(&self, params: &CreateExecParams) -> Result<Exec> {
        let attach = params.detach() == Some(false);
        let config = ExecConfig {
            attach_stdout: attach,
            attach_stderr: attach,
            cmd: params.cmd().to_vec(),
            ..Default::default()
        };
        let response = self
            .connection()
            .method(Method::POST)
            .path(format!("/containers/{}/exec", params.container()))
            .json_entity(&config)?
            .request()
            .await?
            .accept_success()
            .await?;
        let created: Created = response.json().await?;
        debug!("Created exec {} for {:?}", created.id, params.cmd());
        Ok(Exec {
            cmd: params.cmd().to_vec(),
            id: created.id,
        })
    }

    /// Starts an exec instance (`POST /exec/<id>/start`, any 2xx).
    ///
    /// Without a processor the exec starts detached unless `params` says
    /// otherwise. The output is pumped only when a processor is given and
    /// the daemon sent a body (anything but 204).
    ///
    /// # Returns
    ///
    /// * `Result<Option<PumpHandle<P>>>` - The output pump, if one was started.
    #[instrument(skip(self, params, processor), fields(exec = %params.exec_id()))]
    pub async fn start_exec<P>(
        &self,
        params: &StartExecParams,
        processor: Option<P>,
    ) -> Result<Option<PumpHandle<P>>>
    where
        P: MessageProcessor<LogMessage>,
    {
        let start = ExecStart {
            detach: params.detach().unwrap_or(processor.is_none()),
            tty: params.tty().unwrap_or(false),
        };
        let response = self
            .connection()
            .method(Method::POST)
            .path(format!("/exec/{}/start", params.exec_id()))
            .json_entity(&start)?
            .request()
            .await?
            .accept_success()
            .await?;
        match processor {
            Some(processor) if response.status() != 204 => Ok(Some(self.spawn_pump(
                response.into_body(),
                LogFrameDecoder::new(),
                processor,
            ))),
            _ => Ok(None),
        }
    }
}
