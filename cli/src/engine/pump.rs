//! # Dockyard Message Pump (`engine::pump`)
//!
//! File: cli/src/engine/pump.rs
//!
//! ## Overview
//!
//! A pump reads a daemon response body as a sequence of discrete messages
//! and hands each one, in wire order, to a caller-supplied processor. It
//! runs as its own tokio task so the caller can either carry on (attach,
//! exec output, events) or wait for it (build, pull, push).
//!
//! ## Architecture
//!
//! - `JsonMessageDecoder<T>`: a `tokio_util::codec::Decoder` yielding one
//!   JSON value per call from a concatenated (usually newline separated)
//!   stream. Log frames use `log_frames::LogFrameDecoder` instead.
//! - `MessageProcessor<M>`: receives one decoded message at a time. Any
//!   `FnMut(M)` closure is a processor.
//! - `MessagePump::spawn`: starts the read loop on a `TaskTracker`.
//! - `PumpHandle`: lets the starter wait for the loop, or cancel it.
//!
//! Decode failures never cross the task boundary as panics. They end the
//! loop and land in `PumpOutcome::result`, next to the processor, so the
//! waiter can inspect both the error and whatever the processor collected.
//!
//! Cancelling the pump's token ends the loop at the next await point. The
//! reader is dropped when the loop ends, which releases the connection.
//!
//! ## Examples
//!
//! ```rust,ignore
//! let handle = MessagePump::spawn(
//!     &tracker,
//!     response.into_body(),
//!     JsonMessageDecoder::<Event>::new(),
//!     |event: Event| println!("{:?}", event),
//!     CancellationToken::new(),
//! );
//! let outcome = handle.wait().await?;
//! outcome.result?;
//! ```
//!
use crate::core::error::{DockyardError, Result};
use bytes::{Buf, BytesMut};
use futures_util::StreamExt;
use serde::de::DeserializeOwned;
use std::{io, marker::PhantomData};
use tokio::{io::AsyncRead, task::JoinHandle};
use tokio_util::{
    codec::{Decoder, FramedRead},
    sync::CancellationToken,
    task::TaskTracker,
};
use tracing::{debug, trace};

/// Receives decoded messages, one call per message, in stream order.
pub trait MessageProcessor<M>: Send + 'static {
    fn process(&mut self, message: M);
}

impl<M, F> MessageProcessor<M> for F
where
    F: FnMut(M) + Send + 'static,
{
    fn process(&mut self, message: M) {
        self(message)
    }
}

/// Decodes a stream of concatenated JSON values of type `T`.
#[derive(Debug)]
pub struct JsonMessageDecoder<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> JsonMessageDecoder<T> {
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T> Default for JsonMessageDecoder<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: DeserializeOwned> Decoder for JsonMessageDecoder<T> {
    type Item = T;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> io::Result<Option<T>> {
        match src.iter().position(|b| !b.is_ascii_whitespace()) {
            Some(start) => src.advance(start),
            None => {
                src.clear();
                return Ok(None);
            }
        }

        let (next, consumed) = {
            let mut values = serde_json::Deserializer::from_slice(&src[..]).into_iter::<T>();
            let next = values.next();
            (next, values.byte_offset())
        };
        match next {
            Some(Ok(value)) => {
                src.advance(consumed);
                Ok(Some(value))
            }
            // Value continues in the next chunk.
            Some(Err(e)) if e.is_eof() => Ok(None),
            Some(Err(e)) => Err(io::Error::new(io::ErrorKind::InvalidData, e)),
            None => Ok(None),
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> io::Result<Option<T>> {
        match self.decode(src)? {
            Some(value) => Ok(Some(value)),
            None if src.iter().all(|b| b.is_ascii_whitespace()) => Ok(None),
            None => Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("stream ended inside a JSON message ({} bytes left)", src.len()),
            )),
        }
    }
}

/// What a finished pump leaves behind.
#[derive(Debug)]
pub struct PumpOutcome<P> {
    /// The processor, with whatever state it accumulated.
    pub processor: P,
    /// `Ok` on clean end-of-stream, otherwise the decode/read failure or
    /// `Cancelled`.
    pub result: Result<()>,
}

/// Handle to a running pump.
#[derive(Debug)]
pub struct PumpHandle<P> {
    task: JoinHandle<PumpOutcome<P>>,
    cancel: CancellationToken,
}

impl<P> PumpHandle<P> {
    /// Token that stops this pump when cancelled.
    pub fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Asks the pump to stop. Returns immediately.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Waits for the read loop to end. Fails only if the task itself died.
    pub async fn wait(self) -> Result<PumpOutcome<P>> {
        self.task
            .await
            .map_err(|e| DockyardError::Task(format!("message pump failed: {}", e)))
    }

    /// Waits for the read loop, stopping it first if `cancel` fires.
    pub async fn wait_or_cancel(self, cancel: &CancellationToken) -> Result<PumpOutcome<P>> {
        let pump_cancel = self.cancel.clone();
        let wait = self.wait();
        tokio::pin!(wait);
        tokio::select! {
            outcome = &mut wait => outcome,
            _ = cancel.cancelled() => {
                debug!("Caller cancelled, stopping message pump");
                pump_cancel.cancel();
                wait.await
            }
        }
    }
}

/// Starts read loops.
pub struct MessagePump;

impl MessagePump {
    /// Spawns a task decoding `reader` with `decoder` and feeding
    /// `processor` until end-of-stream, a decode error, or `cancel`.
    pub fn spawn<R, D, P>(
        tracker: &TaskTracker,
        reader: R,
        decoder: D,
        processor: P,
        cancel: CancellationToken,
    ) -> PumpHandle<P>
    where
        R: AsyncRead + Send + Unpin + 'static,
        D: Decoder<Error = io::Error> + Send + 'static,
        D::Item: Send,
        P: MessageProcessor<D::Item>,
    {
        let token = cancel.clone();
        let task = tracker.spawn(async move {
            let mut frames = FramedRead::new(reader, decoder);
            let mut processor = processor;
            let mut delivered = 0usize;
            let result = loop {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => break Err(DockyardError::Cancelled),
                    next = frames.next() => match next {
                        Some(Ok(message)) => {
                            delivered += 1;
                            processor.process(message);
                        }
                        Some(Err(e)) => break Err(DockyardError::Stream(e)),
                        None => break Ok(()),
                    },
                }
            };
            // Releases the response body, and with it the connection.
            drop(frames);
            trace!(
                "Message pump finished after {} message(s): {:?}",
                delivered,
                result.as_ref().err()
            );
            PumpOutcome { processor, result }
        });
        PumpHandle { task, cancel }
    }
}
