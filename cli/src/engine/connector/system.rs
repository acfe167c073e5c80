//! # Daemon Information and Events
//!
//! File: cli/src/engine/connector/system.rs
//!
//! `/info`, `/version` and the long-lived `/events` stream.
//!
use super::DockerConnector;
use crate::core::error::Result;
use crate::engine::json::Event;
use crate::engine::params::GetEventsParams;
use crate::engine::pump::{JsonMessageDecoder, MessageProcessor, PumpHandle};
use bollard::models::{SystemInfo, SystemVersion};
use tracing::{debug, instrument};

impl DockerConnector {
    /// Fetches system-wide information (`GET /info`, 200).
    #[instrument(skip(self))]
    pub async fn get_system_info(&self) -> Result<SystemInfo> {
        let response = self.connection().path("/info").request().await?;
        response.accept(&[200]).await?.json().await
    }

    /// Fetches daemon and API versions (`GET /version`, 200).
    #[instrument(skip(self))]
    pub async fn get_version(&self) -> Result<SystemVersion> {
        let response = self.connection().path("/version").request().await?;
        response.accept(&[200]).await?.json().await
    }

    /// Subscribes to daemon events (`GET /events`, 200).
    ///
    /// Each event is handed to `processor` in arrival order on a background
    /// pump; this method returns as soon as the stream is open. Without an
    /// `until` bound the stream stays open until the pump is cancelled or the
    /// connector shuts down.
    ///
    /// # Arguments
    ///
    /// * `params` - Time bounds and filters. See [`GetEventsParams`].
    /// * `processor` - Receives each decoded [`Event`].
    ///
    /// # Errors
    ///
    /// Fails before the pump starts if the daemon cannot be reached or
    /// answers with anything but 200.
    #[instrument(skip(self, params, processor))]
    pub async fn get_events<P>(&self, params: &GetEventsParams, processor: P) -> Result<PumpHandle<P>>
    where
        P: MessageProcessor<Event>,
    {
        let mut connection = self
            .connection()
            .path("/events")
            .query_if_set("since", params.since_second())
            .query_if_set("until", params.until_second());
        if let Some(filters) = params.filters() {
            connection = connection.query("filters", serde_json::to_string(filters)?);
        }
        let response = connection.request().await?.accept(&[200]).await?;
        debug!("Event stream opened");
        Ok(self.spawn_pump(
            response.into_body(),
            JsonMessageDecoder::<Event>::new(),
            processor,
        ))
    }
}
