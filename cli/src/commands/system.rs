//! # Dockyard System Command Group
//!
//! File: cli/src/commands/system.rs
//!
//! ## Overview
//!
//! `dockyard system` queries the daemon itself: `info`, `version`, and a
//! live `events` feed.
//!
//! ## Usage
//!
//! ```bash
//! dockyard system version
//! # Replay the last hour of container events, then keep streaming
//! dockyard system events --since $(( $(date +%s) - 3600 )) --filter type=container
//! ```
//!
use super::{connect, print_json};
use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use dockyard::engine::json::{Event, Filters};
use dockyard::engine::params::GetEventsParams;
use tokio_util::sync::CancellationToken;
use tracing::info;

#[derive(Parser, Debug)]
pub struct SystemArgs {
    #[command(subcommand)]
    command: SystemCommand,
}

#[derive(Subcommand, Debug)]
enum SystemCommand {
    /// Show daemon-wide information.
    Info,
    /// Show daemon and API versions.
    Version,
    /// Stream daemon events until interrupted (or until `--until`).
    Events(EventsArgs),
}

#[derive(Parser, Debug)]
struct EventsArgs {
    /// Replay events since this Unix time (seconds). 0 streams new events only.
    #[arg(long, default_value_t = 0)]
    since: u64,
    /// Stop at this Unix time (seconds). 0 keeps streaming.
    #[arg(long, default_value_t = 0)]
    until: u64,
    /// Event filter as `key=value`; repeatable.
    #[arg(long = "filter", value_name = "KEY=VALUE")]
    filters: Vec<String>,
}

/// Parses `key=value` filter arguments.
fn parse_filters(raw: &[String]) -> Result<Filters> {
    raw.iter().try_fold(Filters::new(), |filters, entry| {
        let (key, value) = entry
            .split_once('=')
            .ok_or_else(|| anyhow!("Invalid filter '{}', expected key=value", entry))?;
        Ok(filters.with_filter(key, &[value]))
    })
}

fn format_event(event: &Event) -> String {
    let when = event
        .time
        .and_then(|t| DateTime::<Utc>::from_timestamp(t, 0))
        .map(|t| t.to_rfc3339())
        .unwrap_or_else(|| "-".to_string());
    let actor = event
        .actor
        .as_ref()
        .and_then(|a| a.id.as_deref())
        .or(event.id.as_deref())
        .unwrap_or("-");
    format!(
        "{} {} {} {}",
        when,
        event.kind.as_deref().unwrap_or("-"),
        event
            .action
            .as_deref()
            .or(event.status.as_deref())
            .unwrap_or("-"),
        actor
    )
}

pub async fn handle_system(args: SystemArgs, cancel: &CancellationToken) -> Result<()> {
    let (_, connector) = connect()?;
    match args.command {
        SystemCommand::Info => {
            let info = connector
                .get_system_info()
                .await
                .context("Failed to get daemon info")?;
            print_json(&info)?;
        }
        SystemCommand::Version => {
            let version = connector
                .get_version()
                .await
                .context("Failed to get daemon version")?;
            print_json(&version)?;
        }
        SystemCommand::Events(events) => {
            let mut params = GetEventsParams::new()
                .with_since_second(events.since)
                .with_until_second(events.until);
            let filters = parse_filters(&events.filters)?;
            if !filters.is_empty() {
                params = params.with_filters(filters);
            }
            info!("Streaming daemon events");
            let pump = connector
                .get_events(&params, |event: Event| println!("{}", format_event(&event)))
                .await
                .context("Failed to open event stream")?;
            let outcome = pump.wait_or_cancel(cancel).await?;
            if !cancel.is_cancelled() {
                outcome.result.context("Event stream failed")?;
            }
        }
    }
    connector.shutdown().await;
    Ok(())
}

// --- Unit Tests ---
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_events_args() {
        let args = SystemArgs::try_parse_from([
            "system", "events", "--since", "100", "--filter", "type=container", "--filter",
            "event=die",
        ])
        .unwrap();
        match args.command {
            SystemCommand::Events(events) => {
                assert_eq!(events.since, 100);
                assert_eq!(events.until, 0);
                let filters = parse_filters(&events.filters).unwrap();
                assert_eq!(filters.filters()["event"], vec!["die"]);
            }
            _ => panic!("Incorrect subcommand parsed for 'events'"),
        }
    }

    #[test]
    fn test_rejects_malformed_filter() {
        assert!(parse_filters(&["container".to_string()]).is_err());
    }

    #[test]
    fn test_format_event() {
        let event: Event = serde_json::from_str(
            r#"{"Type":"container","Action":"start","Actor":{"ID":"abc","Attributes":{}},"time":0}"#,
        )
        .unwrap();
        assert_eq!(
            format_event(&event),
            "1970-01-01T00:00:00+00:00 container start abc"
        );
    }
}
