//! # Dockyard Operation Parameters (`engine::params`)
//!
//! File: cli/src/engine/params/mod.rs
//!
//! ## Overview
//!
//! One parameter object per engine operation. Required identifiers are
//! passed to `new` and checked there, so a missing container id fails before
//! any socket is opened. Optional settings are added with `with_*` methods
//! and read back as `Option`s; an unset option is simply left out of the
//! request.
//!
//! ## Architecture
//!
//! - `container`: create, start, stop, kill, remove, wait, inspect, attach, top, commit
//! - `image`: build, pull, push, tag, remove, inspect
//! - `exec`: create, start, inspect exec instances
//! - `resource`: archive copy out of and into containers
//! - `events`: the daemon event stream
//!
//! ## Examples
//!
//! ```rust,ignore
//! let params = StopContainerParams::new("web-1")?.with_timeout(Duration::from_secs(5));
//! connector.stop_container(&params).await?;
//! ```
//!
use crate::core::error::{DockyardError, Result};

pub mod container;
pub mod events;
pub mod exec;
pub mod image;
pub mod resource;

pub use container::*;
pub use events::GetEventsParams;
pub use exec::{CreateExecParams, GetExecInfoParams, StartExecParams};
pub use image::*;
pub use resource::{GetResourceParams, PutResourceParams};

/// Checks that a required string argument is present.
pub(crate) fn require(name: &str, value: impl Into<String>) -> Result<String> {
    let value = value.into();
    if value.trim().is_empty() {
        return Err(DockyardError::InvalidArgument(format!(
            "{} must not be empty",
            name
        )));
    }
    Ok(value)
}

/// Checks that a required list argument has at least one element.
pub(crate) fn require_non_empty<T>(name: &str, values: Vec<T>) -> Result<Vec<T>> {
    if values.is_empty() {
        return Err(DockyardError::InvalidArgument(format!(
            "{} must contain at least one element",
            name
        )));
    }
    Ok(values)
}
