//! # Event Stream Parameters
//!
//! File: cli/src/engine/params/events.rs
//!
use crate::engine::json::Filters;

/// Parameters for `GET /events`.
///
/// Bounds are Unix timestamps in seconds. Zero for both means "new events
/// only"; a non-zero `since` with a zero `until` replays history and then
/// keeps streaming. Zero bounds are left out of the query.
#[derive(Debug, Clone, Default)]
pub struct GetEventsParams {
    since_second: Option<u64>,
    until_second: Option<u64>,
    filters: Option<Filters>,
}

impl GetEventsParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_since_second(mut self, since: u64) -> Self {
        self.since_second = Some(since).filter(|s| *s != 0);
        self
    }

    pub fn with_until_second(mut self, until: u64) -> Self {
        self.until_second = Some(until).filter(|u| *u != 0);
        self
    }

    pub fn with_filters(mut self, filters: Filters) -> Self {
        self.filters = Some(filters);
        self
    }

    pub fn since_second(&self) -> Option<u64> {
        self.since_second
    }

    pub fn until_second(&self) -> Option<u64> {
        self.until_second
    }

    pub fn filters(&self) -> Option<&Filters> {
        self.filters.as_ref()
    }
}

// --- Unit Tests ---
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_bounds_are_unset() {
        let params = GetEventsParams::new()
            .with_since_second(0)
            .with_until_second(0);
        assert_eq!(params.since_second(), None);
        assert_eq!(params.until_second(), None);

        let params = GetEventsParams::new().with_since_second(1_700_000_000);
        assert_eq!(params.since_second(), Some(1_700_000_000));
        assert_eq!(params.until_second(), None);
    }
}
