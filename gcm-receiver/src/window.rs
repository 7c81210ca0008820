//! Query time windows.
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use chrono::{DateTime, SecondsFormat, Utc};

use crate::error::ConfigError;

/// Source of the current time.
pub trait Clock: Send + Sync {
    fn now(&self) -> SystemTime;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> SystemTime {
        SystemTime::now()
    }
}

/// Clock stuck at a given instant.
#[derive(Clone, Copy, Debug)]
pub struct FixedClock(pub SystemTime);

impl FixedClock {
    pub fn from_unix_seconds(seconds: u64) -> Self {
        Self(UNIX_EPOCH + Duration::from_secs(seconds))
    }
}

impl Clock for FixedClock {
    fn now(&self) -> SystemTime {
        self.0
    }
}

/// Half-open `[start, end)` interval queried for one service.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct QueryWindow {
    pub start: SystemTime,
    pub end: SystemTime,
}

impl QueryWindow {
    pub fn start_rfc3339(&self) -> String {
        format_rfc3339(self.start)
    }

    pub fn end_rfc3339(&self) -> String {
        format_rfc3339(self.end)
    }
}

/// Window of `interval` length starting `delay` before `now`.
///
/// The start never goes before the epoch.
pub fn compute_window(
    now: SystemTime,
    interval: Duration,
    delay: Duration,
) -> Result<QueryWindow, ConfigError> {
    let since_epoch = now.duration_since(UNIX_EPOCH).unwrap_or(Duration::ZERO);
    let start = UNIX_EPOCH + since_epoch.saturating_sub(delay);

    let end = start
        .checked_add(interval)
        .ok_or(ConfigError::WindowOutOfRange { interval })?;

    Ok(QueryWindow { start, end })
}

/// Render with whole seconds, the API does not go below that.
fn format_rfc3339(time: SystemTime) -> String {
    DateTime::<Utc>::from(time).to_rfc3339_opts(SecondsFormat::Secs, true)
}
