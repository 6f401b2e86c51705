//! Injectable time source

use crate::error::{LeagueError, Result};
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;

/// Source of the current instant
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct RealClock;

impl Clock for RealClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock pinned to a single instant
#[derive(Debug, Clone, Copy)]
pub struct FrozenClock {
    at: DateTime<Utc>,
}

impl FrozenClock {
    pub fn new(at: DateTime<Utc>) -> Self {
        Self { at }
    }
}

impl Clock for FrozenClock {
    fn now(&self) -> DateTime<Utc> {
        self.at
    }
}

/// Parse a `YYYYMMDDhhmmss` override in the given timezone
pub fn parse_timestamp_override(value: &str, tz: Tz) -> Result<DateTime<Utc>> {
    let naive = NaiveDateTime::parse_from_str(value, "%Y%m%d%H%M%S").map_err(|e| {
        LeagueError::validation(format!("invalid timestamp '{}': {}", value, e), "ts")
    })?;

    tz.from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| {
            LeagueError::validation(format!("timestamp '{}' does not exist in {}", value, tz), "ts")
        })
}
