//! Schedule specs
//!
//! Five-field cron expressions (minute, hour, day-of-month, month,
//! day-of-week) plus the `@hourly` and `@daily` shorthands are handed to
//! `tokio-cron-scheduler` and evaluated as wall-clock times in the
//! scheduler's timezone. `@every <n>{h,m,s}` is a fixed repeat interval.

use std::fmt;
use std::time::Duration;
use tokio_cron_scheduler::Job as CronJob;

use crate::error::{LeagueError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Schedule {
    /// Six-field expression (leading seconds field) ready for the scheduler
    Cron(String),
    Every(Duration),
}

/// A parsed, validated schedule
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CronSpec {
    raw: String,
    schedule: Schedule,
}

impl fmt::Display for CronSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.raw)
    }
}

fn invalid(spec: &str, reason: impl fmt::Display) -> LeagueError {
    LeagueError::validation(format!("invalid cron spec '{}': {}", spec, reason), "schedule")
}

impl CronSpec {
    pub fn parse(spec: &str) -> Result<Self> {
        let trimmed = spec.trim();

        if let Some(rest) = trimmed.strip_prefix("@every") {
            let rest = rest.trim();
            let unit = rest.chars().last().unwrap_or(' ');
            let count = &rest[..rest.len() - unit.len_utf8().min(rest.len())];
            let seconds = match unit {
                'h' => 3600,
                'm' => 60,
                's' => 1,
                _ => return Err(invalid(spec, "interval needs an h, m or s unit")),
            };
            let count: u64 = count
                .parse()
                .map_err(|_| invalid(spec, format!("'{}' is not a whole number", count)))?;
            if count == 0 {
                return Err(invalid(spec, "interval must be positive"));
            }
            return Ok(Self {
                raw: trimmed.to_string(),
                schedule: Schedule::Every(Duration::from_secs(count * seconds)),
            });
        }

        let fields = match trimmed {
            "@hourly" => "0 * * * *",
            "@daily" | "@midnight" => "0 0 * * *",
            other => other,
        };
        let count = fields.split_whitespace().count();
        if count != 5 {
            return Err(invalid(spec, format!("expected 5 fields, got {}", count)));
        }

        let expression = format!("0 {}", fields);
        CronJob::new_async(expression.as_str(), |_, _| Box::pin(async {}))
            .map_err(|e| invalid(spec, e))?;

        Ok(Self {
            raw: trimmed.to_string(),
            schedule: Schedule::Cron(expression),
        })
    }

    /// Fixed interval for `@every` specs
    pub fn interval(&self) -> Option<Duration> {
        match self.schedule {
            Schedule::Every(d) => Some(d),
            Schedule::Cron(_) => None,
        }
    }

    pub(crate) fn schedule(&self) -> &Schedule {
        &self.schedule
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;
    use chrono_tz::Europe::London;
    use tokio_cron_scheduler::JobScheduler;

    #[test]
    fn test_five_fields_gain_a_seconds_field() {
        let spec = CronSpec::parse("34 12 * * *").unwrap();
        assert_eq!(spec.schedule(), &Schedule::Cron("0 34 12 * * *".into()));
        assert_eq!(spec.interval(), None);
        assert_eq!(spec.to_string(), "34 12 * * *");

        let hourly = CronSpec::parse("@hourly").unwrap();
        assert_eq!(hourly.schedule(), &Schedule::Cron("0 0 * * * *".into()));
        assert_eq!(hourly.to_string(), "@hourly");
    }

    #[tokio::test]
    async fn test_daily_spec_fires_on_local_wall_clock() {
        let spec = CronSpec::parse("34 12 * * *").unwrap();
        let Schedule::Cron(expression) = spec.schedule() else {
            panic!("expected a cron expression");
        };

        let mut scheduler = JobScheduler::new().await.unwrap();
        let job = CronJob::new_async_tz(expression.as_str(), London, |_, _| Box::pin(async {}))
            .unwrap();
        let id = scheduler.add(job).await.unwrap();
        scheduler.start().await.unwrap();

        let next = scheduler
            .next_tick_for_job(id)
            .await
            .unwrap()
            .unwrap()
            .with_timezone(&London);
        scheduler.shutdown().await.unwrap();
        // 11:34 UTC in summer, 12:34 UTC in winter
        assert_eq!((next.hour(), next.minute(), next.second()), (12, 34, 0));
    }

    #[test]
    fn test_every_intervals() {
        assert_eq!(
            CronSpec::parse("@every 15m").unwrap().interval(),
            Some(Duration::from_secs(900))
        );
        assert_eq!(
            CronSpec::parse("@every 1h").unwrap().interval(),
            Some(Duration::from_secs(3600))
        );
        assert_eq!(
            CronSpec::parse(" @every 30s ").unwrap().to_string(),
            "@every 30s"
        );
    }

    #[test]
    fn test_rejects_malformed() {
        for bad in [
            "",
            "* * * *",
            "* * * * * *",
            "60 * * * *",
            "* 24 * * *",
            "a * * * *",
            "@every",
            "@every 15",
            "@every 0m",
            "@every 5d",
            "@every 1h15m",
        ] {
            assert!(CronSpec::parse(bad).is_err(), "{:?} should be rejected", bad);
        }
    }
}
