//! Daily prediction-window notices
//!
//! The open job looks back over the last day for a window that has started;
//! the closing job looks 12 to 36 hours ahead for one that is about to end.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, info};

use super::communications::CommunicationsAgent;
use super::fan_out::{fan_out, DEFAULT_FAN_OUT_LIMIT};
use crate::coordination::{Job, ShutdownToken};
use crate::domain::{
    closing_query_frame, open_query_frame, Clock, LeagueData, SequencedTimeFrame, WindowNotice,
};
use crate::error::Result;
use crate::persistence::EntryRepository;

pub struct PredictionWindowJob {
    name: String,
    season_id: String,
    notice: WindowNotice,
    league: Arc<LeagueData>,
    entries: Arc<dyn EntryRepository>,
    comms: Arc<CommunicationsAgent>,
    clock: Arc<dyn Clock>,
}

impl PredictionWindowJob {
    pub fn new(
        season_id: impl Into<String>,
        notice: WindowNotice,
        league: Arc<LeagueData>,
        entries: Arc<dyn EntryRepository>,
        comms: Arc<CommunicationsAgent>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let season_id = season_id.into();
        let prefix = match notice {
            WindowNotice::Open => "prediction-window-open",
            WindowNotice::Closing => "prediction-window-closing",
        };
        Self {
            name: format!("{}-{}", prefix, season_id),
            season_id,
            notice,
            league,
            entries,
            comms,
            clock,
        }
    }

    /// Window matching this job's query frame at `now`, if any
    pub fn matching_window(&self, now: DateTime<Utc>) -> Result<Option<SequencedTimeFrame>> {
        let season = self.league.seasons.get(&self.season_id)?;
        let found = match self.notice {
            WindowNotice::Open => season.prediction_window_begins_within(&open_query_frame(now)),
            WindowNotice::Closing => {
                season.prediction_window_ends_within(&closing_query_frame(now))
            }
        };
        match found {
            Ok(window) => Ok(Some(window)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Notify every approved entry; returns how many were queued
    pub async fn notify(&self, now: DateTime<Utc>) -> Result<usize> {
        let Some(window) = self.matching_window(now)? else {
            debug!(season = %self.season_id, notice = ?self.notice, "No matching prediction window");
            return Ok(0);
        };

        let entries = self.entries.select_approved_entries(&self.season_id).await?;
        let total = entries.len();
        let comms = &self.comms;
        let notice = self.notice;
        let target = &window;
        let errors = fan_out(entries, DEFAULT_FAN_OUT_LIMIT, move |entry| async move {
            comms
                .issue_prediction_window_email(&entry, target, notice)
                .await
        })
        .await;

        let queued = total - errors.len();
        info!(
            season = %self.season_id,
            window = window.count,
            of = window.total,
            queued,
            failed = errors.len(),
            "Prediction window notices issued"
        );
        errors.into_result().map(|_| queued)
    }
}

#[async_trait]
impl Job for PredictionWindowJob {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, _token: ShutdownToken) -> Result<()> {
        self.notify(self.clock.now()).await.map(|_| ())
    }
}
