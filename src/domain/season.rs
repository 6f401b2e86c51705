//! Season model: acceptance windows, live period and completion

use super::standings::Standings;
use super::team::TeamCollection;
use super::timeframe::{SequencedTimeFrame, TimeFrame};
use crate::error::{LeagueError, Result};
use chrono::{DateTime, Datelike, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// How long before a window's end predictions are considered closing
const CLOSING_NOTICE_HOURS: i64 = 24;

/// Whether predictions are currently being accepted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PredictionsStatus {
    Pending,
    Open,
    Closed,
}

impl PredictionsStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PredictionsStatus::Pending => "pending",
            PredictionsStatus::Open => "open",
            PredictionsStatus::Closed => "closed",
        }
    }
}

impl fmt::Display for PredictionsStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Snapshot of a season's acceptance state at an instant
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeasonState {
    pub predictions_status: PredictionsStatus,
    pub predictions_closing: bool,
    pub accepting_entries: bool,
    pub is_live: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Season {
    pub id: String,
    pub name: String,
    /// Competition identifier at the upstream provider
    #[serde(default)]
    pub client_id: Option<String>,
    pub team_ids: Vec<String>,
    pub max_rounds: u32,
    pub entries_accepted: TimeFrame,
    pub predictions_accepted: TimeFrame,
    pub live: TimeFrame,
    pub prediction_windows: Vec<TimeFrame>,
}

impl Season {
    /// Check the season's structural invariants
    pub fn validate(&self, teams: &TeamCollection) -> Result<()> {
        let mut reasons = Vec::new();
        let mut fields = Vec::new();
        let mut fail = |reason: String, field: &str| {
            reasons.push(reason);
            fields.push(field.to_string());
        };

        if self.max_rounds == 0 {
            fail("max rounds must be positive".into(), "max_rounds");
        }
        for (name, frame) in [
            ("entries_accepted", &self.entries_accepted),
            ("predictions_accepted", &self.predictions_accepted),
            ("live", &self.live),
        ] {
            if !frame.is_valid() {
                fail(format!("{} must end after it begins", name), name);
            }
        }
        if self.entries_accepted.from > self.predictions_accepted.from {
            fail(
                "entries must be accepted before predictions".into(),
                "entries_accepted",
            );
        }
        for id in &self.team_ids {
            if !teams.contains(id) {
                fail(format!("unknown team '{}'", id), "team_ids");
            }
        }

        for (idx, window) in self.prediction_windows.iter().enumerate() {
            if !window.is_valid() {
                fail(format!("window {} must end after it begins", idx + 1), "prediction_windows");
            }
            if !window.begins_within(&self.predictions_accepted)
                || !window.ends_within(&self.predictions_accepted)
            {
                fail(
                    format!("window {} lies outside predictions_accepted", idx + 1),
                    "prediction_windows",
                );
            }
            if let Some(prev) = idx.checked_sub(1).map(|i| &self.prediction_windows[i]) {
                if prev.from >= window.from || prev.overlaps_with(window) {
                    fail(
                        format!("window {} is out of order or overlaps its predecessor", idx + 1),
                        "prediction_windows",
                    );
                }
            }
        }

        if reasons.is_empty() {
            Ok(())
        } else {
            Err(LeagueError::Validation { reasons, fields })
        }
    }

    pub fn state_at(&self, ts: DateTime<Utc>) -> SeasonState {
        let current = self.prediction_windows.iter().find(|w| w.contains(ts));

        let (predictions_status, predictions_closing) = match current {
            Some(window) => (
                PredictionsStatus::Open,
                window.until - ts <= Duration::hours(CLOSING_NOTICE_HOURS),
            ),
            None if self.prediction_windows.iter().any(|w| !w.has_begun_by(ts)) => {
                (PredictionsStatus::Pending, false)
            }
            None => (PredictionsStatus::Closed, false),
        };

        SeasonState {
            predictions_status,
            predictions_closing,
            accepting_entries: self.entries_accepted.contains(ts),
            is_live: self.live.contains(ts),
        }
    }

    pub fn is_live_at(&self, ts: DateTime<Utc>) -> bool {
        self.live.contains(ts)
    }

    /// The prediction window whose start falls inside `tf`
    pub fn prediction_window_begins_within(&self, tf: &TimeFrame) -> Result<SequencedTimeFrame> {
        self.sequenced_window(|w| w.begins_within(tf))
            .ok_or_else(|| LeagueError::NotFound("no prediction window begins within frame".into()))
    }

    /// The prediction window whose end falls inside `tf`
    pub fn prediction_window_ends_within(&self, tf: &TimeFrame) -> Result<SequencedTimeFrame> {
        self.sequenced_window(|w| w.ends_within(tf))
            .ok_or_else(|| LeagueError::NotFound("no prediction window ends within frame".into()))
    }

    fn sequenced_window(&self, pred: impl Fn(&TimeFrame) -> bool) -> Option<SequencedTimeFrame> {
        let total = self.prediction_windows.len();
        self.prediction_windows
            .iter()
            .position(pred)
            .map(|idx| SequencedTimeFrame {
                count: idx + 1,
                total,
                current: self.prediction_windows[idx],
                next: self.prediction_windows.get(idx + 1).copied(),
            })
    }

    /// Every team has played the season's full complement of games
    pub fn is_completed_by(&self, standings: &Standings) -> bool {
        !standings.rankings.is_empty()
            && standings
                .rankings
                .iter()
                .all(|r| r.meta.played_games == self.max_rounds)
    }

    /// Season year as understood by the upstream provider
    pub fn upstream_year(&self) -> i32 {
        self.live.from.year()
    }
}

/// Frame in which a window must have opened to trigger an "open" notice at `ts`
pub fn open_query_frame(ts: DateTime<Utc>) -> TimeFrame {
    TimeFrame::new(ts - Duration::hours(24), ts - Duration::minutes(1))
}

/// Frame in which a window must close to trigger a "closing" notice at `ts`
pub fn closing_query_frame(ts: DateTime<Utc>) -> TimeFrame {
    let from = ts + Duration::hours(12);
    TimeFrame::new(from, from + Duration::hours(24) - Duration::minutes(1))
}

/// Immutable set of known seasons
#[derive(Debug, Clone, Default)]
pub struct SeasonCollection {
    seasons: HashMap<String, Season>,
}

impl SeasonCollection {
    pub fn new(seasons: impl IntoIterator<Item = Season>) -> Self {
        Self {
            seasons: seasons.into_iter().map(|s| (s.id.clone(), s)).collect(),
        }
    }

    pub fn get(&self, id: &str) -> Result<&Season> {
        self.seasons
            .get(id)
            .ok_or_else(|| LeagueError::NotFound(format!("season '{}'", id)))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Season> {
        self.seasons.values()
    }

    pub fn len(&self) -> usize {
        self.seasons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seasons.is_empty()
    }
}
