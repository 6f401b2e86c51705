use super::ranking::validate_team_set;
use super::season::Season;
use crate::error::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryStatus {
    Pending,
    Paid,
    Ready,
}

impl EntryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryStatus::Pending => "pending",
            EntryStatus::Paid => "paid",
            EntryStatus::Ready => "ready",
        }
    }
}

impl fmt::Display for EntryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for EntryStatus {
    type Err = &'static str;

    fn from_str(raw: &str) -> std::result::Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "paid" => Ok(Self::Paid),
            "ready" => Ok(Self::Ready),
            _ => Err("invalid entry status; expected pending|paid|ready"),
        }
    }
}

/// One entrant's participation in a season
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub id: Uuid,
    pub short_code: String,
    pub season_id: String,
    pub realm_name: String,
    pub entrant_name: String,
    pub entrant_nickname: String,
    pub entrant_email: String,
    pub status: EntryStatus,
    pub payment_method: Option<String>,
    pub payment_ref: Option<String>,
    pub approved_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Entry {
    pub fn is_approved(&self) -> bool {
        self.approved_at.is_some()
    }
}

/// An append-only predicted final table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryPrediction {
    pub id: Uuid,
    pub entry_id: Uuid,
    pub rankings: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl EntryPrediction {
    /// Build a prediction, checking it is a permutation of the season's teams
    pub fn new(
        entry_id: Uuid,
        rankings: Vec<String>,
        season: &Season,
        now: DateTime<Utc>,
    ) -> Result<Self> {
        validate_team_set(&rankings, &season.team_ids)?;
        Ok(Self {
            id: Uuid::new_v4(),
            entry_id,
            rankings,
            created_at: now,
        })
    }
}

/// The prediction in force at `ts`: greatest `created_at` not after `ts`
pub fn latest_as_of<'a, I>(predictions: I, ts: DateTime<Utc>) -> Option<&'a EntryPrediction>
where
    I: IntoIterator<Item = &'a EntryPrediction>,
{
    predictions
        .into_iter()
        .filter(|p| p.created_at <= ts)
        .max_by_key(|p| p.created_at)
}
