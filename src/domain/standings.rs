use super::ranking::RankingWithMeta;
use super::team::TeamCollection;
use crate::error::{LeagueError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// League table as reported upstream, before it is stored
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LatestStandings {
    pub round_number: u32,
    pub rankings: Vec<RankingWithMeta>,
}

impl LatestStandings {
    /// Reject teams outside the known set and order by table position
    pub fn validate_and_sort(&mut self, teams: &TeamCollection) -> Result<()> {
        if let Some(unknown) = self.rankings.iter().find(|r| !teams.contains(&r.id)) {
            return Err(LeagueError::UnknownTeam(unknown.id.clone()));
        }
        self.rankings.sort_by_key(|r| r.position);
        Ok(())
    }
}

/// Stored league table for one round of a season
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Standings {
    pub id: Uuid,
    pub season_id: String,
    pub round_number: u32,
    pub rankings: Vec<RankingWithMeta>,
    pub finalised: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Standings {
    pub fn new(
        season_id: impl Into<String>,
        round_number: u32,
        rankings: Vec<RankingWithMeta>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            season_id: season_id.into(),
            round_number,
            rankings,
            finalised: false,
            created_at: now,
            updated_at: None,
        }
    }

    /// Team IDs in table order
    pub fn team_ids(&self) -> Vec<String> {
        self.rankings.iter().map(|r| r.id.clone()).collect()
    }

    pub fn position_of(&self, team_id: &str) -> Option<usize> {
        self.rankings
            .iter()
            .find(|r| r.id == team_id)
            .map(|r| r.position)
    }

    /// Most recent modification time
    pub fn last_updated(&self) -> DateTime<Utc> {
        self.updated_at.unwrap_or(self.created_at)
    }
}
