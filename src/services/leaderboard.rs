use std::sync::Arc;
use tracing::instrument;

use crate::domain::leaderboard::{aggregate, apply_movement, empty_rankings};
use crate::domain::{LeaderBoard, LeagueData, RealmCollection};
use crate::error::{LeagueError, Result};
use crate::persistence::{EntryRepository, ScoredEntryPredictionRepository, StandingsRepository};

/// Read-only leaderboard materialisation
pub struct LeaderBoardAgent {
    league: Arc<LeagueData>,
    realms: Arc<RealmCollection>,
    entries: Arc<dyn EntryRepository>,
    standings: Arc<dyn StandingsRepository>,
    scored: Arc<dyn ScoredEntryPredictionRepository>,
}

impl LeaderBoardAgent {
    pub fn new(
        league: Arc<LeagueData>,
        realms: Arc<RealmCollection>,
        entries: Arc<dyn EntryRepository>,
        standings: Arc<dyn StandingsRepository>,
        scored: Arc<dyn ScoredEntryPredictionRepository>,
    ) -> Self {
        Self {
            league,
            realms,
            entries,
            standings,
            scored,
        }
    }

    /// Cumulative leaderboard for a realm's season up to and including `round`
    #[instrument(skip(self))]
    pub async fn get_leaderboard(
        &self,
        realm_name: &str,
        season_id: &str,
        round: u32,
    ) -> Result<LeaderBoard> {
        let season = self.league.seasons.get(season_id)?;
        let realm = self.realms.get(realm_name)?;
        if round == 0 {
            return Err(LeagueError::validation("round must be at least 1", "round"));
        }
        if round > season.max_rounds {
            return Err(LeagueError::validation(
                format!("season '{}' has only {} rounds", season.id, season.max_rounds),
                "round",
            ));
        }

        let snapshot = match self
            .standings
            .get_standings_by_round(&season.id, round)
            .await
        {
            Ok(standings) => Some(standings),
            Err(e) if e.is_not_found() && round == 1 => None,
            Err(e) => return Err(e),
        };
        let last_updated = snapshot.as_ref().map(|s| s.last_updated());

        let entries = self
            .entries
            .select_approved_entries_by_realm(&season.id, &realm.name)
            .await?;
        let scores = self
            .scored
            .select_round_scores(&season.id, &realm.name, round)
            .await?;

        let rankings = if scores.is_empty() && round == 1 {
            empty_rankings(&entries)
        } else {
            let mut current = aggregate(&entries, &scores, round);
            if round > 1 {
                let previous = aggregate(&entries, &scores, round - 1);
                apply_movement(&mut current, &previous);
            }
            current
        };

        Ok(LeaderBoard {
            realm_name: realm.name.clone(),
            season_id: season.id.clone(),
            round_number: round,
            rankings,
            last_updated,
        })
    }
}
