//! Standings ingestion
//!
//! One run pulls the latest table for a season, stores it as the snapshot for
//! its round, scores every active prediction against it and, when a round is
//! finalised, notifies entrants. Every write is an upsert, so a run that dies
//! halfway is simply repeated by the next tick.
//!
//! A newly observed round is never stored while the round before it is still
//! open: that run finalises the previous round instead, and the new round is
//! picked up on the following tick.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

use super::communications::CommunicationsAgent;
use super::fan_out::{fan_out, DEFAULT_FAN_OUT_LIMIT};
use crate::adapters::FootballDataSource;
use crate::coordination::{Job, ShutdownToken};
use crate::domain::{Clock, EntryPrediction, LeagueData, ScoredEntryPrediction, Season, Standings};
use crate::error::{LeagueError, Result};
use crate::persistence::{
    EntryPredictionRepository, ScoredEntryPredictionRepository, StandingsRepository,
};

/// How a run ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    /// Another run for the same season holds the lock
    AlreadyRunning,
    /// Outside the season's live frame
    NotLive,
    /// No approved entry has a prediction in force
    NoPredictions,
    /// The final round is already finalised; nothing left to do
    SeasonComplete,
    Processed {
        round_number: u32,
        finalised: bool,
        final_round: bool,
        scored: usize,
        notified: usize,
    },
}

impl fmt::Display for IngestOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IngestOutcome::AlreadyRunning => write!(f, "already running"),
            IngestOutcome::NotLive => write!(f, "season not live"),
            IngestOutcome::NoPredictions => write!(f, "no predictions"),
            IngestOutcome::SeasonComplete => write!(f, "season complete"),
            IngestOutcome::Processed {
                round_number,
                finalised,
                final_round,
                scored,
                notified,
            } => write!(
                f,
                "round {} processed (finalised={}, final_round={}, scored={}, notified={})",
                round_number, finalised, final_round, scored, notified
            ),
        }
    }
}

pub struct StandingsIngestor {
    league: Arc<LeagueData>,
    source: Arc<dyn FootballDataSource>,
    standings: Arc<dyn StandingsRepository>,
    predictions: Arc<dyn EntryPredictionRepository>,
    scored: Arc<dyn ScoredEntryPredictionRepository>,
    comms: Arc<CommunicationsAgent>,
    clock: Arc<dyn Clock>,
    season_locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl StandingsIngestor {
    pub fn new(
        league: Arc<LeagueData>,
        source: Arc<dyn FootballDataSource>,
        standings: Arc<dyn StandingsRepository>,
        predictions: Arc<dyn EntryPredictionRepository>,
        scored: Arc<dyn ScoredEntryPredictionRepository>,
        comms: Arc<CommunicationsAgent>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            league,
            source,
            standings,
            predictions,
            scored,
            comms,
            clock,
            season_locks: Mutex::new(HashMap::new()),
        }
    }

    fn season_lock(&self, season_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.season_locks.lock().unwrap_or_else(|e| e.into_inner());
        Arc::clone(locks.entry(season_id.to_string()).or_default())
    }

    /// One ingestion pass for `season_id`
    pub async fn ingest(&self, season_id: &str) -> Result<IngestOutcome> {
        let lock = self.season_lock(season_id);
        let Ok(_guard) = lock.try_lock() else {
            return Ok(IngestOutcome::AlreadyRunning);
        };

        let now = self.clock.now();
        let season = self.league.seasons.get(season_id)?;

        if !season.is_live_at(now) {
            return Ok(IngestOutcome::NotLive);
        }

        let predictions = self
            .predictions
            .select_active_predictions(&season.id, now)
            .await?;
        if predictions.is_empty() {
            return Ok(IngestOutcome::NoPredictions);
        }

        let mut latest = self.source.retrieve_latest(season).await?;
        latest.validate_and_sort(&self.league.teams)?;

        let mut candidate = Standings::new(&season.id, latest.round_number, latest.rankings, now);
        if season.is_completed_by(&candidate) && candidate.round_number != season.max_rounds {
            debug!(
                upstream_round = candidate.round_number,
                max_rounds = season.max_rounds,
                "Clamping completed season to final round"
            );
            candidate.round_number = season.max_rounds;
        }

        let (mut standings, mut finalised_now) = self.upsert_standings(candidate, now).await?;
        let final_round = season.is_completed_by(&standings);

        if final_round && standings.finalised && !finalised_now {
            return Ok(IngestOutcome::SeasonComplete);
        }

        let scored = self.score_predictions(&predictions, &standings, now).await?;

        if final_round && !standings.finalised {
            standings.finalised = true;
            standings.updated_at = Some(now);
            self.standings.update_standings(&standings).await?;
            finalised_now = true;
        }

        let notified = if finalised_now {
            // Runs on its own task so an aborted tick cannot drop notices
            // for a round that is already finalised
            tokio::spawn(notify_round_complete(
                Arc::clone(&self.comms),
                scored.clone(),
                standings.clone(),
                final_round,
            ))
            .await
            .map_err(|e| LeagueError::Internal(format!("round complete notices: {}", e)))?
        } else {
            0
        };

        Ok(IngestOutcome::Processed {
            round_number: standings.round_number,
            finalised: finalised_now,
            final_round,
            scored: scored.len(),
            notified,
        })
    }

    /// Store the snapshot for its round; returns the snapshot to score and
    /// whether this call finalised it
    async fn upsert_standings(
        &self,
        candidate: Standings,
        now: DateTime<Utc>,
    ) -> Result<(Standings, bool)> {
        match self
            .standings
            .get_standings_by_round(&candidate.season_id, candidate.round_number)
            .await
        {
            Ok(existing) if existing.finalised => return Ok((existing, false)),
            Ok(mut existing) => {
                existing.rankings = candidate.rankings;
                existing.updated_at = Some(now);
                self.standings.update_standings(&existing).await?;
                return Ok((existing, false));
            }
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e),
        }

        if candidate.round_number > 1 {
            match self
                .standings
                .get_latest_standings_before(&candidate.season_id, candidate.round_number)
                .await
            {
                Ok(mut previous) if !previous.finalised => {
                    info!(
                        round = previous.round_number,
                        observed = candidate.round_number,
                        "Finalising previous round before storing the next"
                    );
                    previous.finalised = true;
                    previous.updated_at = Some(now);
                    self.standings.update_standings(&previous).await?;
                    return Ok((previous, true));
                }
                Ok(_) => {}
                Err(e) if e.is_not_found() => {}
                Err(e) => return Err(e),
            }
        }

        self.standings.insert_standings(&candidate).await?;
        info!(round = candidate.round_number, "Stored new standings");
        Ok((candidate, false))
    }

    async fn score_predictions(
        &self,
        predictions: &[EntryPrediction],
        standings: &Standings,
        now: DateTime<Utc>,
    ) -> Result<Vec<ScoredEntryPrediction>> {
        let mut scored = Vec::with_capacity(predictions.len());
        for prediction in predictions {
            let sep = match ScoredEntryPrediction::generate(prediction, standings, now) {
                Ok(sep) => sep,
                Err(e @ LeagueError::MismatchedRankings(_)) => {
                    warn!(prediction_id = %prediction.id, error = %e, "Skipping unscorable prediction");
                    continue;
                }
                Err(e) => return Err(e),
            };
            self.scored.upsert_scored(&sep).await?;
            scored.push(sep);
        }
        Ok(scored)
    }
}

/// Queue one email per scored prediction; failures are logged, not returned
async fn notify_round_complete(
    comms: Arc<CommunicationsAgent>,
    scored: Vec<ScoredEntryPrediction>,
    standings: Standings,
    final_round: bool,
) -> usize {
    let total = scored.len();
    let comms = &comms;
    let target = &standings;
    let errors = fan_out(scored, DEFAULT_FAN_OUT_LIMIT, move |sep| async move {
        comms
            .issue_round_complete_email(&sep, target, final_round)
            .await
    })
    .await;

    for err in &errors.errors {
        warn!(round = standings.round_number, error = %err, "Round complete notification failed");
    }
    total - errors.len()
}

/// Scheduled wrapper running the ingestor for one season
pub struct RetrieveLatestStandingsJob {
    name: String,
    season_id: String,
    ingestor: Arc<StandingsIngestor>,
}

impl RetrieveLatestStandingsJob {
    pub fn new(season: &Season, ingestor: Arc<StandingsIngestor>) -> Self {
        Self {
            name: format!("retrieve-latest-standings-{}", season.id),
            season_id: season.id.clone(),
            ingestor,
        }
    }
}

#[async_trait]
impl Job for RetrieveLatestStandingsJob {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, _token: ShutdownToken) -> Result<()> {
        let outcome = self.ingestor.ingest(&self.season_id).await?;
        info!(season = %self.season_id, %outcome, "Standings ingestion finished");
        Ok(())
    }
}
