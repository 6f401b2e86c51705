//! Repository contracts
//!
//! Services only ever see these traits. Two backends implement them:
//! - [`MemoryStore`] keeps everything in process (local runs and tests)
//! - [`crate::adapters::PostgresStore`] persists to PostgreSQL via sqlx
//!
//! Every write is idempotent under re-run so the scheduled workers can
//! abort midway and simply try again on the next tick.

pub mod memory;

pub use memory::MemoryStore;

use crate::domain::{
    Entry, EntryPrediction, RoundScore, ScoredEntryPrediction, Standings, Token, TokenType,
};
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

#[async_trait]
pub trait EntryRepository: Send + Sync {
    async fn insert_entry(&self, entry: &Entry) -> Result<()>;

    async fn get_entry(&self, id: Uuid) -> Result<Entry>;

    /// Approved entries across every realm playing the season
    async fn select_approved_entries(&self, season_id: &str) -> Result<Vec<Entry>>;

    async fn select_approved_entries_by_realm(
        &self,
        season_id: &str,
        realm_name: &str,
    ) -> Result<Vec<Entry>>;
}

#[async_trait]
pub trait EntryPredictionRepository: Send + Sync {
    async fn insert_prediction(&self, prediction: &EntryPrediction) -> Result<()>;

    async fn get_prediction(&self, id: Uuid) -> Result<EntryPrediction>;

    /// Latest prediction as of `ts` for every approved entry in the season
    async fn select_active_predictions(
        &self,
        season_id: &str,
        ts: DateTime<Utc>,
    ) -> Result<Vec<EntryPrediction>>;
}

#[async_trait]
pub trait StandingsRepository: Send + Sync {
    /// Fails with `Conflict` when the (season, round) pair is already taken
    async fn insert_standings(&self, standings: &Standings) -> Result<()>;

    async fn update_standings(&self, standings: &Standings) -> Result<()>;

    async fn get_standings(&self, id: Uuid) -> Result<Standings>;

    async fn get_standings_by_round(&self, season_id: &str, round_number: u32)
        -> Result<Standings>;

    /// Snapshot with the greatest round strictly below `round_number`
    async fn get_latest_standings_before(
        &self,
        season_id: &str,
        round_number: u32,
    ) -> Result<Standings>;
}

#[async_trait]
pub trait ScoredEntryPredictionRepository: Send + Sync {
    /// Insert, or overwrite rankings and score of the existing row with the same key
    async fn upsert_scored(&self, scored: &ScoredEntryPrediction) -> Result<()>;

    async fn get_scored(
        &self,
        entry_prediction_id: Uuid,
        standings_id: Uuid,
    ) -> Result<ScoredEntryPrediction>;

    async fn select_scored_by_standings(
        &self,
        standings_id: Uuid,
    ) -> Result<Vec<ScoredEntryPrediction>>;

    /// Scores of approved realm entries against snapshots up to `round_number`
    async fn select_round_scores(
        &self,
        season_id: &str,
        realm_name: &str,
        round_number: u32,
    ) -> Result<Vec<RoundScore>>;
}

#[async_trait]
pub trait TokenRepository: Send + Sync {
    /// Fails with `Conflict` on an ID collision
    async fn insert_token(&self, token: &Token) -> Result<()>;

    async fn get_token(&self, id: &str) -> Result<Token>;

    async fn delete_token(&self, id: &str) -> Result<()>;

    async fn delete_tokens_expired_as_of(&self, ts: DateTime<Utc>) -> Result<u64>;

    /// Remove unexpired tokens of `token_type` issued for `value`
    async fn delete_tokens_in_flight(
        &self,
        token_type: TokenType,
        value: &str,
        ts: DateTime<Utc>,
    ) -> Result<u64>;
}

/// Backend reachability, reported by the health endpoint
#[async_trait]
pub trait HealthCheck: Send + Sync {
    async fn is_reachable(&self) -> bool;
}

/// Every repository the application needs, behind one handle
pub trait Repositories:
    EntryRepository
    + EntryPredictionRepository
    + StandingsRepository
    + ScoredEntryPredictionRepository
    + TokenRepository
    + HealthCheck
{
}

impl<T> Repositories for T where
    T: EntryRepository
        + EntryPredictionRepository
        + StandingsRepository
        + ScoredEntryPredictionRepository
        + TokenRepository
        + HealthCheck
{
}
