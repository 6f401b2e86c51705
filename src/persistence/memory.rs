//! In-process repository backend

use super::{
    EntryPredictionRepository, EntryRepository, HealthCheck, ScoredEntryPredictionRepository,
    StandingsRepository, TokenRepository,
};
use crate::domain::{
    latest_as_of, Entry, EntryPrediction, RoundScore, ScoredEntryPrediction, Standings, Token,
    TokenType,
};
use crate::error::{LeagueError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Repository backend holding every table in memory
#[derive(Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<Uuid, Entry>>,
    predictions: RwLock<HashMap<Uuid, EntryPrediction>>,
    standings: RwLock<HashMap<Uuid, Standings>>,
    scored: RwLock<HashMap<(Uuid, Uuid), ScoredEntryPrediction>>,
    tokens: RwLock<HashMap<String, Token>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// All snapshots for a season ordered by round
    pub async fn standings_for_season(&self, season_id: &str) -> Vec<Standings> {
        let mut all: Vec<Standings> = self
            .standings
            .read()
            .await
            .values()
            .filter(|s| s.season_id == season_id)
            .cloned()
            .collect();
        all.sort_by_key(|s| s.round_number);
        all
    }

    /// Every scored prediction held
    pub async fn all_scored(&self) -> Vec<ScoredEntryPrediction> {
        self.scored.read().await.values().cloned().collect()
    }

    pub async fn token_count(&self) -> usize {
        self.tokens.read().await.len()
    }
}

#[async_trait]
impl HealthCheck for MemoryStore {
    async fn is_reachable(&self) -> bool {
        true
    }
}

#[async_trait]
impl EntryRepository for MemoryStore {
    async fn insert_entry(&self, entry: &Entry) -> Result<()> {
        let mut entries = self.entries.write().await;
        if entries.contains_key(&entry.id) {
            return Err(LeagueError::Conflict(format!("entry {}", entry.id)));
        }
        entries.insert(entry.id, entry.clone());
        Ok(())
    }

    async fn get_entry(&self, id: Uuid) -> Result<Entry> {
        self.entries
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| LeagueError::NotFound(format!("entry {}", id)))
    }

    async fn select_approved_entries(&self, season_id: &str) -> Result<Vec<Entry>> {
        let mut entries: Vec<Entry> = self
            .entries
            .read()
            .await
            .values()
            .filter(|e| e.season_id == season_id && e.is_approved())
            .cloned()
            .collect();
        entries.sort_by_key(|e| e.created_at);
        Ok(entries)
    }

    async fn select_approved_entries_by_realm(
        &self,
        season_id: &str,
        realm_name: &str,
    ) -> Result<Vec<Entry>> {
        Ok(self
            .select_approved_entries(season_id)
            .await?
            .into_iter()
            .filter(|e| e.realm_name == realm_name)
            .collect())
    }
}

#[async_trait]
impl EntryPredictionRepository for MemoryStore {
    async fn insert_prediction(&self, prediction: &EntryPrediction) -> Result<()> {
        if !self.entries.read().await.contains_key(&prediction.entry_id) {
            return Err(LeagueError::NotFound(format!("entry {}", prediction.entry_id)));
        }
        let mut predictions = self.predictions.write().await;
        if predictions.contains_key(&prediction.id) {
            return Err(LeagueError::Conflict(format!("prediction {}", prediction.id)));
        }
        predictions.insert(prediction.id, prediction.clone());
        Ok(())
    }

    async fn get_prediction(&self, id: Uuid) -> Result<EntryPrediction> {
        self.predictions
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| LeagueError::NotFound(format!("prediction {}", id)))
    }

    async fn select_active_predictions(
        &self,
        season_id: &str,
        ts: DateTime<Utc>,
    ) -> Result<Vec<EntryPrediction>> {
        let entries = self.select_approved_entries(season_id).await?;
        let predictions = self.predictions.read().await;

        Ok(entries
            .iter()
            .filter_map(|entry| {
                latest_as_of(predictions.values().filter(|p| p.entry_id == entry.id), ts)
            })
            .cloned()
            .collect())
    }
}

#[async_trait]
impl StandingsRepository for MemoryStore {
    async fn insert_standings(&self, standings: &Standings) -> Result<()> {
        let mut all = self.standings.write().await;
        if all.values().any(|s| {
            s.id == standings.id
                || (s.season_id == standings.season_id && s.round_number == standings.round_number)
        }) {
            return Err(LeagueError::Conflict(format!(
                "standings for season {} round {}",
                standings.season_id, standings.round_number
            )));
        }
        all.insert(standings.id, standings.clone());
        Ok(())
    }

    async fn update_standings(&self, standings: &Standings) -> Result<()> {
        let mut all = self.standings.write().await;
        if all.values().any(|s| {
            s.id != standings.id
                && s.season_id == standings.season_id
                && s.round_number == standings.round_number
        }) {
            return Err(LeagueError::Conflict(format!(
                "standings for season {} round {}",
                standings.season_id, standings.round_number
            )));
        }
        match all.get_mut(&standings.id) {
            Some(existing) => {
                *existing = standings.clone();
                Ok(())
            }
            None => Err(LeagueError::NotFound(format!("standings {}", standings.id))),
        }
    }

    async fn get_standings(&self, id: Uuid) -> Result<Standings> {
        self.standings
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| LeagueError::NotFound(format!("standings {}", id)))
    }

    async fn get_standings_by_round(
        &self,
        season_id: &str,
        round_number: u32,
    ) -> Result<Standings> {
        self.standings
            .read()
            .await
            .values()
            .find(|s| s.season_id == season_id && s.round_number == round_number)
            .cloned()
            .ok_or_else(|| {
                LeagueError::NotFound(format!(
                    "standings for season {} round {}",
                    season_id, round_number
                ))
            })
    }

    async fn get_latest_standings_before(
        &self,
        season_id: &str,
        round_number: u32,
    ) -> Result<Standings> {
        self.standings
            .read()
            .await
            .values()
            .filter(|s| s.season_id == season_id && s.round_number < round_number)
            .max_by_key(|s| s.round_number)
            .cloned()
            .ok_or_else(|| {
                LeagueError::NotFound(format!(
                    "standings for season {} before round {}",
                    season_id, round_number
                ))
            })
    }
}

#[async_trait]
impl ScoredEntryPredictionRepository for MemoryStore {
    async fn upsert_scored(&self, scored: &ScoredEntryPrediction) -> Result<()> {
        let key = (scored.entry_prediction_id, scored.standings_id);
        let mut all = self.scored.write().await;
        match all.get_mut(&key) {
            Some(existing) => {
                existing.rankings = scored.rankings.clone();
                existing.score = scored.score;
                existing.modifiers = scored.modifiers.clone();
                existing.updated_at = Some(scored.created_at);
            }
            None => {
                all.insert(key, scored.clone());
            }
        }
        Ok(())
    }

    async fn get_scored(
        &self,
        entry_prediction_id: Uuid,
        standings_id: Uuid,
    ) -> Result<ScoredEntryPrediction> {
        self.scored
            .read()
            .await
            .get(&(entry_prediction_id, standings_id))
            .cloned()
            .ok_or_else(|| {
                LeagueError::NotFound(format!(
                    "scored prediction {}/{}",
                    entry_prediction_id, standings_id
                ))
            })
    }

    async fn select_scored_by_standings(
        &self,
        standings_id: Uuid,
    ) -> Result<Vec<ScoredEntryPrediction>> {
        Ok(self
            .scored
            .read()
            .await
            .values()
            .filter(|s| s.standings_id == standings_id)
            .cloned()
            .collect())
    }

    async fn select_round_scores(
        &self,
        season_id: &str,
        realm_name: &str,
        round_number: u32,
    ) -> Result<Vec<RoundScore>> {
        let entries = self
            .select_approved_entries_by_realm(season_id, realm_name)
            .await?;
        let predictions = self.predictions.read().await;
        let standings = self.standings.read().await;
        let scored = self.scored.read().await;

        let mut scores = Vec::new();
        for sep in scored.values() {
            let Some(prediction) = predictions.get(&sep.entry_prediction_id) else {
                continue;
            };
            let Some(snapshot) = standings.get(&sep.standings_id) else {
                continue;
            };
            if snapshot.season_id != season_id || snapshot.round_number > round_number {
                continue;
            }
            if entries.iter().any(|e| e.id == prediction.entry_id) {
                scores.push(RoundScore {
                    entry_id: prediction.entry_id,
                    round_number: snapshot.round_number,
                    score: sep.score,
                    created_at: sep.created_at,
                });
            }
        }
        Ok(scores)
    }
}

#[async_trait]
impl TokenRepository for MemoryStore {
    async fn insert_token(&self, token: &Token) -> Result<()> {
        let mut tokens = self.tokens.write().await;
        if tokens.contains_key(&token.id) {
            return Err(LeagueError::Conflict(format!("token {}", token.id)));
        }
        tokens.insert(token.id.clone(), token.clone());
        Ok(())
    }

    async fn get_token(&self, id: &str) -> Result<Token> {
        self.tokens
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| LeagueError::NotFound(format!("token {}", id)))
    }

    async fn delete_token(&self, id: &str) -> Result<()> {
        self.tokens.write().await.remove(id);
        Ok(())
    }

    async fn delete_tokens_expired_as_of(&self, ts: DateTime<Utc>) -> Result<u64> {
        let mut tokens = self.tokens.write().await;
        let before = tokens.len();
        tokens.retain(|_, t| !t.is_expired_at(ts));
        Ok((before - tokens.len()) as u64)
    }

    async fn delete_tokens_in_flight(
        &self,
        token_type: TokenType,
        value: &str,
        ts: DateTime<Utc>,
    ) -> Result<u64> {
        let mut tokens = self.tokens.write().await;
        let before = tokens.len();
        tokens.retain(|_, t| !(t.token_type == token_type && t.value == value && !t.is_expired_at(ts)));
        Ok((before - tokens.len()) as u64)
    }
}
