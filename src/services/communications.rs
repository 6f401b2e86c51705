//! Builds entrant notifications and hands them to the email queue

use chrono_tz::Tz;
use std::sync::Arc;
use tracing::debug;

use super::email_queue::EmailQueue;
use crate::domain::email::{prediction_window_email, round_complete_email};
use crate::domain::scored::rankings_table;
use crate::domain::{
    Entry, LeagueData, RealmCollection, ScoredEntryPrediction, SequencedTimeFrame, Standings,
    WindowNotice,
};
use crate::error::Result;
use crate::persistence::{EntryPredictionRepository, EntryRepository};

pub struct CommunicationsAgent {
    queue: Arc<EmailQueue>,
    league: Arc<LeagueData>,
    realms: Arc<RealmCollection>,
    entries: Arc<dyn EntryRepository>,
    predictions: Arc<dyn EntryPredictionRepository>,
    tz: Tz,
}

impl CommunicationsAgent {
    pub fn new(
        queue: Arc<EmailQueue>,
        league: Arc<LeagueData>,
        realms: Arc<RealmCollection>,
        entries: Arc<dyn EntryRepository>,
        predictions: Arc<dyn EntryPredictionRepository>,
        tz: Tz,
    ) -> Self {
        Self {
            queue,
            league,
            realms,
            entries,
            predictions,
            tz,
        }
    }

    /// Tell the entrant behind `scored` how their prediction fared in a finished round
    pub async fn issue_round_complete_email(
        &self,
        scored: &ScoredEntryPrediction,
        standings: &Standings,
        final_round: bool,
    ) -> Result<()> {
        let prediction = self
            .predictions
            .get_prediction(scored.entry_prediction_id)
            .await?;
        let entry = self.entries.get_entry(prediction.entry_id).await?;
        let realm = self.realms.get(&entry.realm_name)?;
        let season = self.league.seasons.get(&standings.season_id)?;

        let table = rankings_table(scored, standings, &self.league.teams)?;
        let email = round_complete_email(
            realm,
            &entry,
            &season.name,
            standings.round_number,
            &table,
            final_round,
        )?;

        debug!(entry_id = %entry.id, round = standings.round_number, final_round, "Queueing round complete email");
        self.queue.offer(email).await
    }

    /// Tell an entrant that a prediction window has opened or is about to close
    pub async fn issue_prediction_window_email(
        &self,
        entry: &Entry,
        window: &SequencedTimeFrame,
        notice: WindowNotice,
    ) -> Result<()> {
        let realm = self.realms.get(&entry.realm_name)?;
        let season = self.league.seasons.get(&entry.season_id)?;

        let email = prediction_window_email(realm, entry, &season.name, window, notice, self.tz)?;

        debug!(entry_id = %entry.id, window = window.count, ?notice, "Queueing prediction window email");
        self.queue.offer(email).await
    }
}
