//! Shared builders for service tests

use chrono::{DateTime, TimeZone, Utc};
use futures::StreamExt;
use std::sync::Arc;
use uuid::Uuid;

use super::communications::CommunicationsAgent;
use super::email_queue::EmailQueue;
use crate::domain::{
    Email, Entry, EntryFee, EntryPrediction, EntryStatus, LatestStandings, LeagueData, Realm,
    RealmCollection, RealmContact, RankingWithMeta, StandingsMeta,
};
use crate::persistence::{EntryPredictionRepository, EntryRepository, MemoryStore};

pub const SEASON: &str = "S";
pub const REALM: &str = "localhost";

pub const LEAGUE: &str = r#"
[[teams]]
id = "AFC"
name = "Arsenal"
client_id = 57

[[teams]]
id = "CFC"
name = "Chelsea"
client_id = 61

[[teams]]
id = "LFC"
name = "Liverpool"
client_id = 64

[[seasons]]
id = "S"
name = "Test League"
client_id = "PL"
team_ids = ["AFC", "CFC", "LFC"]
max_rounds = 3
entries_accepted = { from = "2020-07-01T00:00:00Z", until = "2020-09-12T08:00:00Z" }
predictions_accepted = { from = "2020-07-01T00:00:00Z", until = "2021-05-23T00:00:00Z" }
live = { from = "2020-09-12T08:00:00Z", until = "2021-05-23T00:00:00Z" }
prediction_windows = [
    { from = "2020-07-01T00:00:00Z", until = "2020-09-12T08:00:00Z" },
    { from = "2020-10-01T08:00:00Z", until = "2020-10-08T08:00:00Z" },
]
"#;

pub fn ts(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
}

pub fn league() -> Arc<LeagueData> {
    Arc::new(LeagueData::parse(LEAGUE).unwrap())
}

pub fn realms() -> Arc<RealmCollection> {
    Arc::new(RealmCollection::new([Realm {
        name: REALM.into(),
        origin: "http://localhost:3000".into(),
        season_id: SEASON.into(),
        pin: String::new(),
        contact: RealmContact {
            name: "Prediction League".into(),
            email_proper: "hello@example.com".into(),
            email_do_not_reply: "noreply@example.com".into(),
            sender_domain: "mg.example.com".into(),
        },
        entry_fee: EntryFee::default(),
    }]))
}

pub fn comms(store: &Arc<MemoryStore>, queue: &Arc<EmailQueue>) -> Arc<CommunicationsAgent> {
    Arc::new(CommunicationsAgent::new(
        queue.clone(),
        league(),
        realms(),
        store.clone(),
        store.clone(),
        chrono_tz::Europe::London,
    ))
}

/// Approved entry with one prediction made at `at`
pub async fn seed_entry(
    store: &MemoryStore,
    nickname: &str,
    rankings: &[&str],
    at: DateTime<Utc>,
) -> (Entry, EntryPrediction) {
    let entry = Entry {
        id: Uuid::new_v4(),
        short_code: nickname.to_uppercase(),
        season_id: SEASON.into(),
        realm_name: REALM.into(),
        entrant_name: nickname.into(),
        entrant_nickname: nickname.into(),
        entrant_email: format!("{}@example.com", nickname),
        status: EntryStatus::Ready,
        payment_method: None,
        payment_ref: None,
        approved_at: Some(at),
        created_at: at,
        updated_at: None,
    };
    store.insert_entry(&entry).await.unwrap();

    let prediction = EntryPrediction {
        id: Uuid::new_v4(),
        entry_id: entry.id,
        rankings: rankings.iter().map(|s| s.to_string()).collect(),
        created_at: at,
    };
    store.insert_prediction(&prediction).await.unwrap();
    (entry, prediction)
}

/// Upstream table in the given order, every team having played `played` games
pub fn latest(round_number: u32, order: &[&str], played: u32) -> LatestStandings {
    LatestStandings {
        round_number,
        rankings: order
            .iter()
            .enumerate()
            .map(|(i, id)| RankingWithMeta {
                id: id.to_string(),
                position: i + 1,
                meta: StandingsMeta {
                    played_games: played,
                    ..StandingsMeta::default()
                },
            })
            .collect(),
    }
}

/// Close the queue and collect everything it buffered
pub async fn drain(queue: &EmailQueue) -> Vec<Email> {
    let stream = queue.stream().unwrap();
    queue.close();
    stream.collect().await
}
