#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Duration, FixedOffset, TimeZone, Utc};
use futures::StreamExt;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use prediction_league::adapters::{EmailClient, FootballDataSource};
use prediction_league::domain::{
    Clock, Email, Entry, EntryFee, EntryPrediction, EntryStatus, LatestStandings, LeagueData,
    RankingWithMeta, Realm, RealmCollection, RealmContact, Season, StandingsMeta, Team, TimeFrame,
};
use prediction_league::persistence::{EntryPredictionRepository, EntryRepository, MemoryStore};
use prediction_league::services::{
    CommunicationsAgent, EmailQueue, LeaderBoardAgent, StandingsIngestor,
};
use prediction_league::{LeagueError, Result};

pub const SEASON: &str = "S";
pub const REALM: &str = "localhost";
pub const MAX_ROUNDS: u32 = 38;

/// Team IDs `A` to `T`
pub fn team_ids() -> Vec<String> {
    (b'A'..=b'T').map(|c| (c as char).to_string()).collect()
}

/// Instant in UK summer time
pub fn bst(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
    FixedOffset::east_opt(3600)
        .unwrap()
        .with_ymd_and_hms(y, mo, d, h, mi, 0)
        .unwrap()
        .with_timezone(&Utc)
}

fn frame(from: DateTime<Utc>, until: DateTime<Utc>) -> TimeFrame {
    TimeFrame::new(from, until)
}

pub fn league() -> Arc<LeagueData> {
    let teams = team_ids()
        .into_iter()
        .enumerate()
        .map(|(i, id)| Team {
            name: format!("Team {}", id),
            short_name: None,
            client_id: 100 + i as i64,
            id,
        })
        .collect();

    let season_end = bst(2021, 5, 23, 23, 59);
    let season = Season {
        id: SEASON.into(),
        name: "Test Premier League".into(),
        client_id: Some("PL".into()),
        team_ids: team_ids(),
        max_rounds: MAX_ROUNDS,
        entries_accepted: frame(bst(2020, 7, 1, 0, 0), bst(2020, 9, 12, 9, 0)),
        predictions_accepted: frame(bst(2020, 7, 1, 0, 0), season_end),
        live: frame(bst(2020, 9, 12, 9, 0), season_end),
        prediction_windows: vec![
            frame(bst(2020, 7, 1, 0, 0), bst(2020, 9, 5, 0, 0)),
            frame(bst(2020, 9, 12, 9, 0), bst(2020, 9, 19, 9, 0)),
            frame(bst(2020, 10, 7, 0, 0), bst(2020, 10, 14, 23, 59)),
        ],
    };

    Arc::new(LeagueData::new(teams, vec![season]).unwrap())
}

pub fn realms() -> Arc<RealmCollection> {
    Arc::new(RealmCollection::new([Realm {
        name: REALM.into(),
        origin: "http://localhost:3000".into(),
        season_id: SEASON.into(),
        pin: "1234".into(),
        contact: RealmContact {
            name: "Prediction League".into(),
            email_proper: "hello@example.com".into(),
            email_do_not_reply: "noreply@example.com".into(),
            sender_domain: "mg.example.com".into(),
        },
        entry_fee: EntryFee::default(),
    }]))
}

/// Clock that tests can move forward
pub struct ManualClock(Mutex<DateTime<Utc>>);

impl ManualClock {
    pub fn new(at: DateTime<Utc>) -> Self {
        Self(Mutex::new(at))
    }

    pub fn set(&self, at: DateTime<Utc>) {
        *self.0.lock().unwrap() = at;
    }

    pub fn advance(&self, by: Duration) {
        *self.0.lock().unwrap() += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.0.lock().unwrap()
    }
}

/// Upstream that replays queued tables, repeating the last one when drained
#[derive(Default)]
pub struct ScriptedSource {
    queued: Mutex<VecDeque<LatestStandings>>,
    last: Mutex<Option<LatestStandings>>,
    calls: Mutex<usize>,
}

impl ScriptedSource {
    pub fn push(&self, table: LatestStandings) {
        self.queued.lock().unwrap().push_back(table);
    }

    pub fn calls(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl FootballDataSource for ScriptedSource {
    async fn retrieve_latest(&self, _season: &Season) -> Result<LatestStandings> {
        *self.calls.lock().unwrap() += 1;
        let next = self.queued.lock().unwrap().pop_front();
        let mut last = self.last.lock().unwrap();
        if let Some(table) = next {
            *last = Some(table);
        }
        last.clone()
            .ok_or_else(|| LeagueError::Transient("no table scripted".into()))
    }
}

/// Email client that keeps every message it is handed
#[derive(Default)]
pub struct RecordingEmailClient {
    pub sent: Mutex<Vec<Email>>,
}

#[async_trait]
impl EmailClient for RecordingEmailClient {
    async fn send(&self, email: &Email) -> Result<()> {
        self.sent.lock().unwrap().push(email.clone());
        Ok(())
    }
}

/// Table in the given order with every team on `played` games
pub fn table(round_number: u32, order: &[String], played: u32) -> LatestStandings {
    LatestStandings {
        round_number,
        rankings: order
            .iter()
            .enumerate()
            .map(|(i, id)| RankingWithMeta {
                id: id.clone(),
                position: i + 1,
                meta: StandingsMeta {
                    played_games: played,
                    ..StandingsMeta::default()
                },
            })
            .collect(),
    }
}

pub async fn add_entry(
    store: &MemoryStore,
    nickname: &str,
    prediction: &[String],
    at: DateTime<Utc>,
) -> Entry {
    let entry = Entry {
        id: Uuid::new_v4(),
        short_code: nickname.to_uppercase(),
        season_id: SEASON.into(),
        realm_name: REALM.into(),
        entrant_name: nickname.into(),
        entrant_nickname: nickname.into(),
        entrant_email: format!("{}@example.com", nickname),
        status: EntryStatus::Ready,
        payment_method: Some("paypal".into()),
        payment_ref: Some(format!("PAY-{}", nickname)),
        approved_at: Some(at),
        created_at: at,
        updated_at: None,
    };
    store.insert_entry(&entry).await.unwrap();

    if !prediction.is_empty() {
        store
            .insert_prediction(&EntryPrediction {
                id: Uuid::new_v4(),
                entry_id: entry.id,
                rankings: prediction.to_vec(),
                created_at: at,
            })
            .await
            .unwrap();
    }
    entry
}

/// Every collaborator a scenario needs, sharing one store and queue
pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub queue: Arc<EmailQueue>,
    pub source: Arc<ScriptedSource>,
    pub clock: Arc<ManualClock>,
    pub league: Arc<LeagueData>,
    pub comms: Arc<CommunicationsAgent>,
    pub ingestor: StandingsIngestor,
    pub leaderboard: LeaderBoardAgent,
}

impl Harness {
    pub fn new(now: DateTime<Utc>) -> Self {
        let store = Arc::new(MemoryStore::new());
        let queue = Arc::new(EmailQueue::new(1000));
        let source = Arc::new(ScriptedSource::default());
        let clock = Arc::new(ManualClock::new(now));
        let league = league();
        let realms = realms();

        let comms = Arc::new(CommunicationsAgent::new(
            queue.clone(),
            league.clone(),
            realms.clone(),
            store.clone(),
            store.clone(),
            chrono_tz::Europe::London,
        ));
        let ingestor = StandingsIngestor::new(
            league.clone(),
            source.clone(),
            store.clone(),
            store.clone(),
            store.clone(),
            comms.clone(),
            clock.clone(),
        );
        let leaderboard = LeaderBoardAgent::new(
            league.clone(),
            realms,
            store.clone(),
            store.clone(),
            store.clone(),
        );

        Self {
            store,
            queue,
            source,
            clock,
            league,
            comms,
            ingestor,
            leaderboard,
        }
    }

    /// Close the queue and return everything buffered so far
    pub async fn drain_emails(&self) -> Vec<Email> {
        let stream = self.queue.stream().unwrap();
        self.queue.close();
        stream.collect().await
    }
}
