//! Assembly site: turns an [`AppConfig`] into agents, jobs and workers

use chrono_tz::Tz;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

use crate::adapters::{EmailClient, FootballDataClient, MailgunClient, PostgresStore};
use crate::config::AppConfig;
use crate::coordination::{CronSpec, Scheduler};
use crate::domain::{
    parse_timestamp_override, Clock, FrozenClock, LeagueData, RealClock, RealmCollection,
    WindowNotice,
};
use crate::error::{LeagueError, Result};
use crate::persistence::{EntryRepository, HealthCheck, MemoryStore, Repositories};
use crate::services::{
    CommunicationsAgent, EmailQueue, EmailQueueWorker, HttpServer, HttpState, LeaderBoardAgent,
    PredictionWindowJob, RetrieveLatestStandingsJob, StandingsIngestor, TokenAgent,
    TokenReaperJob,
};
use crate::supervisor::Service;

fn invalid(reasons: Vec<String>) -> LeagueError {
    LeagueError::Validation {
        fields: vec!["config".to_string(); reasons.len()],
        reasons,
    }
}

/// Everything a running process needs, wired once at startup
pub struct App {
    pub config: AppConfig,
    pub league: Arc<LeagueData>,
    pub realms: Arc<RealmCollection>,
    pub tz: Tz,
    pub clock: Arc<dyn Clock>,
    pub queue: Arc<EmailQueue>,
    pub comms: Arc<CommunicationsAgent>,
    pub leaderboard: Arc<LeaderBoardAgent>,
    pub tokens: Arc<TokenAgent>,
    /// Absent when no football-data token is configured
    pub ingestor: Option<Arc<StandingsIngestor>>,
    entries: Arc<dyn EntryRepository>,
    health: Arc<dyn HealthCheck>,
}

impl App {
    /// Validate `config`, load league data, open the store and wire everything
    pub async fn build(config: AppConfig, ts_override: Option<&str>) -> Result<Self> {
        config.validate().map_err(invalid)?;
        let tz = config.service.tz().map_err(|e| invalid(vec![e]))?;

        let league = LeagueData::load(Path::new(&config.service.league_data))?;
        config.validate_against(&league).map_err(invalid)?;

        let clock: Arc<dyn Clock> = match ts_override {
            Some(raw) => {
                let at = parse_timestamp_override(raw, tz)?;
                warn!(%at, "Clock frozen by timestamp override");
                Arc::new(FrozenClock::new(at))
            }
            None => Arc::new(RealClock),
        };

        if config.database.is_memory() {
            info!("Using in-process store");
            Self::assemble(config, league, Arc::new(MemoryStore::new()), clock)
        } else {
            let store =
                PostgresStore::new(&config.database.url, config.database.max_connections).await?;
            store.migrate(&config.database.migrations_url).await?;
            Self::assemble(config, league, Arc::new(store), clock)
        }
    }

    /// Wire agents over an already opened store
    pub fn assemble<R>(
        config: AppConfig,
        league: LeagueData,
        store: Arc<R>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self>
    where
        R: Repositories + 'static,
    {
        let tz = config.service.tz().map_err(|e| invalid(vec![e]))?;
        let league = Arc::new(league);
        let realms = Arc::new(config.realm_collection());
        let queue = Arc::new(EmailQueue::new(config.email.queue_capacity));

        let comms = Arc::new(CommunicationsAgent::new(
            queue.clone(),
            league.clone(),
            realms.clone(),
            store.clone(),
            store.clone(),
            tz,
        ));

        let leaderboard = Arc::new(LeaderBoardAgent::new(
            league.clone(),
            realms.clone(),
            store.clone(),
            store.clone(),
            store.clone(),
        ));

        let tokens = Arc::new(TokenAgent::new(store.clone(), clock.clone()));

        let ingestor = match &config.football_data.api_token {
            Some(token) if !token.is_empty() => {
                let source = FootballDataClient::new(
                    &config.football_data.base_url,
                    token,
                    Arc::new(league.teams.clone()),
                )?;
                Some(Arc::new(StandingsIngestor::new(
                    league.clone(),
                    Arc::new(source),
                    store.clone(),
                    store.clone(),
                    store.clone(),
                    comms.clone(),
                    clock.clone(),
                )))
            }
            _ => {
                warn!("No football-data token configured; standings retrieval disabled");
                None
            }
        };

        Ok(Self {
            config,
            league,
            realms,
            tz,
            clock,
            queue,
            comms,
            leaderboard,
            tokens,
            ingestor,
            entries: store.clone(),
            health: store,
        })
    }

    /// Mailgun client when a key is configured
    pub fn email_client(&self) -> Result<Option<Arc<dyn EmailClient>>> {
        match &self.config.email.mailgun_api_key {
            Some(key) if !key.is_empty() => {
                let client = MailgunClient::new(&self.config.email.mailgun_base_url, key)?;
                Ok(Some(Arc::new(client)))
            }
            _ => {
                warn!("No mailgun key configured; outbound email goes to the log");
                Ok(None)
            }
        }
    }

    /// Register every scheduled job
    pub fn scheduler(&self) -> Result<Scheduler> {
        let schedule = &self.config.schedule;
        let mut scheduler = Scheduler::new(self.tz, schedule.job_timeout());

        for season_id in self.realms.season_ids() {
            let season = self.league.seasons.get(&season_id)?;

            if let Some(ingestor) = &self.ingestor {
                scheduler.register(
                    CronSpec::parse(&schedule.standings)?,
                    Arc::new(RetrieveLatestStandingsJob::new(season, ingestor.clone())),
                );
            }

            for (spec, notice) in [
                (&schedule.window_open, WindowNotice::Open),
                (&schedule.window_closing, WindowNotice::Closing),
            ] {
                scheduler.register(
                    CronSpec::parse(spec)?,
                    Arc::new(PredictionWindowJob::new(
                        &season.id,
                        notice,
                        self.league.clone(),
                        self.entries.clone(),
                        self.comms.clone(),
                        self.clock.clone(),
                    )),
                );
            }
        }

        scheduler.register(
            CronSpec::parse(&schedule.token_reaper)?,
            Arc::new(TokenReaperJob::new(self.tokens.clone())),
        );

        Ok(scheduler)
    }

    /// The supervised process: scheduler, email worker and HTTP server
    pub fn service(&self) -> Result<Service> {
        let scheduler = self.scheduler()?;
        info!(jobs = ?scheduler.job_names(), "Scheduler ready");

        let email_worker = EmailQueueWorker::new(self.queue.clone(), self.email_client()?);
        let http = HttpServer::new(
            Arc::new(HttpState::new(self.health.clone(), self.leaderboard.clone())),
            self.config.service.port,
        );

        Ok(Service::new("prediction-league", self.config.service.grace_period())
            .with_worker(Arc::new(scheduler))
            .with_worker(Arc::new(email_worker))
            .with_worker(Arc::new(http)))
    }
}
