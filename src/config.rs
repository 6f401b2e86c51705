use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use crate::coordination::cron::CronSpec;
use crate::domain::{LeagueData, Realm, RealmCollection};

/// URL that selects the in-process store instead of PostgreSQL
pub const MEMORY_DATABASE_URL: &str = "memory://";

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub service: ServiceConfig,
    pub database: DatabaseConfig,
    pub admin: AdminConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub football_data: FootballDataConfig,
    #[serde(default)]
    pub email: EmailConfig,
    #[serde(default)]
    pub payments: PaymentsConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub realms: Vec<Realm>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    /// HTTP port for health and leaderboard endpoints
    #[serde(default = "default_port")]
    pub port: u16,
    /// Seconds workers get to halt after shutdown is triggered
    #[serde(default = "default_grace_period")]
    pub grace_period_secs: u64,
    /// IANA zone used for cron specs, email dates and `--ts`
    #[serde(default = "default_timezone")]
    pub timezone: String,
    /// Path to the teams/seasons TOML file
    #[serde(default = "default_league_data")]
    pub league_data: String,
}

fn default_port() -> u16 {
    3000
}

fn default_grace_period() -> u64 {
    5
}

fn default_timezone() -> String {
    "Europe/London".to_string()
}

fn default_league_data() -> String {
    "config/league.toml".to_string()
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            grace_period_secs: default_grace_period(),
            timezone: default_timezone(),
            league_data: default_league_data(),
        }
    }
}

impl ServiceConfig {
    pub fn grace_period(&self) -> Duration {
        Duration::from_secs(self.grace_period_secs)
    }

    pub fn tz(&self) -> Result<chrono_tz::Tz, String> {
        self.timezone
            .parse::<chrono_tz::Tz>()
            .map_err(|e| format!("service.timezone '{}': {}", self.timezone, e))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL, or `memory://`
    #[serde(default)]
    pub url: String,
    /// Maximum connections in pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Directory holding the SQL migrations
    #[serde(default = "default_migrations_url")]
    pub migrations_url: String,
}

fn default_max_connections() -> u32 {
    5
}

fn default_migrations_url() -> String {
    "./migrations".to_string()
}

impl DatabaseConfig {
    pub fn is_memory(&self) -> bool {
        self.url == MEMORY_DATABASE_URL
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AdminConfig {
    /// `user:password`
    #[serde(default)]
    pub basic_auth: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Enable JSON formatted logs
    #[serde(default)]
    pub json: bool,
    /// Write a daily rolling log file here as well as stdout
    #[serde(default)]
    pub directory: Option<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
            directory: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct FootballDataConfig {
    /// Absent disables standings retrieval for every season
    #[serde(default)]
    pub api_token: Option<String>,
    #[serde(default = "default_football_data_url")]
    pub base_url: String,
}

fn default_football_data_url() -> String {
    crate::adapters::football_data::DEFAULT_BASE_URL.to_string()
}

impl Default for FootballDataConfig {
    fn default() -> Self {
        Self {
            api_token: None,
            base_url: default_football_data_url(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmailConfig {
    /// Absent routes outbound mail to the log
    #[serde(default)]
    pub mailgun_api_key: Option<String>,
    #[serde(default = "default_mailgun_url")]
    pub mailgun_base_url: String,
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

fn default_mailgun_url() -> String {
    crate::adapters::mailgun::DEFAULT_BASE_URL.to_string()
}

fn default_queue_capacity() -> usize {
    100
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            mailgun_api_key: None,
            mailgun_base_url: default_mailgun_url(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct PaymentsConfig {
    #[serde(default)]
    pub paypal_client_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleConfig {
    #[serde(default = "default_window_open")]
    pub window_open: String,
    #[serde(default = "default_window_closing")]
    pub window_closing: String,
    #[serde(default = "default_standings")]
    pub standings: String,
    #[serde(default = "default_token_reaper")]
    pub token_reaper: String,
    /// Wall-clock budget for a single job tick
    #[serde(default = "default_job_timeout")]
    pub job_timeout_secs: u64,
}

fn default_window_open() -> String {
    "34 12 * * *".to_string()
}

fn default_window_closing() -> String {
    "48 16 * * *".to_string()
}

fn default_standings() -> String {
    "@every 15m".to_string()
}

fn default_token_reaper() -> String {
    "@every 1h".to_string()
}

fn default_job_timeout() -> u64 {
    5
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            window_open: default_window_open(),
            window_closing: default_window_closing(),
            standings: default_standings(),
            token_reaper: default_token_reaper(),
            job_timeout_secs: default_job_timeout(),
        }
    }
}

impl ScheduleConfig {
    pub fn job_timeout(&self) -> Duration {
        Duration::from_secs(self.job_timeout_secs)
    }

    fn specs(&self) -> [(&'static str, &str); 4] {
        [
            ("schedule.window_open", &self.window_open),
            ("schedule.window_closing", &self.window_closing),
            ("schedule.standings", &self.standings),
            ("schedule.token_reaper", &self.token_reaper),
        ]
    }
}

impl AppConfig {
    /// Load configuration from files and environment
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from("config")
    }

    /// Load configuration from a specific directory
    pub fn load_from<P: AsRef<Path>>(config_dir: P) -> Result<Self, ConfigError> {
        let config_dir = config_dir.as_ref();

        let builder = Config::builder()
            // Start with default values
            .set_default("logging.level", "info")?
            .set_default("logging.json", false)?
            .set_default("database.max_connections", 5)?
            .set_default("service.port", 3000)?
            // Load default config file
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            // Load environment-specific config (e.g., config/production.toml)
            .add_source(
                File::from(config_dir.join(
                    std::env::var("LEAGUE_ENV").unwrap_or_else(|_| "development".to_string()),
                ))
                .required(false),
            )
            // Override with environment variables (LEAGUE_DATABASE__URL, etc.)
            .add_source(
                Environment::with_prefix("LEAGUE")
                    .separator("__")
                    .try_parsing(true),
            );

        builder.build()?.try_deserialize()
    }

    /// Parse configuration from a TOML string, with no file or env lookups
    pub fn from_toml(raw: &str) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(File::from_str(raw, config::FileFormat::Toml))
            .build()?
            .try_deserialize()
    }

    pub fn realm_collection(&self) -> RealmCollection {
        RealmCollection::new(self.realms.iter().cloned())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.database.url.trim().is_empty() {
            errors.push("database.url is required".to_string());
        }

        if self.admin.basic_auth.split_once(':').map_or(true, |(u, p)| u.is_empty() || p.is_empty()) {
            errors.push("admin.basic_auth must be in the form user:password".to_string());
        }

        if let Err(e) = self.service.tz() {
            errors.push(e);
        }

        for (key, spec) in self.schedule.specs() {
            if let Err(e) = CronSpec::parse(spec) {
                errors.push(format!("{}: {}", key, e));
            }
        }

        if self.schedule.job_timeout_secs == 0 {
            errors.push("schedule.job_timeout_secs must be positive".to_string());
        }

        if self.email.queue_capacity == 0 {
            errors.push("email.queue_capacity must be positive".to_string());
        }

        let mut names = HashSet::new();
        for realm in &self.realms {
            if !names.insert(realm.name.as_str()) {
                errors.push(format!("realm '{}' is defined more than once", realm.name));
            }
            if url::Url::parse(&realm.origin).is_err() {
                errors.push(format!("realm '{}' has an invalid origin '{}'", realm.name, realm.origin));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Check realm seasons against the loaded league data
    pub fn validate_against(&self, league: &LeagueData) -> Result<(), Vec<String>> {
        let errors: Vec<String> = self
            .realms
            .iter()
            .filter(|r| league.seasons.get(&r.season_id).is_err())
            .map(|r| format!("realm '{}' references unknown season '{}'", r.name, r.season_id))
            .collect();

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
