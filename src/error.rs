use std::fmt;
use thiserror::Error;

/// Main error type for the prediction league
#[derive(Error, Debug)]
pub enum LeagueError {
    // Domain errors
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Validation failed: {}", reasons.join(", "))]
    Validation {
        reasons: Vec<String>,
        fields: Vec<String>,
    },

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Mismatched rankings: {0}")]
    MismatchedRankings(String),

    #[error("Unknown team: {0}")]
    UnknownTeam(String),

    #[error("Transient failure: {0}")]
    Transient(String),

    #[error("{0}")]
    Multi(MultiError),

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("League data error: {0}")]
    LeagueData(#[from] toml::de::Error),

    // Database errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    // Network errors
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    // Serialization errors
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Generic errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl LeagueError {
    /// Single-reason validation failure
    pub fn validation(reason: impl Into<String>, field: impl Into<String>) -> Self {
        LeagueError::Validation {
            reasons: vec![reason.into()],
            fields: vec![field.into()],
        }
    }

    /// Whether the next scheduled run is expected to succeed without intervention
    pub fn is_transient(&self) -> bool {
        match self {
            LeagueError::Transient(_) | LeagueError::Http(_) | LeagueError::Io(_) => true,
            LeagueError::Database(e) => !matches!(e, sqlx::Error::Database(_)),
            _ => false,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, LeagueError::NotFound(_))
    }

    /// Flatten into individual errors, expanding a `Multi` into its members
    pub fn flatten(self) -> Vec<LeagueError> {
        match self {
            LeagueError::Multi(multi) => multi.errors,
            other => vec![other],
        }
    }
}

/// Result type alias for LeagueError
pub type Result<T> = std::result::Result<T, LeagueError>;

/// Errors accumulated from a fan-out of independent operations
#[derive(Debug, Default)]
pub struct MultiError {
    pub errors: Vec<LeagueError>,
}

impl MultiError {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, err: LeagueError) {
        match err {
            LeagueError::Multi(inner) => self.errors.extend(inner.errors),
            other => self.errors.push(other),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// `Ok(())` when nothing was collected
    pub fn into_result(self) -> Result<()> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(LeagueError::Multi(self))
        }
    }
}

impl fmt::Display for MultiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} error(s): ", self.errors.len())?;
        for (i, err) in self.errors.iter().enumerate() {
            if i > 0 {
                write!(f, "; ")?;
            }
            write!(f, "{}", err)?;
        }
        Ok(())
    }
}

impl From<MultiError> for LeagueError {
    fn from(err: MultiError) -> Self {
        LeagueError::Multi(err)
    }
}
