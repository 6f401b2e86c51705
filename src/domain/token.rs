use chrono::{DateTime, Duration, Utc};
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const TOKEN_ID_LENGTH: usize = 36;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TokenType {
    Auth,
    MagicLogin,
    Prediction,
}

impl TokenType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenType::Auth => "auth",
            TokenType::MagicLogin => "magic-login",
            TokenType::Prediction => "prediction",
        }
    }

    /// Fixed lifetime of a freshly issued token
    pub fn validity(&self) -> Duration {
        match self {
            TokenType::Auth => Duration::minutes(60),
            TokenType::MagicLogin => Duration::minutes(60),
            TokenType::Prediction => Duration::minutes(10),
        }
    }
}

impl fmt::Display for TokenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for TokenType {
    type Err = &'static str;

    fn from_str(raw: &str) -> std::result::Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "auth" => Ok(Self::Auth),
            "magic-login" => Ok(Self::MagicLogin),
            "prediction" => Ok(Self::Prediction),
            _ => Err("invalid token type; expected auth|magic-login|prediction"),
        }
    }
}

/// Short-lived opaque credential bound to an entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub id: String,
    pub token_type: TokenType,
    pub value: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Token {
    pub fn new(token_type: TokenType, value: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: generate_token_id(),
            token_type,
            value: value.into(),
            issued_at: now,
            expires_at: now + token_type.validity(),
        }
    }

    pub fn is_expired_at(&self, ts: DateTime<Utc>) -> bool {
        self.expires_at <= ts
    }
}

/// Random alphanumeric token identifier
pub fn generate_token_id() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(TOKEN_ID_LENGTH)
        .map(char::from)
        .collect()
}
