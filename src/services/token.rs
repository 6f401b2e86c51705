//! Short-lived token issue, lookup and expiry

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::coordination::{Job, ShutdownToken};
use crate::domain::{Clock, Token, TokenType};
use crate::error::{LeagueError, Result};
use crate::persistence::TokenRepository;

/// Fresh IDs drawn before giving up on a colliding insert
const MAX_GENERATE_ATTEMPTS: usize = 5;

pub struct TokenAgent {
    tokens: Arc<dyn TokenRepository>,
    clock: Arc<dyn Clock>,
}

impl TokenAgent {
    pub fn new(tokens: Arc<dyn TokenRepository>, clock: Arc<dyn Clock>) -> Self {
        Self { tokens, clock }
    }

    /// Issue a token of `token_type` for `value`
    pub async fn generate(&self, token_type: TokenType, value: &str) -> Result<Token> {
        for attempt in 1..=MAX_GENERATE_ATTEMPTS {
            let token = Token::new(token_type, value, self.clock.now());
            match self.tokens.insert_token(&token).await {
                Ok(()) => return Ok(token),
                Err(LeagueError::Conflict(_)) => {
                    warn!(attempt, "Token id collision, drawing another");
                }
                Err(e) => return Err(e),
            }
        }
        Err(LeagueError::Conflict(format!(
            "could not draw a unique token id in {} attempts",
            MAX_GENERATE_ATTEMPTS
        )))
    }

    /// Unexpired token by ID; expired tokens read as `NotFound`
    pub async fn retrieve(&self, id: &str) -> Result<Token> {
        let token = self.tokens.get_token(id).await?;
        if token.is_expired_at(self.clock.now()) {
            return Err(LeagueError::NotFound(format!("token '{}'", id)));
        }
        Ok(token)
    }

    pub async fn delete(&self, id: &str) -> Result<()> {
        self.tokens.delete_token(id).await
    }

    pub async fn reap_expired_as_of(&self, ts: DateTime<Utc>) -> Result<u64> {
        self.tokens.delete_tokens_expired_as_of(ts).await
    }

    /// Drop live tokens of `token_type` issued for `value`
    pub async fn delete_in_flight(&self, token_type: TokenType, value: &str) -> Result<u64> {
        self.tokens
            .delete_tokens_in_flight(token_type, value, self.clock.now())
            .await
    }

    /// Whether `id` names a live token of this type issued for `value`
    pub async fn is_valid(&self, token_type: TokenType, value: &str, id: &str) -> Result<bool> {
        match self.retrieve(id).await {
            Ok(token) => Ok(token.token_type == token_type && token.value == value),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Retrieve and consume a token
    pub async fn redeem(&self, id: &str) -> Result<Token> {
        let token = self.retrieve(id).await?;
        self.delete(id).await?;
        debug!(token_type = %token.token_type, "Token redeemed");
        Ok(token)
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }
}

/// Periodic sweep of expired tokens
pub struct TokenReaperJob {
    agent: Arc<TokenAgent>,
}

impl TokenReaperJob {
    pub fn new(agent: Arc<TokenAgent>) -> Self {
        Self { agent }
    }
}

#[async_trait]
impl Job for TokenReaperJob {
    fn name(&self) -> &str {
        "token-reaper"
    }

    async fn run(&self, _token: ShutdownToken) -> Result<()> {
        let removed = self.agent.reap_expired_as_of(self.agent.now()).await?;
        info!(removed, "Expired tokens reaped");
        Ok(())
    }
}
