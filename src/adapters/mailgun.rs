use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, instrument};

use super::traits::EmailClient;
use crate::domain::Email;
use crate::error::{LeagueError, Result};

pub const DEFAULT_BASE_URL: &str = "https://api.eu.mailgun.net/v3";

const QUEUED_MESSAGE: &str = "Queued. Thank you.";

#[derive(Debug, Deserialize)]
struct SendResponse {
    #[serde(default)]
    id: String,
    #[serde(default)]
    message: String,
}

/// Mailgun messages API client
pub struct MailgunClient {
    http: Client,
    base_url: String,
    api_key: String,
}

impl MailgunClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Result<Self> {
        let http = Client::builder()
            .user_agent("prediction-league/0.1")
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| LeagueError::Internal(format!("failed to build mailgun client: {}", e)))?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        })
    }
}

#[async_trait]
impl EmailClient for MailgunClient {
    #[instrument(skip(self, email), fields(to = %email.to.address, subject = %email.subject))]
    async fn send(&self, email: &Email) -> Result<()> {
        let url = format!("{}/{}/messages", self.base_url, email.sender_domain);
        let form = [
            ("from", email.from.mailbox()),
            ("to", email.to.mailbox()),
            ("h:Reply-To", email.reply_to.mailbox()),
            ("subject", email.subject.clone()),
            ("text", email.plain_text.clone()),
            ("o:tracking", "no".to_string()),
        ];

        let resp = self
            .http
            .post(&url)
            .basic_auth("api", Some(&self.api_key))
            .form(&form)
            .send()
            .await?;

        let status = resp.status();
        let text = resp.text().await?;

        if status.is_server_error() {
            return Err(LeagueError::Transient(format!(
                "mailgun responded {}: {}",
                status, text
            )));
        }
        if !status.is_success() {
            return Err(LeagueError::Internal(format!(
                "mailgun POST {} failed: status={} body={}",
                url, status, text
            )));
        }

        let id = check_queued(&text)?;
        debug!(message_id = %id, "email queued");
        Ok(())
    }
}

/// Message ID when the provider reports the message queued
fn check_queued(raw: &str) -> Result<String> {
    let resp: SendResponse = serde_json::from_str(raw)?;
    if resp.message != QUEUED_MESSAGE {
        return Err(LeagueError::Internal(format!(
            "mailgun did not queue message: {}",
            resp.message
        )));
    }
    if resp.id.is_empty() {
        return Err(LeagueError::Internal(
            "mailgun queued message without an id".into(),
        ));
    }
    Ok(resp.id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queued_response_accepted() {
        let raw = r#"{"id":"<20200912.1@mg.example.com>","message":"Queued. Thank you."}"#;
        assert_eq!(check_queued(raw).unwrap(), "<20200912.1@mg.example.com>");
    }

    #[test]
    fn test_unqueued_or_anonymous_rejected() {
        assert!(check_queued(r#"{"id":"abc","message":"Forbidden"}"#).is_err());
        assert!(check_queued(r#"{"id":"","message":"Queued. Thank you."}"#).is_err());
        assert!(check_queued(r#"{"message":"Queued. Thank you."}"#).is_err());
        assert!(check_queued("not json").is_err());
    }
}
