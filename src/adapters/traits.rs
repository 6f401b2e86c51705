use async_trait::async_trait;

use crate::domain::{Email, LatestStandings, Season};
use crate::error::Result;

/// Upstream source of live league tables
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FootballDataSource: Send + Sync {
    /// Current table for `season`, with team IDs already mapped onto the local team set
    async fn retrieve_latest(&self, season: &Season) -> Result<LatestStandings>;
}

/// Outbound email delivery
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EmailClient: Send + Sync {
    /// Succeeds only once the provider has accepted the message for delivery
    async fn send(&self, email: &Email) -> Result<()>;
}
