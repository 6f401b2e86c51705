use crate::error::{LeagueError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use url::Url;

/// Sender identity and addresses for a realm's outbound mail
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RealmContact {
    pub name: String,
    pub email_proper: String,
    pub email_do_not_reply: String,
    pub sender_domain: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryFee {
    /// Amount in minor units
    #[serde(default)]
    pub amount: u32,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub breakdown: Vec<String>,
}

/// A deployment tenant bound to one season
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Realm {
    pub name: String,
    pub origin: String,
    pub season_id: String,
    #[serde(default)]
    pub pin: String,
    pub contact: RealmContact,
    #[serde(default)]
    pub entry_fee: EntryFee,
}

impl Realm {
    fn link(&self, path: &str) -> Result<String> {
        let base = Url::parse(&self.origin).map_err(|e| {
            LeagueError::validation(format!("realm '{}' origin: {}", self.name, e), "origin")
        })?;
        base.join(path)
            .map(String::from)
            .map_err(|e| LeagueError::Internal(format!("cannot build {} link: {}", path, e)))
    }

    pub fn leaderboard_url(&self) -> Result<String> {
        self.link("/leaderboard")
    }

    pub fn prediction_url(&self) -> Result<String> {
        self.link("/prediction")
    }
}

/// Immutable set of configured realms
#[derive(Debug, Clone, Default)]
pub struct RealmCollection {
    realms: HashMap<String, Realm>,
}

impl RealmCollection {
    pub fn new(realms: impl IntoIterator<Item = Realm>) -> Self {
        Self {
            realms: realms.into_iter().map(|r| (r.name.clone(), r)).collect(),
        }
    }

    pub fn get(&self, name: &str) -> Result<&Realm> {
        self.realms
            .get(name)
            .ok_or_else(|| LeagueError::NotFound(format!("realm '{}'", name)))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Realm> {
        self.realms.values()
    }

    /// Distinct season IDs served by at least one realm, sorted
    pub fn season_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.realms.values().map(|r| r.season_id.clone()).collect();
        ids.sort();
        ids.dedup();
        ids
    }
}
