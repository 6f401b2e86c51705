use crate::error::{LeagueError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A football club
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    /// Short code, e.g. "AFC"
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub short_name: Option<String>,
    /// Identifier used by the upstream football data provider
    pub client_id: i64,
}

impl Team {
    pub fn display_name(&self) -> &str {
        self.short_name.as_deref().unwrap_or(&self.name)
    }
}

/// Immutable set of known teams
#[derive(Debug, Clone, Default)]
pub struct TeamCollection {
    by_id: HashMap<String, Team>,
    by_client_id: HashMap<i64, String>,
}

impl TeamCollection {
    pub fn new(teams: impl IntoIterator<Item = Team>) -> Result<Self> {
        let mut collection = Self::default();
        for team in teams {
            if collection.by_client_id.contains_key(&team.client_id) {
                return Err(LeagueError::validation(
                    format!("duplicate team client id {}", team.client_id),
                    "teams",
                ));
            }
            collection
                .by_client_id
                .insert(team.client_id, team.id.clone());
            if let Some(dup) = collection.by_id.insert(team.id.clone(), team) {
                return Err(LeagueError::validation(
                    format!("duplicate team id {}", dup.id),
                    "teams",
                ));
            }
        }
        Ok(collection)
    }

    pub fn get(&self, id: &str) -> Option<&Team> {
        self.by_id.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.by_id.contains_key(id)
    }

    /// Map an upstream identifier to a team
    pub fn get_by_client_id(&self, client_id: i64) -> Result<&Team> {
        self.by_client_id
            .get(&client_id)
            .and_then(|id| self.by_id.get(id))
            .ok_or_else(|| LeagueError::UnknownTeam(format!("client id {}", client_id)))
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}
