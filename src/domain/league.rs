//! Static teams and seasons known to the process

use super::season::{Season, SeasonCollection};
use super::team::{Team, TeamCollection};
use crate::error::Result;
use serde::Deserialize;
use std::path::Path;
use tracing::info;

#[derive(Debug, Deserialize)]
struct LeagueFile {
    teams: Vec<Team>,
    seasons: Vec<Season>,
}

/// Read-only reference data loaded once at startup
#[derive(Debug, Clone, Default)]
pub struct LeagueData {
    pub teams: TeamCollection,
    pub seasons: SeasonCollection,
}

impl LeagueData {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let data = Self::parse(&raw)?;
        info!(
            path = %path.as_ref().display(),
            teams = data.teams.len(),
            seasons = data.seasons.len(),
            "Loaded league data"
        );
        Ok(data)
    }

    pub fn parse(raw: &str) -> Result<Self> {
        let file: LeagueFile = toml::from_str(raw)?;
        Self::new(file.teams, file.seasons)
    }

    pub fn new(teams: Vec<Team>, seasons: Vec<Season>) -> Result<Self> {
        let teams = TeamCollection::new(teams)?;
        for season in &seasons {
            season.validate(&teams)?;
        }
        Ok(Self {
            teams,
            seasons: SeasonCollection::new(seasons),
        })
    }
}
