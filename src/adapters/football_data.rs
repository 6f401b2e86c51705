//! football-data.org v2 client
//!
//! Only the standings endpoint is used. Upstream team IDs are never trusted
//! as-is; each is mapped onto the configured team set by its client ID.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument};

use super::traits::FootballDataSource;
use crate::domain::{LatestStandings, RankingWithMeta, Season, StandingsMeta, TeamCollection};
use crate::error::{LeagueError, Result};

pub const DEFAULT_BASE_URL: &str = "https://api.football-data.org";

const AUTH_HEADER: &str = "X-Auth-Token";
const TOTAL_STANDINGS: &str = "TOTAL";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StandingsResponse {
    season: SeasonInfo,
    #[serde(default)]
    standings: Vec<StandingsGroup>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SeasonInfo {
    current_matchday: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct StandingsGroup {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    table: Vec<TableRow>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TableRow {
    position: usize,
    team: TeamRef,
    played_games: u32,
    points: i32,
    goals_for: i32,
    goals_against: i32,
    goal_difference: i32,
}

#[derive(Debug, Deserialize)]
struct TeamRef {
    id: i64,
}

/// HTTP client for the football-data.org API
pub struct FootballDataClient {
    http: Client,
    base_url: String,
    api_token: String,
    teams: Arc<TeamCollection>,
}

impl FootballDataClient {
    pub fn new(
        base_url: impl Into<String>,
        api_token: impl Into<String>,
        teams: Arc<TeamCollection>,
    ) -> Result<Self> {
        let http = Client::builder()
            .user_agent("prediction-league/0.1")
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| LeagueError::Internal(format!("failed to build football-data client: {}", e)))?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_token: api_token.into(),
            teams,
        })
    }

    fn standings_url(&self, competition_id: &str, year: i32) -> String {
        format!(
            "{}/v2/competitions/{}/standings?season={}",
            self.base_url, competition_id, year
        )
    }
}

#[async_trait]
impl FootballDataSource for FootballDataClient {
    #[instrument(skip(self, season), fields(season = %season.id))]
    async fn retrieve_latest(&self, season: &Season) -> Result<LatestStandings> {
        let competition_id = season.client_id.as_deref().ok_or_else(|| {
            LeagueError::validation(
                format!("season '{}' has no upstream competition id", season.id),
                "client_id",
            )
        })?;
        let url = self.standings_url(competition_id, season.upstream_year());
        debug!(%url, "requesting standings");

        let resp = self
            .http
            .get(&url)
            .header(AUTH_HEADER, &self.api_token)
            .send()
            .await?;

        let status = resp.status();
        let text = resp.text().await?;

        if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
            return Err(LeagueError::Transient(format!(
                "football-data responded {} for {}",
                status, url
            )));
        }
        if status == StatusCode::FORBIDDEN || status == StatusCode::UNAUTHORIZED {
            return Err(LeagueError::Unauthorized(format!(
                "football-data rejected token: status={}",
                status
            )));
        }
        if !status.is_success() {
            return Err(LeagueError::Internal(format!(
                "football-data GET {} failed: status={} body={}",
                url, status, text
            )));
        }

        parse_standings(&text, &self.teams)
    }
}

/// Map a raw standings payload onto local team IDs
fn parse_standings(raw: &str, teams: &TeamCollection) -> Result<LatestStandings> {
    let resp: StandingsResponse = serde_json::from_str(raw)?;

    let group = resp
        .standings
        .into_iter()
        .find(|g| g.kind == TOTAL_STANDINGS)
        .ok_or_else(|| LeagueError::NotFound("no TOTAL standings in upstream response".into()))?;

    let rankings = group
        .table
        .into_iter()
        .map(|row| {
            let team = teams.get_by_client_id(row.team.id)?;
            Ok(RankingWithMeta {
                id: team.id.clone(),
                position: row.position,
                meta: StandingsMeta {
                    played_games: row.played_games,
                    points: row.points,
                    goals_for: row.goals_for,
                    goals_against: row.goals_against,
                    goal_difference: row.goal_difference,
                },
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(LatestStandings {
        round_number: resp.season.current_matchday.unwrap_or(1).max(1),
        rankings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Team;

    fn teams() -> TeamCollection {
        TeamCollection::new(vec![
            Team {
                id: "ARS".into(),
                name: "Arsenal".into(),
                short_name: None,
                client_id: 57,
            },
            Team {
                id: "CHE".into(),
                name: "Chelsea".into(),
                short_name: None,
                client_id: 61,
            },
        ])
        .unwrap()
    }

    fn row(position: usize, id: i64, played: u32) -> String {
        format!(
            r#"{{"position":{},"team":{{"id":{},"name":"x"}},"playedGames":{},"won":0,"draw":0,"lost":0,"points":{},"goalsFor":3,"goalsAgainst":1,"goalDifference":2}}"#,
            position, id, played, 10 - position
        )
    }

    fn payload(matchday: u32, rows: &[String]) -> String {
        format!(
            r#"{{"season":{{"id":1,"startDate":"2020-09-12","currentMatchday":{}}},"standings":[
                {{"stage":"REGULAR_SEASON","type":"HOME","table":[]}},
                {{"stage":"REGULAR_SEASON","type":"TOTAL","table":[{}]}}
            ]}}"#,
            matchday,
            rows.join(",")
        )
    }

    #[test]
    fn test_parse_total_standings() {
        let raw = payload(4, &[row(1, 61, 4), row(2, 57, 4)]);
        let latest = parse_standings(&raw, &teams()).unwrap();

        assert_eq!(latest.round_number, 4);
        assert_eq!(latest.rankings.len(), 2);
        assert_eq!(latest.rankings[0].id, "CHE");
        assert_eq!(latest.rankings[1].id, "ARS");
        assert_eq!(latest.rankings[1].meta.played_games, 4);
        assert_eq!(latest.rankings[1].meta.goal_difference, 2);
    }

    #[test]
    fn test_unknown_upstream_team_rejected() {
        let raw = payload(1, &[row(1, 61, 1), row(2, 999, 1)]);
        assert!(matches!(
            parse_standings(&raw, &teams()),
            Err(LeagueError::UnknownTeam(_))
        ));
    }

    #[test]
    fn test_missing_total_group() {
        let raw = r#"{"season":{"currentMatchday":2},"standings":[{"type":"AWAY","table":[]}]}"#;
        assert!(parse_standings(raw, &teams()).unwrap_err().is_not_found());
    }

    #[test]
    fn test_url_shape() {
        let client =
            FootballDataClient::new("https://api.example.org/", "t0k3n", Arc::new(teams())).unwrap();
        assert_eq!(
            client.standings_url("2021", 2020),
            "https://api.example.org/v2/competitions/2021/standings?season=2020"
        );
    }
}
