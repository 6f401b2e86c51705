use super::entry::EntryPrediction;
use super::ranking::{score_prediction, ModifierSummary, RankingWithScore};
use super::standings::Standings;
use super::team::TeamCollection;
use crate::error::{LeagueError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

const TOTAL_SCORE_LABEL: &str = "TOTAL SCORE";

/// A prediction scored against one standings snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoredEntryPrediction {
    pub entry_prediction_id: Uuid,
    pub standings_id: Uuid,
    pub rankings: Vec<RankingWithScore>,
    pub score: i32,
    pub modifiers: Vec<ModifierSummary>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl ScoredEntryPrediction {
    pub fn generate(
        prediction: &EntryPrediction,
        standings: &Standings,
        now: DateTime<Utc>,
    ) -> Result<Self> {
        let result = score_prediction(&prediction.rankings, &standings.team_ids())?;
        Ok(Self {
            entry_prediction_id: prediction.id,
            standings_id: standings.id,
            rankings: result.rankings,
            score: result.score,
            modifiers: result.modifiers,
            created_at: now,
            updated_at: None,
        })
    }
}

/// Fixed-width table of predicted position, team, hit and actual position
pub fn rankings_table(
    scored: &ScoredEntryPrediction,
    standings: &Standings,
    teams: &TeamCollection,
) -> Result<Vec<String>> {
    if scored.rankings.is_empty() {
        return Err(LeagueError::NotFound("scored prediction has no rankings".into()));
    }
    if standings.rankings.is_empty() {
        return Err(LeagueError::NotFound("standings have no rankings".into()));
    }

    let mut rows = Vec::with_capacity(scored.rankings.len());
    for r in &scored.rankings {
        let team = teams
            .get(&r.id)
            .ok_or_else(|| LeagueError::UnknownTeam(r.id.clone()))?;
        let actual = standings.position_of(&r.id).ok_or_else(|| {
            LeagueError::MismatchedRankings(format!("team '{}' missing from standings", r.id))
        })?;
        rows.push((r.position.to_string(), team.display_name(), r.score, actual.to_string()));
    }

    let name_width = rows
        .iter()
        .map(|(_, name, _, _)| name.len())
        .chain(std::iter::once(TOTAL_SCORE_LABEL.len()))
        .max()
        .unwrap_or(TOTAL_SCORE_LABEL.len());

    let mut lines: Vec<String> = rows
        .into_iter()
        .map(|(pos, name, score, actual)| {
            format!(
                "{:>4} {:<width$} {:>8} {:>4}",
                pos,
                name,
                score,
                actual,
                width = name_width
            )
        })
        .collect();

    lines.push(format!(
        "{:>4} {:<width$} {:>8}",
        "",
        TOTAL_SCORE_LABEL,
        scored.score,
        width = name_width
    ));

    Ok(lines)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ranking::{RankingWithMeta, StandingsMeta};
    use crate::domain::team::Team;

    fn standings(order: &[&str]) -> Standings {
        Standings::new(
            "S",
            1,
            order
                .iter()
                .enumerate()
                .map(|(i, id)| RankingWithMeta {
                    id: id.to_string(),
                    position: i + 1,
                    meta: StandingsMeta::default(),
                })
                .collect(),
            Utc::now(),
        )
    }

    fn prediction(order: &[&str]) -> EntryPrediction {
        EntryPrediction {
            id: Uuid::new_v4(),
            entry_id: Uuid::new_v4(),
            rankings: order.iter().map(|s| s.to_string()).collect(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_generate_keys_and_score() {
        let p = prediction(&["A", "B", "C"]);
        let s = standings(&["B", "A", "C"]);
        let sep = ScoredEntryPrediction::generate(&p, &s, Utc::now()).unwrap();
        assert_eq!(sep.entry_prediction_id, p.id);
        assert_eq!(sep.standings_id, s.id);
        assert_eq!(sep.score, 98);
    }

    #[test]
    fn test_rankings_table_layout() {
        let teams = TeamCollection::new(vec![
            Team { id: "A".into(), name: "Arsenal".into(), short_name: None, client_id: 1 },
            Team { id: "B".into(), name: "Brentford".into(), short_name: None, client_id: 2 },
        ])
        .unwrap();
        let p = prediction(&["A", "B"]);
        let s = standings(&["B", "A"]);
        let sep = ScoredEntryPrediction::generate(&p, &s, Utc::now()).unwrap();

        let lines = rankings_table(&sep, &s, &teams).unwrap();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "   1 Arsenal            1    2");
        assert!(lines[2].contains("TOTAL SCORE"));
        assert!(lines[2].ends_with("98"));
    }
}
