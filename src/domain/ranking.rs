//! Ranking comparison and scoring
//!
//! A prediction and a standings table are both ordered sequences of team IDs.
//! Each team's hit is the absolute distance between its predicted and actual
//! position; a round score starts at [`BASE_SCORE`] and the hits are deducted
//! by a chain of [`ScoreModifier`]s.

use crate::error::{LeagueError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Points every round score starts from
pub const BASE_SCORE: i32 = 100;

/// Per-team figures reported alongside a standings position
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StandingsMeta {
    pub played_games: u32,
    pub points: i32,
    pub goals_for: i32,
    pub goals_against: i32,
    pub goal_difference: i32,
}

/// Standings position with its table figures
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankingWithMeta {
    pub id: String,
    pub position: usize,
    pub meta: StandingsMeta,
}

/// Predicted position with the hit scored against actual standings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankingWithScore {
    pub id: String,
    pub position: usize,
    pub score: i32,
}

/// Record of what a modifier contributed to a round score
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModifierSummary {
    pub code: String,
    pub score: i32,
}

/// Working state passed along the modifier chain
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScoringResult {
    pub rankings: Vec<RankingWithScore>,
    pub score: i32,
    pub modifiers: Vec<ModifierSummary>,
}

/// One step of the scoring chain
pub trait ScoreModifier: Send + Sync {
    fn code(&self) -> &'static str;

    /// Adjust the running score; returns the contribution to record
    fn apply(&self, result: &ScoringResult) -> Result<i32>;
}

/// Seeds the score with [`BASE_SCORE`]
pub struct BaseScore;

impl ScoreModifier for BaseScore {
    fn code(&self) -> &'static str {
        "BASE_SCORE"
    }

    fn apply(&self, _result: &ScoringResult) -> Result<i32> {
        Ok(BASE_SCORE)
    }
}

/// Deducts the sum of positional hits
pub struct RankingsHit;

impl ScoreModifier for RankingsHit {
    fn code(&self) -> &'static str {
        "RANKINGS_HIT"
    }

    fn apply(&self, result: &ScoringResult) -> Result<i32> {
        Ok(-result.rankings.iter().map(|r| r.score).sum::<i32>())
    }
}

/// Fails when an ID appears more than once in `ids`
fn reject_duplicates(ids: &[&str], label: &str) -> Result<()> {
    let mut seen = HashSet::with_capacity(ids.len());
    match ids.iter().find(|id| !seen.insert(**id)) {
        Some(id) => Err(LeagueError::MismatchedRankings(format!(
            "duplicate team '{}' in {}",
            id, label
        ))),
        None => Ok(()),
    }
}

/// 1-based position of each ID in an ordered sequence
fn positions_of<'a>(ids: &[&'a str]) -> HashMap<&'a str, usize> {
    ids.iter().enumerate().map(|(idx, id)| (*id, idx + 1)).collect()
}

/// Per-team hits for `prediction` measured against `actual`, in predicted order
pub fn calculate_ranking_scores(
    prediction: &[String],
    actual: &[String],
) -> Result<Vec<RankingWithScore>> {
    if prediction.len() != actual.len() {
        return Err(LeagueError::MismatchedRankings(format!(
            "prediction has {} teams, standings have {}",
            prediction.len(),
            actual.len()
        )));
    }

    let predicted: Vec<&str> = prediction.iter().map(String::as_str).collect();
    let actual: Vec<&str> = actual.iter().map(String::as_str).collect();
    reject_duplicates(&predicted, "prediction")?;
    reject_duplicates(&actual, "standings")?;
    let actual_positions = positions_of(&actual);

    predicted
        .iter()
        .enumerate()
        .map(|(idx, id)| {
            let actual_pos = actual_positions.get(id).ok_or_else(|| {
                LeagueError::MismatchedRankings(format!("team '{}' missing from standings", id))
            })?;
            let position = idx + 1;
            Ok(RankingWithScore {
                id: id.to_string(),
                position,
                score: (position as i32 - *actual_pos as i32).abs(),
            })
        })
        .collect()
}

/// Sum of hits between two rankings
pub fn total_hit(prediction: &[String], actual: &[String]) -> Result<i32> {
    Ok(calculate_ranking_scores(prediction, actual)?
        .iter()
        .map(|r| r.score)
        .sum())
}

/// Score a prediction with the default chain
pub fn score_prediction(prediction: &[String], actual: &[String]) -> Result<ScoringResult> {
    score_with_modifiers(prediction, actual, &[&BaseScore, &RankingsHit])
}

/// Score a prediction through an explicit modifier chain
pub fn score_with_modifiers(
    prediction: &[String],
    actual: &[String],
    modifiers: &[&dyn ScoreModifier],
) -> Result<ScoringResult> {
    let mut result = ScoringResult {
        rankings: calculate_ranking_scores(prediction, actual)?,
        ..Default::default()
    };

    for modifier in modifiers {
        let contribution = modifier.apply(&result)?;
        result.score += contribution;
        result.modifiers.push(ModifierSummary {
            code: modifier.code().to_string(),
            score: contribution,
        });
    }

    Ok(result)
}

/// Reject sequences that are not a permutation of `team_ids`
pub fn validate_team_set(rankings: &[String], team_ids: &[String]) -> Result<()> {
    if rankings.len() != team_ids.len() {
        return Err(LeagueError::validation(
            format!(
                "rankings must contain exactly {} teams, got {}",
                team_ids.len(),
                rankings.len()
            ),
            "rankings",
        ));
    }

    let allowed: HashSet<&str> = team_ids.iter().map(String::as_str).collect();
    let mut seen = HashSet::with_capacity(rankings.len());
    for id in rankings {
        if !allowed.contains(id.as_str()) {
            return Err(LeagueError::validation(
                format!("team '{}' is not part of this season", id),
                "rankings",
            ));
        }
        if !seen.insert(id.as_str()) {
            return Err(LeagueError::validation(
                format!("team '{}' appears more than once", id),
                "rankings",
            ));
        }
    }

    Ok(())
}
