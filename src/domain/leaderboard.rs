//! Leaderboard aggregation over per-round scores

use super::entry::Entry;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;
use uuid::Uuid;

/// A scored prediction reduced to what the leaderboard needs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundScore {
    pub entry_id: Uuid,
    pub round_number: u32,
    pub score: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderBoardRanking {
    pub entry_id: Uuid,
    pub nickname: String,
    pub position: usize,
    /// Places gained since the previous round
    pub movement: i32,
    pub current_round_score: i32,
    pub max_round_score: i32,
    pub total_score: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderBoard {
    pub realm_name: String,
    pub season_id: String,
    pub round_number: u32,
    pub rankings: Vec<LeaderBoardRanking>,
    pub last_updated: Option<DateTime<Utc>>,
}

/// Approved entries by nickname with every score at zero
pub fn empty_rankings(entries: &[Entry]) -> Vec<LeaderBoardRanking> {
    let mut approved: Vec<&Entry> = entries.iter().filter(|e| e.is_approved()).collect();
    approved.sort_by(|a, b| a.entrant_nickname.cmp(&b.entrant_nickname));

    approved
        .into_iter()
        .enumerate()
        .map(|(idx, entry)| LeaderBoardRanking {
            entry_id: entry.id,
            nickname: entry.entrant_nickname.clone(),
            position: idx + 1,
            movement: 0,
            current_round_score: 0,
            max_round_score: 0,
            total_score: 0,
        })
        .collect()
}

/// Cumulative rankings up to and including `round`
///
/// For each entry and round only the most recently created score counts.
/// Scores for entries that are not approved are ignored.
pub fn aggregate(entries: &[Entry], scores: &[RoundScore], round: u32) -> Vec<LeaderBoardRanking> {
    let approved: HashMap<Uuid, &Entry> = entries
        .iter()
        .filter(|e| e.is_approved())
        .map(|e| (e.id, e))
        .collect();

    let mut latest: HashMap<(Uuid, u32), &RoundScore> = HashMap::new();
    for score in scores
        .iter()
        .filter(|s| s.round_number <= round && approved.contains_key(&s.entry_id))
    {
        latest
            .entry((score.entry_id, score.round_number))
            .and_modify(|current| {
                if score.created_at > current.created_at {
                    *current = score;
                }
            })
            .or_insert(score);
    }

    let mut per_entry: HashMap<Uuid, Vec<&RoundScore>> = HashMap::new();
    for ((entry_id, _), score) in latest {
        per_entry.entry(entry_id).or_default().push(score);
    }

    let mut rankings: Vec<LeaderBoardRanking> = per_entry
        .into_iter()
        .filter_map(|(entry_id, rounds)| {
            let entry = approved.get(&entry_id)?;
            Some(LeaderBoardRanking {
                entry_id,
                nickname: entry.entrant_nickname.clone(),
                position: 0,
                movement: 0,
                current_round_score: rounds
                    .iter()
                    .find(|s| s.round_number == round)
                    .map(|s| s.score)
                    .unwrap_or(0),
                max_round_score: rounds.iter().map(|s| s.score).max().unwrap_or(0),
                total_score: rounds.iter().map(|s| s.score).sum(),
            })
        })
        .collect();

    rankings.sort_by(compare_rankings);
    for (idx, ranking) in rankings.iter_mut().enumerate() {
        ranking.position = idx + 1;
    }
    rankings
}

/// Highest total first, then best round, then this round; nickname for stability
fn compare_rankings(a: &LeaderBoardRanking, b: &LeaderBoardRanking) -> Ordering {
    b.total_score
        .cmp(&a.total_score)
        .then(b.max_round_score.cmp(&a.max_round_score))
        .then(b.current_round_score.cmp(&a.current_round_score))
        .then_with(|| a.nickname.cmp(&b.nickname))
}

/// Fill `movement` from the positions held in the previous round
pub fn apply_movement(current: &mut [LeaderBoardRanking], previous: &[LeaderBoardRanking]) {
    let before: HashMap<Uuid, usize> = previous.iter().map(|r| (r.entry_id, r.position)).collect();
    for ranking in current.iter_mut() {
        ranking.movement = before
            .get(&ranking.entry_id)
            .map(|prev| *prev as i32 - ranking.position as i32)
            .unwrap_or(0);
    }
}
