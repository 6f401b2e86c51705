mod common;

use chrono::Duration;
use uuid::Uuid;

use common::*;
use prediction_league::domain::{EntryPrediction, WindowNotice, BASE_SCORE};
use prediction_league::persistence::EntryPredictionRepository;
use prediction_league::services::{IngestOutcome, PredictionWindowJob};
use prediction_league::LeagueError;

fn swapped_first_two() -> Vec<String> {
    let mut order = team_ids();
    order.swap(0, 1);
    order
}

/// One approved entry predicting `A..T`, round 1 ingested against `[B, A, C, ..]`
async fn first_round() -> Harness {
    let h = Harness::new(bst(2020, 10, 1, 12, 0));
    add_entry(&h.store, "harry", &team_ids(), bst(2020, 9, 1, 10, 0)).await;
    h.source.push(table(1, &swapped_first_two(), 1));

    let outcome = h.ingestor.ingest(SEASON).await.unwrap();
    assert!(matches!(
        outcome,
        IngestOutcome::Processed { round_number: 1, finalised: false, scored: 1, .. }
    ));
    h
}

#[tokio::test]
async fn first_round_ingest_scores_without_notifying() {
    let h = first_round().await;

    let snapshots = h.store.standings_for_season(SEASON).await;
    assert_eq!(snapshots.len(), 1);
    assert_eq!(snapshots[0].round_number, 1);
    assert!(!snapshots[0].finalised);

    let scored = h.store.all_scored().await;
    assert_eq!(scored.len(), 1);
    let hits: Vec<i32> = scored[0].rankings.iter().map(|r| r.score).collect();
    assert_eq!(&hits[..3], &[1, 1, 0]);
    assert!(hits[2..].iter().all(|&hit| hit == 0));
    assert_eq!(scored[0].score, BASE_SCORE - 2);
    assert_eq!(scored[0].score, 98);

    assert!(h.drain_emails().await.is_empty());
}

#[tokio::test]
async fn next_round_finalises_previous_before_being_stored() {
    let h = first_round().await;
    h.source.push(table(2, &team_ids(), 2));
    h.clock.advance(Duration::minutes(15));

    let outcome = h.ingestor.ingest(SEASON).await.unwrap();
    assert!(matches!(
        outcome,
        IngestOutcome::Processed { round_number: 1, finalised: true, final_round: false, .. }
    ));

    let snapshots = h.store.standings_for_season(SEASON).await;
    assert_eq!(snapshots.len(), 1);
    assert!(snapshots[0].finalised);
    assert_eq!(h.store.all_scored().await.len(), 1);

    // The finalising tick is the one that notifies
    let emails = h.drain_emails().await;
    assert_eq!(emails.len(), 1);
    assert_eq!(emails[0].subject, "End of Round 1");
    assert_eq!(emails[0].to.address, "harry@example.com");
    assert!(emails[0].plain_text.contains("http://localhost:3000/leaderboard"));
}

#[tokio::test]
async fn following_tick_creates_and_scores_the_new_round() {
    let h = first_round().await;
    h.source.push(table(2, &team_ids(), 2));
    h.ingestor.ingest(SEASON).await.unwrap();

    h.clock.advance(Duration::minutes(30));
    let outcome = h.ingestor.ingest(SEASON).await.unwrap();
    assert!(matches!(
        outcome,
        IngestOutcome::Processed { round_number: 2, finalised: false, notified: 0, .. }
    ));

    let snapshots = h.store.standings_for_season(SEASON).await;
    assert_eq!(snapshots.len(), 2);
    let round_two = snapshots.iter().find(|s| s.round_number == 2).unwrap();
    assert!(!round_two.finalised);

    let scored = h.store.all_scored().await;
    assert_eq!(scored.len(), 2);
    assert!(scored
        .iter()
        .any(|s| s.standings_id == round_two.id && s.score == BASE_SCORE));

    // Only the round 1 notice from the previous tick
    assert_eq!(h.drain_emails().await.len(), 1);

    let board = h.leaderboard.get_leaderboard(REALM, SEASON, 2).await.unwrap();
    assert_eq!(board.rankings.len(), 1);
    let harry = &board.rankings[0];
    assert_eq!(harry.total_score, 98 + 100);
    assert_eq!(harry.current_round_score, 100);
    assert_eq!(harry.max_round_score, 100);
    assert_eq!(board.last_updated, Some(round_two.created_at));
}

#[tokio::test]
async fn completed_season_is_clamped_and_finalised_in_one_run() {
    let h = Harness::new(bst(2021, 5, 23, 18, 0));
    add_entry(&h.store, "harry", &team_ids(), bst(2020, 9, 1, 10, 0)).await;
    h.source.push(table(MAX_ROUNDS - 1, &team_ids(), MAX_ROUNDS));

    let outcome = h.ingestor.ingest(SEASON).await.unwrap();
    assert_eq!(
        outcome,
        IngestOutcome::Processed {
            round_number: MAX_ROUNDS,
            finalised: true,
            final_round: true,
            scored: 1,
            notified: 1,
        }
    );

    let snapshots = h.store.standings_for_season(SEASON).await;
    assert_eq!(snapshots.len(), 1);
    assert_eq!(snapshots[0].round_number, MAX_ROUNDS);
    assert!(snapshots[0].finalised);

    // Nothing left to do once the final round is finalised
    h.clock.advance(Duration::minutes(15));
    assert_eq!(
        h.ingestor.ingest(SEASON).await.unwrap(),
        IngestOutcome::SeasonComplete
    );

    let emails = h.drain_emails().await;
    assert_eq!(emails.len(), 1);
    assert_eq!(emails[0].subject, "End of Round 38");
    assert!(emails[0].plain_text.contains("final round"));
}

#[tokio::test]
async fn window_open_notifies_every_approved_entry() {
    let h = Harness::new(bst(2020, 9, 12, 12, 34));
    for i in 0..25 {
        add_entry(&h.store, &format!("entrant{:02}", i), &[], bst(2020, 8, 1, 0, 0)).await;
    }

    let job = PredictionWindowJob::new(
        SEASON,
        WindowNotice::Open,
        h.league.clone(),
        h.store.clone(),
        h.comms.clone(),
        h.clock.clone(),
    );
    let queued = job.notify(bst(2020, 9, 12, 12, 34)).await.unwrap();
    assert_eq!(queued, 25);

    let emails = h.drain_emails().await;
    assert_eq!(emails.len(), 25);
    assert!(emails.iter().all(|e| e.subject == "Prediction Window Open!"));
    assert!(emails[0].plain_text.contains("http://localhost:3000/prediction"));
}

#[tokio::test]
async fn window_closing_on_last_window_says_last_chance() {
    let h = Harness::new(bst(2020, 10, 14, 16, 48));
    add_entry(&h.store, "harry", &[], bst(2020, 8, 1, 0, 0)).await;

    let job = PredictionWindowJob::new(
        SEASON,
        WindowNotice::Closing,
        h.league.clone(),
        h.store.clone(),
        h.comms.clone(),
        h.clock.clone(),
    );
    // Closes 2020-10-14 23:59, outside the 12 to 36 hour look-ahead
    assert_eq!(job.notify(bst(2020, 10, 14, 16, 48)).await.unwrap(), 0);
    assert_eq!(job.notify(bst(2020, 10, 13, 16, 48)).await.unwrap(), 1);

    let emails = h.drain_emails().await;
    assert_eq!(emails.len(), 1);
    assert_eq!(
        emails[0].subject,
        "Prediction Window Closing Soon (Last Chance!)"
    );
}

#[tokio::test]
async fn leaderboard_before_any_standings() {
    let h = Harness::new(bst(2020, 9, 1, 12, 0));
    add_entry(&h.store, "beta", &team_ids(), bst(2020, 8, 1, 0, 0)).await;
    add_entry(&h.store, "alpha", &team_ids(), bst(2020, 8, 1, 0, 0)).await;

    let board = h.leaderboard.get_leaderboard(REALM, SEASON, 1).await.unwrap();
    assert_eq!(board.round_number, 1);
    assert!(board.last_updated.is_none());

    let summary: Vec<(usize, &str, i32, i32, i32)> = board
        .rankings
        .iter()
        .map(|r| {
            (
                r.position,
                r.nickname.as_str(),
                r.current_round_score,
                r.max_round_score,
                r.total_score,
            )
        })
        .collect();
    assert_eq!(summary, [(1, "alpha", 0, 0, 0), (2, "beta", 0, 0, 0)]);

    let err = h.leaderboard.get_leaderboard(REALM, SEASON, 2).await.unwrap_err();
    assert!(err.is_not_found());
    assert!(matches!(
        h.leaderboard.get_leaderboard(REALM, SEASON, 0).await,
        Err(LeagueError::Validation { .. })
    ));
    assert!(h
        .leaderboard
        .get_leaderboard("elsewhere", SEASON, 1)
        .await
        .unwrap_err()
        .is_not_found());
}

#[tokio::test]
async fn repeated_ingest_is_idempotent() {
    let h = first_round().await;
    for _ in 0..3 {
        h.clock.advance(Duration::minutes(15));
        h.ingestor.ingest(SEASON).await.unwrap();
    }

    assert_eq!(h.source.calls(), 4);
    assert_eq!(h.store.standings_for_season(SEASON).await.len(), 1);
    let scored = h.store.all_scored().await;
    assert_eq!(scored.len(), 1);
    assert_eq!(scored[0].score, 98);
    assert!(h.drain_emails().await.is_empty());
}

#[tokio::test]
async fn finalised_round_is_never_reopened() {
    let h = first_round().await;
    h.source.push(table(2, &team_ids(), 2));
    h.ingestor.ingest(SEASON).await.unwrap();

    // Upstream regresses to round 1 with a different table
    let mut reversed = team_ids();
    reversed.reverse();
    h.source.push(table(1, &reversed, 1));
    h.ingestor.ingest(SEASON).await.unwrap();

    let snapshots = h.store.standings_for_season(SEASON).await;
    let round_one = snapshots.iter().find(|s| s.round_number == 1).unwrap();
    assert!(round_one.finalised);
    assert_eq!(round_one.team_ids(), swapped_first_two());
}

#[tokio::test]
async fn newer_prediction_is_scored_from_then_on() {
    let h = first_round().await;

    // harry re-predicts after round 1 was scored, matching the live table exactly
    let first = h.store.all_scored().await.remove(0);
    let entry_id = h
        .store
        .get_prediction(first.entry_prediction_id)
        .await
        .unwrap()
        .entry_id;
    h.store
        .insert_prediction(&EntryPrediction {
            id: Uuid::new_v4(),
            entry_id,
            rankings: swapped_first_two(),
            created_at: bst(2020, 10, 1, 12, 5),
        })
        .await
        .unwrap();

    h.clock.advance(Duration::minutes(15));
    h.ingestor.ingest(SEASON).await.unwrap();

    let scored = h.store.all_scored().await;
    assert_eq!(scored.len(), 2);
    assert!(scored.iter().any(|s| s.score == BASE_SCORE));

    // Only the latest score per entry and round counts
    let board = h.leaderboard.get_leaderboard(REALM, SEASON, 1).await.unwrap();
    assert_eq!(board.rankings[0].total_score, BASE_SCORE);
}
