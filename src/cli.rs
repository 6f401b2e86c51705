use clap::{Parser, Subcommand};
use tabled::{settings::Style, Table, Tabled};

use crate::domain::{LeaderBoard, LeagueData};

#[derive(Parser)]
#[command(name = "prediction-league")]
#[command(version)]
#[command(about = "Scoring and scheduling for a football prediction league", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Config directory
    #[arg(short, long, default_value = "config")]
    pub config: String,

    /// Freeze the clock at a local time (YYYYMMDDhhmmss)
    #[arg(long)]
    pub ts: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run every worker until SIGINT/SIGTERM
    Serve,
    /// Print a realm's leaderboard for a round
    Leaderboard {
        #[arg(long)]
        realm: String,
        #[arg(long)]
        season: String,
        #[arg(long)]
        round: u32,
    },
    /// Run one standings ingestion pass for a season
    Ingest {
        #[arg(long)]
        season: String,
    },
    /// Delete expired tokens once
    ReapTokens,
    /// Validate config and league data, then print a summary
    CheckConfig,
}

#[derive(Tabled)]
struct LeaderBoardRow {
    #[tabled(rename = "Pos")]
    position: usize,
    #[tabled(rename = "+/-")]
    movement: String,
    #[tabled(rename = "Nickname")]
    nickname: String,
    #[tabled(rename = "Round")]
    current_round_score: i32,
    #[tabled(rename = "Best")]
    max_round_score: i32,
    #[tabled(rename = "Total")]
    total_score: i32,
}

fn movement_marker(movement: i32) -> String {
    match movement {
        0 => "-".to_string(),
        m if m > 0 => format!("+{}", m),
        m => m.to_string(),
    }
}

/// Render a leaderboard for the terminal
pub fn leaderboard_table(board: &LeaderBoard) -> String {
    let rows: Vec<LeaderBoardRow> = board
        .rankings
        .iter()
        .map(|r| LeaderBoardRow {
            position: r.position,
            movement: movement_marker(r.movement),
            nickname: r.nickname.clone(),
            current_round_score: r.current_round_score,
            max_round_score: r.max_round_score,
            total_score: r.total_score,
        })
        .collect();

    let updated = board
        .last_updated
        .map(|ts| ts.format("%Y-%m-%d %H:%M UTC").to_string())
        .unwrap_or_else(|| "never".to_string());

    format!(
        "{} / {} / round {} (updated {})\n{}",
        board.realm_name,
        board.season_id,
        board.round_number,
        updated,
        Table::new(rows).with(Style::rounded())
    )
}

#[derive(Tabled)]
struct SeasonRow {
    #[tabled(rename = "Season")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Teams")]
    teams: usize,
    #[tabled(rename = "Rounds")]
    max_rounds: u32,
    #[tabled(rename = "Windows")]
    windows: usize,
}

/// One row per configured season
pub fn seasons_table(league: &LeagueData) -> String {
    let mut rows: Vec<SeasonRow> = league
        .seasons
        .iter()
        .map(|s| SeasonRow {
            id: s.id.clone(),
            name: s.name.clone(),
            teams: s.team_ids.len(),
            max_rounds: s.max_rounds,
            windows: s.prediction_windows.len(),
        })
        .collect();
    rows.sort_by(|a, b| a.id.cmp(&b.id));
    Table::new(rows).with(Style::rounded()).to_string()
}
