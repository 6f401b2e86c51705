pub mod clock;
pub mod email;
pub mod entry;
pub mod league;
pub mod leaderboard;
pub mod ranking;
pub mod realm;
pub mod scored;
pub mod season;
pub mod standings;
pub mod team;
pub mod timeframe;
pub mod token;

pub use clock::{parse_timestamp_override, Clock, FrozenClock, RealClock};
pub use email::{Email, Identity, WindowNotice};
pub use entry::{latest_as_of, Entry, EntryPrediction, EntryStatus};
pub use league::LeagueData;
pub use leaderboard::{LeaderBoard, LeaderBoardRanking, RoundScore};
pub use ranking::{
    calculate_ranking_scores, score_prediction, ModifierSummary, RankingWithMeta,
    RankingWithScore, ScoreModifier, StandingsMeta, BASE_SCORE,
};
pub use realm::{EntryFee, Realm, RealmCollection, RealmContact};
pub use scored::ScoredEntryPrediction;
pub use season::{
    closing_query_frame, open_query_frame, PredictionsStatus, Season, SeasonCollection,
    SeasonState,
};
pub use standings::{LatestStandings, Standings};
pub use team::{Team, TeamCollection};
pub use timeframe::{SequencedTimeFrame, TimeFrame};
pub use token::{Token, TokenType};
