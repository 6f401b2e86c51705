pub mod communications;
pub mod email_queue;
pub mod fan_out;
pub mod http;
pub mod ingestor;
pub mod leaderboard;
pub mod prediction_window;
pub mod token;

#[cfg(test)]
pub(crate) mod fixtures;

pub use communications::CommunicationsAgent;
pub use email_queue::{DeliveryStats, EmailQueue, EmailQueueWorker};
pub use fan_out::{fan_out, DEFAULT_FAN_OUT_LIMIT};
pub use http::{router, HealthResponse, HealthStatus, HttpServer, HttpState};
pub use ingestor::{IngestOutcome, RetrieveLatestStandingsJob, StandingsIngestor};
pub use leaderboard::LeaderBoardAgent;
pub use prediction_window::PredictionWindowJob;
pub use token::{TokenAgent, TokenReaperJob};
