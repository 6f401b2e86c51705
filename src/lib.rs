pub mod adapters;
pub mod app;
pub mod cli;
pub mod config;
pub mod coordination;
pub mod domain;
pub mod error;
pub mod persistence;
pub mod services;
pub mod supervisor;

pub use app::App;
pub use config::AppConfig;
pub use coordination::{CronSpec, Job, Scheduler, ShutdownToken};
pub use error::{LeagueError, MultiError, Result};
pub use persistence::{MemoryStore, Repositories};
pub use supervisor::{Service, Worker};
