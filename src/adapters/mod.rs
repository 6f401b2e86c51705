pub mod football_data;
pub mod mailgun;
pub mod postgres;
pub mod traits;

pub use football_data::FootballDataClient;
pub use mailgun::MailgunClient;
pub use postgres::PostgresStore;
pub use traits::{EmailClient, FootballDataSource};

#[cfg(test)]
pub use traits::{MockEmailClient, MockFootballDataSource};
