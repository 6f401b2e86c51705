use anyhow::Context;
use clap::Parser;
use prediction_league::app::App;
use prediction_league::cli::{leaderboard_table, seasons_table, Cli, Commands};
use prediction_league::config::{AppConfig, LoggingConfig};
use prediction_league::coordination::ShutdownToken;
use prediction_league::domain::LeagueData;
use prediction_league::services::EmailQueueWorker;
use prediction_league::supervisor::Worker;
use tracing::{error, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = AppConfig::load_from(&cli.config)
        .with_context(|| format!("failed to load configuration from '{}'", cli.config))?;
    let guard = init_logging(&config.logging);

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => {
            let app = App::build(config, cli.ts.as_deref()).await?;
            let service = app.service()?;
            info!(workers = ?service.worker_names(), "Starting prediction league");
            let code = service.run_all().await;
            if code != 0 {
                error!(code, "Service stopped with errors");
            }
            drop(guard);
            std::process::exit(code);
        }
        Commands::Leaderboard {
            realm,
            season,
            round,
        } => {
            let app = App::build(config, cli.ts.as_deref()).await?;
            let board = app.leaderboard.get_leaderboard(&realm, &season, round).await?;
            println!("{}", leaderboard_table(&board));
        }
        Commands::Ingest { season } => {
            let app = App::build(config, cli.ts.as_deref()).await?;
            let ingestor = app
                .ingestor
                .as_ref()
                .context("football_data.api_token is not configured")?;
            let worker = EmailQueueWorker::new(app.queue.clone(), app.email_client()?);
            let delivery = tokio::spawn(async move { worker.run(ShutdownToken::new()).await });

            let outcome = ingestor.ingest(&season).await;
            app.queue.close();
            delivery.await??;
            println!("{}: {}", season, outcome?);
        }
        Commands::ReapTokens => {
            let app = App::build(config, cli.ts.as_deref()).await?;
            let removed = app.tokens.reap_expired_as_of(app.tokens.now()).await?;
            println!("Removed {} expired token(s)", removed);
        }
        Commands::CheckConfig => {
            if let Err(errors) = config.validate() {
                for e in &errors {
                    eprintln!("  - {}", e);
                }
                anyhow::bail!("configuration has {} problem(s)", errors.len());
            }
            let league = LeagueData::load(&config.service.league_data)?;
            if let Err(errors) = config.validate_against(&league) {
                for e in &errors {
                    eprintln!("  - {}", e);
                }
                anyhow::bail!("realm configuration has {} problem(s)", errors.len());
            }

            println!("{}", seasons_table(&league));
            for realm in &config.realms {
                println!("realm {} -> season {} ({})", realm.name, realm.season_id, realm.origin);
            }
            println!(
                "football-data: {}, mailgun: {}, database: {}",
                enabled(config.football_data.api_token.is_some()),
                enabled(config.email.mailgun_api_key.is_some()),
                if config.database.is_memory() { "memory" } else { "postgres" },
            );
        }
    }

    Ok(())
}

fn enabled(on: bool) -> &'static str {
    if on {
        "enabled"
    } else {
        "disabled"
    }
}

/// Install the global subscriber; the guard flushes the file writer on drop
fn init_logging(config: &LoggingConfig) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("{},prediction_league=debug,sqlx=warn", config.level))
    });

    let (file_layer, guard) = match &config.directory {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "prediction-league.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (
                Some(fmt::layer().with_writer(writer).with_ansi(false)),
                Some(guard),
            )
        }
        None => (None, None),
    };

    let registry = tracing_subscriber::registry().with(filter).with(file_layer);
    if config.json {
        registry
            .with(fmt::layer().json().with_target(true))
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .init();
    }

    guard
}
