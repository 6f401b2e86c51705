use crate::domain::{
    Entry, EntryPrediction, EntryStatus, RankingWithMeta, RoundScore, ScoredEntryPrediction,
    Standings, Token, TokenType,
};
use crate::error::{LeagueError, Result};
use crate::persistence::{
    EntryPredictionRepository, EntryRepository, HealthCheck, ScoredEntryPredictionRepository,
    StandingsRepository, TokenRepository,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::migrate::Migrator;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::types::Json;
use sqlx::Row;
use std::path::Path;
use tracing::{debug, info, instrument};
use uuid::Uuid;

/// PostgreSQL storage adapter
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Create a new PostgreSQL store
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;

        info!("Connected to PostgreSQL");
        Ok(Self { pool })
    }

    /// Run the SQL migrations found in `migrations_dir`
    pub async fn migrate(&self, migrations_dir: &str) -> Result<()> {
        Migrator::new(Path::new(migrations_dir))
            .await?
            .run(&self.pool)
            .await?;
        info!(dir = migrations_dir, "Database migrations completed");
        Ok(())
    }

    /// Round-trip a trivial query
    pub async fn ping(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }
}

/// Translate constraint violations and missing rows into domain errors
fn map_db_error(err: sqlx::Error, what: impl Into<String>) -> LeagueError {
    if matches!(err, sqlx::Error::RowNotFound) {
        return LeagueError::NotFound(what.into());
    }
    if let sqlx::Error::Database(db) = &err {
        if db.code().as_deref() == Some("23505") {
            return LeagueError::Conflict(format!("{}: {}", what.into(), db.message()));
        }
    }
    LeagueError::Database(err)
}

fn entry_from_row(row: &PgRow) -> Result<Entry> {
    let status: String = row.get("status");
    Ok(Entry {
        id: row.get("id"),
        short_code: row.get("short_code"),
        season_id: row.get("season_id"),
        realm_name: row.get("realm_name"),
        entrant_name: row.get("entrant_name"),
        entrant_nickname: row.get("entrant_nickname"),
        entrant_email: row.get("entrant_email"),
        status: status
            .parse::<EntryStatus>()
            .map_err(|e| LeagueError::Internal(format!("entry status '{}': {}", status, e)))?,
        payment_method: row.get("payment_method"),
        payment_ref: row.get("payment_ref"),
        approved_at: row.get("approved_at"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

fn prediction_from_row(row: &PgRow) -> EntryPrediction {
    let rankings: Json<Vec<String>> = row.get("rankings");
    EntryPrediction {
        id: row.get("id"),
        entry_id: row.get("entry_id"),
        rankings: rankings.0,
        created_at: row.get("created_at"),
    }
}

fn standings_from_row(row: &PgRow) -> Standings {
    let rankings: Json<Vec<RankingWithMeta>> = row.get("rankings");
    let round_number: i32 = row.get("round_number");
    Standings {
        id: row.get("id"),
        season_id: row.get("season_id"),
        round_number: round_number as u32,
        rankings: rankings.0,
        finalised: row.get("finalised"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn scored_from_row(row: &PgRow) -> ScoredEntryPrediction {
    let rankings: Json<Vec<crate::domain::RankingWithScore>> = row.get("rankings");
    let modifiers: Json<Vec<crate::domain::ModifierSummary>> = row.get("modifiers");
    ScoredEntryPrediction {
        entry_prediction_id: row.get("entry_prediction_id"),
        standings_id: row.get("standings_id"),
        rankings: rankings.0,
        score: row.get("score"),
        modifiers: modifiers.0,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn token_from_row(row: &PgRow) -> Result<Token> {
    let token_type: String = row.get("type");
    Ok(Token {
        id: row.get("id"),
        token_type: token_type
            .parse::<TokenType>()
            .map_err(|e| LeagueError::Internal(format!("token type '{}': {}", token_type, e)))?,
        value: row.get("value"),
        issued_at: row.get("issued_at"),
        expires_at: row.get("expires_at"),
    })
}

const ENTRY_COLUMNS: &str = "id, short_code, season_id, realm_name, entrant_name, \
     entrant_nickname, entrant_email, status, payment_method, payment_ref, approved_at, \
     created_at, updated_at";

#[async_trait]
impl HealthCheck for PostgresStore {
    async fn is_reachable(&self) -> bool {
        self.ping().await
    }
}

#[async_trait]
impl EntryRepository for PostgresStore {
    #[instrument(skip(self, entry), fields(entry_id = %entry.id))]
    async fn insert_entry(&self, entry: &Entry) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO entry (id, short_code, season_id, realm_name, entrant_name,
                entrant_nickname, entrant_email, status, payment_method, payment_ref,
                approved_at, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(entry.id)
        .bind(&entry.short_code)
        .bind(&entry.season_id)
        .bind(&entry.realm_name)
        .bind(&entry.entrant_name)
        .bind(&entry.entrant_nickname)
        .bind(&entry.entrant_email)
        .bind(entry.status.as_str())
        .bind(&entry.payment_method)
        .bind(&entry.payment_ref)
        .bind(entry.approved_at)
        .bind(entry.created_at)
        .bind(entry.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_db_error(e, format!("entry {}", entry.id)))?;

        Ok(())
    }

    #[instrument(skip(self))]
    async fn get_entry(&self, id: Uuid) -> Result<Entry> {
        let row = sqlx::query(&format!("SELECT {} FROM entry WHERE id = $1", ENTRY_COLUMNS))
            .bind(id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_db_error(e, format!("entry {}", id)))?;

        entry_from_row(&row)
    }

    #[instrument(skip(self))]
    async fn select_approved_entries(&self, season_id: &str) -> Result<Vec<Entry>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM entry WHERE season_id = $1 AND approved_at IS NOT NULL \
             ORDER BY created_at",
            ENTRY_COLUMNS
        ))
        .bind(season_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(entry_from_row).collect()
    }

    #[instrument(skip(self))]
    async fn select_approved_entries_by_realm(
        &self,
        season_id: &str,
        realm_name: &str,
    ) -> Result<Vec<Entry>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM entry WHERE season_id = $1 AND realm_name = $2 \
             AND approved_at IS NOT NULL ORDER BY created_at",
            ENTRY_COLUMNS
        ))
        .bind(season_id)
        .bind(realm_name)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(entry_from_row).collect()
    }
}

#[async_trait]
impl EntryPredictionRepository for PostgresStore {
    #[instrument(skip(self, prediction), fields(prediction_id = %prediction.id))]
    async fn insert_prediction(&self, prediction: &EntryPrediction) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO entry_prediction (id, entry_id, rankings, created_at)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(prediction.id)
        .bind(prediction.entry_id)
        .bind(Json(&prediction.rankings))
        .bind(prediction.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_db_error(e, format!("prediction {}", prediction.id)))?;

        Ok(())
    }

    #[instrument(skip(self))]
    async fn get_prediction(&self, id: Uuid) -> Result<EntryPrediction> {
        let row = sqlx::query(
            "SELECT id, entry_id, rankings, created_at FROM entry_prediction WHERE id = $1",
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_db_error(e, format!("prediction {}", id)))?;

        Ok(prediction_from_row(&row))
    }

    #[instrument(skip(self))]
    async fn select_active_predictions(
        &self,
        season_id: &str,
        ts: DateTime<Utc>,
    ) -> Result<Vec<EntryPrediction>> {
        let rows = sqlx::query(
            r#"
            SELECT DISTINCT ON (ep.entry_id) ep.id, ep.entry_id, ep.rankings, ep.created_at
            FROM entry_prediction ep
            JOIN entry e ON e.id = ep.entry_id
            WHERE e.season_id = $1
              AND e.approved_at IS NOT NULL
              AND ep.created_at <= $2
            ORDER BY ep.entry_id, ep.created_at DESC
            "#,
        )
        .bind(season_id)
        .bind(ts)
        .fetch_all(&self.pool)
        .await?;

        debug!(count = rows.len(), "Selected active predictions");
        Ok(rows.iter().map(prediction_from_row).collect())
    }
}

const STANDINGS_COLUMNS: &str =
    "id, season_id, round_number, rankings, finalised, created_at, updated_at";

#[async_trait]
impl StandingsRepository for PostgresStore {
    #[instrument(skip(self, standings), fields(season = %standings.season_id, round = standings.round_number))]
    async fn insert_standings(&self, standings: &Standings) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO standings (id, season_id, round_number, rankings, finalised, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(standings.id)
        .bind(&standings.season_id)
        .bind(standings.round_number as i32)
        .bind(Json(&standings.rankings))
        .bind(standings.finalised)
        .bind(standings.created_at)
        .bind(standings.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            map_db_error(
                e,
                format!(
                    "standings for season {} round {}",
                    standings.season_id, standings.round_number
                ),
            )
        })?;

        Ok(())
    }

    #[instrument(skip(self, standings), fields(standings_id = %standings.id))]
    async fn update_standings(&self, standings: &Standings) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE standings
            SET season_id = $2, round_number = $3, rankings = $4, finalised = $5, updated_at = $6
            WHERE id = $1
            "#,
        )
        .bind(standings.id)
        .bind(&standings.season_id)
        .bind(standings.round_number as i32)
        .bind(Json(&standings.rankings))
        .bind(standings.finalised)
        .bind(standings.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_db_error(e, format!("standings {}", standings.id)))?;

        if result.rows_affected() == 0 {
            return Err(LeagueError::NotFound(format!("standings {}", standings.id)));
        }
        Ok(())
    }

    #[instrument(skip(self))]
    async fn get_standings(&self, id: Uuid) -> Result<Standings> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM standings WHERE id = $1",
            STANDINGS_COLUMNS
        ))
        .bind(id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_db_error(e, format!("standings {}", id)))?;

        Ok(standings_from_row(&row))
    }

    #[instrument(skip(self))]
    async fn get_standings_by_round(
        &self,
        season_id: &str,
        round_number: u32,
    ) -> Result<Standings> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM standings WHERE season_id = $1 AND round_number = $2",
            STANDINGS_COLUMNS
        ))
        .bind(season_id)
        .bind(round_number as i32)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            map_db_error(
                e,
                format!("standings for season {} round {}", season_id, round_number),
            )
        })?;

        Ok(standings_from_row(&row))
    }

    #[instrument(skip(self))]
    async fn get_latest_standings_before(
        &self,
        season_id: &str,
        round_number: u32,
    ) -> Result<Standings> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM standings WHERE season_id = $1 AND round_number < $2 \
             ORDER BY round_number DESC LIMIT 1",
            STANDINGS_COLUMNS
        ))
        .bind(season_id)
        .bind(round_number as i32)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            map_db_error(
                e,
                format!("standings for season {} before round {}", season_id, round_number),
            )
        })?;

        Ok(standings_from_row(&row))
    }
}

#[async_trait]
impl ScoredEntryPredictionRepository for PostgresStore {
    #[instrument(skip(self, scored), fields(prediction = %scored.entry_prediction_id, standings = %scored.standings_id))]
    async fn upsert_scored(&self, scored: &ScoredEntryPrediction) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO scored_entry_prediction
                (entry_prediction_id, standings_id, rankings, score, modifiers, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (entry_prediction_id, standings_id) DO UPDATE SET
                rankings = EXCLUDED.rankings,
                score = EXCLUDED.score,
                modifiers = EXCLUDED.modifiers,
                updated_at = EXCLUDED.created_at
            "#,
        )
        .bind(scored.entry_prediction_id)
        .bind(scored.standings_id)
        .bind(Json(&scored.rankings))
        .bind(scored.score)
        .bind(Json(&scored.modifiers))
        .bind(scored.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    #[instrument(skip(self))]
    async fn get_scored(
        &self,
        entry_prediction_id: Uuid,
        standings_id: Uuid,
    ) -> Result<ScoredEntryPrediction> {
        let row = sqlx::query(
            r#"
            SELECT entry_prediction_id, standings_id, rankings, score, modifiers, created_at, updated_at
            FROM scored_entry_prediction
            WHERE entry_prediction_id = $1 AND standings_id = $2
            "#,
        )
        .bind(entry_prediction_id)
        .bind(standings_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            map_db_error(
                e,
                format!("scored prediction {}/{}", entry_prediction_id, standings_id),
            )
        })?;

        Ok(scored_from_row(&row))
    }

    #[instrument(skip(self))]
    async fn select_scored_by_standings(
        &self,
        standings_id: Uuid,
    ) -> Result<Vec<ScoredEntryPrediction>> {
        let rows = sqlx::query(
            r#"
            SELECT entry_prediction_id, standings_id, rankings, score, modifiers, created_at, updated_at
            FROM scored_entry_prediction
            WHERE standings_id = $1
            "#,
        )
        .bind(standings_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(scored_from_row).collect())
    }

    #[instrument(skip(self))]
    async fn select_round_scores(
        &self,
        season_id: &str,
        realm_name: &str,
        round_number: u32,
    ) -> Result<Vec<RoundScore>> {
        let rows = sqlx::query(
            r#"
            SELECT DISTINCT ON (e.id, s.round_number)
                e.id AS entry_id, s.round_number, sep.score, sep.created_at
            FROM scored_entry_prediction sep
            JOIN entry_prediction ep ON ep.id = sep.entry_prediction_id
            JOIN entry e ON e.id = ep.entry_id
            JOIN standings s ON s.id = sep.standings_id
            WHERE e.season_id = $1
              AND e.realm_name = $2
              AND e.approved_at IS NOT NULL
              AND s.season_id = $1
              AND s.round_number <= $3
            ORDER BY e.id, s.round_number, sep.created_at DESC
            "#,
        )
        .bind(season_id)
        .bind(realm_name)
        .bind(round_number as i32)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| {
                let round: i32 = row.get("round_number");
                RoundScore {
                    entry_id: row.get("entry_id"),
                    round_number: round as u32,
                    score: row.get("score"),
                    created_at: row.get("created_at"),
                }
            })
            .collect())
    }
}

#[async_trait]
impl TokenRepository for PostgresStore {
    #[instrument(skip(self, token), fields(token_type = %token.token_type))]
    async fn insert_token(&self, token: &Token) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO token (id, type, value, issued_at, expires_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(&token.id)
        .bind(token.token_type.as_str())
        .bind(&token.value)
        .bind(token.issued_at)
        .bind(token.expires_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_db_error(e, "token"))?;

        Ok(())
    }

    #[instrument(skip(self, id))]
    async fn get_token(&self, id: &str) -> Result<Token> {
        let row = sqlx::query(
            "SELECT id, type, value, issued_at, expires_at FROM token WHERE id = $1",
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_db_error(e, "token"))?;

        token_from_row(&row)
    }

    #[instrument(skip(self, id))]
    async fn delete_token(&self, id: &str) -> Result<()> {
        sqlx::query("DELETE FROM token WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete_tokens_expired_as_of(&self, ts: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query("DELETE FROM token WHERE expires_at <= $1")
            .bind(ts)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    #[instrument(skip(self, value))]
    async fn delete_tokens_in_flight(
        &self,
        token_type: TokenType,
        value: &str,
        ts: DateTime<Utc>,
    ) -> Result<u64> {
        let result = sqlx::query(
            "DELETE FROM token WHERE type = $1 AND value = $2 AND expires_at > $3",
        )
        .bind(token_type.as_str())
        .bind(value)
        .bind(ts)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}
