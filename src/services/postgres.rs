use async_trait::async_trait;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, Row, Transaction};
use std::time::Duration;
use thiserror::Error;

use crate::core::bandit::{BanditState, BANDIT_STATE_ID};
use crate::core::ports::{BanditStateStore, FeedbackStore, StoreError};
use crate::models::{CategoryVector, ComponentRewardVector, FeedbackEvent, FeedbackKind};

/// SQLSTATE codes that mean "another writer got there first, try again"
const RETRYABLE_SQLSTATES: [&str; 3] = [
    "40001", // serialization_failure
    "40P01", // deadlock_detected
    "23505", // unique_violation on the first insert of the singleton row
];

/// Errors that can occur when interacting with PostgreSQL
#[derive(Debug, Error)]
pub enum PostgresError {
    #[error("SQLx error: {0}")]
    SqlxError(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    MigrateError(#[from] sqlx::migrate::MigrateError),

    #[error("Gave up after {attempts} contended attempts: {source}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        source: sqlx::Error,
    },
}

impl PostgresError {
    fn is_retryable(&self) -> bool {
        matches!(self, PostgresError::SqlxError(e) if is_contention(e))
    }
}

fn is_contention(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db) => db
            .code()
            .is_some_and(|code| RETRYABLE_SQLSTATES.contains(&&*code)),
        _ => false,
    }
}

impl From<PostgresError> for StoreError {
    fn from(err: PostgresError) -> Self {
        match err {
            PostgresError::RetriesExhausted { .. } => StoreError::Conflict(err.to_string()),
            PostgresError::SqlxError(sqlx::Error::ColumnDecode { .. })
            | PostgresError::SqlxError(sqlx::Error::Decode(_)) => {
                StoreError::Corrupt(err.to_string())
            }
            other => StoreError::Unavailable(other.to_string()),
        }
    }
}

/// PostgreSQL client for the engine's own records
///
/// Owns two tables:
/// - `ranking_feedback`: append-only audit log of feedback events
/// - `bandit_state`: the singleton learner row, id `global`
pub struct PostgresClient {
    pool: PgPool,
    max_retries: u32,
    retry_backoff: Duration,
}

impl PostgresClient {
    /// Create a new PostgreSQL client from a connection string
    pub async fn new(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
        acquire_timeout: Duration,
        idle_timeout: Duration,
    ) -> Result<Self, PostgresError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(acquire_timeout)
            .idle_timeout(idle_timeout)
            .test_before_acquire(true)
            .connect(database_url)
            .await?;

        // Run migrations on startup
        sqlx::migrate!("./migrations").run(&pool).await?;

        Ok(Self {
            pool,
            max_retries: 5,
            retry_backoff: Duration::from_millis(20),
        })
    }

    /// Create a new PostgreSQL client from settings
    pub async fn from_settings(
        url: &str,
        max_connections: Option<u32>,
        min_connections: Option<u32>,
        acquire_timeout_secs: Option<u64>,
        idle_timeout_secs: Option<u64>,
    ) -> Result<Self, PostgresError> {
        tracing::info!("Connecting to PostgreSQL");

        Self::new(
            url,
            max_connections.unwrap_or(10),
            min_connections.unwrap_or(1),
            Duration::from_secs(acquire_timeout_secs.unwrap_or(5)),
            Duration::from_secs(idle_timeout_secs.unwrap_or(600)),
        )
        .await
    }

    /// Retry policy for contended bandit updates
    pub fn with_retry_policy(mut self, max_retries: u32, retry_backoff: Duration) -> Self {
        self.max_retries = max_retries;
        self.retry_backoff = retry_backoff;
        self
    }

    /// Append a feedback event to the audit log
    pub async fn record_feedback(&self, event: &FeedbackEvent) -> Result<(), PostgresError> {
        let query = r#"
            INSERT INTO ranking_feedback (
                id, apartment_id, user_id, feedback,
                search_session_id, search_query, search_filters,
                apartment_position, apartment_score, response_time_ms,
                component_scores, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
        "#;

        sqlx::query(query)
            .bind(event.id)
            .bind(event.listing_id)
            .bind(event.user_id)
            .bind(event.feedback.as_str())
            .bind(event.search_session_id.as_deref())
            .bind(event.search_query.as_deref())
            .bind(event.search_filters.as_ref().map(Json))
            .bind(event.listing_position)
            .bind(event.listing_score)
            .bind(event.response_time_ms)
            .bind(Json(&event.component_scores))
            .bind(event.created_at)
            .execute(&self.pool)
            .await?;

        tracing::debug!(
            "Recorded feedback {}: {} -> {} ({})",
            event.id,
            event.user_id,
            event.listing_id,
            event.feedback
        );

        Ok(())
    }

    /// Read the singleton bandit row, if it has been created yet
    pub async fn fetch_bandit_state(&self) -> Result<Option<BanditState>, PostgresError> {
        let query = r#"
            SELECT weights, trials, successes, last_updated
            FROM bandit_state
            WHERE id = $1
        "#;

        let row = sqlx::query(query)
            .bind(BANDIT_STATE_ID)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(state_from_row).transpose().map_err(Into::into)
    }

    /// Fold one reward vector into the bandit row, retrying on contention
    pub async fn update_bandit_state(
        &self,
        rewards: &ComponentRewardVector,
        feedback: FeedbackKind,
    ) -> Result<BanditState, PostgresError> {
        let mut attempt = 0;

        loop {
            match self.try_update_bandit_state(rewards, feedback).await {
                Ok(state) => return Ok(state),
                Err(e) if e.is_retryable() && attempt < self.max_retries => {
                    attempt += 1;
                    let delay = backoff_delay(self.retry_backoff, attempt);
                    tracing::warn!(
                        "Bandit update contended (attempt {}), retrying in {:?}: {}",
                        attempt,
                        delay,
                        e
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(exhausted(e, attempt + 1)),
            }
        }
    }

    /// One SERIALIZABLE read-modify-write of the singleton row
    async fn try_update_bandit_state(
        &self,
        rewards: &ComponentRewardVector,
        feedback: FeedbackKind,
    ) -> Result<BanditState, PostgresError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("SET TRANSACTION ISOLATION LEVEL SERIALIZABLE")
            .execute(&mut *tx)
            .await?;

        let row = sqlx::query(
            r#"
            SELECT weights, trials, successes, last_updated
            FROM bandit_state
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(BANDIT_STATE_ID)
        .fetch_optional(&mut *tx)
        .await?;

        let exists = row.is_some();
        let mut state = match row {
            Some(row) => state_from_row(&row)?,
            None => BanditState::default(),
        };

        state.learn(rewards, feedback, &mut rand::rng());

        write_state(&mut tx, &state, exists).await?;
        tx.commit().await?;

        tracing::debug!("Bandit weights updated: {:?}", state.weights);

        Ok(state)
    }

    /// Health check for the database connection
    pub async fn health_check(&self) -> Result<bool, PostgresError> {
        sqlx::query("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map(|_| true)
            .map_err(Into::into)
    }
}

async fn write_state(
    tx: &mut Transaction<'_, Postgres>,
    state: &BanditState,
    exists: bool,
) -> Result<(), sqlx::Error> {
    // A plain INSERT so a racing first writer surfaces as 23505 and retries
    let query = if exists {
        r#"
        UPDATE bandit_state
        SET weights = $2, trials = $3, successes = $4, last_updated = $5
        WHERE id = $1
        "#
    } else {
        r#"
        INSERT INTO bandit_state (id, weights, trials, successes, last_updated)
        VALUES ($1, $2, $3, $4, $5)
        "#
    };

    sqlx::query(query)
        .bind(BANDIT_STATE_ID)
        .bind(Json(&state.weights))
        .bind(Json(&state.trials))
        .bind(Json(&state.successes))
        .bind(state.last_updated)
        .execute(&mut **tx)
        .await?;

    Ok(())
}

fn state_from_row(row: &PgRow) -> Result<BanditState, sqlx::Error> {
    Ok(BanditState {
        weights: row.try_get::<Json<CategoryVector>, _>("weights")?.0,
        trials: row.try_get::<Json<CategoryVector>, _>("trials")?.0,
        successes: row.try_get::<Json<CategoryVector>, _>("successes")?.0,
        last_updated: row.try_get("last_updated")?,
    })
}

/// Contention that outlived the retry budget becomes `RetriesExhausted`
fn exhausted(err: PostgresError, attempts: u32) -> PostgresError {
    match err {
        PostgresError::SqlxError(source) if is_contention(&source) => {
            PostgresError::RetriesExhausted { attempts, source }
        }
        other => other,
    }
}

/// Exponential backoff: base, 2x base, 4x base, ... capped at 1024x
fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    let exponent = attempt.saturating_sub(1).min(10);
    base.saturating_mul(1u32 << exponent)
}

#[async_trait]
impl FeedbackStore for PostgresClient {
    async fn insert_feedback(&self, event: &FeedbackEvent) -> Result<(), StoreError> {
        Ok(self.record_feedback(event).await?)
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        PostgresClient::health_check(self).await?;
        Ok(())
    }
}

#[async_trait]
impl BanditStateStore for PostgresClient {
    async fn load_state(&self) -> Result<Option<BanditState>, StoreError> {
        Ok(self.fetch_bandit_state().await?)
    }

    async fn apply_feedback(
        &self,
        rewards: &ComponentRewardVector,
        feedback: FeedbackKind,
    ) -> Result<BanditState, StoreError> {
        Ok(self.update_bandit_state(rewards, feedback).await?)
    }
}
