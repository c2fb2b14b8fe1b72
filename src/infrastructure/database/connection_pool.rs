use crate::shared::config::DatabaseConfig;
use crate::shared::error::OfflineError;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::sync::Arc;
use std::time::Duration;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS submissions (
    id TEXT PRIMARY KEY,
    submission_type TEXT NOT NULL,
    team_number INTEGER NOT NULL,
    event_key TEXT NOT NULL,
    match_key TEXT,
    data TEXT NOT NULL,
    priority TEXT NOT NULL,
    retry_count INTEGER NOT NULL DEFAULT 0,
    version INTEGER NOT NULL DEFAULT 1,
    status_kind TEXT NOT NULL,
    status TEXT NOT NULL,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_submissions_status_kind ON submissions(status_kind);
CREATE INDEX IF NOT EXISTS idx_submissions_event_key ON submissions(event_key);
CREATE INDEX IF NOT EXISTS idx_submissions_created_at ON submissions(created_at);
"#;

#[derive(Clone)]
pub struct ConnectionPool {
    pool: Arc<SqlitePool>,
}

impl ConnectionPool {
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, OfflineError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.connection_timeout))
            .connect(&config.url)
            .await?;

        Ok(Self {
            pool: Arc::new(pool),
        })
    }

    /// Private in-memory database, capped at one connection so the
    /// database lives as long as the pool.
    pub async fn connect_in_memory() -> Result<Self, OfflineError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        Ok(Self {
            pool: Arc::new(pool),
        })
    }

    /// Idempotent schema bootstrap.
    pub async fn initialize(&self) -> Result<(), OfflineError> {
        sqlx::raw_sql(SCHEMA).execute(self.pool.as_ref()).await?;
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}
