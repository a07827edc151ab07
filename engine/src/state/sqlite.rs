//! SQLite-backed conversation state
//!
//! Records are stored as JSON in a single `conversation_state` table. The
//! database runs in WAL mode; call `close()` on shutdown to checkpoint.

use async_trait::async_trait;
use sdk::errors::HostError;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::ConnectOptions;
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, info};

use super::{ConversationRecord, ConversationStateStore};

/// Durable single-node store
pub struct SqliteStateStore {
    pool: SqlitePool,
}

fn storage_err(context: &str, e: impl std::fmt::Display) -> HostError {
    HostError::Storage(format!("{}: {}", context, e))
}

impl SqliteStateStore {
    /// Open (or create) the database at `db_path` and run migrations
    pub async fn new(db_path: &Path) -> Result<Self, HostError> {
        info!("Opening conversation state database at: {}", db_path.display());

        if let Some(parent) = db_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| storage_err("Failed to create database directory", e))?;
        }

        let connection_string = format!("sqlite:{}", db_path.display());
        let options = SqliteConnectOptions::from_str(&connection_string)
            .map_err(|e| storage_err("Invalid database path", e))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            .disable_statement_logging();

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| storage_err("Failed to connect to database", e))?;

        debug!("Database connection established");

        let store = Self { pool };
        store.run_migrations().await?;

        Ok(store)
    }

    async fn run_migrations(&self) -> Result<(), HostError> {
        sqlx::raw_sql(include_str!("../../migrations/001_conversation_state.sql"))
            .execute(&self.pool)
            .await
            .map_err(|e| storage_err("Failed to execute migration 001_conversation_state.sql", e))?;

        Ok(())
    }

    /// Get a reference to the connection pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Checkpoint the WAL and close all connections
    pub async fn close(self) -> Result<(), HostError> {
        info!("Closing conversation state database");

        sqlx::query("PRAGMA wal_checkpoint(TRUNCATE)")
            .execute(&self.pool)
            .await
            .map_err(|e| storage_err("Failed to flush WAL", e))?;

        self.pool.close().await;
        Ok(())
    }
}

#[async_trait]
impl ConversationStateStore for SqliteStateStore {
    async fn get(&self, conversation_id: &str) -> Result<ConversationRecord, HostError> {
        let row: Option<String> = sqlx::query_scalar(
            "SELECT record FROM conversation_state WHERE conversation_id = ?",
        )
        .bind(conversation_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| storage_err("Failed to load conversation state", e))?;

        match row {
            Some(json) => serde_json::from_str(&json)
                .map_err(|e| storage_err("Corrupt conversation state", e)),
            None => Ok(ConversationRecord::default()),
        }
    }

    async fn save_changes(
        &self,
        conversation_id: &str,
        record: &ConversationRecord,
    ) -> Result<(), HostError> {
        let json = serde_json::to_string(record)
            .map_err(|e| storage_err("Failed to serialize conversation state", e))?;
        let now = chrono::Utc::now().timestamp_millis();

        sqlx::query(
            r#"
            INSERT INTO conversation_state (conversation_id, record, updated_at)
            VALUES (?, ?, ?)
            ON CONFLICT(conversation_id) DO UPDATE SET
                record = excluded.record,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(conversation_id)
        .bind(json)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| storage_err("Failed to save conversation state", e))?;

        Ok(())
    }

    async fn delete(&self, conversation_id: &str) -> Result<(), HostError> {
        sqlx::query("DELETE FROM conversation_state WHERE conversation_id = ?")
            .bind(conversation_id)
            .execute(&self.pool)
            .await
            .map_err(|e| storage_err("Failed to delete conversation state", e))?;

        Ok(())
    }
}
