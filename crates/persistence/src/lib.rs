//! Persistence layer for the trader
//!
//! Provisions the two local SQLite stores (`trader.db` and `twitter.db`) on
//! first run and opens them for everything that runs afterwards.

pub mod init;
pub mod repository;
pub mod schema;

pub use init::{initialize, InitReport, Initializer, StoreOutcome, StoreReport, REMEDIATION};
pub use schema::{StoreKind, SCHEMA_VERSION};
pub use sqlx::sqlite::SqlitePool;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteSynchronous};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Database connection error: {0}")]
    Connection(String),

    #[error("Statement failed in {store} store: {source}: {sql}")]
    Statement {
        store: StoreKind,
        sql: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("Seed mismatch in table {table}: {detail}")]
    SeedMismatch { table: String, detail: String },

    #[error("Unsupported schema version: {0}")]
    SchemaVersion(i64),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

pub type DbResult<T> = Result<T, DbError>;

/// Connection pool over an already initialized store
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open an existing store with foreign key enforcement on
    ///
    /// Never creates the file: a missing store means initialization has not run.
    pub async fn open(path: impl AsRef<Path>) -> DbResult<Self> {
        let path = path.as_ref();

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(false)
            .foreign_keys(true)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| DbError::Connection(format!("{}: {e}", path.display())))?;

        Ok(Self { pool })
    }

    /// Layout version recorded when the store was created (0 for foreign files)
    pub async fn schema_version(&self) -> DbResult<u32> {
        let row: (i64,) = sqlx::query_as("PRAGMA user_version")
            .fetch_one(&self.pool)
            .await?;
        u32::try_from(row.0).map_err(|_| DbError::SchemaVersion(row.0))
    }

    /// Get the connection pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn close(self) {
        self.pool.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn trader_db(dir: &TempDir) -> Database {
        initialize(dir.path()).await.unwrap();
        Database::open(dir.path().join("trader.db")).await.unwrap()
    }

    async fn insert_trade(
        db: &Database,
        symbol: &str,
        quantity: i64,
        status: i64,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO trades (broker, symbol, time, action, quantity, status) VALUES (1, ?, '2021-02-01 14:30:00', 1, ?, ?)",
        )
        .bind(symbol)
        .bind(quantity)
        .bind(status)
        .execute(db.pool())
        .await
        .map(|_| ())
    }

    #[tokio::test]
    async fn test_open_missing_store_fails() {
        let dir = TempDir::new().unwrap();
        let result = Database::open(dir.path().join("trader.db")).await;
        assert!(matches!(result, Err(DbError::Connection(_))));
        assert!(!dir.path().join("trader.db").exists());
    }

    #[tokio::test]
    async fn test_schema_version_recorded() {
        let dir = TempDir::new().unwrap();
        let db = trader_db(&dir).await;
        assert_eq!(db.schema_version().await.unwrap(), SCHEMA_VERSION);
    }

    #[tokio::test]
    async fn test_valid_trade_accepted_with_default_last_updated() {
        let dir = TempDir::new().unwrap();
        let db = trader_db(&dir).await;
        insert_trade(&db, "AAPL", 10, 1).await.unwrap();

        let row: (String,) =
            sqlx::query_as("SELECT CAST(last_updated AS TEXT) FROM trades WHERE symbol = 'AAPL'")
                .fetch_one(db.pool())
                .await
                .unwrap();
        assert!(!row.0.is_empty());
    }

    #[tokio::test]
    async fn test_symbol_longer_than_four_rejected() {
        let dir = TempDir::new().unwrap();
        let db = trader_db(&dir).await;
        assert!(insert_trade(&db, "GOOGL", 1, 1).await.is_err());
    }

    #[tokio::test]
    async fn test_negative_quantity_rejected() {
        let dir = TempDir::new().unwrap();
        let db = trader_db(&dir).await;
        assert!(insert_trade(&db, "AMD", -1, 1).await.is_err());
    }

    #[tokio::test]
    async fn test_unknown_status_rejected() {
        let dir = TempDir::new().unwrap();
        let db = trader_db(&dir).await;
        assert!(insert_trade(&db, "AMD", 1, 99).await.is_err());
    }

    #[tokio::test]
    async fn test_credentials_is_singleton() {
        let dir = TempDir::new().unwrap();
        let db = trader_db(&dir).await;

        let wrong_id = sqlx::query("INSERT INTO credentials VALUES (2, '{}')")
            .execute(db.pool())
            .await;
        assert!(wrong_id.is_err());

        sqlx::query("INSERT INTO credentials VALUES (1, '{}')")
            .execute(db.pool())
            .await
            .unwrap();
        let second = sqlx::query("INSERT INTO credentials VALUES (1, '{}')")
            .execute(db.pool())
            .await;
        assert!(second.is_err());

        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM credentials")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(count.0, 1);
    }

    #[tokio::test]
    async fn test_negative_schema_version_rejected() {
        let dir = TempDir::new().unwrap();
        let db = trader_db(&dir).await;
        sqlx::query("PRAGMA user_version = -1")
            .execute(db.pool())
            .await
            .unwrap();

        assert!(matches!(
            db.schema_version().await,
            Err(DbError::SchemaVersion(-1))
        ));
    }

    #[tokio::test]
    async fn test_status_id_change_cascades_to_trades() {
        let dir = TempDir::new().unwrap();
        let db = trader_db(&dir).await;
        sqlx::query("UPDATE status SET id = 5 WHERE id = 4")
            .execute(db.pool())
            .await
            .unwrap();

        let row: (i64,) = sqlx::query_as("SELECT status FROM trades WHERE symbol = 'TSLA'")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(row.0, 5);
    }

    #[tokio::test]
    async fn test_referenced_broker_cannot_be_deleted() {
        let dir = TempDir::new().unwrap();
        let db = trader_db(&dir).await;
        let result = sqlx::query("DELETE FROM brokers WHERE id = 1")
            .execute(db.pool())
            .await;
        assert!(result.is_err());
    }
}
