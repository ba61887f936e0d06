use std::str::FromStr;
use std::time::Duration;

use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use thiserror::Error;

use crate::repository::Storage;

mod migrate;
mod state_repo;

/// Store key used when the caller does not pick one.
pub const DEFAULT_STORE_KEY: &str = "recall-progress";

/// `SQLite`-backed document store; one row per store key.
#[derive(Clone)]
pub struct SqliteRepository {
    pool: SqlitePool,
    store_key: String,
}

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SqliteInitError {
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

impl SqliteRepository {
    /// Connect to `SQLite` using the given URL, creating the database file if
    /// it does not exist yet.
    ///
    /// # Errors
    ///
    /// Returns `SqliteInitError` if the URL is malformed or the connection
    /// cannot be established.
    pub async fn connect(database_url: &str) -> Result<Self, SqliteInitError> {
        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(5))
            .after_connect(|conn, _meta| {
                Box::pin(async move {
                    sqlx::query("PRAGMA journal_mode = WAL;")
                        .execute(&mut *conn)
                        .await?;
                    sqlx::query("PRAGMA busy_timeout = 5000;")
                        .execute(&mut *conn)
                        .await?;
                    Ok(())
                })
            })
            .connect_with(options)
            .await?;
        Ok(Self {
            pool,
            store_key: DEFAULT_STORE_KEY.to_owned(),
        })
    }

    /// Address a different document row in the same database.
    #[must_use]
    pub fn with_store_key(mut self, store_key: impl Into<String>) -> Self {
        self.store_key = store_key.into();
        self
    }

    #[must_use]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    #[must_use]
    pub fn store_key(&self) -> &str {
        &self.store_key
    }

    /// Create tables if they do not exist.
    ///
    /// # Errors
    ///
    /// Returns `SqliteInitError` if migration queries fail.
    pub async fn migrate(&self) -> Result<(), SqliteInitError> {
        migrate::run_migrations(&self.pool).await
    }
}

impl Storage {
    /// Build a `Storage` backed by `SQLite`.
    ///
    /// # Errors
    ///
    /// Returns `SqliteInitError` if connection or migrations cannot be
    /// completed.
    pub async fn sqlite(database_url: &str, store_key: &str) -> Result<Self, SqliteInitError> {
        let repo = SqliteRepository::connect(database_url)
            .await?
            .with_store_key(store_key);
        repo.migrate().await?;
        Ok(Self::from_repository(repo))
    }
}
