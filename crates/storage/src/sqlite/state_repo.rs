use async_trait::async_trait;
use chrono::Utc;
use sqlx::Row;

use crate::repository::{StateRepository, StorageError};

use super::SqliteRepository;

#[async_trait]
impl StateRepository for SqliteRepository {
    async fn load(&self) -> Result<Option<String>, StorageError> {
        let row = sqlx::query("SELECT document FROM engine_state WHERE store_key = ?1")
            .bind(&self.store_key)
            .fetch_optional(&self.pool)
            .await
            .map_err(|err| StorageError::Connection(err.to_string()))?;

        let Some(row) = row else {
            return Ok(None);
        };

        let document: String = row
            .try_get("document")
            .map_err(|err| StorageError::Serialization(err.to_string()))?;
        Ok(Some(document))
    }

    async fn save(&self, document: &str) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO engine_state (store_key, document, updated_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(store_key) DO UPDATE SET
                document = excluded.document,
                updated_at = excluded.updated_at
            ",
        )
        .bind(&self.store_key)
        .bind(document)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(|err| StorageError::Connection(err.to_string()))?;

        Ok(())
    }

    async fn clear(&self) -> Result<(), StorageError> {
        sqlx::query("DELETE FROM engine_state WHERE store_key = ?1")
            .bind(&self.store_key)
            .execute(&self.pool)
            .await
            .map_err(|err| StorageError::Connection(err.to_string()))?;

        Ok(())
    }
}
