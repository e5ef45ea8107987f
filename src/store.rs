// src/store.rs

use chrono::Utc;
use serde::{Serialize, de::DeserializeOwned};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::error::AppError;

/// Collection holding uploaded study resources.
pub const RESOURCES: &str = "resources";
/// Collection holding authored tests.
pub const TESTS: &str = "tests";
/// Collection holding scored test attempts.
pub const TEST_RESULTS: &str = "testResults";

/// A record read back from a collection: the store-assigned id plus the
/// typed payload. Serializes flat, so clients see `{ "id": ..., ...fields }`.
#[derive(Debug, Clone, Serialize)]
pub struct StoredDoc<T> {
    pub id: String,
    #[serde(flatten)]
    pub data: T,
}

/// Thin façade over the `documents` table.
///
/// Deliberately dumb: no transactions, no pushed-down filtering, no
/// pagination. Callers list a whole collection and filter in memory, which
/// matches the access pattern of every page in the portal.
#[derive(Clone)]
pub struct DocStore {
    pool: SqlitePool,
}

impl DocStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Inserts a record into a named collection and returns the generated id.
    pub async fn add<T: Serialize>(
        &self,
        collection: &str,
        record: &T,
    ) -> Result<String, AppError> {
        let id = Uuid::new_v4().to_string();
        let body = serde_json::to_string(record)
            .map_err(|e| AppError::InternalServerError(format!("encode document: {}", e)))?;

        sqlx::query(
            "INSERT INTO documents (id, collection, body, created_at) VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(&id)
        .bind(collection)
        .bind(body)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(id)
    }

    /// Fetches every record in a collection, in insertion order.
    pub async fn list<T: DeserializeOwned>(
        &self,
        collection: &str,
    ) -> Result<Vec<StoredDoc<T>>, AppError> {
        let rows: Vec<(String, String)> =
            sqlx::query_as("SELECT id, body FROM documents WHERE collection = ?1 ORDER BY rowid")
                .bind(collection)
                .fetch_all(&self.pool)
                .await?;

        rows.into_iter()
            .map(|(id, body)| {
                let data = serde_json::from_str::<T>(&body).map_err(|e| {
                    AppError::InternalServerError(format!("corrupt document {}: {}", id, e))
                })?;
                Ok(StoredDoc { id, data })
            })
            .collect()
    }

    /// Out-of-band removal. Only the admin surface calls this; the portal
    /// flows themselves never mutate or delete documents.
    pub async fn delete(&self, collection: &str, id: &str) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM documents WHERE collection = ?1 AND id = ?2")
            .bind(collection)
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
