//! Repository for the `ai_generations` table.

use mediaforge_core::types::Timestamp;
use sqlx::PgPool;

use crate::models::generation::{Generation, NewGeneration};

/// Column list for `ai_generations` queries.
const COLUMNS: &str = "id, task_id, task_type, endpoint, params, result, media_url, created_at";

/// Provides query operations for the generation history.
pub struct GenerationRepo;

impl GenerationRepo {
    /// Insert a history row, returning it.
    ///
    /// A second insert for the same `task_id` returns the existing row
    /// unchanged.
    pub async fn create(pool: &PgPool, input: &NewGeneration) -> Result<Generation, sqlx::Error> {
        let query = format!(
            "INSERT INTO ai_generations \
                (task_id, task_type, endpoint, params, result, media_url, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             ON CONFLICT (task_id) DO UPDATE SET task_id = EXCLUDED.task_id \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Generation>(&query)
            .bind(&input.task_id)
            .bind(&input.task_type)
            .bind(&input.endpoint)
            .bind(&input.params)
            .bind(&input.result)
            .bind(input.media_url.as_deref())
            .bind(input.created_at)
            .fetch_one(pool)
            .await
    }

    /// Find the history row for a task.
    pub async fn find_by_task_id(
        pool: &PgPool,
        task_id: &str,
    ) -> Result<Option<Generation>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM ai_generations WHERE task_id = $1");
        sqlx::query_as::<_, Generation>(&query)
            .bind(task_id)
            .fetch_optional(pool)
            .await
    }

    /// List history rows newest-first, optionally filtered by task type.
    pub async fn list_recent(
        pool: &PgPool,
        task_type: Option<&str>,
        limit: i64,
    ) -> Result<Vec<Generation>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM ai_generations \
             WHERE ($1::TEXT IS NULL OR task_type = $1) \
             ORDER BY created_at DESC, id DESC \
             LIMIT $2"
        );
        sqlx::query_as::<_, Generation>(&query)
            .bind(task_type)
            .bind(limit)
            .fetch_all(pool)
            .await
    }

    /// Delete rows created before `cutoff`, returning the count removed.
    pub async fn delete_older_than(pool: &PgPool, cutoff: Timestamp) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM ai_generations WHERE created_at < $1")
            .bind(cutoff)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }
}
