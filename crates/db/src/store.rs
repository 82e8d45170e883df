//! Storage backends for the generation history.
//!
//! [`PgGenerationStore`] writes through [`GenerationRepo`];
//! [`MemoryGenerationStore`] keeps rows in process and is used when no
//! `DATABASE_URL` is configured.

use std::cmp::Reverse;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::models::generation::{Generation, NewGeneration};
use crate::repositories::GenerationRepo;
use crate::DbPool;

/// Destination for completed generations.
#[async_trait]
pub trait GenerationStore: Send + Sync {
    /// Record a generation. Recording the same task twice is a no-op.
    async fn record(&self, input: &NewGeneration) -> Result<Generation, sqlx::Error>;

    /// Newest-first listing, optionally filtered by task type.
    async fn list_recent(
        &self,
        task_type: Option<&str>,
        limit: i64,
    ) -> Result<Vec<Generation>, sqlx::Error>;
}

// ---------------------------------------------------------------------------
// Postgres
// ---------------------------------------------------------------------------

pub struct PgGenerationStore {
    pool: DbPool,
}

impl PgGenerationStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl GenerationStore for PgGenerationStore {
    async fn record(&self, input: &NewGeneration) -> Result<Generation, sqlx::Error> {
        GenerationRepo::create(&self.pool, input).await
    }

    async fn list_recent(
        &self,
        task_type: Option<&str>,
        limit: i64,
    ) -> Result<Vec<Generation>, sqlx::Error> {
        GenerationRepo::list_recent(&self.pool, task_type, limit).await
    }
}

// ---------------------------------------------------------------------------
// In-memory
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MemoryGenerationStore {
    rows: RwLock<Vec<Generation>>,
}

impl MemoryGenerationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.rows.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.rows.read().await.is_empty()
    }
}

#[async_trait]
impl GenerationStore for MemoryGenerationStore {
    async fn record(&self, input: &NewGeneration) -> Result<Generation, sqlx::Error> {
        let mut rows = self.rows.write().await;
        if let Some(existing) = rows.iter().find(|g| g.task_id == input.task_id) {
            return Ok(existing.clone());
        }

        let row = Generation {
            id: rows.len() as i64 + 1,
            task_id: input.task_id.clone(),
            task_type: input.task_type.clone(),
            endpoint: input.endpoint.clone(),
            params: input.params.clone(),
            result: input.result.clone(),
            media_url: input.media_url.clone(),
            created_at: input.created_at,
        };
        rows.push(row.clone());
        tracing::debug!(task_id = %row.task_id, "Generation recorded in memory");
        Ok(row)
    }

    async fn list_recent(
        &self,
        task_type: Option<&str>,
        limit: i64,
    ) -> Result<Vec<Generation>, sqlx::Error> {
        let rows = self.rows.read().await;
        let mut matching: Vec<Generation> = rows
            .iter()
            .filter(|g| task_type.map_or(true, |t| g.task_type == t))
            .cloned()
            .collect();
        matching.sort_by_key(|g| Reverse((g.created_at, g.id)));
        matching.truncate(limit.max(0) as usize);
        Ok(matching)
    }
}
