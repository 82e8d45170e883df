//! Generation history wiring.
//!
//! Picks the Postgres store when `DATABASE_URL` is set and the in-memory
//! store otherwise, then feeds it from the event bus.

use std::sync::Arc;

use anyhow::Context;
use mediaforge_db::{GenerationStore, MemoryGenerationStore, PgGenerationStore};
use mediaforge_events::{EventBus, HistoryRecorder};
use tokio::task::JoinHandle;

/// `database_url` when it is set to something other than whitespace.
pub fn configured_url(database_url: Option<&str>) -> Option<&str> {
    database_url.filter(|u| !u.trim().is_empty())
}

/// Open the history store for `database_url`, falling back to memory.
pub async fn open_store(database_url: Option<&str>) -> anyhow::Result<Arc<dyn GenerationStore>> {
    match configured_url(database_url) {
        Some(url) => connect(url).await,
        None => {
            tracing::info!("DATABASE_URL not set, generation history kept in memory");
            Ok(Arc::new(MemoryGenerationStore::new()))
        }
    }
}

/// Connect to the Postgres history store, running migrations first.
pub async fn connect(url: &str) -> anyhow::Result<Arc<dyn GenerationStore>> {
    let pool = mediaforge_db::create_pool(url)
        .await
        .context("failed to connect to the history database")?;
    mediaforge_db::health_check(&pool).await?;
    mediaforge_db::run_migrations(&pool)
        .await
        .context("failed to apply history migrations")?;

    tracing::info!("Generation history stored in Postgres");
    Ok(Arc::new(PgGenerationStore::new(pool)))
}

/// Start recording completed tasks published on `bus`.
pub fn spawn_recorder(store: Arc<dyn GenerationStore>, bus: &EventBus) -> JoinHandle<()> {
    let receiver = bus.subscribe();
    tokio::spawn(HistoryRecorder::run(store, receiver))
}

#[cfg(test)]
mod tests {
    use mediaforge_core::task::{BackgroundTask, TaskType};
    use mediaforge_events::TaskEvent;
    use serde_json::json;

    use super::*;

    #[test]
    fn blank_url_is_not_configured() {
        assert_eq!(configured_url(None), None);
        assert_eq!(configured_url(Some("  ")), None);
        assert_eq!(configured_url(Some("postgres://db")), Some("postgres://db"));
    }

    #[tokio::test]
    async fn missing_url_uses_memory_store() {
        let store = open_store(None).await.unwrap();
        assert!(store.list_recent(None, 10).await.unwrap().is_empty());

        let store = open_store(Some("  ")).await.unwrap();
        assert!(store.list_recent(None, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn recorder_writes_completed_tasks() {
        let store = open_store(None).await.unwrap();
        let bus = EventBus::new(16);
        let handle = spawn_recorder(Arc::clone(&store), &bus);

        let params = json!({"prompt": "p"});
        let mut task = BackgroundTask::new(TaskType::TextToImage, "fal-ai/flux/dev", params);
        task.complete(json!({"images": [{"url": "https://cdn/a.png"}]}))
            .unwrap();
        bus.publish(TaskEvent::completed(task));
        drop(bus);

        handle.await.unwrap();
        let rows = store.list_recent(None, 10).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].media_url.as_deref(), Some("https://cdn/a.png"));
    }
}
