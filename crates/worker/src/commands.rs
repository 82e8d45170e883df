//! Command handlers. Each prints JSON to stdout.

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use mediaforge_core::task::{BackgroundTask, TaskStatus};
use mediaforge_db::GenerationStore;
use mediaforge_events::EventBus;
use mediaforge_fal::{TaskManager, TaskRegistry};
use serde::Serialize;

use crate::cli::{load_params, Command, HistoryArgs, ListArgs, SubmitArgs};
use crate::history;

/// Dispatch a parsed command against a running manager.
pub async fn run(
    command: Command,
    manager: &TaskManager,
    store: &Arc<dyn GenerationStore>,
) -> anyhow::Result<()> {
    match command {
        Command::Submit(args) => submit(manager, args).await,
        Command::List(args) => list(manager.registry(), args).await,
        Command::Prune => prune(manager.registry()).await,
        Command::Resume => resume(manager).await,
        Command::History(args) => history(store.as_ref(), args).await,
    }
}

/// Load the task list without a queue connection.
///
/// With no snapshot configured the list starts empty and nothing is saved.
pub async fn open_registry(snapshot_path: Option<&Path>) -> anyhow::Result<TaskRegistry> {
    let bus = Arc::new(EventBus::default());
    match snapshot_path {
        Some(path) => TaskRegistry::load(bus, path)
            .await
            .with_context(|| format!("failed to load task snapshot {}", path.display())),
        None => {
            tracing::warn!("TASK_SNAPSHOT_PATH not set, the task list is empty");
            Ok(TaskRegistry::new(bus))
        }
    }
}

pub async fn submit(manager: &TaskManager, args: SubmitArgs) -> anyhow::Result<()> {
    let params = load_params(&args.params)?;
    let task_id = manager
        .submit_task(args.task_type, params, args.endpoint.as_deref())
        .await
        .context("submission failed")?;

    if args.no_wait {
        print_json(&serde_json::json!({ "task_id": task_id }))?;
        return Ok(());
    }

    let task = manager.wait_for(&task_id).await?;
    print_json(&task)?;
    ensure_completed(&task)
}

pub async fn list(registry: &TaskRegistry, args: ListArgs) -> anyhow::Result<()> {
    let tasks = match args.task_type {
        Some(task_type) => registry.list_by_type(task_type).await,
        None => registry.list().await,
    };
    print_json(&tasks)
}

pub async fn prune(registry: &TaskRegistry) -> anyhow::Result<()> {
    let expired = registry.cleanup().await;
    let finished = registry.clear_finished().await;
    let remaining = registry.len().await;
    tracing::info!(expired, finished, remaining, "Pruned task list");
    print_json(&serde_json::json!({
        "removed": expired + finished,
        "remaining": remaining,
    }))
}

/// Resume every pending task and wait for all of them.
pub async fn resume(manager: &TaskManager) -> anyhow::Result<()> {
    let queued: Vec<String> = manager
        .registry()
        .pending()
        .await
        .into_iter()
        .filter(|t| t.request_id.is_some())
        .map(|t| t.id)
        .collect();

    let resumed = manager.resume_pending().await;
    tracing::info!(resumed, "Waiting for resumed tasks");

    let mut finished = Vec::new();
    for id in &queued {
        finished.push(manager.wait_for(id).await?);
    }
    print_json(&finished)
}

/// Print generations recorded in the database at `database_url`.
///
/// The in-memory store only lives inside a running worker, so reading
/// history requires a database.
pub async fn show_history(database_url: Option<&str>, args: HistoryArgs) -> anyhow::Result<()> {
    let Some(url) = history::configured_url(database_url) else {
        anyhow::bail!("DATABASE_URL must be set to read generation history");
    };
    let store = history::connect(url).await?;
    history(store.as_ref(), args).await
}

pub async fn history(store: &dyn GenerationStore, args: HistoryArgs) -> anyhow::Result<()> {
    let task_type = args.task_type.map(|t| t.to_string());
    let rows = store
        .list_recent(task_type.as_deref(), args.limit)
        .await
        .context("failed to read generation history")?;
    print_json(&rows)
}

fn ensure_completed(task: &BackgroundTask) -> anyhow::Result<()> {
    match task.status {
        TaskStatus::Completed => Ok(()),
        _ => anyhow::bail!(
            "task {} did not complete: {}",
            task.id,
            task.error.as_deref().unwrap_or(&task.progress)
        ),
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::Parser;
    use mediaforge_core::task::TaskType;
    use mediaforge_db::models::generation::NewGeneration;
    use mediaforge_db::MemoryGenerationStore;
    use serde_json::json;

    use super::*;
    use crate::cli::Cli;

    fn relight() -> BackgroundTask {
        BackgroundTask::new(TaskType::Relight, "fal-ai/iclight-v2", json!({}))
    }

    fn history_args(argv: &[&str]) -> HistoryArgs {
        match Cli::try_parse_from(argv).unwrap().command {
            Command::History(args) => args,
            other => panic!("expected history, got {other:?}"),
        }
    }

    #[test]
    fn failed_task_is_an_error() {
        let mut task = relight();
        task.fail("Rate limit exceeded").unwrap();

        let err = ensure_completed(&task).unwrap_err();
        assert!(err.to_string().contains("Rate limit exceeded"));
    }

    #[test]
    fn completed_task_is_ok() {
        let mut task = relight();
        task.complete(json!({"images": []})).unwrap();

        assert!(ensure_completed(&task).is_ok());
    }

    #[tokio::test]
    async fn history_without_database_names_the_missing_variable() {
        let args = history_args(&["mediaforge-worker", "history"]);

        let err = show_history(None, args).await.unwrap_err().to_string();
        assert!(err.contains("DATABASE_URL"), "{err}");
        assert!(!err.contains("FAL_KEY"), "{err}");

        let args = history_args(&["mediaforge-worker", "history", "--limit", "5"]);
        assert!(show_history(Some(" "), args).await.is_err());
    }

    #[tokio::test]
    async fn history_reads_the_store() {
        let store = MemoryGenerationStore::new();
        let mut task = relight();
        task.complete(json!({"images": [{"url": "https://cdn/r.png"}]}))
            .unwrap();
        let input = NewGeneration::from_task(&task).unwrap();
        store.record(&input).await.unwrap();

        let args = history_args(&["mediaforge-worker", "history", "--type", "relight"]);
        history(&store, args).await.unwrap();
    }

    #[tokio::test]
    async fn list_and_prune_work_without_a_queue() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tasks.json");

        let registry = open_registry(Some(&path)).await.unwrap();
        let done = registry.insert(relight()).await;
        registry
            .complete(&done.id, json!({"images": [{"url": "https://cdn/r.png"}]}))
            .await
            .unwrap();
        registry.insert(relight()).await;
        drop(registry);

        let registry = open_registry(Some(&path)).await.unwrap();
        assert_eq!(registry.len().await, 2);
        list(&registry, ListArgs { task_type: None }).await.unwrap();
        prune(&registry).await.unwrap();

        let registry = open_registry(Some(&path)).await.unwrap();
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn missing_snapshot_path_gives_an_empty_list() {
        let registry = open_registry(None).await.unwrap();
        assert!(registry.is_empty().await);
    }
}
