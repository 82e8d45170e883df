//! `mediaforge-worker` -- submit and track fal.ai generation jobs.
//!
//! # Environment variables
//!
//! | Variable               | Required by       | Default                 | Description                         |
//! |------------------------|-------------------|-------------------------|-------------------------------------|
//! | `FAL_KEY`              | `submit` `resume` | --                      | fal.ai API key (`VITE_FAL_KEY` also accepted) |
//! | `FAL_QUEUE_URL`        | --                | `https://queue.fal.run` | Queue base URL                      |
//! | `POLL_INTERVAL_SECS`   | --                | `5`                     | Seconds between status checks       |
//! | `MAX_POLL_ATTEMPTS`    | --                | `120`                   | Status checks before timing out     |
//! | `REQUEST_TIMEOUT_SECS` | --                | `30`                    | Per-request HTTP timeout            |
//! | `TASK_SNAPSHOT_PATH`   | --                | --                      | JSON file persisting the task list  |
//! | `DATABASE_URL`         | `history`         | --                      | Postgres for generation history     |

use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use mediaforge_events::EventBus;
use mediaforge_fal::config::QueueConfig;
use mediaforge_fal::TaskManager;
use mediaforge_worker::cli::{Cli, Command};
use mediaforge_worker::{commands, history};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mediaforge_worker=info,mediaforge_fal=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let cli = Cli::parse();
    let database_url = std::env::var("DATABASE_URL").ok();

    // Only submit and resume reach the queue and need FAL_KEY.
    match cli.command {
        Command::History(args) => commands::show_history(database_url.as_deref(), args).await,
        Command::List(args) => {
            let registry = commands::open_registry(snapshot_path().as_deref()).await?;
            commands::list(&registry, args).await
        }
        Command::Prune => {
            let registry = commands::open_registry(snapshot_path().as_deref()).await?;
            commands::prune(&registry).await
        }
        command => run_queued(command, database_url.as_deref()).await,
    }
}

fn snapshot_path() -> Option<PathBuf> {
    std::env::var("TASK_SNAPSHOT_PATH")
        .ok()
        .filter(|p| !p.trim().is_empty())
        .map(PathBuf::from)
}

async fn run_queued(command: Command, database_url: Option<&str>) -> anyhow::Result<()> {
    let config = QueueConfig::from_env()?;

    let bus = Arc::new(EventBus::default());
    let store = history::open_store(database_url).await?;
    let recorder = history::spawn_recorder(Arc::clone(&store), &bus);

    let manager = TaskManager::from_config(&config, Arc::clone(&bus)).await?;

    let outcome = tokio::select! {
        result = commands::run(command, &manager, &store) => result,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Interrupted, pending tasks stay queued for resume");
            Ok(())
        }
    };

    manager.shutdown().await;
    // Closing the bus lets the recorder drain what was already published.
    drop(manager);
    drop(bus);
    match tokio::time::timeout(Duration::from_secs(5), recorder).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::warn!(error = %e, "History recorder task failed"),
        Err(_) => tracing::warn!("History recorder did not finish in time"),
    }

    outcome
}
