use std::path::Path;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use mediaforge_core::task::TaskType;
use serde_json::Value;

#[derive(Debug, Parser)]
#[command(
    name = "mediaforge-worker",
    version,
    about = "Submit and track fal.ai generation jobs"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Queue a generation job.
    Submit(SubmitArgs),
    /// Show tracked tasks, newest first.
    List(ListArgs),
    /// Apply the retention policy and drop finished tasks.
    Prune,
    /// Resume polling for pending tasks from the snapshot and wait for them.
    Resume,
    /// Show generations recorded in the `DATABASE_URL` database.
    History(HistoryArgs),
}

#[derive(Debug, Clone, Args)]
pub struct SubmitArgs {
    #[arg(long = "type", value_name = "KIND", value_parser = parse_task_type)]
    pub task_type: TaskType,

    /// Inline JSON object or a path to a JSON file.
    #[arg(long, value_name = "FILE|JSON")]
    pub params: String,

    /// Model endpoint, defaults to the tool's standard endpoint.
    #[arg(long, value_name = "OWNER/APP")]
    pub endpoint: Option<String>,

    /// Return once the job is queued instead of waiting for it.
    #[arg(long)]
    pub no_wait: bool,
}

#[derive(Debug, Clone, Args)]
pub struct ListArgs {
    #[arg(long = "type", value_name = "KIND", value_parser = parse_task_type)]
    pub task_type: Option<TaskType>,
}

#[derive(Debug, Clone, Args)]
pub struct HistoryArgs {
    #[arg(long = "type", value_name = "KIND", value_parser = parse_task_type)]
    pub task_type: Option<TaskType>,

    #[arg(long, default_value_t = 20)]
    pub limit: i64,
}

fn parse_task_type(raw: &str) -> Result<TaskType, String> {
    raw.parse::<TaskType>().map_err(|e| e.to_string())
}

/// Read job parameters given inline or as a file path.
///
/// The result must be a JSON object.
pub fn load_params(raw: &str) -> anyhow::Result<Value> {
    let trimmed = raw.trim_start();
    let value: Value = if trimmed.starts_with('{') {
        serde_json::from_str(raw).context("--params is not valid JSON")?
    } else {
        let path = Path::new(raw);
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read params file {}", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("params file {} is not valid JSON", path.display()))?
    };

    anyhow::ensure!(value.is_object(), "--params must be a JSON object");
    Ok(value)
}
