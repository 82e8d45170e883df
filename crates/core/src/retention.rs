//! Retention policy for the task list.
//!
//! The list is capped at [`MAX_TASKS`] entries and finished tasks older
//! than [`MAX_TASK_AGE_HOURS`] are dropped. Pending tasks are never
//! pruned by age.

use crate::task::BackgroundTask;
use crate::types::Timestamp;

/// Upper bound on the number of tracked tasks.
pub const MAX_TASKS: usize = 50;

/// Finished tasks older than this are pruned.
pub const MAX_TASK_AGE_HOURS: i64 = 24;

/// Apply the retention policy in place and return how many tasks were removed.
///
/// 1. Drops non-pending tasks created more than 24 hours before `now`.
/// 2. While the list is above the cap, evicts the oldest non-pending task.
/// 3. If only pending tasks remain and the list is still above the cap,
///    evicts the oldest tasks overall.
pub fn prune(tasks: &mut Vec<BackgroundTask>, now: Timestamp) -> usize {
    let before = tasks.len();
    let cutoff = now - chrono::Duration::hours(MAX_TASK_AGE_HOURS);

    tasks.retain(|t| t.is_pending() || t.timestamp >= cutoff);

    while tasks.len() > MAX_TASKS {
        let victim = oldest_index(tasks, |t| !t.is_pending())
            .or_else(|| oldest_index(tasks, |_| true));
        match victim {
            Some(idx) => {
                tasks.remove(idx);
            }
            None => break,
        }
    }

    before - tasks.len()
}

fn oldest_index(tasks: &[BackgroundTask], keep: impl Fn(&BackgroundTask) -> bool) -> Option<usize> {
    tasks
        .iter()
        .enumerate()
        .filter(|(_, t)| keep(t))
        .min_by_key(|(_, t)| t.timestamp)
        .map(|(i, _)| i)
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use serde_json::json;

    use super::*;
    use crate::task::TaskType;

    fn task_at(age_hours: i64, finished: bool) -> BackgroundTask {
        let mut task = BackgroundTask::new(TaskType::TextToImage, "fal-ai/flux/dev", json!({}));
        task.timestamp = Utc::now() - Duration::hours(age_hours);
        if finished {
            task.complete(json!({"images": []})).unwrap();
        }
        task
    }

    #[test]
    fn stale_finished_tasks_are_pruned() {
        let mut tasks = vec![task_at(25, true), task_at(1, true)];
        let removed = prune(&mut tasks, Utc::now());
        assert_eq!(removed, 1);
        assert_eq!(tasks.len(), 1);
    }

    #[test]
    fn stale_pending_tasks_survive() {
        let mut tasks = vec![task_at(48, false)];
        assert_eq!(prune(&mut tasks, Utc::now()), 0);
        assert_eq!(tasks.len(), 1);
    }

    #[test]
    fn stale_failed_tasks_are_pruned() {
        let mut stale = task_at(30, false);
        stale.fail("boom").unwrap();
        let mut tasks = vec![stale];
        prune(&mut tasks, Utc::now());
        assert!(tasks.is_empty());
    }

    #[test]
    fn cap_evicts_finished_before_pending() {
        let mut tasks: Vec<_> = (0..MAX_TASKS as i64).map(|h| task_at(h, false)).collect();
        // Younger than most pending tasks, still evicted first.
        let finished = task_at(2, true);
        let finished_id = finished.id.clone();
        tasks.push(finished);

        prune(&mut tasks, Utc::now());
        assert_eq!(tasks.len(), MAX_TASKS);
        assert!(tasks.iter().all(|t| t.id != finished_id));
    }

    #[test]
    fn cap_evicts_oldest_pending_when_nothing_else() {
        let mut tasks: Vec<_> = (0..(MAX_TASKS as i64 + 3))
            .map(|h| task_at(h, false))
            .collect();
        let oldest = tasks.last().unwrap().id.clone();

        let removed = prune(&mut tasks, Utc::now());
        assert_eq!(removed, 3);
        assert_eq!(tasks.len(), MAX_TASKS);
        assert!(tasks.iter().all(|t| t.id != oldest));
    }

    #[test]
    fn never_exceeds_cap_across_additions() {
        let mut tasks = Vec::new();
        for i in 0..200 {
            tasks.push(task_at(0, i % 3 == 0));
            prune(&mut tasks, Utc::now());
            assert!(tasks.len() <= MAX_TASKS);
        }
    }
}
