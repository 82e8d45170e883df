//! Integration tests for the generation history repository.
//!
//! Run against a real Postgres instance:
//! `DATABASE_URL=postgres://... cargo test -p mediaforge-db -- --ignored`

use chrono::{Duration, Utc};
use mediaforge_db::models::generation::{Generation, NewGeneration};
use mediaforge_db::repositories::GenerationRepo;
use serde_json::json;
use sqlx::PgPool;

fn new_generation(task_id: &str, task_type: &str, age_hours: i64) -> NewGeneration {
    NewGeneration {
        task_id: task_id.to_string(),
        task_type: task_type.to_string(),
        endpoint: "fal-ai/flux/dev".to_string(),
        params: json!({"prompt": "a red sneaker on white"}),
        result: json!({"images": [{"url": "https://cdn/a.png"}]}),
        media_url: Some("https://cdn/a.png".to_string()),
        created_at: Utc::now() - Duration::hours(age_hours),
    }
}

async fn insert(pool: &PgPool, task_id: &str, task_type: &str, age_hours: i64) -> Generation {
    let input = new_generation(task_id, task_type, age_hours);
    GenerationRepo::create(pool, &input).await.unwrap()
}

async fn find(pool: &PgPool, id: &str) -> Option<Generation> {
    GenerationRepo::find_by_task_id(pool, id).await.unwrap()
}

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore = "requires DATABASE_URL"]
async fn create_and_find(pool: PgPool) {
    let created = insert(&pool, "t-1", "text-to-image", 0).await;
    assert_eq!(created.task_id, "t-1");
    assert_eq!(created.result["images"][0]["url"], "https://cdn/a.png");

    let found = find(&pool, "t-1").await.unwrap();
    assert_eq!(found.id, created.id);
    assert!(find(&pool, "missing").await.is_none());
}

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore = "requires DATABASE_URL"]
async fn duplicate_task_id_keeps_single_row(pool: PgPool) {
    let first = insert(&pool, "dup", "text-to-image", 0).await;
    let second = insert(&pool, "dup", "text-to-image", 0).await;
    assert_eq!(first.id, second.id);

    let all = GenerationRepo::list_recent(&pool, None, 10).await.unwrap();
    assert_eq!(all.len(), 1);
}

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore = "requires DATABASE_URL"]
async fn list_recent_filters_by_type(pool: PgPool) {
    insert(&pool, "a", "text-to-image", 2).await;
    insert(&pool, "b", "image-to-video", 1).await;
    insert(&pool, "c", "text-to-image", 0).await;

    let images = GenerationRepo::list_recent(&pool, Some("text-to-image"), 10)
        .await
        .unwrap();
    let ids: Vec<_> = images.iter().map(|g| g.task_id.as_str()).collect();
    assert_eq!(ids, ["c", "a"]);
}

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore = "requires DATABASE_URL"]
async fn delete_older_than_prunes_stale_rows(pool: PgPool) {
    insert(&pool, "stale", "text-to-image", 48).await;
    insert(&pool, "fresh", "text-to-image", 1).await;

    let cutoff = Utc::now() - Duration::hours(24);
    let deleted = GenerationRepo::delete_older_than(&pool, cutoff).await.unwrap();
    assert_eq!(deleted, 1);
    assert!(find(&pool, "fresh").await.is_some());
}
