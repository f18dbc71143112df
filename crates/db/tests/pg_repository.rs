//! Integration tests for the PostgreSQL repository.
//!
//! Each test gets a fresh database with migrations applied. They need a
//! reachable server in `DATABASE_URL` and are ignored by default; run them
//! with `cargo test -p revwiki-db -- --ignored`.

use std::sync::Arc;

use assert_matches::assert_matches;
use revwiki_core::error::CoreError;
use revwiki_core::json_patch::PatchOp;
use revwiki_core::repository::{NewRevision, PageRepository};
use revwiki_core::revision_store::{RevisionStore, RevisionStoreConfig, SavePage};
use revwiki_db::PgRepository;
use serde_json::json;
use sqlx::PgPool;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn insert_user(pool: &PgPool, name: &str) -> i64 {
    let (id,): (i64,) =
        sqlx::query_as("INSERT INTO users (display_name) VALUES ($1) RETURNING id")
            .bind(name)
            .fetch_one(pool)
            .await
            .unwrap();
    id
}

fn snapshot(page_id: i64, rev_number: i32, author_id: i64) -> NewRevision {
    NewRevision {
        page_id,
        rev_number,
        is_snapshot: true,
        content: Some(json!({"type": "doc", "content": []})),
        diff: vec![PatchOp::Add {
            path: "/type".into(),
            value: json!("doc"),
        }],
        base_rev: None,
        summary: Some("init".into()),
        author_id,
    }
}

fn doc_with(text: &str) -> serde_json::Value {
    json!({
        "type": "doc",
        "content": [{"type": "paragraph", "content": [{"type": "text", "text": text}]}]
    })
}

// ---------------------------------------------------------------------------
// Schema
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn health_check_and_empty_counts(pool: PgPool) {
    revwiki_db::health_check(&pool).await.unwrap();
    let repo = PgRepository::new(pool);
    repo.health_check().await.unwrap();
    assert_eq!(repo.count_pages().await.unwrap(), 0);
    assert_eq!(repo.count_revisions(None).await.unwrap(), 0);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn duplicate_title_is_a_conflict(pool: PgPool) {
    let author = insert_user(&pool, "alice").await;
    let repo = PgRepository::new(pool);

    let page = repo.insert_page("Home", author).await.unwrap();
    assert_eq!(page.current_rev_number, 0);
    assert!(page.current_rev_id.is_none());

    let err = repo.insert_page("Home", author).await.unwrap_err();
    assert_matches!(err, CoreError::Conflict(msg) if msg.contains("uq_pages_title"));
}

// ---------------------------------------------------------------------------
// Commit
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn commit_advances_head_and_round_trips_diff(pool: PgPool) {
    let author = insert_user(&pool, "alice").await;
    let repo = PgRepository::new(pool);
    let page = repo.insert_page("Home", author).await.unwrap();

    let input = snapshot(page.id, 1, author);
    let materialized = input.content.clone().unwrap();
    let rev = repo.commit_revision(&input, None, &materialized).await.unwrap();
    assert_eq!(rev.rev_number, 1);
    assert_eq!(rev.diff.as_deref(), Some(input.diff.as_slice()));

    let page = repo.find_page_by_title("Home").await.unwrap().unwrap();
    assert_eq!(page.current_rev_id, Some(rev.id));
    assert_eq!(page.current_rev_number, 1);
    assert_eq!(page.content, Some(materialized));

    let by_id = repo.find_revision_by_id(rev.id).await.unwrap().unwrap();
    assert_eq!(by_id, rev);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn stale_head_is_rejected_without_side_effects(pool: PgPool) {
    let author = insert_user(&pool, "alice").await;
    let repo = PgRepository::new(pool);
    let page = repo.insert_page("Home", author).await.unwrap();

    let first = snapshot(page.id, 1, author);
    let doc = first.content.clone().unwrap();
    let rev1 = repo.commit_revision(&first, None, &doc).await.unwrap();

    // Expected head None is stale now.
    let second = NewRevision {
        rev_number: 2,
        is_snapshot: false,
        content: None,
        base_rev: Some(rev1.id),
        ..snapshot(page.id, 2, author)
    };
    let err = repo.commit_revision(&second, None, &doc).await.unwrap_err();
    assert_matches!(err, CoreError::Conflict(_));
    assert_eq!(repo.count_revisions(Some(page.id)).await.unwrap(), 1);

    // Same revision number twice hits the unique constraint.
    let err = repo
        .commit_revision(&first, Some(rev1.id), &doc)
        .await
        .unwrap_err();
    assert_matches!(err, CoreError::Conflict(msg) if msg.contains("uq_revisions_page_rev"));
}

// ---------------------------------------------------------------------------
// Store end to end
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn store_reconstructs_across_snapshots(pool: PgPool) {
    let author = insert_user(&pool, "alice").await;
    let repo = Arc::new(PgRepository::new(pool));
    let config = RevisionStoreConfig {
        snapshot_threshold: 3,
        ..RevisionStoreConfig::default()
    };
    let store = RevisionStore::new(repo.clone(), config).unwrap();

    for n in 1..=7 {
        store
            .save_page(SavePage {
                title: "Home".into(),
                content: doc_with(&format!("version {n}")),
                summary: None,
                author_id: author,
                with_line_diff: false,
            })
            .await
            .unwrap();
    }

    let page = repo.find_page_by_title("Home").await.unwrap().unwrap();
    assert_eq!(page.current_rev_number, 7);
    for n in 1..=7 {
        let doc = store.reconstruct(page.id, n).await.unwrap();
        assert_eq!(doc, doc_with(&format!("version {n}")));
    }

    let snapshot_numbers: Vec<i32> = repo
        .find_deltas_in_range(page.id, 0, 7)
        .await
        .unwrap()
        .into_iter()
        .filter(|r| r.is_snapshot)
        .map(|r| r.rev_number)
        .collect();
    assert_eq!(snapshot_numbers, vec![1, 3, 6]);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn history_and_recent_listings_join_author_names(pool: PgPool) {
    let alice = insert_user(&pool, "alice").await;
    let repo = Arc::new(PgRepository::new(pool));
    let store = RevisionStore::new(repo.clone(), RevisionStoreConfig::default()).unwrap();

    for (title, text) in [("Home", "a"), ("About", "b"), ("Home", "c")] {
        store
            .save_page(SavePage {
                title: title.into(),
                content: doc_with(text),
                summary: Some(format!("edit {text}")),
                author_id: alice,
                with_line_diff: false,
            })
            .await
            .unwrap();
    }

    let home = repo.find_page_by_title("Home").await.unwrap().unwrap();
    let history = repo.list_page_revisions(home.id, 10, 0).await.unwrap();
    let numbers: Vec<i32> = history.iter().map(|r| r.rev_number).collect();
    assert_eq!(numbers, vec![2, 1]);
    assert!(history.iter().all(|r| r.author_name.as_deref() == Some("alice")));

    let recent = repo.list_recent_revisions(10, 0).await.unwrap();
    let titles: Vec<&str> = recent.iter().map(|r| r.title.as_str()).collect();
    assert_eq!(titles, vec!["Home", "About", "Home"]);
    assert_eq!(repo.count_revisions(None).await.unwrap(), 3);

    let pages = repo.list_recent_pages(10, 0).await.unwrap();
    assert_eq!(pages.len(), 2);
    assert_eq!(pages[0].title, "Home");
    assert_eq!(repo.count_pages().await.unwrap(), 2);
}
