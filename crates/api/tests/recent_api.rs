//! Integration tests for the recent-changes feeds.

mod common;

use axum::http::StatusCode;
use common::{body_json, build_test_app, get, save, ALICE, BOB};

#[tokio::test]
async fn recent_changes_report_character_deltas() {
    let app = build_test_app().await;
    save(&app, "Home", &["Hello"], ALICE).await;
    save(&app, "Home", &["Hello world"], BOB).await;
    save(&app, "About", &["abc"], ALICE).await;

    let response = get(app, "/api/v1/recent-changes").await;
    assert_eq!(response.status(), StatusCode::OK);
    let data = body_json(response).await["data"].clone();

    let changes = data["changes"].as_array().unwrap();
    assert_eq!(changes.len(), 3);

    assert_eq!(changes[0]["title"], "About");
    assert_eq!(changes[0]["added_count"], 3);

    assert_eq!(changes[1]["title"], "Home");
    assert_eq!(changes[1]["rev_number"], 2);
    assert_eq!(changes[1]["modifier"], "bob");
    assert_eq!(changes[1]["added_count"], 6);
    assert_eq!(changes[1]["removed_count"], 0);
    assert_eq!(changes[1]["modified_count"], 0);

    assert_eq!(changes[2]["added_count"], 5);
    assert_eq!(data["pagination"]["total_count"], 3);
    assert_eq!(data["pagination"]["limit"], 10);
}

#[tokio::test]
async fn recent_changes_paginate() {
    let app = build_test_app().await;
    for text in ["a", "ab", "abc", "abcd"] {
        save(&app, "Home", &[text], ALICE).await;
    }

    let response = get(app, "/api/v1/recent-changes?limit=2&offset=1").await;
    let data = body_json(response).await["data"].clone();

    let numbers: Vec<i64> = data["changes"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["rev_number"].as_i64().unwrap())
        .collect();
    assert_eq!(numbers, vec![3, 2]);
    assert_eq!(data["pagination"]["has_more"], true);
    assert_eq!(data["pagination"]["total_pages"], 2);
}

#[tokio::test]
async fn recent_pages_are_most_recently_updated_first() {
    let app = build_test_app().await;
    save(&app, "Home", &["one"], ALICE).await;
    save(&app, "About", &["two"], ALICE).await;
    save(&app, "Home", &["three"], ALICE).await;

    let response = get(app, "/api/v1/recent-changes/pages").await;
    assert_eq!(response.status(), StatusCode::OK);
    let data = body_json(response).await["data"].clone();

    let titles: Vec<&str> = data["pages"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["title"].as_str().unwrap())
        .collect();
    assert_eq!(titles, vec!["Home", "About"]);
    assert_eq!(data["pages"][0]["current_rev_number"], 2);
    assert_eq!(data["pagination"]["total_count"], 2);
}
