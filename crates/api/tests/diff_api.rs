//! Integration tests for the revision diff endpoint.

mod common;

use axum::http::StatusCode;
use common::{body_json, build_test_app, get, save, ALICE};
use serde_json::json;

const BEFORE: [&str; 10] = ["l0", "l1", "l2", "l3", "l4", "l5", "l6", "l7", "l8", "l9"];
const AFTER: [&str; 10] = ["l0", "l1", "l2", "l3", "l4", "L5", "l6", "l7", "l8", "l9"];

async fn app_with_two_revisions() -> axum::Router {
    let app = build_test_app().await;
    save(&app, "Home", &BEFORE, ALICE).await;
    save(&app, "Home", &AFTER, ALICE).await;
    app
}

#[tokio::test]
async fn diff_is_clipped_to_requested_context() {
    let app = app_with_two_revisions().await;
    let response = get(app, "/api/v1/diff?title=Home&left_rev=1&right_rev=current&context=1").await;
    assert_eq!(response.status(), StatusCode::OK);
    let diff = body_json(response).await["data"].clone();

    assert_eq!(diff["left_rev"], 1);
    assert_eq!(diff["right_rev"], 2);
    assert_eq!(diff["summary"]["modified"], 1);

    let ops = diff["ops"].as_array().unwrap();
    let kinds: Vec<&str> = ops.iter().map(|op| op["type"].as_str().unwrap()).collect();
    assert_eq!(kinds, vec!["equal", "equal", "modify", "equal", "equal"]);
    assert_eq!(ops[0]["lines"], json!(["…"]));
    assert_eq!(ops[0]["count"], 4);
    assert_eq!(ops[4]["lines"], json!(["…"]));
    assert_eq!(ops[4]["count"], 3);
    assert_eq!(ops[2]["old_lines"][0], "l5");
    assert_eq!(ops[2]["new_lines"][0], "L5");
    assert!(diff.get("patch").map_or(true, |p| p.is_null()));
}

#[tokio::test]
async fn context_all_disables_clipping_and_patch_is_optional() {
    let app = app_with_two_revisions().await;
    let response = get(
        app,
        "/api/v1/diff?title=Home&left_rev=v1&right_rev=2&context=all&with_patch=true",
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let diff = body_json(response).await["data"].clone();

    let ops = diff["ops"].as_array().unwrap();
    assert!(ops.iter().all(|op| op.get("count").is_none()));
    assert_eq!(ops[0]["type"], "equal");
    assert_eq!(ops[0]["lines"].as_array().unwrap().len(), 5);

    let patch = diff["patch"].as_str().unwrap();
    assert!(patch.starts_with("--- Home@1\n+++ Home@2\n"));
    assert!(patch.contains("-l5\n+L5\n"));
}

#[tokio::test]
async fn identical_revisions_have_no_changes() {
    let app = app_with_two_revisions().await;
    let response = get(app, "/api/v1/diff?title=Home&left_rev=2&right_rev=current").await;
    assert_eq!(response.status(), StatusCode::OK);
    let diff = body_json(response).await["data"].clone();

    assert_eq!(diff["summary"]["added"], 0);
    assert_eq!(diff["summary"]["deleted"], 0);
    assert_eq!(diff["summary"]["modified"], 0);
}

#[tokio::test]
async fn bad_selector_returns_400() {
    let app = app_with_two_revisions().await;
    let response = get(app, "/api/v1/diff?title=Home&left_rev=zero&right_rev=current").await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn revision_beyond_head_returns_404() {
    let app = app_with_two_revisions().await;
    let response = get(app, "/api/v1/diff?title=Home&left_rev=1&right_rev=9").await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
