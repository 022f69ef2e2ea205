mod support;

use axum::http::StatusCode;
use support::{create_event, get_json, test_app, ABC_SECRET};

#[tokio::test]
async fn single_segment_action_alias_returns_json() {
    let harness = test_app();
    let (status, body) = get_json(&harness.app, "/status").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], true);
    assert_eq!(body["value"]["brand"], "root");
    assert!(body["value"]["db"]["ok"].as_bool().unwrap());
}

#[tokio::test]
async fn brand_prefixed_alias_resolves_that_tenant() {
    let harness = test_app();
    let (status, body) = get_json(&harness.app, "/abc/status").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["value"]["brand"], "abc");
    assert_eq!(body["value"]["db"]["id"], "store-abc");
}

#[tokio::test]
async fn page_alias_serves_the_page_bundle() {
    let harness = test_app();
    let event = create_event(&harness.app, "abc", ABC_SECRET, "Screen Night").await;
    let id = event["id"].as_str().unwrap();

    let (status, body) =
        get_json(&harness.app, &format!("/abc/big-screen?id={id}")).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert!(body["value"]["rotation"]["rotationMs"].is_number());
    assert_eq!(body["value"]["event"]["id"], *id);
}

#[tokio::test]
async fn unknown_alias_is_not_found() {
    let harness = test_app();
    let (status, body) = get_json(&harness.app, "/no-such-alias").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NOT_FOUND");
}

#[tokio::test]
async fn bare_tenant_segment_serves_its_listing() {
    let harness = test_app();
    create_event(&harness.app, "abc", ABC_SECRET, "League Night").await;
    let (status, body) = get_json(&harness.app, "/abc").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["value"]["pagination"]["total"], 1);
}
