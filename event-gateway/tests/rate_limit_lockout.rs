mod support;

use axum::http::StatusCode;
use serde_json::json;
use support::{
    get_json_with_headers, post_json_with_headers, test_app, test_app_with, test_config,
    ROOT_SECRET,
};

#[tokio::test]
async fn eleventh_request_in_window_is_rate_limited() {
    let mut config = test_config();
    config.rate_limit_per_minute = 10;
    let harness = test_app_with(config);

    for i in 0..10 {
        let (status, body) = get_json_with_headers(
            &harness.app,
            "/?action=status&brand=root",
            &[("x-forwarded-for", "9.9.9.9")],
        )
        .await;
        assert_eq!(status, StatusCode::OK, "request {i} failed: {body}");
    }
    let (status, body) = get_json_with_headers(
        &harness.app,
        "/?action=status&brand=root",
        &[("x-forwarded-for", "9.9.9.9")],
    )
    .await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["code"], "RATE_LIMITED");

    // A different client IP still gets through.
    let (status, _) = get_json_with_headers(
        &harness.app,
        "/?action=status&brand=root",
        &[("x-forwarded-for", "8.8.8.8")],
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn five_auth_failures_lock_the_client_out() {
    let harness = test_app();
    let bad_create = json!({
        "action": "create",
        "brandId": "root",
        "adminKey": "wrong-secret",
        "name": "Summer Open",
        "startDateISO": "2025-08-15",
        "venue": "Park",
    });

    for i in 0..5 {
        let (status, body) = post_json_with_headers(
            &harness.app,
            bad_create.clone(),
            &[("x-forwarded-for", "6.6.6.6")],
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "attempt {i}: {body}");
        assert_eq!(body["message"], "Invalid authentication credentials");
    }

    // Locked out now, even with the correct key.
    let mut good_create = bad_create.clone();
    good_create["adminKey"] = json!(ROOT_SECRET);
    let (status, body) = post_json_with_headers(
        &harness.app,
        good_create.clone(),
        &[("x-forwarded-for", "6.6.6.6")],
    )
    .await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["code"], "RATE_LIMITED");

    // Reads from the same client are also locked out for this tenant.
    let (status, _) = get_json_with_headers(
        &harness.app,
        "/?action=status&brand=root",
        &[("x-forwarded-for", "6.6.6.6")],
    )
    .await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);

    // An unaffected IP can still create.
    let (status, body) = post_json_with_headers(
        &harness.app,
        good_create,
        &[("x-forwarded-for", "7.7.7.7")],
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
}
