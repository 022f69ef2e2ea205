mod support;

use axum::http::StatusCode;
use chrono::Utc;
use common_auth::{sign_hs256, BrandClaims};
use serde_json::json;
use support::{get_json, get_json_with_headers, post_json, post_json_with_headers, test_app, ABC_SECRET, ROOT_SECRET};

fn create_body(brand: &str) -> serde_json::Value {
    json!({
        "action": "create",
        "brandId": brand,
        "name": "Summer Open",
        "startDateISO": "2025-08-15",
        "venue": "Park",
    })
}

#[tokio::test]
async fn bearer_jwt_authenticates_create() {
    let harness = test_app();
    let token = sign_hs256(
        &BrandClaims::new("abc", Utc::now().timestamp() + 600),
        ABC_SECRET,
    )
    .unwrap();
    let (status, body) = post_json_with_headers(
        &harness.app,
        create_body("abc"),
        &[("authorization", &format!("Bearer {token}"))],
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["ok"], true);
}

#[tokio::test]
async fn alg_none_is_rejected_with_specific_message() {
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use base64::Engine as _;
    let harness = test_app();
    let header = URL_SAFE_NO_PAD.encode(r#"{"alg":"none","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(format!(
        r#"{{"brand":"abc","exp":{}}}"#,
        Utc::now().timestamp() + 600
    ));
    let forged = format!("{header}.{payload}.");

    let (status, body) = post_json_with_headers(
        &harness.app,
        create_body("abc"),
        &[("authorization", &format!("Bearer {forged}"))],
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Invalid JWT algorithm");
}

#[tokio::test]
async fn brand_mismatch_is_rejected_with_specific_message() {
    let harness = test_app();
    // Well-formed HS256 signed with abc's secret but claiming brand root.
    let token = sign_hs256(
        &BrandClaims::new("root", Utc::now().timestamp() + 600),
        ABC_SECRET,
    )
    .unwrap();
    let (status, body) = post_json_with_headers(
        &harness.app,
        create_body("abc"),
        &[("authorization", &format!("Bearer {token}"))],
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Token brand mismatch");
}

#[tokio::test]
async fn api_key_header_authenticates() {
    let harness = test_app();
    let (status, body) = post_json_with_headers(
        &harness.app,
        create_body("root"),
        &[("x-api-key", ROOT_SECRET)],
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
}

#[tokio::test]
async fn wrong_admin_key_is_generic_bad_input() {
    let harness = test_app();
    let mut body = create_body("root");
    body["adminKey"] = json!("wrong");
    let (status, body) = post_json(&harness.app, body).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "BAD_INPUT");
    assert_eq!(body["message"], "Invalid authentication credentials");
}

#[tokio::test]
async fn origin_must_be_known_or_credentialed() {
    let harness = test_app();
    // Unknown browser origin is rejected outright.
    let (status, body) = post_json_with_headers(
        &harness.app,
        json!({ "action": "logEvents", "brandId": "root", "items": [] }),
        &[("origin", "https://evil.example.net")],
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
    assert_eq!(body["message"], "Request origin not allowed");

    // No origin and no header credentials: also rejected.
    let (status, _) = post_json(
        &harness.app,
        json!({ "action": "logEvents", "brandId": "root", "items": [] }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // A configured tenant hostname passes.
    let (status, body) = post_json_with_headers(
        &harness.app,
        json!({ "action": "logEvents", "brandId": "root", "items": [] }),
        &[("origin", "https://events.example.com")],
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");

    // Localhost always passes (dev tooling).
    let (status, _) = post_json_with_headers(
        &harness.app,
        json!({ "action": "logEvents", "brandId": "root", "items": [] }),
        &[("origin", "http://localhost:5173")],
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn csrf_token_is_single_use_for_browser_writes() {
    let harness = test_app();
    let (status, body) = get_json(&harness.app, "/?action=generateCSRFToken&brand=root").await;
    assert_eq!(status, StatusCode::OK);
    let token = body["value"]["csrfToken"].as_str().unwrap().to_string();

    let mut create = create_body("root");
    create["adminKey"] = json!(ROOT_SECRET);
    create["csrfToken"] = json!(token);

    let (status, body) = post_json_with_headers(
        &harness.app,
        create.clone(),
        &[("origin", "http://localhost:3000")],
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");

    // Replaying the spent token fails.
    let (status, body) = post_json_with_headers(
        &harness.app,
        create,
        &[("origin", "http://localhost:3000")],
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Invalid CSRF token");
}

#[tokio::test]
async fn browser_write_without_csrf_token_is_rejected() {
    let harness = test_app();
    let mut create = create_body("root");
    create["adminKey"] = json!(ROOT_SECRET);
    let (status, body) = post_json_with_headers(
        &harness.app,
        create,
        &[("origin", "http://localhost:3000")],
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Invalid CSRF token");
}

#[tokio::test]
async fn host_header_resolves_tenant() {
    let harness = test_app();
    let (status, body) = get_json_with_headers(
        &harness.app,
        "/?action=status",
        &[("host", "abc.example.com")],
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["value"]["brand"], "abc");

    // brand query param overrides the host.
    let (_, body) = get_json_with_headers(
        &harness.app,
        "/?action=status&brand=root",
        &[("host", "abc.example.com")],
    )
    .await;
    assert_eq!(body["value"]["brand"], "root");

    // Unknown hosts fall back to root.
    let (_, body) = get_json_with_headers(
        &harness.app,
        "/?action=status",
        &[("host", "unknown.example.net")],
    )
    .await;
    assert_eq!(body["value"]["brand"], "root");
}

#[tokio::test]
async fn unknown_brand_is_not_found() {
    let harness = test_app();
    let (status, body) = get_json(&harness.app, "/?action=status&brand=ghost").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NOT_FOUND");
}
