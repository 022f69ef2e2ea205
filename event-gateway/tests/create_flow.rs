mod support;

use axum::http::StatusCode;
use serde_json::json;
use support::{create_event, post_json, test_app, ROOT_SECRET};

#[tokio::test]
async fn create_then_get_roundtrip() {
    let harness = test_app();
    let event = create_event(&harness.app, "root", ROOT_SECRET, "Summer Open").await;

    let id = event["id"].as_str().unwrap();
    assert_eq!(event["name"], "Summer Open");
    assert_eq!(event["startDateISO"], "2025-08-15");
    assert_eq!(event["venue"], "Park");
    assert_eq!(event["slug"], "summer-open");
    assert_eq!(event["createdAtISO"], event["updatedAtISO"]);
    assert_eq!(
        event["links"]["publicUrl"],
        format!("http://svc.test/?page=events&brand=root&id={id}")
    );
    // UUID v4 shape.
    let parsed = uuid::Uuid::parse_str(id).unwrap();
    assert_eq!(parsed.get_version_num(), 4);

    let (status, body) =
        support::get_json(&harness.app, &format!("/?action=get&brand=root&id={id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["value"]["name"], "Summer Open");
    assert_eq!(body["value"]["id"], *id);
    assert!(body["etag"].is_string());
}

#[tokio::test]
async fn concurrent_creates_get_distinct_slugs() {
    let harness = test_app();
    let make = || {
        let app = harness.app.clone();
        async move {
            let (status, body) = post_json(
                &app,
                json!({
                    "action": "create",
                    "brandId": "root",
                    "adminKey": ROOT_SECRET,
                    "name": "Summer Open",
                    "startDateISO": "2025-08-15",
                    "venue": "Park",
                }),
            )
            .await;
            assert_eq!(status, StatusCode::OK);
            body["value"]["slug"].as_str().unwrap().to_string()
        }
    };
    let (a, b) = tokio::join!(make(), make());
    let mut slugs = vec![a, b];
    slugs.sort();
    assert_eq!(slugs, vec!["summer-open", "summer-open-2"]);
}

#[tokio::test]
async fn idempotency_key_collapses_duplicates() {
    let harness = test_app();
    let request = json!({
        "action": "create",
        "brandId": "root",
        "adminKey": ROOT_SECRET,
        "name": "Fall Classic",
        "startDateISO": "2025-10-01",
        "venue": "Hall",
        "idemKey": "k1",
    });
    let (status, body) = post_json(&harness.app, request.clone()).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["ok"], true);

    let (status, body) = post_json(&harness.app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "BAD_INPUT");
    assert_eq!(body["message"], "Duplicate create");
}

#[tokio::test]
async fn create_validates_required_fields() {
    let harness = test_app();
    let base = json!({
        "action": "create",
        "brandId": "root",
        "adminKey": ROOT_SECRET,
        "name": "Ok Name",
        "startDateISO": "2025-08-15",
        "venue": "Park",
    });

    let mut missing_name = base.clone();
    missing_name["name"] = json!("");
    let (_, body) = post_json(&harness.app, missing_name).await;
    assert_eq!(body["message"], "Missing or invalid name");

    let mut bad_date = base.clone();
    bad_date["startDateISO"] = json!("August 15");
    let (_, body) = post_json(&harness.app, bad_date).await;
    assert_eq!(body["message"], "Missing or invalid startDateISO");

    let mut missing_venue = base.clone();
    missing_venue["venue"] = json!("   ");
    let (_, body) = post_json(&harness.app, missing_venue).await;
    assert_eq!(body["message"], "Missing or invalid venue");

    let mut bad_id = base.clone();
    bad_id["id"] = json!("not-a-uuid");
    let (_, body) = post_json(&harness.app, bad_id).await;
    assert_eq!(body["message"], "Invalid id");

    let mut bad_scope = base;
    bad_scope["scope"] = json!("leagues");
    let (_, body) = post_json(&harness.app, bad_scope).await;
    assert_eq!(body["message"], "Scope not allowed for tenant");
}

#[tokio::test]
async fn name_is_sanitized_on_create() {
    let harness = test_app();
    let event = create_event(
        &harness.app,
        "root",
        ROOT_SECRET,
        "<script>Summer</script> Open",
    )
    .await;
    let name = event["name"].as_str().unwrap();
    assert!(!name.contains('<'));
    assert!(!name.contains('>'));
    assert!(name.contains("Open"));
}

#[tokio::test]
async fn update_merges_declared_fields_only() {
    let harness = test_app();
    let event = create_event(&harness.app, "root", ROOT_SECRET, "Summer Open").await;
    let id = event["id"].as_str().unwrap();
    let created_at = event["createdAtISO"].as_str().unwrap().to_string();

    // Millisecond timestamps: make sure the update lands in a later instant.
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;

    let (status, body) = post_json(
        &harness.app,
        json!({
            "action": "update",
            "brandId": "root",
            "adminKey": ROOT_SECRET,
            "id": id,
            "data": { "venue": "Hall", "signupUrl": "https://example.com/signup" },
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let updated = &body["value"];
    assert_eq!(updated["venue"], "Hall");
    assert_eq!(updated["signupUrl"], "https://example.com/signup");
    assert_eq!(updated["id"], *id);
    assert_eq!(updated["slug"], "summer-open");
    assert_eq!(updated["createdAtISO"], created_at);
    assert!(updated["updatedAtISO"].as_str().unwrap() > created_at.as_str());
    // Explicit signup url now feeds the derived link.
    assert_eq!(updated["links"]["signupUrl"], "https://example.com/signup");

    let (_, body) = post_json(
        &harness.app,
        json!({
            "action": "update",
            "brandId": "root",
            "adminKey": ROOT_SECRET,
            "id": id,
            "data": { "hackField": "x" },
        }),
    )
    .await;
    assert_eq!(body["code"], "BAD_INPUT");
    assert_eq!(body["message"], "Unknown field: hackField");

    let (_, body) = post_json(
        &harness.app,
        json!({
            "action": "update",
            "brandId": "root",
            "adminKey": ROOT_SECRET,
            "id": id,
            "data": { "signupUrl": "javascript:alert(1)" },
        }),
    )
    .await;
    assert_eq!(body["message"], "Invalid URL for field: signupUrl");
}

#[tokio::test]
async fn list_paginates_and_filters_by_tenant() {
    let harness = test_app();
    for i in 0..5 {
        create_event(&harness.app, "root", ROOT_SECRET, &format!("Event {i}")).await;
    }
    create_event(&harness.app, "abc", support::ABC_SECRET, "Foreign Event").await;

    let (status, body) =
        support::get_json(&harness.app, "/?action=list&brand=root&limit=2&offset=0").await;
    assert_eq!(status, StatusCode::OK);
    let value = &body["value"];
    assert_eq!(value["items"].as_array().unwrap().len(), 2);
    assert_eq!(value["pagination"]["total"], 5);
    assert_eq!(value["pagination"]["hasMore"], true);

    let (_, body) = support::get_json(&harness.app, "/?action=list&brand=root&offset=4").await;
    let value = &body["value"];
    assert_eq!(value["items"].as_array().unwrap().len(), 1);
    assert_eq!(value["pagination"]["hasMore"], false);

    let (_, body) = support::get_json(&harness.app, "/?action=list&brand=root&limit=0").await;
    assert_eq!(body["code"], "BAD_INPUT");

    // Scope gating applies to reads too.
    let (_, body) = support::get_json(&harness.app, "/?action=list&brand=root&scope=leagues").await;
    assert_eq!(body["message"], "Scope not allowed for tenant");
    let (_, body) =
        support::get_json(&harness.app, "/?action=list&brand=root&scope=events").await;
    assert_eq!(body["ok"], true);
}

#[tokio::test]
async fn legacy_payload_hydrates_to_canonical_shape() {
    use common_store::{Sheet, Store};
    let harness = test_app();
    // Seed a legacy row directly, the way old deployments stored events.
    let legacy = json!({
        "id": "2b0f4aab-9c1d-4f6e-8a9f-1d2e3f4a5b6c",
        "slug": "legacy-cup",
        "name": "Legacy Cup",
        "templateId": "event",
        "dateISO": "2024-05-01",
        "location": "Old Hall",
        "ctaLabels": ["Join now"],
        "createdAtISO": "2024-01-01T00:00:00Z",
        "updatedAtISO": "2024-01-01T00:00:00Z"
    });
    harness
        .state
        .store
        .append(
            "store-root",
            Sheet::Events,
            vec![
                json!("2b0f4aab-9c1d-4f6e-8a9f-1d2e3f4a5b6c"),
                json!("root"),
                json!("event"),
                json!(legacy.to_string()),
                json!("2024-01-01T00:00:00Z"),
                json!("legacy-cup"),
            ],
        )
        .await
        .unwrap();

    let (status, body) = support::get_json(
        &harness.app,
        "/?action=get&brand=root&id=2b0f4aab-9c1d-4f6e-8a9f-1d2e3f4a5b6c",
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let value = &body["value"];
    assert_eq!(value["startDateISO"], "2024-05-01");
    assert_eq!(value["venue"], "Old Hall");
    assert_eq!(value["ctas"]["primary"]["label"], "Join now");
    assert!(value.get("dateISO").is_none());
    assert!(value.get("location").is_none());
}
