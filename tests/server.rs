use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use tempfile::TempDir;
use tower::ServiceExt;

use content_portal::config::Config;
use content_portal::llm::DisabledChat;
use content_portal::portal::Portal;
use content_portal::sqlite_store::SqliteStore;
use content_portal::{db, migrate, server, webhook};

async fn app_with(mut config: Config, dir: &TempDir) -> Router {
    config.db.path = dir.path().join("portal.sqlite");
    let pool = db::connect(&config).await.unwrap();
    migrate::create_schema(&pool).await.unwrap();
    let portal = Portal::from_parts(config, Arc::new(SqliteStore::new(pool)), Arc::new(DisabledChat))
        .await
        .unwrap();
    server::router(Arc::new(portal))
}

async fn app(dir: &TempDir) -> Router {
    let mut config = Config::minimal(dir.path().join("portal.sqlite"));
    config.webhook.secret_env = "PORTAL_TEST_UNSET_SECRET".to_string();
    app_with(config, dir).await
}

fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Vec<u8>) {
    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    (status, bytes.to_vec())
}

async fn send_json(app: &Router, req: Request<Body>) -> (StatusCode, serde_json::Value) {
    let (status, bytes) = send(app, req).await;
    let value = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
    (status, value)
}

fn cms_event(kind: &str, id: &str, fields: serde_json::Value) -> serde_json::Value {
    serde_json::json!({
        "triggerType": kind,
        "payload": { "id": id, "fieldData": fields }
    })
}

#[tokio::test]
async fn test_health() {
    let dir = TempDir::new().unwrap();
    let app = app(&dir).await;
    let req = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let (status, body) = send_json(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn test_empty_search_is_bad_request() {
    let dir = TempDir::new().unwrap();
    let app = app(&dir).await;
    let (status, body) = send_json(&app, json_request("POST", "/search", serde_json::json!({"query": "  "}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "bad_request");
}

#[tokio::test]
async fn test_webhook_lifecycle_feeds_search_and_export() {
    let dir = TempDir::new().unwrap();
    let app = app(&dir).await;

    let created = cms_event(
        "collection_item_created",
        "wf-100",
        serde_json::json!({
            "name": "Frisco ISD Graduation Story",
            "slug": "frisco-isd",
            "type": "customer story",
            "state": "Texas",
            "summary": "How Frisco tracks graduation readiness.",
            "tags": ["graduation", "counselors"]
        }),
    );
    let (status, body) = send_json(&app, json_request("POST", "/webhooks/cms", created)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["action"], "created");
    let id = body["id"].as_str().unwrap().to_string();

    let (status, body) = send_json(
        &app,
        json_request("POST", "/search", serde_json::json!({"query": "texs customer stories"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["parsed"]["states"], serde_json::json!(["TX"]));
    assert_eq!(body["results"][0]["title"], "Frisco ISD Graduation Story");
    assert_eq!(body["results"][0]["type"], "Customer Story");

    let changed = cms_event(
        "collection_item_changed",
        "wf-100",
        serde_json::json!({"name": "Frisco ISD: Graduation Story", "slug": "frisco-isd", "type": "Customer Story"}),
    );
    let (status, body) = send_json(&app, json_request("POST", "/webhooks/cms", changed)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["action"], "updated");
    assert_eq!(body["id"], id.as_str());

    let (status, csv) = send(&app, json_request("POST", "/export/csv", serde_json::json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    let csv = String::from_utf8(csv).unwrap();
    let lines: Vec<&str> = csv.split('\n').collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[1].starts_with("\"Frisco ISD: Graduation Story\",\"Customer Story\",\"TX\""));
    assert!(lines[1].contains("https://www.schoolinks.com/resources/frisco-isd"));

    let deleted = cms_event("collection_item_deleted", "wf-100", serde_json::json!({}));
    let (status, body) = send_json(&app, json_request("POST", "/webhooks/cms", deleted)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["action"], "deleted");
    assert_eq!(body["count"], 1);

    let req = Request::builder().uri("/stats").body(Body::empty()).unwrap();
    let (_, stats) = send_json(&app, req).await;
    assert_eq!(stats["total"], 0);
}

#[tokio::test]
async fn test_webhook_signature_enforced_when_secret_set() {
    let dir = TempDir::new().unwrap();
    let mut config = Config::minimal(dir.path().join("portal.sqlite"));
    config.webhook.secret_env = "PORTAL_TEST_WEBHOOK_SECRET".to_string();
    std::env::set_var("PORTAL_TEST_WEBHOOK_SECRET", "hush");
    let app = app_with(config, &dir).await;

    let body = cms_event("collection_item_created", "wf-7", serde_json::json!({"name": "Signed"})).to_string();

    let unsigned = Request::builder()
        .method("POST")
        .uri("/webhooks/cms")
        .header("content-type", "application/json")
        .body(Body::from(body.clone()))
        .unwrap();
    let (status, err) = send_json(&app, unsigned).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(err["error"]["code"], "unauthorized");

    let bad = Request::builder()
        .method("POST")
        .uri("/webhooks/cms")
        .header(webhook::TIMESTAMP_HEADER, "1700000000")
        .header(webhook::SIGNATURE_HEADER, webhook::sign("wrong", "1700000000", body.as_bytes()).unwrap())
        .body(Body::from(body.clone()))
        .unwrap();
    let (status, _) = send(&app, bad).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let good = Request::builder()
        .method("POST")
        .uri("/webhooks/cms")
        .header(webhook::TIMESTAMP_HEADER, "1700000000")
        .header(webhook::SIGNATURE_HEADER, webhook::sign("hush", "1700000000", body.as_bytes()).unwrap())
        .body(Body::from(body))
        .unwrap();
    let (status, out) = send_json(&app, good).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(out["action"], "created");
}

#[tokio::test]
async fn test_webhook_invalid_payload() {
    let dir = TempDir::new().unwrap();
    let app = app(&dir).await;
    let req = Request::builder()
        .method("POST")
        .uri("/webhooks/cms")
        .body(Body::from("{\"triggerType\": \"site_publish\"}"))
        .unwrap();
    let (status, body) = send_json(&app, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "bad_request");
}

#[tokio::test]
async fn test_terminology_endpoints() {
    let dir = TempDir::new().unwrap();
    let app = app(&dir).await;

    let (status, row) = send_json(
        &app,
        json_request(
            "POST",
            "/terminology",
            serde_json::json!({"mapType": "feature", "userTerm": "KRI", "canonicalTerm": "Key Readiness Indicators"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(row["user_term"], "kri");
    assert_eq!(row["is_verified"], true);

    let (status, _) = send_json(
        &app,
        json_request(
            "POST",
            "/terminology",
            serde_json::json!({"mapType": "colour", "userTerm": "x", "canonicalTerm": "y"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let req = Request::builder().uri("/terminology?pending=true").body(Body::empty()).unwrap();
    let (_, listed) = send_json(&app, req).await;
    assert!(listed["mappings"].as_array().unwrap().is_empty());

    let (status, err) = send_json(
        &app,
        json_request("POST", "/terminology/missing/approve", serde_json::json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(err["error"]["code"], "not_found");
}

#[tokio::test]
async fn test_chat_transcript_and_clear() {
    let dir = TempDir::new().unwrap();
    let app = app(&dir).await;

    let (status, reply) = send_json(
        &app,
        json_request("POST", "/chat/s1", serde_json::json!({"message": "ebooks for counselors"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(reply["transcript_len"], 2);

    let req = Request::builder().uri("/chat/s1").body(Body::empty()).unwrap();
    let (_, transcript) = send_json(&app, req).await;
    assert_eq!(transcript["messages"].as_array().unwrap().len(), 2);
    assert_eq!(transcript["messages"][0]["role"], "user");

    let req = Request::builder().method("DELETE").uri("/chat/s1").body(Body::empty()).unwrap();
    let (_, cleared) = send_json(&app, req).await;
    assert_eq!(cleared["cleared"], 2);

    let req = Request::builder().uri("/chat/s1").body(Body::empty()).unwrap();
    let (_, transcript) = send_json(&app, req).await;
    assert!(transcript["messages"].as_array().unwrap().is_empty());
}
