use axum::{body::Body, http::{Request, StatusCode}, Router};
use serde_json::{json, Value};
use tower::util::ServiceExt;
use version_plane::{build_router, test_support::{self, TestDb, DESCRIPTOR_YAML, KOTS_APP_YAML}};

async fn call(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let req = match body {
        Some(b) => builder.header("content-type", "application/json").body(Body::from(b.to_string())).unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let res = app.clone().oneshot(req).await.unwrap();
    let status = res.status();
    let bytes = axum::body::to_bytes(res.into_body(), 1 << 20).await.unwrap();
    let v = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap_or(Value::Null) };
    (status, v)
}

async fn setup() -> (TestDb, Router) {
    let db = test_support::test_db().await;
    test_support::seed_app(&db.pool, "sentry", "Sentry").await;
    test_support::seed_downstream(&db.pool, "sentry", "c1").await;
    let app = build_router(test_support::test_state(&db));
    (db, app)
}

#[tokio::test]
async fn create_list_deploy_roundtrip() {
    let (_db, app) = setup().await;
    let dir = test_support::write_spec_dir(&[("app.yaml", DESCRIPTOR_YAML), ("kots-app.yaml", KOTS_APP_YAML)]);
    let src = dir.path().display().to_string();

    let (status, body) = call(&app, "POST", "/apps/sentry/versions", Some(json!({"source_dir": src, "source": "Upload"}))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["sequence"], 0);
    assert_eq!(body["gitops"], json!([{"outcome": "not_configured", "cluster_id": "c1"}]));

    let (status, body) = call(&app, "POST", "/apps/sentry/versions", Some(json!({"source_dir": src, "source": "Upstream Update", "prior_sequence": 0}))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["sequence"], 1);

    let (status, body) = call(&app, "GET", "/apps/sentry/versions", None).await;
    assert_eq!(status, StatusCode::OK);
    let seqs: Vec<i64> = body.as_array().unwrap().iter().map(|v| v["sequence"].as_i64().unwrap()).collect();
    assert_eq!(seqs, vec![0, 1]);

    let (status, body) = call(&app, "GET", "/apps/sentry/versions/1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["version_label"], "Sentry Enterprise");

    let (status, body) = call(&app, "GET", "/apps/sentry/versions/1/links", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0], json!({"title": "Open Sentry", "uri": "http://localhost:9000"}));

    let (status, body) = call(&app, "GET", "/apps/sentry/versions/1/ports", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);

    let (status, body) = call(&app, "POST", "/apps/sentry/versions/1/deploy", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"app_id": "sentry", "sequence": 1, "downstreams": 1}));

    let (status, body) = call(&app, "GET", "/apps/sentry/clusters/c1/versions", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["current"]["sequence"], 1);
    assert_eq!(body["current"]["status"], "deployed");
    assert_eq!(body["past"][0]["sequence"], 0);

    let (status, _) = call(&app, "POST", "/apps/sentry/clusters/c1/versions/0/deploy", None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn error_statuses() {
    let (_db, app) = setup().await;
    let good = test_support::write_spec_dir(&[("app.yaml", DESCRIPTOR_YAML)]);
    let bad = test_support::write_spec_dir(&[("broken.yaml", "kind: [unclosed\n")]);

    let (status, body) = call(&app, "POST", "/apps/ghost/versions", Some(json!({"source_dir": good.path().display().to_string(), "source": "Upload"}))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "not_found");

    let (status, body) = call(&app, "POST", "/apps/sentry/versions", Some(json!({"source_dir": bad.path().display().to_string(), "source": "Upload"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "bad_request");

    let (status, _) = call(&app, "POST", "/apps/sentry/versions", Some(json!({"source_dir": " ", "source": "Upload"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = call(&app, "POST", "/apps/sentry/versions", Some(json!({"source_dir": good.path().display().to_string(), "source": "Upload"}))).await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, body) = call(&app, "POST", "/apps/sentry/versions", Some(json!({"source_dir": good.path().display().to_string(), "source": "Upload"}))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "conflict");

    let (status, _) = call(&app, "GET", "/apps/sentry/versions/7", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = call(&app, "POST", "/apps/sentry/versions/7/deploy", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = call(&app, "GET", "/apps/sentry/clusters/nope/versions", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = call(&app, "GET", "/apps/sentry/versions/abc", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn reads_of_unknown_versions_are_empty() {
    let (_db, app) = setup().await;
    let (status, body) = call(&app, "GET", "/apps/sentry/versions", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([]));
    let (status, body) = call(&app, "GET", "/apps/sentry/versions/3/links", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([]));
}

#[tokio::test]
async fn metrics_exposes_version_counters() {
    let (_db, app) = setup().await;
    let dir = test_support::write_spec_dir(&[("app.yaml", DESCRIPTOR_YAML)]);
    let (status, _) = call(&app, "POST", "/apps/sentry/versions", Some(json!({"source_dir": dir.path().display().to_string(), "source": "Upload"}))).await;
    assert_eq!(status, StatusCode::CREATED);

    let res = app.clone().oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap()).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let text = String::from_utf8(axum::body::to_bytes(res.into_body(), 1 << 20).await.unwrap().to_vec()).unwrap();
    assert!(text.contains("app_versions_created_total"));
}
