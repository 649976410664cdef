pub mod config;
pub mod crossref;
pub mod db;
pub mod error;
pub mod gitops;
pub mod handlers;
pub mod kinds;
pub mod logging;
pub mod models;
pub mod secrets;
pub mod services;
pub mod store;
pub mod telemetry;
pub mod test_support;

use axum::{Router, routing::{get, post}};
use sqlx::SqlitePool;
use handlers::{health::health, readiness::readiness, versions, deployments};
use services::versions::VersionCreator;
use utoipa::OpenApi;
use crate::telemetry::metrics_handler;

#[derive(Clone)]
pub struct AppState { pub db: SqlitePool, pub versions: VersionCreator }

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::health::health,
        handlers::readiness::readiness,
        handlers::versions::list_versions,
        handlers::versions::create_version,
        handlers::versions::get_version,
        handlers::versions::realized_links,
        handlers::versions::forwarded_ports,
        handlers::deployments::deploy_version,
        handlers::deployments::deploy_to_cluster,
        handlers::deployments::downstream_history,
    ),
    components(schemas(
        error::ApiErrorBody,
        handlers::health::HealthResponse,
        handlers::readiness::ReadinessResponse,
        handlers::versions::CreateVersionBody,
        models::AppVersion,
        models::DownstreamVersion,
        models::RealizedLink,
        models::ForwardedPort,
        gitops::GitOpsOutcome,
        services::versions::CreatedVersion,
        services::deployments::DeployedVersion,
        services::catalog::DownstreamHistory,
    )),
    tags( (name = "version-plane", description = "Application version sequencing and deployment state") )
)]
pub struct ApiDoc;

pub fn build_router(state: AppState) -> Router {
    let openapi = ApiDoc::openapi();
    Router::new()
        .route("/health", get(health))
        .route("/readyz", get(readiness))
        .route("/metrics", get(metrics_handler))
        .route("/apps/:app_id/versions", get(versions::list_versions).post(versions::create_version))
        .route("/apps/:app_id/versions/:sequence", get(versions::get_version))
        .route("/apps/:app_id/versions/:sequence/links", get(versions::realized_links))
        .route("/apps/:app_id/versions/:sequence/ports", get(versions::forwarded_ports))
        .route("/apps/:app_id/versions/:sequence/deploy", post(deployments::deploy_version))
        .route("/apps/:app_id/clusters/:cluster_id/versions", get(deployments::downstream_history))
        .route("/apps/:app_id/clusters/:cluster_id/versions/:sequence/deploy", post(deployments::deploy_to_cluster))
        .route("/openapi.json", get(|| async move { axum::Json(openapi.clone()) }))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::{Request, StatusCode}, body::Body};
    use tower::util::ServiceExt;
    use serde_json::json;

    #[tokio::test]
    async fn health_ok() {
        let db = test_support::test_db().await;
        let app = build_router(test_support::test_state(&db));
        let res = app.oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap()).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let body = axum::body::to_bytes(res.into_body(), 1024).await.unwrap();
        let v: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(v, json!({"status":"ok"}));
    }

    #[tokio::test]
    async fn readyz_reports_migrations_applied() {
        let db = test_support::test_db().await;
        let app = build_router(test_support::test_state(&db));
        let res = app.oneshot(Request::builder().uri("/readyz").body(Body::empty()).unwrap()).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let body = axum::body::to_bytes(res.into_body(), 1024).await.unwrap();
        let v: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(v["status"], "ready");
        assert_eq!(v["pending_migrations"], 0);
    }

    #[tokio::test]
    async fn openapi_lists_version_routes() {
        let db = test_support::test_db().await;
        let app = build_router(test_support::test_state(&db));
        let res = app.oneshot(Request::builder().uri("/openapi.json").body(Body::empty()).unwrap()).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let body = axum::body::to_bytes(res.into_body(), 1 << 20).await.unwrap();
        let v: serde_json::Value = serde_json::from_slice(&body).unwrap();
        let paths = v["paths"].as_object().unwrap();
        assert!(paths.contains_key("/apps/{app_id}/versions"));
        assert!(paths.contains_key("/apps/{app_id}/clusters/{cluster_id}/versions/{sequence}/deploy"));
    }
}
