use axum::Json;
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Serialize, ToSchema)]
pub struct HealthResponse { pub status: &'static str }

/// Liveness probe. Never touches the database; `/readyz` does.
#[utoipa::path(get, path = "/health", tag = "version-plane", responses( (status = 200, body = HealthResponse) ))]
pub async fn health() -> Json<HealthResponse> { Json(HealthResponse { status: "ok" }) }
