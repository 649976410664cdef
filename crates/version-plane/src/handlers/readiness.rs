use axum::{Json, extract::State};
use serde::Serialize;
use crate::AppState;

#[derive(Serialize, utoipa::ToSchema)]
pub struct ReadinessResponse { pub status: &'static str, pub pending_migrations: i64 }

/// Readiness probe: database reachable and every embedded migration applied
#[utoipa::path(get, path = "/readyz", responses(
	(status = 200, body = ReadinessResponse, description = "Service ready"),
	(status = 503, body = ReadinessResponse, description = "Dependency not ready")
))]
pub async fn readiness(State(state): State<AppState>) -> (axum::http::StatusCode, Json<ReadinessResponse>) {
	let applied = match sqlx::query_scalar::<_, i64>("SELECT COUNT(1) FROM _sqlx_migrations").fetch_one(&state.db).await {
		Ok(v) => v,
		Err(e) => {
			tracing::warn!(error=%e, "readyz.db_unreachable");
			return (axum::http::StatusCode::SERVICE_UNAVAILABLE, Json(ReadinessResponse { status: "degraded", pending_migrations: -1 }));
		}
	};
	let total = sqlx::migrate!().migrations.len() as i64;
	let pending = (total - applied).max(0);
	if pending == 0 { (axum::http::StatusCode::OK, Json(ReadinessResponse { status: "ready", pending_migrations: 0 })) }
	else { (axum::http::StatusCode::SERVICE_UNAVAILABLE, Json(ReadinessResponse { status: "pending", pending_migrations: pending })) }
}
