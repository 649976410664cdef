use axum::{Json, extract::{State, Path}};
use crate::{
    AppState,
    error::{ApiError, ApiResult},
    services::{catalog::{self, DownstreamHistory}, deployments::{self, DeployedVersion}},
};

/// Deploy a version to every downstream of the application
#[utoipa::path(post, path = "/apps/{app_id}/versions/{sequence}/deploy", params(("app_id" = String, Path, description = "Application id"), ("sequence" = i64, Path, description = "Version sequence")), responses(
    (status = 200, body = DeployedVersion),
    (status = 404, description = "No downstream, or version not staged on it"),
    (status = 409, description = "Version is in a terminal state on a targeted downstream")
))]
#[tracing::instrument(level = "info", skip(state))]
pub async fn deploy_version(State(state): State<AppState>, Path((app_id, sequence)): Path<(String, i64)>) -> ApiResult<Json<DeployedVersion>> {
    Ok(Json(deployments::deploy_version(&state.db, &app_id, sequence).await?))
}

/// Deploy a version to a single downstream cluster
#[utoipa::path(post, path = "/apps/{app_id}/clusters/{cluster_id}/versions/{sequence}/deploy", params(("app_id" = String, Path, description = "Application id"), ("cluster_id" = String, Path, description = "Downstream cluster id"), ("sequence" = i64, Path, description = "Version sequence")), responses(
    (status = 200, body = DeployedVersion),
    (status = 404, description = "Unknown downstream, or version not staged on it"),
    (status = 409, description = "Version is in a terminal state on this downstream")
))]
#[tracing::instrument(level = "info", skip(state))]
pub async fn deploy_to_cluster(State(state): State<AppState>, Path((app_id, cluster_id, sequence)): Path<(String, String, i64)>) -> ApiResult<Json<DeployedVersion>> {
    Ok(Json(deployments::deploy_to_cluster(&state.db, &app_id, &cluster_id, sequence).await?))
}

/// Current, pending and past versions of one downstream
#[utoipa::path(get, path = "/apps/{app_id}/clusters/{cluster_id}/versions", params(("app_id" = String, Path, description = "Application id"), ("cluster_id" = String, Path, description = "Downstream cluster id")), responses(
    (status = 200, body = DownstreamHistory),
    (status = 404, description = "Unknown downstream")
))]
#[tracing::instrument(level = "debug", skip(state))]
pub async fn downstream_history(State(state): State<AppState>, Path((app_id, cluster_id)): Path<(String, String)>) -> ApiResult<Json<DownstreamHistory>> {
    catalog::downstream_history(&state.db, &app_id, &cluster_id).await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("downstream {cluster_id} of {app_id}")))
}
