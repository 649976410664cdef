use axum::{Json, http::StatusCode, extract::{State, Path}};
use serde::Deserialize;
use utoipa::ToSchema;
use std::path::PathBuf;
use crate::{
    AppState,
    error::{ApiError, ApiResult},
    models::{AppVersion, ForwardedPort, RealizedLink},
    services::{catalog, versions::{CreateVersionRequest, CreatedVersion}},
};

#[derive(Deserialize, ToSchema)]
pub struct CreateVersionBody {
    /// Directory holding the version's manifests.
    pub source_dir: String,
    pub source: String,
    /// Omit for the first version of an application.
    pub prior_sequence: Option<i64>,
    pub update_cursor: Option<i64>,
}

/// Create a new immutable version
#[utoipa::path(post, path = "/apps/{app_id}/versions", params(("app_id" = String, Path, description = "Application id")), request_body = CreateVersionBody, responses(
    (status = 201, body = CreatedVersion, description = "Version persisted; GitOps outcomes listed per downstream"),
    (status = 400, description = "Malformed manifests"),
    (status = 404, description = "Application not found"),
    (status = 409, description = "Sequence already taken; later versions must send prior_sequence"),
    (status = 422, description = "Secret substitution failed")
))]
#[tracing::instrument(level = "info", skip(state, body))]
pub async fn create_version(State(state): State<AppState>, Path(app_id): Path<String>, Json(body): Json<CreateVersionBody>) -> ApiResult<(StatusCode, Json<CreatedVersion>)> {
    if body.source_dir.trim().is_empty() { return Err(ApiError::bad_request("source_dir required")); }
    let req = CreateVersionRequest { app_id, source_dir: PathBuf::from(body.source_dir), source: body.source, prior_sequence: body.prior_sequence, update_cursor: body.update_cursor };
    let created = state.versions.create(req).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// List versions ordered by update cursor, then sequence
#[utoipa::path(get, path = "/apps/{app_id}/versions", params(("app_id" = String, Path, description = "Application id")), responses( (status = 200, body = [AppVersion]) ))]
#[tracing::instrument(level = "debug", skip(state))]
pub async fn list_versions(State(state): State<AppState>, Path(app_id): Path<String>) -> ApiResult<Json<Vec<AppVersion>>> {
    Ok(Json(catalog::list_versions(&state.db, &app_id).await?))
}

/// Fetch one version
#[utoipa::path(get, path = "/apps/{app_id}/versions/{sequence}", params(("app_id" = String, Path, description = "Application id"), ("sequence" = i64, Path, description = "Version sequence")), responses( (status = 200, body = AppVersion), (status = 404, description = "No such version") ))]
#[tracing::instrument(level = "debug", skip(state))]
pub async fn get_version(State(state): State<AppState>, Path((app_id, sequence)): Path<(String, i64)>) -> ApiResult<Json<AppVersion>> {
    catalog::get_version(&state.db, &app_id, sequence).await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("version {sequence} of {app_id}")))
}

/// Links from the app descriptor, rewritten against forwarded ports
#[utoipa::path(get, path = "/apps/{app_id}/versions/{sequence}/links", params(("app_id" = String, Path, description = "Application id"), ("sequence" = i64, Path, description = "Version sequence")), responses( (status = 200, body = [RealizedLink]) ))]
#[tracing::instrument(level = "debug", skip(state))]
pub async fn realized_links(State(state): State<AppState>, Path((app_id, sequence)): Path<(String, i64)>) -> ApiResult<Json<Vec<RealizedLink>>> {
    Ok(Json(catalog::links_for_version(&state.db, &app_id, sequence).await?))
}

/// Port forwards matched from descriptor links (duplicates preserved)
#[utoipa::path(get, path = "/apps/{app_id}/versions/{sequence}/ports", params(("app_id" = String, Path, description = "Application id"), ("sequence" = i64, Path, description = "Version sequence")), responses( (status = 200, body = [ForwardedPort]) ))]
#[tracing::instrument(level = "debug", skip(state))]
pub async fn forwarded_ports(State(state): State<AppState>, Path((app_id, sequence)): Path<(String, i64)>) -> ApiResult<Json<Vec<ForwardedPort>>> {
    Ok(Json(catalog::ports_for_version(&state.db, &app_id, sequence).await?))
}
