//! Read path over stored versions. Nothing here is cached: every call reads
//! the current rows.
use serde::Serialize;
use sqlx::SqlitePool;
use utoipa::ToSchema;
use crate::{
    crossref,
    error::VersionError,
    kinds::{decode_descriptor, decode_kots_application, ApplicationDescriptor, KotsApplication},
    models::{AppVersion, DownstreamVersion, ForwardedPort, RealizedLink},
    store,
};

/// Sequences in display order: `update_cursor` ascending, then `sequence`.
pub async fn list_sequences(pool: &SqlitePool, app_id: &str) -> Result<Vec<i64>, VersionError> {
    store::list_sequences(pool, app_id).await.map_err(VersionError::persistence("catalog.list_sequences"))
}

pub async fn list_versions(pool: &SqlitePool, app_id: &str) -> Result<Vec<AppVersion>, VersionError> {
    store::list_app_versions(pool, app_id).await.map_err(VersionError::persistence("catalog.list_versions"))
}

pub async fn get_version(pool: &SqlitePool, app_id: &str, sequence: i64) -> Result<Option<AppVersion>, VersionError> {
    store::get_app_version(pool, app_id, sequence).await.map_err(VersionError::persistence("catalog.get_version"))
}

/// Versions of one downstream split around its current pointer, newest first.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DownstreamHistory {
    pub cluster_id: String,
    pub downstream_name: String,
    pub current: Option<DownstreamVersion>,
    pub pending: Vec<DownstreamVersion>,
    pub past: Vec<DownstreamVersion>,
}

pub async fn downstream_history(pool: &SqlitePool, app_id: &str, cluster_id: &str) -> Result<Option<DownstreamHistory>, VersionError> {
    let Some(downstream) = store::get_downstream(pool, app_id, cluster_id).await.map_err(VersionError::persistence("catalog.get_downstream"))? else {
        return Ok(None);
    };
    let rows = store::list_downstream_versions(pool, app_id, cluster_id).await.map_err(VersionError::persistence("catalog.list_downstream_versions"))?;
    let mut history = DownstreamHistory { cluster_id: downstream.cluster_id, downstream_name: downstream.downstream_name, current: None, pending: Vec::new(), past: Vec::new() };
    for row in rows {
        match downstream.current_sequence {
            Some(cur) if row.sequence == cur => history.current = Some(row),
            Some(cur) if row.sequence < cur => history.past.push(row),
            _ => history.pending.push(row),
        }
    }
    Ok(Some(history))
}

async fn load_documents(pool: &SqlitePool, app_id: &str, sequence: i64, op: &'static str) -> Result<(Option<ApplicationDescriptor>, Option<KotsApplication>), VersionError> {
    let Some(version) = store::get_app_version(pool, app_id, sequence).await.map_err(VersionError::persistence(op))? else {
        return Ok((None, None));
    };
    let descriptor = decode_descriptor(version.app_spec.as_deref().unwrap_or_default())
        .map_err(|e| VersionError::MalformedInput { op, source: anyhow::Error::new(e).context("decode app spec yaml") })?;
    let kots = decode_kots_application(version.kots_app_spec.as_deref().unwrap_or_default())
        .map_err(|e| VersionError::MalformedInput { op, source: anyhow::Error::new(e).context("decode kots app spec yaml") })?;
    Ok((descriptor, kots))
}

/// Realized links of a stored version. Absent version or descriptor yields an empty list.
pub async fn links_for_version(pool: &SqlitePool, app_id: &str, sequence: i64) -> Result<Vec<RealizedLink>, VersionError> {
    let (descriptor, kots) = load_documents(pool, app_id, sequence, "catalog.realized_links").await?;
    Ok(crossref::realized_links(descriptor.as_ref(), kots.as_ref()))
}

/// Forwarded ports of a stored version. Needs both documents; otherwise empty.
pub async fn ports_for_version(pool: &SqlitePool, app_id: &str, sequence: i64) -> Result<Vec<ForwardedPort>, VersionError> {
    let (descriptor, kots) = load_documents(pool, app_id, sequence, "catalog.forwarded_ports").await?;
    Ok(crossref::forwarded_ports(descriptor.as_ref(), kots.as_ref()))
}
