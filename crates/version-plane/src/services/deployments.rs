use chrono::Utc;
use serde::Serialize;
use sqlx::SqlitePool;
use utoipa::ToSchema;
use crate::{error::VersionError, telemetry::DEPLOY_TRANSITIONS};

#[derive(Debug, Clone, Serialize, ToSchema, PartialEq, Eq)]
pub struct DeployedVersion { pub app_id: String, pub sequence: i64, pub downstreams: u64 }

/// Mark `sequence` deployed on every downstream of the application.
pub async fn deploy_version(pool: &SqlitePool, app_id: &str, sequence: i64) -> Result<DeployedVersion, VersionError> {
    transition(pool, app_id, None, sequence).await
}

/// Mark `sequence` deployed on one downstream cluster only.
pub async fn deploy_to_cluster(pool: &SqlitePool, app_id: &str, cluster_id: &str, sequence: i64) -> Result<DeployedVersion, VersionError> {
    transition(pool, app_id, Some(cluster_id), sequence).await
}

/// Pointer and status move in one transaction: `app_downstream.current_sequence`
/// is never left pointing at a version whose downstream row was not marked
/// deployed. Any error drops the transaction, which rolls both writes back.
///
/// Only `pending` and `deployed` rows are touched. A targeted row in any other
/// state (e.g. `failed`) is terminal and the whole deploy is refused.
///
/// Re-deploying the current sequence is a no-op: the status stays `deployed`
/// and the original `applied_at` is kept. Moving back to an older sequence
/// stamps a fresh `applied_at`.
#[tracing::instrument(level = "info", skip(pool))]
async fn transition(pool: &SqlitePool, app_id: &str, cluster_id: Option<&str>, sequence: i64) -> Result<DeployedVersion, VersionError> {
    let result = async {
        let mut tx = pool.begin().await.map_err(VersionError::persistence("deploy.begin"))?;
        // Status goes first so the CASE still sees the pointer from before this deploy.
        let status = sqlx::query(
            "UPDATE app_downstream_version SET \
                applied_at = CASE WHEN status = 'deployed' AND applied_at IS NOT NULL AND EXISTS ( \
                    SELECT 1 FROM app_downstream d \
                    WHERE d.app_id = app_downstream_version.app_id \
                      AND d.cluster_id = app_downstream_version.cluster_id \
                      AND d.current_sequence = app_downstream_version.sequence) \
                THEN applied_at ELSE ?1 END, \
                status = 'deployed' \
             WHERE app_id = ?2 AND sequence = ?3 AND (?4 IS NULL OR cluster_id = ?4) AND status IN ('pending', 'deployed')")
            .bind(Utc::now())
            .bind(app_id)
            .bind(sequence)
            .bind(cluster_id)
            .execute(&mut *tx).await
            .map_err(VersionError::persistence("deploy.update_downstream_version"))?;
        let pointer = sqlx::query("UPDATE app_downstream SET current_sequence = ?1 WHERE app_id = ?2 AND (?3 IS NULL OR cluster_id = ?3)")
            .bind(sequence)
            .bind(app_id)
            .bind(cluster_id)
            .execute(&mut *tx).await
            .map_err(VersionError::persistence("deploy.update_downstream"))?;
        if pointer.rows_affected() == 0 {
            return Err(VersionError::NotFound(match cluster_id {
                Some(c) => format!("downstream {c} of application {app_id}"),
                None => format!("downstreams of application {app_id}"),
            }));
        }
        if status.rows_affected() < pointer.rows_affected() {
            let staged: i64 = sqlx::query_scalar("SELECT COUNT(1) FROM app_downstream_version WHERE app_id = ?1 AND sequence = ?2 AND (?3 IS NULL OR cluster_id = ?3)")
                .bind(app_id)
                .bind(sequence)
                .bind(cluster_id)
                .fetch_one(&mut *tx).await
                .map_err(VersionError::persistence("deploy.count_staged"))?;
            if staged as u64 > status.rows_affected() {
                return Err(VersionError::Conflict(format!("version {sequence} of {app_id} is in a terminal state on at least one targeted downstream")));
            }
            return Err(VersionError::NotFound(format!("version {sequence} is not staged on every targeted downstream of {app_id}")));
        }
        tx.commit().await.map_err(VersionError::persistence("deploy.commit"))?;
        Ok(DeployedVersion { app_id: app_id.to_string(), sequence, downstreams: pointer.rows_affected() })
    }.await;

    match &result {
        Ok(d) => { DEPLOY_TRANSITIONS.with_label_values(&["deployed"]).inc(); tracing::info!(downstreams = d.downstreams, "version.deployed"); }
        Err(e) => { DEPLOY_TRANSITIONS.with_label_values(&["rolled_back"]).inc(); tracing::warn!(error = %e, "version.deploy_rolled_back"); }
    }
    result
}
