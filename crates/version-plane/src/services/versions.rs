use chrono::Utc;
use serde::Serialize;
use sqlx::SqlitePool;
use std::{path::{Path, PathBuf}, sync::Arc};
use tracing::{info, warn};
use utoipa::ToSchema;
use crate::{
    error::VersionError,
    gitops::{CommitRequest, GitOpsNotifier, GitOpsOutcome},
    kinds::{KotsKinds, SpecLoader},
    models::AppDownstream,
    secrets::SecretReplacer,
    services::sequence::{next_sequence, AppLocks},
    store::{self, NewAppVersion},
    telemetry::{GITOPS_NOTIFY_FAILURES, VERSIONS_CREATED},
};

#[derive(Debug, Clone)]
pub struct CreateVersionRequest {
    pub app_id: String,
    pub source_dir: PathBuf,
    /// Provenance tag, e.g. `Upload`, `Upstream Update`, `GitOps`.
    pub source: String,
    /// Presence means "the app already has versions"; the value itself is only
    /// checked against the allocated sequence.
    pub prior_sequence: Option<i64>,
    /// Origin-system ordering key. Defaults to the allocated sequence.
    pub update_cursor: Option<i64>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CreatedVersion {
    pub sequence: i64,
    pub gitops: Vec<GitOpsOutcome>,
}

impl CreatedVersion {
    pub fn gitops_failures(&self) -> impl Iterator<Item = &GitOpsOutcome> { self.gitops.iter().filter(|o| o.is_failure()) }
}

/// Creates immutable app versions: load specs, resolve display metadata,
/// substitute secrets, persist under the per-app lock, then notify GitOps.
#[derive(Clone)]
pub struct VersionCreator {
    db: SqlitePool,
    locks: Arc<AppLocks>,
    loader: Arc<dyn SpecLoader>,
    secrets: Arc<dyn SecretReplacer>,
    gitops: Arc<dyn GitOpsNotifier>,
}

impl VersionCreator {
    pub fn new(db: SqlitePool, loader: Arc<dyn SpecLoader>, secrets: Arc<dyn SecretReplacer>, gitops: Arc<dyn GitOpsNotifier>) -> Self {
        Self { db, locks: Arc::new(AppLocks::new()), loader, secrets, gitops }
    }

    pub fn with_locks(mut self, locks: Arc<AppLocks>) -> Self { self.locks = locks; self }

    /// Sequence 0. Never looks at a predecessor.
    pub async fn create_first_version(&self, app_id: &str, source_dir: &Path, source: &str) -> Result<CreatedVersion, VersionError> {
        self.create(CreateVersionRequest { app_id: app_id.to_string(), source_dir: source_dir.to_path_buf(), source: source.to_string(), prior_sequence: None, update_cursor: None }).await
    }

    pub async fn create_version(&self, app_id: &str, source_dir: &Path, source: &str, current_sequence: i64) -> Result<CreatedVersion, VersionError> {
        self.create(CreateVersionRequest { app_id: app_id.to_string(), source_dir: source_dir.to_path_buf(), source: source.to_string(), prior_sequence: Some(current_sequence), update_cursor: None }).await
    }

    #[tracing::instrument(level = "info", skip(self, req), fields(app_id = %req.app_id, source = %req.source))]
    pub async fn create(&self, req: CreateVersionRequest) -> Result<CreatedVersion, VersionError> {
        let kinds = self.loader.load(&req.source_dir).await.map_err(VersionError::malformed("create_version.load_specs"))?;

        let label = match kinds.title() {
            Some(title) => title.to_string(),
            None => store::get_app(&self.db, &req.app_id).await
                .map_err(VersionError::persistence("create_version.get_app"))?
                .map(|a| a.name)
                .ok_or_else(|| VersionError::NotFound(format!("application {}", req.app_id)))?,
        };
        let icon = kinds.icon().map(str::to_string);

        self.secrets.replace_in_place(&req.source_dir).await
            .map_err(|source| VersionError::InputPreparation { op: "create_version.replace_secrets", source })?;

        let (sequence, downstreams) = self.persist(&req, &label, icon.as_deref(), &kinds).await?;
        VERSIONS_CREATED.with_label_values(&[req.source.as_str()]).inc();
        info!(sequence, downstreams = downstreams.len(), "version.created");

        // Phase two: the version is committed; mirrors are best effort from here on.
        let gitops = self.notify_gitops(&req, sequence, &downstreams).await;
        Ok(CreatedVersion { sequence, gitops })
    }

    async fn persist(&self, req: &CreateVersionRequest, label: &str, icon: Option<&str>, kinds: &KotsKinds) -> Result<(i64, Vec<AppDownstream>), VersionError> {
        let _guard = self.locks.lock(&req.app_id).await;
        let mut tx = self.db.begin().await.map_err(VersionError::persistence("create_version.begin"))?;

        // Write first so SQLite takes the write lock before we read max(sequence).
        let touched = sqlx::query("UPDATE apps SET name = ?1, icon_uri = ?2 WHERE id = ?3")
            .bind(label)
            .bind(icon)
            .bind(&req.app_id)
            .execute(&mut *tx).await
            .map_err(VersionError::persistence("create_version.update_app"))?;
        if touched.rows_affected() == 0 {
            return Err(VersionError::NotFound(format!("application {}", req.app_id)));
        }

        let sequence = next_sequence(&mut *tx, &req.app_id, req.prior_sequence.is_some()).await
            .map_err(VersionError::persistence("create_version.next_sequence"))?;
        if let Some(prior) = req.prior_sequence {
            if prior + 1 != sequence {
                warn!(prior, sequence, "version.prior_sequence_stale");
            }
        }

        let archive_ref = req.source_dir.to_string_lossy().into_owned();
        let row = NewAppVersion {
            app_id: &req.app_id,
            sequence,
            created_at: Utc::now(),
            update_cursor: req.update_cursor.unwrap_or(sequence),
            source: &req.source,
            version_label: label,
            app_spec: kinds.app_spec_raw(),
            kots_app_spec: kinds.kots_app_spec_raw(),
            archive_ref: archive_ref.as_str(),
        };
        store::insert_app_version(&mut *tx, &row).await.map_err(|e| match e {
            sqlx::Error::Database(db) if db.is_unique_violation() => VersionError::Conflict(format!(
                "sequence {sequence} already exists for application {}; later versions must name their prior sequence", req.app_id)),
            source => VersionError::Persistence { op: "create_version.insert_version", source },
        })?;
        store::insert_pending_downstream_versions(&mut *tx, &req.app_id, sequence).await
            .map_err(VersionError::persistence("create_version.stage_downstreams"))?;
        let downstreams = store::list_downstreams(&mut *tx, &req.app_id).await
            .map_err(VersionError::persistence("create_version.list_downstreams"))?;

        tx.commit().await.map_err(VersionError::persistence("create_version.commit"))?;
        Ok((sequence, downstreams))
    }

    async fn notify_gitops(&self, req: &CreateVersionRequest, sequence: i64, downstreams: &[AppDownstream]) -> Vec<GitOpsOutcome> {
        let mut outcomes = Vec::with_capacity(downstreams.len());
        for d in downstreams {
            let commit = CommitRequest { app_id: &req.app_id, cluster_id: &d.cluster_id, sequence, source_dir: &req.source_dir, downstream_name: &d.downstream_name };
            let outcome = match self.gitops.commit(&commit).await {
                Ok(Some(commit_url)) => {
                    info!(cluster_id = %d.cluster_id, %commit_url, "gitops.committed");
                    GitOpsOutcome::Committed { cluster_id: d.cluster_id.clone(), commit_url }
                }
                Ok(None) => GitOpsOutcome::NotConfigured { cluster_id: d.cluster_id.clone() },
                Err(e) => {
                    GITOPS_NOTIFY_FAILURES.with_label_values(&[d.cluster_id.as_str()]).inc();
                    warn!(cluster_id = %d.cluster_id, sequence, error = %format!("{e:#}"), "gitops.commit_failed");
                    GitOpsOutcome::Failed { cluster_id: d.cluster_id.clone(), error: format!("{e:#}") }
                }
            };
            outcomes.push(outcome);
        }
        outcomes
    }
}
