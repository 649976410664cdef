use async_trait::async_trait;
use serde::Serialize;
use std::path::Path;
use utoipa::ToSchema;

/// What a GitOps mirror needs to record one new version for one downstream.
#[derive(Debug, Clone)]
pub struct CommitRequest<'a> {
    pub app_id: &'a str,
    pub cluster_id: &'a str,
    pub sequence: i64,
    pub source_dir: &'a Path,
    pub downstream_name: &'a str,
}

/// Mirrors new versions into a version-control repository.
///
/// `Ok(None)` means the downstream has no GitOps integration configured and is
/// not an error. Errors never undo the version that triggered the commit.
#[async_trait]
pub trait GitOpsNotifier: Send + Sync + 'static {
    async fn commit(&self, req: &CommitRequest<'_>) -> anyhow::Result<Option<String>>;
}

#[derive(Debug, Clone, Default)]
pub struct GitOpsDisabled;

#[async_trait]
impl GitOpsNotifier for GitOpsDisabled {
    async fn commit(&self, _req: &CommitRequest<'_>) -> anyhow::Result<Option<String>> { Ok(None) }
}

/// Result of the post-commit notification for one downstream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum GitOpsOutcome {
    Committed { cluster_id: String, commit_url: String },
    NotConfigured { cluster_id: String },
    Failed { cluster_id: String, error: String },
}

impl GitOpsOutcome {
    pub fn is_failure(&self) -> bool { matches!(self, Self::Failed { .. }) }
}
