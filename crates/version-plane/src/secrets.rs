use async_trait::async_trait;
use std::path::Path;

/// Rewrites secret references in a version's files before they are persisted.
#[async_trait]
pub trait SecretReplacer: Send + Sync + 'static {
    async fn replace_in_place(&self, dir: &Path) -> anyhow::Result<()>;
}

/// Used when no secret backend is configured: files are stored as uploaded.
#[derive(Debug, Clone, Default)]
pub struct NoSecretBackend;

#[async_trait]
impl SecretReplacer for NoSecretBackend {
    async fn replace_in_place(&self, dir: &Path) -> anyhow::Result<()> {
        tracing::debug!(dir=%dir.display(), "secrets.no_backend");
        Ok(())
    }
}
