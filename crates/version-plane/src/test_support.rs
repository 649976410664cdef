//! Test harness utilities for integration & unit tests.
//! Each test gets its own file-backed SQLite database in a temp dir, migrated
//! with the embedded migrations, so suites can run in parallel without cleanup.
use crate::{
    db::init_db,
    gitops::GitOpsDisabled,
    kinds::FsSpecLoader,
    secrets::NoSecretBackend,
    services::versions::VersionCreator,
    AppState,
};
use sqlx::SqlitePool;
use std::{path::Path, sync::Arc};
use tempfile::TempDir;

/// Several connections so concurrency tests actually contend on the database.
const TEST_MAX_CONNS: u32 = 4;

pub const DESCRIPTOR_YAML: &str = r#"apiVersion: app.k8s.io/v1beta1
kind: Application
metadata:
  name: sentry
spec:
  descriptor:
    links:
      - description: Open Sentry
        url: "http://sentry"
      - description: Docs
        url: "https://docs.example.com"
"#;

pub const KOTS_APP_YAML: &str = r#"apiVersion: kots.io/v1beta1
kind: Application
metadata:
  name: sentry
spec:
  title: Sentry Enterprise
  icon: https://example.com/sentry.png
  ports:
    - serviceName: sentry
      servicePort: 9000
      localPort: 9000
      applicationUrl: "http://sentry"
"#;

pub struct TestDb { pub pool: SqlitePool, _dir: TempDir }

pub async fn test_db() -> TestDb {
    let dir = TempDir::new().expect("tempdir");
    let url = format!("sqlite://{}", dir.path().join("version-plane.db").display());
    let pool = init_db(&url, TEST_MAX_CONNS).await.expect("test sqlite pool");
    TestDb { pool, _dir: dir }
}

/// `AppState` wired with the default collaborators.
pub fn test_state(db: &TestDb) -> AppState {
    AppState { db: db.pool.clone(), versions: test_creator(&db.pool) }
}

pub fn test_creator(pool: &SqlitePool) -> VersionCreator {
    VersionCreator::new(pool.clone(), Arc::new(FsSpecLoader), Arc::new(NoSecretBackend), Arc::new(GitOpsDisabled))
}

pub async fn seed_app(pool: &SqlitePool, id: &str, name: &str) {
    sqlx::query("INSERT INTO apps (id, name, slug) VALUES (?1, ?2, ?1)")
        .bind(id).bind(name)
        .execute(pool).await.expect("seed app");
}

pub async fn seed_downstream(pool: &SqlitePool, app_id: &str, cluster_id: &str) {
    sqlx::query("INSERT INTO app_downstream (app_id, cluster_id, downstream_name) VALUES (?1, ?2, ?2)")
        .bind(app_id).bind(cluster_id)
        .execute(pool).await.expect("seed downstream");
}

/// Raw version row, bypassing the creator. Specs are stored verbatim.
pub async fn seed_version(pool: &SqlitePool, app_id: &str, sequence: i64, update_cursor: i64, app_spec: Option<&str>, kots_app_spec: Option<&str>) {
    sqlx::query("INSERT INTO app_version (app_id, sequence, created_at, update_cursor, source, version_label, app_spec, kots_app_spec, archive_ref) VALUES (?1, ?2, ?3, ?4, 'Upload', ?1, ?5, ?6, '')")
        .bind(app_id).bind(sequence).bind(chrono::Utc::now()).bind(update_cursor).bind(app_spec).bind(kots_app_spec)
        .execute(pool).await.expect("seed version");
}

pub async fn seed_downstream_version(pool: &SqlitePool, app_id: &str, cluster_id: &str, sequence: i64, status: &str) {
    sqlx::query("INSERT INTO app_downstream_version (app_id, cluster_id, sequence, status) VALUES (?1, ?2, ?3, ?4)")
        .bind(app_id).bind(cluster_id).bind(sequence).bind(status)
        .execute(pool).await.expect("seed downstream version");
}

pub async fn current_sequence(pool: &SqlitePool, app_id: &str, cluster_id: &str) -> Option<i64> {
    sqlx::query_scalar("SELECT current_sequence FROM app_downstream WHERE app_id = ?1 AND cluster_id = ?2")
        .bind(app_id).bind(cluster_id)
        .fetch_one(pool).await.expect("downstream row")
}

pub async fn downstream_status(pool: &SqlitePool, app_id: &str, cluster_id: &str, sequence: i64) -> String {
    sqlx::query_scalar("SELECT status FROM app_downstream_version WHERE app_id = ?1 AND cluster_id = ?2 AND sequence = ?3")
        .bind(app_id).bind(cluster_id).bind(sequence)
        .fetch_one(pool).await.expect("downstream version row")
}

/// Write `(file name, contents)` pairs into a fresh temp dir of manifests.
pub fn write_spec_dir(files: &[(&str, &str)]) -> TempDir {
    let dir = TempDir::new().expect("spec tempdir");
    write_files(dir.path(), files);
    dir
}

pub fn write_files(root: &Path, files: &[(&str, &str)]) {
    for (name, body) in files {
        let path = root.join(name);
        if let Some(parent) = path.parent() { std::fs::create_dir_all(parent).expect("create spec subdir"); }
        std::fs::write(&path, body).expect("write spec file");
    }
}
