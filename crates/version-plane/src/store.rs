//! Row-level access to the version tables. Functions take any sqlx executor so
//! the same query runs against the pool or inside an open transaction.
use chrono::{DateTime, Utc};
use sqlx::{Executor, Sqlite, SqliteConnection};
use crate::models::{AppDownstream, AppVersion, Application, DownstreamVersion};

const VERSION_COLUMNS: &str = "app_id, sequence, created_at, update_cursor, source, version_label, app_spec, kots_app_spec, archive_ref";

pub async fn get_app<'e, E>(ex: E, app_id: &str) -> Result<Option<Application>, sqlx::Error>
where E: Executor<'e, Database = Sqlite> {
    sqlx::query_as::<_, Application>("SELECT id, name, icon_uri, slug, created_at FROM apps WHERE id = ?1")
        .bind(app_id)
        .fetch_optional(ex).await
}

/// `None` when the application has no versions yet.
pub async fn max_sequence<'e, E>(ex: E, app_id: &str) -> Result<Option<i64>, sqlx::Error>
where E: Executor<'e, Database = Sqlite> {
    sqlx::query_scalar::<_, Option<i64>>("SELECT MAX(sequence) FROM app_version WHERE app_id = ?1")
        .bind(app_id)
        .fetch_one(ex).await
}

#[derive(Debug, Clone)]
pub struct NewAppVersion<'a> {
    pub app_id: &'a str,
    pub sequence: i64,
    pub created_at: DateTime<Utc>,
    pub update_cursor: i64,
    pub source: &'a str,
    pub version_label: &'a str,
    pub app_spec: Option<&'a str>,
    pub kots_app_spec: Option<&'a str>,
    pub archive_ref: &'a str,
}

pub async fn insert_app_version(conn: &mut SqliteConnection, v: &NewAppVersion<'_>) -> Result<(), sqlx::Error> {
    sqlx::query("INSERT INTO app_version (app_id, sequence, created_at, update_cursor, source, version_label, app_spec, kots_app_spec, archive_ref) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9)")
        .bind(v.app_id)
        .bind(v.sequence)
        .bind(v.created_at)
        .bind(v.update_cursor)
        .bind(v.source)
        .bind(v.version_label)
        .bind(v.app_spec)
        .bind(v.kots_app_spec)
        .bind(v.archive_ref)
        .execute(conn).await?;
    Ok(())
}

/// Stage a freshly created version as `pending` on every downstream of the app.
pub async fn insert_pending_downstream_versions(conn: &mut SqliteConnection, app_id: &str, sequence: i64) -> Result<u64, sqlx::Error> {
    let res = sqlx::query("INSERT INTO app_downstream_version (app_id, cluster_id, sequence, status) SELECT app_id, cluster_id, ?2, 'pending' FROM app_downstream WHERE app_id = ?1")
        .bind(app_id)
        .bind(sequence)
        .execute(conn).await?;
    Ok(res.rows_affected())
}

pub async fn get_app_version<'e, E>(ex: E, app_id: &str, sequence: i64) -> Result<Option<AppVersion>, sqlx::Error>
where E: Executor<'e, Database = Sqlite> {
    sqlx::query_as::<_, AppVersion>(&format!("SELECT {VERSION_COLUMNS} FROM app_version WHERE app_id = ?1 AND sequence = ?2"))
        .bind(app_id)
        .bind(sequence)
        .fetch_optional(ex).await
}

/// Sequences ordered by the origin system's cursor first and sequence second.
pub async fn list_sequences<'e, E>(ex: E, app_id: &str) -> Result<Vec<i64>, sqlx::Error>
where E: Executor<'e, Database = Sqlite> {
    sqlx::query_scalar::<_, i64>("SELECT sequence FROM app_version WHERE app_id = ?1 ORDER BY update_cursor ASC, sequence ASC")
        .bind(app_id)
        .fetch_all(ex).await
}

pub async fn list_app_versions<'e, E>(ex: E, app_id: &str) -> Result<Vec<AppVersion>, sqlx::Error>
where E: Executor<'e, Database = Sqlite> {
    sqlx::query_as::<_, AppVersion>(&format!("SELECT {VERSION_COLUMNS} FROM app_version WHERE app_id = ?1 ORDER BY update_cursor ASC, sequence ASC"))
        .bind(app_id)
        .fetch_all(ex).await
}

pub async fn list_downstreams<'e, E>(ex: E, app_id: &str) -> Result<Vec<AppDownstream>, sqlx::Error>
where E: Executor<'e, Database = Sqlite> {
    sqlx::query_as::<_, AppDownstream>("SELECT app_id, cluster_id, downstream_name, current_sequence FROM app_downstream WHERE app_id = ?1 ORDER BY cluster_id")
        .bind(app_id)
        .fetch_all(ex).await
}

pub async fn get_downstream<'e, E>(ex: E, app_id: &str, cluster_id: &str) -> Result<Option<AppDownstream>, sqlx::Error>
where E: Executor<'e, Database = Sqlite> {
    sqlx::query_as::<_, AppDownstream>("SELECT app_id, cluster_id, downstream_name, current_sequence FROM app_downstream WHERE app_id = ?1 AND cluster_id = ?2")
        .bind(app_id)
        .bind(cluster_id)
        .fetch_optional(ex).await
}

pub async fn list_downstream_versions<'e, E>(ex: E, app_id: &str, cluster_id: &str) -> Result<Vec<DownstreamVersion>, sqlx::Error>
where E: Executor<'e, Database = Sqlite> {
    sqlx::query_as::<_, DownstreamVersion>("SELECT app_id, cluster_id, sequence, status, applied_at FROM app_downstream_version WHERE app_id = ?1 AND cluster_id = ?2 ORDER BY sequence DESC")
        .bind(app_id)
        .bind(cluster_id)
        .fetch_all(ex).await
}
