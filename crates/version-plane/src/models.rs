use serde::{Serialize, Deserialize};
use utoipa::ToSchema;
use chrono::{DateTime, Utc};

#[derive(sqlx::FromRow, Serialize, Deserialize, Debug, Clone, ToSchema)]
pub struct Application { pub id: String, pub name: String, pub icon_uri: Option<String>, pub slug: String, pub created_at: DateTime<Utc> }

/// Immutable snapshot of an application's manifests. Rows are only ever inserted.
#[derive(sqlx::FromRow, Serialize, Deserialize, Debug, Clone, ToSchema)]
pub struct AppVersion {
	pub app_id: String,
	pub sequence: i64,
	pub created_at: DateTime<Utc>,
	pub update_cursor: i64,
	pub source: String,
	pub version_label: String,
	pub app_spec: Option<String>,
	pub kots_app_spec: Option<String>,
	pub archive_ref: String,
}

#[derive(sqlx::FromRow, Serialize, Deserialize, Debug, Clone, ToSchema)]
pub struct AppDownstream { pub app_id: String, pub cluster_id: String, pub downstream_name: String, pub current_sequence: Option<i64> }

#[derive(sqlx::FromRow, Serialize, Deserialize, Debug, Clone, ToSchema)]
pub struct DownstreamVersion {
	pub app_id: String,
	pub cluster_id: String,
	pub sequence: i64,
	pub status: String,
	pub applied_at: Option<DateTime<Utc>>,
}

impl DownstreamVersion {
	pub fn status(&self) -> DownstreamStatus { DownstreamStatus::from(self.status.as_str()) }
}

/// Per-cluster status of a version. Only `Pending -> Deployed` (and a redeploy of
/// `Deployed`) is driven from here. `Failed` and unknown states are written by
/// other components; a deploy that targets them is refused, never overwritten.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownstreamStatus { Pending, Deployed, Failed, Other(String) }

impl DownstreamStatus {
	pub fn as_str(&self) -> &str {
		match self { Self::Pending => "pending", Self::Deployed => "deployed", Self::Failed => "failed", Self::Other(s) => s.as_str() }
	}
}

impl From<&str> for DownstreamStatus {
	fn from(s: &str) -> Self {
		match s { "pending" => Self::Pending, "deployed" => Self::Deployed, "failed" => Self::Failed, other => Self::Other(other.to_string()) }
	}
}

/// A descriptor link rewritten against the local port bindings. Derived, never stored.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, ToSchema)]
pub struct RealizedLink { pub title: String, pub uri: String }

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, ToSchema)]
pub struct ForwardedPort { pub service_name: String, pub service_port: i32, pub local_port: i32, pub application_url: String }
