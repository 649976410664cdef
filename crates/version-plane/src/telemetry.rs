use prometheus::{TextEncoder, Encoder, Registry, IntCounterVec, HistogramVec, opts, histogram_opts};
use once_cell::sync::Lazy;
use axum::{response::IntoResponse, http::StatusCode};

pub static REGISTRY: Lazy<Registry> = Lazy::new(Registry::new);
pub static HTTP_REQUESTS: Lazy<IntCounterVec> = Lazy::new(|| {
    let c = IntCounterVec::new(opts!("http_requests_total", "HTTP request count"), &["method", "path", "status"]).expect("valid metric");
    REGISTRY.register(Box::new(c.clone())).ok();
    c
});
pub static HTTP_REQUEST_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    let h = HistogramVec::new(histogram_opts!("http_request_duration_seconds", "HTTP request latency"), &["method", "path"]).expect("valid metric");
    REGISTRY.register(Box::new(h.clone())).ok();
    h
});
pub static VERSIONS_CREATED: Lazy<IntCounterVec> = Lazy::new(|| {
    let c = IntCounterVec::new(opts!("app_versions_created_total", "App versions persisted"), &["source"]).expect("valid metric");
    REGISTRY.register(Box::new(c.clone())).ok();
    c
});
pub static DEPLOY_TRANSITIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    let c = IntCounterVec::new(opts!("deploy_transitions_total", "Deploy state transitions by outcome"), &["outcome"]).expect("valid metric");
    REGISTRY.register(Box::new(c.clone())).ok();
    c
});
pub static GITOPS_NOTIFY_FAILURES: Lazy<IntCounterVec> = Lazy::new(|| {
    let c = IntCounterVec::new(opts!("gitops_notify_failures_total", "GitOps commits that failed after a version was persisted"), &["cluster_id"]).expect("valid metric");
    REGISTRY.register(Box::new(c.clone())).ok();
    c
});

/// Collapse path parameters so metric label cardinality stays bounded.
pub fn normalize_path(path: &str) -> String {
    let segs: Vec<&str> = path.split('/').collect();
    let mut out = Vec::with_capacity(segs.len());
    for (i, seg) in segs.iter().enumerate() {
        let prev = if i > 0 { segs[i - 1] } else { "" };
        let norm = match prev {
            "apps" => ":app_id",
            "clusters" => ":cluster_id",
            "versions" if seg.chars().all(|c| c.is_ascii_digit()) && !seg.is_empty() => ":sequence",
            _ => *seg,
        };
        out.push(norm);
    }
    out.join("/")
}

pub async fn metrics_handler() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buf = Vec::new();
    if encoder.encode(&metric_families, &mut buf).is_err() { return StatusCode::INTERNAL_SERVER_ERROR.into_response(); }
    ([("Content-Type","text/plain; version=0.0.4")], buf).into_response()
}

#[cfg(test)]
mod tests {
    use super::normalize_path;

    #[test]
    fn normalize_path_collapses_ids() {
        assert_eq!(normalize_path("/apps/sentry/versions"), "/apps/:app_id/versions");
        assert_eq!(normalize_path("/apps/sentry/versions/12/deploy"), "/apps/:app_id/versions/:sequence/deploy");
        assert_eq!(normalize_path("/apps/a/clusters/c1/versions"), "/apps/:app_id/clusters/:cluster_id/versions");
        assert_eq!(normalize_path("/health"), "/health");
    }
}
