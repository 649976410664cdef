//! Binary entrypoint for the version-plane service.
use version_plane::{
    build_router, config::EffectiveConfig, db::init_db, gitops::GitOpsDisabled, kinds::FsSpecLoader,
    logging::init_logging, secrets::NoSecretBackend, services::versions::VersionCreator,
    telemetry::{normalize_path, HTTP_REQUESTS, HTTP_REQUEST_DURATION}, AppState,
};
use tracing::info;
use std::{net::SocketAddr, sync::Arc, time::Duration};
use axum::{http::Request, middleware::{self, Next}, response::Response, body::Body};
use tower_http::{limit::RequestBodyLimitLayer, cors::CorsLayer, trace::TraceLayer};

const MAX_BODY_BYTES: usize = 1024 * 1024; // 1MB

async fn track_metrics(req: Request<Body>, next: Next) -> Response {
    let method = req.method().clone();
    let path_label = normalize_path(req.uri().path());
    let start = std::time::Instant::now();
    let resp = next.run(req).await;
    let status = resp.status().as_u16().to_string();
    HTTP_REQUESTS.with_label_values(&[method.as_str(), path_label.as_str(), status.as_str()]).inc();
    HTTP_REQUEST_DURATION.with_label_values(&[method.as_str(), path_label.as_str()]).observe(start.elapsed().as_secs_f64());
    resp
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = EffectiveConfig::load()?;
    init_logging(&cfg.log_level, cfg.log_format)?;
    let db_pool = init_db(&cfg.database_url, cfg.max_connections).await?;
    let versions = VersionCreator::new(db_pool.clone(), Arc::new(FsSpecLoader), Arc::new(NoSecretBackend), Arc::new(GitOpsDisabled));
    let state = AppState { db: db_pool, versions };

    let app = build_router(state)
        .layer(CorsLayer::permissive())
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(track_metrics));
    let addr: SocketAddr = cfg.listen.parse()?;
    info!(%addr, "version-plane listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error=%e, "shutdown.signal_handler_failed");
            std::future::pending::<()>().await;
        }
        info!(target: "shutdown.signal", "received Ctrl+C");
        tokio::time::sleep(Duration::from_millis(200)).await; // graceful drain window
    };
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}
