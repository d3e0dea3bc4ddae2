// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod affinity;
pub mod api;
pub mod config;
pub mod engine;
pub mod error;
pub mod metrics;
pub mod observations;
pub mod ranking;
pub mod security;
pub mod source;
pub mod synth;

// ---- Re-exports for stable public API ----
pub use crate::api::{router, AppState};
pub use crate::config::AppConfig;
pub use crate::engine::{EngineHandle, EngineSettings, RefreshReport};
pub use crate::error::EngineError;
pub use crate::ranking::{Recommendation, ScoreDetails};

use axum::Router;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::metrics::Metrics;
use crate::source::{ObservationSource, SnapshotFileSource};

/// Build the engine and run its first refresh. Initialization failure is
/// logged and yields an un-ready engine (health reports degraded,
/// `/refresh-model` can recover).
pub async fn build_engine_with(
    source: Arc<dyn ObservationSource>,
    cfg: &AppConfig,
) -> EngineHandle {
    let handle = EngineHandle::unready(source, EngineSettings::from(cfg));
    match handle.refresh().await {
        Ok(report) => info!(
            generation = report.generation,
            ratings = report.ratings,
            "engine initialized successfully"
        ),
        Err(e) => error!(error = %e.root(), "engine initialization failed; serving degraded"),
    }
    handle
}

/// Full in-process app router. With `metrics_route` the Prometheus recorder
/// is installed before the first refresh and `/metrics` is mounted.
pub async fn app(cfg: &AppConfig, metrics_route: bool) -> Router {
    let source: Arc<dyn ObservationSource> = Arc::new(SnapshotFileSource::new(&cfg.source.path));
    app_with(source, cfg, metrics_route).await
}

pub async fn app_with(
    source: Arc<dyn ObservationSource>,
    cfg: &AppConfig,
    metrics_route: bool,
) -> Router {
    let metrics = if metrics_route {
        Metrics::init()
            .map_err(|e| warn!(error = %e, "metrics route disabled"))
            .ok()
    } else {
        None
    };

    let engine = build_engine_with(source, cfg).await;
    let routes = router(AppState::new(engine, cfg));
    match metrics {
        Some(m) => routes.merge(m.router()),
        None => routes,
    }
}
