// src/metrics.rs
//! Prometheus exposition for engine and request metrics. The recorder must be
//! installed before the engine's first refresh or its series are lost.

use axum::{routing::get, Router};
use metrics::{describe_counter, describe_gauge, describe_histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

pub const RECOMMEND_REQUESTS: &str = "recommend_requests_total";
pub const RECOMMEND_EMPTY: &str = "recommend_empty_total";
pub const RECOMMEND_DURATION_MS: &str = "recommend_duration_ms";
pub const REFRESH_TOTAL: &str = "engine_refresh_total";
pub const REFRESH_MS: &str = "engine_refresh_ms";
pub const ENGINE_RATINGS: &str = "engine_ratings";
pub const ENGINE_GENERATION: &str = "engine_generation";

fn describe_all() {
    describe_counter!(RECOMMEND_REQUESTS, "Recommendation requests served.");
    describe_counter!(
        RECOMMEND_EMPTY,
        "Recommendation requests with no qualifying candidates."
    );
    describe_histogram!(RECOMMEND_DURATION_MS, "Ranking time in milliseconds.");
    describe_counter!(REFRESH_TOTAL, "Snapshot rebuilds by outcome.");
    describe_histogram!(REFRESH_MS, "Synthesize + train time in milliseconds.");
    describe_gauge!(ENGINE_RATINGS, "Synthesized ratings in the live snapshot.");
    describe_gauge!(ENGINE_GENERATION, "Generation of the live snapshot.");
}

/// One-time metrics registration (so series show up on /metrics).
/// Descriptions only reach a recorder that is already installed, which is
/// why `Metrics::init` describes again unconditionally.
pub fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(describe_all);
}

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the global Prometheus recorder. Fails if one is already set.
    pub fn init() -> anyhow::Result<Self> {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .map_err(|e| anyhow::anyhow!("prometheus: install recorder: {e}"))?;
        describe_all();
        Ok(Self { handle })
    }

    /// Returns a router exposing `/metrics` with the Prometheus exposition format.
    pub fn router(&self) -> Router {
        let handle = self.handle.clone();
        Router::new().route(
            "/metrics",
            get(move || {
                let h = handle.clone();
                async move { h.render() }
            }),
        )
    }
}
