//! Synapse Recommendation Service: binary entrypoint.
//! Boots the Axum HTTP server: loads config, builds the engine (degraded if
//! the data source is unusable) and wires routes.

use shuttle_axum::ShuttleAxum;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use synapse_recommender::{app, AppConfig};

/// Install the tracing subscriber.
///   - RUST_LOG overrides the default filter
///   - SYNAPSE_LOG_JSON=1 switches to JSON lines
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("synapse_recommender=info,warn"));

    let json = std::env::var("SYNAPSE_LOG_JSON")
        .ok()
        .is_some_and(|v| v == "1");

    let registry = tracing_subscriber::registry().with(filter);
    let res = if json {
        registry.with(fmt::layer().json()).try_init()
    } else {
        registry.with(fmt::layer().compact()).try_init()
    };
    // Shuttle may already have installed a subscriber.
    if res.is_err() {
        tracing::debug!("tracing subscriber already set");
    }
}

fn debug_routes_enabled() -> bool {
    std::env::var("DEBUG_ROUTES").ok().as_deref() == Some("1")
}

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();

    init_tracing();

    let cfg = AppConfig::load().map_err(shuttle_runtime::Error::Custom)?;
    if cfg.api_key.is_none() {
        tracing::warn!("RECOMMENDER_API_KEY not set; protected routes will answer 500");
    }

    // Metrics recorder goes in before the first refresh so startup series land.
    let router = app(&cfg, debug_routes_enabled()).await;

    Ok(router.into())
}
