//! Worldlore host daemon.
//!
//! Owns one knowledge store for the lifetime of the process: loads configuration, seeds the store
//! from entry definitions, logs every change event, and drives the expiration sweep on a fixed
//! tick until Ctrl-C.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use worldlore_core::{
    EventFilter, KnowledgeConfig, KnowledgeEvent, KnowledgeStore, SeedFile, SystemClock,
};

/// Default host tick; the sweep itself runs on the configured expiration interval.
const DEFAULT_TICK_RATE_MS: u64 = 1000;

#[tokio::main]
async fn main() {
    // Load .env file if present (before any env::var calls)
    if let Err(e) = dotenvy::dotenv() {
        eprintln!("[worldlore-daemon] .env not loaded: {} (using system environment)", e);
    }

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = match KnowledgeConfig::load() {
        Ok(config) => config,
        Err(e) => {
            tracing::warn!(error = %e, "config load failed; falling back to environment");
            KnowledgeConfig::from_env()
        }
    };
    let tick_rate = std::env::var("WORLDLORE_TICK_RATE_MS")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or(DEFAULT_TICK_RATE_MS)
        .max(10);

    let mut store = KnowledgeStore::new(config.clone(), Arc::new(SystemClock::new()));
    store.subscribe(EventFilter::all(), |event: &KnowledgeEvent| {
        tracing::debug!(
            target: "worldlore::events",
            kind = %event.kind,
            handle = %event.handle,
            tags = %event.tags,
            location = %event.location,
            "knowledge event"
        );
    });

    if let Ok(path) = std::env::var("WORLDLORE_SEED") {
        let path = PathBuf::from(path);
        match SeedFile::load(&path) {
            Ok(seed) => {
                store.seed(&seed);
            }
            Err(e) => {
                tracing::warn!(error = %e, path = %path.display(), "seed file not loaded");
            }
        }
    }

    tracing::info!(
        tick_rate_ms = tick_rate,
        cell_size = config.spatial_cell_size,
        expiration_interval_secs = config.expiration_interval_secs,
        records = store.len(),
        "worldlore daemon started"
    );

    let mut interval = tokio::time::interval(Duration::from_millis(tick_rate));
    let mut last = Instant::now();

    loop {
        tokio::select! {
            _ = interval.tick() => {
                let now = Instant::now();
                let delta = now.duration_since(last).as_secs_f64();
                last = now;
                store.tick(delta);
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!(records = store.len(), "CTRL-C received; shutting down daemon");
                break;
            }
        }
    }

    store.clear();
}
