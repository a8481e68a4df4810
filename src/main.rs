use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use nexo_meta::config::Config;
use nexo_meta::consensus::snapshot_io::snapshot_exists;
use nexo_meta::MetaEngine;

// ========================================
// MAIN ENTRY POINT
// ========================================

#[tokio::main]
async fn main() {
    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&config.server.log_level))
        .init();

    let engine = MetaEngine::new(&config);
    let snapshot_dir = PathBuf::from(&config.retained.snapshot_path);

    tracing::info!(
        "🚀 Nexo Meta '{}' starting (retained limit per namespace: {})",
        config.server.node_id,
        config.retained.max_per_namespace
    );

    // 1. Warm start from the last snapshot
    if snapshot_exists(&snapshot_dir) {
        match engine.applier.load_snapshot(&snapshot_dir).await {
            Ok(index) => tracing::info!("Recovered retained state at index {}", index),
            Err(e) => tracing::error!("Failed to recover snapshot {:?}: {}", snapshot_dir, e),
        }
    }

    // 2. Periodic snapshots
    let interval_secs = config.retained.snapshot_interval_secs;
    if interval_secs > 0 {
        let applier = engine.applier.clone();
        let dir = snapshot_dir.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));
            interval.tick().await; // Skip first immediate tick
            loop {
                interval.tick().await;
                if let Err(e) = applier.save_snapshot(&dir).await {
                    tracing::error!("Periodic snapshot failed: {}", e);
                }
            }
        });
    }

    // 3. Run until Ctrl-C, then seal a final snapshot
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }

    match engine.applier.save_snapshot(&snapshot_dir).await {
        Ok(index) => tracing::info!("Final snapshot at index {}", index),
        Err(e) => tracing::error!("Final snapshot failed: {}", e),
    }

    match serde_json::to_string(&engine.retained.store().summary()) {
        Ok(summary) => tracing::info!("Retained summary: {}", summary),
        Err(e) => tracing::warn!("Failed to encode summary: {}", e),
    }
    tracing::info!("Uptime: {:?}", engine.start_time.elapsed());
}
