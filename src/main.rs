//! zone-resolver - Kuwait geographic zone resolution service
//!
//! This is the composition root that wires together all the components.

use anyhow::Context;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::fmt::format::FmtSpan;
use zone_resolver::adapters::inbound::ApiServer;
use zone_resolver::adapters::outbound::{
    DashMapResolutionMetrics, EnvelopeScanIndexFactory, GeoJsonBoundarySource, RTreeIndexFactory,
    SqliteResolutionLog,
};
use zone_resolver::application::{BoundaryCache, ResolutionLogWriter, ResolutionService};
use zone_resolver::config::{load_config, SpatialIndexKind};
use zone_resolver::domain::ports::SpatialIndexFactory;
use zone_resolver::infrastructure::{shutdown_signal, BoundaryWatcher, ShutdownController};

/// How long shutdown waits for running resolutions and the log flush.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration from environment
    let cfg = load_config()?;

    // Setup logging
    let log_level = if cfg.debug {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_span_events(FmtSpan::CLOSE)
        .init();

    tracing::info!(
        "starting zone-resolver boundaries={} index={:?} listen={}",
        cfg.boundary_path.display(),
        cfg.spatial_index,
        cfg.api_listen_addr
    );

    // ===== COMPOSITION ROOT =====

    // 1. Boundary source and snapshot cache
    let source = Arc::new(GeoJsonBoundarySource::new(&cfg.boundary_path));
    let factory: Arc<dyn SpatialIndexFactory> = match cfg.spatial_index {
        SpatialIndexKind::Rtree => Arc::new(RTreeIndexFactory),
        SpatialIndexKind::Scan => Arc::new(EnvelopeScanIndexFactory),
    };
    let cache = Arc::new(BoundaryCache::new(source.clone(), factory, cfg.bounds));

    // Warm load: never serve against a missing or partial store
    {
        let cache = cache.clone();
        tokio::task::spawn_blocking(move || cache.snapshot())
            .await?
            .context("boundary data failed to load")?;
    }

    // 2. Audit log (SQLite); resolution keeps working without it
    let (log_writer, log_task) = match SqliteResolutionLog::open(&cfg.log_db_path) {
        Ok(log) => {
            tracing::info!("resolution log at {}", cfg.log_db_path.display());
            let (writer, task) =
                ResolutionLogWriter::spawn(Arc::new(log), cfg.log_queue_capacity, cfg.log_batch_size);
            (writer, Some(task))
        }
        Err(e) => {
            tracing::error!(
                "failed to open resolution log {}: {:?}; entries will be dropped",
                cfg.log_db_path.display(),
                e
            );
            (ResolutionLogWriter::disabled(), None)
        }
    };
    let log_writer = Arc::new(log_writer);

    // 3. Application service
    let service = Arc::new(ResolutionService::new(
        cache.clone(),
        Arc::new(DashMapResolutionMetrics::new()),
        log_writer.clone(),
        cfg.governorate_fallback,
    ));

    let shutdown = ShutdownController::new();
    tokio::spawn(shutdown_signal(shutdown.clone()));

    // 4. Optional boundary file watcher
    let watcher_task = if cfg.boundary_watch_secs > 0 {
        let watcher = Arc::new(BoundaryWatcher::new(
            source.files(),
            Duration::from_secs(cfg.boundary_watch_secs),
        ));
        tracing::info!("watching boundary files every {}s", cfg.boundary_watch_secs);
        Some(watcher.start(cache.clone(), shutdown.clone()))
    } else {
        None
    };

    // 5. Inbound adapter
    let server = ApiServer::new(cfg.api_listen_addr.clone(), service, shutdown.clone());
    let served = server.run().await;

    // Stop everything else even if the server failed to bind
    shutdown.shutdown();
    shutdown.wait_for_drain(DRAIN_TIMEOUT).await;
    if let Some(task) = watcher_task {
        let _ = task.await;
    }

    log_writer.close();
    if let Some(task) = log_task {
        if tokio::time::timeout(DRAIN_TIMEOUT, task).await.is_err() {
            tracing::warn!("resolution log flush timed out");
        }
    }

    let stats = log_writer.stats();
    tracing::info!(
        written = stats.written,
        dropped = stats.dropped,
        failed = stats.failed,
        "zone-resolver stopped"
    );

    served
}
