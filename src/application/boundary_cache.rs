//! Boundary Cache - snapshot lifecycle
//!
//! Owns the single active `BoundarySnapshot`. The snapshot is loaded lazily
//! on first use, replaced only by an explicit reload, and published with one
//! atomic pointer swap so readers see either the old or the new snapshot.

use crate::domain::error::BoundaryLoadError;
use crate::domain::ports::{BoundarySource, SpatialIndexFactory};
use crate::domain::services::BoundarySnapshot;
use crate::domain::value_objects::{BoundingBox, ZoneLevel};
use arc_swap::ArcSwapOption;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Injectable holder of the active boundary snapshot.
///
/// Loads are serialized by `load_lock`; readers never wait on it once a
/// snapshot exists.
pub struct BoundaryCache {
    source: Arc<dyn BoundarySource>,
    factory: Arc<dyn SpatialIndexFactory>,
    bounds: BoundingBox,
    current: ArcSwapOption<BoundarySnapshot>,
    load_lock: Mutex<()>,
    stale: AtomicBool,
    version: AtomicU64,
    loads: AtomicU64,
}

impl BoundaryCache {
    pub fn new(
        source: Arc<dyn BoundarySource>,
        factory: Arc<dyn SpatialIndexFactory>,
        bounds: BoundingBox,
    ) -> Self {
        Self {
            source,
            factory,
            bounds,
            current: ArcSwapOption::empty(),
            load_lock: Mutex::new(()),
            stale: AtomicBool::new(false),
            version: AtomicU64::new(0),
            loads: AtomicU64::new(0),
        }
    }

    /// Active snapshot, loading it on first use.
    ///
    /// Concurrent first callers converge on one load: the losers wait on the
    /// load lock and then find the winner's snapshot. After `invalidate()`
    /// exactly one caller reloads while the others keep getting the previous
    /// snapshot; if that reload fails the previous snapshot keeps serving.
    pub fn snapshot(&self) -> Result<Arc<BoundarySnapshot>, BoundaryLoadError> {
        if let Some(current) = self.current.load_full() {
            if !self.stale.load(Ordering::Acquire) {
                return Ok(current);
            }
            // Someone else is already loading: serve what we have.
            let Some(_guard) = self.load_lock.try_lock() else {
                return Ok(current);
            };
            if !self.stale.load(Ordering::Acquire) {
                return Ok(self.current.load_full().unwrap_or(current));
            }
            // One attempt per invalidation; keep serving what we have.
            return Ok(self.load_locked().unwrap_or(current));
        }

        let _guard = self.load_lock.lock();
        match self.current.load_full() {
            Some(snapshot) => Ok(snapshot),
            None => self.load_locked(),
        }
    }

    /// Load a fresh snapshot and swap it in.
    ///
    /// Concurrent reloads are serialized. On failure the active snapshot
    /// (if any) is left untouched and the error is returned.
    pub fn reload(&self) -> Result<Arc<BoundarySnapshot>, BoundaryLoadError> {
        let _guard = self.load_lock.lock();
        self.load_locked()
    }

    /// Mark the active snapshot stale so the next `snapshot()` reloads.
    pub fn invalidate(&self) {
        self.stale.store(true, Ordering::Release);
        tracing::debug!("boundary snapshot invalidated");
    }

    /// Active snapshot without triggering a load.
    pub fn current(&self) -> Option<Arc<BoundarySnapshot>> {
        self.current.load_full()
    }

    /// Version of the active snapshot, 0 before the first load.
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::Acquire)
    }

    /// Number of successful loads so far.
    pub fn load_count(&self) -> u64 {
        self.loads.load(Ordering::Relaxed)
    }

    pub fn is_stale(&self) -> bool {
        self.stale.load(Ordering::Acquire)
    }

    /// Caller must hold `load_lock`.
    ///
    /// Clears `stale` before reading the source so an `invalidate()` that
    /// lands mid-load survives for the next caller.
    fn load_locked(&self) -> Result<Arc<BoundarySnapshot>, BoundaryLoadError> {
        self.stale.store(false, Ordering::Release);
        let started = Instant::now();
        let version = self.version.load(Ordering::Acquire) + 1;
        let source = self.source.describe();

        let snapshot = self
            .source
            .load()
            .and_then(|dataset| {
                BoundarySnapshot::build(dataset, self.factory.as_ref(), self.bounds, version, source.as_str())
            })
            .map_err(|e| {
                tracing::error!(source = %source, error = %e, "failed to load boundaries");
                e
            })?;

        let snapshot = Arc::new(snapshot);
        self.current.store(Some(snapshot.clone()));
        self.version.store(version, Ordering::Release);
        self.loads.fetch_add(1, Ordering::Relaxed);

        tracing::info!(
            version,
            source = %source,
            index = snapshot.index_kind(),
            governorates = snapshot.count(ZoneLevel::Governorate),
            districts = snapshot.count(ZoneLevel::District),
            blocks = snapshot.count(ZoneLevel::Block),
            police_zones = snapshot.count(ZoneLevel::PoliceZone),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "boundary snapshot loaded"
        );

        Ok(snapshot)
    }
}

impl std::fmt::Debug for BoundaryCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundaryCache")
            .field("source", &self.source.describe())
            .field("index", &self.factory.name())
            .field("version", &self.version())
            .field("stale", &self.is_stale())
            .finish()
    }
}
