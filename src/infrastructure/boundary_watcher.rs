//! Boundary File Watcher
//!
//! Polls the modification times of the boundary files and triggers a
//! snapshot reload when any of them changes. Reloads run on the blocking
//! pool; a failed reload leaves the previous snapshot serving.

use crate::application::BoundaryCache;
use crate::infrastructure::ShutdownController;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::sync::RwLock;

pub struct BoundaryWatcher {
    /// Watched files with their last seen modification time (None if absent)
    watched_files: RwLock<HashMap<PathBuf, Option<SystemTime>>>,
    poll_interval: Duration,
}

fn modified(path: &Path) -> Option<SystemTime> {
    std::fs::metadata(path).and_then(|m| m.modified()).ok()
}

impl BoundaryWatcher {
    /// Watch `files`, recording their current modification times as the
    /// baseline.
    pub fn new(files: impl IntoIterator<Item = PathBuf>, poll_interval: Duration) -> Self {
        let watched = files
            .into_iter()
            .map(|path| {
                let mtime = modified(&path);
                (path, mtime)
            })
            .collect();

        Self {
            watched_files: RwLock::new(watched),
            poll_interval,
        }
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    pub async fn watched_count(&self) -> usize {
        self.watched_files.read().await.len()
    }

    /// Files whose modification time moved forward (or that appeared)
    /// since the last check. Deleted files are not reported.
    pub async fn check_files(&self) -> Vec<PathBuf> {
        let mut changed = Vec::new();
        let mut files = self.watched_files.write().await;

        for (path, last_mtime) in files.iter_mut() {
            let Some(mtime) = modified(path) else {
                continue;
            };
            if last_mtime.map_or(true, |last| mtime > last) {
                changed.push(path.clone());
                *last_mtime = Some(mtime);
            }
        }

        changed.sort();
        changed
    }

    /// Run the polling loop until shutdown.
    #[cfg_attr(coverage_nightly, coverage(off))]
    pub fn start(
        self: Arc<Self>,
        cache: Arc<BoundaryCache>,
        shutdown: ShutdownController,
    ) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(self.poll_interval);
            // The first tick completes immediately
            interval.tick().await;

            loop {
                tokio::select! {
                    _ = interval.tick() => {}
                    _ = shutdown.wait() => break,
                }

                let changed = self.check_files().await;
                if changed.is_empty() {
                    continue;
                }
                tracing::info!(files = ?changed, "boundary files modified, reloading");

                let cache = cache.clone();
                match tokio::task::spawn_blocking(move || cache.reload()).await {
                    Ok(Ok(snapshot)) => {
                        tracing::info!(version = snapshot.version(), "boundaries reloaded from watcher")
                    }
                    Ok(Err(e)) => {
                        tracing::warn!(error = %e, "boundary reload failed, keeping previous snapshot")
                    }
                    Err(e) => tracing::error!(error = %e, "boundary reload task panicked"),
                }
            }

            tracing::debug!("boundary watcher stopped");
        })
    }
}
