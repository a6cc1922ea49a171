use crate::domain::value_objects::BoundingBox;
use anyhow::{anyhow, bail};
use serde::Deserialize;
use std::path::PathBuf;

/// Spatial acceleration structure used for boundary lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpatialIndexKind {
    /// R-tree over polygon envelopes and block centroids
    Rtree,
    /// Bounding-box prefilter with a linear scan
    Scan,
}

impl SpatialIndexKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "rtree" | "r-tree" => Some(Self::Rtree),
            "scan" | "linear" => Some(Self::Scan),
            _ => None,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    // Boundary data
    pub boundary_path: PathBuf,
    pub governorate_fallback: bool,
    pub bounds: BoundingBox,
    pub spatial_index: SpatialIndexKind,
    pub boundary_watch_secs: u64,

    // Audit log
    pub log_db_path: PathBuf,
    pub log_queue_capacity: usize,
    pub log_batch_size: usize,

    // HTTP API
    pub api_listen_addr: String,

    pub debug: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            boundary_path: PathBuf::from("boundaries"),
            governorate_fallback: false,
            bounds: BoundingBox::KUWAIT,
            spatial_index: SpatialIndexKind::Rtree,
            boundary_watch_secs: 0,
            log_db_path: PathBuf::from("resolution_log.db"),
            log_queue_capacity: 10_000,
            log_batch_size: 256,
            api_listen_addr: "0.0.0.0:8090".to_string(),
            debug: false,
        }
    }
}

pub fn load_config() -> anyhow::Result<Config> {
    load_config_from(|key| std::env::var(key).ok())
}

fn flag(value: Option<String>) -> bool {
    value
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

/// Build the configuration from an arbitrary variable lookup.
///
/// Malformed numbers fall back to their default; malformed bounds or an
/// unknown index kind are errors.
pub fn load_config_from<F>(lookup: F) -> anyhow::Result<Config>
where
    F: Fn(&str) -> Option<String>,
{
    let defaults = Config::default();

    let boundary_path = lookup("ZONE_BOUNDARY_PATH")
        .map(PathBuf::from)
        .unwrap_or(defaults.boundary_path);

    let governorate_fallback = flag(lookup("ZONE_GOVERNORATE_FALLBACK"));

    let bounds = match lookup("ZONE_BOUNDS") {
        Some(raw) => BoundingBox::parse(&raw).ok_or_else(|| {
            anyhow!("ZONE_BOUNDS must be min_lat,min_lon,max_lat,max_lon, got {:?}", raw)
        })?,
        None => defaults.bounds,
    };

    let spatial_index = match lookup("ZONE_SPATIAL_INDEX") {
        Some(raw) => match SpatialIndexKind::parse(&raw) {
            Some(kind) => kind,
            None => bail!("ZONE_SPATIAL_INDEX must be rtree or scan, got {:?}", raw),
        },
        None => defaults.spatial_index,
    };

    let boundary_watch_secs = lookup("ZONE_BOUNDARY_WATCH_SECS")
        .and_then(|v| v.parse().ok())
        .unwrap_or(defaults.boundary_watch_secs);

    let log_db_path = lookup("ZONE_LOG_DB_PATH")
        .map(PathBuf::from)
        .unwrap_or(defaults.log_db_path);

    let log_queue_capacity = lookup("ZONE_LOG_QUEUE_CAPACITY")
        .and_then(|v| v.parse().ok())
        .filter(|&n: &usize| n > 0)
        .unwrap_or(defaults.log_queue_capacity);

    let log_batch_size = lookup("ZONE_LOG_BATCH_SIZE")
        .and_then(|v| v.parse().ok())
        .filter(|&n: &usize| n > 0)
        .unwrap_or(defaults.log_batch_size);

    let api_listen_addr = lookup("ZONE_API_LISTEN_ADDR").unwrap_or(defaults.api_listen_addr);

    let debug = lookup("DEBUG").is_some();

    Ok(Config {
        boundary_path,
        governorate_fallback,
        bounds,
        spatial_index,
        boundary_watch_secs,
        log_db_path,
        log_queue_capacity,
        log_batch_size,
        api_listen_addr,
        debug,
    })
}
