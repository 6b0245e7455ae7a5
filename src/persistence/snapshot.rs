use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use crate::map::position::Geometry;
use crate::map::random::GameRandom;
use crate::map::tile::TileRecord;
use crate::map::update::UpdateState;
use crate::map::Map;

/// Serializable image of a [`Map`] at a given tick.
///
/// The live map carries a non-serializable observer callback, so
/// snapshots go through this intermediate form; the PRNG rides along as
/// its canonical seed string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapSnapshot {
    pub id: Uuid,
    pub name: String,
    pub created_at: String,
    pub tick: u64,
    pub size: u32,
    pub region_count: u32,
    pub rng: GameRandom,
    pub update_state: UpdateState,
    pub tiles: Vec<TileRecord>,
}

impl MapSnapshot {
    pub fn from_map(map: &Map, tick: u64) -> MapSnapshot {
        MapSnapshot {
            id: map.id,
            name: map.name.clone(),
            created_at: map.created_at.clone(),
            tick,
            size: map.geometry().size(),
            region_count: map.region_count(),
            rng: map.rng().clone(),
            update_state: map.update_state().clone(),
            tiles: map.tiles().to_vec(),
        }
    }

    /// Rebuild a live map. Fails if the tile buffer does not match the
    /// recorded size class.
    pub fn into_map(self) -> Result<Map, SnapshotError> {
        let geometry = Geometry::new(self.size);
        Map::from_parts(
            self.id,
            self.name,
            self.created_at,
            geometry,
            self.tiles,
            self.rng,
            self.region_count,
            self.update_state,
        )
        .map_err(SnapshotError::Deserialize)
    }
}

/// Metadata about a snapshot file on disk.
#[derive(Debug, Clone)]
pub struct SnapshotMetadata {
    pub path: PathBuf,
    pub tick: u64,
    pub timestamp: u64,
    pub file_size: u64,
}

/// Errors that can occur during snapshot operations.
#[derive(Debug)]
pub enum SnapshotError {
    Io(io::Error),
    Serialize(String),
    Deserialize(String),
    Corrupt(PathBuf),
    NoValidSnapshots,
}

impl std::fmt::Display for SnapshotError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SnapshotError::Io(e) => write!(f, "I/O error: {}", e),
            SnapshotError::Serialize(e) => write!(f, "Serialization error: {}", e),
            SnapshotError::Deserialize(e) => write!(f, "Deserialization error: {}", e),
            SnapshotError::Corrupt(path) => {
                write!(f, "Corrupt snapshot: {}", path.display())
            }
            SnapshotError::NoValidSnapshots => {
                write!(
                    f,
                    "No valid snapshots found. Generate a new map with: mapstead generate"
                )
            }
        }
    }
}

impl std::error::Error for SnapshotError {}

impl From<io::Error> for SnapshotError {
    fn from(e: io::Error) -> Self {
        SnapshotError::Io(e)
    }
}

/// Build a snapshot filename from tick and timestamp.
fn snapshot_filename(tick: u64, timestamp: u64) -> String {
    format!("map-tick{}-{}.bin", tick, timestamp)
}

/// Parse tick and timestamp from a snapshot filename.
/// Expected format: `map-tick{N}-{timestamp}.bin`
fn parse_snapshot_filename(filename: &str) -> Option<(u64, u64)> {
    let stem = filename.strip_suffix(".bin")?;
    let rest = stem.strip_prefix("map-tick")?;
    let (tick_str, ts_str) = rest.split_once('-')?;
    let tick = tick_str.parse::<u64>().ok()?;
    let ts = ts_str.parse::<u64>().ok()?;
    Some((tick, ts))
}

fn unix_timestamp_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Save a map snapshot to the snapshot directory using atomic write.
///
/// Writes to a temporary file first, then atomically renames to the
/// final path, so a partial write never corrupts an existing snapshot.
pub fn save_snapshot(map: &Map, tick: u64, snapshot_dir: &Path) -> Result<PathBuf, SnapshotError> {
    fs::create_dir_all(snapshot_dir)?;

    let ts = unix_timestamp_now();
    let filename = snapshot_filename(tick, ts);
    let target = snapshot_dir.join(&filename);
    let tmp = snapshot_dir.join(format!(".{}.tmp", filename));

    let snapshot = MapSnapshot::from_map(map, tick);
    let encoded =
        bincode::serialize(&snapshot).map_err(|e| SnapshotError::Serialize(e.to_string()))?;

    if let Err(e) = fs::write(&tmp, &encoded) {
        let _ = fs::remove_file(&tmp);
        return Err(SnapshotError::Io(e));
    }

    if let Err(e) = fs::rename(&tmp, &target) {
        let _ = fs::remove_file(&tmp);
        return Err(SnapshotError::Io(e));
    }

    Ok(target)
}

/// Load a snapshot file.
///
/// Validates that the tile buffer matches the recorded size class and
/// that every tile record decodes to defined values. Bincode accepts
/// any bit pattern for the packed bytes, so a damaged file can decode
/// cleanly and only blow up once a reader unpacks a tile; the record
/// check turns that into `Corrupt` here instead.
pub fn load_snapshot(path: &Path) -> Result<MapSnapshot, SnapshotError> {
    let data = fs::read(path)?;
    let snapshot: MapSnapshot =
        bincode::deserialize(&data).map_err(|e| SnapshotError::Deserialize(e.to_string()))?;

    if snapshot.size > crate::map::MAX_MAP_SIZE
        || snapshot.tiles.len() != Geometry::new(snapshot.size).tile_count()
    {
        return Err(SnapshotError::Corrupt(path.to_path_buf()));
    }

    let records_ok = snapshot.tiles.iter().all(|tile| {
        let water = tile.type_up().is_water() && tile.type_down().is_water();
        tile.is_well_formed(water)
    });
    if !records_ok {
        return Err(SnapshotError::Corrupt(path.to_path_buf()));
    }

    Ok(snapshot)
}

/// List all snapshots in a directory, sorted newest first.
pub fn list_snapshots(snapshot_dir: &Path) -> Result<Vec<SnapshotMetadata>, SnapshotError> {
    if !snapshot_dir.exists() {
        return Ok(Vec::new());
    }

    let mut snapshots = Vec::new();

    for entry in fs::read_dir(snapshot_dir)? {
        let entry = entry?;
        let path = entry.path();

        if !path.is_file() {
            continue;
        }

        let filename = match path.file_name().and_then(|n| n.to_str()) {
            Some(n) => n.to_string(),
            None => continue,
        };

        // Skip temp files
        if filename.starts_with('.') {
            continue;
        }

        if let Some((tick, timestamp)) = parse_snapshot_filename(&filename) {
            let file_size = entry.metadata().map(|m| m.len()).unwrap_or(0);
            snapshots.push(SnapshotMetadata {
                path: path.clone(),
                tick,
                timestamp,
                file_size,
            });
        }
    }

    // Newest first, tick as tiebreaker.
    snapshots.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then(b.tick.cmp(&a.tick)));

    Ok(snapshots)
}

/// Prune old snapshots, keeping only the `max_snapshots` most recent.
///
/// Returns the list of deleted file paths.
pub fn prune_snapshots(
    snapshot_dir: &Path,
    max_snapshots: usize,
) -> Result<Vec<PathBuf>, SnapshotError> {
    let snapshots = list_snapshots(snapshot_dir)?;

    let mut deleted = Vec::new();
    if snapshots.len() > max_snapshots {
        for snapshot in &snapshots[max_snapshots..] {
            fs::remove_file(&snapshot.path)?;
            deleted.push(snapshot.path.clone());
        }
    }

    Ok(deleted)
}

/// Load the most recent valid snapshot, falling back to older ones if
/// the latest is corrupt. Errors only if no valid snapshot exists.
pub fn load_latest_valid_snapshot(snapshot_dir: &Path) -> Result<MapSnapshot, SnapshotError> {
    let snapshots = list_snapshots(snapshot_dir)?;

    if snapshots.is_empty() {
        return Err(SnapshotError::NoValidSnapshots);
    }

    for candidate in &snapshots {
        match load_snapshot(&candidate.path) {
            Ok(snapshot) => return Ok(snapshot),
            Err(e) => {
                warn!(
                    path = %candidate.path.display(),
                    error = %e,
                    "Corrupt snapshot, trying next"
                );
            }
        }
    }

    Err(SnapshotError::NoValidSnapshots)
}
