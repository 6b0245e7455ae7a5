pub mod snapshot;

pub use snapshot::{
    MapSnapshot, SnapshotError, SnapshotMetadata, list_snapshots, load_latest_valid_snapshot,
    load_snapshot, prune_snapshots, save_snapshot,
};
