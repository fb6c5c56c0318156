//! Snapshot-based detection of local edits to the monitored host subtree.

mod engine;
mod snapshot;

pub use engine::{ChangeKind, DiffEngine, DiffEvent, RemovedNode};
pub use snapshot::{Snapshot, SnapshotItem};
