//! Reconciliation between local host edits, the shared model, and remote
//! messages.

mod error;
mod selection;
mod sync_controller;

pub use error::SyncError;
pub use selection::{SelectedNode, SelectionTracker};
pub use sync_controller::SyncController;
