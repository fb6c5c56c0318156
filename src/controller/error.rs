use thiserror::Error;

use crate::{host::HostSceneError, protocol::WireError, resolver::IdentifyError};

/// Failures surfaced by the reconciliation controller. Anything not listed
/// here is either handled internally (stale paths are logged and dropped)
/// or a contract violation that panics.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Wire(#[from] WireError),

    /// Asset identification failed; the triggering local change was rolled
    /// back.
    #[error(transparent)]
    Identify(#[from] IdentifyError),

    #[error(transparent)]
    Host(#[from] HostSceneError),

    /// A remote participant shared dictionary entries from an origin pack
    /// this installation cannot source. The session cannot stay consistent;
    /// the embedder should disconnect and tell the user.
    #[error("cannot source assets from origin pack '{key}'")]
    MissingOriginPack { key: String },
}
