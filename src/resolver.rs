use thiserror::Error;

use crate::dictionary::{DictionaryItem, OriginHint};

/// One asset the engine needs a shared dictionary entry for.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IdentifyRequest {
    pub path: String,
    pub name: String,
    pub hint: Option<OriginHint>,
}

/// Identification failure. The triggering local change is rolled back and
/// not retried; the embedder decides whether to tell the user.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentifyError {
    /// The asset is not part of any shareable library the resolver knows.
    #[error("unknown asset '{name}' at '{path}'")]
    UnknownPrefab { path: String, name: String },

    #[error("identification failed: {message}")]
    Failed { message: String },
}

/// Maps host asset locations to shared dictionary entries. The embedder
/// supplies the implementation (a catalog service, a local index); the
/// engine only sees the answers.
pub trait Resolver {
    /// Resolve every request to a dictionary entry, in request order. All
    /// or nothing: a single unknown asset fails the whole batch.
    fn identify(
        &mut self,
        requests: &[IdentifyRequest],
    ) -> Result<Vec<DictionaryItem>, IdentifyError>;

    /// Whether this installation can source assets from the hinted origin.
    /// Used to vet incoming dictionary broadcasts before accepting them.
    fn origin_available(&self, hint: &OriginHint) -> bool;
}
