//! # Scenelink
//! Synchronization engine for collaborative scene-graph editing: a shared
//! tree model, a snapshot diff engine that turns local edits into messages,
//! a JSON-over-text-frame wire protocol, and a reconciliation controller
//! that applies remote edits back into the embedding host's scene graph.

pub mod controller;
pub mod dictionary;
pub mod diff;
pub mod host;
pub mod path;
pub mod protocol;
pub mod resolver;
pub mod session;
pub mod transport;
pub mod tree;
pub mod types;

pub use controller::{SelectedNode, SelectionTracker, SyncController, SyncError};
pub use dictionary::{AssetDictionary, DictionaryItem, OriginHint};
pub use diff::{ChangeKind, DiffEngine, DiffEvent, RemovedNode, Snapshot, SnapshotItem};
pub use host::{HostHandle, HostSceneError, HostSceneMut, HostSceneRef, HostTransform};
pub use path::{NodePath, PathError, PathStep};
pub use protocol::{
    Envelope, Frame, FrameCommand, MessageBody, NodeChange, ProtocolError, WireError, WireSession,
};
pub use resolver::{IdentifyError, IdentifyRequest, Resolver};
pub use session::{Participant, SessionRoster};
pub use transport::{Transport, TransportError};
pub use tree::{
    AssetRef, HostBinding, MaterialOverride, NodeStatus, SceneNode, SceneTree, SerializedTree,
};
pub use types::{NodeId, ParticipantId, Sequence, SessionId, Vec3};
