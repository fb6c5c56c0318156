use serde::{Deserialize, Serialize};

use crate::{
    dictionary::{AssetDictionary, DictionaryItem},
    session::Participant,
    tree::{MaterialOverride, NodeStatus, SerializedTree},
    types::{NodeId, ParticipantId, Sequence, SessionId, Vec3},
};

/// One per-node delta inside a [`MessageBody::NodesChanged`] batch. Absent
/// fields mean "unchanged". The node is addressed by `id` when it has one,
/// otherwise by `parent_id` plus `path`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeChange {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<NodeId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<NodeId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sibling_index: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Vec3>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rotation: Option<Vec3>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<Vec3>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<NodeStatus>,
}

/// Everything a participant can say to the session, one variant per message
/// kind. The wire tag is the variant name; dispatch is exhaustive so a new
/// kind cannot be silently ignored.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum MessageBody {
    /// Server-to-client session id assignment; consumed by the wire session
    /// and never dispatched to the controller. The field travels as
    /// `sessionId`: the envelope already claims `sid` at the top level, and
    /// the flattened body may not repeat it.
    Handshake {
        #[serde(rename = "sessionId")]
        sid: SessionId,
    },

    /// A participant announces itself after handshaking.
    #[serde(rename_all = "camelCase")]
    Connect { display_name: String },

    /// A participant leaves; its highlights and pending state are dropped.
    Disconnect,

    /// Full state replacement for late joiners.
    Sync {
        tree: SerializedTree,
        dictionary: AssetDictionary,
        participants: Vec<Participant>,
    },

    /// A new subtree appeared under an existing node.
    #[serde(rename_all = "camelCase")]
    NodeAdded {
        parent_id: NodeId,
        tree: SerializedTree,
    },

    /// A subtree vanished. Addressed by `id`, or by `parent_id` + `path`
    /// for nodes that never got one. `mark` asks the receiver to keep a
    /// tombstone instead of deleting the model entry.
    #[serde(rename_all = "camelCase")]
    NodeRemoved {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<NodeId>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        mark: Option<bool>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        parent_id: Option<NodeId>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        path: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },

    /// A batch of attribute deltas.
    NodesChanged { changes: Vec<NodeChange> },

    /// A node moved to a different parent.
    #[serde(rename_all = "camelCase")]
    Reparented {
        id: NodeId,
        new_parent_id: NodeId,
        sibling_index: usize,
    },

    /// Material overrides changed on one node.
    #[serde(rename_all = "camelCase")]
    MaterialsChanged {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<NodeId>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        parent_id: Option<NodeId>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        path: Option<String>,
        changes: Vec<MaterialOverride>,
    },

    /// The sender's current selection, as paths from the monitored root.
    SelectionChanged { paths: Vec<String> },

    /// New shared dictionary entries. Receivers verify they can source every
    /// origin before accepting any of them.
    DictionaryItemsAdded { items: Vec<DictionaryItem> },
}

impl MessageBody {
    /// Per-kind suffix appended to the outgoing destination prefix.
    pub fn destination_suffix(&self) -> &'static str {
        match self {
            MessageBody::Handshake { .. } => "/handshake",
            MessageBody::Connect { .. } => "/connect",
            MessageBody::Disconnect => "/disconnect",
            MessageBody::Sync { .. } => "/sync",
            MessageBody::NodeAdded { .. } => "/nodeAdded",
            MessageBody::NodeRemoved { .. } => "/nodeRemoved",
            MessageBody::NodesChanged { .. } => "/nodesChanged",
            MessageBody::Reparented { .. } => "/reparented",
            MessageBody::MaterialsChanged { .. } => "/materialsChanged",
            MessageBody::SelectionChanged { .. } => "/selectionChanged",
            MessageBody::DictionaryItemsAdded { .. } => "/dictionaryItemsAdded",
        }
    }
}

/// The framing around every message body: who sent it, from which session,
/// and where in that sender's stream it sits. `sequence` is informational
/// only; receivers never validate or reorder on it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    pub origin: ParticipantId,
    pub sid: SessionId,
    pub sequence: Sequence,
    #[serde(flatten)]
    pub body: MessageBody,
}
