use serde::{Deserialize, Serialize};

use crate::types::{NodeId, Vec3};

/// Visibility / lifecycle state of a node in the shared tree.
///
/// `Deleted` marks a tombstone: the node was removed but stays in the model
/// because its structural position is implied by a library-asset template and
/// must remain addressable.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeStatus {
    Active,
    Inactive,
    Deleted,
    Unset,
}

/// Reference from a node to the library asset it instantiates.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetRef {
    /// Id of the dictionary entry describing the asset.
    #[serde(rename = "id")]
    pub dictionary_id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

/// A material replacement on one renderer slot of a node.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MaterialOverride {
    pub slot: usize,
    #[serde(rename = "id")]
    pub dictionary_id: String,
    pub name: String,
}

/// One entry of the shared scene tree.
///
/// All attribute fields are optional on the wire; absent means "unchanged /
/// default". `path` is only populated while the node has no stable identity
/// of its own yet (a child inside an uninstantiated asset template) and is
/// interpreted relative to the closest identified ancestor.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneNode {
    pub id: NodeId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<NodeStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sibling_index: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Vec3>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rotation: Option<Vec3>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<Vec3>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset: Option<AssetRef>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub materials: Vec<MaterialOverride>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<NodeId>,
}

impl SceneNode {
    pub fn new(id: NodeId) -> Self {
        Self {
            id,
            ..Default::default()
        }
    }

    pub fn is_tombstone(&self) -> bool {
        self.status == Some(NodeStatus::Deleted)
    }

    /// Record a material override, replacing an existing entry for the same
    /// slot.
    pub fn update_material(&mut self, slot: usize, dictionary_id: &str, name: &str) {
        if let Some(existing) = self.materials.iter_mut().find(|m| m.slot == slot) {
            existing.dictionary_id = dictionary_id.to_string();
            existing.name = name.to_string();
        } else {
            self.materials.push(MaterialOverride {
                slot,
                dictionary_id: dictionary_id.to_string(),
                name: name.to_string(),
            });
        }
    }
}
