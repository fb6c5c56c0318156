use thiserror::Error;

use crate::{dictionary::DictionaryItem, types::Vec3};

/// Opaque key for a live node instance in the host scene graph.
///
/// The host owns node lifetime; a `HostHandle` is a non-owning lookup key
/// that may go stale when the host destroys the node. Stale handles are
/// cleaned out of the binding maps explicitly, never dereferenced blindly.
#[derive(PartialEq, Eq, Hash, Clone, Copy, Debug)]
pub struct HostHandle(u64);

impl HostHandle {
    pub fn from_u64(value: u64) -> Self {
        HostHandle(value)
    }

    pub fn to_u64(&self) -> u64 {
        self.0
    }
}

/// Local transform of a host node. Rotation is in euler angles, matching the
/// wire representation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HostTransform {
    pub position: Vec3,
    pub rotation: Vec3,
    pub scale: Vec3,
}

impl Default for HostTransform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Vec3::ZERO,
            scale: Vec3::ONE,
        }
    }
}

/// Errors surfaced by the host scene graph when asked to mutate itself.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HostSceneError {
    /// The host could not instantiate a library asset from the given
    /// dictionary entry (asset files missing or corrupt).
    #[error("failed to instantiate asset '{name}' from '{path}'")]
    InstantiationFailed { path: String, name: String },

    /// The host could not produce a material instance for a slot update.
    #[error("failed to instantiate material '{name}'")]
    MaterialInstantiationFailed { name: String },
}

/// Read access to the engine-owned scene graph.
///
/// All queries take a handle the caller believes to be live; querying a
/// destroyed handle is a programming error on the host side. `contains` is
/// the one query that is always safe.
pub trait HostSceneRef {
    /// Whether the handle refers to a currently live node.
    fn contains(&self, handle: &HostHandle) -> bool;

    fn name(&self, handle: &HostHandle) -> String;

    /// Parent handle, or None for the scene root.
    fn parent(&self, handle: &HostHandle) -> Option<HostHandle>;

    /// Children in sibling order.
    fn children(&self, handle: &HostHandle) -> Vec<HostHandle>;

    fn sibling_index(&self, handle: &HostHandle) -> usize;

    fn transform(&self, handle: &HostHandle) -> HostTransform;

    fn active(&self, handle: &HostHandle) -> bool;

    /// Per-slot material identity keys for renderable nodes, None otherwise.
    /// The keys only need to be stable while the material is unchanged; they
    /// are compared between snapshots, never sent on the wire.
    fn material_keys(&self, handle: &HostHandle) -> Option<Vec<u64>>;

    /// The library-asset source `(path, name)` when this node is the root of
    /// an asset instance, None for plain nodes and non-root asset parts.
    fn asset_instance_root(&self, handle: &HostHandle) -> Option<(String, String)>;

    /// Whether this node belongs to any library-asset instance (root or
    /// descendant).
    fn in_asset_instance(&self, handle: &HostHandle) -> bool;

    /// The library-asset source `(path, name)` of the material currently in
    /// the given slot, if the node is renderable and the slot exists.
    fn material_source(&self, handle: &HostHandle, slot: usize) -> Option<(String, String)>;
}

/// Mutating access to the engine-owned scene graph. The synchronization
/// engine drives these operations but never owns the resulting nodes.
pub trait HostSceneMut: HostSceneRef {
    /// Create an empty node under `parent`, appended as the last child.
    fn create_node(&mut self, parent: &HostHandle, name: &str) -> HostHandle;

    /// Instantiate a library asset under `parent` from a dictionary entry.
    fn instantiate_asset(
        &mut self,
        parent: &HostHandle,
        item: &DictionaryItem,
        name: &str,
        kind: Option<&str>,
    ) -> Result<HostHandle, HostSceneError>;

    /// Destroy the node and its entire subtree.
    fn destroy_node(&mut self, handle: &HostHandle);

    fn set_parent(&mut self, handle: &HostHandle, parent: &HostHandle, sibling_index: usize);

    fn set_sibling_index(&mut self, handle: &HostHandle, index: usize);

    fn set_name(&mut self, handle: &HostHandle, name: &str);

    fn set_active(&mut self, handle: &HostHandle, active: bool);

    fn set_position(&mut self, handle: &HostHandle, position: Vec3);

    fn set_rotation(&mut self, handle: &HostHandle, rotation: Vec3);

    fn set_scale(&mut self, handle: &HostHandle, scale: Vec3);

    /// Replace the material in `slot` with an instance resolved from the
    /// dictionary entry.
    fn set_material(
        &mut self,
        handle: &HostHandle,
        slot: usize,
        item: &DictionaryItem,
        name: &str,
    ) -> Result<(), HostSceneError>;
}
