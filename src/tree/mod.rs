//! The shared scene hierarchy: node data, the tree model, and the binding
//! between model ids and live host scene-graph handles.

mod host_binding;
mod scene_node;
mod scene_tree;

pub use host_binding::HostBinding;
pub use scene_node::{AssetRef, MaterialOverride, NodeStatus, SceneNode};
pub use scene_tree::{SceneTree, SerializedTree};
