use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::{
    host::{HostHandle, HostSceneRef},
    tree::{host_binding::HostBinding, scene_node::SceneNode},
    types::NodeId,
};

/// Wire form of a tree or subtree: the root id plus a flat node list.
/// Children are referenced by id from each node's `children` list.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SerializedTree {
    pub root: NodeId,
    pub nodes: Vec<SceneNode>,
}

impl SerializedTree {
    pub fn find(&self, id: &str) -> Option<&SceneNode> {
        self.nodes.iter().find(|node| node.id == id)
    }

    pub fn find_mut(&mut self, id: &str) -> Option<&mut SceneNode> {
        self.nodes.iter_mut().find(|node| node.id == id)
    }
}

/// The in-memory shared hierarchy plus the bidirectional mapping to host
/// scene-graph handles.
///
/// Invariants: every id except the root appears in exactly one parent's
/// `children` list; the binding is a bijection over currently instantiated
/// host nodes (nodes pending identification are addressed by path instead).
#[derive(Clone, Debug)]
pub struct SceneTree {
    root: NodeId,
    nodes: HashMap<NodeId, SceneNode>,
    binding: HostBinding,
}

impl SceneTree {
    /// Create a tree containing only a root node bound to the given host
    /// handle.
    pub fn new(root_id: NodeId, root_name: &str, root_handle: HostHandle) -> Self {
        let mut nodes = HashMap::new();
        let mut root_node = SceneNode::new(root_id.clone());
        root_node.name = Some(root_name.to_string());
        nodes.insert(root_id.clone(), root_node);

        let mut binding = HostBinding::new();
        binding.insert(root_id.clone(), root_handle);

        Self {
            root: root_id,
            nodes,
            binding,
        }
    }

    /// Rebuild the model from a full-sync payload. Only the root is bound;
    /// the caller binds descendants while materializing them in the host.
    pub fn from_serialized(serialized: SerializedTree, root_handle: HostHandle) -> Self {
        let mut nodes = HashMap::new();
        for node in serialized.nodes {
            nodes.insert(node.id.clone(), node);
        }

        let mut binding = HostBinding::new();
        binding.insert(serialized.root.clone(), root_handle);

        Self {
            root: serialized.root,
            nodes,
            binding,
        }
    }

    pub fn root_id(&self) -> &NodeId {
        &self.root
    }

    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn find(&self, id: &str) -> Option<&SceneNode> {
        self.nodes.get(id)
    }

    pub fn find_mut(&mut self, id: &str) -> Option<&mut SceneNode> {
        self.nodes.get_mut(id)
    }

    /// # Panics
    /// Panics when the id is unknown; used where the protocol guarantees the
    /// node exists and continuing would corrupt the model.
    pub fn expect(&self, id: &str) -> &SceneNode {
        let Some(node) = self.nodes.get(id) else {
            panic!("unknown node id referenced where one must exist: {:?}", id);
        };
        node
    }

    /// # Panics
    /// See [`SceneTree::expect`].
    pub fn expect_mut(&mut self, id: &str) -> &mut SceneNode {
        let Some(node) = self.nodes.get_mut(id) else {
            panic!("unknown node id referenced where one must exist: {:?}", id);
        };
        node
    }

    pub fn find_parent_of(&self, id: &str) -> Option<&SceneNode> {
        self.nodes
            .values()
            .find(|node| node.children.iter().any(|child| child == id))
    }

    /// Insert a node into the map without attaching it to a parent. The
    /// caller is responsible for the children-list invariant.
    ///
    /// # Panics
    /// Panics on a duplicate id; ids are never reused within a tree.
    pub fn insert(&mut self, node: SceneNode) {
        if self.nodes.contains_key(&node.id) {
            panic!("cannot insert duplicate node id: {:?}", node.id);
        }
        self.nodes.insert(node.id.clone(), node);
    }

    /// # Panics
    /// Panics when `parent` is unknown. Attaching to a missing parent is a
    /// contract violation, not a recoverable error.
    pub fn add_child(&mut self, parent: &str, child: NodeId) {
        self.expect_mut(parent).children.push(child);
    }

    /// # Panics
    /// Panics when `parent` is unknown or `child` is not among its children.
    pub fn remove_child(&mut self, parent: &str, child: &str) {
        let parent_node = self.expect_mut(parent);
        let Some(position) = parent_node.children.iter().position(|c| c == child) else {
            panic!("node {:?} is not a child of {:?}", child, parent);
        };
        parent_node.children.remove(position);
    }

    /// Splice a serialized subtree into the node map. The caller attaches
    /// the subtree root to its parent's children list separately.
    pub fn merge(&mut self, subtree: SerializedTree) {
        for node in subtree.nodes {
            // A path-addressed placeholder may already exist for a node that
            // arrives again fully identified; the fresh copy wins.
            self.nodes.insert(node.id.clone(), node);
        }
    }

    /// Remove a node and all its descendants from the model, detaching the
    /// root of the removed subtree from its parent and dropping any host
    /// bindings of removed nodes.
    pub fn remove_subtree(&mut self, id: &str) {
        if let Some(parent_id) = self.find_parent_of(id).map(|p| p.id.clone()) {
            self.remove_child(&parent_id, id);
        }

        let mut stack = vec![id.to_string()];
        while let Some(current) = stack.pop() {
            if let Some(node) = self.nodes.remove(&current) {
                stack.extend(node.children.iter().cloned());
            }
            self.binding.remove_by_id(&current);
        }
    }

    /// Walk up from a host node until a handle with a known id is found,
    /// returning that node's id and host handle. Used to anchor newly
    /// created subtrees to their nearest known parent. The walk starts at
    /// the node's parent; `start` itself is expected to be unbound.
    ///
    /// # Panics
    /// Panics when the walk leaves the host tree without hitting a bound
    /// handle; the monitored root is always bound, so that indicates the
    /// handle is outside the collaboration subtree.
    pub fn closest_bound_ancestor(
        &self,
        host: &dyn HostSceneRef,
        start: &HostHandle,
    ) -> (NodeId, HostHandle) {
        let mut current = *start;
        loop {
            let Some(parent) = host.parent(&current) else {
                panic!(
                    "host handle {:?} has no bound ancestor; node is outside the synced subtree",
                    start
                );
            };
            current = parent;
            if let Some(id) = self.binding.node_id(&current) {
                return (id.clone(), current);
            }
        }
    }

    pub fn binding(&self) -> &HostBinding {
        &self.binding
    }

    pub fn binding_mut(&mut self) -> &mut HostBinding {
        &mut self.binding
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SceneNode> {
        self.nodes.values()
    }

    /// Whether the node belongs to an identified library-asset instance
    /// subtree: it carries an asset reference itself or one of its model
    /// ancestors does. Such nodes become tombstones on removal instead of
    /// being dropped, because the asset template implies their position.
    pub fn is_asset_member(&self, id: &str) -> bool {
        let mut current = id.to_string();
        loop {
            let Some(node) = self.nodes.get(&current) else {
                return false;
            };
            if node.asset.is_some() {
                return true;
            }
            let Some(parent) = self.find_parent_of(&current) else {
                return false;
            };
            current = parent.id.clone();
        }
    }
}
