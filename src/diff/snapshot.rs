use std::collections::HashMap;

use crate::{
    host::{HostHandle, HostSceneRef, HostTransform},
    tree::HostBinding,
    types::NodeId,
};

/// The observed state of one host node at capture time. Everything needed to
/// classify a later change or to address the node after it is gone is copied
/// out; handles of removed nodes must never be dereferenced again.
#[derive(Clone, Debug)]
pub struct SnapshotItem {
    pub handle: HostHandle,
    pub parent: HostHandle,
    pub sibling_index: usize,
    pub name: String,
    /// Bound model id at capture time, if any. Id-less nodes are parts of an
    /// asset instance and get addressed by path relative to this ancestor
    /// chain.
    pub id: Option<NodeId>,
    pub in_asset_instance: bool,
    pub transform: HostTransform,
    pub material_keys: Option<Vec<u64>>,
}

/// A full capture of the monitored host subtree, keyed by handle. The root
/// itself is not an item; only its descendants are tracked.
#[derive(Clone, Debug, Default)]
pub struct Snapshot {
    items: HashMap<HostHandle, SnapshotItem>,
}

impl Snapshot {
    /// Walk the subtree below `root` and record every node.
    pub fn capture(host: &dyn HostSceneRef, root: &HostHandle, binding: &HostBinding) -> Self {
        let mut items = HashMap::new();
        let mut stack = host.children(root);
        while let Some(handle) = stack.pop() {
            let item = SnapshotItem {
                handle,
                // Children always have a parent; the walk never reaches the
                // scene root.
                parent: host.parent(&handle).unwrap_or(*root),
                sibling_index: host.sibling_index(&handle),
                name: host.name(&handle),
                id: binding.node_id(&handle).cloned(),
                in_asset_instance: host.in_asset_instance(&handle),
                transform: host.transform(&handle),
                material_keys: host.material_keys(&handle),
            };
            items.insert(handle, item);
            stack.extend(host.children(&handle));
        }
        Self { items }
    }

    pub fn contains(&self, handle: &HostHandle) -> bool {
        self.items.contains_key(handle)
    }

    pub fn get(&self, handle: &HostHandle) -> Option<&SnapshotItem> {
        self.items.get(handle)
    }

    pub fn iter(&self) -> impl Iterator<Item = &SnapshotItem> {
        self.items.values()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
