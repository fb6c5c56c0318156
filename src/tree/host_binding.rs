use std::collections::HashMap;

use crate::{host::HostHandle, types::NodeId};

/// Bidirectional map between node ids and host scene-graph handles.
///
/// The host owns node lifetime; both directions here are plain lookup
/// indexes. Entries are removed explicitly when the engine destroys a host
/// node or processes a removal event; a handle must never be assumed live
/// just because it is still present here.
#[derive(Clone, Debug, Default)]
pub struct HostBinding {
    id_to_handle: HashMap<NodeId, HostHandle>,
    handle_to_id: HashMap<HostHandle, NodeId>,
}

impl HostBinding {
    pub fn new() -> Self {
        Self {
            id_to_handle: HashMap::new(),
            handle_to_id: HashMap::new(),
        }
    }

    /// # Panics
    /// Panics when either side is already bound; rebinding indicates model
    /// corruption.
    pub fn insert(&mut self, id: NodeId, handle: HostHandle) {
        if self.id_to_handle.contains_key(&id) {
            panic!("cannot overwrite bound node id: {:?}", id);
        }
        if self.handle_to_id.contains_key(&handle) {
            panic!("cannot overwrite bound host handle: {:?}", handle);
        }
        self.id_to_handle.insert(id.clone(), handle);
        self.handle_to_id.insert(handle, id);
    }

    pub fn handle(&self, id: &str) -> Option<&HostHandle> {
        self.id_to_handle.get(id)
    }

    pub fn node_id(&self, handle: &HostHandle) -> Option<&NodeId> {
        self.handle_to_id.get(handle)
    }

    pub fn contains_id(&self, id: &str) -> bool {
        self.id_to_handle.contains_key(id)
    }

    pub fn contains_handle(&self, handle: &HostHandle) -> bool {
        self.handle_to_id.contains_key(handle)
    }

    pub fn remove_by_id(&mut self, id: &str) -> Option<HostHandle> {
        let handle = self.id_to_handle.remove(id)?;
        self.handle_to_id.remove(&handle);
        Some(handle)
    }

    pub fn remove_by_handle(&mut self, handle: &HostHandle) -> Option<NodeId> {
        let id = self.handle_to_id.remove(handle)?;
        self.id_to_handle.remove(&id);
        Some(id)
    }

    pub fn len(&self) -> usize {
        self.id_to_handle.len()
    }

    pub fn is_empty(&self) -> bool {
        self.id_to_handle.is_empty()
    }
}
