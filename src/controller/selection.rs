use std::collections::HashMap;

use crate::{
    host::{HostHandle, HostTransform},
    types::SessionId,
};

/// A copy of one locally selected node's last known state. The copies let
/// the controller tell remote-applied edits on selected nodes apart from
/// the user's own drags, which is what keeps selection traffic out of echo
/// loops.
#[derive(Clone, Debug)]
pub struct SelectedNode {
    pub handle: HostHandle,
    pub path: String,
    pub name: String,
    pub transform: HostTransform,
}

/// Selection bookkeeping for both directions: our own selected nodes, the
/// highlight sets of remote sessions, and remote selection paths that did
/// not resolve yet and wait for that session's next added subtree.
#[derive(Clone, Debug, Default)]
pub struct SelectionTracker {
    local: Vec<SelectedNode>,
    remote: HashMap<SessionId, Vec<HostHandle>>,
    pending: HashMap<SessionId, Vec<String>>,
}

impl SelectionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_local(&mut self, nodes: Vec<SelectedNode>) {
        self.local = nodes;
    }

    pub fn local(&self) -> &[SelectedNode] {
        &self.local
    }

    /// Refresh the stored copy for a selected node after a remote edit was
    /// applied to it. No-op when the node is not selected.
    pub fn update_local_copy(
        &mut self,
        handle: &HostHandle,
        name: Option<&str>,
        transform: Option<HostTransform>,
    ) {
        let Some(node) = self.local.iter_mut().find(|n| n.handle == *handle) else {
            return;
        };
        if let Some(name) = name {
            node.name = name.to_string();
        }
        if let Some(transform) = transform {
            node.transform = transform;
        }
    }

    /// Forget local selections of nodes that were destroyed (e.g. a rolled
    /// back subtree).
    pub fn drop_local_handles(&mut self, handles: &[HostHandle]) {
        self.local.retain(|node| !handles.contains(&node.handle));
    }

    pub fn set_remote(&mut self, sid: &str, handles: Vec<HostHandle>) {
        if handles.is_empty() {
            self.remote.remove(sid);
        } else {
            self.remote.insert(sid.to_string(), handles);
        }
    }

    pub fn remote(&self) -> &HashMap<SessionId, Vec<HostHandle>> {
        &self.remote
    }

    pub fn clear_session(&mut self, sid: &str) {
        self.remote.remove(sid);
        self.pending.remove(sid);
    }

    /// Remove a destroyed host handle from every tracked set.
    pub fn purge_handle(&mut self, handle: &HostHandle) {
        self.local.retain(|node| node.handle != *handle);
        for handles in self.remote.values_mut() {
            handles.retain(|h| h != handle);
        }
        self.remote.retain(|_, handles| !handles.is_empty());
    }

    pub fn queue_pending(&mut self, sid: &str, paths: Vec<String>) {
        if paths.is_empty() {
            self.pending.remove(sid);
        } else {
            self.pending.insert(sid.to_string(), paths);
        }
    }

    pub fn take_pending(&mut self, sid: &str) -> Vec<String> {
        self.pending.remove(sid).unwrap_or_default()
    }
}
