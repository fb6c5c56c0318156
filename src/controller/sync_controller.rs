use std::collections::HashMap;

use log::{info, warn};
use uuid::Uuid;

use crate::{
    controller::{
        error::SyncError,
        selection::{SelectedNode, SelectionTracker},
    },
    dictionary::{AssetDictionary, DictionaryItem},
    diff::{ChangeKind, DiffEngine, DiffEvent, RemovedNode},
    host::{HostHandle, HostSceneMut, HostSceneRef},
    path::NodePath,
    protocol::{Envelope, MessageBody, NodeChange, WireError, WireSession},
    resolver::{IdentifyRequest, Resolver},
    session::{Participant, SessionRoster},
    transport::Transport,
    tree::{AssetRef, MaterialOverride, NodeStatus, SceneNode, SceneTree, SerializedTree},
    types::{NodeId, ParticipantId, SessionId},
};

fn new_node_id() -> NodeId {
    Uuid::new_v4().to_string()
}

/// How a node is referred to on the wire: by its shared id, or by a path
/// below an identified ancestor when the node never got an id of its own.
#[derive(Clone, Debug)]
enum NodeAddress {
    Id(NodeId),
    Under { parent_id: NodeId, path: String },
}

impl NodeAddress {
    fn into_change(self) -> NodeChange {
        match self {
            NodeAddress::Id(id) => NodeChange {
                id: Some(id),
                ..Default::default()
            },
            NodeAddress::Under { parent_id, path } => NodeChange {
                parent_id: Some(parent_id),
                path: Some(path),
                ..Default::default()
            },
        }
    }

    fn into_parts(self) -> (Option<NodeId>, Option<NodeId>, Option<String>) {
        match self {
            NodeAddress::Id(id) => (Some(id), None, None),
            NodeAddress::Under { parent_id, path } => (None, Some(parent_id), Some(path)),
        }
    }
}

/// The reconciliation engine for one collaboration session.
///
/// The outgoing half turns diff events into model updates plus messages;
/// the incoming half turns remote messages into host and model mutation.
/// Every host-mutating incoming operation is bracketed by a diff flush
/// before and a snapshot rebuild after, so local edits in flight are
/// published first and remote edits are never re-reported as local ones.
///
/// Built when the embedder joins a session and dropped when it leaves;
/// there is no ambient registration to undo.
pub struct SyncController {
    tree: SceneTree,
    dictionary: AssetDictionary,
    roster: SessionRoster,
    session: WireSession,
    diff: DiffEngine,
    selection: SelectionTracker,
    /// Messages whose model mutation is already applied but whose send was
    /// rejected by the transport. Drained in order before new edits are
    /// published.
    outbox: Vec<MessageBody>,
}

impl SyncController {
    /// Start tracking the subtree below `root_handle` for the given
    /// collaboration. The transport is opened separately via [`Self::open`].
    pub fn new(
        collaboration_id: &str,
        participant_id: ParticipantId,
        host: &dyn HostSceneRef,
        root_handle: HostHandle,
    ) -> Self {
        let root_name = host.name(&root_handle);
        let tree = SceneTree::new(new_node_id(), &root_name, root_handle);
        let diff = DiffEngine::new(host, root_handle, tree.binding());
        Self {
            tree,
            dictionary: AssetDictionary::new(),
            roster: SessionRoster::new(),
            session: WireSession::new(collaboration_id, participant_id),
            diff,
            selection: SelectionTracker::new(),
            outbox: Vec::new(),
        }
    }

    pub fn tree(&self) -> &SceneTree {
        &self.tree
    }

    pub fn dictionary(&self) -> &AssetDictionary {
        &self.dictionary
    }

    pub fn roster(&self) -> &SessionRoster {
        &self.roster
    }

    pub fn session(&self) -> &WireSession {
        &self.session
    }

    /// Remote highlight sets by session id, for the embedder to render.
    pub fn remote_highlights(&self) -> &HashMap<SessionId, Vec<HostHandle>> {
        self.selection.remote()
    }

    /// Send the connection and topic-subscription frames. The handshake
    /// answer arrives through [`Self::handle_frame`].
    pub fn open(&mut self, transport: &mut dyn Transport) -> Result<(), SyncError> {
        for frame in self.session.open_frames() {
            transport
                .send_text(&frame.serialize())
                .map_err(WireError::from)?;
        }
        Ok(())
    }

    /// Announce ourselves to the other participants. Requires a completed
    /// handshake.
    pub fn announce(
        &mut self,
        transport: &mut dyn Transport,
        display_name: &str,
    ) -> Result<(), SyncError> {
        self.session.send(
            transport,
            MessageBody::Connect {
                display_name: display_name.to_string(),
            },
        )?;
        if let Some(sid) = self.session.sid().cloned() {
            let origin = self.session.origin().clone();
            self.roster.join(&origin, display_name, &sid);
        }
        Ok(())
    }

    /// Leave the session.
    pub fn close(&mut self, transport: &mut dyn Transport) -> Result<(), SyncError> {
        if self.session.is_ready() {
            self.session.send(transport, MessageBody::Disconnect)?;
        }
        transport
            .send_text(&self.session.close_frame().serialize())
            .map_err(WireError::from)?;
        Ok(())
    }

    /// Publish the complete current state, for bootstrapping a late joiner.
    pub fn send_full_sync(
        &mut self,
        transport: &mut dyn Transport,
    ) -> Result<(), SyncError> {
        let body = MessageBody::Sync {
            tree: self.serialize_tree(),
            dictionary: self.dictionary.clone(),
            participants: self.roster.participants().to_vec(),
        };
        self.session.send(transport, body)?;
        Ok(())
    }

    /// The slow tick: detect local edits and publish them.
    pub fn tick(
        &mut self,
        host: &mut dyn HostSceneMut,
        resolver: &mut dyn Resolver,
        transport: &mut dyn Transport,
    ) -> Result<(), SyncError> {
        self.flush_local_edits(host, resolver, transport)
    }

    /// Feed one received text frame through the session and, when it
    /// carries a remote message, apply it to the host and model.
    pub fn handle_frame(
        &mut self,
        host: &mut dyn HostSceneMut,
        resolver: &mut dyn Resolver,
        transport: &mut dyn Transport,
        text: &str,
    ) -> Result<(), SyncError> {
        let Some(envelope) = self.session.handle_frame(text)? else {
            return Ok(());
        };

        // Publish local edits in flight first, then apply the remote edit,
        // then accept the combined host state as the new baseline.
        if let Err(err) = self.flush_local_edits(host, resolver, transport) {
            warn!("publishing pending local edits failed: {err}");
        }
        let result = self.apply_remote(host, resolver, envelope);
        self.diff.rebuild(host, self.tree.binding());
        result
    }

    /// The embedder's notification that the user selected different nodes.
    pub fn selection_changed(
        &mut self,
        host: &dyn HostSceneRef,
        transport: &mut dyn Transport,
        selected: &[HostHandle],
    ) -> Result<(), SyncError> {
        let root = *self.diff.root();
        let mut nodes = Vec::new();
        for handle in selected {
            if !host.contains(handle) || !is_below(host, &root, handle) {
                continue;
            }
            nodes.push(SelectedNode {
                handle: *handle,
                path: NodePath::from_host(host, &root, handle).encode(),
                name: host.name(handle),
                transform: host.transform(handle),
            });
        }
        let paths = nodes.iter().map(|node| node.path.clone()).collect();
        self.selection.set_local(nodes);
        self.session
            .send(transport, MessageBody::SelectionChanged { paths })?;
        Ok(())
    }

    /// The embedder's notification that a node was toggled visible or
    /// hidden. Activation state is not snapshotted, so this arrives as an
    /// explicit call instead of a diff event.
    pub fn host_status_toggled(
        &mut self,
        host: &dyn HostSceneRef,
        transport: &mut dyn Transport,
        handle: &HostHandle,
        active: bool,
    ) -> Result<(), SyncError> {
        let (id, address) = self.get_or_create_outgoing(host, handle);
        let status = if active {
            NodeStatus::Active
        } else {
            NodeStatus::Inactive
        };
        self.tree.expect_mut(&id).status = Some(status);

        let mut change = address.into_change();
        change.status = Some(status);
        self.send_changes(transport, vec![change])
    }

    // ---------- outgoing half ----------

    fn flush_local_edits(
        &mut self,
        host: &mut dyn HostSceneMut,
        resolver: &mut dyn Resolver,
        transport: &mut dyn Transport,
    ) -> Result<(), SyncError> {
        // Earlier messages must reach the peers before anything newer.
        self.flush_outbox(transport)?;

        let events = self.diff.check(host, self.tree.binding());
        if events.is_empty() {
            return Ok(());
        }

        let mut first_error = None;
        for event in events {
            let result = match event {
                DiffEvent::Added { handle } => {
                    self.local_added(host, resolver, transport, handle)
                }
                DiffEvent::Changed { handle, kind } => {
                    self.local_changed(host, resolver, transport, &handle, kind)
                }
                DiffEvent::Removed(removed) => self.local_removed(transport, removed),
            };
            if let Err(err) = result {
                warn!("failed to publish a local edit: {err}");
                if first_error.is_none() {
                    first_error = Some(err);
                }
            }
        }

        // The pass may have assigned ids or rolled host state back; accept
        // the result as the new baseline.
        self.diff.rebuild(host, self.tree.binding());
        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn local_added(
        &mut self,
        host: &mut dyn HostSceneMut,
        resolver: &mut dyn Resolver,
        transport: &mut dyn Transport,
        handle: HostHandle,
    ) -> Result<(), SyncError> {
        let mut requests = Vec::new();
        collect_unresolved_assets(host, &self.dictionary, &handle, &mut requests);

        if !requests.is_empty() {
            match resolver.identify(&requests) {
                Ok(items) => self.share_dictionary_items(transport, items)?,
                Err(err) => {
                    // The subtree cannot be described to the others; undo
                    // its creation locally and report.
                    warn!("identification failed, rolling back added subtree: {err}");
                    let doomed = collect_subtree_handles(host, &handle);
                    self.selection.drop_local_handles(&doomed);
                    host.destroy_node(&handle);
                    return Err(err.into());
                }
            }
        }

        let (parent_id, parent_handle) = self.tree.closest_bound_ancestor(host, &handle);

        let mut nodes = Vec::new();
        let mut bindings = Vec::new();
        let root_id =
            serialize_new_node(host, &self.dictionary, &handle, &mut nodes, &mut bindings);

        // When intermediate levels have no identity of their own, the
        // subtree root is addressed by path below the bound ancestor.
        if host.parent(&handle) != Some(parent_handle) {
            let path = NodePath::from_host(host, &parent_handle, &handle).encode();
            if let Some(root_node) = nodes.iter_mut().find(|n| n.id == root_id) {
                root_node.path = Some(path);
            }
        }

        let subtree = SerializedTree {
            root: root_id.clone(),
            nodes,
        };
        self.tree.merge(subtree.clone());
        self.tree.add_child(&parent_id, root_id);
        for (id, bound) in bindings {
            self.tree.binding_mut().insert(id, bound);
        }

        self.publish(
            transport,
            MessageBody::NodeAdded {
                parent_id,
                tree: subtree,
            },
        )?;
        Ok(())
    }

    fn local_changed(
        &mut self,
        host: &dyn HostSceneRef,
        resolver: &mut dyn Resolver,
        transport: &mut dyn Transport,
        handle: &HostHandle,
        kind: ChangeKind,
    ) -> Result<(), SyncError> {
        match kind {
            ChangeKind::Renamed { to, .. } => {
                let (id, address) = self.get_or_create_outgoing(host, handle);
                self.tree.expect_mut(&id).name = Some(to.clone());
                let mut change = address.into_change();
                change.name = Some(to);
                self.send_changes(transport, vec![change])
            }
            ChangeKind::SiblingMoved { index } => {
                let (id, address) = self.get_or_create_outgoing(host, handle);
                self.tree.expect_mut(&id).sibling_index = Some(index);
                let mut change = address.into_change();
                change.sibling_index = Some(index);
                self.send_changes(transport, vec![change])
            }
            ChangeKind::Transformed {
                position,
                rotation,
                scale,
            } => {
                let (id, address) = self.get_or_create_outgoing(host, handle);
                let node = self.tree.expect_mut(&id);
                if let Some(position) = position {
                    node.position = Some(position);
                }
                if let Some(rotation) = rotation {
                    node.rotation = Some(rotation);
                }
                if let Some(scale) = scale {
                    node.scale = Some(scale);
                }
                let mut change = address.into_change();
                change.position = position;
                change.rotation = rotation;
                change.scale = scale;
                self.send_changes(transport, vec![change])
            }
            ChangeKind::Reparented {
                new_parent,
                sibling_index,
            } => self.local_reparented(host, transport, handle, &new_parent, sibling_index),
            ChangeKind::MaterialsChanged { slots } => {
                self.local_materials_changed(host, resolver, transport, handle, &slots)
            }
        }
    }

    fn local_reparented(
        &mut self,
        host: &dyn HostSceneRef,
        transport: &mut dyn Transport,
        handle: &HostHandle,
        new_parent: &HostHandle,
        sibling_index: usize,
    ) -> Result<(), SyncError> {
        let (id, _) = self.get_or_create_outgoing(host, handle);
        let new_parent_id = match self.tree.binding().node_id(new_parent) {
            Some(existing) => existing.clone(),
            None => self.get_or_create_outgoing(host, new_parent).0,
        };

        if let Some(old_parent) = self.tree.find_parent_of(&id).map(|p| p.id.clone()) {
            self.tree.remove_child(&old_parent, &id);
        }
        self.tree.add_child(&new_parent_id, id.clone());
        self.tree.expect_mut(&id).sibling_index = Some(sibling_index);

        self.publish(
            transport,
            MessageBody::Reparented {
                id,
                new_parent_id,
                sibling_index,
            },
        )?;
        Ok(())
    }

    fn local_materials_changed(
        &mut self,
        host: &dyn HostSceneRef,
        resolver: &mut dyn Resolver,
        transport: &mut dyn Transport,
        handle: &HostHandle,
        slots: &[usize],
    ) -> Result<(), SyncError> {
        let mut requests: Vec<IdentifyRequest> = Vec::new();
        for slot in slots {
            let Some((path, name)) = host.material_source(handle, *slot) else {
                continue;
            };
            if self.dictionary.resolve(&path, &name).is_none()
                && !requests.iter().any(|r| r.path == path && r.name == name)
            {
                requests.push(IdentifyRequest {
                    path,
                    name,
                    hint: None,
                });
            }
        }
        if !requests.is_empty() {
            // Nothing was created in the host for a material swap, so a
            // failure here needs no rollback.
            let items = resolver.identify(&requests)?;
            self.share_dictionary_items(transport, items)?;
        }

        let mut changes = Vec::new();
        for slot in slots {
            let Some((path, name)) = host.material_source(handle, *slot) else {
                continue;
            };
            let Some(item) = self.dictionary.resolve(&path, &name) else {
                warn!("material '{name}' has no dictionary entry after identification");
                continue;
            };
            changes.push(MaterialOverride {
                slot: *slot,
                dictionary_id: item.id.clone(),
                name,
            });
        }
        if changes.is_empty() {
            return Ok(());
        }

        let (id, address) = self.get_or_create_outgoing(host, handle);
        for change in &changes {
            self.tree
                .expect_mut(&id)
                .update_material(change.slot, &change.dictionary_id, &change.name);
        }
        let (id, parent_id, path) = address.into_parts();
        self.publish(
            transport,
            MessageBody::MaterialsChanged {
                id,
                parent_id,
                path,
                changes,
            },
        )?;
        Ok(())
    }

    fn local_removed(
        &mut self,
        transport: &mut dyn Transport,
        removed: RemovedNode,
    ) -> Result<(), SyncError> {
        if let Some(id) = removed.id {
            if !self.tree.contains(&id) {
                return Ok(());
            }
            let tombstone = removed.in_asset_instance || self.tree.is_asset_member(&id);
            if tombstone {
                self.tree.expect_mut(&id).status = Some(NodeStatus::Deleted);
                self.tree.binding_mut().remove_by_id(&id);
            } else {
                self.tree.remove_subtree(&id);
            }
            self.publish(
                transport,
                MessageBody::NodeRemoved {
                    id: Some(id),
                    mark: tombstone.then_some(true),
                    parent_id: None,
                    path: None,
                    name: Some(removed.name),
                },
            )?;
            return Ok(());
        }

        // Id-less nodes are template parts; their slot stays addressable as
        // a tombstone.
        let parent_id = removed
            .parent_id
            .unwrap_or_else(|| self.tree.root_id().clone());
        let path = removed.path.unwrap_or_default();
        self.record_path_tombstone(&parent_id, &path, &removed.name);
        self.publish(
            transport,
            MessageBody::NodeRemoved {
                id: None,
                mark: Some(true),
                parent_id: Some(parent_id),
                path: Some(path),
                name: Some(removed.name),
            },
        )?;
        Ok(())
    }

    fn record_path_tombstone(&mut self, parent_id: &str, path: &str, name: &str) {
        let existing = self
            .tree
            .expect(parent_id)
            .children
            .iter()
            .find(|child| {
                self.tree
                    .find(child.as_str())
                    .is_some_and(|node| node.path.as_deref() == Some(path))
            })
            .cloned();
        if let Some(child) = existing {
            let node = self.tree.expect_mut(&child);
            node.status = Some(NodeStatus::Deleted);
            self.tree.binding_mut().remove_by_id(&child);
            return;
        }

        let id = new_node_id();
        let mut node = SceneNode::new(id.clone());
        node.name = Some(name.to_string());
        node.path = Some(path.to_string());
        node.status = Some(NodeStatus::Deleted);
        self.tree.insert(node);
        self.tree.add_child(parent_id, id);
    }

    /// Model entry and wire address for a host node the diff engine pointed
    /// at. Nodes with shared ids are addressed by id; template parts get a
    /// lazily created local entry and are addressed by path below their
    /// nearest identified ancestor.
    fn get_or_create_outgoing(
        &mut self,
        host: &dyn HostSceneRef,
        handle: &HostHandle,
    ) -> (NodeId, NodeAddress) {
        if let Some(id) = self.tree.binding().node_id(handle).cloned() {
            let node = self.tree.expect(&id);
            if let Some(path) = node.path.clone() {
                let parent_id = self
                    .tree
                    .find_parent_of(&id)
                    .map(|p| p.id.clone())
                    .unwrap_or_else(|| self.tree.root_id().clone());
                return (id, NodeAddress::Under { parent_id, path });
            }
            return (id.clone(), NodeAddress::Id(id));
        }

        let (parent_id, ancestor) = self.tree.closest_bound_ancestor(host, handle);
        let path = NodePath::from_host(host, &ancestor, handle).encode();
        let id = new_node_id();
        let mut node = SceneNode::new(id.clone());
        node.name = Some(host.name(handle));
        node.path = Some(path.clone());
        self.tree.insert(node);
        self.tree.add_child(&parent_id, id.clone());
        self.tree.binding_mut().insert(id.clone(), *handle);
        (id, NodeAddress::Under { parent_id, path })
    }

    /// Send one model-backed message, keeping it queued when the transport
    /// rejects it. The tree mutation behind the message has already been
    /// applied at this point; a dropped message would desynchronize the
    /// peers permanently, so it stays in the outbox until a later flush
    /// delivers it.
    fn publish(
        &mut self,
        transport: &mut dyn Transport,
        body: MessageBody,
    ) -> Result<(), SyncError> {
        match self.session.send(transport, body.clone()) {
            Ok(()) => Ok(()),
            Err(err) => {
                self.outbox.push(body);
                Err(err.into())
            }
        }
    }

    /// Retry queued messages in order, stopping at the first one the
    /// transport still refuses.
    fn flush_outbox(&mut self, transport: &mut dyn Transport) -> Result<(), SyncError> {
        while let Some(body) = self.outbox.first().cloned() {
            self.session.send(transport, body)?;
            self.outbox.remove(0);
        }
        Ok(())
    }

    fn send_changes(
        &mut self,
        transport: &mut dyn Transport,
        changes: Vec<NodeChange>,
    ) -> Result<(), SyncError> {
        self.publish(transport, MessageBody::NodesChanged { changes })
    }

    fn share_dictionary_items(
        &mut self,
        transport: &mut dyn Transport,
        items: Vec<DictionaryItem>,
    ) -> Result<(), SyncError> {
        let mut fresh = Vec::new();
        for item in items {
            if self.dictionary.get(&item.id).is_none() {
                self.dictionary.add(item.clone());
                fresh.push(item);
            }
        }
        if !fresh.is_empty() {
            self.publish(transport, MessageBody::DictionaryItemsAdded { items: fresh })?;
        }
        Ok(())
    }

    fn serialize_tree(&self) -> SerializedTree {
        SerializedTree {
            root: self.tree.root_id().clone(),
            nodes: self.tree.iter().cloned().collect(),
        }
    }

    // ---------- incoming half ----------

    fn apply_remote(
        &mut self,
        host: &mut dyn HostSceneMut,
        resolver: &mut dyn Resolver,
        envelope: Envelope,
    ) -> Result<(), SyncError> {
        let sid = envelope.sid;
        match envelope.body {
            // Consumed by the wire session before dispatch.
            MessageBody::Handshake { .. } => Ok(()),

            MessageBody::Connect { display_name } => {
                info!("participant '{display_name}' joined (sid={sid})");
                self.roster.join(&envelope.origin, &display_name, &sid);
                Ok(())
            }

            MessageBody::Disconnect => {
                if let Some(participant) = self.roster.leave(&sid) {
                    info!("participant '{participant}' left (sid={sid})");
                }
                self.selection.clear_session(&sid);
                Ok(())
            }

            MessageBody::Sync {
                tree,
                dictionary,
                participants,
            } => self.apply_sync(host, tree, dictionary, participants),

            MessageBody::NodeAdded { parent_id, tree } => {
                self.apply_node_added(host, &sid, parent_id, tree)
            }

            MessageBody::NodeRemoved {
                id,
                mark,
                parent_id,
                path,
                name,
            } => self.apply_node_removed(host, id, mark, parent_id, path, name),

            MessageBody::NodesChanged { changes } => {
                for change in changes {
                    self.apply_node_change(host, change);
                }
                Ok(())
            }

            MessageBody::Reparented {
                id,
                new_parent_id,
                sibling_index,
            } => self.apply_reparented(host, id, new_parent_id, sibling_index),

            MessageBody::MaterialsChanged {
                id,
                parent_id,
                path,
                changes,
            } => self.apply_materials_changed(host, id, parent_id, path, changes),

            MessageBody::SelectionChanged { paths } => {
                self.apply_selection_paths(host, &sid, paths, false);
                Ok(())
            }

            MessageBody::DictionaryItemsAdded { items } => {
                self.apply_dictionary_items(resolver, items)
            }
        }
    }

    fn apply_sync(
        &mut self,
        host: &mut dyn HostSceneMut,
        tree: SerializedTree,
        dictionary: AssetDictionary,
        participants: Vec<Participant>,
    ) -> Result<(), SyncError> {
        info!(
            "applying full sync: {} node(s), {} dictionary item(s)",
            tree.nodes.len(),
            dictionary.len()
        );
        let root_handle = *self.diff.root();
        for child in host.children(&root_handle) {
            // Purges bindings and any tracked selections of the old nodes;
            // handles must not outlive the nodes they named.
            self.destroy_host_subtree(host, &child);
        }

        self.dictionary = dictionary;
        self.roster.replace_all(participants);
        self.tree = SceneTree::from_serialized(tree, root_handle);

        let children = self.tree.expect(self.tree.root_id()).children.clone();
        for child in children {
            self.materialize_node(host, &root_handle, &child)?;
        }
        Ok(())
    }

    fn apply_node_added(
        &mut self,
        host: &mut dyn HostSceneMut,
        sid: &str,
        parent_id: NodeId,
        tree: SerializedTree,
    ) -> Result<(), SyncError> {
        let Some(parent_handle) = self.tree.binding().handle(&parent_id).copied() else {
            warn!("dropping added subtree under unknown parent {parent_id}");
            return Ok(());
        };
        let root = tree.root.clone();
        self.tree.merge(tree);
        self.tree.add_child(&parent_id, root.clone());
        self.materialize_node(host, &parent_handle, &root)?;

        // The new subtree may satisfy selection paths we could not resolve
        // earlier for this session.
        let pending = self.selection.take_pending(sid);
        if !pending.is_empty() {
            self.apply_selection_paths(host, sid, pending, true);
        }
        Ok(())
    }

    fn apply_node_removed(
        &mut self,
        host: &mut dyn HostSceneMut,
        id: Option<NodeId>,
        mark: Option<bool>,
        parent_id: Option<NodeId>,
        path: Option<String>,
        name: Option<String>,
    ) -> Result<(), SyncError> {
        let tombstone = mark == Some(true);

        if let Some(id) = id {
            let Some(handle) = self.tree.binding().handle(&id).copied() else {
                warn!("dropping removal of unknown node {id}");
                return Ok(());
            };
            self.destroy_host_subtree(host, &handle);
            if tombstone {
                self.tree.expect_mut(&id).status = Some(NodeStatus::Deleted);
            } else {
                self.tree.remove_subtree(&id);
            }
            return Ok(());
        }

        let parent_id = parent_id.unwrap_or_else(|| self.tree.root_id().clone());
        let Some(parent_handle) = self.tree.binding().handle(&parent_id).copied() else {
            warn!("dropping removal below unknown parent {parent_id}");
            return Ok(());
        };
        let path = path.unwrap_or_default();
        // Record the slot before resolving; it must stay addressable even
        // when the path no longer matches anything in the host.
        self.record_path_tombstone(&parent_id, &path, name.as_deref().unwrap_or(""));
        let Some(handle) = resolve_path(host, &parent_handle, &path) else {
            return Ok(());
        };
        self.destroy_host_subtree(host, &handle);
        Ok(())
    }

    fn apply_node_change(&mut self, host: &mut dyn HostSceneMut, change: NodeChange) {
        let Some((handle, id)) =
            self.resolve_incoming_target(host, change.id, change.parent_id, change.path)
        else {
            return;
        };

        if let Some(name) = change.name {
            host.set_name(&handle, &name);
            self.selection.update_local_copy(&handle, Some(&name), None);
            self.tree.expect_mut(&id).name = Some(name);
        }
        if let Some(index) = change.sibling_index {
            host.set_sibling_index(&handle, index);
            self.tree.expect_mut(&id).sibling_index = Some(index);
        }

        let mut moved = false;
        if let Some(position) = change.position {
            host.set_position(&handle, position);
            self.tree.expect_mut(&id).position = Some(position);
            moved = true;
        }
        if let Some(rotation) = change.rotation {
            host.set_rotation(&handle, rotation);
            self.tree.expect_mut(&id).rotation = Some(rotation);
            moved = true;
        }
        if let Some(scale) = change.scale {
            host.set_scale(&handle, scale);
            self.tree.expect_mut(&id).scale = Some(scale);
            moved = true;
        }
        if moved {
            // Refresh the selection copy so the next local selection flush
            // does not mistake this remote move for a user drag.
            let transform = host.transform(&handle);
            self.selection.update_local_copy(&handle, None, Some(transform));
        }

        if let Some(status) = change.status {
            match status {
                NodeStatus::Active => host.set_active(&handle, true),
                NodeStatus::Inactive => host.set_active(&handle, false),
                NodeStatus::Deleted => self.destroy_host_subtree(host, &handle),
                NodeStatus::Unset => {}
            }
            self.tree.expect_mut(&id).status = Some(status);
        }
    }

    fn apply_reparented(
        &mut self,
        host: &mut dyn HostSceneMut,
        id: NodeId,
        new_parent_id: NodeId,
        sibling_index: usize,
    ) -> Result<(), SyncError> {
        let Some(handle) = self.tree.binding().handle(&id).copied() else {
            warn!("dropping reparent of unknown node {id}");
            return Ok(());
        };
        let Some(new_parent_handle) = self.tree.binding().handle(&new_parent_id).copied() else {
            warn!("dropping reparent to unknown parent {new_parent_id}");
            return Ok(());
        };

        host.set_parent(&handle, &new_parent_handle, sibling_index);

        // Both children lists change together or not at all; the checks
        // above guarantee the model mutation cannot fail halfway.
        if let Some(old_parent) = self.tree.find_parent_of(&id).map(|p| p.id.clone()) {
            self.tree.remove_child(&old_parent, &id);
        }
        self.tree.add_child(&new_parent_id, id.clone());
        self.tree.expect_mut(&id).sibling_index = Some(sibling_index);
        Ok(())
    }

    fn apply_materials_changed(
        &mut self,
        host: &mut dyn HostSceneMut,
        id: Option<NodeId>,
        parent_id: Option<NodeId>,
        path: Option<String>,
        changes: Vec<MaterialOverride>,
    ) -> Result<(), SyncError> {
        let Some((handle, node_id)) = self.resolve_incoming_target(host, id, parent_id, path)
        else {
            return Ok(());
        };
        for change in changes {
            let Some(item) = self.dictionary.get(&change.dictionary_id).cloned() else {
                warn!(
                    "no dictionary entry {} for material '{}'",
                    change.dictionary_id, change.name
                );
                continue;
            };
            host.set_material(&handle, change.slot, &item, &change.name)?;
            self.tree
                .expect_mut(&node_id)
                .update_material(change.slot, &change.dictionary_id, &change.name);
        }
        Ok(())
    }

    fn apply_dictionary_items(
        &mut self,
        resolver: &mut dyn Resolver,
        items: Vec<DictionaryItem>,
    ) -> Result<(), SyncError> {
        // All or nothing: accepting a partial batch would leave later node
        // messages referencing entries we dropped.
        for item in &items {
            if let Some(hint) = &item.origin {
                if !resolver.origin_available(hint) {
                    return Err(SyncError::MissingOriginPack {
                        key: hint.key.clone(),
                    });
                }
            }
        }
        for item in items {
            if self.dictionary.get(&item.id).is_none() {
                self.dictionary.add(item);
            }
        }
        Ok(())
    }

    fn apply_selection_paths(
        &mut self,
        host: &dyn HostSceneRef,
        sid: &str,
        paths: Vec<String>,
        append: bool,
    ) {
        let root = *self.diff.root();
        let mut resolved = if append {
            self.selection.remote().get(sid).cloned().unwrap_or_default()
        } else {
            Vec::new()
        };
        let mut unresolved = Vec::new();
        for path in paths {
            match resolve_path(host, &root, &path) {
                Some(handle) => resolved.push(handle),
                None => unresolved.push(path),
            }
        }
        self.selection.set_remote(sid, resolved);
        self.selection.queue_pending(sid, unresolved);
    }

    /// Find or lazily create the model entry for an incoming per-node
    /// reference. Returns `None` (after logging) when the reference is
    /// stale or its parent unknown; the caller drops that one operation.
    fn resolve_incoming_target(
        &mut self,
        host: &dyn HostSceneRef,
        id: Option<NodeId>,
        parent_id: Option<NodeId>,
        path: Option<String>,
    ) -> Option<(HostHandle, NodeId)> {
        if let Some(id) = id {
            let Some(handle) = self.tree.binding().handle(&id).copied() else {
                warn!("dropping change for unknown node {id}");
                return None;
            };
            return Some((handle, id));
        }

        let parent_id = parent_id.unwrap_or_else(|| self.tree.root_id().clone());
        let Some(parent_handle) = self.tree.binding().handle(&parent_id).copied() else {
            warn!("dropping change below unknown parent {parent_id}");
            return None;
        };
        let path = path.unwrap_or_default();
        let handle = resolve_path(host, &parent_handle, &path)?;

        if let Some(existing) = self.tree.binding().node_id(&handle).cloned() {
            return Some((handle, existing));
        }
        let id = new_node_id();
        let mut node = SceneNode::new(id.clone());
        node.name = Some(host.name(&handle));
        node.path = Some(path);
        self.tree.insert(node);
        self.tree.add_child(&parent_id, id.clone());
        self.tree.binding_mut().insert(id.clone(), handle);
        Some((handle, id))
    }

    /// Materialize a model subtree in the host, binding handles as it goes.
    /// Path-carrying nodes adjust an existing host node instead of creating
    /// one; tombstones create nothing.
    fn materialize_node(
        &mut self,
        host: &mut dyn HostSceneMut,
        parent_handle: &HostHandle,
        id: &str,
    ) -> Result<(), SyncError> {
        let node = self.tree.expect(id).clone();

        if let Some(path) = &node.path {
            let Some(handle) = resolve_path(host, parent_handle, path) else {
                return Ok(());
            };
            if node.is_tombstone() {
                self.destroy_host_subtree(host, &handle);
                return Ok(());
            }
            if !self.tree.binding().contains_id(&node.id)
                && !self.tree.binding().contains_handle(&handle)
            {
                self.tree.binding_mut().insert(node.id.clone(), handle);
            }
            self.apply_node_attributes(host, &handle, &node)?;
            for child in &node.children {
                self.materialize_node(host, &handle, child)?;
            }
            return Ok(());
        }

        if node.is_tombstone() {
            return Ok(());
        }

        let handle = if let Some(asset) = &node.asset {
            let Some(item) = self.dictionary.get(&asset.dictionary_id).cloned() else {
                warn!(
                    "no dictionary entry {} for asset '{}', skipping subtree",
                    asset.dictionary_id, asset.name
                );
                return Ok(());
            };
            host.instantiate_asset(
                parent_handle,
                &item,
                node.name.as_deref().unwrap_or(&item.name),
                asset.kind.as_deref(),
            )?
        } else {
            host.create_node(parent_handle, node.name.as_deref().unwrap_or(""))
        };

        self.tree.binding_mut().insert(node.id.clone(), handle);
        self.apply_node_attributes(host, &handle, &node)?;
        for child in &node.children {
            self.materialize_node(host, &handle, child)?;
        }
        Ok(())
    }

    fn apply_node_attributes(
        &mut self,
        host: &mut dyn HostSceneMut,
        handle: &HostHandle,
        node: &SceneNode,
    ) -> Result<(), SyncError> {
        if let Some(name) = &node.name {
            host.set_name(handle, name);
        }
        if let Some(position) = node.position {
            host.set_position(handle, position);
        }
        if let Some(rotation) = node.rotation {
            host.set_rotation(handle, rotation);
        }
        if let Some(scale) = node.scale {
            host.set_scale(handle, scale);
        }
        if node.status == Some(NodeStatus::Inactive) {
            host.set_active(handle, false);
        }
        for material in &node.materials {
            let Some(item) = self.dictionary.get(&material.dictionary_id).cloned() else {
                warn!(
                    "no dictionary entry {} for material '{}'",
                    material.dictionary_id, material.name
                );
                continue;
            };
            host.set_material(handle, material.slot, &item, &material.name)?;
        }
        Ok(())
    }

    /// Destroy a host subtree and purge every reference to its handles.
    fn destroy_host_subtree(&mut self, host: &mut dyn HostSceneMut, handle: &HostHandle) {
        let doomed = collect_subtree_handles(host, handle);
        for dead in &doomed {
            self.selection.purge_handle(dead);
            self.tree.binding_mut().remove_by_handle(dead);
        }
        host.destroy_node(handle);
    }
}

fn is_below(host: &dyn HostSceneRef, root: &HostHandle, handle: &HostHandle) -> bool {
    let mut current = *handle;
    while let Some(parent) = host.parent(&current) {
        if parent == *root {
            return true;
        }
        current = parent;
    }
    false
}

fn resolve_path(host: &dyn HostSceneRef, ancestor: &HostHandle, path: &str) -> Option<HostHandle> {
    let parsed = match NodePath::parse(path) {
        Ok(parsed) => parsed,
        Err(err) => {
            warn!("dropping operation with malformed path '{path}': {err}");
            return None;
        }
    };
    match parsed.resolve(host, ancestor) {
        Ok(handle) => Some(handle),
        Err(err) => {
            warn!("dropping operation with stale path '{path}': {err}");
            None
        }
    }
}

/// Gather identification requests for every library-asset instance in the
/// subtree that has no dictionary entry yet. Recursion stops at an asset
/// root; its template parts carry no assets of their own.
fn collect_unresolved_assets(
    host: &dyn HostSceneRef,
    dictionary: &AssetDictionary,
    handle: &HostHandle,
    requests: &mut Vec<IdentifyRequest>,
) {
    if let Some((path, name)) = host.asset_instance_root(handle) {
        if dictionary.resolve(&path, &name).is_none()
            && !requests.iter().any(|r| r.path == path && r.name == name)
        {
            requests.push(IdentifyRequest {
                path,
                name,
                hint: None,
            });
        }
        return;
    }
    for child in host.children(handle) {
        collect_unresolved_assets(host, dictionary, &child, requests);
    }
}

fn collect_subtree_handles(host: &dyn HostSceneRef, root: &HostHandle) -> Vec<HostHandle> {
    let mut handles = vec![*root];
    let mut index = 0;
    while index < handles.len() {
        let current = handles[index];
        handles.extend(host.children(&current));
        index += 1;
    }
    handles
}

/// Serialize a freshly created host subtree into wire nodes, assigning ids
/// and recording the bindings to make. Children of a library-asset instance
/// root are implied by its template and not serialized.
fn serialize_new_node(
    host: &dyn HostSceneRef,
    dictionary: &AssetDictionary,
    handle: &HostHandle,
    nodes: &mut Vec<SceneNode>,
    bindings: &mut Vec<(NodeId, HostHandle)>,
) -> NodeId {
    let id = new_node_id();
    let transform = host.transform(handle);
    let mut node = SceneNode::new(id.clone());
    node.name = Some(host.name(handle));
    node.status = Some(if host.active(handle) {
        NodeStatus::Active
    } else {
        NodeStatus::Inactive
    });
    node.position = Some(transform.position);
    node.rotation = Some(transform.rotation);
    node.scale = Some(transform.scale);

    if let Some((path, name)) = host.asset_instance_root(handle) {
        if let Some(item) = dictionary.resolve(&path, &name) {
            node.asset = Some(AssetRef {
                dictionary_id: item.id.clone(),
                name,
                kind: None,
            });
        } else {
            warn!("asset '{name}' has no dictionary entry after identification");
        }
    } else {
        for child in host.children(handle) {
            let child_id = serialize_new_node(host, dictionary, &child, nodes, bindings);
            node.children.push(child_id);
        }
    }

    nodes.push(node);
    bindings.push((id.clone(), *handle));
    id
}
