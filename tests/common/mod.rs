#![allow(dead_code)]

use std::collections::HashMap;

use scenelink::{
    DictionaryItem, Envelope, Frame, FrameCommand, HostHandle, HostSceneError, HostSceneMut,
    HostSceneRef, HostTransform, IdentifyError, IdentifyRequest, MessageBody, OriginHint,
    Resolver, Transport, TransportError, Vec3,
};

// ---------- host scene ----------

#[derive(Clone, Debug)]
struct MockNode {
    name: String,
    parent: Option<HostHandle>,
    children: Vec<HostHandle>,
    transform: HostTransform,
    active: bool,
    in_asset: bool,
    asset_root: Option<(String, String)>,
    material_sources: Vec<(String, String)>,
    material_keys: Option<Vec<u64>>,
}

impl MockNode {
    fn plain(name: &str, parent: Option<HostHandle>) -> Self {
        Self {
            name: name.to_string(),
            parent,
            children: Vec::new(),
            transform: HostTransform::default(),
            active: true,
            in_asset: false,
            asset_root: None,
            material_sources: Vec::new(),
            material_keys: None,
        }
    }
}

/// An in-memory scene graph standing in for the embedding editor.
pub struct MockHost {
    nodes: HashMap<u64, MockNode>,
    next_handle: u64,
    next_material_key: u64,
    root: HostHandle,
}

impl MockHost {
    pub fn new() -> Self {
        let mut nodes = HashMap::new();
        nodes.insert(0, MockNode::plain("Root", None));
        Self {
            nodes,
            next_handle: 1,
            next_material_key: 1,
            root: HostHandle::from_u64(0),
        }
    }

    pub fn root(&self) -> HostHandle {
        self.root
    }

    fn alloc(&mut self, node: MockNode) -> HostHandle {
        let handle = HostHandle::from_u64(self.next_handle);
        self.next_handle += 1;
        if let Some(parent) = node.parent {
            self.nodes
                .get_mut(&parent.to_u64())
                .expect("parent must exist")
                .children
                .push(handle);
        }
        self.nodes.insert(handle.to_u64(), node);
        handle
    }

    /// Create a plain node, simulating a user edit.
    pub fn spawn(&mut self, parent: HostHandle, name: &str) -> HostHandle {
        let in_asset = self.node(&parent).in_asset;
        let mut node = MockNode::plain(name, Some(parent));
        node.in_asset = in_asset;
        self.alloc(node)
    }

    /// Create a library-asset instance with renderable template parts,
    /// simulating a drag from the asset browser.
    pub fn spawn_asset(
        &mut self,
        parent: HostHandle,
        path: &str,
        name: &str,
        parts: &[&str],
    ) -> HostHandle {
        let mut node = MockNode::plain(name, Some(parent));
        node.in_asset = true;
        node.asset_root = Some((path.to_string(), name.to_string()));
        let root = self.alloc(node);
        for part in parts {
            let mut child = MockNode::plain(part, Some(root));
            child.in_asset = true;
            child.material_sources = vec![("Assets/Materials/Default.mat".to_string(),
                "Default".to_string())];
            child.material_keys = Some(vec![0]);
            self.alloc(child);
        }
        root
    }

    /// Swap the material in a slot, simulating a user edit. Changes the
    /// slot's identity key so the diff engine can see it.
    pub fn swap_material(&mut self, handle: HostHandle, slot: usize, path: &str, name: &str) {
        let key = self.next_material_key;
        self.next_material_key += 1;
        let node = self.node_mut(&handle);
        if node.material_sources.len() <= slot {
            node.material_sources
                .resize(slot + 1, (String::new(), String::new()));
        }
        node.material_sources[slot] = (path.to_string(), name.to_string());
        let keys = node.material_keys.get_or_insert_with(Vec::new);
        if keys.len() <= slot {
            keys.resize(slot + 1, 0);
        }
        keys[slot] = key;
    }

    pub fn rename(&mut self, handle: HostHandle, name: &str) {
        self.node_mut(&handle).name = name.to_string();
    }

    pub fn move_to(&mut self, handle: HostHandle, position: Vec3) {
        self.node_mut(&handle).transform.position = position;
    }

    pub fn remove(&mut self, handle: HostHandle) {
        self.destroy_node(&handle);
    }

    pub fn find_by_name(&self, name: &str) -> Option<HostHandle> {
        self.nodes
            .iter()
            .find(|(_, node)| node.name == name)
            .map(|(handle, _)| HostHandle::from_u64(*handle))
    }

    fn node(&self, handle: &HostHandle) -> &MockNode {
        self.nodes
            .get(&handle.to_u64())
            .expect("host handle must be live")
    }

    fn node_mut(&mut self, handle: &HostHandle) -> &mut MockNode {
        self.nodes
            .get_mut(&handle.to_u64())
            .expect("host handle must be live")
    }
}

impl HostSceneRef for MockHost {
    fn contains(&self, handle: &HostHandle) -> bool {
        self.nodes.contains_key(&handle.to_u64())
    }

    fn name(&self, handle: &HostHandle) -> String {
        self.node(handle).name.clone()
    }

    fn parent(&self, handle: &HostHandle) -> Option<HostHandle> {
        self.node(handle).parent
    }

    fn children(&self, handle: &HostHandle) -> Vec<HostHandle> {
        self.node(handle).children.clone()
    }

    fn sibling_index(&self, handle: &HostHandle) -> usize {
        let Some(parent) = self.node(handle).parent else {
            return 0;
        };
        self.node(&parent)
            .children
            .iter()
            .position(|child| child == handle)
            .expect("child must be listed under its parent")
    }

    fn transform(&self, handle: &HostHandle) -> HostTransform {
        self.node(handle).transform
    }

    fn active(&self, handle: &HostHandle) -> bool {
        self.node(handle).active
    }

    fn material_keys(&self, handle: &HostHandle) -> Option<Vec<u64>> {
        self.node(handle).material_keys.clone()
    }

    fn asset_instance_root(&self, handle: &HostHandle) -> Option<(String, String)> {
        self.node(handle).asset_root.clone()
    }

    fn in_asset_instance(&self, handle: &HostHandle) -> bool {
        self.node(handle).in_asset
    }

    fn material_source(&self, handle: &HostHandle, slot: usize) -> Option<(String, String)> {
        self.node(handle).material_sources.get(slot).cloned()
    }
}

impl HostSceneMut for MockHost {
    fn create_node(&mut self, parent: &HostHandle, name: &str) -> HostHandle {
        self.spawn(*parent, name)
    }

    fn instantiate_asset(
        &mut self,
        parent: &HostHandle,
        item: &DictionaryItem,
        name: &str,
        _kind: Option<&str>,
    ) -> Result<HostHandle, HostSceneError> {
        let mut node = MockNode::plain(name, Some(*parent));
        node.in_asset = true;
        node.asset_root = Some((item.path.clone(), item.name.clone()));
        Ok(self.alloc(node))
    }

    fn destroy_node(&mut self, handle: &HostHandle) {
        if let Some(parent) = self.node(handle).parent {
            self.node_mut(&parent).children.retain(|c| c != handle);
        }
        let mut stack = vec![*handle];
        while let Some(current) = stack.pop() {
            if let Some(node) = self.nodes.remove(&current.to_u64()) {
                stack.extend(node.children);
            }
        }
    }

    fn set_parent(&mut self, handle: &HostHandle, parent: &HostHandle, sibling_index: usize) {
        if let Some(old_parent) = self.node(handle).parent {
            self.node_mut(&old_parent).children.retain(|c| c != handle);
        }
        let siblings = &mut self.node_mut(parent).children;
        let index = sibling_index.min(siblings.len());
        siblings.insert(index, *handle);
        self.node_mut(handle).parent = Some(*parent);
    }

    fn set_sibling_index(&mut self, handle: &HostHandle, index: usize) {
        let Some(parent) = self.node(handle).parent else {
            return;
        };
        let siblings = &mut self.node_mut(&parent).children;
        siblings.retain(|c| c != handle);
        let index = index.min(siblings.len());
        siblings.insert(index, *handle);
    }

    fn set_name(&mut self, handle: &HostHandle, name: &str) {
        self.node_mut(handle).name = name.to_string();
    }

    fn set_active(&mut self, handle: &HostHandle, active: bool) {
        self.node_mut(handle).active = active;
    }

    fn set_position(&mut self, handle: &HostHandle, position: Vec3) {
        self.node_mut(handle).transform.position = position;
    }

    fn set_rotation(&mut self, handle: &HostHandle, rotation: Vec3) {
        self.node_mut(handle).transform.rotation = rotation;
    }

    fn set_scale(&mut self, handle: &HostHandle, scale: Vec3) {
        self.node_mut(handle).transform.scale = scale;
    }

    fn set_material(
        &mut self,
        handle: &HostHandle,
        slot: usize,
        item: &DictionaryItem,
        name: &str,
    ) -> Result<(), HostSceneError> {
        self.swap_material(*handle, slot, &item.path, name);
        Ok(())
    }
}

// ---------- transport ----------

/// Captures every frame the engine sends.
#[derive(Default)]
pub struct MemoryTransport {
    pub sent: Vec<String>,
    pub closed: bool,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Envelopes of all captured SEND frames, oldest first.
    pub fn envelopes(&self) -> Vec<Envelope> {
        self.sent
            .iter()
            .filter_map(|text| {
                let frame = Frame::parse(text).expect("captured frame must parse");
                (frame.command == FrameCommand::Send)
                    .then(|| serde_json::from_str(&frame.body).expect("body must parse"))
            })
            .collect()
    }

    pub fn clear(&mut self) {
        self.sent.clear();
    }
}

impl Transport for MemoryTransport {
    fn send_text(&mut self, text: &str) -> Result<(), TransportError> {
        if self.closed {
            return Err(TransportError::Closed);
        }
        self.sent.push(text.to_string());
        Ok(())
    }
}

// ---------- resolver ----------

/// Scripted identification: answers from a fixed item list, fabricates
/// entries for unknown paths, or fails wholesale when told to.
#[derive(Default)]
pub struct ScriptedResolver {
    pub known: Vec<DictionaryItem>,
    pub fail_with: Option<IdentifyError>,
    pub unavailable_origins: Vec<String>,
    pub identify_calls: usize,
}

impl ScriptedResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(error: IdentifyError) -> Self {
        Self {
            fail_with: Some(error),
            ..Self::default()
        }
    }
}

impl Resolver for ScriptedResolver {
    fn identify(
        &mut self,
        requests: &[IdentifyRequest],
    ) -> Result<Vec<DictionaryItem>, IdentifyError> {
        self.identify_calls += 1;
        if let Some(error) = &self.fail_with {
            return Err(error.clone());
        }
        Ok(requests
            .iter()
            .map(|request| {
                self.known
                    .iter()
                    .find(|item| item.path == request.path)
                    .cloned()
                    .unwrap_or_else(|| DictionaryItem {
                        id: format!("dict:{}", request.path),
                        path: request.path.clone(),
                        name: request.name.clone(),
                        origin: None,
                    })
            })
            .collect())
    }

    fn origin_available(&self, hint: &OriginHint) -> bool {
        !self.unavailable_origins.contains(&hint.key)
    }
}

// ---------- frame builders ----------

pub fn message_frame(origin: &str, sid: &str, sequence: u64, body: MessageBody) -> String {
    let envelope = Envelope {
        origin: origin.to_string(),
        sid: sid.to_string(),
        sequence,
        body,
    };
    Frame::new(FrameCommand::Message)
        .with_body(serde_json::to_string(&envelope).expect("envelope must serialize"))
        .serialize()
}

pub fn handshake_frame(sid: &str) -> String {
    message_frame(
        "server",
        sid,
        0,
        MessageBody::Handshake {
            sid: sid.to_string(),
        },
    )
}
