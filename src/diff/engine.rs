use log::trace;

use crate::{
    diff::snapshot::{Snapshot, SnapshotItem},
    host::{HostHandle, HostSceneRef},
    path::{NodePath, PathStep},
    tree::HostBinding,
    types::{NodeId, Vec3},
};

/// A single attribute-level difference detected on a surviving node. One
/// node may produce several of these per check.
#[derive(Clone, Debug, PartialEq)]
pub enum ChangeKind {
    Renamed {
        from: String,
        to: String,
    },
    /// The node moved under a different parent. Carries the landing sibling
    /// index; a reparent subsumes a sibling move.
    Reparented {
        new_parent: HostHandle,
        sibling_index: usize,
    },
    /// Same parent, different position among its siblings.
    SiblingMoved {
        index: usize,
    },
    /// One field per changed transform component; untouched components stay
    /// `None` so receivers only apply what actually moved.
    Transformed {
        position: Option<Vec3>,
        rotation: Option<Vec3>,
        scale: Option<Vec3>,
    },
    /// Renderer slots whose material identity key changed since the last
    /// snapshot.
    MaterialsChanged {
        slots: Vec<usize>,
    },
}

/// Addressing and classification for a node that vanished from the host
/// subtree. The handle is dead; everything here was copied out of the old
/// snapshot.
#[derive(Clone, Debug, PartialEq)]
pub struct RemovedNode {
    /// Model id, when the node had one at capture time.
    pub id: Option<NodeId>,
    /// For id-less nodes: the nearest snapshotted ancestor that had an id.
    /// `None` means the path is relative to the monitored root.
    pub parent_id: Option<NodeId>,
    /// For id-less nodes: encoded path below `parent_id`.
    pub path: Option<String>,
    pub name: String,
    /// Whether the node belonged to a library-asset instance; such removals
    /// become tombstones instead of model deletions.
    pub in_asset_instance: bool,
}

/// One observed local edit, produced by [`DiffEngine::check`].
#[derive(Clone, Debug, PartialEq)]
pub enum DiffEvent {
    /// A subtree root that appeared since the last snapshot. Descendants
    /// that appeared with it are implied, not reported separately.
    Added { handle: HostHandle },
    Changed { handle: HostHandle, kind: ChangeKind },
    /// The highest removed ancestor of a vanished subtree.
    Removed(RemovedNode),
}

/// Detects local edits by comparing the live host subtree against the last
/// accepted snapshot.
///
/// `check` is a full traversal of the monitored subtree; the cost is linear
/// in its size and is paid on every slow tick. The snapshot is only swapped
/// after the events of a pass have been handed to the caller, so an
/// interrupted pass re-reports the same edits instead of losing them.
#[derive(Clone, Debug)]
pub struct DiffEngine {
    root: HostHandle,
    snapshot: Snapshot,
}

impl DiffEngine {
    pub fn new(host: &dyn HostSceneRef, root: HostHandle, binding: &HostBinding) -> Self {
        Self {
            root,
            snapshot: Snapshot::capture(host, &root, binding),
        }
    }

    pub fn root(&self) -> &HostHandle {
        &self.root
    }

    /// Compare the live subtree against the stored snapshot and return the
    /// edits made since then. Running it twice without intervening edits
    /// returns an empty list the second time.
    pub fn check(&mut self, host: &dyn HostSceneRef, binding: &HostBinding) -> Vec<DiffEvent> {
        let next = Snapshot::capture(host, &self.root, binding);
        let mut events = Vec::new();

        // Walk the live tree in host order so added/changed events come out
        // parent-before-child.
        let mut stack = host.children(&self.root);
        stack.reverse();
        while let Some(handle) = stack.pop() {
            let mut children = host.children(&handle);
            children.reverse();
            stack.extend(children);

            // Capture and the walk read the same host state within a tick,
            // so every walked handle is in the fresh snapshot.
            let Some(current) = next.get(&handle) else {
                continue;
            };

            match self.snapshot.get(&handle) {
                None => {
                    let parent_is_new =
                        current.parent != self.root && !self.snapshot.contains(&current.parent);
                    if !parent_is_new {
                        events.push(DiffEvent::Added { handle });
                    }
                }
                Some(previous) => {
                    self.compare(previous, current, &mut events);
                }
            }
        }

        for item in self.snapshot.iter() {
            if next.contains(&item.handle) {
                continue;
            }
            // Only the highest removed ancestor is reported; a removed node
            // under a removed parent is implied.
            let parent_removed =
                item.parent != self.root && !next.contains(&item.parent);
            if parent_removed {
                continue;
            }
            events.push(DiffEvent::Removed(self.removal_address(item)));
        }

        if !events.is_empty() {
            trace!("hierarchy check found {} change(s)", events.len());
        }
        self.snapshot = next;
        events
    }

    /// Replace the snapshot with the current host state without reporting
    /// anything. Called after the engine itself mutated the host on behalf
    /// of a remote edit, so the next check does not re-report it as local.
    pub fn rebuild(&mut self, host: &dyn HostSceneRef, binding: &HostBinding) {
        self.snapshot = Snapshot::capture(host, &self.root, binding);
    }

    fn compare(&self, previous: &SnapshotItem, current: &SnapshotItem, events: &mut Vec<DiffEvent>) {
        let handle = current.handle;

        if previous.name != current.name {
            events.push(DiffEvent::Changed {
                handle,
                kind: ChangeKind::Renamed {
                    from: previous.name.clone(),
                    to: current.name.clone(),
                },
            });
        }

        if previous.parent != current.parent {
            events.push(DiffEvent::Changed {
                handle,
                kind: ChangeKind::Reparented {
                    new_parent: current.parent,
                    sibling_index: current.sibling_index,
                },
            });
        } else if previous.sibling_index != current.sibling_index {
            events.push(DiffEvent::Changed {
                handle,
                kind: ChangeKind::SiblingMoved {
                    index: current.sibling_index,
                },
            });
        }

        let position = (previous.transform.position != current.transform.position)
            .then_some(current.transform.position);
        let rotation = (previous.transform.rotation != current.transform.rotation)
            .then_some(current.transform.rotation);
        let scale = (previous.transform.scale != current.transform.scale)
            .then_some(current.transform.scale);
        if position.is_some() || rotation.is_some() || scale.is_some() {
            events.push(DiffEvent::Changed {
                handle,
                kind: ChangeKind::Transformed {
                    position,
                    rotation,
                    scale,
                },
            });
        }

        let slots = changed_material_slots(&previous.material_keys, &current.material_keys);
        if !slots.is_empty() {
            events.push(DiffEvent::Changed {
                handle,
                kind: ChangeKind::MaterialsChanged { slots },
            });
        }
    }

    fn removal_address(&self, item: &SnapshotItem) -> RemovedNode {
        if let Some(id) = &item.id {
            return RemovedNode {
                id: Some(id.clone()),
                parent_id: None,
                path: None,
                name: item.name.clone(),
                in_asset_instance: item.in_asset_instance,
            };
        }

        let mut steps = vec![PathStep {
            name: item.name.clone(),
            index: item.sibling_index,
        }];
        let mut parent_id = None;
        let mut cursor = item.parent;
        while cursor != self.root {
            let Some(ancestor) = self.snapshot.get(&cursor) else {
                break;
            };
            if let Some(id) = &ancestor.id {
                parent_id = Some(id.clone());
                break;
            }
            steps.push(PathStep {
                name: ancestor.name.clone(),
                index: ancestor.sibling_index,
            });
            cursor = ancestor.parent;
        }
        steps.reverse();

        RemovedNode {
            id: None,
            parent_id,
            path: Some(NodePath::new(steps).encode()),
            name: item.name.clone(),
            in_asset_instance: item.in_asset_instance,
        }
    }
}

fn changed_material_slots(
    previous: &Option<Vec<u64>>,
    current: &Option<Vec<u64>>,
) -> Vec<usize> {
    let (Some(previous), Some(current)) = (previous, current) else {
        return Vec::new();
    };
    let mut slots = Vec::new();
    for slot in 0..current.len() {
        if previous.get(slot) != current.get(slot) {
            slots.push(slot);
        }
    }
    slots
}
