mod common;

use common::MockHost;
use scenelink::{ChangeKind, DiffEngine, DiffEvent, HostBinding, HostSceneMut, Vec3};

fn bound(host: &MockHost, pairs: &[(&str, scenelink::HostHandle)]) -> HostBinding {
    let mut binding = HostBinding::new();
    binding.insert("root".to_string(), host.root());
    for (id, handle) in pairs {
        binding.insert(id.to_string(), *handle);
    }
    binding
}

#[test]
fn unchanged_subtree_reports_nothing_twice() {
    let mut host = MockHost::new();
    let tower = host.spawn(host.root(), "Tower");
    let binding = bound(&host, &[("t", tower)]);

    let mut engine = DiffEngine::new(&host, host.root(), &binding);
    assert!(engine.check(&host, &binding).is_empty());

    host.rename(tower, "Watchtower");
    assert_eq!(engine.check(&host, &binding).len(), 1);
    // Swapping the snapshot makes a re-run idempotent.
    assert!(engine.check(&host, &binding).is_empty());
}

#[test]
fn added_subtree_reports_only_its_root() {
    let mut host = MockHost::new();
    let binding = bound(&host, &[]);
    let mut engine = DiffEngine::new(&host, host.root(), &binding);

    let cart = host.spawn(host.root(), "Cart");
    host.spawn(cart, "Wheel");
    host.spawn(cart, "Axle");

    let events = engine.check(&host, &binding);
    assert_eq!(events, vec![DiffEvent::Added { handle: cart }]);
}

#[test]
fn removal_reports_highest_removed_ancestor_by_id() {
    let mut host = MockHost::new();
    let cart = host.spawn(host.root(), "Cart");
    let wheel = host.spawn(cart, "Wheel");
    let binding = bound(&host, &[("cart", cart), ("wheel", wheel)]);

    let mut engine = DiffEngine::new(&host, host.root(), &binding);
    host.remove(cart);

    let events = engine.check(&host, &binding);
    assert_eq!(events.len(), 1);
    let DiffEvent::Removed(removed) = &events[0] else {
        panic!("expected a removal, got {:?}", events[0]);
    };
    assert_eq!(removed.id.as_deref(), Some("cart"));
    assert!(!removed.in_asset_instance);
}

#[test]
fn removed_template_part_is_addressed_by_path() {
    let mut host = MockHost::new();
    let house = host.spawn_asset(host.root(), "Assets/Packs/Town/House.fbx", "House", &["Door"]);
    let door = host.find_by_name("Door").unwrap();
    let binding = bound(&host, &[("house", house)]);

    let mut engine = DiffEngine::new(&host, host.root(), &binding);
    host.remove(door);

    let events = engine.check(&host, &binding);
    assert_eq!(events.len(), 1);
    let DiffEvent::Removed(removed) = &events[0] else {
        panic!("expected a removal, got {:?}", events[0]);
    };
    assert_eq!(removed.id, None);
    assert_eq!(removed.parent_id.as_deref(), Some("house"));
    assert_eq!(removed.path.as_deref(), Some("/n[Door]i[0]"));
    assert_eq!(removed.name, "Door");
    assert!(removed.in_asset_instance);
}

#[test]
fn rename_and_move_come_out_as_separate_events() {
    let mut host = MockHost::new();
    let lamp = host.spawn(host.root(), "Lamp");
    let binding = bound(&host, &[("lamp", lamp)]);
    let mut engine = DiffEngine::new(&host, host.root(), &binding);

    host.rename(lamp, "Streetlamp");
    host.move_to(lamp, Vec3::new(1.0, 0.0, -2.0));

    let events = engine.check(&host, &binding);
    assert_eq!(events.len(), 2);
    assert!(events.iter().any(|e| matches!(
        e,
        DiffEvent::Changed { kind: ChangeKind::Renamed { to, .. }, .. } if to == "Streetlamp"
    )));
    assert!(events.iter().any(|e| matches!(
        e,
        DiffEvent::Changed {
            kind: ChangeKind::Transformed { position: Some(p), rotation: None, scale: None },
            ..
        } if *p == Vec3::new(1.0, 0.0, -2.0)
    )));
}

#[test]
fn reparent_subsumes_sibling_move() {
    let mut host = MockHost::new();
    let left = host.spawn(host.root(), "Left");
    let right = host.spawn(host.root(), "Right");
    let crate_box = host.spawn(left, "Crate");
    let binding = bound(&host, &[("l", left), ("r", right), ("c", crate_box)]);
    let mut engine = DiffEngine::new(&host, host.root(), &binding);

    host.set_parent(&crate_box, &right, 0);

    let events = engine.check(&host, &binding);
    assert_eq!(
        events,
        vec![DiffEvent::Changed {
            handle: crate_box,
            kind: ChangeKind::Reparented {
                new_parent: right,
                sibling_index: 0,
            },
        }]
    );
}

#[test]
fn sibling_move_reports_new_index() {
    let mut host = MockHost::new();
    let first = host.spawn(host.root(), "First");
    let second = host.spawn(host.root(), "Second");
    let binding = bound(&host, &[("a", first), ("b", second)]);
    let mut engine = DiffEngine::new(&host, host.root(), &binding);

    host.set_sibling_index(&second, 0);

    let events = engine.check(&host, &binding);
    // The displaced sibling shifts too; both moves are reported.
    assert!(events.contains(&DiffEvent::Changed {
        handle: second,
        kind: ChangeKind::SiblingMoved { index: 0 },
    }));
    assert!(events.contains(&DiffEvent::Changed {
        handle: first,
        kind: ChangeKind::SiblingMoved { index: 1 },
    }));
}

#[test]
fn material_swap_reports_changed_slot() {
    let mut host = MockHost::new();
    let house = host.spawn_asset(host.root(), "Assets/Packs/Town/House.fbx", "House", &["Wall"]);
    let wall = host.find_by_name("Wall").unwrap();
    let binding = bound(&host, &[("house", house)]);
    let mut engine = DiffEngine::new(&host, host.root(), &binding);

    host.swap_material(wall, 0, "Assets/Materials/Brick.mat", "Brick");

    let events = engine.check(&host, &binding);
    assert_eq!(
        events,
        vec![DiffEvent::Changed {
            handle: wall,
            kind: ChangeKind::MaterialsChanged { slots: vec![0] },
        }]
    );
}

#[test]
fn rebuild_swallows_pending_edits() {
    let mut host = MockHost::new();
    let binding = bound(&host, &[]);
    let mut engine = DiffEngine::new(&host, host.root(), &binding);

    host.spawn(host.root(), "Ghost");
    engine.rebuild(&host, &binding);
    assert!(engine.check(&host, &binding).is_empty());
}
