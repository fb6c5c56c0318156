use serde::{Deserialize, Serialize};

/// Opaque, stable node identifier. Assigned once when a node is first
/// observed (locally or remotely) and never reused within a tree.
pub type NodeId = String;

/// Identifier of one live connection of a participant. A participant may
/// hold several concurrent sessions.
pub type SessionId = String;

/// Identifier of a participant (account), stable across sessions.
pub type ParticipantId = String;

/// Per-sender outgoing message counter. Informational only: stamped on every
/// outgoing envelope, never validated on receive.
pub type Sequence = u64;

/// A three-component vector, used for positions, scales and euler-angle
/// rotations on the wire.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const ZERO: Vec3 = Vec3 {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };
    pub const ONE: Vec3 = Vec3 {
        x: 1.0,
        y: 1.0,
        z: 1.0,
    };

    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}
