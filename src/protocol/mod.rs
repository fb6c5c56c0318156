//! The wire protocol: text frames, the message set, and the session state
//! that stamps, routes, and de-duplicates traffic.

mod error;
mod frame;
mod message;
mod wire;

pub use error::{ProtocolError, WireError};
pub use frame::{Frame, FrameCommand};
pub use message::{Envelope, MessageBody, NodeChange};
pub use wire::WireSession;
