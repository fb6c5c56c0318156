use log::{debug, warn};

use crate::{
    protocol::{
        error::{ProtocolError, WireError},
        frame::{Frame, FrameCommand},
        message::{Envelope, MessageBody},
    },
    transport::Transport,
    types::{ParticipantId, Sequence, SessionId},
};

const CONTENT_TYPE_JSON: &str = "application/json";

/// The session-level wire state for one collaboration: handshake and session
/// id, per-sender sequence stamping, destination routing, and echo
/// suppression.
///
/// Inbound envelopes whose `sid` equals our own are our own messages coming
/// back off the shared topic; dropping them is the protocol's only
/// de-duplication mechanism.
#[derive(Debug)]
pub struct WireSession {
    collaboration_id: String,
    origin: ParticipantId,
    sid: Option<SessionId>,
    sequence: Sequence,
}

impl WireSession {
    pub fn new(collaboration_id: &str, origin: ParticipantId) -> Self {
        Self {
            collaboration_id: collaboration_id.to_string(),
            origin,
            sid: None,
            sequence: 0,
        }
    }

    /// Session id assigned by the handshake, once completed.
    pub fn sid(&self) -> Option<&SessionId> {
        self.sid.as_ref()
    }

    pub fn is_ready(&self) -> bool {
        self.sid.is_some()
    }

    pub fn origin(&self) -> &ParticipantId {
        &self.origin
    }

    /// Topic all session traffic is broadcast on.
    pub fn topic(&self) -> String {
        format!("/topic/collaboration/{}", self.collaboration_id)
    }

    fn destination(&self, body: &MessageBody) -> String {
        format!(
            "/app/collaboration/{}{}",
            self.collaboration_id,
            body.destination_suffix()
        )
    }

    /// Frames that open the session: the connection frame and the topic
    /// subscription. Sent before anything else; the handshake answer carries
    /// our session id.
    pub fn open_frames(&self) -> Vec<Frame> {
        vec![
            Frame::new(FrameCommand::Connect).with_header("accept-version", "1.2"),
            Frame::new(FrameCommand::Subscribe)
                .with_header("id", &format!("sub-{}", self.collaboration_id))
                .with_header("destination", &self.topic()),
        ]
    }

    pub fn close_frame(&self) -> Frame {
        Frame::new(FrameCommand::Disconnect)
    }

    /// Stamp the next sequence number, wrap the body in an envelope, and
    /// send it to the body's destination.
    pub fn send(
        &mut self,
        transport: &mut dyn Transport,
        body: MessageBody,
    ) -> Result<(), WireError> {
        let Some(sid) = &self.sid else {
            return Err(WireError::HandshakePending);
        };

        let destination = self.destination(&body);
        let envelope = Envelope {
            origin: self.origin.clone(),
            sid: sid.clone(),
            sequence: self.sequence,
            body,
        };
        self.sequence += 1;

        let json = serde_json::to_string(&envelope).map_err(ProtocolError::from)?;
        let frame = Frame::new(FrameCommand::Send)
            .with_header("destination", &destination)
            .with_header("content-type", CONTENT_TYPE_JSON)
            .with_body(json);
        transport.send_text(&frame.serialize())?;
        Ok(())
    }

    /// Decode one inbound frame. Returns the envelope when it carries a
    /// remote message the controller should dispatch; `None` for everything
    /// the session consumes itself (acknowledgements, the handshake, our own
    /// echoes, traffic before the handshake).
    pub fn handle_frame(&mut self, text: &str) -> Result<Option<Envelope>, WireError> {
        let frame = Frame::parse(text).map_err(WireError::from)?;
        match frame.command {
            FrameCommand::Connected | FrameCommand::Receipt => Ok(None),
            FrameCommand::Error => {
                let message = frame
                    .header("message")
                    .map(str::to_string)
                    .unwrap_or(frame.body);
                Err(WireError::Server { message })
            }
            FrameCommand::Message => {
                let envelope: Envelope =
                    serde_json::from_str(&frame.body).map_err(ProtocolError::from)?;

                if let MessageBody::Handshake { sid } = &envelope.body {
                    debug!("session handshake complete, sid={sid}");
                    self.sid = Some(sid.clone());
                    return Ok(None);
                }

                let Some(own_sid) = &self.sid else {
                    warn!(
                        "dropping {} message received before handshake",
                        envelope.body.destination_suffix()
                    );
                    return Ok(None);
                };
                if &envelope.sid == own_sid {
                    // Our own message echoed back off the topic.
                    return Ok(None);
                }
                Ok(Some(envelope))
            }
            // Client-to-server commands are never expected inbound.
            other => {
                warn!("ignoring unexpected inbound {} frame", other.as_str());
                Ok(None)
            }
        }
    }
}
