use serde::{Deserialize, Serialize};

use crate::types::{ParticipantId, SessionId};

/// One person in the collaboration. A participant may hold several live
/// sessions at once (two editors open); presence ends when the last sid is
/// gone.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    pub id: ParticipantId,
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sids: Vec<SessionId>,
}

/// Who is currently in the session, maintained from Connect/Disconnect
/// traffic and replaced wholesale by a full sync.
#[derive(Clone, Debug, Default)]
pub struct SessionRoster {
    participants: Vec<Participant>,
}

impl SessionRoster {
    pub fn new() -> Self {
        Self {
            participants: Vec::new(),
        }
    }

    pub fn replace_all(&mut self, participants: Vec<Participant>) {
        self.participants = participants;
    }

    pub fn participants(&self) -> &[Participant] {
        &self.participants
    }

    pub fn find_by_sid(&self, sid: &str) -> Option<&Participant> {
        self.participants
            .iter()
            .find(|p| p.sids.iter().any(|s| s == sid))
    }

    /// Record a joining session, creating the participant entry when this is
    /// their first one.
    pub fn join(&mut self, id: &str, display_name: &str, sid: &str) {
        if let Some(existing) = self.participants.iter_mut().find(|p| p.id == id) {
            if !existing.sids.iter().any(|s| s == sid) {
                existing.sids.push(sid.to_string());
            }
            existing.display_name = display_name.to_string();
        } else {
            self.participants.push(Participant {
                id: id.to_string(),
                display_name: display_name.to_string(),
                sids: vec![sid.to_string()],
            });
        }
    }

    /// Drop a session, removing the participant entirely when it was their
    /// last one. Returns the participant id the sid belonged to.
    pub fn leave(&mut self, sid: &str) -> Option<ParticipantId> {
        let index = self
            .participants
            .iter()
            .position(|p| p.sids.iter().any(|s| s == sid))?;
        let participant = &mut self.participants[index];
        participant.sids.retain(|s| s != sid);
        let id = participant.id.clone();
        if participant.sids.is_empty() {
            self.participants.remove(index);
        }
        Some(id)
    }
}
