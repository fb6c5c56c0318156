use crate::protocol::error::ProtocolError;

const FRAME_TERMINATOR: char = '\0';

/// The STOMP-style commands used on the session connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameCommand {
    Connect,
    Connected,
    Subscribe,
    Send,
    Message,
    Receipt,
    Disconnect,
    Error,
}

impl FrameCommand {
    pub fn as_str(&self) -> &'static str {
        match self {
            FrameCommand::Connect => "CONNECT",
            FrameCommand::Connected => "CONNECTED",
            FrameCommand::Subscribe => "SUBSCRIBE",
            FrameCommand::Send => "SEND",
            FrameCommand::Message => "MESSAGE",
            FrameCommand::Receipt => "RECEIPT",
            FrameCommand::Disconnect => "DISCONNECT",
            FrameCommand::Error => "ERROR",
        }
    }

    pub fn from_str(command: &str) -> Result<Self, ProtocolError> {
        match command {
            "CONNECT" => Ok(FrameCommand::Connect),
            "CONNECTED" => Ok(FrameCommand::Connected),
            "SUBSCRIBE" => Ok(FrameCommand::Subscribe),
            "SEND" => Ok(FrameCommand::Send),
            "MESSAGE" => Ok(FrameCommand::Message),
            "RECEIPT" => Ok(FrameCommand::Receipt),
            "DISCONNECT" => Ok(FrameCommand::Disconnect),
            "ERROR" => Ok(FrameCommand::Error),
            other => Err(ProtocolError::UnknownCommand {
                command: other.to_string(),
            }),
        }
    }
}

/// One text frame: command line, `key:value` header lines, blank line, body,
/// NUL terminator.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    pub command: FrameCommand,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl Frame {
    pub fn new(command: FrameCommand) -> Self {
        Self {
            command,
            headers: Vec::new(),
            body: String::new(),
        }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn with_body(mut self, body: String) -> Self {
        self.body = body;
        self
    }

    /// First header with the given name, if any.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn serialize(&self) -> String {
        let mut out = String::new();
        out.push_str(self.command.as_str());
        out.push('\n');
        for (key, value) in &self.headers {
            out.push_str(key);
            out.push(':');
            out.push_str(value);
            out.push('\n');
        }
        out.push('\n');
        out.push_str(&self.body);
        out.push(FRAME_TERMINATOR);
        out
    }

    pub fn parse(input: &str) -> Result<Self, ProtocolError> {
        let input = input.strip_suffix(FRAME_TERMINATOR).unwrap_or(input);

        let Some((head, body)) = input.split_once("\n\n") else {
            return Err(ProtocolError::MalformedFrame {
                reason: "missing blank line between headers and body",
            });
        };

        let mut lines = head.lines();
        let Some(command_line) = lines.next() else {
            return Err(ProtocolError::MalformedFrame {
                reason: "empty frame",
            });
        };
        let command = FrameCommand::from_str(command_line.trim_end_matches('\r'))?;

        let mut headers = Vec::new();
        for line in lines {
            let line = line.trim_end_matches('\r');
            if line.is_empty() {
                continue;
            }
            let Some((key, value)) = line.split_once(':') else {
                return Err(ProtocolError::MalformedFrame {
                    reason: "header line without ':' separator",
                });
            };
            headers.push((key.to_string(), value.to_string()));
        }

        Ok(Self {
            command,
            headers,
            body: body.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serialize_parse_round_trip() {
        let frame = Frame::new(FrameCommand::Send)
            .with_header("destination", "/app/collaboration/abc/nodeAdded")
            .with_header("content-type", "application/json")
            .with_body("{\"type\":\"NodeAdded\"}".to_string());

        let parsed = Frame::parse(&frame.serialize()).unwrap();
        assert_eq!(parsed, frame);
    }

    #[test]
    fn parse_tolerates_missing_terminator_and_empty_body() {
        let parsed = Frame::parse("DISCONNECT\n\n").unwrap();
        assert_eq!(parsed.command, FrameCommand::Disconnect);
        assert!(parsed.body.is_empty());
    }

    #[test]
    fn parse_rejects_unknown_command() {
        assert!(matches!(
            Frame::parse("FLY\n\n\0"),
            Err(ProtocolError::UnknownCommand { .. })
        ));
    }

    #[test]
    fn parse_rejects_headerless_blob() {
        assert!(matches!(
            Frame::parse("MESSAGE no separator"),
            Err(ProtocolError::MalformedFrame { .. })
        ));
    }
}
