//! Websocket wire protocol.
//!
//! All traffic is JSON text frames. Server → client traffic is an
//! [`Envelope`] tagged `message`, `user`, `channel`, or `read_status`, with
//! only the matching payload field populated. Client → server traffic is an
//! envelope tagged `message` or `command`; command payloads decode in two
//! stages (outer tag, then the per-variant payload).

use {
    chrono::{DateTime, Utc},
    serde::{Deserialize, Serialize},
};

use chatloom_bridge::{Channel, Command, Message, User, zero_time};

// ── Constants ────────────────────────────────────────────────────────────────

/// Maximum inbound frame size. Oversized frames are dropped, not fatal.
pub const MAX_PAYLOAD_BYTES: usize = 512;
/// A client missing pongs for this long is considered gone.
pub const PONG_WAIT_SECS: u64 = 60;
/// Per-write deadline.
pub const WRITE_WAIT_SECS: u64 = 10;
/// Ping cadence; must stay under [`PONG_WAIT_SECS`].
pub const PING_PERIOD_SECS: u64 = PONG_WAIT_SECS * 9 / 10;
/// Outbound queue depth per client before it counts as unresponsive.
pub const CLIENT_QUEUE_DEPTH: usize = 256;

// ── Errors ───────────────────────────────────────────────────────────────────

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The frame is not valid JSON, or a payload has the wrong shape.
    #[error("invalid envelope: {0}")]
    InvalidEnvelope(#[from] serde_json::Error),

    /// The outer or command tag is not one we speak.
    #[error("unknown message type: {0}")]
    UnknownMessageType(String),

    /// A required payload field is absent.
    #[error("missing field: {0}")]
    MissingField(&'static str),
}

// ── Server → client ──────────────────────────────────────────────────────────

/// Outbound envelope. Exactly one payload field matches `kind`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "Type")]
    pub kind: String,
    #[serde(rename = "Message", skip_serializing_if = "Option::is_none")]
    pub message: Option<Message>,
    #[serde(rename = "User", skip_serializing_if = "Option::is_none")]
    pub user: Option<User>,
    #[serde(rename = "Channel", skip_serializing_if = "Option::is_none")]
    pub channel: Option<Channel>,
}

impl Envelope {
    #[must_use]
    pub fn message(message: Message) -> Self {
        Self {
            kind: "message".into(),
            message: Some(message),
            user: None,
            channel: None,
        }
    }

    #[must_use]
    pub fn user(user: User) -> Self {
        Self {
            kind: "user".into(),
            message: None,
            user: Some(user),
            channel: None,
        }
    }

    #[must_use]
    pub fn channel(channel: Channel) -> Self {
        Self {
            kind: "channel".into(),
            message: None,
            user: None,
            channel: Some(channel),
        }
    }

    /// A read marker travels as a message under the `read_status` tag.
    #[must_use]
    pub fn read_status(marker: Message) -> Self {
        Self {
            kind: "read_status".into(),
            message: Some(marker),
            user: None,
            channel: None,
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

// ── Client → server ──────────────────────────────────────────────────────────

/// A decoded inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    Message(Message),
    Command(Command),
}

#[derive(Deserialize)]
struct InboundEnvelope {
    #[serde(rename = "Type")]
    kind: String,
    #[serde(rename = "Message")]
    message: Option<serde_json::Value>,
}

#[derive(Serialize, Deserialize)]
struct CommandEnvelope {
    #[serde(rename = "Type")]
    kind: String,
    #[serde(rename = "Command")]
    command: Option<serde_json::Value>,
}

#[derive(Serialize, Deserialize)]
struct ReplayPayload {
    #[serde(rename = "Channel")]
    channel: String,
    #[serde(rename = "Offset", default = "zero_time")]
    offset: DateTime<Utc>,
}

#[derive(Serialize, Deserialize)]
struct MarkReadPayload {
    #[serde(rename = "Message")]
    message: Message,
}

#[derive(Serialize, Deserialize)]
struct ChannelPayload {
    #[serde(rename = "Channel")]
    channel: String,
}

/// Decode one inbound text frame.
pub fn decode_inbound(text: &str) -> Result<Inbound> {
    let envelope: InboundEnvelope = serde_json::from_str(text)?;
    let payload = envelope.message.ok_or(Error::MissingField("Message"))?;
    match envelope.kind.as_str() {
        "message" => Ok(Inbound::Message(serde_json::from_value(payload)?)),
        "command" => Ok(Inbound::Command(decode_command(payload)?)),
        other => Err(Error::UnknownMessageType(other.to_string())),
    }
}

/// Second decode stage: outer command record, then the variant payload.
fn decode_command(payload: serde_json::Value) -> Result<Command> {
    let envelope: CommandEnvelope = serde_json::from_value(payload)?;
    let inner = |field: Option<serde_json::Value>| field.ok_or(Error::MissingField("Command"));
    match envelope.kind.as_str() {
        "replay_messages" => {
            let p: ReplayPayload = serde_json::from_value(inner(envelope.command)?)?;
            Ok(Command::ReplayMessages {
                channel: p.channel,
                offset: p.offset,
            })
        },
        "get_users" => Ok(Command::GetUsers),
        "get_channels" => Ok(Command::GetChannels),
        "mark_message_as_read" => {
            let p: MarkReadPayload = serde_json::from_value(inner(envelope.command)?)?;
            Ok(Command::MarkMessageAsRead { message: p.message })
        },
        "get_last_read_message" => {
            let p: ChannelPayload = serde_json::from_value(inner(envelope.command)?)?;
            Ok(Command::GetLastReadMessage { channel: p.channel })
        },
        "get_last_read_messages" => Ok(Command::GetLastReadMessages),
        other => Err(Error::UnknownMessageType(other.to_string())),
    }
}

// ── Client-side encoding ─────────────────────────────────────────────────────

/// Encode an outbound chat message the way a UI client submits it.
pub fn encode_message(message: &Message) -> Result<String> {
    Ok(serde_json::to_string(&serde_json::json!({
        "Type": "message",
        "Message": message,
    }))?)
}

/// Encode a command the way a UI client submits it.
pub fn encode_command(command: &Command) -> Result<String> {
    let (kind, payload) = match command {
        Command::ReplayMessages { channel, offset } => (
            "replay_messages",
            serde_json::to_value(ReplayPayload {
                channel: channel.clone(),
                offset: *offset,
            })?,
        ),
        Command::GetUsers => ("get_users", serde_json::json!({})),
        Command::GetChannels => ("get_channels", serde_json::json!({})),
        Command::MarkMessageAsRead { message } => (
            "mark_message_as_read",
            serde_json::to_value(MarkReadPayload {
                message: message.clone(),
            })?,
        ),
        Command::GetLastReadMessage { channel } => (
            "get_last_read_message",
            serde_json::to_value(ChannelPayload {
                channel: channel.clone(),
            })?,
        ),
        Command::GetLastReadMessages => ("get_last_read_messages", serde_json::json!({})),
    };
    Ok(serde_json::to_string(&serde_json::json!({
        "Type": "command",
        "Message": CommandEnvelope {
            kind: kind.into(),
            command: Some(payload),
        },
    }))?)
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replay_command_decodes_with_zero_offset() {
        let frame = r#"{"Type":"command","Message":{"Type":"replay_messages","Command":{"Channel":"c","Offset":"0001-01-01T00:00:00Z"}}}"#;
        let decoded = decode_inbound(frame).unwrap();
        assert_eq!(
            decoded,
            Inbound::Command(Command::ReplayMessages {
                channel: "c".into(),
                offset: zero_time(),
            })
        );
    }

    #[test]
    fn replay_offset_defaults_to_zero_when_absent() {
        let frame = r#"{"Type":"command","Message":{"Type":"replay_messages","Command":{"Channel":"c"}}}"#;
        match decode_inbound(frame).unwrap() {
            Inbound::Command(Command::ReplayMessages { offset, .. }) => {
                assert_eq!(offset, zero_time());
            },
            other => panic!("unexpected decode: {other:?}"),
        }
    }

    #[test]
    fn message_frame_decodes() {
        let frame = r#"{"Type":"message","Message":{"Text":"hi","Channel":"general","To":"irc.net"}}"#;
        match decode_inbound(frame).unwrap() {
            Inbound::Message(msg) => {
                assert_eq!(msg.text, "hi");
                assert_eq!(msg.channel, "general");
                assert_eq!(msg.to, "irc.net");
            },
            other => panic!("unexpected decode: {other:?}"),
        }
    }

    #[test]
    fn unknown_outer_tag_is_rejected() {
        let err = decode_inbound(r#"{"Type":"frobnicate","Message":{}}"#).unwrap_err();
        assert!(matches!(err, Error::UnknownMessageType(t) if t == "frobnicate"));
    }

    #[test]
    fn unknown_command_tag_is_rejected() {
        let frame = r#"{"Type":"command","Message":{"Type":"self_destruct","Command":{}}}"#;
        let err = decode_inbound(frame).unwrap_err();
        assert!(matches!(err, Error::UnknownMessageType(t) if t == "self_destruct"));
    }

    #[test]
    fn missing_message_field_is_rejected() {
        let err = decode_inbound(r#"{"Type":"message"}"#).unwrap_err();
        assert!(matches!(err, Error::MissingField("Message")));
    }

    #[test]
    fn malformed_json_is_an_invalid_envelope() {
        let err = decode_inbound("{not json").unwrap_err();
        assert!(matches!(err, Error::InvalidEnvelope(_)));
    }

    #[test]
    fn outbound_envelope_populates_only_the_matching_field() {
        let json = Envelope::user(User::new("bob", "irc.net", "Bob"))
            .to_json()
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["Type"], "user");
        assert!(value.get("Message").is_none());
        assert!(value.get("Channel").is_none());
        assert_eq!(value["User"]["ID"], "bob:irc.net");
    }

    #[test]
    fn read_status_travels_as_a_message() {
        let marker = Message {
            channel: "general".into(),
            account: "irc.net".into(),
            ..Default::default()
        };
        let json = Envelope::read_status(marker).to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["Type"], "read_status");
        assert_eq!(value["Message"]["Channel"], "general");
    }

    #[test]
    fn encoded_commands_decode_back() {
        let commands = [
            Command::GetUsers,
            Command::GetChannels,
            Command::GetLastReadMessages,
            Command::GetLastReadMessage {
                channel: "general:irc.net".into(),
            },
            Command::MarkMessageAsRead {
                message: Message {
                    text: "seen".into(),
                    ..Default::default()
                },
            },
        ];
        for cmd in commands {
            let encoded = encode_command(&cmd).unwrap();
            assert_eq!(decode_inbound(&encoded).unwrap(), Inbound::Command(cmd));
        }
    }
}
