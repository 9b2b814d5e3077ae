use {
    chrono::{DateTime, SecondsFormat, Utc},
    serde::{Deserialize, Serialize},
};

/// Event tag for join/leave notices.
pub const EVENT_JOIN_LEAVE: &str = "join_leave";
/// Event tag for adapter failure notices.
pub const EVENT_FAILURE: &str = "failure";

/// Origin label stamped onto user/channel records replayed from the store,
/// telling the gateway not to persist them again.
pub const ORIGIN_DISK: &str = "disk";

/// Seconds between the zero timestamp (`0001-01-01T00:00:00Z`) and the epoch.
const ZERO_TIME_SECS: i64 = -62_135_596_800;

/// The zero timestamp. Messages and read markers carrying it are treated as
/// "no time set" throughout the system.
#[must_use]
pub fn zero_time() -> DateTime<Utc> {
    DateTime::from_timestamp(ZERO_TIME_SECS, 0).unwrap_or(DateTime::UNIX_EPOCH)
}

/// First 19 characters of the RFC3339 rendering (`"2000-01-01T00:00:00"`).
///
/// This prefix is the canonical store key: lexicographic order on it equals
/// chronological order at second granularity.
#[must_use]
pub fn key_prefix(ts: DateTime<Utc>) -> String {
    let rendered = ts.to_rfc3339_opts(SecondsFormat::Secs, true);
    match rendered.get(..19) {
        Some(prefix) => prefix.to_string(),
        None => rendered,
    }
}

// ── Events ──────────────────────────────────────────────────────────────────

/// A single chat message crossing the bridge, inbound or outbound.
///
/// Field names are PascalCase on the wire and in the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Message {
    pub text: String,
    pub channel: String,
    pub username: String,
    pub avatar: String,
    /// `"<protocol>.<instance>"` of the adapter that produced or should
    /// deliver this message.
    pub account: String,
    pub event: String,
    /// Target account for outbound routing from the web plane.
    pub to: String,
    pub is_priv: bool,
    pub timestamp: DateTime<Utc>,
    pub protocol: String,
}

impl Default for Message {
    fn default() -> Self {
        Self {
            text: String::new(),
            channel: String::new(),
            username: String::new(),
            avatar: String::new(),
            account: String::new(),
            event: String::new(),
            to: String::new(),
            is_priv: false,
            timestamp: zero_time(),
            protocol: String::new(),
        }
    }
}

impl Message {
    /// Store key for this message.
    #[must_use]
    pub fn key(&self) -> String {
        key_prefix(self.timestamp)
    }

    /// `"<channel>:<account>"`, the persistence identifier of the channel
    /// this message belongs to.
    #[must_use]
    pub fn channel_id(&self) -> String {
        format!("{}:{}", self.channel, self.account)
    }

    /// Whether the timestamp carries no time.
    #[must_use]
    pub fn has_zero_time(&self) -> bool {
        self.timestamp == zero_time()
    }
}

/// A user known to one adapter instance. Later records with the same ID
/// overwrite earlier ones.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct User {
    #[serde(rename = "ID")]
    pub id: String,
    pub user: String,
    pub name: String,
    pub account: String,
    /// Which plane produced the record; `"disk"` marks a replay.
    pub origin: String,
}

impl User {
    #[must_use]
    pub fn new(user: impl Into<String>, account: impl Into<String>, name: impl Into<String>) -> Self {
        let user = user.into();
        let account = account.into();
        Self {
            id: format!("{user}:{account}"),
            user,
            name: name.into(),
            account,
            origin: String::new(),
        }
    }
}

/// A channel known to one adapter instance. Same overwrite rule as [`User`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Channel {
    #[serde(rename = "ID")]
    pub id: String,
    pub channel: String,
    pub name: String,
    pub account: String,
    pub origin: String,
}

impl Channel {
    #[must_use]
    pub fn new(
        channel: impl Into<String>,
        account: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        let channel = channel.into();
        let account = account.into();
        Self {
            id: format!("{channel}:{account}"),
            channel,
            name: name.into(),
            account,
            origin: String::new(),
        }
    }
}

// ── Commands ────────────────────────────────────────────────────────────────

/// A client request resolved against the store rather than a chat network.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Replay history for one channel. A zero offset asks for the most
    /// recent window; a non-zero offset asks for everything after it.
    ReplayMessages {
        channel: String,
        offset: DateTime<Utc>,
    },
    GetUsers,
    GetChannels,
    MarkMessageAsRead { message: Message },
    GetLastReadMessage { channel: String },
    GetLastReadMessages,
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_prefix_is_second_granular() {
        let ts = "2021-06-01T12:30:45.678Z".parse::<DateTime<Utc>>().unwrap();
        assert_eq!(key_prefix(ts), "2021-06-01T12:30:45");
    }

    #[test]
    fn key_prefix_orders_chronologically() {
        let early = "2009-12-31T23:59:59Z".parse::<DateTime<Utc>>().unwrap();
        let late = "2010-01-01T00:00:00Z".parse::<DateTime<Utc>>().unwrap();
        assert!(key_prefix(early) < key_prefix(late));
    }

    #[test]
    fn zero_time_round_trips_through_rfc3339() {
        assert_eq!(key_prefix(zero_time()), "0001-01-01T00:00:00");
        let parsed = "0001-01-01T00:00:00Z".parse::<DateTime<Utc>>().unwrap();
        assert_eq!(parsed, zero_time());
    }

    #[test]
    fn message_wire_fields_are_pascal_case() {
        let msg = Message {
            text: "hi".into(),
            channel: "general".into(),
            is_priv: true,
            ..Default::default()
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["Text"], "hi");
        assert_eq!(json["Channel"], "general");
        assert_eq!(json["IsPriv"], true);
        assert_eq!(json["Timestamp"], "0001-01-01T00:00:00Z");
    }

    #[test]
    fn composite_ids() {
        let user = User::new("alice", "irc.freenode", "Alice");
        assert_eq!(user.id, "alice:irc.freenode");
        let channel = Channel::new("general", "slack.work", "#general");
        assert_eq!(channel.id, "general:slack.work");

        let msg = Message {
            channel: "general".into(),
            account: "slack.work".into(),
            ..Default::default()
        };
        assert_eq!(msg.channel_id(), "general:slack.work");
    }
}
