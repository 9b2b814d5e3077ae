use std::{
    collections::{BTreeMap, HashMap},
    sync::Mutex,
};

use chatloom_bridge::Message;

/// In-memory message index for a UI client.
///
/// One ordered tree per channel, keyed by the 19-character timestamp prefix,
/// all behind a single mutex. Readers and writers serialize; iteration is
/// always in key order, matching what the store would replay.
#[derive(Default)]
pub struct MessageIndex {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    messages: HashMap<String, BTreeMap<String, Message>>,
    read_markers: HashMap<String, Message>,
}

impl MessageIndex {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a message into its channel's tree. Same-key inserts overwrite,
    /// mirroring the store's last-write-wins rule.
    pub fn insert(&self, msg: Message) {
        let mut inner = self.lock();
        inner
            .messages
            .entry(msg.channel_id())
            .or_default()
            .insert(msg.key(), msg);
    }

    /// Record the channel's read marker.
    pub fn mark_read(&self, msg: Message) {
        let mut inner = self.lock();
        inner.read_markers.insert(msg.channel_id(), msg);
    }

    /// Messages strictly after the channel's read marker. With no marker,
    /// everything in the channel is unread.
    #[must_use]
    pub fn unread_count(&self, channel_id: &str) -> usize {
        let inner = self.lock();
        let Some(tree) = inner.messages.get(channel_id) else {
            return 0;
        };
        match inner.read_markers.get(channel_id) {
            Some(marker) => {
                let marker_key = marker.key();
                tree.keys().filter(|key| **key > marker_key).count()
            },
            None => tree.len(),
        }
    }

    /// The newest message in a channel.
    #[must_use]
    pub fn last_message(&self, channel_id: &str) -> Option<Message> {
        let inner = self.lock();
        inner
            .messages
            .get(channel_id)
            .and_then(|tree| tree.values().next_back().cloned())
    }

    /// Every message in a channel, in key order.
    #[must_use]
    pub fn messages_in(&self, channel_id: &str) -> Vec<Message> {
        let inner = self.lock();
        inner
            .messages
            .get(channel_id)
            .map(|tree| tree.values().cloned().collect())
            .unwrap_or_default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        // A poisoned index is still a usable index.
        self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use chrono::{DateTime, Duration, Utc};

    use super::*;

    fn msg(text: &str, when: DateTime<Utc>) -> Message {
        Message {
            text: text.into(),
            channel: "general".into(),
            account: "irc.net".into(),
            timestamp: when,
            ..Default::default()
        }
    }

    fn base() -> DateTime<Utc> {
        "2021-09-01T09:00:00Z".parse().unwrap()
    }

    #[test]
    fn iteration_is_ordered_regardless_of_insert_order() {
        let index = MessageIndex::new();
        for (text, offset) in [("c", 2), ("a", 0), ("b", 1)] {
            index.insert(msg(text, base() + Duration::seconds(offset)));
        }

        let texts: Vec<String> = index
            .messages_in("general:irc.net")
            .into_iter()
            .map(|m| m.text)
            .collect();
        assert_eq!(texts, ["a", "b", "c"]);
    }

    #[test]
    fn unread_counts_against_the_marker() {
        let index = MessageIndex::new();
        for i in 0..10 {
            index.insert(msg(&format!("m{i}"), base() + Duration::seconds(i)));
        }

        assert_eq!(index.unread_count("general:irc.net"), 10);

        index.mark_read(msg("m6", base() + Duration::seconds(6)));
        assert_eq!(index.unread_count("general:irc.net"), 3);

        assert_eq!(index.unread_count("empty:none"), 0);
    }

    #[test]
    fn last_message_is_the_newest() {
        let index = MessageIndex::new();
        index.insert(msg("early", base()));
        index.insert(msg("late", base() + Duration::seconds(30)));

        assert_eq!(index.last_message("general:irc.net").unwrap().text, "late");
        assert!(index.last_message("other:none").is_none());
    }

    #[test]
    fn same_second_inserts_overwrite() {
        let index = MessageIndex::new();
        index.insert(msg("first", base()));
        index.insert(msg("second", base()));

        assert_eq!(index.messages_in("general:irc.net").len(), 1);
        assert_eq!(index.last_message("general:irc.net").unwrap().text, "second");
    }
}
