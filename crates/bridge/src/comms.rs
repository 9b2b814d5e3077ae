use std::time::Duration;

use {
    tokio::sync::mpsc,
    tracing::warn,
};

use crate::types::{Channel, Command, Message, User};

/// Depth of every bus stream. Small on purpose: adapters feel backpressure
/// instead of buffering unbounded history in memory.
pub const BUS_CAPACITY: usize = 10;

/// How long a producer may wait on a full stream before the event is dropped.
const SEND_WINDOW: Duration = Duration::from_secs(1);

/// Send-only view of the bus, cloned into every adapter and the web plane.
///
/// All publish methods share the same policy: block up to [`SEND_WINDOW`],
/// then log and drop. A stalled consumer never wedges a producer.
#[derive(Clone)]
pub struct Comms {
    messages: mpsc::Sender<Message>,
    message_log: mpsc::Sender<Message>,
    users: mpsc::Sender<User>,
    channels: mpsc::Sender<Channel>,
    read_status: mpsc::Sender<Message>,
    commands: mpsc::Sender<Command>,
}

/// Receive halves of the bus, owned exclusively by the gateway event loop.
pub struct CommsReceivers {
    pub messages: mpsc::Receiver<Message>,
    pub message_log: mpsc::Receiver<Message>,
    pub users: mpsc::Receiver<User>,
    pub channels: mpsc::Receiver<Channel>,
    pub read_status: mpsc::Receiver<Message>,
    pub commands: mpsc::Receiver<Command>,
}

impl Comms {
    /// Create the bus. The caller (the gateway constructor) keeps the
    /// receivers; everything else gets `Comms` clones.
    #[must_use]
    pub fn new() -> (Self, CommsReceivers) {
        let (messages_tx, messages_rx) = mpsc::channel(BUS_CAPACITY);
        let (log_tx, log_rx) = mpsc::channel(BUS_CAPACITY);
        let (users_tx, users_rx) = mpsc::channel(BUS_CAPACITY);
        let (channels_tx, channels_rx) = mpsc::channel(BUS_CAPACITY);
        let (read_tx, read_rx) = mpsc::channel(BUS_CAPACITY);
        let (commands_tx, commands_rx) = mpsc::channel(BUS_CAPACITY);

        (
            Self {
                messages: messages_tx,
                message_log: log_tx,
                users: users_tx,
                channels: channels_tx,
                read_status: read_tx,
                commands: commands_tx,
            },
            CommsReceivers {
                messages: messages_rx,
                message_log: log_rx,
                users: users_rx,
                channels: channels_rx,
                read_status: read_rx,
                commands: commands_rx,
            },
        )
    }

    pub async fn publish_message(&self, msg: Message) {
        Self::publish(&self.messages, msg, "messages").await;
    }

    /// Replayed history, kept separate from live traffic so the gateway can
    /// skip re-persisting it.
    pub async fn publish_log_message(&self, msg: Message) {
        Self::publish(&self.message_log, msg, "message_log").await;
    }

    pub async fn publish_user(&self, user: User) {
        Self::publish(&self.users, user, "users").await;
    }

    pub async fn publish_channel(&self, channel: Channel) {
        Self::publish(&self.channels, channel, "channels").await;
    }

    pub async fn publish_read_status(&self, msg: Message) {
        Self::publish(&self.read_status, msg, "read_status").await;
    }

    pub async fn publish_command(&self, command: Command) {
        Self::publish(&self.commands, command, "commands").await;
    }

    async fn publish<T>(tx: &mpsc::Sender<T>, event: T, stream: &'static str) {
        if let Err(e) = tx.send_timeout(event, SEND_WINDOW).await {
            warn!(stream, "bus send dropped: {e}");
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn events_reach_the_receivers() {
        let (comms, mut rx) = Comms::new();
        comms
            .publish_message(Message {
                text: "hello".into(),
                ..Default::default()
            })
            .await;
        comms.publish_user(User::new("alice", "irc.net", "Alice")).await;

        assert_eq!(rx.messages.recv().await.unwrap().text, "hello");
        assert_eq!(rx.users.recv().await.unwrap().user, "alice");
    }

    #[tokio::test(start_paused = true)]
    async fn full_stream_drops_instead_of_blocking() {
        let (comms, rx) = Comms::new();
        for i in 0..BUS_CAPACITY + 3 {
            comms
                .publish_message(Message {
                    text: format!("m{i}"),
                    ..Default::default()
                })
                .await;
        }
        // Receiver alive but never draining: the overflow was dropped, the
        // producer got here without hanging.
        drop(rx);
    }

    #[tokio::test]
    async fn closed_stream_is_not_an_error() {
        let (comms, rx) = Comms::new();
        drop(rx);
        comms.publish_command(Command::GetUsers).await;
    }
}
