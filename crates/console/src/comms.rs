use std::{sync::Arc, time::Duration};

use {
    futures::{SinkExt, StreamExt},
    tokio::sync::mpsc,
    tokio_tungstenite::{connect_async, tungstenite::Message as WsFrame},
    tokio_util::sync::CancellationToken,
    tracing::{debug, warn},
};

use {
    chatloom_bridge::{Channel, Command, Message, User},
    chatloom_protocol::{Envelope, encode_command, encode_message},
};

use crate::debounce::debounce_read_marker;

/// Quiet interval before a buffered read marker goes out.
const READ_MARKER_INTERVAL: Duration = Duration::from_secs(3);

/// Callbacks a UI hangs off the connection.
pub trait Events: Send + Sync {
    /// A live or replayed message. Return true when it lands in the channel
    /// currently on screen; the connection then marks it as read.
    fn message(&self, msg: Message) -> bool;
    fn user(&self, user: User);
    fn channel(&self, channel: Channel);
    /// The gateway's stored read marker for some channel.
    fn read_marker(&self, msg: Message);
}

struct Outbound {
    messages_rx: mpsc::Receiver<Message>,
    commands_rx: mpsc::Receiver<Command>,
}

/// One client connection to the gateway.
///
/// Outbound messages and commands flow through bounded queues into a writer
/// task; inbound envelopes dispatch to [`Events`]. Read markers coming back
/// from the gateway trigger a follow-up replay of everything after them.
pub struct Conn {
    messages: mpsc::Sender<Message>,
    commands: mpsc::Sender<Command>,
    debounced: mpsc::Sender<Message>,
    events: Arc<dyn Events>,
    cancel: CancellationToken,
    outbound: Option<Outbound>,
}

impl Conn {
    #[must_use]
    pub fn new(events: Arc<dyn Events>, cancel: CancellationToken) -> Self {
        let (messages_tx, messages_rx) = mpsc::channel(16);
        let (commands_tx, commands_rx) = mpsc::channel(16);
        let debounced = debounce_read_marker(READ_MARKER_INTERVAL, commands_tx.clone());
        Self {
            messages: messages_tx,
            commands: commands_tx,
            debounced,
            events,
            cancel,
            outbound: Some(Outbound {
                messages_rx,
                commands_rx,
            }),
        }
    }

    pub async fn send_message(&self, msg: Message) {
        if self.messages.send(msg).await.is_err() {
            warn!("connection closed, message dropped");
        }
    }

    pub async fn send_command(&self, command: Command) {
        if self.commands.send(command).await.is_err() {
            warn!("connection closed, command dropped");
        }
    }

    /// Feed the debouncer; at most one marker per quiet interval reaches
    /// the gateway.
    pub async fn mark_as_read(&self, msg: Message) {
        if self.debounced.send(msg).await.is_err() {
            warn!("debouncer gone, read marker dropped");
        }
    }

    /// Dial the gateway and drive the connection until read error or
    /// cancellation. Can only be called once per `Conn`.
    pub async fn run(&mut self, url: &str) -> anyhow::Result<()> {
        let outbound = self
            .outbound
            .take()
            .ok_or_else(|| anyhow::anyhow!("connection already driven"))?;

        let (stream, _) = connect_async(url).await?;
        debug!(url, "connected to gateway");
        let (ws_tx, mut ws_rx) = stream.split();

        let writer = tokio::spawn(write_loop(ws_tx, outbound, self.cancel.clone()));

        self.send_initial_commands().await;

        loop {
            tokio::select! {
                () = self.cancel.cancelled() => break,
                frame = ws_rx.next() => match frame {
                    Some(Ok(WsFrame::Text(text))) => self.handle_frame(text.as_str()).await,
                    Some(Ok(WsFrame::Close(_))) | None => break,
                    Some(Ok(_)) => {},
                    Some(Err(e)) => {
                        warn!("read error: {e}");
                        break;
                    },
                },
            }
        }

        writer.abort();
        Ok(())
    }

    /// Prime the UI: full channel and user lists plus every stored read
    /// marker (each of which triggers its own history replay).
    async fn send_initial_commands(&self) {
        self.send_command(Command::GetChannels).await;
        self.send_command(Command::GetUsers).await;
        self.send_command(Command::GetLastReadMessages).await;
    }

    async fn handle_frame(&self, text: &str) {
        let envelope: Envelope = match serde_json::from_str(text) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!("undecodable frame dropped: {e}");
                return;
            },
        };

        match (envelope.kind.as_str(), envelope.message, envelope.user, envelope.channel) {
            ("user", _, Some(user), _) => self.events.user(user),
            ("channel", _, _, Some(channel)) => self.events.channel(channel),
            ("message", Some(msg), _, _) => {
                if self.events.message(msg.clone()) {
                    self.mark_as_read(msg).await;
                }
            },
            ("read_status", Some(marker), _, _) => {
                self.send_command(Command::ReplayMessages {
                    channel: marker.channel_id(),
                    offset: marker.timestamp,
                })
                .await;
                self.events.read_marker(marker);
            },
            (kind, ..) => debug!(kind, "frame without payload ignored"),
        }
    }
}

type WsSink = futures::stream::SplitSink<
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>,
    WsFrame,
>;

async fn write_loop(mut ws_tx: WsSink, mut outbound: Outbound, cancel: CancellationToken) {
    loop {
        let frame = tokio::select! {
            () = cancel.cancelled() => {
                let _ = ws_tx.send(WsFrame::Close(None)).await;
                return;
            },
            Some(msg) = outbound.messages_rx.recv() => encode_message(&msg),
            Some(cmd) = outbound.commands_rx.recv() => encode_command(&cmd),
            else => {
                let _ = ws_tx.send(WsFrame::Close(None)).await;
                return;
            },
        };

        let frame = match frame {
            Ok(frame) => frame,
            Err(e) => {
                warn!("outbound encode failed: {e}");
                continue;
            },
        };
        if let Err(e) = ws_tx.send(WsFrame::Text(frame.into())).await {
            warn!("write error: {e}");
            return;
        }
    }
}
