use std::collections::HashMap;

use {
    chrono::Utc,
    tokio_util::sync::CancellationToken,
    tracing::{debug, info, warn},
};

use {
    chatloom_bridge::{
        BUS_CAPACITY, Bridge, Channel, Command, Comms, CommsReceivers, Message, ORIGIN_DISK, User,
    },
    chatloom_protocol::Envelope,
    chatloom_store::{BUCKET_CHANNELS, BUCKET_USERS, Store},
    tokio::sync::mpsc,
};

use crate::hub::HubHandle;

/// Account label of the web plane. Messages arriving under it are outbound
/// (UI → chat network) and get routed by their `to` field; everything else
/// is inbound and fans out to the connected clients.
pub const WEB_ACCOUNT: &str = "web.server";

/// The central multiplexer. Owns the bus receive halves, the adapter
/// registry, and the routing policy between adapters, the store, and the
/// broadcast hub.
pub struct Gateway {
    bridges: HashMap<String, Bridge>,
    store: Store,
    comms: Comms,
    hub: HubHandle,
    web_account: String,
    cancel: CancellationToken,
}

impl Gateway {
    #[must_use]
    pub fn new(store: Store, comms: Comms, hub: HubHandle, cancel: CancellationToken) -> Self {
        Self {
            bridges: HashMap::new(),
            store,
            comms,
            hub,
            web_account: WEB_ACCOUNT.to_string(),
            cancel,
        }
    }

    /// Override the web plane's account label.
    #[must_use]
    pub fn with_web_account(mut self, account: impl Into<String>) -> Self {
        self.web_account = account.into();
        self
    }

    /// Register a constructed adapter under its account.
    pub fn add_bridge(&mut self, bridge: Bridge) {
        info!(account = %bridge.account(), "bridge registered");
        self.bridges.insert(bridge.account().to_string(), bridge);
    }

    /// Connect every registered adapter and join it to its configured
    /// channels. A failing adapter is logged and left behind; the rest of
    /// the process keeps going.
    pub async fn connect_all(&self, joins: &HashMap<String, Vec<String>>) {
        for (account, bridge) in &self.bridges {
            if let Err(e) = bridge.connect().await {
                warn!(account = %account, "bridge failed to connect: {e}");
                continue;
            }
            info!(account = %account, "bridge connected");
            for channel in joins.get(account).into_iter().flatten() {
                info!(account = %account, channel = %channel, "joining channel");
                if let Err(e) = bridge.join_channel(channel).await {
                    warn!(account = %account, channel = %channel, "join failed: {e}");
                }
            }
        }
    }

    /// The event loop. Runs until cancellation or until every bus producer
    /// is gone.
    pub async fn run(self, mut rx: CommsReceivers) {
        info!(bridges = self.bridges.len(), "gateway event loop started");

        // Commands resolve on their own task, in arrival order. A long
        // replay publishes back onto the bus, so resolving it inline would
        // leave nobody here to drain the results.
        let (commands_tx, mut commands_rx) = mpsc::channel::<Command>(BUS_CAPACITY);
        let store = self.store.clone();
        let comms = self.comms.clone();
        tokio::spawn(async move {
            while let Some(command) = commands_rx.recv().await {
                store.handle_command(command, &comms).await;
            }
        });

        loop {
            tokio::select! {
                () = self.cancel.cancelled() => break,
                Some(msg) = rx.messages.recv() => self.handle_message(msg).await,
                Some(user) = rx.users.recv() => self.handle_user(user).await,
                Some(channel) = rx.channels.recv() => self.handle_channel(channel).await,
                Some(command) = rx.commands.recv() => {
                    if commands_tx.send(command).await.is_err() {
                        warn!("command worker gone");
                    }
                },
                Some(msg) = rx.message_log.recv() => {
                    self.broadcast(&Envelope::message(msg)).await;
                },
                Some(marker) = rx.read_status.recv() => {
                    self.broadcast(&Envelope::read_status(marker)).await;
                },
                else => break,
            }
        }
        info!("gateway event loop stopped");
    }

    /// Live traffic: persist, then route. Outbound (web-account) messages go
    /// to the adapter named by `to`; inbound fans out to the UI clients.
    /// Chat-network traffic is never re-injected into another chat network.
    async fn handle_message(&self, mut msg: Message) {
        if msg.has_zero_time() {
            // Arrival order at the gateway is the canonical order.
            msg.timestamp = Utc::now();
        }
        if let Err(e) = self.store.append_log(&msg).await {
            warn!(channel = %msg.channel_id(), "history append failed: {e}");
        }

        if msg.account == self.web_account {
            match self.bridges.get(&msg.to) {
                Some(bridge) => {
                    debug!(target = %msg.to, "routing outbound message");
                    if let Err(e) = bridge.send(msg).await {
                        warn!("bridge send failed: {e}");
                    }
                },
                None => warn!(target = %msg.to, "routing target missing"),
            }
            return;
        }

        self.broadcast(&Envelope::message(msg)).await;
    }

    /// Presence: persist unless this is a replay off the store, then fan out.
    async fn handle_user(&self, user: User) {
        if user.origin != ORIGIN_DISK
            && let Err(e) = self.store.put_kv(BUCKET_USERS, &user.id, &user).await
        {
            warn!(id = %user.id, "user record write failed: {e}");
        }
        self.broadcast(&Envelope::user(user)).await;
    }

    /// Channel discovery: same pattern as presence.
    async fn handle_channel(&self, channel: Channel) {
        if channel.origin != ORIGIN_DISK
            && let Err(e) = self
                .store
                .put_kv(BUCKET_CHANNELS, &channel.id, &channel)
                .await
        {
            warn!(id = %channel.id, "channel record write failed: {e}");
        }
        self.broadcast(&Envelope::channel(channel)).await;
    }

    async fn broadcast(&self, envelope: &Envelope) {
        match envelope.to_json() {
            Ok(frame) => self.hub.broadcast(frame).await,
            Err(e) => warn!("envelope encode failed: {e}"),
        }
    }
}
