use std::time::Duration;

use {
    axum::extract::ws::{Message as WsMessage, WebSocket},
    futures::{SinkExt, stream::{SplitSink, SplitStream, StreamExt}},
    tokio::sync::mpsc,
    tokio_util::sync::CancellationToken,
    tracing::{debug, warn},
};

use {
    chatloom_bridge::Comms,
    chatloom_protocol::{
        CLIENT_QUEUE_DEPTH, Inbound, MAX_PAYLOAD_BYTES, PING_PERIOD_SECS, PONG_WAIT_SECS,
        WRITE_WAIT_SECS, decode_inbound,
    },
};

use crate::hub::{ClientHandle, HubHandle};

/// Drive one accepted websocket through its whole lifecycle: register with
/// the hub, run the write pump on a background task, run the read pump here,
/// unregister on the way out.
pub async fn handle_socket(
    socket: WebSocket,
    account: String,
    comms: Comms,
    hub: HubHandle,
    cancel: CancellationToken,
) {
    let conn_id = uuid::Uuid::new_v4().to_string();
    debug!(conn_id = %conn_id, "ws: client connected");

    let (ws_tx, ws_rx) = socket.split();
    let (queue_tx, queue_rx) = mpsc::channel::<String>(CLIENT_QUEUE_DEPTH);

    hub.register(ClientHandle {
        conn_id: conn_id.clone(),
        sender: queue_tx,
    })
    .await;

    let write_cancel = cancel.clone();
    let write_conn_id = conn_id.clone();
    tokio::spawn(async move {
        write_pump(ws_tx, queue_rx, write_cancel).await;
        debug!(conn_id = %write_conn_id, "ws: write pump done");
    });

    read_pump(ws_rx, &conn_id, &account, &comms).await;

    hub.unregister(&conn_id).await;
    debug!(conn_id = %conn_id, "ws: client gone");
}

/// Read frames until error, close, or 60s of silence. Inbound messages are
/// re-attributed to the owning account before they hit the bus; envelope
/// errors drop the frame but keep the connection.
async fn read_pump(
    mut ws_rx: SplitStream<WebSocket>,
    conn_id: &str,
    account: &str,
    comms: &Comms,
) {
    let deadline = Duration::from_secs(PONG_WAIT_SECS);
    loop {
        let frame = match tokio::time::timeout(deadline, ws_rx.next()).await {
            Err(_) => {
                debug!(conn_id, "ws: read deadline expired");
                return;
            },
            Ok(None) => return,
            Ok(Some(Err(e))) => {
                debug!(conn_id, "ws: read error: {e}");
                return;
            },
            Ok(Some(Ok(frame))) => frame,
        };

        let text = match frame {
            WsMessage::Text(t) => t,
            WsMessage::Close(_) => return,
            // Pongs and pings land here; reaching the next iteration is what
            // re-arms the deadline.
            _ => continue,
        };

        if text.len() > MAX_PAYLOAD_BYTES {
            warn!(conn_id, size = text.len(), "ws: frame too large, dropped");
            continue;
        }

        match decode_inbound(text.as_str()) {
            Ok(Inbound::Message(mut msg)) => {
                // Server-side attribution: the client does not get to pick.
                msg.account = account.to_string();
                msg.username = String::new();
                comms.publish_message(msg).await;
            },
            Ok(Inbound::Command(cmd)) => comms.publish_command(cmd).await,
            Err(e) => warn!(conn_id, "ws: bad frame dropped: {e}"),
        }
    }
}

/// Forward queued envelopes to the socket, pinging every 54s. A closed queue
/// means the hub let go of this client: send a close frame and stop.
async fn write_pump(
    mut ws_tx: SplitSink<WebSocket, WsMessage>,
    mut queue_rx: mpsc::Receiver<String>,
    cancel: CancellationToken,
) {
    let write_wait = Duration::from_secs(WRITE_WAIT_SECS);
    let mut ping = tokio::time::interval(Duration::from_secs(PING_PERIOD_SECS));
    ping.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    // The first interval tick is immediate; a ping that early is useless.
    ping.tick().await;

    loop {
        tokio::select! {
            () = cancel.cancelled() => {
                let _ = ws_tx.send(WsMessage::Close(None)).await;
                return;
            },
            maybe = queue_rx.recv() => match maybe {
                Some(frame) => {
                    match tokio::time::timeout(write_wait, ws_tx.send(WsMessage::Text(frame.into()))).await {
                        Ok(Ok(())) => {},
                        Ok(Err(e)) => {
                            debug!("ws: write error: {e}");
                            return;
                        },
                        Err(_) => {
                            debug!("ws: write deadline expired");
                            return;
                        },
                    }
                },
                None => {
                    let _ = ws_tx.send(WsMessage::Close(None)).await;
                    return;
                },
            },
            _ = ping.tick() => {
                if tokio::time::timeout(write_wait, ws_tx.send(WsMessage::Ping(Vec::new().into())))
                    .await
                    .map(|r| r.is_err())
                    .unwrap_or(true)
                {
                    return;
                }
            },
        }
    }
}
