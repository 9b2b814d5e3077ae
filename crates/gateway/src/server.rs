use std::path::PathBuf;

use {
    axum::{
        Router,
        extract::{State, WebSocketUpgrade},
        response::IntoResponse,
        routing::get,
    },
    tokio_util::sync::CancellationToken,
    tower_http::{services::ServeDir, trace::TraceLayer},
    tracing::info,
};

use chatloom_bridge::Comms;

use crate::{hub::HubHandle, ws::handle_socket};

/// Default listen address, matching the historical deployment.
pub const DEFAULT_BIND_ADDRESS: &str = "127.0.0.1:8001";

pub struct ServerOptions {
    pub bind_address: String,
    /// Directory of static UI assets served for every non-`/ws` path.
    pub static_dir: PathBuf,
    /// Account label stamped onto traffic from connected clients.
    pub account: String,
}

#[derive(Clone)]
struct AppState {
    account: String,
    comms: Comms,
    hub: HubHandle,
    cancel: CancellationToken,
}

/// Serve `/ws` upgrades plus static assets until cancelled.
pub async fn serve(
    options: ServerOptions,
    comms: Comms,
    hub: HubHandle,
    cancel: CancellationToken,
) -> anyhow::Result<()> {
    let state = AppState {
        account: options.account,
        comms,
        hub,
        cancel: cancel.clone(),
    };

    let app = Router::new()
        .route("/ws", get(ws_upgrade))
        .fallback_service(ServeDir::new(&options.static_dir))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(&options.bind_address).await?;
    info!(bind = %options.bind_address, "websocket server listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(cancel.cancelled_owned())
        .await?;
    Ok(())
}

async fn ws_upgrade(State(state): State<AppState>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| {
        handle_socket(socket, state.account, state.comms, state.hub, state.cancel)
    })
}
