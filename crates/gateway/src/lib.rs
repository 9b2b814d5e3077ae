//! The gateway: broadcast hub, websocket client pumps, HTTP surface, and the
//! central event loop that wires adapters, the store, and connected UI
//! clients together.

pub mod gateway;
pub mod hub;
pub mod server;
pub mod ws;

pub use {
    gateway::{Gateway, WEB_ACCOUNT},
    hub::{ClientHandle, Hub, HubHandle},
    server::{DEFAULT_BIND_ADDRESS, ServerOptions, serve},
};
