//! Client-side plumbing for a websocket UI: the gateway connection, the
//! debounced read-marker, and the in-memory message index a dashboard
//! renders from. No terminal rendering lives here.

pub mod comms;
pub mod debounce;
pub mod storage;

pub use {
    comms::{Conn, Events},
    debounce::debounce_read_marker,
    storage::MessageIndex,
};
