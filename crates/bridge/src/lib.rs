//! The shared vocabulary of the bridge: event types, the comms bus, and the
//! adapter contract every chat network implements.
//!
//! Adapters hold a send-only [`Comms`] clone and push inbound traffic onto
//! the bus; the gateway owns the receive halves and does all routing.

pub mod bridger;
pub mod comms;
pub mod error;
pub mod types;

pub use {
    bridger::{Bridge, Bridger},
    comms::{BUS_CAPACITY, Comms, CommsReceivers},
    error::{Error, Result},
    types::{
        Channel, Command, EVENT_FAILURE, EVENT_JOIN_LEAVE, Message, ORIGIN_DISK, User, key_prefix,
        zero_time,
    },
};
