//! Error machinery shared across all chatloom crates.

pub mod error;

pub use error::FromMessage;
