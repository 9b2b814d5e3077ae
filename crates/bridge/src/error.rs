use std::error::Error as StdError;

use chatloom_common::FromMessage;

/// Crate-wide result type for bridge operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Typed errors shared across the adapter contract.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{0}")]
    Message(String),

    /// Account label is not of the form `<protocol>.<instance>`.
    #[error("invalid account name: {account}")]
    InvalidAccount { account: String },

    /// Wrapped source error from a concrete adapter.
    #[error("bridge operation failed: {context}: {source}")]
    External {
        context: String,
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },
}

impl Error {
    #[must_use]
    pub fn invalid_account(account: impl std::fmt::Display) -> Self {
        Self::InvalidAccount {
            account: account.to_string(),
        }
    }

    #[must_use]
    pub fn external(
        context: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self::External {
            context: context.into(),
            source: Box::new(source),
        }
    }
}

impl FromMessage for Error {
    fn from_message(message: String) -> Self {
        Self::Message(message)
    }
}

chatloom_common::impl_context!();
