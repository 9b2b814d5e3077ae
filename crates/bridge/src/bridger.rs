use async_trait::async_trait;

use crate::{
    error::{Error, Result},
    types::Message,
};

/// The four-operation contract every chat network adapter implements.
///
/// `connect` establishes the remote session and starts the adapter's receive
/// loop on a background task; inbound traffic arrives through the adapter's
/// [`crate::Comms`] clone, never through this trait. Reconnection after a
/// drop is the adapter's own responsibility.
#[async_trait]
pub trait Bridger: Send + Sync {
    async fn connect(&self) -> Result<()>;

    /// Idempotent join; the adapter publishes a Channel discovery event once
    /// the join is effective.
    async fn join_channel(&self, channel: &str) -> Result<()>;

    /// Forward an outbound message to the remote network.
    async fn send(&self, msg: Message) -> Result<()>;
}

/// A named adapter instance: the concrete [`Bridger`] plus its identity.
pub struct Bridge {
    account: String,
    protocol: String,
    name: String,
    inner: Box<dyn Bridger>,
}

impl std::fmt::Debug for Bridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bridge")
            .field("account", &self.account)
            .field("protocol", &self.protocol)
            .field("name", &self.name)
            .finish()
    }
}

impl Bridge {
    /// Wrap an adapter under its account label (`"<protocol>.<instance>"`).
    pub fn new(account: impl Into<String>, inner: Box<dyn Bridger>) -> Result<Self> {
        let account = account.into();
        let (protocol, name) = account
            .split_once('.')
            .ok_or_else(|| Error::invalid_account(&account))?;
        Ok(Self {
            protocol: protocol.to_string(),
            name: name.to_string(),
            account,
            inner,
        })
    }

    #[must_use]
    pub fn account(&self) -> &str {
        &self.account
    }

    #[must_use]
    pub fn protocol(&self) -> &str {
        &self.protocol
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    pub async fn connect(&self) -> Result<()> {
        self.inner.connect().await
    }

    pub async fn join_channel(&self, channel: &str) -> Result<()> {
        self.inner.join_channel(channel).await
    }

    pub async fn send(&self, msg: Message) -> Result<()> {
        self.inner.send(msg).await
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    struct NullBridger;

    #[async_trait]
    impl Bridger for NullBridger {
        async fn connect(&self) -> Result<()> {
            Ok(())
        }

        async fn join_channel(&self, _channel: &str) -> Result<()> {
            Ok(())
        }

        async fn send(&self, _msg: Message) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn account_splits_into_protocol_and_name() {
        let bridge = Bridge::new("xmpp.work", Box::new(NullBridger)).unwrap();
        assert_eq!(bridge.protocol(), "xmpp");
        assert_eq!(bridge.name(), "work");
        assert_eq!(bridge.account(), "xmpp.work");
    }

    #[test]
    fn bare_account_is_rejected() {
        let err = Bridge::new("irc", Box::new(NullBridger)).unwrap_err();
        assert!(matches!(err, Error::InvalidAccount { .. }));
    }
}
