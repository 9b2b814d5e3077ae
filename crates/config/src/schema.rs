use std::{collections::HashMap, path::PathBuf};

use serde::{Deserialize, Serialize};

/// Options recognized by one adapter instance. Which fields matter depends
/// on the protocol; the rest stay at their defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtocolConfig {
    pub bind_address: String,
    pub icon_url: String,
    pub ignore_nicks: String,
    pub jid: String,
    pub login: String,
    pub muc: String,
    pub nick: String,
    pub password: String,
    pub server: String,
    pub token: String,
    pub url: String,
    pub use_tls: bool,
    pub skip_tls_verify: bool,
}

/// One adapter account plus the channels it should join at startup.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccountChannels {
    pub account: String,
    pub channels: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WebGatewayConfig {
    pub accounts: Vec<AccountChannels>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Where the history store lives. Defaults to the platform data dir.
    pub data_dir: Option<PathBuf>,
    /// Static UI assets served next to `/ws`.
    pub static_dir: Option<PathBuf>,
}

/// The whole config file: one table of instances per protocol, the web
/// gateway's join list, and general settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatloomConfig {
    pub irc: HashMap<String, ProtocolConfig>,
    pub xmpp: HashMap<String, ProtocolConfig>,
    pub slack: HashMap<String, ProtocolConfig>,
    pub discord: HashMap<String, ProtocolConfig>,
    pub mattermost: HashMap<String, ProtocolConfig>,
    pub telegram: HashMap<String, ProtocolConfig>,
    pub gitter: HashMap<String, ProtocolConfig>,
    pub rocketchat: HashMap<String, ProtocolConfig>,
    pub web: HashMap<String, ProtocolConfig>,
    pub general: GeneralConfig,
    pub web_gateway: WebGatewayConfig,
}

impl ChatloomConfig {
    /// The instance table for a protocol name, if it is one we know.
    #[must_use]
    pub fn protocol(&self, protocol: &str) -> Option<&HashMap<String, ProtocolConfig>> {
        self.protocol_tables()
            .into_iter()
            .find(|(name, _)| *name == protocol)
            .map(|(_, table)| table)
    }

    /// The config block for `"<protocol>.<instance>"`.
    #[must_use]
    pub fn instance(&self, account: &str) -> Option<&ProtocolConfig> {
        let (protocol, name) = account.split_once('.')?;
        self.protocol(protocol)?.get(name)
    }

    /// Account → channels-to-join, from the web gateway block.
    #[must_use]
    pub fn joins(&self) -> HashMap<String, Vec<String>> {
        self.web_gateway
            .accounts
            .iter()
            .map(|a| (a.account.clone(), a.channels.clone()))
            .collect()
    }

    pub(crate) fn protocol_tables(&self) -> [(&'static str, &HashMap<String, ProtocolConfig>); 9] {
        [
            ("irc", &self.irc),
            ("xmpp", &self.xmpp),
            ("slack", &self.slack),
            ("discord", &self.discord),
            ("mattermost", &self.mattermost),
            ("telegram", &self.telegram),
            ("gitter", &self.gitter),
            ("rocketchat", &self.rocketchat),
            ("web", &self.web),
        ]
    }

    pub(crate) fn protocol_tables_mut(
        &mut self,
    ) -> [(&'static str, &mut HashMap<String, ProtocolConfig>); 9] {
        [
            ("irc", &mut self.irc),
            ("xmpp", &mut self.xmpp),
            ("slack", &mut self.slack),
            ("discord", &mut self.discord),
            ("mattermost", &mut self.mattermost),
            ("telegram", &mut self.telegram),
            ("gitter", &mut self.gitter),
            ("rocketchat", &mut self.rocketchat),
            ("web", &mut self.web),
        ]
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_typical_config() {
        let cfg: ChatloomConfig = toml::from_str(
            r#"
            [xmpp.work]
            jid = "bridge@example.org"
            muc = "conference.example.org"
            nick = "bridge"
            password = "hunter2"

            [irc.libera]
            server = "irc.libera.chat:6697"
            nick = "loom"
            use_tls = true

            [web.server]
            bind_address = "127.0.0.1:8001"

            [[web_gateway.accounts]]
            account = "xmpp.work"
            channels = ["dev", "ops"]

            [general]
            data_dir = "/var/lib/chatloom"
            "#,
        )
        .unwrap();

        assert_eq!(cfg.xmpp["work"].jid, "bridge@example.org");
        assert!(cfg.irc["libera"].use_tls);
        assert_eq!(cfg.instance("web.server").unwrap().bind_address, "127.0.0.1:8001");
        assert_eq!(cfg.joins()["xmpp.work"], vec!["dev", "ops"]);
        assert_eq!(
            cfg.general.data_dir.as_deref(),
            Some(std::path::Path::new("/var/lib/chatloom"))
        );
    }

    #[test]
    fn unknown_accounts_resolve_to_none() {
        let cfg = ChatloomConfig::default();
        assert!(cfg.instance("matrix.home").is_none());
        assert!(cfg.instance("nodot").is_none());
    }
}
