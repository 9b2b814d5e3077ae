use tracing::info;

use crate::schema::{ChatloomConfig, ProtocolConfig};

const ENV_PREFIX: &str = "CHATLOOM";

/// The overridable fields and their environment-key spellings. Only string
/// fields are overridable; booleans stay file-only.
const STRING_FIELDS: &[(&str, fn(&mut ProtocolConfig) -> &mut String)] = &[
    ("BINDADDRESS", |c| &mut c.bind_address),
    ("ICONURL", |c| &mut c.icon_url),
    ("IGNORENICKS", |c| &mut c.ignore_nicks),
    ("JID", |c| &mut c.jid),
    ("LOGIN", |c| &mut c.login),
    ("MUC", |c| &mut c.muc),
    ("NICK", |c| &mut c.nick),
    ("PASSWORD", |c| &mut c.password),
    ("SERVER", |c| &mut c.server),
    ("TOKEN", |c| &mut c.token),
    ("URL", |c| &mut c.url),
];

/// Apply `CHATLOOM_<PROTOCOL>_<INSTANCE>_<FIELD>` overrides from the
/// process environment onto every configured instance.
pub fn apply_env_overrides(config: &mut ChatloomConfig) {
    apply_env_overrides_with(config, |name| std::env::var(name).ok());
}

fn apply_env_overrides_with(
    config: &mut ChatloomConfig,
    lookup: impl Fn(&str) -> Option<String>,
) {
    for (protocol, table) in config.protocol_tables_mut() {
        for (instance, block) in table.iter_mut() {
            for (field, accessor) in STRING_FIELDS {
                let key = format!(
                    "{ENV_PREFIX}_{}_{}_{field}",
                    protocol.to_uppercase(),
                    instance.to_uppercase()
                );
                if let Some(value) = lookup(&key)
                    && !value.is_empty()
                {
                    info!(key = %key, "overriding config from environment");
                    *accessor(block) = value;
                }
            }
        }
    }
}
