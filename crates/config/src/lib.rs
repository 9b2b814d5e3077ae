//! Configuration loading, `${ENV_VAR}` substitution, and static environment
//! overrides.
//!
//! Config file: `chatloom.toml`, searched in `./` then `~/.config/chatloom/`.
//! Individual string fields can be overridden with
//! `CHATLOOM_<PROTOCOL>_<INSTANCE>_<FIELD>` variables.

pub mod env_subst;
pub mod loader;
pub mod overrides;
pub mod schema;

pub use {
    env_subst::substitute_env,
    loader::{data_dir, discover_and_load, load_config},
    overrides::apply_env_overrides,
    schema::{AccountChannels, ChatloomConfig, GeneralConfig, ProtocolConfig, WebGatewayConfig},
};
