use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::{env_subst::substitute_env, overrides::apply_env_overrides, schema::ChatloomConfig};

const CONFIG_FILENAME: &str = "chatloom.toml";

/// Load, substitute, parse, and apply environment overrides.
pub fn load_config(path: &Path) -> anyhow::Result<ChatloomConfig> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("failed to read {}: {e}", path.display()))?;
    let raw = substitute_env(&raw);
    let mut config: ChatloomConfig = toml::from_str(&raw)?;
    apply_env_overrides(&mut config);
    Ok(config)
}

/// Discover and load config from standard locations.
///
/// Search order:
/// 1. `./chatloom.toml` (project-local)
/// 2. `~/.config/chatloom/chatloom.toml` (user-global)
///
/// Falls back to defaults when no file is found or the file fails to parse.
#[must_use]
pub fn discover_and_load() -> ChatloomConfig {
    if let Some(path) = find_config_file() {
        debug!(path = %path.display(), "loading config");
        match load_config(&path) {
            Ok(config) => return config,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to load config, using defaults");
            },
        }
    } else {
        debug!("no config file found, using defaults");
    }
    let mut config = ChatloomConfig::default();
    apply_env_overrides(&mut config);
    config
}

fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from(CONFIG_FILENAME);
    if local.exists() {
        return Some(local);
    }
    if let Some(dirs) = directories::ProjectDirs::from("", "", "chatloom") {
        let global = dirs.config_dir().join(CONFIG_FILENAME);
        if global.exists() {
            return Some(global);
        }
    }
    None
}

/// The platform data directory for the history store.
#[must_use]
pub fn data_dir() -> PathBuf {
    directories::ProjectDirs::from("", "", "chatloom")
        .map(|d| d.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."))
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn loads_a_file_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[irc.libera]\nserver = \"irc.libera.chat:6697\"\nnick = \"loom\""
        )
        .unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.irc["libera"].server, "irc.libera.chat:6697");
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(load_config(Path::new("/definitely/not/here.toml")).is_err());
    }

    #[test]
    fn invalid_toml_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "this is not toml [").unwrap();
        assert!(load_config(file.path()).is_err());
    }
}
