//! Configuration loading from `~/.echonode/config.toml` or `--config`.

use echonode_types::config::NodeConfig;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

/// Why a config file could not be used.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file {path} not found")]
    NotFound { path: PathBuf },
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Values given on the command line; `Some`/`true` wins over the file.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub http_port: Option<u16>,
    pub p2p_port: Option<u16>,
    pub insecure: bool,
    pub seed: Option<i64>,
}

/// Default config location.
pub fn default_config_path() -> PathBuf {
    echonode_home().join("config.toml")
}

fn echonode_home() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(".echonode")
}

/// Parse a config file.
pub fn read_config(path: &Path) -> Result<NodeConfig, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|source| {
        if source.kind() == std::io::ErrorKind::NotFound {
            ConfigError::NotFound {
                path: path.to_path_buf(),
            }
        } else {
            ConfigError::Read {
                path: path.to_path_buf(),
                source,
            }
        }
    })?;
    let config = toml::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    info!(path = %path.display(), "Loaded configuration");
    Ok(config)
}

/// Load the config, falling back to defaults.
///
/// A missing default file is normal and not reported. Anything else that
/// prevents loading is returned alongside the defaults so the caller can
/// report it once logging is up.
pub fn load_config(path: Option<&Path>) -> (NodeConfig, Option<ConfigError>) {
    let explicit = path.is_some();
    let config_path = path
        .map(|p| p.to_path_buf())
        .unwrap_or_else(default_config_path);

    match read_config(&config_path) {
        Ok(config) => (config, None),
        Err(ConfigError::NotFound { .. }) if !explicit => (NodeConfig::default(), None),
        Err(e) => (NodeConfig::default(), Some(e)),
    }
}

/// Apply command-line overrides on top of a loaded config.
pub fn apply_overrides(config: &mut NodeConfig, overrides: &Overrides) {
    if let Some(port) = overrides.http_port {
        config.http.listen_addr.set_port(port);
    }
    if let Some(port) = overrides.p2p_port {
        config.p2p.listen_addr.set_port(port);
    }
    if overrides.insecure {
        config.p2p.insecure = true;
    }
    if overrides.seed.is_some() {
        config.p2p.seed = overrides.seed;
    }
}
