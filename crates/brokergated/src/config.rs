//! brokergated.toml configuration.
//!
//! ```toml
//! [server]
//! listen = "0.0.0.0:8080"
//!
//! [store]
//! data_dir = "/var/lib/brokergate"
//!
//! [gateway]
//! downstream_timeout = "30s"
//! response_selection = "corrected"   # or "legacy"
//! restore_routes = true
//! ```
//!
//! Every section and key is optional.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, bail};
use serde::{Deserialize, Serialize};

use brokergate_transform::ResponseSelection;

/// File looked up in the working directory when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "brokergated.toml";

/// Database file inside the data directory.
pub const DB_FILE: &str = "brokergate.redb";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DaemonConfig {
    pub server: ServerConfig,
    pub store: StoreConfig,
    pub gateway: GatewayConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub listen: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: SocketAddr::from(([0, 0, 0, 0], 8080)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreConfig {
    pub data_dir: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("/var/lib/brokergate"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GatewayConfig {
    /// Bound on one downstream exchange, e.g. `"30s"`, `"500ms"`, `"1m"`.
    pub downstream_timeout: String,
    pub response_selection: ResponseSelection,
    /// Register all enabled broker endpoints at startup.
    pub restore_routes: bool,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            downstream_timeout: "30s".to_string(),
            response_selection: ResponseSelection::default(),
            restore_routes: true,
        }
    }
}

impl DaemonConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let config: DaemonConfig =
            toml::from_str(&content).with_context(|| format!("parsing {}", path.display()))?;
        Ok(config)
    }

    /// Load `explicit` if given (it must exist), else the default file if
    /// present, else built-in defaults.
    pub fn load(explicit: Option<&Path>) -> anyhow::Result<Self> {
        match explicit {
            Some(path) => Self::from_file(path),
            None => {
                let default = Path::new(DEFAULT_CONFIG_FILE);
                if default.exists() {
                    Self::from_file(default)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    pub fn downstream_timeout(&self) -> anyhow::Result<Duration> {
        let raw = &self.gateway.downstream_timeout;
        match parse_duration(raw) {
            Some(d) if !d.is_zero() => Ok(d),
            Some(_) => bail!("gateway.downstream_timeout must be greater than zero"),
            None => bail!("gateway.downstream_timeout '{raw}' is not a duration (try \"30s\")"),
        }
    }

    pub fn db_path(&self) -> PathBuf {
        self.store.data_dir.join(DB_FILE)
    }

    /// Check values that deserialization alone cannot.
    pub fn validate(&self) -> anyhow::Result<()> {
        self.downstream_timeout()?;
        if self.store.data_dir.as_os_str().is_empty() {
            bail!("store.data_dir must not be empty");
        }
        Ok(())
    }
}

/// Parse a duration string like "5s", "500ms", "1m".
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    if let Some(secs) = s.strip_suffix('s') {
        if let Some(ms) = secs.strip_suffix('m') {
            ms.parse::<u64>().ok().map(Duration::from_millis)
        } else {
            secs.parse::<u64>().ok().map(Duration::from_secs)
        }
    } else if let Some(mins) = s.strip_suffix('m') {
        mins.parse::<u64>()
            .ok()
            .and_then(|m| m.checked_mul(60))
            .map(Duration::from_secs)
    } else {
        None
    }
}
