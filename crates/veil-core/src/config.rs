//! Client configuration.
//!
//! Resolution order: defaults → config file → environment variables.
//!
//! The config file is read from `$VEIL_CONFIG` when set. The resulting
//! [`ClientConfig`] is handed to the client at construction.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, VeilError};

/// Environment variable naming an explicit config file.
pub const CONFIG_PATH_ENV: &str = "VEIL_CONFIG";

/// Connection and protocol settings for one network session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Cluster of nodes operations are addressed to.
    pub cluster_id: String,
    /// Chain the payment ledger runs on.
    pub chain_id: String,
    /// Base URL of the network's HTTP endpoint.
    pub network_url: String,
    /// Upper bound on waiting for a payment to confirm.
    pub payment_timeout_ms: u64,
    /// Default wall-clock limit for compute waits. 0 = unbounded.
    pub await_timeout_ms: u64,
    /// Seed for the user key.
    pub user_seed: String,
    /// Seed for the node key.
    pub node_seed: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            cluster_id: "veil-devnet".to_string(),
            chain_id: "veil-chain-devnet".to_string(),
            network_url: "http://localhost:3000".to_string(),
            payment_timeout_ms: 30_000,
            await_timeout_ms: 0,
            user_seed: "veil-user".to_string(),
            node_seed: "veil-node".to_string(),
        }
    }
}

impl ClientConfig {
    /// Load from defaults, the `$VEIL_CONFIG` file if set, then the environment.
    pub fn load() -> Result<Self> {
        let mut config = match std::env::var(CONFIG_PATH_ENV) {
            Ok(path) => Self::from_file(path)?,
            Err(_) => Self::default(),
        };
        config.apply_env(std::env::vars());
        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML config file. Missing keys keep their defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| VeilError::Config(format!("cannot read {}: {}", path.display(), e)))?;
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| VeilError::Config(e.to_string()))
    }

    /// Override fields from `VEIL_*` variables. Unparseable numbers are ignored.
    pub fn apply_env<I, K, V>(&mut self, vars: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        for (key, value) in vars {
            let value: String = value.into();
            match key.as_ref() {
                "VEIL_CLUSTER_ID" => self.cluster_id = value,
                "VEIL_CHAIN_ID" => self.chain_id = value,
                "VEIL_NETWORK_URL" => self.network_url = value,
                "VEIL_USER_SEED" => self.user_seed = value,
                "VEIL_NODE_SEED" => self.node_seed = value,
                "VEIL_PAYMENT_TIMEOUT_MS" => {
                    if let Ok(ms) = value.parse() {
                        self.payment_timeout_ms = ms;
                    }
                }
                "VEIL_AWAIT_TIMEOUT_MS" => {
                    if let Ok(ms) = value.parse() {
                        self.await_timeout_ms = ms;
                    }
                }
                _ => {}
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.cluster_id.trim().is_empty() {
            return Err(VeilError::Config("cluster_id must not be empty".to_string()));
        }
        if self.chain_id.trim().is_empty() {
            return Err(VeilError::Config("chain_id must not be empty".to_string()));
        }
        if self.payment_timeout_ms == 0 {
            return Err(VeilError::Config(
                "payment_timeout_ms must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn payment_timeout(&self) -> Duration {
        Duration::from_millis(self.payment_timeout_ms)
    }

    /// Default wait limit, `None` when unbounded.
    pub fn await_timeout(&self) -> Option<Duration> {
        (self.await_timeout_ms > 0).then(|| Duration::from_millis(self.await_timeout_ms))
    }
}
