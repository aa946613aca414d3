use alloy_primitives::Address;
use secp256k1::SecretKey;
use serde::{Deserialize, Serialize};
use sower_lib::signature;
use std::path::Path;

fn default_endpoint() -> String {
    "http://127.0.0.1:1306".to_string()
}

fn default_redis_url() -> String {
    "redis://127.0.0.1:6379".to_string()
}

fn default_work_dir() -> String {
    "/var/lib/sower".to_string()
}

/// Node configuration snapshot. Carried on the `Gateway` instead of a
/// process-wide singleton.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Externally reachable URL, advertised in task announcements.
    pub endpoint: String,
    /// Seed phrase the node keypair is derived from.
    pub mnemonic: String,
    /// Ordered chain RPC endpoints; earlier entries are preferred.
    pub rpcs: Vec<String>,
    /// Message bus (and optional task-store backend) URL.
    pub redis_url: String,
    /// Root under which fragment base directories live.
    pub work_dir: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            mnemonic: String::new(),
            rpcs: Vec::new(),
            redis_url: default_redis_url(),
            work_dir: default_work_dir(),
        }
    }
}

impl Config {
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// The node signing key derived from the mnemonic.
    pub fn node_secret(&self) -> anyhow::Result<SecretKey> {
        if self.mnemonic.trim().is_empty() {
            anyhow::bail!("node mnemonic is not configured");
        }
        Ok(signature::secret_from_mnemonic(&self.mnemonic)?)
    }

    /// The node's on-chain address.
    pub fn node_address(&self) -> anyhow::Result<Address> {
        let secret = self.node_secret()?;
        Ok(signature::public_key_to_address(&signature::public_key(
            &secret,
        )))
    }
}
