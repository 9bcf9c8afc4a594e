//! Node configuration loaded from yaml.

use crate::P2pConfig;
use dn_types::AccountId;
use eyre::Context as _;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

/// Settings for one account hosted by this node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountConfig {
    /// The account's identity.
    pub identity: AccountId,
}

impl AccountConfig {
    /// Create a new instance of [Self].
    pub fn new(identity: AccountId) -> Self {
        Self { identity }
    }
}

/// The configuration for a node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Identifier of the network this node belongs to.
    ///
    /// Peers on other networks are rejected.
    pub network_id: u32,
    /// Peer-to-peer messaging settings.
    pub p2p: P2pConfig,
    /// Accounts hosted by this node.
    pub accounts: Vec<AccountConfig>,
}

impl NodeConfig {
    /// Parse a node configuration from a yaml string.
    pub fn from_yaml(yaml: &str) -> eyre::Result<Self> {
        serde_yaml::from_str(yaml).wrap_err("failed to parse node config")
    }

    /// Read a node configuration from a yaml file.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> eyre::Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .wrap_err_with(|| format!("failed to read node config {}", path.display()))?;
        let config = Self::from_yaml(&contents)?;
        info!(target: "config", path = %path.display(), accounts = config.accounts.len(), "loaded node config");
        Ok(config)
    }

    /// Serialize the configuration as yaml.
    pub fn to_yaml(&self) -> eyre::Result<String> {
        serde_yaml::to_string(self).wrap_err("failed to serialize node config")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_parse_yaml_with_durations() {
        let yaml = r#"
network_id: 8
p2p:
  connection_timeout: 5s
  response_delay: 250ms
accounts:
  - identity: "0x0101010101010101010101010101010101010101010101010101010101010101"
"#;
        let config = NodeConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.network_id, 8);
        assert_eq!(config.p2p.connection_timeout, Duration::from_secs(5));
        assert_eq!(config.p2p.response_delay, Duration::from_millis(250));
        // unset fields keep defaults
        assert_eq!(config.p2p.stream_reuse_tries, 3);
        assert_eq!(config.p2p.max_message_size, crate::MESSAGE_SIZE_MAX);
        assert_eq!(config.accounts, vec![AccountConfig::new(AccountId::new([1; 32]))]);
    }

    #[test]
    fn test_empty_yaml_is_default() {
        let config = NodeConfig::from_yaml("{}").unwrap();
        assert_eq!(config, NodeConfig::default());
    }

    #[test]
    fn test_yaml_roundtrip() {
        let config = NodeConfig {
            network_id: 2,
            p2p: P2pConfig { response_delay: Duration::from_secs(1), ..Default::default() },
            accounts: vec![AccountConfig::new(AccountId::new([4; 32]))],
        };
        let yaml = config.to_yaml().unwrap();
        assert_eq!(NodeConfig::from_yaml(&yaml).unwrap(), config);
    }

    #[test]
    fn test_bad_duration_fails() {
        let yaml = "p2p:\n  connection_timeout: soon\n";
        assert!(NodeConfig::from_yaml(yaml).is_err());
    }
}
