//! Read access to node configuration for other components.

use crate::{AccountConfig, NodeConfig, P2pConfig};
use dn_types::AccountId;
use eyre::eyre;
use parking_lot::RwLock;
use std::collections::BTreeMap;

/// Configuration lookups used by the messaging layer.
pub trait ConfigService: Send + Sync + 'static {
    /// Identifier of the network this node belongs to.
    fn network_id(&self) -> u32;

    /// Peer-to-peer messaging settings.
    fn p2p_config(&self) -> P2pConfig;

    /// The configuration for an account hosted by this node.
    ///
    /// Returns an error if the node does not host the account.
    fn account(&self, identity: &AccountId) -> eyre::Result<AccountConfig>;

    /// Every account hosted by this node.
    fn accounts(&self) -> Vec<AccountConfig>;

    /// Returns `true` if the node hosts the account.
    fn is_local_account(&self, identity: &AccountId) -> bool {
        self.account(identity).is_ok()
    }
}

/// In-memory [ConfigService] built from a [NodeConfig].
///
/// Accounts can be added while the node runs.
#[derive(Debug)]
pub struct ConfigStore {
    /// Network id.
    network_id: u32,
    /// Messaging settings.
    p2p: P2pConfig,
    /// Hosted accounts by identity.
    accounts: RwLock<BTreeMap<AccountId, AccountConfig>>,
}

impl ConfigStore {
    /// Create a new instance of [Self].
    pub fn new(config: NodeConfig) -> Self {
        let accounts = config.accounts.into_iter().map(|a| (a.identity, a)).collect();
        Self { network_id: config.network_id, p2p: config.p2p, accounts: RwLock::new(accounts) }
    }

    /// Host another account.
    pub fn insert_account(&self, account: AccountConfig) {
        self.accounts.write().insert(account.identity, account);
    }

    /// Stop hosting an account.
    pub fn remove_account(&self, identity: &AccountId) -> Option<AccountConfig> {
        self.accounts.write().remove(identity)
    }
}

impl ConfigService for ConfigStore {
    fn network_id(&self) -> u32 {
        self.network_id
    }

    fn p2p_config(&self) -> P2pConfig {
        self.p2p.clone()
    }

    fn account(&self, identity: &AccountId) -> eyre::Result<AccountConfig> {
        self.accounts
            .read()
            .get(identity)
            .cloned()
            .ok_or_else(|| eyre!("account {identity} not hosted by this node"))
    }

    fn accounts(&self) -> Vec<AccountConfig> {
        self.accounts.read().values().cloned().collect()
    }
}
