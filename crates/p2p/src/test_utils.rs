//! Nodes wired to an in-memory network for tests.

use crate::{error::P2pResult, Peer};
use dn_config::{AccountConfig, ConfigStore, NodeConfig, P2pConfig};
use dn_network_libp2p::test_utils::{MemoryHost, MemoryNetwork};
use dn_test_utils::{MemoryDocumentService, MemoryIdentityService, MemoryNftService, TestAccount};
use std::sync::Arc;

/// Network id used by [TestNetwork::default].
pub const TEST_NETWORK_ID: u32 = 7;

/// Nodes sharing an in-memory transport and an identity registry.
#[derive(Debug)]
pub struct TestNetwork {
    /// Transport between the nodes.
    network: MemoryNetwork,
    /// Identity registry every node uses.
    identity: Arc<MemoryIdentityService>,
    /// Network id of spawned nodes.
    network_id: u32,
}

impl Default for TestNetwork {
    fn default() -> Self {
        Self::new(TEST_NETWORK_ID)
    }
}

impl TestNetwork {
    /// Create an empty network.
    pub fn new(network_id: u32) -> Self {
        Self {
            network: MemoryNetwork::new(),
            identity: Arc::new(MemoryIdentityService::new()),
            network_id,
        }
    }

    /// The shared identity registry.
    pub fn identity(&self) -> &Arc<MemoryIdentityService> {
        &self.identity
    }

    /// Start a node hosting one new account.
    pub fn spawn_node(&self, p2p: P2pConfig) -> P2pResult<TestNode> {
        self.spawn_node_on(self.network_id, p2p)
    }

    /// Start a node that believes it is on another network.
    pub fn spawn_node_on(&self, network_id: u32, p2p: P2pConfig) -> P2pResult<TestNode> {
        let account = TestAccount::generate();
        self.identity.register(&account);

        let host = self.network.host_with_keypair(&account.network_keypair());
        let config = Arc::new(ConfigStore::new(NodeConfig {
            network_id,
            p2p,
            accounts: vec![AccountConfig::new(account.id)],
        }));
        let documents = Arc::new(MemoryDocumentService::new());
        documents.add_signer(&account);
        let nfts = Arc::new(MemoryNftService::new());

        let peer = Peer::new(
            host.clone(),
            config.clone(),
            documents.clone(),
            self.identity.clone(),
            nfts.clone(),
        );
        peer.start()?;

        Ok(TestNode { account, host, peer, config, documents, nfts, identity: self.identity.clone() })
    }
}

/// A running node and its in-memory services.
#[derive(Debug)]
pub struct TestNode {
    /// The first account hosted by the node.
    pub account: TestAccount,
    /// The node's transport.
    pub host: MemoryHost,
    /// The messaging stack.
    pub peer: Peer<MemoryHost>,
    /// Node configuration.
    pub config: Arc<ConfigStore>,
    /// Document storage.
    pub documents: Arc<MemoryDocumentService>,
    /// NFT registry.
    pub nfts: Arc<MemoryNftService>,
    /// Shared identity registry.
    identity: Arc<MemoryIdentityService>,
}

impl TestNode {
    /// Host another account on this node and serve requests for it.
    pub fn add_account(&self) -> P2pResult<TestAccount> {
        let account = TestAccount::hosted_with(&self.account);
        self.identity.register(&account);
        self.config.insert_account(AccountConfig::new(account.id));
        self.documents.add_signer(&account);
        self.peer.init_protocol_for_account(&account.id)?;
        Ok(account)
    }
}
