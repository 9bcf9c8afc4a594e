//! Test accounts with their keys.

use dn_types::{ed25519, AccountId};
use libp2p::{identity::Keypair, PeerId};

/// An account with a discovery key and a signing key.
#[derive(Clone, Debug)]
pub struct TestAccount {
    /// The account identity.
    pub id: AccountId,
    /// Key that derives the peer id of the node hosting the account.
    pub discovery: ed25519::Keypair,
    /// Key used to sign documents.
    pub signing: ed25519::Keypair,
}

impl TestAccount {
    /// Generate an account with random keys.
    pub fn generate() -> Self {
        Self {
            id: AccountId::random(),
            discovery: ed25519::Keypair::generate(),
            signing: ed25519::Keypair::generate(),
        }
    }

    /// Generate an account that shares the discovery key of `host`.
    ///
    /// Accounts hosted by the same node share its peer id.
    pub fn hosted_with(host: &TestAccount) -> Self {
        Self { discovery: host.discovery.clone(), ..Self::generate() }
    }

    /// The libp2p keypair for the discovery key.
    pub fn network_keypair(&self) -> Keypair {
        Keypair::from(self.discovery.clone())
    }

    /// The peer id derived from the discovery key.
    pub fn peer_id(&self) -> PeerId {
        self.network_keypair().public().to_peer_id()
    }

    /// Raw discovery public key.
    pub fn discovery_key(&self) -> Vec<u8> {
        self.discovery.public().to_bytes().to_vec()
    }

    /// Raw signing public key.
    pub fn signing_key(&self) -> Vec<u8> {
        self.signing.public().to_bytes().to_vec()
    }
}
