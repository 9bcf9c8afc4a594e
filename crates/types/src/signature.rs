//! Consensus signatures over document signing roots.

use crate::AccountId;
use libp2p::identity::ed25519;
use serde::{Deserialize, Serialize};

/// A collaborator's signature over a document version.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    /// Unique id of the signature: signer id followed by the public key.
    pub signature_id: Vec<u8>,
    /// The account that produced the signature.
    pub signer_id: AccountId,
    /// The ed25519 public key used to sign.
    pub public_key: Vec<u8>,
    /// The raw signature bytes.
    pub signature: Vec<u8>,
    /// Unix timestamp (seconds) when the signature was created.
    pub timestamp: u64,
    /// Whether the signer validated the state transition of the document.
    pub transition_validated: bool,
}

impl Signature {
    /// Sign the consensus payload for a signing root.
    pub fn sign(
        keypair: &ed25519::Keypair,
        signer_id: AccountId,
        signing_root: &[u8],
        transition_validated: bool,
        timestamp: u64,
    ) -> Self {
        let public_key = keypair.public().to_bytes().to_vec();
        let payload = consensus_signature_payload(signing_root, transition_validated);
        let signature = keypair.sign(&payload);
        let mut signature_id = signer_id.to_vec();
        signature_id.extend_from_slice(&public_key);

        Self { signature_id, signer_id, public_key, signature, timestamp, transition_validated }
    }

    /// Verify the signature against a signing root.
    pub fn verify(&self, signing_root: &[u8]) -> bool {
        let Ok(public_key) = ed25519::PublicKey::try_from_bytes(&self.public_key) else {
            return false;
        };
        let payload = consensus_signature_payload(signing_root, self.transition_validated);
        public_key.verify(&payload, &self.signature)
    }
}

/// The bytes a collaborator signs: the signing root followed by a transition flag.
pub fn consensus_signature_payload(signing_root: &[u8], transition_validated: bool) -> Vec<u8> {
    let mut payload = Vec::with_capacity(signing_root.len() + 1);
    payload.extend_from_slice(signing_root);
    payload.push(u8::from(transition_validated));
    payload
}

/// Compute a signing root over arbitrary document bytes.
pub fn signing_root(bytes: &[u8]) -> Vec<u8> {
    blake3::hash(bytes).as_bytes().to_vec()
}
