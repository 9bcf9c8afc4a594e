//! Protocol ids and peer identity helpers.
//!
//! Every account hosted by a node gets its own protocol: `/centrifuge/0.0.1/<account hex>`.
//! Inbound streams therefore tell the node which local account a request is for.

use crate::error::{NetworkError, NetworkResult};
use dn_types::{ed25519, AccountId};
use libp2p::{identity::PublicKey, multihash::Multihash, PeerId, StreamProtocol};
use std::str::FromStr as _;

/// The base protocol shared by all accounts.
pub const PROTOCOL_PREFIX: &str = "/centrifuge/0.0.1";

/// Multihash code for identity hashes. Ed25519 peer ids inline the public key.
const IDENTITY_MULTIHASH_CODE: u64 = 0x00;

/// The protocol for an account.
pub fn protocol_for_identity(identity: &AccountId) -> NetworkResult<StreamProtocol> {
    let protocol = format!("{PROTOCOL_PREFIX}/{}", identity.to_hex());
    StreamProtocol::try_from_owned(protocol).map_err(|e| NetworkError::InvalidProtocol(e.to_string()))
}

/// The account a protocol belongs to.
pub fn extract_identity(protocol: &StreamProtocol) -> NetworkResult<AccountId> {
    let raw = protocol.as_ref();
    let identity = raw
        .strip_prefix(PROTOCOL_PREFIX)
        .and_then(|rest| rest.strip_prefix('/'))
        .ok_or_else(|| NetworkError::InvalidProtocol(raw.to_string()))?;

    AccountId::from_str(identity)
        .map_err(|e| NetworkError::InvalidProtocol(format!("{raw}: {e}")))
}

/// The peer id for an ed25519 discovery key.
pub fn parse_peer_id(discovery_key: &[u8]) -> NetworkResult<PeerId> {
    let key = ed25519::PublicKey::try_from_bytes(discovery_key)
        .map_err(|e| NetworkError::InvalidPeerKey(e.to_string()))?;
    Ok(PublicKey::from(key).to_peer_id())
}

/// The ed25519 public key embedded in a peer id.
pub fn public_key_from_peer_id(peer: &PeerId) -> NetworkResult<[u8; 32]> {
    let multihash: &Multihash<64> = peer.as_ref();
    if multihash.code() != IDENTITY_MULTIHASH_CODE {
        return Err(NetworkError::InvalidPeerKey(format!("{peer} does not inline its public key")));
    }

    let key = PublicKey::try_decode_protobuf(multihash.digest())
        .map_err(|e| NetworkError::InvalidPeerKey(e.to_string()))?;
    let key = key.try_into_ed25519().map_err(|e| NetworkError::InvalidPeerKey(e.to_string()))?;
    Ok(key.to_bytes())
}
