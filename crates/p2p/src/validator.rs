//! Header validation for inbound requests.
//!
//! Every request runs through a [ValidatorGroup] before it is dispatched. The group runs each
//! validator and reports all failures at once.

use async_trait::async_trait;
use dn_network_libp2p::{codec::Header, protocol::public_key_from_peer_id, PeerId};
use dn_network_types::{IdentityService, KeyPurpose};
use dn_types::{check_version_compatible, AccountId, NODE_VERSION};
use std::{fmt, sync::Arc};
use thiserror::Error;

#[cfg(test)]
#[path = "tests/validator_tests.rs"]
mod validator_tests;

/// A single validation failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// The header names no sender.
    #[error("empty sender id")]
    EmptySender,
    /// The sender runs a node version with a different major version.
    #[error("incompatible version: local {local}, remote {remote}")]
    IncompatibleVersion { local: String, remote: String },
    /// The sender belongs to another network.
    #[error("network mismatch: local {local}, remote {remote}")]
    NetworkMismatch { local: u32, remote: u32 },
    /// The transport peer is not a discovery key of the sender.
    #[error("peer {peer} is not a discovery key of {sender}: {reason}")]
    PeerMismatch { peer: PeerId, sender: AccountId, reason: String },
}

/// Every failure reported by a [ValidatorGroup].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationErrors(pub Vec<ValidationError>);

impl ValidationErrors {
    /// The failures.
    pub fn errors(&self) -> &[ValidationError] {
        &self.0
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("validation failed: ")?;
        for (i, e) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{e}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

/// Checks one aspect of a request.
#[async_trait]
pub trait Validator: Send + Sync + 'static {
    /// Validate the header of a request from `sender` that arrived from `peer`.
    async fn validate(
        &self,
        header: &Header,
        sender: &AccountId,
        peer: &PeerId,
    ) -> Result<(), ValidationError>;
}

/// Rejects senders whose node version is not compatible with this node.
#[derive(Debug, Default, Clone, Copy)]
pub struct VersionValidator;

#[async_trait]
impl Validator for VersionValidator {
    async fn validate(
        &self,
        header: &Header,
        _sender: &AccountId,
        _peer: &PeerId,
    ) -> Result<(), ValidationError> {
        check_version_compatible(NODE_VERSION, &header.node_version).map_err(|_| {
            ValidationError::IncompatibleVersion {
                local: NODE_VERSION.to_string(),
                remote: header.node_version.clone(),
            }
        })
    }
}

/// Rejects senders from other networks.
#[derive(Debug, Clone, Copy)]
pub struct NetworkValidator {
    /// The local network id.
    network_id: u32,
}

impl NetworkValidator {
    /// Create a new instance of [Self].
    pub fn new(network_id: u32) -> Self {
        Self { network_id }
    }
}

#[async_trait]
impl Validator for NetworkValidator {
    async fn validate(
        &self,
        header: &Header,
        _sender: &AccountId,
        _peer: &PeerId,
    ) -> Result<(), ValidationError> {
        if header.network_identifier != self.network_id {
            return Err(ValidationError::NetworkMismatch {
                local: self.network_id,
                remote: header.network_identifier,
            });
        }
        Ok(())
    }
}

/// Rejects requests whose transport peer is not a discovery key of the claimed sender.
pub struct PeerValidator {
    /// Identity registry.
    identity: Arc<dyn IdentityService>,
}

impl PeerValidator {
    /// Create a new instance of [Self].
    pub fn new(identity: Arc<dyn IdentityService>) -> Self {
        Self { identity }
    }
}

impl fmt::Debug for PeerValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PeerValidator").finish_non_exhaustive()
    }
}

#[async_trait]
impl Validator for PeerValidator {
    async fn validate(
        &self,
        _header: &Header,
        sender: &AccountId,
        peer: &PeerId,
    ) -> Result<(), ValidationError> {
        let mismatch =
            |reason: String| ValidationError::PeerMismatch { peer: *peer, sender: *sender, reason };

        let key = public_key_from_peer_id(peer).map_err(|e| mismatch(e.to_string()))?;
        self.identity
            .validate_key(sender, &key, KeyPurpose::P2pDiscovery)
            .await
            .map_err(|e| mismatch(e.to_string()))
    }
}

/// Runs a list of validators and aggregates their failures.
#[derive(Default)]
pub struct ValidatorGroup {
    /// Validators in the order they run.
    validators: Vec<Box<dyn Validator>>,
}

impl ValidatorGroup {
    /// Create a new instance of [Self].
    pub fn new(validators: Vec<Box<dyn Validator>>) -> Self {
        Self { validators }
    }

    /// Run every validator.
    ///
    /// A failing validator does not stop the rest from running.
    pub async fn validate(
        &self,
        header: &Header,
        sender: &AccountId,
        peer: &PeerId,
    ) -> Result<(), ValidationErrors> {
        let mut errors = Vec::new();
        if sender.as_bytes().iter().all(|b| *b == 0) {
            errors.push(ValidationError::EmptySender);
        }

        for validator in &self.validators {
            if let Err(e) = validator.validate(header, sender, peer).await {
                errors.push(e);
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ValidationErrors(errors))
        }
    }

    /// The number of validators in the group.
    pub fn len(&self) -> usize {
        self.validators.len()
    }

    /// Returns `true` if the group has no validators.
    pub fn is_empty(&self) -> bool {
        self.validators.is_empty()
    }
}

impl fmt::Debug for ValidatorGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValidatorGroup").field("validators", &self.validators.len()).finish()
    }
}

/// The validators every inbound request must pass: version, network and peer identity.
pub fn handshake_validator(network_id: u32, identity: Arc<dyn IdentityService>) -> ValidatorGroup {
    ValidatorGroup::new(vec![
        Box::new(VersionValidator),
        Box::new(NetworkValidator::new(network_id)),
        Box::new(PeerValidator::new(identity)),
    ])
}
