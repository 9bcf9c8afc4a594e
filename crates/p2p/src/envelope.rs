//! Building and reading application envelopes.

use crate::error::{P2pError, P2pResult};
use dn_network_libp2p::codec::{ApplicationEnvelope, Header, MessageType, TransportEnvelope};
use dn_network_types::ErrorResponse;
use dn_types::{AccountId, NODE_VERSION};
use serde::{de::DeserializeOwned, Serialize};
use std::{fmt, time::SystemTime};

/// Unix timestamp in seconds.
fn now() -> u64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

/// Wrap a message in an envelope from `sender`.
///
/// The header carries this node's version and network id.
pub fn prepare_envelope<M: Serialize>(
    sender: Option<&AccountId>,
    network_id: u32,
    message_type: MessageType,
    message: &M,
) -> P2pResult<TransportEnvelope> {
    let header = Header {
        sender_id: sender.map(AccountId::to_vec).unwrap_or_default(),
        node_version: NODE_VERSION.to_string(),
        network_identifier: network_id,
        message_type,
        timestamp: now(),
        signature: None,
    };
    Ok(ApplicationEnvelope::with_message(header, message)?.to_transport()?)
}

/// Wrap an error in an [MessageType::Error] envelope.
pub fn error_envelope(
    sender: Option<&AccountId>,
    network_id: u32,
    error: &impl fmt::Display,
) -> P2pResult<TransportEnvelope> {
    prepare_envelope(sender, network_id, MessageType::Error, &ErrorResponse::internal(error.to_string()))
}

/// Turn an error envelope into the error the peer reported.
pub fn convert_client_error(envelope: &ApplicationEnvelope) -> P2pError {
    match envelope.message::<ErrorResponse>() {
        Ok(response) => P2pError::Remote(response.message),
        Err(e) => e.into(),
    }
}

/// Decode a response envelope, raising remote errors and unexpected message types.
pub fn resolve_response<M: DeserializeOwned>(
    envelope: &TransportEnvelope,
    expected: MessageType,
) -> P2pResult<(Header, M)> {
    let response = ApplicationEnvelope::from_transport(envelope)?;
    match response.header.message_type {
        MessageType::Error => Err(convert_client_error(&response)),
        message_type if message_type == expected => {
            let message = response.message()?;
            Ok((response.header, message))
        }
        message_type => Err(P2pError::IncorrectResponseMessageType(message_type)),
    }
}
