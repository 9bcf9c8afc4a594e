//! Error types for consensus messaging.

use crate::{access::AccessError, validator::ValidationErrors};
use dn_network_libp2p::{
    codec::{CodecError, MessageType},
    error::NetworkError,
};
use dn_types::{AccountId, TypesError};
use thiserror::Error;

/// Result alias for results that possibly return [`P2pError`].
pub type P2pResult<T> = Result<T, P2pError>;

/// Errors while sending or handling peer requests.
#[derive(Debug, Error)]
pub enum P2pError {
    /// Transport failure.
    #[error(transparent)]
    Network(#[from] NetworkError),
    /// Envelope failure.
    #[error(transparent)]
    Codec(#[from] CodecError),
    /// The request header failed validation.
    #[error(transparent)]
    Validation(#[from] ValidationErrors),
    /// The requester may not read the document.
    #[error(transparent)]
    Access(#[from] AccessError),
    /// Identifier or version error.
    #[error(transparent)]
    Types(#[from] TypesError),
    /// The request carried no payload.
    #[error("nil payload provided")]
    NilPayload,
    /// The header's sender id is not an account identity.
    #[error("invalid sender id: {0}")]
    InvalidSender(String),
    /// The node has no handler for the message type.
    #[error("message type {0} not found")]
    UnsupportedMessageType(MessageType),
    /// The peer answered with a different message type than expected.
    #[error("incorrect response message type {0}")]
    IncorrectResponseMessageType(MessageType),
    /// The peer runs an incompatible node version.
    #[error("incompatible node version: {0}")]
    IncompatibleVersion(String),
    /// A signature was produced by an account other than the collaborator asked.
    #[error("signature signer {signer} does not match collaborator {collaborator}")]
    SignerMismatch { signer: AccountId, collaborator: AccountId },
    /// The peer reported an error. The message is the peer's reason.
    #[error("{0}")]
    Remote(String),
    /// The document service rejected the request.
    #[error("{0}")]
    Document(String),
    /// The identity service rejected the request.
    #[error("{0}")]
    Identity(String),
    /// A request task panicked or was aborted.
    #[error("request task failed: {0}")]
    TaskFailed(String),
    /// The request for an account did not finish in time.
    #[error("timed out waiting for {0}")]
    Timeout(AccountId),
}

impl P2pError {
    /// Wrap a document service failure.
    pub(crate) fn document(e: eyre::Report) -> Self {
        Self::Document(e.to_string())
    }

    /// Wrap an identity service failure.
    pub(crate) fn identity(e: eyre::Report) -> Self {
        Self::Identity(e.to_string())
    }
}
