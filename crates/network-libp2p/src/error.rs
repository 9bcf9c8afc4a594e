//! Error types for the p2p transport.

use crate::codec::CodecError;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

/// The result for network operations.
pub type NetworkResult<T> = Result<T, NetworkError>;

/// Networking error type.
#[derive(Debug, Error)]
pub enum NetworkError {
    /// The host could not open a stream to the peer.
    #[error("failed to open stream: {0}")]
    Open(String),
    /// Opening the stream took longer than the connection timeout.
    #[error("timed out opening stream")]
    OpenTimeout,
    /// Writing the request took longer than the connection timeout.
    #[error("timed out writing request")]
    WriteTimeout,
    /// The peer did not answer within the connection timeout.
    #[error("timed out reading response")]
    ReadTimeout,
    /// The caller cancelled the exchange.
    #[error("request cancelled")]
    Cancelled,
    /// The sender failed to prepare a stream and can't be used again.
    #[error("message sender has been invalidated")]
    InvalidatedMessageSender,
    /// Framing or envelope failure, including stream IO.
    #[error(transparent)]
    Codec(#[from] CodecError),
    /// IO failure outside of framing.
    #[error(transparent)]
    Io(#[from] std::io::Error),
    /// A protocol id could not be built or parsed.
    #[error("invalid protocol: {0}")]
    InvalidProtocol(String),
    /// A discovery key or peer id did not hold an ed25519 public key.
    #[error("invalid peer key: {0}")]
    InvalidPeerKey(String),
    /// A handler is already registered for the protocol.
    #[error("protocol already registered: {0}")]
    AlreadyRegistered(String),
    /// The inbound handler failed and the stream was reset.
    #[error("handler error: {0}")]
    Handler(String),
    /// mpsc receiver dropped.
    #[error("mpsc error: {0}")]
    MpscSender(String),
    /// oneshot sender dropped.
    #[error("oneshot error: {0}")]
    AckChannelClosed(String),
}

impl NetworkError {
    /// Returns `true` if the exchange may succeed on a fresh stream.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            Self::Cancelled | Self::InvalidatedMessageSender | Self::Codec(CodecError::FrameTooLarge { .. })
        )
    }
}

impl From<oneshot::error::RecvError> for NetworkError {
    fn from(e: oneshot::error::RecvError) -> Self {
        Self::AckChannelClosed(e.to_string())
    }
}

impl<T> From<mpsc::error::SendError<T>> for NetworkError {
    fn from(e: mpsc::error::SendError<T>) -> Self {
        Self::MpscSender(e.to_string())
    }
}
