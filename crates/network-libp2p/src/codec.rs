//! Envelope codec for peer messages.
//!
//! Every frame on a stream is a varint length prefix followed by a bcs-encoded
//! [TransportEnvelope]. The transport body carries an [ApplicationEnvelope]: a [Header]
//! describing the sender and the message type plus the bcs-encoded message body.

use dn_types::{encode, ensure, try_decode};
use futures::{AsyncRead, AsyncReadExt as _, AsyncWrite, AsyncWriteExt as _};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::{fmt, str::FromStr};
use thiserror::Error;
use unsigned_varint::io::ReadError;

pub use dn_config::MESSAGE_SIZE_MAX;

#[cfg(test)]
#[path = "tests/codec_tests.rs"]
mod codec_tests;

/// The result for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;

/// Error type for codec operations.
#[derive(Debug, Error)]
pub enum CodecError {
    /// IO error during read/write.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// Frame exceeds the maximum message size.
    #[error("frame too large: {size} > {max}")]
    FrameTooLarge {
        /// Actual or declared frame size.
        size: usize,
        /// Maximum allowed size.
        max: usize,
    },
    /// The bytes are not a valid envelope.
    #[error("malformed envelope: {0}")]
    MalformedEnvelope(String),
    /// The header names a message type this node doesn't know.
    #[error("unknown message type: {0}")]
    UnknownMessageType(String),
}

impl CodecError {
    /// Returns `true` if the peer closed the stream cleanly between frames.
    pub fn is_eof(&self) -> bool {
        matches!(self, Self::Io(e) if e.kind() == std::io::ErrorKind::UnexpectedEof)
    }
}

/// The kind of message carried by an [ApplicationEnvelope].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MessageType {
    /// The responder failed to handle the request.
    Error,
    /// Placeholder for unset types.
    Invalid,
    /// Ask a collaborator to sign a document.
    RequestSignature,
    /// Signatures for a [MessageType::RequestSignature].
    RequestSignatureRep,
    /// Deliver an anchored document.
    SendAnchoredDoc,
    /// Acknowledgement for a [MessageType::SendAnchoredDoc].
    SendAnchoredDocRep,
    /// Fetch a document.
    GetDoc,
    /// The document for a [MessageType::GetDoc].
    GetDocRep,
}

impl MessageType {
    /// The name of the message type on the wire.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Error => "MessageTypeError",
            Self::Invalid => "MessageTypeInvalid",
            Self::RequestSignature => "MessageTypeRequestSignature",
            Self::RequestSignatureRep => "MessageTypeRequestSignatureRep",
            Self::SendAnchoredDoc => "MessageTypeSendAnchoredDoc",
            Self::SendAnchoredDocRep => "MessageTypeSendAnchoredDocRep",
            Self::GetDoc => "MessageTypeGetDoc",
            Self::GetDocRep => "MessageTypeGetDocRep",
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MessageType {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let message_type = match s {
            "MessageTypeError" => Self::Error,
            "MessageTypeInvalid" => Self::Invalid,
            "MessageTypeRequestSignature" => Self::RequestSignature,
            "MessageTypeRequestSignatureRep" => Self::RequestSignatureRep,
            "MessageTypeSendAnchoredDoc" => Self::SendAnchoredDoc,
            "MessageTypeSendAnchoredDocRep" => Self::SendAnchoredDocRep,
            "MessageTypeGetDoc" => Self::GetDoc,
            "MessageTypeGetDocRep" => Self::GetDocRep,
            other => return Err(CodecError::UnknownMessageType(other.to_string())),
        };
        Ok(message_type)
    }
}

/// Metadata attached to every application message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Header {
    /// Identity of the sending account.
    pub sender_id: Vec<u8>,
    /// Version of the sending node.
    pub node_version: String,
    /// Network the sender belongs to.
    pub network_identifier: u32,
    /// The kind of message in the body.
    pub message_type: MessageType,
    /// Unix timestamp (seconds) when the envelope was created.
    pub timestamp: u64,
    /// Optional signature over the envelope.
    pub signature: Option<Vec<u8>>,
}

/// Header as it is encoded on the wire. The message type travels by name.
#[derive(Serialize, Deserialize)]
struct WireHeader {
    sender_id: Vec<u8>,
    node_version: String,
    network_identifier: u32,
    message_type: String,
    timestamp: u64,
    signature: Option<Vec<u8>>,
}

/// Application envelope as it is encoded on the wire.
#[derive(Serialize, Deserialize)]
struct WireEnvelope {
    header: Option<WireHeader>,
    body: Vec<u8>,
}

impl From<&Header> for WireHeader {
    fn from(header: &Header) -> Self {
        Self {
            sender_id: header.sender_id.clone(),
            node_version: header.node_version.clone(),
            network_identifier: header.network_identifier,
            message_type: header.message_type.to_string(),
            timestamp: header.timestamp,
            signature: header.signature.clone(),
        }
    }
}

impl TryFrom<WireHeader> for Header {
    type Error = CodecError;

    fn try_from(wire: WireHeader) -> Result<Self, Self::Error> {
        Ok(Self {
            sender_id: wire.sender_id,
            node_version: wire.node_version,
            network_identifier: wire.network_identifier,
            message_type: wire.message_type.parse()?,
            timestamp: wire.timestamp,
            signature: wire.signature,
        })
    }
}

/// The outermost unit on a stream.
///
/// The transport layer never looks inside the body.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportEnvelope {
    /// The encoded [ApplicationEnvelope].
    pub body: Vec<u8>,
}

/// A typed message with its [Header].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ApplicationEnvelope {
    /// Sender metadata.
    pub header: Header,
    /// The bcs-encoded message.
    pub body: Vec<u8>,
}

impl ApplicationEnvelope {
    /// Create a new instance of Self.
    pub fn new(header: Header, body: Vec<u8>) -> Self {
        Self { header, body }
    }

    /// Create an envelope for a message that is encoded into the body.
    pub fn with_message<M: Serialize>(header: Header, message: &M) -> CodecResult<Self> {
        let body = encode(message).map_err(|e| CodecError::MalformedEnvelope(e.to_string()))?;
        Ok(Self { header, body })
    }

    /// Decode the body as a message.
    pub fn message<M: DeserializeOwned>(&self) -> CodecResult<M> {
        try_decode(&self.body).map_err(|e| {
            CodecError::MalformedEnvelope(format!(
                "{} body could not be decoded: {e}",
                self.header.message_type
            ))
        })
    }

    /// Wrap the envelope for the transport.
    pub fn to_transport(&self) -> CodecResult<TransportEnvelope> {
        let wire = WireEnvelope { header: Some((&self.header).into()), body: self.body.clone() };
        let body = encode(&wire).map_err(|e| CodecError::MalformedEnvelope(e.to_string()))?;
        Ok(TransportEnvelope { body })
    }

    /// Unwrap an envelope received from the transport.
    pub fn from_transport(envelope: &TransportEnvelope) -> CodecResult<Self> {
        ensure!(
            !envelope.body.is_empty(),
            CodecError::MalformedEnvelope("empty transport envelope".to_string())
        );
        let wire: WireEnvelope = try_decode(&envelope.body)
            .map_err(|e| CodecError::MalformedEnvelope(e.to_string()))?;
        let header = wire
            .header
            .ok_or_else(|| CodecError::MalformedEnvelope("missing header".to_string()))?;

        Ok(Self { header: header.try_into()?, body: wire.body })
    }
}

/// Frame a transport envelope: varint length followed by the encoded envelope.
pub fn encode_frame(envelope: &TransportEnvelope, max_size: usize) -> CodecResult<Vec<u8>> {
    let bytes = encode(envelope).map_err(|e| CodecError::MalformedEnvelope(e.to_string()))?;
    ensure!(bytes.len() <= max_size, CodecError::FrameTooLarge { size: bytes.len(), max: max_size });

    let mut prefix_buffer = unsigned_varint::encode::usize_buffer();
    let prefix = unsigned_varint::encode::usize(bytes.len(), &mut prefix_buffer);
    let mut frame = Vec::with_capacity(prefix.len() + bytes.len());
    frame.extend_from_slice(prefix);
    frame.extend_from_slice(&bytes);
    Ok(frame)
}

/// Parse a complete frame produced by [encode_frame].
pub fn decode_frame(frame: &[u8], max_size: usize) -> CodecResult<TransportEnvelope> {
    let (length, rest) = unsigned_varint::decode::usize(frame)
        .map_err(|e| CodecError::MalformedEnvelope(format!("invalid length prefix: {e}")))?;
    ensure!(length <= max_size, CodecError::FrameTooLarge { size: length, max: max_size });
    ensure!(
        rest.len() == length,
        CodecError::MalformedEnvelope(format!(
            "prefix declares {length} bytes but frame holds {}",
            rest.len()
        ))
    );
    try_decode(rest).map_err(|e| CodecError::MalformedEnvelope(e.to_string()))
}

/// Encode a header and body into a frame.
pub fn encode_message(header: Header, body: Vec<u8>) -> CodecResult<Vec<u8>> {
    let envelope = ApplicationEnvelope::new(header, body).to_transport()?;
    encode_frame(&envelope, MESSAGE_SIZE_MAX)
}

/// Decode a frame into its header and body.
pub fn decode_message(frame: &[u8]) -> CodecResult<(Header, Vec<u8>)> {
    let envelope = decode_frame(frame, MESSAGE_SIZE_MAX)?;
    let ApplicationEnvelope { header, body } = ApplicationEnvelope::from_transport(&envelope)?;
    Ok((header, body))
}

/// Write one framed envelope to the stream.
pub async fn write_envelope<T>(
    io: &mut T,
    envelope: &TransportEnvelope,
    max_size: usize,
) -> CodecResult<()>
where
    T: AsyncWrite + Unpin + Send,
{
    let frame = encode_frame(envelope, max_size)?;
    io.write_all(&frame).await?;
    io.flush().await?;
    Ok(())
}

/// Read one framed envelope from the stream.
///
/// The declared length is checked before any body bytes are read.
pub async fn read_envelope<T>(io: &mut T, max_size: usize) -> CodecResult<TransportEnvelope>
where
    T: AsyncRead + Unpin + Send,
{
    let length = unsigned_varint::aio::read_usize(&mut *io).await.map_err(|e| match e {
        ReadError::Io(e) => CodecError::Io(e),
        other => CodecError::MalformedEnvelope(format!("invalid length prefix: {other}")),
    })?;
    ensure!(length <= max_size, CodecError::FrameTooLarge { size: length, max: max_size });

    let mut buffer = vec![0; length];
    io.read_exact(&mut buffer).await?;
    try_decode(&buffer).map_err(|e| CodecError::MalformedEnvelope(e.to_string()))
}
