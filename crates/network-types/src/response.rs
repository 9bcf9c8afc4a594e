//! Response message types
use dn_types::{CoreDocument, Signature};
use serde::{Deserialize, Serialize};

/// Signatures produced by a collaborator.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureResponse {
    /// The collaborator's signatures over the requested version.
    pub signatures: Vec<Signature>,
}

/// Acknowledgement for an anchored document.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnchorDocumentResponse {
    /// Whether the collaborator stored the document.
    pub accepted: bool,
}

/// The requested document.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetDocumentResponse {
    /// The packed current version.
    pub document: CoreDocument,
}

/// A failure reported by the responding peer.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Coarse error class.
    pub code: u32,
    /// Human readable reason, surfaced verbatim to the requester.
    pub message: String,
}

impl ErrorResponse {
    /// Code for failures while handling a request.
    pub const CODE_INTERNAL: u32 = 500;

    /// Create an internal error response.
    pub fn internal(message: impl Into<String>) -> Self {
        Self { code: Self::CODE_INTERNAL, message: message.into() }
    }
}
