//! Request message types
use dn_types::{CoreDocument, DocumentId, NftId};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use thiserror::Error;

/// Ask a collaborator to sign a document version.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureRequest {
    /// The packed document to sign.
    pub document: CoreDocument,
}

/// Deliver an anchored document to a collaborator.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnchorDocumentRequest {
    /// The packed anchored document.
    pub document: CoreDocument,
}

/// How a requester proves it may read a document.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AccessType {
    /// Unset or unrecognized.
    #[default]
    Invalid,
    /// The requester is a collaborator on the document.
    RequesterVerification,
    /// The requester owns an NFT referenced by the document's read rules.
    NftOwnerVerification,
    /// The requester holds an access token issued on a delegating document.
    AccessTokenVerification,
}

impl AccessType {
    /// The canonical name of the access type.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Invalid => "ACCESS_TYPE_INVALID",
            Self::RequesterVerification => "ACCESS_TYPE_REQUESTER_VERIFICATION",
            Self::NftOwnerVerification => "ACCESS_TYPE_NFT_OWNER_VERIFICATION",
            Self::AccessTokenVerification => "ACCESS_TYPE_ACCESS_TOKEN_VERIFICATION",
        }
    }
}

impl fmt::Display for AccessType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error parsing an [AccessType].
#[derive(Debug, Error)]
#[error("unknown access type: {0}")]
pub struct UnknownAccessType(pub String);

impl FromStr for AccessType {
    type Err = UnknownAccessType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ACCESS_TYPE_INVALID" => Ok(Self::Invalid),
            "ACCESS_TYPE_REQUESTER_VERIFICATION" => Ok(Self::RequesterVerification),
            "ACCESS_TYPE_NFT_OWNER_VERIFICATION" => Ok(Self::NftOwnerVerification),
            "ACCESS_TYPE_ACCESS_TOKEN_VERIFICATION" => Ok(Self::AccessTokenVerification),
            other => Err(UnknownAccessType(other.to_string())),
        }
    }
}

/// Fetch the current version of a document.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetDocumentRequest {
    /// The requested document.
    pub document_identifier: DocumentId,
    /// How the requester proves read access.
    pub access_type: AccessType,
    /// The NFT presented for [AccessType::NftOwnerVerification].
    pub nft: Option<NftId>,
    /// The access token presented for [AccessType::AccessTokenVerification].
    pub access_token_id: Option<Vec<u8>>,
    /// The document that issued the access token.
    pub delegating_document_identifier: Option<DocumentId>,
}

impl GetDocumentRequest {
    /// Request a document as one of its collaborators.
    pub fn requester(document_identifier: DocumentId) -> Self {
        Self {
            document_identifier,
            access_type: AccessType::RequesterVerification,
            ..Default::default()
        }
    }

    /// Request a document as the owner of an NFT.
    pub fn nft_owner(document_identifier: DocumentId, nft: NftId) -> Self {
        Self {
            document_identifier,
            access_type: AccessType::NftOwnerVerification,
            nft: Some(nft),
            ..Default::default()
        }
    }

    /// Request a document with an access token issued on a delegating document.
    pub fn access_token(
        document_identifier: DocumentId,
        delegating_document_identifier: DocumentId,
        access_token_id: Vec<u8>,
    ) -> Self {
        Self {
            document_identifier,
            access_type: AccessType::AccessTokenVerification,
            access_token_id: Some(access_token_id),
            delegating_document_identifier: Some(delegating_document_identifier),
            ..Default::default()
        }
    }
}
