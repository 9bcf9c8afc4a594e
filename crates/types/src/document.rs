//! The document seam used by the messaging layer.
//!
//! Documents are owned by the document service. The messaging layer only needs to know who
//! signs a document, what root they sign and how to ship the document to a peer.

use crate::{AccountId, DocumentId, Signature};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The packed form of a document as it travels between peers.
///
/// The payload is opaque to the messaging layer and only interpreted by the document service.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoreDocument {
    /// The document identifier shared by every version.
    pub document_identifier: DocumentId,
    /// The identifier of this version.
    pub current_version: DocumentId,
    /// The serialized document model.
    pub payload: Vec<u8>,
    /// Signatures collected for this version so far.
    pub signatures: Vec<Signature>,
}

/// Identifies one token in an NFT registry.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NftId {
    /// The registry (collection) the token belongs to.
    pub collection: Vec<u8>,
    /// The token within the registry.
    pub item: Vec<u8>,
}

/// A document model as seen by the messaging layer.
pub trait Document: Send + Sync + fmt::Debug {
    /// The document identifier.
    fn id(&self) -> DocumentId;

    /// The identifier of the current version.
    fn current_version(&self) -> DocumentId;

    /// Collaborators that must sign the current version, excluding `exclude`.
    fn signer_collaborators(&self, exclude: &AccountId) -> eyre::Result<Vec<AccountId>>;

    /// The root collaborators sign over.
    fn signing_root(&self) -> eyre::Result<Vec<u8>>;

    /// Unix timestamp (seconds) of the current version.
    fn timestamp(&self) -> u64;

    /// Pack the document for the wire.
    fn pack_core_document(&self) -> eyre::Result<CoreDocument>;

    /// Returns `true` if the account is allowed to read the document.
    fn account_can_read(&self, account: &AccountId) -> bool;

    /// Returns `true` if the document's read rules grant access to holders of the NFT.
    fn nft_grants_read(&self, nft: &NftId) -> bool;

    /// Check that an access token issued on this document lets `grantee` read `document`.
    fn at_grantee_can_read(
        &self,
        token_id: &[u8],
        document: &DocumentId,
        grantee: &AccountId,
    ) -> eyre::Result<()>;
}
