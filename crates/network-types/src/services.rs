//! Collaborator services the messaging layer depends on.
//!
//! These services own documents, identities and NFT registries. The messaging layer only
//! calls them through these traits.

use async_trait::async_trait;
use dn_types::{AccountId, CoreDocument, Document, DocumentId, Signature};
use std::{fmt, sync::Arc};

/// Shared document handle.
pub type DocumentRef = Arc<dyn Document>;

/// Document storage and processing.
#[async_trait]
pub trait DocumentService: Send + Sync + 'static {
    /// Build a document model from its packed wire form.
    async fn derive_from_core_document(&self, document: CoreDocument) -> eyre::Result<DocumentRef>;

    /// Validate a document on behalf of `account` and sign it.
    ///
    /// `collaborator` is the account that asked for the signature.
    async fn request_document_signature(
        &self,
        account: &AccountId,
        document: DocumentRef,
        collaborator: &AccountId,
    ) -> eyre::Result<Vec<Signature>>;

    /// Validate and store an anchored document for `account`.
    async fn receive_anchored_document(
        &self,
        account: &AccountId,
        document: DocumentRef,
        collaborator: &AccountId,
    ) -> eyre::Result<()>;

    /// The latest version of a document stored for `account`.
    async fn get_current_version(
        &self,
        account: &AccountId,
        document_id: &DocumentId,
    ) -> eyre::Result<DocumentRef>;
}

/// What a registered key may be used for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum KeyPurpose {
    /// Peer discovery and transport authentication.
    P2pDiscovery,
    /// Document signing.
    Signing,
}

impl fmt::Display for KeyPurpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::P2pDiscovery => f.write_str("p2p discovery"),
            Self::Signing => f.write_str("signing"),
        }
    }
}

/// Identity registry lookups.
#[async_trait]
pub trait IdentityService: Send + Sync + 'static {
    /// The most recent key registered by `account` for `purpose`.
    async fn last_key_by_purpose(
        &self,
        account: &AccountId,
        purpose: KeyPurpose,
    ) -> eyre::Result<Vec<u8>>;

    /// Check that `key` is a valid key of `account` for `purpose`.
    async fn validate_key(
        &self,
        account: &AccountId,
        key: &[u8],
        purpose: KeyPurpose,
    ) -> eyre::Result<()>;

    /// Check that the account exists.
    async fn validate_account(&self, account: &AccountId) -> eyre::Result<()>;

    /// Check that `signature` over `payload` was produced by a signing key of `signer` that was
    /// valid at `timestamp`.
    async fn validate_signature(
        &self,
        signer: &AccountId,
        public_key: &[u8],
        payload: &[u8],
        signature: &[u8],
        timestamp: u64,
    ) -> eyre::Result<()>;
}

/// NFT registry lookups.
#[async_trait]
pub trait NftService: Send + Sync + 'static {
    /// The current owner of a token.
    async fn owner_of(&self, collection: &[u8], item: &[u8]) -> eyre::Result<AccountId>;
}
