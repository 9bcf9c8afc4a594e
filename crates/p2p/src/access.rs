//! Read access checks for document requests.

use dn_network_types::{AccessType, DocumentRef, DocumentService, GetDocumentRequest, NftService};
use dn_types::AccountId;
use std::{fmt, sync::Arc};
use thiserror::Error;
use tracing::debug;

#[cfg(test)]
#[path = "tests/access_tests.rs"]
mod access_tests;

/// Reasons a document request is refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccessError {
    /// The requester may not read the document.
    #[error("requester does not have access")]
    AccessDenied,
    /// The request names no supported access type.
    #[error("invalid access type")]
    InvalidAccessType,
    /// The document holding the access token could not be loaded.
    #[error("failed to load delegating document: {0}")]
    DelegatingDocument(String),
}

/// Decides whether a requester may read a document.
#[derive(Clone)]
pub struct AccessValidator {
    /// Loads delegating documents for access tokens.
    documents: Arc<dyn DocumentService>,
    /// Resolves NFT owners.
    nfts: Arc<dyn NftService>,
}

impl fmt::Debug for AccessValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessValidator").finish_non_exhaustive()
    }
}

impl AccessValidator {
    /// Create a new instance of [Self].
    pub fn new(documents: Arc<dyn DocumentService>, nfts: Arc<dyn NftService>) -> Self {
        Self { documents, nfts }
    }

    /// Check that `requester` may read `document`, stored for `account`, the way `request` asks.
    pub async fn validate(
        &self,
        account: &AccountId,
        document: &DocumentRef,
        request: &GetDocumentRequest,
        requester: &AccountId,
    ) -> Result<(), AccessError> {
        match request.access_type {
            AccessType::RequesterVerification => {
                if !document.account_can_read(requester) {
                    return Err(AccessError::AccessDenied);
                }
            }
            AccessType::NftOwnerVerification => {
                let nft = request.nft.as_ref().ok_or(AccessError::AccessDenied)?;
                if !document.nft_grants_read(nft) {
                    return Err(AccessError::AccessDenied);
                }
                let owner = self.nfts.owner_of(&nft.collection, &nft.item).await.map_err(|e| {
                    debug!(target: "p2p::access", ?e, "nft owner lookup failed");
                    AccessError::AccessDenied
                })?;
                if owner != *requester {
                    return Err(AccessError::AccessDenied);
                }
            }
            AccessType::AccessTokenVerification => {
                let token = request.access_token_id.as_ref().ok_or(AccessError::AccessDenied)?;
                let delegating = request
                    .delegating_document_identifier
                    .as_ref()
                    .ok_or(AccessError::AccessDenied)?;
                let delegating = self
                    .documents
                    .get_current_version(account, delegating)
                    .await
                    .map_err(|e| AccessError::DelegatingDocument(e.to_string()))?;
                delegating
                    .at_grantee_can_read(token, &request.document_identifier, requester)
                    .map_err(|e| {
                        debug!(target: "p2p::access", ?e, "access token rejected");
                        AccessError::AccessDenied
                    })?;
            }
            AccessType::Invalid => return Err(AccessError::InvalidAccessType),
        }
        Ok(())
    }
}
