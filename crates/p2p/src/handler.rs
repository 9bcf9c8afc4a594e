//! Answers requests addressed to accounts hosted by this node.
//!
//! Every inbound request is validated, dispatched by message type and answered with a new
//! envelope. Failures are answered with an error envelope so the stream stays usable.

use crate::{
    access::AccessValidator,
    envelope::{error_envelope, prepare_envelope},
    error::{P2pError, P2pResult},
    validator::{handshake_validator, ValidatorGroup},
};
use async_trait::async_trait;
use dn_config::ConfigService;
use dn_network_libp2p::{
    codec::{ApplicationEnvelope, MessageType, TransportEnvelope},
    error::{NetworkError, NetworkResult},
    protocol::extract_identity,
    MessageHandler, PeerId, StreamProtocol,
};
use dn_network_types::{
    AnchorDocumentRequest, AnchorDocumentResponse, DocumentService, GetDocumentRequest,
    GetDocumentResponse, IdentityService, NftService, SignatureRequest, SignatureResponse,
};
use dn_types::{ensure, AccountId};
use std::{fmt, sync::Arc};
use tokio::time::Instant;
use tracing::{debug, trace, warn};

#[cfg(test)]
#[path = "tests/handler_tests.rs"]
mod handler_tests;

/// Handles inbound requests for local accounts.
pub struct RequestHandler {
    /// Node configuration: hosted accounts, network id and response delay.
    config: Arc<dyn ConfigService>,
    /// Document storage.
    documents: Arc<dyn DocumentService>,
    /// Read access checks for document requests.
    access: AccessValidator,
    /// Header checks for every request.
    validator: ValidatorGroup,
}

impl fmt::Debug for RequestHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestHandler")
            .field("network_id", &self.config.network_id())
            .field("validator", &self.validator)
            .finish_non_exhaustive()
    }
}

impl RequestHandler {
    /// Create a new instance of [Self] with the handshake validators.
    pub fn new(
        config: Arc<dyn ConfigService>,
        documents: Arc<dyn DocumentService>,
        identity: Arc<dyn IdentityService>,
        nfts: Arc<dyn NftService>,
    ) -> Self {
        let validator = handshake_validator(config.network_id(), identity);
        let access = AccessValidator::new(documents.clone(), nfts);
        Self { config, documents, access, validator }
    }

    /// Answer one request that arrived from `peer` on `protocol`.
    ///
    /// Always produces a response envelope. Errors are reported to the peer in an
    /// [MessageType::Error] envelope. The response is held back until the configured response
    /// delay has passed since the request arrived.
    pub async fn handle_interceptor(
        &self,
        peer: PeerId,
        protocol: &StreamProtocol,
        envelope: &TransportEnvelope,
    ) -> P2pResult<TransportEnvelope> {
        let start = Instant::now();
        let network_id = self.config.network_id();

        let (account, result) = match self.local_account(protocol) {
            Ok(account) => {
                let result = self.dispatch(peer, &account, envelope).await;
                (Some(account), result)
            }
            Err(e) => (None, Err(e)),
        };

        let response = match result {
            Ok(response) => Ok(response),
            Err(e) => {
                warn!(target: "p2p::handler", ?peer, %protocol, %e, "request failed");
                error_envelope(account.as_ref(), network_id, &e)
            }
        };

        let delay = self.config.p2p_config().response_delay;
        if !delay.is_zero() {
            tokio::time::sleep_until(start + delay).await;
        }
        response
    }

    /// The local account a protocol belongs to.
    fn local_account(&self, protocol: &StreamProtocol) -> P2pResult<AccountId> {
        let account = extract_identity(protocol)?;
        self.config.account(&account).map_err(P2pError::identity)?;
        Ok(account)
    }

    /// Decode, validate and answer a request for `account`.
    async fn dispatch(
        &self,
        peer: PeerId,
        account: &AccountId,
        envelope: &TransportEnvelope,
    ) -> P2pResult<TransportEnvelope> {
        ensure!(!envelope.body.is_empty(), P2pError::NilPayload);
        let request = ApplicationEnvelope::from_transport(envelope)?;
        let sender = AccountId::try_from_slice(&request.header.sender_id)
            .map_err(|e| P2pError::InvalidSender(e.to_string()))?;
        self.validator.validate(&request.header, &sender, &peer).await?;

        let message_type = request.header.message_type;
        trace!(target: "p2p::handler", ?peer, %account, %sender, %message_type, "handling request");
        let network_id = self.config.network_id();

        match message_type {
            MessageType::RequestSignature => {
                let response =
                    self.request_document_signature(account, request.message()?, &sender).await?;
                prepare_envelope(Some(account), network_id, MessageType::RequestSignatureRep, &response)
            }
            MessageType::SendAnchoredDoc => {
                let response =
                    self.send_anchored_document(account, request.message()?, &sender).await?;
                prepare_envelope(Some(account), network_id, MessageType::SendAnchoredDocRep, &response)
            }
            MessageType::GetDoc => {
                let response = self.get_document(account, request.message()?, &sender).await?;
                prepare_envelope(Some(account), network_id, MessageType::GetDocRep, &response)
            }
            MessageType::Error
            | MessageType::Invalid
            | MessageType::RequestSignatureRep
            | MessageType::SendAnchoredDocRep
            | MessageType::GetDocRep => Err(P2pError::UnsupportedMessageType(message_type)),
        }
    }

    /// Sign a document on behalf of `account` at the request of `collaborator`.
    pub async fn request_document_signature(
        &self,
        account: &AccountId,
        request: SignatureRequest,
        collaborator: &AccountId,
    ) -> P2pResult<SignatureResponse> {
        let document = self
            .documents
            .derive_from_core_document(request.document)
            .await
            .map_err(P2pError::document)?;
        let signatures = self
            .documents
            .request_document_signature(account, document, collaborator)
            .await
            .map_err(P2pError::document)?;

        debug!(target: "p2p::handler", %account, %collaborator, signatures = signatures.len(), "signed document");
        Ok(SignatureResponse { signatures })
    }

    /// Store an anchored document for `account` sent by `collaborator`.
    pub async fn send_anchored_document(
        &self,
        account: &AccountId,
        request: AnchorDocumentRequest,
        collaborator: &AccountId,
    ) -> P2pResult<AnchorDocumentResponse> {
        let document = self
            .documents
            .derive_from_core_document(request.document)
            .await
            .map_err(P2pError::document)?;
        self.documents
            .receive_anchored_document(account, document, collaborator)
            .await
            .map_err(P2pError::document)?;

        Ok(AnchorDocumentResponse { accepted: true })
    }

    /// Return the current version of a document stored for `account` if `requester` may read it.
    pub async fn get_document(
        &self,
        account: &AccountId,
        request: GetDocumentRequest,
        requester: &AccountId,
    ) -> P2pResult<GetDocumentResponse> {
        let document = self
            .documents
            .get_current_version(account, &request.document_identifier)
            .await
            .map_err(P2pError::document)?;
        self.access.validate(account, &document, &request, requester).await?;
        let document = document.pack_core_document().map_err(P2pError::document)?;

        Ok(GetDocumentResponse { document })
    }
}

#[async_trait]
impl MessageHandler for RequestHandler {
    async fn handle_message(
        &self,
        peer: PeerId,
        protocol: StreamProtocol,
        envelope: TransportEnvelope,
    ) -> NetworkResult<Option<TransportEnvelope>> {
        self.handle_interceptor(peer, &protocol, &envelope)
            .await
            .map(Some)
            .map_err(|e| NetworkError::Handler(e.to_string()))
    }
}
