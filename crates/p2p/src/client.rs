//! Outbound requests to collaborators.
//!
//! Signature collection fans out one task per collaborator and gathers exactly one result from
//! each, in whatever order they finish. The tasks belong to the call and stop with it. Requests for accounts hosted by this node skip the
//! network and go straight to the local [RequestHandler].

use crate::{
    envelope::{prepare_envelope, resolve_response},
    error::{P2pError, P2pResult},
    handler::RequestHandler,
};
use dn_config::ConfigService;
use dn_network_libp2p::{
    codec::MessageType,
    protocol::{parse_peer_id, protocol_for_identity},
    CancellationToken, PeerId, StreamHost, StreamMessenger,
};
use dn_network_types::{
    AnchorDocumentRequest, AnchorDocumentResponse, DocumentRef, GetDocumentRequest,
    GetDocumentResponse, IdentityService, KeyPurpose, SignatureRequest, SignatureResponse,
};
use dn_types::{consensus_signature_payload, ensure, is_compatible_with_local, AccountId, Signature};
use serde::{de::DeserializeOwned, Serialize};
use std::{fmt, future::Future, sync::Arc};
use tokio::task::JoinSet;
use tracing::{debug, warn};

/// Sends requests to collaborators on behalf of local accounts.
pub struct Client<H: StreamHost> {
    /// Node configuration.
    config: Arc<dyn ConfigService>,
    /// Streams to remote peers.
    messenger: Arc<StreamMessenger<H>>,
    /// Answers requests for local accounts without the network.
    handler: Arc<RequestHandler>,
    /// Resolves discovery keys and validates signatures.
    identity: Arc<dyn IdentityService>,
}

impl<H: StreamHost> Clone for Client<H> {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            messenger: self.messenger.clone(),
            handler: self.handler.clone(),
            identity: self.identity.clone(),
        }
    }
}

impl<H: StreamHost> fmt::Debug for Client<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client").field("messenger", &self.messenger).finish_non_exhaustive()
    }
}

impl<H: StreamHost> Client<H> {
    /// Create a new instance of [Self].
    pub fn new(
        config: Arc<dyn ConfigService>,
        messenger: Arc<StreamMessenger<H>>,
        handler: Arc<RequestHandler>,
        identity: Arc<dyn IdentityService>,
    ) -> Self {
        Self { config, messenger, handler, identity }
    }

    /// Ask every collaborator of `document` except `account` to sign the current version.
    ///
    /// Returns the valid signatures and one error for each collaborator that failed. A partial
    /// result is not an error; deciding whether enough signatures were collected is up to the
    /// caller.
    pub async fn get_signatures_for_document(
        &self,
        cancel: &CancellationToken,
        account: &AccountId,
        document: DocumentRef,
    ) -> P2pResult<(Vec<Signature>, Vec<P2pError>)> {
        let signers = document.signer_collaborators(account).map_err(P2pError::document)?;
        let signing_root: Arc<[u8]> = document.signing_root().map_err(P2pError::document)?.into();
        let request = SignatureRequest { document: document.pack_core_document().map_err(P2pError::document)? };
        let timestamp = document.timestamp();

        debug!(target: "p2p::client", %account, document = %document.id(), signers = signers.len(), "requesting signatures");

        // aborted with the set if the caller stops waiting
        let mut tasks = JoinSet::new();
        for collaborator in signers {
            let client = self.clone();
            let cancel = cancel.child_token();
            let account = *account;
            let request = request.clone();
            let signing_root = signing_root.clone();

            tasks.spawn(async move {
                let result = client
                    .with_timeout(
                        collaborator,
                        client.request_signature(
                            &cancel,
                            &account,
                            &collaborator,
                            request,
                            &signing_root,
                            timestamp,
                        ),
                    )
                    .await;
                (collaborator, result)
            });
        }

        let mut signatures = Vec::new();
        let mut errors = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((_, Ok(received))) => signatures.extend(received),
                Ok((collaborator, Err(e))) => {
                    warn!(target: "p2p::client", %collaborator, %e, "failed to get signature");
                    errors.push(e);
                }
                Err(e) => {
                    warn!(target: "p2p::client", %e, "signature task failed");
                    errors.push(P2pError::TaskFailed(e.to_string()));
                }
            }
        }

        Ok((signatures, errors))
    }

    /// Request and verify the signatures of one collaborator.
    ///
    /// Signing keys must be valid at `timestamp`, the time of the document version being signed.
    async fn request_signature(
        &self,
        cancel: &CancellationToken,
        account: &AccountId,
        collaborator: &AccountId,
        request: SignatureRequest,
        signing_root: &[u8],
        timestamp: u64,
    ) -> P2pResult<Vec<Signature>> {
        let response = if self.config.is_local_account(collaborator) {
            self.handler.request_document_signature(collaborator, request, account).await?
        } else {
            self.identity.validate_account(collaborator).await.map_err(P2pError::identity)?;
            self.send_request::<_, SignatureResponse>(
                cancel,
                account,
                collaborator,
                MessageType::RequestSignature,
                &request,
                MessageType::RequestSignatureRep,
            )
            .await?
        };

        for signature in &response.signatures {
            ensure!(
                signature.signer_id == *collaborator,
                P2pError::SignerMismatch { signer: signature.signer_id, collaborator: *collaborator }
            );
            let payload = consensus_signature_payload(signing_root, signature.transition_validated);
            self.identity
                .validate_signature(
                    &signature.signer_id,
                    &signature.public_key,
                    &payload,
                    &signature.signature,
                    timestamp,
                )
                .await
                .map_err(P2pError::identity)?;
        }

        Ok(response.signatures)
    }

    /// Deliver an anchored document to `recipient`.
    ///
    /// A rejection is returned with the recipient's reason.
    pub async fn send_anchored_document(
        &self,
        cancel: &CancellationToken,
        account: &AccountId,
        recipient: &AccountId,
        request: AnchorDocumentRequest,
    ) -> P2pResult<AnchorDocumentResponse> {
        if self.config.is_local_account(recipient) {
            return self.handler.send_anchored_document(recipient, request, account).await;
        }

        self.with_timeout(
            *recipient,
            self.send_request(
                cancel,
                account,
                recipient,
                MessageType::SendAnchoredDoc,
                &request,
                MessageType::SendAnchoredDocRep,
            ),
        )
        .await
    }

    /// Fetch a document from `provider`.
    pub async fn get_document_request(
        &self,
        cancel: &CancellationToken,
        account: &AccountId,
        provider: &AccountId,
        request: GetDocumentRequest,
    ) -> P2pResult<GetDocumentResponse> {
        if self.config.is_local_account(provider) {
            return self.handler.get_document(provider, request, account).await;
        }

        self.with_timeout(
            *provider,
            self.send_request(
                cancel,
                account,
                provider,
                MessageType::GetDoc,
                &request,
                MessageType::GetDocRep,
            ),
        )
        .await
    }

    /// Send one request to the node hosting `receiver` and decode the response.
    async fn send_request<Req, Rep>(
        &self,
        cancel: &CancellationToken,
        account: &AccountId,
        receiver: &AccountId,
        message_type: MessageType,
        request: &Req,
        response_type: MessageType,
    ) -> P2pResult<Rep>
    where
        Req: Serialize,
        Rep: DeserializeOwned,
    {
        let peer = self.peer_id_for(receiver).await?;
        let envelope = prepare_envelope(Some(account), self.config.network_id(), message_type, request)?;
        let protocol = protocol_for_identity(receiver)?;

        let response = self.messenger.send_message(cancel, peer, envelope, protocol).await?;
        let (header, response) = resolve_response(&response, response_type)?;
        ensure!(
            is_compatible_with_local(&header.node_version),
            P2pError::IncompatibleVersion(header.node_version)
        );

        Ok(response)
    }

    /// The peer id of the node hosting `account`, from its latest discovery key.
    async fn peer_id_for(&self, account: &AccountId) -> P2pResult<PeerId> {
        let key = self
            .identity
            .last_key_by_purpose(account, KeyPurpose::P2pDiscovery)
            .await
            .map_err(P2pError::identity)?;
        self.identity
            .validate_key(account, &key, KeyPurpose::P2pDiscovery)
            .await
            .map_err(P2pError::identity)?;

        Ok(parse_peer_id(&key)?)
    }

    /// Bound a request to one account by the connection timeout.
    async fn with_timeout<T>(
        &self,
        account: AccountId,
        request: impl Future<Output = P2pResult<T>>,
    ) -> P2pResult<T> {
        let timeout = self.config.p2p_config().connection_timeout;
        tokio::time::timeout(timeout, request).await.map_err(|_| P2pError::Timeout(account))?
    }
}
