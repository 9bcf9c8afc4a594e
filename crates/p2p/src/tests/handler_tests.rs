//! Request handler tests

use super::*;
use crate::envelope::resolve_response;
use assert_matches::assert_matches;
use dn_config::{AccountConfig, ConfigStore, NodeConfig, P2pConfig};
use dn_network_libp2p::protocol::protocol_for_identity;
use dn_test_utils::{
    MemoryDocumentService, MemoryIdentityService, MemoryNftService, TestAccount, TestDocument,
};
use dn_types::{Document as _, DocumentId, NODE_VERSION};
use serde::Serialize;
use std::time::Duration;

const NETWORK_ID: u32 = 3;

struct Fixture {
    handler: RequestHandler,
    local: TestAccount,
    remote: TestAccount,
    documents: Arc<MemoryDocumentService>,
}

fn fixture(p2p: P2pConfig) -> Fixture {
    let local = TestAccount::generate();
    let remote = TestAccount::generate();
    let identity = Arc::new(MemoryIdentityService::new());
    identity.register(&local);
    identity.register(&remote);

    let config = Arc::new(ConfigStore::new(NodeConfig {
        network_id: NETWORK_ID,
        p2p,
        accounts: vec![AccountConfig::new(local.id)],
    }));
    let documents = Arc::new(MemoryDocumentService::new());
    documents.add_signer(&local);
    let handler =
        RequestHandler::new(config, documents.clone(), identity, Arc::new(MemoryNftService::new()));

    Fixture { handler, local, remote, documents }
}

impl Fixture {
    /// Send a request from the remote account to the local one.
    async fn handle<M: Serialize>(&self, message_type: MessageType, message: &M) -> TransportEnvelope {
        let envelope =
            prepare_envelope(Some(&self.remote.id), NETWORK_ID, message_type, message).unwrap();
        self.handle_envelope(&envelope).await
    }

    async fn handle_envelope(&self, envelope: &TransportEnvelope) -> TransportEnvelope {
        let protocol = protocol_for_identity(&self.local.id).unwrap();
        self.handler.handle_interceptor(self.remote.peer_id(), &protocol, envelope).await.unwrap()
    }
}

/// The error message of an error envelope.
fn remote_error(envelope: &TransportEnvelope) -> String {
    let err = resolve_response::<SignatureResponse>(envelope, MessageType::RequestSignatureRep)
        .unwrap_err();
    match err {
        P2pError::Remote(message) => message,
        other => panic!("expected remote error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_request_signature() {
    dn_test_utils::init_test_tracing();
    let f = fixture(P2pConfig::default());
    let document = TestDocument::new(f.remote.id, &[f.local.id]);
    let request = SignatureRequest { document: document.pack_core_document().unwrap() };

    let response = f.handle(MessageType::RequestSignature, &request).await;
    let (header, response): (_, SignatureResponse) =
        resolve_response(&response, MessageType::RequestSignatureRep).unwrap();

    assert_eq!(header.sender_id, f.local.id.to_vec());
    assert_eq!(header.network_identifier, NETWORK_ID);
    assert_eq!(header.node_version, NODE_VERSION);
    assert_eq!(response.signatures.len(), 1);
    let signature = &response.signatures[0];
    assert_eq!(signature.signer_id, f.local.id);
    assert!(signature.verify(&document.signing_root().unwrap()));
}

#[tokio::test]
async fn test_send_anchored_document() {
    let f = fixture(P2pConfig::default());
    let document = TestDocument::new(f.remote.id, &[f.local.id]);
    let request = AnchorDocumentRequest { document: document.pack_core_document().unwrap() };

    let response = f.handle(MessageType::SendAnchoredDoc, &request).await;
    let (_, response): (_, AnchorDocumentResponse) =
        resolve_response(&response, MessageType::SendAnchoredDocRep).unwrap();

    assert!(response.accepted);
    assert_eq!(f.documents.get(&f.local.id, &document.id), Some(document));
}

#[tokio::test]
async fn test_get_document() {
    let f = fixture(P2pConfig::default());
    let document = TestDocument::new(f.local.id, &[f.remote.id]);
    f.documents.insert(f.local.id, document.clone());

    let request = GetDocumentRequest::requester(document.id);
    let response = f.handle(MessageType::GetDoc, &request).await;
    let (_, response): (_, GetDocumentResponse) =
        resolve_response(&response, MessageType::GetDocRep).unwrap();
    assert_eq!(response.document.document_identifier, document.id);
    assert_eq!(response.document.current_version, document.version);

    let request = GetDocumentRequest { document_identifier: document.id, ..Default::default() };
    let response = f.handle(MessageType::GetDoc, &request).await;
    assert_eq!(remote_error(&response), "invalid access type");
}

#[tokio::test]
async fn test_nil_payload() {
    let f = fixture(P2pConfig::default());
    let response = f.handle_envelope(&TransportEnvelope::default()).await;

    assert_eq!(remote_error(&response), "nil payload provided");
    let response = ApplicationEnvelope::from_transport(&response).unwrap();
    assert_eq!(response.header.message_type, MessageType::Error);
    assert_eq!(response.header.sender_id, f.local.id.to_vec());
}

#[tokio::test]
async fn test_malformed_envelope() {
    let f = fixture(P2pConfig::default());
    let response = f.handle_envelope(&TransportEnvelope { body: vec![0xff; 3] }).await;
    assert!(remote_error(&response).starts_with("malformed envelope"));
}

#[tokio::test]
async fn test_protocol_for_unknown_account() {
    let f = fixture(P2pConfig::default());
    let envelope =
        prepare_envelope(Some(&f.remote.id), NETWORK_ID, MessageType::GetDoc, &()).unwrap();
    let protocol = protocol_for_identity(&f.remote.id).unwrap();

    let response =
        f.handler.handle_interceptor(f.remote.peer_id(), &protocol, &envelope).await.unwrap();
    assert!(remote_error(&response).contains("not hosted by this node"));

    // no local account to answer as
    let response = ApplicationEnvelope::from_transport(&response).unwrap();
    assert!(response.header.sender_id.is_empty());
}

#[tokio::test]
async fn test_invalid_sender_id() {
    let f = fixture(P2pConfig::default());
    let envelope = prepare_envelope(None, NETWORK_ID, MessageType::GetDoc, &()).unwrap();

    let response = f.handle_envelope(&envelope).await;
    assert!(remote_error(&response).starts_with("invalid sender id"));
}

#[tokio::test]
async fn test_validation_failure() {
    let f = fixture(P2pConfig::default());
    let request = GetDocumentRequest::requester(DocumentId::new([1; 32]));
    let envelope =
        prepare_envelope(Some(&f.remote.id), NETWORK_ID + 1, MessageType::GetDoc, &request).unwrap();

    let response = f.handle_envelope(&envelope).await;
    let message = remote_error(&response);
    assert!(message.starts_with("validation failed"));
    assert!(message.contains("network mismatch"));
}

#[tokio::test]
async fn test_unsupported_message_type() {
    let f = fixture(P2pConfig::default());
    let response = f.handle(MessageType::GetDocRep, &GetDocumentResponse::default()).await;
    assert_eq!(remote_error(&response), "message type MessageTypeGetDocRep not found");
}

#[tokio::test]
async fn test_document_service_error_is_reported() {
    let f = fixture(P2pConfig::default());
    f.documents.refuse_to_sign(f.local.id);
    let document = TestDocument::new(f.remote.id, &[f.local.id]);
    let request = SignatureRequest { document: document.pack_core_document().unwrap() };

    let response = f.handle(MessageType::RequestSignature, &request).await;
    assert_eq!(remote_error(&response), "document validation failed");
}

#[tokio::test]
async fn test_response_delay_applies_to_errors() {
    let delay = Duration::from_millis(150);
    let f = fixture(P2pConfig { response_delay: delay, ..Default::default() });

    let start = std::time::Instant::now();
    let response = f.handle_envelope(&TransportEnvelope::default()).await;
    assert!(start.elapsed() >= delay);
    assert_eq!(remote_error(&response), "nil payload provided");

    let document = TestDocument::new(f.remote.id, &[f.local.id]);
    let request = SignatureRequest { document: document.pack_core_document().unwrap() };
    let start = std::time::Instant::now();
    f.handle(MessageType::RequestSignature, &request).await;
    assert!(start.elapsed() >= delay);
}

#[tokio::test]
async fn test_message_handler_always_responds() {
    let f = fixture(P2pConfig::default());
    let protocol = protocol_for_identity(&f.local.id).unwrap();

    let response = f
        .handler
        .handle_message(f.remote.peer_id(), protocol, TransportEnvelope::default())
        .await
        .unwrap();
    assert_matches!(response, Some(envelope) if remote_error(&envelope) == "nil payload provided");
}
