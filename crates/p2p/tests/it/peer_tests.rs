//! Peer wiring tests.

use assert_matches::assert_matches;
use dn_config::P2pConfig;
use dn_network_libp2p::{error::NetworkError, protocol::protocol_for_identity, CancellationToken};
use dn_network_types::GetDocumentRequest;
use dn_p2p::{error::P2pError, test_utils::TestNetwork};
use dn_test_utils::TestDocument;
use std::time::Duration;

#[tokio::test]
async fn test_one_protocol_per_local_account() {
    let network = TestNetwork::default();
    let node = network.spawn_node(P2pConfig::default()).unwrap();
    assert_eq!(
        node.peer.init_protocols().unwrap(),
        vec![protocol_for_identity(&node.account.id).unwrap()]
    );

    let second = node.add_account().unwrap();
    let protocols = node.peer.init_protocols().unwrap();
    assert_eq!(protocols.len(), 2);
    assert!(protocols.contains(&protocol_for_identity(&second.id).unwrap()));

    // serving the same account twice is refused
    let err = node.peer.init_protocol_for_account(&second.id).unwrap_err();
    assert_matches!(err, P2pError::Network(NetworkError::AlreadyRegistered(_)));
}

#[tokio::test]
async fn test_account_added_after_start_is_served() {
    let network = TestNetwork::default();
    let requester = network.spawn_node(P2pConfig::default()).unwrap();
    let provider = network.spawn_node(P2pConfig::default()).unwrap();
    let hosted = provider.add_account().unwrap();

    let document = TestDocument::new(hosted.id, &[requester.account.id]);
    provider.documents.insert(hosted.id, document.clone());

    let response = requester
        .peer
        .client()
        .get_document_request(
            &CancellationToken::new(),
            &requester.account.id,
            &hosted.id,
            GetDocumentRequest::requester(document.id),
        )
        .await
        .unwrap();
    assert_eq!(response.document.document_identifier, document.id);
}

#[tokio::test]
async fn test_stopped_peer_is_unreachable() {
    let network = TestNetwork::default();
    let requester = network.spawn_node(P2pConfig::default()).unwrap();
    let provider = network.spawn_node(P2pConfig::default()).unwrap();
    let document = TestDocument::new(provider.account.id, &[requester.account.id]);
    provider.documents.insert(provider.account.id, document.clone());

    provider.peer.stop();
    // let the accept loops wind down
    tokio::time::sleep(Duration::from_millis(50)).await;

    let err = requester
        .peer
        .client()
        .get_document_request(
            &CancellationToken::new(),
            &requester.account.id,
            &provider.account.id,
            GetDocumentRequest::requester(document.id),
        )
        .await
        .unwrap_err();
    assert_matches!(err, P2pError::Network(NetworkError::Open(_)));
}
