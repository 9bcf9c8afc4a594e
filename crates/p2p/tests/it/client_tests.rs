//! Client tests over an in-memory network.

use assert_matches::assert_matches;
use dn_config::P2pConfig;
use dn_network_libp2p::{error::NetworkError, CancellationToken};
use dn_network_types::{AnchorDocumentRequest, DocumentRef, GetDocumentRequest};
use dn_p2p::{error::P2pError, test_utils::TestNetwork};
use dn_test_utils::{TestAccessToken, TestAccount, TestDocument};
use dn_types::{Document as _, NftId};
use std::{collections::HashSet, sync::Arc, time::Duration};

fn config() -> P2pConfig {
    P2pConfig { connection_timeout: Duration::from_secs(5), ..Default::default() }
}

#[tokio::test]
async fn test_collect_signatures_from_collaborators() {
    dn_test_utils::init_test_tracing();
    let network = TestNetwork::default();
    let author = network.spawn_node(config()).unwrap();
    let first = network.spawn_node(config()).unwrap();
    let second = network.spawn_node(config()).unwrap();

    let document = TestDocument::new(author.account.id, &[first.account.id, second.account.id]);
    let root = document.signing_root().unwrap();
    let (signatures, errors) = author
        .peer
        .client()
        .get_signatures_for_document(&CancellationToken::new(), &author.account.id, Arc::new(document))
        .await
        .unwrap();

    assert!(errors.is_empty(), "{errors:?}");
    let signers: HashSet<_> = signatures.iter().map(|s| s.signer_id).collect();
    assert_eq!(signers, HashSet::from([first.account.id, second.account.id]));
    assert!(signatures.iter().all(|s| s.verify(&root)));

    // one stream per collaborator
    assert_eq!(author.peer.messenger().sender_count(), 2);
}

#[tokio::test]
async fn test_partial_failure_is_returned() {
    let network = TestNetwork::default();
    let author = network.spawn_node(config()).unwrap();
    let signer = network.spawn_node(config()).unwrap();
    let refuser = network.spawn_node(config()).unwrap();
    refuser.documents.refuse_to_sign(refuser.account.id);

    // registered but not running a node
    let offline = TestAccount::generate();
    network.identity().register(&offline);
    // not registered at all
    let unknown = TestAccount::generate();

    let document = TestDocument::new(
        author.account.id,
        &[signer.account.id, refuser.account.id, offline.id, unknown.id],
    );
    let (signatures, errors) = author
        .peer
        .client()
        .get_signatures_for_document(&CancellationToken::new(), &author.account.id, Arc::new(document))
        .await
        .unwrap();

    assert_eq!(signatures.len(), 1);
    assert_eq!(signatures[0].signer_id, signer.account.id);
    assert_eq!(errors.len(), 3);
    assert!(errors
        .iter()
        .any(|e| matches!(e, P2pError::Remote(msg) if msg == "document validation failed")));
    assert!(errors.iter().any(|e| matches!(e, P2pError::Network(NetworkError::Open(_)))));
    assert!(errors.iter().any(|e| matches!(e, P2pError::Identity(_))));
}

#[tokio::test]
async fn test_slow_collaborator_times_out() {
    let network = TestNetwork::default();
    let author = network
        .spawn_node(P2pConfig { connection_timeout: Duration::from_millis(300), ..Default::default() })
        .unwrap();
    let slow = network
        .spawn_node(P2pConfig { response_delay: Duration::from_secs(3), ..config() })
        .unwrap();
    let fast = network.spawn_node(config()).unwrap();

    let document = TestDocument::new(author.account.id, &[slow.account.id, fast.account.id]);
    let start = std::time::Instant::now();
    let (signatures, errors) = author
        .peer
        .client()
        .get_signatures_for_document(&CancellationToken::new(), &author.account.id, Arc::new(document))
        .await
        .unwrap();

    assert!(start.elapsed() < Duration::from_secs(3));
    assert_eq!(signatures.len(), 1);
    assert_eq!(signatures[0].signer_id, fast.account.id);
    assert_matches!(errors.as_slice(), [P2pError::Timeout(id)] if *id == slow.account.id);
}

#[tokio::test]
async fn test_cancelled_collection() {
    let network = TestNetwork::default();
    let author = network.spawn_node(config()).unwrap();
    let slow = network
        .spawn_node(P2pConfig { response_delay: Duration::from_secs(3), ..config() })
        .unwrap();

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        trigger.cancel();
    });

    let document = TestDocument::new(author.account.id, &[slow.account.id]);
    let (signatures, errors) = author
        .peer
        .client()
        .get_signatures_for_document(&cancel, &author.account.id, Arc::new(document))
        .await
        .unwrap();

    assert!(signatures.is_empty());
    assert_matches!(errors.as_slice(), [P2pError::Network(NetworkError::Cancelled)]);
}

#[tokio::test]
async fn test_local_collaborator_skips_network() {
    let network = TestNetwork::default();
    let node = network.spawn_node(config()).unwrap();
    let local = node.add_account().unwrap();

    let document: DocumentRef = Arc::new(TestDocument::new(node.account.id, &[local.id]));
    let (signatures, errors) = node
        .peer
        .client()
        .get_signatures_for_document(&CancellationToken::new(), &node.account.id, document)
        .await
        .unwrap();

    assert!(errors.is_empty(), "{errors:?}");
    assert_eq!(signatures.len(), 1);
    assert_eq!(signatures[0].signer_id, local.id);
    assert_eq!(node.peer.messenger().sender_count(), 0);
    assert_eq!(node.host.faults().opens(), 0);
}

#[tokio::test]
async fn test_signatures_validated_at_document_time() {
    let network = TestNetwork::default();
    let author = network.spawn_node(config()).unwrap();
    let first = network.spawn_node(config()).unwrap();
    let second = network.spawn_node(config()).unwrap();

    let mut document = TestDocument::new(author.account.id, &[first.account.id, second.account.id]);
    document.timestamp = 1_000;
    let (signatures, errors) = author
        .peer
        .client()
        .get_signatures_for_document(&CancellationToken::new(), &author.account.id, Arc::new(document))
        .await
        .unwrap();

    assert!(errors.is_empty(), "{errors:?}");
    assert_eq!(signatures.len(), 2);
    // signers stamp with their own clock, keys are checked at the document's time
    assert!(signatures.iter().all(|s| s.timestamp != 1_000));
    assert_eq!(network.identity().signature_timestamps(), vec![1_000, 1_000]);
}

#[tokio::test]
async fn test_remote_collaborator_account_validated() {
    let network = TestNetwork::default();
    let author = network.spawn_node(config()).unwrap();
    let remote = network.spawn_node(config()).unwrap();
    let local = author.add_account().unwrap();

    let document = TestDocument::new(author.account.id, &[remote.account.id, local.id]);
    let (signatures, errors) = author
        .peer
        .client()
        .get_signatures_for_document(&CancellationToken::new(), &author.account.id, Arc::new(document))
        .await
        .unwrap();

    assert!(errors.is_empty(), "{errors:?}");
    assert_eq!(signatures.len(), 2);
    assert_eq!(network.identity().validated_accounts(), vec![remote.account.id]);
}

#[tokio::test]
async fn test_dropped_collection_stops_requests() {
    let network = TestNetwork::default();
    let author = network.spawn_node(config()).unwrap();
    let slow = network
        .spawn_node(P2pConfig { response_delay: Duration::from_secs(3), ..config() })
        .unwrap();
    let baseline = Arc::strong_count(author.peer.messenger());

    let document = TestDocument::new(author.account.id, &[slow.account.id]);
    let cancel = CancellationToken::new();
    let collection = author.peer.client().get_signatures_for_document(
        &cancel,
        &author.account.id,
        Arc::new(document),
    );
    assert!(tokio::time::timeout(Duration::from_millis(200), collection).await.is_err());

    // every signer task held a client, aborting them releases the messenger
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(Arc::strong_count(author.peer.messenger()), baseline);
}

#[tokio::test]
async fn test_send_anchored_document() {
    let network = TestNetwork::default();
    let author = network.spawn_node(config()).unwrap();
    let recipient = network.spawn_node(config()).unwrap();
    let cancel = CancellationToken::new();

    let document = TestDocument::new(author.account.id, &[recipient.account.id]);
    let request = AnchorDocumentRequest { document: document.pack_core_document().unwrap() };
    let response = author
        .peer
        .client()
        .send_anchored_document(&cancel, &author.account.id, &recipient.account.id, request)
        .await
        .unwrap();

    assert!(response.accepted);
    assert_eq!(recipient.documents.get(&recipient.account.id, &document.id), Some(document));
}

#[tokio::test]
async fn test_anchored_document_rejection_is_verbatim() {
    let network = TestNetwork::default();
    let outsider = network.spawn_node(config()).unwrap();
    let recipient = network.spawn_node(config()).unwrap();

    // the sender is not a collaborator on the document
    let document = TestDocument::new(recipient.account.id, &[]);
    let request = AnchorDocumentRequest { document: document.pack_core_document().unwrap() };
    let err = outsider
        .peer
        .client()
        .send_anchored_document(
            &CancellationToken::new(),
            &outsider.account.id,
            &recipient.account.id,
            request,
        )
        .await
        .unwrap_err();

    let expected = format!("sender {} is not a collaborator", outsider.account.id);
    assert_matches!(err, P2pError::Remote(msg) if msg == expected);
}

#[tokio::test]
async fn test_get_document_as_collaborator() {
    let network = TestNetwork::default();
    let requester = network.spawn_node(config()).unwrap();
    let provider = network.spawn_node(config()).unwrap();
    let cancel = CancellationToken::new();

    let document = TestDocument::new(provider.account.id, &[requester.account.id]);
    provider.documents.insert(provider.account.id, document.clone());

    let response = requester
        .peer
        .client()
        .get_document_request(
            &cancel,
            &requester.account.id,
            &provider.account.id,
            GetDocumentRequest::requester(document.id),
        )
        .await
        .unwrap();
    assert_eq!(response.document.document_identifier, document.id);
    assert_eq!(TestDocument::from_core_document(&response.document).unwrap(), document);

    // an unset access type is refused
    let request = GetDocumentRequest { document_identifier: document.id, ..Default::default() };
    let err = requester
        .peer
        .client()
        .get_document_request(&cancel, &requester.account.id, &provider.account.id, request)
        .await
        .unwrap_err();
    assert_matches!(err, P2pError::Remote(msg) if msg == "invalid access type");
}

#[tokio::test]
async fn test_get_document_as_nft_owner() {
    let network = TestNetwork::default();
    let requester = network.spawn_node(config()).unwrap();
    let provider = network.spawn_node(config()).unwrap();
    let cancel = CancellationToken::new();

    let nft = NftId { collection: vec![1; 20], item: vec![2; 32] };
    let document = TestDocument::new(provider.account.id, &[]).with_nft(nft.clone());
    provider.documents.insert(provider.account.id, document.clone());
    let request = GetDocumentRequest::nft_owner(document.id, nft.clone());

    let err = requester
        .peer
        .client()
        .get_document_request(&cancel, &requester.account.id, &provider.account.id, request.clone())
        .await
        .unwrap_err();
    assert_matches!(err, P2pError::Remote(msg) if msg == "requester does not have access");

    provider.nfts.set_owner(nft, requester.account.id);
    let response = requester
        .peer
        .client()
        .get_document_request(&cancel, &requester.account.id, &provider.account.id, request)
        .await
        .unwrap();
    assert_eq!(response.document.document_identifier, document.id);
}

#[tokio::test]
async fn test_get_document_with_access_token() {
    let network = TestNetwork::default();
    let requester = network.spawn_node(config()).unwrap();
    let provider = network.spawn_node(config()).unwrap();

    let target = TestDocument::new(provider.account.id, &[]);
    let delegating = TestDocument::new(provider.account.id, &[]).with_access_token(TestAccessToken {
        identifier: b"token".to_vec(),
        granter: provider.account.id,
        grantee: requester.account.id,
        document_identifier: target.id,
    });
    let request = GetDocumentRequest::access_token(target.id, delegating.id, b"token".to_vec());
    provider.documents.insert(provider.account.id, target.clone());
    provider.documents.insert(provider.account.id, delegating);

    let response = requester
        .peer
        .client()
        .get_document_request(
            &CancellationToken::new(),
            &requester.account.id,
            &provider.account.id,
            request,
        )
        .await
        .unwrap();
    assert_eq!(response.document.document_identifier, target.id);
}

#[tokio::test]
async fn test_peer_on_other_network_is_rejected() {
    let network = TestNetwork::default();
    let requester = network.spawn_node(config()).unwrap();
    let foreign = network.spawn_node_on(99, config()).unwrap();

    let document = TestDocument::new(foreign.account.id, &[requester.account.id]);
    foreign.documents.insert(foreign.account.id, document.clone());

    let err = requester
        .peer
        .client()
        .get_document_request(
            &CancellationToken::new(),
            &requester.account.id,
            &foreign.account.id,
            GetDocumentRequest::requester(document.id),
        )
        .await
        .unwrap_err();
    assert_matches!(err, P2pError::Remote(msg) if msg.contains("network mismatch"));
}
