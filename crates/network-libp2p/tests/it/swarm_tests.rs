//! Messaging over real libp2p swarms on localhost.

use assert_matches::assert_matches;
use async_trait::async_trait;
use dn_config::P2pConfig;
use dn_network_libp2p::{
    codec::TransportEnvelope,
    error::{NetworkError, NetworkResult},
    protocol::protocol_for_identity,
    CancellationToken, Keypair, Libp2pStreamHost, MessageHandler, Multiaddr, PeerId, StreamHost,
    StreamMessenger, StreamProtocol, SwarmNetwork,
};
use dn_types::AccountId;
use std::{sync::Arc, time::Duration};

struct EchoHandler;

#[async_trait]
impl MessageHandler for EchoHandler {
    async fn handle_message(
        &self,
        _peer: PeerId,
        _protocol: StreamProtocol,
        envelope: TransportEnvelope,
    ) -> NetworkResult<Option<TransportEnvelope>> {
        Ok(Some(envelope))
    }
}

async fn spawn_swarm(shutdown: &CancellationToken) -> Libp2pStreamHost {
    let addr: Multiaddr = "/ip4/127.0.0.1/udp/0/quic-v1".parse().unwrap();
    let (network, host) =
        SwarmNetwork::new(Keypair::generate_ed25519(), addr, shutdown.clone()).unwrap();
    tokio::spawn(network.run());
    host
}

async fn wait_for_listener(host: &Libp2pStreamHost) -> Multiaddr {
    for _ in 0..50 {
        if let Some(addr) = host.listeners().await.unwrap().into_iter().next() {
            return addr;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("swarm never started listening");
}

#[tokio::test]
async fn test_swarm_host_request_response() {
    dn_test_utils::init_test_tracing();
    let shutdown = CancellationToken::new();
    let responder_host = spawn_swarm(&shutdown).await;
    let requester_host = spawn_swarm(&shutdown).await;

    let protocol = protocol_for_identity(&AccountId::new([5; 32])).unwrap();
    let config = P2pConfig { connection_timeout: Duration::from_secs(10), ..Default::default() };
    let responder = StreamMessenger::new(responder_host.clone(), config.clone());
    responder.init([protocol.clone()], Arc::new(EchoHandler)).unwrap();

    // no connection yet, the stream dials the address from the routing table
    let addr = wait_for_listener(&responder_host).await;
    requester_host.add_peer_address(responder_host.local_peer_id(), addr).await.unwrap();
    assert!(requester_host.connected_peers().await.unwrap().is_empty());

    let requester = StreamMessenger::new(requester_host.clone(), config);
    let cancel = CancellationToken::new();
    for body in [b"first".to_vec(), b"second".to_vec()] {
        let response = requester
            .send_message(
                &cancel,
                responder_host.local_peer_id(),
                TransportEnvelope { body: body.clone() },
                protocol.clone(),
            )
            .await
            .unwrap();
        assert_eq!(response.body, body);
    }

    let connected = requester_host.connected_peers().await.unwrap();
    assert_eq!(connected, vec![responder_host.local_peer_id()]);

    responder.shutdown();
    shutdown.cancel();
}

#[tokio::test]
async fn test_swarm_host_unknown_peer_address() {
    dn_test_utils::init_test_tracing();
    let shutdown = CancellationToken::new();
    let host = spawn_swarm(&shutdown).await;

    let unknown = Keypair::generate_ed25519().public().to_peer_id();
    let protocol = protocol_for_identity(&AccountId::new([6; 32])).unwrap();
    let result = tokio::time::timeout(Duration::from_secs(5), host.open_stream(unknown, protocol))
        .await
        .expect("dial without addresses fails fast");
    assert_matches!(result, Err(NetworkError::Open(_)));

    shutdown.cancel();
}
