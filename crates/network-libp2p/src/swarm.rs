//! libp2p implementation of [StreamHost].
//!
//! The swarm runs on its own task. [Libp2pStreamHost] opens and accepts streams through the
//! libp2p-stream control handle and sends every other request to the swarm as a [SwarmCommand].
//!
//! Peer addresses live in the kademlia routing table. When a stream is opened to a peer without
//! a connection, the swarm dials the addresses kademlia knows for that peer.

use crate::{
    error::{NetworkError, NetworkResult},
    host::StreamHost,
};
use async_trait::async_trait;
use futures::StreamExt as _;
use libp2p::{
    identity::Keypair,
    kad::{self, store::MemoryStore},
    swarm::{NetworkBehaviour, SwarmEvent},
    Multiaddr, PeerId, Stream, StreamProtocol, Swarm, SwarmBuilder,
};
use libp2p_stream as stream;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace};

/// Capacity for the swarm command channel.
const COMMAND_CHANNEL_SIZE: usize = 100;

/// The kademlia protocol for peer address lookups.
pub const KAD_PROTOCOL: StreamProtocol = StreamProtocol::new("/dn/kad/1.0.0");

/// Network behavior for stream messaging.
#[derive(NetworkBehaviour)]
pub struct MessagingBehavior {
    /// Raw streams per protocol.
    stream: stream::Behaviour,
    /// Peer address book and lookups.
    kad: kad::Behaviour<MemoryStore>,
}

/// Build a swarm for stream messaging and start listening.
///
/// The swarm uses the tokio runtime and the quic transport.
pub fn start_swarm(keypair: Keypair, multiaddr: Multiaddr) -> eyre::Result<Swarm<MessagingBehavior>> {
    let mut swarm = SwarmBuilder::with_existing_identity(keypair)
        // tokio runtime
        .with_tokio()
        // quic protocol
        .with_quic()
        // streams and kademlia
        .with_behaviour(|keypair| {
            let peer_id = keypair.public().to_peer_id();
            let mut kad = kad::Behaviour::with_config(
                peer_id,
                MemoryStore::new(peer_id),
                kad::Config::new(KAD_PROTOCOL),
            );
            // answer lookups without waiting for a confirmed external address
            kad.set_mode(Some(kad::Mode::Server));
            MessagingBehavior { stream: stream::Behaviour::new(), kad }
        })?
        .with_swarm_config(|c| c.with_idle_connection_timeout(Duration::from_secs(60)))
        .build();

    // start listening
    swarm.listen_on(multiaddr)?;

    Ok(swarm)
}

/// Commands for the swarm.
#[derive(Debug)]
pub enum SwarmCommand {
    /// Listeners
    GetListeners { reply: oneshot::Sender<Vec<Multiaddr>> },
    /// Add an address for a peer to the routing table.
    ///
    /// Streams to the peer dial this address if no connection exists.
    AddPeerAddress {
        /// The peer's id.
        peer_id: PeerId,
        /// The peer's address.
        addr: Multiaddr,
        /// Oneshot for reply once the routing table holds the address.
        reply: oneshot::Sender<()>,
    },
    /// Peers with an established connection.
    ConnectedPeers { reply: oneshot::Sender<Vec<PeerId>> },
}

/// The task that drives the libp2p swarm.
pub struct SwarmNetwork {
    /// The swarm.
    swarm: Swarm<MessagingBehavior>,
    /// Commands from [Libp2pStreamHost].
    commands: mpsc::Receiver<SwarmCommand>,
    /// Stops the swarm.
    shutdown: CancellationToken,
}

impl SwarmNetwork {
    /// Create the swarm task and the host handle that talks to it.
    pub fn new(
        keypair: Keypair,
        multiaddr: Multiaddr,
        shutdown: CancellationToken,
    ) -> eyre::Result<(Self, Libp2pStreamHost)> {
        let swarm = start_swarm(keypair, multiaddr)?;
        let (tx, rx) = mpsc::channel(COMMAND_CHANNEL_SIZE);
        let host = Libp2pStreamHost {
            control: swarm.behaviour().stream.new_control(),
            local_peer_id: *swarm.local_peer_id(),
            sender: tx,
        };

        Ok((Self { swarm, commands: rx, shutdown }, host))
    }

    /// Poll the swarm until shutdown or until every host handle is dropped.
    pub async fn run(mut self) {
        info!(target: "p2p::swarm", peer_id = %self.swarm.local_peer_id(), "swarm started");
        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                event = self.swarm.select_next_some() => self.process_event(event),
                command = self.commands.recv() => match command {
                    Some(command) => self.process_command(command),
                    None => break,
                },
            }
        }
        info!(target: "p2p::swarm", peer_id = %self.swarm.local_peer_id(), "swarm stopped");
    }

    fn process_event(&mut self, event: SwarmEvent<MessagingBehaviorEvent>) {
        match event {
            SwarmEvent::NewListenAddr { address, .. } => {
                debug!(target: "p2p::swarm", %address, "listening");
            }
            SwarmEvent::ConnectionEstablished { peer_id, endpoint, .. } => {
                debug!(target: "p2p::swarm", ?peer_id, addr = %endpoint.get_remote_address(), "connection established");
            }
            SwarmEvent::ConnectionClosed { peer_id, cause, .. } => {
                debug!(target: "p2p::swarm", ?peer_id, ?cause, "connection closed");
            }
            SwarmEvent::OutgoingConnectionError { peer_id, error, .. } => {
                debug!(target: "p2p::swarm", ?peer_id, ?error, "outgoing connection failed");
            }
            SwarmEvent::Behaviour(MessagingBehaviorEvent::Kad(kad::Event::RoutingUpdated {
                peer,
                addresses,
                ..
            })) => {
                trace!(target: "p2p::swarm", ?peer, ?addresses, "routing table updated");
            }
            event => trace!(target: "p2p::swarm", ?event, "swarm event"),
        }
    }

    fn process_command(&mut self, command: SwarmCommand) {
        match command {
            SwarmCommand::GetListeners { reply } => {
                let addrs = self.swarm.listeners().cloned().collect();
                if let Err(e) = reply.send(addrs) {
                    error!(target: "p2p::swarm", ?e, "GetListeners command failed");
                }
            }
            SwarmCommand::AddPeerAddress { peer_id, addr, reply } => {
                let update = self.swarm.behaviour_mut().kad.add_address(&peer_id, addr);
                debug!(target: "p2p::swarm", ?peer_id, ?update, "added peer address");
                if let Err(e) = reply.send(()) {
                    error!(target: "p2p::swarm", ?e, "AddPeerAddress command failed");
                }
            }
            SwarmCommand::ConnectedPeers { reply } => {
                let peers = self.swarm.connected_peers().cloned().collect();
                if let Err(e) = reply.send(peers) {
                    error!(target: "p2p::swarm", ?e, "ConnectedPeers command failed");
                }
            }
        }
    }
}

/// Handle to a running [SwarmNetwork].
#[derive(Clone)]
pub struct Libp2pStreamHost {
    /// libp2p-stream control handle for opening and accepting streams.
    control: stream::Control,
    /// This node's peer id.
    local_peer_id: PeerId,
    /// Commands for the swarm task.
    sender: mpsc::Sender<SwarmCommand>,
}

impl std::fmt::Debug for Libp2pStreamHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Libp2pStreamHost").field("local_peer_id", &self.local_peer_id).finish()
    }
}

impl Libp2pStreamHost {
    /// The addresses the swarm listens on.
    pub async fn listeners(&self) -> NetworkResult<Vec<Multiaddr>> {
        let (reply, rx) = oneshot::channel();
        self.sender.send(SwarmCommand::GetListeners { reply }).await?;
        Ok(rx.await?)
    }

    /// Add an address for a peer to the routing table.
    pub async fn add_peer_address(&self, peer_id: PeerId, addr: Multiaddr) -> NetworkResult<()> {
        let (reply, rx) = oneshot::channel();
        self.sender.send(SwarmCommand::AddPeerAddress { peer_id, addr, reply }).await?;
        Ok(rx.await?)
    }

    /// Peers with an established connection.
    pub async fn connected_peers(&self) -> NetworkResult<Vec<PeerId>> {
        let (reply, rx) = oneshot::channel();
        self.sender.send(SwarmCommand::ConnectedPeers { reply }).await?;
        Ok(rx.await?)
    }
}

#[async_trait]
impl StreamHost for Libp2pStreamHost {
    type Stream = Stream;
    type Incoming = stream::IncomingStreams;

    fn local_peer_id(&self) -> PeerId {
        self.local_peer_id
    }

    async fn open_stream(&self, peer: PeerId, protocol: StreamProtocol) -> NetworkResult<Stream> {
        let mut control = self.control.clone();
        control.open_stream(peer, protocol).await.map_err(|e| NetworkError::Open(e.to_string()))
    }

    fn accept(&self, protocol: StreamProtocol) -> NetworkResult<Self::Incoming> {
        let mut control = self.control.clone();
        control.accept(protocol).map_err(|e| NetworkError::AlreadyRegistered(e.to_string()))
    }
}
