//! Request/response messaging over long-lived streams.
//!
//! The [StreamMessenger] keeps one [MessageSender] per peer and protocol. Senders are created
//! lazily, prepared outside the registry lock and reused until their stream fails or reaches
//! the reuse limit. Inbound streams are served by one task each, reading requests and writing
//! the handler's responses until the remote closes the stream.

use crate::{
    codec::{read_envelope, write_envelope, TransportEnvelope},
    error::NetworkResult,
    host::StreamHost,
};
use async_trait::async_trait;
use dn_config::P2pConfig;
use futures::{AsyncWriteExt as _, StreamExt as _};
use libp2p::{PeerId, StreamProtocol};
use parking_lot::Mutex;
use std::{collections::HashMap, sync::Arc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

mod sender;
pub use sender::{MessageSender, MAX_SEND_ATTEMPTS};

#[cfg(test)]
#[path = "../tests/messenger_tests.rs"]
mod messenger_tests;

/// Handles requests that arrive on inbound streams.
#[async_trait]
pub trait MessageHandler: Send + Sync + 'static {
    /// Handle one request.
    ///
    /// `Ok(None)` sends nothing back and keeps the stream open. An error resets the stream.
    async fn handle_message(
        &self,
        peer: PeerId,
        protocol: StreamProtocol,
        envelope: TransportEnvelope,
    ) -> NetworkResult<Option<TransportEnvelope>>;
}

/// Registry key for senders.
type SenderKey = (PeerId, StreamProtocol);

/// Sends requests to peers and serves inbound streams.
pub struct StreamMessenger<H: StreamHost> {
    /// The libp2p host, or a test double.
    host: H,
    /// Timeouts, reuse limit and frame size.
    config: P2pConfig,
    /// One sender per peer and protocol.
    ///
    /// Never held across an await point.
    senders: Mutex<HashMap<SenderKey, Arc<MessageSender<H>>>>,
    /// Stops accept loops and inbound stream tasks.
    shutdown: CancellationToken,
}

impl<H: StreamHost> std::fmt::Debug for StreamMessenger<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamMessenger")
            .field("local_peer_id", &self.host.local_peer_id())
            .field("senders", &self.sender_count())
            .finish()
    }
}

impl<H: StreamHost> StreamMessenger<H> {
    /// Create a new messenger.
    pub fn new(host: H, config: P2pConfig) -> Self {
        Self { host, config, senders: Mutex::new(HashMap::new()), shutdown: CancellationToken::new() }
    }

    /// The host used to open and accept streams.
    pub fn host(&self) -> &H {
        &self.host
    }

    /// The messaging configuration.
    pub fn config(&self) -> &P2pConfig {
        &self.config
    }

    /// Serve inbound streams for each protocol with `handler`.
    ///
    /// Spawns one accept loop per protocol. Each accepted stream gets its own task.
    pub fn init<I>(&self, protocols: I, handler: Arc<dyn MessageHandler>) -> NetworkResult<()>
    where
        I: IntoIterator<Item = StreamProtocol>,
    {
        for protocol in protocols {
            let incoming = self.host.accept(protocol.clone())?;
            info!(target: "p2p::messenger", %protocol, "accepting streams");
            tokio::spawn(accept_loop(
                incoming,
                protocol,
                handler.clone(),
                self.config.frame_limit(),
                self.shutdown.clone(),
            ));
        }
        Ok(())
    }

    /// Send a request to `peer` over `protocol` and wait for the response.
    pub async fn send_message(
        &self,
        cancel: &CancellationToken,
        peer: PeerId,
        envelope: TransportEnvelope,
        protocol: StreamProtocol,
    ) -> NetworkResult<TransportEnvelope> {
        let sender = self.sender_for_peer_and_protocol(peer, protocol).await?;
        sender.send_message(&self.host, &self.config, cancel, &envelope).await
    }

    /// Return the sender for the peer and protocol, creating and preparing one if needed.
    async fn sender_for_peer_and_protocol(
        &self,
        peer: PeerId,
        protocol: StreamProtocol,
    ) -> NetworkResult<Arc<MessageSender<H>>> {
        let key = (peer, protocol);
        let sender = {
            let mut senders = self.senders.lock();
            if let Some(existing) = senders.get(&key) {
                return Ok(existing.clone());
            }
            let sender = Arc::new(MessageSender::new(key.0, key.1.clone()));
            senders.insert(key.clone(), sender.clone());
            sender
        };

        if let Err(e) = sender.prep_or_invalidate(&self.host, self.config.connection_timeout).await {
            let mut senders = self.senders.lock();
            match senders.get(&key) {
                // another caller replaced the entry while this one was preparing
                Some(current) if !Arc::ptr_eq(current, &sender) && !current.is_invalid() => {
                    trace!(target: "p2p::messenger", ?peer, "adopting replacement sender");
                    return Ok(current.clone());
                }
                Some(current) if Arc::ptr_eq(current, &sender) => {
                    senders.remove(&key);
                }
                _ => (),
            }
            debug!(target: "p2p::messenger", ?peer, protocol = %key.1, ?e, "failed to prepare sender");
            return Err(e);
        }

        Ok(sender)
    }

    /// Drop every sender for a peer and close their streams.
    pub async fn disconnect(&self, peer: &PeerId) {
        let removed: Vec<_> = {
            let mut senders = self.senders.lock();
            let keys: Vec<_> = senders.keys().filter(|(p, _)| p == peer).cloned().collect();
            keys.into_iter().filter_map(|key| senders.remove(&key)).collect()
        };

        for sender in removed {
            sender.invalidate_and_close().await;
        }
    }

    /// The number of registered senders.
    pub fn sender_count(&self) -> usize {
        self.senders.lock().len()
    }

    /// The registered sender for a peer and protocol.
    pub fn sender(&self, peer: &PeerId, protocol: &StreamProtocol) -> Option<Arc<MessageSender<H>>> {
        self.senders.lock().get(&(*peer, protocol.clone())).cloned()
    }

    /// Stop serving inbound streams.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }
}

/// Accept inbound streams for one protocol until shutdown.
async fn accept_loop<I, S>(
    mut incoming: I,
    protocol: StreamProtocol,
    handler: Arc<dyn MessageHandler>,
    max_message_size: usize,
    shutdown: CancellationToken,
) where
    I: futures::Stream<Item = (PeerId, S)> + Unpin + Send + 'static,
    S: futures::AsyncRead + futures::AsyncWrite + Unpin + Send + 'static,
{
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            next = incoming.next() => match next {
                Some((peer, stream)) => {
                    trace!(target: "p2p::messenger", ?peer, %protocol, "inbound stream");
                    tokio::spawn(handle_new_stream(
                        peer,
                        protocol.clone(),
                        stream,
                        handler.clone(),
                        max_message_size,
                        shutdown.clone(),
                    ));
                }
                None => break,
            },
        }
    }
    debug!(target: "p2p::messenger", %protocol, "accept loop stopped");
}

/// Serve requests on one inbound stream.
///
/// Ends when the remote closes the stream. Read, handler and write failures reset the stream.
async fn handle_new_stream<S>(
    peer: PeerId,
    protocol: StreamProtocol,
    mut stream: S,
    handler: Arc<dyn MessageHandler>,
    max_message_size: usize,
    shutdown: CancellationToken,
) where
    S: futures::AsyncRead + futures::AsyncWrite + Unpin + Send + 'static,
{
    loop {
        let request = tokio::select! {
            _ = shutdown.cancelled() => break,
            res = read_envelope(&mut stream, max_message_size) => res,
        };

        let request = match request {
            Ok(request) => request,
            Err(e) if e.is_eof() => {
                trace!(target: "p2p::messenger", ?peer, %protocol, "remote closed stream");
                break;
            }
            Err(e) => {
                debug!(target: "p2p::messenger", ?peer, %protocol, ?e, "failed to read request");
                return;
            }
        };

        match handler.handle_message(peer, protocol.clone(), request).await {
            Ok(Some(response)) => {
                if let Err(e) = write_envelope(&mut stream, &response, max_message_size).await {
                    debug!(target: "p2p::messenger", ?peer, %protocol, ?e, "failed to write response");
                    return;
                }
            }
            Ok(None) => {
                trace!(target: "p2p::messenger", ?peer, %protocol, "handler returned no response");
            }
            Err(e) => {
                warn!(target: "p2p::messenger", ?peer, %protocol, ?e, "handler failed, resetting stream");
                return;
            }
        }
    }

    let _ = stream.close().await;
}
