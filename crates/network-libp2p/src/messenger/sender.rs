//! Outbound requests to one peer over one protocol.

use crate::{
    codec::{read_envelope, write_envelope, TransportEnvelope},
    error::{NetworkError, NetworkResult},
    host::StreamHost,
};
use dn_config::P2pConfig;
use futures::AsyncWriteExt as _;
use libp2p::{PeerId, StreamProtocol};
use std::{
    sync::atomic::{AtomicBool, Ordering},
    time::Duration,
};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

/// The number of times an exchange is attempted before the error is returned.
///
/// The second attempt always runs on a fresh stream.
pub const MAX_SEND_ATTEMPTS: usize = 2;

/// Mutable state of a [MessageSender]. Guarded by the sender's lock.
struct SenderState<S> {
    /// The current stream, if one is open.
    stream: Option<S>,
    /// Exchanges counted against the stream reuse limit.
    reuse_count: usize,
}

/// Sends requests to one peer over one protocol and reads the responses.
///
/// Exchanges are serialized: at most one request is in flight per sender.
pub struct MessageSender<H: StreamHost> {
    /// The remote peer.
    peer: PeerId,
    /// The protocol streams are opened for.
    protocol: StreamProtocol,
    /// Stream and reuse counter.
    state: Mutex<SenderState<H::Stream>>,
    /// Set when preparing a stream failed. Invalid senders are never used again.
    invalid: AtomicBool,
}

impl<H: StreamHost> std::fmt::Debug for MessageSender<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageSender")
            .field("peer", &self.peer)
            .field("protocol", &self.protocol)
            .field("invalid", &self.is_invalid())
            .finish()
    }
}

impl<H: StreamHost> MessageSender<H> {
    /// Create a new sender without a stream.
    pub(super) fn new(peer: PeerId, protocol: StreamProtocol) -> Self {
        Self {
            peer,
            protocol,
            state: Mutex::new(SenderState { stream: None, reuse_count: 0 }),
            invalid: AtomicBool::new(false),
        }
    }

    /// The remote peer.
    pub fn peer(&self) -> PeerId {
        self.peer
    }

    /// The protocol this sender uses.
    pub fn protocol(&self) -> &StreamProtocol {
        &self.protocol
    }

    /// Returns `true` if the sender failed to prepare a stream.
    pub fn is_invalid(&self) -> bool {
        self.invalid.load(Ordering::Acquire)
    }

    /// Returns `true` if the sender currently holds an open stream.
    pub async fn has_stream(&self) -> bool {
        self.state.lock().await.stream.is_some()
    }

    /// Prepare a stream, invalidating the sender if that fails.
    pub(super) async fn prep_or_invalidate(&self, host: &H, timeout: Duration) -> NetworkResult<()> {
        let mut state = self.state.lock().await;
        if let Err(e) = self.prep(&mut state, host, timeout).await {
            self.invalidate(&mut state).await;
            return Err(e);
        }
        Ok(())
    }

    /// Mark the sender invalid and close its stream.
    pub(super) async fn invalidate_and_close(&self) {
        let mut state = self.state.lock().await;
        self.invalidate(&mut state).await;
    }

    async fn invalidate(&self, state: &mut SenderState<H::Stream>) {
        self.invalid.store(true, Ordering::Release);
        if let Some(mut stream) = state.stream.take() {
            let _ = stream.close().await;
        }
    }

    /// Ensure a stream is open.
    async fn prep(
        &self,
        state: &mut SenderState<H::Stream>,
        host: &H,
        timeout: Duration,
    ) -> NetworkResult<()> {
        if self.is_invalid() {
            return Err(NetworkError::InvalidatedMessageSender);
        }

        if state.stream.is_some() {
            return Ok(());
        }

        let stream = tokio::time::timeout(timeout, host.open_stream(self.peer, self.protocol.clone()))
            .await
            .map_err(|_| NetworkError::OpenTimeout)??;
        trace!(target: "p2p::messenger", peer = ?self.peer, protocol = %self.protocol, "opened stream");
        state.stream = Some(stream);
        Ok(())
    }

    /// Send a request and wait for the response.
    ///
    /// A failed write or read resets the stream and the exchange is retried once on a new stream.
    /// Cancellation is returned immediately and never retried.
    pub(super) async fn send_message(
        &self,
        host: &H,
        config: &P2pConfig,
        cancel: &CancellationToken,
        envelope: &TransportEnvelope,
    ) -> NetworkResult<TransportEnvelope> {
        let mut state = self.state.lock().await;
        let mut attempt = 0;

        loop {
            attempt += 1;
            self.prep(&mut state, host, config.connection_timeout).await?;

            // only put back once the exchange completes
            let Some(mut stream) = state.stream.take() else {
                return Err(NetworkError::Open("stream missing after prepare".to_string()));
            };

            match exchange(&mut stream, config, cancel, envelope).await {
                Ok(response) => {
                    if state.reuse_count > config.stream_reuse_tries {
                        // recycle the stream for the next request
                        let _ = stream.close().await;
                        debug!(target: "p2p::messenger", peer = ?self.peer, "stream reuse limit reached");
                    } else {
                        if attempt > 1 {
                            state.reuse_count += 1;
                        }
                        state.stream = Some(stream);
                    }

                    return Ok(response);
                }
                Err(e) => {
                    // dropping the stream resets it and discards any late response
                    drop(stream);

                    if !e.is_retryable() || attempt >= MAX_SEND_ATTEMPTS {
                        debug!(target: "p2p::messenger", peer = ?self.peer, protocol = %self.protocol, ?e, attempt, "exchange failed");
                        return Err(e);
                    }

                    warn!(target: "p2p::messenger", peer = ?self.peer, protocol = %self.protocol, ?e, "exchange failed, retrying on a new stream");
                }
            }
        }
    }
}

/// Write the request then read the response, each bounded by the connection timeout.
async fn exchange<S>(
    stream: &mut S,
    config: &P2pConfig,
    cancel: &CancellationToken,
    envelope: &TransportEnvelope,
) -> NetworkResult<TransportEnvelope>
where
    S: futures::AsyncRead + futures::AsyncWrite + Unpin + Send,
{
    tokio::select! {
        _ = cancel.cancelled() => Err(NetworkError::Cancelled),
        res = write_then_read(stream, config, envelope) => res,
    }
}

async fn write_then_read<S>(
    stream: &mut S,
    config: &P2pConfig,
    envelope: &TransportEnvelope,
) -> NetworkResult<TransportEnvelope>
where
    S: futures::AsyncRead + futures::AsyncWrite + Unpin + Send,
{
    let timeout = config.connection_timeout;
    tokio::time::timeout(timeout, write_envelope(stream, envelope, config.frame_limit()))
        .await
        .map_err(|_| NetworkError::WriteTimeout)??;

    let response =
        tokio::time::timeout(timeout, read_envelope(stream, config.frame_limit()))
            .await
            .map_err(|_| NetworkError::ReadTimeout)??;

    Ok(response)
}
