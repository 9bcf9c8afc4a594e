//! In-memory [StreamHost] for tests.
//!
//! Hosts on the same [MemoryNetwork] open streams to each other over tokio duplex pipes.
//! Outbound streams can be made to fail on demand.

use crate::{
    error::{NetworkError, NetworkResult},
    host::StreamHost,
};
use async_trait::async_trait;
use futures::{AsyncRead, AsyncWrite};
use libp2p::{identity::Keypair, PeerId, StreamProtocol};
use parking_lot::Mutex;
use std::{
    collections::HashMap,
    io,
    pin::Pin,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    task::{Context, Poll},
    time::Duration,
};
use tokio::{io::DuplexStream, sync::mpsc};
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_util::compat::{Compat, TokioAsyncReadCompatExt as _};

/// Buffer size for each direction of a pipe.
const PIPE_BUFFER_SIZE: usize = 64 * 1024;

type Listeners = HashMap<(PeerId, StreamProtocol), mpsc::UnboundedSender<(PeerId, MemoryStream)>>;

/// A set of hosts that can reach each other.
#[derive(Clone, Debug, Default)]
pub struct MemoryNetwork {
    /// Registered protocols by peer.
    listeners: Arc<Mutex<Listeners>>,
}

impl MemoryNetwork {
    /// Create an empty network.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a host with a random identity.
    pub fn host(&self) -> MemoryHost {
        self.host_with_keypair(&Keypair::generate_ed25519())
    }

    /// Create a host whose peer id is derived from `keypair`.
    pub fn host_with_keypair(&self, keypair: &Keypair) -> MemoryHost {
        MemoryHost {
            peer_id: keypair.public().to_peer_id(),
            network: self.clone(),
            faults: Arc::new(FaultInjector::default()),
        }
    }
}

/// Failures injected into a host's outbound streams.
#[derive(Debug, Default)]
pub struct FaultInjector {
    /// Number of upcoming stream opens that fail.
    fail_opens: AtomicUsize,
    /// Number of upcoming writes that fail.
    fail_writes: AtomicUsize,
    /// Number of stream opens attempted.
    opens: AtomicUsize,
    /// Delay before each open completes.
    open_delay: Mutex<Option<Duration>>,
}

impl FaultInjector {
    /// Fail the next `count` stream opens.
    pub fn fail_next_opens(&self, count: usize) {
        self.fail_opens.store(count, Ordering::SeqCst);
    }

    /// Fail the next `count` writes on outbound streams.
    pub fn fail_next_writes(&self, count: usize) {
        self.fail_writes.store(count, Ordering::SeqCst);
    }

    /// Delay every stream open.
    pub fn set_open_delay(&self, delay: Option<Duration>) {
        *self.open_delay.lock() = delay;
    }

    /// Number of stream opens attempted so far.
    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    /// Consume one injected failure from `counter`.
    fn take(counter: &AtomicUsize) -> bool {
        counter.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1)).is_ok()
    }
}

/// A host on a [MemoryNetwork].
#[derive(Clone, Debug)]
pub struct MemoryHost {
    /// This host's peer id.
    peer_id: PeerId,
    /// The shared network.
    network: MemoryNetwork,
    /// Failures for outbound streams.
    faults: Arc<FaultInjector>,
}

impl MemoryHost {
    /// Failure injection for this host's outbound streams.
    pub fn faults(&self) -> &FaultInjector {
        &self.faults
    }
}

#[async_trait]
impl StreamHost for MemoryHost {
    type Stream = MemoryStream;
    type Incoming = UnboundedReceiverStream<(PeerId, MemoryStream)>;

    fn local_peer_id(&self) -> PeerId {
        self.peer_id
    }

    async fn open_stream(&self, peer: PeerId, protocol: StreamProtocol) -> NetworkResult<MemoryStream> {
        self.faults.opens.fetch_add(1, Ordering::SeqCst);
        let delay = *self.faults.open_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if FaultInjector::take(&self.faults.fail_opens) {
            return Err(NetworkError::Open("injected open failure".to_string()));
        }

        let listener = self
            .network
            .listeners
            .lock()
            .get(&(peer, protocol.clone()))
            .cloned()
            .ok_or_else(|| NetworkError::Open(format!("{peer} does not support {protocol}")))?;

        let (local, remote) = tokio::io::duplex(PIPE_BUFFER_SIZE);
        listener
            .send((self.peer_id, MemoryStream::new(remote, None)))
            .map_err(|_| NetworkError::Open(format!("{peer} stopped accepting {protocol}")))?;

        Ok(MemoryStream::new(local, Some(self.faults.clone())))
    }

    fn accept(&self, protocol: StreamProtocol) -> NetworkResult<Self::Incoming> {
        let mut listeners = self.network.listeners.lock();
        let key = (self.peer_id, protocol);
        if listeners.get(&key).is_some_and(|tx| !tx.is_closed()) {
            return Err(NetworkError::AlreadyRegistered(key.1.to_string()));
        }

        let (tx, rx) = mpsc::unbounded_channel();
        listeners.insert(key, tx);
        Ok(UnboundedReceiverStream::new(rx))
    }
}

/// One end of an in-memory pipe.
#[derive(Debug)]
pub struct MemoryStream {
    /// The pipe.
    inner: Compat<DuplexStream>,
    /// Injected failures for outbound streams.
    faults: Option<Arc<FaultInjector>>,
}

impl MemoryStream {
    fn new(inner: DuplexStream, faults: Option<Arc<FaultInjector>>) -> Self {
        Self { inner: inner.compat(), faults }
    }
}

impl AsyncRead for MemoryStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut [u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.get_mut().inner).poll_read(cx, buf)
    }
}

impl AsyncWrite for MemoryStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        if this.faults.as_ref().is_some_and(|f| FaultInjector::take(&f.fail_writes)) {
            return Poll::Ready(Err(io::Error::new(io::ErrorKind::BrokenPipe, "injected write failure")));
        }
        Pin::new(&mut this.inner).poll_write(cx, buf)
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_flush(cx)
    }

    fn poll_close(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_close(cx)
    }
}
