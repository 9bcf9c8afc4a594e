//! The seam between the messenger and the libp2p host.

use crate::error::NetworkResult;
use async_trait::async_trait;
use futures::{AsyncRead, AsyncWrite, Stream};
use libp2p::{PeerId, StreamProtocol};

/// A host that opens and accepts multiplexed streams.
///
/// The messenger only needs raw bidirectional streams, so tests can swap libp2p for in-memory
/// pipes.
#[async_trait]
pub trait StreamHost: Clone + Send + Sync + 'static {
    /// A bidirectional byte stream to a peer.
    type Stream: AsyncRead + AsyncWrite + Unpin + Send + 'static;
    /// Inbound streams for a registered protocol.
    type Incoming: Stream<Item = (PeerId, Self::Stream)> + Unpin + Send + 'static;

    /// This node's peer id.
    fn local_peer_id(&self) -> PeerId;

    /// Open a new stream to `peer` for `protocol`.
    async fn open_stream(&self, peer: PeerId, protocol: StreamProtocol) -> NetworkResult<Self::Stream>;

    /// Start accepting inbound streams for `protocol`.
    ///
    /// Returns an error if the protocol is already registered.
    fn accept(&self, protocol: StreamProtocol) -> NetworkResult<Self::Incoming>;
}
