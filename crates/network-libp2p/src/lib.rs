//! Peer-to-peer transport for the document anchoring network built using libp2p.
//!
//! Peers exchange length-prefixed envelopes over long-lived streams. One stream is kept per
//! peer and protocol, where each protocol names the local account that serves it.

pub mod codec;
pub mod error;
mod host;
mod messenger;
pub mod protocol;
mod swarm;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use host::StreamHost;
pub use messenger::{MessageHandler, MessageSender, StreamMessenger, MAX_SEND_ATTEMPTS};
pub use swarm::{
    start_swarm, Libp2pStreamHost, MessagingBehavior, SwarmCommand, SwarmNetwork, KAD_PROTOCOL,
};

// re-export for consistent types
pub use libp2p::{identity::Keypair, Multiaddr, PeerId, StreamProtocol};
pub use tokio_util::sync::CancellationToken;
