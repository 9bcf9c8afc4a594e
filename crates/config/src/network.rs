//! Configuration for network variables.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// The largest frame a peer may send or receive (32 MiB).
pub const MESSAGE_SIZE_MAX: usize = 1 << 25;

/// Configuration for peer-to-peer messaging.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct P2pConfig {
    /// Upper bound for opening a stream, each write and each read.
    ///
    /// The client also uses this value as the deadline for a single peer's signature request.
    #[serde(with = "humantime_serde")]
    pub connection_timeout: Duration,
    /// Minimum time before the node answers any inbound request.
    ///
    /// Applied to every response, including errors.
    #[serde(with = "humantime_serde")]
    pub response_delay: Duration,
    /// Number of exchanges on a stream after a retry before the stream is recycled.
    pub stream_reuse_tries: usize,
    /// Maximum size (bytes) of a single frame.
    ///
    /// Never above [MESSAGE_SIZE_MAX], see [Self::frame_limit].
    pub max_message_size: usize,
}

impl Default for P2pConfig {
    fn default() -> Self {
        Self {
            connection_timeout: Duration::from_secs(30),
            response_delay: Duration::ZERO,
            stream_reuse_tries: 3,
            max_message_size: MESSAGE_SIZE_MAX,
        }
    }
}

impl P2pConfig {
    /// The frame size limit for reads and writes.
    ///
    /// The configured size capped at [MESSAGE_SIZE_MAX].
    pub fn frame_limit(&self) -> usize {
        self.max_message_size.min(MESSAGE_SIZE_MAX)
    }
}
