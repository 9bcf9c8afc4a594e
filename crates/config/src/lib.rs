//! Crate for configuring a node.
//!
//! Node-wide settings, peer-to-peer tuning and the accounts a node hosts.
mod network;
pub use network::*;
mod node_config;
pub use node_config::*;
mod traits;
pub use traits::*;
