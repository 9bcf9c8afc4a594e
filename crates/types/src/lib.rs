//! Shared types for the document anchoring network.

#[macro_use]
pub mod error;
mod codec;
mod document;
mod identity;
mod signature;
mod version;
pub use codec::*;
pub use document::*;
pub use error::{TypesError, TypesResult};
pub use identity::*;
pub use signature::*;
pub use version::*;

// re-exports for easier maintainability
pub use libp2p::identity::ed25519;
