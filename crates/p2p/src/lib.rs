//! Consensus messaging between document anchoring nodes.
//!
//! The [RequestHandler] validates and answers inbound requests for every account this node
//! hosts. The [Client] fans signature requests out to collaborators and talks to single peers
//! for anchored documents and document fetches. [Peer] wires both to a [StreamMessenger].
//!
//! [StreamMessenger]: dn_network_libp2p::StreamMessenger

mod access;
mod client;
mod envelope;
pub mod error;
mod handler;
mod peer;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
mod validator;

pub use access::{AccessError, AccessValidator};
pub use client::Client;
pub use envelope::{convert_client_error, error_envelope, prepare_envelope, resolve_response};
pub use handler::RequestHandler;
pub use peer::Peer;
pub use validator::{
    handshake_validator, NetworkValidator, PeerValidator, ValidationError, ValidationErrors,
    Validator, ValidatorGroup, VersionValidator,
};
