//! A node's messaging stack: messenger, request handler and client.

use crate::{
    client::Client,
    error::{P2pError, P2pResult},
    handler::RequestHandler,
};
use dn_config::ConfigService;
use dn_network_libp2p::{
    protocol::protocol_for_identity, MessageHandler, StreamHost, StreamMessenger, StreamProtocol,
};
use dn_network_types::{DocumentService, IdentityService, NftService};
use dn_types::AccountId;
use std::{fmt, sync::Arc};
use tracing::info;

/// Serves requests for local accounts and sends requests to collaborators.
pub struct Peer<H: StreamHost> {
    /// Node configuration.
    config: Arc<dyn ConfigService>,
    /// Streams to and from other peers.
    messenger: Arc<StreamMessenger<H>>,
    /// Answers inbound requests.
    handler: Arc<RequestHandler>,
    /// Sends outbound requests.
    client: Client<H>,
}

impl<H: StreamHost> fmt::Debug for Peer<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Peer").field("messenger", &self.messenger).finish_non_exhaustive()
    }
}

impl<H: StreamHost> Peer<H> {
    /// Create a new instance of [Self].
    ///
    /// Nothing is served until [Self::start] is called.
    pub fn new(
        host: H,
        config: Arc<dyn ConfigService>,
        documents: Arc<dyn DocumentService>,
        identity: Arc<dyn IdentityService>,
        nfts: Arc<dyn NftService>,
    ) -> Self {
        let messenger = Arc::new(StreamMessenger::new(host, config.p2p_config()));
        let handler =
            Arc::new(RequestHandler::new(config.clone(), documents, identity.clone(), nfts));
        let client = Client::new(config.clone(), messenger.clone(), handler.clone(), identity);
        Self { config, messenger, handler, client }
    }

    /// One protocol per account hosted by this node.
    pub fn init_protocols(&self) -> P2pResult<Vec<StreamProtocol>> {
        self.config
            .accounts()
            .iter()
            .map(|account| protocol_for_identity(&account.identity).map_err(P2pError::from))
            .collect()
    }

    /// Serve requests for every local account.
    pub fn start(&self) -> P2pResult<()> {
        let protocols = self.init_protocols()?;
        info!(target: "p2p::peer", peer = %self.messenger.host().local_peer_id(), accounts = protocols.len(), "starting peer");
        self.messenger.init(protocols, self.message_handler())?;
        Ok(())
    }

    /// Serve requests for an account added after [Self::start].
    pub fn init_protocol_for_account(&self, account: &AccountId) -> P2pResult<()> {
        let protocol = protocol_for_identity(account)?;
        self.messenger.init([protocol], self.message_handler())?;
        Ok(())
    }

    /// Stop serving requests.
    pub fn stop(&self) {
        info!(target: "p2p::peer", peer = %self.messenger.host().local_peer_id(), "stopping peer");
        self.messenger.shutdown();
    }

    /// The client for outbound requests.
    pub fn client(&self) -> &Client<H> {
        &self.client
    }

    /// The handler for inbound requests.
    pub fn handler(&self) -> &Arc<RequestHandler> {
        &self.handler
    }

    /// The stream messenger.
    pub fn messenger(&self) -> &Arc<StreamMessenger<H>> {
        &self.messenger
    }

    fn message_handler(&self) -> Arc<dyn MessageHandler> {
        self.handler.clone()
    }
}
