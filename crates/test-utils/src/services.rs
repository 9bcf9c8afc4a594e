//! In-memory collaborator services.

use crate::{now, TestAccount, TestDocument};
use async_trait::async_trait;
use dn_network_types::{DocumentRef, DocumentService, IdentityService, KeyPurpose, NftService};
use dn_types::{ed25519, AccountId, CoreDocument, DocumentId, NftId, Signature};
use eyre::{bail, eyre};
use parking_lot::RwLock;
use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

/// Registered keys for one account.
#[derive(Clone, Debug, Default)]
struct AccountKeys {
    discovery: Vec<Vec<u8>>,
    signing: Vec<Vec<u8>>,
}

/// Identity registry backed by a map.
///
/// Records the accounts and signature timestamps it was asked to validate.
#[derive(Debug, Default)]
pub struct MemoryIdentityService {
    accounts: RwLock<HashMap<AccountId, AccountKeys>>,
    validated_accounts: RwLock<Vec<AccountId>>,
    signature_timestamps: RwLock<Vec<u64>>,
}

impl MemoryIdentityService {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an account with its discovery and signing keys.
    pub fn register(&self, account: &TestAccount) {
        let mut accounts = self.accounts.write();
        let keys = accounts.entry(account.id).or_default();
        keys.discovery.push(account.discovery_key());
        keys.signing.push(account.signing_key());
    }

    /// Register an extra key for an account.
    pub fn add_key(&self, account: &AccountId, key: Vec<u8>, purpose: KeyPurpose) {
        let mut accounts = self.accounts.write();
        let keys = accounts.entry(*account).or_default();
        match purpose {
            KeyPurpose::P2pDiscovery => keys.discovery.push(key),
            KeyPurpose::Signing => keys.signing.push(key),
        }
    }

    /// Accounts passed to `validate_account`, in call order.
    pub fn validated_accounts(&self) -> Vec<AccountId> {
        self.validated_accounts.read().clone()
    }

    /// Timestamps passed to `validate_signature`, in call order.
    pub fn signature_timestamps(&self) -> Vec<u64> {
        self.signature_timestamps.read().clone()
    }

    fn keys(&self, account: &AccountId, purpose: KeyPurpose) -> eyre::Result<Vec<Vec<u8>>> {
        let accounts = self.accounts.read();
        let keys = accounts.get(account).ok_or_else(|| eyre!("account {account} not found"))?;
        Ok(match purpose {
            KeyPurpose::P2pDiscovery => keys.discovery.clone(),
            KeyPurpose::Signing => keys.signing.clone(),
        })
    }
}

#[async_trait]
impl IdentityService for MemoryIdentityService {
    async fn last_key_by_purpose(
        &self,
        account: &AccountId,
        purpose: KeyPurpose,
    ) -> eyre::Result<Vec<u8>> {
        self.keys(account, purpose)?
            .pop()
            .ok_or_else(|| eyre!("account {account} has no {purpose} key"))
    }

    async fn validate_key(
        &self,
        account: &AccountId,
        key: &[u8],
        purpose: KeyPurpose,
    ) -> eyre::Result<()> {
        if !self.keys(account, purpose)?.iter().any(|k| k == key) {
            bail!("key is not a valid {purpose} key of {account}");
        }
        Ok(())
    }

    async fn validate_account(&self, account: &AccountId) -> eyre::Result<()> {
        self.validated_accounts.write().push(*account);
        if !self.accounts.read().contains_key(account) {
            bail!("account {account} not found");
        }
        Ok(())
    }

    async fn validate_signature(
        &self,
        signer: &AccountId,
        public_key: &[u8],
        payload: &[u8],
        signature: &[u8],
        timestamp: u64,
    ) -> eyre::Result<()> {
        self.signature_timestamps.write().push(timestamp);
        self.validate_key(signer, public_key, KeyPurpose::Signing).await?;
        let key = ed25519::PublicKey::try_from_bytes(public_key)?;
        if !key.verify(payload, signature) {
            bail!("invalid signature");
        }
        Ok(())
    }
}

/// Document storage backed by a map, signing with registered keys.
#[derive(Debug, Default)]
pub struct MemoryDocumentService {
    /// Stored documents by owning account.
    documents: RwLock<HashMap<(AccountId, DocumentId), TestDocument>>,
    /// Signing keys of local accounts.
    signers: RwLock<HashMap<AccountId, ed25519::Keypair>>,
    /// Accounts that refuse to sign.
    refuse_to_sign: RwLock<HashSet<AccountId>>,
}

impl MemoryDocumentService {
    /// Create an empty service.
    pub fn new() -> Self {
        Self::default()
    }

    /// Let the service sign for `account`.
    pub fn add_signer(&self, account: &TestAccount) {
        self.signers.write().insert(account.id, account.signing.clone());
    }

    /// Make `account` reject every signature request.
    pub fn refuse_to_sign(&self, account: AccountId) {
        self.refuse_to_sign.write().insert(account);
    }

    /// Store a document for an account.
    pub fn insert(&self, account: AccountId, document: TestDocument) {
        self.documents.write().insert((account, document.id), document);
    }

    /// A stored document.
    pub fn get(&self, account: &AccountId, id: &DocumentId) -> Option<TestDocument> {
        self.documents.read().get(&(*account, *id)).cloned()
    }

    fn unpack(document: &DocumentRef) -> eyre::Result<TestDocument> {
        TestDocument::from_core_document(&document.pack_core_document()?)
    }
}

#[async_trait]
impl DocumentService for MemoryDocumentService {
    async fn derive_from_core_document(&self, document: CoreDocument) -> eyre::Result<DocumentRef> {
        Ok(Arc::new(TestDocument::from_core_document(&document)?))
    }

    async fn request_document_signature(
        &self,
        account: &AccountId,
        document: DocumentRef,
        collaborator: &AccountId,
    ) -> eyre::Result<Vec<Signature>> {
        if self.refuse_to_sign.read().contains(account) {
            bail!("document validation failed");
        }
        if !document.account_can_read(collaborator) {
            bail!("sender {collaborator} is not a collaborator");
        }
        if !document.account_can_read(account) {
            bail!("account {account} is not a collaborator");
        }

        let keypair = self
            .signers
            .read()
            .get(account)
            .cloned()
            .ok_or_else(|| eyre!("no signing key for {account}"))?;
        let root = document.signing_root()?;
        let signature = Signature::sign(&keypair, *account, &root, true, now());

        // keep the signed version like a real node would
        self.insert(*account, Self::unpack(&document)?);
        Ok(vec![signature])
    }

    async fn receive_anchored_document(
        &self,
        account: &AccountId,
        document: DocumentRef,
        collaborator: &AccountId,
    ) -> eyre::Result<()> {
        if !document.account_can_read(collaborator) {
            bail!("sender {collaborator} is not a collaborator");
        }
        self.insert(*account, Self::unpack(&document)?);
        Ok(())
    }

    async fn get_current_version(
        &self,
        account: &AccountId,
        document_id: &DocumentId,
    ) -> eyre::Result<DocumentRef> {
        let document = self.get(account, document_id).ok_or_else(|| eyre!("document not found"))?;
        Ok(Arc::new(document))
    }
}

/// NFT registry backed by a map.
#[derive(Debug, Default)]
pub struct MemoryNftService {
    owners: RwLock<HashMap<NftId, AccountId>>,
}

impl MemoryNftService {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the owner of a token.
    pub fn set_owner(&self, nft: NftId, owner: AccountId) {
        self.owners.write().insert(nft, owner);
    }
}

#[async_trait]
impl NftService for MemoryNftService {
    async fn owner_of(&self, collection: &[u8], item: &[u8]) -> eyre::Result<AccountId> {
        let nft = NftId { collection: collection.to_vec(), item: item.to_vec() };
        self.owners.read().get(&nft).copied().ok_or_else(|| eyre!("token does not exist"))
    }
}
