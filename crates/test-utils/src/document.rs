//! A simple document model for tests.

use crate::now;
use dn_types::{
    encode, signing_root, try_decode, AccountId, CoreDocument, Document, DocumentId, NftId,
};
use eyre::{bail, eyre};
use serde::{Deserialize, Serialize};

/// An access token letting `grantee` read `document_identifier`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestAccessToken {
    /// Token id.
    pub identifier: Vec<u8>,
    /// Collaborator that issued the token.
    pub granter: AccountId,
    /// Account allowed to read.
    pub grantee: AccountId,
    /// The document the token grants access to.
    pub document_identifier: DocumentId,
}

/// Document whose collaborators may read and must sign every version.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestDocument {
    /// Document id.
    pub id: DocumentId,
    /// Current version id.
    pub version: DocumentId,
    /// The account that created the version.
    pub author: AccountId,
    /// Every collaborator, including the author.
    pub collaborators: Vec<AccountId>,
    /// NFTs whose owners may read the document.
    pub nfts: Vec<NftId>,
    /// Access tokens issued on this document.
    pub access_tokens: Vec<TestAccessToken>,
    /// Creation time of the version.
    pub timestamp: u64,
    /// Document contents.
    pub data: Vec<u8>,
}

impl TestDocument {
    /// A new document authored by `author` and shared with `collaborators`.
    pub fn new(author: AccountId, collaborators: &[AccountId]) -> Self {
        let mut all = vec![author];
        all.extend(collaborators.iter().filter(|c| **c != author));
        Self {
            id: DocumentId::random(),
            version: DocumentId::random(),
            author,
            collaborators: all,
            nfts: vec![],
            access_tokens: vec![],
            timestamp: now(),
            data: b"test document".to_vec(),
        }
    }

    /// Grant read access to the owner of an NFT.
    pub fn with_nft(mut self, nft: NftId) -> Self {
        self.nfts.push(nft);
        self
    }

    /// Issue an access token on this document.
    pub fn with_access_token(mut self, token: TestAccessToken) -> Self {
        self.access_tokens.push(token);
        self
    }

    /// Decode a document packed with [Document::pack_core_document].
    pub fn from_core_document(document: &CoreDocument) -> eyre::Result<Self> {
        let decoded: Self = try_decode(&document.payload)?;
        if decoded.id != document.document_identifier || decoded.version != document.current_version
        {
            bail!("core document identifiers do not match payload");
        }
        Ok(decoded)
    }
}

impl Document for TestDocument {
    fn id(&self) -> DocumentId {
        self.id
    }

    fn current_version(&self) -> DocumentId {
        self.version
    }

    fn signer_collaborators(&self, exclude: &AccountId) -> eyre::Result<Vec<AccountId>> {
        Ok(self.collaborators.iter().filter(|c| *c != exclude).copied().collect())
    }

    fn signing_root(&self) -> eyre::Result<Vec<u8>> {
        Ok(signing_root(&encode(self)?))
    }

    fn timestamp(&self) -> u64 {
        self.timestamp
    }

    fn pack_core_document(&self) -> eyre::Result<CoreDocument> {
        Ok(CoreDocument {
            document_identifier: self.id,
            current_version: self.version,
            payload: encode(self)?,
            signatures: vec![],
        })
    }

    fn account_can_read(&self, account: &AccountId) -> bool {
        self.collaborators.contains(account)
    }

    fn nft_grants_read(&self, nft: &NftId) -> bool {
        self.nfts.contains(nft)
    }

    fn at_grantee_can_read(
        &self,
        token_id: &[u8],
        document: &DocumentId,
        grantee: &AccountId,
    ) -> eyre::Result<()> {
        let token = self
            .access_tokens
            .iter()
            .find(|t| t.identifier == token_id)
            .ok_or_else(|| eyre!("access token not found"))?;

        if token.grantee != *grantee {
            bail!("requester is not the access token grantee");
        }
        if !self.account_can_read(&token.granter) {
            bail!("access token granter is not a collaborator");
        }
        if token.document_identifier != *document {
            bail!("requested document does not match access token");
        }
        Ok(())
    }
}
