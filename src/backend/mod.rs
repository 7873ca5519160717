//! Collaborator interfaces
//!
//! The gateway owns no chain state. Everything it serves comes from five
//! narrow async interfaces onto the node:
//! - `TxPool` - pending transaction pool (`put_txs` returns the accepted subset)
//! - `Broadcaster` - propagation of accepted transactions to peers
//! - `LedgerIndex` - block/tx lookups and paged histories
//! - `CredentialStore` - locally managed wallets and hardware signers
//! - `NodeControl` - mining, peers and market data
//!
//! `upstream::UpstreamNode` implements all of them over HTTP against a
//! running node; `sandbox::SandboxNode` is an in-memory stand-in.

pub mod sandbox;
pub mod upstream;

use crate::core::{
    Address, AddressInfo, BlockInfo, Favorite, HardwareAccount, Hash, MinedBlock, MinerStatus,
    PeerInfo, SignedTx, TxRecord, UnsignedTx, WalletSpec, WalletSummary, WalletTxs,
};
use crate::error::GatewayError;
use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

pub use sandbox::SandboxNode;
pub use upstream::UpstreamNode;

/// Failures reported by a collaborator
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[error("{0} not found")]
    NotFound(String),
    #[error("{0} already exists")]
    Duplicate(String),
    #[error("rejected: {0}")]
    Rejected(String),
    #[error("unavailable: {0}")]
    Unavailable(String),
    #[error("upstream error: {0}")]
    Upstream(String),
}

pub type BackendResult<T> = Result<T, BackendError>;

#[async_trait]
pub trait TxPool: Send + Sync {
    /// Enqueue transactions; returns the ones actually accepted
    async fn put_txs(&self, txs: Vec<SignedTx>) -> BackendResult<Vec<SignedTx>>;
}

#[async_trait]
pub trait Broadcaster: Send + Sync {
    async fn broadcast_txs(&self, txs: &[SignedTx]) -> BackendResult<()>;
}

/// Paged lookups return `Ok(None)` when `before` names an item the index no
/// longer knows (e.g. after a reorganization).
#[async_trait]
pub trait LedgerIndex: Send + Sync {
    async fn block(&self, hash: Hash) -> BackendResult<Option<BlockInfo>>;
    async fn block_at_height(&self, height: u64) -> BackendResult<Option<BlockInfo>>;
    /// Newest-first blocks, `index` counted in pages of `limit`
    async fn block_list(&self, index: u32, limit: usize) -> BackendResult<Vec<BlockInfo>>;
    async fn top_tip_height(&self) -> BackendResult<u64>;
    async fn tx(&self, hash: Hash) -> BackendResult<Option<TxRecord>>;
    async fn address_info(&self, address: Address) -> BackendResult<AddressInfo>;

    async fn address_txs(
        &self,
        address: Address,
        before: Option<Hash>,
        limit: usize,
    ) -> BackendResult<Option<Vec<TxRecord>>>;

    async fn block_txs(
        &self,
        block: Hash,
        before: Option<Hash>,
        limit: usize,
    ) -> BackendResult<Option<Vec<TxRecord>>>;

    async fn mined_blocks(
        &self,
        miner: Address,
        before: Option<Hash>,
        limit: usize,
    ) -> BackendResult<Option<Vec<MinedBlock>>>;

    async fn pending_txs(
        &self,
        before: Option<Hash>,
        limit: usize,
    ) -> BackendResult<Option<Vec<TxRecord>>>;

    /// Confirmed txs with nonce below `below_nonce` (all when `None`) plus pendings
    async fn wallet_txs(
        &self,
        address: Address,
        below_nonce: Option<u32>,
        limit: usize,
    ) -> BackendResult<WalletTxs>;
}

#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn list(&self, start: usize, limit: usize) -> BackendResult<Vec<WalletSummary>>;
    /// Import from a private key or mnemonic
    async fn import(&self, spec: WalletSpec) -> BackendResult<WalletSummary>;
    async fn generate(&self, spec: WalletSpec) -> BackendResult<WalletSummary>;
    async fn recover(&self, spec: WalletSpec) -> BackendResult<WalletSummary>;
    async fn delete(&self, name: &str) -> BackendResult<bool>;
    async fn address_of(&self, name: &str) -> BackendResult<Option<Address>>;
    /// Hex private key of a wallet, unlocked with its password
    async fn signing_key(&self, name: &str, password: &str) -> BackendResult<String>;
    async fn mnemonic(&self, language: &str) -> BackendResult<String>;
    async fn hint(&self, name: &str) -> BackendResult<Option<String>>;
    async fn exists(&self, name: &str) -> BackendResult<bool>;
    async fn hardware_available(&self) -> BackendResult<bool>;
    async fn hardware_accounts(&self, start: u32, count: u32)
        -> BackendResult<Vec<HardwareAccount>>;
    async fn hardware_sign(&self, index: u32, tx: UnsignedTx) -> BackendResult<SignedTx>;
    /// Store a wallet from the contents of an exported key file
    async fn import_file(
        &self,
        name: &str,
        password: &str,
        key_file: &str,
    ) -> BackendResult<WalletSummary>;
    /// Address book, ordered by alias
    async fn favorites(&self) -> BackendResult<Vec<Favorite>>;
    /// `false` if the alias is already taken
    async fn add_favorite(&self, alias: &str, address: Address) -> BackendResult<bool>;
    /// `false` if there was no such alias
    async fn delete_favorite(&self, alias: &str) -> BackendResult<bool>;
}

#[async_trait]
pub trait NodeControl: Send + Sync {
    async fn miner(&self) -> BackendResult<MinerStatus>;
    async fn set_miner(&self, address: Address) -> BackendResult<bool>;
    async fn start_gpu(&self) -> BackendResult<bool>;
    async fn set_miner_count(&self, count: u32) -> BackendResult<bool>;
    async fn peers(&self) -> BackendResult<Vec<PeerInfo>>;
    /// Connected peers, `index` counted in pages
    async fn peer_connected(&self, index: usize) -> BackendResult<Vec<PeerInfo>>;
    async fn market_cap(&self) -> BackendResult<serde_json::Value>;
}

/// The full set of collaborators a gateway is wired to
#[derive(Clone)]
pub struct Backends {
    pub mempool: Arc<dyn TxPool>,
    pub broadcaster: Arc<dyn Broadcaster>,
    pub ledger: Arc<dyn LedgerIndex>,
    pub credentials: Arc<dyn CredentialStore>,
    pub node: Arc<dyn NodeControl>,
}

impl Backends {
    /// Wire every interface to one node implementation
    pub fn from_node<N>(node: Arc<N>) -> Self
    where
        N: TxPool + Broadcaster + LedgerIndex + CredentialStore + NodeControl + 'static,
    {
        Self {
            mempool: node.clone(),
            broadcaster: node.clone(),
            ledger: node.clone(),
            credentials: node.clone(),
            node,
        }
    }
}

/// Await a collaborator call for at most `deadline`
pub async fn with_deadline<T, F>(deadline: Duration, call: F) -> Result<T, GatewayError>
where
    F: Future<Output = BackendResult<T>>,
{
    match tokio::time::timeout(deadline, call).await {
        Ok(result) => result.map_err(GatewayError::from),
        Err(_) => Err(GatewayError::Timeout(deadline)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_deadline_passes_result_through() {
        let ok = with_deadline(Duration::from_secs(1), async { Ok::<_, BackendError>(7) }).await;
        assert_eq!(ok.unwrap(), 7);

        let err = with_deadline(Duration::from_secs(1), async {
            Err::<u8, _>(BackendError::NotFound("block".into()))
        })
        .await;
        assert_eq!(err.unwrap_err().code(), "NOT_FOUND");
    }

    #[tokio::test]
    async fn test_deadline_expires() {
        let slow = async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok::<_, BackendError>(())
        };
        let err = with_deadline(Duration::from_millis(10), slow).await.unwrap_err();
        assert_eq!(err.code(), "GATEWAY_TIMEOUT");
    }
}
