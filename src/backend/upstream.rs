//! HTTP client onto a running node
//!
//! Every collaborator call becomes `POST {base}/rpc/{method}` with a JSON
//! params object. A 2xx response carries the JSON result (`null` for
//! absent values); anything else carries `{ "message": .. }` and maps onto
//! `BackendError` by status:
//! - 404 -> `NotFound`
//! - 409 -> `Duplicate`
//! - other 4xx -> `Rejected`
//! - 5xx or undecodable bodies -> `Upstream`
//! - connect/timeout failures -> `Unavailable`

use super::{
    BackendError, BackendResult, Broadcaster, CredentialStore, LedgerIndex, NodeControl, TxPool,
};
use crate::core::{
    Address, AddressInfo, BlockInfo, Favorite, HardwareAccount, Hash, MinedBlock, MinerStatus,
    PeerInfo, SignedTx, TxRecord, UnsignedTx, WalletSpec, WalletSummary, WalletTxs,
};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("url parse: {0}")]
    Url(#[from] url::ParseError),
    #[error("http client: {0}")]
    Http(#[from] reqwest::Error),
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

#[derive(Clone)]
pub struct UpstreamNode {
    base: Url,
    client: reqwest::Client,
}

impl UpstreamNode {
    /// `base` like "http://127.0.0.1:2442"; `timeout` bounds each call
    pub fn new(base: &str, timeout: Duration) -> Result<Self, UpstreamError> {
        let mut base = Url::parse(base)?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { base, client })
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    async fn call<P, R>(&self, method: &str, params: &P) -> BackendResult<R>
    where
        P: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let url = self
            .base
            .join(&format!("rpc/{}", method))
            .map_err(|e| BackendError::Upstream(format!("{}: {}", method, e)))?;

        let resp = self
            .client
            .post(url)
            .json(params)
            .send()
            .await
            .map_err(|e| BackendError::Unavailable(format!("{}: {}", method, e)))?;

        let status = resp.status();
        if status.is_success() {
            return resp
                .json::<R>()
                .await
                .map_err(|e| BackendError::Upstream(format!("{}: bad response: {}", method, e)));
        }

        let message = match resp.json::<ErrorDetail>().await {
            Ok(detail) => detail.message,
            Err(_) => status.to_string(),
        };
        log::debug!("Upstream {} answered {}: {}", method, status, message);
        Err(match status {
            StatusCode::NOT_FOUND => BackendError::NotFound(message),
            StatusCode::CONFLICT => BackendError::Duplicate(message),
            s if s.is_client_error() => BackendError::Rejected(message),
            _ => BackendError::Upstream(format!("{} HTTP {}: {}", method, status, message)),
        })
    }
}

#[async_trait]
impl TxPool for UpstreamNode {
    async fn put_txs(&self, txs: Vec<SignedTx>) -> BackendResult<Vec<SignedTx>> {
        self.call("put_txs", &json!({ "txs": txs })).await
    }
}

#[async_trait]
impl Broadcaster for UpstreamNode {
    async fn broadcast_txs(&self, txs: &[SignedTx]) -> BackendResult<()> {
        self.call::<_, serde_json::Value>("broadcast_txs", &json!({ "txs": txs }))
            .await
            .map(|_| ())
    }
}

#[async_trait]
impl LedgerIndex for UpstreamNode {
    async fn block(&self, hash: Hash) -> BackendResult<Option<BlockInfo>> {
        self.call("block", &json!({ "hash": hash })).await
    }

    async fn block_at_height(&self, height: u64) -> BackendResult<Option<BlockInfo>> {
        self.call("block_at_height", &json!({ "height": height })).await
    }

    async fn block_list(&self, index: u32, limit: usize) -> BackendResult<Vec<BlockInfo>> {
        self.call("block_list", &json!({ "index": index, "limit": limit }))
            .await
    }

    async fn top_tip_height(&self) -> BackendResult<u64> {
        self.call("top_tip_height", &json!({})).await
    }

    async fn tx(&self, hash: Hash) -> BackendResult<Option<TxRecord>> {
        self.call("tx", &json!({ "hash": hash })).await
    }

    async fn address_info(&self, address: Address) -> BackendResult<AddressInfo> {
        self.call("address_info", &json!({ "address": address })).await
    }

    async fn address_txs(
        &self,
        address: Address,
        before: Option<Hash>,
        limit: usize,
    ) -> BackendResult<Option<Vec<TxRecord>>> {
        self.call(
            "address_txs",
            &json!({ "address": address, "before": before, "limit": limit }),
        )
        .await
    }

    async fn block_txs(
        &self,
        block: Hash,
        before: Option<Hash>,
        limit: usize,
    ) -> BackendResult<Option<Vec<TxRecord>>> {
        self.call(
            "block_txs",
            &json!({ "block": block, "before": before, "limit": limit }),
        )
        .await
    }

    async fn mined_blocks(
        &self,
        miner: Address,
        before: Option<Hash>,
        limit: usize,
    ) -> BackendResult<Option<Vec<MinedBlock>>> {
        self.call(
            "mined_blocks",
            &json!({ "miner": miner, "before": before, "limit": limit }),
        )
        .await
    }

    async fn pending_txs(
        &self,
        before: Option<Hash>,
        limit: usize,
    ) -> BackendResult<Option<Vec<TxRecord>>> {
        self.call("pending_txs", &json!({ "before": before, "limit": limit }))
            .await
    }

    async fn wallet_txs(
        &self,
        address: Address,
        below_nonce: Option<u32>,
        limit: usize,
    ) -> BackendResult<WalletTxs> {
        self.call(
            "wallet_txs",
            &json!({ "address": address, "belowNonce": below_nonce, "limit": limit }),
        )
        .await
    }
}

#[async_trait]
impl CredentialStore for UpstreamNode {
    async fn list(&self, start: usize, limit: usize) -> BackendResult<Vec<WalletSummary>> {
        self.call("wallet_list", &json!({ "start": start, "limit": limit }))
            .await
    }

    async fn import(&self, spec: WalletSpec) -> BackendResult<WalletSummary> {
        self.call("wallet_import", &spec).await
    }

    async fn generate(&self, spec: WalletSpec) -> BackendResult<WalletSummary> {
        self.call("wallet_generate", &spec).await
    }

    async fn recover(&self, spec: WalletSpec) -> BackendResult<WalletSummary> {
        self.call("wallet_recover", &spec).await
    }

    async fn delete(&self, name: &str) -> BackendResult<bool> {
        self.call("wallet_delete", &json!({ "name": name })).await
    }

    async fn address_of(&self, name: &str) -> BackendResult<Option<Address>> {
        self.call("wallet_address", &json!({ "name": name })).await
    }

    async fn signing_key(&self, name: &str, password: &str) -> BackendResult<String> {
        self.call(
            "wallet_signing_key",
            &json!({ "name": name, "password": password }),
        )
        .await
    }

    async fn mnemonic(&self, language: &str) -> BackendResult<String> {
        self.call("mnemonic", &json!({ "language": language })).await
    }

    async fn hint(&self, name: &str) -> BackendResult<Option<String>> {
        self.call("wallet_hint", &json!({ "name": name })).await
    }

    async fn exists(&self, name: &str) -> BackendResult<bool> {
        self.call("wallet_exists", &json!({ "name": name })).await
    }

    async fn hardware_available(&self) -> BackendResult<bool> {
        self.call("hardware_available", &json!({})).await
    }

    async fn hardware_accounts(
        &self,
        start: u32,
        count: u32,
    ) -> BackendResult<Vec<HardwareAccount>> {
        self.call("hardware_accounts", &json!({ "start": start, "count": count }))
            .await
    }

    async fn hardware_sign(&self, index: u32, tx: UnsignedTx) -> BackendResult<SignedTx> {
        self.call("hardware_sign", &json!({ "index": index, "tx": tx }))
            .await
    }

    async fn import_file(
        &self,
        name: &str,
        password: &str,
        key_file: &str,
    ) -> BackendResult<WalletSummary> {
        self.call(
            "wallet_import_file",
            &json!({ "name": name, "password": password, "key": key_file }),
        )
        .await
    }

    async fn favorites(&self) -> BackendResult<Vec<Favorite>> {
        self.call("favorites", &json!({})).await
    }

    async fn add_favorite(&self, alias: &str, address: Address) -> BackendResult<bool> {
        self.call("favorite_add", &json!({ "alias": alias, "address": address }))
            .await
    }

    async fn delete_favorite(&self, alias: &str) -> BackendResult<bool> {
        self.call("favorite_delete", &json!({ "alias": alias })).await
    }
}

#[async_trait]
impl NodeControl for UpstreamNode {
    async fn miner(&self) -> BackendResult<MinerStatus> {
        self.call("miner", &json!({})).await
    }

    async fn set_miner(&self, address: Address) -> BackendResult<bool> {
        self.call("set_miner", &json!({ "address": address })).await
    }

    async fn start_gpu(&self) -> BackendResult<bool> {
        self.call("start_gpu", &json!({})).await
    }

    async fn set_miner_count(&self, count: u32) -> BackendResult<bool> {
        self.call("set_miner_count", &json!({ "count": count })).await
    }

    async fn peers(&self) -> BackendResult<Vec<PeerInfo>> {
        self.call("peers", &json!({})).await
    }

    async fn peer_connected(&self, index: usize) -> BackendResult<Vec<PeerInfo>> {
        self.call("peer_connected", &json!({ "index": index })).await
    }

    async fn market_cap(&self) -> BackendResult<serde_json::Value> {
        self.call("market_cap", &json!({})).await
    }
}
