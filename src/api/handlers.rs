//! REST API handlers for wallet and ledger operations

use crate::api::middleware::{ApiJson, ApiPath};
use crate::backend::{with_deadline, BackendResult, Backends};
use crate::config::{GatewayConfig, GatewayMode};
use crate::core::{
    amount, AccountRef, Address, AddressInfo, BlockInfo, Credential, Favorite, HardwareAccount,
    Hash, MinedBlock, MinerStatus, PeerInfo, PreSignedSubmission, TxFields, TxRecord,
    UnsignedTx, WalletSpec, WalletSummary, WalletTxs,
};
use crate::error::{GatewayError, Result};
use crate::history::{paginate, Cursor, HistoryPage};
use crate::pipeline::{SubmissionReceipt, TxPipeline};
use crate::subscription::{Subscription, SubscriptionRegistry};
use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;

/// Furthest page `txList/:index` walks to without a cursor
const MAX_PAGE_WALK: u32 = 500;

/// Shared application state for API handlers
#[derive(Clone)]
pub struct ApiState {
    pub config: Arc<GatewayConfig>,
    pub backends: Backends,
    pub pipeline: Arc<TxPipeline>,
    pub registry: Arc<SubscriptionRegistry>,
}

impl ApiState {
    pub fn new(
        config: Arc<GatewayConfig>,
        backends: Backends,
        registry: Arc<SubscriptionRegistry>,
    ) -> Self {
        let pipeline = Arc::new(TxPipeline::new(
            backends.mempool.clone(),
            backends.ledger.clone(),
            backends.credentials.clone(),
            registry.clone(),
            config.collaborator_timeout(),
        ));
        Self {
            config,
            backends,
            pipeline,
            registry,
        }
    }

    /// Collaborator call bounded by the configured deadline
    async fn call<T, F>(&self, fut: F) -> Result<T>
    where
        F: Future<Output = BackendResult<T>>,
    {
        with_deadline(self.config.collaborator_timeout(), fut).await
    }

    /// Address of an account segment: an address, else a wallet name
    async fn resolve_account(&self, segment: &str) -> Result<Address> {
        match AccountRef::parse(segment) {
            AccountRef::Address(address) => Ok(address),
            AccountRef::Name(name) => self
                .call(self.backends.credentials.address_of(&name))
                .await?
                .ok_or_else(|| GatewayError::NotFound(format!("wallet '{}'", name))),
        }
    }

    async fn tx_page(
        &self,
        address: Address,
        cursor: Option<Cursor>,
    ) -> Result<HistoryPage<TxRecord>> {
        paginate(cursor, self.config.page_size, |before, limit| {
            self.call(self.backends.ledger.address_txs(address, before, limit))
        })
        .await
    }

    async fn mined_page(
        &self,
        miner: Address,
        cursor: Option<Cursor>,
    ) -> Result<HistoryPage<MinedBlock>> {
        paginate(cursor, self.config.page_size, |before, limit| {
            self.call(self.backends.ledger.mined_blocks(miner, before, limit))
        })
        .await
    }

    async fn block_tx_page(
        &self,
        block: Hash,
        cursor: Option<Cursor>,
    ) -> Result<HistoryPage<TxRecord>> {
        paginate(cursor, self.config.page_size, |before, limit| {
            self.call(self.backends.ledger.block_txs(block, before, limit))
        })
        .await
    }

    async fn pending_page(&self, cursor: Option<Cursor>) -> Result<HistoryPage<TxRecord>> {
        paginate(cursor, self.config.page_size, |before, limit| {
            self.call(self.backends.ledger.pending_txs(before, limit))
        })
        .await
    }

    /// Balance, first history pages and pendings of an address
    async fn account_detail(
        &self,
        name: Option<String>,
        address: Address,
    ) -> Result<AccountDetail> {
        let (info, txs, mined_blocks, wallet) = futures::try_join!(
            self.call(self.backends.ledger.address_info(address)),
            self.tx_page(address, None),
            self.mined_page(address, None),
            self.call(self.backends.ledger.wallet_txs(address, None, 0)),
        )?;
        Ok(AccountDetail {
            name,
            info,
            txs,
            mined_blocks,
            pendings: wallet.pendings,
        })
    }
}

// ============================================================================
// Parsing helpers
// ============================================================================

fn parse_address(field: &str, value: &str) -> Result<Address> {
    value
        .parse()
        .map_err(|e| GatewayError::Validation(format!("{}: {}", field, e)))
}

fn parse_hash(field: &str, value: &str) -> Result<Hash> {
    value
        .parse()
        .map_err(|e| GatewayError::Validation(format!("{}: {}", field, e)))
}

fn parse_number<T: std::str::FromStr>(field: &str, value: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| GatewayError::Validation(format!("{}: {}", field, e)))
}

fn parse_amount(field: &str, value: &str) -> Result<u64> {
    amount::parse(value).map_err(|e| GatewayError::Validation(format!("{}: {}", field, e)))
}

/// `?cursor=` wins over the `/:hash/:index` path form
fn history_cursor(query: &CursorQuery, anchor: &str, index: &str) -> Result<Cursor> {
    match query.cursor.as_deref() {
        Some(token) => Ok(Cursor::decode(token)?),
        None => Ok(Cursor::from_parts(anchor, index)?),
    }
}

// ============================================================================
// Request Types
// ============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct CursorQuery {
    pub cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallbackRequest {
    pub url: String,
    pub from: Option<u64>,
    pub to: Option<u64>,
}

/// Body of `POST /signedtx`
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedTxRequest {
    pub private_key: String,
    pub from: Option<String>,
    pub to: String,
    #[serde(with = "amount")]
    pub amount: u64,
    #[serde(with = "amount")]
    pub fee: u64,
    pub nonce: u32,
}

/// Body of `POST /addWalletFile`
#[derive(Deserialize)]
pub struct WalletFileRequest {
    pub name: String,
    pub password: String,
    /// Contents of the exported key file
    pub key: String,
}

/// Body of `POST /transaction`
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletTxRequest {
    pub name: String,
    pub password: String,
    pub from: Option<String>,
    pub to: String,
    #[serde(with = "amount")]
    pub amount: u64,
    #[serde(with = "amount")]
    pub fee: u64,
    pub nonce: u32,
}

fn tx_fields(from: Option<&str>, to: &str, amount: u64, fee: u64, nonce: u32) -> Result<TxFields> {
    Ok(TxFields {
        from: from.map(|f| parse_address("from", f)).transpose()?,
        to: parse_address("to", to)?,
        amount,
        fee,
        nonce,
    })
}

// ============================================================================
// Response Types
// ============================================================================

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub mode: GatewayMode,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletListResponse {
    pub start: usize,
    pub wallets: Vec<WalletSummary>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountDetail {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(flatten)]
    pub info: AddressInfo,
    pub txs: HistoryPage<TxRecord>,
    pub mined_blocks: HistoryPage<MinedBlock>,
    pub pendings: Vec<TxRecord>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockDetail {
    #[serde(flatten)]
    pub info: BlockInfo,
    pub txs: HistoryPage<TxRecord>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionCreated {
    pub id: u64,
    pub address: Address,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionDeleted {
    pub id: u64,
    pub address: Address,
    pub deleted: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MnemonicResponse {
    pub language: String,
    pub mnemonic: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HintResponse {
    pub name: String,
    pub hint: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TipResponse {
    pub height: u64,
}

// ============================================================================
// Public Handlers
// ============================================================================

/// GET /health
pub async fn health(State(state): State<ApiState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        mode: state.config.mode,
    })
}

/// POST /tx - Submit a pre-signed transaction
pub async fn submit_tx(
    State(state): State<ApiState>,
    ApiJson(submission): ApiJson<PreSignedSubmission>,
) -> Result<Json<SubmissionReceipt>> {
    let receipt = state
        .pipeline
        .submit_pre_signed(submission, state.backends.broadcaster.clone())
        .await?;
    Ok(Json(receipt))
}

/// GET /block/:hash - Block with its first page of transactions
pub async fn get_block(
    State(state): State<ApiState>,
    ApiPath(hash): ApiPath<String>,
) -> Result<Json<BlockDetail>> {
    let hash = parse_hash("hash", &hash)?;
    let info = state
        .call(state.backends.ledger.block(hash))
        .await?
        .ok_or_else(|| GatewayError::NotFound(format!("block {}", hash)))?;
    let txs = state.block_tx_page(hash, None).await?;
    Ok(Json(BlockDetail { info, txs }))
}

/// GET /address/:address
pub async fn get_address(
    State(state): State<ApiState>,
    ApiPath(address): ApiPath<String>,
) -> Result<Json<AccountDetail>> {
    let address = parse_address("address", &address)?;
    Ok(Json(state.account_detail(None, address).await?))
}

/// GET /tx/:hash - Confirmed or pending transaction
pub async fn get_tx(
    State(state): State<ApiState>,
    ApiPath(hash): ApiPath<String>,
) -> Result<Json<TxRecord>> {
    let hash = parse_hash("hash", &hash)?;
    state
        .call(state.backends.ledger.tx(hash))
        .await?
        .map(Json)
        .ok_or_else(|| GatewayError::NotFound(format!("transaction {}", hash)))
}

/// GET /txList/:index - Page of the pending pool
///
/// Without a cursor the pool is walked from the newest entry to `index`.
pub async fn tx_list(
    State(state): State<ApiState>,
    ApiPath(index): ApiPath<String>,
    Query(query): Query<CursorQuery>,
) -> Result<Json<HistoryPage<TxRecord>>> {
    if let Some(token) = query.cursor.as_deref() {
        let cursor = Cursor::decode(token)?;
        return Ok(Json(state.pending_page(Some(cursor)).await?));
    }

    let target: u32 = parse_number("index", &index)?;
    if target == 0 {
        return Err(GatewayError::CursorInvalid("page index must start at 1".into()));
    }
    if target > MAX_PAGE_WALK {
        return Err(GatewayError::Validation(format!(
            "index {} is beyond {}; continue with ?cursor=",
            target, MAX_PAGE_WALK
        )));
    }

    let mut page = state.pending_page(None).await?;
    while page.page_index < target {
        page = match page.next() {
            Some(next) => state.pending_page(Some(next)).await?,
            None => HistoryPage::empty(target),
        };
    }
    Ok(Json(page))
}

/// GET /nextTxs/:address/:txHash/:index
pub async fn next_txs(
    State(state): State<ApiState>,
    ApiPath((address, anchor, index)): ApiPath<(String, String, String)>,
    Query(query): Query<CursorQuery>,
) -> Result<Json<HistoryPage<TxRecord>>> {
    let address = parse_address("address", &address)?;
    let cursor = history_cursor(&query, &anchor, &index)?;
    Ok(Json(state.tx_page(address, Some(cursor)).await?))
}

/// GET /nextTxsInBlock/:blockhash/:txHash/:index
pub async fn next_txs_in_block(
    State(state): State<ApiState>,
    ApiPath((block, anchor, index)): ApiPath<(String, String, String)>,
    Query(query): Query<CursorQuery>,
) -> Result<Json<HistoryPage<TxRecord>>> {
    let block = parse_hash("blockhash", &block)?;
    let cursor = history_cursor(&query, &anchor, &index)?;
    Ok(Json(state.block_tx_page(block, Some(cursor)).await?))
}

/// GET /getMinedInfo/:address/:blockHash/:index
pub async fn mined_info(
    State(state): State<ApiState>,
    ApiPath((address, anchor, index)): ApiPath<(String, String, String)>,
    Query(query): Query<CursorQuery>,
) -> Result<Json<HistoryPage<MinedBlock>>> {
    let address = parse_address("address", &address)?;
    let cursor = history_cursor(&query, &anchor, &index)?;
    Ok(Json(state.mined_page(address, Some(cursor)).await?))
}

/// GET /getMarketCap
pub async fn market_cap(State(state): State<ApiState>) -> Result<Json<serde_json::Value>> {
    Ok(Json(state.call(state.backends.node.market_cap()).await?))
}

/// GET /possibilityLedger - Is a hardware signer attached
pub async fn possibility_ledger(State(state): State<ApiState>) -> Result<Json<bool>> {
    Ok(Json(
        state
            .call(state.backends.credentials.hardware_available())
            .await?,
    ))
}

/// GET /getLedgerWallet/:start/:count
pub async fn ledger_wallet(
    State(state): State<ApiState>,
    ApiPath((start, count)): ApiPath<(String, String)>,
) -> Result<Json<Vec<HardwareAccount>>> {
    let start: u32 = parse_number("startIndex", &start)?;
    let count: u32 = parse_number("count", &count)?;
    Ok(Json(
        state
            .call(state.backends.credentials.hardware_accounts(start, count))
            .await?,
    ))
}

/// GET /sendTxWithLedger/:index/:from/:to/:amount/:fee
///
/// Nonce is the sender's ledger nonce + 1.
pub async fn send_tx_with_ledger(
    State(state): State<ApiState>,
    ApiPath((index, from, to, amount, fee)): ApiPath<(String, String, String, String, String)>,
) -> Result<Json<SubmissionReceipt>> {
    let index: u32 = parse_number("index", &index)?;
    let from = parse_address("from", &from)?;
    let to = parse_address("to", &to)?;
    let amount = parse_amount("amount", &amount)?;
    let fee = parse_amount("fee", &fee)?;

    let info = state.call(state.backends.ledger.address_info(from)).await?;
    let nonce = info
        .nonce
        .checked_add(1)
        .ok_or_else(|| GatewayError::Validation(format!("nonce of {} is exhausted", from)))?;
    let tx = UnsignedTx {
        from,
        to,
        amount,
        fee,
        nonce,
    };
    let signed = state
        .call(state.backends.credentials.hardware_sign(index, tx))
        .await?;

    let receipt = state
        .pipeline
        .submit_signed(signed, state.backends.broadcaster.clone())
        .await?;
    Ok(Json(receipt))
}

// ============================================================================
// Private Handlers: Wallets
// ============================================================================

async fn wallet_page(state: &ApiState, start: usize) -> Result<Json<WalletListResponse>> {
    let wallets = state
        .call(state.backends.credentials.list(start, state.config.page_size))
        .await?;
    Ok(Json(WalletListResponse { start, wallets }))
}

/// GET /wallet
pub async fn list_wallets(State(state): State<ApiState>) -> Result<Json<WalletListResponse>> {
    wallet_page(&state, 0).await
}

/// GET /wallet/:idx
pub async fn list_wallets_from(
    State(state): State<ApiState>,
    ApiPath(idx): ApiPath<String>,
) -> Result<Json<WalletListResponse>> {
    let start: usize = parse_number("idx", &idx)?;
    wallet_page(&state, start).await
}

/// POST /wallet - Import from private key or mnemonic
pub async fn import_wallet(
    State(state): State<ApiState>,
    ApiJson(spec): ApiJson<WalletSpec>,
) -> Result<Json<WalletSummary>> {
    let summary = state.call(state.backends.credentials.import(spec)).await?;
    log::info!("Imported wallet '{}' ({})", summary.name, summary.address);
    Ok(Json(summary))
}

/// POST /recoverWallet
pub async fn recover_wallet(
    State(state): State<ApiState>,
    ApiJson(spec): ApiJson<WalletSpec>,
) -> Result<Json<WalletSummary>> {
    let summary = state.call(state.backends.credentials.recover(spec)).await?;
    log::info!("Recovered wallet '{}' ({})", summary.name, summary.address);
    Ok(Json(summary))
}

/// POST /generateWallet
pub async fn generate_wallet(
    State(state): State<ApiState>,
    ApiJson(spec): ApiJson<WalletSpec>,
) -> Result<Json<WalletSummary>> {
    let summary = state.call(state.backends.credentials.generate(spec)).await?;
    log::info!("Generated wallet '{}' ({})", summary.name, summary.address);
    Ok(Json(summary))
}

/// GET /deleteWallet/:name
pub async fn delete_wallet(
    State(state): State<ApiState>,
    ApiPath(name): ApiPath<String>,
) -> Result<Json<bool>> {
    let deleted = state.call(state.backends.credentials.delete(&name)).await?;
    if deleted {
        log::info!("Deleted wallet '{}'", name);
    }
    Ok(Json(deleted))
}

/// GET /getMnemonic/:lang
pub async fn get_mnemonic(
    State(state): State<ApiState>,
    ApiPath(language): ApiPath<String>,
) -> Result<Json<MnemonicResponse>> {
    let mnemonic = state
        .call(state.backends.credentials.mnemonic(&language))
        .await?;
    Ok(Json(MnemonicResponse { language, mnemonic }))
}

/// GET /hint/:name
pub async fn get_hint(
    State(state): State<ApiState>,
    ApiPath(name): ApiPath<String>,
) -> Result<Json<HintResponse>> {
    let hint = state.call(state.backends.credentials.hint(&name)).await?;
    Ok(Json(HintResponse { name, hint }))
}

/// GET /dupleName/:name
pub async fn duple_name(
    State(state): State<ApiState>,
    ApiPath(name): ApiPath<String>,
) -> Result<Json<bool>> {
    Ok(Json(
        state.call(state.backends.credentials.exists(&name)).await?,
    ))
}

/// POST /addWalletFile - Import from an exported key file
pub async fn add_wallet_file(
    State(state): State<ApiState>,
    ApiJson(req): ApiJson<WalletFileRequest>,
) -> Result<Json<WalletSummary>> {
    let credentials = &state.backends.credentials;
    let summary = state
        .call(credentials.import_file(&req.name, &req.password, &req.key))
        .await?;
    log::info!("Imported wallet file '{}' ({})", summary.name, summary.address);
    Ok(Json(summary))
}

/// GET /favorites
pub async fn favorites(State(state): State<ApiState>) -> Result<Json<Vec<Favorite>>> {
    Ok(Json(
        state.call(state.backends.credentials.favorites()).await?,
    ))
}

/// GET /favorites/add/:alias/:address
pub async fn add_favorite(
    State(state): State<ApiState>,
    ApiPath((alias, address)): ApiPath<(String, String)>,
) -> Result<Json<bool>> {
    let address = parse_address("address", &address)?;
    let added = state
        .call(state.backends.credentials.add_favorite(&alias, address))
        .await?;
    Ok(Json(added))
}

/// GET /favorites/delete/:alias
pub async fn delete_favorite(
    State(state): State<ApiState>,
    ApiPath(alias): ApiPath<String>,
) -> Result<Json<bool>> {
    Ok(Json(
        state
            .call(state.backends.credentials.delete_favorite(&alias))
            .await?,
    ))
}

/// GET /wallet/:account/balance
pub async fn wallet_balance(
    State(state): State<ApiState>,
    ApiPath(account): ApiPath<String>,
) -> Result<Json<AddressInfo>> {
    let address = state.resolve_account(&account).await?;
    Ok(Json(
        state.call(state.backends.ledger.address_info(address)).await?,
    ))
}

/// GET /wallet/detail/:name
pub async fn wallet_detail(
    State(state): State<ApiState>,
    ApiPath(name): ApiPath<String>,
) -> Result<Json<AccountDetail>> {
    let address = state
        .call(state.backends.credentials.address_of(&name))
        .await?
        .ok_or_else(|| GatewayError::NotFound(format!("wallet '{}'", name)))?;
    Ok(Json(state.account_detail(Some(name), address).await?))
}

async fn wallet_txs_below(
    state: &ApiState,
    account: &str,
    below_nonce: Option<u32>,
) -> Result<Json<WalletTxs>> {
    let address = state.resolve_account(account).await?;
    Ok(Json(
        state
            .call(
                state
                    .backends
                    .ledger
                    .wallet_txs(address, below_nonce, state.config.page_size),
            )
            .await?,
    ))
}

/// GET /wallet/:account/txs
pub async fn wallet_txs(
    State(state): State<ApiState>,
    ApiPath(account): ApiPath<String>,
) -> Result<Json<WalletTxs>> {
    wallet_txs_below(&state, &account, None).await
}

/// GET /wallet/:account/txs/:nonce
pub async fn wallet_txs_before(
    State(state): State<ApiState>,
    ApiPath((account, nonce)): ApiPath<(String, String)>,
) -> Result<Json<WalletTxs>> {
    let nonce: u32 = parse_number("nonce", &nonce)?;
    wallet_txs_below(&state, &account, Some(nonce)).await
}

// ============================================================================
// Private Handlers: Callbacks
// ============================================================================

/// PUT /wallet/:account/callback
pub async fn create_callback(
    State(state): State<ApiState>,
    ApiPath(account): ApiPath<String>,
    ApiJson(req): ApiJson<CallbackRequest>,
) -> Result<Json<SubscriptionCreated>> {
    let address = state.resolve_account(&account).await?;
    let id = state.registry.create(address, &req.url, req.from, req.to)?;
    Ok(Json(SubscriptionCreated { id, address }))
}

/// GET /wallet/:account/callback
pub async fn list_callbacks(
    State(state): State<ApiState>,
    ApiPath(account): ApiPath<String>,
) -> Result<Json<Vec<Subscription>>> {
    let address = state.resolve_account(&account).await?;
    Ok(Json(state.registry.list(address)))
}

/// DELETE /wallet/:account/callback/:id
pub async fn delete_callback(
    State(state): State<ApiState>,
    ApiPath((account, id)): ApiPath<(String, String)>,
) -> Result<Json<SubscriptionDeleted>> {
    let id: u64 = parse_number("id", &id)?;
    let address = state.resolve_account(&account).await?;
    state.registry.delete(address, id)?;
    Ok(Json(SubscriptionDeleted {
        id,
        address,
        deleted: true,
    }))
}

// ============================================================================
// Private Handlers: Transactions
// ============================================================================

/// POST /signedtx - Sign with a raw private key and submit
pub async fn signed_tx(
    State(state): State<ApiState>,
    ApiJson(req): ApiJson<SignedTxRequest>,
) -> Result<Json<SubmissionReceipt>> {
    let fields = tx_fields(req.from.as_deref(), &req.to, req.amount, req.fee, req.nonce)?;
    let receipt = state
        .pipeline
        .submit_with_credential(
            fields,
            Credential::PrivateKey(req.private_key),
            state.backends.broadcaster.clone(),
        )
        .await?;
    Ok(Json(receipt))
}

/// POST /transaction - Sign with a stored wallet and submit
pub async fn wallet_transaction(
    State(state): State<ApiState>,
    ApiJson(req): ApiJson<WalletTxRequest>,
) -> Result<Json<SubmissionReceipt>> {
    let fields = tx_fields(req.from.as_deref(), &req.to, req.amount, req.fee, req.nonce)?;
    let receipt = state
        .pipeline
        .submit_with_credential(
            fields,
            Credential::Wallet {
                name: req.name,
                password: req.password,
            },
            state.backends.broadcaster.clone(),
        )
        .await?;
    Ok(Json(receipt))
}

// ============================================================================
// Private Handlers: Chain
// ============================================================================

/// GET /block/height/:height
pub async fn block_at_height(
    State(state): State<ApiState>,
    ApiPath(height): ApiPath<String>,
) -> Result<Json<BlockInfo>> {
    let height: u64 = parse_number("height", &height)?;
    state
        .call(state.backends.ledger.block_at_height(height))
        .await?
        .map(Json)
        .ok_or_else(|| GatewayError::NotFound(format!("block at height {}", height)))
}

/// GET /blockList/:index
pub async fn block_list(
    State(state): State<ApiState>,
    ApiPath(index): ApiPath<String>,
) -> Result<Json<Vec<BlockInfo>>> {
    let index: u32 = parse_number("index", &index)?;
    if index == 0 {
        return Err(GatewayError::Validation("index must start at 1".into()));
    }
    Ok(Json(
        state
            .call(state.backends.ledger.block_list(index, state.config.page_size))
            .await?,
    ))
}

/// GET /toptipHeight
pub async fn top_tip_height(State(state): State<ApiState>) -> Result<Json<TipResponse>> {
    let height = state.call(state.backends.ledger.top_tip_height()).await?;
    Ok(Json(TipResponse { height }))
}

// ============================================================================
// Private Handlers: Node Control
// ============================================================================

/// GET /getMiner
pub async fn get_miner(State(state): State<ApiState>) -> Result<Json<MinerStatus>> {
    Ok(Json(state.call(state.backends.node.miner()).await?))
}

/// GET /setMiner/:address
pub async fn set_miner(
    State(state): State<ApiState>,
    ApiPath(address): ApiPath<String>,
) -> Result<Json<bool>> {
    let address = parse_address("address", &address)?;
    let changed = state.call(state.backends.node.set_miner(address)).await?;
    log::info!("Miner address set to {}", address);
    Ok(Json(changed))
}

/// GET /startGPU
pub async fn start_gpu(State(state): State<ApiState>) -> Result<Json<bool>> {
    Ok(Json(state.call(state.backends.node.start_gpu()).await?))
}

/// GET /setMinerCount/:count
pub async fn set_miner_count(
    State(state): State<ApiState>,
    ApiPath(count): ApiPath<String>,
) -> Result<Json<bool>> {
    let count: u32 = parse_number("count", &count)?;
    Ok(Json(
        state.call(state.backends.node.set_miner_count(count)).await?,
    ))
}

/// GET /peerList
pub async fn peer_list(State(state): State<ApiState>) -> Result<Json<Vec<PeerInfo>>> {
    Ok(Json(state.call(state.backends.node.peers()).await?))
}

/// GET /peerConnected/:index
pub async fn peer_connected(
    State(state): State<ApiState>,
    ApiPath(index): ApiPath<String>,
) -> Result<Json<Vec<PeerInfo>>> {
    let index: usize = parse_number("index", &index)?;
    if index == 0 {
        return Err(GatewayError::Validation("index must start at 1".into()));
    }
    Ok(Json(
        state.call(state.backends.node.peer_connected(index)).await?,
    ))
}
