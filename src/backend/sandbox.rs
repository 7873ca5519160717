//! In-memory node for local development and tests
//!
//! Implements every collaborator interface against process-local state.
//! Accepted transactions wait in the pending pool until `mine_block`
//! confirms them into a new block. Wallet keys never leave memory.

use super::{
    BackendError, BackendResult, Broadcaster, CredentialStore, LedgerIndex, NodeControl, TxPool,
};
use crate::core::{
    Address, AddressInfo, BlockInfo, Favorite, HardwareAccount, Hash, MinedBlock, MinerStatus,
    PeerInfo, SignedTx, TxRecord, UnsignedTx, WalletSpec, WalletSummary, WalletTxs,
};
use crate::crypto::{sha256, KeyPair};
use async_trait::async_trait;
use rand::Rng;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::RwLock;

// =============================================================================
// Configuration
// =============================================================================

/// Reward paid to the miner of every sandbox block, on top of fees
pub const BLOCK_REWARD: u64 = 50;

/// Default maximum pending pool size
pub const DEFAULT_MEMPOOL_SIZE: usize = 10000;

/// Peers returned per `peer_connected` page
pub const PEER_PAGE_SIZE: usize = 20;

const SANDBOX_DIFFICULTY: u32 = 16;

const MNEMONIC_WORDS: usize = 12;

const WORD_LIST: [&str; 64] = [
    "able", "acid", "aunt", "baby", "bench", "blue", "cabin", "cargo", "chalk", "cliff", "coral",
    "crane", "daisy", "delta", "dune", "eagle", "ember", "fable", "ferry", "flint", "frost",
    "globe", "grain", "harbor", "hazel", "ivory", "jelly", "kayak", "lemon", "lunar", "maple",
    "meadow", "noble", "oasis", "olive", "orbit", "pearl", "pilot", "prism", "quartz", "raven",
    "ridge", "river", "saddle", "sable", "shell", "solar", "spice", "stone", "tango", "thorn",
    "tidal", "tulip", "umber", "valley", "velvet", "vivid", "walnut", "willow", "wren", "yield",
    "zebra", "zenith", "zinc",
];

// =============================================================================
// Error Types
// =============================================================================

/// Why the pending pool refused a transaction
#[derive(Error, Debug, PartialEq, Eq)]
pub enum MempoolError {
    #[error("Transaction {0} already exists")]
    DuplicateTransaction(Hash),
    #[error("Signature does not recover to {0}")]
    InvalidSignature(Address),
    #[error("Stale nonce {nonce} for {address}: must be above {last}")]
    StaleNonce {
        address: Address,
        nonce: u32,
        last: u32,
    },
    #[error("Mempool full")]
    MempoolFull,
}

// =============================================================================
// Ledger State
// =============================================================================

struct SandboxBlock {
    info: BlockInfo,
    /// Block order; the reward transaction comes first
    txs: Vec<TxRecord>,
}

struct LedgerState {
    blocks: Vec<SandboxBlock>,
    block_index: HashMap<Hash, usize>,
    /// Confirmed transactions
    txs: HashMap<Hash, TxRecord>,
    /// Confirmed transaction hashes per address, oldest first
    history: HashMap<Address, Vec<Hash>>,
    /// Mined blocks per miner, oldest first
    mined: HashMap<Address, Vec<MinedBlock>>,
    balances: HashMap<Address, u64>,
    /// Last confirmed nonce per sender
    nonces: HashMap<Address, u32>,
    /// Arrival order
    pending: Vec<(SignedTx, TxRecord)>,
    pending_hashes: HashSet<Hash>,
    max_pending: usize,
}

impl LedgerState {
    fn new(max_pending: usize) -> Self {
        let timestamp = chrono::Utc::now().timestamp_millis();
        let zero = Hash::from_bytes([0u8; 32]);
        let merkle_root = tx_root(&[]);
        let info = BlockInfo {
            hash: block_hash(&zero, 0, &merkle_root, timestamp, None),
            height: 0,
            previous_hash: zero,
            merkle_root,
            timestamp,
            difficulty: SANDBOX_DIFFICULTY,
            tx_count: 0,
            miner: None,
        };
        let mut block_index = HashMap::new();
        block_index.insert(info.hash, 0);
        Self {
            blocks: vec![SandboxBlock {
                info,
                txs: Vec::new(),
            }],
            block_index,
            txs: HashMap::new(),
            history: HashMap::new(),
            mined: HashMap::new(),
            balances: HashMap::new(),
            nonces: HashMap::new(),
            pending: Vec::new(),
            pending_hashes: HashSet::new(),
            max_pending,
        }
    }

    fn tip(&self) -> &BlockInfo {
        // genesis is created with the state, so there is always a tip
        &self.blocks[self.blocks.len() - 1].info
    }

    /// Highest nonce used by `address`, pending transactions included
    fn last_nonce(&self, address: Address) -> u32 {
        let confirmed = self.nonces.get(&address).copied().unwrap_or(0);
        self.pending
            .iter()
            .filter(|(tx, _)| tx.tx.from == address)
            .map(|(tx, _)| tx.tx.nonce)
            .fold(confirmed, u32::max)
    }

    fn admit(&mut self, tx: SignedTx, timestamp: i64) -> Result<TxRecord, MempoolError> {
        let hash = tx.hash();
        if self.pending_hashes.contains(&hash) || self.txs.contains_key(&hash) {
            return Err(MempoolError::DuplicateTransaction(hash));
        }
        if self.pending.len() >= self.max_pending {
            return Err(MempoolError::MempoolFull);
        }
        if !tx.verify() {
            return Err(MempoolError::InvalidSignature(tx.tx.from));
        }
        let last = self.last_nonce(tx.tx.from);
        if tx.tx.nonce <= last {
            return Err(MempoolError::StaleNonce {
                address: tx.tx.from,
                nonce: tx.tx.nonce,
                last,
            });
        }

        let record = TxRecord {
            hash,
            from: Some(tx.tx.from),
            to: tx.tx.to,
            amount: tx.tx.amount,
            fee: tx.tx.fee,
            nonce: tx.tx.nonce,
            block_hash: None,
            height: None,
            timestamp,
        };
        self.pending_hashes.insert(hash);
        self.pending.push((tx, record.clone()));
        Ok(record)
    }

    fn apply(&mut self, block: SandboxBlock, reward: MinedBlock) {
        for record in &block.txs {
            if let Some(from) = record.from {
                let balance = self.balances.entry(from).or_insert(0);
                *balance = balance.saturating_sub(record.amount.saturating_add(record.fee));
                let nonce = self.nonces.entry(from).or_insert(0);
                *nonce = (*nonce).max(record.nonce);
                self.history.entry(from).or_default().push(record.hash);
            }
            *self.balances.entry(record.to).or_insert(0) += record.amount;
            if record.from != Some(record.to) {
                self.history.entry(record.to).or_default().push(record.hash);
            }
            self.txs.insert(record.hash, record.clone());
        }
        self.mined.entry(reward.miner).or_default().push(reward);
        self.block_index.insert(block.info.hash, self.blocks.len());
        self.blocks.push(block);
    }

    fn address_history(&self, address: Address) -> Vec<&TxRecord> {
        self.history
            .get(&address)
            .map(|hashes| hashes.iter().rev().filter_map(|h| self.txs.get(h)).collect())
            .unwrap_or_default()
    }
}

// =============================================================================
// Credentials
// =============================================================================

struct StoredWallet {
    key: KeyPair,
    password: String,
    hint: Option<String>,
}

fn required_name(spec: &WalletSpec) -> BackendResult<String> {
    match spec.name.as_deref().map(str::trim) {
        Some(name) if !name.is_empty() => Ok(name.to_string()),
        _ => Err(BackendError::Rejected("wallet name is required".into())),
    }
}

/// Deterministic key for a phrase. Not BIP39: sandbox wallets only need to
/// come back identical when recovered with the same words.
fn key_from_mnemonic(mnemonic: &str, passphrase: Option<&str>) -> BackendResult<KeyPair> {
    let words: Vec<&str> = mnemonic.split_whitespace().collect();
    if words.is_empty() {
        return Err(BackendError::Rejected("mnemonic is empty".into()));
    }
    let seed = format!("{}\n{}", words.join(" "), passphrase.unwrap_or(""));
    KeyPair::from_private_key_hex(&hex::encode(sha256(seed.as_bytes())))
        .map_err(|e| BackendError::Rejected(e.to_string()))
}

// =============================================================================
// Sandbox Node
// =============================================================================

pub struct SandboxNode {
    ledger: RwLock<LedgerState>,
    wallets: RwLock<BTreeMap<String, StoredWallet>>,
    favorites: RwLock<BTreeMap<String, Address>>,
    hardware: Vec<KeyPair>,
    miner: RwLock<MinerStatus>,
    peers: RwLock<Vec<PeerInfo>>,
    broadcasts: RwLock<Vec<Vec<SignedTx>>>,
    fail_broadcasts: AtomicBool,
    latency_ms: AtomicU64,
}

impl Default for SandboxNode {
    fn default() -> Self {
        Self::new()
    }
}

impl SandboxNode {
    pub fn new() -> Self {
        Self::with_mempool_size(DEFAULT_MEMPOOL_SIZE)
    }

    pub fn with_mempool_size(max_pending: usize) -> Self {
        Self {
            ledger: RwLock::new(LedgerState::new(max_pending)),
            wallets: RwLock::new(BTreeMap::new()),
            favorites: RwLock::new(BTreeMap::new()),
            hardware: Vec::new(),
            miner: RwLock::new(MinerStatus {
                miner_address: None,
                cpu_miner_count: 1,
                gpu_running: false,
            }),
            peers: RwLock::new(Vec::new()),
            broadcasts: RwLock::new(Vec::new()),
            fail_broadcasts: AtomicBool::new(false),
            latency_ms: AtomicU64::new(0),
        }
    }

    /// Attach a simulated hardware signer exposing `count` accounts
    pub fn with_hardware_accounts(mut self, count: u32) -> Self {
        self.hardware = (0..count).map(|_| KeyPair::generate()).collect();
        self
    }

    /// Grant spendable balance outside of mining
    pub async fn credit(&self, address: Address, amount: u64) {
        let mut ledger = self.ledger.write().await;
        *ledger.balances.entry(address).or_insert(0) += amount;
    }

    /// Confirm every pending transaction into a new block
    pub async fn mine_block(&self, miner: Address) -> BlockInfo {
        let mut ledger = self.ledger.write().await;
        let pending = std::mem::take(&mut ledger.pending);
        ledger.pending_hashes.clear();

        let tip = ledger.tip().clone();
        let height = tip.height + 1;
        let timestamp = chrono::Utc::now().timestamp_millis().max(tip.timestamp + 1);
        let fees: u64 = pending.iter().map(|(tx, _)| tx.tx.fee).sum();

        let mut reward_seed = Vec::with_capacity(6 + 32 + 8 + 20);
        reward_seed.extend_from_slice(b"reward");
        reward_seed.extend_from_slice(tip.hash.as_bytes());
        reward_seed.extend_from_slice(&height.to_be_bytes());
        reward_seed.extend_from_slice(miner.as_bytes());
        let reward_tx = TxRecord {
            hash: Hash::from_bytes(sha256(&reward_seed)),
            from: None,
            to: miner,
            amount: BLOCK_REWARD + fees,
            fee: 0,
            nonce: 0,
            block_hash: None,
            height: None,
            timestamp,
        };

        let mut txs = vec![reward_tx];
        txs.extend(pending.into_iter().map(|(_, record)| record));
        let merkle_root = tx_root(&txs);
        let hash = block_hash(&tip.hash, height, &merkle_root, timestamp, Some(&miner));
        for record in &mut txs {
            record.block_hash = Some(hash);
            record.height = Some(height);
        }

        let info = BlockInfo {
            hash,
            height,
            previous_hash: tip.hash,
            merkle_root,
            timestamp,
            difficulty: SANDBOX_DIFFICULTY,
            tx_count: txs.len(),
            miner: Some(miner),
        };
        let reward = MinedBlock {
            block_hash: hash,
            height,
            miner,
            fee_reward: BLOCK_REWARD + fees,
            timestamp,
        };
        log::info!("Sandbox mined block {} at height {} ({} txs)", hash, height, txs.len());
        ledger.apply(
            SandboxBlock {
                info: info.clone(),
                txs,
            },
            reward,
        );
        info
    }

    pub async fn add_peer(&self, peer: PeerInfo) {
        self.peers.write().await.push(peer);
    }

    /// Every batch handed to `broadcast_txs`, oldest first
    pub async fn broadcasts(&self) -> Vec<Vec<SignedTx>> {
        self.broadcasts.read().await.clone()
    }

    pub async fn pending_count(&self) -> usize {
        self.ledger.read().await.pending.len()
    }

    /// Make `broadcast_txs` fail until reset
    pub fn fail_broadcasts(&self, fail: bool) {
        self.fail_broadcasts.store(fail, Ordering::SeqCst);
    }

    /// Delay applied to every mempool and ledger call
    pub fn set_latency(&self, latency: Duration) {
        let ms = u64::try_from(latency.as_millis()).unwrap_or(u64::MAX);
        self.latency_ms.store(ms, Ordering::SeqCst);
    }

    async fn pause(&self) {
        let ms = self.latency_ms.load(Ordering::SeqCst);
        if ms > 0 {
            tokio::time::sleep(Duration::from_millis(ms)).await;
        }
    }

    async fn insert_wallet(
        &self,
        name: String,
        key: KeyPair,
        spec: &WalletSpec,
    ) -> BackendResult<WalletSummary> {
        let mut wallets = self.wallets.write().await;
        if wallets.contains_key(&name) {
            return Err(BackendError::Duplicate(format!("wallet '{}'", name)));
        }
        let address = Address::from_key_pair(&key);
        wallets.insert(
            name.clone(),
            StoredWallet {
                key,
                password: spec.password.clone().unwrap_or_default(),
                hint: spec.hint.clone().filter(|h| !h.is_empty()),
            },
        );
        log::info!("Wallet '{}' stored for {}", name, address);
        Ok(WalletSummary { name, address })
    }
}

fn tx_root(txs: &[TxRecord]) -> Hash {
    let mut data = Vec::with_capacity(txs.len() * 32);
    for tx in txs {
        data.extend_from_slice(tx.hash.as_bytes());
    }
    Hash::from_bytes(sha256(&data))
}

fn block_hash(
    previous: &Hash,
    height: u64,
    merkle_root: &Hash,
    timestamp: i64,
    miner: Option<&Address>,
) -> Hash {
    let mut data = Vec::with_capacity(32 + 8 + 32 + 8 + 20);
    data.extend_from_slice(previous.as_bytes());
    data.extend_from_slice(&height.to_be_bytes());
    data.extend_from_slice(merkle_root.as_bytes());
    data.extend_from_slice(&timestamp.to_be_bytes());
    if let Some(miner) = miner {
        data.extend_from_slice(miner.as_bytes());
    }
    Hash::from_bytes(sha256(&data))
}

/// Up to `limit` items strictly older than `before`; `None` if `before` is
/// not in the list
fn page_before<T: Clone>(
    newest_first: Vec<&T>,
    anchor: impl Fn(&T) -> Hash,
    before: Option<Hash>,
    limit: usize,
) -> Option<Vec<T>> {
    let start = match before {
        None => 0,
        Some(before) => newest_first.iter().position(|&item| anchor(item) == before)? + 1,
    };
    Some(
        newest_first
            .into_iter()
            .skip(start)
            .take(limit)
            .cloned()
            .collect(),
    )
}

/// Items of 1-based page `index`
fn page_at<T: Clone>(
    items: impl Iterator<Item = T>,
    index: u32,
    limit: usize,
) -> BackendResult<Vec<T>> {
    if index == 0 {
        return Err(BackendError::Rejected("page index starts at 1".into()));
    }
    let skip = (index as usize - 1).saturating_mul(limit);
    Ok(items.skip(skip).take(limit).collect())
}

// =============================================================================
// Collaborator Implementations
// =============================================================================

#[async_trait]
impl TxPool for SandboxNode {
    async fn put_txs(&self, txs: Vec<SignedTx>) -> BackendResult<Vec<SignedTx>> {
        self.pause().await;
        let now = chrono::Utc::now().timestamp_millis();
        let mut ledger = self.ledger.write().await;
        let mut accepted = Vec::with_capacity(txs.len());
        for tx in txs {
            match ledger.admit(tx.clone(), now) {
                Ok(record) => {
                    log::debug!("Mempool accepted {}", record.hash);
                    accepted.push(tx);
                }
                Err(e) => log::info!("Mempool rejected {}: {}", tx.hash(), e),
            }
        }
        Ok(accepted)
    }
}

#[async_trait]
impl Broadcaster for SandboxNode {
    async fn broadcast_txs(&self, txs: &[SignedTx]) -> BackendResult<()> {
        if self.fail_broadcasts.load(Ordering::SeqCst) {
            return Err(BackendError::Unavailable("no peers reachable".into()));
        }
        self.broadcasts.write().await.push(txs.to_vec());
        Ok(())
    }
}

#[async_trait]
impl LedgerIndex for SandboxNode {
    async fn block(&self, hash: Hash) -> BackendResult<Option<BlockInfo>> {
        self.pause().await;
        let ledger = self.ledger.read().await;
        Ok(ledger
            .block_index
            .get(&hash)
            .map(|&i| ledger.blocks[i].info.clone()))
    }

    async fn block_at_height(&self, height: u64) -> BackendResult<Option<BlockInfo>> {
        self.pause().await;
        let ledger = self.ledger.read().await;
        Ok(usize::try_from(height)
            .ok()
            .and_then(|h| ledger.blocks.get(h))
            .map(|b| b.info.clone()))
    }

    async fn block_list(&self, index: u32, limit: usize) -> BackendResult<Vec<BlockInfo>> {
        self.pause().await;
        let ledger = self.ledger.read().await;
        page_at(ledger.blocks.iter().rev().map(|b| b.info.clone()), index, limit)
    }

    async fn top_tip_height(&self) -> BackendResult<u64> {
        self.pause().await;
        Ok(self.ledger.read().await.tip().height)
    }

    async fn tx(&self, hash: Hash) -> BackendResult<Option<TxRecord>> {
        self.pause().await;
        let ledger = self.ledger.read().await;
        if let Some(record) = ledger.txs.get(&hash) {
            return Ok(Some(record.clone()));
        }
        Ok(ledger
            .pending
            .iter()
            .find(|(_, record)| record.hash == hash)
            .map(|(_, record)| record.clone()))
    }

    async fn address_info(&self, address: Address) -> BackendResult<AddressInfo> {
        self.pause().await;
        let ledger = self.ledger.read().await;
        let pending_amount = ledger
            .pending
            .iter()
            .filter(|(tx, _)| tx.tx.from == address)
            .map(|(tx, _)| tx.tx.amount.saturating_add(tx.tx.fee))
            .fold(0u64, u64::saturating_add);
        Ok(AddressInfo {
            address,
            balance: ledger.balances.get(&address).copied().unwrap_or(0),
            pending_amount,
            nonce: ledger.nonces.get(&address).copied().unwrap_or(0),
        })
    }

    async fn address_txs(
        &self,
        address: Address,
        before: Option<Hash>,
        limit: usize,
    ) -> BackendResult<Option<Vec<TxRecord>>> {
        self.pause().await;
        let ledger = self.ledger.read().await;
        Ok(page_before(ledger.address_history(address), |r| r.hash, before, limit))
    }

    async fn block_txs(
        &self,
        block: Hash,
        before: Option<Hash>,
        limit: usize,
    ) -> BackendResult<Option<Vec<TxRecord>>> {
        self.pause().await;
        let ledger = self.ledger.read().await;
        let index = ledger
            .block_index
            .get(&block)
            .copied()
            .ok_or_else(|| BackendError::NotFound(format!("block {}", block)))?;
        let txs: Vec<&TxRecord> = ledger.blocks[index].txs.iter().rev().collect();
        Ok(page_before(txs, |r| r.hash, before, limit))
    }

    async fn mined_blocks(
        &self,
        miner: Address,
        before: Option<Hash>,
        limit: usize,
    ) -> BackendResult<Option<Vec<MinedBlock>>> {
        self.pause().await;
        let ledger = self.ledger.read().await;
        let mined: Vec<&MinedBlock> = ledger
            .mined
            .get(&miner)
            .map(|blocks| blocks.iter().rev().collect())
            .unwrap_or_default();
        Ok(page_before(mined, |m| m.block_hash, before, limit))
    }

    async fn pending_txs(
        &self,
        before: Option<Hash>,
        limit: usize,
    ) -> BackendResult<Option<Vec<TxRecord>>> {
        self.pause().await;
        let ledger = self.ledger.read().await;
        let pending: Vec<&TxRecord> = ledger.pending.iter().rev().map(|(_, r)| r).collect();
        Ok(page_before(pending, |r| r.hash, before, limit))
    }

    async fn wallet_txs(
        &self,
        address: Address,
        below_nonce: Option<u32>,
        limit: usize,
    ) -> BackendResult<WalletTxs> {
        self.pause().await;
        let ledger = self.ledger.read().await;
        let txs = ledger
            .address_history(address)
            .into_iter()
            .filter(|r| below_nonce.map_or(true, |n| r.nonce < n))
            .take(limit)
            .cloned()
            .collect();
        let pendings = ledger
            .pending
            .iter()
            .rev()
            .map(|(_, r)| r)
            .filter(|r| r.from == Some(address) || r.to == address)
            .cloned()
            .collect();
        Ok(WalletTxs { txs, pendings })
    }
}

#[async_trait]
impl CredentialStore for SandboxNode {
    async fn list(&self, start: usize, limit: usize) -> BackendResult<Vec<WalletSummary>> {
        let wallets = self.wallets.read().await;
        Ok(wallets
            .iter()
            .skip(start)
            .take(limit)
            .map(|(name, w)| WalletSummary {
                name: name.clone(),
                address: Address::from_key_pair(&w.key),
            })
            .collect())
    }

    async fn import(&self, spec: WalletSpec) -> BackendResult<WalletSummary> {
        let name = required_name(&spec)?;
        let key = match (spec.private_key.as_deref(), spec.mnemonic.as_deref()) {
            (Some(private_key), _) => KeyPair::from_private_key_hex(private_key)
                .map_err(|e| BackendError::Rejected(e.to_string()))?,
            (None, Some(mnemonic)) => key_from_mnemonic(mnemonic, spec.passphrase.as_deref())?,
            (None, None) => {
                return Err(BackendError::Rejected(
                    "privateKey or mnemonic is required".into(),
                ))
            }
        };
        self.insert_wallet(name, key, &spec).await
    }

    async fn generate(&self, spec: WalletSpec) -> BackendResult<WalletSummary> {
        let name = required_name(&spec)?;
        let key = match spec.mnemonic.as_deref() {
            Some(mnemonic) => key_from_mnemonic(mnemonic, spec.passphrase.as_deref())?,
            None => KeyPair::generate(),
        };
        self.insert_wallet(name, key, &spec).await
    }

    async fn recover(&self, spec: WalletSpec) -> BackendResult<WalletSummary> {
        let name = required_name(&spec)?;
        let mnemonic = spec
            .mnemonic
            .as_deref()
            .ok_or_else(|| BackendError::Rejected("mnemonic is required".into()))?;
        let key = key_from_mnemonic(mnemonic, spec.passphrase.as_deref())?;
        self.insert_wallet(name, key, &spec).await
    }

    async fn delete(&self, name: &str) -> BackendResult<bool> {
        Ok(self.wallets.write().await.remove(name).is_some())
    }

    async fn address_of(&self, name: &str) -> BackendResult<Option<Address>> {
        let wallets = self.wallets.read().await;
        Ok(wallets.get(name).map(|w| Address::from_key_pair(&w.key)))
    }

    async fn signing_key(&self, name: &str, password: &str) -> BackendResult<String> {
        let wallets = self.wallets.read().await;
        let wallet = wallets
            .get(name)
            .ok_or_else(|| BackendError::NotFound(format!("wallet '{}'", name)))?;
        if wallet.password != password {
            return Err(BackendError::Rejected(format!(
                "wrong password for wallet '{}'",
                name
            )));
        }
        Ok(wallet.key.private_key_hex())
    }

    async fn mnemonic(&self, language: &str) -> BackendResult<String> {
        if !language.eq_ignore_ascii_case("english") {
            return Err(BackendError::Rejected(format!(
                "unsupported mnemonic language '{}'",
                language
            )));
        }
        let mut rng = rand::thread_rng();
        let words: Vec<&str> = (0..MNEMONIC_WORDS)
            .map(|_| WORD_LIST[rng.gen_range(0..WORD_LIST.len())])
            .collect();
        Ok(words.join(" "))
    }

    async fn hint(&self, name: &str) -> BackendResult<Option<String>> {
        let wallets = self.wallets.read().await;
        wallets
            .get(name)
            .map(|w| w.hint.clone())
            .ok_or_else(|| BackendError::NotFound(format!("wallet '{}'", name)))
    }

    async fn exists(&self, name: &str) -> BackendResult<bool> {
        Ok(self.wallets.read().await.contains_key(name))
    }

    async fn hardware_available(&self) -> BackendResult<bool> {
        Ok(!self.hardware.is_empty())
    }

    async fn hardware_accounts(
        &self,
        start: u32,
        count: u32,
    ) -> BackendResult<Vec<HardwareAccount>> {
        if self.hardware.is_empty() {
            return Err(BackendError::Unavailable("no hardware signer attached".into()));
        }
        Ok((start..start.saturating_add(count))
            .filter_map(|index| {
                self.hardware.get(index as usize).map(|key| HardwareAccount {
                    index,
                    address: Address::from_key_pair(key),
                })
            })
            .collect())
    }

    async fn hardware_sign(&self, index: u32, tx: UnsignedTx) -> BackendResult<SignedTx> {
        let key = self
            .hardware
            .get(index as usize)
            .ok_or_else(|| BackendError::NotFound(format!("hardware account {}", index)))?;
        tx.sign(key).map_err(|e| BackendError::Rejected(e.to_string()))
    }

    /// Sandbox key files hold the hex private key as text
    async fn import_file(
        &self,
        name: &str,
        password: &str,
        key_file: &str,
    ) -> BackendResult<WalletSummary> {
        let spec = WalletSpec {
            name: Some(name.to_string()),
            password: Some(password.to_string()),
            ..Default::default()
        };
        let name = required_name(&spec)?;
        let key = KeyPair::from_private_key_hex(key_file.trim())
            .map_err(|e| BackendError::Rejected(format!("key file: {}", e)))?;
        self.insert_wallet(name, key, &spec).await
    }

    async fn favorites(&self) -> BackendResult<Vec<Favorite>> {
        let favorites = self.favorites.read().await;
        Ok(favorites
            .iter()
            .map(|(alias, address)| Favorite {
                alias: alias.clone(),
                address: *address,
            })
            .collect())
    }

    async fn add_favorite(&self, alias: &str, address: Address) -> BackendResult<bool> {
        let alias = alias.trim();
        if alias.is_empty() {
            return Err(BackendError::Rejected("alias is required".into()));
        }
        let mut favorites = self.favorites.write().await;
        if favorites.contains_key(alias) {
            return Ok(false);
        }
        favorites.insert(alias.to_string(), address);
        Ok(true)
    }

    async fn delete_favorite(&self, alias: &str) -> BackendResult<bool> {
        Ok(self.favorites.write().await.remove(alias.trim()).is_some())
    }
}

#[async_trait]
impl NodeControl for SandboxNode {
    async fn miner(&self) -> BackendResult<MinerStatus> {
        Ok(self.miner.read().await.clone())
    }

    async fn set_miner(&self, address: Address) -> BackendResult<bool> {
        self.miner.write().await.miner_address = Some(address);
        Ok(true)
    }

    async fn start_gpu(&self) -> BackendResult<bool> {
        self.miner.write().await.gpu_running = true;
        Ok(true)
    }

    async fn set_miner_count(&self, count: u32) -> BackendResult<bool> {
        self.miner.write().await.cpu_miner_count = count;
        Ok(true)
    }

    async fn peers(&self) -> BackendResult<Vec<PeerInfo>> {
        Ok(self.peers.read().await.clone())
    }

    async fn peer_connected(&self, index: usize) -> BackendResult<Vec<PeerInfo>> {
        let peers = self.peers.read().await;
        let index = u32::try_from(index)
            .map_err(|_| BackendError::Rejected(format!("page index {} is too large", index)))?;
        page_at(
            peers.iter().filter(|p| p.connected).cloned(),
            index,
            PEER_PAGE_SIZE,
        )
    }

    async fn market_cap(&self) -> BackendResult<serde_json::Value> {
        let ledger = self.ledger.read().await;
        let total: u64 = ledger.balances.values().fold(0u64, |a, b| a.saturating_add(*b));
        let mined: u64 = ledger
            .mined
            .values()
            .flatten()
            .map(|m| m.fee_reward)
            .fold(0u64, u64::saturating_add);
        Ok(serde_json::json!({
            "totalSupply": total.to_string(),
            "minedSupply": mined.to_string(),
            "height": ledger.tip().height,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signed(kp: &KeyPair, to: Address, nonce: u32) -> SignedTx {
        UnsignedTx {
            from: Address::from_key_pair(kp),
            to,
            amount: 100,
            fee: 1,
            nonce,
        }
        .sign(kp)
        .unwrap()
    }

    #[tokio::test]
    async fn test_mempool_rejects_duplicates() {
        let node = SandboxNode::new();
        let kp = KeyPair::generate();
        let tx = signed(&kp, Address::from_bytes([2u8; 20]), 1);

        let accepted = node.put_txs(vec![tx.clone()]).await.unwrap();
        assert_eq!(accepted, vec![tx.clone()]);
        let accepted = node.put_txs(vec![tx]).await.unwrap();
        assert!(accepted.is_empty());
        assert_eq!(node.pending_count().await, 1);
    }

    #[tokio::test]
    async fn test_mempool_rejects_stale_nonce_and_bad_signature() {
        let node = SandboxNode::new();
        let kp = KeyPair::generate();
        let to = Address::from_bytes([2u8; 20]);

        let first = signed(&kp, to, 5);
        let stale = signed(&kp, to, 4);
        let mut forged = signed(&kp, to, 6);
        forged.tx.amount = 1_000_000;

        let accepted = node.put_txs(vec![first.clone(), stale, forged]).await.unwrap();
        assert_eq!(accepted, vec![first]);
    }

    #[tokio::test]
    async fn test_mempool_full() {
        let node = SandboxNode::with_mempool_size(1);
        let kp = KeyPair::generate();
        let to = Address::from_bytes([2u8; 20]);
        let accepted = node
            .put_txs(vec![signed(&kp, to, 1), signed(&kp, to, 2)])
            .await
            .unwrap();
        assert_eq!(accepted.len(), 1);
    }

    #[tokio::test]
    async fn test_mine_block_confirms_pending() {
        let node = SandboxNode::new();
        let kp = KeyPair::generate();
        let from = Address::from_key_pair(&kp);
        let to = Address::from_bytes([2u8; 20]);
        let miner = Address::from_bytes([9u8; 20]);
        node.credit(from, 1_000).await;

        let tx = signed(&kp, to, 1);
        node.put_txs(vec![tx.clone()]).await.unwrap();
        assert_eq!(node.address_info(from).await.unwrap().pending_amount, 101);

        let block = node.mine_block(miner).await;
        assert_eq!(block.height, 1);
        assert_eq!(block.tx_count, 2);
        assert_eq!(node.top_tip_height().await.unwrap(), 1);
        assert_eq!(node.pending_count().await, 0);

        let info = node.address_info(from).await.unwrap();
        assert_eq!(info.balance, 899);
        assert_eq!(info.nonce, 1);
        assert_eq!(info.pending_amount, 0);
        assert_eq!(node.address_info(to).await.unwrap().balance, 100);

        let record = node.tx(tx.hash()).await.unwrap().unwrap();
        assert_eq!(record.block_hash, Some(block.hash));

        let mined = node.mined_blocks(miner, None, 10).await.unwrap().unwrap();
        assert_eq!(mined.len(), 1);
        assert_eq!(mined[0].fee_reward, BLOCK_REWARD + 1);

        // confirmed nonce still blocks replays
        assert!(node.put_txs(vec![signed(&kp, to, 1)]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_history_paging() {
        let node = SandboxNode::new();
        let kp = KeyPair::generate();
        let from = Address::from_key_pair(&kp);
        let to = Address::from_bytes([2u8; 20]);
        let txs: Vec<SignedTx> = (1..=5).map(|n| signed(&kp, to, n)).collect();
        node.put_txs(txs.clone()).await.unwrap();
        node.mine_block(Address::from_bytes([9u8; 20])).await;

        let first = node.address_txs(from, None, 3).await.unwrap().unwrap();
        let nonces: Vec<u32> = first.iter().map(|r| r.nonce).collect();
        assert_eq!(nonces, vec![5, 4, 3]);

        let rest = node
            .address_txs(from, Some(first[2].hash), 3)
            .await
            .unwrap()
            .unwrap();
        let nonces: Vec<u32> = rest.iter().map(|r| r.nonce).collect();
        assert_eq!(nonces, vec![2, 1]);

        let unknown = Hash::from_bytes([0xee; 32]);
        assert!(node.address_txs(from, Some(unknown), 3).await.unwrap().is_none());

        let wallet = node.wallet_txs(from, Some(3), 10).await.unwrap();
        assert_eq!(wallet.txs.len(), 2);
        assert!(wallet.pendings.is_empty());
    }

    #[tokio::test]
    async fn test_block_list_pages() {
        let node = SandboxNode::new();
        for _ in 0..4 {
            node.mine_block(Address::from_bytes([9u8; 20])).await;
        }
        let heights: Vec<u64> = node
            .block_list(1, 3)
            .await
            .unwrap()
            .iter()
            .map(|b| b.height)
            .collect();
        assert_eq!(heights, vec![4, 3, 2]);
        assert_eq!(node.block_list(2, 3).await.unwrap().len(), 2);
        assert!(node.block_list(0, 3).await.is_err());
    }

    #[tokio::test]
    async fn test_wallet_lifecycle() {
        let node = SandboxNode::new();
        let kp = KeyPair::generate();
        let spec = WalletSpec {
            name: Some("alice".into()),
            password: Some("pw".into()),
            private_key: Some(kp.private_key_hex()),
            hint: Some("usual".into()),
            ..Default::default()
        };

        let summary = node.import(spec.clone()).await.unwrap();
        assert_eq!(summary.address, Address::from_key_pair(&kp));
        assert_eq!(
            node.import(spec).await,
            Err(BackendError::Duplicate("wallet 'alice'".into()))
        );

        assert!(node.exists("alice").await.unwrap());
        assert_eq!(node.hint("alice").await.unwrap().as_deref(), Some("usual"));
        assert_eq!(node.signing_key("alice", "pw").await.unwrap(), kp.private_key_hex());
        assert!(matches!(
            node.signing_key("alice", "nope").await,
            Err(BackendError::Rejected(_))
        ));

        assert!(node.delete("alice").await.unwrap());
        assert!(!node.delete("alice").await.unwrap());
        assert!(node.address_of("alice").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_wallet_from_key_file() {
        let node = SandboxNode::new();
        let kp = KeyPair::generate();
        let file = format!("{}\n", kp.private_key_hex());

        let summary = node.import_file("cold", "pw", &file).await.unwrap();
        assert_eq!(summary.address, Address::from_key_pair(&kp));
        assert_eq!(node.signing_key("cold", "pw").await.unwrap(), kp.private_key_hex());

        assert!(matches!(
            node.import_file("cold", "pw", &file).await,
            Err(BackendError::Duplicate(_))
        ));
        assert!(matches!(
            node.import_file("other", "pw", "not a key").await,
            Err(BackendError::Rejected(_))
        ));
        assert!(matches!(
            node.import_file("  ", "pw", &file).await,
            Err(BackendError::Rejected(_))
        ));
    }

    #[tokio::test]
    async fn test_favorites() {
        let node = SandboxNode::new();
        let a = Address::from_bytes([1u8; 20]);
        let b = Address::from_bytes([2u8; 20]);

        assert!(node.add_favorite("shop", a).await.unwrap());
        assert!(node.add_favorite("friend", b).await.unwrap());
        // aliases are unique
        assert!(!node.add_favorite("shop", b).await.unwrap());
        assert!(node.add_favorite("", a).await.is_err());

        let aliases: Vec<String> = node
            .favorites()
            .await
            .unwrap()
            .into_iter()
            .map(|f| f.alias)
            .collect();
        assert_eq!(aliases, vec!["friend", "shop"]);

        assert!(node.delete_favorite("shop").await.unwrap());
        assert!(!node.delete_favorite("shop").await.unwrap());
        assert_eq!(node.favorites().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_recover_is_deterministic() {
        let node = SandboxNode::new();
        let mnemonic = node.mnemonic("English").await.unwrap();
        assert_eq!(mnemonic.split(' ').count(), MNEMONIC_WORDS);

        let spec = |name: &str| WalletSpec {
            name: Some(name.into()),
            mnemonic: Some(mnemonic.clone()),
            ..Default::default()
        };
        let a = node.generate(spec("a")).await.unwrap();
        let b = node.recover(spec("b")).await.unwrap();
        assert_eq!(a.address, b.address);

        assert!(node.mnemonic("klingon").await.is_err());
    }

    #[tokio::test]
    async fn test_hardware_signer() {
        let node = SandboxNode::new().with_hardware_accounts(3);
        assert!(node.hardware_available().await.unwrap());
        let accounts = node.hardware_accounts(1, 5).await.unwrap();
        assert_eq!(accounts.len(), 2);

        let tx = UnsignedTx {
            from: accounts[0].address,
            to: Address::from_bytes([2u8; 20]),
            amount: 10,
            fee: 1,
            nonce: 1,
        };
        let signed = node.hardware_sign(1, tx.clone()).await.unwrap();
        assert!(signed.verify());
        assert!(node.hardware_sign(0, tx).await.is_err());

        assert!(!SandboxNode::new().hardware_available().await.unwrap());
    }

    #[tokio::test]
    async fn test_broadcast_recording() {
        let node = SandboxNode::new();
        let tx = signed(&KeyPair::generate(), Address::from_bytes([2u8; 20]), 1);
        node.broadcast_txs(&[tx.clone()]).await.unwrap();
        assert_eq!(node.broadcasts().await, vec![vec![tx.clone()]]);

        node.fail_broadcasts(true);
        assert!(node.broadcast_txs(&[tx]).await.is_err());
        assert_eq!(node.broadcasts().await.len(), 1);
    }
}
