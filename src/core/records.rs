//! Read models returned by the ledger index, credential store and node control

use crate::core::address::{Address, Hash};
use crate::core::transaction::amount;
use serde::{Deserialize, Serialize};

/// A confirmed or pending transaction as indexed by the ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxRecord {
    pub hash: Hash,
    /// `None` for mining reward transactions
    pub from: Option<Address>,
    pub to: Address,
    #[serde(with = "amount")]
    pub amount: u64,
    #[serde(with = "amount")]
    pub fee: u64,
    pub nonce: u32,
    /// Containing block; `None` while pending
    pub block_hash: Option<Hash>,
    pub height: Option<u64>,
    /// Unix time in milliseconds
    pub timestamp: i64,
}

impl TxRecord {
    pub fn is_pending(&self) -> bool {
        self.block_hash.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockInfo {
    pub hash: Hash,
    pub height: u64,
    pub previous_hash: Hash,
    pub merkle_root: Hash,
    pub timestamp: i64,
    pub difficulty: u32,
    pub tx_count: usize,
    pub miner: Option<Address>,
}

/// A block mined by an address, with its reward
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MinedBlock {
    pub block_hash: Hash,
    pub height: u64,
    pub miner: Address,
    #[serde(with = "amount")]
    pub fee_reward: u64,
    pub timestamp: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressInfo {
    pub address: Address,
    #[serde(with = "amount")]
    pub balance: u64,
    #[serde(with = "amount")]
    pub pending_amount: u64,
    /// Last nonce used by the address on chain
    pub nonce: u32,
}

/// Public wallet information (safe to share)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletSummary {
    pub name: String,
    pub address: Address,
}

/// Address book entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Favorite {
    pub alias: String,
    pub address: Address,
}

/// Confirmed and pending transactions of a wallet address
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletTxs {
    pub txs: Vec<TxRecord>,
    pub pendings: Vec<TxRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MinerStatus {
    pub miner_address: Option<Address>,
    pub cpu_miner_count: u32,
    pub gpu_running: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeerInfo {
    pub host: String,
    pub port: u16,
    pub connected: bool,
    pub height: Option<u64>,
}

/// An account exposed by a hardware signer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HardwareAccount {
    pub index: u32,
    pub address: Address,
}

/// Wallet creation parameters, forwarded to the credential store as-is
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletSpec {
    pub name: Option<String>,
    pub password: Option<String>,
    pub private_key: Option<String>,
    pub mnemonic: Option<String>,
    pub language: Option<String>,
    pub passphrase: Option<String>,
    pub hint: Option<String>,
}
