//! Core gateway types
//!
//! - Addresses, hashes and account references
//! - Unsigned/signed transactions and submission bodies
//! - Read models exchanged with the node collaborators

pub mod address;
pub mod records;
pub mod transaction;

pub use address::{AccountRef, Address, AddressError, Hash};
pub use records::{
    AddressInfo, BlockInfo, Favorite, HardwareAccount, MinedBlock, MinerStatus, PeerInfo,
    TxRecord, WalletSpec, WalletSummary, WalletTxs,
};
pub use transaction::{
    amount, Credential, PreSignedSubmission, SignedTx, TransactionError, TxFields, TxSignature,
    UnsignedTx,
};
