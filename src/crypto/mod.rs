//! Cryptographic utilities for the gateway
//!
//! This module provides:
//! - SHA-256 / RIPEMD-160 hashing
//! - secp256k1 key pairs with recoverable signatures

pub mod hash;
pub mod keys;

pub use hash::{double_sha256, hash160, sha256};
pub use keys::{recover_public_key_hash, KeyError, KeyPair, RecoverableSig};
