//! Addresses, hashes and wallet references
//!
//! An address is the 20-byte `hash160` of a compressed public key. Its text
//! form is Base58Check: `version(0x00) || hash160 || checksum[0..4]`.

use crate::crypto::{double_sha256, hash160, KeyPair};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Address version byte (mainnet)
pub const ADDRESS_VERSION: u8 = 0x00;

/// Encoded address payload length: version + hash160 + checksum
const ADDRESS_PAYLOAD_LEN: usize = 1 + 20 + 4;

/// Errors for malformed addresses and hashes
#[derive(Error, Debug, PartialEq, Eq)]
pub enum AddressError {
    #[error("Invalid base58 encoding: {0}")]
    InvalidEncoding(String),
    #[error("Invalid address length: {0}")]
    InvalidLength(usize),
    #[error("Unsupported address version: {0}")]
    InvalidVersion(u8),
    #[error("Address checksum mismatch")]
    ChecksumMismatch,
    #[error("Invalid hash: {0}")]
    InvalidHash(String),
}

/// A 20-byte account address
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address([u8; 20]);

impl Address {
    pub fn from_bytes(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    /// Address controlled by the given key pair
    pub fn from_key_pair(key_pair: &KeyPair) -> Self {
        Self(key_pair.public_key_hash())
    }

    /// Address for a compressed public key
    pub fn from_public_key(public_key: &[u8]) -> Self {
        Self(hash160(public_key))
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut payload = Vec::with_capacity(ADDRESS_PAYLOAD_LEN);
        payload.push(ADDRESS_VERSION);
        payload.extend_from_slice(&self.0);
        let checksum = double_sha256(&payload);
        payload.extend_from_slice(&checksum[..4]);
        f.write_str(&bs58::encode(payload).into_string())
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self)
    }
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let payload = bs58::decode(s.trim())
            .into_vec()
            .map_err(|e| AddressError::InvalidEncoding(e.to_string()))?;
        if payload.len() != ADDRESS_PAYLOAD_LEN {
            return Err(AddressError::InvalidLength(payload.len()));
        }
        if payload[0] != ADDRESS_VERSION {
            return Err(AddressError::InvalidVersion(payload[0]));
        }
        let checksum = double_sha256(&payload[..21]);
        if checksum[..4] != payload[21..] {
            return Err(AddressError::ChecksumMismatch);
        }
        let mut bytes = [0u8; 20];
        bytes.copy_from_slice(&payload[1..21]);
        Ok(Self(bytes))
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// A 32-byte transaction or block hash
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Hash([u8; 32]);

impl Hash {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash({})", self)
    }
}

impl FromStr for Hash {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s.trim()).map_err(|e| AddressError::InvalidHash(e.to_string()))?;
        let bytes: [u8; 32] = bytes
            .try_into()
            .map_err(|v: Vec<u8>| AddressError::InvalidHash(format!("{} bytes", v.len())))?;
        Ok(Self(bytes))
    }
}

impl Serialize for Hash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Hash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// A path segment that names either an address or a local wallet
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccountRef {
    Address(Address),
    Name(String),
}

impl AccountRef {
    /// Addresses win: a wallet whose name happens to be a valid address
    /// can only be reached by its address.
    pub fn parse(segment: &str) -> Self {
        match segment.parse::<Address>() {
            Ok(address) => AccountRef::Address(address),
            Err(_) => AccountRef::Name(segment.to_string()),
        }
    }
}
