//! ECDSA key management for local signing
//!
//! Transactions submitted with a credential are signed in-process with a
//! recoverable secp256k1 signature, so the node can recover the sender's
//! public key from `(signature, recovery)` alone.

use rand::rngs::OsRng;
use secp256k1::ecdsa::{RecoverableSignature, RecoveryId};
use secp256k1::{Message, PublicKey, Secp256k1, SecretKey};
use thiserror::Error;

use super::hash::hash160;

/// Errors that can occur during key operations
#[derive(Error, Debug)]
pub enum KeyError {
    #[error("Invalid private key")]
    InvalidPrivateKey,
    #[error("Invalid signature")]
    InvalidSignature,
    #[error("Invalid recovery id: {0}")]
    InvalidRecoveryId(u8),
    #[error("Secp256k1 error: {0}")]
    Secp256k1Error(#[from] secp256k1::Error),
}

/// A compact recoverable signature as carried on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecoverableSig {
    pub signature: [u8; 64],
    pub recovery: u8,
}

/// A key pair consisting of a private key and its corresponding public key
#[derive(Clone)]
pub struct KeyPair {
    pub secret_key: SecretKey,
    pub public_key: PublicKey,
}

impl KeyPair {
    /// Generate a new random key pair
    pub fn generate() -> Self {
        let secp = Secp256k1::new();
        let (secret_key, public_key) = secp.generate_keypair(&mut OsRng);
        Self {
            secret_key,
            public_key,
        }
    }

    /// Create a key pair from an existing secret key
    pub fn from_secret_key(secret_key: SecretKey) -> Self {
        let secp = Secp256k1::new();
        let public_key = PublicKey::from_secret_key(&secp, &secret_key);
        Self {
            secret_key,
            public_key,
        }
    }

    /// Create a key pair from a hex-encoded private key
    pub fn from_private_key_hex(hex_key: &str) -> Result<Self, KeyError> {
        let bytes = hex::decode(hex_key.trim()).map_err(|_| KeyError::InvalidPrivateKey)?;
        let secret_key =
            SecretKey::from_slice(&bytes).map_err(|_| KeyError::InvalidPrivateKey)?;
        Ok(Self::from_secret_key(secret_key))
    }

    /// Get the private key as a hex string
    pub fn private_key_hex(&self) -> String {
        hex::encode(self.secret_key.secret_bytes())
    }

    /// Get the public key as a hex string (compressed format)
    pub fn public_key_hex(&self) -> String {
        hex::encode(self.public_key.serialize())
    }

    /// 20-byte public key digest an address is built from
    pub fn public_key_hash(&self) -> [u8; 20] {
        hash160(&self.public_key.serialize())
    }

    /// Sign a 32-byte digest, keeping the recovery id
    pub fn sign_recoverable(&self, digest: &[u8; 32]) -> Result<RecoverableSig, KeyError> {
        let secp = Secp256k1::new();
        let message = Message::from_digest_slice(digest)?;
        let (recovery, signature) = secp
            .sign_ecdsa_recoverable(&message, &self.secret_key)
            .serialize_compact();
        Ok(RecoverableSig {
            signature,
            recovery: recovery.to_i32() as u8,
        })
    }
}

/// Recover the signer's public key digest from a recoverable signature
pub fn recover_public_key_hash(
    digest: &[u8; 32],
    sig: &RecoverableSig,
) -> Result<[u8; 20], KeyError> {
    let secp = Secp256k1::new();
    let message = Message::from_digest_slice(digest)?;
    let recovery = RecoveryId::from_i32(i32::from(sig.recovery))
        .map_err(|_| KeyError::InvalidRecoveryId(sig.recovery))?;
    let signature = RecoverableSignature::from_compact(&sig.signature, recovery)
        .map_err(|_| KeyError::InvalidSignature)?;
    let public_key = secp.recover_ecdsa(&message, &signature)?;
    Ok(hash160(&public_key.serialize()))
}
