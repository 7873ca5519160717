//! Transaction types crossing the gateway boundary
//!
//! Amounts and fees are integers in the smallest unit. The signing payload is
//! `SHA256(from || to || amount_be || fee_be || nonce_be)`; a signed
//! transaction's hash additionally commits to the signature and recovery id.

use crate::core::address::{Address, Hash};
use crate::crypto::{recover_public_key_hash, sha256, KeyError, KeyPair, RecoverableSig};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use thiserror::Error;

/// Transaction-related errors
#[derive(Error, Debug)]
pub enum TransactionError {
    #[error("Invalid {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },
    #[error("Crypto error: {0}")]
    CryptoError(#[from] KeyError),
}

impl TransactionError {
    fn field(field: &'static str, reason: impl fmt::Display) -> Self {
        TransactionError::InvalidField {
            field,
            reason: reason.to_string(),
        }
    }
}

/// Transaction fields before signing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnsignedTx {
    pub from: Address,
    pub to: Address,
    #[serde(with = "amount")]
    pub amount: u64,
    #[serde(with = "amount")]
    pub fee: u64,
    pub nonce: u32,
}

impl UnsignedTx {
    /// Digest that gets signed
    pub fn signing_digest(&self) -> [u8; 32] {
        let mut data = Vec::with_capacity(20 + 20 + 8 + 8 + 4);
        data.extend_from_slice(self.from.as_bytes());
        data.extend_from_slice(self.to.as_bytes());
        data.extend_from_slice(&self.amount.to_be_bytes());
        data.extend_from_slice(&self.fee.to_be_bytes());
        data.extend_from_slice(&self.nonce.to_be_bytes());
        sha256(&data)
    }

    /// Sign with a key pair; the key must control `from`
    pub fn sign(self, key_pair: &KeyPair) -> Result<SignedTx, TransactionError> {
        if Address::from_key_pair(key_pair) != self.from {
            return Err(TransactionError::field(
                "from",
                "does not match the signing key",
            ));
        }
        let sig = key_pair.sign_recoverable(&self.signing_digest())?;
        Ok(SignedTx {
            tx: self,
            signature: TxSignature(sig.signature),
            recovery: sig.recovery,
        })
    }
}

/// 64-byte compact ECDSA signature, hex on the wire
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct TxSignature(pub [u8; 64]);

impl TxSignature {
    pub fn from_hex(s: &str) -> Result<Self, TransactionError> {
        let bytes =
            hex::decode(s.trim()).map_err(|e| TransactionError::field("signature", e))?;
        let bytes: [u8; 64] = bytes.try_into().map_err(|v: Vec<u8>| {
            TransactionError::field("signature", format!("expected 64 bytes, got {}", v.len()))
        })?;
        Ok(Self(bytes))
    }
}

impl fmt::Debug for TxSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TxSignature({})", hex::encode(self.0))
    }
}

impl Serialize for TxSignature {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(self.0))
    }
}

impl<'de> Deserialize<'de> for TxSignature {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        TxSignature::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// A transaction carrying a recoverable signature
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedTx {
    #[serde(flatten)]
    pub tx: UnsignedTx,
    pub signature: TxSignature,
    pub recovery: u8,
}

impl SignedTx {
    pub fn hash(&self) -> Hash {
        let mut data = Vec::with_capacity(32 + 64 + 1);
        data.extend_from_slice(&self.tx.signing_digest());
        data.extend_from_slice(&self.signature.0);
        data.push(self.recovery);
        Hash::from_bytes(sha256(&data))
    }

    /// Whether the signature recovers to the `from` address
    pub fn verify(&self) -> bool {
        let sig = RecoverableSig {
            signature: self.signature.0,
            recovery: self.recovery,
        };
        recover_public_key_hash(&self.tx.signing_digest(), &sig)
            .map(|hash| Address::from_bytes(hash) == self.tx.from)
            .unwrap_or(false)
    }
}

/// Body of `POST /tx`: a transaction signed by the caller
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreSignedSubmission {
    pub signature: String,
    pub from: String,
    pub to: String,
    #[serde(with = "amount")]
    pub amount: u64,
    #[serde(with = "amount")]
    pub fee: u64,
    pub nonce: u32,
    pub recovery: u8,
}

impl PreSignedSubmission {
    /// Structural validation; signature validity is the mempool's call
    pub fn validate(self) -> Result<SignedTx, TransactionError> {
        let from = self
            .from
            .parse::<Address>()
            .map_err(|e| TransactionError::field("from", e))?;
        let to = self
            .to
            .parse::<Address>()
            .map_err(|e| TransactionError::field("to", e))?;
        if self.signature.trim().is_empty() {
            return Err(TransactionError::field("signature", "missing"));
        }
        let signature = TxSignature::from_hex(&self.signature)?;
        if self.recovery > 3 {
            return Err(TransactionError::field(
                "recovery",
                format!("{} is out of range 0..=3", self.recovery),
            ));
        }
        Ok(SignedTx {
            tx: UnsignedTx {
                from,
                to,
                amount: self.amount,
                fee: self.fee,
                nonce: self.nonce,
            },
            signature,
            recovery: self.recovery,
        })
    }
}

/// Where the signing key for a locally-signed submission comes from
#[derive(Clone)]
pub enum Credential {
    /// Hex private key supplied in the request body
    PrivateKey(String),
    /// A wallet held by the credential store
    Wallet { name: String, password: String },
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credential::PrivateKey(_) => f.write_str("Credential::PrivateKey(..)"),
            Credential::Wallet { name, .. } => write!(f, "Credential::Wallet({})", name),
        }
    }
}

/// Transaction fields for a submission signed inside the gateway.
/// `from` is optional when the credential is a raw key.
#[derive(Debug, Clone)]
pub struct TxFields {
    pub from: Option<Address>,
    pub to: Address,
    pub amount: u64,
    pub fee: u64,
    pub nonce: u32,
}

/// Serde helpers for amounts: a non-negative integer, as a JSON number or a
/// string of decimal digits.
pub mod amount {
    use serde::de::{self, Visitor};
    use serde::{Deserializer, Serializer};
    use std::fmt;

    pub fn serialize<S: Serializer>(value: &u64, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(*value)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
        deserializer.deserialize_any(AmountVisitor)
    }

    /// Parse an amount from text
    pub fn parse(s: &str) -> Result<u64, String> {
        let s = s.trim();
        if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(format!("'{}' is not a non-negative integer", s));
        }
        s.parse::<u64>().map_err(|e| e.to_string())
    }

    struct AmountVisitor;

    impl<'de> Visitor<'de> for AmountVisitor {
        type Value = u64;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a non-negative integer amount")
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<u64, E> {
            Ok(v)
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<u64, E> {
            u64::try_from(v).map_err(|_| E::custom(format!("amount must not be negative: {}", v)))
        }

        fn visit_f64<E: de::Error>(self, v: f64) -> Result<u64, E> {
            Err(E::custom(format!("amount must be an integer: {}", v)))
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<u64, E> {
            parse(v).map_err(E::custom)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unsigned(from: &KeyPair, to: Address) -> UnsignedTx {
        UnsignedTx {
            from: Address::from_key_pair(from),
            to,
            amount: 100,
            fee: 1,
            nonce: 5,
        }
    }

    #[test]
    fn test_sign_and_verify() {
        let kp = KeyPair::generate();
        let to = Address::from_key_pair(&KeyPair::generate());
        let signed = unsigned(&kp, to).sign(&kp).unwrap();
        assert!(signed.verify());
        assert!(signed.recovery <= 3);
    }

    #[test]
    fn test_sign_with_wrong_key() {
        let kp = KeyPair::generate();
        let other = KeyPair::generate();
        let to = Address::from_key_pair(&other);
        assert!(unsigned(&kp, to).sign(&other).is_err());
    }

    #[test]
    fn test_tampered_tx_fails_verification() {
        let kp = KeyPair::generate();
        let to = Address::from_key_pair(&KeyPair::generate());
        let mut signed = unsigned(&kp, to).sign(&kp).unwrap();
        signed.tx.amount = 1_000;
        assert!(!signed.verify());
    }

    #[test]
    fn test_hash_commits_to_signature() {
        let kp = KeyPair::generate();
        let to = Address::from_key_pair(&KeyPair::generate());
        let a = unsigned(&kp, to).sign(&kp).unwrap();
        let mut b = a.clone();
        b.signature.0[0] ^= 0xff;
        assert_ne!(a.hash(), b.hash());
    }

    #[test]
    fn test_pre_signed_validation() {
        let kp = KeyPair::generate();
        let to = Address::from_key_pair(&KeyPair::generate());
        let signed = unsigned(&kp, to).sign(&kp).unwrap();

        let body = serde_json::json!({
            "signature": hex::encode(signed.signature.0),
            "from": signed.tx.from.to_string(),
            "to": to.to_string(),
            "amount": "100",
            "fee": 1,
            "nonce": 5,
            "recovery": signed.recovery,
        });
        let submission: PreSignedSubmission = serde_json::from_value(body).unwrap();
        assert_eq!(submission.validate().unwrap(), signed);
    }

    #[test]
    fn test_pre_signed_rejects_bad_fields() {
        let to = Address::from_bytes([3u8; 20]).to_string();
        let base = PreSignedSubmission {
            signature: "ab".repeat(64),
            from: Address::from_bytes([4u8; 20]).to_string(),
            to,
            amount: 1,
            fee: 0,
            nonce: 0,
            recovery: 0,
        };

        let mut bad_from = base.clone();
        bad_from.from = "nope".to_string();
        assert!(bad_from.validate().is_err());

        let mut no_sig = base.clone();
        no_sig.signature = String::new();
        assert!(no_sig.validate().is_err());

        let mut short_sig = base.clone();
        short_sig.signature = "abcd".to_string();
        assert!(short_sig.validate().is_err());

        let mut bad_recovery = base.clone();
        bad_recovery.recovery = 4;
        assert!(bad_recovery.validate().is_err());

        assert!(base.validate().is_ok());
    }

    #[test]
    fn test_amount_parsing() {
        #[derive(Deserialize)]
        struct Wrapper {
            #[serde(with = "amount")]
            value: u64,
        }
        let parse = |v: serde_json::Value| {
            serde_json::from_value::<Wrapper>(serde_json::json!({ "value": v }))
                .map(|w| w.value)
        };
        assert_eq!(parse(serde_json::json!(42)).unwrap(), 42);
        assert_eq!(parse(serde_json::json!("42")).unwrap(), 42);
        assert!(parse(serde_json::json!(-1)).is_err());
        assert!(parse(serde_json::json!(1.5)).is_err());
        assert!(parse(serde_json::json!("-3")).is_err());
        assert!(parse(serde_json::json!("1e3")).is_err());
    }

    #[test]
    fn test_signed_tx_json_shape() {
        let kp = KeyPair::generate();
        let to = Address::from_key_pair(&KeyPair::generate());
        let signed = unsigned(&kp, to).sign(&kp).unwrap();
        let value = serde_json::to_value(&signed).unwrap();
        assert_eq!(value["amount"], 100);
        assert_eq!(value["nonce"], 5);
        assert_eq!(value["signature"].as_str().unwrap().len(), 128);
        let back: SignedTx = serde_json::from_value(value).unwrap();
        assert_eq!(back, signed);
    }
}
