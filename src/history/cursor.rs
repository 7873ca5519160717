//! Opaque pagination cursors
//!
//! A cursor is `(anchor, page_index)`: the hash of the oldest item of the
//! previous page and the index of the page it points to. Token layout is
//! `base64url_nopad(version || anchor[32] || page_index_be[4])`.

use crate::core::Hash;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use thiserror::Error;

const CURSOR_VERSION: u8 = 1;
const CURSOR_LEN: usize = 1 + 32 + 4;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum CursorError {
    #[error("malformed cursor: {0}")]
    Malformed(String),
    #[error("unsupported cursor version {0}")]
    UnknownVersion(u8),
    #[error("page index must start at 1")]
    ZeroPageIndex,
    #[error("page index {0} has no following page")]
    PageIndexOverflow(u32),
    #[error("anchor {0} is no longer in the ledger")]
    UnknownAnchor(Hash),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cursor {
    pub anchor: Hash,
    pub page_index: u32,
}

impl Cursor {
    pub fn new(anchor: Hash, page_index: u32) -> Result<Self, CursorError> {
        if page_index == 0 {
            return Err(CursorError::ZeroPageIndex);
        }
        Ok(Self { anchor, page_index })
    }

    /// Cursor given as raw path segments (`/:txHash/:index`)
    pub fn from_parts(anchor: &str, page_index: &str) -> Result<Self, CursorError> {
        let anchor = anchor
            .parse::<Hash>()
            .map_err(|e| CursorError::Malformed(e.to_string()))?;
        let page_index = page_index
            .trim()
            .parse::<u32>()
            .map_err(|e| CursorError::Malformed(format!("page index: {}", e)))?;
        Self::new(anchor, page_index)
    }

    pub fn encode(&self) -> String {
        let mut buf = Vec::with_capacity(CURSOR_LEN);
        buf.push(CURSOR_VERSION);
        buf.extend_from_slice(self.anchor.as_bytes());
        buf.extend_from_slice(&self.page_index.to_be_bytes());
        URL_SAFE_NO_PAD.encode(buf)
    }

    pub fn decode(token: &str) -> Result<Self, CursorError> {
        let buf = URL_SAFE_NO_PAD
            .decode(token.trim())
            .map_err(|e| CursorError::Malformed(e.to_string()))?;
        if buf.len() != CURSOR_LEN {
            return Err(CursorError::Malformed(format!(
                "expected {} bytes, got {}",
                CURSOR_LEN,
                buf.len()
            )));
        }
        if buf[0] != CURSOR_VERSION {
            return Err(CursorError::UnknownVersion(buf[0]));
        }
        let mut anchor = [0u8; 32];
        anchor.copy_from_slice(&buf[1..33]);
        let mut index = [0u8; 4];
        index.copy_from_slice(&buf[33..]);
        Self::new(Hash::from_bytes(anchor), u32::from_be_bytes(index))
    }
}
