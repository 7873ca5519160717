//! Newest-first history pages

use super::cursor::{Cursor, CursorError};
use crate::core::{Hash, MinedBlock, TxRecord};
use crate::error::GatewayError;
use serde::Serialize;
use std::future::Future;

/// Default number of items per page
pub const DEFAULT_PAGE_SIZE: usize = 20;

/// Items a cursor can be anchored on
pub trait Anchored {
    fn anchor(&self) -> Hash;
}

impl Anchored for TxRecord {
    fn anchor(&self) -> Hash {
        self.hash
    }
}

impl Anchored for MinedBlock {
    fn anchor(&self) -> Hash {
        self.block_hash
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryPage<T> {
    pub items: Vec<T>,
    pub has_more: bool,
    pub page_index: u32,
    pub next_cursor: Option<String>,
}

impl<T> HistoryPage<T> {
    /// A page past the end of the history
    pub fn empty(page_index: u32) -> Self {
        Self {
            items: Vec::new(),
            has_more: false,
            page_index,
            next_cursor: None,
        }
    }
}

impl<T: Anchored> HistoryPage<T> {
    fn build(mut items: Vec<T>, page_index: u32, page_size: usize) -> Result<Self, CursorError> {
        items.truncate(page_size);
        let next = match items.last() {
            Some(oldest) if items.len() == page_size => Some(Cursor {
                anchor: oldest.anchor(),
                page_index: page_index
                    .checked_add(1)
                    .ok_or(CursorError::PageIndexOverflow(page_index))?,
            }),
            _ => None,
        };
        Ok(Self {
            items,
            has_more: next.is_some(),
            page_index,
            next_cursor: next.map(|c| c.encode()),
        })
    }

    /// Cursor for the following page, if any
    pub fn next(&self) -> Option<Cursor> {
        self.next_cursor
            .as_deref()
            .and_then(|token| Cursor::decode(token).ok())
    }
}

/// Fetch one page of a history stream.
///
/// `fetch(before, limit)` asks the ledger for up to `limit` items strictly
/// older than `before`, newest first; `Ok(None)` means `before` is unknown.
pub async fn paginate<T, F, Fut>(
    cursor: Option<Cursor>,
    page_size: usize,
    fetch: F,
) -> Result<HistoryPage<T>, GatewayError>
where
    T: Anchored,
    F: FnOnce(Option<Hash>, usize) -> Fut,
    Fut: Future<Output = Result<Option<Vec<T>>, GatewayError>>,
{
    let (before, page_index) = match cursor {
        Some(c) => (Some(c.anchor), c.page_index),
        None => (None, 1),
    };

    let items = match fetch(before, page_size).await? {
        Some(items) => items,
        None => {
            let anchor = before.ok_or_else(|| {
                GatewayError::Upstream("ledger has no first page to anchor".into())
            })?;
            return Err(CursorError::UnknownAnchor(anchor).into());
        }
    };

    HistoryPage::build(items, page_index, page_size).map_err(GatewayError::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Item(Hash);

    impl Anchored for Item {
        fn anchor(&self) -> Hash {
            self.0
        }
    }

    /// A newest-first ledger of `n` items
    fn ledger(n: u8) -> Vec<Item> {
        (0..n).rev().map(|i| Item(Hash::from_bytes([i; 32]))).collect()
    }

    fn fetch_from(
        ledger: &[Item],
        before: Option<Hash>,
        limit: usize,
    ) -> Result<Option<Vec<Item>>, GatewayError> {
        let start = match before {
            None => 0,
            Some(anchor) => match ledger.iter().position(|i| i.0 == anchor) {
                Some(pos) => pos + 1,
                None => return Ok(None),
            },
        };
        Ok(Some(ledger.iter().skip(start).take(limit).cloned().collect()))
    }

    async fn page(
        ledger: &[Item],
        cursor: Option<Cursor>,
        size: usize,
    ) -> Result<HistoryPage<Item>, GatewayError> {
        paginate(cursor, size, |before, limit| async move {
            fetch_from(ledger, before, limit)
        })
        .await
    }

    #[tokio::test]
    async fn test_full_page_then_empty_page() {
        let ledger = ledger(20);

        let first = page(&ledger, None, 20).await.unwrap();
        assert_eq!(first.items.len(), 20);
        assert!(first.has_more);
        assert_eq!(first.page_index, 1);

        let next = first.next().unwrap();
        assert_eq!(next.anchor, first.items[19].0);
        assert_eq!(next.page_index, 2);

        let second = page(&ledger, Some(next), 20).await.unwrap();
        assert!(second.items.is_empty());
        assert!(!second.has_more);
        assert!(second.next_cursor.is_none());
    }

    #[tokio::test]
    async fn test_walk_yields_every_item_once_in_order() {
        for total in [0u8, 1, 7, 21, 45] {
            let ledger = ledger(total);
            let mut seen = Vec::new();
            let mut cursor = None;
            let mut expected_index = 1;
            loop {
                let p = page(&ledger, cursor, 7).await.unwrap();
                assert_eq!(p.page_index, expected_index);
                seen.extend(p.items.iter().cloned());
                match p.next() {
                    Some(next) => cursor = Some(next),
                    None => break,
                }
                expected_index += 1;
            }
            assert_eq!(seen, ledger, "history of {} items", total);
        }
    }

    #[tokio::test]
    async fn test_same_cursor_is_idempotent() {
        let ledger = ledger(30);
        let first = page(&ledger, None, 10).await.unwrap();
        let cursor = Cursor::decode(first.next_cursor.as_ref().unwrap()).unwrap();

        let (a, b) = tokio::join!(
            page(&ledger, Some(cursor), 10),
            page(&ledger, Some(cursor), 10)
        );
        assert_eq!(a.unwrap().items, b.unwrap().items);
    }

    #[tokio::test]
    async fn test_unknown_anchor_is_cursor_invalid() {
        let ledger = ledger(5);
        let stale = Cursor::new(Hash::from_bytes([0xee; 32]), 2).unwrap();
        let err = page(&ledger, Some(stale), 10).await.unwrap_err();
        assert_eq!(err.code(), "CURSOR_INVALID");
    }

    #[tokio::test]
    async fn test_last_page_index_cannot_advance() {
        let ledger = ledger(6);
        let at_max = Cursor::new(ledger[2].0, u32::MAX).unwrap();
        let err = page(&ledger, Some(at_max), 3).await.unwrap_err();
        assert_eq!(err.code(), "CURSOR_INVALID");

        // a short final page needs no successor
        let tail = page(&ledger, Some(at_max), 5).await.unwrap();
        assert_eq!(tail.items.len(), 3);
        assert_eq!(tail.page_index, u32::MAX);
        assert!(!tail.has_more);
    }

    #[tokio::test]
    async fn test_oversized_response_is_truncated() {
        let ledger = ledger(10);
        let p = paginate(None, 4, |_, _| async { Ok(Some(ledger.clone())) })
            .await
            .unwrap();
        assert_eq!(p.items.len(), 4);
        assert!(p.has_more);
        assert_eq!(p.next().unwrap().anchor, ledger[3].0);
    }
}
