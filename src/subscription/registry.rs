//! Address -> webhook bindings
//!
//! Buckets are sharded per address, so `create`/`delete` only lock the shard
//! holding that address. `notify` clones the bucket and releases the lock
//! before queueing deliveries.

use crate::core::{Address, Hash, SignedTx};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use url::Url;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum SubscriptionError {
    #[error("{0}")]
    InvalidUrl(String),
    #[error("window start {from} is after window end {to}")]
    InvalidWindow { from: u64, to: u64 },
    #[error("subscription {id} not found for {address}")]
    NotFound { address: Address, id: u64 },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    pub id: u64,
    pub address: Address,
    pub callback_url: Url,
    /// Inclusive lower bound on ledger height
    pub effective_from: Option<u64>,
    /// Inclusive upper bound on ledger height
    pub effective_to: Option<u64>,
    pub created_at: i64,
}

impl Subscription {
    pub fn is_bounded(&self) -> bool {
        self.effective_from.is_some() || self.effective_to.is_some()
    }

    /// An event of unknown height only falls inside an unbounded window
    pub fn covers(&self, height: Option<u64>) -> bool {
        match height {
            Some(height) => {
                self.effective_from.map_or(true, |from| height >= from)
                    && self.effective_to.map_or(true, |to| height <= to)
            }
            None => !self.is_bounded(),
        }
    }
}

/// Activity on a watched address
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressEvent {
    pub address: Address,
    pub tx_hash: Hash,
    pub from: Address,
    pub to: Address,
    pub amount: u64,
    pub fee: u64,
    pub nonce: u32,
    /// Unix time in milliseconds
    pub timestamp: i64,
    /// Ledger height the event happened at: the containing block once
    /// confirmed, the tip at mempool acceptance. `None` when unknown.
    pub height: Option<u64>,
}

impl AddressEvent {
    /// Event for a transaction just accepted into the mempool while the
    /// ledger tip was at `tip_height`
    pub fn accepted(
        address: Address,
        tx: &SignedTx,
        timestamp: i64,
        tip_height: Option<u64>,
    ) -> Self {
        Self {
            address,
            tx_hash: tx.hash(),
            from: tx.tx.from,
            to: tx.tx.to,
            amount: tx.tx.amount,
            fee: tx.tx.fee,
            nonce: tx.tx.nonce,
            timestamp,
            height: tip_height,
        }
    }
}

/// One queued webhook call
#[derive(Debug, Clone)]
pub struct Delivery {
    pub subscription_id: u64,
    pub url: Url,
    pub event: AddressEvent,
}

#[derive(Debug, Default)]
struct Bucket {
    /// Ids are never reused, even after deletion
    next_id: u64,
    subs: BTreeMap<u64, Arc<Subscription>>,
}

pub struct SubscriptionRegistry {
    buckets: DashMap<Address, Bucket>,
    outbox: mpsc::UnboundedSender<Delivery>,
}

impl SubscriptionRegistry {
    /// Deliveries are queued onto `outbox`; see `Dispatcher`
    pub fn new(outbox: mpsc::UnboundedSender<Delivery>) -> Self {
        Self {
            buckets: DashMap::new(),
            outbox,
        }
    }

    pub fn create(
        &self,
        address: Address,
        callback_url: &str,
        from: Option<u64>,
        to: Option<u64>,
    ) -> Result<u64, SubscriptionError> {
        let url = parse_callback_url(callback_url)?;
        if let (Some(from), Some(to)) = (from, to) {
            if from > to {
                return Err(SubscriptionError::InvalidWindow { from, to });
            }
        }

        let mut bucket = self.buckets.entry(address).or_default();
        bucket.next_id += 1;
        let id = bucket.next_id;
        bucket.subs.insert(
            id,
            Arc::new(Subscription {
                id,
                address,
                callback_url: url,
                effective_from: from,
                effective_to: to,
                created_at: chrono::Utc::now().timestamp_millis(),
            }),
        );
        log::info!("Subscription {} created for {}", id, address);
        Ok(id)
    }

    pub fn delete(&self, address: Address, id: u64) -> Result<(), SubscriptionError> {
        let removed = self
            .buckets
            .get_mut(&address)
            .and_then(|mut bucket| bucket.subs.remove(&id));
        match removed {
            Some(_) => {
                log::info!("Subscription {} deleted for {}", id, address);
                Ok(())
            }
            None => Err(SubscriptionError::NotFound { address, id }),
        }
    }

    /// Active subscriptions of an address, oldest first
    pub fn list(&self, address: Address) -> Vec<Subscription> {
        self.snapshot(address)
            .into_iter()
            .map(|sub| (*sub).clone())
            .collect()
    }

    /// Number of active subscriptions for an address
    pub fn count(&self, address: Address) -> usize {
        self.buckets
            .get(&address)
            .map(|bucket| bucket.subs.len())
            .unwrap_or(0)
    }

    /// Queue `event` for every subscription of `address` whose window covers
    /// it. Returns the number of deliveries queued.
    pub fn notify(&self, address: Address, event: &AddressEvent) -> usize {
        let mut queued = 0;
        for sub in self.snapshot(address) {
            if !sub.covers(event.height) {
                continue;
            }
            let delivery = Delivery {
                subscription_id: sub.id,
                url: sub.callback_url.clone(),
                event: event.clone(),
            };
            if self.outbox.send(delivery).is_err() {
                log::warn!("Webhook dispatcher is gone, dropping notifications for {}", address);
                break;
            }
            queued += 1;
        }
        queued
    }

    fn snapshot(&self, address: Address) -> Vec<Arc<Subscription>> {
        self.buckets
            .get(&address)
            .map(|bucket| bucket.subs.values().cloned().collect())
            .unwrap_or_default()
    }
}

/// Absolute http(s) URL with a host
pub fn parse_callback_url(raw: &str) -> Result<Url, SubscriptionError> {
    let url = Url::parse(raw.trim())
        .map_err(|e| SubscriptionError::InvalidUrl(format!("'{}': {}", raw, e)))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(SubscriptionError::InvalidUrl(format!(
            "'{}': scheme must be http or https",
            raw
        )));
    }
    if url.host_str().map_or(true, str::is_empty) {
        return Err(SubscriptionError::InvalidUrl(format!("'{}': missing host", raw)));
    }
    Ok(url)
}
