//! Transaction submission pipeline
//!
//! accept -> validate -> enqueue -> (broadcast, notify)
//!
//! Only what the mempool accepts moves on. Broadcasting runs as a detached
//! task and notifications are queued for the webhook dispatcher; both are
//! scheduled before `submit_*` returns and neither can fail the submission.

use crate::backend::{with_deadline, Broadcaster, CredentialStore, LedgerIndex, TxPool};
use crate::core::{
    Address, Credential, Hash, PreSignedSubmission, SignedTx, TxFields, UnsignedTx,
};
use crate::crypto::KeyPair;
use crate::error::{GatewayError, Result};
use crate::subscription::{AddressEvent, SubscriptionRegistry};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

/// Returned to the caller once the mempool has accepted the transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionReceipt {
    pub tx_hash: Hash,
    pub tx: SignedTx,
}

pub struct TxPipeline {
    mempool: Arc<dyn TxPool>,
    ledger: Arc<dyn LedgerIndex>,
    credentials: Arc<dyn CredentialStore>,
    registry: Arc<SubscriptionRegistry>,
    deadline: Duration,
}

impl TxPipeline {
    pub fn new(
        mempool: Arc<dyn TxPool>,
        ledger: Arc<dyn LedgerIndex>,
        credentials: Arc<dyn CredentialStore>,
        registry: Arc<SubscriptionRegistry>,
        deadline: Duration,
    ) -> Self {
        Self {
            mempool,
            ledger,
            credentials,
            registry,
            deadline,
        }
    }

    /// Submit a transaction the caller already signed
    pub async fn submit_pre_signed(
        &self,
        submission: PreSignedSubmission,
        broadcaster: Arc<dyn Broadcaster>,
    ) -> Result<SubmissionReceipt> {
        let tx = submission.validate()?;
        self.submit_signed(tx, broadcaster).await
    }

    /// Sign `fields` with the key behind `credential`, then submit
    pub async fn submit_with_credential(
        &self,
        fields: TxFields,
        credential: Credential,
        broadcaster: Arc<dyn Broadcaster>,
    ) -> Result<SubmissionReceipt> {
        let key = self.resolve(credential).await?;
        let signer = Address::from_key_pair(&key);
        if let Some(from) = fields.from {
            if from != signer {
                return Err(GatewayError::Validation(format!(
                    "from {} is not controlled by the supplied credential",
                    from
                )));
            }
        }

        let tx = UnsignedTx {
            from: signer,
            to: fields.to,
            amount: fields.amount,
            fee: fields.fee,
            nonce: fields.nonce,
        }
        .sign(&key)?;
        self.submit_signed(tx, broadcaster).await
    }

    async fn resolve(&self, credential: Credential) -> Result<KeyPair> {
        match credential {
            Credential::PrivateKey(hex_key) => Ok(KeyPair::from_private_key_hex(&hex_key)?),
            Credential::Wallet { name, password } => {
                let hex_key =
                    with_deadline(self.deadline, self.credentials.signing_key(&name, &password))
                        .await?;
                KeyPair::from_private_key_hex(&hex_key).map_err(|e| {
                    GatewayError::Upstream(format!(
                        "credential store returned a bad key for '{}': {}",
                        name, e
                    ))
                })
            }
        }
    }

    /// Enqueue a transaction signed elsewhere (caller or hardware signer)
    pub async fn submit_signed(
        &self,
        tx: SignedTx,
        broadcaster: Arc<dyn Broadcaster>,
    ) -> Result<SubmissionReceipt> {
        let tx_hash = tx.hash();
        let accepted =
            with_deadline(self.deadline, self.mempool.put_txs(vec![tx.clone()])).await?;
        if !accepted.iter().any(|a| a.hash() == tx_hash) {
            return Err(GatewayError::Validation(format!(
                "transaction {} rejected by mempool",
                tx_hash
            )));
        }

        log::info!(
            "Accepted tx {}: {} -> {} amount {} fee {} nonce {}",
            tx_hash,
            tx.tx.from,
            tx.tx.to,
            tx.tx.amount,
            tx.tx.fee,
            tx.tx.nonce
        );

        self.notify_accepted(&accepted).await;
        self.spawn_broadcast(accepted, broadcaster);

        Ok(SubmissionReceipt { tx_hash, tx })
    }

    fn spawn_broadcast(&self, txs: Vec<SignedTx>, broadcaster: Arc<dyn Broadcaster>) {
        let deadline = self.deadline;
        tokio::spawn(async move {
            if let Err(e) = with_deadline(deadline, broadcaster.broadcast_txs(&txs)).await {
                let err = GatewayError::BroadcastFailed(e.to_string());
                log::error!("{}: {} tx(s): {}", err.code(), txs.len(), err);
            }
        });
    }

    /// One notification per distinct party of each accepted transaction
    async fn notify_accepted(&self, accepted: &[SignedTx]) {
        let watched = accepted
            .iter()
            .flat_map(parties)
            .any(|address| self.registry.count(address) > 0);
        if !watched {
            return;
        }

        let now = chrono::Utc::now().timestamp_millis();
        let tip_height = self.tip_height().await;
        for tx in accepted {
            for address in parties(tx) {
                let event = AddressEvent::accepted(address, tx, now, tip_height);
                let queued = self.registry.notify(address, &event);
                if queued > 0 {
                    log::debug!("Queued {} notification(s) for {}", queued, address);
                }
            }
        }
    }

    /// `None` if the ledger cannot say; windowed subscriptions then stay quiet
    async fn tip_height(&self) -> Option<u64> {
        match with_deadline(self.deadline, self.ledger.top_tip_height()).await {
            Ok(height) => Some(height),
            Err(e) => {
                log::warn!("Tip height unavailable, notifying unbounded subscriptions only: {}", e);
                None
            }
        }
    }
}

/// Sender, then receiver when it differs
fn parties(tx: &SignedTx) -> Vec<Address> {
    let mut parties = vec![tx.tx.from];
    if tx.tx.to != tx.tx.from {
        parties.push(tx.tx.to);
    }
    parties
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::SandboxNode;
    use crate::core::WalletSpec;
    use crate::subscription::Delivery;
    use tokio::sync::mpsc;

    struct Harness {
        node: Arc<SandboxNode>,
        registry: Arc<SubscriptionRegistry>,
        deliveries: mpsc::UnboundedReceiver<Delivery>,
        pipeline: TxPipeline,
    }

    fn harness(deadline: Duration) -> Harness {
        let node = Arc::new(SandboxNode::new());
        let (tx, deliveries) = mpsc::unbounded_channel();
        let registry = Arc::new(SubscriptionRegistry::new(tx));
        let pipeline = TxPipeline::new(
            node.clone(),
            node.clone(),
            node.clone(),
            registry.clone(),
            deadline,
        );
        Harness {
            node,
            registry,
            deliveries,
            pipeline,
        }
    }

    fn pre_signed(kp: &KeyPair, to: Address, nonce: u32) -> PreSignedSubmission {
        let tx = UnsignedTx {
            from: Address::from_key_pair(kp),
            to,
            amount: 100,
            fee: 1,
            nonce,
        }
        .sign(kp)
        .unwrap();
        PreSignedSubmission {
            signature: hex::encode(tx.signature.0),
            from: tx.tx.from.to_string(),
            to: to.to_string(),
            amount: 100,
            fee: 1,
            nonce,
            recovery: tx.recovery,
        }
    }

    async fn wait_for_broadcasts(node: &SandboxNode, n: usize) -> Vec<Vec<SignedTx>> {
        for _ in 0..200 {
            let seen = node.broadcasts().await;
            if seen.len() >= n {
                return seen;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        node.broadcasts().await
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<Delivery>) -> Vec<Delivery> {
        std::iter::from_fn(|| rx.try_recv().ok()).collect()
    }

    #[tokio::test]
    async fn test_accepted_tx_is_broadcast_and_notified() {
        let mut h = harness(Duration::from_secs(5));
        let kp = KeyPair::generate();
        let a = Address::from_key_pair(&kp);
        let b = Address::from_bytes([0xbb; 20]);
        h.registry.create(a, "http://hooks.test/a", None, None).unwrap();
        h.registry.create(b, "http://hooks.test/b", None, None).unwrap();

        let receipt = h
            .pipeline
            .submit_pre_signed(pre_signed(&kp, b, 5), h.node.clone())
            .await
            .unwrap();
        assert_eq!(receipt.tx.tx.amount, 100);
        assert_eq!(receipt.tx.tx.nonce, 5);
        assert_eq!(receipt.tx_hash, receipt.tx.hash());

        let broadcasts = wait_for_broadcasts(&h.node, 1).await;
        assert_eq!(broadcasts, vec![vec![receipt.tx.clone()]]);

        let deliveries = drain(&mut h.deliveries);
        let mut notified: Vec<Address> = deliveries.iter().map(|d| d.event.address).collect();
        notified.sort();
        let mut expected = vec![a, b];
        expected.sort();
        assert_eq!(notified, expected);
        assert!(deliveries.iter().all(|d| d.event.tx_hash == receipt.tx_hash));
    }

    #[tokio::test]
    async fn test_self_payment_notifies_once() {
        let mut h = harness(Duration::from_secs(5));
        let kp = KeyPair::generate();
        let a = Address::from_key_pair(&kp);
        h.registry.create(a, "http://hooks.test/a", None, None).unwrap();

        h.pipeline
            .submit_pre_signed(pre_signed(&kp, a, 1), h.node.clone())
            .await
            .unwrap();
        assert_eq!(drain(&mut h.deliveries).len(), 1);
    }

    #[tokio::test]
    async fn test_rejected_tx_is_never_broadcast() {
        let mut h = harness(Duration::from_secs(5));
        let kp = KeyPair::generate();
        let b = Address::from_bytes([0xbb; 20]);
        h.registry.create(b, "http://hooks.test/b", None, None).unwrap();

        let submission = pre_signed(&kp, b, 1);
        h.pipeline
            .submit_pre_signed(submission.clone(), h.node.clone())
            .await
            .unwrap();
        wait_for_broadcasts(&h.node, 1).await;
        drain(&mut h.deliveries);

        let err = h
            .pipeline
            .submit_pre_signed(submission, h.node.clone())
            .await
            .unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");

        // signature over different fields
        let mut forged = pre_signed(&kp, b, 2);
        forged.amount = 5_000;
        let err = h
            .pipeline
            .submit_pre_signed(forged, h.node.clone())
            .await
            .unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(h.node.broadcasts().await.len(), 1);
        assert!(drain(&mut h.deliveries).is_empty());
    }

    #[tokio::test]
    async fn test_malformed_submission() {
        let h = harness(Duration::from_secs(5));
        let mut submission = pre_signed(&KeyPair::generate(), Address::from_bytes([1u8; 20]), 1);
        submission.to = "not-an-address".into();
        let err = h
            .pipeline
            .submit_pre_signed(submission, h.node.clone())
            .await
            .unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");
        assert_eq!(h.node.pending_count().await, 0);
    }

    #[tokio::test]
    async fn test_broadcast_failure_does_not_fail_submission() {
        let mut h = harness(Duration::from_secs(5));
        let kp = KeyPair::generate();
        let a = Address::from_key_pair(&kp);
        let b = Address::from_bytes([1u8; 20]);
        h.registry.create(a, "http://hooks.test/a", None, None).unwrap();
        h.registry.create(b, "http://hooks.test/b", None, None).unwrap();
        h.node.fail_broadcasts(true);

        let receipt = h
            .pipeline
            .submit_pre_signed(pre_signed(&kp, b, 1), h.node.clone())
            .await
            .unwrap();
        assert_eq!(h.node.pending_count().await, 1);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(h.node.broadcasts().await.is_empty());

        let deliveries = drain(&mut h.deliveries);
        assert_eq!(deliveries.len(), 2);
        for party in [a, b] {
            let hits: Vec<&Delivery> = deliveries
                .iter()
                .filter(|d| d.event.address == party)
                .collect();
            assert_eq!(hits.len(), 1, "one delivery for {}", party);
            assert_eq!(hits[0].event.tx_hash, receipt.tx_hash);
        }
    }

    #[tokio::test]
    async fn test_height_window_fires_on_acceptance() {
        let mut h = harness(Duration::from_secs(5));
        let miner = Address::from_bytes([0xcc; 20]);
        for _ in 0..3 {
            h.node.mine_block(miner).await;
        }
        let tip = h.node.top_tip_height().await.unwrap();

        let kp = KeyPair::generate();
        let b = Address::from_bytes([0xbb; 20]);
        h.registry
            .create(b, "http://hooks.test/wide", Some(0), Some(1_000_000))
            .unwrap();
        h.registry
            .create(b, "http://hooks.test/at-tip", Some(tip), Some(tip))
            .unwrap();
        h.registry
            .create(b, "http://hooks.test/future", Some(tip + 1), None)
            .unwrap();
        h.registry
            .create(b, "http://hooks.test/past", None, Some(tip - 1))
            .unwrap();

        h.pipeline
            .submit_pre_signed(pre_signed(&kp, b, 1), h.node.clone())
            .await
            .unwrap();

        let deliveries = drain(&mut h.deliveries);
        let paths: Vec<&str> = deliveries.iter().map(|d| d.url.path()).collect();
        assert_eq!(paths, vec!["/wide", "/at-tip"]);
        assert!(deliveries.iter().all(|d| d.event.height == Some(tip)));
    }

    #[tokio::test]
    async fn test_submit_with_raw_key() {
        let h = harness(Duration::from_secs(5));
        let kp = KeyPair::generate();
        let fields = TxFields {
            from: None,
            to: Address::from_bytes([1u8; 20]),
            amount: 7,
            fee: 1,
            nonce: 1,
        };
        let receipt = h
            .pipeline
            .submit_with_credential(
                fields.clone(),
                Credential::PrivateKey(kp.private_key_hex()),
                h.node.clone(),
            )
            .await
            .unwrap();
        assert_eq!(receipt.tx.tx.from, Address::from_key_pair(&kp));
        assert!(receipt.tx.verify());

        let err = h
            .pipeline
            .submit_with_credential(
                fields,
                Credential::PrivateKey("zz".into()),
                h.node.clone(),
            )
            .await
            .unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_submit_with_wallet() {
        let h = harness(Duration::from_secs(5));
        let kp = KeyPair::generate();
        h.node
            .import(WalletSpec {
                name: Some("alice".into()),
                password: Some("pw".into()),
                private_key: Some(kp.private_key_hex()),
                ..Default::default()
            })
            .await
            .unwrap();
        let wallet = |password: &str| Credential::Wallet {
            name: "alice".into(),
            password: password.into(),
        };
        let fields = |from: Address, nonce: u32| TxFields {
            from: Some(from),
            to: Address::from_bytes([1u8; 20]),
            amount: 7,
            fee: 1,
            nonce,
        };

        let owner = Address::from_key_pair(&kp);
        let receipt = h
            .pipeline
            .submit_with_credential(fields(owner, 1), wallet("pw"), h.node.clone())
            .await
            .unwrap();
        assert!(receipt.tx.verify());

        let err = h
            .pipeline
            .submit_with_credential(fields(owner, 2), wallet("bad"), h.node.clone())
            .await
            .unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");

        let stranger = Address::from_bytes([9u8; 20]);
        let err = h
            .pipeline
            .submit_with_credential(fields(stranger, 2), wallet("pw"), h.node.clone())
            .await
            .unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");

        let err = h
            .pipeline
            .submit_with_credential(
                fields(owner, 2),
                Credential::Wallet {
                    name: "nobody".into(),
                    password: "pw".into(),
                },
                h.node.clone(),
            )
            .await
            .unwrap_err();
        assert_eq!(err.code(), "NOT_FOUND");
    }

    #[tokio::test]
    async fn test_slow_mempool_times_out() {
        let h = harness(Duration::from_millis(20));
        h.node.set_latency(Duration::from_millis(500));
        let err = h
            .pipeline
            .submit_pre_signed(
                pre_signed(&KeyPair::generate(), Address::from_bytes([1u8; 20]), 1),
                h.node.clone(),
            )
            .await
            .unwrap_err();
        assert_eq!(err.code(), "GATEWAY_TIMEOUT");
    }
}
