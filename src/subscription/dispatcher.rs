//! Outbound webhook delivery
//!
//! Deliveries are drained from the registry's queue and POSTed one task per
//! call, so a slow endpoint never holds back the others. Delivery is
//! best-effort: failures are logged and dropped.

use super::registry::{AddressEvent, Delivery};
use serde::Serialize;
use std::time::Duration;
use tokio::sync::mpsc;

/// JSON body POSTed to a callback URL
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookPayload<'a> {
    pub subscription_id: u64,
    pub event: &'a AddressEvent,
}

pub struct Dispatcher {
    queue: mpsc::UnboundedReceiver<Delivery>,
    client: reqwest::Client,
}

impl Dispatcher {
    /// `timeout` bounds each individual webhook call
    pub fn new(
        queue: mpsc::UnboundedReceiver<Delivery>,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("wallet-gateway/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { queue, client })
    }

    /// Run until every registry handle is dropped
    pub async fn run(mut self) {
        log::info!("Webhook dispatcher started");
        while let Some(delivery) = self.queue.recv().await {
            let client = self.client.clone();
            tokio::spawn(async move {
                deliver(&client, delivery).await;
            });
        }
        log::info!("Webhook dispatcher stopped");
    }
}

async fn deliver(client: &reqwest::Client, delivery: Delivery) {
    let payload = WebhookPayload {
        subscription_id: delivery.subscription_id,
        event: &delivery.event,
    };
    let result = client
        .post(delivery.url.clone())
        .json(&payload)
        .send()
        .await
        .and_then(|resp| resp.error_for_status());

    match result {
        Ok(_) => log::debug!(
            "Delivered {} to subscription {} at {}",
            delivery.event.tx_hash,
            delivery.subscription_id,
            delivery.url
        ),
        Err(e) => log::warn!(
            "Webhook delivery to {} (subscription {}) failed: {}",
            delivery.url,
            delivery.subscription_id,
            e
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Address, Hash};
    use crate::subscription::SubscriptionRegistry;
    use axum::{extract::State, routing::post, Json, Router};

    fn event(address: Address) -> AddressEvent {
        AddressEvent {
            address,
            tx_hash: Hash::from_bytes([4u8; 32]),
            from: address,
            to: Address::from_bytes([8u8; 20]),
            amount: 10,
            fee: 1,
            nonce: 1,
            timestamp: 1_700_000_000_000,
            height: None,
        }
    }

    /// Local receiver forwarding every POSTed body to a channel
    async fn receiver() -> (String, mpsc::UnboundedReceiver<serde_json::Value>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let app = Router::new()
            .route(
                "/hook",
                post(
                    |State(tx): State<mpsc::UnboundedSender<serde_json::Value>>,
                     Json(body): Json<serde_json::Value>| async move {
                        let _ = tx.send(body);
                    },
                ),
            )
            .with_state(tx);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{}/hook", addr), rx)
    }

    #[tokio::test]
    async fn test_delivers_to_callback() {
        let (url, mut received) = receiver().await;
        let (tx, rx) = mpsc::unbounded_channel();
        let registry = SubscriptionRegistry::new(tx);
        tokio::spawn(Dispatcher::new(rx, Duration::from_secs(5)).unwrap().run());

        let address = Address::from_bytes([3u8; 20]);
        let id = registry.create(address, &url, None, None).unwrap();
        assert_eq!(registry.notify(address, &event(address)), 1);

        let body = tokio::time::timeout(Duration::from_secs(5), received.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(body["subscriptionId"], id);
        assert_eq!(body["event"]["address"], address.to_string());
        assert_eq!(body["event"]["amount"], 10);
    }

    #[tokio::test]
    async fn test_dead_endpoint_does_not_block_others() {
        let (url, mut received) = receiver().await;
        // nothing listens on a port we just released
        let dead = {
            let l = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            format!("http://{}/gone", l.local_addr().unwrap())
        };

        let (tx, rx) = mpsc::unbounded_channel();
        let registry = SubscriptionRegistry::new(tx);
        tokio::spawn(Dispatcher::new(rx, Duration::from_secs(2)).unwrap().run());

        let address = Address::from_bytes([5u8; 20]);
        registry.create(address, &dead, None, None).unwrap();
        registry.create(address, &url, None, None).unwrap();
        assert_eq!(registry.notify(address, &event(address)), 2);

        let body = tokio::time::timeout(Duration::from_secs(5), received.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(body["subscriptionId"], 2);
    }
}
