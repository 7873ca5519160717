//! Wallet Gateway: an HTTP API in front of a cryptocurrency wallet node
//!
//! This crate provides:
//! - A REST surface split into public and private routes, gated by the
//!   operating mode, with CORS answered at the edge
//! - A transaction submission pipeline (validate, enqueue, broadcast, notify)
//! - Stateless cursor pagination over address, block, mining and pending histories
//! - Webhook subscriptions on addresses, delivered asynchronously
//! - Two node backends: an HTTP client for a running node and an in-memory sandbox
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tokio::sync::mpsc;
//! use wallet_gateway::api::{create_router, ApiState};
//! use wallet_gateway::backend::{Backends, SandboxNode};
//! use wallet_gateway::config::GatewayConfig;
//! use wallet_gateway::subscription::{Dispatcher, SubscriptionRegistry};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = GatewayConfig::default();
//! let (outbox, queue) = mpsc::unbounded_channel();
//! let registry = Arc::new(SubscriptionRegistry::new(outbox));
//! tokio::spawn(Dispatcher::new(queue, config.webhook_timeout())?.run());
//!
//! let addr = config.bind_addr();
//! let backends = Backends::from_node(Arc::new(SandboxNode::new()));
//! let app = create_router(ApiState::new(Arc::new(config), backends, registry));
//! axum::serve(tokio::net::TcpListener::bind(addr).await?, app).await?;
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod backend;
pub mod config;
pub mod core;
pub mod crypto;
pub mod error;
pub mod history;
pub mod pipeline;
pub mod subscription;

// Re-export commonly used types
pub use api::{create_router, ApiState};
pub use backend::{Backends, SandboxNode, UpstreamNode};
pub use config::{GatewayConfig, GatewayMode};
pub use core::{Address, Hash, SignedTx, UnsignedTx};
pub use crypto::KeyPair;
pub use error::GatewayError;
pub use history::{Cursor, HistoryPage};
pub use pipeline::{SubmissionReceipt, TxPipeline};
pub use subscription::{Dispatcher, SubscriptionRegistry};
