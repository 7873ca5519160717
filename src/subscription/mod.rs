//! Webhook subscriptions on addresses
//!
//! `SubscriptionRegistry` maps addresses to callback URLs and turns address
//! activity into queued deliveries; `Dispatcher` drains that queue over HTTP.

pub mod dispatcher;
pub mod registry;

pub use dispatcher::{Dispatcher, WebhookPayload};
pub use registry::{
    parse_callback_url, AddressEvent, Delivery, Subscription, SubscriptionError,
    SubscriptionRegistry,
};
