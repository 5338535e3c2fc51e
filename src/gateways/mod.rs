pub mod cashfree_client;
pub mod razorpay_client;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use mockall::automock;
use subtle::ConstantTimeEq;
use thiserror::Error;

use crate::domain::value_objects::enums::payment_providers::PaymentProvider;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("payment gateway unavailable: {0}")]
    Unavailable(String),
    #[error("gateway rejected amount: {0}")]
    InvalidAmount(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl GatewayError {
    /// Network-level failures (connect errors, bounded-timeout expiry) all
    /// surface as `Unavailable`; the caller decides whether to retry.
    pub fn from_reqwest(err: reqwest::Error, context: &str) -> Self {
        if err.is_timeout() || err.is_connect() {
            GatewayError::Unavailable(format!("{context}: {err}"))
        } else {
            GatewayError::Other(err.into())
        }
    }
}

#[derive(Debug, Clone)]
pub struct CreatedOrder {
    pub provider_order_id: String,
    /// Handle the client SDK needs to open the payment UI.
    pub client_handle: String,
}

#[derive(Debug, Clone)]
pub struct GatewayOrderStatus {
    pub status: String,
    pub paid: bool,
    pub amount_paid_minor: i64,
    pub amount_due_minor: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderOutcome {
    Captured,
    Failed,
    Canceled,
}

#[derive(Debug, Clone)]
pub struct WebhookEvent {
    pub event_type: String,
    pub provider_order_id: String,
    pub provider_payment_id: Option<String>,
    pub amount_minor: Option<i64>,
    /// `None` for event types this subsystem does not act on; those are
    /// acknowledged without any state change.
    pub outcome: Option<ProviderOutcome>,
}

/// One implementation per external processor. Reconciliation never cares
/// which processor is behind the trait; the payment row records which one to
/// dispatch to.
#[async_trait]
#[automock]
pub trait PaymentGateway: Send + Sync {
    fn provider(&self) -> PaymentProvider;

    async fn create_order(
        &self,
        amount_minor: i64,
        currency: &str,
        receipt: &str,
        metadata: &HashMap<String, String>,
    ) -> Result<CreatedOrder, GatewayError>;

    async fn fetch_order_status(
        &self,
        provider_order_id: &str,
    ) -> Result<GatewayOrderStatus, GatewayError>;

    fn verify_client_signature(
        &self,
        provider_order_id: &str,
        provider_payment_id: &str,
        signature: &str,
    ) -> bool;

    /// Must be fed the exact raw request bytes; any re-serialization breaks
    /// the signature. `timestamp` carries the processor's timestamp header for
    /// schemes that sign it along with the body.
    fn verify_webhook_signature<'a>(
        &self,
        raw_body: &[u8],
        signature: &str,
        timestamp: Option<&'a str>,
    ) -> bool;

    /// Only called after `verify_webhook_signature` succeeded.
    fn parse_webhook_event(&self, raw_body: &[u8]) -> Result<WebhookEvent, GatewayError>;
}

/// Runtime dispatch table, keyed by the provider recorded on each payment.
#[derive(Default)]
pub struct GatewayRegistry {
    gateways: HashMap<PaymentProvider, Arc<dyn PaymentGateway>>,
}

impl GatewayRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, gateway: Arc<dyn PaymentGateway>) {
        self.gateways.insert(gateway.provider(), gateway);
    }

    pub fn get(&self, provider: PaymentProvider) -> Option<Arc<dyn PaymentGateway>> {
        self.gateways.get(&provider).cloned()
    }
}

/// Constant-time comparison of encoded signatures.
pub(crate) fn signatures_match(expected: &str, provided: &str) -> bool {
    if expected.len() != provided.len() {
        return false;
    }

    expected.as_bytes().ct_eq(provided.as_bytes()).into()
}
