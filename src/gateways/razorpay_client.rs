use std::collections::HashMap;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use tracing::error;

use crate::config::config_model::RazorpayConfig;
use crate::domain::value_objects::enums::payment_providers::PaymentProvider;
use crate::gateways::{
    CreatedOrder, GatewayError, GatewayOrderStatus, PaymentGateway, ProviderOutcome, WebhookEvent,
    signatures_match,
};

type HmacSha256 = Hmac<Sha256>;

/// Minimal Razorpay Orders API client built on reqwest.
/// https://razorpay.com/docs/api/orders/
pub struct RazorpayClient {
    http: reqwest::Client,
    config: RazorpayConfig,
}

#[derive(Debug, Serialize)]
struct CreateOrderRequest<'a> {
    /// Amount in the smallest currency unit (paise for INR).
    amount: i64,
    currency: &'a str,
    receipt: &'a str,
    notes: &'a HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
pub struct RazorpayOrder {
    pub id: String,
    pub amount: i64,
    pub amount_paid: i64,
    pub amount_due: i64,
    pub currency: String,
    pub status: String,
}

#[derive(Debug, Deserialize)]
struct RazorpayErrorEnvelope {
    error: RazorpayErrorDetails,
}

#[derive(Debug, Deserialize)]
struct RazorpayErrorDetails {
    code: Option<String>,
    description: Option<String>,
    field: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RazorpayWebhookEnvelope {
    event: String,
    payload: RazorpayWebhookPayload,
}

#[derive(Debug, Deserialize)]
struct RazorpayWebhookPayload {
    payment: Option<RazorpayWebhookPayment>,
}

#[derive(Debug, Deserialize)]
struct RazorpayWebhookPayment {
    entity: RazorpayPaymentEntity,
}

#[derive(Debug, Deserialize)]
struct RazorpayPaymentEntity {
    id: String,
    order_id: Option<String>,
    amount: Option<i64>,
}

impl RazorpayClient {
    pub fn new(config: RazorpayConfig, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build razorpay http client")?;

        Ok(Self { http, config })
    }

    fn is_configured(&self) -> bool {
        !self.config.key_id.is_empty() && !self.config.key_secret.is_empty()
    }

    fn ensure_configured(&self) -> Result<(), GatewayError> {
        if self.is_configured() {
            Ok(())
        } else {
            Err(GatewayError::Unavailable(
                "razorpay credentials not configured".to_string(),
            ))
        }
    }

    async fn decode_error(resp: reqwest::Response, context: &str) -> GatewayError {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();

        let details = serde_json::from_str::<RazorpayErrorEnvelope>(&body)
            .ok()
            .map(|envelope| envelope.error);
        let (code, description, field) = match details {
            Some(details) => (details.code, details.description, details.field),
            None => (None, None, None),
        };

        error!(
            status = %status,
            razorpay_error_code = ?code,
            razorpay_error_description = ?description,
            razorpay_error_field = ?field,
            context = %context,
            "razorpay api request failed"
        );

        let description = description.unwrap_or_else(|| format!("http status {status}"));
        if status == reqwest::StatusCode::BAD_REQUEST && field.as_deref() == Some("amount") {
            GatewayError::InvalidAmount(description)
        } else if status.is_server_error() {
            GatewayError::Unavailable(format!("{context}: {description}"))
        } else {
            GatewayError::Other(anyhow::anyhow!("razorpay {context} failed: {description}"))
        }
    }

    fn hmac_hex(secret: &str, payload: &[u8]) -> Option<String> {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).ok()?;
        mac.update(payload);
        Some(hex::encode(mac.finalize().into_bytes()))
    }
}

#[async_trait]
impl PaymentGateway for RazorpayClient {
    fn provider(&self) -> PaymentProvider {
        PaymentProvider::Razorpay
    }

    async fn create_order(
        &self,
        amount_minor: i64,
        currency: &str,
        receipt: &str,
        metadata: &HashMap<String, String>,
    ) -> Result<CreatedOrder, GatewayError> {
        self.ensure_configured()?;

        let resp = self
            .http
            .post(format!("{}/orders", self.config.api_base_url))
            .basic_auth(&self.config.key_id, Some(&self.config.key_secret))
            .json(&CreateOrderRequest {
                amount: amount_minor,
                currency,
                receipt,
                notes: metadata,
            })
            .send()
            .await
            .map_err(|err| GatewayError::from_reqwest(err, "create order"))?;

        if !resp.status().is_success() {
            return Err(Self::decode_error(resp, "create order").await);
        }

        let order: RazorpayOrder = resp
            .json()
            .await
            .context("failed to decode razorpay order")?;

        Ok(CreatedOrder {
            // The checkout SDK opens with the order id and the public key id.
            client_handle: order.id.clone(),
            provider_order_id: order.id,
        })
    }

    async fn fetch_order_status(
        &self,
        provider_order_id: &str,
    ) -> Result<GatewayOrderStatus, GatewayError> {
        self.ensure_configured()?;

        let resp = self
            .http
            .get(format!(
                "{}/orders/{}",
                self.config.api_base_url, provider_order_id
            ))
            .basic_auth(&self.config.key_id, Some(&self.config.key_secret))
            .send()
            .await
            .map_err(|err| GatewayError::from_reqwest(err, "fetch order"))?;

        if !resp.status().is_success() {
            return Err(Self::decode_error(resp, "fetch order").await);
        }

        let order: RazorpayOrder = resp
            .json()
            .await
            .context("failed to decode razorpay order")?;

        Ok(GatewayOrderStatus {
            paid: order.status == "paid",
            status: order.status,
            amount_paid_minor: order.amount_paid,
            amount_due_minor: order.amount_due,
        })
    }

    /// https://razorpay.com/docs/payments/payment-gateway/web-integration/standard/build-integration/#16-verify-payment-signature
    fn verify_client_signature(
        &self,
        provider_order_id: &str,
        provider_payment_id: &str,
        signature: &str,
    ) -> bool {
        let payload = format!("{provider_order_id}|{provider_payment_id}");
        match Self::hmac_hex(&self.config.key_secret, payload.as_bytes()) {
            Some(expected) => signatures_match(&expected, signature),
            None => false,
        }
    }

    /// Signature covers the raw body bytes with the dedicated webhook secret.
    /// https://razorpay.com/docs/webhooks/validate-test/
    fn verify_webhook_signature(
        &self,
        raw_body: &[u8],
        signature: &str,
        _timestamp: Option<&str>,
    ) -> bool {
        match Self::hmac_hex(&self.config.webhook_secret, raw_body) {
            Some(expected) => signatures_match(&expected, signature),
            None => false,
        }
    }

    fn parse_webhook_event(&self, raw_body: &[u8]) -> Result<WebhookEvent, GatewayError> {
        let envelope: RazorpayWebhookEnvelope =
            serde_json::from_slice(raw_body).context("invalid razorpay webhook payload")?;

        let outcome = match envelope.event.as_str() {
            "payment.captured" | "order.paid" => Some(ProviderOutcome::Captured),
            "payment.failed" => Some(ProviderOutcome::Failed),
            _ => None,
        };

        let payment = envelope
            .payload
            .payment
            .map(|payment| payment.entity)
            .ok_or_else(|| {
                GatewayError::Other(anyhow::anyhow!(
                    "razorpay webhook missing payment entity for event {}",
                    envelope.event
                ))
            })?;
        let provider_order_id = payment.order_id.ok_or_else(|| {
            GatewayError::Other(anyhow::anyhow!("razorpay webhook payment has no order id"))
        })?;

        Ok(WebhookEvent {
            event_type: envelope.event,
            provider_order_id,
            provider_payment_id: Some(payment.id),
            amount_minor: payment.amount,
            outcome,
        })
    }
}
