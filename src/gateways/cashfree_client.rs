use std::collections::HashMap;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use tracing::error;

use crate::config::config_model::CashfreeConfig;
use crate::domain::value_objects::enums::payment_providers::PaymentProvider;
use crate::gateways::{
    CreatedOrder, GatewayError, GatewayOrderStatus, PaymentGateway, ProviderOutcome, WebhookEvent,
    signatures_match,
};

type HmacSha256 = Hmac<Sha256>;

const API_VERSION: &str = "2023-08-01";

/// Cashfree Payment Gateway API client. Cashfree amounts are decimal rupees on
/// the wire; this client converts from and to minor units at the boundary.
/// https://docs.cashfree.com/reference/pg-new-apis-endpoint
pub struct CashfreeClient {
    http: reqwest::Client,
    config: CashfreeConfig,
}

#[derive(Debug, Serialize)]
struct CreateOrderRequest<'a> {
    order_id: &'a str,
    order_amount: f64,
    order_currency: &'a str,
    customer_details: CustomerDetails<'a>,
}

#[derive(Debug, Serialize)]
struct CustomerDetails<'a> {
    customer_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    customer_email: Option<&'a str>,
    customer_phone: &'a str,
}

#[derive(Debug, Deserialize)]
struct CashfreeOrder {
    order_id: String,
    order_status: String,
    order_amount: f64,
    payment_session_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CashfreeErrorEnvelope {
    message: Option<String>,
    code: Option<String>,
    #[serde(rename = "type")]
    type_: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CashfreeWebhookEnvelope {
    #[serde(rename = "type")]
    type_: String,
    data: CashfreeWebhookData,
}

#[derive(Debug, Deserialize)]
struct CashfreeWebhookData {
    order: CashfreeWebhookOrder,
    payment: Option<CashfreeWebhookPayment>,
}

#[derive(Debug, Deserialize)]
struct CashfreeWebhookOrder {
    order_id: String,
}

#[derive(Debug, Deserialize)]
struct CashfreeWebhookPayment {
    // Numeric in current payloads, string in older ones.
    cf_payment_id: Option<serde_json::Value>,
    payment_amount: Option<f64>,
}

fn to_minor_units(amount: f64) -> i64 {
    (amount * 100.0).round() as i64
}

impl CashfreeClient {
    pub fn new(config: CashfreeConfig, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build cashfree http client")?;

        Ok(Self { http, config })
    }

    fn is_configured(&self) -> bool {
        !self.config.client_id.is_empty() && !self.config.client_secret.is_empty()
    }

    fn ensure_configured(&self) -> Result<(), GatewayError> {
        if self.is_configured() {
            Ok(())
        } else {
            Err(GatewayError::Unavailable(
                "cashfree credentials not configured".to_string(),
            ))
        }
    }

    fn auth_headers(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        builder
            .header("x-client-id", &self.config.client_id)
            .header("x-client-secret", &self.config.client_secret)
            .header("x-api-version", API_VERSION)
    }

    async fn decode_error(resp: reqwest::Response, context: &str) -> GatewayError {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();

        let details = serde_json::from_str::<CashfreeErrorEnvelope>(&body).ok();
        let (message, code, type_) = match details {
            Some(details) => (details.message, details.code, details.type_),
            None => (None, None, None),
        };

        error!(
            status = %status,
            cashfree_error_code = ?code,
            cashfree_error_type = ?type_,
            cashfree_error_message = ?message,
            context = %context,
            "cashfree api request failed"
        );

        let message = message.unwrap_or_else(|| format!("http status {status}"));
        if status == reqwest::StatusCode::BAD_REQUEST && message.contains("order_amount") {
            GatewayError::InvalidAmount(message)
        } else if status.is_server_error() {
            GatewayError::Unavailable(format!("{context}: {message}"))
        } else {
            GatewayError::Other(anyhow::anyhow!("cashfree {context} failed: {message}"))
        }
    }

    fn hmac_base64(secret: &str, parts: &[&[u8]]) -> Option<String> {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).ok()?;
        for part in parts {
            mac.update(part);
        }
        Some(BASE64.encode(mac.finalize().into_bytes()))
    }
}

#[async_trait]
impl PaymentGateway for CashfreeClient {
    fn provider(&self) -> PaymentProvider {
        PaymentProvider::Cashfree
    }

    async fn create_order(
        &self,
        amount_minor: i64,
        currency: &str,
        receipt: &str,
        metadata: &HashMap<String, String>,
    ) -> Result<CreatedOrder, GatewayError> {
        self.ensure_configured()?;

        let customer_id = metadata
            .get("user_id")
            .map(String::as_str)
            .unwrap_or("guest");
        let customer_phone = metadata
            .get("customer_phone")
            .map(String::as_str)
            .unwrap_or("9999999999");

        let request = CreateOrderRequest {
            // Cashfree lets the merchant assign the order id; the receipt
            // reference doubles as our provider_order_id for this processor.
            order_id: receipt,
            order_amount: amount_minor as f64 / 100.0,
            order_currency: currency,
            customer_details: CustomerDetails {
                customer_id,
                customer_email: metadata.get("customer_email").map(String::as_str),
                customer_phone,
            },
        };

        let resp = self
            .auth_headers(self.http.post(format!("{}/orders", self.config.api_base_url)))
            .json(&request)
            .send()
            .await
            .map_err(|err| GatewayError::from_reqwest(err, "create order"))?;

        if !resp.status().is_success() {
            return Err(Self::decode_error(resp, "create order").await);
        }

        let order: CashfreeOrder = resp
            .json()
            .await
            .context("failed to decode cashfree order")?;
        let payment_session_id = order.payment_session_id.ok_or_else(|| {
            GatewayError::Other(anyhow::anyhow!("cashfree order has no payment session id"))
        })?;

        Ok(CreatedOrder {
            provider_order_id: order.order_id,
            client_handle: payment_session_id,
        })
    }

    async fn fetch_order_status(
        &self,
        provider_order_id: &str,
    ) -> Result<GatewayOrderStatus, GatewayError> {
        self.ensure_configured()?;

        let resp = self
            .auth_headers(self.http.get(format!(
                "{}/orders/{}",
                self.config.api_base_url, provider_order_id
            )))
            .send()
            .await
            .map_err(|err| GatewayError::from_reqwest(err, "fetch order"))?;

        if !resp.status().is_success() {
            return Err(Self::decode_error(resp, "fetch order").await);
        }

        let order: CashfreeOrder = resp
            .json()
            .await
            .context("failed to decode cashfree order")?;

        let amount_minor = to_minor_units(order.order_amount);
        let paid = order.order_status == "PAID";

        Ok(GatewayOrderStatus {
            paid,
            status: order.order_status,
            amount_paid_minor: if paid { amount_minor } else { 0 },
            amount_due_minor: if paid { 0 } else { amount_minor },
        })
    }

    fn verify_client_signature(
        &self,
        provider_order_id: &str,
        provider_payment_id: &str,
        signature: &str,
    ) -> bool {
        let payload = format!("{provider_order_id}|{provider_payment_id}");
        match Self::hmac_base64(&self.config.client_secret, &[payload.as_bytes()]) {
            Some(expected) => signatures_match(&expected, signature),
            None => false,
        }
    }

    /// Signature covers the timestamp header concatenated with the raw body.
    /// https://docs.cashfree.com/docs/webhooks
    fn verify_webhook_signature(
        &self,
        raw_body: &[u8],
        signature: &str,
        timestamp: Option<&str>,
    ) -> bool {
        let Some(timestamp) = timestamp else {
            return false;
        };

        match Self::hmac_base64(
            &self.config.webhook_secret,
            &[timestamp.as_bytes(), raw_body],
        ) {
            Some(expected) => signatures_match(&expected, signature),
            None => false,
        }
    }

    fn parse_webhook_event(&self, raw_body: &[u8]) -> Result<WebhookEvent, GatewayError> {
        let envelope: CashfreeWebhookEnvelope =
            serde_json::from_slice(raw_body).context("invalid cashfree webhook payload")?;

        let outcome = match envelope.type_.as_str() {
            "PAYMENT_SUCCESS_WEBHOOK" => Some(ProviderOutcome::Captured),
            "PAYMENT_FAILED_WEBHOOK" => Some(ProviderOutcome::Failed),
            "PAYMENT_USER_DROPPED_WEBHOOK" => Some(ProviderOutcome::Canceled),
            _ => None,
        };

        let payment = envelope.data.payment;
        let provider_payment_id = payment.as_ref().and_then(|payment| {
            payment.cf_payment_id.as_ref().map(|id| match id {
                serde_json::Value::String(value) => value.clone(),
                other => other.to_string(),
            })
        });
        let amount_minor = payment
            .as_ref()
            .and_then(|payment| payment.payment_amount)
            .map(to_minor_units);

        Ok(WebhookEvent {
            event_type: envelope.type_,
            provider_order_id: envelope.data.order.order_id,
            provider_payment_id,
            amount_minor,
            outcome,
        })
    }
}
