use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::entities::payments::PaymentEntity;
use crate::domain::value_objects::enums::payment_statuses::PaymentStatus;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderModel {
    pub amount_minor_units: i64,
    pub currency: Option<String>,
    pub customer_email: Option<String>,
    /// Overrides the configured default processor for this order.
    pub provider: Option<String>,
    #[serde(default)]
    pub metadata: Option<HashMap<String, String>>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderCreatedDto {
    pub payment_id: Uuid,
    pub provider: String,
    pub provider_order_id: String,
    /// Value the client SDK needs to open the payment UI: Razorpay order id,
    /// Cashfree payment session id.
    pub client_handle: String,
    pub amount_minor_units: i64,
    pub currency: String,
    pub tokens: i64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyPaymentModel {
    pub provider_order_id: String,
    pub provider_payment_id: String,
    pub client_signature: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentDto {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub provider: String,
    pub amount_minor_units: i64,
    pub currency: String,
    pub tokens: i64,
    pub status: String,
    pub provider_order_id: String,
    pub provider_payment_id: Option<String>,
    pub processing_fee_minor_units: Option<i64>,
    pub net_amount_minor_units: Option<i64>,
    pub error: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<PaymentEntity> for PaymentDto {
    fn from(entity: PaymentEntity) -> Self {
        Self {
            id: entity.id,
            user_id: entity.user_id,
            provider: entity.provider,
            amount_minor_units: entity.amount_minor,
            currency: entity.currency,
            tokens: entity.tokens,
            status: entity.status,
            provider_order_id: entity.provider_order_id,
            provider_payment_id: entity.provider_payment_id,
            processing_fee_minor_units: entity.processing_fee_minor,
            net_amount_minor_units: entity.net_amount_minor,
            error: entity.error,
            paid_at: entity.paid_at,
            created_at: entity.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifiedPaymentDto {
    pub verified: bool,
    pub payment: PaymentDto,
}

impl VerifiedPaymentDto {
    pub fn from_entity(entity: PaymentEntity) -> Self {
        let verified = PaymentStatus::from_str(&entity.status) == Some(PaymentStatus::Succeeded);
        Self {
            verified,
            payment: PaymentDto::from(entity),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderStatusDto {
    pub provider: String,
    pub provider_order_id: String,
    pub provider_status: String,
    pub paid: bool,
    pub amount_paid_minor_units: i64,
    pub amount_due_minor_units: i64,
    pub payment: PaymentDto,
}
