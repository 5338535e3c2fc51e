use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::domain::value_objects::enums::payment_statuses::PaymentStatus;
use crate::infrastructure::postgres::schema::payments;

/// Canonical payment record. Rows are created in `pending` by order initiation,
/// driven to a terminal status by reconciliation, and never deleted.
#[derive(Debug, Clone, Identifiable, Selectable, Queryable)]
#[diesel(table_name = payments)]
pub struct PaymentEntity {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub provider: String,
    pub amount_minor: i64,
    pub currency: String,
    pub tokens: i64,
    pub status: String,
    pub provider_order_id: String,
    pub provider_payment_id: Option<String>,
    pub receipt: String,
    pub processing_fee_minor: Option<i64>,
    pub net_amount_minor: Option<i64>,
    pub error: Option<String>,
    pub metadata: serde_json::Value,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PaymentEntity {
    pub fn payment_status(&self) -> Option<PaymentStatus> {
        PaymentStatus::from_str(&self.status)
    }

    /// User the tokens belong to. Prefers the column; falls back to the
    /// metadata carried from order creation for rows that predate user-id
    /// propagation and are only ever seen through the webhook path.
    pub fn credit_user_id(&self) -> Option<Uuid> {
        self.user_id.or_else(|| {
            self.metadata
                .get("user_id")
                .and_then(|value| value.as_str())
                .and_then(|value| Uuid::parse_str(value).ok())
        })
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = payments)]
pub struct InsertPaymentEntity {
    pub user_id: Option<Uuid>,
    pub provider: String,
    pub amount_minor: i64,
    pub currency: String,
    pub tokens: i64,
    pub status: String,
    pub provider_order_id: String,
    pub provider_payment_id: Option<String>,
    pub receipt: String,
    pub metadata: serde_json::Value,
}

// NewPaymentEntity is the application-facing alias for inserting rows into `payments`.
pub type NewPaymentEntity = InsertPaymentEntity;

/// Write-once fields applied by the winning `pending -> succeeded` transition.
#[derive(Debug, Clone)]
pub struct PaymentSettlement {
    pub provider_payment_id: String,
    pub processing_fee_minor: i64,
    pub net_amount_minor: i64,
    pub paid_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_payment(user_id: Option<Uuid>, metadata: serde_json::Value) -> PaymentEntity {
        let now = Utc::now();
        PaymentEntity {
            id: Uuid::new_v4(),
            user_id,
            provider: "razorpay".to_string(),
            amount_minor: 49900,
            currency: "INR".to_string(),
            tokens: 4990,
            status: PaymentStatus::Pending.to_string(),
            provider_order_id: "order_123".to_string(),
            provider_payment_id: None,
            receipt: "rcpt_abc".to_string(),
            processing_fee_minor: None,
            net_amount_minor: None,
            error: None,
            metadata,
            paid_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn credit_user_id_prefers_column() {
        let column_user = Uuid::new_v4();
        let metadata_user = Uuid::new_v4();
        let payment = sample_payment(
            Some(column_user),
            serde_json::json!({ "user_id": metadata_user.to_string() }),
        );
        assert_eq!(payment.credit_user_id(), Some(column_user));
    }

    #[test]
    fn credit_user_id_falls_back_to_metadata() {
        let metadata_user = Uuid::new_v4();
        let payment = sample_payment(
            None,
            serde_json::json!({ "user_id": metadata_user.to_string() }),
        );
        assert_eq!(payment.credit_user_id(), Some(metadata_user));
    }

    #[test]
    fn credit_user_id_is_none_when_unrecoverable() {
        let payment = sample_payment(None, serde_json::json!({}));
        assert_eq!(payment.credit_user_id(), None);
    }
}
