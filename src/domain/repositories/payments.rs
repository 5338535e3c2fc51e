use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;

use crate::domain::entities::payments::{NewPaymentEntity, PaymentEntity, PaymentSettlement};
use crate::domain::value_objects::enums::payment_statuses::PaymentStatus;

#[async_trait]
#[automock]
pub trait PaymentRepository {
    async fn create_payment(&self, payment: NewPaymentEntity) -> Result<PaymentEntity>;

    async fn find_by_provider_order_id(
        &self,
        provider_order_id: &str,
    ) -> Result<Option<PaymentEntity>>;

    /// Conditional `pending -> succeeded` transition. Returns `None` when the
    /// row is no longer pending, which is how the losing side of a racing
    /// verify/webhook pair observes that settlement already happened.
    async fn settle_succeeded_if_pending(
        &self,
        provider_order_id: &str,
        settlement: PaymentSettlement,
    ) -> Result<Option<PaymentEntity>>;

    /// Conditional `pending -> failed|canceled` transition, same discipline as
    /// `settle_succeeded_if_pending`.
    async fn mark_terminal_if_pending(
        &self,
        provider_order_id: &str,
        status: PaymentStatus,
        error: Option<String>,
    ) -> Result<Option<PaymentEntity>>;
}
