use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use diesel::prelude::*;

use crate::domain::entities::payments::{NewPaymentEntity, PaymentEntity, PaymentSettlement};
use crate::domain::repositories::payments::PaymentRepository;
use crate::domain::value_objects::enums::payment_statuses::PaymentStatus;
use crate::infrastructure::postgres::{postgres_connection::PgPoolSquad, schema::payments};

pub struct PaymentPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl PaymentPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl PaymentRepository for PaymentPostgres {
    async fn create_payment(&self, payment: NewPaymentEntity) -> Result<PaymentEntity> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let row = diesel::insert_into(payments::table)
            .values(&payment)
            .returning(PaymentEntity::as_returning())
            .get_result::<PaymentEntity>(&mut conn)?;

        Ok(row)
    }

    async fn find_by_provider_order_id(
        &self,
        provider_order_id: &str,
    ) -> Result<Option<PaymentEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let row = payments::table
            .filter(payments::provider_order_id.eq(provider_order_id))
            .select(PaymentEntity::as_select())
            .first::<PaymentEntity>(&mut conn)
            .optional()?;

        Ok(row)
    }

    async fn settle_succeeded_if_pending(
        &self,
        provider_order_id: &str,
        settlement: PaymentSettlement,
    ) -> Result<Option<PaymentEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        // The status filter makes this a compare-and-set: of two racing
        // reconciliation attempts only one matches a pending row.
        let row = diesel::update(
            payments::table
                .filter(payments::provider_order_id.eq(provider_order_id))
                .filter(payments::status.eq(PaymentStatus::Pending.as_str())),
        )
        .set((
            payments::status.eq(PaymentStatus::Succeeded.as_str()),
            payments::provider_payment_id.eq(settlement.provider_payment_id),
            payments::processing_fee_minor.eq(settlement.processing_fee_minor),
            payments::net_amount_minor.eq(settlement.net_amount_minor),
            payments::paid_at.eq(settlement.paid_at),
            payments::updated_at.eq(Utc::now()),
        ))
        .returning(PaymentEntity::as_returning())
        .get_result::<PaymentEntity>(&mut conn)
        .optional()?;

        Ok(row)
    }

    async fn mark_terminal_if_pending(
        &self,
        provider_order_id: &str,
        status: PaymentStatus,
        error: Option<String>,
    ) -> Result<Option<PaymentEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let row = diesel::update(
            payments::table
                .filter(payments::provider_order_id.eq(provider_order_id))
                .filter(payments::status.eq(PaymentStatus::Pending.as_str())),
        )
        .set((
            payments::status.eq(status.as_str()),
            payments::error.eq(error),
            payments::updated_at.eq(Utc::now()),
        ))
        .returning(PaymentEntity::as_returning())
        .get_result::<PaymentEntity>(&mut conn)
        .optional()?;

        Ok(row)
    }
}
