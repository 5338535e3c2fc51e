use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Result as AnyResult, anyhow};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::config_model::Payments;
use crate::domain::entities::payments::NewPaymentEntity;
use crate::domain::repositories::payments::PaymentRepository;
use crate::domain::value_objects::enums::{
    payment_providers::PaymentProvider, payment_statuses::PaymentStatus,
};
use crate::domain::value_objects::payments::{
    CreateOrderModel, OrderCreatedDto, OrderStatusDto, PaymentDto,
};
use crate::gateways::{GatewayRegistry, PaymentGateway};
use crate::usecases::PaymentError;

/// Amount bounds and the fixed amount-to-token rate, lifted out of config.
#[derive(Debug, Clone)]
pub struct OrderPolicy {
    pub default_provider: PaymentProvider,
    pub min_amount_minor: i64,
    pub max_amount_minor: i64,
    pub tokens_per_hundred_minor: i64,
}

impl OrderPolicy {
    pub fn from_config(config: &Payments) -> AnyResult<Self> {
        let default_provider = PaymentProvider::from_str(&config.default_provider)
            .ok_or_else(|| anyhow!("unknown default provider: {}", config.default_provider))?;

        Ok(Self {
            default_provider,
            min_amount_minor: config.min_amount_minor,
            max_amount_minor: config.max_amount_minor,
            tokens_per_hundred_minor: config.tokens_per_hundred_minor,
        })
    }
}

/// `floor(amount / 100 * rate)` with integer arithmetic; the token count is
/// fixed at order creation and never recomputed.
pub fn tokens_for_amount(amount_minor: i64, tokens_per_hundred_minor: i64) -> i64 {
    amount_minor * tokens_per_hundred_minor / 100
}

pub struct PaymentOrderUseCase<P>
where
    P: PaymentRepository + Send + Sync + 'static,
{
    payment_repo: Arc<P>,
    gateways: Arc<GatewayRegistry>,
    policy: OrderPolicy,
}

impl<P> PaymentOrderUseCase<P>
where
    P: PaymentRepository + Send + Sync + 'static,
{
    pub fn new(payment_repo: Arc<P>, gateways: Arc<GatewayRegistry>, policy: OrderPolicy) -> Self {
        Self {
            payment_repo,
            gateways,
            policy,
        }
    }

    fn gateway(&self, provider: PaymentProvider) -> Result<Arc<dyn PaymentGateway>, PaymentError> {
        self.gateways
            .get(provider)
            .ok_or_else(|| PaymentError::Internal(anyhow!("no gateway registered for {provider}")))
    }

    /// Creates a provider-side order and persists the matching `pending`
    /// payment row. Gateway failures propagate unchanged: the user is present
    /// and can resubmit, so nothing retries here and nothing is persisted.
    pub async fn create_order(
        &self,
        user_id: Uuid,
        model: CreateOrderModel,
    ) -> Result<OrderCreatedDto, PaymentError> {
        let provider = match model.provider.as_deref() {
            Some(value) => PaymentProvider::from_str(value).ok_or_else(|| {
                warn!(%user_id, provider = value, "payments: unsupported provider requested");
                PaymentError::UnsupportedProvider(value.to_string())
            })?,
            None => self.policy.default_provider,
        };

        let amount_minor = model.amount_minor_units;
        if amount_minor < self.policy.min_amount_minor || amount_minor > self.policy.max_amount_minor
        {
            let err = PaymentError::InvalidAmount(format!(
                "amount must be between {} and {} minor units",
                self.policy.min_amount_minor, self.policy.max_amount_minor
            ));
            warn!(
                %user_id,
                amount_minor,
                status = err.status_code().as_u16(),
                "payments: amount out of bounds"
            );
            return Err(err);
        }

        let currency = model.currency.unwrap_or_else(|| "INR".to_string());
        let tokens = tokens_for_amount(amount_minor, self.policy.tokens_per_hundred_minor);
        // Receipt reference for the processor dashboard; this system's own
        // idempotency hangs off the payment row, not the receipt.
        let receipt = format!("rcpt_{}", Uuid::new_v4().simple());

        let mut metadata: HashMap<String, String> = model.metadata.unwrap_or_default();
        metadata.insert("user_id".to_string(), user_id.to_string());
        if let Some(email) = model.customer_email.as_deref() {
            metadata.insert("customer_email".to_string(), email.to_string());
        }

        info!(
            %user_id,
            %provider,
            amount_minor,
            tokens,
            receipt = %receipt,
            "payments: creating provider order"
        );

        let created = self
            .gateway(provider)?
            .create_order(amount_minor, &currency, &receipt, &metadata)
            .await
            .map_err(|err| {
                error!(
                    %user_id,
                    %provider,
                    amount_minor,
                    error = ?err,
                    "payments: provider order creation failed"
                );
                PaymentError::from(err)
            })?;

        let metadata_json = serde_json::to_value(&metadata)
            .map_err(|err| PaymentError::Internal(err.into()))?;

        let payment = self
            .payment_repo
            .create_payment(NewPaymentEntity {
                user_id: Some(user_id),
                provider: provider.to_string(),
                amount_minor,
                currency: currency.clone(),
                tokens,
                status: PaymentStatus::Pending.to_string(),
                provider_order_id: created.provider_order_id.clone(),
                provider_payment_id: None,
                receipt,
                metadata: metadata_json,
            })
            .await
            .map_err(|err| {
                error!(
                    %user_id,
                    %provider,
                    provider_order_id = %created.provider_order_id,
                    db_error = ?err,
                    "payments: failed to persist pending payment"
                );
                PaymentError::Internal(err)
            })?;

        info!(
            %user_id,
            %provider,
            payment_id = %payment.id,
            provider_order_id = %payment.provider_order_id,
            "payments: pending payment recorded"
        );

        Ok(OrderCreatedDto {
            payment_id: payment.id,
            provider: payment.provider,
            provider_order_id: payment.provider_order_id,
            client_handle: created.client_handle,
            amount_minor_units: payment.amount_minor,
            currency,
            tokens: payment.tokens,
        })
    }

    /// Live provider view of an order alongside the local record.
    pub async fn get_order_status(
        &self,
        provider_order_id: &str,
    ) -> Result<OrderStatusDto, PaymentError> {
        let payment = self
            .payment_repo
            .find_by_provider_order_id(provider_order_id)
            .await
            .map_err(|err| {
                error!(
                    provider_order_id,
                    db_error = ?err,
                    "payments: failed to load payment"
                );
                PaymentError::Internal(err)
            })?
            .ok_or_else(|| PaymentError::UnknownPayment(provider_order_id.to_string()))?;

        let provider = PaymentProvider::from_str(&payment.provider).ok_or_else(|| {
            PaymentError::Internal(anyhow!(
                "payment {} carries unknown provider {}",
                payment.id,
                payment.provider
            ))
        })?;

        let live = self
            .gateway(provider)?
            .fetch_order_status(provider_order_id)
            .await
            .map_err(PaymentError::from)?;

        Ok(OrderStatusDto {
            provider: payment.provider.clone(),
            provider_order_id: payment.provider_order_id.clone(),
            provider_status: live.status,
            paid: live.paid,
            amount_paid_minor_units: live.amount_paid_minor,
            amount_due_minor_units: live.amount_due_minor,
            payment: PaymentDto::from(payment),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    use crate::domain::entities::payments::PaymentEntity;
    use crate::domain::repositories::payments::MockPaymentRepository;
    use crate::gateways::{CreatedOrder, GatewayError, MockPaymentGateway};

    fn policy() -> OrderPolicy {
        OrderPolicy {
            default_provider: PaymentProvider::Razorpay,
            min_amount_minor: 100,
            max_amount_minor: 1_000_000,
            tokens_per_hundred_minor: 10,
        }
    }

    fn registry_with(gateway: MockPaymentGateway) -> Arc<GatewayRegistry> {
        let mut registry = GatewayRegistry::new();
        registry.register(Arc::new(gateway));
        Arc::new(registry)
    }

    fn entity_from_insert(insert: NewPaymentEntity) -> PaymentEntity {
        let now = Utc::now();
        PaymentEntity {
            id: Uuid::new_v4(),
            user_id: insert.user_id,
            provider: insert.provider,
            amount_minor: insert.amount_minor,
            currency: insert.currency,
            tokens: insert.tokens,
            status: insert.status,
            provider_order_id: insert.provider_order_id,
            provider_payment_id: insert.provider_payment_id,
            receipt: insert.receipt,
            processing_fee_minor: None,
            net_amount_minor: None,
            error: None,
            metadata: insert.metadata,
            paid_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn token_rate_floors_like_the_rate_table() {
        assert_eq!(tokens_for_amount(49900, 10), 4990);
        assert_eq!(tokens_for_amount(49950, 10), 4995);
        assert_eq!(tokens_for_amount(99, 10), 9);
    }

    #[tokio::test]
    async fn creates_pending_payment_with_precomputed_tokens() {
        let user_id = Uuid::new_v4();

        let mut gateway = MockPaymentGateway::new();
        gateway
            .expect_provider()
            .return_const(PaymentProvider::Razorpay);
        gateway
            .expect_create_order()
            .times(1)
            .returning(|_, _, _, _| {
                Box::pin(async {
                    Ok(CreatedOrder {
                        provider_order_id: "order_123".to_string(),
                        client_handle: "order_123".to_string(),
                    })
                })
            });

        let mut payment_repo = MockPaymentRepository::new();
        payment_repo
            .expect_create_payment()
            .withf(move |insert| {
                insert.user_id == Some(user_id)
                    && insert.status == "pending"
                    && insert.tokens == 4990
                    && insert.provider_order_id == "order_123"
                    && insert.metadata.get("user_id").and_then(|v| v.as_str())
                        == Some(user_id.to_string()).as_deref()
            })
            .times(1)
            .returning(|insert| Box::pin(async move { Ok(entity_from_insert(insert)) }));

        let usecase = PaymentOrderUseCase::new(
            Arc::new(payment_repo),
            registry_with(gateway),
            policy(),
        );

        let dto = usecase
            .create_order(
                user_id,
                CreateOrderModel {
                    amount_minor_units: 49900,
                    currency: None,
                    customer_email: None,
                    provider: None,
                    metadata: None,
                },
            )
            .await
            .unwrap();

        assert_eq!(dto.tokens, 4990);
        assert_eq!(dto.currency, "INR");
        assert_eq!(dto.provider_order_id, "order_123");
    }

    #[tokio::test]
    async fn rejects_amount_below_minimum_before_touching_the_gateway() {
        let mut gateway = MockPaymentGateway::new();
        gateway
            .expect_provider()
            .return_const(PaymentProvider::Razorpay);
        gateway.expect_create_order().times(0);

        let mut payment_repo = MockPaymentRepository::new();
        payment_repo.expect_create_payment().times(0);

        let usecase = PaymentOrderUseCase::new(
            Arc::new(payment_repo),
            registry_with(gateway),
            policy(),
        );

        let result = usecase
            .create_order(
                Uuid::new_v4(),
                CreateOrderModel {
                    amount_minor_units: 50,
                    currency: None,
                    customer_email: None,
                    provider: None,
                    metadata: None,
                },
            )
            .await;

        assert!(matches!(result, Err(PaymentError::InvalidAmount(_))));
    }

    #[tokio::test]
    async fn gateway_unavailable_propagates_and_persists_nothing() {
        let mut gateway = MockPaymentGateway::new();
        gateway
            .expect_provider()
            .return_const(PaymentProvider::Razorpay);
        gateway
            .expect_create_order()
            .times(1)
            .returning(|_, _, _, _| {
                Box::pin(async {
                    Err(GatewayError::Unavailable("connect timeout".to_string()))
                })
            });

        let mut payment_repo = MockPaymentRepository::new();
        payment_repo.expect_create_payment().times(0);

        let usecase = PaymentOrderUseCase::new(
            Arc::new(payment_repo),
            registry_with(gateway),
            policy(),
        );

        let result = usecase
            .create_order(
                Uuid::new_v4(),
                CreateOrderModel {
                    amount_minor_units: 49900,
                    currency: None,
                    customer_email: None,
                    provider: None,
                    metadata: None,
                },
            )
            .await;

        assert!(matches!(result, Err(PaymentError::GatewayUnavailable(_))));
    }

    #[tokio::test]
    async fn unknown_order_id_is_rejected_without_gateway_call() {
        let mut gateway = MockPaymentGateway::new();
        gateway
            .expect_provider()
            .return_const(PaymentProvider::Razorpay);
        gateway.expect_fetch_order_status().times(0);

        let mut payment_repo = MockPaymentRepository::new();
        payment_repo
            .expect_find_by_provider_order_id()
            .times(1)
            .returning(|_| Box::pin(async { Ok(None) }));

        let usecase = PaymentOrderUseCase::new(
            Arc::new(payment_repo),
            registry_with(gateway),
            policy(),
        );

        let result = usecase.get_order_status("order_missing").await;
        assert!(matches!(result, Err(PaymentError::UnknownPayment(_))));
    }
}
