use std::sync::Arc;

use anyhow::anyhow;
use chrono::Utc;
use tracing::{error, info, warn};

use crate::domain::entities::payments::{PaymentEntity, PaymentSettlement};
use crate::domain::repositories::payments::PaymentRepository;
use crate::domain::repositories::token_balances::TokenBalanceRepository;
use crate::domain::value_objects::enums::{
    payment_providers::PaymentProvider, payment_statuses::PaymentStatus,
};
use crate::domain::value_objects::payments::{PaymentDto, VerifiedPaymentDto, VerifyPaymentModel};
use crate::gateways::{GatewayRegistry, PaymentGateway, ProviderOutcome};
use crate::usecases::PaymentError;
use crate::usecases::token_ledger::TokenLedgerUseCase;

/// Drives `pending` payments to a terminal status and credits tokens exactly
/// once per payment. Two independent triggers feed it for the same payment,
/// the client's synchronous verify callback and the processor webhook, and
/// either may win; the conditional status update in the repository is the
/// arbiter.
pub struct ReconciliationUseCase<P, B>
where
    P: PaymentRepository + Send + Sync + 'static,
    B: TokenBalanceRepository + Send + Sync + 'static,
{
    payment_repo: Arc<P>,
    ledger: Arc<TokenLedgerUseCase<B>>,
    gateways: Arc<GatewayRegistry>,
    fee_bps: i64,
}

impl<P, B> ReconciliationUseCase<P, B>
where
    P: PaymentRepository + Send + Sync + 'static,
    B: TokenBalanceRepository + Send + Sync + 'static,
{
    pub fn new(
        payment_repo: Arc<P>,
        ledger: Arc<TokenLedgerUseCase<B>>,
        gateways: Arc<GatewayRegistry>,
        fee_bps: i64,
    ) -> Self {
        Self {
            payment_repo,
            ledger,
            gateways,
            fee_bps,
        }
    }

    fn gateway(&self, provider: &str) -> Result<Arc<dyn PaymentGateway>, PaymentError> {
        let provider = PaymentProvider::from_str(provider)
            .ok_or_else(|| PaymentError::Internal(anyhow!("unknown provider on payment row: {provider}")))?;
        self.gateways
            .get(provider)
            .ok_or_else(|| PaymentError::Internal(anyhow!("no gateway registered for {provider}")))
    }

    async fn find_payment(&self, provider_order_id: &str) -> Result<PaymentEntity, PaymentError> {
        self.payment_repo
            .find_by_provider_order_id(provider_order_id)
            .await
            .map_err(|err| {
                error!(
                    provider_order_id,
                    db_error = ?err,
                    "reconciliation: failed to load payment"
                );
                PaymentError::Internal(err)
            })?
            .ok_or_else(|| PaymentError::UnknownPayment(provider_order_id.to_string()))
    }

    /// Client-driven verification after the payment UI closes. The signature
    /// only authenticates the request; the verdict comes from a live order
    /// fetch against the processor, never from the client's claim.
    pub async fn verify_client_callback(
        &self,
        model: VerifyPaymentModel,
    ) -> Result<VerifiedPaymentDto, PaymentError> {
        // Lookup precedes signature verification: the per-provider secret
        // lives with the payment row. Nothing is mutated before the
        // signature check passes.
        let payment = self.find_payment(&model.provider_order_id).await?;
        let gateway = self.gateway(&payment.provider)?;

        if !gateway.verify_client_signature(
            &model.provider_order_id,
            &model.provider_payment_id,
            &model.client_signature,
        ) {
            warn!(
                provider_order_id = %model.provider_order_id,
                provider = %payment.provider,
                "reconciliation: client signature rejected"
            );
            return Err(PaymentError::SignatureInvalid);
        }

        if payment.payment_status().is_some_and(|s| s.is_terminal()) {
            info!(
                payment_id = %payment.id,
                status = %payment.status,
                "reconciliation: verify replay on settled payment"
            );
            return Ok(VerifiedPaymentDto::from_entity(payment));
        }

        let live = gateway
            .fetch_order_status(&model.provider_order_id)
            .await
            .map_err(PaymentError::from)?;

        let settled = if live.paid && live.amount_paid_minor == payment.amount_minor {
            self.settle(
                payment,
                ProviderOutcome::Captured,
                Some(model.provider_payment_id.clone()),
                None,
            )
            .await?
        } else if live.paid {
            // Paid, but not the amount this order was created for. Settle as
            // failed so no tokens flow; the row keeps the discrepancy for
            // manual review.
            warn!(
                provider_order_id = %model.provider_order_id,
                expected = payment.amount_minor,
                paid = live.amount_paid_minor,
                "reconciliation: paid amount does not match order"
            );
            let expected_amount_minor = payment.amount_minor;
            self.settle(
                payment,
                ProviderOutcome::Failed,
                Some(model.provider_payment_id.clone()),
                Some(format!(
                    "amount mismatch: expected {} minor units, processor reports {}",
                    expected_amount_minor, live.amount_paid_minor
                )),
            )
            .await?
        } else {
            self.settle(
                payment,
                ProviderOutcome::Failed,
                Some(model.provider_payment_id.clone()),
                Some(format!("processor reports order {}", live.status)),
            )
            .await?
        };

        Ok(VerifiedPaymentDto::from_entity(settled))
    }

    /// Processor webhook path. `raw_body` must be the untouched request bytes.
    /// Unknown payments are rejected, never created; a webhook is a claim
    /// about an order this system already opened.
    pub async fn process_webhook(
        &self,
        provider: PaymentProvider,
        raw_body: &[u8],
        signature: &str,
        timestamp: Option<&str>,
    ) -> Result<PaymentDto, PaymentError> {
        let gateway = self
            .gateways
            .get(provider)
            .ok_or_else(|| PaymentError::Internal(anyhow!("no gateway registered for {provider}")))?;

        if !gateway.verify_webhook_signature(raw_body, signature, timestamp) {
            warn!(%provider, "reconciliation: webhook signature rejected");
            return Err(PaymentError::SignatureInvalid);
        }

        let event = gateway.parse_webhook_event(raw_body).map_err(PaymentError::from)?;
        let payment = self.find_payment(&event.provider_order_id).await?;

        let Some(outcome) = event.outcome else {
            info!(
                payment_id = %payment.id,
                event_type = %event.event_type,
                "reconciliation: webhook event ignored"
            );
            return Ok(PaymentDto::from(payment));
        };

        info!(
            payment_id = %payment.id,
            %provider,
            event_type = %event.event_type,
            outcome = ?outcome,
            "reconciliation: webhook event accepted"
        );

        let settled = match outcome {
            ProviderOutcome::Captured => {
                if let Some(reported) = event.amount_minor {
                    if reported != payment.amount_minor {
                        warn!(
                            payment_id = %payment.id,
                            expected = payment.amount_minor,
                            reported,
                            "reconciliation: webhook amount does not match order"
                        );
                        let note = format!(
                            "amount mismatch: expected {} minor units, webhook reports {reported}",
                            payment.amount_minor
                        );
                        return self
                            .settle(
                                payment,
                                ProviderOutcome::Failed,
                                event.provider_payment_id,
                                Some(note),
                            )
                            .await
                            .map(PaymentDto::from);
                    }
                }
                self.settle(payment, outcome, event.provider_payment_id, None)
                    .await?
            }
            ProviderOutcome::Failed | ProviderOutcome::Canceled => {
                self.settle(
                    payment,
                    outcome,
                    event.provider_payment_id,
                    Some(format!("processor event {}", event.event_type)),
                )
                .await?
            }
        };

        Ok(PaymentDto::from(settled))
    }

    /// Single settlement funnel for both triggers. The conditional update only
    /// fires while the row is still `pending`; the loser of a race gets `None`
    /// back and re-reads the row the winner wrote.
    async fn settle(
        &self,
        payment: PaymentEntity,
        outcome: ProviderOutcome,
        provider_payment_id: Option<String>,
        error_note: Option<String>,
    ) -> Result<PaymentEntity, PaymentError> {
        if payment.payment_status().is_some_and(|s| s.is_terminal()) {
            info!(
                payment_id = %payment.id,
                status = %payment.status,
                "reconciliation: replay on settled payment, no-op"
            );
            return Ok(payment);
        }

        match outcome {
            ProviderOutcome::Captured => {
                let provider_payment_id = provider_payment_id.ok_or_else(|| {
                    PaymentError::Internal(anyhow!(
                        "captured outcome without a provider payment id for payment {}",
                        payment.id
                    ))
                })?;

                let processing_fee_minor = payment.amount_minor * self.fee_bps / 10_000;
                let settlement = PaymentSettlement {
                    provider_payment_id,
                    processing_fee_minor,
                    net_amount_minor: payment.amount_minor - processing_fee_minor,
                    paid_at: Utc::now(),
                };

                let updated = self
                    .payment_repo
                    .settle_succeeded_if_pending(&payment.provider_order_id, settlement)
                    .await
                    .map_err(|err| {
                        error!(
                            payment_id = %payment.id,
                            db_error = ?err,
                            "reconciliation: settlement update failed"
                        );
                        PaymentError::Internal(err)
                    })?;

                match updated {
                    Some(settled) => {
                        info!(
                            payment_id = %settled.id,
                            tokens = settled.tokens,
                            "reconciliation: payment settled as succeeded"
                        );
                        self.apply_credit(&settled).await;
                        Ok(settled)
                    }
                    None => self.reload_after_lost_race(&payment).await,
                }
            }
            ProviderOutcome::Failed | ProviderOutcome::Canceled => {
                let status = match outcome {
                    ProviderOutcome::Canceled => PaymentStatus::Canceled,
                    _ => PaymentStatus::Failed,
                };

                let updated = self
                    .payment_repo
                    .mark_terminal_if_pending(&payment.provider_order_id, status, error_note)
                    .await
                    .map_err(|err| {
                        error!(
                            payment_id = %payment.id,
                            db_error = ?err,
                            "reconciliation: terminal update failed"
                        );
                        PaymentError::Internal(err)
                    })?;

                match updated {
                    Some(settled) => {
                        info!(
                            payment_id = %settled.id,
                            status = %settled.status,
                            "reconciliation: payment settled without credit"
                        );
                        Ok(settled)
                    }
                    None => self.reload_after_lost_race(&payment).await,
                }
            }
        }
    }

    /// Tokens follow the status write; the status row is the idempotency gate,
    /// so this runs at most once per payment. A credit failure after the
    /// status committed is logged loudly with everything needed to replay it
    /// by hand, and does not fail the reconciliation call.
    async fn apply_credit(&self, payment: &PaymentEntity) {
        let Some(user_id) = payment.credit_user_id() else {
            error!(
                payment_id = %payment.id,
                tokens = payment.tokens,
                "reconciliation: settled payment has no creditable user, manual credit required"
            );
            return;
        };

        if let Err(err) = self.ledger.credit(user_id, payment.tokens, payment.id).await {
            error!(
                payment_id = %payment.id,
                %user_id,
                tokens = payment.tokens,
                credit_error = ?err,
                "reconciliation: payment succeeded but token credit failed, manual credit required"
            );
        }
    }

    /// The conditional update matched nothing, so the other trigger settled
    /// first. Return what it wrote.
    async fn reload_after_lost_race(
        &self,
        payment: &PaymentEntity,
    ) -> Result<PaymentEntity, PaymentError> {
        info!(
            payment_id = %payment.id,
            "reconciliation: lost settlement race, reloading row"
        );

        self.payment_repo
            .find_by_provider_order_id(&payment.provider_order_id)
            .await
            .map_err(PaymentError::Internal)?
            .ok_or_else(|| {
                PaymentError::Internal(anyhow!(
                    "payment {} vanished after lost settlement race",
                    payment.id
                ))
            })
    }
}
