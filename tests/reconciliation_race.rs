use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;
use uuid::Uuid;

use counsel_coins::domain::entities::payments::{
    NewPaymentEntity, PaymentEntity, PaymentSettlement,
};
use counsel_coins::domain::entities::token_balances::TokenBalanceEntity;
use counsel_coins::domain::repositories::payments::PaymentRepository;
use counsel_coins::domain::repositories::token_balances::TokenBalanceRepository;
use counsel_coins::domain::value_objects::enums::payment_providers::PaymentProvider;
use counsel_coins::domain::value_objects::enums::payment_statuses::PaymentStatus;
use counsel_coins::domain::value_objects::payments::VerifyPaymentModel;
use counsel_coins::gateways::{
    CreatedOrder, GatewayError, GatewayOrderStatus, GatewayRegistry, PaymentGateway,
    ProviderOutcome, WebhookEvent,
};
use counsel_coins::usecases::reconciliation::ReconciliationUseCase;
use counsel_coins::usecases::token_ledger::TokenLedgerUseCase;

const FEE_BPS: i64 = 200;

/// Keyed by provider_order_id, with the same conditional-update discipline the
/// Postgres repository gets from `UPDATE ... WHERE status = 'pending'`.
#[derive(Default)]
struct InMemoryPayments {
    rows: Mutex<HashMap<String, PaymentEntity>>,
}

impl InMemoryPayments {
    fn seed_pending(&self, user_id: Uuid, amount_minor: i64, tokens: i64) -> PaymentEntity {
        let now = Utc::now();
        let order_id = format!("order_{}", Uuid::new_v4().simple());
        let payment = PaymentEntity {
            id: Uuid::new_v4(),
            user_id: Some(user_id),
            provider: "razorpay".to_string(),
            amount_minor,
            currency: "INR".to_string(),
            tokens,
            status: PaymentStatus::Pending.to_string(),
            provider_order_id: order_id.clone(),
            provider_payment_id: None,
            receipt: format!("rcpt_{}", Uuid::new_v4().simple()),
            processing_fee_minor: None,
            net_amount_minor: None,
            error: None,
            metadata: json!({ "user_id": user_id.to_string() }),
            paid_at: None,
            created_at: now,
            updated_at: now,
        };
        self.rows
            .lock()
            .unwrap()
            .insert(order_id, payment.clone());
        payment
    }
}

#[async_trait]
impl PaymentRepository for InMemoryPayments {
    async fn create_payment(&self, payment: NewPaymentEntity) -> Result<PaymentEntity> {
        let now = Utc::now();
        let row = PaymentEntity {
            id: Uuid::new_v4(),
            user_id: payment.user_id,
            provider: payment.provider,
            amount_minor: payment.amount_minor,
            currency: payment.currency,
            tokens: payment.tokens,
            status: payment.status,
            provider_order_id: payment.provider_order_id.clone(),
            provider_payment_id: payment.provider_payment_id,
            receipt: payment.receipt,
            processing_fee_minor: None,
            net_amount_minor: None,
            error: None,
            metadata: payment.metadata,
            paid_at: None,
            created_at: now,
            updated_at: now,
        };
        self.rows
            .lock()
            .unwrap()
            .insert(payment.provider_order_id, row.clone());
        Ok(row)
    }

    async fn find_by_provider_order_id(
        &self,
        provider_order_id: &str,
    ) -> Result<Option<PaymentEntity>> {
        Ok(self.rows.lock().unwrap().get(provider_order_id).cloned())
    }

    async fn settle_succeeded_if_pending(
        &self,
        provider_order_id: &str,
        settlement: PaymentSettlement,
    ) -> Result<Option<PaymentEntity>> {
        let mut rows = self.rows.lock().unwrap();
        let Some(row) = rows.get_mut(provider_order_id) else {
            return Ok(None);
        };
        if row.status != PaymentStatus::Pending.to_string() {
            return Ok(None);
        }
        row.status = PaymentStatus::Succeeded.to_string();
        row.provider_payment_id = Some(settlement.provider_payment_id);
        row.processing_fee_minor = Some(settlement.processing_fee_minor);
        row.net_amount_minor = Some(settlement.net_amount_minor);
        row.paid_at = Some(settlement.paid_at);
        row.updated_at = Utc::now();
        Ok(Some(row.clone()))
    }

    async fn mark_terminal_if_pending(
        &self,
        provider_order_id: &str,
        status: PaymentStatus,
        error: Option<String>,
    ) -> Result<Option<PaymentEntity>> {
        let mut rows = self.rows.lock().unwrap();
        let Some(row) = rows.get_mut(provider_order_id) else {
            return Ok(None);
        };
        if row.status != PaymentStatus::Pending.to_string() {
            return Ok(None);
        }
        row.status = status.to_string();
        row.error = error;
        row.updated_at = Utc::now();
        Ok(Some(row.clone()))
    }
}

#[derive(Default)]
struct InMemoryBalances {
    rows: Mutex<HashMap<Uuid, TokenBalanceEntity>>,
    credit_calls: AtomicUsize,
}

impl InMemoryBalances {
    fn balance_of(&self, user_id: Uuid) -> i64 {
        self.rows
            .lock()
            .unwrap()
            .get(&user_id)
            .map(|row| row.balance)
            .unwrap_or(0)
    }
}

#[async_trait]
impl TokenBalanceRepository for InMemoryBalances {
    async fn credit(&self, user_id: Uuid, tokens: i64) -> Result<TokenBalanceEntity> {
        self.credit_calls.fetch_add(1, Ordering::SeqCst);
        let mut rows = self.rows.lock().unwrap();
        let row = rows.entry(user_id).or_insert(TokenBalanceEntity {
            user_id,
            balance: 0,
            updated_at: Utc::now(),
        });
        row.balance += tokens;
        row.updated_at = Utc::now();
        Ok(row.clone())
    }

    async fn debit_if_sufficient(
        &self,
        user_id: Uuid,
        tokens: i64,
    ) -> Result<Option<TokenBalanceEntity>> {
        let mut rows = self.rows.lock().unwrap();
        match rows.get_mut(&user_id) {
            Some(row) if row.balance >= tokens => {
                row.balance -= tokens;
                row.updated_at = Utc::now();
                Ok(Some(row.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn find_by_user_id(&self, user_id: Uuid) -> Result<Option<TokenBalanceEntity>> {
        Ok(self.rows.lock().unwrap().get(&user_id).cloned())
    }
}

/// Always-paid processor double. Signatures match the literal "valid".
struct FakeGateway {
    amount_minor: i64,
}

#[async_trait]
impl PaymentGateway for FakeGateway {
    fn provider(&self) -> PaymentProvider {
        PaymentProvider::Razorpay
    }

    async fn create_order(
        &self,
        _amount_minor: i64,
        _currency: &str,
        _receipt: &str,
        _metadata: &HashMap<String, String>,
    ) -> Result<CreatedOrder, GatewayError> {
        let order_id = format!("order_{}", Uuid::new_v4().simple());
        Ok(CreatedOrder {
            provider_order_id: order_id.clone(),
            client_handle: order_id,
        })
    }

    async fn fetch_order_status(
        &self,
        _provider_order_id: &str,
    ) -> Result<GatewayOrderStatus, GatewayError> {
        Ok(GatewayOrderStatus {
            status: "paid".to_string(),
            paid: true,
            amount_paid_minor: self.amount_minor,
            amount_due_minor: 0,
        })
    }

    fn verify_client_signature(
        &self,
        _provider_order_id: &str,
        _provider_payment_id: &str,
        signature: &str,
    ) -> bool {
        signature == "valid"
    }

    fn verify_webhook_signature(
        &self,
        _raw_body: &[u8],
        signature: &str,
        _timestamp: Option<&str>,
    ) -> bool {
        signature == "valid"
    }

    fn parse_webhook_event(&self, raw_body: &[u8]) -> Result<WebhookEvent, GatewayError> {
        let body: serde_json::Value =
            serde_json::from_slice(raw_body).map_err(|err| GatewayError::Other(err.into()))?;
        Ok(WebhookEvent {
            event_type: "payment.captured".to_string(),
            provider_order_id: body["order_id"].as_str().unwrap_or_default().to_string(),
            provider_payment_id: body["payment_id"].as_str().map(str::to_string),
            amount_minor: body["amount"].as_i64(),
            outcome: Some(ProviderOutcome::Captured),
        })
    }
}

struct Harness {
    payments: Arc<InMemoryPayments>,
    balances: Arc<InMemoryBalances>,
    usecase: Arc<ReconciliationUseCase<InMemoryPayments, InMemoryBalances>>,
}

fn harness(amount_minor: i64) -> Harness {
    let payments = Arc::new(InMemoryPayments::default());
    let balances = Arc::new(InMemoryBalances::default());
    let ledger = Arc::new(TokenLedgerUseCase::new(Arc::clone(&balances)));

    let mut registry = GatewayRegistry::new();
    registry.register(Arc::new(FakeGateway { amount_minor }));

    let usecase = Arc::new(ReconciliationUseCase::new(
        Arc::clone(&payments),
        ledger,
        Arc::new(registry),
        FEE_BPS,
    ));

    Harness {
        payments,
        balances,
        usecase,
    }
}

fn webhook_body(provider_order_id: &str, amount_minor: i64) -> Vec<u8> {
    serde_json::to_vec(&json!({
        "order_id": provider_order_id,
        "payment_id": "pay_race",
        "amount": amount_minor,
    }))
    .unwrap()
}

#[tokio::test]
async fn racing_verify_and_webhook_credit_exactly_once() {
    const AMOUNT: i64 = 49900;
    const TOKENS: i64 = 4990;
    const ROUNDS: usize = 25;

    let h = harness(AMOUNT);
    let user_id = Uuid::new_v4();

    for round in 0..ROUNDS {
        let payment = h.payments.seed_pending(user_id, AMOUNT, TOKENS);
        let order_id = payment.provider_order_id.clone();

        let verify = {
            let usecase = Arc::clone(&h.usecase);
            let order_id = order_id.clone();
            tokio::spawn(async move {
                usecase
                    .verify_client_callback(VerifyPaymentModel {
                        provider_order_id: order_id,
                        provider_payment_id: "pay_race".to_string(),
                        client_signature: "valid".to_string(),
                    })
                    .await
            })
        };

        let webhook = {
            let usecase = Arc::clone(&h.usecase);
            let body = webhook_body(&order_id, AMOUNT);
            tokio::spawn(async move {
                usecase
                    .process_webhook(PaymentProvider::Razorpay, &body, "valid", None)
                    .await
            })
        };

        let (verify_result, webhook_result) = tokio::join!(verify, webhook);
        let verified = verify_result.unwrap().unwrap();
        let webhook_dto = webhook_result.unwrap().unwrap();

        // Both triggers observe the settled payment, whoever won.
        assert!(verified.verified, "round {round}: verify saw the settlement");
        assert_eq!(webhook_dto.status, "succeeded");

        let expected = TOKENS * (round as i64 + 1);
        assert_eq!(
            h.balances.balance_of(user_id),
            expected,
            "round {round}: exactly one credit per payment"
        );
    }

    assert_eq!(h.balances.credit_calls.load(Ordering::SeqCst), ROUNDS);
}

#[tokio::test]
async fn webhook_replay_does_not_credit_twice() {
    const AMOUNT: i64 = 10000;
    const TOKENS: i64 = 1000;

    let h = harness(AMOUNT);
    let user_id = Uuid::new_v4();
    let payment = h.payments.seed_pending(user_id, AMOUNT, TOKENS);
    let body = webhook_body(&payment.provider_order_id, AMOUNT);

    for _ in 0..3 {
        let dto = h
            .usecase
            .process_webhook(PaymentProvider::Razorpay, &body, "valid", None)
            .await
            .unwrap();
        assert_eq!(dto.status, "succeeded");
    }

    assert_eq!(h.balances.balance_of(user_id), TOKENS);
    assert_eq!(h.balances.credit_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn verify_after_webhook_settlement_reads_the_settled_row() {
    const AMOUNT: i64 = 25000;
    const TOKENS: i64 = 2500;

    let h = harness(AMOUNT);
    let user_id = Uuid::new_v4();
    let payment = h.payments.seed_pending(user_id, AMOUNT, TOKENS);
    let body = webhook_body(&payment.provider_order_id, AMOUNT);

    h.usecase
        .process_webhook(PaymentProvider::Razorpay, &body, "valid", None)
        .await
        .unwrap();

    let verified = h
        .usecase
        .verify_client_callback(VerifyPaymentModel {
            provider_order_id: payment.provider_order_id.clone(),
            provider_payment_id: "pay_race".to_string(),
            client_signature: "valid".to_string(),
        })
        .await
        .unwrap();

    assert!(verified.verified);
    assert_eq!(verified.payment.processing_fee_minor_units, Some(500));
    assert_eq!(h.balances.credit_calls.load(Ordering::SeqCst), 1);
}
