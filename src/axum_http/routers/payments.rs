use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
};
use tracing::{info, warn};

use crate::axum_http::identity::AuthUser;
use crate::domain::repositories::payments::PaymentRepository;
use crate::domain::repositories::token_balances::TokenBalanceRepository;
use crate::domain::value_objects::enums::payment_providers::PaymentProvider;
use crate::domain::value_objects::payments::{CreateOrderModel, VerifyPaymentModel};
use crate::gateways::GatewayRegistry;
use crate::infrastructure::postgres::postgres_connection::PgPoolSquad;
use crate::infrastructure::postgres::repositories::{
    payments::PaymentPostgres, token_balances::TokenBalancePostgres,
};
use crate::usecases::PaymentError;
use crate::usecases::payment_orders::{OrderPolicy, PaymentOrderUseCase};
use crate::usecases::reconciliation::ReconciliationUseCase;
use crate::usecases::token_ledger::TokenLedgerUseCase;

pub fn routes(
    db_pool: Arc<PgPoolSquad>,
    gateways: Arc<GatewayRegistry>,
    policy: OrderPolicy,
    fee_bps: i64,
) -> Router {
    let payment_repository = Arc::new(PaymentPostgres::new(Arc::clone(&db_pool)));
    let balance_repository = Arc::new(TokenBalancePostgres::new(Arc::clone(&db_pool)));
    let ledger = Arc::new(TokenLedgerUseCase::new(balance_repository));

    let orders_usecase = PaymentOrderUseCase::new(
        Arc::clone(&payment_repository),
        Arc::clone(&gateways),
        policy,
    );
    let reconciliation_usecase =
        ReconciliationUseCase::new(payment_repository, ledger, gateways, fee_bps);

    // The two usecases carry different state types, so they live on separate
    // sub-routers merged into one.
    let orders = Router::new()
        .route("/orders", post(create_order))
        .route("/orders/:provider_order_id", get(get_order_status))
        .with_state(Arc::new(orders_usecase));

    let reconcile = Router::new()
        .route("/verify", post(verify_payment))
        .route("/webhook/razorpay", post(razorpay_webhook))
        .route("/webhook/cashfree", post(cashfree_webhook))
        .with_state(Arc::new(reconciliation_usecase));

    orders.merge(reconcile)
}

pub async fn create_order<P>(
    State(usecase): State<Arc<PaymentOrderUseCase<P>>>,
    AuthUser { user_id }: AuthUser,
    Json(model): Json<CreateOrderModel>,
) -> impl IntoResponse
where
    P: PaymentRepository + Send + Sync + 'static,
{
    info!(%user_id, "payments: create order request received");
    match usecase.create_order(user_id, model).await {
        Ok(dto) => (StatusCode::CREATED, Json(dto)).into_response(),
        Err(err) => err.into_response(),
    }
}

pub async fn get_order_status<P>(
    State(usecase): State<Arc<PaymentOrderUseCase<P>>>,
    AuthUser { user_id }: AuthUser,
    Path(provider_order_id): Path<String>,
) -> impl IntoResponse
where
    P: PaymentRepository + Send + Sync + 'static,
{
    info!(%user_id, provider_order_id, "payments: order status request received");
    match usecase.get_order_status(&provider_order_id).await {
        Ok(dto) => Json(dto).into_response(),
        Err(err) => err.into_response(),
    }
}

/// The request body's signature is the authentication here; the handler never
/// trusts the client's claim of success beyond triggering a live check.
pub async fn verify_payment<P, B>(
    State(usecase): State<Arc<ReconciliationUseCase<P, B>>>,
    Json(model): Json<VerifyPaymentModel>,
) -> impl IntoResponse
where
    P: PaymentRepository + Send + Sync + 'static,
    B: TokenBalanceRepository + Send + Sync + 'static,
{
    info!(
        provider_order_id = %model.provider_order_id,
        "payments: verify request received"
    );
    match usecase.verify_client_callback(model).await {
        Ok(dto) => Json(dto).into_response(),
        Err(err) => err.into_response(),
    }
}

pub async fn razorpay_webhook<P, B>(
    State(usecase): State<Arc<ReconciliationUseCase<P, B>>>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse
where
    P: PaymentRepository + Send + Sync + 'static,
    B: TokenBalanceRepository + Send + Sync + 'static,
{
    let Some(signature) = header_str(&headers, "x-razorpay-signature") else {
        warn!("payments: razorpay webhook without signature header");
        return PaymentError::SignatureInvalid.into_response();
    };

    match usecase
        .process_webhook(PaymentProvider::Razorpay, &body, signature, None)
        .await
    {
        Ok(dto) => Json(dto).into_response(),
        Err(err) => err.into_response(),
    }
}

pub async fn cashfree_webhook<P, B>(
    State(usecase): State<Arc<ReconciliationUseCase<P, B>>>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse
where
    P: PaymentRepository + Send + Sync + 'static,
    B: TokenBalanceRepository + Send + Sync + 'static,
{
    let Some(signature) = header_str(&headers, "x-webhook-signature") else {
        warn!("payments: cashfree webhook without signature header");
        return PaymentError::SignatureInvalid.into_response();
    };
    // Cashfree signs timestamp + body; without the timestamp the signature
    // cannot verify.
    let timestamp = header_str(&headers, "x-webhook-timestamp");

    match usecase
        .process_webhook(PaymentProvider::Cashfree, &body, signature, timestamp)
        .await
    {
        Ok(dto) => Json(dto).into_response(),
        Err(err) => err.into_response(),
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}
