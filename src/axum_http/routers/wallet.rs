use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    response::IntoResponse,
    routing::{get, post},
};
use tracing::info;

use crate::axum_http::identity::AuthUser;
use crate::domain::repositories::token_balances::TokenBalanceRepository;
use crate::domain::value_objects::wallets::{SpendTokensModel, WalletBalanceDto};
use crate::infrastructure::postgres::postgres_connection::PgPoolSquad;
use crate::infrastructure::postgres::repositories::token_balances::TokenBalancePostgres;
use crate::usecases::token_ledger::TokenLedgerUseCase;

pub fn routes(db_pool: Arc<PgPoolSquad>) -> Router {
    let balance_repository = TokenBalancePostgres::new(Arc::clone(&db_pool));
    let ledger = TokenLedgerUseCase::new(Arc::new(balance_repository));

    Router::new()
        .route("/balance", get(get_balance))
        .route("/spend", post(spend_tokens))
        .with_state(Arc::new(ledger))
}

pub async fn get_balance<B>(
    State(ledger): State<Arc<TokenLedgerUseCase<B>>>,
    AuthUser { user_id }: AuthUser,
) -> impl IntoResponse
where
    B: TokenBalanceRepository + Send + Sync + 'static,
{
    match ledger.balance(user_id).await {
        Ok(dto) => Json(dto).into_response(),
        Err(err) => err.into_response(),
    }
}

pub async fn spend_tokens<B>(
    State(ledger): State<Arc<TokenLedgerUseCase<B>>>,
    AuthUser { user_id }: AuthUser,
    Json(model): Json<SpendTokensModel>,
) -> impl IntoResponse
where
    B: TokenBalanceRepository + Send + Sync + 'static,
{
    info!(%user_id, tokens = model.tokens, "wallet: spend request received");
    match ledger.debit(user_id, model.tokens).await {
        Ok(row) => Json(WalletBalanceDto::from_row(user_id, Some(row))).into_response(),
        Err(err) => err.into_response(),
    }
}
