use std::sync::Arc;

use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::domain::entities::token_balances::TokenBalanceEntity;
use crate::domain::repositories::token_balances::TokenBalanceRepository;
use crate::domain::value_objects::wallets::WalletBalanceDto;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("insufficient token balance")]
    InsufficientBalance,

    #[error("token amount must be positive")]
    InvalidTokenAmount,

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl LedgerError {
    pub fn status_code(&self) -> axum::http::StatusCode {
        use axum::http::StatusCode;
        match self {
            LedgerError::InsufficientBalance => StatusCode::UNPROCESSABLE_ENTITY,
            LedgerError::InvalidTokenAmount => StatusCode::BAD_REQUEST,
            LedgerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Single owner of the per-user token balance. Credits and debits go through
/// atomic conditional statements in the repository, so two concurrent calls
/// for the same user can never interleave a read-modify-write.
pub struct TokenLedgerUseCase<B>
where
    B: TokenBalanceRepository + Send + Sync + 'static,
{
    balance_repo: Arc<B>,
}

impl<B> TokenLedgerUseCase<B>
where
    B: TokenBalanceRepository + Send + Sync + 'static,
{
    pub fn new(balance_repo: Arc<B>) -> Self {
        Self { balance_repo }
    }

    /// Credits `tokens` to the user, creating the balance row when absent.
    /// `payment_id` is the idempotency context: the caller's status gate
    /// guarantees at most one credit call per payment, and the id is logged
    /// so a failed credit can be compensated out-of-band.
    pub async fn credit(
        &self,
        user_id: Uuid,
        tokens: i64,
        payment_id: Uuid,
    ) -> Result<TokenBalanceEntity, LedgerError> {
        if tokens <= 0 {
            return Err(LedgerError::InvalidTokenAmount);
        }

        let row = self
            .balance_repo
            .credit(user_id, tokens)
            .await
            .map_err(|err| {
                error!(
                    %user_id,
                    %payment_id,
                    tokens,
                    db_error = ?err,
                    "ledger: credit failed"
                );
                LedgerError::Internal(err)
            })?;

        info!(
            %user_id,
            %payment_id,
            tokens,
            balance = row.balance,
            "ledger: credit applied"
        );

        Ok(row)
    }

    /// Spends tokens; a debit that would push the balance negative is
    /// rejected and leaves the row untouched.
    pub async fn debit(&self, user_id: Uuid, tokens: i64) -> Result<TokenBalanceEntity, LedgerError> {
        if tokens <= 0 {
            return Err(LedgerError::InvalidTokenAmount);
        }

        let row = self
            .balance_repo
            .debit_if_sufficient(user_id, tokens)
            .await
            .map_err(|err| {
                error!(%user_id, tokens, db_error = ?err, "ledger: debit failed");
                LedgerError::Internal(err)
            })?;

        match row {
            Some(row) => {
                info!(%user_id, tokens, balance = row.balance, "ledger: debit applied");
                Ok(row)
            }
            None => {
                warn!(%user_id, tokens, "ledger: debit rejected, insufficient balance");
                Err(LedgerError::InsufficientBalance)
            }
        }
    }

    pub async fn balance(&self, user_id: Uuid) -> Result<WalletBalanceDto, LedgerError> {
        let row = self
            .balance_repo
            .find_by_user_id(user_id)
            .await
            .map_err(|err| {
                error!(%user_id, db_error = ?err, "ledger: failed to load balance");
                LedgerError::Internal(err)
            })?;

        Ok(WalletBalanceDto::from_row(user_id, row))
    }
}
