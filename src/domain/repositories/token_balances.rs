use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;
use uuid::Uuid;

use crate::domain::entities::token_balances::TokenBalanceEntity;

#[async_trait]
#[automock]
pub trait TokenBalanceRepository {
    /// Lazily creates the balance row and atomically increments it.
    async fn credit(&self, user_id: Uuid, tokens: i64) -> Result<TokenBalanceEntity>;

    /// Atomically decrements the balance only when it covers `tokens`.
    /// Returns `None` when the balance is missing or insufficient; the row is
    /// left untouched in that case.
    async fn debit_if_sufficient(
        &self,
        user_id: Uuid,
        tokens: i64,
    ) -> Result<Option<TokenBalanceEntity>>;

    async fn find_by_user_id(&self, user_id: Uuid) -> Result<Option<TokenBalanceEntity>>;
}
