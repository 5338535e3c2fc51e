use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::entities::token_balances::TokenBalanceEntity;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpendTokensModel {
    pub tokens: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletBalanceDto {
    pub user_id: Uuid,
    pub balance: i64,
    pub updated_at: Option<DateTime<Utc>>,
}

impl WalletBalanceDto {
    /// Balance rows are created lazily, so a missing row reads as zero.
    pub fn from_row(user_id: Uuid, row: Option<TokenBalanceEntity>) -> Self {
        match row {
            Some(entity) => Self {
                user_id: entity.user_id,
                balance: entity.balance,
                updated_at: Some(entity.updated_at),
            },
            None => Self {
                user_id,
                balance: 0,
                updated_at: None,
            },
        }
    }
}
