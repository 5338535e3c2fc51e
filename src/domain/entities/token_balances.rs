use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::infrastructure::postgres::schema::token_balances;

/// One row per user, created lazily on the first credit. `balance` is kept
/// non-negative by the conditional debit in the repository.
#[derive(Debug, Clone, Selectable, Queryable)]
#[diesel(table_name = token_balances)]
pub struct TokenBalanceEntity {
    pub user_id: Uuid,
    pub balance: i64,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = token_balances)]
pub struct InsertTokenBalanceEntity {
    pub user_id: Uuid,
    pub balance: i64,
    pub updated_at: DateTime<Utc>,
}
