use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use diesel::prelude::*;
use uuid::Uuid;

use crate::domain::entities::token_balances::{InsertTokenBalanceEntity, TokenBalanceEntity};
use crate::domain::repositories::token_balances::TokenBalanceRepository;
use crate::infrastructure::postgres::{postgres_connection::PgPoolSquad, schema::token_balances};

pub struct TokenBalancePostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl TokenBalancePostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl TokenBalanceRepository for TokenBalancePostgres {
    async fn credit(&self, user_id: Uuid, tokens: i64) -> Result<TokenBalanceEntity> {
        let mut conn = Arc::clone(&self.db_pool).get()?;
        let now = Utc::now();

        // Single-statement upsert so concurrent credits for the same user
        // serialize inside Postgres instead of racing a read-modify-write.
        let row = diesel::insert_into(token_balances::table)
            .values(&InsertTokenBalanceEntity {
                user_id,
                balance: tokens,
                updated_at: now,
            })
            .on_conflict(token_balances::user_id)
            .do_update()
            .set((
                token_balances::balance.eq(token_balances::balance + tokens),
                token_balances::updated_at.eq(now),
            ))
            .returning(TokenBalanceEntity::as_returning())
            .get_result::<TokenBalanceEntity>(&mut conn)?;

        Ok(row)
    }

    async fn debit_if_sufficient(
        &self,
        user_id: Uuid,
        tokens: i64,
    ) -> Result<Option<TokenBalanceEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        // The balance guard keeps the row non-negative; zero rows updated
        // means the spend was rejected.
        let row = diesel::update(
            token_balances::table
                .filter(token_balances::user_id.eq(user_id))
                .filter(token_balances::balance.ge(tokens)),
        )
        .set((
            token_balances::balance.eq(token_balances::balance - tokens),
            token_balances::updated_at.eq(Utc::now()),
        ))
        .returning(TokenBalanceEntity::as_returning())
        .get_result::<TokenBalanceEntity>(&mut conn)
        .optional()?;

        Ok(row)
    }

    async fn find_by_user_id(&self, user_id: Uuid) -> Result<Option<TokenBalanceEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let row = token_balances::table
            .filter(token_balances::user_id.eq(user_id))
            .select(TokenBalanceEntity::as_select())
            .first::<TokenBalanceEntity>(&mut conn)
            .optional()?;

        Ok(row)
    }
}
