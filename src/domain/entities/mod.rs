pub mod payments;
pub mod token_balances;
