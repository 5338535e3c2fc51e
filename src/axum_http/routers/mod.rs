pub mod payments;
pub mod wallet;
