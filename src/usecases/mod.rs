pub mod payment_orders;
pub mod reconciliation;
pub mod token_ledger;

use thiserror::Error;

use crate::gateways::GatewayError;

#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("unsupported payment provider: {0}")]
    UnsupportedProvider(String),

    #[error("payment gateway unavailable: {0}")]
    GatewayUnavailable(String),

    #[error("signature verification failed")]
    SignatureInvalid,

    #[error("unknown payment: {0}")]
    UnknownPayment(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl PaymentError {
    pub fn status_code(&self) -> axum::http::StatusCode {
        use axum::http::StatusCode;
        match self {
            PaymentError::InvalidAmount(_)
            | PaymentError::UnsupportedProvider(_)
            | PaymentError::SignatureInvalid => StatusCode::BAD_REQUEST,
            PaymentError::UnknownPayment(_) => StatusCode::NOT_FOUND,
            PaymentError::GatewayUnavailable(_) => StatusCode::BAD_GATEWAY,
            PaymentError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<GatewayError> for PaymentError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::Unavailable(message) => PaymentError::GatewayUnavailable(message),
            GatewayError::InvalidAmount(message) => PaymentError::InvalidAmount(message),
            GatewayError::Other(err) => PaymentError::Internal(err),
        }
    }
}
