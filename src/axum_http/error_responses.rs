use axum::{
    Json,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::usecases::{PaymentError, token_ledger::LedgerError};

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: u16,
    pub message: String,
}

impl IntoResponse for PaymentError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        // Don't leak internal error detail to the client
        let message = match &self {
            PaymentError::Internal(_) => "Internal server error".to_string(),
            PaymentError::GatewayUnavailable(_) => {
                "Payment gateway is temporarily unavailable".to_string()
            }
            _ => self.to_string(),
        };

        let body = Json(ErrorResponse {
            code: status.as_u16(),
            message,
        });

        (status, body).into_response()
    }
}

impl IntoResponse for LedgerError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = match &self {
            LedgerError::Internal(_) => "Internal server error".to_string(),
            _ => self.to_string(),
        };

        let body = Json(ErrorResponse {
            code: status.as_u16(),
            message,
        });

        (status, body).into_response()
    }
}
