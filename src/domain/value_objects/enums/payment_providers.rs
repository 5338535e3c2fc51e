use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// External processors the platform can create orders against. The provider is
/// chosen at order creation and recorded on the payment row so reconciliation
/// always dispatches to the matching gateway client.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum PaymentProvider {
    Razorpay,
    Cashfree,
}

impl PaymentProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentProvider::Razorpay => "razorpay",
            PaymentProvider::Cashfree => "cashfree",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "razorpay" => Some(PaymentProvider::Razorpay),
            "cashfree" => Some(PaymentProvider::Cashfree),
            _ => None,
        }
    }
}

impl Display for PaymentProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
