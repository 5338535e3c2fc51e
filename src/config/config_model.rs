#[derive(Debug, Clone)]
pub struct DotEnvyConfig {
    pub server: Server,
    pub database: Database,
    pub payments: Payments,
}

#[derive(Debug, Clone)]
pub struct Server {
    pub port: u16,
    pub body_limit: u64,
    pub timeout: u64,
}

#[derive(Debug, Clone)]
pub struct Database {
    pub url: String,
}

#[derive(Debug, Clone)]
pub struct Payments {
    pub default_provider: String,
    pub min_amount_minor: i64,
    pub max_amount_minor: i64,
    /// Tokens credited per 100 minor units of a successful payment.
    pub tokens_per_hundred_minor: i64,
    /// Processing fee in basis points of the gross amount.
    pub fee_bps: i64,
    pub gateway_timeout_secs: u64,
    pub razorpay: RazorpayConfig,
    pub cashfree: CashfreeConfig,
}

#[derive(Debug, Clone)]
pub struct RazorpayConfig {
    pub key_id: String,
    pub key_secret: String,
    pub webhook_secret: String,
    pub api_base_url: String,
}

#[derive(Debug, Clone)]
pub struct CashfreeConfig {
    pub client_id: String,
    pub client_secret: String,
    pub webhook_secret: String,
    pub api_base_url: String,
}
