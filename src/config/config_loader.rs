use anyhow::Result;

use super::config_model::{
    CashfreeConfig, Database, DotEnvyConfig, Payments, RazorpayConfig, Server,
};

pub fn load() -> Result<DotEnvyConfig> {
    dotenvy::dotenv().ok();

    let server = Server {
        port: std::env::var("SERVER_PORT")
            .expect("SERVER_PORT is invalid")
            .parse()?,
        body_limit: std::env::var("SERVER_BODY_LIMIT")
            .expect("SERVER_BODY_LIMIT is invalid")
            .parse()?,
        timeout: std::env::var("SERVER_TIMEOUT")
            .expect("SERVER_TIMEOUT is invalid")
            .parse()?,
    };

    let database = Database {
        url: std::env::var("DATABASE_URL").expect("DATABASE_URL is invalid"),
    };

    let payments = Payments {
        default_provider: std::env::var("PAYMENTS_DEFAULT_PROVIDER")
            .unwrap_or_else(|_| "razorpay".to_string()),
        min_amount_minor: std::env::var("PAYMENTS_MIN_AMOUNT_MINOR")
            .expect("PAYMENTS_MIN_AMOUNT_MINOR is invalid")
            .parse()?,
        max_amount_minor: std::env::var("PAYMENTS_MAX_AMOUNT_MINOR")
            .expect("PAYMENTS_MAX_AMOUNT_MINOR is invalid")
            .parse()?,
        tokens_per_hundred_minor: std::env::var("PAYMENTS_TOKENS_PER_HUNDRED_MINOR")
            .expect("PAYMENTS_TOKENS_PER_HUNDRED_MINOR is invalid")
            .parse()?,
        fee_bps: std::env::var("PAYMENTS_FEE_BPS")
            .unwrap_or_else(|_| "200".to_string())
            .parse()?,
        gateway_timeout_secs: std::env::var("PAYMENTS_GATEWAY_TIMEOUT_SECS")
            .unwrap_or_else(|_| "10".to_string())
            .parse()?,
        // Gateway credentials are optional at boot: an unconfigured gateway
        // reports itself unavailable when an order selects it.
        razorpay: RazorpayConfig {
            key_id: std::env::var("RAZORPAY_KEY_ID").unwrap_or_default(),
            key_secret: std::env::var("RAZORPAY_KEY_SECRET").unwrap_or_default(),
            webhook_secret: std::env::var("RAZORPAY_WEBHOOK_SECRET").unwrap_or_default(),
            api_base_url: std::env::var("RAZORPAY_API_BASE_URL")
                .unwrap_or_else(|_| "https://api.razorpay.com/v1".to_string()),
        },
        cashfree: CashfreeConfig {
            client_id: std::env::var("CASHFREE_CLIENT_ID").unwrap_or_default(),
            client_secret: std::env::var("CASHFREE_CLIENT_SECRET").unwrap_or_default(),
            webhook_secret: std::env::var("CASHFREE_WEBHOOK_SECRET").unwrap_or_default(),
            api_base_url: std::env::var("CASHFREE_API_BASE_URL")
                .unwrap_or_else(|_| "https://api.cashfree.com/pg".to_string()),
        },
    };

    Ok(DotEnvyConfig {
        server,
        database,
        payments,
    })
}
