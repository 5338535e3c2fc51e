use std::{net::SocketAddr, sync::Arc, time::Duration};

use anyhow::Result;
use axum::{
    Router,
    http::{
        Method,
        header::{AUTHORIZATION, CONTENT_TYPE},
    },
    routing::get,
};
use tokio::net::TcpListener;
use tower_http::{
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::info;

use crate::{
    axum_http::{default_routers, routers},
    config::config_model::DotEnvyConfig,
    gateways::{GatewayRegistry, cashfree_client::CashfreeClient, razorpay_client::RazorpayClient},
    infrastructure::postgres::postgres_connection::PgPoolSquad,
    usecases::payment_orders::OrderPolicy,
};

pub async fn start(config: Arc<DotEnvyConfig>, db_pool: Arc<PgPoolSquad>) -> Result<()> {
    let gateway_timeout = Duration::from_secs(config.payments.gateway_timeout_secs);

    let mut gateways = GatewayRegistry::new();
    gateways.register(Arc::new(RazorpayClient::new(
        config.payments.razorpay.clone(),
        gateway_timeout,
    )?));
    gateways.register(Arc::new(CashfreeClient::new(
        config.payments.cashfree.clone(),
        gateway_timeout,
    )?));
    let gateways = Arc::new(gateways);

    let policy = OrderPolicy::from_config(&config.payments)?;

    let app = Router::new()
        .fallback(default_routers::not_found)
        .nest(
            "/api/v1/payments",
            routers::payments::routes(
                Arc::clone(&db_pool),
                Arc::clone(&gateways),
                policy,
                config.payments.fee_bps,
            ),
        )
        .nest("/api/v1/wallet", routers::wallet::routes(Arc::clone(&db_pool)))
        .route("/api/v1/health-check", get(default_routers::health_check))
        .layer(TimeoutLayer::new(Duration::from_secs(config.server.timeout)))
        .layer(RequestBodyLimitLayer::new(
            (config.server.body_limit * 1024 * 1024).try_into()?,
        ))
        .layer(
            CorsLayer::new()
                .allow_methods([Method::GET, Method::POST])
                .allow_headers([AUTHORIZATION, CONTENT_TYPE])
                .allow_origin(Any),
        )
        .layer(TraceLayer::new_for_http());

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    let listener = TcpListener::bind(addr).await?;

    info!("Server is running on port {}", config.server.port);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install CTRL+C signal handler");
    };

    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received ctrl+C signal"),
        _ = terminate => info!("Received terminate signal"),
    }
}
