pub mod axum_http;
pub mod config;
pub mod domain;
pub mod gateways;
pub mod infrastructure;
pub mod observability;
pub mod usecases;
