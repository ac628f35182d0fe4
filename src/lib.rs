pub mod cli;
pub mod config;
pub mod db;
pub mod domain;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod phone;
pub mod services;
pub mod startup;
pub mod validation;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;

use crate::services::PaymentProcessor;

#[derive(Clone)]
pub struct AppState {
    pub db: sqlx::PgPool,
    pub processor: PaymentProcessor,
}

pub fn create_app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/payments/providers", get(handlers::payments::list_providers))
        .route(
            "/payments/transactions",
            get(handlers::payments::list_transactions),
        )
        .route("/payments/initiate", post(handlers::payments::initiate_payment))
        .route(
            "/payments/status/:reference_code",
            get(handlers::payments::payment_status),
        )
        .route(
            "/payments/cancel/:reference_code",
            post(handlers::payments::cancel_payment),
        )
        .route(
            "/payments/instructions/:reference_code",
            get(handlers::payments::payment_instructions),
        )
        .route(
            "/payments/validate-phone",
            post(handlers::payments::validate_phone),
        )
        .route("/payments/webhook/sms", post(handlers::webhook::sms_webhook))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
