// ============================================================================
// HTTP Query Surface
// ============================================================================
//
// GET /order/{order_uid}  -> 200 JSON | 404 | 500
// GET /metrics            -> Prometheus text format
// GET /health             -> liveness
//
// ============================================================================

mod handlers;
mod server;

pub use server::start_http_server;

use std::sync::Arc;

use actix_web::{middleware::DefaultHeaders, web};

use crate::metrics::Metrics;
use crate::service::OrderService;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<OrderService>,
    pub metrics: Arc<Metrics>,
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/order/{order_uid}", web::get().to(handlers::get_order))
        .route("/metrics", web::get().to(handlers::metrics))
        .route("/health", web::get().to(handlers::health));
}

/// Lets the browser frontend call the API from another origin.
pub fn cors_headers() -> DefaultHeaders {
    DefaultHeaders::new()
        .add(("Access-Control-Allow-Origin", "*"))
        .add(("Access-Control-Allow-Methods", "GET, OPTIONS"))
        .add(("Access-Control-Allow-Headers", "Content-Type"))
}
