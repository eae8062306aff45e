use actix_web::{web, HttpResponse, Responder};
use prometheus::{Encoder, TextEncoder};
use serde_json::json;

use super::AppState;
use crate::service::ServiceError;

pub async fn get_order(state: web::Data<AppState>, path: web::Path<String>) -> HttpResponse {
    let order_uid = path.into_inner();
    if order_uid.trim().is_empty() {
        return HttpResponse::BadRequest().json(json!({ "error": "order_uid is required" }));
    }

    match state.service.get_order(&order_uid).await {
        Ok(order) => HttpResponse::Ok().json(order.as_ref()),
        Err(ServiceError::NotFound(_)) => {
            HttpResponse::NotFound().json(json!({ "error": "order not found" }))
        }
        Err(ServiceError::InvalidInput(reason)) => {
            HttpResponse::BadRequest().json(json!({ "error": reason }))
        }
        Err(e) => {
            tracing::error!(error = %e, order_uid = %order_uid, "Failed to get order");
            HttpResponse::InternalServerError().json(json!({ "error": "internal server error" }))
        }
    }
}

pub async fn metrics(state: web::Data<AppState>) -> HttpResponse {
    let encoder = TextEncoder::new();
    let metric_families = state.metrics.registry().gather();

    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!(error = %e, "Failed to encode metrics");
        return HttpResponse::InternalServerError().finish();
    }

    HttpResponse::Ok()
        .content_type("text/plain; version=0.0.4")
        .body(buffer)
}

pub async fn health() -> impl Responder {
    HttpResponse::Ok().json(json!({
        "status": "healthy",
        "service": "order-ingest"
    }))
}
