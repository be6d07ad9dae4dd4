//! handlers/mod.rs
//! Handlers HTTP. Los de `/api` son internos; `tracking` y `webhook` son públicos.

pub mod campaign_handler;
pub mod email_handler;
pub mod recipient_handler;
pub mod tracking_handler;
pub mod webhook_handler;

use actix_web::{http::StatusCode, HttpRequest, HttpResponse};
use serde_json::json;

use crate::models::email_model::Actor;
use crate::services::ServiceError;

/// Cabecera con la identidad de quien llama (la autenticación es externa).
pub const ACTOR_HEADER: &str = "X-Actor";

pub fn actor_from(req: &HttpRequest) -> Actor {
    req.headers()
        .get(ACTOR_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(|v| Actor(v.to_string()))
        .unwrap_or_else(Actor::system)
}

/// Respuesta de error para endpoints internos.
pub fn error_response(e: &anyhow::Error) -> HttpResponse {
    let status = match e.downcast_ref::<ServiceError>() {
        Some(ServiceError::NotFound(_)) => StatusCode::NOT_FOUND,
        Some(ServiceError::Invalid(_)) => StatusCode::BAD_REQUEST,
        None => {
            log::error!("Error interno: {:?}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };

    HttpResponse::build(status).json(json!({
        "success": false,
        "error": e.to_string()
    }))
}
