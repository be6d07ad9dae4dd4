use actix_web::{web, HttpResponse};
use serde_json::json;

use crate::services::webhook_service::WebhookService;

/// POST /webhooks/email
///
/// El cuerpo se lee en crudo: un JSON inválido no debe convertirse en 400,
/// porque el proveedor reintentaría indefinidamente.
pub async fn email_webhook_endpoint(
    webhooks: web::Data<WebhookService>,
    body: web::Bytes,
) -> HttpResponse {
    match webhooks.handle_payload(&body).await {
        Ok(summary) => {
            log::debug!("(webhook) {:?}", summary);
            HttpResponse::Ok().json(json!({ "status": "ok" }))
        }
        Err(e) => {
            log::error!("(webhook) Error aplicando evento: {:?}", e);
            HttpResponse::InternalServerError().json(json!({ "status": "error" }))
        }
    }
}
