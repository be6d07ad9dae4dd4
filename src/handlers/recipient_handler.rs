//! handlers/recipient_handler.rs
//! Ediciones manuales y archivado de destinatarios.
use actix_web::{web, HttpRequest, HttpResponse};
use serde::Deserialize;
use serde_json::json;

use crate::handlers::{actor_from, error_response};
use crate::models::archive_model::ArchiveSelector;
use crate::models::recipient_model::UpdateRecipientRequest;
use crate::services::{archive_service::ArchiveService, recipient_service::RecipientService};

#[derive(Deserialize)]
pub struct DeleteQuery {
    reason: Option<String>,
}

/// GET /api/recipients/{id}
pub async fn get_recipient_endpoint(
    recipients: web::Data<RecipientService>,
    path: web::Path<i64>,
) -> HttpResponse {
    let recipient_id = path.into_inner();
    let recipient = match recipients.get_recipient(recipient_id).await {
        Ok(r) => r,
        Err(e) => return error_response(&e),
    };
    let attempts = recipients
        .list_send_attempts(recipient_id)
        .await
        .unwrap_or_default();
    let clicks = recipients
        .list_click_events(recipient_id)
        .await
        .unwrap_or_default();

    HttpResponse::Ok().json(json!({
        "recipient": recipient,
        "send_attempts": attempts,
        "clicks": clicks
    }))
}

/// PATCH /api/recipients/{id}
pub async fn update_recipient_endpoint(
    recipients: web::Data<RecipientService>,
    path: web::Path<i64>,
    body: web::Json<UpdateRecipientRequest>,
) -> HttpResponse {
    match recipients
        .update_recipient(path.into_inner(), body.into_inner())
        .await
    {
        Ok(r) => HttpResponse::Ok().json(r),
        Err(e) => error_response(&e),
    }
}

/// DELETE /api/recipients/{id}
pub async fn delete_recipient_endpoint(
    req: HttpRequest,
    archive: web::Data<ArchiveService>,
    path: web::Path<i64>,
    query: web::Query<DeleteQuery>,
) -> HttpResponse {
    let actor = actor_from(&req);
    let reason = query
        .reason
        .clone()
        .unwrap_or_else(|| "recipient deleted".to_string());

    match archive
        .archive_and_delete(ArchiveSelector::Recipient(path.into_inner()), &actor, &reason)
        .await
    {
        Ok(outcome) => HttpResponse::Ok().json(outcome),
        Err(e) => error_response(&e),
    }
}

/// DELETE /api/recipients
pub async fn delete_all_recipients_endpoint(
    req: HttpRequest,
    archive: web::Data<ArchiveService>,
    query: web::Query<DeleteQuery>,
) -> HttpResponse {
    let actor = actor_from(&req);
    let reason = query
        .reason
        .clone()
        .unwrap_or_else(|| "all recipients deleted".to_string());

    match archive
        .archive_and_delete(ArchiveSelector::All, &actor, &reason)
        .await
    {
        Ok(outcome) => HttpResponse::Ok().json(outcome),
        Err(e) => error_response(&e),
    }
}
