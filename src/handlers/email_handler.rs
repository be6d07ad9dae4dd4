use actix_web::{web, HttpRequest, HttpResponse};
use serde::Deserialize;
use serde_json::json;

use crate::handlers::{actor_from, error_response};
use crate::models::email_model::{DispatchTarget, SendEmailRequest};
use crate::services::{
    dispatch_service::DispatchService, recipient_service::RecipientService,
    send_log_service::SendLogService,
};

#[derive(Deserialize)]
pub struct SendLogQuery {
    sender: Option<String>,
    page: Option<u64>,
    page_size: Option<u64>,
}

/// POST /api/email/send
///
/// Envío suelto: crea filas sin campaña y deja constancia en el send log.
pub async fn send_email_endpoint(
    req: HttpRequest,
    recipients: web::Data<RecipientService>,
    dispatcher: web::Data<DispatchService>,
    body: web::Json<SendEmailRequest>,
) -> HttpResponse {
    let sender = actor_from(&req);
    let req_data = body.into_inner();

    if req_data.recipients.is_empty() {
        return HttpResponse::BadRequest().json(json!({
            "success": false,
            "error": "recipients is empty"
        }));
    }

    let rows = match recipients.add_recipients(None, &req_data.recipients).await {
        Ok(rows) => rows,
        Err(e) => return error_response(&e),
    };

    match dispatcher
        .dispatch(&DispatchTarget::AdHoc { sender }, &rows, &req_data.message)
        .await
    {
        Ok(result) => HttpResponse::Ok().json(json!({
            "success": result.failures.is_empty(),
            "result": result
        })),
        Err(e) => {
            log::error!("Email send error: {}", e);
            error_response(&e)
        }
    }
}

/// GET /api/email/log
pub async fn send_log_endpoint(
    send_log: web::Data<SendLogService>,
    query: web::Query<SendLogQuery>,
) -> HttpResponse {
    let page = query.page.unwrap_or(1);
    let page_size = query.page_size.unwrap_or(10);

    match send_log
        .list(query.sender.as_deref(), page, page_size)
        .await
    {
        Ok(list) => HttpResponse::Ok().json(list),
        Err(e) => error_response(&e),
    }
}
