//! handlers/campaign_handler.rs
use actix_web::{web, HttpRequest, HttpResponse};
use serde::Deserialize;
use serde_json::json;

use crate::handlers::{actor_from, error_response};
use crate::models::archive_model::ArchiveSelector;
use crate::models::campaign_model::{AddRecipientsRequest, CreateCampaignRequest};
use crate::models::email_model::{ComposedMessage, DispatchTarget};
use crate::services::{
    archive_service::ArchiveService, campaign_service::CampaignService,
    dispatch_service::DispatchService, recipient_service::RecipientService,
};

#[derive(Deserialize)]
pub struct ReasonQuery {
    reason: Option<String>,
}

impl ReasonQuery {
    fn reason_or(&self, default: &str) -> String {
        self.reason
            .clone()
            .filter(|r| !r.trim().is_empty())
            .unwrap_or_else(|| default.to_string())
    }
}

/// POST /api/campaigns
pub async fn create_campaign_endpoint(
    campaigns: web::Data<CampaignService>,
    body: web::Json<CreateCampaignRequest>,
) -> HttpResponse {
    match campaigns.create_campaign(body.into_inner()).await {
        Ok(campaign) => HttpResponse::Created().json(campaign),
        Err(e) => error_response(&e),
    }
}

/// GET /api/campaigns
pub async fn list_campaigns_endpoint(campaigns: web::Data<CampaignService>) -> HttpResponse {
    match campaigns.list_campaigns().await {
        Ok(list) => HttpResponse::Ok().json(list),
        Err(e) => error_response(&e),
    }
}

/// GET /api/campaigns/{id}
pub async fn get_campaign_endpoint(
    campaigns: web::Data<CampaignService>,
    path: web::Path<i64>,
) -> HttpResponse {
    match campaigns.get_campaign(path.into_inner()).await {
        Ok(campaign) => HttpResponse::Ok().json(campaign),
        Err(e) => error_response(&e),
    }
}

/// POST /api/campaigns/{id}/recipients
pub async fn add_recipients_endpoint(
    campaigns: web::Data<CampaignService>,
    recipients: web::Data<RecipientService>,
    path: web::Path<i64>,
    body: web::Json<AddRecipientsRequest>,
) -> HttpResponse {
    let campaign_id = path.into_inner();
    if let Err(e) = campaigns.get_campaign(campaign_id).await {
        return error_response(&e);
    }

    match recipients
        .add_recipients(Some(campaign_id), &body.emails)
        .await
    {
        Ok(rows) => HttpResponse::Created().json(rows),
        Err(e) => error_response(&e),
    }
}

/// GET /api/campaigns/{id}/recipients
pub async fn list_recipients_endpoint(
    recipients: web::Data<RecipientService>,
    path: web::Path<i64>,
) -> HttpResponse {
    match recipients.list_for_campaign(path.into_inner()).await {
        Ok(rows) => HttpResponse::Ok().json(rows),
        Err(e) => error_response(&e),
    }
}

/// POST /api/campaigns/{id}/send
///
/// Envía a los destinatarios pendientes o fallidos y bloquea hasta terminar.
pub async fn send_campaign_endpoint(
    campaigns: web::Data<CampaignService>,
    recipients: web::Data<RecipientService>,
    dispatcher: web::Data<DispatchService>,
    path: web::Path<i64>,
    body: web::Json<ComposedMessage>,
) -> HttpResponse {
    let campaign_id = path.into_inner();
    if let Err(e) = campaigns.get_campaign(campaign_id).await {
        return error_response(&e);
    }

    let batch = match recipients.list_unsent_for_campaign(campaign_id).await {
        Ok(batch) => batch,
        Err(e) => return error_response(&e),
    };

    match dispatcher
        .dispatch(&DispatchTarget::Campaign(campaign_id), &batch, &body)
        .await
    {
        Ok(result) => HttpResponse::Ok().json(json!({
            "success": true,
            "campaign_id": campaign_id,
            "result": result
        })),
        Err(e) => error_response(&e),
    }
}

/// POST /api/campaigns/{id}/recount
pub async fn recount_campaign_endpoint(
    campaigns: web::Data<CampaignService>,
    path: web::Path<i64>,
) -> HttpResponse {
    let campaign_id = path.into_inner();
    if let Err(e) = campaigns.recompute_counts(campaign_id).await {
        return error_response(&e);
    }
    match campaigns.get_campaign(campaign_id).await {
        Ok(campaign) => HttpResponse::Ok().json(campaign),
        Err(e) => error_response(&e),
    }
}

/// DELETE /api/campaigns/{id}/recipients
pub async fn archive_campaign_recipients_endpoint(
    req: HttpRequest,
    archive: web::Data<ArchiveService>,
    path: web::Path<i64>,
    query: web::Query<ReasonQuery>,
) -> HttpResponse {
    let actor = actor_from(&req);
    let reason = query.reason_or("campaign recipients deleted");

    match archive
        .archive_and_delete(ArchiveSelector::Campaign(path.into_inner()), &actor, &reason)
        .await
    {
        Ok(outcome) => HttpResponse::Ok().json(outcome),
        Err(e) => error_response(&e),
    }
}

/// DELETE /api/campaigns/{id}
pub async fn delete_campaign_endpoint(
    req: HttpRequest,
    archive: web::Data<ArchiveService>,
    path: web::Path<i64>,
    query: web::Query<ReasonQuery>,
) -> HttpResponse {
    let actor = actor_from(&req);
    let reason = query.reason_or("campaign deleted");

    match archive
        .delete_campaign(path.into_inner(), &actor, &reason)
        .await
    {
        Ok(outcome) => HttpResponse::Ok().json(outcome),
        Err(e) => error_response(&e),
    }
}
