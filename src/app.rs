//! app.rs
use std::sync::Arc;

use actix_web::web;
use sqlx::{Pool, Sqlite};

use crate::config::app_config::AppConfig;
use crate::handlers::{
    campaign_handler, email_handler, recipient_handler, tracking_handler, webhook_handler,
};
use crate::services::{
    archive_service::ArchiveService, campaign_service::CampaignService,
    dispatch_service::DispatchService, email_service::MailTransport,
    recipient_service::RecipientService, send_log_service::SendLogService,
    suppression_service::SuppressionService, tracking_service::TrackingService,
    webhook_service::WebhookService,
};

/// Todos los servicios que se registran como `app_data`.
#[derive(Clone)]
pub struct AppServices {
    pub campaigns: CampaignService,
    pub recipients: RecipientService,
    pub suppressions: SuppressionService,
    pub send_log: SendLogService,
    pub dispatcher: DispatchService,
    pub tracking: TrackingService,
    pub webhooks: WebhookService,
    pub archive: ArchiveService,
}

impl AppServices {
    pub fn new(db_pool: Pool<Sqlite>, transport: Arc<dyn MailTransport>, config: &AppConfig) -> Self {
        let campaigns = CampaignService::new(db_pool.clone());
        let recipients = RecipientService::new(db_pool.clone());
        let suppressions = SuppressionService::new(db_pool.clone());
        let send_log = SendLogService::new(db_pool.clone());

        let dispatcher = DispatchService::new(
            transport,
            campaigns.clone(),
            recipients.clone(),
            suppressions.clone(),
            send_log.clone(),
            config.public_base_url.clone(),
        );
        let tracking = TrackingService::new(
            campaigns.clone(),
            recipients.clone(),
            suppressions.clone(),
            config.default_redirect_url.clone(),
            config.unsubscribe_token_max_age_secs,
        );
        let webhooks = WebhookService::new(
            db_pool.clone(),
            campaigns.clone(),
            recipients.clone(),
            suppressions.clone(),
        );
        let archive = ArchiveService::new(db_pool, campaigns.clone());

        Self {
            campaigns,
            recipients,
            suppressions,
            send_log,
            dispatcher,
            tracking,
            webhooks,
            archive,
        }
    }

    /// Registra cada servicio como `web::Data` en la app.
    pub fn register(&self, cfg: &mut web::ServiceConfig) {
        cfg.app_data(web::Data::new(self.campaigns.clone()))
            .app_data(web::Data::new(self.recipients.clone()))
            .app_data(web::Data::new(self.suppressions.clone()))
            .app_data(web::Data::new(self.send_log.clone()))
            .app_data(web::Data::new(self.dispatcher.clone()))
            .app_data(web::Data::new(self.tracking.clone()))
            .app_data(web::Data::new(self.webhooks.clone()))
            .app_data(web::Data::new(self.archive.clone()));
    }
}

pub fn init_app(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .service(
                web::scope("/campaigns")
                    .route("", web::post().to(campaign_handler::create_campaign_endpoint))
                    .route("", web::get().to(campaign_handler::list_campaigns_endpoint))
                    .route("/{id}", web::get().to(campaign_handler::get_campaign_endpoint))
                    .route(
                        "/{id}",
                        web::delete().to(campaign_handler::delete_campaign_endpoint),
                    )
                    .route(
                        "/{id}/recipients",
                        web::post().to(campaign_handler::add_recipients_endpoint),
                    )
                    .route(
                        "/{id}/recipients",
                        web::get().to(campaign_handler::list_recipients_endpoint),
                    )
                    .route(
                        "/{id}/recipients",
                        web::delete().to(campaign_handler::archive_campaign_recipients_endpoint),
                    )
                    .route(
                        "/{id}/send",
                        web::post().to(campaign_handler::send_campaign_endpoint),
                    )
                    .route(
                        "/{id}/recount",
                        web::post().to(campaign_handler::recount_campaign_endpoint),
                    ),
            )
            .service(
                web::scope("/recipients")
                    .route(
                        "",
                        web::delete().to(recipient_handler::delete_all_recipients_endpoint),
                    )
                    .route("/{id}", web::get().to(recipient_handler::get_recipient_endpoint))
                    .route(
                        "/{id}",
                        web::patch().to(recipient_handler::update_recipient_endpoint),
                    )
                    .route(
                        "/{id}",
                        web::delete().to(recipient_handler::delete_recipient_endpoint),
                    ),
            )
            .service(
                web::scope("/email")
                    .route("/send", web::post().to(email_handler::send_email_endpoint))
                    .route("/log", web::get().to(email_handler::send_log_endpoint)),
            ),
    )
    .route(
        "/track/open/{tracking_id}",
        web::get().to(tracking_handler::open_pixel_endpoint),
    )
    .route(
        "/track/click/{tracking_id}",
        web::get().to(tracking_handler::click_redirect_endpoint),
    )
    .route(
        "/unsubscribe/{token}",
        web::get().to(tracking_handler::unsubscribe_endpoint),
    )
    .route(
        "/webhooks/email",
        web::post().to(webhook_handler::email_webhook_endpoint),
    );
}
