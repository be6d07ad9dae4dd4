//! services/dispatch_service.rs
//! Envío de un lote: un destinatario tras otro, en orden, sin abortar nunca.
//!
//! Un fallo del transporte (o de la DB al registrar ese destinatario) queda en
//! `failures` y el bucle sigue. Al terminar se recalculan los contadores de la
//! campaña desde `recipients` y se fija el estado final.

use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;

use crate::models::campaign_model::CampaignStatus;
use crate::models::email_model::{
    ComposedMessage, DispatchFailure, DispatchResult, DispatchTarget, OutboundEmail,
};
use crate::models::recipient_model::RecipientRecord;
use crate::services::{
    campaign_service::CampaignService, email_service::MailTransport,
    recipient_service::RecipientService, send_log_service::SendLogService,
    suppression_service::SuppressionService, token_service,
};

#[derive(Clone)]
pub struct DispatchService {
    transport: Arc<dyn MailTransport>,
    campaigns: CampaignService,
    recipients: RecipientService,
    suppressions: SuppressionService,
    send_log: SendLogService,
    public_base_url: String,
}

impl DispatchService {
    pub fn new(
        transport: Arc<dyn MailTransport>,
        campaigns: CampaignService,
        recipients: RecipientService,
        suppressions: SuppressionService,
        send_log: SendLogService,
        public_base_url: String,
    ) -> Self {
        Self {
            transport,
            campaigns,
            recipients,
            suppressions,
            send_log,
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Envía `message` a cada destinatario de `recipients`.
    ///
    /// Solo devuelve `Err` si falla algo previo al bucle (marcar la campaña como
    /// `sending`). Lo que pase dentro del bucle se refleja en el resultado.
    pub async fn dispatch(
        &self,
        target: &DispatchTarget,
        recipients: &[RecipientRecord],
        message: &ComposedMessage,
    ) -> Result<DispatchResult> {
        let mut result = DispatchResult::default();
        if recipients.is_empty() {
            log::info!("(dispatch) Lote vacío para {:?}; nada que enviar", target);
            return Ok(result);
        }

        if let DispatchTarget::Campaign(campaign_id) = target {
            self.campaigns
                .set_status(*campaign_id, CampaignStatus::Sending)
                .await?;
        }

        log::info!(
            "(dispatch) Iniciando lote de {} destinatarios para {:?}",
            recipients.len(),
            target
        );

        for recipient in recipients {
            match self.suppressions.is_suppressed(&recipient.email, recipient.campaign_id).await {
                Ok(true) => {
                    log::info!(
                        "(dispatch) Destinatario {} suprimido; se omite",
                        recipient.id
                    );
                    result.skipped.push(recipient.id);
                    continue;
                }
                Ok(false) => {}
                Err(e) => {
                    // Sin poder comprobarlo, no se envía.
                    log::error!("(dispatch) Error consultando supresiones: {:?}", e);
                    self.record_failure(target, recipient, message, format!("{e:#}"), &mut result)
                        .await;
                    continue;
                }
            }

            let outbound = match self.render_for(recipient, message).await {
                Ok(outbound) => outbound,
                Err(e) => {
                    log::error!(
                        "(dispatch) No se pudo preparar el destinatario {}: {:?}",
                        recipient.id,
                        e
                    );
                    self.record_failure(target, recipient, message, format!("{e:#}"), &mut result)
                        .await;
                    continue;
                }
            };

            match self.transport.send(&outbound).await {
                Ok(()) => self.record_success(target, recipient, message, &mut result).await,
                Err(e) => {
                    log::warn!(
                        "(dispatch) Falló el envío a {} (id={}): {}",
                        recipient.email,
                        recipient.id,
                        e
                    );
                    self.record_failure(target, recipient, message, e.to_string(), &mut result)
                        .await;
                }
            }
        }

        if let DispatchTarget::Campaign(campaign_id) = target {
            self.finish_campaign(*campaign_id, &result).await;
        }

        log::info!(
            "(dispatch) Lote terminado: {} enviados, {} fallidos, {} omitidos",
            result.successes.len(),
            result.failures.len(),
            result.skipped.len()
        );
        Ok(result)
    }

    async fn record_success(
        &self,
        target: &DispatchTarget,
        recipient: &RecipientRecord,
        message: &ComposedMessage,
        result: &mut DispatchResult,
    ) {
        if let Err(e) = self.recipients.mark_sent(recipient.id).await {
            // El correo salió; el fallo es solo de registro.
            log::error!(
                "(dispatch) Enviado pero no se pudo registrar el destinatario {}: {:?}",
                recipient.id,
                e
            );
        }
        self.log_ad_hoc(target, recipient, message, None).await;
        result.successes.push(recipient.id);
    }

    async fn record_failure(
        &self,
        target: &DispatchTarget,
        recipient: &RecipientRecord,
        message: &ComposedMessage,
        error: String,
        result: &mut DispatchResult,
    ) {
        if let Err(e) = self.recipients.mark_failed(recipient.id, &error).await {
            log::error!(
                "(dispatch) No se pudo registrar el fallo del destinatario {}: {:?}",
                recipient.id,
                e
            );
        }
        self.log_ad_hoc(target, recipient, message, Some(&error)).await;
        result.failures.push(DispatchFailure {
            recipient_id: recipient.id,
            email: recipient.email.clone(),
            error,
        });
    }

    async fn log_ad_hoc(
        &self,
        target: &DispatchTarget,
        recipient: &RecipientRecord,
        message: &ComposedMessage,
        error: Option<&str>,
    ) {
        if let DispatchTarget::AdHoc { sender } = target {
            if let Err(e) = self
                .send_log
                .append(sender, &recipient.email, &message.subject, error)
                .await
            {
                log::warn!("(dispatch) No se pudo escribir en send_log: {:?}", e);
            }
        }
    }

    /// Recalcula contadores y fija el estado final. Los errores aquí no
    /// cambian el resultado del lote.
    async fn finish_campaign(&self, campaign_id: i64, result: &DispatchResult) {
        self.campaigns.recompute_counts_best_effort(campaign_id).await;

        let status = CampaignStatus::after_batch(result.successes.len(), result.failures.len())
            // Todos suprimidos: nada se intentó, la campaña queda como enviada.
            .unwrap_or(CampaignStatus::Completed);

        if let Err(e) = self.campaigns.set_status(campaign_id, status).await {
            log::error!(
                "(dispatch) No se pudo fijar el estado {} de la campaña {}: {:?}",
                status,
                campaign_id,
                e
            );
        }
    }

    async fn render_for(
        &self,
        recipient: &RecipientRecord,
        message: &ComposedMessage,
    ) -> Result<OutboundEmail> {
        let tracking_id = self
            .recipients
            .ensure_tracking_id(recipient.id, &token_service::issue_tracking_id())
            .await?;
        let unsubscribe_token = token_service::encode_unsubscribe_token(
            &recipient.email,
            recipient.campaign_id.unwrap_or(0),
            Utc::now().timestamp(),
        );

        let links = TrackingLinks {
            base_url: &self.public_base_url,
            tracking_id: &tracking_id,
            unsubscribe_token: &unsubscribe_token,
        };

        Ok(OutboundEmail {
            to: recipient.email.clone(),
            cc: message.cc.clone(),
            bcc: message.bcc.clone(),
            subject: message.subject.clone(),
            body: render_body(&message.body, &recipient.email, &links),
            from_name: message.from_name.clone(),
            from_email: message.from_email.clone(),
        })
    }
}

pub struct TrackingLinks<'a> {
    pub base_url: &'a str,
    pub tracking_id: &'a str,
    pub unsubscribe_token: &'a str,
}

impl TrackingLinks<'_> {
    fn open_url(&self) -> String {
        format!("{}/track/open/{}", self.base_url, self.tracking_id)
    }

    fn click_url(&self, target: &str) -> String {
        format!(
            "{}/track/click/{}?url={}",
            self.base_url,
            self.tracking_id,
            urlencoding::encode(target)
        )
    }

    fn unsubscribe_url(&self) -> String {
        format!("{}/unsubscribe/{}", self.base_url, self.unsubscribe_token)
    }
}

/// Personaliza el HTML: placeholders, enlaces con seguimiento y píxel de apertura.
pub fn render_body(template: &str, email: &str, links: &TrackingLinks<'_>) -> String {
    let unsubscribe_url = links.unsubscribe_url();
    let with_placeholders = template
        .replace("{{email}}", email)
        .replace("{{unsubscribe_url}}", &unsubscribe_url);

    let mut body = rewrite_links(&with_placeholders, links);
    // El enlace de baja no debe pasar por el redirect de clics.
    body = body.replace(&links.click_url(&unsubscribe_url), &unsubscribe_url);

    body.push_str(&format!(
        r#"<img src="{}" width="1" height="1" alt="" style="display:none" />"#,
        links.open_url()
    ));
    body
}

/// Reemplaza cada `href="http(s)://..."` por el enlace de seguimiento.
fn rewrite_links(html: &str, links: &TrackingLinks<'_>) -> String {
    const HREF: &str = "href=\"";
    let mut out = String::with_capacity(html.len());
    let mut rest = html;

    while let Some(start) = rest.find(HREF) {
        let value_start = start + HREF.len();
        out.push_str(&rest[..value_start]);
        rest = &rest[value_start..];

        let Some(end) = rest.find('"') else {
            break;
        };
        let target = &rest[..end];
        let lower = target.to_ascii_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            out.push_str(&links.click_url(target));
        } else {
            out.push_str(target);
        }
        rest = &rest[end..];
    }
    out.push_str(rest);
    out
}
