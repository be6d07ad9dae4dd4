//! services/webhook_service.rs
//! Rebotes y quejas de los proveedores, reducidos a `WebhookEvent`.

use anyhow::{Context, Result};
use chrono::Utc;
use sqlx::{Pool, Sqlite};

use crate::models::webhook_model::{
    MailgunEventData, PostmarkEvent, SendGridEvent, SesNotification, WebhookEvent,
    WebhookPayload, WebhookSummary,
};
use crate::services::{
    campaign_service::CampaignService, recipient_service::RecipientService,
    suppression_service::{SuppressionService, GLOBAL_SCOPE},
};

/// Un sobre SNS puede traer otro sobre dentro; no se sigue más allá de esto.
const MAX_ENVELOPE_DEPTH: usize = 2;

/// Parsea el cuerpo crudo del webhook. Nunca falla: lo que no encaja en
/// ninguna forma conocida es `WebhookEvent::Unrecognized`.
pub fn normalize(raw: &[u8]) -> Vec<WebhookEvent> {
    match serde_json::from_slice::<WebhookPayload>(raw) {
        Ok(payload) => normalize_payload(payload, 0),
        Err(_) => vec![WebhookEvent::Unrecognized],
    }
}

fn normalize_payload(payload: WebhookPayload, depth: usize) -> Vec<WebhookEvent> {
    let events = match payload {
        WebhookPayload::SnsEnvelope(envelope) => {
            if depth >= MAX_ENVELOPE_DEPTH || envelope.kind != "Notification" {
                return vec![ignored("sns", &envelope.kind)];
            }
            match serde_json::from_str::<WebhookPayload>(&envelope.message) {
                Ok(inner) => normalize_payload(inner, depth + 1),
                Err(_) => vec![WebhookEvent::Unrecognized],
            }
        }
        WebhookPayload::Ses(notification) => from_ses(notification),
        WebhookPayload::Mailgun(envelope) => vec![from_mailgun(envelope.event_data)],
        WebhookPayload::Postmark(event) => vec![from_postmark(event)],
        WebhookPayload::SendGridBatch(batch) => batch.into_iter().map(from_sendgrid).collect(),
        WebhookPayload::SendGrid(event) => vec![from_sendgrid(event)],
        WebhookPayload::Generic(event) => vec![match event.kind.to_ascii_lowercase().as_str() {
            "bounce" | "bounced" => bounce(event.email, event.reason),
            "complaint" | "complained" | "spam" => complaint(event.email),
            other => ignored("generic", other),
        }],
    };

    if events.is_empty() {
        return vec![WebhookEvent::Unrecognized];
    }
    events
}

fn from_ses(notification: SesNotification) -> Vec<WebhookEvent> {
    match notification.notification_type.as_str() {
        "Bounce" => {
            let Some(bounce_info) = notification.bounce else {
                return vec![WebhookEvent::Unrecognized];
            };
            // Los rebotes transitorios no marcan al destinatario.
            if bounce_info.bounce_type.as_deref() == Some("Transient") {
                return vec![ignored("ses", "Bounce/Transient")];
            }
            bounce_info
                .bounced_recipients
                .into_iter()
                .map(|r| bounce(r.email_address, r.diagnostic_code))
                .collect()
        }
        "Complaint" => notification
            .complaint
            .map(|c| {
                c.complained_recipients
                    .into_iter()
                    .map(|r| complaint(r.email_address))
                    .collect()
            })
            .unwrap_or_else(|| vec![WebhookEvent::Unrecognized]),
        other => vec![ignored("ses", other)],
    }
}

fn from_mailgun(data: MailgunEventData) -> WebhookEvent {
    match data.event.as_str() {
        "failed" if data.severity.as_deref() != Some("temporary") => {
            let reason = data
                .delivery_status
                .and_then(|s| s.description.filter(|d| !d.is_empty()).or(s.message))
                .or(data.reason);
            bounce(data.recipient, reason)
        }
        "complained" => complaint(data.recipient),
        other => ignored("mailgun", other),
    }
}

fn from_postmark(event: PostmarkEvent) -> WebhookEvent {
    match event.record_type.as_str() {
        "Bounce" => {
            let reason = match (event.bounce_type, event.description) {
                (Some(kind), Some(desc)) => Some(format!("{kind}: {desc}")),
                (kind, desc) => desc.or(kind),
            };
            bounce(event.email, reason)
        }
        "SpamComplaint" => complaint(event.email),
        other => ignored("postmark", other),
    }
}

fn from_sendgrid(event: SendGridEvent) -> WebhookEvent {
    match event.event.as_str() {
        "bounce" => bounce(event.email, event.reason),
        "spamreport" => complaint(event.email),
        other => ignored("sendgrid", other),
    }
}

fn bounce(email: String, reason: Option<String>) -> WebhookEvent {
    let email = email.trim().to_string();
    if email.is_empty() {
        return WebhookEvent::Unrecognized;
    }
    WebhookEvent::Bounce { email, reason }
}

fn complaint(email: String) -> WebhookEvent {
    let email = email.trim().to_string();
    if email.is_empty() {
        return WebhookEvent::Unrecognized;
    }
    WebhookEvent::Complaint { email }
}

fn ignored(provider: &str, event: &str) -> WebhookEvent {
    WebhookEvent::Ignored {
        provider: provider.to_string(),
        event: event.to_string(),
    }
}

#[derive(Clone)]
pub struct WebhookService {
    db_pool: Pool<Sqlite>,
    campaigns: CampaignService,
    recipients: RecipientService,
    suppressions: SuppressionService,
}

impl WebhookService {
    pub fn new(
        db_pool: Pool<Sqlite>,
        campaigns: CampaignService,
        recipients: RecipientService,
        suppressions: SuppressionService,
    ) -> Self {
        Self {
            db_pool,
            campaigns,
            recipients,
            suppressions,
        }
    }

    /// Normaliza y aplica cada evento del payload.
    pub async fn handle_payload(&self, raw: &[u8]) -> Result<WebhookSummary> {
        let mut summary = WebhookSummary::default();

        for event in normalize(raw) {
            match event {
                WebhookEvent::Bounce { email, reason } => {
                    self.apply_bounce(&email, reason.as_deref()).await?;
                    summary.bounces += 1;
                }
                WebhookEvent::Complaint { email } => {
                    self.apply_complaint(&email).await?;
                    summary.complaints += 1;
                }
                WebhookEvent::Ignored { provider, event } => {
                    log::debug!("(webhook) Evento ignorado {}:{}", provider, event);
                    summary.ignored += 1;
                }
                WebhookEvent::Unrecognized => {
                    log::warn!(
                        "(webhook) Payload no reconocido ({} bytes); se descarta",
                        raw.len()
                    );
                    summary.unrecognized += 1;
                }
            }
        }

        Ok(summary)
    }

    /// Marca el rebote, lo anota en el ledger y recalcula `bounced_count` de
    /// todas las campañas con ese email.
    pub async fn apply_bounce(&self, email: &str, reason: Option<&str>) -> Result<()> {
        match self.recipients.mark_bounced(email, reason).await? {
            Some(recipient_id) => {
                log::info!("(webhook) Rebote registrado en destinatario {}", recipient_id)
            }
            None => log::info!("(webhook) Rebote sin fila pendiente; replay o email desconocido"),
        }

        if let Err(e) = self.append_bounce_ledger(email, reason).await {
            log::warn!("(webhook) No se pudo escribir en el ledger de rebotes: {:?}", e);
        }

        match self.campaigns.campaigns_for_email(email).await {
            Ok(campaign_ids) => {
                for campaign_id in campaign_ids {
                    self.campaigns.recompute_counts_best_effort(campaign_id).await;
                }
            }
            Err(e) => log::warn!("(webhook) No se pudieron recalcular contadores: {:?}", e),
        }
        Ok(())
    }

    /// Queja: todas las filas del email pasan a `complained` y el email queda
    /// suprimido para cualquier campaña.
    pub async fn apply_complaint(&self, email: &str) -> Result<()> {
        let updated = self.recipients.mark_complained(email).await?;
        self.suppressions
            .upsert(email, GLOBAL_SCOPE, "complaint")
            .await?;
        log::info!("(webhook) Queja registrada ({} filas)", updated);
        Ok(())
    }

    async fn append_bounce_ledger(&self, email: &str, reason: Option<&str>) -> Result<()> {
        sqlx::query("INSERT INTO bounces (email, reason, bounced_at) VALUES (?1, ?2, ?3)")
            .bind(email)
            .bind(reason)
            .bind(Utc::now().to_rfc3339())
            .execute(&self.db_pool)
            .await
            .context("Fallo al insertar en bounces")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn one(raw: &str) -> WebhookEvent {
        let mut events = normalize(raw.as_bytes());
        assert_eq!(events.len(), 1, "{events:?}");
        events.remove(0)
    }

    #[test]
    fn generic_shape() {
        assert_eq!(
            one(r#"{"type":"bounce","email":"a@x.com","reason":"mailbox full"}"#),
            WebhookEvent::Bounce {
                email: "a@x.com".to_string(),
                reason: Some("mailbox full".to_string())
            }
        );
        assert_eq!(
            one(r#"{"type":"complaint","email":"a@x.com"}"#),
            WebhookEvent::Complaint {
                email: "a@x.com".to_string()
            }
        );
    }

    #[test]
    fn sendgrid_batch() {
        let events = normalize(
            br#"[
                {"event":"bounce","email":"a@x.com","reason":"550 no such user"},
                {"event":"delivered","email":"b@x.com"},
                {"event":"spamreport","email":"c@x.com"}
            ]"#,
        );
        assert_eq!(
            events,
            vec![
                WebhookEvent::Bounce {
                    email: "a@x.com".to_string(),
                    reason: Some("550 no such user".to_string())
                },
                WebhookEvent::Ignored {
                    provider: "sendgrid".to_string(),
                    event: "delivered".to_string()
                },
                WebhookEvent::Complaint {
                    email: "c@x.com".to_string()
                },
            ]
        );
    }

    #[test]
    fn mailgun_permanent_and_temporary() {
        let permanent = r#"{"signature":{},"event-data":{"event":"failed","recipient":"a@x.com",
            "severity":"permanent","delivery-status":{"description":"","message":"550 rejected"}}}"#;
        assert_eq!(
            one(permanent),
            WebhookEvent::Bounce {
                email: "a@x.com".to_string(),
                reason: Some("550 rejected".to_string())
            }
        );

        let temporary = r#"{"event-data":{"event":"failed","recipient":"a@x.com","severity":"temporary"}}"#;
        assert!(matches!(one(temporary), WebhookEvent::Ignored { .. }));
    }

    #[test]
    fn postmark_bounce() {
        assert_eq!(
            one(r#"{"RecordType":"Bounce","Type":"HardBounce","Email":"a@x.com","Description":"Unknown user"}"#),
            WebhookEvent::Bounce {
                email: "a@x.com".to_string(),
                reason: Some("HardBounce: Unknown user".to_string())
            }
        );
    }

    #[test]
    fn ses_inside_sns_envelope() {
        let ses = r#"{"notificationType":"Bounce","bounce":{"bounceType":"Permanent",
            "bouncedRecipients":[{"emailAddress":"a@x.com","diagnosticCode":"smtp; 550"},
                                 {"emailAddress":"b@x.com"}]}}"#;
        let envelope = serde_json::json!({"Type": "Notification", "Message": ses}).to_string();
        let events = normalize(envelope.as_bytes());
        assert_eq!(
            events,
            vec![
                WebhookEvent::Bounce {
                    email: "a@x.com".to_string(),
                    reason: Some("smtp; 550".to_string())
                },
                WebhookEvent::Bounce {
                    email: "b@x.com".to_string(),
                    reason: None
                },
            ]
        );
    }

    #[test]
    fn unknown_shapes_are_unrecognized() {
        assert_eq!(one(r#"{"hello":"world"}"#), WebhookEvent::Unrecognized);
        assert_eq!(one("not json at all"), WebhookEvent::Unrecognized);
        assert_eq!(one("[]"), WebhookEvent::Unrecognized);
        assert_eq!(one(r#"{"type":"bounce","email":"  "}"#), WebhookEvent::Unrecognized);
    }
}
