//! models/webhook_model.rs
//! Formatos de webhook de los distintos proveedores y el evento normalizado.
//!
//! `WebhookPayload` es `untagged`: serde prueba cada forma en orden y se queda
//! con la primera que encaja. Los campos obligatorios de cada variante son los
//! que la distinguen de las demás.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum WebhookPayload {
    SnsEnvelope(SnsEnvelope),
    Ses(SesNotification),
    Mailgun(MailgunEnvelope),
    Postmark(PostmarkEvent),
    SendGridBatch(Vec<SendGridEvent>),
    SendGrid(SendGridEvent),
    Generic(GenericEvent),
}

/// Sobre de Amazon SNS; `Message` trae la notificación de SES como string JSON.
#[derive(Debug, Clone, Deserialize)]
pub struct SnsEnvelope {
    #[serde(rename = "Type")]
    pub kind: String,
    #[serde(rename = "Message")]
    pub message: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SesNotification {
    #[serde(rename = "notificationType", alias = "eventType")]
    pub notification_type: String,
    pub bounce: Option<SesBounce>,
    pub complaint: Option<SesComplaint>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SesBounce {
    #[serde(rename = "bounceType")]
    pub bounce_type: Option<String>,
    #[serde(rename = "bouncedRecipients", default)]
    pub bounced_recipients: Vec<SesAddress>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SesComplaint {
    #[serde(rename = "complainedRecipients", default)]
    pub complained_recipients: Vec<SesAddress>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SesAddress {
    #[serde(rename = "emailAddress")]
    pub email_address: String,
    #[serde(rename = "diagnosticCode")]
    pub diagnostic_code: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MailgunEnvelope {
    #[serde(rename = "event-data")]
    pub event_data: MailgunEventData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MailgunEventData {
    pub event: String,
    pub recipient: String,
    pub severity: Option<String>,
    pub reason: Option<String>,
    #[serde(rename = "delivery-status")]
    pub delivery_status: Option<MailgunDeliveryStatus>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MailgunDeliveryStatus {
    pub message: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PostmarkEvent {
    #[serde(rename = "RecordType")]
    pub record_type: String,
    #[serde(rename = "Email")]
    pub email: String,
    #[serde(rename = "Type")]
    pub bounce_type: Option<String>,
    #[serde(rename = "Description")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SendGridEvent {
    pub event: String,
    pub email: String,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GenericEvent {
    #[serde(rename = "type")]
    pub kind: String,
    pub email: String,
    pub reason: Option<String>,
}

/// Evento interno al que se reduce cualquier payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WebhookEvent {
    Bounce { email: String, reason: Option<String> },
    Complaint { email: String },
    /// Forma reconocida pero evento sin efecto (entregado, abierto, etc.).
    Ignored { provider: String, event: String },
    /// Ninguna forma conocida encaja.
    Unrecognized,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct WebhookSummary {
    pub bounces: usize,
    pub complaints: usize,
    pub ignored: usize,
    pub unrecognized: usize,
}
