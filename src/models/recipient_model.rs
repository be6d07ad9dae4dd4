//! models/recipient_model.rs
//! Destinatarios de una campaña (o de un envío suelto) y su historial.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::models::UnknownStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecipientStatus {
    Pending,
    Sent,
    Failed,
    Bounced,
    Complained,
    Unsubscribed,
}

impl RecipientStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecipientStatus::Pending => "pending",
            RecipientStatus::Sent => "sent",
            RecipientStatus::Failed => "failed",
            RecipientStatus::Bounced => "bounced",
            RecipientStatus::Complained => "complained",
            RecipientStatus::Unsubscribed => "unsubscribed",
        }
    }
}

impl fmt::Display for RecipientStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecipientStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(RecipientStatus::Pending),
            "sent" => Ok(RecipientStatus::Sent),
            "failed" => Ok(RecipientStatus::Failed),
            "bounced" => Ok(RecipientStatus::Bounced),
            "complained" => Ok(RecipientStatus::Complained),
            "unsubscribed" => Ok(RecipientStatus::Unsubscribed),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

impl TryFrom<String> for RecipientStatus {
    type Error = UnknownStatus;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct RecipientRecord {
    pub id: i64,
    /// `None` para envíos sin campaña.
    pub campaign_id: Option<i64>,
    pub email: String,
    #[sqlx(try_from = "String")]
    pub status: RecipientStatus,
    pub tracking_id: Option<String>,
    pub sent_at: Option<String>,
    pub opened_at: Option<String>,
    pub clicked_at: Option<String>,
    pub bounced_at: Option<String>,
    pub unsubscribed_at: Option<String>,
    pub open_count: i64,
    pub click_count: i64,
    pub error_message: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct SendAttemptRecord {
    pub id: i64,
    pub recipient_id: i64,
    pub attempted_at: String,
    pub outcome: String, // "sent" o "failed"
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ClickEventRecord {
    pub id: i64,
    pub recipient_id: i64,
    pub url: Option<String>,
    pub clicked_at: String,
}

/// Edición manual de un destinatario (corrección de email, reintento).
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateRecipientRequest {
    pub email: Option<String>,
    /// Solo se acepta `true`: vuelve a `pending` y limpia el error.
    pub reset: Option<bool>,
}
