//! models/campaign_model.rs
//! Campañas: estado del ciclo de vida y contadores agregados.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::models::UnknownStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CampaignStatus {
    Draft,
    Scheduled,
    Sending,
    Active,
    Paused,
    Completed,
    CompletedWithErrors,
    Failed,
}

impl CampaignStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CampaignStatus::Draft => "draft",
            CampaignStatus::Scheduled => "scheduled",
            CampaignStatus::Sending => "sending",
            CampaignStatus::Active => "active",
            CampaignStatus::Paused => "paused",
            CampaignStatus::Completed => "completed",
            CampaignStatus::CompletedWithErrors => "completed_with_errors",
            CampaignStatus::Failed => "failed",
        }
    }

    /// Estado final de un lote según cuántos envíos salieron bien y mal.
    /// `None` si no se intentó ningún envío (el estado no cambia).
    pub fn after_batch(successes: usize, failures: usize) -> Option<Self> {
        match (successes, failures) {
            (0, 0) => None,
            (_, 0) => Some(CampaignStatus::Completed),
            (0, _) => Some(CampaignStatus::Failed),
            _ => Some(CampaignStatus::CompletedWithErrors),
        }
    }
}

impl fmt::Display for CampaignStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CampaignStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(CampaignStatus::Draft),
            "scheduled" => Ok(CampaignStatus::Scheduled),
            "sending" => Ok(CampaignStatus::Sending),
            "active" => Ok(CampaignStatus::Active),
            "paused" => Ok(CampaignStatus::Paused),
            "completed" => Ok(CampaignStatus::Completed),
            "completed_with_errors" => Ok(CampaignStatus::CompletedWithErrors),
            "failed" => Ok(CampaignStatus::Failed),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

impl TryFrom<String> for CampaignStatus {
    type Error = UnknownStatus;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Fila de la tabla `campaigns`.
///
/// Los contadores son una caché: siempre se recalculan desde `recipients`.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct CampaignRecord {
    pub id: i64,
    pub name: String,
    pub subject: Option<String>,
    #[sqlx(try_from = "String")]
    pub status: CampaignStatus,
    pub sent_count: i64,
    pub opened_count: i64,
    pub clicked_count: i64,
    pub bounced_count: i64,
    pub scheduled_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateCampaignRequest {
    pub name: String,
    pub subject: Option<String>,
    pub scheduled_at: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AddRecipientsRequest {
    pub emails: Vec<String>,
}
