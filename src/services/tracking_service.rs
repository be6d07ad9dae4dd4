//! services/tracking_service.rs
//! Aperturas, clics y bajas que llegan desde los enlaces del correo.
//!
//! Son endpoints públicos: cualquier token desconocido o roto se trata como
//! un no-op y el llamador responde igual que si todo hubiera ido bien.

use anyhow::Result;
use chrono::Utc;

use crate::services::{
    campaign_service::CampaignService, recipient_service::RecipientService,
    suppression_service::SuppressionService, token_service,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnsubscribeOutcome {
    Unsubscribed { email: String, campaign_id: i64 },
    InvalidToken,
    Expired,
}

#[derive(Clone)]
pub struct TrackingService {
    campaigns: CampaignService,
    recipients: RecipientService,
    suppressions: SuppressionService,
    default_redirect_url: String,
    unsubscribe_max_age_secs: Option<i64>,
}

impl TrackingService {
    pub fn new(
        campaigns: CampaignService,
        recipients: RecipientService,
        suppressions: SuppressionService,
        default_redirect_url: String,
        unsubscribe_max_age_secs: Option<i64>,
    ) -> Self {
        Self {
            campaigns,
            recipients,
            suppressions,
            default_redirect_url,
            unsubscribe_max_age_secs,
        }
    }

    /// Registra una apertura. `Ok(false)` si el tracking id no existe.
    pub async fn record_open(&self, tracking_id: &str) -> Result<bool> {
        let Some(recipient) = self.recipients.record_open(tracking_id).await? else {
            return Ok(false);
        };
        if let Some(campaign_id) = recipient.campaign_id {
            self.campaigns.recompute_counts_best_effort(campaign_id).await;
        }
        Ok(true)
    }

    /// Registra el clic (si el tracking id existe) y devuelve a dónde redirigir.
    /// Nunca falla: un error de DB se registra y se redirige igual.
    pub async fn record_click(&self, tracking_id: &str, url: Option<&str>) -> String {
        let target = url.map(str::trim).filter(|u| is_safe_redirect(u));

        match self.recipients.record_click(tracking_id, url).await {
            Ok(Some(recipient)) => {
                if let Some(campaign_id) = recipient.campaign_id {
                    self.campaigns.recompute_counts_best_effort(campaign_id).await;
                }
                target
                    .map(str::to_string)
                    .unwrap_or_else(|| self.default_redirect_url.clone())
            }
            Ok(None) => {
                log::debug!("(record_click) tracking_id desconocido: {}", tracking_id);
                self.default_redirect_url.clone()
            }
            Err(e) => {
                log::error!("(record_click) Error registrando clic: {:?}", e);
                target
                    .map(str::to_string)
                    .unwrap_or_else(|| self.default_redirect_url.clone())
            }
        }
    }

    /// Procesa un token de baja. Solo los errores de DB llegan como `Err`.
    pub async fn unsubscribe(&self, token: &str) -> Result<UnsubscribeOutcome> {
        let Some(decoded) = token_service::decode_unsubscribe_token(token) else {
            return Ok(UnsubscribeOutcome::InvalidToken);
        };
        if decoded.is_expired(Utc::now().timestamp(), self.unsubscribe_max_age_secs) {
            return Ok(UnsubscribeOutcome::Expired);
        }

        let updated = self
            .recipients
            .mark_unsubscribed(&decoded.email, decoded.campaign_id)
            .await?;
        self.suppressions
            .upsert(&decoded.email, decoded.campaign_id, "unsubscribe")
            .await?;

        log::info!(
            "(unsubscribe) Baja de campaña {} ({} filas)",
            decoded.campaign_id,
            updated
        );
        if decoded.campaign_id > 0 {
            self.campaigns
                .recompute_counts_best_effort(decoded.campaign_id)
                .await;
        }

        Ok(UnsubscribeOutcome::Unsubscribed {
            email: decoded.email,
            campaign_id: decoded.campaign_id,
        })
    }
}

/// Solo se redirige a URLs absolutas http(s).
pub fn is_safe_redirect(url: &str) -> bool {
    let lower = url.to_ascii_lowercase();
    let rest = if let Some(rest) = lower.strip_prefix("https://") {
        rest
    } else if let Some(rest) = lower.strip_prefix("http://") {
        rest
    } else {
        return false;
    };
    !rest.is_empty()
        && !rest.starts_with('/')
        && !url.chars().any(|c| c.is_whitespace() || c.is_control())
}
