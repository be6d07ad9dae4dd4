//! services/token_service.rs
//! Identificadores de seguimiento y tokens de baja.
//!
//! - El tracking id es un UUID v4 aleatorio guardado en la fila del destinatario.
//! - El token de baja es autocontenido: `email|campaign_id|issued_at` en
//!   base64 URL-safe, así se puede procesar sin leer la DB antes.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use uuid::Uuid;

const FIELD_SEPARATOR: char = '|';

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsubscribeToken {
    pub email: String,
    /// 0 para envíos sin campaña.
    pub campaign_id: i64,
    /// Segundos Unix.
    pub issued_at: i64,
}

impl UnsubscribeToken {
    /// `true` si el token supera `max_age_secs` respecto a `now`.
    pub fn is_expired(&self, now: i64, max_age_secs: Option<i64>) -> bool {
        match max_age_secs {
            Some(max_age) => now.saturating_sub(self.issued_at) > max_age,
            None => false,
        }
    }
}

pub fn issue_tracking_id() -> String {
    Uuid::new_v4().simple().to_string()
}

pub fn encode_unsubscribe_token(email: &str, campaign_id: i64, issued_at: i64) -> String {
    let raw = format!(
        "{email}{FIELD_SEPARATOR}{campaign_id}{FIELD_SEPARATOR}{issued_at}"
    );
    URL_SAFE_NO_PAD.encode(raw.as_bytes())
}

/// Decodifica un token de baja. Cualquier entrada rara devuelve `None`.
pub fn decode_unsubscribe_token(token: &str) -> Option<UnsubscribeToken> {
    let bytes = URL_SAFE_NO_PAD.decode(token.trim().as_bytes()).ok()?;
    let raw = String::from_utf8(bytes).ok()?;

    // El email va primero y puede contener '|', así que se corta desde la derecha.
    let mut fields = raw.rsplitn(3, FIELD_SEPARATOR);
    let issued_at = fields.next()?.parse::<i64>().ok()?;
    let campaign_id = fields.next()?.parse::<i64>().ok()?;
    let email = fields.next()?;

    if campaign_id < 0 || !looks_like_email(email) {
        return None;
    }

    Some(UnsubscribeToken {
        email: email.to_string(),
        campaign_id,
        issued_at,
    })
}

fn looks_like_email(candidate: &str) -> bool {
    match candidate.rsplit_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && !domain.is_empty() && !candidate.chars().any(char::is_whitespace)
        }
        None => false,
    }
}
