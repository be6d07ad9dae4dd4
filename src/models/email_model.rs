//! models/email_model.rs
//! Mensaje compuesto, correo saliente por destinatario y resultado de un lote.

use serde::{Deserialize, Serialize};

/// Mensaje tal como llega del autor de la campaña (sin personalizar).
#[derive(Debug, Clone, Deserialize)]
pub struct ComposedMessage {
    pub subject: String,
    /// HTML. Admite `{{email}}` y `{{unsubscribe_url}}`.
    pub body: String,
    pub from_name: String,
    pub from_email: String,
    #[serde(default)]
    pub cc: Vec<String>,
    #[serde(default)]
    pub bcc: Vec<String>,
}

/// Correo listo para el transporte, ya renderizado para un destinatario.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundEmail {
    pub to: String,
    pub cc: Vec<String>,
    pub bcc: Vec<String>,
    pub subject: String,
    pub body: String,
    pub from_name: String,
    pub from_email: String,
}

/// Quién dispara la acción. Reemplaza al "usuario actual" implícito.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Actor(pub String);

impl Actor {
    pub fn system() -> Self {
        Actor("system".to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Destino del lote: una campaña o un envío suelto de un remitente.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchTarget {
    Campaign(i64),
    AdHoc { sender: Actor },
}

#[derive(Debug, Clone, Serialize)]
pub struct DispatchFailure {
    pub recipient_id: i64,
    pub email: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct DispatchResult {
    pub successes: Vec<i64>,
    pub failures: Vec<DispatchFailure>,
    /// Destinatarios suprimidos (baja o queja); no se intentó el envío.
    pub skipped: Vec<i64>,
}

impl DispatchResult {
    pub fn attempted(&self) -> usize {
        self.successes.len() + self.failures.len()
    }
}

/// POST /api/email/send
#[derive(Debug, Clone, Deserialize)]
pub struct SendEmailRequest {
    pub recipients: Vec<String>,
    #[serde(flatten)]
    pub message: ComposedMessage,
}
