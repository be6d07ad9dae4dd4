use serde::Serialize;
use sqlx::FromRow;

/// Registro de un envío suelto (sin campaña), por remitente.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct SendLogRecord {
    pub id: String,
    pub sender: String,
    pub recipient_email: String,
    pub subject: String,
    pub status: String, // "sent", "failed"
    pub error_message: Option<String>,
    pub created_at: String,
}

/// Para listar el log con paginación
#[derive(Debug, Clone, Serialize)]
pub struct ListSendLogResponse {
    pub total: u64,
    pub page: u64,
    pub page_size: u64,
    pub items: Vec<SendLogRecord>,
}
