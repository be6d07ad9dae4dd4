use anyhow::{Context, Result};
use chrono::Utc;
use sqlx::{Pool, Sqlite};
use uuid::Uuid;

use crate::models::email_model::Actor;
use crate::models::send_log_model::{ListSendLogResponse, SendLogRecord};

/// Log de envíos sueltos (sin campaña), indexado por remitente.
#[derive(Clone, Debug)]
pub struct SendLogService {
    db_pool: Pool<Sqlite>,
}

impl SendLogService {
    pub fn new(db_pool: Pool<Sqlite>) -> Self {
        SendLogService { db_pool }
    }

    /// Agrega una entrada al log. Solo historial: nadie lee de aquí para decidir.
    pub async fn append(
        &self,
        sender: &Actor,
        recipient_email: &str,
        subject: &str,
        error: Option<&str>,
    ) -> Result<String> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();
        let status = if error.is_some() { "failed" } else { "sent" };

        sqlx::query(
            r#"
            INSERT INTO send_log (
                id, sender, recipient_email, subject, status, error_message, created_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&id)
        .bind(sender.as_str())
        .bind(recipient_email)
        .bind(subject)
        .bind(status)
        .bind(error)
        .bind(now)
        .execute(&self.db_pool)
        .await
        .context("Fallo al insertar en send_log")?;

        Ok(id)
    }

    /// Lista el log con paginación, opcionalmente filtrado por remitente.
    pub async fn list(
        &self,
        sender: Option<&str>,
        page: u64,
        page_size: u64,
    ) -> Result<ListSendLogResponse> {
        let page = page.max(1);
        let page_size = page_size.clamp(1, 500);
        let offset = i64::try_from((page - 1).saturating_mul(page_size)).unwrap_or(i64::MAX);

        // total
        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM send_log WHERE ?1 IS NULL OR sender = ?1",
        )
        .bind(sender)
        .fetch_one(&self.db_pool)
        .await
        .context("Fallo al contar send_log")?;

        // items
        let items = sqlx::query_as::<_, SendLogRecord>(
            r#"
            SELECT id, sender, recipient_email, subject, status, error_message, created_at
            FROM send_log
            WHERE ?1 IS NULL OR sender = ?1
            ORDER BY created_at DESC
            LIMIT ?2 OFFSET ?3
            "#,
        )
        .bind(sender)
        .bind(page_size as i64)
        .bind(offset)
        .fetch_all(&self.db_pool)
        .await
        .context("Fallo al listar send_log")?;

        Ok(ListSendLogResponse {
            total: total as u64,
            page,
            page_size,
            items,
        })
    }
}
