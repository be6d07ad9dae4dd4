//! services/recipient_service.rs
//! Tabla `recipients` y sus tablas dependientes (`send_attempts`, `click_events`).
//!
//! Los timestamps "primera vez" se escriben con `COALESCE(col, ?)` en la misma
//! sentencia que incrementa el contador, así dos aperturas simultáneas no se
//! pisan.

use anyhow::{Context, Result};
use chrono::Utc;
use sqlx::{Pool, Sqlite};

use crate::models::recipient_model::{
    ClickEventRecord, RecipientRecord, RecipientStatus, SendAttemptRecord, UpdateRecipientRequest,
};
use crate::services::ServiceError;

const RECIPIENT_COLUMNS: &str = "id, campaign_id, email, status, tracking_id, sent_at, \
     opened_at, clicked_at, bounced_at, unsubscribed_at, open_count, click_count, \
     error_message, created_at";

#[derive(Clone, Debug)]
pub struct RecipientService {
    db_pool: Pool<Sqlite>,
}

impl RecipientService {
    pub fn new(db_pool: Pool<Sqlite>) -> Self {
        RecipientService { db_pool }
    }

    /// Inserta filas `pending`. Los emails repetidos generan filas distintas.
    pub async fn add_recipients(
        &self,
        campaign_id: Option<i64>,
        emails: &[String],
    ) -> Result<Vec<RecipientRecord>> {
        let now = Utc::now().to_rfc3339();
        let mut tx = self.db_pool.begin().await?;
        let mut ids = Vec::with_capacity(emails.len());

        for email in emails {
            let id = sqlx::query(
                r#"
                INSERT INTO recipients (campaign_id, email, status, created_at)
                VALUES (?1, ?2, 'pending', ?3)
                "#,
            )
            .bind(campaign_id)
            .bind(email.trim())
            .bind(&now)
            .execute(&mut *tx)
            .await
            .context("Fallo al insertar destinatario")?
            .last_insert_rowid();
            ids.push(id);
        }
        tx.commit().await?;

        let mut records = Vec::with_capacity(ids.len());
        for id in ids {
            records.push(self.get_recipient(id).await?);
        }
        Ok(records)
    }

    pub async fn get_recipient(&self, recipient_id: i64) -> Result<RecipientRecord> {
        let sql = format!("SELECT {RECIPIENT_COLUMNS} FROM recipients WHERE id = ?1");
        sqlx::query_as::<_, RecipientRecord>(&sql)
            .bind(recipient_id)
            .fetch_optional(&self.db_pool)
            .await
            .context("Fallo al leer destinatario")?
            .ok_or_else(|| ServiceError::NotFound(format!("recipient {recipient_id}")).into())
    }

    pub async fn find_by_tracking_id(&self, tracking_id: &str) -> Result<Option<RecipientRecord>> {
        let sql = format!("SELECT {RECIPIENT_COLUMNS} FROM recipients WHERE tracking_id = ?1");
        sqlx::query_as::<_, RecipientRecord>(&sql)
            .bind(tracking_id)
            .fetch_optional(&self.db_pool)
            .await
            .context("Fallo al buscar destinatario por tracking_id")
    }

    pub async fn list_for_campaign(&self, campaign_id: i64) -> Result<Vec<RecipientRecord>> {
        let sql = format!(
            "SELECT {RECIPIENT_COLUMNS} FROM recipients WHERE campaign_id = ?1 ORDER BY id"
        );
        sqlx::query_as::<_, RecipientRecord>(&sql)
            .bind(campaign_id)
            .fetch_all(&self.db_pool)
            .await
            .context("Fallo al listar destinatarios")
    }

    /// Destinatarios que aún deben recibir la campaña (pendientes o fallidos).
    pub async fn list_unsent_for_campaign(&self, campaign_id: i64) -> Result<Vec<RecipientRecord>> {
        let sql = format!(
            "SELECT {RECIPIENT_COLUMNS} FROM recipients \
             WHERE campaign_id = ?1 AND status IN ('pending', 'failed') ORDER BY id"
        );
        sqlx::query_as::<_, RecipientRecord>(&sql)
            .bind(campaign_id)
            .fetch_all(&self.db_pool)
            .await
            .context("Fallo al listar destinatarios sin enviar")
    }

    /// Asigna un tracking id solo si la fila no tiene uno. Devuelve el vigente.
    pub async fn ensure_tracking_id(&self, recipient_id: i64, candidate: &str) -> Result<String> {
        sqlx::query("UPDATE recipients SET tracking_id = ?1 WHERE id = ?2 AND tracking_id IS NULL")
            .bind(candidate)
            .bind(recipient_id)
            .execute(&self.db_pool)
            .await
            .context("Fallo al asignar tracking_id")?;

        let current =
            sqlx::query_scalar::<_, Option<String>>("SELECT tracking_id FROM recipients WHERE id = ?1")
                .bind(recipient_id)
                .fetch_optional(&self.db_pool)
                .await?
                .flatten();

        current.ok_or_else(|| ServiceError::NotFound(format!("recipient {recipient_id}")).into())
    }

    /// El primer envío exitoso fija `sent_at`; los reenvíos solo quedan en
    /// `send_attempts`.
    pub async fn mark_sent(&self, recipient_id: i64) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            r#"
            UPDATE recipients
            SET status = 'sent', sent_at = COALESCE(sent_at, ?1), error_message = NULL
            WHERE id = ?2
            "#,
        )
        .bind(&now)
        .bind(recipient_id)
        .execute(&self.db_pool)
        .await
        .context("Fallo al marcar destinatario como enviado")?;

        self.append_send_attempt(recipient_id, &now, "sent", None).await
    }

    /// `sent_at` no se toca: si hubo un envío anterior exitoso, sigue contando.
    pub async fn mark_failed(&self, recipient_id: i64, error: &str) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        sqlx::query("UPDATE recipients SET status = 'failed', error_message = ?1 WHERE id = ?2")
            .bind(error)
            .bind(recipient_id)
            .execute(&self.db_pool)
            .await
            .context("Fallo al marcar destinatario como fallido")?;

        self.append_send_attempt(recipient_id, &now, "failed", Some(error))
            .await
    }

    async fn append_send_attempt(
        &self,
        recipient_id: i64,
        attempted_at: &str,
        outcome: &str,
        error: Option<&str>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO send_attempts (recipient_id, attempted_at, outcome, error_message)
            VALUES (?1, ?2, ?3, ?4)
            "#,
        )
        .bind(recipient_id)
        .bind(attempted_at)
        .bind(outcome)
        .bind(error)
        .execute(&self.db_pool)
        .await
        .context("Fallo al registrar intento de envío")?;
        Ok(())
    }

    pub async fn list_send_attempts(&self, recipient_id: i64) -> Result<Vec<SendAttemptRecord>> {
        sqlx::query_as::<_, SendAttemptRecord>(
            r#"
            SELECT id, recipient_id, attempted_at, outcome, error_message
            FROM send_attempts WHERE recipient_id = ?1 ORDER BY id
            "#,
        )
        .bind(recipient_id)
        .fetch_all(&self.db_pool)
        .await
        .context("Fallo al listar intentos de envío")
    }

    /// Apertura: primera fecha gana, el contador siempre sube.
    /// Devuelve la fila actualizada, o `None` si el tracking id no existe.
    pub async fn record_open(&self, tracking_id: &str) -> Result<Option<RecipientRecord>> {
        let now = Utc::now().to_rfc3339();
        let affected = sqlx::query(
            r#"
            UPDATE recipients
            SET opened_at = COALESCE(opened_at, ?1),
                open_count = open_count + 1
            WHERE tracking_id = ?2
            "#,
        )
        .bind(&now)
        .bind(tracking_id)
        .execute(&self.db_pool)
        .await
        .context("Fallo al registrar apertura")?
        .rows_affected();

        if affected == 0 {
            return Ok(None);
        }
        self.find_by_tracking_id(tracking_id).await
    }

    /// Clic: igual que la apertura, más el detalle con la URL destino.
    pub async fn record_click(
        &self,
        tracking_id: &str,
        url: Option<&str>,
    ) -> Result<Option<RecipientRecord>> {
        let now = Utc::now().to_rfc3339();
        let affected = sqlx::query(
            r#"
            UPDATE recipients
            SET clicked_at = COALESCE(clicked_at, ?1),
                click_count = click_count + 1
            WHERE tracking_id = ?2
            "#,
        )
        .bind(&now)
        .bind(tracking_id)
        .execute(&self.db_pool)
        .await
        .context("Fallo al registrar clic")?
        .rows_affected();

        if affected == 0 {
            return Ok(None);
        }

        let Some(recipient) = self.find_by_tracking_id(tracking_id).await? else {
            // Borrado entre las dos sentencias
            return Ok(None);
        };

        sqlx::query("INSERT INTO click_events (recipient_id, url, clicked_at) VALUES (?1, ?2, ?3)")
            .bind(recipient.id)
            .bind(url)
            .bind(&now)
            .execute(&self.db_pool)
            .await
            .context("Fallo al registrar detalle de clic")?;

        Ok(Some(recipient))
    }

    pub async fn list_click_events(&self, recipient_id: i64) -> Result<Vec<ClickEventRecord>> {
        sqlx::query_as::<_, ClickEventRecord>(
            "SELECT id, recipient_id, url, clicked_at FROM click_events WHERE recipient_id = ?1 ORDER BY id",
        )
        .bind(recipient_id)
        .fetch_all(&self.db_pool)
        .await
        .context("Fallo al listar clics")
    }

    /// Baja para el par (email, campaña). `campaign_id` 0 = envío sin campaña.
    pub async fn mark_unsubscribed(&self, email: &str, campaign_id: i64) -> Result<u64> {
        let now = Utc::now().to_rfc3339();
        let result = sqlx::query(
            r#"
            UPDATE recipients
            SET status = 'unsubscribed',
                unsubscribed_at = COALESCE(unsubscribed_at, ?1)
            WHERE email = ?2 COLLATE NOCASE AND COALESCE(campaign_id, 0) = ?3
            "#,
        )
        .bind(&now)
        .bind(email)
        .bind(campaign_id)
        .execute(&self.db_pool)
        .await
        .context("Fallo al marcar baja")?;
        Ok(result.rows_affected())
    }

    /// Marca como rebotada la fila enviada más reciente de ese email, si aún no
    /// tiene rebote. Un replay del mismo evento encuentra `bounced_at` ya puesto
    /// y no toca nada (ni otras filas más antiguas).
    pub async fn mark_bounced(&self, email: &str, reason: Option<&str>) -> Result<Option<i64>> {
        let now = Utc::now().to_rfc3339();
        let bounced_id = sqlx::query_scalar::<_, i64>(
            r#"
            UPDATE recipients
            SET status = 'bounced', bounced_at = ?1, error_message = ?2
            WHERE bounced_at IS NULL AND id = (
                SELECT id FROM recipients
                WHERE email = ?3 COLLATE NOCASE AND sent_at IS NOT NULL
                ORDER BY sent_at DESC, id DESC
                LIMIT 1
            )
            RETURNING id
            "#,
        )
        .bind(&now)
        .bind(reason)
        .bind(email)
        .fetch_optional(&self.db_pool)
        .await
        .context("Fallo al marcar rebote")?;
        Ok(bounced_id)
    }

    pub async fn mark_complained(&self, email: &str) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE recipients SET status = 'complained' WHERE email = ?1 COLLATE NOCASE",
        )
        .bind(email)
        .execute(&self.db_pool)
        .await
        .context("Fallo al marcar queja")?;
        Ok(result.rows_affected())
    }

    /// Edición manual. `reset` vuelve la fila a `pending` para reenviarla.
    pub async fn update_recipient(
        &self,
        recipient_id: i64,
        req: UpdateRecipientRequest,
    ) -> Result<RecipientRecord> {
        let current = self.get_recipient(recipient_id).await?;
        let mut tx = self.db_pool.begin().await?;

        if let Some(email) = req.email.as_deref().map(str::trim) {
            if email.is_empty() {
                return Err(ServiceError::Invalid("email vacío".to_string()).into());
            }
            sqlx::query("UPDATE recipients SET email = ?1 WHERE id = ?2")
                .bind(email)
                .bind(recipient_id)
                .execute(&mut *tx)
                .await
                .context("Fallo al corregir email")?;
        }

        if req.reset == Some(true) {
            if matches!(
                current.status,
                RecipientStatus::Complained | RecipientStatus::Unsubscribed
            ) {
                return Err(ServiceError::Invalid(format!(
                    "no se puede reenviar a un destinatario en estado {}",
                    current.status
                ))
                .into());
            }
            sqlx::query(
                "UPDATE recipients SET status = 'pending', error_message = NULL WHERE id = ?1",
            )
            .bind(recipient_id)
            .execute(&mut *tx)
            .await
            .context("Fallo al reiniciar destinatario")?;
        }

        tx.commit().await?;
        self.get_recipient(recipient_id).await
    }
}
