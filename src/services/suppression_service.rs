//! services/suppression_service.rs
//! Marcas de "no enviar": por campaña (baja) o globales (queja).

use anyhow::{Context, Result};
use chrono::Utc;
use sqlx::{Pool, Sqlite};

/// `campaign_id` usado para las supresiones que aplican a todas las campañas.
pub const GLOBAL_SCOPE: i64 = 0;

#[derive(Clone, Debug)]
pub struct SuppressionService {
    db_pool: Pool<Sqlite>,
}

impl SuppressionService {
    pub fn new(db_pool: Pool<Sqlite>) -> Self {
        SuppressionService { db_pool }
    }

    /// Upsert: repetir la baja refresca `last_suppressed_at`, no falla.
    pub async fn upsert(&self, email: &str, campaign_id: i64, reason: &str) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            r#"
            INSERT INTO suppressions (email, campaign_id, reason, created_at, last_suppressed_at)
            VALUES (?1, ?2, ?3, ?4, ?4)
            ON CONFLICT (email, campaign_id) DO UPDATE SET
                -- una queja no se rebaja a baja
                reason = CASE WHEN suppressions.reason = 'complaint'
                              THEN suppressions.reason ELSE excluded.reason END,
                last_suppressed_at = excluded.last_suppressed_at
            "#,
        )
        .bind(email.trim())
        .bind(campaign_id)
        .bind(reason)
        .bind(now)
        .execute(&self.db_pool)
        .await
        .with_context(|| format!("Fallo al guardar supresión ({reason})"))?;
        Ok(())
    }

    /// `true` si el email tiene supresión global o para esa campaña.
    pub async fn is_suppressed(&self, email: &str, campaign_id: Option<i64>) -> Result<bool> {
        let scope = campaign_id.unwrap_or(GLOBAL_SCOPE);
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM suppressions
            WHERE email = ?1 COLLATE NOCASE AND campaign_id IN (?2, ?3)
            "#,
        )
        .bind(email.trim())
        .bind(GLOBAL_SCOPE)
        .bind(scope)
        .fetch_one(&self.db_pool)
        .await
        .context("Fallo al consultar supresiones")?;
        Ok(count > 0)
    }

    pub async fn last_suppressed_at(&self, email: &str, campaign_id: i64) -> Result<Option<String>> {
        sqlx::query_scalar::<_, String>(
            "SELECT last_suppressed_at FROM suppressions WHERE email = ?1 COLLATE NOCASE AND campaign_id = ?2",
        )
        .bind(email.trim())
        .bind(campaign_id)
        .fetch_optional(&self.db_pool)
        .await
        .context("Fallo al leer supresión")
    }
}
