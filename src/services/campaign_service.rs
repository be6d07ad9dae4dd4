//! services/campaign_service.rs
//! Tabla `campaigns`: estado y contadores agregados.

use anyhow::{Context, Result};
use chrono::Utc;
use sqlx::{Pool, Sqlite};

use crate::models::campaign_model::{CampaignRecord, CampaignStatus, CreateCampaignRequest};
use crate::services::ServiceError;

const CAMPAIGN_COLUMNS: &str = "id, name, subject, status, sent_count, opened_count, \
     clicked_count, bounced_count, scheduled_at, created_at, updated_at";

#[derive(Clone, Debug)]
pub struct CampaignService {
    db_pool: Pool<Sqlite>,
}

impl CampaignService {
    pub fn new(db_pool: Pool<Sqlite>) -> Self {
        CampaignService { db_pool }
    }

    /// Crea la campaña en `draft` (o `scheduled` si trae fecha).
    pub async fn create_campaign(&self, req: CreateCampaignRequest) -> Result<CampaignRecord> {
        let now = Utc::now().to_rfc3339();
        let status = if req.scheduled_at.is_some() {
            CampaignStatus::Scheduled
        } else {
            CampaignStatus::Draft
        };

        let id = sqlx::query(
            r#"
            INSERT INTO campaigns (name, subject, status, scheduled_at, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?5)
            "#,
        )
        .bind(&req.name)
        .bind(&req.subject)
        .bind(status.as_str())
        .bind(&req.scheduled_at)
        .bind(&now)
        .execute(&self.db_pool)
        .await
        .context("Fallo al insertar campaña")?
        .last_insert_rowid();

        self.get_campaign(id).await
    }

    pub async fn get_campaign(&self, campaign_id: i64) -> Result<CampaignRecord> {
        let sql = format!("SELECT {CAMPAIGN_COLUMNS} FROM campaigns WHERE id = ?1");
        sqlx::query_as::<_, CampaignRecord>(&sql)
            .bind(campaign_id)
            .fetch_optional(&self.db_pool)
            .await
            .context("Fallo al leer campaña")?
            .ok_or_else(|| ServiceError::NotFound(format!("campaign {campaign_id}")).into())
    }

    pub async fn list_campaigns(&self) -> Result<Vec<CampaignRecord>> {
        let sql = format!("SELECT {CAMPAIGN_COLUMNS} FROM campaigns ORDER BY id DESC");
        sqlx::query_as::<_, CampaignRecord>(&sql)
            .fetch_all(&self.db_pool)
            .await
            .context("Fallo al listar campañas")
    }

    pub async fn set_status(&self, campaign_id: i64, status: CampaignStatus) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        sqlx::query("UPDATE campaigns SET status = ?1, updated_at = ?2 WHERE id = ?3")
            .bind(status.as_str())
            .bind(now)
            .bind(campaign_id)
            .execute(&self.db_pool)
            .await
            .context("Fallo al actualizar estado de campaña")?;
        Ok(())
    }

    /// Recalcula los contadores desde `recipients`. Idempotente: una sola
    /// sentencia, sin leer-modificar-escribir en la aplicación.
    pub async fn recompute_counts(&self, campaign_id: i64) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            r#"
            UPDATE campaigns SET
                sent_count = (SELECT COUNT(*) FROM recipients
                              WHERE campaign_id = ?1 AND sent_at IS NOT NULL),
                opened_count = (SELECT COUNT(*) FROM recipients
                                WHERE campaign_id = ?1 AND opened_at IS NOT NULL),
                clicked_count = (SELECT COUNT(*) FROM recipients
                                 WHERE campaign_id = ?1 AND clicked_at IS NOT NULL),
                bounced_count = (SELECT COUNT(*) FROM recipients
                                 WHERE campaign_id = ?1 AND bounced_at IS NOT NULL),
                updated_at = ?2
            WHERE id = ?1
            "#,
        )
        .bind(campaign_id)
        .bind(now)
        .execute(&self.db_pool)
        .await
        .with_context(|| format!("Fallo al recalcular contadores de campaña {campaign_id}"))?;
        Ok(())
    }

    /// Igual que `recompute_counts` pero solo deja un warning si falla.
    /// Lo usan los caminos que no deben deshacer el cambio que lo disparó.
    pub async fn recompute_counts_best_effort(&self, campaign_id: i64) {
        if let Err(e) = self.recompute_counts(campaign_id).await {
            log::warn!("No se pudieron recalcular contadores: {:?}", e);
        }
    }

    /// Campañas con al menos un destinatario con ese email.
    pub async fn campaigns_for_email(&self, email: &str) -> Result<Vec<i64>> {
        sqlx::query_scalar::<_, i64>(
            r#"
            SELECT DISTINCT campaign_id FROM recipients
            WHERE email = ?1 COLLATE NOCASE AND campaign_id IS NOT NULL
            "#,
        )
        .bind(email)
        .fetch_all(&self.db_pool)
        .await
        .context("Fallo al buscar campañas por email")
    }

    pub async fn all_campaign_ids(&self) -> Result<Vec<i64>> {
        sqlx::query_scalar::<_, i64>("SELECT id FROM campaigns")
            .fetch_all(&self.db_pool)
            .await
            .context("Fallo al listar ids de campañas")
    }
}
