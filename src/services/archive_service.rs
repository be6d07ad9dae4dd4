//! services/archive_service.rs
//! Archivado: copia a las tablas `deleted_*` y borra, todo en una transacción.
//!
//! Orden dentro de la transacción: copiar clics e intentos de envío, copiar
//! destinatarios, borrar dependientes, borrar destinatarios. Si cualquier paso
//! falla, el `Transaction` se descarta sin commit y SQLite hace rollback.

use anyhow::{bail, Context, Result};
use chrono::Utc;
use sqlx::{Pool, Sqlite, SqliteConnection};

use crate::models::archive_model::{ArchiveOutcome, ArchiveSelector};
use crate::models::email_model::Actor;
use crate::services::{campaign_service::CampaignService, ServiceError};

#[derive(Clone)]
pub struct ArchiveService {
    db_pool: Pool<Sqlite>,
    campaigns: CampaignService,
}

impl ArchiveService {
    pub fn new(db_pool: Pool<Sqlite>, campaigns: CampaignService) -> Self {
        Self { db_pool, campaigns }
    }

    pub async fn archive_and_delete(
        &self,
        selector: ArchiveSelector,
        actor: &Actor,
        reason: &str,
    ) -> Result<ArchiveOutcome> {
        let now = Utc::now().to_rfc3339();
        let mut tx = self.db_pool.begin().await?;

        let affected_campaigns = campaigns_for_selector(&mut tx, selector).await?;
        let outcome = archive_in_tx(&mut tx, selector, actor, reason, &now).await?;

        tx.commit().await.context("Fallo al confirmar el archivado")?;

        log::info!(
            "(archive) {:?} por {}: {} destinatarios archivados",
            selector,
            actor.as_str(),
            outcome.archived_recipients
        );

        for campaign_id in affected_campaigns {
            self.campaigns.recompute_counts_best_effort(campaign_id).await;
        }
        Ok(outcome)
    }

    /// Borra una campaña: archiva sus destinatarios, copia la fila a
    /// `deleted_campaigns` y la elimina, en la misma transacción.
    pub async fn delete_campaign(
        &self,
        campaign_id: i64,
        actor: &Actor,
        reason: &str,
    ) -> Result<ArchiveOutcome> {
        let now = Utc::now().to_rfc3339();
        let mut tx = self.db_pool.begin().await?;

        let outcome = archive_in_tx(
            &mut tx,
            ArchiveSelector::Campaign(campaign_id),
            actor,
            reason,
            &now,
        )
        .await?;

        let copied = sqlx::query(
            r#"
            INSERT INTO deleted_campaigns (
                original_id, name, subject, status, sent_count, opened_count,
                clicked_count, bounced_count, scheduled_at, created_at,
                deleted_by, deletion_reason, deleted_at
            )
            SELECT id, name, subject, status, sent_count, opened_count,
                   clicked_count, bounced_count, scheduled_at, created_at, ?1, ?2, ?3
            FROM campaigns WHERE id = ?4
            "#,
        )
        .bind(actor.as_str())
        .bind(reason)
        .bind(&now)
        .bind(campaign_id)
        .execute(&mut *tx)
        .await
        .context("Fallo al copiar campaña a deleted_campaigns")?
        .rows_affected();

        if copied == 0 {
            return Err(ServiceError::NotFound(format!("campaign {campaign_id}")).into());
        }

        sqlx::query("DELETE FROM campaigns WHERE id = ?1")
            .bind(campaign_id)
            .execute(&mut *tx)
            .await
            .context("Fallo al borrar campaña")?;

        tx.commit().await.context("Fallo al confirmar el borrado de campaña")?;

        log::info!(
            "(archive) Campaña {} borrada por {} ({} destinatarios archivados)",
            campaign_id,
            actor.as_str(),
            outcome.archived_recipients
        );
        Ok(outcome)
    }
}

async fn campaigns_for_selector(
    conn: &mut SqliteConnection,
    selector: ArchiveSelector,
) -> Result<Vec<i64>> {
    let (filter, id) = selector.recipient_filter();
    let sql = format!(
        "SELECT DISTINCT campaign_id FROM recipients WHERE campaign_id IS NOT NULL AND {filter}"
    );
    let mut query = sqlx::query_scalar::<_, i64>(&sql);
    if let Some(id) = id {
        query = query.bind(id);
    }
    query
        .fetch_all(&mut *conn)
        .await
        .context("Fallo al leer campañas afectadas")
}

async fn archive_in_tx(
    conn: &mut SqliteConnection,
    selector: ArchiveSelector,
    actor: &Actor,
    reason: &str,
    now: &str,
) -> Result<ArchiveOutcome> {
    let (filter, filter_id) = selector.recipient_filter();
    let selected = format!("SELECT id FROM recipients WHERE {filter}");

    let statements = [
        (
            "copiar click_events",
            format!(
                "INSERT INTO deleted_click_events \
                 (original_id, recipient_id, url, clicked_at, deleted_by, deletion_reason, deleted_at) \
                 SELECT id, recipient_id, url, clicked_at, ?, ?, ? \
                 FROM click_events WHERE recipient_id IN ({selected})"
            ),
            true,
        ),
        (
            "copiar send_attempts",
            format!(
                "INSERT INTO deleted_send_attempts \
                 (original_id, recipient_id, attempted_at, outcome, error_message, \
                  deleted_by, deletion_reason, deleted_at) \
                 SELECT id, recipient_id, attempted_at, outcome, error_message, ?, ?, ? \
                 FROM send_attempts WHERE recipient_id IN ({selected})"
            ),
            true,
        ),
        (
            "copiar recipients",
            format!(
                "INSERT INTO deleted_recipients \
                 (original_id, campaign_id, email, status, tracking_id, sent_at, opened_at, \
                  clicked_at, bounced_at, unsubscribed_at, open_count, click_count, \
                  error_message, created_at, deleted_by, deletion_reason, deleted_at) \
                 SELECT id, campaign_id, email, status, tracking_id, sent_at, opened_at, \
                        clicked_at, bounced_at, unsubscribed_at, open_count, click_count, \
                        error_message, created_at, ?, ?, ? \
                 FROM recipients WHERE {filter}"
            ),
            true,
        ),
        (
            "borrar click_events",
            format!("DELETE FROM click_events WHERE recipient_id IN ({selected})"),
            false,
        ),
        (
            "borrar send_attempts",
            format!("DELETE FROM send_attempts WHERE recipient_id IN ({selected})"),
            false,
        ),
        (
            "borrar recipients",
            format!("DELETE FROM recipients WHERE {filter}"),
            false,
        ),
    ];

    let mut affected = Vec::with_capacity(statements.len());
    for (step, sql, audit_columns) in &statements {
        let mut query = sqlx::query(sql);
        if *audit_columns {
            query = query.bind(actor.as_str()).bind(reason).bind(now);
        }
        if let Some(id) = filter_id {
            query = query.bind(id);
        }
        let rows = query
            .execute(&mut *conn)
            .await
            .with_context(|| format!("Archivado: fallo al {step}"))?
            .rows_affected();
        affected.push(rows);
    }

    let outcome = ArchiveOutcome {
        archived_click_events: affected[0],
        archived_send_attempts: affected[1],
        archived_recipients: affected[2],
        deleted_recipients: affected[5],
        nothing_to_delete: affected[2] == 0,
    };

    if outcome.archived_recipients != outcome.deleted_recipients
        || affected[0] != affected[3]
        || affected[1] != affected[4]
    {
        bail!(
            "Archivado inconsistente: copiados {:?}, borrados {:?}",
            &affected[..3],
            &affected[3..]
        );
    }

    Ok(outcome)
}
