//! tests/tracking_tests.rs
//! Aperturas, clics y bajas contra una DB en memoria.

#[cfg(test)]
mod tests {
    use actix_rt::test;

    use crate::models::email_model::DispatchTarget;
    use crate::models::recipient_model::{RecipientRecord, RecipientStatus};
    use crate::services::suppression_service::GLOBAL_SCOPE;
    use crate::services::token_service::encode_unsubscribe_token;
    use crate::services::tracking_service::UnsubscribeOutcome;
    use crate::tests::{message, test_config, ScriptedTransport, TestContext, DEFAULT_REDIRECT};

    /// Campaña con un destinatario ya enviado; devuelve la fila con tracking id.
    async fn sent_recipient(ctx: &TestContext, email: &str) -> RecipientRecord {
        let campaign = ctx.campaign("seguimiento").await;
        let rows = ctx.recipients(Some(campaign.id), &[email]).await;
        ctx.services
            .dispatcher
            .dispatch(&DispatchTarget::Campaign(campaign.id), &rows, &message())
            .await
            .unwrap();
        ctx.recipient(rows[0].id).await
    }

    #[test]
    async fn second_open_keeps_first_timestamp() {
        let ctx = TestContext::new().await;
        let row = sent_recipient(&ctx, "ana@example.com").await;
        let tracking_id = row.tracking_id.clone().unwrap();

        assert!(ctx.services.tracking.record_open(&tracking_id).await.unwrap());
        let first = ctx.recipient(row.id).await;
        assert!(ctx.services.tracking.record_open(&tracking_id).await.unwrap());
        let second = ctx.recipient(row.id).await;

        assert_eq!(first.opened_at, second.opened_at);
        assert_eq!(second.open_count, 2);
        assert_eq!(second.status, RecipientStatus::Sent);

        let campaign = ctx
            .services
            .campaigns
            .get_campaign(row.campaign_id.unwrap())
            .await
            .unwrap();
        assert_eq!(campaign.opened_count, 1);
    }

    #[test]
    async fn unknown_tracking_id_is_a_no_op() {
        let ctx = TestContext::new().await;
        let row = sent_recipient(&ctx, "ana@example.com").await;

        assert!(!ctx.services.tracking.record_open("no-existe").await.unwrap());
        let location = ctx.services.tracking.record_click("no-existe", Some("https://a.example")).await;
        assert_eq!(location, DEFAULT_REDIRECT);

        let after = ctx.recipient(row.id).await;
        assert_eq!(after.open_count, 0);
        assert_eq!(after.click_count, 0);
        assert_eq!(ctx.count("SELECT COUNT(*) FROM click_events").await, 0);
    }

    #[test]
    async fn click_records_event_and_redirects() {
        let ctx = TestContext::new().await;
        let row = sent_recipient(&ctx, "ana@example.com").await;
        let tracking_id = row.tracking_id.clone().unwrap();

        let location = ctx
            .services
            .tracking
            .record_click(&tracking_id, Some("https://shop.example.com/oferta"))
            .await;
        assert_eq!(location, "https://shop.example.com/oferta");
        let first_clicked_at = ctx.recipient(row.id).await.clicked_at;
        assert!(first_clicked_at.is_some());

        ctx.services
            .tracking
            .record_click(&tracking_id, Some("https://shop.example.com/otra"))
            .await;

        let after = ctx.recipient(row.id).await;
        assert_eq!(after.click_count, 2);
        assert_eq!(after.status, RecipientStatus::Sent);
        assert_eq!(after.clicked_at, first_clicked_at);

        // Una fila con clics cuenta una sola vez en la campaña
        let campaign = ctx
            .services
            .campaigns
            .get_campaign(row.campaign_id.unwrap())
            .await
            .unwrap();
        assert_eq!(campaign.clicked_count, 1);

        let clicks = ctx.services.recipients.list_click_events(row.id).await.unwrap();
        let urls: Vec<Option<&str>> = clicks.iter().map(|c| c.url.as_deref()).collect();
        assert_eq!(
            urls,
            vec![
                Some("https://shop.example.com/oferta"),
                Some("https://shop.example.com/otra")
            ]
        );
    }

    #[test]
    async fn click_with_unsafe_or_missing_url_goes_to_default() {
        let ctx = TestContext::new().await;
        let row = sent_recipient(&ctx, "ana@example.com").await;
        let tracking_id = row.tracking_id.clone().unwrap();

        let missing = ctx.services.tracking.record_click(&tracking_id, None).await;
        assert_eq!(missing, DEFAULT_REDIRECT);

        let script = ctx
            .services
            .tracking
            .record_click(&tracking_id, Some("javascript:alert(1)"))
            .await;
        assert_eq!(script, DEFAULT_REDIRECT);

        // El clic cuenta aunque la URL no sea válida para redirigir
        assert_eq!(ctx.recipient(row.id).await.click_count, 2);
    }

    #[test]
    async fn unsubscribe_marks_rows_and_suppresses() {
        let ctx = TestContext::new().await;
        let row = sent_recipient(&ctx, "ana@example.com").await;
        let campaign_id = row.campaign_id.unwrap();
        let token = encode_unsubscribe_token("ana@example.com", campaign_id, chrono::Utc::now().timestamp());

        let outcome = ctx.services.tracking.unsubscribe(&token).await.unwrap();
        assert_eq!(
            outcome,
            UnsubscribeOutcome::Unsubscribed {
                email: "ana@example.com".to_string(),
                campaign_id
            }
        );

        let after = ctx.recipient(row.id).await;
        assert_eq!(after.status, RecipientStatus::Unsubscribed);
        assert!(after.unsubscribed_at.is_some());
        assert!(ctx
            .services
            .suppressions
            .is_suppressed("ana@example.com", Some(campaign_id))
            .await
            .unwrap());
        // La baja es por campaña, no global
        assert!(!ctx
            .services
            .suppressions
            .is_suppressed("ana@example.com", None)
            .await
            .unwrap());
    }

    #[test]
    async fn repeated_unsubscribe_refreshes_single_suppression() {
        let ctx = TestContext::new().await;
        let row = sent_recipient(&ctx, "ana@example.com").await;
        let campaign_id = row.campaign_id.unwrap();
        let token = encode_unsubscribe_token("ana@example.com", campaign_id, chrono::Utc::now().timestamp());

        ctx.services.tracking.unsubscribe(&token).await.unwrap();
        let first = ctx
            .services
            .suppressions
            .last_suppressed_at("ana@example.com", campaign_id)
            .await
            .unwrap()
            .unwrap();
        ctx.services.tracking.unsubscribe(&token).await.unwrap();
        let second = ctx
            .services
            .suppressions
            .last_suppressed_at("ana@example.com", campaign_id)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(ctx.count("SELECT COUNT(*) FROM suppressions").await, 1);
        assert!(second >= first);
    }

    #[test]
    async fn ad_hoc_unsubscribe_keeps_complaint_reason() {
        let ctx = TestContext::new().await;
        ctx.recipients(None, &["ana@example.com"]).await;
        ctx.services
            .suppressions
            .upsert("ana@example.com", GLOBAL_SCOPE, "complaint")
            .await
            .unwrap();

        // Los envíos sueltos firman el token con campaña 0, la misma clave global
        let token = encode_unsubscribe_token("ana@example.com", 0, chrono::Utc::now().timestamp());
        ctx.services.tracking.unsubscribe(&token).await.unwrap();

        let reason = sqlx::query_scalar::<_, String>(
            "SELECT reason FROM suppressions WHERE email = 'ana@example.com' AND campaign_id = 0",
        )
        .fetch_one(&ctx.pool)
        .await
        .unwrap();
        assert_eq!(reason, "complaint");
        assert_eq!(ctx.count("SELECT COUNT(*) FROM suppressions").await, 1);
    }

    #[test]
    async fn malformed_token_changes_nothing() {
        let ctx = TestContext::new().await;
        let row = sent_recipient(&ctx, "ana@example.com").await;

        let outcome = ctx.services.tracking.unsubscribe("%%%no-base64").await.unwrap();
        assert_eq!(outcome, UnsubscribeOutcome::InvalidToken);
        assert_eq!(ctx.recipient(row.id).await.status, RecipientStatus::Sent);
        assert_eq!(ctx.count("SELECT COUNT(*) FROM suppressions").await, 0);
    }

    #[test]
    async fn expired_token_is_rejected_when_max_age_is_set() {
        let config = crate::config::app_config::AppConfig {
            unsubscribe_token_max_age_secs: Some(3600),
            ..test_config()
        };
        let ctx = TestContext::with_config(ScriptedTransport::default(), config).await;
        let row = sent_recipient(&ctx, "ana@example.com").await;
        let old = chrono::Utc::now().timestamp() - 7200;
        let token = encode_unsubscribe_token("ana@example.com", row.campaign_id.unwrap(), old);

        let outcome = ctx.services.tracking.unsubscribe(&token).await.unwrap();
        assert_eq!(outcome, UnsubscribeOutcome::Expired);
        assert_eq!(ctx.recipient(row.id).await.status, RecipientStatus::Sent);
    }

    #[test]
    async fn unsubscribe_link_in_sent_body_works() {
        let ctx = TestContext::new().await;
        let row = sent_recipient(&ctx, "ana@example.com").await;

        let body = ctx.transport.sent()[0].body.clone();
        let start = body.find("/unsubscribe/").unwrap() + "/unsubscribe/".len();
        let token: String = body[start..]
            .chars()
            .take_while(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
            .collect();

        let outcome = ctx.services.tracking.unsubscribe(&token).await.unwrap();
        assert!(matches!(outcome, UnsubscribeOutcome::Unsubscribed { .. }));
        assert_eq!(ctx.recipient(row.id).await.status, RecipientStatus::Unsubscribed);
    }
}
