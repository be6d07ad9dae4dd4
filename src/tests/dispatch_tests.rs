//! tests/dispatch_tests.rs
//! Pruebas del despachador: continuar ante fallos, estados y contadores.

#[cfg(test)]
mod tests {
    use actix_rt::test;

    use crate::models::campaign_model::CampaignStatus;
    use crate::models::email_model::{Actor, DispatchTarget};
    use crate::models::recipient_model::{RecipientStatus, UpdateRecipientRequest};
    use crate::services::suppression_service::GLOBAL_SCOPE;
    use crate::tests::{message, ScriptedTransport, TestContext, BASE_URL};

    #[test]
    async fn failure_in_the_middle_does_not_abort_the_batch() {
        let ctx =
            TestContext::with_transport(ScriptedTransport::failing_for(&["dos@example.com"])).await;
        let campaign = ctx.campaign("octubre").await;
        let rows = ctx
            .recipients(
                Some(campaign.id),
                &["uno@example.com", "dos@example.com", "tres@example.com"],
            )
            .await;

        let result = ctx
            .services
            .dispatcher
            .dispatch(&DispatchTarget::Campaign(campaign.id), &rows, &message())
            .await
            .expect("dispatch");

        assert_eq!(result.successes, vec![rows[0].id, rows[2].id]);
        assert_eq!(result.failures.len(), 1);
        assert_eq!(result.failures[0].recipient_id, rows[1].id);
        assert!(result.failures[0].error.contains("550"));

        let campaign = ctx.services.campaigns.get_campaign(campaign.id).await.unwrap();
        assert_eq!(campaign.status, CampaignStatus::CompletedWithErrors);
        assert_eq!(campaign.sent_count, 2);

        let failed = ctx.recipient(rows[1].id).await;
        assert_eq!(failed.status, RecipientStatus::Failed);
        assert!(failed.sent_at.is_none());
        assert!(failed.error_message.unwrap().contains("550"));

        let sent = ctx.recipient(rows[0].id).await;
        assert_eq!(sent.status, RecipientStatus::Sent);
        assert!(sent.sent_at.is_some());
        assert!(sent.error_message.is_none());
    }

    #[test]
    async fn successes_plus_failures_equals_batch_size() {
        let emails = [
            "a@example.com",
            "b@example.com",
            "c@example.com",
            "d@example.com",
            "e@example.com",
        ];
        let ctx = TestContext::with_transport(ScriptedTransport::failing_for(&[
            "b@example.com",
            "e@example.com",
        ]))
        .await;
        let campaign = ctx.campaign("lote").await;
        let rows = ctx.recipients(Some(campaign.id), &emails).await;

        let result = ctx
            .services
            .dispatcher
            .dispatch(&DispatchTarget::Campaign(campaign.id), &rows, &message())
            .await
            .unwrap();

        assert_eq!(result.successes.len(), 3);
        assert_eq!(result.failures.len(), 2);
        let campaign = ctx.services.campaigns.get_campaign(campaign.id).await.unwrap();
        assert_eq!(campaign.sent_count, 3);
        assert_eq!(ctx.transport.sent().len(), 3);
    }

    #[test]
    async fn all_success_completes_and_all_failures_fail() {
        let ctx = TestContext::with_transport(ScriptedTransport::failing_for(&[
            "x@example.com",
            "y@example.com",
        ]))
        .await;

        let ok_campaign = ctx.campaign("ok").await;
        let ok_rows = ctx
            .recipients(Some(ok_campaign.id), &["a@example.com", "b@example.com"])
            .await;
        ctx.services
            .dispatcher
            .dispatch(&DispatchTarget::Campaign(ok_campaign.id), &ok_rows, &message())
            .await
            .unwrap();
        let ok_campaign = ctx.services.campaigns.get_campaign(ok_campaign.id).await.unwrap();
        assert_eq!(ok_campaign.status, CampaignStatus::Completed);

        let bad_campaign = ctx.campaign("bad").await;
        let bad_rows = ctx
            .recipients(Some(bad_campaign.id), &["x@example.com", "y@example.com"])
            .await;
        let result = ctx
            .services
            .dispatcher
            .dispatch(&DispatchTarget::Campaign(bad_campaign.id), &bad_rows, &message())
            .await
            .unwrap();
        assert!(result.successes.is_empty());
        let bad_campaign = ctx.services.campaigns.get_campaign(bad_campaign.id).await.unwrap();
        assert_eq!(bad_campaign.status, CampaignStatus::Failed);
        assert_eq!(bad_campaign.sent_count, 0);
    }

    #[test]
    async fn empty_batch_leaves_campaign_untouched() {
        let ctx = TestContext::new().await;
        let campaign = ctx.campaign("vacía").await;

        let result = ctx
            .services
            .dispatcher
            .dispatch(&DispatchTarget::Campaign(campaign.id), &[], &message())
            .await
            .unwrap();

        assert!(result.successes.is_empty());
        assert!(result.failures.is_empty());
        let after = ctx.services.campaigns.get_campaign(campaign.id).await.unwrap();
        assert_eq!(after.status, CampaignStatus::Draft);
    }

    #[test]
    async fn duplicate_addresses_are_sent_independently() {
        let ctx = TestContext::new().await;
        let campaign = ctx.campaign("duplicados").await;
        let rows = ctx
            .recipients(
                Some(campaign.id),
                &["dup@example.com", "dup@example.com"],
            )
            .await;

        let result = ctx
            .services
            .dispatcher
            .dispatch(&DispatchTarget::Campaign(campaign.id), &rows, &message())
            .await
            .unwrap();

        assert_eq!(result.successes.len(), 2);
        assert_eq!(ctx.transport.sent().len(), 2);
        let first = ctx.recipient(rows[0].id).await;
        let second = ctx.recipient(rows[1].id).await;
        assert_ne!(first.tracking_id, second.tracking_id);
    }

    #[test]
    async fn rendered_message_carries_tracking_links() {
        let ctx = TestContext::new().await;
        let campaign = ctx.campaign("links").await;
        let rows = ctx.recipients(Some(campaign.id), &["ana@example.com"]).await;

        ctx.services
            .dispatcher
            .dispatch(&DispatchTarget::Campaign(campaign.id), &rows, &message())
            .await
            .unwrap();

        let tracking_id = ctx.recipient(rows[0].id).await.tracking_id.expect("tracking id");
        let sent = ctx.transport.sent();
        let body = &sent[0].body;
        assert!(body.contains("Hola ana@example.com"));
        assert!(body.contains(&format!("{BASE_URL}/track/open/{tracking_id}")));
        assert!(body.contains(&format!(
            "{BASE_URL}/track/click/{tracking_id}?url=https%3A%2F%2Fshop.example.com%2Foferta"
        )));
        assert!(body.contains(&format!("{BASE_URL}/unsubscribe/")));
    }

    #[test]
    async fn resend_keeps_tracking_id_and_records_history() {
        let ctx =
            TestContext::with_transport(ScriptedTransport::failing_for(&["typo@example.con"])).await;
        let campaign = ctx.campaign("reintento").await;
        let rows = ctx.recipients(Some(campaign.id), &["typo@example.con"]).await;
        let target = DispatchTarget::Campaign(campaign.id);

        ctx.services
            .dispatcher
            .dispatch(&target, &rows, &message())
            .await
            .unwrap();
        let first_tracking = ctx.recipient(rows[0].id).await.tracking_id;

        // Corrección manual del email y reenvío
        ctx.services
            .recipients
            .update_recipient(
                rows[0].id,
                UpdateRecipientRequest {
                    email: Some("typo@example.com".to_string()),
                    reset: Some(true),
                },
            )
            .await
            .unwrap();
        let pending = ctx
            .services
            .recipients
            .list_unsent_for_campaign(campaign.id)
            .await
            .unwrap();
        assert_eq!(pending.len(), 1);

        let result = ctx
            .services
            .dispatcher
            .dispatch(&target, &pending, &message())
            .await
            .unwrap();
        assert_eq!(result.successes, vec![rows[0].id]);

        let row = ctx.recipient(rows[0].id).await;
        assert_eq!(row.tracking_id, first_tracking);
        assert_eq!(row.status, RecipientStatus::Sent);

        let attempts = ctx
            .services
            .recipients
            .list_send_attempts(rows[0].id)
            .await
            .unwrap();
        let outcomes: Vec<&str> = attempts.iter().map(|a| a.outcome.as_str()).collect();
        assert_eq!(outcomes, vec!["failed", "sent"]);

        let campaign = ctx.services.campaigns.get_campaign(campaign.id).await.unwrap();
        assert_eq!(campaign.status, CampaignStatus::Completed);
    }

    #[test]
    async fn resend_after_success_keeps_first_sent_at() {
        let ctx = TestContext::new().await;
        let campaign = ctx.campaign("reenvío").await;
        let rows = ctx.recipients(Some(campaign.id), &["ana@example.com"]).await;
        let target = DispatchTarget::Campaign(campaign.id);

        ctx.services
            .dispatcher
            .dispatch(&target, &rows, &message())
            .await
            .unwrap();
        let first = ctx.recipient(rows[0].id).await.sent_at;
        assert!(first.is_some());

        ctx.services
            .recipients
            .update_recipient(
                rows[0].id,
                UpdateRecipientRequest {
                    email: None,
                    reset: Some(true),
                },
            )
            .await
            .unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        let pending = ctx
            .services
            .recipients
            .list_unsent_for_campaign(campaign.id)
            .await
            .unwrap();
        ctx.services
            .dispatcher
            .dispatch(&target, &pending, &message())
            .await
            .unwrap();

        let row = ctx.recipient(rows[0].id).await;
        assert_eq!(row.status, RecipientStatus::Sent);
        assert_eq!(row.sent_at, first);

        // El segundo envío queda en el historial con su propia hora
        let attempts = ctx
            .services
            .recipients
            .list_send_attempts(rows[0].id)
            .await
            .unwrap();
        assert_eq!(attempts.len(), 2);
        assert_ne!(Some(attempts[1].attempted_at.clone()), first);
    }

    #[test]
    async fn ad_hoc_send_writes_send_log_not_campaigns() {
        let ctx =
            TestContext::with_transport(ScriptedTransport::failing_for(&["bad@example.com"])).await;
        let rows = ctx
            .recipients(None, &["ok@example.com", "bad@example.com"])
            .await;
        let sender = Actor("maria".to_string());

        let result = ctx
            .services
            .dispatcher
            .dispatch(&DispatchTarget::AdHoc { sender }, &rows, &message())
            .await
            .unwrap();
        assert_eq!(result.successes.len(), 1);
        assert_eq!(result.failures.len(), 1);

        let log = ctx.services.send_log.list(Some("maria"), 1, 10).await.unwrap();
        assert_eq!(log.total, 2);
        let mut statuses: Vec<&str> = log.items.iter().map(|i| i.status.as_str()).collect();
        statuses.sort();
        assert_eq!(statuses, vec!["failed", "sent"]);

        let other = ctx.services.send_log.list(Some("otro"), 1, 10).await.unwrap();
        assert_eq!(other.total, 0);
        assert_eq!(ctx.count("SELECT COUNT(*) FROM campaigns").await, 0);
    }

    #[test]
    async fn send_log_page_far_past_the_end_is_empty() {
        let ctx = TestContext::new().await;
        let rows = ctx.recipients(None, &["ok@example.com"]).await;
        ctx.services
            .dispatcher
            .dispatch(
                &DispatchTarget::AdHoc {
                    sender: Actor("maria".to_string()),
                },
                &rows,
                &message(),
            )
            .await
            .unwrap();

        let log = ctx.services.send_log.list(None, u64::MAX, 500).await.unwrap();
        assert_eq!(log.total, 1);
        assert!(log.items.is_empty());
    }

    #[test]
    async fn suppressed_recipients_are_skipped() {
        let ctx = TestContext::new().await;
        let campaign = ctx.campaign("supresiones").await;
        let rows = ctx
            .recipients(
                Some(campaign.id),
                &["queja@example.com", "baja@example.com", "ok@example.com"],
            )
            .await;
        ctx.services
            .suppressions
            .upsert("QUEJA@example.com", GLOBAL_SCOPE, "complaint")
            .await
            .unwrap();
        ctx.services
            .suppressions
            .upsert("baja@example.com", campaign.id, "unsubscribe")
            .await
            .unwrap();

        let result = ctx
            .services
            .dispatcher
            .dispatch(&DispatchTarget::Campaign(campaign.id), &rows, &message())
            .await
            .unwrap();

        assert_eq!(result.skipped, vec![rows[0].id, rows[1].id]);
        assert_eq!(result.successes, vec![rows[2].id]);
        assert_eq!(ctx.recipient(rows[0].id).await.status, RecipientStatus::Pending);
        let sent_to: Vec<String> = ctx.transport.sent().into_iter().map(|e| e.to).collect();
        assert_eq!(sent_to, vec!["ok@example.com".to_string()]);
    }
}
