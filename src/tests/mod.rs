//! tests/mod.rs
//! Utilidades compartidas por las pruebas: DB en memoria y transporte guionado.

mod dispatch_tests;
mod tracking_tests;

use std::collections::HashSet;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};

use crate::app::AppServices;
use crate::config::app_config::AppConfig;
use crate::models::campaign_model::{CampaignRecord, CreateCampaignRequest};
use crate::models::email_model::{ComposedMessage, OutboundEmail};
use crate::models::recipient_model::RecipientRecord;
use crate::services::email_service::{MailTransport, TransportError};

pub const BASE_URL: &str = "https://track.example.com";
pub const DEFAULT_REDIRECT: &str = "https://example.com/";

/// Una sola conexión: cada pool en memoria es una DB distinta y debe vivir
/// mientras dure la prueba.
pub async fn test_pool() -> Pool<Sqlite> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")
        .expect("url válida")
        .foreign_keys(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await
        .expect("sqlite en memoria");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("migraciones");
    pool
}

pub fn test_config() -> AppConfig {
    AppConfig {
        public_base_url: BASE_URL.to_string(),
        default_redirect_url: DEFAULT_REDIRECT.to_string(),
        ..AppConfig::default()
    }
}

/// Transporte que falla para las direcciones indicadas y guarda lo enviado.
#[derive(Default)]
pub struct ScriptedTransport {
    failing: HashSet<String>,
    pub sent: Mutex<Vec<OutboundEmail>>,
}

impl ScriptedTransport {
    pub fn failing_for(emails: &[&str]) -> Self {
        Self {
            failing: emails.iter().map(|e| e.to_string()).collect(),
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn sent(&self) -> Vec<OutboundEmail> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl MailTransport for ScriptedTransport {
    async fn send(&self, email: &OutboundEmail) -> Result<(), TransportError> {
        if self.failing.contains(&email.to) {
            return Err(TransportError::Smtp(format!("550 rejected {}", email.to)));
        }
        self.sent.lock().unwrap().push(email.clone());
        Ok(())
    }
}

pub struct TestContext {
    pub pool: Pool<Sqlite>,
    pub services: AppServices,
    pub transport: Arc<ScriptedTransport>,
}

impl TestContext {
    pub async fn new() -> Self {
        Self::with_transport(ScriptedTransport::default()).await
    }

    pub async fn with_transport(transport: ScriptedTransport) -> Self {
        Self::with_config(transport, test_config()).await
    }

    pub async fn with_config(transport: ScriptedTransport, config: AppConfig) -> Self {
        let pool = test_pool().await;
        let transport = Arc::new(transport);
        let services = AppServices::new(pool.clone(), transport.clone(), &config);
        Self {
            pool,
            services,
            transport,
        }
    }

    pub async fn campaign(&self, name: &str) -> CampaignRecord {
        self.services
            .campaigns
            .create_campaign(CreateCampaignRequest {
                name: name.to_string(),
                subject: Some("Novedades".to_string()),
                scheduled_at: None,
            })
            .await
            .expect("crear campaña")
    }

    pub async fn recipients(&self, campaign_id: Option<i64>, emails: &[&str]) -> Vec<RecipientRecord> {
        let emails: Vec<String> = emails.iter().map(|e| e.to_string()).collect();
        self.services
            .recipients
            .add_recipients(campaign_id, &emails)
            .await
            .expect("crear destinatarios")
    }

    pub async fn recipient(&self, id: i64) -> RecipientRecord {
        self.services
            .recipients
            .get_recipient(id)
            .await
            .expect("leer destinatario")
    }

    pub async fn count(&self, sql: &str) -> i64 {
        sqlx::query_scalar::<_, i64>(sql)
            .fetch_one(&self.pool)
            .await
            .expect("consulta de conteo")
    }
}

pub fn message() -> ComposedMessage {
    ComposedMessage {
        subject: "Novedades de octubre".to_string(),
        body: r#"<p>Hola {{email}}</p><a href="https://shop.example.com/oferta">Ver</a>
<a href="{{unsubscribe_url}}">Darse de baja</a>"#
            .to_string(),
        from_name: "Tienda".to_string(),
        from_email: "news@example.com".to_string(),
        cc: vec![],
        bcc: vec![],
    }
}
