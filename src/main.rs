use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use actix_web::{App, HttpServer};
use anyhow::{Context, Result};
use dotenv::dotenv;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};

use crate::app::AppServices;
use crate::config::app_config::AppConfig;
use crate::logger::init_logger;
use crate::services::email_service::{LogTransport, MailTransport, SmtpTransport};

mod app;
mod config;
mod handlers;
mod logger;
mod models;
mod services;
#[cfg(test)]
mod tests;

async fn setup_database(config: &AppConfig) -> Result<Pool<Sqlite>> {
    // Crear la carpeta del archivo SQLite si hace falta (p.ej. "data/")
    if let Some(path) = config
        .database_url
        .strip_prefix("sqlite:")
        .filter(|p| !p.starts_with(":memory:"))
    {
        let path = path.trim_start_matches("//");
        if let Some(parent) = std::path::Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("No se pudo crear {}", parent.display()))?;
            }
        }
    }

    log::info!("Conectando a SQLite en {}", config.database_url);

    let options = SqliteConnectOptions::from_str(&config.database_url)?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .foreign_keys(true)
        .busy_timeout(Duration::from_secs(5));

    let db_pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await
        .context("No se pudo conectar a la base de datos SQLite")?;

    sqlx::migrate!("./migrations")
        .run(&db_pool)
        .await
        .context("Fallo en migraciones")?;

    Ok(db_pool)
}

fn build_transport(config: &AppConfig) -> Result<Arc<dyn MailTransport>> {
    match &config.smtp {
        Some(smtp) => {
            log::info!("Transporte SMTP: {}:{}", smtp.host, smtp.port);
            Ok(Arc::new(SmtpTransport::new(smtp)?))
        }
        None => {
            log::warn!("SMTP_HOST no definido; los correos solo se registran en el log");
            Ok(Arc::new(LogTransport))
        }
    }
}

#[actix_web::main]
async fn main() -> Result<()> {
    dotenv().ok(); // Cargar .env al inicio
    init_logger();

    let config = AppConfig::from_env();
    let db_pool = setup_database(&config).await?;
    let transport = build_transport(&config)?;
    let services = AppServices::new(db_pool, transport, &config);

    log::info!("Levantando servidor en {}:{}", config.bind_addr, config.port);
    HttpServer::new(move || {
        let services = services.clone();
        App::new()
            .configure(|cfg| services.register(cfg))
            .configure(app::init_app)
    })
    .workers(config.workers)
    .bind((config.bind_addr.as_str(), config.port))?
    .run()
    .await?;

    Ok(())
}
