//! config/app_config.rs
//! Configuración global del servicio, leída de variables de entorno (.env).

use std::env;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Credenciales SMTP. Si no hay `SMTP_HOST` se usa el transporte de log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    #[serde(skip_serializing)]
    pub pass: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub bind_addr: String,
    pub port: u16,
    pub workers: usize,
    pub database_url: String,
    /// Base para los enlaces de seguimiento y baja, sin "/" final.
    pub public_base_url: String,
    /// Destino de los clics con URL ausente o inválida.
    pub default_redirect_url: String,
    /// Antigüedad máxima del token de baja. `None`: no caduca.
    pub unsubscribe_token_max_age_secs: Option<i64>,
    pub smtp: Option<SmtpConfig>,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            bind_addr: "0.0.0.0".to_string(),
            port: 5022,
            workers: 1,
            database_url: "sqlite:data/campaigns.db".to_string(),
            public_base_url: "http://localhost:5022".to_string(),
            default_redirect_url: "/".to_string(),
            unsubscribe_token_max_age_secs: None,
            smtp: None,
        }
    }
}

impl AppConfig {
    /// Lee la configuración del entorno; lo que falte toma el valor por defecto.
    pub fn from_env() -> Self {
        let defaults = AppConfig::default();

        let smtp = env::var("SMTP_HOST")
            .ok()
            .filter(|h| !h.trim().is_empty())
            .map(|host| SmtpConfig {
                host,
                port: parse_var("SMTP_PORT").unwrap_or(587),
                user: env::var("SMTP_USER").unwrap_or_default(),
                pass: env::var("SMTP_PASS").unwrap_or_default(),
                timeout_secs: parse_var("SMTP_TIMEOUT_SECS").unwrap_or(30),
            });

        AppConfig {
            bind_addr: env::var("BIND_ADDR").unwrap_or(defaults.bind_addr),
            port: parse_var("PORT").unwrap_or(defaults.port),
            workers: parse_var("HTTP_WORKERS").unwrap_or(defaults.workers),
            database_url: env::var("DATABASE_URL").unwrap_or(defaults.database_url),
            public_base_url: env::var("PUBLIC_BASE_URL")
                .map(|u| u.trim_end_matches('/').to_string())
                .unwrap_or(defaults.public_base_url),
            default_redirect_url: env::var("DEFAULT_REDIRECT_URL")
                .unwrap_or(defaults.default_redirect_url),
            unsubscribe_token_max_age_secs: parse_var("UNSUBSCRIBE_TOKEN_MAX_AGE_SECS")
                .filter(|secs: &i64| *secs > 0),
            smtp,
        }
    }
}

fn parse_var<T: FromStr>(key: &str) -> Option<T> {
    match env::var(key) {
        Ok(raw) => match raw.trim().parse() {
            Ok(value) => Some(value),
            Err(_) => {
                log::warn!("Valor inválido para {}: {:?}; se usa el valor por defecto", key, raw);
                None
            }
        },
        Err(_) => None,
    }
}
