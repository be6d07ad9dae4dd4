//! services/mod.rs
//! Módulo que agrupa distintos "servicios" o "capas de negocio" de la app.

pub mod archive_service;
pub mod campaign_service;
pub mod dispatch_service;
pub mod email_service;
pub mod recipient_service;
pub mod send_log_service;
pub mod suppression_service;
pub mod token_service;
pub mod tracking_service;
pub mod webhook_service;

/// Errores que los handlers necesitan distinguir (404 / 400 frente a 500).
/// Viajan dentro de `anyhow::Error`; se recuperan con `downcast_ref`.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("{0} not found")]
    NotFound(String),
    #[error("invalid request: {0}")]
    Invalid(String),
}
