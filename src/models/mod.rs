//! models/mod.rs
//! Módulo raíz para modelos/estructuras compartidas.

pub mod archive_model;
pub mod campaign_model;
pub mod email_model;
pub mod recipient_model;
pub mod send_log_model;
pub mod webhook_model;

/// Valor de `status` en DB que no corresponde a ningún estado conocido.
#[derive(Debug, thiserror::Error)]
#[error("estado desconocido: {0}")]
pub struct UnknownStatus(pub String);
