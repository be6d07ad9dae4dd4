//! services/email_service.rs
//! Transporte de salida: el despachador solo conoce `MailTransport::send`.

use std::time::Duration;

use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox, MultiPart, SinglePart},
    transport::smtp::{
        authentication::Credentials,
        client::{Tls, TlsParameters},
    },
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};

use crate::config::app_config::SmtpConfig;
use crate::models::email_model::OutboundEmail;

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("dirección inválida: {0}")]
    InvalidAddress(String),
    #[error("no se pudo construir el mensaje: {0}")]
    Message(String),
    #[error("error SMTP: {0}")]
    Smtp(String),
    #[error("tiempo de espera agotado tras {0}s")]
    Timeout(u64),
}

#[async_trait]
pub trait MailTransport: Send + Sync {
    /// Envía un correo a un destinatario. Cualquier `Err` es un fallo de ese
    /// destinatario, nunca del lote.
    async fn send(&self, email: &OutboundEmail) -> Result<(), TransportError>;
}

/// SMTP con TLS obligatorio y timeout por envío.
#[derive(Clone)]
pub struct SmtpTransport {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    timeout: Duration,
}

impl SmtpTransport {
    pub fn new(cfg: &SmtpConfig) -> anyhow::Result<Self> {
        let tls_params = TlsParameters::new(cfg.host.clone())?;
        let mailer = AsyncSmtpTransport::<Tokio1Executor>::relay(&cfg.host)?
            .port(cfg.port)
            .credentials(Credentials::new(cfg.user.clone(), cfg.pass.clone()))
            .tls(Tls::Required(tls_params))
            .build();

        Ok(Self {
            mailer,
            timeout: Duration::from_secs(cfg.timeout_secs),
        })
    }
}

#[async_trait]
impl MailTransport for SmtpTransport {
    async fn send(&self, email: &OutboundEmail) -> Result<(), TransportError> {
        let message = build_message(email)?;

        match tokio::time::timeout(self.timeout, self.mailer.send(message)).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(TransportError::Smtp(e.to_string())),
            Err(_) => Err(TransportError::Timeout(self.timeout.as_secs())),
        }
    }
}

/// Construye el `Message` de lettre. Falla con `InvalidAddress` ante cualquier
/// dirección que no se pueda parsear.
pub fn build_message(email: &OutboundEmail) -> Result<Message, TransportError> {
    let from: Mailbox = format!("{} <{}>", email.from_name, email.from_email)
        .parse()
        .map_err(|_| TransportError::InvalidAddress(email.from_email.clone()))?;
    let to: Mailbox = email
        .to
        .parse()
        .map_err(|_| TransportError::InvalidAddress(email.to.clone()))?;

    let mut builder = Message::builder().from(from).to(to).subject(&email.subject);
    for cc in &email.cc {
        let mailbox: Mailbox = cc
            .parse()
            .map_err(|_| TransportError::InvalidAddress(cc.clone()))?;
        builder = builder.cc(mailbox);
    }
    for bcc in &email.bcc {
        let mailbox: Mailbox = bcc
            .parse()
            .map_err(|_| TransportError::InvalidAddress(bcc.clone()))?;
        builder = builder.bcc(mailbox);
    }

    let html_part = SinglePart::builder()
        .header(ContentType::TEXT_HTML)
        .body(email.body.clone());

    builder
        .multipart(MultiPart::mixed().singlepart(html_part))
        .map_err(|e| TransportError::Message(e.to_string()))
}

/// Sin SMTP configurado: valida el mensaje, lo registra y da el envío por bueno.
#[derive(Debug, Clone)]
pub struct LogTransport;

#[async_trait]
impl MailTransport for LogTransport {
    async fn send(&self, email: &OutboundEmail) -> Result<(), TransportError> {
        build_message(email)?;
        log::info!(
            "(LogTransport) Envío omitido: to={} subject={:?}",
            email.to,
            email.subject
        );
        Ok(())
    }
}
