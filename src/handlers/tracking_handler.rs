//! handlers/tracking_handler.rs
//! Endpoints públicos de seguimiento. Nunca devuelven error al cliente: el
//! píxel siempre es un GIF, el clic siempre redirige y la baja siempre
//! muestra una página.

use actix_web::{http::header, web, HttpResponse};
use serde::Deserialize;

use crate::services::tracking_service::{TrackingService, UnsubscribeOutcome};

/// GIF transparente de 1x1.
pub const TRANSPARENT_GIF: [u8; 43] = [
    0x47, 0x49, 0x46, 0x38, 0x39, 0x61, 0x01, 0x00, 0x01, 0x00, 0x80, 0x00, 0x00, 0x00, 0x00,
    0x00, 0xFF, 0xFF, 0xFF, 0x21, 0xF9, 0x04, 0x01, 0x00, 0x00, 0x00, 0x00, 0x2C, 0x00, 0x00,
    0x00, 0x00, 0x01, 0x00, 0x01, 0x00, 0x00, 0x02, 0x02, 0x44, 0x01, 0x00, 0x3B,
];

#[derive(Deserialize)]
pub struct ClickQuery {
    url: Option<String>,
}

/// GET /track/open/{tracking_id}
pub async fn open_pixel_endpoint(
    tracking: web::Data<TrackingService>,
    path: web::Path<String>,
) -> HttpResponse {
    let tracking_id = path.into_inner();
    match tracking.record_open(&tracking_id).await {
        Ok(true) => {}
        Ok(false) => log::debug!("(open) tracking_id desconocido: {}", tracking_id),
        Err(e) => log::error!("(open) Error registrando apertura: {:?}", e),
    }

    HttpResponse::Ok()
        .content_type("image/gif")
        .append_header((header::CACHE_CONTROL, "no-store, no-cache, must-revalidate, max-age=0"))
        .append_header((header::PRAGMA, "no-cache"))
        .body(TRANSPARENT_GIF.to_vec())
}

/// GET /track/click/{tracking_id}?url=...
pub async fn click_redirect_endpoint(
    tracking: web::Data<TrackingService>,
    path: web::Path<String>,
    query: web::Query<ClickQuery>,
) -> HttpResponse {
    let location = tracking
        .record_click(&path.into_inner(), query.url.as_deref())
        .await;

    HttpResponse::Found()
        .append_header((header::LOCATION, location))
        .append_header((header::CACHE_CONTROL, "no-store"))
        .finish()
}

/// GET /unsubscribe/{token}
pub async fn unsubscribe_endpoint(
    tracking: web::Data<TrackingService>,
    path: web::Path<String>,
) -> HttpResponse {
    let page = match tracking.unsubscribe(&path.into_inner()).await {
        Ok(UnsubscribeOutcome::Unsubscribed { email, .. }) => success_page(&email),
        Ok(UnsubscribeOutcome::InvalidToken) => failure_page(),
        Ok(UnsubscribeOutcome::Expired) => failure_page(),
        Err(e) => {
            log::error!("(unsubscribe) Error procesando baja: {:?}", e);
            failure_page()
        }
    };

    HttpResponse::Ok()
        .content_type("text/html; charset=utf-8")
        .body(page)
}

fn success_page(email: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html><head><meta charset="utf-8"><title>Unsubscribed</title></head>
<body><h1>You have been unsubscribed</h1>
<p>{} will no longer receive emails from this campaign.</p></body></html>"#,
        escape_html(email)
    )
}

fn failure_page() -> String {
    r#"<!DOCTYPE html>
<html><head><meta charset="utf-8"><title>Unsubscribe</title></head>
<body><h1>We could not process your request</h1>
<p>This unsubscribe link is invalid or has expired.</p></body></html>"#
        .to_string()
}

fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}
