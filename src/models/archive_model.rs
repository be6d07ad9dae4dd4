//! models/archive_model.rs
//! Selector y resultado del archivado (copiar a tablas sombra y borrar).

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveSelector {
    Recipient(i64),
    Campaign(i64),
    All,
}

impl ArchiveSelector {
    /// Filtro sobre `recipients` (sin alias) y el id a enlazar, si lo hay.
    pub(crate) fn recipient_filter(&self) -> (&'static str, Option<i64>) {
        match self {
            ArchiveSelector::Recipient(id) => ("id = ?", Some(*id)),
            ArchiveSelector::Campaign(id) => ("campaign_id = ?", Some(*id)),
            ArchiveSelector::All => ("1 = 1", None),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ArchiveOutcome {
    pub archived_recipients: u64,
    pub archived_send_attempts: u64,
    pub archived_click_events: u64,
    pub deleted_recipients: u64,
    /// `true` cuando el selector no encontró filas.
    pub nothing_to_delete: bool,
}
