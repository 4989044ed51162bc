//! Core of the kanban note board.
//! Owns the note store, its persistence backends and its rendered columns.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;
pub mod view;

pub use config::{BackendKind, BoardConfig, ConfigError};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::note::{Note, NoteDraft, NoteId, NoteStatus, NoteValidationError};
pub use repo::backend::{BackendError, BackendResult, NoteBackend};
pub use repo::http_backend::HttpNoteBackend;
pub use repo::local_store::SqliteLocalStore;
pub use service::board::{BoardError, LoadOutcome, MoveOutcome, NoteBoard};
pub use view::board_view::{BoardView, CardView, ColumnView, Notice};
pub use view::escape::escape_html;

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
