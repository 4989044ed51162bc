//! Persistence contract consumed by the board reconciler.
//!
//! # Responsibility
//! - Define the async CRUD + status-patch surface every backend provides.
//! - Carry transport/storage failures as one error type.
//!
//! # Invariants
//! - A backend never mutates reconciler state; it only reports results.
//! - `list` returns notes in backend order; the reconciler keeps that order.

use crate::db::DbError;
use crate::model::note::{Note, NoteDraft, NoteId, NoteStatus};
use async_trait::async_trait;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type BackendResult<T> = Result<T, BackendError>;

/// Failure reported by a persistence backend.
#[derive(Debug)]
pub enum BackendError {
    /// Remote API answered with a non-success status.
    Http { status: u16, body: String },
    /// Request never produced a response (connect, timeout, TLS).
    Transport(String),
    /// Response or stored payload could not be decoded.
    Decode(String),
    /// Local storage failure.
    Storage(DbError),
    /// Backend does not know the referenced note.
    NotFound(NoteId),
}

impl Display for BackendError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Http { status, body } if body.trim().is_empty() => {
                write!(f, "request failed ({status})")
            }
            Self::Http { status, body } => write!(f, "request failed ({status}) {}", body.trim()),
            Self::Transport(message) => write!(f, "backend unreachable: {message}"),
            Self::Decode(message) => write!(f, "invalid backend payload: {message}"),
            Self::Storage(err) => write!(f, "{err}"),
            Self::NotFound(id) => write!(f, "backend has no note {id}"),
        }
    }
}

impl Error for BackendError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Storage(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for BackendError {
    fn from(value: DbError) -> Self {
        Self::Storage(value)
    }
}

impl From<rusqlite::Error> for BackendError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Storage(DbError::Sqlite(value))
    }
}

/// Async persistence surface behind the board.
///
/// Implemented by the local SQLite key-value store and by the remote
/// notes API client.
#[async_trait]
pub trait NoteBackend: Send + Sync {
    /// Fetches the full note list.
    async fn list(&self) -> BackendResult<Vec<Note>>;

    /// Persists one new `todo` note built from a validated draft.
    async fn create(&self, draft: &NoteDraft) -> BackendResult<Note>;

    /// Replaces title and content of one note.
    async fn update(&self, id: &NoteId, draft: &NoteDraft) -> BackendResult<Note>;

    /// Moves one note to another column.
    async fn update_status(&self, id: &NoteId, status: NoteStatus) -> BackendResult<Note>;

    /// Deletes one note.
    async fn delete(&self, id: &NoteId) -> BackendResult<()>;
}

#[async_trait]
impl<B: NoteBackend + ?Sized> NoteBackend for std::sync::Arc<B> {
    async fn list(&self) -> BackendResult<Vec<Note>> {
        (**self).list().await
    }

    async fn create(&self, draft: &NoteDraft) -> BackendResult<Note> {
        (**self).create(draft).await
    }

    async fn update(&self, id: &NoteId, draft: &NoteDraft) -> BackendResult<Note> {
        (**self).update(id, draft).await
    }

    async fn update_status(&self, id: &NoteId, status: NoteStatus) -> BackendResult<Note> {
        (**self).update_status(id, status).await
    }

    async fn delete(&self, id: &NoteId) -> BackendResult<()> {
        (**self).delete(id).await
    }
}
