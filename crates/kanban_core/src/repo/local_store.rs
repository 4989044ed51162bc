//! Local single-key note store on SQLite.
//!
//! # Responsibility
//! - Persist the whole note list as one JSON value under one key.
//! - Assign client-side ids for new notes.
//!
//! # Invariants
//! - An absent or unparsable value reads as an empty board, never an error.
//! - Every write replaces the whole value in one statement.
//! - Async calls run their SQLite work on the blocking pool, never on a
//!   runtime worker thread.

use crate::db::{open_db, open_db_in_memory, DbResult};
use crate::model::note::{Note, NoteDraft, NoteId, NoteStatus};
use crate::repo::backend::{BackendError, BackendResult, NoteBackend};
use async_trait::async_trait;
use log::{error, warn};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

/// Key that holds the serialized board.
pub const STORAGE_KEY: &str = "kanban_notes_v1";

/// SQLite-backed key-value note store.
pub struct SqliteLocalStore {
    conn: Arc<Mutex<Connection>>,
    key: Arc<str>,
}

impl SqliteLocalStore {
    /// Wraps a migrated connection, using the default storage key.
    pub fn new(conn: Connection) -> Self {
        Self::with_key(conn, STORAGE_KEY)
    }

    /// Wraps a migrated connection with a caller-chosen storage key.
    pub fn with_key(conn: Connection, key: impl Into<String>) -> Self {
        let key: String = key.into();
        Self {
            conn: Arc::new(Mutex::new(conn)),
            key: Arc::from(key),
        }
    }

    /// Opens (and migrates) a database file.
    pub fn open(path: impl AsRef<Path>) -> DbResult<Self> {
        Ok(Self::new(open_db(path)?))
    }

    /// Opens a throwaway in-memory store.
    pub fn open_in_memory() -> DbResult<Self> {
        Ok(Self::new(open_db_in_memory()?))
    }

    /// Reads the stored board; corruption reads as empty.
    pub fn read_all(&self) -> BackendResult<Vec<Note>> {
        let conn = lock_conn(&self.conn)?;
        read_notes(&conn, &self.key)
    }

    /// Drops every stored note.
    pub fn clear(&self) -> BackendResult<()> {
        let conn = lock_conn(&self.conn)?;
        conn.execute("DELETE FROM kv_store WHERE key = ?1;", [&*self.key])?;
        Ok(())
    }

    /// Runs `op` against the connection on the blocking pool.
    async fn run_blocking<T, F>(&self, op: F) -> BackendResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection, &str) -> BackendResult<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        let key = Arc::clone(&self.key);
        tokio::task::spawn_blocking(move || {
            let conn = lock_conn(&conn)?;
            op(&conn, &key)
        })
        .await
        .map_err(|err| {
            error!("event=local_task module=repo status=error error={err}");
            BackendError::Transport(format!("local store task failed: {err}"))
        })?
    }

    /// Read-modify-write under one lock acquisition.
    async fn mutate<T, F>(&self, apply: F) -> BackendResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Vec<Note>) -> BackendResult<T> + Send + 'static,
    {
        self.run_blocking(move |conn, key| {
            let mut notes = read_notes(conn, key)?;
            let result = apply(&mut notes)?;
            write_notes(conn, key, &notes)?;
            Ok(result)
        })
        .await
    }
}

#[async_trait]
impl NoteBackend for SqliteLocalStore {
    async fn list(&self) -> BackendResult<Vec<Note>> {
        self.run_blocking(read_notes).await
    }

    async fn create(&self, draft: &NoteDraft) -> BackendResult<Note> {
        let draft = draft.clone();
        self.mutate(move |notes| {
            let note = Note::from_draft(NoteId::generate(), draft);
            notes.push(note.clone());
            Ok(note)
        })
        .await
    }

    async fn update(&self, id: &NoteId, draft: &NoteDraft) -> BackendResult<Note> {
        let (id, draft) = (id.clone(), draft.clone());
        self.mutate(move |notes| {
            let note = find_mut(notes, &id)?;
            note.title = draft.title;
            note.content = draft.content;
            Ok(note.clone())
        })
        .await
    }

    async fn update_status(&self, id: &NoteId, status: NoteStatus) -> BackendResult<Note> {
        let id = id.clone();
        self.mutate(move |notes| {
            let note = find_mut(notes, &id)?;
            note.status = status;
            Ok(note.clone())
        })
        .await
    }

    async fn delete(&self, id: &NoteId) -> BackendResult<()> {
        let id = id.clone();
        self.mutate(move |notes| {
            let before = notes.len();
            notes.retain(|note| note.id != id);
            if notes.len() == before {
                return Err(BackendError::NotFound(id));
            }
            Ok(())
        })
        .await
    }
}

fn lock_conn(conn: &Mutex<Connection>) -> BackendResult<MutexGuard<'_, Connection>> {
    conn.lock()
        .map_err(|_| BackendError::Transport("local store lock poisoned".to_string()))
}

fn find_mut<'a>(notes: &'a mut [Note], id: &NoteId) -> BackendResult<&'a mut Note> {
    notes
        .iter_mut()
        .find(|note| &note.id == id)
        .ok_or_else(|| BackendError::NotFound(id.clone()))
}

fn read_notes(conn: &Connection, key: &str) -> BackendResult<Vec<Note>> {
    let raw: Option<String> = conn
        .query_row(
            "SELECT value FROM kv_store WHERE key = ?1;",
            [key],
            |row| row.get(0),
        )
        .optional()?;

    let Some(raw) = raw else {
        return Ok(Vec::new());
    };

    match serde_json::from_str::<Vec<Note>>(&raw) {
        Ok(notes) => Ok(notes),
        Err(err) => {
            warn!(
                "event=local_read module=repo status=corrupt key={key} bytes={} error={err}",
                raw.len()
            );
            Ok(Vec::new())
        }
    }
}

fn write_notes(conn: &Connection, key: &str, notes: &[Note]) -> BackendResult<()> {
    let payload =
        serde_json::to_string(notes).map_err(|err| BackendError::Decode(err.to_string()))?;
    conn.execute(
        "INSERT INTO kv_store (key, value, updated_at)
         VALUES (?1, ?2, strftime('%s', 'now') * 1000)
         ON CONFLICT(key) DO UPDATE SET
            value = excluded.value,
            updated_at = excluded.updated_at;",
        params![key, payload],
    )
    .map_err(|err| {
        error!("event=local_write module=repo status=error key={key} error={err}");
        BackendError::from(err)
    })?;
    Ok(())
}
