#![allow(dead_code)]

use async_trait::async_trait;
use kanban_core::{
    BackendError, BackendResult, Note, NoteBackend, NoteBoard, NoteDraft, NoteId, NoteStatus,
};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;
use tokio::sync::oneshot;

/// In-process backend with server-assigned integer ids, a call log, one-shot
/// failure injection and gates that hold responses until a test releases them.
#[derive(Default)]
pub struct ScriptedBackend {
    notes: Mutex<Vec<Note>>,
    next_id: Mutex<i64>,
    calls: Mutex<Vec<&'static str>>,
    failures: Mutex<HashMap<&'static str, BackendError>>,
    list_gates: Mutex<VecDeque<oneshot::Receiver<BackendResult<Vec<Note>>>>>,
    status_gates: Mutex<VecDeque<oneshot::Receiver<BackendResult<()>>>>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_notes(notes: Vec<Note>) -> Self {
        let backend = Self::default();
        *backend.next_id.lock().unwrap() = notes.len() as i64;
        *backend.notes.lock().unwrap() = notes;
        backend
    }

    pub fn server_notes(&self) -> Vec<Note> {
        self.notes.lock().unwrap().clone()
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Makes the next call of `op` fail with `err`.
    pub fn fail_next(&self, op: &'static str, err: BackendError) {
        self.failures.lock().unwrap().insert(op, err);
    }

    /// Holds the next `list` until the returned sender fires.
    pub fn gate_list(&self) -> oneshot::Sender<BackendResult<Vec<Note>>> {
        let (tx, rx) = oneshot::channel();
        self.list_gates.lock().unwrap().push_back(rx);
        tx
    }

    /// Holds the next `update_status` until the returned sender fires.
    pub fn gate_status(&self) -> oneshot::Sender<BackendResult<()>> {
        let (tx, rx) = oneshot::channel();
        self.status_gates.lock().unwrap().push_back(rx);
        tx
    }

    fn record(&self, op: &'static str) -> BackendResult<()> {
        self.calls.lock().unwrap().push(op);
        match self.failures.lock().unwrap().remove(op) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl NoteBackend for ScriptedBackend {
    async fn list(&self) -> BackendResult<Vec<Note>> {
        self.record("list")?;
        let gate = self.list_gates.lock().unwrap().pop_front();
        if let Some(gate) = gate {
            return gate
                .await
                .unwrap_or_else(|_| Err(BackendError::Transport("gate dropped".to_string())));
        }
        Ok(self.server_notes())
    }

    async fn create(&self, draft: &NoteDraft) -> BackendResult<Note> {
        self.record("create")?;
        let id = {
            let mut next = self.next_id.lock().unwrap();
            *next += 1;
            *next
        };
        let note = Note {
            id: NoteId::from(id),
            title: draft.title.clone(),
            content: draft.content.clone(),
            status: NoteStatus::Todo,
            created_at: Some("2026-01-01T00:00:00.000Z".to_string()),
        };
        self.notes.lock().unwrap().push(note.clone());
        Ok(note)
    }

    async fn update(&self, id: &NoteId, draft: &NoteDraft) -> BackendResult<Note> {
        self.record("update")?;
        let mut notes = self.notes.lock().unwrap();
        let note = notes
            .iter_mut()
            .find(|note| &note.id == id)
            .ok_or_else(|| BackendError::NotFound(id.clone()))?;
        note.title = draft.title.clone();
        note.content = draft.content.clone();
        Ok(note.clone())
    }

    async fn update_status(&self, id: &NoteId, status: NoteStatus) -> BackendResult<Note> {
        self.record("status")?;
        let gate = self.status_gates.lock().unwrap().pop_front();
        if let Some(gate) = gate {
            gate.await
                .unwrap_or_else(|_| Err(BackendError::Transport("gate dropped".to_string())))?;
        }
        let mut notes = self.notes.lock().unwrap();
        let note = notes
            .iter_mut()
            .find(|note| &note.id == id)
            .ok_or_else(|| BackendError::NotFound(id.clone()))?;
        note.status = status;
        Ok(note.clone())
    }

    async fn delete(&self, id: &NoteId) -> BackendResult<()> {
        self.record("delete")?;
        let mut notes = self.notes.lock().unwrap();
        let before = notes.len();
        notes.retain(|note| &note.id != id);
        if notes.len() == before {
            return Err(BackendError::NotFound(id.clone()));
        }
        Ok(())
    }
}

pub fn note(id: &str, title: &str, status: NoteStatus) -> Note {
    Note {
        id: NoteId::new(id),
        title: title.to_string(),
        content: String::new(),
        status,
        created_at: None,
    }
}

pub fn server_error() -> BackendError {
    BackendError::Http {
        status: 500,
        body: "boom".to_string(),
    }
}

/// Asserts the view shows exactly the stored ids, each in its status column.
pub fn assert_converged<B: NoteBackend>(board: &NoteBoard<B>) {
    let notes = board.notes();
    let view = board.view();

    let stored: HashSet<NoteId> = notes.iter().map(|note| note.id.clone()).collect();
    let rendered_ids = view.card_ids();
    let rendered: HashSet<NoteId> = rendered_ids.iter().cloned().collect();
    assert_eq!(rendered.len(), rendered_ids.len(), "duplicate cards rendered");
    assert_eq!(stored, rendered, "view and store disagree on ids");

    for note in &notes {
        assert_eq!(
            view.column_of(&note.id),
            Some(note.status),
            "card {} is in the wrong column",
            note.id
        );
    }
    for status in NoteStatus::ALL {
        let column = view.column(status);
        let expected = notes.iter().filter(|note| note.status == status).count();
        assert_eq!(column.count(), expected, "count badge of {status}");
        assert_eq!(column.cards().len(), expected, "cards in {status}");
        assert_eq!(column.shows_placeholder(), expected == 0, "placeholder of {status}");
    }
}
