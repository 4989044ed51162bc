//! Note store reconciler.
//!
//! # Responsibility
//! - Own the canonical in-memory note list for one board session.
//! - Persist every mutation through a `NoteBackend` and patch the view after.
//! - Apply column moves optimistically and resynchronize on failure.
//!
//! # Invariants
//! - After every completed operation the view shows exactly the stored ids,
//!   each in the column of its `status`.
//! - Only the most recently issued `load` may commit.
//! - At most one move per note is in flight.
//! - A committed load never undoes a move the backend confirmed after that
//!   load was issued.
//! - The state lock is never held across an await.

use crate::model::note::{Note, NoteDraft, NoteId, NoteStatus, NoteValidationError};
use crate::repo::backend::{BackendError, NoteBackend};
use crate::view::board_view::{BoardView, Notice};
use log::{debug, error, info, warn};
use std::collections::HashSet;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Instant;

/// Error for board operations.
#[derive(Debug)]
pub enum BoardError {
    /// Input rejected before any persistence call.
    Validation(NoteValidationError),
    /// Operation referenced an id the board does not hold.
    NotFound(NoteId),
    /// Backend read/write failed; board state is unchanged.
    Persistence(BackendError),
    /// Status move was not confirmed and has been undone.
    MoveRolledBack { id: NoteId, source: BackendError },
}

impl Display for BoardError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::NotFound(id) => write!(f, "note not found: {id}"),
            Self::Persistence(err) => write!(f, "{err}"),
            Self::MoveRolledBack { id, source } => {
                write!(f, "move of note {id} was rolled back: {source}")
            }
        }
    }
}

impl Error for BoardError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::NotFound(_) => None,
            Self::Persistence(err) => Some(err),
            Self::MoveRolledBack { source, .. } => Some(source),
        }
    }
}

impl From<NoteValidationError> for BoardError {
    fn from(value: NoteValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<BackendError> for BoardError {
    fn from(value: BackendError) -> Self {
        match value {
            BackendError::NotFound(id) => Self::NotFound(id),
            other => Self::Persistence(other),
        }
    }
}

/// Result of a `load` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// The fetched list replaced the board.
    Applied { count: usize },
    /// A newer load was issued meanwhile; this result was discarded.
    Superseded,
}

/// Result of a `move_status` call that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveOutcome {
    /// Moved and confirmed by the backend.
    Moved,
    /// Target equals current status; nothing happened.
    Unchanged,
    /// Another move of the same note is awaiting confirmation; nothing happened.
    Busy,
}

struct BoardState {
    notes: Vec<Note>,
    view: BoardView,
    load_token: u64,
    moves_in_flight: HashSet<NoteId>,
    /// Moves confirmed since the last committed load, newest per note.
    confirmed_moves: Vec<ConfirmedMove>,
}

/// A backend-confirmed status, stamped with the load token current at the
/// time of confirmation.
struct ConfirmedMove {
    id: NoteId,
    status: NoteStatus,
    load_token: u64,
}

/// Board session: in-memory notes, their view, and the backend behind them.
///
/// Create/update/remove are not serialized against each other; callers that
/// allow concurrent invocation may observe them interleave.
pub struct NoteBoard<B: NoteBackend> {
    backend: B,
    state: Mutex<BoardState>,
}

impl<B: NoteBackend> NoteBoard<B> {
    /// Creates an empty board; call `load` to fill it.
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            state: Mutex::new(BoardState {
                notes: Vec::new(),
                view: BoardView::new(),
                load_token: 0,
                moves_in_flight: HashSet::new(),
                confirmed_moves: Vec::new(),
            }),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Snapshot of the note list in insertion order.
    pub fn notes(&self) -> Vec<Note> {
        self.state().notes.clone()
    }

    pub fn get(&self, id: &NoteId) -> Option<Note> {
        self.state().notes.iter().find(|note| &note.id == id).cloned()
    }

    /// Snapshot of the rendered view.
    pub fn view(&self) -> BoardView {
        self.state().view.clone()
    }

    pub fn render_html(&self) -> String {
        self.state().view.to_html()
    }

    /// Number of notes per column, in display order.
    pub fn column_counts(&self) -> [(NoteStatus, usize); 3] {
        let state = self.state();
        NoteStatus::ALL.map(|status| {
            let count = state.notes.iter().filter(|note| note.status == status).count();
            (status, count)
        })
    }

    pub fn notices(&self) -> Vec<Notice> {
        self.state().view.notices().to_vec()
    }

    pub fn dismiss_notice(&self, notice_id: u64) -> bool {
        self.state().view.dismiss_notice(notice_id)
    }

    /// Fetches the full list and re-renders the board.
    ///
    /// # Errors
    /// - `Persistence` when the backend fails; the previous board stays.
    pub async fn load(&self) -> Result<LoadOutcome, BoardError> {
        self.fetch_and_commit()
            .await
            .map_err(|err| self.persistence_failed("load", err))
    }

    /// Creates a `todo` note.
    ///
    /// # Errors
    /// - `Validation` on blank or overlong title; nothing is persisted.
    /// - `Persistence` when the backend rejects the write.
    pub async fn create(&self, title: &str, content: &str) -> Result<Note, BoardError> {
        let draft = parse_draft(title, content, "create")?;
        let note = self
            .backend
            .create(&draft)
            .await
            .map_err(|err| self.persistence_failed("create", err))?;

        let mut state = self.state();
        let BoardState { notes, view, .. } = &mut *state;
        match notes.iter_mut().find(|existing| existing.id == note.id) {
            Some(existing) => {
                warn!(
                    "event=state_desync module=board op=create id={} reason=id_already_present",
                    note.id
                );
                *existing = note.clone();
            }
            None => notes.push(note.clone()),
        }
        view.place_card(&note, notes);
        view.refresh_column_state(notes);
        info!(
            "event=note_create module=board status=ok id={} total={}",
            note.id,
            notes.len()
        );
        Ok(note)
    }

    /// Replaces title and content of a note; its column is untouched.
    ///
    /// # Errors
    /// - `NotFound` when the board does not hold `id`.
    /// - `Validation` on blank or overlong title.
    /// - `Persistence` when the backend rejects the write.
    pub async fn update(&self, id: &NoteId, title: &str, content: &str) -> Result<Note, BoardError> {
        self.require_known(id, "update")?;
        let draft = parse_draft(title, content, "update")?;
        let saved = self
            .backend
            .update(id, &draft)
            .await
            .map_err(|err| self.persistence_failed("update", err))?;

        let mut state = self.state();
        let BoardState { notes, view, .. } = &mut *state;
        let Some(note) = notes.iter_mut().find(|note| &note.id == id) else {
            warn!("event=state_desync module=board op=update id={id} reason=removed_while_saving");
            return Err(BoardError::NotFound(id.clone()));
        };
        note.title = saved.title;
        note.content = saved.content;
        let note = note.clone();

        if view.card(id).is_some() {
            view.update_card_text(id, &note.title, &note.content);
        } else {
            warn!("event=state_desync module=board op=update id={id} reason=card_missing");
            view.place_card(&note, notes);
            view.refresh_column_state(notes);
        }
        info!("event=note_update module=board status=ok id={id}");
        Ok(note)
    }

    /// Deletes a note from the backend, the board and the view.
    ///
    /// # Errors
    /// - `NotFound` when the board does not hold `id`.
    /// - `Persistence` when the backend rejects the delete.
    pub async fn remove(&self, id: &NoteId) -> Result<(), BoardError> {
        self.require_known(id, "remove")?;
        match self.backend.delete(id).await {
            Ok(()) => {}
            Err(BackendError::NotFound(_)) => {
                warn!("event=state_desync module=board op=remove id={id} reason=backend_missing");
            }
            Err(err) => return Err(self.persistence_failed("remove", err)),
        }

        let mut state = self.state();
        let BoardState { notes, view, .. } = &mut *state;
        notes.retain(|note| &note.id != id);
        view.remove_card(id);
        view.refresh_column_state(notes);
        info!(
            "event=note_remove module=board status=ok id={id} total={}",
            notes.len()
        );
        Ok(())
    }

    /// Moves a note to another column, optimistically.
    ///
    /// The view changes before the backend confirms. On failure the board is
    /// resynchronized from the backend (or, if that is impossible, the old
    /// status is restored locally), a notice is queued and
    /// `MoveRolledBack` is returned. Nothing is retried.
    ///
    /// # Errors
    /// - `NotFound` when the board does not hold `id`.
    /// - `MoveRolledBack` when the backend rejected the move.
    pub async fn move_status(
        &self,
        id: &NoteId,
        new_status: NoteStatus,
    ) -> Result<MoveOutcome, BoardError> {
        let (previous, guard) = {
            let mut state = self.state();
            let BoardState {
                notes,
                view,
                moves_in_flight,
                ..
            } = &mut *state;

            if moves_in_flight.contains(id) {
                warn!("event=note_move module=board status=busy id={id} target={new_status}");
                return Ok(MoveOutcome::Busy);
            }
            let Some(note) = notes.iter_mut().find(|note| &note.id == id) else {
                warn!("event=state_desync module=board op=move id={id} reason=not_in_store");
                return Err(BoardError::NotFound(id.clone()));
            };
            let previous = note.status;
            if previous == new_status {
                debug!("event=note_move module=board status=unchanged id={id}");
                return Ok(MoveOutcome::Unchanged);
            }

            note.status = new_status;
            let note = note.clone();
            view.place_card(&note, notes);
            view.refresh_column_state(notes);
            moves_in_flight.insert(id.clone());
            (previous, MoveGuard::new(&self.state, id.clone()))
        };

        let started_at = Instant::now();
        let result = self.backend.update_status(id, new_status).await;
        match result {
            Ok(confirmed) => {
                self.settle_confirmed(&confirmed);
                drop(guard);
                info!(
                    "event=note_move module=board status=ok id={id} from={previous} to={new_status} duration_ms={}",
                    started_at.elapsed().as_millis()
                );
                Ok(MoveOutcome::Moved)
            }
            Err(err) => {
                warn!(
                    "event=note_move module=board status=rollback id={id} from={previous} to={new_status} error={err}"
                );
                self.roll_back_move(id, previous, new_status).await;
                self.state().view.push_notice(format!("Move failed: {err}"));
                drop(guard);
                Err(BoardError::MoveRolledBack {
                    id: id.clone(),
                    source: err,
                })
            }
        }
    }

    fn state(&self) -> MutexGuard<'_, BoardState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn fetch_and_commit(&self) -> Result<LoadOutcome, BackendError> {
        let token = {
            let mut state = self.state();
            state.load_token += 1;
            state.load_token
        };
        let started_at = Instant::now();
        debug!("event=board_load module=board status=start token={token}");

        let result = self.backend.list().await;

        let mut state = self.state();
        if token != state.load_token {
            warn!(
                "event=board_load module=board status=stale token={token} latest={}",
                state.load_token
            );
            return Ok(LoadOutcome::Superseded);
        }
        let fetched = result?;

        let BoardState {
            notes,
            view,
            confirmed_moves,
            ..
        } = &mut *state;
        *notes = dedupe_by_id(fetched);
        // A list snapshot may predate moves confirmed while it was in flight.
        for confirmed in confirmed_moves.drain(..) {
            if confirmed.load_token < token {
                continue;
            }
            if let Some(note) = notes.iter_mut().find(|note| note.id == confirmed.id) {
                if note.status != confirmed.status {
                    debug!(
                        "event=board_load module=board status=reapply_move id={} status={}",
                        note.id, confirmed.status
                    );
                    note.status = confirmed.status;
                }
            }
        }
        view.render_all(notes);
        info!(
            "event=board_load module=board status=ok token={token} count={} duration_ms={}",
            notes.len(),
            started_at.elapsed().as_millis()
        );
        Ok(LoadOutcome::Applied { count: notes.len() })
    }

    /// Re-applies the backend's view of a confirmed move if a concurrent load
    /// overwrote the optimistic status meanwhile, and remembers it for any
    /// load still in flight.
    fn settle_confirmed(&self, confirmed: &Note) {
        let mut state = self.state();
        let BoardState {
            notes,
            view,
            load_token,
            confirmed_moves,
            ..
        } = &mut *state;
        confirmed_moves.retain(|entry| entry.id != confirmed.id);
        confirmed_moves.push(ConfirmedMove {
            id: confirmed.id.clone(),
            status: confirmed.status,
            load_token: *load_token,
        });

        let Some(note) = notes.iter_mut().find(|note| note.id == confirmed.id) else {
            return;
        };
        if note.status == confirmed.status {
            return;
        }
        debug!(
            "event=note_move module=board status=resettle id={} status={}",
            note.id, confirmed.status
        );
        note.status = confirmed.status;
        let note = note.clone();
        view.place_card(&note, notes);
        view.refresh_column_state(notes);
    }

    async fn roll_back_move(&self, id: &NoteId, previous: NoteStatus, attempted: NoteStatus) {
        match self.fetch_and_commit().await {
            Ok(LoadOutcome::Applied { .. }) => {
                info!("event=note_move module=board status=resynced id={id}");
                return;
            }
            Ok(LoadOutcome::Superseded) => {
                debug!("event=note_move module=board status=resync_superseded id={id}");
            }
            Err(err) => {
                error!("event=note_move module=board status=resync_failed id={id} error={err}");
            }
        }

        let mut state = self.state();
        let BoardState { notes, view, .. } = &mut *state;
        let Some(note) = notes.iter_mut().find(|note| &note.id == id) else {
            return;
        };
        if note.status != attempted {
            return;
        }
        note.status = previous;
        let note = note.clone();
        view.place_card(&note, notes);
        view.refresh_column_state(notes);
        info!("event=note_move module=board status=reverted_locally id={id} status={previous}");
    }

    fn require_known(&self, id: &NoteId, op: &'static str) -> Result<(), BoardError> {
        if self.state().notes.iter().any(|note| &note.id == id) {
            return Ok(());
        }
        warn!("event=note_{op} module=board status=not_found id={id}");
        Err(BoardError::NotFound(id.clone()))
    }

    fn persistence_failed(&self, op: &'static str, err: BackendError) -> BoardError {
        error!("event=board_{op} module=board status=error error={err}");
        let mut label = op.to_string();
        if let Some(first) = label.get_mut(0..1) {
            first.make_ascii_uppercase();
        }
        self.state().view.push_notice(format!("{label} failed: {err}"));
        BoardError::from(err)
    }
}

/// Releases the per-note move slot on every exit path.
struct MoveGuard<'a> {
    state: &'a Mutex<BoardState>,
    id: NoteId,
}

impl<'a> MoveGuard<'a> {
    fn new(state: &'a Mutex<BoardState>, id: NoteId) -> Self {
        Self { state, id }
    }
}

impl Drop for MoveGuard<'_> {
    fn drop(&mut self) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.moves_in_flight.remove(&self.id);
    }
}

fn parse_draft(title: &str, content: &str, op: &'static str) -> Result<NoteDraft, BoardError> {
    NoteDraft::parse(title, content).map_err(|err| {
        debug!("event=note_{op} module=board status=invalid reason={err}");
        BoardError::Validation(err)
    })
}

fn dedupe_by_id(notes: Vec<Note>) -> Vec<Note> {
    let mut seen = HashSet::new();
    let total = notes.len();
    let unique: Vec<Note> = notes
        .into_iter()
        .filter(|note| seen.insert(note.id.clone()))
        .collect();
    if unique.len() != total {
        warn!(
            "event=state_desync module=board op=load reason=duplicate_ids dropped={}",
            total - unique.len()
        );
    }
    unique
}

#[cfg(test)]
mod tests {
    use super::{dedupe_by_id, BoardError};
    use crate::model::note::{Note, NoteId, NoteStatus};
    use crate::repo::backend::BackendError;

    #[test]
    fn dedupe_keeps_first_occurrence() {
        let make = |id: &str, title: &str| Note {
            id: NoteId::new(id),
            title: title.to_string(),
            content: String::new(),
            status: NoteStatus::Todo,
            created_at: None,
        };
        let unique = dedupe_by_id(vec![make("1", "first"), make("2", "x"), make("1", "second")]);
        assert_eq!(unique.len(), 2);
        assert_eq!(unique[0].title, "first");
    }

    #[test]
    fn backend_not_found_maps_to_board_not_found() {
        let err = BoardError::from(BackendError::NotFound(NoteId::new("9")));
        assert!(matches!(err, BoardError::NotFound(id) if id.as_str() == "9"));
        let err = BoardError::from(BackendError::Transport("down".to_string()));
        assert!(matches!(err, BoardError::Persistence(_)));
    }
}
