//! Keyed column projection of the note store.
//!
//! # Responsibility
//! - Hold one card per note id, grouped into the three status columns.
//! - Keep per-column counts and empty-state placeholders current.
//! - Emit escaped HTML for the board and its notices.
//!
//! # Invariants
//! - A card id appears at most once across all columns.
//! - Cards inside a column follow store insertion order.
//! - `revision` changes only when something visible changed.

use crate::model::note::{Note, NoteId, NoteStatus};
use crate::view::escape::escape_html;
use std::fmt::Write;

const EMPTY_STATE_TEXT: &str = "No notes yet. Drag here or click New note";
/// Oldest notices are dropped beyond this many.
pub const MAX_NOTICES: usize = 5;

/// Rendered note card.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardView {
    pub id: NoteId,
    pub title: String,
    pub content: String,
}

impl CardView {
    fn from_note(note: &Note) -> Self {
        Self {
            id: note.id.clone(),
            title: note.title.clone(),
            content: note.content.clone(),
        }
    }

    fn shows(&self, note: &Note) -> bool {
        self.id == note.id && self.title == note.title && self.content == note.content
    }
}

/// One rendered column: ordered cards, count badge and placeholder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnView {
    status: NoteStatus,
    cards: Vec<CardView>,
    count: usize,
    shows_placeholder: bool,
}

impl ColumnView {
    fn empty(status: NoteStatus) -> Self {
        Self {
            status,
            cards: Vec::new(),
            count: 0,
            shows_placeholder: true,
        }
    }

    pub fn status(&self) -> NoteStatus {
        self.status
    }

    pub fn cards(&self) -> &[CardView] {
        &self.cards
    }

    /// Value shown in the header badge.
    pub fn count(&self) -> usize {
        self.count
    }

    pub fn shows_placeholder(&self) -> bool {
        self.shows_placeholder
    }

    fn position(&self, id: &NoteId) -> Option<usize> {
        self.cards.iter().position(|card| &card.id == id)
    }
}

/// Dismissible failure message shown above the board.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub id: u64,
    pub message: String,
}

/// Derived view of the board. Only the reconciler writes to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoardView {
    columns: [ColumnView; 3],
    notices: Vec<Notice>,
    next_notice_id: u64,
    revision: u64,
}

impl Default for BoardView {
    fn default() -> Self {
        Self::new()
    }
}

impl BoardView {
    pub fn new() -> Self {
        Self {
            columns: NoteStatus::ALL.map(ColumnView::empty),
            notices: Vec::new(),
            next_notice_id: 1,
            revision: 0,
        }
    }

    pub fn columns(&self) -> &[ColumnView; 3] {
        &self.columns
    }

    pub fn column(&self, status: NoteStatus) -> &ColumnView {
        &self.columns[status.index()]
    }

    /// Number of visible mutations applied so far.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn notices(&self) -> &[Notice] {
        &self.notices
    }

    /// Finds the column currently showing `id`.
    pub fn column_of(&self, id: &NoteId) -> Option<NoteStatus> {
        self.columns
            .iter()
            .find(|column| column.position(id).is_some())
            .map(|column| column.status)
    }

    pub fn card(&self, id: &NoteId) -> Option<&CardView> {
        self.columns
            .iter()
            .flat_map(|column| column.cards.iter())
            .find(|card| &card.id == id)
    }

    /// All card ids, column by column.
    pub fn card_ids(&self) -> Vec<NoteId> {
        self.columns
            .iter()
            .flat_map(|column| column.cards.iter().map(|card| card.id.clone()))
            .collect()
    }

    /// Full keyed render pass.
    ///
    /// Columns already showing the right cards are skipped; others are
    /// replaced. Duplicate ids in `notes` keep their first occurrence.
    pub fn render_all(&mut self, notes: &[Note]) {
        let mut seen = std::collections::HashSet::new();
        let mut desired: [Vec<CardView>; 3] = Default::default();
        for note in notes {
            if seen.insert(&note.id) {
                desired[note.status.index()].push(CardView::from_note(note));
            }
        }

        for (column, cards) in self.columns.iter_mut().zip(desired) {
            if column.cards != cards {
                column.cards = cards;
                self.revision += 1;
            }
        }
        self.refresh_column_state(notes);
    }

    /// Inserts or moves the card for `note` to its store-order slot.
    ///
    /// `notes` is the store after the change; returns whether anything moved
    /// or changed text.
    pub fn place_card(&mut self, note: &Note, notes: &[Note]) -> bool {
        let target = note.status.index();
        if let Some(index) = self.columns[target].position(&note.id) {
            if self.columns[target].cards[index].shows(note) {
                return false;
            }
            self.columns[target].cards[index] = CardView::from_note(note);
            self.revision += 1;
            return true;
        }

        self.detach(&note.id);
        let slot = notes
            .iter()
            .take_while(|candidate| candidate.id != note.id)
            .filter(|candidate| candidate.status == note.status)
            .filter(|candidate| self.columns[target].position(&candidate.id).is_some())
            .count();
        let column = &mut self.columns[target];
        column.cards.insert(slot.min(column.cards.len()), CardView::from_note(note));
        self.revision += 1;
        true
    }

    /// Rewrites title/content of an existing card without moving it.
    pub fn update_card_text(&mut self, id: &NoteId, title: &str, content: &str) -> bool {
        let Some(card) = self
            .columns
            .iter_mut()
            .flat_map(|column| column.cards.iter_mut())
            .find(|card| &card.id == id)
        else {
            return false;
        };
        if card.title == title && card.content == content {
            return false;
        }
        card.title = title.to_string();
        card.content = content.to_string();
        self.revision += 1;
        true
    }

    /// Removes the card for `id`; returns whether one existed.
    pub fn remove_card(&mut self, id: &NoteId) -> bool {
        let removed = self.detach(id);
        if removed {
            self.revision += 1;
        }
        removed
    }

    /// Recomputes count badges and placeholders from the store.
    pub fn refresh_column_state(&mut self, notes: &[Note]) {
        for column in &mut self.columns {
            let count = notes.iter().filter(|note| note.status == column.status).count();
            let shows_placeholder = column.cards.is_empty();
            if column.count != count || column.shows_placeholder != shows_placeholder {
                column.count = count;
                column.shows_placeholder = shows_placeholder;
                self.revision += 1;
            }
        }
    }

    /// Queues a notice and returns its id, keeping only the newest
    /// `MAX_NOTICES`.
    pub fn push_notice(&mut self, message: impl Into<String>) -> u64 {
        let id = self.next_notice_id;
        self.next_notice_id += 1;
        self.notices.push(Notice {
            id,
            message: message.into(),
        });
        if self.notices.len() > MAX_NOTICES {
            let overflow = self.notices.len() - MAX_NOTICES;
            self.notices.drain(..overflow);
        }
        self.revision += 1;
        id
    }

    pub fn dismiss_notice(&mut self, notice_id: u64) -> bool {
        let before = self.notices.len();
        self.notices.retain(|notice| notice.id != notice_id);
        let dismissed = self.notices.len() != before;
        if dismissed {
            self.revision += 1;
        }
        dismissed
    }

    /// Serializes the board to HTML. All user text is escaped.
    pub fn to_html(&self) -> String {
        let mut out = String::new();
        if !self.notices.is_empty() {
            out.push_str("<div class=\"notices\">\n");
            for notice in &self.notices {
                let _ = writeln!(
                    out,
                    "  <div class=\"notice\" role=\"alert\" data-notice-id=\"{}\">{}</div>",
                    notice.id,
                    escape_html(&notice.message)
                );
            }
            out.push_str("</div>\n");
        }

        out.push_str("<div class=\"board\">\n");
        for column in &self.columns {
            let status = column.status.as_str();
            let _ = writeln!(
                out,
                "  <section class=\"column\" id=\"{status}\" data-status=\"{status}\">"
            );
            let _ = writeln!(
                out,
                "    <h5 class=\"col-header\">{} <span class=\"count\" id=\"count-{status}\">{}</span></h5>",
                column.status.label(),
                column.count
            );
            for card in &column.cards {
                let id = escape_html(card.id.as_str());
                let _ = writeln!(
                    out,
                    "    <div class=\"note\" id=\"note-{id}\" data-id=\"{id}\" draggable=\"true\">"
                );
                let _ = writeln!(
                    out,
                    "      <div class=\"note-title\"><strong>{}</strong></div>",
                    escape_html(&card.title)
                );
                let _ = writeln!(
                    out,
                    "      <div class=\"note-content\"><small>{}</small></div>",
                    escape_html(&card.content)
                );
                out.push_str("    </div>\n");
            }
            if column.shows_placeholder {
                let _ = writeln!(out, "    <div class=\"empty-state\">{EMPTY_STATE_TEXT}</div>");
            }
            out.push_str("  </section>\n");
        }
        out.push_str("</div>\n");
        out
    }

    fn detach(&mut self, id: &NoteId) -> bool {
        for column in &mut self.columns {
            if let Some(index) = column.position(id) {
                column.cards.remove(index);
                return true;
            }
        }
        false
    }
}
