//! Domain model for the kanban board.
//!
//! # Responsibility
//! - Define the note entity, its opaque id and its column status.
//! - Keep input validation next to the data it guards.
//!
//! # Invariants
//! - Every note is identified by a stable `NoteId`.
//! - Unknown status values never escape decoding; they become `todo`.

pub mod note;
