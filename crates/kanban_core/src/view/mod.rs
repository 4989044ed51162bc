//! Rendered projection of the board.
//!
//! # Responsibility
//! - Project the note store into three keyed columns of cards.
//! - Escape every piece of user text before it becomes markup.
//!
//! # Invariants
//! - The view is derived state; it is rebuilt or patched only by the board
//!   reconciler after a state transition.

pub mod board_view;
pub mod escape;
