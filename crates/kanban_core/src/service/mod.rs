//! Board use-case services.
//!
//! # Responsibility
//! - Orchestrate backend calls, in-memory state and view updates.
//! - Keep callers (CLI, UI shells) decoupled from persistence details.

pub mod board;
