//! Persistence backends for the board.
//!
//! # Responsibility
//! - Define the async contract the reconciler persists through.
//! - Provide the local key-value store and the remote notes API client.
//!
//! # Invariants
//! - Backends report semantic `NotFound` in addition to transport errors.
//! - Backends never touch the in-memory board or its view.

pub mod backend;
pub mod http_backend;
pub mod local_store;
