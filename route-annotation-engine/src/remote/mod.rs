//! Remote persistence of line records.
//!
//! Editor mutations queue [`outbox::PersistOp`]s; the persistence plugin runs
//! them against the remote store (blocking HTTP on the IO task pool, or the
//! browser fetch client on WASM) and feeds the outcomes back into the editor. No operation is retried and a
//! failed remote call never rolls back local state.

/// Remote store trait with HTTP, fetch and in-memory implementations.
pub mod client;

/// Queued operations and their execution.
pub mod outbox;

/// Bevy systems dispatching and polling remote calls.
pub mod persistence;
