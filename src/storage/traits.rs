//! Storage trait definition.
//!
//! Defines the application-facing interface of a position database, so
//! hosts can depend on the behavior rather than on the `SQLite` handle.

use crate::core::{EntityKey, Position, PositionRecord};

/// Trait for last-read position databases.
///
/// Reads and writes are best-effort: implementations never surface engine
/// failures through these methods. A failed read returns `None`; a failed
/// write is dropped.
pub trait PositionDatabase: Send + Sync {
    /// Returns the last-read position of `key`, if one was saved.
    fn last_read_position_get(&self, key: &EntityKey) -> Option<PositionRecord>;

    /// Saves `position` as the last-read position of `key`.
    ///
    /// Replaces any earlier position for the same key.
    fn last_read_position_save(&self, key: &EntityKey, position: &Position);

    /// Closes the database.
    ///
    /// Should be idempotent - safe to call multiple times.
    fn close(&self);
}
