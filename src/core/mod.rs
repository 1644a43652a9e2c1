//! Core domain models for readpos.
//!
//! Validated value types for entity keys, reading-order items, offsets, and
//! the stored position record. These are pure domain models with no I/O
//! dependencies.

pub mod position;

pub use position::{EntityKey, OffsetMillis, Position, PositionRecord, ReadingOrderItemId};
