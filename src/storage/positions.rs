//! Last-read position storage.
//!
//! Every call opens its own connection and transaction through the
//! [`ConnectionManager`] and finishes it before returning; nothing is held
//! between calls.
//!
//! [`PositionStore::get`] and [`PositionStore::save`] are best-effort: engine
//! failures are logged and reported as "no position" or silently dropped.
//! Callers that must know whether a write landed use
//! [`PositionStore::try_save`] (or read back with [`PositionStore::try_get`]).

use crate::core::{EntityKey, OffsetMillis, Position, PositionRecord, ReadingOrderItemId};
use crate::error::{StorageError, StorageResult};
use crate::storage::connection::ConnectionManager;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{OptionalExtension, TransactionBehavior, params};
use tracing::{debug, warn};

/// SQL to look up the position of one entity.
const GET_POSITION_SQL: &str = r"
SELECT lr_item_id, lr_time_milliseconds, lr_time_updated
FROM last_read_positions
WHERE lr_book_id = ?1
LIMIT 1
";

/// SQL to insert or replace the position of one entity.
const SAVE_POSITION_SQL: &str = r"
INSERT INTO last_read_positions (
    lr_book_id, lr_item_id, lr_time_milliseconds, lr_time_updated
) VALUES (?1, ?2, ?3, ?4)
ON CONFLICT (lr_book_id) DO UPDATE SET
    lr_item_id           = excluded.lr_item_id,
    lr_time_milliseconds = excluded.lr_time_milliseconds,
    lr_time_updated      = excluded.lr_time_updated
";

/// SQL to count stored positions.
const COUNT_POSITIONS_SQL: &str = "SELECT COUNT(*) FROM last_read_positions";

/// Reads and writes last-read positions.
#[derive(Debug, Clone)]
pub struct PositionStore {
    connections: ConnectionManager,
}

impl PositionStore {
    /// Creates a store over `connections`.
    #[must_use]
    pub const fn new(connections: ConnectionManager) -> Self {
        Self { connections }
    }

    /// Returns the connection manager backing this store.
    #[must_use]
    pub const fn connections(&self) -> &ConnectionManager {
        &self.connections
    }

    /// Returns the saved position for `key`, if any.
    ///
    /// Never fails: engine errors are logged and read as `None`.
    pub fn get(&self, key: &EntityKey) -> Option<PositionRecord> {
        match self.try_get(key) {
            Ok(record) => record,
            Err(err) => {
                warn!(key = %key, error = %err, "failed to read last-read position");
                None
            }
        }
    }

    /// Saves `position` as the last-read position of `key`.
    ///
    /// Never fails: on an engine error the write is logged and dropped.
    pub fn save(&self, key: &EntityKey, position: &Position) {
        if let Err(err) = self.try_save(key, position) {
            warn!(key = %key, error = %err, "failed to save last-read position");
        }
    }

    /// Returns the saved position for `key`, surfacing engine errors.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the connection or query fails, or the
    /// stored row cannot be decoded.
    pub fn try_get(&self, key: &EntityKey) -> StorageResult<Option<PositionRecord>> {
        let mut conn = self.connections.acquire()?;
        let tx = conn.transaction()?;

        let row = tx
            .query_row(GET_POSITION_SQL, params![key.as_str()], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })
            .optional()?;
        tx.commit()?;

        row.map(|(item, offset, updated)| decode_record(key, item, offset, &updated))
            .transpose()
    }

    /// Saves `position` for `key` and returns the stored record.
    ///
    /// The write is a single upsert keyed by `key`, committed before
    /// returning. Concurrent saves for one key serialize on the database
    /// lock; the last to commit wins.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the connection, statement or commit fails.
    /// Nothing is written in that case.
    pub fn try_save(&self, key: &EntityKey, position: &Position) -> StorageResult<PositionRecord> {
        let updated_at = Utc::now();

        let mut conn = self.connections.acquire()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        tx.execute(
            SAVE_POSITION_SQL,
            params![
                key.as_str(),
                position.item.as_str(),
                position.offset.to_stored(),
                updated_at.to_rfc3339_opts(SecondsFormat::Nanos, true),
            ],
        )?;
        tx.commit()?;

        debug!(key = %key, position = %position, "saved last-read position");
        Ok(PositionRecord {
            entity_key: key.clone(),
            position: position.clone(),
            updated_at,
        })
    }

    /// Returns the number of stored positions.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the connection or query fails.
    pub fn count(&self) -> StorageResult<usize> {
        let mut conn = self.connections.acquire()?;
        let tx = conn.transaction()?;
        let count: i64 = tx.query_row(COUNT_POSITIONS_SQL, [], |row| row.get(0))?;
        tx.commit()?;
        usize::try_from(count)
            .map_err(|_| StorageError::Database(format!("invalid position count {count}")))
    }
}

fn decode_record(
    key: &EntityKey,
    item: String,
    offset: i64,
    updated: &str,
) -> StorageResult<PositionRecord> {
    let invalid = |reason: String| StorageError::InvalidRecord {
        key: key.to_string(),
        reason,
    };

    let item = ReadingOrderItemId::new(item).map_err(|e| invalid(e.to_string()))?;
    let offset = OffsetMillis::from_stored(offset).map_err(|e| invalid(e.to_string()))?;
    let updated_at = DateTime::parse_from_rfc3339(updated)
        .map_err(|e| invalid(format!("bad timestamp {updated:?}: {e}")))?
        .with_timezone(&Utc);

    Ok(PositionRecord {
        entity_key: key.clone(),
        position: Position::new(item, offset),
        updated_at,
    })
}
