//! Position value types.
//!
//! A position names a reading-order item of a book and an offset into it.
//! Identifiers are validated on construction so the storage layer never
//! has to deal with empty keys or offsets that do not fit a `SQLite`
//! integer column.

use crate::error::ValueError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

macro_rules! text_id {
    ($(#[$meta:meta])* $name:ident, $field:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Creates a validated identifier.
            ///
            /// # Errors
            ///
            /// Returns [`ValueError::Empty`] if `value` is empty or only whitespace.
            pub fn new(value: impl Into<String>) -> Result<Self, ValueError> {
                let value = value.into();
                if value.trim().is_empty() {
                    return Err(ValueError::Empty { field: $field });
                }
                Ok(Self(value))
            }

            /// Returns the identifier text.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl TryFrom<String> for $name {
            type Error = ValueError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl FromStr for $name {
            type Err = ValueError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::new(s)
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> Self {
                value.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

text_id!(
    /// Identifies the entity (book) a position belongs to.
    ///
    /// # Examples
    ///
    /// ```
    /// use readpos::core::EntityKey;
    ///
    /// let key = EntityKey::new("book-42").unwrap();
    /// assert_eq!(key.as_str(), "book-42");
    /// assert!(EntityKey::new("").is_err());
    /// ```
    EntityKey,
    "entity key"
);

text_id!(
    /// Identifies an item in a book's reading order, such as a chapter file.
    ReadingOrderItemId,
    "reading order item id"
);

/// Offset into a reading-order item, in milliseconds.
///
/// Values are bounded by `i64::MAX` because they are stored in a signed
/// integer column.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(try_from = "u64", into = "u64")]
pub struct OffsetMillis(u64);

impl OffsetMillis {
    /// Largest representable offset.
    #[allow(clippy::cast_sign_loss)]
    pub const MAX: Self = Self(i64::MAX as u64);

    /// Creates an offset.
    ///
    /// # Errors
    ///
    /// Returns [`ValueError::OutOfRange`] if `millis` exceeds [`Self::MAX`].
    pub fn new(millis: u64) -> Result<Self, ValueError> {
        if millis > Self::MAX.0 {
            return Err(ValueError::OutOfRange {
                field: "offset milliseconds",
                value: millis.to_string(),
            });
        }
        Ok(Self(millis))
    }

    /// Converts a stored column value.
    ///
    /// # Errors
    ///
    /// Returns [`ValueError::OutOfRange`] for negative values.
    pub fn from_stored(value: i64) -> Result<Self, ValueError> {
        u64::try_from(value)
            .map(Self)
            .map_err(|_| ValueError::OutOfRange {
                field: "offset milliseconds",
                value: value.to_string(),
            })
    }

    /// Returns the offset in milliseconds.
    #[must_use]
    pub const fn as_millis(self) -> u64 {
        self.0
    }

    /// Returns the offset as a column value.
    #[must_use]
    #[allow(clippy::cast_possible_wrap)]
    pub const fn to_stored(self) -> i64 {
        // Bounded by MAX on construction.
        self.0 as i64
    }
}

impl TryFrom<u64> for OffsetMillis {
    type Error = ValueError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<OffsetMillis> for u64 {
    fn from(value: OffsetMillis) -> Self {
        value.0
    }
}

impl fmt::Display for OffsetMillis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ms", self.0)
    }
}

/// A playback position: which reading-order item, and how far into it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    /// Reading-order item the position refers to.
    pub item: ReadingOrderItemId,
    /// Offset into the item.
    pub offset: OffsetMillis,
}

impl Position {
    /// Creates a position from already-validated parts.
    #[must_use]
    pub const fn new(item: ReadingOrderItemId, offset: OffsetMillis) -> Self {
        Self { item, offset }
    }

    /// Creates a position from raw values.
    ///
    /// # Errors
    ///
    /// Returns an error if the item id is empty or the offset is out of range.
    pub fn parse(item: impl Into<String>, offset_millis: u64) -> Result<Self, ValueError> {
        Ok(Self {
            item: ReadingOrderItemId::new(item)?,
            offset: OffsetMillis::new(offset_millis)?,
        })
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} @ {}", self.item, self.offset)
    }
}

/// The stored last-read position of one entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionRecord {
    /// Entity the record belongs to.
    pub entity_key: EntityKey,
    /// The saved position.
    pub position: Position,
    /// When the record was last written (UTC).
    pub updated_at: DateTime<Utc>,
}
