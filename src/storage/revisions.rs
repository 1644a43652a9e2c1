//! Schema revision definitions.
//!
//! A [`RevisionSet`] is the ordered catalog of schema revisions known to
//! this build. Each revision carries the SQL statements that move a
//! database from the previous revision to this one. Revision 0 is the
//! bootstrap revision: it creates the `schema_version` table itself.
//!
//! Revision sets are loaded from a JSON resource:
//!
//! ```json
//! { "revisions": [ { "number": 0, "statements": ["CREATE TABLE ..."] } ] }
//! ```

use crate::error::{StorageError, StorageResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;

/// Revision set bundled with the crate.
const BUILTIN_REVISIONS: &str = include_str!("../../resources/revisions.json");

/// Number of the bootstrap revision.
pub const BOOTSTRAP_REVISION: u32 = 0;

/// One versioned unit of schema change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Revision {
    /// Revision number.
    pub number: u32,
    /// Statements to execute, in order.
    #[serde(default)]
    pub statements: Vec<String>,
}

impl Revision {
    /// Creates a revision from statements.
    #[must_use]
    pub fn new<S: Into<String>>(number: u32, statements: impl IntoIterator<Item = S>) -> Self {
        Self {
            number,
            statements: statements.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Deserialize)]
struct RevisionFile {
    revisions: Vec<Revision>,
}

/// Validated, ascending collection of revisions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevisionSet {
    revisions: Vec<Revision>,
}

impl RevisionSet {
    /// Builds a revision set, sorting by number.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::RevisionSet`] if the set is empty, contains
    /// duplicate numbers, or lacks the bootstrap revision.
    pub fn new(mut revisions: Vec<Revision>) -> StorageResult<Self> {
        if revisions.is_empty() {
            return Err(StorageError::RevisionSet(
                "revision set is empty".to_string(),
            ));
        }

        let mut seen = BTreeSet::new();
        for revision in &revisions {
            if !seen.insert(revision.number) {
                return Err(StorageError::RevisionSet(format!(
                    "duplicate revision number {}",
                    revision.number
                )));
            }
        }
        if !seen.contains(&BOOTSTRAP_REVISION) {
            return Err(StorageError::RevisionSet(format!(
                "missing bootstrap revision {BOOTSTRAP_REVISION}"
            )));
        }

        revisions.sort_by_key(|r| r.number);
        Ok(Self { revisions })
    }

    /// Parses a revision set from its JSON encoding.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::RevisionSet`] on malformed JSON or an invalid set.
    pub fn from_json(json: &str) -> StorageResult<Self> {
        let file: RevisionFile = serde_json::from_str(json)?;
        Self::new(file.revisions)
    }

    /// Loads a revision set from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::RevisionSet`] if the file cannot be read or parsed.
    pub fn from_path(path: impl AsRef<Path>) -> StorageResult<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            StorageError::RevisionSet(format!("failed to read {}: {e}", path.display()))
        })?;
        Self::from_json(&json)
    }

    /// Returns the revision set bundled with this build.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::RevisionSet`] if the bundled resource is invalid.
    pub fn builtin() -> StorageResult<Self> {
        Self::from_json(BUILTIN_REVISIONS)
    }

    /// Returns the newest revision number.
    #[must_use]
    pub fn latest(&self) -> u32 {
        // Non-empty and sorted by construction.
        self.revisions.last().map_or(BOOTSTRAP_REVISION, |r| r.number)
    }

    /// Returns the revisions strictly newer than `current`, ascending.
    ///
    /// `None` means the database has no schema yet, so every revision is
    /// returned.
    pub fn after(&self, current: Option<u32>) -> impl Iterator<Item = &Revision> {
        self.revisions
            .iter()
            .filter(move |r| current.is_none_or(|c| r.number > c))
    }

    /// Iterates all revisions in ascending order.
    pub fn iter(&self) -> std::slice::Iter<'_, Revision> {
        self.revisions.iter()
    }

    /// Returns the number of revisions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.revisions.len()
    }

    /// Returns `true` if the set holds no revisions, which a constructed set
    /// never does.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.revisions.is_empty()
    }

    /// Consumes the set, returning its revisions in ascending order.
    #[must_use]
    pub fn into_revisions(self) -> Vec<Revision> {
        self.revisions
    }
}

impl<'a> IntoIterator for &'a RevisionSet {
    type Item = &'a Revision;
    type IntoIter = std::slice::Iter<'a, Revision>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
