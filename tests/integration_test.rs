//! Integration tests for readpos.

#![allow(clippy::expect_used)]

use readpos::core::{EntityKey, Position};
use readpos::error::{Error, StorageError};
use readpos::storage::{Database, OpenOptions, PositionDatabase, Revision, RevisionSet};
use rusqlite::Connection;
use std::path::Path;
use std::time::{Duration, Instant};
use tempfile::TempDir;

const SCHEMA_VERSION_TABLE: &str =
    "CREATE TABLE schema_version (version_application_id TEXT NOT NULL, version_number INTEGER NOT NULL)";
const POSITIONS_TABLE: &str = "CREATE TABLE last_read_positions (lr_id INTEGER PRIMARY KEY, lr_book_id TEXT NOT NULL UNIQUE, lr_item_id TEXT NOT NULL, lr_time_milliseconds INTEGER NOT NULL, lr_time_updated TEXT NOT NULL)";

/// Helper to create a migrated test database.
fn create_test_database() -> (Database, TempDir) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let db = Database::open(temp_dir.path().join("test.db")).expect("Failed to open database");
    (db, temp_dir)
}

fn key(s: &str) -> EntityKey {
    EntityKey::new(s).expect("valid key")
}

fn position(item: &str, offset: u64) -> Position {
    Position::parse(item, offset).expect("valid position")
}

/// Revisions `0..=last`, each appending its number to `applied_log`.
fn logged_revisions(last: u32) -> RevisionSet {
    let revisions = (0..=last)
        .map(|number| {
            let mut statements = Vec::new();
            if number == 0 {
                statements.push(SCHEMA_VERSION_TABLE.to_string());
                statements.push(POSITIONS_TABLE.to_string());
                statements.push("CREATE TABLE applied_log (revision INTEGER NOT NULL)".to_string());
            }
            statements.push(format!("INSERT INTO applied_log (revision) VALUES ({number})"));
            Revision::new(number, statements)
        })
        .collect();
    RevisionSet::new(revisions).expect("valid revision set")
}

fn applied_log(path: &Path) -> Vec<u32> {
    let conn = Connection::open(path).expect("raw connection");
    let mut stmt = conn
        .prepare("SELECT revision FROM applied_log ORDER BY rowid")
        .expect("prepare");
    stmt.query_map([], |row| row.get(0))
        .expect("query")
        .collect::<rusqlite::Result<Vec<u32>>>()
        .expect("rows")
}

/// Reads the header application tag and journal mode of a file.
fn header(path: &Path) -> (i32, String) {
    let conn = Connection::open(path).expect("raw connection");
    let tag = conn
        .pragma_query_value(None, "application_id", |row| row.get(0))
        .expect("application_id");
    let mode = conn
        .pragma_query_value(None, "journal_mode", |row| row.get(0))
        .expect("journal_mode");
    (tag, mode)
}

#[test]
fn test_last_read_position_scenario() {
    let (db, _temp) = create_test_database();

    db.last_read_position_save(&key("book-42"), &position("chapter-3", 120_000));
    let record = db
        .last_read_position_get(&key("book-42"))
        .expect("position saved");
    assert_eq!(record.position, position("chapter-3", 120_000));

    db.last_read_position_save(&key("book-42"), &position("chapter-4", 5_000));
    let replaced = db
        .last_read_position_get(&key("book-42"))
        .expect("position replaced");
    assert_eq!(replaced.position, position("chapter-4", 5_000));
    assert!(replaced.updated_at >= record.updated_at);

    assert_eq!(db.last_read_position_get(&key("book-99")), None);
    assert_eq!(db.positions().count().expect("count"), 1);
}

#[test]
fn test_fresh_open_and_reopen() {
    let temp_dir = TempDir::new().expect("temp dir");
    let path = temp_dir.path().join("test.db");

    let db = Database::open(&path).expect("first open");
    assert_eq!(db.migration_report().from, None);
    assert_eq!(db.migration_report().to, Some(db.latest_revision()));
    db.last_read_position_save(&key("book-1"), &position("file0.ogg", 42));
    db.close();

    let db = Database::open(&path).expect("second open");
    assert!(db.migration_report().is_noop());
    assert_eq!(
        db.schema_revision().expect("revision"),
        Some(db.latest_revision())
    );
    assert_eq!(
        db.last_read_position_get(&key("book-1"))
            .expect("position kept")
            .position,
        position("file0.ogg", 42)
    );
}

#[test]
fn test_upgrade_applies_only_newer_revisions() {
    let temp_dir = TempDir::new().expect("temp dir");
    let path = temp_dir.path().join("test.db");

    let db = Database::open_with(&path, OpenOptions::new().revisions(logged_revisions(1)))
        .expect("open at revision 1");
    assert_eq!(db.migration_report().applied, vec![0, 1]);
    drop(db);

    let db = Database::open_with(&path, OpenOptions::new().revisions(logged_revisions(3)))
        .expect("upgrade to revision 3");
    assert_eq!(db.migration_report().from, Some(1));
    assert_eq!(db.migration_report().applied, vec![2, 3]);
    assert_eq!(db.schema_revision().expect("revision"), Some(3));

    assert_eq!(applied_log(&path), vec![0, 1, 2, 3]);
}

#[test]
fn test_failed_upgrade_keeps_previous_revision() {
    let temp_dir = TempDir::new().expect("temp dir");
    let path = temp_dir.path().join("test.db");

    drop(
        Database::open_with(&path, OpenOptions::new().revisions(logged_revisions(1)))
            .expect("open at revision 1"),
    );

    let mut revisions = logged_revisions(3).into_revisions();
    revisions[3]
        .statements
        .push("INSERT INTO no_such_table VALUES (1)".to_string());
    let broken = RevisionSet::new(revisions).expect("valid revision set");

    let err = Database::open_with(&path, OpenOptions::new().revisions(broken))
        .expect_err("upgrade should fail");
    assert!(matches!(
        err.storage_error(),
        Some(StorageError::Migration { revision: 3, .. })
    ));

    // Revision 2 succeeded before the failure but was rolled back with it.
    assert_eq!(applied_log(&path), vec![0, 1]);

    let db = Database::open_with(&path, OpenOptions::new().revisions(logged_revisions(1)))
        .expect("reopen at revision 1");
    assert!(db.migration_report().is_noop());
    assert_eq!(db.schema_revision().expect("revision"), Some(1));
}

#[test]
fn test_foreign_application_id_rejected() {
    let temp_dir = TempDir::new().expect("temp dir");
    let path = temp_dir.path().join("test.db");
    {
        let conn = Connection::open(&path).expect("raw connection");
        conn.execute_batch(&format!(
            "{SCHEMA_VERSION_TABLE};
             INSERT INTO schema_version VALUES ('com.example.other', 0);"
        ))
        .expect("seed foreign file");
    }

    let err = Database::open(&path).expect_err("foreign file");
    assert!(matches!(
        err.storage_error(),
        Some(StorageError::IdentityMismatch { found, .. }) if found == "com.example.other"
    ));

    // The rejected file is left exactly as it was.
    assert_eq!(header(&path), (0, "delete".to_string()));
}

#[test]
fn test_foreign_header_tag_rejected() {
    let temp_dir = TempDir::new().expect("temp dir");
    let path = temp_dir.path().join("test.db");
    {
        let conn = Connection::open(&path).expect("raw connection");
        conn.execute_batch("PRAGMA application_id = 42; CREATE TABLE other (x INTEGER);")
            .expect("seed foreign file");
    }

    let err = Database::open(&path).expect_err("foreign header");
    assert!(matches!(
        err.storage_error(),
        Some(StorageError::ApplicationTagMismatch { found: 42, .. })
    ));
    assert_eq!(header(&path), (42, "delete".to_string()));
}

#[test]
fn test_failed_upgrade_keeps_header() {
    let temp_dir = TempDir::new().expect("temp dir");
    let path = temp_dir.path().join("test.db");
    {
        let conn = Connection::open(&path).expect("raw connection");
        conn.execute_batch(&format!(
            "{SCHEMA_VERSION_TABLE};
             INSERT INTO schema_version VALUES ('{}', 0);",
            readpos::APPLICATION_ID
        ))
        .expect("seed untagged file");
    }

    let revisions = RevisionSet::new(vec![
        Revision::new(0, [SCHEMA_VERSION_TABLE]),
        Revision::new(1, ["CREATE TABLE broken ("]),
    ])
    .expect("valid revision set");
    Database::open_with(&path, OpenOptions::new().revisions(revisions))
        .expect_err("upgrade should fail");

    assert_eq!(header(&path), (0, "delete".to_string()));
}

#[test]
fn test_empty_version_table_rejected() {
    let temp_dir = TempDir::new().expect("temp dir");
    let path = temp_dir.path().join("test.db");
    {
        let conn = Connection::open(&path).expect("raw connection");
        conn.execute_batch(SCHEMA_VERSION_TABLE)
            .expect("seed empty version table");
    }

    let err = Database::open(&path).expect_err("empty version table");
    assert!(matches!(
        err.storage_error(),
        Some(StorageError::VersionRecordMissing)
    ));
}

#[test]
fn test_newer_database_rejected() {
    let temp_dir = TempDir::new().expect("temp dir");
    let path = temp_dir.path().join("test.db");

    let mut revisions = RevisionSet::builtin().expect("builtin").into_revisions();
    revisions.push(Revision::new(2, ["CREATE TABLE future (x INTEGER)"]));
    drop(
        Database::open_with(
            &path,
            OpenOptions::new().revisions(RevisionSet::new(revisions).expect("valid")),
        )
        .expect("open with future revision"),
    );

    let err = Database::open(&path).expect_err("newer database");
    assert!(matches!(
        err.storage_error(),
        Some(StorageError::UnsupportedRevision {
            found: 2,
            latest: 1
        })
    ));
}

#[test]
fn test_nonexistent_directory() {
    let temp_dir = TempDir::new().expect("temp dir");
    let path = temp_dir.path().join("nonexistent").join("test.db");

    let err = Database::open(&path).expect_err("missing directory");
    assert!(matches!(err, Error::Open { .. }));
    assert!(!path.exists());
}

#[test]
fn test_concurrent_saves_distinct_keys() {
    let (db, _temp) = create_test_database();

    std::thread::scope(|scope| {
        for thread in 0..4 {
            let db = &db;
            scope.spawn(move || {
                for i in 0..10_u32 {
                    let key = key(&format!("book-{thread}-{i}"));
                    db.positions()
                        .try_save(&key, &position("chapter-1", u64::from(i) * 1000))
                        .expect("concurrent save");
                }
            });
        }
    });

    assert_eq!(db.positions().count().expect("count"), 40);
    assert_eq!(
        db.last_read_position_get(&key("book-3-9"))
            .expect("saved")
            .position,
        position("chapter-1", 9000)
    );
}

#[test]
fn test_concurrent_saves_same_key() {
    let (db, _temp) = create_test_database();
    let book = key("book-42");

    std::thread::scope(|scope| {
        for thread in 0..4_u64 {
            let db = &db;
            let book = &book;
            scope.spawn(move || {
                for i in 0..10 {
                    db.positions()
                        .try_save(book, &position("chapter-1", thread * 100 + i))
                        .expect("concurrent save");
                }
            });
        }
    });

    // One row per key; the last committed write wins.
    assert_eq!(db.positions().count().expect("count"), 1);
    let offset = db
        .last_read_position_get(&book)
        .expect("saved")
        .position
        .offset
        .as_millis();
    assert!(offset % 100 < 10 && offset / 100 < 4);
}

#[test]
fn test_reader_ignores_uncommitted_write() {
    let temp_dir = TempDir::new().expect("temp dir");
    let path = temp_dir.path().join("test.db");
    let db = Database::open(&path).expect("open");
    db.positions()
        .try_save(&key("book-42"), &position("chapter-3", 120_000))
        .expect("save");

    let writer = Connection::open(&path).expect("writer connection");
    writer
        .execute_batch(
            "BEGIN IMMEDIATE;
             UPDATE last_read_positions
             SET lr_item_id = 'chapter-4', lr_time_milliseconds = 5000
             WHERE lr_book_id = 'book-42';",
        )
        .expect("uncommitted update");

    let started = Instant::now();
    let record = db
        .positions()
        .try_get(&key("book-42"))
        .expect("read during write")
        .expect("committed position");
    assert!(started.elapsed() < Duration::from_secs(2));
    assert_eq!(record.position, position("chapter-3", 120_000));

    writer.execute_batch("COMMIT").expect("commit");
    let record = db
        .positions()
        .try_get(&key("book-42"))
        .expect("read after commit")
        .expect("committed position");
    assert_eq!(record.position, position("chapter-4", 5_000));
}

#[test]
fn test_close_is_idempotent() {
    let (db, _temp) = create_test_database();
    PositionDatabase::close(&db);
    PositionDatabase::close(&db);
    assert!(db.is_closed());
}

mod property_tests {
    use proptest::prelude::*;
    use readpos::core::{EntityKey, Position};
    use readpos::storage::Database;
    use tempfile::TempDir;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn saved_position_reads_back(
            book in "[a-z0-9-]{1,32}",
            item in "[a-zA-Z0-9._/-]{1,64}",
            offset in 0_u64..=i64::MAX as u64,
        ) {
            let temp_dir = TempDir::new().expect("temp dir");
            let db = Database::open(temp_dir.path().join("test.db")).expect("open");
            let key = EntityKey::new(book).expect("key");
            let position = Position::parse(item, offset).expect("position");

            let saved = db.positions().try_save(&key, &position).expect("save");
            let loaded = db.positions().try_get(&key).expect("get").expect("present");
            prop_assert_eq!(saved, loaded);
        }
    }
}

/// CLI command integration tests.
mod cli_tests {
    use readpos::cli::commands::execute;
    use readpos::cli::parser::{Cli, Commands};
    use std::path::PathBuf;
    use tempfile::TempDir;

    /// Helper to create a CLI struct with custom `db_path`.
    fn make_cli(db_path: PathBuf, command: Commands) -> Cli {
        Cli {
            db_path: Some(db_path),
            revisions: None,
            config: None,
            verbose: false,
            format: "text".to_string(),
            command,
        }
    }

    /// Helper to create a CLI struct with JSON format.
    fn make_cli_json(db_path: PathBuf, command: Commands) -> Cli {
        Cli {
            format: "json".to_string(),
            ..make_cli(db_path, command)
        }
    }

    #[test]
    fn test_cmd_init() {
        let temp_dir = TempDir::new().expect("temp dir");
        let db_path = temp_dir.path().join("test.db");

        let result = execute(&make_cli(db_path.clone(), Commands::Init));
        assert!(result.expect("init result").contains("Initialized"));
        assert!(db_path.exists());
    }

    #[test]
    fn test_cmd_save_and_get() {
        let temp_dir = TempDir::new().expect("temp dir");
        let db_path = temp_dir.path().join("test.db");

        let saved = execute(&make_cli(
            db_path.clone(),
            Commands::Save {
                key: "book-42".to_string(),
                item: "chapter-3".to_string(),
                offset: 120_000,
            },
        ))
        .expect("save");
        assert!(saved.starts_with("book-42: chapter-3 @ 120000ms"));

        let output = execute(&make_cli(
            db_path,
            Commands::Get {
                key: "book-42".to_string(),
            },
        ))
        .expect("get");
        assert!(output.starts_with("book-42: chapter-3 @ 120000ms"));
    }

    #[test]
    fn test_cmd_status_json() {
        let temp_dir = TempDir::new().expect("temp dir");
        let db_path = temp_dir.path().join("test.db");
        execute(&make_cli(db_path.clone(), Commands::Init)).expect("init");

        let output = execute(&make_cli_json(db_path, Commands::Status)).expect("status");
        let json: serde_json::Value = serde_json::from_str(&output).expect("valid json");
        assert_eq!(json["revision"], 1);
        assert_eq!(json["position_count"], 0);
    }

    #[test]
    fn test_cmd_get_missing_json() {
        let temp_dir = TempDir::new().expect("temp dir");
        let db_path = temp_dir.path().join("test.db");

        let output = execute(&make_cli_json(
            db_path,
            Commands::Get {
                key: "book-99".to_string(),
            },
        ))
        .expect("get");
        assert_eq!(output, "null");
    }
}
