use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};

use sqlbridge::prelude::*;
use sqlbridge::registry;
use tempfile::tempdir;

fn sqlite_config(file: &str) -> HashMap<String, String> {
    let mut config = HashMap::new();
    config.insert("driver".to_string(), "sqlite3".to_string());
    config.insert("file".to_string(), file.to_string());
    config
}

/// The process-wide registry is shared state, so everything that touches
/// it lives in this one test.
#[tokio::test]
async fn registry_tracks_and_switches_databases() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let first_file = dir.path().join("first.db");
    let second_file = dir.path().join("second.db");

    let first = registry::open("first", &sqlite_config(&first_file.to_string_lossy())).await?;
    first
        .execute_batch("create table notes (id integer primary key autoincrement, body text);")
        .await?;

    let second = registry::open("second", &sqlite_config(&second_file.to_string_lossy())).await?;
    second
        .execute_batch("create table notes (id integer primary key autoincrement, body text);")
        .await?;

    // The most recent registration becomes current.
    assert_eq!(registry::database_count(), 2);
    assert_eq!(registry::current().name(), "second");

    // Unbound builders follow the current database.
    InsertBuilder::new("notes")
        .insert(&["body"], &[SqlValue::Text("kept in second".to_string())])
        .await?;

    assert!(registry::use_database("first"));
    assert_eq!(registry::current().name(), "first");
    InsertBuilder::new("notes")
        .insert(&["body"], &[SqlValue::Text("kept in first".to_string())])
        .await?;

    let in_first = registry::current().query("select body from notes", &[]).await?;
    assert_eq!(in_first.len(), 1);
    assert_eq!(
        in_first.rows()[0].get("body").unwrap().as_text(),
        Some("kept in first")
    );

    let in_second = registry::get("second")
        .unwrap()
        .query("select body from notes", &[])
        .await?;
    assert_eq!(in_second.len(), 1);
    assert_eq!(
        in_second.rows()[0].get("body").unwrap().as_text(),
        Some("kept in second")
    );

    // Switching to an unknown name is refused and changes nothing.
    assert!(!registry::use_database("third"));
    assert_eq!(registry::current().name(), "first");

    // Re-registering a live name panics and leaves the registry intact.
    let duplicate = Database::with_driver("first", Driver::Sqlite(SqliteDriver::default()));
    let outcome = catch_unwind(AssertUnwindSafe(|| registry::register(duplicate)));
    assert!(outcome.is_err());
    assert_eq!(registry::database_count(), 2);
    assert_eq!(registry::current().name(), "first");
    Ok(())
}
