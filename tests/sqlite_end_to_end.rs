use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use sqlbridge::prelude::*;
use tempfile::tempdir;

fn sqlite_config(file: &str) -> HashMap<String, String> {
    let mut config = HashMap::new();
    config.insert("driver".to_string(), "sqlite3".to_string());
    config.insert("file".to_string(), file.to_string());
    config
}

#[derive(Debug, PartialEq, Deserialize)]
struct Member {
    id: i64,
    name: String,
    score: i64,
}

#[derive(Serialize)]
struct ScorePatch {
    name: String,
    score: i64,
}

/// Full builder flow against a real database file: DDL batch, inserts
/// with generated ids, ordered selects, record-driven updates, deletes.
#[tokio::test]
async fn sqlite_crud_round_trip() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let file = dir.path().join("members.db");
    let db = Arc::new(Database::open("members", &sqlite_config(&file.to_string_lossy())).await?);

    db.execute_batch(
        "create table members (
            id integer primary key autoincrement,
            name text not null,
            score integer not null
        );",
    )
    .await?;

    let id = InsertBuilder::new("members")
        .database(Arc::clone(&db))
        .insert_returning_id(
            &["name", "score"],
            &[SqlValue::Text("ann".to_string()), SqlValue::Int(10)],
            "id",
        )
        .await?;
    assert_eq!(id, 1);

    db.execute(
        "insert into members (name, score) values (?, ?)",
        &[SqlValue::Text("bo".to_string()), SqlValue::Int(20)],
    )
    .await?;

    let rs = SelectBuilder::new("members")
        .database(Arc::clone(&db))
        .order_by("score")
        .query()
        .await?;
    assert_eq!(rs.len(), 2);
    assert_eq!(rs.rows()[0].get("name").unwrap().as_text(), Some("ann"));
    assert_eq!(rs.rows()[1].get("score").unwrap().as_int(), Some(20));

    // Zero fields drop out of the converted row, so only the score moves.
    let patch = ScorePatch {
        name: String::new(),
        score: 25,
    };
    let row = record_to_row(&patch, Action::Update)?;
    assert_eq!(row.columns(), ["score"]);
    let affected = UpdateBuilder::new("members")
        .database(Arc::clone(&db))
        .where_clause("name = ?", vec![SqlValue::Text("bo".to_string())])
        .update_row(&row)
        .await?;
    assert_eq!(affected, 1);

    let members: Vec<Member> = SelectBuilder::new("members")
        .database(Arc::clone(&db))
        .fields("id, name, score")
        .where_clause("score >= ?", vec![SqlValue::Int(25)])
        .prepared(true)
        .find()
        .await?;
    assert_eq!(
        members,
        vec![Member {
            id: 2,
            name: "bo".to_string(),
            score: 25,
        }]
    );

    let removed = DeleteBuilder::new("members")
        .database(Arc::clone(&db))
        .where_clause("score < ?", vec![SqlValue::Int(100)])
        .delete()
        .await?;
    assert_eq!(removed, 2);

    let rest = db.query("select id from members", &[]).await?;
    assert!(rest.is_empty());
    Ok(())
}

#[tokio::test]
async fn blobs_and_nulls_survive_the_round_trip() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let file = dir.path().join("bin.db");
    let db = Database::open("bin", &sqlite_config(&file.to_string_lossy())).await?;

    db.execute_batch("create table bin (data blob, note text);")
        .await?;
    db.execute(
        "insert into bin (data, note) values (?, ?)",
        &[SqlValue::Blob(vec![0, 159, 146, 150]), SqlValue::Null],
    )
    .await?;

    let rs = db.query("select data, note from bin", &[]).await?;
    let row = &rs.rows()[0];
    assert_eq!(row.get("data").unwrap().as_blob(), Some(&[0, 159, 146, 150][..]));
    assert!(row.get("note").unwrap().is_null());
    Ok(())
}

#[tokio::test]
async fn scripts_load_from_disk() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let file = dir.path().join("scripted.db");
    let script = dir.path().join("schema.sql");
    tokio::fs::write(
        &script,
        "create table t (n integer);\ninsert into t (n) values (1);\ninsert into t (n) values (2);",
    )
    .await?;

    let db = Database::open("scripted", &sqlite_config(&file.to_string_lossy())).await?;
    db.execute_file(&script).await?;

    let rs = db.query("select n from t order by n", &[]).await?;
    let values: Vec<i64> = rs
        .rows()
        .iter()
        .filter_map(|row| row.get("n").and_then(SqlValue::as_int))
        .collect();
    assert_eq!(values, [1, 2]);

    let err = db.execute_file(dir.path().join("missing.sql")).await;
    assert!(matches!(err, Err(DbError::Execution(_))));
    Ok(())
}

#[tokio::test]
async fn open_fails_when_the_database_path_is_unreachable() {
    let config = sqlite_config("/nonexistent-sqlbridge-dir/data.db");
    let err = Database::open("broken", &config).await.unwrap_err();
    assert!(matches!(
        err,
        DbError::PoolSqlite(_) | DbError::Sqlite(_) | DbError::Connection(_)
    ));
}
