//! Relational store backed by SQLite through `rusqlite`.
//!
//! Each collection is a table whose columns follow [`super::schema`]: strings
//! as `TEXT`, JSON values as `TEXT` validated with `json_valid`, and timestamps
//! as 64-bit `INTEGER` epoch milliseconds, which keeps values bit-for-bit equal
//! to what the JSON file backend stores.
//!
//! A connection is opened per operation, so concurrent requests each get their
//! own handle and SQLite's locking serializes writers.

use super::schema::{self, Field, FieldKind};
use super::{check_unique, merged_record, new_record, now_millis, Collection, Record, Store, StoreError};
use log::debug;
use rusqlite::types::Value as SqlValue;
use rusqlite::{params, params_from_iter, Connection, ErrorCode, OptionalExtension, Row};
use serde_json::Value;
use std::path::PathBuf;
use std::time::Duration;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

pub struct SqliteStore {
    path: PathBuf,
}

impl SqliteStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        SqliteStore { path: path.into() }
    }

    fn connect(&self) -> Result<Connection, StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(&self.path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        Ok(conn)
    }
}

fn column_list(collection: Collection) -> String {
    schema::fields(collection)
        .iter()
        .map(|f| f.column)
        .collect::<Vec<_>>()
        .join(", ")
}

fn column_definition(field: &Field) -> String {
    let mut def = match field.kind {
        FieldKind::Text => format!("{} TEXT NOT NULL DEFAULT ''", field.column),
        FieldKind::NullableText => format!("{} TEXT", field.column),
        FieldKind::Json => format!(
            "{col} TEXT NOT NULL DEFAULT '{{}}' CHECK (json_valid({col}))",
            col = field.column
        ),
        FieldKind::Timestamp => format!("{} INTEGER NOT NULL", field.column),
    };
    if field.name == "id" {
        def = format!("{} TEXT PRIMARY KEY", field.column);
    } else if field.unique {
        def.push_str(" UNIQUE");
    }
    def
}

fn create_table_sql(collection: Collection) -> String {
    let columns = schema::fields(collection)
        .iter()
        .map(column_definition)
        .collect::<Vec<_>>()
        .join(",\n    ");
    format!(
        "CREATE TABLE IF NOT EXISTS {} (\n    {}\n)",
        collection.name(),
        columns
    )
}

/// Converts one JSON field of a normalized record to its column value.
fn to_sql(field: &Field, record: &Record) -> Result<SqlValue, StoreError> {
    let value = record.get(field.name).unwrap_or(&Value::Null);
    Ok(match (field.kind, value) {
        (_, Value::Null) => SqlValue::Null,
        (FieldKind::Text | FieldKind::NullableText, Value::String(s)) => SqlValue::Text(s.clone()),
        (FieldKind::Text | FieldKind::NullableText, other) => SqlValue::Text(other.to_string()),
        (FieldKind::Json, v) => SqlValue::Text(serde_json::to_string(v)?),
        (FieldKind::Timestamp, v) => SqlValue::Integer(v.as_i64().ok_or_else(|| {
            StoreError::Corrupt(format!("{} is not an integer timestamp", field.name))
        })?),
    })
}

fn row_to_record(collection: Collection, row: &Row<'_>) -> rusqlite::Result<Record> {
    let mut record = Record::new();
    for (idx, field) in schema::fields(collection).iter().enumerate() {
        let value = match field.kind {
            FieldKind::Text => Value::String(row.get::<_, Option<String>>(idx)?.unwrap_or_default()),
            FieldKind::NullableText => row
                .get::<_, Option<String>>(idx)?
                .map(Value::String)
                .unwrap_or(Value::Null),
            FieldKind::Json => match row.get::<_, Option<String>>(idx)? {
                Some(raw) => serde_json::from_str(&raw).map_err(|e| {
                    rusqlite::Error::FromSqlConversionFailure(
                        idx,
                        rusqlite::types::Type::Text,
                        Box::new(e),
                    )
                })?,
                None => Value::Object(Default::default()),
            },
            FieldKind::Timestamp => Value::from(row.get::<_, i64>(idx)?),
        };
        record.insert(field.name.to_string(), value);
    }
    Ok(record)
}

fn select_all(conn: &Connection, collection: Collection) -> Result<Vec<Record>, StoreError> {
    let sql = format!("SELECT {} FROM {}", column_list(collection), collection.name());
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([], |row| row_to_record(collection, row))?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

fn select_one(conn: &Connection, collection: Collection, id: &str) -> Result<Option<Record>, StoreError> {
    let sql = format!(
        "SELECT {} FROM {} WHERE id = ?1",
        column_list(collection),
        collection.name()
    );
    Ok(conn
        .query_row(&sql, params![id], |row| row_to_record(collection, row))
        .optional()?)
}

/// Maps constraint violations to [`StoreError::Conflict`].
fn constraint_to_conflict(collection: Collection, err: rusqlite::Error) -> StoreError {
    match &err {
        rusqlite::Error::SqliteFailure(e, msg) if e.code == ErrorCode::ConstraintViolation => {
            StoreError::Conflict(format!(
                "{} constraint violated: {}",
                collection,
                msg.as_deref().unwrap_or("duplicate value")
            ))
        }
        _ => StoreError::Sqlite(err),
    }
}

impl Store for SqliteStore {
    fn init(&self) -> Result<(), StoreError> {
        let conn = self.connect()?;
        for collection in Collection::ALL {
            let sql = create_table_sql(collection);
            debug!("Ensuring table {}", collection);
            conn.execute(&sql, [])?;
        }
        Ok(())
    }

    fn list(&self, collection: Collection) -> Result<Vec<Record>, StoreError> {
        let conn = self.connect()?;
        select_all(&conn, collection)
    }

    fn find_by_id(&self, collection: Collection, id: &str) -> Result<Option<Record>, StoreError> {
        let conn = self.connect()?;
        select_one(&conn, collection, id)
    }

    fn add(&self, collection: Collection, partial: Record) -> Result<Record, StoreError> {
        let conn = self.connect()?;
        let record = new_record(collection, partial, now_millis());
        let fields = schema::fields(collection);
        let placeholders = (1..=fields.len())
            .map(|i| format!("?{}", i))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            collection.name(),
            column_list(collection),
            placeholders
        );
        let values = fields
            .iter()
            .map(|f| to_sql(f, &record))
            .collect::<Result<Vec<_>, _>>()?;
        conn.execute(&sql, params_from_iter(values))
            .map_err(|e| constraint_to_conflict(collection, e))?;
        Ok(record)
    }

    fn update(
        &self,
        collection: Collection,
        id: &str,
        partial: Record,
    ) -> Result<Option<Record>, StoreError> {
        let mut conn = self.connect()?;
        let tx = conn.transaction()?;
        let Some(existing) = select_one(&tx, collection, id)? else {
            return Ok(None);
        };
        let updated = merged_record(collection, &existing, partial, now_millis());

        // Surface username clashes as conflicts before touching the row.
        let others = select_all(&tx, collection)?;
        check_unique(collection, &others, &updated, Some(id))?;

        let fields: Vec<&Field> = schema::fields(collection)
            .iter()
            .filter(|f| f.name != "id" && f.name != "createdAt")
            .collect();
        let assignments = fields
            .iter()
            .enumerate()
            .map(|(i, f)| format!("{} = ?{}", f.column, i + 1))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "UPDATE {} SET {} WHERE id = ?{}",
            collection.name(),
            assignments,
            fields.len() + 1
        );
        let mut values = fields
            .iter()
            .map(|f| to_sql(f, &updated))
            .collect::<Result<Vec<_>, _>>()?;
        values.push(SqlValue::Text(id.to_string()));
        tx.execute(&sql, params_from_iter(values))
            .map_err(|e| constraint_to_conflict(collection, e))?;
        tx.commit()?;
        Ok(Some(updated))
    }

    fn remove(&self, collection: Collection, id: &str) -> Result<bool, StoreError> {
        let conn = self.connect()?;
        let sql = format!("DELETE FROM {} WHERE id = ?1", collection.name());
        let changed = conn.execute(&sql, params![id])?;
        Ok(changed > 0)
    }
}
