use rusqlite::{Connection, OptionalExtension};

use crate::errors::TripleStoreError;

pub const SCHEMA_VERSION: i64 = 1;

pub const DEFAULT_TABLE: &str = "statements";

pub fn ensure_schema(conn: &Connection) -> Result<(), TripleStoreError> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS store_meta (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            schema_version INTEGER NOT NULL
        );
        "#,
    )
    .map_err(|e| TripleStoreError::storage(e.to_string()))?;
    ensure_meta(conn)
}

/// Table names are interpolated into SQL, so only identifiers are accepted.
pub fn validate_table_name(table: &str) -> Result<(), TripleStoreError> {
    let valid = !table.is_empty()
        && table.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !table.starts_with(|c: char| c.is_ascii_digit());
    if valid {
        Ok(())
    } else {
        Err(TripleStoreError::invalid_input(format!(
            "invalid statement table name {table:?}"
        )))
    }
}

pub fn ensure_statement_table(conn: &Connection, table: &str) -> Result<(), TripleStoreError> {
    validate_table_name(table)?;
    conn.execute_batch(&format!(
        r#"
        CREATE TABLE IF NOT EXISTS {table} (
            subject   TEXT NOT NULL,
            predicate TEXT NOT NULL,
            object    TEXT NOT NULL,
            context   TEXT NOT NULL DEFAULT '',
            inferred  INTEGER NOT NULL,
            PRIMARY KEY (subject, predicate, object, context, inferred)
        ) WITHOUT ROWID;
        CREATE INDEX IF NOT EXISTS idx_{table}_predicate ON {table}(predicate, object);
        CREATE INDEX IF NOT EXISTS idx_{table}_object ON {table}(object);
        CREATE INDEX IF NOT EXISTS idx_{table}_context ON {table}(context, inferred);
        "#
    ))
    .map_err(|e| TripleStoreError::storage(e.to_string()))
}

pub fn read_schema_version(conn: &Connection) -> Result<i64, TripleStoreError> {
    conn.query_row(
        "SELECT schema_version FROM store_meta WHERE id=1",
        [],
        |row| row.get(0),
    )
    .map_err(|e| TripleStoreError::storage(e.to_string()))
}

fn ensure_meta(conn: &Connection) -> Result<(), TripleStoreError> {
    let version: Option<i64> = conn
        .query_row(
            "SELECT schema_version FROM store_meta WHERE id=1",
            [],
            |row| row.get(0),
        )
        .optional()
        .map_err(|e| TripleStoreError::storage(e.to_string()))?;
    match version {
        Some(existing) if existing > SCHEMA_VERSION => Err(TripleStoreError::storage(format!(
            "store schema version {existing} is newer than supported {SCHEMA_VERSION}"
        ))),
        Some(_) => Ok(()),
        None => {
            conn.execute(
                "INSERT INTO store_meta(id, schema_version) VALUES(1, ?1)",
                [SCHEMA_VERSION],
            )
            .map_err(|e| TripleStoreError::storage(e.to_string()))?;
            Ok(())
        }
    }
}
