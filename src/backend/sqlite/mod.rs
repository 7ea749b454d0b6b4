//! SQLite-backed statement set.
//!
//! Each backend owns one statements table. Backends created with
//! [`SqliteBackend::sibling`] share the connection (and therefore the
//! transaction) but keep their own table, which is how the explicit and
//! inferred sources of one store live in one database file.
//!
//! Writes run inside an implicit transaction opened on the first write after
//! a commit; [`StatementBackend::flush_for_commit`] commits it. The connection
//! reads its own uncommitted writes, so [`StatementBackend::flush_for_reading`]
//! has nothing to do. Query results are read on the connection and streamed
//! from memory afterwards, so no statement handle outlives the lock.

mod encoding;
mod schema;

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;
use rusqlite::{Connection, params, params_from_iter};

use crate::{
    errors::TripleStoreError,
    metrics::{BackendMetrics, BackendMetricsSnapshot},
    model::{Statement, StatementPattern, Term},
    stream::StatementStream,
};

use self::encoding::{EncodedStatement, encode_context, encode_term};
use self::schema::DEFAULT_TABLE;

use super::StatementBackend;

struct SqliteState {
    conn: Connection,
    in_transaction: bool,
}

impl SqliteState {
    fn begin_if_needed(&mut self) -> Result<(), TripleStoreError> {
        if !self.in_transaction {
            self.conn
                .execute_batch("BEGIN")
                .map_err(|e| TripleStoreError::storage(e.to_string()))?;
            self.in_transaction = true;
        }
        Ok(())
    }

    fn commit(&mut self) -> Result<(), TripleStoreError> {
        if self.in_transaction {
            self.conn
                .execute_batch("COMMIT")
                .map_err(|e| TripleStoreError::storage(e.to_string()))?;
            self.in_transaction = false;
        }
        Ok(())
    }
}

impl Drop for SqliteState {
    fn drop(&mut self) {
        // Writes never flushed for commit are discarded.
        if self.in_transaction {
            let _ = self.conn.execute_batch("ROLLBACK");
        }
    }
}

pub struct SqliteBackend {
    state: Arc<Mutex<SqliteState>>,
    table: String,
    metrics: BackendMetrics,
}

impl SqliteBackend {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, TripleStoreError> {
        let conn =
            Connection::open(path).map_err(|e| TripleStoreError::connection(e.to_string()))?;
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self, TripleStoreError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| TripleStoreError::connection(e.to_string()))?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self, TripleStoreError> {
        schema::ensure_schema(&conn)?;
        schema::ensure_statement_table(&conn, DEFAULT_TABLE)?;
        Ok(Self {
            state: Arc::new(Mutex::new(SqliteState {
                conn,
                in_transaction: false,
            })),
            table: DEFAULT_TABLE.to_string(),
            metrics: BackendMetrics::default(),
        })
    }

    /// A backend over another table of the same database and connection.
    pub fn sibling(&self, table: &str) -> Result<Self, TripleStoreError> {
        schema::ensure_statement_table(&self.state.lock().conn, table)?;
        Ok(Self {
            state: self.state.clone(),
            table: table.to_string(),
            metrics: BackendMetrics::default(),
        })
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Apply `PRAGMA key = value` settings to the connection.
    pub fn apply_pragmas(&self, pragmas: &HashMap<String, String>) -> Result<(), TripleStoreError> {
        let state = self.state.lock();
        for (key, value) in pragmas {
            let pragma_sql = format!("PRAGMA {} = {}", key, value);
            match state.conn.execute(&pragma_sql, []) {
                Ok(_) => {}
                // Some PRAGMAs report their new value as a result row.
                Err(rusqlite::Error::ExecuteReturnedResults) => {}
                Err(e) => {
                    return Err(TripleStoreError::connection(format!(
                        "PRAGMA {} = {}: {}",
                        key, value, e
                    )));
                }
            }
        }
        Ok(())
    }

    pub fn schema_version(&self) -> Result<i64, TripleStoreError> {
        schema::read_schema_version(&self.state.lock().conn)
    }

    pub fn metrics_snapshot(&self) -> BackendMetricsSnapshot {
        self.metrics.snapshot()
    }

    fn insert(&self, state: &mut SqliteState, statement: &Statement) -> Result<(), TripleStoreError> {
        let encoded = EncodedStatement::encode(statement)?;
        state.begin_if_needed()?;
        let sql = format!(
            "INSERT OR IGNORE INTO {}(subject, predicate, object, context, inferred) VALUES(?1, ?2, ?3, ?4, ?5)",
            self.table
        );
        state
            .conn
            .prepare_cached(&sql)
            .and_then(|mut stmt| {
                stmt.execute(params![
                    encoded.subject,
                    encoded.predicate,
                    encoded.object,
                    encoded.context,
                    encoded.inferred,
                ])
            })
            .map_err(|e| TripleStoreError::storage(e.to_string()))?;
        Ok(())
    }

    fn delete(&self, state: &mut SqliteState, statement: &Statement) -> Result<(), TripleStoreError> {
        let encoded = EncodedStatement::encode(statement)?;
        state.begin_if_needed()?;
        let sql = format!(
            "DELETE FROM {} WHERE subject=?1 AND predicate=?2 AND object=?3 AND context=?4 AND inferred=?5",
            self.table
        );
        state
            .conn
            .prepare_cached(&sql)
            .and_then(|mut stmt| {
                stmt.execute(params![
                    encoded.subject,
                    encoded.predicate,
                    encoded.object,
                    encoded.context,
                    encoded.inferred,
                ])
            })
            .map_err(|e| TripleStoreError::storage(e.to_string()))?;
        Ok(())
    }
}

/// WHERE clause and its positional arguments for a pattern.
fn where_clause(pattern: &StatementPattern) -> Result<(String, Vec<String>), TripleStoreError> {
    let mut conditions = vec![format!("inferred={}", i64::from(pattern.is_inferred()))];
    let mut args = Vec::new();
    let slots: [(&str, Option<&Term>); 3] = [
        ("subject", pattern.subject_term()),
        ("predicate", pattern.predicate_term()),
        ("object", pattern.object_term()),
    ];
    for (column, term) in slots {
        if let Some(term) = term {
            args.push(encode_term(term)?);
            conditions.push(format!("{column}=?{}", args.len()));
        }
    }
    if !pattern.contexts().is_empty() {
        let mut placeholders = Vec::with_capacity(pattern.contexts().len());
        for context in pattern.contexts() {
            args.push(encode_context(context)?);
            placeholders.push(format!("?{}", args.len()));
        }
        conditions.push(format!("context IN ({})", placeholders.join(", ")));
    }
    Ok((conditions.join(" AND "), args))
}

impl StatementBackend for SqliteBackend {
    fn add(&self, statement: &Statement) -> Result<(), TripleStoreError> {
        self.metrics.record_add();
        self.insert(&mut self.state.lock(), statement)
    }

    fn remove(&self, statement: &Statement) -> Result<(), TripleStoreError> {
        self.metrics.record_remove();
        self.delete(&mut self.state.lock(), statement)
    }

    fn add_all(&self, statements: &[Statement]) -> Result<(), TripleStoreError> {
        let mut state = self.state.lock();
        for statement in statements {
            self.metrics.record_add();
            self.insert(&mut state, statement)?;
        }
        Ok(())
    }

    fn remove_all(&self, statements: &[Statement]) -> Result<(), TripleStoreError> {
        let mut state = self.state.lock();
        for statement in statements {
            self.metrics.record_remove();
            self.delete(&mut state, statement)?;
        }
        Ok(())
    }

    fn query(&self, pattern: &StatementPattern) -> Result<StatementStream, TripleStoreError> {
        self.metrics.record_query();
        let (conditions, args) = where_clause(pattern)?;
        let sql = format!(
            "SELECT subject, predicate, object, context, inferred FROM {} WHERE {conditions}",
            self.table
        );

        let state = self.state.lock();
        let mut stmt = state
            .conn
            .prepare_cached(&sql)
            .map_err(|e| TripleStoreError::storage(e.to_string()))?;
        let rows = stmt
            .query_map(params_from_iter(args.iter()), |row| {
                Ok(EncodedStatement {
                    subject: row.get(0)?,
                    predicate: row.get(1)?,
                    object: row.get(2)?,
                    context: row.get(3)?,
                    inferred: row.get(4)?,
                })
            })
            .map_err(|e| TripleStoreError::storage(e.to_string()))?;
        let mut statements = Vec::new();
        for row in rows {
            let encoded = row.map_err(|e| TripleStoreError::storage(e.to_string()))?;
            statements.push(encoded.decode()?);
        }
        Ok(StatementStream::from_vec(statements))
    }

    fn flush_for_reading(&self) -> Result<(), TripleStoreError> {
        self.metrics.record_read_flush();
        Ok(())
    }

    fn flush_for_commit(&self) -> Result<(), TripleStoreError> {
        self.metrics.record_commit_flush();
        self.state.lock().commit()
    }

    fn remove_by_query(&self, pattern: &StatementPattern) -> Result<bool, TripleStoreError> {
        let (conditions, args) = where_clause(pattern)?;
        let sql = format!("DELETE FROM {} WHERE {conditions}", self.table);
        let mut state = self.state.lock();
        state.begin_if_needed()?;
        let removed = state
            .conn
            .execute(&sql, params_from_iter(args.iter()))
            .map_err(|e| TripleStoreError::storage(e.to_string()))?;
        Ok(removed > 0)
    }

    fn estimated_size(&self) -> Result<u64, TripleStoreError> {
        let sql = format!("SELECT COUNT(*) FROM {}", self.table);
        let count: i64 = self
            .state
            .lock()
            .conn
            .query_row(&sql, [], |row| row.get(0))
            .map_err(|e| TripleStoreError::storage(e.to_string()))?;
        Ok(count.max(0) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_schema_version() {
        let backend = SqliteBackend::open_in_memory().unwrap();
        assert_eq!(backend.schema_version().unwrap(), schema::SCHEMA_VERSION);
        assert_eq!(backend.table(), DEFAULT_TABLE);
    }

    #[test]
    fn test_literals_and_contexts_round_trip() {
        let backend = SqliteBackend::open_in_memory().unwrap();
        let statement = Statement::new("ex:s", "ex:label", Term::lang_literal("hallo", "de"))
            .in_context("ex:g");
        backend.add(&statement).unwrap();
        let found = backend
            .query(&StatementPattern::any().object(Term::lang_literal("hallo", "de")))
            .unwrap()
            .collect_statements()
            .unwrap();
        assert_eq!(found, vec![statement]);
    }

    #[test]
    fn test_committed_writes_survive_reopen() {
        let temp_dir = tempdir().unwrap();
        let db_path = temp_dir.path().join("store.db");
        {
            let backend = SqliteBackend::open(&db_path).unwrap();
            backend.add(&Statement::new("ex:a", "ex:p", "ex:o")).unwrap();
            backend.flush_for_commit().unwrap();
            backend.add(&Statement::new("ex:b", "ex:p", "ex:o")).unwrap();
        }
        let reopened = SqliteBackend::open(&db_path).unwrap();
        assert_eq!(reopened.estimated_size().unwrap(), 1);
    }

    #[test]
    fn test_siblings_keep_separate_tables() {
        let explicit = SqliteBackend::open_in_memory().unwrap();
        let inferred = explicit.sibling("inferred_statements").unwrap();
        explicit.add(&Statement::new("ex:a", "ex:p", "ex:o")).unwrap();
        inferred.add(&Statement::new("ex:a", "ex:p", "ex:o").inferred()).unwrap();
        inferred.add(&Statement::new("ex:b", "ex:p", "ex:o").inferred()).unwrap();
        explicit.flush_for_commit().unwrap();

        assert_eq!(explicit.estimated_size().unwrap(), 1);
        assert_eq!(inferred.estimated_size().unwrap(), 2);
        assert!(explicit.sibling("bad table; --").is_err());
    }

    #[test]
    fn test_clear_limits_to_contexts_and_flag() {
        let backend = SqliteBackend::open_in_memory().unwrap();
        backend.add(&Statement::new("ex:a", "ex:p", "ex:o")).unwrap();
        backend.add(&Statement::new("ex:b", "ex:p", "ex:o").in_context("ex:g")).unwrap();
        backend.add(&Statement::new("ex:c", "ex:p", "ex:o").in_context("ex:g").inferred()).unwrap();

        backend.clear(false, &[Some(Term::iri("ex:g"))]).unwrap();

        assert_eq!(backend.estimated_size().unwrap(), 2);
        let inferred = backend
            .query(&StatementPattern::any().inferred(true))
            .unwrap()
            .count_statements()
            .unwrap();
        assert_eq!(inferred, 1);
    }
}
