//! In-memory storage driver for Rowmap.
//!
//! [`MemoryDriver`] implements the core `Driver`/`Connection` traits over a
//! shared in-process table store. It understands exactly the statement
//! shapes the session runtime and schema generator emit (parameterized
//! INSERT/SELECT/UPDATE/DELETE plus CREATE/DROP TABLE) and rejects
//! everything else.
//!
//! The driver exists for tests and demos: it records every executed
//! statement in an inspectable log, counts physical connections, and keeps
//! per-connection snapshots so transactions can roll back. Temporal bind
//! values are stored in their raw driver form (`Value::to_sql`), the way a
//! real driver would hand back SQL timestamps, so materialization exercises
//! the runtime's coercion path.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;

use rowmap_core::{Connection, Driver, DriverError, DriverResult, Row, Value};

type StoredRow = Vec<(String, Value)>;
type Table = Vec<StoredRow>;

/// One executed statement with its bound parameters.
#[derive(Debug, Clone)]
pub struct StatementRecord {
    /// The SQL text as received.
    pub sql: String,
    /// The bound parameters, in raw driver form.
    pub params: Vec<Value>,
}

/// The shared table store behind every connection of one driver instance.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<HashMap<String, Table>>,
    log: Mutex<Vec<StatementRecord>>,
    opened: AtomicUsize,
}

impl MemoryStore {
    /// SQL texts of every statement executed so far, in order.
    #[must_use]
    pub fn statement_log(&self) -> Vec<String> {
        self.log.lock().iter().map(|r| r.sql.clone()).collect()
    }

    /// Full statement records, including bound parameters.
    #[must_use]
    pub fn records(&self) -> Vec<StatementRecord> {
        self.log.lock().clone()
    }

    /// Forget the statement log (the data stays).
    pub fn clear_log(&self) {
        self.log.lock().clear();
    }

    /// Number of physical connections opened through the driver.
    #[must_use]
    pub fn connections_opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    /// Number of rows currently in `table` (0 for unknown tables).
    #[must_use]
    pub fn row_count(&self, table: &str) -> usize {
        self.tables.lock().get(table).map_or(0, Vec::len)
    }

    /// Whether the table exists (created or written to).
    #[must_use]
    pub fn table_exists(&self, table: &str) -> bool {
        self.tables.lock().contains_key(table)
    }

    /// Fetch one cell: the `column` value of the row whose `id` column
    /// equals the given id. Test convenience.
    #[must_use]
    pub fn cell(&self, table: &str, id: i64, column: &str) -> Option<Value> {
        let tables = self.tables.lock();
        let rows = tables.get(table)?;
        rows.iter()
            .find(|row| row_value(row, "id") == Some(&Value::Int(id)))
            .and_then(|row| row_value(row, column).cloned())
    }

    fn record(&self, sql: &str, params: &[Value]) {
        self.log.lock().push(StatementRecord {
            sql: sql.to_string(),
            params: params.to_vec(),
        });
    }
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("tables", &self.tables.lock().len())
            .field("statements", &self.log.lock().len())
            .finish()
    }
}

fn row_value<'a>(row: &'a StoredRow, column: &str) -> Option<&'a Value> {
    row.iter()
        .find(|(name, _)| name == column)
        .map(|(_, value)| value)
}

/// An in-memory driver handle. Clones share the same store.
#[derive(Clone, Default)]
pub struct MemoryDriver {
    store: Arc<MemoryStore>,
}

impl MemoryDriver {
    /// Create a driver over a fresh, empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The shared store, for test assertions.
    #[must_use]
    pub fn store(&self) -> &Arc<MemoryStore> {
        &self.store
    }
}

impl std::fmt::Debug for MemoryDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryDriver").finish_non_exhaustive()
    }
}

impl Driver for MemoryDriver {
    fn name(&self) -> &str {
        "memory"
    }

    fn connect(&self) -> DriverResult<Box<dyn Connection>> {
        self.store.opened.fetch_add(1, Ordering::SeqCst);
        tracing::debug!("Opened in-memory connection");
        Ok(Box::new(MemoryConnection {
            store: Arc::clone(&self.store),
            auto_commit: true,
            savepoint: None,
            closed: false,
        }))
    }
}

/// One physical connection to the shared store.
pub struct MemoryConnection {
    store: Arc<MemoryStore>,
    auto_commit: bool,
    savepoint: Option<HashMap<String, Table>>,
    closed: bool,
}

impl MemoryConnection {
    fn ensure_open(&self) -> DriverResult<()> {
        if self.closed {
            return Err(DriverError::new("connection is closed"));
        }
        Ok(())
    }
}

impl Connection for MemoryConnection {
    fn execute(&mut self, sql: &str, params: &[Value]) -> DriverResult<u64> {
        self.ensure_open()?;
        let params: Vec<Value> = params.iter().map(|v| v.clone().to_sql()).collect();
        self.store.record(sql, &params);

        let statement = sql.trim().trim_end_matches(';').trim();
        let upper = statement.to_ascii_uppercase();
        let mut tables = self.store.tables.lock();

        if upper.starts_with("INSERT INTO ") {
            let (table, columns) = parse_insert(statement)?;
            if columns.len() != params.len() {
                return Err(DriverError::new(format!(
                    "expected {} parameters, got {}",
                    columns.len(),
                    params.len()
                )));
            }
            let row: StoredRow = columns.into_iter().zip(params).collect();
            tables.entry(table).or_default().push(row);
            Ok(1)
        } else if upper.starts_with("UPDATE ") {
            let (table, assignments, where_column) = parse_update(statement)?;
            if assignments.len() + 1 != params.len() {
                return Err(DriverError::new(format!(
                    "expected {} parameters, got {}",
                    assignments.len() + 1,
                    params.len()
                )));
            }
            let (values, filter) = params.split_at(assignments.len());
            let mut affected = 0;
            if let Some(rows) = tables.get_mut(&table) {
                for row in rows
                    .iter_mut()
                    .filter(|row| row_value(row, &where_column) == filter.first())
                {
                    for (column, value) in assignments.iter().zip(values) {
                        match row.iter_mut().find(|(name, _)| name == column) {
                            Some((_, slot)) => *slot = value.clone(),
                            None => row.push((column.clone(), value.clone())),
                        }
                    }
                    affected += 1;
                }
            }
            Ok(affected)
        } else if upper.starts_with("DELETE FROM ") {
            let (table, where_column) = parse_delete(statement)?;
            let mut affected = 0;
            if let Some(rows) = tables.get_mut(&table) {
                let before = rows.len();
                rows.retain(|row| row_value(row, &where_column) != params.first());
                affected = (before - rows.len()) as u64;
            }
            Ok(affected)
        } else if upper.starts_with("CREATE TABLE ") {
            let table = parse_create_table(statement)?;
            tables.entry(table).or_default();
            Ok(0)
        } else if upper.starts_with("DROP TABLE ") {
            let table = parse_drop_table(statement);
            tables.remove(&table);
            Ok(0)
        } else {
            Err(DriverError::new(format!("unsupported statement: {sql}")))
        }
    }

    fn query(&mut self, sql: &str, params: &[Value]) -> DriverResult<Vec<Row>> {
        self.ensure_open()?;
        let params: Vec<Value> = params.iter().map(|v| v.clone().to_sql()).collect();
        self.store.record(sql, &params);

        let statement = sql.trim().trim_end_matches(';').trim();
        let (table, where_column) = parse_select(statement)?;

        let tables = self.store.tables.lock();
        let Some(rows) = tables.get(&table) else {
            return Ok(Vec::new());
        };
        Ok(rows
            .iter()
            .filter(|row| row_value(row, &where_column) == params.first())
            .map(|row| {
                let mut out = Row::new();
                for (column, value) in row {
                    out.push(column.clone(), value.clone());
                }
                out
            })
            .collect())
    }

    fn set_auto_commit(&mut self, auto_commit: bool) -> DriverResult<()> {
        self.ensure_open()?;
        if auto_commit {
            self.savepoint = None;
        } else if self.savepoint.is_none() {
            self.savepoint = Some(self.store.tables.lock().clone());
        }
        self.auto_commit = auto_commit;
        Ok(())
    }

    fn auto_commit(&self) -> bool {
        self.auto_commit
    }

    fn commit(&mut self) -> DriverResult<()> {
        self.ensure_open()?;
        if !self.auto_commit {
            // Published; start the next scope from the current state.
            self.savepoint = Some(self.store.tables.lock().clone());
        }
        Ok(())
    }

    fn rollback(&mut self) -> DriverResult<()> {
        self.ensure_open()?;
        if let Some(snapshot) = &self.savepoint {
            *self.store.tables.lock() = snapshot.clone();
        }
        Ok(())
    }

    fn close(&mut self) -> DriverResult<()> {
        self.closed = true;
        Ok(())
    }
}

impl std::fmt::Debug for MemoryConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryConnection")
            .field("auto_commit", &self.auto_commit)
            .field("closed", &self.closed)
            .finish()
    }
}

// --- statement parsing -----------------------------------------------------
//
// The supported grammar is exactly what the runtime emits; anything else is
// an unsupported-statement error.

fn parse_insert(statement: &str) -> DriverResult<(String, Vec<String>)> {
    let rest = &statement["INSERT INTO ".len()..];
    let open = rest
        .find('(')
        .ok_or_else(|| malformed("INSERT", statement))?;
    let table = rest[..open].trim().to_string();
    let close = rest[open..]
        .find(')')
        .map(|i| open + i)
        .ok_or_else(|| malformed("INSERT", statement))?;
    let columns = rest[open + 1..close]
        .split(',')
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
        .collect();
    Ok((table, columns))
}

fn parse_select(statement: &str) -> DriverResult<(String, String)> {
    let rest = statement
        .strip_prefix("SELECT * FROM ")
        .ok_or_else(|| malformed("SELECT", statement))?;
    let (table, condition) = rest
        .split_once(" WHERE ")
        .ok_or_else(|| malformed("SELECT", statement))?;
    let column = condition
        .strip_suffix("= ?")
        .ok_or_else(|| malformed("SELECT", statement))?;
    Ok((table.trim().to_string(), column.trim().to_string()))
}

fn parse_update(statement: &str) -> DriverResult<(String, Vec<String>, String)> {
    let rest = &statement["UPDATE ".len()..];
    let (table, rest) = rest
        .split_once(" SET ")
        .ok_or_else(|| malformed("UPDATE", statement))?;
    let (assignments, condition) = rest
        .split_once(" WHERE ")
        .ok_or_else(|| malformed("UPDATE", statement))?;
    let columns = assignments
        .split(',')
        .map(|a| a.trim().trim_end_matches("= ?").trim().to_string())
        .filter(|c| !c.is_empty())
        .collect();
    let where_column = condition
        .strip_suffix("= ?")
        .ok_or_else(|| malformed("UPDATE", statement))?;
    Ok((
        table.trim().to_string(),
        columns,
        where_column.trim().to_string(),
    ))
}

fn parse_delete(statement: &str) -> DriverResult<(String, String)> {
    let rest = &statement["DELETE FROM ".len()..];
    let (table, condition) = rest
        .split_once(" WHERE ")
        .ok_or_else(|| malformed("DELETE", statement))?;
    let column = condition
        .strip_suffix("= ?")
        .ok_or_else(|| malformed("DELETE", statement))?;
    Ok((table.trim().to_string(), column.trim().to_string()))
}

fn parse_create_table(statement: &str) -> DriverResult<String> {
    let rest = &statement["CREATE TABLE ".len()..];
    let end = rest.find('(').unwrap_or(rest.len());
    let table = rest[..end].trim();
    if table.is_empty() {
        return Err(malformed("CREATE TABLE", statement));
    }
    Ok(table.to_string())
}

fn parse_drop_table(statement: &str) -> String {
    let rest = statement["DROP TABLE ".len()..].trim();
    rest.strip_prefix("IF EXISTS ")
        .unwrap_or(rest)
        .trim()
        .to_string()
}

fn malformed(kind: &str, statement: &str) -> DriverError {
    DriverError::new(format!("malformed {kind} statement: {statement}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn connect(driver: &MemoryDriver) -> Box<dyn Connection> {
        driver.connect().unwrap()
    }

    #[test]
    fn test_insert_and_select_round_trip() {
        let driver = MemoryDriver::new();
        let mut conn = connect(&driver);

        conn.execute(
            "INSERT INTO person(id, name, age) VALUES(?,?,?);",
            &[Value::Int(7), Value::Text("John".into()), Value::Int(30)],
        )
        .unwrap();

        let rows = conn
            .query("SELECT * FROM person WHERE id = ?;", &[Value::Int(7)])
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("name"), Some(&Value::Text("John".into())));
        assert_eq!(rows[0].get("age"), Some(&Value::Int(30)));
    }

    #[test]
    fn test_update_rewrites_matching_rows() {
        let driver = MemoryDriver::new();
        let mut conn = connect(&driver);
        conn.execute(
            "INSERT INTO person(id, name, age) VALUES(?,?,?);",
            &[Value::Int(7), Value::Text("John".into()), Value::Int(30)],
        )
        .unwrap();

        let affected = conn
            .execute(
                "UPDATE person SET name = ?, age = ? WHERE id = ?;",
                &[Value::Text("Jane".into()), Value::Int(31), Value::Int(7)],
            )
            .unwrap();
        assert_eq!(affected, 1);
        assert_eq!(
            driver.store().cell("person", 7, "name"),
            Some(Value::Text("Jane".into()))
        );
    }

    #[test]
    fn test_delete_removes_matching_rows() {
        let driver = MemoryDriver::new();
        let mut conn = connect(&driver);
        conn.execute(
            "INSERT INTO person(id, name, age) VALUES(?,?,?);",
            &[Value::Int(7), Value::Text("John".into()), Value::Int(30)],
        )
        .unwrap();

        let affected = conn
            .execute("DELETE FROM person WHERE id = ?;", &[Value::Int(7)])
            .unwrap();
        assert_eq!(affected, 1);
        assert_eq!(driver.store().row_count("person"), 0);
    }

    #[test]
    fn test_select_on_unknown_table_is_empty() {
        let driver = MemoryDriver::new();
        let mut conn = connect(&driver);
        let rows = conn
            .query("SELECT * FROM nothing WHERE id = ?;", &[Value::Int(1)])
            .unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn test_unsupported_statement_is_rejected() {
        let driver = MemoryDriver::new();
        let mut conn = connect(&driver);
        let result = conn.execute("TRUNCATE TABLE person;", &[]);
        assert!(result.is_err());
    }

    #[test]
    fn test_create_and_drop_table() {
        let driver = MemoryDriver::new();
        let mut conn = connect(&driver);
        conn.execute("CREATE TABLE person (id BIGINT PRIMARY KEY, name TEXT);", &[])
            .unwrap();
        assert!(driver.store().table_exists("person"));
        assert_eq!(driver.store().row_count("person"), 0);

        conn.execute("DROP TABLE IF EXISTS person;", &[]).unwrap();
        assert!(!driver.store().table_exists("person"));
    }

    #[test]
    fn test_rollback_restores_snapshot() {
        let driver = MemoryDriver::new();
        let mut conn = connect(&driver);
        conn.execute(
            "INSERT INTO person(id, name, age) VALUES(?,?,?);",
            &[Value::Int(1), Value::Text("Kept".into()), Value::Int(1)],
        )
        .unwrap();

        conn.set_auto_commit(false).unwrap();
        conn.execute(
            "INSERT INTO person(id, name, age) VALUES(?,?,?);",
            &[Value::Int(2), Value::Text("Discarded".into()), Value::Int(2)],
        )
        .unwrap();
        assert_eq!(driver.store().row_count("person"), 2);

        conn.rollback().unwrap();
        assert_eq!(driver.store().row_count("person"), 1);
    }

    #[test]
    fn test_commit_publishes_and_advances_snapshot() {
        let driver = MemoryDriver::new();
        let mut conn = connect(&driver);
        conn.set_auto_commit(false).unwrap();
        conn.execute(
            "INSERT INTO person(id, name, age) VALUES(?,?,?);",
            &[Value::Int(1), Value::Text("John".into()), Value::Int(30)],
        )
        .unwrap();
        conn.commit().unwrap();

        // A rollback after commit does not undo published rows.
        conn.rollback().unwrap();
        assert_eq!(driver.store().row_count("person"), 1);
    }

    #[test]
    fn test_temporal_values_stored_in_raw_form() {
        let driver = MemoryDriver::new();
        let mut conn = connect(&driver);
        let date = chrono::NaiveDate::from_ymd_opt(2021, 6, 15).unwrap();
        conn.execute(
            "INSERT INTO event(id, held_on) VALUES(?,?);",
            &[Value::Int(1), Value::LocalDate(date)],
        )
        .unwrap();

        let rows = conn
            .query("SELECT * FROM event WHERE id = ?;", &[Value::Int(1)])
            .unwrap();
        let stored = rows[0].get("held_on").unwrap();
        assert!(matches!(stored, Value::Date(_)));
        assert_eq!(stored.clone().from_sql(), Value::LocalDate(date));
    }

    #[test]
    fn test_statement_log_and_connection_counter() {
        let driver = MemoryDriver::new();
        let mut conn = connect(&driver);
        let _ = connect(&driver);
        assert_eq!(driver.store().connections_opened(), 2);

        conn.execute(
            "INSERT INTO person(id, name, age) VALUES(?,?,?);",
            &[Value::Int(1), Value::Text("John".into()), Value::Int(30)],
        )
        .unwrap();
        conn.query("SELECT * FROM person WHERE id = ?;", &[Value::Int(1)])
            .unwrap();

        let log = driver.store().statement_log();
        assert_eq!(log.len(), 2);
        assert!(log[0].starts_with("INSERT"));
        assert!(log[1].starts_with("SELECT"));
    }

    #[test]
    fn test_closed_connection_rejects_statements() {
        let driver = MemoryDriver::new();
        let mut conn = connect(&driver);
        conn.close().unwrap();
        assert!(conn.execute("DELETE FROM person WHERE id = ?;", &[Value::Int(1)]).is_err());
    }
}
