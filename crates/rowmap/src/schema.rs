//! DDL generation from entity descriptors.
//!
//! Renders `CREATE TABLE`/`DROP TABLE` statements for registered entity
//! types and executes them over a pool lease. Id and simple columns map to
//! their SQL types; to-one columns contribute their foreign-key column;
//! to-many associations own no column and are skipped. Schema migration is
//! out of scope; this covers initial table creation the way a demo or test
//! sets itself up.

use std::sync::Arc;

use rowmap_core::{ColumnKind, EntityDescriptor, Error, Result};
use rowmap_pool::ConnectionPool;

/// Render the CREATE TABLE statement for an entity.
///
/// A to-one association sharing its foreign-key column with a declared
/// simple column contributes nothing extra; the column is rendered once.
#[must_use]
pub fn create_table_sql(descriptor: &EntityDescriptor) -> String {
    let mut rendered = std::collections::HashSet::new();
    let mut definitions = Vec::new();
    for column in descriptor.columns() {
        let Some(sql_type) = column.sql_type() else {
            continue;
        };
        if !rendered.insert(column.column()) {
            continue;
        }
        match column.kind() {
            ColumnKind::Id => {
                definitions.push(format!(
                    "{} {} PRIMARY KEY",
                    column.column(),
                    sql_type.as_sql()
                ));
            }
            ColumnKind::Simple | ColumnKind::ToOne => {
                definitions.push(format!("{} {}", column.column(), sql_type.as_sql()));
            }
            ColumnKind::ToMany => {}
        }
    }
    format!(
        "CREATE TABLE {} ({});",
        descriptor.table(),
        definitions.join(", ")
    )
}

/// Render the DROP TABLE statement for an entity.
#[must_use]
pub fn drop_table_sql(descriptor: &EntityDescriptor) -> String {
    format!("DROP TABLE IF EXISTS {};", descriptor.table())
}

/// Executes generated DDL over a pool lease.
#[derive(Debug)]
pub struct SchemaManager {
    pool: Arc<ConnectionPool>,
}

impl SchemaManager {
    /// Create a manager over the shared pool.
    #[must_use]
    pub fn new(pool: Arc<ConnectionPool>) -> Self {
        Self { pool }
    }

    /// Create tables for all given descriptors, in order.
    pub fn create_all(&self, descriptors: &[&'static EntityDescriptor]) -> Result<()> {
        let mut conn = self.pool.acquire()?;
        for descriptor in descriptors {
            let statement = create_table_sql(descriptor);
            tracing::debug!(table = descriptor.table(), sql = %statement, "Creating table");
            conn.execute(&statement, &[])
                .map_err(|e| Error::statement(statement.as_str(), e))?;
        }
        Ok(())
    }

    /// Drop tables for all given descriptors, in reverse order.
    pub fn drop_all(&self, descriptors: &[&'static EntityDescriptor]) -> Result<()> {
        let mut conn = self.pool.acquire()?;
        for descriptor in descriptors.iter().rev() {
            let statement = drop_table_sql(descriptor);
            tracing::debug!(table = descriptor.table(), sql = %statement, "Dropping table");
            conn.execute(&statement, &[])
                .map_err(|e| Error::statement(statement.as_str(), e))?;
        }
        Ok(())
    }
}
