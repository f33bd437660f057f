//! Descriptor-driven SQL execution and row materialization.
//!
//! The persister is the only component that talks to the SQL layer. It
//! generates statements from entity descriptors, executes them over a leased
//! connection, and maps result rows back into managed entities, eagerly
//! resolving to-one associations and installing lazy handles for to-many
//! ones. Every materialized row passes through the persistence context so
//! repeated loads of one key yield the same managed instance.
//!
//! Connections are leased through the transaction manager when a transaction
//! is active (the transaction's single bound connection) and from the pool
//! per operation otherwise. Result rows are fully drained before
//! materialization starts, so recursive loads never hold two leases at once.

use std::any::Any;
use std::cell::RefCell;
use std::rc::{Rc, Weak};
use std::sync::Arc;

use rowmap_core::{
    ColumnKind, Connection, EntityDescriptor, EntityKey, Error, LazyHandle, Result, Row, Value,
};
use rowmap_pool::ConnectionPool;

use crate::context::PersistenceContext;
use crate::sql;
use crate::transaction::TransactionManager;

/// Executes entity writes and reads against the storage layer.
pub struct EntityPersister {
    weak_self: Weak<EntityPersister>,
    pool: Arc<ConnectionPool>,
    tx: Rc<RefCell<TransactionManager>>,
    context: Rc<RefCell<PersistenceContext>>,
}

impl EntityPersister {
    /// Create a persister sharing the session's pool, transaction manager
    /// and persistence context.
    #[must_use]
    pub fn new(
        pool: Arc<ConnectionPool>,
        tx: Rc<RefCell<TransactionManager>>,
        context: Rc<RefCell<PersistenceContext>>,
    ) -> Rc<Self> {
        Rc::new_cyclic(|weak_self| Self {
            weak_self: weak_self.clone(),
            pool,
            tx,
            context,
        })
    }

    /// Run an operation over the appropriate connection: the transaction's
    /// bound connection when one is active, a fresh pool lease otherwise.
    fn run<R>(&self, f: impl FnOnce(&mut dyn Connection) -> Result<R>) -> Result<R> {
        let mut tx = self.tx.borrow_mut();
        if tx.is_active() {
            f(tx.connection()?)
        } else {
            drop(tx);
            let mut lease = self.pool.acquire()?;
            f(&mut *lease)
        }
    }

    /// INSERT the entity: id + simple columns in descriptor order.
    pub fn insert(&self, descriptor: &'static EntityDescriptor, cell: &Rc<dyn Any>) -> Result<()> {
        let statement = sql::insert_sql(descriptor)?;
        let params: Vec<Value> = descriptor
            .insertable_columns()
            .map(|c| c.read(cell.as_ref()))
            .collect();
        tracing::debug!(table = descriptor.table(), sql = %statement, "Inserting entity");
        self.run(|conn| {
            conn.execute(&statement, &params)
                .map_err(|e| Error::statement(statement.as_str(), e))
        })?;
        Ok(())
    }

    /// UPDATE the entity's simple columns, id bound last.
    pub fn update(&self, descriptor: &'static EntityDescriptor, cell: &Rc<dyn Any>) -> Result<()> {
        let statement = sql::update_sql(descriptor)?;
        let mut params: Vec<Value> = descriptor
            .updatable_columns()
            .map(|c| c.read(cell.as_ref()))
            .collect();
        params.push(descriptor.id_value(cell.as_ref())?);
        tracing::debug!(table = descriptor.table(), sql = %statement, "Updating entity");
        self.run(|conn| {
            conn.execute(&statement, &params)
                .map_err(|e| Error::statement(statement.as_str(), e))
        })?;
        Ok(())
    }

    /// DELETE the entity's row by id.
    pub fn delete(&self, descriptor: &'static EntityDescriptor, cell: &Rc<dyn Any>) -> Result<()> {
        let statement = sql::delete_sql(descriptor)?;
        let params = [descriptor.id_value(cell.as_ref())?];
        tracing::debug!(table = descriptor.table(), sql = %statement, "Deleting entity");
        self.run(|conn| {
            conn.execute(&statement, &params)
                .map_err(|e| Error::statement(statement.as_str(), e))
        })?;
        Ok(())
    }

    /// SELECT all rows matching `column = value` and materialize them into
    /// managed entities.
    pub fn find_all_by(
        &self,
        descriptor: &'static EntityDescriptor,
        column: &str,
        value: Value,
    ) -> Result<Vec<Rc<dyn Any>>> {
        let statement = sql::select_by_column_sql(descriptor.table(), column);
        tracing::debug!(table = descriptor.table(), sql = %statement, "Selecting entities");
        let params = [value];
        let rows = self.run(|conn| {
            conn.query(&statement, &params)
                .map_err(|e| Error::statement(statement.as_str(), e))
        })?;

        let mut entities = Vec::with_capacity(rows.len());
        for row in rows {
            entities.push(self.materialize(descriptor, &row)?);
        }
        Ok(entities)
    }

    /// Like [`EntityPersister::find_all_by`] but requires exactly one match.
    pub fn find_one_by(
        &self,
        descriptor: &'static EntityDescriptor,
        column: &str,
        value: Value,
    ) -> Result<Rc<dyn Any>> {
        let mut results = self.find_all_by(descriptor, column, value)?;
        let actual = results.len();
        match results.pop() {
            Some(cell) if actual == 1 => Ok(cell),
            _ => Err(Error::UnexpectedRowCount {
                expected: 1,
                actual,
            }),
        }
    }

    /// Load by primary key, checking the persistence context first. A cache
    /// hit returns the managed instance without touching storage.
    pub fn find_by_id(&self, descriptor: &'static EntityDescriptor, id: Value) -> Result<Rc<dyn Any>> {
        let key = EntityKey::new(id.clone(), descriptor.type_id(), descriptor.entity_name());
        if let Some(cached) = self.context.borrow().get_entity(&key) {
            tracing::trace!(%key, "Returning cached entity from the context");
            return Ok(cached);
        }
        tracing::trace!(%key, "No cached entity found, loading from storage");
        let id_column = descriptor.id_column()?;
        self.find_one_by(descriptor, id_column.column(), id)
    }

    /// Build an entity from a result row and hand it to the persistence
    /// context. Returns the managed cell (which may be a previously cached
    /// instance for the same key).
    fn materialize(&self, descriptor: &'static EntityDescriptor, row: &Row) -> Result<Rc<dyn Any>> {
        let cell = descriptor.new_cell();
        for column in descriptor.columns() {
            match column.kind() {
                ColumnKind::Id => {
                    if let Some(value) = row.get(column.column()) {
                        column.write(cell.as_ref(), value.clone());
                    }
                }
                ColumnKind::Simple => {
                    if let Some(value) = row.get(column.column()) {
                        column.write(cell.as_ref(), value.clone().from_sql());
                    }
                }
                ColumnKind::ToOne => {
                    let Some(related) = column.related_descriptor() else {
                        continue;
                    };
                    let Some(fk) = row.get(column.column()) else {
                        continue;
                    };
                    if fk.is_null() {
                        continue;
                    }
                    let related_id = related.id_column()?;
                    let loaded = self.find_one_by(related, related_id.column(), fk.clone())?;
                    column.write_related(cell.as_ref(), loaded);
                }
                ColumnKind::ToMany => {
                    let Some(related) = column.related_descriptor() else {
                        continue;
                    };
                    let Some(join_field) = column.join_field() else {
                        continue;
                    };
                    let join_column = related.column_for_field(join_field)?.column();
                    let id_column = descriptor.id_column()?;
                    let Some(owner_id) = row.get(id_column.column()).cloned() else {
                        continue;
                    };
                    let Some(persister) = self.weak_self.upgrade() else {
                        continue;
                    };
                    let handle = LazyHandle::new(move || {
                        persister.find_all_by(related, join_column, owner_id.clone())
                    });
                    column.bind_collection(cell.as_ref(), handle);
                }
            }
        }
        let key = EntityKey::of_cell(descriptor, cell.as_ref())?;
        Ok(self
            .context
            .borrow_mut()
            .manage_entity(key, cell, descriptor))
    }
}

impl std::fmt::Debug for EntityPersister {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityPersister").finish_non_exhaustive()
    }
}
