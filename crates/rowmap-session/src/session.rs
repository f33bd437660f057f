//! The session façade: unit of work over one persistence context.
//!
//! A [`Session`] owns one [`TransactionManager`], one [`PersistenceContext`]
//! and one [`crate::ActionQueue`]. Mutators stage actions and context
//! entries; [`Session::flush`] appends updates for dirty entities and drains
//! the queue in priority order through the [`crate::EntityPersister`].
//!
//! One session is used by exactly one execution context at a time. The
//! session is deliberately not `Send`: share the pool, not the session.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::sync::Arc;

use rowmap_core::{
    Entity, EntityDescriptor, EntityKey, Error, Managed, Result, Value, downcast_managed, managed,
};
use rowmap_pool::ConnectionPool;

use crate::action::{ActionKind, ActionQueue, EntityAction};
use crate::context::PersistenceContext;
use crate::persister::EntityPersister;
use crate::transaction::{TransactionManager, TransactionStatus};

/// Unit-of-work session over a shared connection pool.
pub struct Session {
    context: Rc<RefCell<PersistenceContext>>,
    queue: RefCell<ActionQueue>,
    tx: Rc<RefCell<TransactionManager>>,
    persister: Rc<EntityPersister>,
    closed: Cell<bool>,
}

impl Session {
    /// Open a session over the shared pool.
    #[must_use]
    pub fn new(pool: Arc<ConnectionPool>) -> Self {
        let context = Rc::new(RefCell::new(PersistenceContext::new()));
        let tx = Rc::new(RefCell::new(TransactionManager::new(Arc::clone(&pool))));
        let persister = EntityPersister::new(pool, Rc::clone(&tx), Rc::clone(&context));
        Self {
            context,
            queue: RefCell::new(ActionQueue::new()),
            tx,
            persister,
            closed: Cell::new(false),
        }
    }

    /// Register a new entity and stage its INSERT.
    ///
    /// Fails with a duplicate-entity error when the key is already managed.
    /// Returns the managed handle; mutate through it and the change is
    /// picked up by dirty checking on the next flush.
    #[tracing::instrument(level = "debug", skip_all)]
    pub fn persist<T: Entity>(&self, entity: T) -> Result<Managed<T>> {
        self.ensure_open()?;
        let descriptor = T::descriptor();
        let cell = managed(entity);
        let erased: Rc<dyn Any> = cell.clone();
        let key = EntityKey::of_cell(descriptor, erased.as_ref())?;
        tracing::info!(entity = descriptor.entity_name(), key = %key, "Persisting entity");
        self.persist_cell(descriptor, key, erased)?;
        Ok(cell)
    }

    /// Merge a possibly detached entity into the unit of work.
    ///
    /// When the key is already managed, or a row with the same id exists in
    /// storage, an UPDATE is staged for the passed state; otherwise the
    /// entity is persisted. The existence probe queries storage even though
    /// the answer may already be derivable; the extra round trip is part of
    /// the observable behavior and is kept.
    #[tracing::instrument(level = "debug", skip_all)]
    pub fn merge<T: Entity>(&self, entity: T) -> Result<Managed<T>> {
        self.ensure_open()?;
        let descriptor = T::descriptor();
        let cell = managed(entity);
        let erased: Rc<dyn Any> = cell.clone();
        let key = EntityKey::of_cell(descriptor, erased.as_ref())?;
        tracing::info!(entity = descriptor.entity_name(), key = %key, "Merging entity");

        let already_managed = self.context.borrow().contains(&key);
        if already_managed || self.row_exists(descriptor, &key)? {
            self.queue.borrow_mut().push(EntityAction::new(
                ActionKind::Update,
                key,
                erased,
                descriptor,
            ));
        } else {
            self.persist_cell(descriptor, key, erased)?;
        }
        Ok(cell)
    }

    /// Load an entity by primary key, serving repeated loads from the
    /// persistence context.
    #[tracing::instrument(level = "debug", skip_all)]
    pub fn find<T: Entity>(&self, id: impl Into<Value>) -> Result<Managed<T>> {
        self.ensure_open()?;
        let descriptor = T::descriptor();
        let id = id.into();
        tracing::info!(entity = descriptor.entity_name(), id = %id, "Finding entity by id");
        let detail = format!(
            "could not find entity by type {} and id {}",
            descriptor.entity_name(),
            id
        );
        let cell = self
            .persister
            .find_by_id(descriptor, id)
            .map_err(|e| Error::session_operation(detail.clone(), e))?;
        Self::downcast_result(cell, &detail)
    }

    /// Load all entities whose `field` equals `value`.
    #[tracing::instrument(level = "debug", skip_all)]
    pub fn find_all_by<T: Entity>(
        &self,
        field: &str,
        value: impl Into<Value>,
    ) -> Result<Vec<Managed<T>>> {
        self.ensure_open()?;
        let descriptor = T::descriptor();
        let value = value.into();
        tracing::info!(
            entity = descriptor.entity_name(),
            field,
            value = %value,
            "Finding entities by field"
        );
        let detail = format!(
            "could not find entities by type {} and {}: {}",
            descriptor.entity_name(),
            field,
            value
        );
        let cells = descriptor
            .column_for_field(field)
            .and_then(|column| self.persister.find_all_by(descriptor, column.column(), value))
            .map_err(|e| Error::session_operation(detail, e))?;
        Ok(cells.into_iter().filter_map(downcast_managed::<T>).collect())
    }

    /// Load exactly one entity whose `field` equals `value`.
    #[tracing::instrument(level = "debug", skip_all)]
    pub fn find_one_by<T: Entity>(
        &self,
        field: &str,
        value: impl Into<Value>,
    ) -> Result<Managed<T>> {
        self.ensure_open()?;
        let descriptor = T::descriptor();
        let value = value.into();
        tracing::info!(
            entity = descriptor.entity_name(),
            field,
            value = %value,
            "Finding entity by field"
        );
        let detail = format!(
            "could not find entity by type {} and {}: {}",
            descriptor.entity_name(),
            field,
            value
        );
        let cell = descriptor
            .column_for_field(field)
            .and_then(|column| self.persister.find_one_by(descriptor, column.column(), value))
            .map_err(|e| Error::session_operation(detail.clone(), e))?;
        Self::downcast_result(cell, &detail)
    }

    /// Stage a DELETE for a managed entity.
    ///
    /// The entity must already be managed by this session.
    #[tracing::instrument(level = "debug", skip_all)]
    pub fn remove<T: Entity>(&self, entity: &Managed<T>) -> Result<()> {
        self.ensure_open()?;
        let descriptor = T::descriptor();
        let erased: Rc<dyn Any> = Rc::clone(entity) as Rc<dyn Any>;
        let key = EntityKey::of_cell(descriptor, erased.as_ref())?;
        tracing::info!(entity = descriptor.entity_name(), key = %key, "Removing entity");

        if !self.context.borrow().contains(&key) {
            return Err(Error::NotManaged {
                entity: descriptor.entity_name(),
                key: key.id().to_string(),
            });
        }
        self.queue.borrow_mut().push(EntityAction::new(
            ActionKind::Delete,
            key,
            erased,
            descriptor,
        ));
        Ok(())
    }

    /// Execute all pending writes: stage an UPDATE for every dirty entity
    /// not already covered by a pending action, then drain the queue in
    /// priority order (inserts, then updates, then deletes).
    ///
    /// A no-op in readonly mode.
    #[tracing::instrument(level = "debug", skip_all)]
    pub fn flush(&self) -> Result<()> {
        if self.context.borrow().is_readonly() {
            tracing::warn!("Readonly mode is on; dirty checking is disabled");
            return Ok(());
        }
        self.ensure_open()?;
        tracing::trace!("Flushing session");

        let dirty = self.context.borrow().dirty_entities();
        {
            let mut queue = self.queue.borrow_mut();
            for entity in dirty {
                if !queue.has_action_for(&entity.key) {
                    queue.push(EntityAction::new(
                        ActionKind::Update,
                        entity.key,
                        entity.cell,
                        entity.descriptor,
                    ));
                }
            }
        }

        loop {
            let action = self.queue.borrow_mut().pop();
            let Some(action) = action else { break };
            self.execute(&action)?;
        }
        Ok(())
    }

    /// Flush, clear the persistence context and transaction state, and mark
    /// the session closed. Idempotent; every other operation fails once the
    /// session is closed.
    pub fn close(&self) -> Result<()> {
        if self.closed.get() {
            return Ok(());
        }
        tracing::info!("Closing session");
        self.flush()?;
        self.context.borrow_mut().clear();
        self.tx.borrow_mut().clear();
        self.closed.set(true);
        Ok(())
    }

    /// Whether the session has been closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.get()
    }

    /// Toggle readonly mode: disables dirty checking and makes flush a
    /// no-op.
    pub fn set_readonly(&self, readonly: bool) {
        self.context.borrow_mut().set_readonly(readonly);
    }

    /// Start a transaction on this session.
    pub fn begin_transaction(&self) -> Result<()> {
        self.ensure_open()?;
        self.tx.borrow_mut().begin()
    }

    /// Flush pending writes inside the transaction, then commit it.
    ///
    /// The flush goes first so every staged write executes on the
    /// transaction's bound connection.
    pub fn commit_transaction(&self) -> Result<()> {
        self.ensure_open()?;
        if !self.tx.borrow().is_active() {
            return Err(Error::TransactionState("transaction is not active"));
        }
        self.flush()?;
        self.tx.borrow_mut().commit()
    }

    /// Roll the transaction back, discarding whatever it had written.
    /// Pending unflushed actions stay queued.
    pub fn rollback_transaction(&self) -> Result<()> {
        self.ensure_open()?;
        self.tx.borrow_mut().rollback()
    }

    /// Reset transaction state to idle after a commit or rollback.
    pub fn clear_transaction(&self) -> Result<()> {
        self.ensure_open()?;
        self.tx.borrow_mut().clear();
        Ok(())
    }

    /// Current transaction lifecycle state.
    #[must_use]
    pub fn transaction_status(&self) -> TransactionStatus {
        self.tx.borrow().status()
    }

    /// Number of pending actions (diagnostics).
    #[must_use]
    pub fn pending_actions(&self) -> usize {
        self.queue.borrow().len()
    }

    /// Number of managed entities (diagnostics).
    #[must_use]
    pub fn managed_count(&self) -> usize {
        self.context.borrow().len()
    }

    fn persist_cell(
        &self,
        descriptor: &'static EntityDescriptor,
        key: EntityKey,
        cell: Rc<dyn Any>,
    ) -> Result<()> {
        {
            let mut context = self.context.borrow_mut();
            if context.contains(&key) {
                return Err(Error::DuplicateEntity {
                    entity: descriptor.entity_name(),
                    key: key.id().to_string(),
                });
            }
            context.add_entity(key.clone(), Rc::clone(&cell), descriptor);
        }
        self.queue.borrow_mut().push(EntityAction::new(
            ActionKind::Insert,
            key,
            cell,
            descriptor,
        ));
        Ok(())
    }

    fn row_exists(&self, descriptor: &'static EntityDescriptor, key: &EntityKey) -> Result<bool> {
        let id_column = descriptor.id_column()?;
        let matches = self
            .persister
            .find_all_by(descriptor, id_column.column(), key.id().clone())?;
        Ok(!matches.is_empty())
    }

    fn execute(&self, action: &EntityAction) -> Result<()> {
        match action.kind() {
            ActionKind::Insert => {
                self.persister.insert(action.descriptor(), action.cell())?;
                self.context.borrow_mut().refresh_snapshot(action.key());
            }
            ActionKind::Update => {
                self.persister.update(action.descriptor(), action.cell())?;
                self.context.borrow_mut().refresh_snapshot(action.key());
            }
            ActionKind::Delete => {
                self.persister.delete(action.descriptor(), action.cell())?;
            }
        }
        Ok(())
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.get() {
            return Err(Error::SessionClosed);
        }
        Ok(())
    }

    fn downcast_result<T: Entity>(cell: Rc<dyn Any>, detail: &str) -> Result<Managed<T>> {
        // A key carries the entity's TypeId, so a mismatch here means the
        // context never held this type; report it as a failed lookup.
        downcast_managed::<T>(cell).ok_or_else(|| {
            Error::session_operation(
                detail.to_string(),
                Error::UnexpectedRowCount {
                    expected: 1,
                    actual: 0,
                },
            )
        })
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("closed", &self.closed.get())
            .field("managed", &self.context.borrow().len())
            .field("pending", &self.queue.borrow().len())
            .finish()
    }
}
