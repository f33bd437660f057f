//! The persistence context: identity map + dirty-checking cache.
//!
//! This is the first-level cache of a session. Entities are stored as
//! type-erased managed cells keyed by [`EntityKey`], so repeated loads of the
//! same key hand back the same object. Alongside each entity the context
//! keeps the snapshot of its id/simple column values captured when it became
//! managed; flush compares current values against that baseline to find
//! entities needing an UPDATE.

use std::any::Any;
use std::collections::HashMap;
use std::rc::Rc;

use rowmap_core::{EntityDescriptor, EntityKey, Value};

struct ManagedEntry {
    cell: Rc<dyn Any>,
    descriptor: &'static EntityDescriptor,
}

/// A managed entity that differs from its snapshot.
pub struct DirtyEntity {
    /// Identity of the dirty entity.
    pub key: EntityKey,
    /// The managed cell.
    pub cell: Rc<dyn Any>,
    /// Its descriptor.
    pub descriptor: &'static EntityDescriptor,
}

/// Identity map and snapshot store, scoped to one session.
#[derive(Default)]
pub struct PersistenceContext {
    entities: HashMap<EntityKey, ManagedEntry>,
    snapshots: HashMap<EntityKey, Vec<Value>>,
    readonly: bool,
}

impl PersistenceContext {
    /// Create an empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an entity unless its key is already managed.
    ///
    /// Returns the cached cell when the key is known (never the argument),
    /// preserving object identity within the session. Otherwise registers
    /// the cell together with its snapshot and returns it.
    pub fn manage_entity(
        &mut self,
        key: EntityKey,
        cell: Rc<dyn Any>,
        descriptor: &'static EntityDescriptor,
    ) -> Rc<dyn Any> {
        if let Some(existing) = self.entities.get(&key) {
            tracing::trace!(%key, "Entity already in context, returning cached object");
            return Rc::clone(&existing.cell);
        }
        self.add_entity(key, cell, descriptor)
    }

    /// Register an entity unconditionally, capturing its snapshot.
    pub fn add_entity(
        &mut self,
        key: EntityKey,
        cell: Rc<dyn Any>,
        descriptor: &'static EntityDescriptor,
    ) -> Rc<dyn Any> {
        tracing::trace!(%key, "Adding entity to the persistence context");
        self.snapshots
            .insert(key.clone(), descriptor.snapshot(cell.as_ref()));
        self.entities.insert(
            key,
            ManagedEntry {
                cell: Rc::clone(&cell),
                descriptor,
            },
        );
        cell
    }

    /// Look up a managed cell by key. No load-through.
    #[must_use]
    pub fn get_entity(&self, key: &EntityKey) -> Option<Rc<dyn Any>> {
        self.entities.get(key).map(|entry| Rc::clone(&entry.cell))
    }

    /// Whether the key is managed.
    #[must_use]
    pub fn contains(&self, key: &EntityKey) -> bool {
        self.entities.contains_key(key)
    }

    /// Recompute every managed entity's snapshot and collect those that
    /// differ element-wise from the stored baseline.
    ///
    /// Returns an empty list in readonly mode. Only id/simple columns
    /// participate; association fields are never part of dirty detection.
    #[must_use]
    pub fn dirty_entities(&self) -> Vec<DirtyEntity> {
        if self.readonly {
            tracing::debug!("Readonly mode is on, no dirty checking");
            return Vec::new();
        }
        let mut dirty = Vec::new();
        for (key, entry) in &self.entities {
            let current = entry.descriptor.snapshot(entry.cell.as_ref());
            match self.snapshots.get(key) {
                Some(baseline) if *baseline == current => {}
                _ => {
                    tracing::trace!(%key, "Found dirty entity");
                    dirty.push(DirtyEntity {
                        key: key.clone(),
                        cell: Rc::clone(&entry.cell),
                        descriptor: entry.descriptor,
                    });
                }
            }
        }
        dirty
    }

    /// Re-capture the snapshot of a managed entity after its pending write
    /// has been executed.
    pub fn refresh_snapshot(&mut self, key: &EntityKey) {
        if let Some(entry) = self.entities.get(key) {
            self.snapshots
                .insert(key.clone(), entry.descriptor.snapshot(entry.cell.as_ref()));
        }
    }

    /// Toggle readonly mode (disables dirty checking).
    pub fn set_readonly(&mut self, readonly: bool) {
        self.readonly = readonly;
    }

    /// Whether readonly mode is on.
    #[must_use]
    pub fn is_readonly(&self) -> bool {
        self.readonly
    }

    /// Number of managed entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Whether the context manages nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Drop all entries. Called once, at session close.
    pub fn clear(&mut self) {
        self.entities.clear();
        self.snapshots.clear();
    }
}

impl std::fmt::Debug for PersistenceContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistenceContext")
            .field("entities", &self.entities.len())
            .field("readonly", &self.readonly)
            .finish()
    }
}
