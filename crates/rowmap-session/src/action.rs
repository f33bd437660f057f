//! Pending write actions and the priority-ordered action queue.
//!
//! Session mutators stage writes as [`EntityAction`]s; flush drains them in
//! priority order: all inserts, then all updates, then all deletes. The
//! relative order of actions sharing a priority is unspecified. The queue
//! deduplicates on (kind, key) so a merge followed by dirty checking stages
//! one update, not two.

use std::any::Any;
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet};
use std::rc::Rc;

use rowmap_core::{EntityDescriptor, EntityKey};

/// The kind of a pending write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    /// INSERT the entity.
    Insert,
    /// UPDATE the entity's simple columns.
    Update,
    /// DELETE the entity's row.
    Delete,
}

impl ActionKind {
    /// Execution rank: inserts before updates before deletes.
    #[must_use]
    pub const fn priority(self) -> u8 {
        match self {
            ActionKind::Insert => 1,
            ActionKind::Update => 2,
            ActionKind::Delete => 3,
        }
    }
}

/// A staged write: the target entity plus everything needed to execute it.
pub struct EntityAction {
    kind: ActionKind,
    key: EntityKey,
    cell: Rc<dyn Any>,
    descriptor: &'static EntityDescriptor,
}

impl EntityAction {
    /// Stage a write for the given managed cell.
    #[must_use]
    pub fn new(
        kind: ActionKind,
        key: EntityKey,
        cell: Rc<dyn Any>,
        descriptor: &'static EntityDescriptor,
    ) -> Self {
        Self {
            kind,
            key,
            cell,
            descriptor,
        }
    }

    /// The action kind.
    #[must_use]
    pub fn kind(&self) -> ActionKind {
        self.kind
    }

    /// The target entity's key.
    #[must_use]
    pub fn key(&self) -> &EntityKey {
        &self.key
    }

    /// The target managed cell.
    #[must_use]
    pub fn cell(&self) -> &Rc<dyn Any> {
        &self.cell
    }

    /// The target entity's descriptor.
    #[must_use]
    pub fn descriptor(&self) -> &'static EntityDescriptor {
        self.descriptor
    }
}

impl std::fmt::Debug for EntityAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityAction")
            .field("kind", &self.kind)
            .field("key", &self.key.to_string())
            .finish_non_exhaustive()
    }
}

/// Wrapper giving the heap a min-by-priority order.
struct Prioritized(EntityAction);

impl PartialEq for Prioritized {
    fn eq(&self, other: &Self) -> bool {
        self.0.kind.priority() == other.0.kind.priority()
    }
}

impl Eq for Prioritized {}

impl PartialOrd for Prioritized {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Prioritized {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap; invert so the lowest rank pops first.
        other.0.kind.priority().cmp(&self.0.kind.priority())
    }
}

/// Priority-ordered buffer of pending writes.
#[derive(Default)]
pub struct ActionQueue {
    heap: BinaryHeap<Prioritized>,
    staged: HashSet<(ActionKind, EntityKey)>,
}

impl ActionQueue {
    /// Create an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage an action. Returns `false` (dropping the action) when an action
    /// of the same kind for the same key is already pending.
    pub fn push(&mut self, action: EntityAction) -> bool {
        if !self.staged.insert((action.kind, action.key.clone())) {
            tracing::trace!(key = %action.key, kind = ?action.kind, "Action already staged, skipping");
            return false;
        }
        self.heap.push(Prioritized(action));
        true
    }

    /// Take the next action in priority order.
    pub fn pop(&mut self) -> Option<EntityAction> {
        let action = self.heap.pop().map(|p| p.0)?;
        self.staged.remove(&(action.kind, action.key.clone()));
        Some(action)
    }

    /// Whether any action targets this key.
    #[must_use]
    pub fn has_action_for(&self, key: &EntityKey) -> bool {
        self.staged.iter().any(|(_, staged_key)| staged_key == key)
    }

    /// Number of pending actions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    /// Whether the queue is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Drop all pending actions.
    pub fn clear(&mut self) {
        self.heap.clear();
        self.staged.clear();
    }
}

impl std::fmt::Debug for ActionQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionQueue")
            .field("pending", &self.heap.len())
            .finish()
    }
}
