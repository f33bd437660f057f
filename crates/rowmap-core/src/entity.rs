//! Entity contract and identity keys.

use std::any::{Any, TypeId};
use std::cell::RefCell;
use std::rc::Rc;

use crate::descriptor::EntityDescriptor;
use crate::error::Result;
use crate::value::Value;

/// A managed entity instance.
///
/// The persistence context guarantees at most one live `Managed<T>` per
/// [`EntityKey`] within a session, so pointer identity (`Rc::ptr_eq`) is
/// object identity. Mutations go through `borrow_mut`; dirty checking picks
/// them up at flush time.
pub type Managed<T> = Rc<RefCell<T>>;

/// A mapped domain type.
///
/// Implementors expose their statically built [`EntityDescriptor`]; the
/// runtime never inspects entity types any other way. `Default` is required
/// so the persister can construct blank instances when materializing rows.
pub trait Entity: Default + Sized + 'static {
    /// The descriptor for this entity type, built once at registration.
    fn descriptor() -> &'static EntityDescriptor;
}

/// Wrap a plain entity value into a managed cell.
#[must_use]
pub fn managed<T: Entity>(entity: T) -> Managed<T> {
    Rc::new(RefCell::new(entity))
}

/// Recover a typed handle from a type-erased managed cell.
///
/// Returns `None` when the cell holds a different entity type.
#[must_use]
pub fn downcast_managed<T: 'static>(cell: Rc<dyn Any>) -> Option<Managed<T>> {
    cell.downcast::<RefCell<T>>().ok()
}

/// Identifier of an entity within one persistence context: the primary-key
/// value paired with the entity type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EntityKey {
    id: Value,
    type_id: TypeId,
    entity: &'static str,
}

impl EntityKey {
    /// Build a key from its parts.
    #[must_use]
    pub fn new(id: Value, type_id: TypeId, entity: &'static str) -> Self {
        Self {
            id,
            type_id,
            entity,
        }
    }

    /// Build a key for a known entity type and id value.
    #[must_use]
    pub fn for_entity<T: Entity>(id: impl Into<Value>) -> Self {
        let descriptor = T::descriptor();
        Self::new(id.into(), descriptor.type_id(), descriptor.entity_name())
    }

    /// Compute the key of a managed cell through its descriptor.
    pub fn of_cell(descriptor: &EntityDescriptor, cell: &dyn Any) -> Result<Self> {
        let id = descriptor.id_value(cell)?;
        Ok(Self::new(id, descriptor.type_id(), descriptor.entity_name()))
    }

    /// The primary-key value.
    #[must_use]
    pub fn id(&self) -> &Value {
        &self.id
    }

    /// The entity type name.
    #[must_use]
    pub fn entity(&self) -> &'static str {
        self.entity
    }

    /// The entity's `TypeId`.
    #[must_use]
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }
}

impl std::fmt::Display for EntityKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}#{}", self.entity, self.id)
    }
}
