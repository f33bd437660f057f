//! Statically built entity descriptors.
//!
//! Descriptors replace runtime type inspection: for each entity type there is
//! exactly one [`EntityDescriptor`], the table name plus an ordered list of
//! [`ColumnDescriptor`]s, each tagged as id, simple, to-one or to-many and
//! carrying type-erased accessor/mutator closures. The descriptor is built
//! once at registration time (typically inside a `once_cell` static behind
//! [`Entity::descriptor`]) and the runtime operates exclusively over it.
//!
//! Accessors receive the managed cell (`&RefCell<T>` as `&dyn Any`); the
//! typed closures supplied to [`DescriptorBuilder`] are wrapped so that a
//! type mismatch degrades to a no-op read of `Value::Null` instead of
//! panicking.

use std::any::{Any, TypeId};
use std::cell::RefCell;
use std::marker::PhantomData;
use std::rc::Rc;

use crate::entity::{Entity, Managed, downcast_managed};
use crate::error::{Error, Result};
use crate::lazy::{LazyCollection, LazyHandle};
use crate::types::SqlType;
use crate::value::Value;

/// How a column participates in persistence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    /// Primary-key column. Caller-supplied, written on insert, never updated.
    Id,
    /// Plain scalar column. Written on insert and update, dirty-checked.
    Simple,
    /// Eagerly loaded single association; the column is the foreign key in
    /// this entity's table.
    ToOne,
    /// Lazily loaded collection association; owns no column in this table.
    ToMany,
}

type ValueGetter = Box<dyn Fn(&dyn Any) -> Value + Send + Sync>;
type ValueSetter = Box<dyn Fn(&dyn Any, Value) + Send + Sync>;
type RelatedSetter = Box<dyn Fn(&dyn Any, Rc<dyn Any>) + Send + Sync>;
type CollectionBinder = Box<dyn Fn(&dyn Any, LazyHandle) + Send + Sync>;
type CellFactory = Box<dyn Fn() -> Rc<dyn Any> + Send + Sync>;

/// Reference to another type's descriptor, deferred behind a function
/// pointer so mutually related descriptors can be registered independently.
pub type DescriptorRef = fn() -> &'static EntityDescriptor;

enum Accessor {
    Value { get: ValueGetter, set: ValueSetter },
    Related { set: RelatedSetter },
    Collection { bind: CollectionBinder },
}

/// Metadata and erased accessors for one mapped column.
pub struct ColumnDescriptor {
    field: &'static str,
    column: &'static str,
    sql_type: Option<SqlType>,
    kind: ColumnKind,
    related: Option<DescriptorRef>,
    join_field: Option<&'static str>,
    accessor: Accessor,
}

impl ColumnDescriptor {
    /// The entity field name.
    #[must_use]
    pub fn field(&self) -> &'static str {
        self.field
    }

    /// The database column name (for to-one columns, the foreign key).
    #[must_use]
    pub fn column(&self) -> &'static str {
        self.column
    }

    /// SQL type of the column; `None` for to-many associations, which own no
    /// column in this table.
    #[must_use]
    pub fn sql_type(&self) -> Option<SqlType> {
        self.sql_type
    }

    /// Column kind tag.
    #[must_use]
    pub fn kind(&self) -> ColumnKind {
        self.kind
    }

    /// Whether this is the id column.
    #[must_use]
    pub fn is_id(&self) -> bool {
        self.kind == ColumnKind::Id
    }

    /// Whether this column is backed by a plain value (id or simple).
    #[must_use]
    pub fn is_value_backed(&self) -> bool {
        matches!(self.kind, ColumnKind::Id | ColumnKind::Simple)
    }

    /// Descriptor of the related type, for association columns.
    #[must_use]
    pub fn related_descriptor(&self) -> Option<&'static EntityDescriptor> {
        self.related.map(|resolve| resolve())
    }

    /// For to-many columns: the field on the related type that points back
    /// at the owner (its column is the filtering foreign key).
    #[must_use]
    pub fn join_field(&self) -> Option<&'static str> {
        self.join_field
    }

    /// Read the column value from a managed cell. Association columns and
    /// mismatched cells read as `Value::Null`.
    #[must_use]
    pub fn read(&self, cell: &dyn Any) -> Value {
        match &self.accessor {
            Accessor::Value { get, .. } => get(cell),
            _ => Value::Null,
        }
    }

    /// Write a plain value into a managed cell. No-op for association
    /// columns and mismatched cells.
    pub fn write(&self, cell: &dyn Any, value: Value) {
        if let Accessor::Value { set, .. } = &self.accessor {
            set(cell, value);
        }
    }

    /// Install a related managed entity into a to-one field.
    pub fn write_related(&self, cell: &dyn Any, related: Rc<dyn Any>) {
        if let Accessor::Related { set } = &self.accessor {
            set(cell, related);
        }
    }

    /// Install a lazy loader into a to-many field.
    pub fn bind_collection(&self, cell: &dyn Any, handle: LazyHandle) {
        if let Accessor::Collection { bind } = &self.accessor {
            bind(cell, handle);
        }
    }
}

impl std::fmt::Debug for ColumnDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ColumnDescriptor")
            .field("field", &self.field)
            .field("column", &self.column)
            .field("kind", &self.kind)
            .field("sql_type", &self.sql_type)
            .finish_non_exhaustive()
    }
}

/// Per-type persistence metadata: table name and ordered columns.
pub struct EntityDescriptor {
    entity: &'static str,
    table: &'static str,
    type_id: TypeId,
    columns: Vec<ColumnDescriptor>,
    id_index: Option<usize>,
    make: CellFactory,
}

impl EntityDescriptor {
    /// Start building a descriptor for entity type `T` mapped to `table`.
    #[must_use]
    pub fn builder<T: Default + 'static>(table: &'static str) -> DescriptorBuilder<T> {
        DescriptorBuilder {
            entity: short_type_name::<T>(),
            table,
            columns: Vec::new(),
            _marker: PhantomData,
        }
    }

    /// The entity type name (unqualified), used in messages and keys.
    #[must_use]
    pub fn entity_name(&self) -> &'static str {
        self.entity
    }

    /// The mapped table name.
    #[must_use]
    pub fn table(&self) -> &'static str {
        self.table
    }

    /// `TypeId` of the entity type.
    #[must_use]
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// All columns, in declaration order.
    #[must_use]
    pub fn columns(&self) -> &[ColumnDescriptor] {
        &self.columns
    }

    /// The id column.
    pub fn id_column(&self) -> Result<&ColumnDescriptor> {
        self.id_index
            .map(|idx| &self.columns[idx])
            .ok_or(Error::IdNotFound {
                entity: self.entity,
            })
    }

    /// Resolve a field name (case-insensitive) to its column descriptor.
    pub fn column_for_field(&self, field: &str) -> Result<&ColumnDescriptor> {
        self.columns
            .iter()
            .find(|c| c.field.eq_ignore_ascii_case(field))
            .ok_or_else(|| Error::FieldNotFound {
                entity: self.entity,
                field: field.to_string(),
            })
    }

    /// Columns written by INSERT: id + simple, in declaration order.
    pub fn insertable_columns(&self) -> impl Iterator<Item = &ColumnDescriptor> {
        self.columns.iter().filter(|c| c.is_value_backed())
    }

    /// Columns written by UPDATE: simple only.
    pub fn updatable_columns(&self) -> impl Iterator<Item = &ColumnDescriptor> {
        self.columns.iter().filter(|c| c.kind == ColumnKind::Simple)
    }

    /// Read the primary-key value of a managed cell.
    pub fn id_value(&self, cell: &dyn Any) -> Result<Value> {
        Ok(self.id_column()?.read(cell))
    }

    /// Capture the dirty-check snapshot: id + simple column values in
    /// declaration order. Associations are excluded by design.
    #[must_use]
    pub fn snapshot(&self, cell: &dyn Any) -> Vec<Value> {
        self.insertable_columns().map(|c| c.read(cell)).collect()
    }

    /// Construct a blank managed cell for row materialization.
    #[must_use]
    pub fn new_cell(&self) -> Rc<dyn Any> {
        (self.make)()
    }
}

impl std::fmt::Debug for EntityDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityDescriptor")
            .field("entity", &self.entity)
            .field("table", &self.table)
            .field("columns", &self.columns)
            .finish_non_exhaustive()
    }
}

/// Fluent builder for [`EntityDescriptor`], consumed by `Entity::descriptor`
/// implementations.
pub struct DescriptorBuilder<T> {
    entity: &'static str,
    table: &'static str,
    columns: Vec<ColumnDescriptor>,
    _marker: PhantomData<T>,
}

impl<T: Default + 'static> DescriptorBuilder<T> {
    /// Declare the primary-key column.
    #[must_use]
    pub fn id(
        mut self,
        field: &'static str,
        column: &'static str,
        sql_type: SqlType,
        get: impl Fn(&T) -> Value + Send + Sync + 'static,
        set: impl Fn(&mut T, Value) + Send + Sync + 'static,
    ) -> Self {
        self.columns.push(ColumnDescriptor {
            field,
            column,
            sql_type: Some(sql_type),
            kind: ColumnKind::Id,
            related: None,
            join_field: None,
            accessor: Accessor::Value {
                get: erase_get(get),
                set: erase_set(set),
            },
        });
        self
    }

    /// Declare a simple scalar column.
    #[must_use]
    pub fn column(
        mut self,
        field: &'static str,
        column: &'static str,
        sql_type: SqlType,
        get: impl Fn(&T) -> Value + Send + Sync + 'static,
        set: impl Fn(&mut T, Value) + Send + Sync + 'static,
    ) -> Self {
        self.columns.push(ColumnDescriptor {
            field,
            column,
            sql_type: Some(sql_type),
            kind: ColumnKind::Simple,
            related: None,
            join_field: None,
            accessor: Accessor::Value {
                get: erase_get(get),
                set: erase_set(set),
            },
        });
        self
    }

    /// Declare an eagerly loaded to-one association; `column` is the foreign
    /// key in this entity's table.
    #[must_use]
    pub fn to_one<R: Entity>(
        mut self,
        field: &'static str,
        column: &'static str,
        sql_type: SqlType,
        set: impl Fn(&mut T, Managed<R>) + Send + Sync + 'static,
    ) -> Self {
        self.columns.push(ColumnDescriptor {
            field,
            column,
            sql_type: Some(sql_type),
            kind: ColumnKind::ToOne,
            related: Some(R::descriptor),
            join_field: None,
            accessor: Accessor::Related {
                set: Box::new(move |cell, related| {
                    if let (Some(owner), Some(related)) = (
                        cell.downcast_ref::<RefCell<T>>(),
                        downcast_managed::<R>(related),
                    ) {
                        set(&mut owner.borrow_mut(), related);
                    }
                }),
            },
        });
        self
    }

    /// Declare a lazily loaded to-many association. `join_field` names the
    /// field on `R` that refers back to this entity; its column is the
    /// foreign key the deferred query filters on.
    #[must_use]
    pub fn to_many<R: Entity>(
        mut self,
        field: &'static str,
        join_field: &'static str,
        access: impl Fn(&T) -> &LazyCollection<R> + Send + Sync + 'static,
    ) -> Self {
        self.columns.push(ColumnDescriptor {
            field,
            column: field,
            sql_type: None,
            kind: ColumnKind::ToMany,
            related: Some(R::descriptor),
            join_field: Some(join_field),
            accessor: Accessor::Collection {
                bind: Box::new(move |cell, handle| {
                    if let Some(owner) = cell.downcast_ref::<RefCell<T>>() {
                        access(&owner.borrow()).attach(handle);
                    }
                }),
            },
        });
        self
    }

    /// Finish the descriptor.
    #[must_use]
    pub fn build(self) -> EntityDescriptor {
        let id_index = self
            .columns
            .iter()
            .position(|c| c.kind == ColumnKind::Id);
        EntityDescriptor {
            entity: self.entity,
            table: self.table,
            type_id: TypeId::of::<T>(),
            columns: self.columns,
            id_index,
            make: Box::new(|| -> Rc<dyn Any> { Rc::new(RefCell::new(T::default())) }),
        }
    }
}

fn erase_get<T: 'static>(get: impl Fn(&T) -> Value + Send + Sync + 'static) -> ValueGetter {
    Box::new(move |cell| {
        cell.downcast_ref::<RefCell<T>>()
            .map_or(Value::Null, |c| get(&c.borrow()))
    })
}

fn erase_set<T: 'static>(set: impl Fn(&mut T, Value) + Send + Sync + 'static) -> ValueSetter {
    Box::new(move |cell, value| {
        if let Some(c) = cell.downcast_ref::<RefCell<T>>() {
            set(&mut c.borrow_mut(), value);
        }
    })
}

fn short_type_name<T>() -> &'static str {
    let full = std::any::type_name::<T>();
    full.rsplit("::").next().unwrap_or(full)
}
