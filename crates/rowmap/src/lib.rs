//! Rowmap: a lightweight object-relational persistence runtime.
//!
//! Rowmap maps in-memory domain objects to rows of a relational store,
//! manages a bounded pool of physical connections, and tracks a
//! per-unit-of-work cache of loaded and modified objects so writes are
//! batched, ordered and deduplicated correctly.
//!
//! # Architecture
//!
//! - [`rowmap_core`]: values, rows, descriptors, the `Entity` contract and
//!   the driver traits.
//! - [`rowmap_pool`]: the bounded, blocking connection pool.
//! - [`rowmap_session`]: persistence context, action queue, transaction
//!   manager, persister and the `Session` façade.
//! - This crate: configuration, the session factory, schema generation and
//!   a prelude tying it together.
//!
//! # Example
//!
//! ```ignore
//! use rowmap::prelude::*;
//!
//! let config = Config::new()
//!     .url("mem://demo")
//!     .username("app")
//!     .password("secret")
//!     .driver("memory")
//!     .pool_size(4);
//!
//! let factory = SessionFactory::new(&config, &driver)?;
//! let session = factory.open_session();
//!
//! let hero = session.persist(Hero { id: 1, name: "Tola".into() })?;
//! session.flush()?;
//! session.close()?;
//! ```

pub mod config;
pub mod factory;
pub mod schema;

pub use config::{Config, DEFAULT_POOL_SIZE};
pub use factory::SessionFactory;
pub use schema::{SchemaManager, create_table_sql, drop_table_sql};

pub use rowmap_core::{
    ColumnDescriptor, ColumnKind, Connection, DescriptorBuilder, Driver, DriverError, Entity,
    EntityDescriptor, EntityKey, Error, LazyCollection, Managed, Result, Row, SqlType, Value,
    downcast_managed, managed,
};
pub use rowmap_pool::{ConnectionPool, PooledConnection};
pub use rowmap_session::{
    ActionKind, ActionQueue, EntityAction, EntityPersister, PersistenceContext, Session,
    TransactionManager, TransactionStatus,
};

/// Everything an application typically needs.
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::factory::SessionFactory;
    pub use crate::schema::SchemaManager;
    pub use rowmap_core::{
        Entity, EntityDescriptor, EntityKey, Error, LazyCollection, Managed, Result, Row, SqlType,
        Value,
    };
    pub use rowmap_pool::ConnectionPool;
    pub use rowmap_session::{Session, TransactionStatus};
}
