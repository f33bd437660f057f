//! Session and Unit of Work for Rowmap.
//!
//! The [`Session`] is the central unit-of-work manager. It tracks objects
//! loaded from or added to the database and coordinates flushing staged
//! changes back to storage.
//!
//! # Design Philosophy
//!
//! - **Explicit over implicit**: no autoflush; writes happen on `flush`,
//!   `close` or transaction commit.
//! - **Identity**: the [`PersistenceContext`] guarantees one managed
//!   instance per key, so loads alias instead of duplicating.
//! - **Ordered writes**: the [`ActionQueue`] drains inserts before updates
//!   before deletes, whatever order they were staged in.
//! - **One connection per transaction**: the [`TransactionManager`] binds a
//!   pooled connection lazily and holds it for the transaction's lifetime.
//!
//! # Example
//!
//! ```ignore
//! let session = Session::new(pool);
//!
//! // Stage an INSERT and get the managed handle back.
//! let hero = session.persist(Hero { id: 1, name: "Tola".into() })?;
//!
//! // Loads by id hit the identity map.
//! let same: Managed<Hero> = session.find(1)?;
//!
//! // Mutations are found by dirty checking at flush time.
//! hero.borrow_mut().name = "Atola".into();
//! session.flush()?;
//!
//! session.close()?;
//! ```

pub mod action;
pub mod context;
pub mod persister;
pub mod session;
pub mod sql;
pub mod transaction;

#[cfg(test)]
pub(crate) mod testing;

pub use action::{ActionKind, ActionQueue, EntityAction};
pub use context::{DirtyEntity, PersistenceContext};
pub use persister::EntityPersister;
pub use session::Session;
pub use transaction::{TransactionManager, TransactionStatus};
