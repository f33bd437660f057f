//! Lazy to-many association handles.
//!
//! A [`LazyCollection`] is an explicit lazy cell: it holds either a pending
//! loader installed during row materialization, or the resolved list of
//! managed related entities. The first read runs the loader and caches the
//! result; every later read returns the same list object. The cell is not
//! restartable: the cached result is never refreshed except by
//! reconstructing the owning entity.

use std::any::Any;
use std::cell::RefCell;
use std::rc::Rc;

use crate::entity::{Managed, downcast_managed};
use crate::error::Result;

/// Loader installed by the persister: runs the deferred query and returns
/// type-erased managed cells.
pub type LazyLoader = Box<dyn Fn() -> Result<Vec<Rc<dyn Any>>>>;

/// A type-erased loader handle, produced by the persister and bound into an
/// entity's [`LazyCollection`] field through its descriptor.
pub struct LazyHandle {
    loader: LazyLoader,
}

impl LazyHandle {
    /// Wrap a loader closure.
    pub fn new(loader: impl Fn() -> Result<Vec<Rc<dyn Any>>> + 'static) -> Self {
        Self {
            loader: Box::new(loader),
        }
    }

    fn into_loader(self) -> LazyLoader {
        self.loader
    }
}

impl std::fmt::Debug for LazyHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("LazyHandle")
    }
}

enum LazyState<T> {
    /// Never attached to a loader (entity constructed in memory, not loaded).
    Detached,
    /// Loader installed, query not yet run.
    Pending(LazyLoader),
    /// Resolved and cached.
    Loaded(Rc<Vec<Managed<T>>>),
}

/// A to-many association resolved on first access and cached thereafter.
///
/// Entities declare their to-many fields as `LazyCollection<Related>`; the
/// persister installs the loader when it materializes a row. For entities
/// never loaded from storage the collection resolves to an empty list.
pub struct LazyCollection<T> {
    state: RefCell<LazyState<T>>,
}

impl<T: 'static> LazyCollection<T> {
    /// Create a detached (empty) collection.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: RefCell::new(LazyState::Detached),
        }
    }

    /// Install the loader. Called by the persister during materialization.
    pub fn attach(&self, handle: LazyHandle) {
        *self.state.borrow_mut() = LazyState::Pending(handle.into_loader());
    }

    /// Whether the collection has been resolved.
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        matches!(&*self.state.borrow(), LazyState::Loaded(_))
    }

    /// Resolve the collection, running the deferred query on first access.
    ///
    /// Returns the same `Rc` list on every call after the first. A loader
    /// failure leaves the cell pending so the access can be retried.
    pub fn get(&self) -> Result<Rc<Vec<Managed<T>>>> {
        // Take the loader out before running it; the query path must not
        // observe this cell borrowed.
        let loader = {
            let mut state = self.state.borrow_mut();
            match std::mem::replace(&mut *state, LazyState::Detached) {
                LazyState::Loaded(items) => {
                    let result = Rc::clone(&items);
                    *state = LazyState::Loaded(items);
                    return Ok(result);
                }
                LazyState::Detached => {
                    let items = Rc::new(Vec::new());
                    *state = LazyState::Loaded(Rc::clone(&items));
                    return Ok(items);
                }
                LazyState::Pending(loader) => loader,
            }
        };

        match loader() {
            Ok(cells) => {
                let items: Vec<Managed<T>> = cells
                    .into_iter()
                    .filter_map(downcast_managed::<T>)
                    .collect();
                let items = Rc::new(items);
                *self.state.borrow_mut() = LazyState::Loaded(Rc::clone(&items));
                Ok(items)
            }
            Err(e) => {
                *self.state.borrow_mut() = LazyState::Pending(loader);
                Err(e)
            }
        }
    }
}

impl<T: 'static> Default for LazyCollection<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for LazyCollection<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tag = match &*self.state.borrow() {
            LazyState::Detached => "detached",
            LazyState::Pending(_) => "pending",
            LazyState::Loaded(items) => return write!(f, "LazyCollection(loaded, {})", items.len()),
        };
        write!(f, "LazyCollection({tag})")
    }
}
