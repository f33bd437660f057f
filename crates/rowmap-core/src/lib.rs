//! Core types and traits for Rowmap.
//!
//! `rowmap-core` is the foundation layer for the entire workspace. It defines
//! the contracts and core data types that all other crates build on.
//!
//! # Role In The Architecture
//!
//! - **Contract layer**: [`Entity`] and the [`Driver`]/[`Connection`] traits
//!   are the seams user types and storage drivers plug into.
//! - **Data model**: [`Row`] and [`Value`] represent statement inputs and
//!   outputs shared across the pool, session and driver crates.
//! - **Metadata**: [`EntityDescriptor`] carries the statically built per-type
//!   column metadata the session runtime operates over; there is no runtime
//!   reflection anywhere.
//!
//! # Who Uses This Crate
//!
//! - `rowmap-pool` stores boxed [`Connection`]s and hands out leases.
//! - `rowmap-session` consumes descriptors, keys and values for its
//!   unit-of-work flows.
//! - Driver crates (`rowmap-memory`) implement [`Driver`] and [`Connection`].
//!
//! Most applications should use the `rowmap` facade; reach for `rowmap-core`
//! directly when writing drivers or advanced integrations.

pub mod connection;
pub mod descriptor;
pub mod entity;
pub mod error;
pub mod lazy;
pub mod row;
pub mod types;
pub mod value;

pub use connection::{Connection, Driver, DriverError, DriverResult};
pub use descriptor::{ColumnDescriptor, ColumnKind, DescriptorBuilder, EntityDescriptor};
pub use entity::{Entity, EntityKey, Managed, downcast_managed, managed};
pub use error::{Error, Result};
pub use lazy::{LazyCollection, LazyHandle, LazyLoader};
pub use row::Row;
pub use types::SqlType;
pub use value::Value;
