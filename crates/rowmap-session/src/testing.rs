//! Shared fixtures for this crate's unit tests.

use std::any::Any;
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use once_cell::sync::Lazy;
use rowmap_core::{
    Entity, EntityDescriptor, EntityKey, LazyCollection, Managed, SqlType, Value,
};
use rowmap_memory::MemoryDriver;
use rowmap_pool::ConnectionPool;

#[derive(Debug, Default, Clone, PartialEq)]
pub struct Person {
    pub id: i64,
    pub name: String,
    pub age: i64,
}

impl Entity for Person {
    fn descriptor() -> &'static EntityDescriptor {
        static DESCRIPTOR: Lazy<EntityDescriptor> = Lazy::new(|| {
            EntityDescriptor::builder::<Person>("person")
                .id(
                    "id",
                    "id",
                    SqlType::BigInt,
                    |p| Value::from(p.id),
                    |p, v| p.id = v.as_i64().unwrap_or_default(),
                )
                .column(
                    "name",
                    "name",
                    SqlType::Text,
                    |p| Value::from(p.name.clone()),
                    |p, v| p.name = v.into_string(),
                )
                .column(
                    "age",
                    "age",
                    SqlType::BigInt,
                    |p| Value::from(p.age),
                    |p, v| p.age = v.as_i64().unwrap_or_default(),
                )
                .build()
        });
        &DESCRIPTOR
    }
}

#[derive(Debug, Default)]
pub struct Author {
    pub id: i64,
    pub name: String,
    pub books: LazyCollection<Book>,
}

impl Entity for Author {
    fn descriptor() -> &'static EntityDescriptor {
        static DESCRIPTOR: Lazy<EntityDescriptor> = Lazy::new(|| {
            EntityDescriptor::builder::<Author>("author")
                .id(
                    "id",
                    "id",
                    SqlType::BigInt,
                    |a| Value::from(a.id),
                    |a, v| a.id = v.as_i64().unwrap_or_default(),
                )
                .column(
                    "name",
                    "name",
                    SqlType::Text,
                    |a| Value::from(a.name.clone()),
                    |a, v| a.name = v.into_string(),
                )
                .to_many::<Book>("books", "author", |a| &a.books)
                .build()
        });
        &DESCRIPTOR
    }
}

#[derive(Debug, Default)]
pub struct Book {
    pub id: i64,
    pub title: String,
    pub author: Option<Managed<Author>>,
}

impl Entity for Book {
    fn descriptor() -> &'static EntityDescriptor {
        static DESCRIPTOR: Lazy<EntityDescriptor> = Lazy::new(|| {
            EntityDescriptor::builder::<Book>("book")
                .id(
                    "id",
                    "id",
                    SqlType::BigInt,
                    |b| Value::from(b.id),
                    |b, v| b.id = v.as_i64().unwrap_or_default(),
                )
                .column(
                    "title",
                    "title",
                    SqlType::Text,
                    |b| Value::from(b.title.clone()),
                    |b, v| b.title = v.into_string(),
                )
                .to_one::<Author>("author", "author_id", SqlType::BigInt, |b, author| {
                    b.author = Some(author);
                })
                .build()
        });
        &DESCRIPTOR
    }
}

/// A managed cell plus its key, for feeding contexts and queues directly.
pub fn person_cell(id: i64, name: &str, age: i64) -> (EntityKey, Rc<dyn Any>) {
    let cell: Rc<dyn Any> = Rc::new(RefCell::new(Person {
        id,
        name: name.into(),
        age,
    }));
    let key = EntityKey::of_cell(Person::descriptor(), cell.as_ref())
        .expect("person descriptor has an id column");
    (key, cell)
}

/// A pool over a fresh in-memory driver.
pub fn memory_pool(size: usize) -> (Arc<ConnectionPool>, MemoryDriver) {
    let driver = MemoryDriver::new();
    let pool = ConnectionPool::new(size, &driver).expect("memory driver connects");
    (pool, driver)
}
