//! Shared entity fixtures and setup helpers for integration tests.
#![allow(dead_code)]

use chrono::{NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use rowmap::prelude::*;
use rowmap_memory::MemoryDriver;

#[derive(Debug, Default, Clone, PartialEq)]
pub struct Person {
    pub id: i64,
    pub name: String,
    pub age: i64,
}

impl Person {
    pub fn new(id: i64, name: &str, age: i64) -> Self {
        Self {
            id,
            name: name.into(),
            age,
        }
    }
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

impl Author {
    pub fn new(id: i64, name: &str) -> Self {
        Self {
            id,
            name: name.into(),
            books: LazyCollection::new(),
        }
    }
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
    pub author_id: i64,
    pub author: Option<Managed<Author>>,
}

impl Book {
    pub fn new(id: i64, title: &str, author_id: i64) -> Self {
        Self {
            id,
            title: title.into(),
            author_id,
            author: None,
        }
    }
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
                .column(
                    "author_id",
                    "author_id",
                    SqlType::BigInt,
                    |b| Value::from(b.author_id),
                    |b, v| b.author_id = v.as_i64().unwrap_or_default(),
                )
                .to_one::<Author>("author", "author_id", SqlType::BigInt, |b, author| {
                    b.author = Some(author);
                })
                .build()
        });
        &DESCRIPTOR
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct Event {
    pub id: i64,
    pub name: String,
    pub starts_at: Option<NaiveDateTime>,
    pub held_on: Option<NaiveDate>,
}

impl Entity for Event {
    fn descriptor() -> &'static EntityDescriptor {
        static DESCRIPTOR: Lazy<EntityDescriptor> = Lazy::new(|| {
            EntityDescriptor::builder::<Event>("event")
                .id(
                    "id",
                    "id",
                    SqlType::BigInt,
                    |e| Value::from(e.id),
                    |e, v| e.id = v.as_i64().unwrap_or_default(),
                )
                .column(
                    "name",
                    "name",
                    SqlType::Text,
                    |e| Value::from(e.name.clone()),
                    |e, v| e.name = v.into_string(),
                )
                .column(
                    "starts_at",
                    "starts_at",
                    SqlType::Timestamp,
                    |e| Value::from(e.starts_at),
                    |e, v| e.starts_at = v.as_datetime(),
                )
                .column(
                    "held_on",
                    "held_on",
                    SqlType::Date,
                    |e| Value::from(e.held_on),
                    |e, v| e.held_on = v.as_local_date(),
                )
                .build()
        });
        &DESCRIPTOR
    }
}

/// A factory over a fresh in-memory driver.
pub fn setup(pool_size: usize) -> (SessionFactory, MemoryDriver) {
    let driver = MemoryDriver::new();
    let config = Config::new()
        .url("mem://tests")
        .username("app")
        .password("secret")
        .driver("memory")
        .pool_size(pool_size);
    let factory = SessionFactory::new(&config, &driver).expect("factory builds over memory driver");
    (factory, driver)
}

/// Statements in the log matching a prefix (e.g. `"INSERT"`).
pub fn statements_with_prefix(driver: &MemoryDriver, prefix: &str) -> Vec<String> {
    driver
        .store()
        .statement_log()
        .into_iter()
        .filter(|sql| sql.starts_with(prefix))
        .collect()
}
