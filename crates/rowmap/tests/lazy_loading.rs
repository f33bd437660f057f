//! Eager to-one resolution and lazy to-many collections.

mod fixtures;

use fixtures::{Author, Book, setup, statements_with_prefix};
use rowmap::prelude::*;
use std::rc::Rc;

#[test]
fn to_many_collection_loads_once_and_caches_the_list() {
    let (factory, driver) = setup(1);

    let seeder = factory.open_session();
    seeder.persist(Author::new(1, "Iris")).unwrap();
    seeder.persist(Book::new(10, "First", 1)).unwrap();
    seeder.persist(Book::new(11, "Second", 1)).unwrap();
    seeder.close().unwrap();

    let session = factory.open_session();
    let author: Managed<Author> = session.find(1).unwrap();
    driver.store().clear_log();

    let books = author.borrow().books.get().unwrap();
    assert_eq!(books.len(), 2);
    // One deferred query for the collection; each book eagerly loaded its
    // author with one extra round trip.
    let selects = statements_with_prefix(&driver, "SELECT");
    assert_eq!(selects[0], "SELECT * FROM book WHERE author_id = ?;");
    assert_eq!(selects.len(), 3);

    // Second access: same list object, no further statements.
    let again = author.borrow().books.get().unwrap();
    assert!(Rc::ptr_eq(&books, &again));
    assert_eq!(statements_with_prefix(&driver, "SELECT").len(), 3);
}

#[test]
fn eagerly_loaded_to_one_aliases_the_managed_owner() {
    let (factory, _driver) = setup(1);

    let seeder = factory.open_session();
    seeder.persist(Author::new(1, "Iris")).unwrap();
    seeder.persist(Book::new(10, "First", 1)).unwrap();
    seeder.close().unwrap();

    let session = factory.open_session();
    let author: Managed<Author> = session.find(1).unwrap();
    let book: Managed<Book> = session.find(10).unwrap();

    let linked = book.borrow().author.clone().unwrap();
    assert!(Rc::ptr_eq(&linked, &author));
}

#[test]
fn collection_entities_are_managed_instances() {
    let (factory, _driver) = setup(1);

    let seeder = factory.open_session();
    seeder.persist(Author::new(1, "Iris")).unwrap();
    seeder.persist(Book::new(10, "First", 1)).unwrap();
    seeder.close().unwrap();

    let session = factory.open_session();
    let author: Managed<Author> = session.find(1).unwrap();
    let from_collection = {
        let borrowed = author.borrow();
        let books = borrowed.books.get().unwrap();
        Rc::clone(&books[0])
    };
    let from_find: Managed<Book> = session.find(10).unwrap();
    assert!(Rc::ptr_eq(&from_collection, &from_find));
}

#[test]
fn unloaded_entities_have_empty_collections() {
    let author = Author::new(99, "Nobody");
    let books = author.books.get().unwrap();
    assert!(books.is_empty());
}
