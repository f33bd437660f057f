//! Round trips, dirty detection and merge semantics.

mod fixtures;

use fixtures::{Person, setup, statements_with_prefix};
use rowmap::prelude::*;

#[test]
fn round_trip_within_one_session_needs_only_the_insert() {
    let (factory, driver) = setup(1);
    let session = factory.open_session();

    let original = Person::new(7, "John", 30);
    session.persist(original.clone()).unwrap();
    session.flush().unwrap();

    let found: Managed<Person> = session.find(7).unwrap();
    assert_eq!(*found.borrow(), original);

    // Exactly one INSERT, and the find was served from the context.
    assert_eq!(statements_with_prefix(&driver, "INSERT").len(), 1);
    assert!(statements_with_prefix(&driver, "SELECT").is_empty());
}

#[test]
fn round_trip_across_sessions_reads_back_the_stored_row() {
    let (factory, driver) = setup(1);
    let writer = factory.open_session();
    writer.persist(Person::new(7, "John", 30)).unwrap();
    writer.close().unwrap();

    let reader = factory.open_session();
    let found: Managed<Person> = reader.find(7).unwrap();
    assert_eq!(*found.borrow(), Person::new(7, "John", 30));
    assert_eq!(statements_with_prefix(&driver, "SELECT").len(), 1);
}

#[test]
fn mutating_a_managed_entity_issues_one_update() {
    let (factory, driver) = setup(1);
    let session = factory.open_session();

    let person = session.persist(Person::new(7, "John", 30)).unwrap();
    session.flush().unwrap();

    person.borrow_mut().name = "Jane".into();
    session.flush().unwrap();

    assert_eq!(
        statements_with_prefix(&driver, "UPDATE"),
        vec!["UPDATE person SET name = ?, age = ? WHERE id = ?;"]
    );
    assert_eq!(statements_with_prefix(&driver, "INSERT").len(), 1);
    assert_eq!(
        driver.store().cell("person", 7, "name"),
        Some(Value::Text("Jane".into()))
    );
}

#[test]
fn unchanged_loaded_entities_are_not_updated() {
    let (factory, driver) = setup(1);
    let writer = factory.open_session();
    writer.persist(Person::new(7, "John", 30)).unwrap();
    writer.close().unwrap();

    let reader = factory.open_session();
    let _loaded: Managed<Person> = reader.find(7).unwrap();
    reader.flush().unwrap();
    reader.close().unwrap();

    assert!(statements_with_prefix(&driver, "UPDATE").is_empty());
}

#[test]
fn merge_of_a_managed_entity_stages_one_update() {
    let (factory, driver) = setup(1);
    let session = factory.open_session();

    let person = session.persist(Person::new(7, "John", 30)).unwrap();
    session.flush().unwrap();

    person.borrow_mut().name = "Jane".into();
    session.merge(Person::new(7, "Jane", 30)).unwrap();
    session.flush().unwrap();

    // The staged merge update and the dirty-check update collapse into one.
    assert_eq!(statements_with_prefix(&driver, "UPDATE").len(), 1);
    assert_eq!(
        driver.store().cell("person", 7, "name"),
        Some(Value::Text("Jane".into()))
    );
}

#[test]
fn merge_of_a_detached_existing_entity_probes_then_updates() {
    let (factory, driver) = setup(1);
    let writer = factory.open_session();
    writer.persist(Person::new(7, "John", 30)).unwrap();
    writer.close().unwrap();
    driver.store().clear_log();

    let session = factory.open_session();
    session.merge(Person::new(7, "Jane", 31)).unwrap();
    session.flush().unwrap();

    // One existence probe, one update, no insert.
    assert_eq!(statements_with_prefix(&driver, "SELECT").len(), 1);
    assert_eq!(statements_with_prefix(&driver, "UPDATE").len(), 1);
    assert!(statements_with_prefix(&driver, "INSERT").is_empty());
    assert_eq!(
        driver.store().cell("person", 7, "age"),
        Some(Value::Int(31))
    );
}

#[test]
fn merge_of_an_unknown_entity_persists_it() {
    let (factory, driver) = setup(1);
    let session = factory.open_session();

    session.merge(Person::new(9, "Fresh", 20)).unwrap();
    session.flush().unwrap();

    assert_eq!(statements_with_prefix(&driver, "INSERT").len(), 1);
    assert!(statements_with_prefix(&driver, "UPDATE").is_empty());
    assert_eq!(driver.store().row_count("person"), 1);
}

#[test]
fn snapshot_refresh_keeps_later_flushes_quiet() {
    let (factory, driver) = setup(1);
    let session = factory.open_session();

    let person = session.persist(Person::new(7, "John", 30)).unwrap();
    session.flush().unwrap();
    person.borrow_mut().age = 31;
    session.flush().unwrap();
    assert_eq!(statements_with_prefix(&driver, "UPDATE").len(), 1);

    // Nothing changed since the last flush: no further updates.
    session.flush().unwrap();
    session.close().unwrap();
    assert_eq!(statements_with_prefix(&driver, "UPDATE").len(), 1);
}
