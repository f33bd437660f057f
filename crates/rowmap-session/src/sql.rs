//! SQL statement templates generated by the persister.
//!
//! The emitted shapes are part of the runtime's compatibility surface:
//!
//! ```text
//! INSERT INTO <table>(<cols>) VALUES(<placeholders>);
//! SELECT * FROM <table> WHERE <col> = ?;
//! UPDATE <table> SET <col> = ?, ... WHERE <idCol> = ?;
//! DELETE FROM <table> WHERE <idCol> = ?;
//! ```

use rowmap_core::{EntityDescriptor, Result};

/// Build the INSERT statement for an entity: id + simple columns in
/// descriptor order.
pub fn insert_sql(descriptor: &EntityDescriptor) -> Result<String> {
    descriptor.id_column()?;
    let columns: Vec<&str> = descriptor
        .insertable_columns()
        .map(|c| c.column())
        .collect();
    let placeholders: Vec<&str> = columns.iter().map(|_| "?").collect();
    Ok(format!(
        "INSERT INTO {}({}) VALUES({});",
        descriptor.table(),
        columns.join(", "),
        placeholders.join(",")
    ))
}

/// Build the UPDATE statement for an entity: all non-id simple columns,
/// filtered on the id column.
pub fn update_sql(descriptor: &EntityDescriptor) -> Result<String> {
    let id_column = descriptor.id_column()?;
    let assignments: Vec<String> = descriptor
        .updatable_columns()
        .map(|c| format!("{} = ?", c.column()))
        .collect();
    Ok(format!(
        "UPDATE {} SET {} WHERE {} = ?;",
        descriptor.table(),
        assignments.join(", "),
        id_column.column()
    ))
}

/// Build the DELETE statement for an entity, filtered on the id column.
pub fn delete_sql(descriptor: &EntityDescriptor) -> Result<String> {
    let id_column = descriptor.id_column()?;
    Ok(format!(
        "DELETE FROM {} WHERE {} = ?;",
        descriptor.table(),
        id_column.column()
    ))
}

/// Build a SELECT filtered on one column.
#[must_use]
pub fn select_by_column_sql(table: &str, column: &str) -> String {
    format!("SELECT * FROM {table} WHERE {column} = ?;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::Person;
    use rowmap_core::Entity;

    #[test]
    fn test_insert_template() {
        assert_eq!(
            insert_sql(Person::descriptor()).unwrap(),
            "INSERT INTO person(id, name, age) VALUES(?,?,?);"
        );
    }

    #[test]
    fn test_update_template_binds_id_last() {
        assert_eq!(
            update_sql(Person::descriptor()).unwrap(),
            "UPDATE person SET name = ?, age = ? WHERE id = ?;"
        );
    }

    #[test]
    fn test_delete_template() {
        assert_eq!(
            delete_sql(Person::descriptor()).unwrap(),
            "DELETE FROM person WHERE id = ?;"
        );
    }

    #[test]
    fn test_select_template() {
        assert_eq!(
            select_by_column_sql("person", "name"),
            "SELECT * FROM person WHERE name = ?;"
        );
    }
}
