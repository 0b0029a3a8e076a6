use std::collections::{BTreeMap, BTreeSet};

use crate::error::{Error, Result};
use crate::schema::SchemaDescription;

/// Validate internal consistency of a schema snapshot.
///
/// This checks:
/// - table names are unique within the description
/// - column names are unique within each table
/// - primary-key columns exist
/// - foreign keys point at existing tables and columns
pub fn validate_schema(schema: &SchemaDescription) -> Result<()> {
    let mut catalog: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();

    for table in &schema.tables {
        let mut columns = BTreeSet::new();
        for column in &table.columns {
            if !columns.insert(column.name.as_str()) {
                return Err(Error::InvalidSchema(format!(
                    "duplicate column name: {}.{}",
                    table.name, column.name
                )));
            }
        }
        if catalog.insert(table.name.as_str(), columns).is_some() {
            return Err(Error::InvalidSchema(format!(
                "duplicate table name: {}",
                table.name
            )));
        }
    }

    for table in &schema.tables {
        let columns = &catalog[table.name.as_str()];

        for pk_column in &table.primary_key {
            if !columns.contains(pk_column.as_str()) {
                return Err(Error::InvalidSchema(format!(
                    "primary key column not found: {}.{}",
                    table.name, pk_column
                )));
            }
        }

        for fk in &table.foreign_keys {
            if !columns.contains(fk.column.as_str()) {
                return Err(Error::InvalidSchema(format!(
                    "foreign key column not found: {}.{}",
                    table.name, fk.column
                )));
            }
            let referenced = catalog.get(fk.referenced_table.as_str()).ok_or_else(|| {
                Error::InvalidSchema(format!(
                    "referenced table not found: {}",
                    fk.referenced_table
                ))
            })?;
            if !referenced.contains(fk.referenced_column.as_str()) {
                return Err(Error::InvalidSchema(format!(
                    "referenced column not found: {}.{}",
                    fk.referenced_table, fk.referenced_column
                )));
            }
        }
    }

    Ok(())
}
