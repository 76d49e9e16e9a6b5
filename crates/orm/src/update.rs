use std::collections::BTreeSet;

use sea_query::{UpdateStatement, Value};

use crate::dialect::SqlAdapter;
use crate::entity::{Entity, Property};
use crate::error::{Error, Result};
use crate::insert::property_values;
use crate::mapper::{SqlKind, SqlMapper};
use crate::metadata::EntityDescriptor;
use crate::query::{Ident, Query};
use crate::tracked::{Dirty, Tracked};
use crate::Connection;

impl SqlMapper {
    /// Update every updatable column of `entity`, matching on its keys.
    ///
    /// Key, computed and `ignore_update` properties are not written. Composite
    /// keys are combined with `AND`. Returns whether any row was affected.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Schema`] if `T` declares no key,
    /// [`Error::InvalidOperation`] if it has no updatable property, or the
    /// connection's error.
    pub fn update<T: Entity>(&self, conn: &dyn Connection, entity: &T) -> Result<bool> {
        self.update_columns(conn, entity, None)
    }

    /// Update only what changed on a tracked entity.
    ///
    /// A clean entity is not written and returns `false`. Otherwise the dirty
    /// updatable columns are written and the entity is marked clean on success.
    ///
    /// # Errors
    ///
    /// See [`SqlMapper::update`].
    pub fn update_tracked<T: Entity>(
        &self, conn: &dyn Connection, tracked: &mut Tracked<T>,
    ) -> Result<bool> {
        let updated = match tracked.dirty() {
            Dirty::Clean => return Ok(false),
            Dirty::All => self.update_columns(conn, tracked.get(), None)?,
            Dirty::Fields(fields) => self.update_columns(conn, tracked.get(), Some(fields))?,
        };
        tracked.mark_clean();
        Ok(updated)
    }

    fn update_columns<T: Entity>(
        &self, conn: &dyn Connection, entity: &T, only: Option<&BTreeSet<&'static str>>,
    ) -> Result<bool> {
        let descriptor = self.describe::<T>();
        let adapter = self.adapter_for(conn);
        let keys = descriptor.require_keys("update")?;

        if descriptor.updatable().next().is_none() {
            return Err(Error::InvalidOperation(format!(
                "{} has no updatable properties",
                descriptor.info.name
            )));
        }

        let columns: Vec<&Property> = descriptor
            .updatable()
            .filter(|p| only.is_none_or(|fields| fields.contains(p.name)))
            .collect();
        if columns.is_empty() {
            return Ok(false);
        }

        let mut values = property_values(entity, columns.iter().copied())?;
        values.extend(property_values(entity, keys.iter().copied())?);
        let statement = |values: Vec<Value>| {
            update_statement(adapter.as_ref(), &descriptor, &columns, &keys, values)
        };
        let query = match only {
            None => self.cached_query::<T, _>(SqlKind::Update, adapter.as_ref(), values, statement)?,
            Some(_) => Query::build(&statement(values), &adapter.query_builder())?,
        };

        let affected = self.command(&descriptor.table, adapter.as_ref()).execute(conn, query)?;
        Ok(affected > 0)
    }
}

// `values` holds the SET values followed by the key values.
fn update_statement(
    adapter: &dyn SqlAdapter, descriptor: &EntityDescriptor, columns: &[&Property],
    keys: &[&Property], values: Vec<Value>,
) -> UpdateStatement {
    let mut values = values.into_iter();
    let mut statement = sea_query::Query::update();
    statement.table(Ident::bare(descriptor.table.as_str()));
    for (property, value) in columns.iter().zip(values.by_ref()) {
        statement.value(adapter.column(property.column), value);
    }
    for (key, value) in keys.iter().zip(values) {
        statement.and_where(adapter.column_equals_value(key.column, value));
    }
    statement
}
