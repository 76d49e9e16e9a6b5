use sea_query::Value;

use crate::dialect::{InsertCommand, SqlAdapter};
use crate::entity::{AsEntities, Entities, Entity, Property};
use crate::error::{Error, Result};
use crate::mapper::SqlMapper;
use crate::metadata::EntityDescriptor;
use crate::query::{OpenGuard, Query};
use crate::Connection;

impl SqlMapper {
    /// Insert one entity or a slice of entities.
    ///
    /// A single entity returns the generated identity (`0` when the database
    /// reports none), or the affected row count when the entity has no
    /// auto-generated key. A slice is inserted with one multi-row statement and
    /// returns the affected row count; an empty slice inserts nothing.
    ///
    /// Key and computed properties are not written. A closed connection is
    /// opened for the call and closed again afterwards.
    ///
    /// # Errors
    ///
    /// Returns the connection's error if the insert fails.
    pub fn insert<E>(&self, conn: &dyn Connection, entities: &E) -> Result<i64>
    where
        E: AsEntities + ?Sized,
    {
        let descriptor = self.describe::<E::Entity>();
        let adapter = self.adapter_for(conn);

        match entities.as_entities() {
            Entities::One(entity) => {
                let _guard = OpenGuard::acquire(conn)?;
                self.insert_one(conn, adapter.as_ref(), &descriptor, entity)
            }
            Entities::Many([]) => Ok(0),
            Entities::Many(entities) => {
                let _guard = OpenGuard::acquire(conn)?;
                self.insert_many(conn, adapter.as_ref(), &descriptor, entities)
            }
        }
    }

    fn insert_one<T: Entity>(
        &self, conn: &dyn Connection, adapter: &dyn SqlAdapter, descriptor: &EntityDescriptor,
        entity: &T,
    ) -> Result<i64> {
        let row = property_values(entity, descriptor.insertable())?;
        let command = self.insert_command(descriptor, vec![row]);
        adapter.insert(conn, &command)
    }

    fn insert_many<T: Entity>(
        &self, conn: &dyn Connection, adapter: &dyn SqlAdapter, descriptor: &EntityDescriptor,
        entities: &[T],
    ) -> Result<i64> {
        let rows = entities
            .iter()
            .map(|entity| property_values(entity, descriptor.insertable()))
            .collect::<Result<_>>()?;
        let command = self.insert_command(descriptor, rows);
        let query = Query::build(&command.statement(adapter)?, &adapter.query_builder())?;
        let affected = command.command(adapter).execute(conn, query)?;
        Ok(i64::try_from(affected).unwrap_or(i64::MAX))
    }

    fn insert_command<'a>(
        &self, descriptor: &'a EntityDescriptor, rows: Vec<Vec<Value>>,
    ) -> InsertCommand<'a> {
        InsertCommand {
            table: &descriptor.table,
            columns: descriptor.insertable().map(|p| p.column).collect(),
            rows,
            keys: &descriptor.keys,
            timeout: self.command_timeout(),
        }
    }
}

/// Values of `properties` on `entity`, in property order.
pub(crate) fn property_values<'p, T: Entity>(
    entity: &T, properties: impl IntoIterator<Item = &'p Property>,
) -> Result<Vec<Value>> {
    let mut values = entity.values();
    properties
        .into_iter()
        .map(|property| {
            let index = values.iter().position(|(name, _)| *name == property.name).ok_or_else(|| {
                Error::InvalidOperation(format!(
                    "{} provides no value for property '{}'",
                    T::NAME,
                    property.name
                ))
            })?;
            Ok(values.swap_remove(index).1)
        })
        .collect()
}
