use sea_query::{DeleteStatement, SimpleExpr, Value};

use crate::dialect::SqlAdapter;
use crate::entity::{AsEntities, Entities, Entity, Property};
use crate::error::{Error, Result};
use crate::insert::property_values;
use crate::mapper::{SqlKind, SqlMapper};
use crate::query::{Ident, Query};
use crate::Connection;

impl SqlMapper {
    /// Delete one entity or a slice of entities by key.
    ///
    /// A slice is deleted with a single statement. Returns whether any row
    /// was affected.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Schema`] if the entity declares no key,
    /// [`Error::Argument`] for an empty slice, or the connection's error.
    pub fn delete<E>(&self, conn: &dyn Connection, entities: &E) -> Result<bool>
    where
        E: AsEntities + ?Sized,
    {
        let descriptor = self.describe::<E::Entity>();
        let adapter = self.adapter_for(conn);
        let keys = descriptor.require_keys("delete")?;
        let table = descriptor.table.as_str();

        let query = match entities.as_entities() {
            Entities::One(entity) => {
                let values = property_values(entity, keys.iter().copied())?;
                let statement = |values: Vec<Value>| {
                    let mut statement = delete_from(table);
                    statement.and_where(key_match(adapter.as_ref(), &keys, values));
                    statement
                };
                self.cached_query::<E::Entity, _>(
                    SqlKind::Delete,
                    adapter.as_ref(),
                    values,
                    statement,
                )?
            }
            Entities::Many([]) => {
                return Err(Error::Argument(format!(
                    "no {} entities given to delete",
                    descriptor.info.name
                )));
            }
            Entities::Many(entities) => {
                let mut matches = Vec::with_capacity(entities.len());
                for entity in entities {
                    let values = property_values(entity, keys.iter().copied())?;
                    matches.push(key_match(adapter.as_ref(), &keys, values));
                }
                let mut statement = delete_from(table);
                if let Some(any) = matches.into_iter().reduce(SimpleExpr::or) {
                    statement.and_where(any);
                }
                Query::build(&statement, &adapter.query_builder())?
            }
        };

        let affected = self.command(table, adapter.as_ref()).execute(conn, query)?;
        Ok(affected > 0)
    }

    /// Delete every row of `T`'s table. Returns whether any row was affected.
    ///
    /// # Errors
    ///
    /// Returns the connection's error if the delete fails.
    pub fn delete_all<T: Entity>(&self, conn: &dyn Connection) -> Result<bool> {
        let descriptor = self.describe::<T>();
        let adapter = self.adapter_for(conn);
        let query = self.cached_query::<T, _>(SqlKind::DeleteAll, adapter.as_ref(), Vec::new(), |_| {
            delete_from(&descriptor.table)
        })?;

        let affected = self.command(&descriptor.table, adapter.as_ref()).execute(conn, query)?;
        Ok(affected > 0)
    }
}

fn delete_from(table: &str) -> DeleteStatement {
    let mut statement = sea_query::Query::delete();
    statement.from_table(Ident::bare(table));
    statement
}

// `k1 = ? AND k2 = ?`
fn key_match(adapter: &dyn SqlAdapter, keys: &[&Property], values: Vec<Value>) -> SimpleExpr {
    keys.iter()
        .zip(values)
        .map(|(key, value)| adapter.column_equals_value(key.column, value))
        .reduce(SimpleExpr::and)
        .unwrap_or_else(|| SimpleExpr::Constant(true.into()))
}
