//! The data-access entry point.

use std::any::TypeId;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, LazyLock};
use std::time::Duration;

use dashmap::DashMap;
use sea_query::{Asterisk, QueryStatementBuilder, Value};

use crate::dialect::{Command, SqlAdapter, SqlServerAdapter, default_adapters, dialect_key};
use crate::entity::Entity;
use crate::error::Result;
use crate::metadata::{EntityDescriptor, EntityInfo, TableNameMapper};
use crate::query::{Ident, Query};
use crate::select::SelectBuilder;
use crate::Connection;

/// Selects the dialect key for a connection.
pub type DialectResolver = Arc<dyn Fn(&dyn Connection) -> String + Send + Sync>;

/// Statements cached per entity type and adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum SqlKind {
    Get,
    GetAll,
    Update,
    Delete,
    DeleteAll,
}

type SqlCacheKey = (TypeId, SqlKind, &'static str);

static GLOBAL: LazyLock<SqlMapper> = LazyLock::new(SqlMapper::new);

/// Maps entities onto tables and runs CRUD statements and queries against a
/// caller-owned [`Connection`].
///
/// Entity descriptors and generated SQL are cached per entity type for the
/// lifetime of the mapper. Neither cache is ever invalidated.
pub struct SqlMapper {
    table_name_mapper: Option<TableNameMapper>,
    dialect_resolver: Option<DialectResolver>,
    adapters: HashMap<String, Arc<dyn SqlAdapter>>,
    fallback: Arc<dyn SqlAdapter>,
    command_timeout: Option<Duration>,
    descriptors: DashMap<TypeId, Arc<EntityDescriptor>>,
    statements: DashMap<SqlCacheKey, Arc<str>>,
}

impl fmt::Debug for SqlMapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqlMapper")
            .field("adapters", &self.adapters.keys().collect::<Vec<_>>())
            .field("command_timeout", &self.command_timeout)
            .field("descriptors", &self.descriptors.len())
            .field("statements", &self.statements.len())
            .finish_non_exhaustive()
    }
}

impl Default for SqlMapper {
    fn default() -> Self {
        Self::new()
    }
}

impl SqlMapper {
    /// A mapper with the default adapters and no overrides.
    #[must_use]
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Start configuring a mapper.
    #[must_use]
    pub fn builder() -> SqlMapperBuilder {
        SqlMapperBuilder::default()
    }

    /// Process-wide mapper with default configuration.
    #[must_use]
    pub fn global() -> &'static Self {
        &GLOBAL
    }

    /// Descriptor for `T`, derived on first use.
    pub fn describe<T: Entity>(&self) -> Arc<EntityDescriptor> {
        let id = TypeId::of::<T>();
        if let Some(descriptor) = self.descriptors.get(&id) {
            return Arc::clone(descriptor.value());
        }

        let descriptor = Arc::new(EntityDescriptor::build::<T>(self.table_name_mapper.as_ref()));
        tracing::trace!(entity = T::NAME, table = %descriptor.table, "cached entity descriptor");
        Arc::clone(self.descriptors.entry(id).or_insert(descriptor).value())
    }

    /// Adapter for `conn`. Unknown dialects fall back to SQL Server.
    pub fn adapter_for(&self, conn: &dyn Connection) -> Arc<dyn SqlAdapter> {
        let key = self
            .dialect_resolver
            .as_ref()
            .map_or_else(|| dialect_key(conn), |resolve| resolve(conn).to_lowercase());
        self.adapters.get(&key).map_or_else(|| Arc::clone(&self.fallback), Arc::clone)
    }

    /// Start a query over `T`.
    pub fn select<'a, T: Entity>(&'a self, conn: &'a dyn Connection) -> SelectBuilder<'a, T> {
        SelectBuilder::new(self, conn)
    }

    /// Fetch the entity whose key equals `id`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Schema`](crate::Error::Schema) unless `T` has exactly one
    /// key, [`Error::Mapping`](crate::Error::Mapping) if the row cannot be
    /// materialized, or the connection's error.
    pub fn get<T: Entity>(&self, conn: &dyn Connection, id: impl Into<Value>) -> Result<Option<T>> {
        let descriptor = self.describe::<T>();
        let adapter = self.adapter_for(conn);
        let key = descriptor.single_key("get")?;

        let query = self.cached_query::<T, _>(SqlKind::Get, adapter.as_ref(), vec![id.into()], |mut values| {
            let mut statement = sea_query::Query::select();
            statement
                .column(Asterisk)
                .from(Ident::bare(descriptor.table.as_str()))
                .and_where(adapter.column_equals_value(key.column, values.remove(0)));
            statement
        })?;

        let rows = self.command(&descriptor.table, adapter.as_ref()).query(conn, query)?;
        rows.first().map(T::from_row).transpose()
    }

    /// Fetch every row of `T`'s table.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Mapping`](crate::Error::Mapping) if a row cannot be
    /// materialized, or the connection's error.
    pub fn get_all<T: Entity>(&self, conn: &dyn Connection) -> Result<Vec<T>> {
        let descriptor = self.describe::<T>();
        let adapter = self.adapter_for(conn);
        let query = self.cached_query::<T, _>(SqlKind::GetAll, adapter.as_ref(), Vec::new(), |_| {
            let mut statement = sea_query::Query::select();
            statement.column(Asterisk).from(Ident::bare(descriptor.table.as_str()));
            statement
        })?;

        let rows = self.command(&descriptor.table, adapter.as_ref()).query(conn, query)?;
        rows.iter().map(T::from_row).collect()
    }

    /// Render the statement `kind` for `T` once per adapter, then pair the
    /// cached SQL with `values`. `values` must be listed in placeholder order.
    pub(crate) fn cached_query<T: Entity, S: QueryStatementBuilder>(
        &self, kind: SqlKind, adapter: &dyn SqlAdapter, values: Vec<Value>,
        statement: impl FnOnce(Vec<Value>) -> S,
    ) -> Result<Query> {
        let key = (TypeId::of::<T>(), kind, adapter.name());
        if let Some(sql) = self.statements.get(&key) {
            return Query::with_values(&**sql.value(), values);
        }

        let query = Query::build(&statement(values), &adapter.query_builder())?;
        tracing::trace!(entity = T::NAME, kind = ?kind, dialect = adapter.name(), "cached SQL");
        self.statements.entry(key).or_insert_with(|| query.sql.as_str().into());
        Ok(query)
    }

    pub(crate) fn command<'a>(&self, table: &'a str, adapter: &dyn SqlAdapter) -> Command<'a> {
        Command {
            table,
            dialect: adapter.name(),
            timeout: self.command_timeout,
        }
    }

    pub(crate) const fn command_timeout(&self) -> Option<Duration> {
        self.command_timeout
    }
}

/// Configures a [`SqlMapper`].
#[derive(Default)]
pub struct SqlMapperBuilder {
    table_name_mapper: Option<TableNameMapper>,
    dialect_resolver: Option<DialectResolver>,
    adapters: Vec<(String, Arc<dyn SqlAdapter>)>,
    command_timeout: Option<Duration>,
}

impl fmt::Debug for SqlMapperBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqlMapperBuilder")
            .field("adapters", &self.adapters)
            .field("command_timeout", &self.command_timeout)
            .finish_non_exhaustive()
    }
}

impl SqlMapperBuilder {
    /// Replace default table-name pluralization. Explicit `table` markers still
    /// take precedence.
    #[must_use]
    pub fn table_name_mapper(
        mut self, mapper: impl Fn(&EntityInfo) -> String + Send + Sync + 'static,
    ) -> Self {
        self.table_name_mapper = Some(Arc::new(mapper));
        self
    }

    /// Replace dialect detection from the connection's type name.
    #[must_use]
    pub fn dialect_resolver(
        mut self, resolver: impl Fn(&dyn Connection) -> String + Send + Sync + 'static,
    ) -> Self {
        self.dialect_resolver = Some(Arc::new(resolver));
        self
    }

    /// Add or replace the adapter for a dialect key.
    #[must_use]
    pub fn register_adapter(mut self, key: impl Into<String>, adapter: Arc<dyn SqlAdapter>) -> Self {
        self.adapters.push((key.into().to_lowercase(), adapter));
        self
    }

    /// Timeout passed with every statement.
    #[must_use]
    pub const fn command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = Some(timeout);
        self
    }

    /// Finish configuration. Registered adapters replace the defaults under the
    /// same key.
    #[must_use]
    pub fn build(self) -> SqlMapper {
        let mut adapters: HashMap<String, Arc<dyn SqlAdapter>> =
            default_adapters().into_iter().map(|(key, adapter)| (key.to_string(), adapter)).collect();
        adapters.extend(self.adapters);

        SqlMapper {
            table_name_mapper: self.table_name_mapper,
            dialect_resolver: self.dialect_resolver,
            adapters,
            fallback: Arc::new(SqlServerAdapter),
            command_timeout: self.command_timeout,
            descriptors: DashMap::new(),
            statements: DashMap::new(),
        }
    }
}
