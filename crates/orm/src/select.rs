use std::marker::PhantomData;
use std::sync::Arc;

use sea_query::{Asterisk, Expr as SqlExpr, Func, Order, SelectStatement, SimpleExpr};

use crate::compile::Compiler;
use crate::dialect::{PageQuery, SqlAdapter};
use crate::entity::{Entity, Property, datatype_to_value, identity};
use crate::error::{Error, Result};
use crate::expr::Expr;
use crate::metadata::EntityDescriptor;
use crate::paging::{CursorPage, PagedList, decode_cursor, encode_cursor};
use crate::query::{Ident, Query, Window};
use crate::{Connection, Row, SqlMapper};

/// Builder for constructing SELECT queries over one entity type.
///
/// Created by [`SqlMapper::select`]. Filters are added with
/// [`where_if`](Self::where_if); a terminal method runs the query. Errors
/// raised while compiling a filter are reported by the terminal method.
pub struct SelectBuilder<'a, T: Entity> {
    mapper: &'a SqlMapper,
    conn: &'a dyn Connection,
    adapter: Arc<dyn SqlAdapter>,
    descriptor: Arc<EntityDescriptor>,
    filters: Vec<SimpleExpr>,
    order: Option<(&'static str, bool)>,
    error: Option<Error>,
    _marker: PhantomData<T>,
}

impl<'a, T: Entity> SelectBuilder<'a, T> {
    pub(crate) fn new(mapper: &'a SqlMapper, conn: &'a dyn Connection) -> Self {
        Self {
            mapper,
            conn,
            adapter: mapper.adapter_for(conn),
            descriptor: mapper.describe::<T>(),
            filters: Vec::new(),
            order: None,
            error: None,
            _marker: PhantomData,
        }
    }

    /// Adds `predicate` to the WHERE clause when `condition` holds.
    #[must_use]
    pub fn where_if(mut self, condition: bool, predicate: Expr) -> Self {
        if !condition || self.error.is_some() {
            return self;
        }

        match Compiler::new(&self.descriptor, self.adapter.as_ref()).compile(&predicate) {
            Ok(filter) => self.filters.push(filter),
            Err(e) => self.error = Some(e),
        }
        self
    }

    /// Adds ascending ORDER BY clause, replacing any previous ordering.
    #[must_use]
    pub const fn order_by(mut self, property: &'static str) -> Self {
        self.order = Some((property, false));
        self
    }

    /// Adds descending ORDER BY clause, replacing any previous ordering.
    #[must_use]
    pub const fn order_by_desc(mut self, property: &'static str) -> Self {
        self.order = Some((property, true));
        self
    }

    /// Fetch every matching row.
    ///
    /// # Errors
    ///
    /// Returns any deferred filter error, [`Error::UnknownProperty`] for an
    /// unknown ordering property, a mapping error, or the connection's error.
    pub fn fetch(mut self) -> Result<Vec<T>> {
        self.check()?;
        let mut statement = self.statement();
        statement.column(Asterisk);
        if let Some((property, descending)) = self.order {
            let property = self.descriptor.property(property)?;
            statement.order_by(self.adapter.column(property.column), order(descending));
        }

        let rows = self.query(&statement)?;
        rows.iter().map(T::from_row).collect()
    }

    /// Count matching rows.
    ///
    /// # Errors
    ///
    /// Returns any deferred filter error or the connection's error.
    pub fn count(mut self) -> Result<u64> {
        self.check()?;
        self.count_rows()
    }

    /// Fetch one page of matching rows together with the total match count.
    ///
    /// `page` and `per_page` below 1 are treated as 1. A page past the last
    /// matching row is empty.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidOperation`] if neither an ordering nor a default
    /// sort is set, any deferred filter error, or the connection's error.
    pub fn fetch_page(mut self, page: u64, per_page: u64) -> Result<PagedList<T>> {
        self.check()?;
        let page = page.max(1);
        let per_page = per_page.max(1);
        let (sort, descending) = self.sort("paged")?;

        let total_items = self.count_rows()?;
        let query = PageQuery {
            table: &self.descriptor.table,
            filters: &self.filters,
            order_column: sort.column,
            descending,
            window: Window::page(page, per_page),
        };
        let rows = self.adapter.fetch_page(self.conn, &query, self.mapper.command_timeout())?;

        Ok(PagedList {
            items: rows.iter().map(T::from_row).collect::<Result<_>>()?,
            page,
            items_per_page: per_page,
            total_items,
        })
    }

    /// Fetch the page following `cursor`, or the first page when `cursor` is
    /// `None`.
    ///
    /// Rows are ordered by the sort property; the returned cursor encodes the
    /// sort value of the last row and is set only when more rows remain. The
    /// sort property should be unique.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidOperation`] if neither an ordering nor a default
    /// sort is set or the last row's sort value is null,
    /// [`Error::InvalidCursor`] for an undecodable cursor, any deferred filter
    /// error, or the connection's error.
    pub fn fetch_cursor(mut self, cursor: Option<&str>, page_size: u64) -> Result<CursorPage<T>> {
        self.check()?;
        let page_size = page_size.max(1);
        let (sort, descending) = self.sort("cursor")?;

        if let Some(token) = cursor {
            let value = datatype_to_value(decode_cursor(token)?);
            let column = SqlExpr::col(self.adapter.column(sort.column));
            self.filters.push(if descending { column.lt(value) } else { column.gt(value) });
        }

        // One extra row tells whether another page follows.
        let query = PageQuery {
            table: &self.descriptor.table,
            filters: &self.filters,
            order_column: sort.column,
            descending,
            window: Window {
                offset: 0,
                size: page_size.saturating_add(1),
            },
        };
        let mut rows = self.adapter.fetch_page(self.conn, &query, self.mapper.command_timeout())?;

        let has_next = u64::try_from(rows.len()).unwrap_or(u64::MAX) > page_size;
        rows.truncate(usize::try_from(page_size).unwrap_or(usize::MAX));
        let next_cursor = match rows.last() {
            Some(last) if has_next => Some(cursor_of(last, &sort)?),
            _ => None,
        };

        Ok(CursorPage {
            items: rows.iter().map(T::from_row).collect::<Result<_>>()?,
            page_size,
            has_next,
            next_cursor,
        })
    }

    fn check(&mut self) -> Result<()> {
        self.error.take().map_or(Ok(()), Err)
    }

    // FROM and WHERE, without a projection.
    fn statement(&self) -> SelectStatement {
        let mut statement = sea_query::Query::select();
        statement.from(Ident::bare(self.descriptor.table.as_str()));
        for filter in &self.filters {
            statement.and_where(filter.clone());
        }
        statement
    }

    // Explicit ordering, else the default sort ascending.
    fn sort(&self, kind: &str) -> Result<(Property, bool)> {
        if let Some((property, descending)) = self.order {
            return Ok((*self.descriptor.property(property)?, descending));
        }
        self.descriptor.default_sort.map(|sort| (sort, false)).ok_or_else(|| {
            Error::InvalidOperation(format!(
                "{kind} query on {} requires order_by or a default_sort property",
                self.descriptor.info.name
            ))
        })
    }

    fn count_rows(&self) -> Result<u64> {
        let mut statement = self.statement();
        statement.expr(Func::count(SqlExpr::col(Asterisk)));
        let rows = self.query(&statement)?;
        let count = rows.first().and_then(Row::first).map_or(Ok(0), identity)?;
        Ok(u64::try_from(count).unwrap_or_default())
    }

    fn query(&self, statement: &SelectStatement) -> Result<Vec<Row>> {
        let query = Query::build(statement, &self.adapter.query_builder())?;
        self.mapper.command(&self.descriptor.table, self.adapter.as_ref()).query(self.conn, query)
    }
}

const fn order(descending: bool) -> Order {
    if descending { Order::Desc } else { Order::Asc }
}

fn cursor_of(row: &Row, sort: &Property) -> Result<String> {
    match row.get(sort.column) {
        Some(value) if !value.is_null() => encode_cursor(value),
        _ => Err(Error::InvalidOperation(format!(
            "cursor paging needs a non-null '{}' in every row",
            sort.name
        ))),
    }
}
