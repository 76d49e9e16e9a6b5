//! SQL dialect adapters.
//!
//! One stateless adapter per backend encapsulates identifier quoting, LIKE
//! escaping, parameter placeholders, insert with identity retrieval and the
//! paged-fetch statement shape. Statements are sea-query trees rendered by the
//! adapter's [`QueryBuilder`].

use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;

use sea_query::{
    Alias, Asterisk, Expr, Func, Iden, InsertStatement, Order, Quote, SelectStatement, SimpleExpr,
    Value, WindowStatement,
};

use crate::entity::{Property, identity};
use crate::error::{Error, Result};
use crate::query::{Ident, Paging, Query, QueryBuilder, Window, row_count};
use crate::{Connection, Row, Statement};

/// How a dialect escapes LIKE metacharacters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LikeEscape {
    /// `\%`, `\_`, `\\`.
    Backslash,
    /// `[%]`, `[_]`, `[[]`.
    Bracket,
}

/// Rows handed to [`SqlAdapter::insert`].
#[derive(Debug)]
pub struct InsertCommand<'a> {
    /// Target table.
    pub table: &'a str,
    /// Unquoted column names, in value order.
    pub columns: Vec<&'static str>,
    /// One value list per row.
    pub rows: Vec<Vec<Value>>,
    /// Auto-generated key properties.
    pub keys: &'a [Property],
    /// Timeout passed with every statement.
    pub timeout: Option<Duration>,
}

impl InsertCommand<'_> {
    /// `INSERT INTO table (columns) VALUES (...), ...`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidOperation`] if a row does not match the column
    /// list.
    pub fn statement(&self, adapter: &(impl SqlAdapter + ?Sized)) -> Result<InsertStatement> {
        let mut statement = sea_query::Query::insert();
        statement
            .into_table(Ident::bare(self.table))
            .columns(self.columns.iter().map(|column| adapter.column(column)));
        for row in &self.rows {
            statement
                .values(row.iter().cloned().map(SimpleExpr::Value))
                .map_err(|e| Error::InvalidOperation(format!("insert into {}: {e}", self.table)))?;
        }
        Ok(statement)
    }

    /// A [`Command`] against this insert's table.
    pub fn command(&self, adapter: &(impl SqlAdapter + ?Sized)) -> Command<'_> {
        Command {
            table: self.table,
            dialect: adapter.name(),
            timeout: self.timeout,
        }
    }
}

/// A paged fetch handed to [`SqlAdapter::page`].
#[derive(Debug, Clone)]
pub struct PageQuery<'a> {
    /// Source table.
    pub table: &'a str,
    /// Predicates combined with `AND`.
    pub filters: &'a [SimpleExpr],
    /// Unquoted ordering column.
    pub order_column: &'a str,
    /// Sort direction.
    pub descending: bool,
    /// Rows to skip and take.
    pub window: Window,
}

impl PageQuery<'_> {
    /// The filtered, ordered SELECT without any paging.
    pub fn select(&self, adapter: &(impl SqlAdapter + ?Sized)) -> SelectStatement {
        let mut statement = sea_query::Query::select();
        statement.column(Asterisk).from(Ident::bare(self.table));
        self.filter(&mut statement);
        statement.order_by(adapter.column(self.order_column), self.order());
        statement
    }

    fn filter(&self, statement: &mut SelectStatement) {
        for filter in self.filters {
            statement.and_where(filter.clone());
        }
    }

    const fn order(&self) -> Order {
        if self.descending { Order::Desc } else { Order::Asc }
    }
}

/// Runs rendered queries against a table, logging each statement.
#[derive(Debug, Clone, Copy)]
pub struct Command<'a> {
    /// Table named in the log line.
    pub table: &'a str,
    /// Adapter name named in the log line.
    pub dialect: &'static str,
    /// Timeout passed with the statement.
    pub timeout: Option<Duration>,
}

impl Command<'_> {
    /// Run `query` and return its rows.
    ///
    /// # Errors
    ///
    /// Returns the connection's error if it rejects the statement.
    pub fn query(&self, conn: &dyn Connection, query: Query) -> Result<Vec<Row>> {
        tracing::debug!(
            table = self.table,
            dialect = self.dialect,
            sql = %query.sql,
            param_count = query.params.len(),
            "query generated SQL"
        );
        Ok(conn.query(&self.statement(query))?)
    }

    /// Run `query` and return the affected row count.
    ///
    /// # Errors
    ///
    /// Returns the connection's error if it rejects the statement.
    pub fn execute(&self, conn: &dyn Connection, query: Query) -> Result<u64> {
        tracing::debug!(
            table = self.table,
            dialect = self.dialect,
            sql = %query.sql,
            param_count = query.params.len(),
            "exec generated SQL"
        );
        Ok(conn.exec(&self.statement(query))?)
    }

    fn statement(&self, query: Query) -> Statement {
        Statement::new(query.sql, query.params).with_timeout(self.timeout)
    }
}

/// Backend specific SQL generation.
pub trait SqlAdapter: Debug + Send + Sync {
    /// Adapter name, used in logs and cache keys.
    fn name(&self) -> &'static str;

    /// Backend rendering statements in this dialect.
    fn query_builder(&self) -> QueryBuilder;

    /// A column name as this dialect writes it.
    fn column(&self, name: &str) -> Ident {
        Ident::new(name)
    }

    /// Quote a column name.
    fn convert_column_name(&self, column: &str) -> String {
        let mut quoted = String::new();
        self.column(column).prepare(&mut quoted, self.query_builder().quote);
        quoted
    }

    /// How LIKE metacharacters are escaped.
    fn like_escape(&self) -> LikeEscape;

    /// Character named in an `ESCAPE` clause after `LIKE`, for dialects
    /// without a default escape character.
    fn like_escape_char(&self) -> Option<char> {
        None
    }

    /// Insert the command's first row and return the generated identity, or
    /// the affected row count when the entity has no auto-generated key.
    ///
    /// # Errors
    ///
    /// Returns the connection's error if a statement fails.
    fn insert(&self, conn: &dyn Connection, command: &InsertCommand) -> Result<i64>;

    /// Statement selecting one page of rows.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Argument`] if a filter value cannot be bound.
    fn page(&self, page: &PageQuery) -> Result<Query> {
        Query::build(&page.select(self), &self.query_builder().with_window(page.window))
    }

    /// Escape LIKE metacharacters in a literal.
    fn escape_like(&self, value: &str) -> String {
        let mut escaped = String::with_capacity(value.len() + 2);
        for ch in value.chars() {
            match (self.like_escape(), ch) {
                (LikeEscape::Backslash, '\\' | '%' | '_') => {
                    escaped.push('\\');
                    escaped.push(ch);
                }
                (LikeEscape::Bracket, '[' | '%' | '_') => {
                    escaped.push('[');
                    escaped.push(ch);
                    escaped.push(']');
                }
                _ => escaped.push(ch),
            }
        }
        escaped
    }

    /// `column = value`.
    fn column_equals_value(&self, column: &str, value: Value) -> SimpleExpr {
        Expr::col(self.column(column)).eq(value)
    }
}

impl dyn SqlAdapter {
    /// Fetch one page of rows.
    ///
    /// # Errors
    ///
    /// Returns the connection's error if the query fails.
    pub fn fetch_page(
        &self, conn: &dyn Connection, page: &PageQuery, timeout: Option<Duration>,
    ) -> Result<Vec<Row>> {
        let query = self.page(page)?;
        Command {
            table: page.table,
            dialect: self.name(),
            timeout,
        }
        .query(conn, query)
    }
}

/// Dialect key for a connection: the last path segment of its type name,
/// lowercased.
#[must_use]
pub fn dialect_key(conn: &dyn Connection) -> String {
    let name = conn.type_name();
    let name = name.split('<').next().unwrap_or(name);
    name.rsplit("::").next().unwrap_or(name).to_lowercase()
}

/// Adapters registered by default, keyed by dialect key.
#[must_use]
pub fn default_adapters() -> Vec<(&'static str, Arc<dyn SqlAdapter>)> {
    fn adapter(adapter: impl SqlAdapter + 'static) -> Arc<dyn SqlAdapter> {
        Arc::new(adapter)
    }

    vec![
        ("sqlconnection", adapter(SqlServerAdapter)),
        ("sqlceconnection", adapter(SqlCeServerAdapter)),
        ("npgsqlconnection", adapter(PostgresAdapter)),
        ("postgresconnection", adapter(PostgresAdapter)),
        ("sqliteconnection", adapter(SqliteAdapter)),
        ("mysqlconnection", adapter(MySqlAdapter)),
        ("fbconnection", adapter(FbAdapter)),
    ]
}

fn affected_rows(count: u64) -> i64 {
    i64::try_from(count).unwrap_or(i64::MAX)
}

fn first_identity(rows: &[Row], column: &str) -> Result<i64> {
    rows.first().and_then(|row| row.get(column)).map_or(Ok(0), identity)
}

// Insert then read back a last-identity function in a second statement.
fn insert_then_select(
    adapter: &dyn SqlAdapter, conn: &dyn Connection, command: &InsertCommand, identity: Query,
) -> Result<i64> {
    let insert = Query::build(&command.statement(adapter)?, &adapter.query_builder())?;
    let run = command.command(adapter);
    let affected = run.execute(conn, insert)?;
    if command.keys.is_empty() {
        return Ok(affected_rows(affected));
    }
    let rows = run.query(conn, identity)?;
    first_identity(&rows, "id")
}

const BRACKETS: (u8, u8) = (b'[', b']');

/// SQL Server. Also the fallback for unknown dialect keys.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqlServerAdapter;

impl SqlAdapter for SqlServerAdapter {
    fn name(&self) -> &'static str {
        "sqlserver"
    }

    fn query_builder(&self) -> QueryBuilder {
        QueryBuilder::new(Quote::from(BRACKETS), "@P", true, Paging::RowNumber)
    }

    fn like_escape(&self) -> LikeEscape {
        LikeEscape::Bracket
    }

    fn insert(&self, conn: &dyn Connection, command: &InsertCommand) -> Result<i64> {
        let mut query = Query::build(&command.statement(self)?, &self.query_builder())?;
        let run = command.command(self);
        if command.keys.is_empty() {
            return Ok(affected_rows(run.execute(conn, query)?));
        }
        query.sql.push_str(";select SCOPE_IDENTITY() id");
        let rows = run.query(conn, query)?;
        first_identity(&rows, "id")
    }

    // Rows are numbered in a subquery and the window is taken on the number.
    fn page(&self, page: &PageQuery) -> Result<Query> {
        let row = || Ident::new("__row");
        let mut order = WindowStatement::new();
        order.order_by(self.column(page.order_column), page.order());

        let mut numbered = sea_query::Query::select();
        numbered
            .expr_window_as(Func::cust(Alias::new("ROW_NUMBER")), order, row())
            .column((Ident::bare(page.table), Asterisk))
            .from(Ident::bare(page.table));
        page.filter(&mut numbered);

        let mut statement = sea_query::Query::select();
        statement
            .column(Asterisk)
            .from_subquery(numbered, Ident::bare("__paged"))
            .and_where(Expr::col(row()).gt(row_count(page.window.offset)))
            .and_where(Expr::col(row()).lte(row_count(page.window.end())))
            .order_by(row(), Order::Asc);
        Query::build(&statement, &self.query_builder())
    }
}

/// SQL Server Compact Edition.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqlCeServerAdapter;

impl SqlAdapter for SqlCeServerAdapter {
    fn name(&self) -> &'static str {
        "sqlce"
    }

    fn query_builder(&self) -> QueryBuilder {
        QueryBuilder::new(Quote::from(BRACKETS), "@P", true, Paging::OffsetFetch)
    }

    fn like_escape(&self) -> LikeEscape {
        LikeEscape::Bracket
    }

    fn insert(&self, conn: &dyn Connection, command: &InsertCommand) -> Result<i64> {
        insert_then_select(self, conn, command, Query::raw("select @@IDENTITY id"))
    }
}

/// `MySQL`.
#[derive(Debug, Clone, Copy, Default)]
pub struct MySqlAdapter;

impl SqlAdapter for MySqlAdapter {
    fn name(&self) -> &'static str {
        "mysql"
    }

    fn query_builder(&self) -> QueryBuilder {
        QueryBuilder::new(Quote::new(b'`'), "?", false, Paging::LimitOffset)
    }

    fn like_escape(&self) -> LikeEscape {
        LikeEscape::Backslash
    }

    fn insert(&self, conn: &dyn Connection, command: &InsertCommand) -> Result<i64> {
        insert_then_select(self, conn, command, Query::raw("Select LAST_INSERT_ID() id"))
    }
}

/// `PostgreSQL`.
#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresAdapter;

impl SqlAdapter for PostgresAdapter {
    fn name(&self) -> &'static str {
        "postgres"
    }

    fn query_builder(&self) -> QueryBuilder {
        QueryBuilder::default()
    }

    fn like_escape(&self) -> LikeEscape {
        LikeEscape::Backslash
    }

    fn like_escape_char(&self) -> Option<char> {
        Some('\\')
    }

    fn insert(&self, conn: &dyn Connection, command: &InsertCommand) -> Result<i64> {
        let mut statement = command.statement(self)?;
        let run = command.command(self);
        if command.keys.is_empty() {
            statement.returning_all();
            let rows = run.query(conn, Query::build(&statement, &self.query_builder())?)?;
            return Ok(i64::try_from(rows.len()).unwrap_or(i64::MAX));
        }

        for key in command.keys {
            statement.returning_col(self.column(key.column));
        }
        let rows = run.query(conn, Query::build(&statement, &self.query_builder())?)?;
        first_identity(&rows, command.keys[0].column)
    }
}

/// `SQLite`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteAdapter;

impl SqlAdapter for SqliteAdapter {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn query_builder(&self) -> QueryBuilder {
        QueryBuilder::new(Quote::new(b'"'), "?", false, Paging::LimitOffset)
    }

    fn like_escape(&self) -> LikeEscape {
        LikeEscape::Backslash
    }

    fn like_escape_char(&self) -> Option<char> {
        Some('\\')
    }

    // Two statements: drivers prepare one statement at a time.
    fn insert(&self, conn: &dyn Connection, command: &InsertCommand) -> Result<i64> {
        insert_then_select(self, conn, command, Query::raw("SELECT last_insert_rowid() id"))
    }
}

/// Firebird.
#[derive(Debug, Clone, Copy, Default)]
pub struct FbAdapter;

impl SqlAdapter for FbAdapter {
    fn name(&self) -> &'static str {
        "firebird"
    }

    fn query_builder(&self) -> QueryBuilder {
        QueryBuilder::new(Quote::new(b'"'), "?", false, Paging::RowsTo)
    }

    fn column(&self, name: &str) -> Ident {
        Ident::bare(name)
    }

    fn like_escape(&self) -> LikeEscape {
        LikeEscape::Backslash
    }

    fn like_escape_char(&self) -> Option<char> {
        Some('\\')
    }

    fn insert(&self, conn: &dyn Connection, command: &InsertCommand) -> Result<i64> {
        let key = command.keys.first().map_or("", |key| key.column);
        let identity =
            Query::raw(format!("SELECT FIRST 1 {key} ID FROM {} ORDER BY {key} DESC", command.table));
        insert_then_select(self, conn, command, identity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DataType;

    fn page<'a>(filters: &'a [SimpleExpr]) -> PageQuery<'a> {
        PageQuery {
            table: "Users",
            filters,
            order_column: "id",
            descending: true,
            window: Window::page(3, 10),
        }
    }

    fn int(value: i64) -> DataType {
        DataType::Int64(Some(value))
    }

    #[test]
    fn quoting() {
        assert_eq!(SqlServerAdapter.convert_column_name("name"), "[name]");
        assert_eq!(SqlCeServerAdapter.convert_column_name("name"), "[name]");
        assert_eq!(MySqlAdapter.convert_column_name("name"), "`name`");
        assert_eq!(PostgresAdapter.convert_column_name("name"), "\"name\"");
        assert_eq!(SqliteAdapter.convert_column_name("name"), "\"name\"");
        assert_eq!(FbAdapter.convert_column_name("name"), "name");
    }

    #[test]
    fn column_equals_value() {
        let statement = sea_query::Query::delete()
            .from_table(Ident::bare("users"))
            .and_where(MySqlAdapter.column_equals_value("user_name", "a".into()))
            .to_owned();
        let query = Query::build(&statement, &MySqlAdapter.query_builder()).unwrap();
        assert_eq!(query.sql, "DELETE FROM users WHERE `user_name` = ?");
        assert_eq!(query.params, vec![DataType::Str(Some("a".to_string()))]);
    }

    #[test]
    fn like_escaping() {
        assert_eq!(PostgresAdapter.escape_like(r"100%_a\b"), r"100\%\_a\\b");
        assert_eq!(SqlServerAdapter.escape_like("100%_[x]"), "100[%][_][[]x]");
        assert_eq!(MySqlAdapter.like_escape_char(), None);
        assert_eq!(SqliteAdapter.like_escape_char(), Some('\\'));
    }

    #[test]
    fn limit_offset_paging() {
        let filters = [SqliteAdapter.column_equals_value("name", "a".into())];
        let query = SqliteAdapter.page(&page(&filters)).unwrap();
        assert_eq!(
            query.sql,
            r#"SELECT * FROM Users WHERE "name" = ? ORDER BY "id" DESC LIMIT ? OFFSET ?"#
        );
        assert_eq!(&query.params[1..], [int(10), int(20)]);
    }

    #[test]
    fn row_number_paging() {
        let query = SqlServerAdapter.page(&page(&[])).unwrap();
        let sql = query.sql.split_whitespace().collect::<Vec<_>>().join(" ");
        assert!(
            sql.starts_with("SELECT * FROM (SELECT ROW_NUMBER() OVER ( ORDER BY [id] DESC ) AS [__row], Users.* FROM Users)"),
            "{sql}"
        );
        assert!(
            sql.ends_with("WHERE [__row] > @P1 AND [__row] <= @P2 ORDER BY [__row] ASC"),
            "{sql}"
        );
        assert_eq!(query.params, [int(20), int(30)]);
    }

    #[test]
    fn offset_fetch_paging() {
        let query = SqlCeServerAdapter.page(&page(&[])).unwrap();
        assert!(query.sql.ends_with("ORDER BY [id] DESC OFFSET @P1 ROWS FETCH NEXT @P2 ROWS ONLY"));
        assert_eq!(query.params, [int(20), int(10)]);
    }

    #[test]
    fn firebird_rows_paging() {
        let query = FbAdapter.page(&page(&[])).unwrap();
        assert!(query.sql.ends_with("ORDER BY id DESC ROWS ? TO ?"), "{}", query.sql);
        assert_eq!(query.params, [int(21), int(30)]);
    }

    #[test]
    fn insert_statement_covers_every_row() {
        let command = InsertCommand {
            table: "users",
            columns: vec!["name", "email"],
            rows: vec![vec!["a".into(), Value::String(None)], vec!["b".into(), "b@x".into()]],
            keys: &[],
            timeout: None,
        };
        let query = Query::build(&command.statement(&PostgresAdapter).unwrap(), &PostgresAdapter.query_builder())
            .unwrap();
        assert_eq!(query.sql, r#"INSERT INTO users ("name", "email") VALUES ($1, $2), ($3, $4)"#);
        assert_eq!(query.params.len(), 4);

        let ragged = InsertCommand {
            rows: vec![vec!["a".into()]],
            ..command
        };
        assert!(matches!(ragged.statement(&PostgresAdapter), Err(Error::InvalidOperation(_))));
    }

    #[derive(Debug)]
    struct NpgsqlConnection;

    impl Connection for NpgsqlConnection {
        fn query(&self, _: &crate::Statement) -> anyhow::Result<Vec<Row>> {
            Ok(Vec::new())
        }

        fn exec(&self, _: &crate::Statement) -> anyhow::Result<u64> {
            Ok(0)
        }
    }

    #[test]
    fn key_from_type_name() {
        assert_eq!(dialect_key(&NpgsqlConnection), "npgsqlconnection");
    }
}
