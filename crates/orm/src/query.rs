//! Rendering sea-query statements into dialect SQL.

use std::fmt::{self, Write as _};

use sea_query::backend::{
    EscapeBuilder, OperLeftAssocDecider, PrecedenceDecider, QueryBuilder as _, QuotedBuilder,
    TableRefBuilder,
};
use sea_query::prepare::SqlWriter;
use sea_query::{
    BinOper, Iden, Oper, QueryStatementBuilder, Quote, SelectStatement, SimpleExpr,
    SubQueryStatement, Value, Values,
};

use crate::entity::values_to_datatypes;
use crate::error::Result;
use crate::{Connection, DataType};

/// Generated SQL with its parameters in placeholder order.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    /// SQL text using the dialect's positional placeholders.
    pub sql: String,
    /// One value per placeholder.
    pub params: Vec<DataType>,
}

impl Query {
    /// Render `statement` for the dialect `builder` describes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Argument`](crate::Error::Argument) if a bound value has
    /// no [`DataType`] counterpart.
    pub fn build(statement: &impl QueryStatementBuilder, builder: &QueryBuilder) -> Result<Self> {
        let (sql, values) = statement.build_any(builder);
        let params = values_to_datatypes(values)?;
        Ok(Self { sql, params })
    }

    /// SQL text with no parameters.
    #[must_use]
    pub fn raw(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
        }
    }

    /// Pair cached SQL with freshly collected values.
    ///
    /// # Errors
    ///
    /// See [`Query::build`].
    pub fn with_values(sql: impl Into<String>, values: Vec<Value>) -> Result<Self> {
        Ok(Self {
            sql: sql.into(),
            params: values_to_datatypes(Values(values))?,
        })
    }
}

/// How a dialect restricts a SELECT to a window of rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Paging {
    /// `LIMIT size OFFSET offset`.
    LimitOffset,
    /// `OFFSET offset ROWS FETCH NEXT size ROWS ONLY`.
    OffsetFetch,
    /// `ROWS first TO last`, one-based and inclusive.
    RowsTo,
    /// No clause; the adapter numbers rows in a subquery instead.
    RowNumber,
}

/// Rows to skip and rows to take.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    /// Rows skipped before the window.
    pub offset: u64,
    /// Rows in the window.
    pub size: u64,
}

impl Window {
    /// Window holding one-based `page` of `size` rows.
    #[must_use]
    pub const fn page(page: u64, size: u64) -> Self {
        Self {
            offset: page.saturating_sub(1).saturating_mul(size),
            size,
        }
    }

    /// Offset one past the last row of the window.
    #[must_use]
    pub const fn end(&self) -> u64 {
        self.offset.saturating_add(self.size)
    }
}

/// Bind a row count. Counts past `i64::MAX` are clamped, which every backend
/// treats as "no more rows".
#[must_use]
pub fn row_count(value: u64) -> Value {
    Value::BigInt(Some(i64::try_from(value).unwrap_or(i64::MAX)))
}

/// sea-query backend parameterized per dialect.
#[derive(Debug, Clone, Copy)]
pub struct QueryBuilder {
    /// Identifier quote characters.
    pub quote: Quote,
    /// Placeholder prefix, `?`, `$` or `@P`.
    pub placeholder: &'static str,
    /// Whether placeholders carry a one-based index.
    pub numbered: bool,
    /// Paging clause shape.
    pub paging: Paging,
    // SelectStatement keeps its limit and offset private to sea-query's own backends.
    window: Option<Window>,
}

impl Default for QueryBuilder {
    fn default() -> Self {
        Self::new(Quote::new(b'"'), "$", true, Paging::LimitOffset)
    }
}

impl QueryBuilder {
    /// A builder without a paging window.
    #[must_use]
    pub const fn new(quote: Quote, placeholder: &'static str, numbered: bool, paging: Paging) -> Self {
        Self {
            quote,
            placeholder,
            numbered,
            paging,
            window: None,
        }
    }

    /// Render SELECTs restricted to `window`.
    #[must_use]
    pub const fn with_window(mut self, window: Window) -> Self {
        self.window = Some(window);
        self
    }

    fn push_row_count(&self, sql: &mut dyn SqlWriter, keyword: &str, value: u64) {
        push(sql, keyword);
        self.prepare_value(&row_count(value), sql);
    }
}

// Writes into sea-query's String-backed writer, which cannot fail.
fn push(sql: &mut dyn SqlWriter, text: &str) {
    let _ = sql.write_str(text);
}

impl QuotedBuilder for QueryBuilder {
    fn quote(&self) -> Quote {
        self.quote
    }
}

impl EscapeBuilder for QueryBuilder {
    // Standard SQL literals: only the quote itself is doubled, so `ESCAPE '\'`
    // stays a single backslash.
    fn escape_string(&self, string: &str) -> String {
        string.replace('\'', "''")
    }

    fn unescape_string(&self, string: &str) -> String {
        string.replace("''", "'")
    }
}

impl TableRefBuilder for QueryBuilder {}

impl OperLeftAssocDecider for QueryBuilder {
    fn well_known_left_associative(&self, op: &BinOper) -> bool {
        // Copied from sea-query 0.32.7 backend/query_builder.rs `common_well_known_left_associative`
        matches!(
            op,
            BinOper::And | BinOper::Or | BinOper::Add | BinOper::Sub | BinOper::Mul | BinOper::Mod
        )
    }
}

impl PrecedenceDecider for QueryBuilder {
    // Predicates under AND/OR render bare; everything else is parenthesized.
    fn inner_expr_well_known_greater_precedence(
        &self, inner: &SimpleExpr, outer_oper: &Oper,
    ) -> bool {
        match inner {
            SimpleExpr::Column(_)
            | SimpleExpr::Tuple(_)
            | SimpleExpr::Constant(_)
            | SimpleExpr::FunctionCall(_)
            | SimpleExpr::Value(_)
            | SimpleExpr::Keyword(_)
            | SimpleExpr::Case(_)
            | SimpleExpr::SubQuery(_, _) => true,
            SimpleExpr::Binary(_, inner_oper, _) => {
                is_predicate(*inner_oper)
                    && matches!(outer_oper, Oper::BinOper(BinOper::And | BinOper::Or))
            }
            _ => false,
        }
    }
}

const fn is_predicate(op: BinOper) -> bool {
    matches!(
        op,
        BinOper::Equal
            | BinOper::NotEqual
            | BinOper::SmallerThan
            | BinOper::GreaterThan
            | BinOper::SmallerThanOrEqual
            | BinOper::GreaterThanOrEqual
            | BinOper::In
            | BinOper::NotIn
            | BinOper::Like
            | BinOper::NotLike
            | BinOper::Is
            | BinOper::IsNot
    )
}

impl sea_query::backend::QueryBuilder for QueryBuilder {
    fn prepare_query_statement(&self, query: &SubQueryStatement, sql: &mut dyn SqlWriter) {
        match query {
            SubQueryStatement::SelectStatement(s) => self.prepare_select_statement(s, sql),
            SubQueryStatement::InsertStatement(s) => self.prepare_insert_statement(s, sql),
            SubQueryStatement::UpdateStatement(s) => self.prepare_update_statement(s, sql),
            SubQueryStatement::DeleteStatement(s) => self.prepare_delete_statement(s, sql),
            SubQueryStatement::WithStatement(s) => self.prepare_with_query(s, sql),
        }
    }

    fn prepare_select_limit_offset(&self, _select: &SelectStatement, sql: &mut dyn SqlWriter) {
        let Some(window) = self.window else {
            return;
        };
        match self.paging {
            Paging::LimitOffset => {
                self.push_row_count(sql, " LIMIT ", window.size);
                self.push_row_count(sql, " OFFSET ", window.offset);
            }
            Paging::OffsetFetch => {
                self.push_row_count(sql, " OFFSET ", window.offset);
                self.push_row_count(sql, " ROWS FETCH NEXT ", window.size);
                push(sql, " ROWS ONLY");
            }
            Paging::RowsTo => {
                self.push_row_count(sql, " ROWS ", window.offset.saturating_add(1));
                self.push_row_count(sql, " TO ", window.end());
            }
            Paging::RowNumber => {}
        }
    }

    fn prepare_value(&self, value: &Value, sql: &mut dyn SqlWriter) {
        sql.push_param(value.clone(), self);
    }

    fn placeholder(&self) -> (&str, bool) {
        (self.placeholder, self.numbered)
    }
}

/// A table or column name.
///
/// Quoted names render with the builder's quote characters; bare names are
/// written as given.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ident {
    name: String,
    bare: bool,
}

impl Ident {
    /// A name rendered with the dialect's quotes.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            bare: false,
        }
    }

    /// A name rendered without quotes.
    #[must_use]
    pub fn bare(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            bare: true,
        }
    }
}

impl Iden for Ident {
    fn prepare(&self, s: &mut dyn fmt::Write, q: Quote) {
        if self.bare {
            self.unquoted(s);
        } else {
            let _ = write!(s, "{}{}{}", q.left(), self.quoted(q), q.right());
        }
    }

    fn unquoted(&self, s: &mut dyn fmt::Write) {
        let _ = s.write_str(&self.name);
    }
}

/// Opens a closed connection for the duration of one operation and closes it
/// again on drop.
pub struct OpenGuard<'a> {
    conn: &'a dyn Connection,
    opened: bool,
}

impl<'a> OpenGuard<'a> {
    /// Open `conn` if it is closed.
    ///
    /// # Errors
    ///
    /// Returns the connection's error if it cannot be opened.
    pub fn acquire(conn: &'a dyn Connection) -> Result<Self> {
        let opened = if conn.is_open() {
            false
        } else {
            conn.open()?;
            true
        };
        Ok(Self { conn, opened })
    }
}

impl Drop for OpenGuard<'_> {
    fn drop(&mut self) {
        if self.opened
            && let Err(e) = self.conn.close()
        {
            tracing::warn!(error = %e, "failed to close connection opened for insert");
        }
    }
}
