//! Micro-ORM data-access layer for SQL databases.
//!
//! Maps plain structs onto tables, generates parameterized SQL for the active
//! database dialect and materializes result rows back into typed entities.
//!
//! # Quick Start
//!
//! ## Define an Entity
//!
//! ```ignore
//! use tabula_orm::Entity;
//!
//! #[derive(Debug, Clone, Default, Entity)]
//! #[entity(table = "users", default_sort = "id")]
//! pub struct User {
//!     #[entity(key)]
//!     pub id: i64,
//!     #[entity(column = "user_name")]
//!     pub name: String,
//!     pub email: Option<String>,
//!     #[entity(computed)]
//!     pub created_at: String,
//! }
//! ```
//!
//! ## CRUD Operations
//!
//! ```ignore
//! use tabula_orm::{SqlMapper, Tracked};
//!
//! let mapper = SqlMapper::global();
//!
//! let id = mapper.insert(&conn, &User { name: "a".into(), ..User::default() })?;
//! let user: Option<User> = mapper.get(&conn, id)?;
//!
//! // Only changed columns are written; a clean entity is not written at all.
//! let mut user = Tracked::new(user.unwrap());
//! user.set("email", |u| u.email = Some("a@x.com".into()))?;
//! mapper.update_tracked(&conn, &mut user)?;
//!
//! mapper.delete(&conn, user.get())?;
//! mapper.delete_all::<User>(&conn)?;
//! ```
//!
//! ## Queries
//!
//! ```ignore
//! use tabula_orm::expr::col;
//!
//! let page = mapper
//!     .select::<User>(&conn)
//!     .where_if(search.is_some(), col("name").contains(search.unwrap_or_default()))
//!     .where_if(true, col("id").is_in([1, 2, 3]))
//!     .order_by_desc("id")
//!     .fetch_page(1, 20)?;
//!
//! let first = mapper.select::<User>(&conn).fetch_cursor(None, 50)?;
//! let next = mapper.select::<User>(&conn).fetch_cursor(first.next_cursor.as_deref(), 50)?;
//! ```
//!
//! ## Dialects
//!
//! The dialect is chosen from the connection's type name (`SqliteConnection`
//! selects `SQLite`, `NpgsqlConnection` Postgres, and so on); unknown names use
//! the SQL Server dialect. Both the choice and the table naming can be
//! overridden when building a mapper:
//!
//! ```ignore
//! let mapper = SqlMapper::builder()
//!     .dialect_resolver(|_| "npgsqlconnection".to_string())
//!     .table_name_mapper(|info| info.name.to_lowercase())
//!     .command_timeout(Duration::from_secs(30))
//!     .build();
//! ```
//!
//! ## Custom Types
//!
//! ```ignore
//! impl FetchValue for UserId {
//!     fn fetch(row: &Row, col: &str) -> anyhow::Result<Self> {
//!         let id: String = FetchValue::fetch(row, col)?;
//!         Ok(UserId(id))
//!     }
//! }
//! ```

extern crate self as tabula_orm;

mod compile;
mod delete;
pub mod dialect;
mod entity;
mod error;
pub mod expr;
mod insert;
mod mapper;
mod metadata;
mod paging;
mod query;
mod select;
mod tracked;
mod update;

pub use compile::Compiler;
pub use entity::{
    AsEntities, Entities, Entity, FetchValue, Property, datatype_to_value, fetch_column,
    value_to_datatype, values_to_datatypes,
};
pub use error::{Error, Result};
pub use mapper::{DialectResolver, SqlMapper, SqlMapperBuilder};
pub use metadata::{EntityDescriptor, EntityInfo, TableNameMapper};
pub use paging::{CursorPage, PagedList, decode_cursor, encode_cursor};
pub use query::{Ident, OpenGuard, Paging, Query, QueryBuilder, Window, row_count};
pub use select::SelectBuilder;
pub use tabula_orm_macro::Entity;
// Re-export the connection boundary for use in custom value conversions and drivers.
pub use tabula_sql::{Connection, DataType, Field, Row, Statement};
pub use tracked::{Dirty, Tracked};

// Re-exports for `Entity` derive use only.
#[doc(hidden)]
pub mod __private {
    pub use sea_query::Value;
}
