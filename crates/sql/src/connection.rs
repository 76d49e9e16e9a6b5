use std::fmt::Debug;

use anyhow::Result;

use crate::types::{Row, Statement};

/// SQL drivers implement the [`Connection`] trait to allow the data-access layer
/// to execute statements against a backend (`SQLite`, Postgres, SQL Server, etc).
///
/// Connections are owned by the caller. The only lifecycle operations the
/// data-access layer performs are the scoped `open`/`close` pair around an insert
/// on a closed connection.
pub trait Connection: Debug + Send + Sync {
    /// Execute a query and return the resulting rows.
    ///
    /// # Errors
    ///
    /// Returns the driver's error when the statement fails.
    fn query(&self, statement: &Statement) -> Result<Vec<Row>>;

    /// Execute a statement that does not return rows (e.g., an `INSERT`,
    /// `UPDATE`, or `DELETE`) and return the number of affected rows.
    ///
    /// # Errors
    ///
    /// Returns the driver's error when the statement fails.
    fn exec(&self, statement: &Statement) -> Result<u64>;

    /// Whether the connection is currently open.
    fn is_open(&self) -> bool {
        true
    }

    /// Open the connection.
    ///
    /// # Errors
    ///
    /// Returns the driver's error when the connection cannot be opened.
    fn open(&self) -> Result<()> {
        Ok(())
    }

    /// Close the connection.
    ///
    /// # Errors
    ///
    /// Returns the driver's error when the connection cannot be closed cleanly.
    fn close(&self) -> Result<()> {
        Ok(())
    }

    /// Name of the implementing type. The last path segment, lowercased, is used
    /// to select a SQL dialect.
    fn type_name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}
