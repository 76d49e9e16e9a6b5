//! Default `SQLite` connection.
//!
//! This is a lightweight implementation for development and test use.

#![allow(clippy::significant_drop_tightening)]

use std::sync::Arc;

use anyhow::{Context, Result, anyhow, bail};
use fromenv::FromEnv;
use parking_lot::Mutex;
use rusqlite::types::{Value, ValueRef};
use rusqlite::{Connection as RawConnection, params_from_iter};
use tracing::instrument;

use crate::connection::Connection;
use crate::types::{DataType, Field, Row, Statement};

/// Options used to connect to the `SQLite` database.
///
/// This struct is used to load connection options from environment variables.
#[derive(Debug, Clone, FromEnv)]
pub struct ConnectOptions {
    /// Database path or URI.
    #[env(from = "SQL_DATABASE", default = "file::memory:?cache=shared")]
    pub database: String,
}

impl ConnectOptions {
    /// Load options from the environment.
    ///
    /// # Errors
    ///
    /// Returns an error if an environment variable cannot be parsed.
    pub fn load() -> Result<Self> {
        Self::from_env().finalize().context("issue loading connection options")
    }
}

/// A [`Connection`] backed by `rusqlite`.
///
/// Clones share the same underlying database handle. Closing drops the handle;
/// opening re-establishes it from the configured database path.
#[derive(Debug, Clone)]
pub struct SqliteConnection {
    database: String,
    // Mutex is necessary since rusqlite::Connection isn't `Sync`
    conn: Arc<Mutex<Option<RawConnection>>>,
}

impl SqliteConnection {
    /// Connect using options loaded from the environment.
    ///
    /// # Errors
    ///
    /// Returns an error if the options cannot be loaded or the database cannot be
    /// opened.
    pub fn connect() -> Result<Self> {
        Self::connect_with(ConnectOptions::load()?)
    }

    /// Connect with the specified options.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened.
    #[instrument]
    pub fn connect_with(options: ConnectOptions) -> Result<Self> {
        tracing::debug!("initializing SQLite connection to: {}", options.database);
        let raw = RawConnection::open(&options.database).context("failed to open SQLite database")?;

        Ok(Self {
            database: options.database,
            conn: Arc::new(Mutex::new(Some(raw))),
        })
    }

    /// Connect to a private in-memory database.
    ///
    /// # Errors
    ///
    /// Returns an error if `SQLite` cannot allocate the database.
    pub fn in_memory() -> Result<Self> {
        Self::connect_with(ConnectOptions {
            database: ":memory:".to_string(),
        })
    }

    /// Run a batch of semicolon-separated statements without parameters, e.g.
    /// schema setup.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection is closed or any statement fails.
    pub fn execute_batch(&self, sql: &str) -> Result<()> {
        let guard = self.conn.lock();
        let conn = guard.as_ref().ok_or_else(|| anyhow!("connection is closed"))?;
        conn.execute_batch(sql).context("failed to execute batch")
    }
}

impl Connection for SqliteConnection {
    fn query(&self, statement: &Statement) -> Result<Vec<Row>> {
        tracing::debug!("executing query: {}", statement.query);

        let guard = self.conn.lock();
        let conn = guard.as_ref().ok_or_else(|| anyhow!("connection is closed"))?;
        if let Some(timeout) = statement.timeout {
            conn.busy_timeout(timeout).context("failed to set busy timeout")?;
        }

        let mut stmt = conn.prepare(&statement.query).context("failed to prepare statement")?;
        let values =
            statement.params.iter().map(datatype_to_rusqlite_value).collect::<Result<Vec<_>>>()?;

        let column_names: Vec<String> =
            stmt.column_names().iter().map(ToString::to_string).collect();

        let mut rows = stmt.query(params_from_iter(values.iter())).context("failed to execute query")?;

        let mut result_rows = Vec::new();
        let mut index = 0;
        while let Some(row) = rows.next().context("failed to fetch row")? {
            let mut fields = Vec::with_capacity(column_names.len());

            for (i, name) in column_names.iter().enumerate() {
                let value = row.get_ref(i).context("failed to get column value")?;
                fields.push(Field {
                    name: name.clone(),
                    value: rusqlite_value_to_datatype(value)?,
                });
            }

            result_rows.push(Row {
                index: index.to_string(),
                fields,
            });
            index += 1;
        }

        Ok(result_rows)
    }

    fn exec(&self, statement: &Statement) -> Result<u64> {
        tracing::debug!("executing statement: {}", statement.query);

        let guard = self.conn.lock();
        let conn = guard.as_ref().ok_or_else(|| anyhow!("connection is closed"))?;
        if let Some(timeout) = statement.timeout {
            conn.busy_timeout(timeout).context("failed to set busy timeout")?;
        }

        let mut stmt = conn.prepare(&statement.query).context("failed to prepare statement")?;
        let values =
            statement.params.iter().map(datatype_to_rusqlite_value).collect::<Result<Vec<_>>>()?;

        let rows_affected =
            stmt.execute(params_from_iter(values.iter())).context("failed to execute statement")?;

        Ok(u64::try_from(rows_affected)?)
    }

    fn is_open(&self) -> bool {
        self.conn.lock().is_some()
    }

    fn open(&self) -> Result<()> {
        let mut guard = self.conn.lock();
        if guard.is_none() {
            tracing::debug!("reopening SQLite connection to: {}", self.database);
            *guard = Some(
                RawConnection::open(&self.database).context("failed to open SQLite database")?,
            );
        }
        Ok(())
    }

    fn close(&self) -> Result<()> {
        let Some(conn) = self.conn.lock().take() else {
            return Ok(());
        };
        conn.close().map_err(|(_, e)| e).context("failed to close SQLite database")
    }
}

fn datatype_to_rusqlite_value(dt: &DataType) -> Result<Value> {
    let value = match dt {
        DataType::Boolean(Some(b)) => Value::Integer(i64::from(*b)),
        DataType::Int32(Some(i)) => Value::Integer(i64::from(*i)),
        DataType::Int64(Some(i)) => Value::Integer(*i),
        DataType::Uint32(Some(u)) => Value::Integer(i64::from(*u)),
        DataType::Uint64(Some(u)) => Value::Integer(
            i64::try_from(*u).map_err(|_e| anyhow!("{u} is out of range for a SQLite integer"))?,
        ),
        DataType::Float(Some(f)) => Value::Real(f64::from(*f)),
        DataType::Double(Some(f)) => Value::Real(*f),
        DataType::Str(Some(s))
        | DataType::Date(Some(s))
        | DataType::Time(Some(s))
        | DataType::Timestamp(Some(s)) => Value::Text(s.clone()),
        DataType::Binary(Some(b)) => Value::Blob(b.clone()),
        // All None variants map to NULL
        _ => Value::Null,
    };
    Ok(value)
}

fn rusqlite_value_to_datatype(value: ValueRef) -> Result<DataType> {
    match value {
        ValueRef::Null => Ok(DataType::Str(None)),
        ValueRef::Integer(i) => Ok(DataType::Int64(Some(i))),
        ValueRef::Real(f) => Ok(DataType::Double(Some(f))),
        ValueRef::Text(t) => {
            let Ok(s) = std::str::from_utf8(t) else {
                bail!("invalid UTF-8 in text value");
            };
            Ok(DataType::Str(Some(s.to_string())))
        }
        ValueRef::Blob(b) => Ok(DataType::Binary(Some(b.to_vec()))),
    }
}
