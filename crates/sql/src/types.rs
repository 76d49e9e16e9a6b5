use std::time::Duration;

use serde::{Deserialize, Serialize};

/// A single SQL value as exchanged with a driver.
///
/// Every variant carries an `Option`; `None` is SQL `NULL`. Date and time values
/// travel as their textual representation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DataType {
    /// Boolean value.
    Boolean(Option<bool>),
    /// Signed 32-bit integer.
    Int32(Option<i32>),
    /// Signed 64-bit integer.
    Int64(Option<i64>),
    /// Unsigned 32-bit integer.
    Uint32(Option<u32>),
    /// Unsigned 64-bit integer.
    Uint64(Option<u64>),
    /// Single precision float.
    Float(Option<f32>),
    /// Double precision float.
    Double(Option<f64>),
    /// Text.
    Str(Option<String>),
    /// Raw bytes.
    Binary(Option<Vec<u8>>),
    /// Date formatted as `%Y-%m-%d`.
    Date(Option<String>),
    /// Time formatted as `%H:%M:%S%.f`.
    Time(Option<String>),
    /// Timestamp formatted as RFC 3339 or `%Y-%m-%d %H:%M:%S%.f`.
    Timestamp(Option<String>),
}

impl DataType {
    /// Returns `true` when the value is SQL `NULL`.
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(
            self,
            Self::Boolean(None)
                | Self::Int32(None)
                | Self::Int64(None)
                | Self::Uint32(None)
                | Self::Uint64(None)
                | Self::Float(None)
                | Self::Double(None)
                | Self::Str(None)
                | Self::Binary(None)
                | Self::Date(None)
                | Self::Time(None)
                | Self::Timestamp(None)
        )
    }

    /// Name of the variant, used in diagnostics.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Boolean(_) => "boolean",
            Self::Int32(_) => "int32",
            Self::Int64(_) => "int64",
            Self::Uint32(_) => "uint32",
            Self::Uint64(_) => "uint64",
            Self::Float(_) => "float",
            Self::Double(_) => "double",
            Self::Str(_) => "str",
            Self::Binary(_) => "binary",
            Self::Date(_) => "date",
            Self::Time(_) => "time",
            Self::Timestamp(_) => "timestamp",
        }
    }
}

/// A named column value within a [`Row`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    /// Column name as reported by the driver.
    pub name: String,

    /// Column value.
    pub value: DataType,
}

/// A raw result row: an ordered column-name to value mapping.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Row {
    /// Driver-assigned row index.
    pub index: String,

    /// Column values in result-set order.
    pub fields: Vec<Field>,
}

impl Row {
    /// Looks up a column value by name. Exact matches win over case-insensitive
    /// ones.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&DataType> {
        self.fields
            .iter()
            .find(|field| field.name == name)
            .or_else(|| self.fields.iter().find(|field| field.name.eq_ignore_ascii_case(name)))
            .map(|field| &field.value)
    }

    /// Value of the first column, if any.
    #[must_use]
    pub fn first(&self) -> Option<&DataType> {
        self.fields.first().map(|field| &field.value)
    }
}

/// A statement ready for execution: SQL text with positional parameters.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct Statement {
    /// SQL query string.
    pub query: String,

    /// Query parameters, in placeholder order.
    pub params: Vec<DataType>,

    /// Optional command timeout passed through to the driver.
    pub timeout: Option<Duration>,
}

impl Statement {
    /// Creates a statement without a timeout.
    #[must_use]
    pub fn new(query: impl Into<String>, params: Vec<DataType>) -> Self {
        Self {
            query: query.into(),
            params,
            timeout: None,
        }
    }

    /// Sets the command timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }
}
