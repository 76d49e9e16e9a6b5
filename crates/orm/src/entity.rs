use anyhow::{anyhow, bail};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use sea_query::{Value, Values};

use crate::error::{Error, Result};
use crate::{DataType, Row};

/// Trait for database entities with metadata for query building.
///
/// Typically implemented via `#[derive(Entity)]` rather than manually. The
/// markers recorded here are read once per type by the metadata cache.
pub trait Entity: Sized + Send + Sync + 'static {
    /// Unqualified type name.
    const NAME: &'static str;

    /// Explicit table name, if one was declared.
    const TABLE: Option<&'static str> = None;

    /// Property used for ordering when a paged query does not set one.
    const DEFAULT_SORT: Option<&'static str> = None;

    /// Whether the type is interface-shaped: a leading `I` is dropped before the
    /// default table name is derived.
    const INTERFACE: bool = false;

    /// Every property of the entity, in declaration order.
    fn properties() -> &'static [Property];

    /// Construct an entity instance from a database row.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Mapping`] if any column is missing or cannot be converted
    /// to the property's type.
    fn from_row(row: &Row) -> Result<Self>;

    /// Values of the writable properties keyed by property name.
    fn values(&self) -> Vec<(&'static str, Value)>;
}

/// Static description of one entity property.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(clippy::struct_excessive_bools)]
pub struct Property {
    /// Rust field name.
    pub name: &'static str,
    /// Column the property maps to.
    pub column: &'static str,
    /// Declared Rust type, as written.
    pub type_name: &'static str,
    /// Auto-generated key.
    pub key: bool,
    /// Key assigned by the caller.
    pub explicit_key: bool,
    /// Computed by the database; never inserted or updated.
    pub computed: bool,
    /// Inserted but never updated.
    pub ignore_update: bool,
    /// Participates in statements and materialization.
    pub write: bool,
}

impl Property {
    /// Creates a plain writable property whose column matches its name.
    #[must_use]
    pub const fn new(name: &'static str, type_name: &'static str) -> Self {
        Self {
            name,
            column: name,
            type_name,
            key: false,
            explicit_key: false,
            computed: false,
            ignore_update: false,
            write: true,
        }
    }
}

/// One entity or a homogeneous collection of them, as accepted by `insert` and
/// `delete`.
#[derive(Debug)]
pub enum Entities<'a, T> {
    /// A single entity.
    One(&'a T),
    /// A collection of entities.
    Many(&'a [T]),
}

/// Conversion into [`Entities`], implemented for entities and slices of them.
pub trait AsEntities {
    /// Entity type contained.
    type Entity: Entity;

    /// Borrow as [`Entities`].
    fn as_entities(&self) -> Entities<'_, Self::Entity>;
}

impl<T: Entity> AsEntities for T {
    type Entity = T;

    fn as_entities(&self) -> Entities<'_, T> {
        Entities::One(self)
    }
}

impl<T: Entity> AsEntities for [T] {
    type Entity = T;

    fn as_entities(&self) -> Entities<'_, T> {
        Entities::Many(self)
    }
}

/// Trait for types that can be extracted from database rows.
///
/// This trait is implemented for all standard Rust types that can be
/// fetched from a database row (`i32`, `String`, `DateTime`, etc.).
/// Conversions accept the representations different drivers use for the same
/// logical type: integers of any width (range checked), booleans stored as
/// `0`/`1`, and dates or timestamps stored as text.
pub trait FetchValue: Sized {
    /// Fetch a value from a row by column name.
    ///
    /// # Errors
    ///
    /// Returns an error if the column is missing or the value cannot be converted to the target type.
    fn fetch(row: &Row, col: &str) -> anyhow::Result<Self>;
}

/// Fetch a column into a property, wrapping conversion failures into
/// [`Error::Mapping`]. Used by the `Entity` derive.
///
/// # Errors
///
/// Returns [`Error::Mapping`] when the column is missing or not convertible.
pub fn fetch_column<T: FetchValue>(row: &Row, column: &str, property: &'static str) -> Result<T> {
    T::fetch(row, column).map_err(|source| {
        let raw = row.get(column);
        Error::Mapping {
            property,
            declared_type: std::any::type_name::<T>(),
            value: raw.map_or_else(|| "<missing>".to_string(), |value| format!("{value:?}")),
            value_type: raw.map_or("none", DataType::type_name),
            source: source.into(),
        }
    })
}

// Outbound conversion

/// Convert the values collected while rendering a statement into driver
/// parameters, in placeholder order.
///
/// # Errors
///
/// Returns [`Error::Argument`] for a value no driver can bind.
pub fn values_to_datatypes(values: Values) -> Result<Vec<DataType>> {
    values.into_iter().map(value_to_datatype).collect()
}

/// Convert one bound value into a driver parameter.
///
/// # Errors
///
/// Returns [`Error::Argument`] for a value no driver can bind.
pub fn value_to_datatype(value: Value) -> Result<DataType> {
    let data_type = match value {
        Value::Bool(v) => DataType::Boolean(v),
        Value::TinyInt(v) => DataType::Int32(v.map(i32::from)),
        Value::SmallInt(v) => DataType::Int32(v.map(i32::from)),
        Value::Int(v) => DataType::Int32(v),
        Value::BigInt(v) => DataType::Int64(v),
        Value::TinyUnsigned(v) => DataType::Uint32(v.map(u32::from)),
        Value::SmallUnsigned(v) => DataType::Uint32(v.map(u32::from)),
        Value::Unsigned(v) => DataType::Uint32(v),
        Value::BigUnsigned(v) => DataType::Uint64(v),
        Value::Float(v) => DataType::Float(v),
        Value::Double(v) => DataType::Double(v),
        Value::String(v) => DataType::Str(v.map(|value| *value)),
        Value::ChronoDate(v) => DataType::Date(v.map(|value| {
            let date = *value;
            date.to_string() // "%Y-%m-%d"
        })),
        Value::ChronoTime(v) => DataType::Time(v.map(|value| {
            let time = *value;
            time.to_string() // "%H:%M:%S%.f"
        })),
        Value::ChronoDateTime(v) => DataType::Timestamp(v.map(|value| {
            let dt = *value;
            dt.to_string() // "%Y-%m-%d %H:%M:%S%.f"
        })),
        Value::ChronoDateTimeUtc(v) => DataType::Timestamp(v.map(|value| {
            let dt: DateTime<Utc> = *value;
            dt.to_rfc3339() // "%Y-%m-%dT%H:%M:%S%.f%:z"
        })),
        Value::Char(v) => DataType::Str(v.map(|ch| ch.to_string())),
        Value::Bytes(v) => DataType::Binary(v.map(|bytes| *bytes)),
        Value::Json(v) => DataType::Str(v.map(|json| json.to_string())),
        other => {
            return Err(Error::Argument(format!(
                "unsupported parameter value {other:?}; convert it before building the query"
            )));
        }
    };
    Ok(data_type)
}

/// Convert a value read from a row back into a bindable value. Temporal
/// values keep their text form so they compare the way the driver stored them.
#[must_use]
pub fn datatype_to_value(value: DataType) -> Value {
    match value {
        DataType::Boolean(v) => Value::Bool(v),
        DataType::Int32(v) => Value::Int(v),
        DataType::Int64(v) => Value::BigInt(v),
        DataType::Uint32(v) => Value::Unsigned(v),
        DataType::Uint64(v) => Value::BigUnsigned(v),
        DataType::Float(v) => Value::Float(v),
        DataType::Double(v) => Value::Double(v),
        DataType::Binary(v) => Value::Bytes(v.map(Box::new)),
        DataType::Str(v) | DataType::Date(v) | DataType::Time(v) | DataType::Timestamp(v) => {
            Value::String(v.map(Box::new))
        }
    }
}

// Inbound conversion
impl FetchValue for bool {
    fn fetch(row: &Row, col: &str) -> anyhow::Result<Self> {
        as_bool(row_field(row, col)?)
    }
}

impl FetchValue for i32 {
    fn fetch(row: &Row, col: &str) -> anyhow::Result<Self> {
        narrow(as_i64(row_field(row, col)?)?)
    }
}

impl FetchValue for i64 {
    fn fetch(row: &Row, col: &str) -> anyhow::Result<Self> {
        as_i64(row_field(row, col)?)
    }
}

impl FetchValue for u32 {
    fn fetch(row: &Row, col: &str) -> anyhow::Result<Self> {
        narrow(as_i64(row_field(row, col)?)?)
    }
}

impl FetchValue for u64 {
    fn fetch(row: &Row, col: &str) -> anyhow::Result<Self> {
        match row_field(row, col)? {
            DataType::Uint64(Some(v)) => Ok(*v),
            other => narrow(as_i64(other)?),
        }
    }
}

impl FetchValue for f32 {
    #[allow(clippy::cast_possible_truncation)]
    fn fetch(row: &Row, col: &str) -> anyhow::Result<Self> {
        match row_field(row, col)? {
            DataType::Float(Some(v)) => Ok(*v),
            other => as_f64(other).map(|v| v as Self),
        }
    }
}

impl FetchValue for f64 {
    fn fetch(row: &Row, col: &str) -> anyhow::Result<Self> {
        as_f64(row_field(row, col)?)
    }
}

impl FetchValue for String {
    fn fetch(row: &Row, col: &str) -> anyhow::Result<Self> {
        as_string(row_field(row, col)?)
    }
}

impl FetchValue for Vec<u8> {
    fn fetch(row: &Row, col: &str) -> anyhow::Result<Self> {
        as_binary(row_field(row, col)?)
    }
}

impl FetchValue for DateTime<Utc> {
    fn fetch(row: &Row, col: &str) -> anyhow::Result<Self> {
        as_timestamp(row_field(row, col)?)
    }
}

impl FetchValue for NaiveDateTime {
    fn fetch(row: &Row, col: &str) -> anyhow::Result<Self> {
        as_timestamp(row_field(row, col)?).map(|dt| dt.naive_utc())
    }
}

impl FetchValue for NaiveDate {
    fn fetch(row: &Row, col: &str) -> anyhow::Result<Self> {
        as_date(row_field(row, col)?)
    }
}

impl FetchValue for NaiveTime {
    fn fetch(row: &Row, col: &str) -> anyhow::Result<Self> {
        as_time(row_field(row, col)?)
    }
}

impl FetchValue for serde_json::Value {
    fn fetch(row: &Row, col: &str) -> anyhow::Result<Self> {
        as_json(row_field(row, col)?)
    }
}

impl<T: FetchValue> FetchValue for Option<T> {
    fn fetch(row: &Row, col: &str) -> anyhow::Result<Self> {
        if row_field(row, col)?.is_null() {
            Ok(None)
        } else {
            T::fetch(row, col).map(Some)
        }
    }
}

fn row_field<'a>(row: &'a Row, name: &str) -> anyhow::Result<&'a DataType> {
    row.get(name).ok_or_else(|| anyhow!("missing column '{name}'"))
}

/// Interprets a generated identity or aggregate value as `i64`. `NULL` reads as
/// zero.
#[allow(clippy::cast_possible_truncation)]
pub fn identity(value: &DataType) -> Result<i64> {
    if value.is_null() {
        return Ok(0);
    }
    match value {
        DataType::Double(Some(v)) => Ok(v.round() as i64),
        DataType::Str(Some(raw)) => raw
            .trim()
            .parse::<i64>()
            .map_err(|e| Error::InvalidOperation(format!("identity value '{raw}' is not an integer: {e}"))),
        other => as_i64(other).map_err(Error::Database),
    }
}

fn narrow<T: TryFrom<i64>>(value: i64) -> anyhow::Result<T> {
    T::try_from(value)
        .map_err(|_e| anyhow!("{value} is out of range for {}", std::any::type_name::<T>()))
}

fn as_bool(value: &DataType) -> anyhow::Result<bool> {
    match value {
        DataType::Boolean(Some(v)) => Ok(*v),
        DataType::Int32(Some(_))
        | DataType::Int64(Some(_))
        | DataType::Uint32(Some(_))
        | DataType::Uint64(Some(_)) => match as_i64(value)? {
            0 => Ok(false),
            1 => Ok(true),
            other => bail!("{other} is not a boolean"),
        },
        _ => bail!("expected boolean data type"),
    }
}

fn as_i64(value: &DataType) -> anyhow::Result<i64> {
    match value {
        DataType::Int32(Some(v)) => Ok(i64::from(*v)),
        DataType::Int64(Some(v)) => Ok(*v),
        DataType::Uint32(Some(v)) => Ok(i64::from(*v)),
        DataType::Uint64(Some(v)) => narrow_u64(*v),
        DataType::Boolean(Some(v)) => Ok(i64::from(*v)),
        _ => bail!("expected integer data type"),
    }
}

fn narrow_u64(value: u64) -> anyhow::Result<i64> {
    i64::try_from(value).map_err(|_e| anyhow!("{value} is out of range for i64"))
}

#[allow(clippy::cast_precision_loss)]
fn as_f64(value: &DataType) -> anyhow::Result<f64> {
    match value {
        DataType::Double(Some(v)) => Ok(*v),
        DataType::Float(Some(v)) => Ok(f64::from(*v)),
        DataType::Int32(Some(v)) => Ok(f64::from(*v)),
        DataType::Uint32(Some(v)) => Ok(f64::from(*v)),
        DataType::Int64(Some(v)) => Ok(*v as f64),
        DataType::Uint64(Some(v)) => Ok(*v as f64),
        _ => bail!("expected floating point data type"),
    }
}

fn as_string(value: &DataType) -> anyhow::Result<String> {
    match value {
        DataType::Str(Some(raw))
        | DataType::Date(Some(raw))
        | DataType::Time(Some(raw))
        | DataType::Timestamp(Some(raw)) => Ok(raw.clone()),
        _ => bail!("expected string data type"),
    }
}

fn as_binary(value: &DataType) -> anyhow::Result<Vec<u8>> {
    match value {
        DataType::Binary(Some(bytes)) => Ok(bytes.clone()),
        _ => bail!("expected binary data type"),
    }
}

fn as_timestamp(value: &DataType) -> anyhow::Result<DateTime<Utc>> {
    match value {
        DataType::Timestamp(Some(raw)) | DataType::Str(Some(raw)) => {
            if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
                return Ok(parsed.with_timezone(&Utc));
            }

            if let Ok(parsed) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f") {
                return Ok(DateTime::<Utc>::from_naive_utc_and_offset(parsed, Utc));
            }

            bail!(
                "unsupported timestamp: {raw}; expected RFC3339 or \"%Y-%m-%d %H:%M:%S%.f\" format"
            )
        }
        _ => bail!("expected timestamp data type"),
    }
}

fn as_date(value: &DataType) -> anyhow::Result<NaiveDate> {
    match value {
        DataType::Date(Some(raw)) | DataType::Str(Some(raw)) => {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .map_err(|_e| anyhow!("unsupported date: {raw}; expected \"%Y-%m-%d\" format"))
        }
        _ => bail!("expected date data type"),
    }
}

fn as_time(value: &DataType) -> anyhow::Result<NaiveTime> {
    match value {
        DataType::Time(Some(raw)) | DataType::Str(Some(raw)) => {
            NaiveTime::parse_from_str(raw, "%H:%M:%S%.f")
                .map_err(|_e| anyhow!("unsupported time: {raw}; expected \"%H:%M:%S%.f\" format"))
        }
        _ => bail!("expected time data type"),
    }
}

fn as_json(value: &DataType) -> anyhow::Result<serde_json::Value> {
    match value {
        DataType::Str(Some(raw)) => Ok(serde_json::from_str(raw)?),
        DataType::Binary(Some(bytes)) => Ok(serde_json::from_slice(bytes)?),
        _ => bail!("expected json compatible data type"),
    }
}
