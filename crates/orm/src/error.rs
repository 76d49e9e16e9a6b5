//! Errors

use thiserror::Error;

/// Result type used across the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors raised by the data-access layer.
///
/// Driver failures are passed through untouched as [`Error::Database`].
#[derive(Error, Debug)]
pub enum Error {
    /// The entity declares the wrong number of key properties for the operation.
    #[error(
        "{operation} on {entity} requires {expected}; found {keys} [Key] and {explicit_keys} [ExplicitKey] properties"
    )]
    Schema {
        /// Operation that was attempted.
        operation: &'static str,
        /// Entity type name.
        entity: &'static str,
        /// Human readable key requirement.
        expected: &'static str,
        /// Number of auto-generated key properties.
        keys: usize,
        /// Number of explicitly assigned key properties.
        explicit_keys: usize,
    },

    /// The predicate contains a node the compiler does not translate.
    #[error("unsupported predicate node: {node}")]
    UnsupportedPredicate {
        /// Kind of the offending node.
        node: String,
    },

    /// The operation cannot run in the builder's current state.
    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    /// An argument was empty or otherwise unusable.
    #[error("invalid argument: {0}")]
    Argument(String),

    /// A column value could not be converted into the property's declared type.
    #[error(
        "error parsing column '{property}' ({property} = {value} of type {value_type}, declared as {declared_type})"
    )]
    Mapping {
        /// Property being materialized.
        property: &'static str,
        /// Declared Rust type of the property.
        declared_type: &'static str,
        /// Raw value as rendered by the driver.
        value: String,
        /// Runtime type of the raw value.
        value_type: &'static str,
        /// Underlying conversion failure.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A predicate or ordering referenced a property the entity does not have.
    #[error("{entity} has no property named '{property}'")]
    UnknownProperty {
        /// Entity type name.
        entity: &'static str,
        /// Property name as referenced.
        property: String,
    },

    /// A pagination cursor could not be decoded.
    #[error("invalid cursor: {0}")]
    InvalidCursor(String),

    /// Failure reported by the connection.
    #[error(transparent)]
    Database(#[from] anyhow::Error),
}

impl Error {
    pub(crate) fn unsupported(node: impl Into<String>) -> Self {
        Self::UnsupportedPredicate { node: node.into() }
    }
}
