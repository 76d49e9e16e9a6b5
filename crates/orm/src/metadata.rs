//! Per-type entity descriptors.
//!
//! A descriptor is derived once per entity type from the static property table
//! produced by `#[derive(Entity)]` and then shared. Descriptors are cached by
//! [`SqlMapper`](crate::SqlMapper) for its whole lifetime and are never
//! invalidated: entity shapes cannot change while the process runs.

use std::sync::Arc;

use crate::entity::{Entity, Property};
use crate::error::{Error, Result};

/// Maps an entity to its table name, replacing the default pluralization.
pub type TableNameMapper = Arc<dyn Fn(&EntityInfo) -> String + Send + Sync>;

/// Static facts about an entity type, handed to a [`TableNameMapper`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntityInfo {
    /// Unqualified type name.
    pub name: &'static str,
    /// Fully qualified Rust type name.
    pub type_name: &'static str,
    /// Whether the type is interface-shaped.
    pub interface: bool,
}

impl EntityInfo {
    /// Facts for entity `T`.
    #[must_use]
    pub fn of<T: Entity>() -> Self {
        Self {
            name: T::NAME,
            type_name: std::any::type_name::<T>(),
            interface: T::INTERFACE,
        }
    }
}

/// Resolved mapping of an entity type onto a table.
#[derive(Debug, Clone)]
pub struct EntityDescriptor {
    /// Entity type facts.
    pub info: EntityInfo,
    /// Resolved table name.
    pub table: String,
    /// Writable properties in declaration order.
    pub properties: Vec<Property>,
    /// Auto-generated key properties.
    pub keys: Vec<Property>,
    /// Caller-assigned key properties.
    pub explicit_keys: Vec<Property>,
    /// Properties computed by the database.
    pub computed: Vec<Property>,
    /// Properties excluded from updates.
    pub ignore_update: Vec<Property>,
    /// Property used for ordering when none is given.
    pub default_sort: Option<Property>,
}

impl EntityDescriptor {
    /// Derive the descriptor for `T`.
    ///
    /// Table names resolve as: explicit `table` marker, then `mapper`, then the
    /// pluralized type name.
    #[must_use]
    pub fn build<T: Entity>(mapper: Option<&TableNameMapper>) -> Self {
        let info = EntityInfo::of::<T>();
        let properties: Vec<Property> = T::properties().iter().copied().filter(|p| p.write).collect();

        let mut keys: Vec<Property> = properties.iter().copied().filter(|p| p.key).collect();
        if keys.is_empty()
            && let Some(id) =
                properties.iter().find(|p| p.name.eq_ignore_ascii_case("id") && !p.explicit_key)
        {
            keys.push(*id);
        }

        let explicit_keys = properties.iter().copied().filter(|p| p.explicit_key).collect();
        let computed = properties.iter().copied().filter(|p| p.computed).collect();
        let ignore_update = properties.iter().copied().filter(|p| p.ignore_update).collect();
        let default_sort = T::DEFAULT_SORT
            .and_then(|sort| T::properties().iter().find(|p| p.name == sort).copied());

        let table = T::TABLE.map_or_else(
            || mapper.map_or_else(|| pluralize(&info), |mapper| mapper(&info)),
            ToString::to_string,
        );

        Self {
            info,
            table,
            properties,
            keys,
            explicit_keys,
            computed,
            ignore_update,
            default_sort,
        }
    }

    /// Looks up a writable property by name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownProperty`] when the entity has no such property.
    pub fn property(&self, name: &str) -> Result<&Property> {
        self.properties.iter().find(|p| p.name == name).ok_or_else(|| Error::UnknownProperty {
            entity: self.info.name,
            property: name.to_string(),
        })
    }

    /// Key properties, auto-generated then explicit.
    pub fn all_keys(&self) -> impl Iterator<Item = &Property> {
        self.keys.iter().chain(&self.explicit_keys)
    }

    /// The single key required by `get`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Schema`] unless exactly one key is declared.
    pub fn single_key(&self, operation: &'static str) -> Result<&Property> {
        let mut keys = self.all_keys();
        match (keys.next(), keys.next()) {
            (Some(key), None) => Ok(key),
            _ => Err(self.schema_error(operation, "exactly one key property")),
        }
    }

    /// Every key, as required by `update` and `delete`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Schema`] when no key is declared.
    pub fn require_keys(&self, operation: &'static str) -> Result<Vec<&Property>> {
        let keys: Vec<&Property> = self.all_keys().collect();
        if keys.is_empty() {
            return Err(self.schema_error(operation, "at least one key property"));
        }
        Ok(keys)
    }

    /// Columns written by `insert`: writable, not auto-generated, not computed.
    pub fn insertable(&self) -> impl Iterator<Item = &Property> {
        self.properties.iter().filter(|p| !self.is_key(p) && !p.computed)
    }

    /// Columns written by `update`: not a key of any kind, not computed and not
    /// excluded from updates.
    pub fn updatable(&self) -> impl Iterator<Item = &Property> {
        self.properties
            .iter()
            .filter(|p| !self.is_key(p) && !p.explicit_key && !p.computed && !p.ignore_update)
    }

    fn is_key(&self, property: &Property) -> bool {
        self.keys.iter().any(|key| key.name == property.name)
    }

    fn schema_error(&self, operation: &'static str, expected: &'static str) -> Error {
        Error::Schema {
            operation,
            entity: self.info.name,
            expected,
            keys: self.keys.len(),
            explicit_keys: self.explicit_keys.len(),
        }
    }
}

// Default table name: type name + "s", dropping the `I` of interface-shaped types.
fn pluralize(info: &EntityInfo) -> String {
    let name = if info.interface {
        info.name.strip_prefix('I').unwrap_or(info.name)
    } else {
        info.name
    };
    format!("{name}s")
}
