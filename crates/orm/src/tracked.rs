//! Change tracking.

use std::collections::BTreeSet;
use std::ops::Deref;

use crate::entity::Entity;
use crate::error::{Error, Result};

/// Which properties of a [`Tracked`] entity changed since it was loaded.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Dirty {
    /// Nothing changed.
    #[default]
    Clean,
    /// The named properties changed.
    Fields(BTreeSet<&'static str>),
    /// The entity was borrowed mutably; any property may have changed.
    All,
}

/// An entity wrapper recording which properties were modified, so that
/// [`SqlMapper::update_tracked`](crate::SqlMapper::update_tracked) can skip
/// unchanged entities and write only changed columns.
///
/// ```ignore
/// let mut user = Tracked::new(mapper.get::<User>(&conn, 1)?.unwrap());
/// user.set("name", |u| u.name = "b".to_string())?;
/// assert!(mapper.update_tracked(&conn, &mut user)?);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Tracked<T> {
    entity: T,
    dirty: Dirty,
}

impl<T: Entity> Tracked<T> {
    /// Start tracking a clean entity.
    #[must_use]
    pub const fn new(entity: T) -> Self {
        Self {
            entity,
            dirty: Dirty::Clean,
        }
    }

    /// The tracked entity.
    #[must_use]
    pub const fn get(&self) -> &T {
        &self.entity
    }

    /// Mutable access. Marks every property dirty.
    pub fn get_mut(&mut self) -> &mut T {
        self.dirty = Dirty::All;
        &mut self.entity
    }

    /// Modify one property through `update` and mark it dirty.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownProperty`] if `T` has no property named
    /// `property`; `update` is not called.
    pub fn set(&mut self, property: &'static str, update: impl FnOnce(&mut T)) -> Result<()> {
        if !T::properties().iter().any(|p| p.name == property) {
            return Err(Error::UnknownProperty {
                entity: T::NAME,
                property: property.to_string(),
            });
        }

        update(&mut self.entity);
        if let Dirty::Fields(fields) = &mut self.dirty {
            fields.insert(property);
        } else if self.dirty == Dirty::Clean {
            self.dirty = Dirty::Fields(BTreeSet::from([property]));
        }
        Ok(())
    }

    /// What changed so far.
    #[must_use]
    pub const fn dirty(&self) -> &Dirty {
        &self.dirty
    }

    /// Whether anything changed.
    #[must_use]
    pub const fn is_dirty(&self) -> bool {
        !matches!(self.dirty, Dirty::Clean)
    }

    /// Forget recorded changes, as after a successful update.
    pub fn mark_clean(&mut self) {
        self.dirty = Dirty::Clean;
    }

    /// Stop tracking and return the entity.
    #[must_use]
    pub fn into_inner(self) -> T {
        self.entity
    }
}

impl<T: Entity> From<T> for Tracked<T> {
    fn from(entity: T) -> Self {
        Self::new(entity)
    }
}

impl<T> Deref for Tracked<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.entity
    }
}
