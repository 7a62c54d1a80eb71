use crate::error::{MapError, Result};
use crate::path::{display_key, Location};
use crate::store::{first_between, last_between, Store};
use crate::value::{Supported, Value, ValueCell};
use std::fmt;

/// Cursor over the entries of a subtree, in key order.
///
/// The cursor remembers the last key it yielded from each end and looks the
/// next one up in the store on every step. Entries inserted or erased while
/// iterating are therefore seen or skipped without invalidating the cursor.
///
/// # Panics
///
/// `next` and `next_back` panic if called from inside a
/// [`PathMap::with_mut`](crate::PathMap::with_mut) closure on the same store.
#[derive(Clone)]
pub struct Iter {
    store: Store,
    location: Location,
    scope: String,
    front: Option<String>,
    back: Option<String>,
}

impl Iter {
    pub(crate) fn new(store: Store, location: Location, scope: String) -> Self {
        Self {
            store,
            location,
            scope,
            front: None,
            back: None,
        }
    }

    pub(crate) fn store(&self) -> &Store {
        &self.store
    }

    fn entry(&self, key: String) -> Entry {
        Entry {
            store: self.store.clone(),
            location: self.location.clone(),
            key,
        }
    }
}

impl Iterator for Iter {
    type Item = Entry;

    fn next(&mut self) -> Option<Entry> {
        let key = {
            let entries = self.store.read();
            first_between(
                &entries,
                &self.scope,
                self.front.as_deref(),
                self.back.as_deref(),
            )?
        };
        self.front = Some(key.clone());
        Some(self.entry(key))
    }
}

impl DoubleEndedIterator for Iter {
    fn next_back(&mut self) -> Option<Entry> {
        let key = {
            let entries = self.store.read();
            last_between(
                &entries,
                &self.scope,
                self.front.as_deref(),
                self.back.as_deref(),
            )?
        };
        self.back = Some(key.clone());
        Some(self.entry(key))
    }
}

impl fmt::Debug for Iter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Iter")
            .field("location", &self.location)
            .field("scope", &display_key(&self.scope))
            .field("front", &self.front)
            .field("back", &self.back)
            .finish()
    }
}

/// Access to one entry yielded by [`Iter`].
///
/// An `Entry` names its entry by key; the value is looked up whenever it is
/// accessed. Accessing an entry that was erased in the meantime fails with
/// `MapError::KeyNotFound`.
#[derive(Clone)]
pub struct Entry {
    store: Store,
    location: Location,
    key: String,
}

impl Entry {
    /// Key relative to the location of the map that created the iterator.
    /// The location's own entry is `/`.
    pub fn key(&self) -> &str {
        self.location.relative(&self.key)
    }

    /// Canonical key from the top of the hierarchy.
    pub fn full_key(&self) -> &str {
        display_key(&self.key)
    }

    pub(crate) fn store_key(&self) -> &str {
        &self.key
    }

    pub(crate) fn store(&self) -> &Store {
        &self.store
    }

    /// Name of the stored type.
    ///
    /// # Errors
    ///
    /// - Returns `MapError::KeyNotFound` if the entry has been erased
    /// - Returns `MapError::StoreBusy` if the store is mutably borrowed
    pub fn type_name(&self) -> Result<&'static str> {
        self.with_value_raw(|cell| cell.type_name())
    }

    /// Clone of the stored value.
    ///
    /// # Errors
    ///
    /// Same as [`Entry::with_value`].
    pub fn value<T: Supported + Clone>(&self) -> Result<T> {
        self.with_value(T::clone)
    }

    /// Runs `f` on the stored value.
    ///
    /// # Errors
    ///
    /// - Returns `MapError::KeyNotFound` if the entry has been erased
    /// - Returns `MapError::TypeMismatch` if the value is not a `T`
    /// - Returns `MapError::StoreBusy` if the store is mutably borrowed
    pub fn with_value<T: Supported, F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&T) -> R,
    {
        let entries = self.store.borrow()?;
        let cell = entries.get(&self.key).ok_or_else(|| self.missing())?;
        Ok(f(cell.get::<T>()?))
    }

    /// Runs `f` on the stored value with write access.
    ///
    /// # Errors
    ///
    /// - Returns `MapError::KeyNotFound` if the entry has been erased
    /// - Returns `MapError::TypeMismatch` if the value is not a `T`
    /// - Returns `MapError::StoreBusy` if the store is already borrowed
    pub fn with_value_mut<T: Supported, F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&mut T) -> R,
    {
        let mut entries = self.store.borrow_mut()?;
        let cell = entries.get_mut(&self.key).ok_or_else(|| self.missing())?;
        Ok(f(cell.get_mut::<T>()?))
    }

    /// Clone of the stored value, whatever its type.
    ///
    /// # Errors
    ///
    /// Same as [`Entry::type_name`].
    pub fn value_raw(&self) -> Result<Value> {
        self.with_value_raw(|cell| cell.value().cloned())?
            .ok_or_else(|| MapError::Internal(format!("Entry {} holds no value", self.full_key())))
    }

    /// Runs `f` on the stored cell.
    ///
    /// # Errors
    ///
    /// Same as [`Entry::type_name`].
    pub fn with_value_raw<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&ValueCell) -> R,
    {
        let entries = self.store.borrow()?;
        let cell = entries.get(&self.key).ok_or_else(|| self.missing())?;
        Ok(f(cell))
    }

    /// Overwrites value and type of the entry.
    ///
    /// # Errors
    ///
    /// Same as [`Entry::with_value_mut`], without the type check.
    pub fn set(&self, value: impl Into<Value>) -> Result<()> {
        let mut entries = self.store.borrow_mut()?;
        let cell = entries.get_mut(&self.key).ok_or_else(|| self.missing())?;
        cell.set(value);
        Ok(())
    }

    fn missing(&self) -> MapError {
        MapError::KeyNotFound(self.key().to_string())
    }
}

/// Entries are equal if they name the same key of the same store.
impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.store.ptr_eq(&other.store) && self.key == other.key
    }
}

impl Eq for Entry {}

impl fmt::Debug for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entry")
            .field("key", &self.key())
            .field("full_key", &self.full_key())
            .finish()
    }
}
