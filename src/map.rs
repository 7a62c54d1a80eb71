use crate::error::{MapError, Result};
use crate::iter::{Entry, Iter};
use crate::path::{display_key, normalize, Location};
use crate::store::{subtree, subtree_keys, Entries, Store};
use crate::value::{Supported, Value, ValueCell};
use std::collections::btree_map;
use std::fmt;
use tracing::{debug, trace};

/// A hierarchical map from `/`-separated paths to typed values.
///
/// Every key is normalised against the map's [`Location`] (see
/// [`normalize`](crate::normalize)) before it touches the store, so
/// `"tree/x"`, `"/tree//x"` and `"./tree/sub/../x"` all name the same entry.
/// Keys are kept in byte-lexicographic order.
///
/// A `PathMap` is a handle: [`PathMap::submap`] and [`PathMap::assign`] give
/// further handles on the same store, and writes through any of them are
/// visible through all. [`Clone`] instead produces an independent map:
///
/// - cloning a root map copies every entry into a new store;
/// - cloning a submap copies its subtree into a new store, re-rooted at `/`.
///
/// Either way array views in copied entries still point at the same buffers,
/// and borrowed data blocks keep sharing their memory.
///
/// The map is single-threaded. Accessor closures run while the store is
/// borrowed; touching the same store from inside a [`PathMap::with_mut`]
/// closure fails with `MapError::StoreBusy`.
///
/// # Examples
///
/// ```
/// use sovran_pathmap::{MapError, PathMap};
///
/// let map = PathMap::new();
/// map.update("tree/value", 1.5)?;
/// map.update("tree/name", "leaf")?;
///
/// let tree = map.submap("tree");
/// tree.update("count", 3)?;
///
/// assert_eq!(map.get::<i64>("/tree/count")?, 3);
/// assert_eq!(tree.get::<String>("name")?, "leaf");
///
/// let keys: Vec<String> = tree.iter().map(|entry| entry.key().to_string()).collect();
/// assert_eq!(keys, ["/count", "/name", "/value"]);
/// # Ok::<(), MapError>(())
/// ```
pub struct PathMap {
    store: Store,
    location: Location,
}

impl PathMap {
    /// Creates a new, empty root map
    pub fn new() -> Self {
        Self {
            store: Store::new(),
            location: Location::Root,
        }
    }

    /// Creates a root map holding the given entries.
    ///
    /// Later entries replace earlier ones with the same canonical key.
    ///
    /// # Errors
    ///
    /// Cannot fail for a fresh map; the `Result` mirrors [`PathMap::update_many`].
    pub fn from_entries<I, K, V>(entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Value>,
    {
        let map = Self::new();
        map.update_many(entries)?;
        Ok(map)
    }

    /// Where this map is rooted
    pub fn location(&self) -> &Location {
        &self.location
    }

    pub fn is_root(&self) -> bool {
        self.location.is_root()
    }

    /// Whether both handles operate on the same store.
    pub fn shares_store_with(&self, other: &PathMap) -> bool {
        self.store.ptr_eq(&other.store)
    }

    /// Canonical path `key` resolves to, as shown by [`Entry::full_key`].
    pub fn path(&self, key: &str) -> String {
        display_key(&self.canonical(key)).to_string()
    }

    fn canonical(&self, key: &str) -> String {
        normalize(&self.location, key)
    }

    /// Stores a value, replacing whatever was stored under the key.
    ///
    /// # Errors
    ///
    /// Returns `MapError::StoreBusy` if the store is borrowed by an accessor closure.
    pub fn update(&self, key: &str, value: impl Into<Value>) -> Result<()> {
        let canonical = self.canonical(key);
        let mut entries = self.store.borrow_mut()?;
        entries.insert(canonical, ValueCell::new(value));
        Ok(())
    }

    /// Stores several values in order.
    ///
    /// The entries are applied one by one. If a write fails, the entries
    /// before it stay applied.
    ///
    /// # Errors
    ///
    /// Returns `MapError::StoreBusy` if the store is borrowed by an accessor closure.
    pub fn update_many<I, K, V>(&self, entries: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Value>,
    {
        for (key, value) in entries {
            self.update(key.as_ref(), value)?;
        }
        Ok(())
    }

    /// Stores a value only if nothing is stored under the key yet.
    ///
    /// Returns `Ok(true)` if the value was inserted.
    ///
    /// # Errors
    ///
    /// Returns `MapError::StoreBusy` if the store is borrowed by an accessor closure.
    pub fn insert_default(&self, key: &str, value: impl Into<Value>) -> Result<bool> {
        let canonical = self.canonical(key);
        let mut entries = self.store.borrow_mut()?;
        match entries.entry(canonical) {
            btree_map::Entry::Vacant(slot) => {
                slot.insert(ValueCell::new(value));
                Ok(true)
            }
            btree_map::Entry::Occupied(_) => Ok(false),
        }
    }

    /// [`PathMap::insert_default`] for several entries, returning how many were inserted.
    ///
    /// # Errors
    ///
    /// Returns `MapError::StoreBusy` if the store is borrowed by an accessor closure.
    pub fn insert_default_many<I, K, V>(&self, entries: I) -> Result<usize>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Value>,
    {
        let mut inserted = 0;
        for (key, value) in entries {
            if self.insert_default(key.as_ref(), value)? {
                inserted += 1;
            }
        }
        Ok(inserted)
    }

    /// Retrieves a clone of a value.
    ///
    /// # Errors
    ///
    /// - Returns `MapError::KeyNotFound` if nothing is stored under the key
    /// - Returns `MapError::TypeMismatch` if the stored value is not a `T`
    /// - Returns `MapError::StoreBusy` if the store is mutably borrowed
    pub fn get<T: Supported + Clone>(&self, key: &str) -> Result<T> {
        self.with(key, T::clone)
    }

    /// Runs a closure on a reference to the stored value.
    ///
    /// # Examples
    ///
    /// ```
    /// use sovran_pathmap::{ArrayView, Buffer, MapError, PathMap};
    ///
    /// let map = PathMap::new();
    /// let buffer = Buffer::new(vec![1.0, 2.0, 3.0]);
    /// map.update("samples", ArrayView::from_buffer(&buffer))?;
    ///
    /// let len = map.with("samples", |view: &ArrayView<f64>| view.size())?;
    /// assert_eq!(len, 3);
    /// # Ok::<(), MapError>(())
    /// ```
    ///
    /// # Errors
    ///
    /// Same as [`PathMap::get`].
    pub fn with<T: Supported, F, R>(&self, key: &str, f: F) -> Result<R>
    where
        F: FnOnce(&T) -> R,
    {
        let entries = self.store.borrow()?;
        let cell = entries
            .get(&self.canonical(key))
            .ok_or_else(|| MapError::KeyNotFound(key.to_string()))?;
        Ok(f(cell.get::<T>()?))
    }

    /// Runs a closure on a mutable reference to the stored value.
    ///
    /// # Examples
    ///
    /// ```
    /// use sovran_pathmap::{MapError, PathMap};
    ///
    /// let map = PathMap::new();
    /// map.update("counter", 0)?;
    /// map.with_mut("counter", |n: &mut i64| *n += 1)?;
    /// assert_eq!(map.get::<i64>("counter")?, 1);
    /// # Ok::<(), MapError>(())
    /// ```
    ///
    /// # Errors
    ///
    /// - Returns `MapError::KeyNotFound` if nothing is stored under the key
    /// - Returns `MapError::TypeMismatch` if the stored value is not a `T`
    /// - Returns `MapError::StoreBusy` if the store is already borrowed
    pub fn with_mut<T: Supported, F, R>(&self, key: &str, f: F) -> Result<R>
    where
        F: FnOnce(&mut T) -> R,
    {
        let mut entries = self.store.borrow_mut()?;
        let cell = entries
            .get_mut(&self.canonical(key))
            .ok_or_else(|| MapError::KeyNotFound(key.to_string()))?;
        Ok(f(cell.get_mut::<T>()?))
    }

    /// Like [`PathMap::get`], but returns `default` if nothing is stored
    /// under the key. The default is not inserted.
    ///
    /// # Errors
    ///
    /// - Returns `MapError::TypeMismatch` if the stored value is not a `T`
    /// - Returns `MapError::StoreBusy` if the store is mutably borrowed
    pub fn get_or<T: Supported + Clone>(&self, key: &str, default: T) -> Result<T> {
        self.with_or(key, &default, T::clone)
    }

    /// Like [`PathMap::with`], but runs the closure on `default` if nothing
    /// is stored under the key.
    ///
    /// # Errors
    ///
    /// Same as [`PathMap::get_or`].
    pub fn with_or<T: Supported, F, R>(&self, key: &str, default: &T, f: F) -> Result<R>
    where
        F: FnOnce(&T) -> R,
    {
        let entries = self.store.borrow()?;
        match entries.get(&self.canonical(key)) {
            Some(cell) => Ok(f(cell.get::<T>()?)),
            None => Ok(f(default)),
        }
    }

    /// Clone of the stored value, whatever its type.
    ///
    /// # Errors
    ///
    /// - Returns `MapError::KeyNotFound` if nothing is stored under the key
    /// - Returns `MapError::StoreBusy` if the store is mutably borrowed
    pub fn get_raw(&self, key: &str) -> Result<Value> {
        self.with_raw(key, |cell| cell.value().cloned())?
            .ok_or_else(|| MapError::Internal(format!("Entry {} holds no value", self.path(key))))
    }

    /// Runs a closure on the stored cell, whatever its type.
    ///
    /// # Errors
    ///
    /// - Returns `MapError::KeyNotFound` if nothing is stored under the key
    /// - Returns `MapError::StoreBusy` if the store is already borrowed
    pub fn with_raw<F, R>(&self, key: &str, f: F) -> Result<R>
    where
        F: FnOnce(&mut ValueCell) -> R,
    {
        let mut entries = self.store.borrow_mut()?;
        let cell = entries
            .get_mut(&self.canonical(key))
            .ok_or_else(|| MapError::KeyNotFound(key.to_string()))?;
        Ok(f(cell))
    }

    /// Name of the type stored under the key.
    ///
    /// # Errors
    ///
    /// - Returns `MapError::KeyNotFound` if nothing is stored under the key
    /// - Returns `MapError::StoreBusy` if the store is mutably borrowed
    pub fn type_name_of(&self, key: &str) -> Result<&'static str> {
        let entries = self.store.borrow()?;
        entries
            .get(&self.canonical(key))
            .map(ValueCell::type_name)
            .ok_or_else(|| MapError::KeyNotFound(key.to_string()))
    }

    /// Checks if a value is stored under the key
    ///
    /// # Errors
    ///
    /// Returns `MapError::StoreBusy` if the store is mutably borrowed.
    pub fn exists(&self, key: &str) -> Result<bool> {
        let entries = self.store.borrow()?;
        Ok(entries.contains_key(&self.canonical(key)))
    }

    /// Removes the entry under the key. Entries below it are kept.
    ///
    /// Returns the number of removed entries, `0` or `1`.
    ///
    /// # Errors
    ///
    /// Returns `MapError::StoreBusy` if the store is borrowed by an accessor closure.
    pub fn erase(&self, key: &str) -> Result<usize> {
        let canonical = self.canonical(key);
        let mut entries = self.store.borrow_mut()?;
        Ok(usize::from(entries.remove(&canonical).is_some()))
    }

    /// Removes the entry an iterator yielded.
    ///
    /// # Errors
    ///
    /// - Returns `MapError::InvalidValue` if the entry belongs to another store
    /// - Returns `MapError::StoreBusy` if the store is borrowed by an accessor closure
    pub fn erase_entry(&self, entry: &Entry) -> Result<usize> {
        if !self.store.ptr_eq(entry.store()) {
            return Err(MapError::invalid_value(format!(
                "Entry {} does not belong to this map",
                entry.full_key()
            )));
        }
        let mut entries = self.store.borrow_mut()?;
        Ok(usize::from(entries.remove(entry.store_key()).is_some()))
    }

    /// Removes every entry the iterator has not yielded yet.
    ///
    /// # Errors
    ///
    /// Same as [`PathMap::erase_entry`].
    pub fn erase_range(&self, range: Iter) -> Result<usize> {
        if !self.store.ptr_eq(range.store()) {
            return Err(MapError::invalid_value(
                "Range does not belong to this map",
            ));
        }
        let keys: Vec<String> = range.map(|entry| entry.store_key().to_string()).collect();
        let mut entries = self.store.borrow_mut()?;
        Ok(keys
            .iter()
            .filter(|key| entries.remove(key.as_str()).is_some())
            .count())
    }

    /// Removes the entry at `path` and every entry below it.
    ///
    /// "Below" goes by path components: erasing `tree` removes `tree` and
    /// `tree/x`, but keeps `treehouse` and `tree.x`. The same rule decides
    /// what [`PathMap::iter`], [`PathMap::len`] and [`PathMap::clear`] see.
    ///
    /// # Errors
    ///
    /// Returns `MapError::StoreBusy` if the store is borrowed by an accessor closure.
    pub fn erase_recursive(&self, path: &str) -> Result<usize> {
        let scope = self.canonical(path);
        let mut entries = self.store.borrow_mut()?;
        let removed = remove_subtree(&mut entries, &scope);
        debug!(path = display_key(&scope), removed, "erased subtree");
        Ok(removed)
    }

    /// Removes every entry reachable from this map, its own entry included.
    /// On a root map this empties the store.
    ///
    /// # Errors
    ///
    /// Returns `MapError::StoreBusy` if the store is borrowed by an accessor closure.
    pub fn clear(&self) -> Result<usize> {
        let mut entries = self.store.borrow_mut()?;
        let removed = remove_subtree(&mut entries, self.location.key());
        debug!(location = %self.location, removed, "cleared map");
        Ok(removed)
    }

    /// A handle on the subtree at `location`, sharing this map's store.
    ///
    /// Nothing is copied: writes through the submap are visible here and
    /// the other way round.
    pub fn submap(&self, location: &str) -> PathMap {
        let location = self.location.join(location);
        trace!(%location, "created submap");
        PathMap {
            store: self.store.clone(),
            location,
        }
    }

    /// Iterates over every entry reachable from this map, in key order.
    pub fn iter(&self) -> Iter {
        Iter::new(
            self.store.clone(),
            self.location.clone(),
            self.location.key().to_string(),
        )
    }

    /// Iterates over the subtree at `path`, like `self.submap(path).iter()`.
    /// Keys are relative to `path`, whose own entry is `/`.
    pub fn iter_at(&self, path: &str) -> Iter {
        let scope = self.canonical(path);
        Iter::new(self.store.clone(), Location::from_key(scope.clone()), scope)
    }

    /// Number of entries reachable from this map
    ///
    /// # Errors
    ///
    /// Returns `MapError::StoreBusy` if the store is mutably borrowed.
    pub fn len(&self) -> Result<usize> {
        let entries = self.store.borrow()?;
        Ok(subtree(&entries, self.location.key()).count())
    }

    /// Checks if no entry is reachable from this map
    ///
    /// # Errors
    ///
    /// Returns `MapError::StoreBusy` if the store is mutably borrowed.
    pub fn is_empty(&self) -> Result<bool> {
        let entries = self.store.borrow()?;
        let empty = subtree(&entries, self.location.key()).next().is_none();
        Ok(empty)
    }

    /// Keys reachable from this map, relative to its location, in order.
    ///
    /// # Errors
    ///
    /// Returns `MapError::StoreBusy` if the store is mutably borrowed.
    pub fn keys(&self) -> Result<Vec<String>> {
        let entries = self.store.borrow()?;
        Ok(subtree(&entries, self.location.key())
            .map(|(key, _)| self.location.relative(key).to_string())
            .collect())
    }

    /// Copies every entry of `other` into this map below `key`.
    ///
    /// An entry at `/a/b` relative to `other` lands at `key/a/b` relative to
    /// this map; `other`'s own entry lands at `key`. Existing entries are
    /// replaced. Values are copied the way [`Clone`] copies them, so array
    /// views keep pointing at the same buffers.
    ///
    /// # Errors
    ///
    /// Returns `MapError::StoreBusy` if either store is borrowed by an accessor closure.
    pub fn update_from(&self, key: &str, other: &PathMap) -> Result<()> {
        let incoming: Vec<(String, ValueCell)> = {
            let source = other.store.borrow()?;
            subtree(&source, other.location.key())
                .map(|(path, cell)| (other.location.relative(path).to_string(), cell.clone()))
                .collect()
        };

        let mut entries = self.store.borrow_mut()?;
        let count = incoming.len();
        for (relative, cell) in incoming {
            entries.insert(self.canonical(&format!("{key}{relative}")), cell);
        }
        trace!(
            target_path = %self.path(key),
            source = %other.location,
            count,
            "merged map"
        );
        Ok(())
    }

    /// Copies every entry of `other` into this map; shorthand for
    /// `update_from("", other)`.
    ///
    /// # Errors
    ///
    /// Same as [`PathMap::update_from`].
    pub fn merge(&self, other: &PathMap) -> Result<()> {
        self.update_from("", other)
    }

    /// Makes this handle an alias of `other`: same store, same location.
    pub fn assign(&mut self, other: &PathMap) {
        self.store = other.store.clone();
        self.location = other.location.clone();
    }

    /// Independent copy of this map, see [`Clone`].
    ///
    /// # Errors
    ///
    /// Returns `MapError::StoreBusy` if the store is mutably borrowed.
    pub fn try_clone(&self) -> Result<PathMap> {
        let entries = self.store.borrow()?;
        Ok(self.copy_of(&entries))
    }

    fn copy_of(&self, entries: &Entries) -> PathMap {
        let copied: Entries = match &self.location {
            Location::Root => {
                debug!(entries = entries.len(), "deep-copying root map");
                entries.clone()
            }
            Location::At(_) => {
                let flattened: Entries = subtree(entries, self.location.key())
                    .map(|(key, cell)| {
                        let relative = self.location.relative(key);
                        (normalize(&Location::Root, relative), cell.clone())
                    })
                    .collect();
                debug!(
                    location = %self.location,
                    entries = flattened.len(),
                    "flattened submap into a new root map"
                );
                flattened
            }
        };
        PathMap {
            store: Store::from(copied),
            location: Location::Root,
        }
    }
}

fn remove_subtree(entries: &mut Entries, scope: &str) -> usize {
    if scope.is_empty() {
        let removed = entries.len();
        entries.clear();
        return removed;
    }
    let keys = subtree_keys(entries, scope);
    for key in &keys {
        entries.remove(key);
    }
    keys.len()
}

impl Default for PathMap {
    fn default() -> Self {
        Self::new()
    }
}

/// Independent copy; see the type documentation.
///
/// # Panics
///
/// Panics if called from inside a [`PathMap::with_mut`] closure on the same
/// store. Use [`PathMap::try_clone`] there.
impl Clone for PathMap {
    fn clone(&self) -> Self {
        let entries = self.store.read();
        self.copy_of(&entries)
    }
}

impl fmt::Debug for PathMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PathMap")
            .field("location", &self.location)
            .field("store", &self.store)
            .finish()
    }
}

impl<'a> IntoIterator for &'a PathMap {
    type Item = Entry;
    type IntoIter = Iter;

    fn into_iter(self) -> Iter {
        self.iter()
    }
}
