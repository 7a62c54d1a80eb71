use crate::error::{MapError, Result};
use crate::path::SEPARATOR;
use crate::value::ValueCell;
use std::cell::{Ref, RefCell, RefMut};
use std::collections::BTreeMap;
use std::fmt;
use std::ops::Bound;
use std::rc::Rc;

pub(crate) type Entries = BTreeMap<String, ValueCell>;

/// The ordered key space shared by a map and all of its submaps.
#[derive(Clone, Default)]
pub(crate) struct Store {
    entries: Rc<RefCell<Entries>>,
}

impl Store {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn borrow(&self) -> Result<Ref<'_, Entries>> {
        self.entries.try_borrow().map_err(|_| MapError::StoreBusy)
    }

    pub(crate) fn borrow_mut(&self) -> Result<RefMut<'_, Entries>> {
        self.entries.try_borrow_mut().map_err(|_| MapError::StoreBusy)
    }

    /// Shared access for callers that cannot report errors.
    ///
    /// # Panics
    ///
    /// Panics if the store is mutably borrowed.
    pub(crate) fn read(&self) -> Ref<'_, Entries> {
        self.entries.borrow()
    }

    pub(crate) fn ptr_eq(&self, other: &Store) -> bool {
        Rc::ptr_eq(&self.entries, &other.entries)
    }
}

impl From<Entries> for Store {
    fn from(entries: Entries) -> Self {
        Self {
            entries: Rc::new(RefCell::new(entries)),
        }
    }
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.entries.try_borrow() {
            Ok(entries) => f.debug_map().entries(entries.iter()).finish(),
            Err(_) => f.write_str("<busy>"),
        }
    }
}

/// Range covering the strict descendants of `scope`, narrowed to keys that lie
/// strictly between `after` and `before`. `None` when nothing can qualify.
///
/// The entry at `scope` itself is not part of the range. Its descendants are
/// the keys from `scope/` up to, but excluding, `scope0`, since `0` is the
/// character after the separator.
fn descendants(
    scope: &str,
    after: Option<&str>,
    before: Option<&str>,
) -> Option<(Bound<String>, Bound<String>)> {
    let (mut lower, mut upper) = if scope.is_empty() {
        (Bound::Unbounded, Bound::Unbounded)
    } else {
        (
            Bound::Included(format!("{scope}{SEPARATOR}")),
            Bound::Excluded(format!("{scope}0")),
        )
    };

    if let Some(after) = after {
        let tighter = match &lower {
            Bound::Included(lo) | Bound::Excluded(lo) => after >= lo.as_str(),
            Bound::Unbounded => true,
        };
        if tighter {
            lower = Bound::Excluded(after.to_string());
        }
    }
    if let Some(before) = before {
        let tighter = match &upper {
            Bound::Included(hi) | Bound::Excluded(hi) => before <= hi.as_str(),
            Bound::Unbounded => true,
        };
        if tighter {
            upper = Bound::Excluded(before.to_string());
        }
    }

    // BTreeMap::range panics on inverted bounds.
    if let (Bound::Included(lo) | Bound::Excluded(lo), Bound::Included(hi) | Bound::Excluded(hi)) =
        (&lower, &upper)
    {
        if lo >= hi {
            return None;
        }
    }
    Some((lower, upper))
}

/// The subtree entry at `scope` itself, if present and strictly between the bounds.
fn own_entry<'a>(
    entries: &'a Entries,
    scope: &str,
    after: Option<&str>,
    before: Option<&str>,
) -> Option<&'a String> {
    if scope.is_empty() {
        // The root entry sorts first and is covered by the unbounded range.
        return None;
    }
    let in_bounds = after.map_or(true, |a| a < scope) && before.map_or(true, |b| scope < b);
    if !in_bounds {
        return None;
    }
    entries.get_key_value(scope).map(|(key, _)| key)
}

/// Every entry in the subtree rooted at `scope`, in key order.
pub(crate) fn subtree<'a>(
    entries: &'a Entries,
    scope: &str,
) -> impl DoubleEndedIterator<Item = (&'a String, &'a ValueCell)> + 'a {
    let own = own_entry(entries, scope, None, None).and_then(|key| entries.get_key_value(key));
    let rest = descendants(scope, None, None)
        .into_iter()
        .flat_map(move |range| entries.range(range));
    own.into_iter().chain(rest)
}

/// Keys of the subtree rooted at `scope`.
pub(crate) fn subtree_keys(entries: &Entries, scope: &str) -> Vec<String> {
    subtree(entries, scope).map(|(key, _)| key.clone()).collect()
}

/// Smallest subtree key strictly between `after` and `before`.
pub(crate) fn first_between(
    entries: &Entries,
    scope: &str,
    after: Option<&str>,
    before: Option<&str>,
) -> Option<String> {
    // The location's own key sorts before all of its descendants.
    if let Some(key) = own_entry(entries, scope, after, before) {
        return Some(key.clone());
    }
    let range = descendants(scope, after, before)?;
    entries.range(range).next().map(|(key, _)| key.clone())
}

/// Largest subtree key strictly between `after` and `before`.
pub(crate) fn last_between(
    entries: &Entries,
    scope: &str,
    after: Option<&str>,
    before: Option<&str>,
) -> Option<String> {
    let last = descendants(scope, after, before)
        .and_then(|range| entries.range(range).next_back().map(|(key, _)| key.clone()));
    last.or_else(|| own_entry(entries, scope, after, before).cloned())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Entries {
        ["", "/farr", "/tree", "/tree.x", "/tree/i", "/tree/sub", "/treehouse", "/zz"]
            .into_iter()
            .map(|k| (k.to_string(), ValueCell::new(true)))
            .collect()
    }

    #[test]
    fn subtree_of_root_is_everything() {
        let entries = sample();
        assert_eq!(subtree_keys(&entries, "").len(), entries.len());
    }

    #[test]
    fn subtree_stops_at_component_boundaries() {
        let entries = sample();
        assert_eq!(subtree_keys(&entries, "/tree"), vec!["/tree", "/tree/i", "/tree/sub"]);
        assert!(subtree_keys(&entries, "/missing").is_empty());
    }

    #[test]
    fn stepping_forward_and_back() {
        let entries = sample();
        let scope = "/tree";
        assert_eq!(first_between(&entries, scope, None, None).as_deref(), Some("/tree"));
        assert_eq!(first_between(&entries, scope, Some("/tree"), None).as_deref(), Some("/tree/i"));
        assert_eq!(first_between(&entries, scope, Some("/tree/sub"), None), None);
        assert_eq!(last_between(&entries, scope, None, None).as_deref(), Some("/tree/sub"));
        assert_eq!(last_between(&entries, scope, None, Some("/tree/i")).as_deref(), Some("/tree"));
        assert_eq!(last_between(&entries, scope, None, Some("/tree")), None);
    }

    #[test]
    fn cursors_that_met_yield_nothing() {
        let entries = sample();
        assert_eq!(first_between(&entries, "", Some("/tree"), Some("/tree")), None);
        assert_eq!(first_between(&entries, "", Some("/zz"), Some("/farr")), None);
        assert_eq!(
            first_between(&entries, "", Some("/tree"), Some("/tree/sub")).as_deref(),
            Some("/tree.x")
        );
    }

    #[test]
    fn busy_store_is_reported() -> Result<()> {
        let store = Store::new();
        let _guard = store.borrow_mut()?;
        assert_eq!(store.borrow().err(), Some(MapError::StoreBusy));
        Ok(())
    }

    #[test]
    fn deep_copies_are_independent() -> Result<()> {
        let store = Store::new();
        store.borrow_mut()?.insert("/a".to_string(), ValueCell::new(1));
        let copy = Store::from(store.borrow()?.clone());
        copy.borrow_mut()?.insert("/b".to_string(), ValueCell::new(2));
        assert!(!store.ptr_eq(&copy));
        assert_eq!(store.borrow()?.len(), 1);
        assert_eq!(copy.borrow()?.len(), 2);
        Ok(())
    }
}
