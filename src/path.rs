//! Canonical path keys.
//!
//! Every key handed to a [`PathMap`](crate::PathMap) is normalised against the
//! map's [`Location`] before it reaches the store. Canonical keys start with
//! `/` and never end with one. The root's own entry is stored under the empty
//! string and shown as `/`.

use std::fmt;

/// Separator between path components
pub const SEPARATOR: char = '/';

/// Where in the hierarchy a map is rooted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum Location {
    /// The top of the hierarchy
    #[default]
    Root,
    /// A canonical, non-root path such as `/tree/sub`
    At(String),
}

impl Location {
    /// Location of `path` resolved against this one.
    pub fn join(&self, path: &str) -> Location {
        Location::from_key(normalize(self, path))
    }

    /// Turns a canonical store key back into a location.
    pub(crate) fn from_key(key: String) -> Location {
        if key.is_empty() {
            Location::Root
        } else {
            Location::At(key)
        }
    }

    pub fn is_root(&self) -> bool {
        matches!(self, Location::Root)
    }

    /// Store key of this location's own entry; empty for the root.
    pub fn key(&self) -> &str {
        match self {
            Location::Root => "",
            Location::At(path) => path,
        }
    }

    /// Whether `key` lies in the subtree rooted here, including the location itself.
    pub fn contains(&self, key: &str) -> bool {
        match self {
            Location::Root => true,
            Location::At(path) => key
                .strip_prefix(path.as_str())
                .is_some_and(|rest| rest.is_empty() || rest.starts_with(SEPARATOR)),
        }
    }

    /// Path of `key` relative to this location, re-rooted at `/`.
    ///
    /// Keys outside the subtree are returned in their displayed form.
    pub fn relative<'a>(&self, key: &'a str) -> &'a str {
        let rest = match self {
            Location::Root => key,
            Location::At(path) if self.contains(key) => &key[path.len()..],
            Location::At(_) => key,
        };
        if rest.is_empty() {
            "/"
        } else {
            rest
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::Root => f.write_str("/"),
            Location::At(path) => f.write_str(path),
        }
    }
}

/// Canonical store key for `key` relative to `location`.
///
/// `key` is split on `/`. Empty components and `.` are skipped; `..` drops
/// the previous component and is ignored when there is none, so a key can
/// never climb above `location`. The empty key yields the location itself,
/// which is the empty string for the root.
///
/// ```
/// use sovran_pathmap::{normalize, Location};
///
/// assert_eq!(normalize(&Location::Root, "one/./two//three/"), "/one/two/three");
/// assert_eq!(normalize(&Location::Root, "../../one"), "/one");
/// assert_eq!(normalize(&Location::At("/tree".into()), "../x"), "/tree/x");
/// assert_eq!(normalize(&Location::Root, "/"), "");
/// ```
pub fn normalize(location: &Location, key: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for part in key.split(SEPARATOR) {
        match part {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            part => parts.push(part),
        }
    }

    let base = location.key();
    let capacity = base.len() + parts.iter().map(|p| p.len() + 1).sum::<usize>();
    let mut canonical = String::with_capacity(capacity);
    canonical.push_str(base);
    for part in parts {
        canonical.push(SEPARATOR);
        canonical.push_str(part);
    }
    canonical
}

/// Displayed form of a store key: the root entry shows as `/`.
pub(crate) fn display_key(key: &str) -> &str {
    if key.is_empty() {
        "/"
    } else {
        key
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn collapses_noise() {
        let root = Location::Root;
        for key in [
            "/one/two/three",
            "/one/two//three",
            "one/./two/three/",
            "../../../one/two/three",
            "one/two/four/../three",
            "./one/two/three/.",
        ] {
            assert_eq!(normalize(&root, key), "/one/two/three", "key {:?}", key);
        }
    }

    #[test]
    fn empty_keys_name_the_location() {
        assert_eq!(normalize(&Location::Root, ""), "");
        assert_eq!(normalize(&Location::Root, "//./"), "");
        let tree = Location::At("/tree".to_string());
        assert_eq!(normalize(&tree, ""), "/tree");
        assert_eq!(normalize(&tree, ".."), "/tree");
    }

    #[test]
    fn ascent_is_clamped_at_the_location() {
        let tree = Location::At("/tree".to_string());
        assert_eq!(normalize(&tree, "../../sub"), "/tree/sub");
        assert_eq!(normalize(&tree, "a/../../b"), "/tree/b");
    }

    #[test]
    fn joining_locations() {
        let tree = Location::Root.join("tree/");
        assert_eq!(tree, Location::At("/tree".to_string()));
        assert_eq!(tree.join("sub").to_string(), "/tree/sub");
        assert_eq!(tree.join(".."), tree);
        assert!(Location::Root.join("/").is_root());
    }

    #[test]
    fn subtree_membership_respects_components() {
        let tree = Location::At("/tree".to_string());
        assert!(tree.contains("/tree"));
        assert!(tree.contains("/tree/x"));
        assert!(!tree.contains("/treehouse"));
        assert!(!tree.contains("/tre"));
        assert!(Location::Root.contains(""));
    }

    #[test]
    fn relative_keys() {
        let tree = Location::At("/tree".to_string());
        assert_eq!(tree.relative("/tree"), "/");
        assert_eq!(tree.relative("/tree/sub/i"), "/sub/i");
        assert_eq!(Location::Root.relative(""), "/");
        assert_eq!(Location::Root.relative("/farr"), "/farr");
    }

    fn component() -> impl Strategy<Value = String> {
        "[a-z0-9_]{1,6}"
    }

    // Every filler ends in a separator so it never merges with a component
    fn noise() -> impl Strategy<Value = &'static str> {
        prop_oneof![Just(""), Just("./"), Just("/"), Just("//"), Just(".//")]
    }

    proptest! {
        #[test]
        fn noise_does_not_change_the_canonical_key(
            parts in prop::collection::vec(component(), 1..6),
            fillers in prop::collection::vec(noise(), 6),
            leading_ups in 0usize..4,
            trailing in noise(),
        ) {
            let clean = format!("/{}", parts.join("/"));

            let mut noisy = "../".repeat(leading_ups);
            for (part, filler) in parts.iter().zip(&fillers) {
                noisy.push_str(filler);
                noisy.push_str(part);
                noisy.push('/');
            }
            noisy.push_str(trailing);
            noisy.push('.');

            prop_assert_eq!(normalize(&Location::Root, &noisy), clean);
        }

        #[test]
        fn canonical_keys_are_well_formed(key in "[a-z./]{0,24}") {
            let canonical = normalize(&Location::Root, &key);
            prop_assert!(canonical.is_empty() || canonical.starts_with('/'));
            prop_assert!(!canonical.ends_with('/'));
            prop_assert!(!canonical.contains("//"));
            prop_assert_eq!(normalize(&Location::Root, &canonical), canonical.clone());
        }
    }
}
