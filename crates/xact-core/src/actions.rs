//! Declared action sets.
//!
//! Every object declares which selectors it will send and which it will
//! accept. The declaration is pure data used for discovery and for the
//! `UnsupportedAction` checks on both sides of a dispatch.

use crate::types::Selector;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionSet {
    entries: BTreeMap<Selector, String>,
}

impl ActionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set = Self::new();
        for name in names {
            set.insert_name(name.as_ref());
        }
        set
    }

    /// Declare an action by name; the selector is derived from it.
    pub fn insert_name(&mut self, name: &str) -> Selector {
        let selector = Selector::from_name(name);
        self.entries.insert(selector, name.to_string());
        selector
    }

    /// Declare a raw selector under a display label.
    pub fn insert(&mut self, selector: Selector, label: impl Into<String>) {
        self.entries.insert(selector, label.into());
    }

    pub fn contains(&self, selector: Selector) -> bool {
        self.entries.contains_key(&selector)
    }

    pub fn name_of(&self, selector: Selector) -> Option<&str> {
        self.entries.get(&selector).map(String::as_str)
    }

    /// Declared names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.entries.values().cloned().collect();
        names.sort();
        names
    }

    pub fn iter(&self) -> impl Iterator<Item = (Selector, &str)> {
        self.entries.iter().map(|(s, n)| (*s, n.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_are_sorted_and_selectors_derived() {
        let set = ActionSet::from_names(["slash", "block", "cast"]);
        assert_eq!(set.names(), vec!["block", "cast", "slash"]);
        assert!(set.contains(Selector::from_name("cast")));
        assert!(!set.contains(Selector::from_name("heal")));
        assert_eq!(set.name_of(Selector::from_name("block")), Some("block"));
    }

    #[test]
    fn raw_selector_declaration() {
        let mut set = ActionSet::new();
        set.insert(Selector::from_u32(0xABCD), "0xabcd");
        assert!(set.contains(Selector::from_u32(0xABCD)));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn redeclaring_is_idempotent() {
        let set = ActionSet::from_names(["cast", "cast"]);
        assert_eq!(set.len(), 1);
    }
}
