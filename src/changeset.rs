//! Per-document record of which fields changed and their pre-change values.
//!
//! A [`ChangeSet`] stores only the `original` half of each change: a deep
//! clone of the value a field held when its current dirty episode began.
//! The `current` half always lives in the document's attribute map, and every
//! query takes that live map and re-evaluates against it. Two policies fall
//! out of this shape for free:
//!
//! - Repeated writes to one field collapse to `original -> latest`: the
//!   first recorded baseline survives the whole episode untouched.
//! - Tentative entries (recorded defensively before handing out a mutable
//!   container reference) are invisible until the live value actually
//!   diverges, because divergence is judged at read time, not record time.

use alloc::string::String;
use alloc::vec::Vec;

use crate::value::{IndexMap, Value, ValueMap};

/// Mapping from field name to its `(original, current)` change pair, in
/// first-recorded order.
pub type ChangeMap = IndexMap<String, (Value, Value)>;

/// Per-document record mapping each dirty field to the baseline value it is
/// compared against.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChangeSet {
    /// Field name -> original clone, in first-recorded order.
    entries: IndexMap<String, Value>,
}

impl ChangeSet {
    /// Create an empty change set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the baseline for a field at the start of a dirty episode.
    ///
    /// The first record per episode wins: subsequent calls for the same
    /// field leave the cached original untouched, so a multi-write episode
    /// compares `original -> latest`, never `original -> intermediate`.
    pub fn record(&mut self, field: &str, original: Value) {
        if !self.entries.contains_key(field) {
            self.entries.insert(field.into(), original);
        }
    }

    /// Whether a baseline is cached for the field (tentative or not).
    #[must_use]
    pub fn contains(&self, field: &str) -> bool {
        self.entries.contains_key(field)
    }

    /// The cached baseline for a field, if one exists.
    #[must_use]
    pub fn original(&self, field: &str) -> Option<&Value> {
        self.entries.get(field)
    }

    /// Drop the entry for a field, returning its baseline.
    pub fn discard(&mut self, field: &str) -> Option<Value> {
        self.entries.shift_remove(field)
    }

    /// Whether the field is effectively changed against the live map.
    ///
    /// A cached entry whose baseline still equals the live value is
    /// tentative and reports as unchanged.
    #[must_use]
    pub fn is_changed(&self, field: &str, live: &ValueMap) -> bool {
        self.entries
            .get(field)
            .is_some_and(|original| live.get(field).unwrap_or(&Value::Null) != original)
    }

    /// Whether any field is effectively changed against the live map.
    #[must_use]
    pub fn has_changes(&self, live: &ValueMap) -> bool {
        self.entries
            .iter()
            .any(|(field, original)| live.get(field).unwrap_or(&Value::Null) != original)
    }

    /// Effectively changed field names, in first-recorded order.
    #[must_use]
    pub fn changed_fields(&self, live: &ValueMap) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|(field, original)| live.get(*field).unwrap_or(&Value::Null) != *original)
            .map(|(field, _)| field.as_str())
            .collect()
    }

    /// The `(original, current)` pair for a field, if effectively changed.
    #[must_use]
    pub fn change(&self, field: &str, live: &ValueMap) -> Option<(Value, Value)> {
        let original = self.entries.get(field)?;
        let current = live.get(field).unwrap_or(&Value::Null);
        if current == original {
            return None;
        }
        Some((original.deep_clone(), current.deep_clone()))
    }

    /// All effective changes against the live map, in first-recorded order.
    ///
    /// Values are deep-cloned, so the returned map is immune to later
    /// mutation of the document.
    #[must_use]
    pub fn changes(&self, live: &ValueMap) -> ChangeMap {
        self.entries
            .iter()
            .filter_map(|(field, original)| {
                let current = live.get(field).unwrap_or(&Value::Null);
                if current == original {
                    return None;
                }
                Some((field.clone(), (original.deep_clone(), current.deep_clone())))
            })
            .collect()
    }

    /// Snapshot the effective changes, then clear every entry.
    ///
    /// This is the rebase half of a commit: afterwards the live map is the
    /// new baseline and nothing is dirty.
    pub fn take_changes(&mut self, live: &ValueMap) -> ChangeMap {
        let out = self.changes(live);
        self.entries.clear();
        out
    }

    /// Drop every entry without snapshotting.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Whether no baseline is cached at all (not even tentatively).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn live(pairs: &[(&str, Value)]) -> ValueMap {
        pairs.iter().map(|(k, v)| (String::from(*k), v.deep_clone())).collect()
    }

    #[test]
    fn test_first_record_wins_per_episode() {
        let mut changes = ChangeSet::new();
        changes.record("title", Value::from("A"));
        changes.record("title", Value::from("B"));

        let current = live(&[("title", Value::from("C"))]);
        assert_eq!(
            changes.change("title", &current),
            Some((Value::from("A"), Value::from("C"))),
        );
    }

    #[test]
    fn test_tentative_entry_is_invisible_until_divergence() {
        let mut changes = ChangeSet::new();
        changes.record("aliases", Value::Array(alloc::vec![Value::from("Grand Poobah")]));

        let unchanged = live(&[("aliases", Value::Array(alloc::vec![Value::from("Grand Poobah")]))]);
        assert!(!changes.has_changes(&unchanged));
        assert!(changes.changed_fields(&unchanged).is_empty());
        assert!(changes.changes(&unchanged).is_empty());

        let diverged = live(&[("aliases", Value::Array(alloc::vec![Value::from("Dark Helmet")]))]);
        assert!(changes.is_changed("aliases", &diverged));
    }

    #[test]
    fn test_changed_fields_keeps_first_recorded_order() {
        let mut changes = ChangeSet::new();
        changes.record("b", Value::Null);
        changes.record("a", Value::Null);

        let current = live(&[("a", Value::from(1)), ("b", Value::from(2))]);
        assert_eq!(changes.changed_fields(&current), ["b", "a"]);
    }

    #[test]
    fn test_take_changes_clears_entries() {
        let mut changes = ChangeSet::new();
        changes.record("title", Value::from("old"));

        let current = live(&[("title", Value::from("new"))]);
        let taken = changes.take_changes(&current);
        assert_eq!(taken.get("title"), Some(&(Value::from("old"), Value::from("new"))));
        assert!(changes.is_empty());
        assert!(!changes.has_changes(&current));
    }

    #[test]
    fn test_missing_live_value_compares_as_null() {
        let mut changes = ChangeSet::new();
        changes.record("title", Value::from("old"));
        assert!(changes.is_changed("title", &ValueMap::default()));

        let mut nulled = ChangeSet::new();
        nulled.record("title", Value::Null);
        assert!(!nulled.is_changed("title", &ValueMap::default()));
    }
}
