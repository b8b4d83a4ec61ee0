//! Minimal write representation built from a document's accumulated changes.
//!
//! A [`Delta`] is the update payload for an already-persisted root: a flat
//! `path -> new value` map for replaced fields, plus separate structural
//! records for embedded collections (appends as whole document values,
//! removals by child identity). Paths are dotted and position-scoped by each
//! child's location under its parent at build time (`addresses.0.street`);
//! root-level fields carry no prefix.
//!
//! Building is a pure read over the document tree: calling it twice without
//! intervening mutation yields the same delta, and every emitted value is
//! deep-cloned so the payload is immune to later mutation. A field surfaced
//! through an append or removal never also appears in the flat map.
//!
//! A brand-new root does not need a delta at all: the whole document is
//! written, via [`Document::to_value`].

use alloc::format;
use alloc::string::String;
use alloc::vec::Vec;

use crate::document::Document;
use crate::document::tree::ChildSlot;
use crate::value::{IndexMap, Value, ValueMap};

/// Structural operation records: collection path -> affected values.
type StructuralOps = IndexMap<String, Vec<Value>>;

/// Minimal description of what must be written to bring storage in sync
/// with in-memory state.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Delta {
    /// Replaced fields: dotted path -> new value.
    sets: ValueMap,
    /// Paths of detached single-child embeds.
    unsets: Vec<String>,
    /// Whole document values appended per collection path.
    pushes: StructuralOps,
    /// Identities of children removed per collection path.
    pulls: StructuralOps,
}

impl Delta {
    /// Build the delta for a document and its embedded subtree.
    #[must_use]
    pub fn build(document: &Document) -> Self {
        let mut delta = Self::default();
        collect(document, "", &mut delta);
        delta
    }

    /// Replaced fields: dotted path -> new value.
    #[must_use]
    pub fn sets(&self) -> &ValueMap {
        &self.sets
    }

    /// Paths of detached single-child embeds.
    #[must_use]
    pub fn unsets(&self) -> &[String] {
        &self.unsets
    }

    /// Whole document values appended per collection path.
    #[must_use]
    pub fn pushes(&self) -> &StructuralOps {
        &self.pushes
    }

    /// Identities of children removed per collection path.
    #[must_use]
    pub fn pulls(&self) -> &StructuralOps {
        &self.pulls
    }

    /// Whether the delta describes no write at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
            && self.unsets.is_empty()
            && self.pushes.is_empty()
            && self.pulls.is_empty()
    }
}

fn join(prefix: &str, field: &str) -> String {
    if prefix.is_empty() {
        field.into()
    } else {
        format!("{prefix}.{field}")
    }
}

fn collect(document: &Document, prefix: &str, out: &mut Delta) {
    for (field, (_original, current)) in document.changes() {
        out.sets.insert(join(prefix, &field), current);
    }
    document.visit_slots(|field, slot| {
        let path = join(prefix, field);
        match slot {
            ChildSlot::One(slot) => match &slot.child {
                Some(child) if !child.destroyed() => {
                    if child.is_new() {
                        out.sets.insert(path, child.to_value());
                    } else {
                        collect(child, &path, out);
                    }
                }
                _ => {
                    if slot.detached.is_some() {
                        out.unsets.push(path);
                    }
                }
            },
            ChildSlot::Many(slot) => {
                for (index, child) in slot.items.iter().enumerate() {
                    if child.destroyed() {
                        continue;
                    }
                    if child.is_new() {
                        out.pushes.entry(path.clone()).or_default().push(child.to_value());
                    } else {
                        collect(child, &format!("{path}.{index}"), out);
                    }
                }
                for child in &slot.detached {
                    out.pulls.entry(path.clone()).or_default().push(child.pull_identity());
                }
            }
        }
    });
}
