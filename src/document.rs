//! In-memory document nodes with per-instance change tracking.
//!
//! A [`Document`] is a cheap handle (`Rc<RefCell<..>>`) over one node of a
//! document tree: its attribute values, its change record, its lifecycle
//! state, and its embedded children. Handles clone freely and refer to the
//! same node; equality between handles is node identity.
//!
//! The tracker is single-threaded by design: one node is never mutated from
//! two threads, and nothing here blocks or performs I/O. The persistence
//! layer drives the boundary: it builds a [`Delta`](crate::Delta) from a
//! changed document, performs the write, and only then calls
//! [`Document::commit`]. A failed write simply never commits, leaving the
//! full change record in place for retry.

use alloc::rc::{Rc, Weak};
use alloc::string::String;
use alloc::vec::Vec;
use core::cell::{RefCell, RefMut};

use crate::changeset::ChangeMap;
use crate::errors::Error;
use crate::schema::{FieldDefault, Schema};
use crate::snapshot::{Attributes, Projection};
use crate::value::{IndexMap, Value, ValueMap};

mod lifecycle;
pub(crate) mod tree;

pub use lifecycle::{Lifecycle, ReloadPolicy};

use tree::ChildSlot;

/// Non-owning back-reference from an embedded node to its owner.
pub(crate) struct ParentLink {
    /// The owning node.
    pub(crate) node: Weak<RefCell<Inner>>,
    /// The field of the owner under which this node is embedded.
    pub(crate) field: String,
}

/// Shared state of one document node.
pub(crate) struct Inner {
    /// Field declarations for this document type.
    pub(crate) schema: Rc<Schema>,
    /// Attribute values plus the snapshot tracker.
    pub(crate) attributes: Attributes,
    /// Changes captured by the most recent commit, stable until the next.
    pub(crate) previous_changes: ChangeMap,
    /// Lifecycle state.
    pub(crate) state: Lifecycle,
    /// Back-reference to the owner, when embedded.
    pub(crate) parent: Option<ParentLink>,
    /// Owned embedded children, keyed by field name.
    pub(crate) children: IndexMap<String, ChildSlot>,
}

/// Handle to an in-memory document node.
///
/// See the [module docs](self) for the ownership and threading model.
#[derive(Clone)]
pub struct Document {
    pub(crate) inner: Rc<RefCell<Inner>>,
}

/// Handle equality is node identity: two handles are equal when they refer
/// to the same node, never by comparing content.
impl PartialEq for Document {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Document {}

impl core::fmt::Debug for Document {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("Document")
            .field("state", &inner.state)
            .field("attributes", inner.attributes.values())
            .field("changed_fields", &inner.attributes.changed_fields())
            .finish_non_exhaustive()
    }
}

/// Rekey an attribute map by canonical field names, rejecting unknown fields.
fn canonicalize(schema: &Schema, attrs: ValueMap) -> Result<ValueMap, Error> {
    let mut out = ValueMap::default();
    for (field, value) in attrs {
        let canonical = schema
            .resolve(&field)
            .ok_or_else(|| Error::UnknownField(field.clone()))?;
        out.insert(canonical.into(), value);
    }
    Ok(out)
}

/// Attribute store for a brand-new document: static defaults first
/// (untracked), then the supplied attributes through the tracked setter
/// path, then computed defaults against the resolved map (untracked).
fn build_new_attributes(schema: &Schema, attrs: ValueMap) -> Result<Attributes, Error> {
    let mut attributes = Attributes::from_map(ValueMap::default());

    for spec in schema.specs() {
        if let FieldDefault::Static(value) = spec.default() {
            attributes.insert_untracked(spec.name(), value.deep_clone());
        }
    }
    for (field, value) in attrs {
        attributes.write(schema, &field, value)?;
    }
    for spec in schema.specs() {
        if let FieldDefault::Computed(compute) = spec.default() {
            if !attributes.values().contains_key(spec.name()) {
                let value = compute(attributes.values());
                attributes.insert_untracked(spec.name(), value);
            }
        }
    }
    Ok(attributes)
}

impl Document {
    fn from_inner(inner: Inner) -> Self {
        Self {
            inner: Rc::new(RefCell::new(inner)),
        }
    }

    /// Create a brand-new document from user-supplied attributes.
    ///
    /// Static defaults are applied first, then the supplied attributes are
    /// assigned through the tracked setter path (so each one baselines
    /// against the default, or null), then computed defaults fill any
    /// still-absent fields against the resolved map. The document starts in
    /// [`Lifecycle::New`].
    ///
    /// # Errors
    ///
    /// * [`Error::UnknownField`] if an attribute is not declared.
    pub fn new(schema: impl Into<Rc<Schema>>, attrs: ValueMap) -> Result<Self, Error> {
        let schema = schema.into();
        let attributes = build_new_attributes(&schema, attrs)?;
        Ok(Self::from_inner(Inner {
            schema,
            attributes,
            previous_changes: ChangeMap::default(),
            state: Lifecycle::New,
            parent: None,
            children: IndexMap::default(),
        }))
    }

    /// Materialize a document from a storage-provided attribute map.
    ///
    /// The loaded map becomes the baseline verbatim: nothing is dirty until
    /// mutated. The document starts in [`Lifecycle::Loaded`], which tracks
    /// identically to [`Lifecycle::Persisted`].
    ///
    /// # Errors
    ///
    /// * [`Error::UnknownField`] if an attribute is not declared.
    pub fn instantiate(schema: impl Into<Rc<Schema>>, attrs: ValueMap) -> Result<Self, Error> {
        let schema = schema.into();
        let attrs = canonicalize(&schema, attrs)?;
        Ok(Self::from_inner(Inner {
            schema,
            attributes: Attributes::from_map(attrs),
            previous_changes: ChangeMap::default(),
            state: Lifecycle::Loaded,
            parent: None,
            children: IndexMap::default(),
        }))
    }

    /// Materialize a document loaded through a partial field projection.
    ///
    /// Fields outside the projection raise [`Error::MissingAttribute`] on
    /// read until they are written.
    ///
    /// # Errors
    ///
    /// * [`Error::UnknownField`] if an attribute is not declared.
    pub fn instantiate_with_projection(
        schema: impl Into<Rc<Schema>>,
        attrs: ValueMap,
        projection: Projection,
    ) -> Result<Self, Error> {
        let schema = schema.into();
        let attrs = canonicalize(&schema, attrs)?;
        Ok(Self::from_inner(Inner {
            schema,
            attributes: Attributes::with_projection(attrs, projection),
            previous_changes: ChangeMap::default(),
            state: Lifecycle::Loaded,
            parent: None,
            children: IndexMap::default(),
        }))
    }

    /// The schema this document was declared with.
    #[must_use]
    pub fn schema(&self) -> Rc<Schema> {
        Rc::clone(&self.inner.borrow().schema)
    }

    /// The document's `_id` attribute, when one is set.
    #[must_use]
    pub fn id(&self) -> Option<Value> {
        self.inner
            .borrow()
            .attributes
            .values()
            .get("_id")
            .map(Value::deep_clone)
    }

    /// Read a field's value (a structurally independent copy).
    ///
    /// Reading is allowed in every lifecycle state, including after destroy.
    ///
    /// # Errors
    ///
    /// * [`Error::UnknownField`] if the schema does not declare the field.
    /// * [`Error::MissingAttribute`] if the field was excluded from the
    ///   loaded projection and never written since.
    pub fn get(&self, field: &str) -> Result<Value, Error> {
        let mut inner = self.inner.borrow_mut();
        let Inner {
            schema, attributes, ..
        } = &mut *inner;
        attributes.read(schema, field)
    }

    /// Write a field's value through the tracked setter path.
    ///
    /// # Errors
    ///
    /// * [`Error::DocumentDestroyed`] if the document is destroyed.
    /// * [`Error::UnknownField`] if the schema does not declare the field.
    pub fn set(&self, field: &str, value: impl Into<Value>) -> Result<(), Error> {
        self.ensure_mutable()?;
        let mut inner = self.inner.borrow_mut();
        let Inner {
            schema, attributes, ..
        } = &mut *inner;
        attributes.write(schema, field, value.into())
    }

    /// Bulk-assign attributes through the tracked setter path.
    ///
    /// # Errors
    ///
    /// Same conditions as [`Document::set`]; assignment stops at the first
    /// failing field.
    pub fn write_attributes(&self, attrs: ValueMap) -> Result<(), Error> {
        for (field, value) in attrs {
            self.set(&field, value)?;
        }
        Ok(())
    }

    /// Borrow a field's live value mutably for in-place mutation.
    ///
    /// A tentative baseline is captured before the reference is handed out;
    /// it becomes a real change only if the value actually diverges. The
    /// returned guard must be dropped before any other access to this
    /// document.
    ///
    /// # Errors
    ///
    /// * [`Error::DocumentDestroyed`] if the document is destroyed.
    /// * [`Error::UnknownField`] if the schema does not declare the field.
    /// * [`Error::MissingAttribute`] if the field was excluded from the
    ///   loaded projection and never written since.
    pub fn get_mut(&self, field: &str) -> Result<RefMut<'_, Value>, Error> {
        self.ensure_mutable()?;
        let mut inner = self.inner.borrow_mut();
        let canonical: String = {
            let Inner {
                schema, attributes, ..
            } = &mut *inner;
            attributes.declare(schema, field)?;
            schema
                .resolve(field)
                .ok_or_else(|| Error::UnknownField(field.into()))?
                .into()
        };
        RefMut::filter_map(inner, |inner| inner.attributes.value_mut(&canonical))
            .map_err(|_| Error::UnknownField(field.into()))
    }

    /// Declare that a field is about to change, capturing a tentative
    /// baseline without mutating anything.
    ///
    /// # Errors
    ///
    /// Same conditions as [`Document::get_mut`].
    pub fn will_change(&self, field: &str) -> Result<(), Error> {
        self.ensure_mutable()?;
        let mut inner = self.inner.borrow_mut();
        let Inner {
            schema, attributes, ..
        } = &mut *inner;
        attributes.declare(schema, field)
    }

    /// Restore a field to its baseline value and erase its change entry.
    ///
    /// # Errors
    ///
    /// * [`Error::DocumentDestroyed`] if the document is destroyed.
    /// * [`Error::UnknownField`] if the schema does not declare the field.
    pub fn revert(&self, field: &str) -> Result<(), Error> {
        self.ensure_mutable()?;
        let mut inner = self.inner.borrow_mut();
        let Inner {
            schema, attributes, ..
        } = &mut *inner;
        attributes.revert(schema, field)
    }

    /// Names of this document's own changed fields, in first-changed order.
    ///
    /// Children never contribute here: only [`Document::changed`] aggregates
    /// the subtree.
    #[must_use]
    pub fn changed_fields(&self) -> Vec<String> {
        self.inner
            .borrow()
            .attributes
            .changed_fields()
            .into_iter()
            .map(String::from)
            .collect()
    }

    /// This document's own changes as `field -> (original, current)`.
    #[must_use]
    pub fn changes(&self) -> ChangeMap {
        self.inner.borrow().attributes.changes()
    }

    /// The `(original, current)` pair for one field, if it changed.
    ///
    /// Returns `None` for clean, unknown, or unreadable fields.
    #[must_use]
    pub fn attribute_change(&self, field: &str) -> Option<(Value, Value)> {
        let inner = self.inner.borrow();
        inner.attributes.change(&inner.schema, field)
    }

    /// Whether one field changed.
    #[must_use]
    pub fn attribute_changed(&self, field: &str) -> bool {
        let inner = self.inner.borrow();
        inner.attributes.is_changed(&inner.schema, field)
    }

    /// The value a field held before its current change episode, or its
    /// current value when clean. `None` for unknown or unreadable fields.
    #[must_use]
    pub fn attribute_was(&self, field: &str) -> Option<Value> {
        let mut inner = self.inner.borrow_mut();
        let Inner {
            schema, attributes, ..
        } = &mut *inner;
        attributes.was(schema, field)
    }

    /// The changes captured by the most recent commit.
    ///
    /// Stable through one commit's whole callback chain: only the next
    /// commit overwrites it.
    #[must_use]
    pub fn previous_changes(&self) -> ChangeMap {
        self.inner.borrow().previous_changes.clone()
    }

    /// Full document content as a [`Value::Map`], defaults materialized and
    /// children included recursively: the payload for a first insert.
    #[must_use]
    pub fn to_value(&self) -> Value {
        let mut inner = self.inner.borrow_mut();
        let Inner {
            schema,
            attributes,
            children,
            ..
        } = &mut *inner;
        let mut map = attributes.resolved_values(schema);
        for (field, slot) in children.iter() {
            match slot {
                ChildSlot::One(slot) => {
                    if let Some(child) = &slot.child {
                        if !child.destroyed() {
                            map.insert(field.clone(), child.to_value());
                        }
                    }
                }
                ChildSlot::Many(slot) => {
                    let items: Vec<Value> = slot
                        .items
                        .iter()
                        .filter(|child| !child.destroyed())
                        .map(Document::to_value)
                        .collect();
                    map.insert(field.clone(), Value::Array(items));
                }
            }
        }
        Value::Map(map)
    }
}
