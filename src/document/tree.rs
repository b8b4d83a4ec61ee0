//! Ownership edges between documents and upward change propagation.
//!
//! A parent owns its embedded children exclusively through [`ChildSlot`]s;
//! each child holds a non-owning `Weak` back-reference, invalidated on
//! detach, so the tree never forms an ownership cycle. "Did this subtree
//! change?" is answered by OR-reduction over the live subtree at query time:
//! a document reports changed when its own change record is non-empty, when
//! a structurally new child sits in one of its slots, when a persisted child
//! was detached since the last rebase, or when any child reports changed
//! itself. Field-level change lists never aggregate children.
//!
//! Embedding a document adopts it as brand-new content for this parent
//! (its whole value will be written on the next commit); attaching children
//! while materializing a loaded tree goes through [`Document::load_child`] /
//! [`Document::load_children`] instead, which leave both parent and child
//! clean.

use alloc::rc::Rc;
use alloc::string::String;
use alloc::vec::Vec;

use log::debug;

use super::{Document, Lifecycle, ParentLink};
use crate::errors::Error;
use crate::value::Value;

/// One owned embedded position: a single child or an ordered collection.
pub(crate) enum ChildSlot {
    /// Single embedded child.
    One(OneSlot),
    /// Ordered collection of embedded children.
    Many(ManySlot),
}

/// Slot state for a single embedded child.
#[derive(Default)]
pub(crate) struct OneSlot {
    /// The current child, if any.
    pub(crate) child: Option<Document>,
    /// A persisted child detached since the last rebase (drives the unset).
    pub(crate) detached: Option<Document>,
}

/// Slot state for an embedded collection.
#[derive(Default)]
pub(crate) struct ManySlot {
    /// Current children, in collection order.
    pub(crate) items: Vec<Document>,
    /// Persisted children detached since the last rebase (drive the pulls).
    pub(crate) detached: Vec<Document>,
}

impl Document {
    /// Validations shared by every attach entry point.
    fn guard_embed(&self, field: &str, child: &Document) -> Result<(), Error> {
        self.ensure_mutable()?;
        child.ensure_mutable()?;
        if self.inner.borrow().schema.contains(field) {
            return Err(Error::EmbedConflict(field.into()));
        }
        if self == child {
            return Err(Error::EmbedCycle(field.into()));
        }
        let mut cursor = self.parent();
        while let Some(node) = cursor {
            if &node == child {
                return Err(Error::EmbedCycle(field.into()));
            }
            cursor = node.parent();
        }
        if child.inner.borrow().parent.is_some() {
            return Err(Error::AlreadyEmbedded);
        }
        Ok(())
    }

    fn link_to(&self, child: &Document, field: &str) {
        child.inner.borrow_mut().parent = Some(ParentLink {
            node: Rc::downgrade(&self.inner),
            field: field.into(),
        });
    }

    /// Embed a document as the single child under `field`.
    ///
    /// The child is adopted as brand-new content for this parent: it enters
    /// [`Lifecycle::New`] and its whole value is written on the next commit.
    /// A previously embedded persisted child is detached and queued for
    /// unset.
    ///
    /// # Errors
    ///
    /// * [`Error::DocumentDestroyed`] if either document is destroyed.
    /// * [`Error::EmbedConflict`] if `field` is a schema attribute or
    ///   already holds a collection.
    /// * [`Error::EmbedCycle`] / [`Error::AlreadyEmbedded`] on invalid
    ///   ownership.
    pub fn embed_one(&self, field: &str, child: &Document) -> Result<(), Error> {
        self.guard_embed(field, child)?;
        if matches!(
            self.inner.borrow().children.get(field),
            Some(ChildSlot::Many(_))
        ) {
            return Err(Error::EmbedConflict(field.into()));
        }

        debug!("embedding child under `{field}`");
        self.link_to(child, field);
        child.inner.borrow_mut().state = Lifecycle::New;

        let mut inner = self.inner.borrow_mut();
        let slot = inner
            .children
            .entry(field.into())
            .or_insert_with(|| ChildSlot::One(OneSlot::default()));
        if let ChildSlot::One(slot) = slot {
            if let Some(old) = slot.child.replace(child.clone()) {
                old.inner.borrow_mut().parent = None;
                if !old.is_new() && slot.detached.is_none() {
                    slot.detached = Some(old);
                }
            }
        }
        Ok(())
    }

    /// Detach and return the single child under `field`, queueing an unset
    /// if the child was persisted.
    ///
    /// # Errors
    ///
    /// * [`Error::DocumentDestroyed`] if this document is destroyed.
    /// * [`Error::ChildNotFound`] if the slot is empty or holds a
    ///   collection.
    pub fn unembed_one(&self, field: &str) -> Result<Document, Error> {
        self.ensure_mutable()?;
        let mut inner = self.inner.borrow_mut();
        match inner.children.get_mut(field) {
            Some(ChildSlot::One(slot)) => {
                let child = slot
                    .child
                    .take()
                    .ok_or_else(|| Error::ChildNotFound(field.into()))?;
                debug!("detaching child under `{field}`");
                child.inner.borrow_mut().parent = None;
                if !child.is_new() && slot.detached.is_none() {
                    slot.detached = Some(child.clone());
                }
                Ok(child)
            }
            _ => Err(Error::ChildNotFound(field.into())),
        }
    }

    /// Append a document to the embedded collection under `field`.
    ///
    /// The child is adopted as brand-new content for this parent, which
    /// marks the parent changed regardless of the child's own fields.
    ///
    /// # Errors
    ///
    /// Same conditions as [`Document::embed_one`], with the conflict check
    /// inverted: `field` must not already hold a single child.
    pub fn push_child(&self, field: &str, child: &Document) -> Result<(), Error> {
        self.guard_embed(field, child)?;
        if matches!(
            self.inner.borrow().children.get(field),
            Some(ChildSlot::One(_))
        ) {
            return Err(Error::EmbedConflict(field.into()));
        }

        debug!("appending child under `{field}`");
        self.link_to(child, field);
        child.inner.borrow_mut().state = Lifecycle::New;

        let mut inner = self.inner.borrow_mut();
        let slot = inner
            .children
            .entry(field.into())
            .or_insert_with(|| ChildSlot::Many(ManySlot::default()));
        if let ChildSlot::Many(slot) = slot {
            slot.items.push(child.clone());
        }
        Ok(())
    }

    /// Detach one document from the embedded collection under `field`,
    /// queueing a pull if the child was persisted.
    ///
    /// # Errors
    ///
    /// * [`Error::DocumentDestroyed`] if this document is destroyed.
    /// * [`Error::ChildNotFound`] if the child is not in the collection.
    pub fn remove_child(&self, field: &str, child: &Document) -> Result<(), Error> {
        self.ensure_mutable()?;
        let mut inner = self.inner.borrow_mut();
        match inner.children.get_mut(field) {
            Some(ChildSlot::Many(slot)) => {
                let index = slot
                    .items
                    .iter()
                    .position(|item| item == child)
                    .ok_or_else(|| Error::ChildNotFound(field.into()))?;
                debug!("removing child {index} under `{field}`");
                let removed = slot.items.remove(index);
                removed.inner.borrow_mut().parent = None;
                if !removed.is_new() {
                    slot.detached.push(removed);
                }
                Ok(())
            }
            _ => Err(Error::ChildNotFound(field.into())),
        }
    }

    /// Attach an already-loaded child while materializing a loaded tree.
    ///
    /// Neither parent nor child is dirtied: the child keeps its lifecycle
    /// state and no structural change is recorded.
    ///
    /// # Errors
    ///
    /// Same conditions as [`Document::embed_one`].
    pub fn load_child(&self, field: &str, child: &Document) -> Result<(), Error> {
        self.guard_embed(field, child)?;
        if matches!(
            self.inner.borrow().children.get(field),
            Some(ChildSlot::Many(_))
        ) {
            return Err(Error::EmbedConflict(field.into()));
        }

        self.link_to(child, field);
        let mut inner = self.inner.borrow_mut();
        let slot = inner
            .children
            .entry(field.into())
            .or_insert_with(|| ChildSlot::One(OneSlot::default()));
        if let ChildSlot::One(slot) = slot {
            if let Some(old) = slot.child.replace(child.clone()) {
                old.inner.borrow_mut().parent = None;
            }
        }
        Ok(())
    }

    /// Attach already-loaded children while materializing a loaded tree.
    ///
    /// # Errors
    ///
    /// Same conditions as [`Document::push_child`].
    pub fn load_children(&self, field: &str, children: &[Document]) -> Result<(), Error> {
        if matches!(
            self.inner.borrow().children.get(field),
            Some(ChildSlot::One(_))
        ) {
            return Err(Error::EmbedConflict(field.into()));
        }
        for child in children {
            self.guard_embed(field, child)?;
            self.link_to(child, field);
            let mut inner = self.inner.borrow_mut();
            let slot = inner
                .children
                .entry(field.into())
                .or_insert_with(|| ChildSlot::Many(ManySlot::default()));
            if let ChildSlot::Many(slot) = slot {
                slot.items.push(child.clone());
            }
        }
        Ok(())
    }

    /// The single child under `field`, if any.
    #[must_use]
    pub fn child(&self, field: &str) -> Option<Document> {
        match self.inner.borrow().children.get(field) {
            Some(ChildSlot::One(slot)) => slot.child.clone(),
            _ => None,
        }
    }

    /// The embedded collection under `field` (empty for other slots).
    #[must_use]
    pub fn children(&self, field: &str) -> Vec<Document> {
        match self.inner.borrow().children.get(field) {
            Some(ChildSlot::Many(slot)) => slot.items.clone(),
            _ => Vec::new(),
        }
    }

    /// The owning parent, if this document is embedded.
    #[must_use]
    pub fn parent(&self) -> Option<Document> {
        let inner = self.inner.borrow();
        inner
            .parent
            .as_ref()
            .and_then(|link| link.node.upgrade())
            .map(|inner| Document { inner })
    }

    /// The root of the ownership chain (`self` for a root document).
    #[must_use]
    pub fn root(&self) -> Document {
        let mut current = self.clone();
        while let Some(parent) = current.parent() {
            current = parent;
        }
        current
    }

    /// Whether this document is owned by a parent.
    #[must_use]
    pub fn is_embedded(&self) -> bool {
        self.parent().is_some()
    }

    /// The parent field under which this document is embedded.
    #[must_use]
    pub fn embedded_field(&self) -> Option<String> {
        let inner = self.inner.borrow();
        inner.parent.as_ref().map(|link| link.field.clone())
    }

    /// This document's index in its parent's collection, if it sits in one.
    #[must_use]
    pub fn position(&self) -> Option<usize> {
        let parent = self.parent()?;
        let field = self.embedded_field()?;
        let parent_inner = parent.inner.borrow();
        match parent_inner.children.get(&field) {
            Some(ChildSlot::Many(slot)) => slot.items.iter().position(|item| item == self),
            _ => None,
        }
    }

    /// Whether this document's subtree changed since the last rebase.
    ///
    /// True when this document's own change record is effectively non-empty,
    /// when a structurally new or detached child is pending, or when any
    /// child's subtree reports changed. Own field-level queries
    /// ([`Document::changes`], [`Document::changed_fields`]) never aggregate
    /// children.
    #[must_use]
    pub fn changed(&self) -> bool {
        let inner = self.inner.borrow();
        if inner.attributes.has_changes() {
            return true;
        }
        for slot in inner.children.values() {
            match slot {
                ChildSlot::One(slot) => {
                    if slot.detached.is_some() {
                        return true;
                    }
                    if let Some(child) = &slot.child {
                        if child.is_new() || child.changed() {
                            return true;
                        }
                    }
                }
                ChildSlot::Many(slot) => {
                    if !slot.detached.is_empty() {
                        return true;
                    }
                    if slot.items.iter().any(|child| child.is_new() || child.changed()) {
                        return true;
                    }
                }
            }
        }
        false
    }

    /// Walk this document's slots (for delta building).
    pub(crate) fn visit_slots(&self, mut f: impl FnMut(&str, &ChildSlot)) {
        let inner = self.inner.borrow();
        for (field, slot) in &inner.children {
            f(field, slot);
        }
    }

    /// The value a pull record identifies a removed child by: its `_id`
    /// when present, else its full document value.
    pub(crate) fn pull_identity(&self) -> Value {
        self.id().unwrap_or_else(|| self.to_value())
    }
}
