//! Lifecycle coordination: when baselines rebase and tracking ends.
//!
//! The state machine is `New -> Persisted`, `Loaded -> Persisted`,
//! `Persisted -> Persisted` (each commit rebases), and any state
//! `-> Destroyed` (terminal). `Loaded` is the storage-materialized entry
//! state and tracks identically to `Persisted`.
//!
//! Commit is only ever invoked by the persistence layer *after* the write
//! succeeded: a failed write simply never commits, so the change record
//! survives for retry.

use log::debug;

use super::tree::ChildSlot;
use super::{Document, Inner, build_new_attributes, canonicalize};
use crate::errors::Error;
use crate::value::ValueMap;

/// Lifecycle state of a document node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    /// Instantiated in memory with user-supplied attributes; never written.
    New,
    /// Materialized from storage; tracks identically to `Persisted`.
    Loaded,
    /// Written to storage at least once since instantiation.
    Persisted,
    /// Destroyed; tracking discarded, mutation rejected. Terminal.
    Destroyed,
}

/// What a reload does when storage no longer has the document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReloadPolicy {
    /// Surface [`Error::DocumentNotFound`].
    #[default]
    Error,
    /// Reinitialize as a fresh, empty [`Lifecycle::New`] document.
    Reset,
}

fn clear_children(inner: &mut Inner) {
    for slot in inner.children.values_mut() {
        match slot {
            ChildSlot::One(slot) => {
                if let Some(child) = slot.child.take() {
                    child.inner.borrow_mut().parent = None;
                }
                slot.detached = None;
            }
            ChildSlot::Many(slot) => {
                for child in slot.items.drain(..) {
                    child.inner.borrow_mut().parent = None;
                }
                slot.detached.clear();
            }
        }
    }
    inner.children.clear();
}

impl Document {
    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> Lifecycle {
        self.inner.borrow().state
    }

    /// Whether the document was never written to storage.
    #[must_use]
    pub fn is_new(&self) -> bool {
        self.state() == Lifecycle::New
    }

    /// Whether the document exists in storage (loaded or persisted).
    #[must_use]
    pub fn persisted(&self) -> bool {
        matches!(self.state(), Lifecycle::Loaded | Lifecycle::Persisted)
    }

    /// Whether the document is destroyed.
    #[must_use]
    pub fn destroyed(&self) -> bool {
        self.state() == Lifecycle::Destroyed
    }

    pub(crate) fn ensure_mutable(&self) -> Result<(), Error> {
        if self.destroyed() {
            return Err(Error::DocumentDestroyed);
        }
        Ok(())
    }

    /// Rebase after a confirmed successful write.
    ///
    /// Snapshots the effective changes into
    /// [`previous_changes`](Document::previous_changes), clears the change
    /// record so the live values become the new baseline, promotes the
    /// document (and, recursively, every attached child) to
    /// [`Lifecycle::Persisted`], and drops pending detach records.
    ///
    /// # Errors
    ///
    /// * [`Error::DocumentDestroyed`] if the document is destroyed.
    pub fn commit(&self) -> Result<(), Error> {
        self.ensure_mutable()?;
        let mut inner = self.inner.borrow_mut();
        let taken = inner.attributes.take_changes();
        debug!("commit: rebasing {} changed fields", taken.len());
        inner.previous_changes = taken;
        inner.state = Lifecycle::Persisted;
        for slot in inner.children.values_mut() {
            match slot {
                ChildSlot::One(slot) => {
                    slot.detached = None;
                    if let Some(child) = &slot.child {
                        if !child.destroyed() {
                            child.commit()?;
                        }
                    }
                }
                ChildSlot::Many(slot) => {
                    slot.detached.clear();
                    for child in &slot.items {
                        if !child.destroyed() {
                            child.commit()?;
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// Rebase without a write: adopt the current in-memory state as the new
    /// zero-point.
    ///
    /// Identical clearing to [`Document::commit`], except
    /// [`previous_changes`](Document::previous_changes) is left untouched
    /// and no lifecycle promotion happens, since no write occurred.
    ///
    /// # Errors
    ///
    /// * [`Error::DocumentDestroyed`] if the document is destroyed.
    pub fn move_changes(&self) -> Result<(), Error> {
        self.ensure_mutable()?;
        let mut inner = self.inner.borrow_mut();
        debug!("move_changes: adopting current state as baseline");
        inner.attributes.discard_changes();
        for slot in inner.children.values_mut() {
            match slot {
                ChildSlot::One(slot) => {
                    slot.detached = None;
                    if let Some(child) = &slot.child {
                        if !child.destroyed() {
                            child.move_changes()?;
                        }
                    }
                }
                ChildSlot::Many(slot) => {
                    slot.detached.clear();
                    for child in &slot.items {
                        if !child.destroyed() {
                            child.move_changes()?;
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// Destroy the document and its whole embedded subtree.
    ///
    /// The change record is discarded without populating
    /// [`previous_changes`](Document::previous_changes); any further
    /// mutation attempt fails with [`Error::DocumentDestroyed`]. Reading
    /// stays allowed. Idempotent.
    pub fn destroy(&self) {
        let mut inner = self.inner.borrow_mut();
        if inner.state == Lifecycle::Destroyed {
            return;
        }
        debug!("destroying document");
        inner.state = Lifecycle::Destroyed;
        inner.attributes.discard_changes();
        for slot in inner.children.values_mut() {
            match slot {
                ChildSlot::One(slot) => {
                    slot.detached = None;
                    if let Some(child) = &slot.child {
                        child.destroy();
                    }
                }
                ChildSlot::Many(slot) => {
                    slot.detached.clear();
                    for child in &slot.items {
                        child.destroy();
                    }
                }
            }
        }
    }

    /// Replace the document's state with freshly-fetched storage state.
    ///
    /// The loaded map becomes the new baseline and every uncommitted
    /// in-memory change is discarded, children included (the association
    /// layer re-attaches loaded children afterwards). When storage no
    /// longer has the document, `policy` decides between surfacing
    /// [`Error::DocumentNotFound`] and reinitializing as a fresh empty
    /// document.
    ///
    /// # Errors
    ///
    /// * [`Error::DocumentDestroyed`] if the document is destroyed.
    /// * [`Error::UnknownField`] if a loaded attribute is not declared.
    /// * [`Error::DocumentNotFound`] under [`ReloadPolicy::Error`] with no
    ///   replacement state.
    pub fn reload(&self, attrs: Option<ValueMap>, policy: ReloadPolicy) -> Result<(), Error> {
        self.ensure_mutable()?;
        match attrs {
            Some(attrs) => {
                let attrs = canonicalize(&self.schema(), attrs)?;
                let mut inner = self.inner.borrow_mut();
                debug!("reload: adopting fresh storage state");
                inner.attributes.reset_to(attrs);
                inner.state = Lifecycle::Loaded;
                clear_children(&mut inner);
                Ok(())
            }
            None => match policy {
                ReloadPolicy::Error => Err(Error::DocumentNotFound),
                ReloadPolicy::Reset => {
                    let schema = self.schema();
                    let attributes = build_new_attributes(&schema, ValueMap::default())?;
                    let mut inner = self.inner.borrow_mut();
                    debug!("reload: document gone, reinitializing as new");
                    inner.attributes = attributes;
                    inner.state = Lifecycle::New;
                    inner.previous_changes.clear();
                    clear_children(&mut inner);
                    Ok(())
                }
            },
        }
    }
}
