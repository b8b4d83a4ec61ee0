//! Tests for the document lifecycle: commit, rebase without write, destroy,
//! reload, and partial projections.
//!
//! This module tests:
//! - Commit rebasing the baseline and populating previous changes
//! - A failed persist (no commit call) preserving the change record
//! - Destroy discarding tracking and freezing the document
//! - Reload policies when storage no longer has the document
//! - The read/write asymmetry of partially-projected fields

use doc_delta_rs::{
    Delta, Document, Error, FieldSpec, Lifecycle, Projection, ReloadPolicy, Schema, Value,
    ValueMap,
};

fn person_schema() -> Schema {
    Schema::new()
        .field(FieldSpec::new("title"))
        .field(FieldSpec::new("age").default_value(Value::Integer(100)))
}

fn address_schema() -> Schema {
    Schema::new().field(FieldSpec::new("street"))
}

fn attrs(pairs: &[(&str, Value)]) -> ValueMap {
    pairs
        .iter()
        .map(|(field, value)| (String::from(*field), value.deep_clone()))
        .collect()
}

fn loaded_person() -> Document {
    Document::instantiate(
        person_schema(),
        attrs(&[("title", Value::from("Grand Poobah"))]),
    )
    .unwrap()
}

// =============================================================================
// Commit
// =============================================================================

#[test]
fn test_commit_rebases_and_populates_previous_changes() {
    let doc = loaded_person();
    doc.set("title", "Captain Obvious").unwrap();

    doc.commit().unwrap();

    assert!(!doc.changed());
    assert!(doc.changes().is_empty());
    assert_eq!(doc.state(), Lifecycle::Persisted);
    assert_eq!(
        doc.previous_changes().get("title"),
        Some(&(Value::from("Grand Poobah"), Value::from("Captain Obvious"))),
    );
    // The new baseline is the committed value.
    doc.set("title", "Grand Poobah").unwrap();
    assert_eq!(
        doc.attribute_change("title"),
        Some((Value::from("Captain Obvious"), Value::from("Grand Poobah"))),
    );
}

#[test]
fn test_previous_changes_stay_stable_until_the_next_commit() {
    let doc = loaded_person();
    doc.set("title", "Captain Obvious").unwrap();
    doc.commit().unwrap();
    let first = doc.previous_changes();

    // New uncommitted mutations do not disturb the last commit's snapshot.
    doc.set("title", "Dark Helmet").unwrap();
    assert_eq!(doc.previous_changes(), first);

    doc.commit().unwrap();
    assert_ne!(doc.previous_changes(), first);
}

#[test]
fn test_first_commit_of_a_new_document_rebases_identically() {
    let doc = Document::new(
        person_schema(),
        attrs(&[("title", Value::from("Grand Poobah"))]),
    )
    .unwrap();
    assert!(doc.is_new());

    doc.commit().unwrap();

    assert_eq!(doc.state(), Lifecycle::Persisted);
    assert!(!doc.changed());
    assert_eq!(
        doc.previous_changes().get("title"),
        Some(&(Value::Null, Value::from("Grand Poobah"))),
    );
}

#[test]
fn test_commit_promotes_and_cleans_attached_children() {
    let doc = loaded_person();
    let child = Document::new(
        address_schema(),
        attrs(&[("street", Value::from("Koreatown"))]),
    )
    .unwrap();
    doc.push_child("addresses", &child).unwrap();
    assert!(doc.changed());

    doc.commit().unwrap();

    assert_eq!(child.state(), Lifecycle::Persisted);
    assert!(!doc.changed());
    assert!(Delta::build(&doc).is_empty());
}

#[test]
fn test_failed_persist_preserves_the_change_record() {
    let doc = loaded_person();
    doc.set("title", "Captain Obvious").unwrap();

    // The persistence layer built its payload but the write failed, so it
    // never calls commit. Everything stays dirty for the retry.
    let payload = Delta::build(&doc);
    assert!(!payload.is_empty());

    assert!(doc.changed());
    assert_eq!(Delta::build(&doc), payload);
    assert!(doc.previous_changes().is_empty());
}

// =============================================================================
// Rebase without write
// =============================================================================

#[test]
fn test_move_changes_rebases_without_previous_changes() {
    let doc = loaded_person();
    doc.set("title", "Captain Obvious").unwrap();

    doc.move_changes().unwrap();

    assert!(!doc.changed());
    assert!(doc.previous_changes().is_empty());
    assert_eq!(doc.state(), Lifecycle::Loaded);
    // The adopted state is the new comparison point.
    doc.set("title", "Grand Poobah").unwrap();
    assert_eq!(
        doc.attribute_change("title"),
        Some((Value::from("Captain Obvious"), Value::from("Grand Poobah"))),
    );
}

// =============================================================================
// Destroy
// =============================================================================

#[test]
fn test_destroy_discards_tracking_and_freezes_the_document() {
    let doc = loaded_person();
    doc.set("title", "Captain Obvious").unwrap();

    doc.destroy();

    assert_eq!(doc.state(), Lifecycle::Destroyed);
    assert!(doc.previous_changes().is_empty());
    assert!(!doc.changed());
    assert_eq!(doc.set("title", "x"), Err(Error::DocumentDestroyed));
    assert_eq!(doc.will_change("title"), Err(Error::DocumentDestroyed));
    assert_eq!(doc.commit(), Err(Error::DocumentDestroyed));
    // Reading stays allowed on the frozen document.
    assert_eq!(doc.get("title"), Ok(Value::from("Captain Obvious")));
}

#[test]
fn test_destroy_recurses_into_the_subtree() {
    let doc = loaded_person();
    let child = Document::instantiate(
        address_schema(),
        attrs(&[("street", Value::from("Koreatown"))]),
    )
    .unwrap();
    doc.load_child("residence", &child).unwrap();

    doc.destroy();

    assert!(child.destroyed());
    assert_eq!(child.set("street", "x"), Err(Error::DocumentDestroyed));
}

// =============================================================================
// Reload
// =============================================================================

#[test]
fn test_reload_adopts_fresh_storage_state_unconditionally() {
    let doc = loaded_person();
    doc.set("title", "Captain Obvious").unwrap();

    doc.reload(
        Some(attrs(&[("title", Value::from("Dark Helmet"))])),
        ReloadPolicy::Error,
    )
    .unwrap();

    assert!(!doc.changed());
    assert_eq!(doc.get("title"), Ok(Value::from("Dark Helmet")));
    assert_eq!(doc.state(), Lifecycle::Loaded);
}

#[test]
fn test_reload_not_found_policies() {
    let doc = loaded_person();
    doc.set("title", "Captain Obvious").unwrap();

    assert_eq!(
        doc.reload(None, ReloadPolicy::Error),
        Err(Error::DocumentNotFound),
    );
    // The failed reload left everything in place.
    assert!(doc.changed());

    doc.reload(None, ReloadPolicy::Reset).unwrap();
    assert_eq!(doc.state(), Lifecycle::New);
    assert!(!doc.changed());
    // Defaults apply to the reinitialized document.
    assert_eq!(doc.get("age"), Ok(Value::Integer(100)));
    assert_eq!(doc.get("title"), Ok(Value::Null));
}

#[test]
fn test_reload_detaches_children() {
    let doc = loaded_person();
    let child = Document::instantiate(
        address_schema(),
        attrs(&[("street", Value::from("Koreatown"))]),
    )
    .unwrap();
    doc.load_child("residence", &child).unwrap();

    doc.reload(
        Some(attrs(&[("title", Value::from("Dark Helmet"))])),
        ReloadPolicy::Error,
    )
    .unwrap();

    assert!(!child.is_embedded());
    assert_eq!(doc.child("residence"), None);
}

// =============================================================================
// Partial projections
// =============================================================================

#[test]
fn test_projected_out_fields_raise_on_read_but_accept_writes() {
    let doc = Document::instantiate_with_projection(
        person_schema(),
        attrs(&[("title", Value::from("Grand Poobah"))]),
        Projection::new(["title"]),
    )
    .unwrap();

    assert_eq!(doc.get("age"), Err(Error::MissingAttribute("age".into())));
    assert_eq!(doc.get_mut("age").err(), Some(Error::MissingAttribute("age".into())));

    // A write establishes an "unknown" baseline, which counts as changed.
    doc.set("age", 50).unwrap();
    assert_eq!(
        doc.attribute_change("age"),
        Some((Value::Null, Value::Integer(50))),
    );
    assert_eq!(doc.get("age"), Ok(Value::Integer(50)));

    // Projected-in fields behave normally.
    assert_eq!(doc.get("title"), Ok(Value::from("Grand Poobah")));
}
