//! Attribute storage fused with the snapshot-capture policy.
//!
//! [`Attributes`] owns a document's live attribute map and decides, per read
//! and per write, when to capture a baseline clone:
//!
//! - A direct write captures the pre-write live value (resolving the field's
//!   default first, so "changed from default" compares against the default
//!   rather than null) before the new value lands.
//! - A read-for-mutation captures a tentative baseline *before* the live,
//!   aliasable value is handed out, because the in-place mutation itself
//!   cannot be intercepted. The entry stays invisible until the live value
//!   actually diverges.
//! - A plain read never dirties anything; it materializes defaults lazily
//!   into the live map so later writes baseline against them.
//!
//! Partial projections are honored asymmetrically, on purpose: reading a
//! field excluded from the projection raises
//! [`MissingAttribute`](crate::Error::MissingAttribute), while writing one
//! succeeds and establishes an "unknown" (null) baseline, which counts as
//! changed.

use alloc::string::String;
use alloc::vec::Vec;

use log::trace;

use crate::changeset::{ChangeMap, ChangeSet};
use crate::errors::Error;
use crate::schema::Schema;
use crate::value::{Value, ValueMap};

/// Set of field names loaded by a partial projection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Projection {
    fields: hashbrown::HashSet<String>,
}

impl Projection {
    /// Build a projection from the loaded field names.
    pub fn new<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fields: fields.into_iter().map(Into::into).collect(),
        }
    }

    /// Whether the named field was loaded.
    #[must_use]
    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains(field)
    }
}

/// Per-document attribute store and snapshot tracker.
#[derive(Debug, Clone, Default)]
pub struct Attributes {
    /// Live attribute values.
    values: ValueMap,
    /// Loaded-field restriction, if the document came from a partial read.
    projection: Option<Projection>,
    /// Baselines for the current dirty episode.
    changes: ChangeSet,
}

impl Attributes {
    /// Build a store over a full attribute map.
    #[must_use]
    pub fn from_map(values: ValueMap) -> Self {
        Self {
            values,
            projection: None,
            changes: ChangeSet::new(),
        }
    }

    /// Build a store over a partially-projected attribute map.
    #[must_use]
    pub fn with_projection(values: ValueMap, projection: Projection) -> Self {
        Self {
            values,
            projection: Some(projection),
            changes: ChangeSet::new(),
        }
    }

    /// Borrow the live attribute map.
    #[must_use]
    pub fn values(&self) -> &ValueMap {
        &self.values
    }

    /// Mutably borrow a live value by canonical name.
    pub(crate) fn value_mut(&mut self, canonical: &str) -> Option<&mut Value> {
        self.values.get_mut(canonical)
    }

    /// Insert a value without touching change tracking.
    ///
    /// Used for applying defaults at construction time and for loading.
    pub(crate) fn insert_untracked(&mut self, canonical: &str, value: Value) {
        self.values.insert(canonical.into(), value);
    }

    /// Whether a value (or the right to read one) exists for the field:
    /// either the projection loaded it, or it was written since.
    fn is_loaded(&self, canonical: &str) -> bool {
        self.values.contains_key(canonical)
            || self.projection.as_ref().is_none_or(|p| p.contains(canonical))
    }

    fn resolve<'s>(schema: &'s Schema, field: &str) -> Result<&'s str, Error> {
        schema.resolve(field).ok_or_else(|| Error::UnknownField(field.into()))
    }

    /// Read a field's value.
    ///
    /// Resolves the field's default lazily on first read, materializing it
    /// into the live map so later writes baseline against it. Reading never
    /// creates a change entry.
    ///
    /// # Errors
    ///
    /// * [`Error::UnknownField`] if the schema does not declare the field.
    /// * [`Error::MissingAttribute`] if the field was excluded from the
    ///   loaded projection and has not been written since.
    pub fn read(&mut self, schema: &Schema, field: &str) -> Result<Value, Error> {
        let canonical = Self::resolve(schema, field)?;
        if !self.is_loaded(canonical) {
            return Err(Error::MissingAttribute(canonical.into()));
        }
        if let Some(value) = self.values.get(canonical) {
            return Ok(value.deep_clone());
        }
        let default = schema
            .default_for(canonical, &self.values)
            .unwrap_or(Value::Null);
        self.values.insert(canonical.into(), default.deep_clone());
        Ok(default)
    }

    /// The baseline a write to this field must be compared against: the
    /// cached episode original if one exists, else the pre-write live value
    /// (default-resolved), else null for a projected-out field whose prior
    /// state is unknown.
    fn pre_write_baseline(&self, schema: &Schema, canonical: &str) -> Value {
        if let Some(original) = self.changes.original(canonical) {
            return original.deep_clone();
        }
        if let Some(live) = self.values.get(canonical) {
            return live.deep_clone();
        }
        if self.is_loaded(canonical) {
            return schema
                .default_for(canonical, &self.values)
                .unwrap_or(Value::Null);
        }
        Value::Null
    }

    /// Write a field's value, capturing the baseline first.
    ///
    /// Writing a value structurally equal to the episode baseline erases the
    /// entry: set-then-set-back is a no-op change.
    ///
    /// # Errors
    ///
    /// * [`Error::UnknownField`] if the schema does not declare the field.
    pub fn write(&mut self, schema: &Schema, field: &str, value: Value) -> Result<(), Error> {
        let canonical = Self::resolve(schema, field)?;
        let baseline = self.pre_write_baseline(schema, canonical);

        if baseline == value {
            self.changes.discard(canonical);
        } else if !self.changes.contains(canonical) {
            trace!("capturing baseline for `{canonical}`");
            self.changes.record(canonical, baseline);
        }

        self.values.insert(canonical.into(), value);
        Ok(())
    }

    /// Declare that a field's container value is about to be mutated in
    /// place, capturing a tentative baseline before the live reference is
    /// handed out.
    ///
    /// Materializes the field's default first if no live value exists, so
    /// the returned container is the live, aliasable one.
    ///
    /// # Errors
    ///
    /// Same conditions as [`Attributes::read`]: reading-for-mutation is
    /// still a read.
    pub fn declare(&mut self, schema: &Schema, field: &str) -> Result<(), Error> {
        let canonical = Self::resolve(schema, field)?;
        if !self.is_loaded(canonical) {
            return Err(Error::MissingAttribute(canonical.into()));
        }
        if !self.values.contains_key(canonical) {
            let default = schema
                .default_for(canonical, &self.values)
                .unwrap_or(Value::Null);
            self.values.insert(canonical.into(), default);
        }
        if !self.changes.contains(canonical) {
            let baseline = self.values.get(canonical).map(Value::deep_clone);
            if let Some(baseline) = baseline {
                trace!("capturing tentative baseline for `{canonical}`");
                self.changes.record(canonical, baseline);
            }
        }
        Ok(())
    }

    /// Restore a field to its episode baseline and drop the entry.
    ///
    /// A field with no entry is left untouched.
    ///
    /// # Errors
    ///
    /// * [`Error::UnknownField`] if the schema does not declare the field.
    pub fn revert(&mut self, schema: &Schema, field: &str) -> Result<(), Error> {
        let canonical = Self::resolve(schema, field)?;
        if let Some(original) = self.changes.discard(canonical) {
            self.values.insert(canonical.into(), original);
        }
        Ok(())
    }

    /// Whether the field is effectively changed.
    #[must_use]
    pub fn is_changed(&self, schema: &Schema, field: &str) -> bool {
        schema
            .resolve(field)
            .is_some_and(|canonical| self.changes.is_changed(canonical, &self.values))
    }

    /// The `(original, current)` pair for a field, if effectively changed.
    #[must_use]
    pub fn change(&self, schema: &Schema, field: &str) -> Option<(Value, Value)> {
        let canonical = schema.resolve(field)?;
        self.changes.change(canonical, &self.values)
    }

    /// The value the field held when its dirty episode began, or its current
    /// value when clean. `None` for unknown or unreadable fields.
    #[must_use]
    pub fn was(&mut self, schema: &Schema, field: &str) -> Option<Value> {
        let canonical = schema.resolve(field)?;
        if let Some(original) = self.changes.original(canonical) {
            return Some(original.deep_clone());
        }
        self.read(schema, canonical).ok()
    }

    /// Effectively changed field names, in first-recorded order.
    #[must_use]
    pub fn changed_fields(&self) -> Vec<&str> {
        self.changes.changed_fields(&self.values)
    }

    /// All effective changes, in first-recorded order.
    #[must_use]
    pub fn changes(&self) -> ChangeMap {
        self.changes.changes(&self.values)
    }

    /// Whether any field is effectively changed.
    #[must_use]
    pub fn has_changes(&self) -> bool {
        self.changes.has_changes(&self.values)
    }

    /// Snapshot the effective changes and rebase: the live map becomes the
    /// new baseline.
    pub fn take_changes(&mut self) -> ChangeMap {
        self.changes.take_changes(&self.values)
    }

    /// Rebase without snapshotting: the live map becomes the new baseline
    /// and the change record is discarded.
    pub fn discard_changes(&mut self) {
        self.changes.clear();
    }

    /// Replace the live map wholesale (reload), clearing the change record
    /// and any projection restriction.
    pub fn reset_to(&mut self, values: ValueMap) {
        self.values = values;
        self.projection = None;
        self.changes.clear();
    }

    /// Deep-cloned attribute map with every declared default materialized,
    /// suitable as a full insert payload.
    pub fn resolved_values(&mut self, schema: &Schema) -> ValueMap {
        for name in schema.field_names().map(String::from).collect::<Vec<_>>() {
            if !self.values.contains_key(&name) && self.is_loaded(&name) {
                let default = schema
                    .default_for(&name, &self.values)
                    .unwrap_or(Value::Null);
                if !default.is_null() {
                    self.values.insert(name, default);
                }
            }
        }
        self.values
            .iter()
            .map(|(k, v)| (k.clone(), v.deep_clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::FieldSpec;

    fn schema() -> Schema {
        Schema::new()
            .field(FieldSpec::new("title").aliased("headline"))
            .field(FieldSpec::new("age").default_value(Value::Integer(100)))
    }

    #[test]
    fn test_write_baselines_against_default() {
        let schema = schema();
        let mut attrs = Attributes::from_map(ValueMap::default());

        attrs.write(&schema, "age", Value::Integer(50)).unwrap();
        assert_eq!(
            attrs.change(&schema, "age"),
            Some((Value::Integer(100), Value::Integer(50))),
        );
    }

    #[test]
    fn test_alias_shares_the_change_entry() {
        let schema = schema();
        let mut attrs = Attributes::from_map(ValueMap::from_iter([(
            "title".into(),
            Value::from("Grand Poobah"),
        )]));

        attrs.write(&schema, "headline", Value::from("Captain Obvious")).unwrap();
        assert_eq!(attrs.changed_fields(), ["title"]);
        assert_eq!(
            attrs.change(&schema, "headline"),
            Some((Value::from("Grand Poobah"), Value::from("Captain Obvious"))),
        );
    }

    #[test]
    fn test_projected_out_field_read_raises_write_succeeds() {
        let schema = schema();
        let mut attrs = Attributes::with_projection(
            ValueMap::from_iter([("title".into(), Value::from("x"))]),
            Projection::new(["title"]),
        );

        assert_eq!(
            attrs.read(&schema, "age"),
            Err(Error::MissingAttribute("age".into())),
        );
        assert_eq!(
            attrs.declare(&schema, "age"),
            Err(Error::MissingAttribute("age".into())),
        );

        // The write establishes an "unknown" baseline, which counts as changed.
        attrs.write(&schema, "age", Value::Integer(7)).unwrap();
        assert_eq!(
            attrs.change(&schema, "age"),
            Some((Value::Null, Value::Integer(7))),
        );
        assert_eq!(attrs.read(&schema, "age"), Ok(Value::Integer(7)));
    }

    #[test]
    fn test_read_materializes_default_without_dirtying() {
        let schema = schema();
        let mut attrs = Attributes::from_map(ValueMap::default());

        assert_eq!(attrs.read(&schema, "age"), Ok(Value::Integer(100)));
        assert!(!attrs.has_changes());

        attrs.write(&schema, "age", Value::Integer(100)).unwrap();
        assert!(!attrs.has_changes());
    }

    #[test]
    fn test_revert_restores_the_baseline() {
        let schema = schema();
        let mut attrs = Attributes::from_map(ValueMap::from_iter([(
            "title".into(),
            Value::from("Grand Poobah"),
        )]));

        attrs.write(&schema, "title", Value::from("Captain Obvious")).unwrap();
        attrs.revert(&schema, "title").unwrap();

        assert!(!attrs.has_changes());
        assert_eq!(attrs.read(&schema, "title"), Ok(Value::from("Grand Poobah")));
    }
}
