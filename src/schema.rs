//! Document schema: the field-declaration source consumed by the tracker.
//!
//! A [`Schema`] lists the fields a document type declares, in declaration
//! order, together with each field's default-value policy and optional alias.
//! The tracker consumes it for three things: rejecting unknown fields,
//! resolving an alias and its canonical name to the same change entry, and
//! establishing the baseline a first write is compared against.

use alloc::string::String;

use crate::value::{IndexMap, Value, ValueMap};

mod field;

pub use field::{FieldDefault, FieldSpec};

/// Ordered collection of field declarations for one document type.
///
/// # Example
///
/// ```
/// use doc_delta_rs::{FieldSpec, Schema, Value};
///
/// let schema = Schema::new()
///     .field(FieldSpec::new("title").aliased("headline"))
///     .field(FieldSpec::new("age").default_value(Value::Integer(100)));
///
/// assert_eq!(schema.resolve("headline"), Some("title"));
/// assert_eq!(schema.resolve("title"), Some("title"));
/// assert_eq!(schema.resolve("nope"), None);
/// ```
#[derive(Debug, Clone, Default)]
pub struct Schema {
    /// Declared fields, keyed by canonical name, in declaration order.
    fields: IndexMap<String, FieldSpec>,
    /// Alias name -> canonical name.
    aliases: IndexMap<String, String>,
}

impl Schema {
    /// Create an empty schema.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a field.
    ///
    /// Re-declaring a name replaces the previous declaration; the field
    /// keeps its original position in declaration order.
    #[must_use]
    pub fn field(mut self, spec: FieldSpec) -> Self {
        if let Some(alias) = spec.alias() {
            self.aliases.insert(alias.into(), spec.name().into());
        }
        self.fields.insert(spec.name().into(), spec);
        self
    }

    /// Resolve a canonical name or alias to the canonical field name.
    ///
    /// The returned name borrows from the schema, not from `name`.
    #[must_use]
    pub fn resolve(&self, name: &str) -> Option<&str> {
        if let Some((key, _)) = self.fields.get_key_value(name) {
            return Some(key.as_str());
        }
        self.aliases.get(name).map(String::as_str)
    }

    /// Look up a field declaration by canonical name or alias.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&FieldSpec> {
        self.resolve(name).and_then(|canonical| self.fields.get(canonical))
    }

    /// Whether the schema declares the given name (canonical or alias).
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.resolve(name).is_some()
    }

    /// Canonical field names in declaration order.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// Field declarations in declaration order.
    pub fn specs(&self) -> impl Iterator<Item = &FieldSpec> {
        self.fields.values()
    }

    /// Number of declared fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the schema declares no fields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Materialize the default for a declared field against the given
    /// attribute map, if the field has one.
    pub(crate) fn default_for(&self, canonical: &str, attrs: &ValueMap) -> Option<Value> {
        self.fields.get(canonical).map(|spec| spec.default().materialize(attrs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alias_resolves_to_canonical() {
        let schema = Schema::new().field(FieldSpec::new("title").aliased("headline"));
        assert_eq!(schema.resolve("headline"), Some("title"));
        assert!(schema.contains("headline"));
        assert_eq!(schema.get("headline").map(FieldSpec::name), Some("title"));
    }

    #[test]
    fn test_declaration_order_is_kept() {
        let schema = Schema::new()
            .field(FieldSpec::new("b"))
            .field(FieldSpec::new("a"))
            .field(FieldSpec::new("c"));
        let names: alloc::vec::Vec<&str> = schema.field_names().collect();
        assert_eq!(names, ["b", "a", "c"]);
    }

    #[test]
    fn test_computed_default_sees_resolved_attributes() {
        fn double_age(attrs: &ValueMap) -> Value {
            let age = attrs.get("age").and_then(Value::as_integer).unwrap_or(0);
            Value::Integer(age * 2)
        }

        let schema = Schema::new()
            .field(FieldSpec::new("age").default_value(Value::Integer(100)))
            .field(FieldSpec::new("double_age").computed_default(double_age));

        let attrs = ValueMap::from_iter([("age".into(), Value::Integer(21))]);
        assert_eq!(schema.default_for("double_age", &attrs), Some(Value::Integer(42)));
        assert_eq!(schema.default_for("age", &ValueMap::default()), Some(Value::Integer(100)));
    }
}
