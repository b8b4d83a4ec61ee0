//! Single-field declarations: name, alias, and default-value policy.

use alloc::string::String;

use crate::value::{Value, ValueMap};

/// Default-value policy for a declared field.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum FieldDefault {
    /// No default; an unwritten field reads as [`Value::Null`].
    #[default]
    None,
    /// A fixed value cloned into the document when the field is resolved.
    Static(Value),
    /// A value computed from the already-resolved attribute map, so it can
    /// depend on other fields.
    Computed(fn(&ValueMap) -> Value),
}

impl FieldDefault {
    /// Produce the default value against the given attribute map.
    pub(crate) fn materialize(&self, attrs: &ValueMap) -> Value {
        match self {
            FieldDefault::None => Value::Null,
            FieldDefault::Static(value) => value.deep_clone(),
            FieldDefault::Computed(compute) => compute(attrs),
        }
    }
}

/// Declaration of one document field.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSpec {
    /// Canonical field name.
    name: String,
    /// Optional alias addressing the same underlying field.
    alias: Option<String>,
    /// Default-value policy.
    default: FieldDefault,
}

impl FieldSpec {
    /// Declare a field with no alias and no default.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            alias: None,
            default: FieldDefault::None,
        }
    }

    /// Add an alias under which the same field is addressable.
    ///
    /// Alias and canonical name share a single change entry.
    #[must_use]
    pub fn aliased(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// Give the field a fixed default value.
    #[must_use]
    pub fn default_value(mut self, value: Value) -> Self {
        self.default = FieldDefault::Static(value);
        self
    }

    /// Give the field a default computed from the resolved attribute map.
    #[must_use]
    pub fn computed_default(mut self, compute: fn(&ValueMap) -> Value) -> Self {
        self.default = FieldDefault::Computed(compute);
        self
    }

    /// The canonical field name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The alias, if one is declared.
    #[must_use]
    pub fn alias(&self) -> Option<&str> {
        self.alias.as_deref()
    }

    /// The default-value policy.
    #[must_use]
    pub fn default(&self) -> &FieldDefault {
        &self.default
    }
}
