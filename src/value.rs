//! Attribute value model shared by documents, change sets and deltas.
//!
//! Change detection is deep *structural* equality, not identity: two
//! distinct containers holding equal elements compare as unchanged. The two
//! non-structural variants are special-cased:
//!
//! - [`Value::Blob`] shares its buffer on clone. The buffer is immutable
//!   behind `Rc<[u8]>`, so the alias can never hide an in-place mutation.
//! - [`Value::Opaque`] wraps an externally-managed handle with no value
//!   semantics. Equality is handle identity, so writing a freshly wrapped
//!   handle over an old one always reports as changed (over-reporting is the
//!   fail-safe direction for values that cannot be compared).

use alloc::rc::Rc;
use alloc::string::{String, ToString};
use alloc::vec::Vec;
use core::any::Any;
use core::fmt;

use indexmap::IndexMap as IndexMapRaw;

/// `IndexMap` alias using hashbrown's default hasher for `no_std` compatibility.
pub(crate) type IndexMap<K, V> = IndexMapRaw<K, V, hashbrown::DefaultHashBuilder>;

/// Insertion-ordered mapping from field name to [`Value`].
///
/// Equality is order-insensitive: two maps are equal when they hold the same
/// keys with equal values, regardless of insertion order. Sequences
/// ([`Value::Array`]) stay order-sensitive.
pub type ValueMap = IndexMap<String, Value>;

/// Externally-managed handle stored in a document without value semantics.
///
/// Cloning aliases the underlying handle and equality is handle identity:
/// two `OpaqueHandle`s are equal only when they wrap the very same
/// allocation. A document field holding one therefore reports as changed
/// whenever a different handle is written over it, even if the wrapped
/// values would compare equal under some external notion of equality.
#[derive(Clone)]
pub struct OpaqueHandle(Rc<dyn Any>);

impl OpaqueHandle {
    /// Wrap an externally-managed value.
    pub fn new<T: Any>(value: T) -> Self {
        Self(Rc::new(value))
    }

    /// Borrow the wrapped value if it is of type `T`.
    #[must_use]
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref()
    }

    /// Whether two handles refer to the same underlying allocation.
    #[must_use]
    pub fn same_handle(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for OpaqueHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("OpaqueHandle(..)")
    }
}

impl PartialEq for OpaqueHandle {
    fn eq(&self, other: &Self) -> bool {
        self.same_handle(other)
    }
}

impl Eq for OpaqueHandle {}

/// A value that can be stored in a document attribute.
#[derive(Debug, Clone, Default)]
pub enum Value {
    /// Absent / SQL-NULL-like marker.
    #[default]
    Null,
    /// Boolean.
    Boolean(bool),
    /// 64-bit signed integer.
    Integer(i64),
    /// IEEE 754 floating point.
    Real(f64),
    /// UTF-8 text.
    Text(String),
    /// Binary blob; shared rather than copied on clone.
    Blob(Rc<[u8]>),
    /// Ordered sequence; equality is order-sensitive.
    Array(Vec<Value>),
    /// Keyed mapping; equality is order-insensitive.
    Map(ValueMap),
    /// Externally-managed handle compared by identity.
    Opaque(OpaqueHandle),
}

impl Value {
    /// Check if the value is Null.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Short name of the variant, for diagnostics.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Boolean(_) => "boolean",
            Value::Integer(_) => "integer",
            Value::Real(_) => "real",
            Value::Text(_) => "text",
            Value::Blob(_) => "blob",
            Value::Array(_) => "array",
            Value::Map(_) => "map",
            Value::Opaque(_) => "opaque",
        }
    }

    /// Borrow the text content, if this is a `Text` value.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// The integer content, if this is an `Integer` value.
    #[must_use]
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Borrow the elements, if this is an `Array` value.
    #[must_use]
    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    /// Mutably borrow the elements, if this is an `Array` value.
    pub fn as_array_mut(&mut self) -> Option<&mut Vec<Value>> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    /// Borrow the entries, if this is a `Map` value.
    #[must_use]
    pub fn as_map(&self) -> Option<&ValueMap> {
        match self {
            Value::Map(map) => Some(map),
            _ => None,
        }
    }

    /// Mutably borrow the entries, if this is a `Map` value.
    pub fn as_map_mut(&mut self) -> Option<&mut ValueMap> {
        match self {
            Value::Map(map) => Some(map),
            _ => None,
        }
    }

    /// Borrow the bytes, if this is a `Blob` value.
    #[must_use]
    pub fn as_blob(&self) -> Option<&[u8]> {
        match self {
            Value::Blob(bytes) => Some(bytes),
            _ => None,
        }
    }

    /// Produce a structurally independent copy of this value.
    ///
    /// Scalars copy, sequences and mappings are rebuilt element by element
    /// at arbitrary nesting depth, and `Blob`/`Opaque` alias their shared
    /// handle: blobs are immutable behind `Rc<[u8]>`, and opaque handles
    /// compare by identity, so neither alias can hide an in-place mutation
    /// from change tracking.
    #[must_use]
    pub fn deep_clone(&self) -> Self {
        match self {
            Value::Null => Value::Null,
            Value::Boolean(b) => Value::Boolean(*b),
            Value::Integer(i) => Value::Integer(*i),
            Value::Real(r) => Value::Real(*r),
            Value::Text(s) => Value::Text(s.clone()),
            Value::Blob(bytes) => Value::Blob(Rc::clone(bytes)),
            Value::Array(items) => Value::Array(items.iter().map(Value::deep_clone).collect()),
            Value::Map(map) => {
                Value::Map(map.iter().map(|(k, v)| (k.clone(), v.deep_clone())).collect())
            }
            Value::Opaque(handle) => Value::Opaque(handle.clone()),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Integer(a), Value::Integer(b)) => a == b,
            // Bit comparison keeps equality total: NaN equals itself, so
            // change detection never sees an incomparable float.
            (Value::Real(a), Value::Real(b)) => a.to_bits() == b.to_bits(),
            (Value::Text(a), Value::Text(b)) => a == b,
            (Value::Blob(a), Value::Blob(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a == b,
            (Value::Map(a), Value::Map(b)) => a == b,
            (Value::Opaque(a), Value::Opaque(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

// From implementations for common types
impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Integer(i64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Real(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Blob(Rc::from(v))
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Value::Array(v)
    }
}

impl From<ValueMap> for Value {
    fn from(v: ValueMap) -> Self {
        Value::Map(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(opt: Option<T>) -> Self {
        match opt {
            Some(v) => v.into(),
            None => Value::Null,
        }
    }
}

mod display;

#[cfg(feature = "serde")]
mod serde;
