#![doc = include_str!("../README.md")]
#![no_std]
#![deny(clippy::mod_module_files)]
#![allow(private_bounds, private_interfaces)]

extern crate alloc;

pub mod changeset;
pub mod delta;
pub mod document;
pub mod errors;
pub mod schema;
pub mod snapshot;
pub mod value;

// Re-export main types
pub use changeset::{ChangeMap, ChangeSet};
pub use delta::Delta;
pub use document::{Document, Lifecycle, ReloadPolicy};
pub use schema::{FieldDefault, FieldSpec, Schema};
pub use snapshot::{Attributes, Projection};
pub use value::{OpaqueHandle, Value, ValueMap};

// Re-export errors
pub use errors::Error;
