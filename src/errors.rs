//! Submodule defining the errors used across the crate.

use alloc::string::String;

/// Errors that can occur while tracking and committing document changes.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// The field was excluded from the loaded projection and has not been
    /// written since, so no value (and no baseline) exists to read.
    #[error("Attribute `{0}` was not loaded in this projection")]
    MissingAttribute(String),
    /// The document is destroyed; no further mutation is possible.
    #[error("Document is destroyed and can no longer be mutated")]
    DocumentDestroyed,
    /// The field is not declared by the document's schema.
    #[error("Unknown field `{0}` for this schema")]
    UnknownField(String),
    /// A reload found no replacement state for the document.
    #[error("Document was not found during reload")]
    DocumentNotFound,
    /// The child being detached is not present under the named field.
    #[error("No embedded child to remove under `{0}`")]
    ChildNotFound(String),
    /// The document is already owned by a parent and cannot be embedded again.
    #[error("Document is already embedded in a parent")]
    AlreadyEmbedded,
    /// Embedding the document under the named field would make it own one of
    /// its own ancestors.
    #[error("Embedding under `{0}` would create an ownership cycle")]
    EmbedCycle(String),
    /// The field is declared as a plain attribute and cannot hold embedded
    /// children.
    #[error("Field `{0}` is declared as an attribute and cannot embed children")]
    EmbedConflict(String),
}
