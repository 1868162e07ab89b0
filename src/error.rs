//! Errors of the scene assembly step.

/// Raised when a loaded model cannot be bound to the portal materials.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum AssemblyError {
    /// One or more expected top-level children are absent from the model.
    #[error("model is missing sub-meshes named {names:?}")]
    MissingMesh { names: Vec<String> },

    /// An expected name matched more than one top-level child.
    #[error("model has {count} sub-meshes named {name:?}, expected exactly one")]
    DuplicateMesh { name: String, count: usize },
}
