//! Error Handling Module
//!
//! Defines the error type shared by every architecture builder.
//! Uses thiserror for ergonomic error definitions.

use thiserror::Error;

use crate::model::shape::FeatureShape;

/// Main error type for model construction
#[derive(Error, Debug)]
pub enum ZooError {
    /// A meta-parameter is outside its supported range
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The input shape cannot be carried through the architecture
    #[error("Invalid input shape: {0}")]
    InvalidShape(String),

    /// The two branches of a residual block disagree before the merge
    #[error("Shape mismatch in {block}: shortcut {shortcut} vs main branch {main}")]
    ShapeMismatch {
        block: String,
        shortcut: FeatureShape,
        main: FeatureShape,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for ZooError {
    fn from(err: serde_json::Error) -> Self {
        ZooError::Serialization(err.to_string())
    }
}

/// Convenience Result type for model construction
pub type Result<T, E = ZooError> = std::result::Result<T, E>;
