//! Error types for the data pipeline and the policy wrappers.
//!
//! Each failure here is deterministic: the same file, index and
//! seed fail the same way every time, so nothing retries.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by the joint-space normalizer.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum NormalizerError {
    #[error("normalization bounds are empty")]
    EmptyBounds,

    /// min >= max would divide by zero in transform
    #[error("degenerate bounds in dimension {dim}: min {min} must be < max {max}")]
    DegenerateBounds { dim: usize, min: f32, max: f32 },

    #[error("expected {expected} joint values, got {got}")]
    DimensionMismatch { expected: usize, got: usize },
}

/// Data contract violations while assembling one training example.
#[derive(Error, Debug)]
pub enum SampleError {
    #[error("episode index {index} out of range for {len} files")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("start timestep {start} is past the episode end ({len} steps)")]
    StartOutOfRange { start: usize, len: usize },

    #[error("episode '{}' has no non-empty streams", path.display())]
    EmptyEpisode { path: PathBuf },

    #[error("episode '{}' is missing required stream '{key}'", path.display())]
    MissingStream { path: PathBuf, key: String },

    #[error("required camera '{camera}' not among the sampled streams")]
    MissingCamera { camera: String },

    #[error("{field} shape mismatch: expected {expected:?}, got {got:?}")]
    ShapeMismatch {
        field:    &'static str,
        expected: Vec<usize>,
        got:      Vec<usize>,
    },

    #[error(transparent)]
    Normalizer(#[from] NormalizerError),

    #[error("invalid sampler configuration: {0}")]
    InvalidConfig(String),

    #[error("cannot load episode '{}': {message}", path.display())]
    Load { path: PathBuf, message: String },
}

/// Errors raised while filtering and splitting a task's files.
#[derive(Error, Debug)]
pub enum SplitError {
    #[error("no task registered under the name '{name}' (known: {known})")]
    UnknownTask { name: String, known: String },

    #[error("no episode files in '{}' match task '{task}'", dir.display())]
    NoMatchingFiles { dir: PathBuf, task: String },

    #[error("invalid task pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("train fraction must be within [0, 1], got {0}")]
    InvalidFraction(f64),

    #[error("cannot read dataset directory '{}': {source}", dir.display())]
    Io {
        dir:    PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors raised by the policy wrappers around a backbone.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PolicyError {
    #[error("policy losses need a non-empty batch")]
    EmptyBatch,

    #[error("an action chunk was given without its pad mask")]
    MissingPadMask,

    #[error("training needs a ground-truth action chunk")]
    MissingActions,
}
