//! Error types for model loading and per-request inference.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Boxed error returned by pluggable model backends.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Pipeline stage a [`VerifyError`] originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Normalize,
    Extract,
    Scale,
    Classify,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Normalize => write!(f, "normalize"),
            Stage::Extract => write!(f, "extract"),
            Stage::Scale => write!(f, "scale"),
            Stage::Classify => write!(f, "classify"),
        }
    }
}

/// Failure of a single inference request.
#[derive(Error, Debug)]
pub enum VerifyError {
    /// The file is missing, unreadable, or not a decodable image.
    #[error("cannot decode image {}: {source}", path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    /// Decoded image has a channel layout other than gray, RGB or RGBA.
    #[error("unsupported channel layout {color:?} ({channels} channels)")]
    UnsupportedFormat {
        color: image::ColorType,
        channels: u8,
    },

    /// Feature vector length disagrees with the fitted scaler.
    #[error("feature vector has {actual} dimensions, scaler was fitted on {expected}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Embedding or classification backend failed.
    #[error("{stage} model failed: {context}: {source}")]
    ModelInference {
        stage: Stage,
        context: String,
        #[source]
        source: BoxError,
    },

    /// Internal tensor could not be assembled in the expected shape.
    #[error("{stage}: tensor shape error")]
    Tensor {
        stage: Stage,
        #[source]
        source: ndarray::ShapeError,
    },
}

impl VerifyError {
    /// Stage tag used by callers when logging or reporting the failure.
    pub fn stage(&self) -> Stage {
        match self {
            VerifyError::Decode { .. } | VerifyError::UnsupportedFormat { .. } => Stage::Normalize,
            VerifyError::DimensionMismatch { .. } => Stage::Scale,
            VerifyError::ModelInference { stage, .. } | VerifyError::Tensor { stage, .. } => *stage,
        }
    }

    pub(crate) fn model(stage: Stage, context: impl Into<String>, source: impl Into<BoxError>) -> Self {
        VerifyError::ModelInference {
            stage,
            context: context.into(),
            source: source.into(),
        }
    }
}

/// Fatal start-up failure. The process must not serve requests after one.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("failed to read {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("invalid model bundle: {0}")]
    InvalidBundle(String),

    #[error("failed to load embedding model {}", path.display())]
    Embedding {
        path: PathBuf,
        #[source]
        source: BoxError,
    },

    #[error("embedding model produces {actual} features but the bundle expects {expected}")]
    ProbeMismatch { expected: usize, actual: usize },

    #[error("start-up probe of the embedding model failed")]
    Probe(#[source] VerifyError),
}
