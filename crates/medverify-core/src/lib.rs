//! medverify-core — authenticity inference for medicine package images.
//!
//! Provides image normalization, embedding extraction (ONNX Runtime),
//! feature scaling and binary classification, composed into one
//! [`InferencePipeline`] that maps an image path to a [`Verdict`].
//! Also carries the upload intake policy and response shaping used by
//! frontends.

pub mod bundle;
pub mod classifier;
pub mod config;
pub mod error;
pub mod inference;
pub mod intake;
pub mod normalize;
pub mod pipeline;
pub mod report;
pub mod scaler;

pub use bundle::ModelBundle;
pub use classifier::{Classification, Classifier, ProbabilisticClassifier};
pub use config::{PipelineConfig, load_config};
pub use error::{LoadError, Stage, VerifyError};
pub use inference::{EmbeddingModel, FeatureExtractor, FeatureVector, OnnxEmbedding};
pub use intake::{IntakeError, UploadPolicy};
pub use normalize::{ImageNormalizer, NormalizedTensor};
pub use pipeline::{InferencePipeline, Verdict};
pub use scaler::{FeatureScaler, ScaledFeatureVector};
