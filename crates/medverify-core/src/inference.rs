//! Embedding model loading and feature extraction via the `ort` crate.

use std::path::Path;
use std::sync::Mutex;

use ndarray::{Array1, Array4, ArrayD};
use ort::session::Session;
use ort::value::TensorRef;

use crate::error::{BoxError, LoadError, Stage, VerifyError};
use crate::normalize::NormalizedTensor;

/// Opaque embedding backend: `[1, H, W, 3]` in, any fixed-shape tensor out.
pub trait EmbeddingModel: Send + Sync {
    fn embed(&self, input: &Array4<f32>) -> Result<ArrayD<f32>, BoxError>;
}

/// Flattened embedding of one image.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector(Array1<f32>);

impl FeatureVector {
    pub fn as_array(&self) -> &Array1<f32> {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<f32>> for FeatureVector {
    fn from(values: Vec<f32>) -> Self {
        Self(Array1::from(values))
    }
}

pub struct FeatureExtractor {
    model: Box<dyn EmbeddingModel>,
}

impl FeatureExtractor {
    pub fn new(model: impl EmbeddingModel + 'static) -> Self {
        Self {
            model: Box::new(model),
        }
    }

    pub fn extract(&self, tensor: &NormalizedTensor) -> Result<FeatureVector, VerifyError> {
        let input = tensor.as_array();
        let output = self.model.embed(input).map_err(|e| {
            VerifyError::model(
                Stage::Extract,
                format!("embedding forward pass on input {:?}", input.shape()),
                e,
            )
        })?;

        // Row-major flatten, same element order as the training-time features.
        let features: Vec<f32> = output.iter().copied().collect();
        Ok(FeatureVector::from(features))
    }
}

/// ONNX Runtime embedding model.
///
/// `Session::run` needs exclusive access, so evaluations are serialized
/// behind a mutex; concurrent callers queue on it.
pub struct OnnxEmbedding {
    session: Mutex<Session>,
    input_name: String,
    output_name: String,
}

impl OnnxEmbedding {
    /// Load an ONNX model, binding its first input and first output.
    pub fn load(model_path: &Path, intra_threads: usize) -> Result<Self, LoadError> {
        let wrap = |e: ort::Error| LoadError::Embedding {
            path: model_path.to_path_buf(),
            source: e.into(),
        };

        let session = Session::builder()
            .map_err(wrap)?
            .with_intra_threads(intra_threads)
            .map_err(wrap)?
            .commit_from_file(model_path)
            .map_err(wrap)?;

        let missing = |what: &str| LoadError::Embedding {
            path: model_path.to_path_buf(),
            source: format!("model declares no {what}").into(),
        };
        let input_name = session
            .inputs
            .first()
            .map(|i| i.name.clone())
            .ok_or_else(|| missing("inputs"))?;
        let output_name = session
            .outputs
            .first()
            .map(|o| o.name.clone())
            .ok_or_else(|| missing("outputs"))?;

        tracing::info!(
            model = %model_path.display(),
            input = %input_name,
            output = %output_name,
            "embedding model loaded"
        );

        Ok(Self {
            session: Mutex::new(session),
            input_name,
            output_name,
        })
    }
}

impl EmbeddingModel for OnnxEmbedding {
    fn embed(&self, input: &Array4<f32>) -> Result<ArrayD<f32>, BoxError> {
        let input_tensor = TensorRef::from_array_view(input)?;

        let mut session = self
            .session
            .lock()
            .map_err(|e| format!("session lock poisoned: {e}"))?;
        let outputs = session.run(ort::inputs![self.input_name.as_str() => input_tensor])?;

        let output = outputs[self.output_name.as_str()].try_extract_array::<f32>()?;
        Ok(output.to_owned())
    }
}
