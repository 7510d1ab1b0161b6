//! Path → verdict: normalize, extract, scale, classify.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;

use crate::bundle::ModelBundle;
use crate::config::PipelineConfig;
use crate::error::VerifyError;
use crate::normalize::ImageNormalizer;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Verdict {
    pub is_authentic: bool,
    pub confidence: f32,
}

/// Stateless per call; the bundle is shared read-only across threads.
#[derive(Clone)]
pub struct InferencePipeline {
    normalizer: ImageNormalizer,
    bundle: Arc<ModelBundle>,
}

impl InferencePipeline {
    pub fn new(normalizer: ImageNormalizer, bundle: Arc<ModelBundle>) -> Self {
        Self { normalizer, bundle }
    }

    pub fn from_config(config: &PipelineConfig, bundle: Arc<ModelBundle>) -> Self {
        Self::new(ImageNormalizer::from_config(config), bundle)
    }

    /// Run every stage in order, stopping at the first failure. No retries.
    pub fn infer(&self, path: &Path) -> Result<Verdict, VerifyError> {
        let result = self.run_stages(path);
        if let Err(e) = &result {
            tracing::warn!(path = %path.display(), stage = %e.stage(), error = %e, "inference failed");
        }
        result
    }

    fn run_stages(&self, path: &Path) -> Result<Verdict, VerifyError> {
        let start = Instant::now();

        let tensor = self.normalizer.normalize(path)?;
        tracing::debug!(shape = ?tensor.as_array().shape(), "normalized");

        let features = self.bundle.extractor.extract(&tensor)?;
        tracing::debug!(features = features.len(), "extracted");

        let scaled = self.bundle.scaler.scale(&features)?;
        let class = self.bundle.classifier.classify(&scaled)?;

        tracing::debug!(
            path = %path.display(),
            label = class.label,
            confidence = class.confidence,
            elapsed_ms = start.elapsed().as_secs_f32() * 1000.0,
            "classified"
        );

        Ok(Verdict {
            is_authentic: class.is_authentic,
            confidence: class.confidence,
        })
    }
}
