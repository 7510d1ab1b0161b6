//! Start-up loading of the fitted artifacts shared by every request.

use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::classifier::{Classifier, ClassifierParams};
use crate::config::PipelineConfig;
use crate::error::LoadError;
use crate::inference::{FeatureExtractor, OnnxEmbedding};
use crate::normalize::NormalizedTensor;
use crate::scaler::{FeatureScaler, ScalerParams};

/// On-disk layout of the scaler + classifier bundle.
#[derive(Debug, Deserialize)]
pub struct BundleFile {
    pub scaler: ScalerParams,
    pub classifier: ClassifierParams,
}

pub fn load_bundle_file(path: &Path) -> Result<BundleFile, LoadError> {
    let data = fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&data).map_err(|source| LoadError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Embedding model, scaler and classifier. Read-only once constructed.
pub struct ModelBundle {
    pub extractor: FeatureExtractor,
    pub scaler: FeatureScaler,
    pub classifier: Classifier,
}

impl ModelBundle {
    pub fn new(extractor: FeatureExtractor, scaler: FeatureScaler, classifier: Classifier) -> Self {
        Self {
            extractor,
            scaler,
            classifier,
        }
    }

    /// Build scaler and classifier from a parsed bundle, checking they agree on `D`.
    pub fn from_parts(extractor: FeatureExtractor, file: BundleFile) -> Result<Self, LoadError> {
        let classifier_dim = file.classifier.dim();
        let scaler = FeatureScaler::from_params(file.scaler)?;
        if classifier_dim != scaler.dim() {
            return Err(LoadError::InvalidBundle(format!(
                "scaler expects {} features but classifier expects {classifier_dim}",
                scaler.dim()
            )));
        }
        let classifier = file.classifier.build()?;
        Ok(Self::new(extractor, scaler, classifier))
    }

    /// Load both artifacts. Any error here is fatal for the process.
    pub fn load(
        embedding_path: &Path,
        bundle_path: &Path,
        config: &PipelineConfig,
    ) -> Result<Self, LoadError> {
        let file = load_bundle_file(bundle_path)?;
        let embedding = OnnxEmbedding::load(embedding_path, config.intra_threads)?;
        let bundle = Self::from_parts(FeatureExtractor::new(embedding), file)?;

        tracing::info!(
            bundle = %bundle_path.display(),
            features = bundle.scaler.dim(),
            "scaler and classifier loaded"
        );

        if config.probe_on_load {
            bundle.probe(config.target_height as usize, config.target_width as usize)?;
        }
        Ok(bundle)
    }

    /// Run the embedding model once on a blank input and compare its width with `D`.
    pub fn probe(&self, height: usize, width: usize) -> Result<(), LoadError> {
        let features = self
            .extractor
            .extract(&NormalizedTensor::zeros(height, width))
            .map_err(LoadError::Probe)?;
        if features.len() != self.scaler.dim() {
            return Err(LoadError::ProbeMismatch {
                expected: self.scaler.dim(),
                actual: features.len(),
            });
        }
        tracing::debug!(features = features.len(), "embedding probe passed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BoxError;
    use crate::inference::EmbeddingModel;
    use ndarray::{Array4, ArrayD, IxDyn};
    use std::io::Write;

    struct Fixed(usize);

    impl EmbeddingModel for Fixed {
        fn embed(&self, _input: &Array4<f32>) -> Result<ArrayD<f32>, BoxError> {
            Ok(ArrayD::zeros(IxDyn(&[1, self.0])))
        }
    }

    const BUNDLE: &str = r#"{
        "scaler": {"mean": [0.0, 1.0, 2.0], "scale": [1.0, 1.0, 2.0]},
        "classifier": {"kind": "logistic_regression", "coef": [0.1, 0.2, 0.3], "intercept": -0.5}
    }"#;

    fn parsed(json: &str) -> BundleFile {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn bundle_file_roundtrip_from_disk() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(BUNDLE.as_bytes()).unwrap();
        tmp.flush().unwrap();

        let file = load_bundle_file(tmp.path()).unwrap();
        assert_eq!(file.scaler.mean.len(), 3);
        assert_eq!(file.classifier.dim(), 3);
    }

    #[test]
    fn corrupt_bundle_is_a_parse_error() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(b"\x80\x04pickle").unwrap();
        tmp.flush().unwrap();

        assert!(matches!(
            load_bundle_file(tmp.path()),
            Err(LoadError::Io { .. }) | Err(LoadError::Parse { .. })
        ));
    }

    #[test]
    fn unknown_classifier_kind_rejected() {
        let json = BUNDLE.replace("logistic_regression", "random_forest");
        assert!(serde_json::from_str::<BundleFile>(&json).is_err());
    }

    #[test]
    fn dimension_disagreement_rejected() {
        let json = BUNDLE.replace("[0.1, 0.2, 0.3]", "[0.1, 0.2]");
        let result = ModelBundle::from_parts(FeatureExtractor::new(Fixed(3)), parsed(&json));
        assert!(matches!(result, Err(LoadError::InvalidBundle(_))));
    }

    #[test]
    fn probe_accepts_matching_embedding() {
        let bundle = ModelBundle::from_parts(FeatureExtractor::new(Fixed(3)), parsed(BUNDLE)).unwrap();
        assert!(bundle.probe(8, 8).is_ok());
    }

    #[test]
    fn probe_rejects_wrong_embedding_width() {
        let bundle = ModelBundle::from_parts(FeatureExtractor::new(Fixed(4)), parsed(BUNDLE)).unwrap();
        assert!(matches!(
            bundle.probe(8, 8),
            Err(LoadError::ProbeMismatch {
                expected: 3,
                actual: 4
            })
        ));
    }

    #[test]
    fn load_fails_fast_on_missing_bundle() {
        let result = ModelBundle::load(
            Path::new("/nonexistent/embedding.onnx"),
            Path::new("/nonexistent/bundle.json"),
            &PipelineConfig::default(),
        );
        assert!(matches!(result, Err(LoadError::Io { .. })));
    }
}
