//! Binary classification of scaled features into an authenticity label.

use ndarray::{Array1, ArrayView1};
use serde::Deserialize;

use crate::error::{BoxError, LoadError, Stage, VerifyError};
use crate::scaler::ScaledFeatureVector;

const PROBA_SUM_TOLERANCE: f32 = 1e-3;

/// Opaque two-class probabilistic model.
///
/// `predict_proba` returns probabilities ordered like `classes()`.
pub trait ProbabilisticClassifier: Send + Sync {
    fn classes(&self) -> [i64; 2];
    fn predict_proba(&self, features: ArrayView1<'_, f32>) -> Result<[f32; 2], BoxError>;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Classification {
    pub label: i64,
    pub is_authentic: bool,
    /// Probability of the predicted class, in `[0.5, 1.0]`.
    pub confidence: f32,
}

pub struct Classifier {
    model: Box<dyn ProbabilisticClassifier>,
}

impl Classifier {
    pub fn new(model: impl ProbabilisticClassifier + 'static) -> Self {
        Self {
            model: Box::new(model),
        }
    }

    pub fn classify(&self, features: &ScaledFeatureVector) -> Result<Classification, VerifyError> {
        let proba = self
            .model
            .predict_proba(features.as_array().view())
            .map_err(|e| VerifyError::model(Stage::Classify, "predict_proba", e))?;

        if proba.iter().any(|p| !p.is_finite() || !(0.0..=1.0).contains(p)) {
            return Err(VerifyError::model(
                Stage::Classify,
                "invalid probabilities",
                format!("{proba:?}"),
            ));
        }
        if (proba[0] + proba[1] - 1.0).abs() > PROBA_SUM_TOLERANCE {
            return Err(VerifyError::model(
                Stage::Classify,
                "probabilities do not sum to 1",
                format!("{proba:?}"),
            ));
        }

        // Ties resolve to the first class.
        let best = if proba[1] > proba[0] { 1 } else { 0 };
        let label = self.model.classes()[best];
        // Renormalize within the tolerance so the max of the pair stays >= 0.5.
        let confidence = (proba[best] / (proba[0] + proba[1])).clamp(0.5, 1.0);
        Ok(Classification {
            label,
            is_authentic: label != 0,
            confidence,
        })
    }
}

/// Serialized classifier, tagged by `kind` in the model bundle.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ClassifierParams {
    LogisticRegression(LogisticRegressionParams),
}

impl ClassifierParams {
    pub fn dim(&self) -> usize {
        match self {
            ClassifierParams::LogisticRegression(p) => p.coef.len(),
        }
    }

    pub fn build(self) -> Result<Classifier, LoadError> {
        match self {
            ClassifierParams::LogisticRegression(p) => {
                Ok(Classifier::new(LogisticRegression::from_params(p)?))
            }
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogisticRegressionParams {
    pub coef: Vec<f32>,
    pub intercept: f32,
    #[serde(default = "default_classes")]
    pub classes: [i64; 2],
}

fn default_classes() -> [i64; 2] {
    [0, 1]
}

/// `P(classes[1]) = sigmoid(coef · x + intercept)`
#[derive(Debug, Clone)]
pub struct LogisticRegression {
    coef: Array1<f32>,
    intercept: f32,
    classes: [i64; 2],
}

impl LogisticRegression {
    pub fn from_params(params: LogisticRegressionParams) -> Result<Self, LoadError> {
        if params.coef.is_empty() {
            return Err(LoadError::InvalidBundle(
                "classifier has no coefficients".into(),
            ));
        }
        if !params.intercept.is_finite() || params.coef.iter().any(|c| !c.is_finite()) {
            return Err(LoadError::InvalidBundle(
                "classifier parameters must be finite".into(),
            ));
        }
        if params.classes[0] == params.classes[1] {
            return Err(LoadError::InvalidBundle(format!(
                "classifier classes must differ, got {:?}",
                params.classes
            )));
        }
        Ok(Self {
            coef: Array1::from(params.coef),
            intercept: params.intercept,
            classes: params.classes,
        })
    }
}

impl ProbabilisticClassifier for LogisticRegression {
    fn classes(&self) -> [i64; 2] {
        self.classes
    }

    fn predict_proba(&self, features: ArrayView1<'_, f32>) -> Result<[f32; 2], BoxError> {
        if features.len() != self.coef.len() {
            return Err(format!(
                "expected {} features, got {}",
                self.coef.len(),
                features.len()
            )
            .into());
        }
        let logit = self.coef.dot(&features) + self.intercept;
        let positive = sigmoid(logit);
        Ok([1.0 - positive, positive])
    }
}

fn sigmoid(z: f32) -> f32 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}
