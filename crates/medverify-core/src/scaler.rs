//! Fitted standardization: `z = (x - mean) / scale` per dimension.
//!
//! Parameters come from training and are never refitted at inference time.

use ndarray::Array1;
use serde::Deserialize;

use crate::error::{LoadError, VerifyError};
use crate::inference::FeatureVector;

/// Serialized scaler parameters as stored in the model bundle.
#[derive(Debug, Clone, Deserialize)]
pub struct ScalerParams {
    pub mean: Vec<f32>,
    pub scale: Vec<f32>,
}

/// Feature vector after standardization; same length as its input.
#[derive(Debug, Clone, PartialEq)]
pub struct ScaledFeatureVector(Array1<f32>);

impl ScaledFeatureVector {
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

#[derive(Debug, Clone)]
pub struct FeatureScaler {
    mean: Array1<f32>,
    scale: Array1<f32>,
}

impl FeatureScaler {
    pub fn from_params(params: ScalerParams) -> Result<Self, LoadError> {
        let ScalerParams { mean, scale } = params;
        if mean.is_empty() {
            return Err(LoadError::InvalidBundle("scaler has no dimensions".into()));
        }
        if mean.len() != scale.len() {
            return Err(LoadError::InvalidBundle(format!(
                "scaler mean has {} entries but scale has {}",
                mean.len(),
                scale.len()
            )));
        }
        if mean.iter().chain(&scale).any(|v| !v.is_finite()) {
            return Err(LoadError::InvalidBundle(
                "scaler parameters must be finite".into(),
            ));
        }
        if scale.iter().any(|&s| s < 0.0) {
            return Err(LoadError::InvalidBundle(
                "scaler scale must be non-negative".into(),
            ));
        }

        // Constant features were fitted with zero variance; leave them unscaled.
        let scale = scale
            .into_iter()
            .map(|s| if s == 0.0 { 1.0 } else { s })
            .collect::<Vec<_>>();

        Ok(Self {
            mean: Array1::from(mean),
            scale: Array1::from(scale),
        })
    }

    /// Dimensionality the scaler was fitted on.
    pub fn dim(&self) -> usize {
        self.mean.len()
    }

    pub fn scale(&self, features: &FeatureVector) -> Result<ScaledFeatureVector, VerifyError> {
        if features.len() != self.dim() {
            return Err(VerifyError::DimensionMismatch {
                expected: self.dim(),
                actual: features.len(),
            });
        }
        let scaled = (features.as_array() - &self.mean) / &self.scale;
        Ok(ScaledFeatureVector(scaled))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scaler() -> FeatureScaler {
        FeatureScaler::from_params(ScalerParams {
            mean: vec![1.0, -2.0, 0.5, 10.0],
            scale: vec![2.0, 0.5, 1.0, 4.0],
        })
        .unwrap()
    }

    #[test]
    fn standardizes_each_dimension() {
        let scaled = scaler()
            .scale(&FeatureVector::from(vec![3.0, -2.0, 0.0, 2.0]))
            .unwrap();
        assert_eq!(scaled.as_array().to_vec(), vec![1.0, 0.0, -0.5, -2.0]);
    }

    #[test]
    fn difference_of_outputs_is_difference_over_scale() {
        let s = scaler();
        let v1 = vec![0.3, 7.0, -1.25, 4.0];
        let v2 = vec![-5.0, 2.5, 0.75, 100.0];
        let a = s.scale(&FeatureVector::from(v1.clone())).unwrap();
        let b = s.scale(&FeatureVector::from(v2.clone())).unwrap();
        let stddev = [2.0f32, 0.5, 1.0, 4.0];

        for i in 0..4 {
            let lhs = a.as_array()[i] - b.as_array()[i];
            let rhs = (v1[i] - v2[i]) / stddev[i];
            assert!((lhs - rhs).abs() < 1e-4, "dim {i}: {lhs} vs {rhs}");
        }
    }

    #[test]
    fn longer_vector_is_a_dimension_mismatch() {
        let err = scaler()
            .scale(&FeatureVector::from(vec![0.0; 5]))
            .unwrap_err();
        assert!(matches!(
            err,
            VerifyError::DimensionMismatch {
                expected: 4,
                actual: 5
            }
        ));
    }

    #[test]
    fn zero_scale_passes_through_centered() {
        let s = FeatureScaler::from_params(ScalerParams {
            mean: vec![3.0],
            scale: vec![0.0],
        })
        .unwrap();
        let scaled = s.scale(&FeatureVector::from(vec![5.0])).unwrap();
        assert_eq!(scaled.as_array()[0], 2.0);
    }

    #[test]
    fn scaling_is_repeatable() {
        let s = scaler();
        let v = FeatureVector::from(vec![0.1, 0.2, 0.3, 0.4]);
        assert_eq!(s.scale(&v).unwrap(), s.scale(&v).unwrap());
    }

    #[test]
    fn invalid_params_rejected() {
        let cases = [
            (vec![], vec![]),
            (vec![1.0, 2.0], vec![1.0]),
            (vec![f32::NAN], vec![1.0]),
            (vec![0.0], vec![-1.0]),
        ];
        for (mean, scale) in cases {
            assert!(matches!(
                FeatureScaler::from_params(ScalerParams { mean, scale }),
                Err(LoadError::InvalidBundle(_))
            ));
        }
    }
}
