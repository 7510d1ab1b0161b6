//! Runtime configuration shared by the loader and the pipeline.

use std::fs;
use std::path::Path;

use image::imageops::FilterType;
use serde::Deserialize;

use crate::error::LoadError;
use crate::intake::UploadPolicy;

/// Resampling filter used when resizing to the model input size.
///
/// Has to match whatever the training-time preprocessing used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResizeFilter {
    Nearest,
    #[default]
    Bilinear,
    CatmullRom,
    Gaussian,
    Lanczos3,
}

impl From<ResizeFilter> for FilterType {
    fn from(filter: ResizeFilter) -> Self {
        match filter {
            ResizeFilter::Nearest => FilterType::Nearest,
            ResizeFilter::Bilinear => FilterType::Triangle,
            ResizeFilter::CatmullRom => FilterType::CatmullRom,
            ResizeFilter::Gaussian => FilterType::Gaussian,
            ResizeFilter::Lanczos3 => FilterType::Lanczos3,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub target_width: u32,
    pub target_height: u32,
    pub resize_filter: ResizeFilter,
    /// ONNX Runtime intra-op threads for the embedding session.
    pub intra_threads: usize,
    /// Run the embedding model once at load time to check its output size.
    pub probe_on_load: bool,
    pub upload: UploadPolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            target_width: 224,
            target_height: 224,
            resize_filter: ResizeFilter::default(),
            intra_threads: 4,
            probe_on_load: true,
            upload: UploadPolicy::default(),
        }
    }
}

pub fn load_config(path: &Path) -> Result<PipelineConfig, LoadError> {
    let data = fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let config: PipelineConfig =
        serde_json::from_str(&data).map_err(|source| LoadError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
    if config.target_width == 0 || config.target_height == 0 {
        return Err(LoadError::InvalidConfig(format!(
            "target size {}x{} must be non-zero",
            config.target_width, config.target_height
        )));
    }
    Ok(config)
}
