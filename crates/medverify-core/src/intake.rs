//! Upload intake checks applied before an image reaches the pipeline.

use std::fs;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

const DEFAULT_MAX_BYTES: u64 = 5_000_000;

/// Rejection of an uploaded file. Maps to a client error, never a 500.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IntakeError {
    #[error("No image provided")]
    Missing,
    #[error("No selected file")]
    EmptyFilename,
    #[error("Invalid file type")]
    DisallowedExtension,
    #[error("File too large ({size} bytes, limit {limit})")]
    TooLarge { size: u64, limit: u64 },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UploadPolicy {
    /// Lower-case extensions without the leading dot.
    pub allowed_extensions: Vec<String>,
    pub max_bytes: Option<u64>,
}

impl Default for UploadPolicy {
    fn default() -> Self {
        Self {
            allowed_extensions: vec!["png".into(), "jpg".into(), "jpeg".into()],
            max_bytes: Some(DEFAULT_MAX_BYTES),
        }
    }
}

impl UploadPolicy {
    /// Extension check only, case-insensitive.
    pub fn allows_name(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| {
                let ext = ext.to_ascii_lowercase();
                self.allowed_extensions.iter().any(|a| *a == ext)
            })
            .unwrap_or(false)
    }

    pub fn check(&self, path: &Path) -> Result<(), IntakeError> {
        let has_name = path
            .file_name()
            .map(|name| !name.is_empty())
            .unwrap_or(false);
        if !has_name {
            return Err(IntakeError::EmptyFilename);
        }

        let Ok(meta) = fs::metadata(path) else {
            return Err(IntakeError::Missing);
        };
        if !meta.is_file() {
            return Err(IntakeError::Missing);
        }

        if !self.allows_name(path) {
            return Err(IntakeError::DisallowedExtension);
        }

        if let Some(limit) = self.max_bytes {
            if meta.len() > limit {
                return Err(IntakeError::TooLarge {
                    size: meta.len(),
                    limit,
                });
            }
        }
        Ok(())
    }
}
