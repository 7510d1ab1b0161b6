//! Image normalization: file → `[1, H, W, 3]` float tensor in `[0, 1]`.
//!
//! - Decode with the format sniffed from the file contents
//! - Resize to the fixed model input size with the configured filter
//! - Map pixel intensities linearly from the native range to `[0, 1]`
//! - Gray is replicated across the three channels, alpha is dropped
//!   (no compositing); two-channel gray+alpha is rejected

use std::path::Path;

use image::imageops::FilterType;
use image::{DynamicImage, ImageError, ImageReader};
use ndarray::Array4;

use crate::config::PipelineConfig;
use crate::error::{Stage, VerifyError};

pub const CHANNELS: usize = 3;

/// Normalized single-image batch, NHWC layout.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedTensor(Array4<f32>);

impl NormalizedTensor {
    /// All-zero tensor of the given spatial size.
    pub fn zeros(height: usize, width: usize) -> Self {
        Self(Array4::zeros((1, height, width, CHANNELS)))
    }

    pub fn as_array(&self) -> &Array4<f32> {
        &self.0
    }

    /// `(height, width)`
    pub fn spatial_dims(&self) -> (usize, usize) {
        let shape = self.0.shape();
        (shape[1], shape[2])
    }
}

#[derive(Debug, Clone)]
pub struct ImageNormalizer {
    width: u32,
    height: u32,
    filter: FilterType,
}

impl ImageNormalizer {
    pub fn new(width: u32, height: u32, filter: FilterType) -> Self {
        Self {
            width,
            height,
            filter,
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(
            config.target_width,
            config.target_height,
            config.resize_filter.into(),
        )
    }

    pub fn normalize(&self, path: &Path) -> Result<NormalizedTensor, VerifyError> {
        let image = decode(path).map_err(|source| VerifyError::Decode {
            path: path.to_path_buf(),
            source,
        })?;
        self.normalize_image(&image)
    }

    pub fn normalize_image(&self, image: &DynamicImage) -> Result<NormalizedTensor, VerifyError> {
        let color = image.color();
        let channels = color.channel_count();
        if !matches!(channels, 1 | 3 | 4) {
            return Err(VerifyError::UnsupportedFormat { color, channels });
        }

        let resized = image.resize_exact(self.width, self.height, self.filter);
        // Integer sources are scaled by their max value; float sources are clamped.
        let data: Vec<f32> = resized
            .to_rgb32f()
            .into_raw()
            .into_iter()
            .map(|v| v.clamp(0.0, 1.0))
            .collect();

        let shape = (1, self.height as usize, self.width as usize, CHANNELS);
        let tensor = Array4::from_shape_vec(shape, data).map_err(|source| VerifyError::Tensor {
            stage: Stage::Normalize,
            source,
        })?;
        Ok(NormalizedTensor(tensor))
    }
}

impl Default for ImageNormalizer {
    fn default() -> Self {
        Self::from_config(&PipelineConfig::default())
    }
}

fn decode(path: &Path) -> Result<DynamicImage, ImageError> {
    let reader = ImageReader::open(path)?.with_guessed_format()?;
    reader.decode()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, LumaA, Rgb, RgbImage, Rgba, RgbaImage};

    fn assert_unit_range(tensor: &NormalizedTensor) {
        assert!(tensor.as_array().iter().all(|&v| (0.0..=1.0).contains(&v)));
    }

    #[test]
    fn grayscale_is_replicated_to_three_channels() {
        let gray = GrayImage::from_fn(40, 30, |x, y| image::Luma([((x + y) * 3) as u8]));
        let tensor = ImageNormalizer::default()
            .normalize_image(&DynamicImage::ImageLuma8(gray))
            .unwrap();

        assert_eq!(tensor.as_array().shape(), &[1, 224, 224, 3]);
        assert_unit_range(&tensor);
        for px in tensor.as_array().index_axis(ndarray::Axis(0), 0).rows() {
            assert_eq!(px[0], px[1]);
            assert_eq!(px[1], px[2]);
        }
    }

    #[test]
    fn output_size_is_fixed_regardless_of_input() {
        let normalizer = ImageNormalizer::new(32, 16, FilterType::Triangle);
        for (w, h) in [(1, 1), (7, 300), (512, 512), (1000, 3)] {
            let img = RgbImage::from_pixel(w, h, Rgb([10, 20, 30]));
            let tensor = normalizer
                .normalize_image(&DynamicImage::ImageRgb8(img))
                .unwrap();
            assert_eq!(tensor.as_array().shape(), &[1, 16, 32, 3]);
            assert_eq!(tensor.spatial_dims(), (16, 32));
        }
    }

    #[test]
    fn intensities_are_scaled_from_native_range() {
        let normalizer = ImageNormalizer::new(4, 4, FilterType::Triangle);
        let img = RgbImage::from_pixel(8, 8, Rgb([0, 255, 51]));
        let tensor = normalizer
            .normalize_image(&DynamicImage::ImageRgb8(img))
            .unwrap();
        let arr = tensor.as_array();
        assert_eq!(arr[[0, 0, 0, 0]], 0.0);
        assert_eq!(arr[[0, 0, 0, 1]], 1.0);
        assert!((arr[[0, 3, 3, 2]] - 0.2).abs() < 1e-6);
    }

    #[test]
    fn sixteen_bit_gray_uses_full_range() {
        let normalizer = ImageNormalizer::new(2, 2, FilterType::Nearest);
        let img = image::ImageBuffer::<image::Luma<u16>, Vec<u16>>::from_pixel(
            4,
            4,
            image::Luma([u16::MAX]),
        );
        let tensor = normalizer
            .normalize_image(&DynamicImage::ImageLuma16(img))
            .unwrap();
        assert!(tensor.as_array().iter().all(|&v| v == 1.0));
    }

    #[test]
    fn alpha_channel_is_dropped() {
        let normalizer = ImageNormalizer::new(2, 2, FilterType::Nearest);
        let img = RgbaImage::from_pixel(2, 2, Rgba([255, 0, 0, 200]));
        let tensor = normalizer
            .normalize_image(&DynamicImage::ImageRgba8(img))
            .unwrap();
        assert_eq!(tensor.as_array().shape(), &[1, 2, 2, 3]);
        assert_eq!(tensor.as_array()[[0, 1, 1, 0]], 1.0);
        assert_eq!(tensor.as_array()[[0, 1, 1, 1]], 0.0);
    }

    #[test]
    fn gray_alpha_is_unsupported() {
        let img = image::ImageBuffer::from_pixel(3, 3, LumaA([10u8, 255]));
        let err = ImageNormalizer::default()
            .normalize_image(&DynamicImage::ImageLumaA8(img))
            .unwrap_err();
        assert!(matches!(
            err,
            VerifyError::UnsupportedFormat { channels: 2, .. }
        ));
    }

    #[test]
    fn grayscale_png_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("label.png");
        GrayImage::from_pixel(64, 48, image::Luma([128]))
            .save(&path)
            .unwrap();

        let tensor = ImageNormalizer::default().normalize(&path).unwrap();
        assert_eq!(tensor.as_array().shape(), &[1, 224, 224, 3]);
        assert_unit_range(&tensor);
    }

    #[test]
    fn format_is_sniffed_not_taken_from_extension() {
        let dir = tempfile::tempdir().unwrap();
        let png = dir.path().join("real.png");
        RgbImage::from_pixel(5, 5, Rgb([1, 2, 3])).save(&png).unwrap();
        let renamed = dir.path().join("upload.jpg");
        std::fs::rename(&png, &renamed).unwrap();

        assert!(ImageNormalizer::default().normalize(&renamed).is_ok());
    }

    #[test]
    fn text_file_is_a_decode_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, "definitely not pixels").unwrap();

        let err = ImageNormalizer::default().normalize(&path).unwrap_err();
        assert!(matches!(err, VerifyError::Decode { .. }));
        assert_eq!(err.stage(), Stage::Normalize);
    }

    #[test]
    fn missing_file_is_a_decode_error() {
        let err = ImageNormalizer::default()
            .normalize(Path::new("/nonexistent/box.png"))
            .unwrap_err();
        assert!(matches!(err, VerifyError::Decode { .. }));
    }
}
