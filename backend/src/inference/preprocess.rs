//! Image decoding, resizing and normalization ahead of feature extraction.

use image::imageops::{self, FilterType};
use image::{ImageFormat, RgbImage};
use ndarray::Array4;
use serde::{Deserialize, Serialize};

use crate::config::AppConfig;
use crate::error::PipelineError;

/// Caffe-style ImageNet channel means, BGR order.
const CAFFE_MEAN_BGR: [f32; 3] = [103.939, 116.779, 123.68];
/// Torchvision ImageNet mean, RGB order.
const TORCH_MEAN_RGB: [f32; 3] = [0.485, 0.456, 0.406];
/// Torchvision ImageNet std, RGB order.
const TORCH_STD_RGB: [f32; 3] = [0.229, 0.224, 0.225];

/// Channel normalization expected by the feature extractor's weights.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Normalization {
    /// RGB to BGR, subtract the per-channel mean, no scaling.
    Caffe,
    /// Scale to 0-1, then standardize each RGB channel.
    Torch,
}

impl Normalization {
    fn apply(self, rgb: [u8; 3]) -> [f32; 3] {
        match self {
            Normalization::Caffe => {
                let bgr = [rgb[2], rgb[1], rgb[0]];
                std::array::from_fn(|c| f32::from(bgr[c]) - CAFFE_MEAN_BGR[c])
            }
            Normalization::Torch => std::array::from_fn(|c| {
                (f32::from(rgb[c]) / 255.0 - TORCH_MEAN_RGB[c]) / TORCH_STD_RGB[c]
            }),
        }
    }
}

/// Maps a config resize method name onto an `image` filter.
pub fn resize_filter(name: &str) -> Option<FilterType> {
    match name {
        "nearest" => Some(FilterType::Nearest),
        "triangle" | "bilinear" => Some(FilterType::Triangle),
        "catmull_rom" | "bicubic" => Some(FilterType::CatmullRom),
        "gaussian" => Some(FilterType::Gaussian),
        "lanczos3" => Some(FilterType::Lanczos3),
        _ => None,
    }
}

#[derive(Debug, Clone)]
pub struct ImagePreprocessor {
    width: u32,
    height: u32,
    filter: FilterType,
    normalization: Normalization,
    max_bytes: usize,
}

impl Default for ImagePreprocessor {
    fn default() -> Self {
        Self {
            width: 224,
            height: 224,
            filter: FilterType::Nearest,
            normalization: Normalization::Torch,
            max_bytes: 20 * 1024 * 1024,
        }
    }
}

impl ImagePreprocessor {
    pub fn new(width: u32, height: u32, filter: FilterType, normalization: Normalization) -> Self {
        Self {
            width,
            height,
            filter,
            normalization,
            ..Self::default()
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        let [width, height] = config.image.size;
        let filter =
            resize_filter(&config.image.preprocessing.resize_method).unwrap_or(FilterType::Nearest);
        Self::new(width, height, filter, config.image.preprocessing.normalization)
            .with_max_bytes(config.server.max_upload_bytes)
    }

    pub fn with_max_bytes(mut self, max_bytes: usize) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    pub fn input_shape(&self) -> (usize, usize, usize, usize) {
        (1, self.height as usize, self.width as usize, 3)
    }

    /// Decodes `image` and produces a `(1, height, width, 3)` NHWC batch.
    pub fn preprocess(&self, image: &[u8]) -> Result<Array4<f32>, PipelineError> {
        let rgb = self.decode(image)?;
        let resized = imageops::resize(&rgb, self.width, self.height, self.filter);
        Ok(self.normalize(&resized))
    }

    fn decode(&self, image: &[u8]) -> Result<RgbImage, PipelineError> {
        if image.is_empty() {
            return Err(PipelineError::InvalidImage("upload is empty".to_string()));
        }
        if image.len() > self.max_bytes {
            return Err(PipelineError::InvalidImage(format!(
                "upload is {} bytes, limit is {}",
                image.len(),
                self.max_bytes
            )));
        }

        let format = image::guess_format(image)
            .map_err(|e| PipelineError::InvalidImage(format!("unrecognized format: {e}")))?;
        if !matches!(format, ImageFormat::Jpeg | ImageFormat::Png) {
            return Err(PipelineError::InvalidImage(format!(
                "unsupported format {format:?}, expected JPEG or PNG"
            )));
        }

        let decoded = image::load_from_memory_with_format(image, format)
            .map_err(|e| PipelineError::InvalidImage(e.to_string()))?;
        Ok(decoded.to_rgb8())
    }

    fn normalize(&self, resized: &RgbImage) -> Array4<f32> {
        let mut tensor = Array4::<f32>::zeros(self.input_shape());
        for (x, y, pixel) in resized.enumerate_pixels() {
            let values = self.normalization.apply(pixel.0);
            for (c, value) in values.into_iter().enumerate() {
                tensor[[0, y as usize, x as usize, c]] = value;
            }
        }
        tensor
    }
}
