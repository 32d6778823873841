#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use backend::inference::{
    DecisionPolicy, FeatureExtractor, ImagePreprocessor, MlpClassifier, Pipeline,
};
use backend::PipelineError;
use image::{DynamicImage, ImageBuffer, ImageFormat, Rgb};
use ndarray::{Array4, Axis};
use serde_json::{json, Value};
use std::io::Cursor;
use std::path::{Path, PathBuf};

/// Embeds an image as its per-channel mean, so different images land on
/// different embeddings without needing real network weights.
pub struct ChannelMeanExtractor;

impl FeatureExtractor for ChannelMeanExtractor {
    fn embedding_size(&self) -> usize {
        3
    }

    fn extract(&self, input: &Array4<f32>) -> Result<Vec<f32>, PipelineError> {
        let means = input
            .mean_axis(Axis(2))
            .and_then(|a| a.mean_axis(Axis(1)))
            .and_then(|a| a.mean_axis(Axis(0)))
            .ok_or_else(|| PipelineError::Inference("empty input".to_string()))?;
        Ok(means.to_vec())
    }
}

/// Classifier artifact whose output is `probabilities` for every input.
pub fn fixed_distribution_artifact(probabilities: [f64; 3]) -> Value {
    json!({
        "classes": ["benign", "malignant", "normal"],
        "activation": "relu",
        "coefs": [[[0.0], [0.0], [0.0]], [[0.0, 0.0, 0.0]]],
        "intercepts": [[0.0], probabilities.map(f64::ln)],
    })
}

/// Classifier artifact that reacts to the blue/green/red channel means.
pub fn channel_artifact() -> Value {
    json!({
        "classes": ["benign", "malignant", "normal"],
        "activation": "tanh",
        "coefs": [
            [[0.02, -0.01], [-0.01, 0.03], [0.015, 0.01]],
            [[1.5, -0.5, 0.2], [-0.7, 1.1, 0.4]]
        ],
        "intercepts": [[0.1, -0.1], [0.0, -0.2, 0.1]],
    })
}

pub fn write_artifact(dir: &Path, artifact: &Value) -> PathBuf {
    let path = dir.join("ultrasound_mlp.json");
    std::fs::write(&path, artifact.to_string()).unwrap();
    path
}

pub fn pipeline_from_artifact(path: &Path) -> Pipeline {
    let classifier = MlpClassifier::from_file(path).unwrap();
    Pipeline::new(
        ImagePreprocessor::default(),
        Box::new(ChannelMeanExtractor),
        Box::new(classifier),
        DecisionPolicy::default(),
    )
    .unwrap()
}

pub fn encode(width: u32, height: u32, format: ImageFormat) -> Vec<u8> {
    let img = ImageBuffer::from_fn(width, height, |x, y| {
        Rgb([(x * 7 % 256) as u8, (y * 3 % 256) as u8, ((x + y) % 256) as u8])
    });
    let mut buf = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(img).write_to(&mut buf, format).unwrap();
    buf.into_inner()
}

pub fn png(width: u32, height: u32) -> Vec<u8> {
    encode(width, height, ImageFormat::Png)
}

pub fn solid_png(rgb: [u8; 3]) -> Vec<u8> {
    let img = ImageBuffer::from_pixel(32, 32, Rgb(rgb));
    let mut buf = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(img)
        .write_to(&mut buf, ImageFormat::Png)
        .unwrap();
    buf.into_inner()
}
