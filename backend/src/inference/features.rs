use ndarray::Array4;
use std::path::Path;
use std::sync::Mutex;
use tch::nn::{FuncT, ModuleT, VarStore};
use tch::vision::resnet;
use tch::{Device, Kind, Tensor};

use super::preprocess::Normalization;
use crate::error::PipelineError;

/// Network built by [`ResNetExtractor`]; also the weight cache key.
pub const ARCHITECTURE: &str = "resnet50";

/// Torchvision ResNet-50 weights are trained on RGB inputs standardized with
/// the ImageNet mean and std.
pub const INPUT_NORMALIZATION: Normalization = Normalization::Torch;

/// Maps a preprocessed NHWC batch onto a fixed-length embedding.
pub trait FeatureExtractor: Send + Sync {
    fn embedding_size(&self) -> usize;

    fn extract(&self, input: &Array4<f32>) -> Result<Vec<f32>, PipelineError>;
}

/// Frozen ResNet-50 with the classification head replaced by global average pooling.
pub struct ResNetExtractor {
    net: Mutex<FuncT<'static>>,
    _vs: VarStore,
    device: Device,
    embedding_size: usize,
}

impl ResNetExtractor {
    pub fn load(weights_path: &Path, embedding_size: usize) -> Result<Self, PipelineError> {
        let device = Device::cuda_if_available();
        log::info!(
            "Loading ResNet-50 weights from {} on {:?}",
            weights_path.display(),
            device
        );

        let mut vs = VarStore::new(device);
        let net = resnet::resnet50_no_final_layer(&vs.root());
        vs.load(weights_path).map_err(|e| {
            PipelineError::ModelLoad(format!(
                "failed to load weights {}: {e}",
                weights_path.display()
            ))
        })?;
        vs.freeze();

        Ok(Self {
            net: Mutex::new(net),
            _vs: vs,
            device,
            embedding_size,
        })
    }

    /// Randomly initialised network, for exercising the forward pass without weights.
    #[cfg(test)]
    fn untrained(embedding_size: usize) -> Self {
        let mut vs = VarStore::new(Device::Cpu);
        let net = resnet::resnet50_no_final_layer(&vs.root());
        vs.freeze();

        Self {
            net: Mutex::new(net),
            _vs: vs,
            device: Device::Cpu,
            embedding_size,
        }
    }

    fn to_tensor(&self, input: &Array4<f32>) -> Result<Tensor, PipelineError> {
        let (batch, height, width, channels) = input.dim();
        let contiguous = input.as_standard_layout();
        let data = contiguous.as_slice().ok_or_else(|| {
            PipelineError::Inference("input tensor is not contiguous".to_string())
        })?;

        Ok(Tensor::from_slice(data)
            .view([batch as i64, height as i64, width as i64, channels as i64])
            .permute([0, 3, 1, 2])
            .to_device(self.device))
    }
}

impl FeatureExtractor for ResNetExtractor {
    fn embedding_size(&self) -> usize {
        self.embedding_size
    }

    fn extract(&self, input: &Array4<f32>) -> Result<Vec<f32>, PipelineError> {
        let tensor = self.to_tensor(input)?;
        let net = self
            .net
            .lock()
            .map_err(|e| PipelineError::Inference(format!("feature extractor lock poisoned: {e}")))?;

        let output = tch::no_grad(|| net.forward_t(&tensor, false));
        let output_flat = output
            .to_device(Device::Cpu)
            .to_kind(Kind::Float)
            .view([-1]);
        let num_elements = output_flat.size()[0] as usize;
        if num_elements != self.embedding_size {
            return Err(PipelineError::Inference(format!(
                "feature extractor produced {num_elements} values, expected {}",
                self.embedding_size
            )));
        }

        let mut embedding = vec![0.0f32; num_elements];
        output_flat.copy_data(&mut embedding, num_elements);
        Ok(embedding)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn patterned_input(height: usize, width: usize) -> Array4<f32> {
        Array4::from_shape_fn((1, height, width, 3), |(_, y, x, c)| {
            ((x * 3 + y * 5 + c * 7) % 17) as f32 / 8.0 - 1.0
        })
    }

    #[test]
    fn missing_weights_fail_to_load() {
        let result = ResNetExtractor::load(Path::new("/nonexistent/resnet50.ot"), 2048);
        assert!(matches!(result, Err(PipelineError::ModelLoad(_))));
    }

    #[test]
    fn input_is_permuted_to_channels_first() {
        let extractor = ResNetExtractor::untrained(2048);
        let input = patterned_input(4, 6);
        let tensor = extractor.to_tensor(&input).unwrap();

        assert_eq!(tensor.size(), vec![1, 3, 4, 6]);
        for (y, x, c) in [(0, 0, 0), (1, 2, 1), (3, 5, 2), (2, 4, 0)] {
            let got = tensor.double_value(&[0, c as i64, y as i64, x as i64]);
            assert_eq!(got as f32, input[[0, y, x, c]], "y={y} x={x} c={c}");
        }
    }

    #[test]
    fn resnet50_embedding_has_2048_finite_values() {
        let extractor = ResNetExtractor::untrained(2048);
        let embedding = extractor.extract(&patterned_input(224, 224)).unwrap();

        assert_eq!(embedding.len(), 2048);
        assert!(embedding.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn extraction_is_deterministic() {
        let extractor = ResNetExtractor::untrained(2048);
        let input = patterned_input(224, 224);

        let first = extractor.extract(&input).unwrap();
        let second = extractor.extract(&input).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn unexpected_embedding_width_is_an_inference_error() {
        let extractor = ResNetExtractor::untrained(1000);
        let err = extractor.extract(&patterned_input(224, 224)).unwrap_err();
        assert!(matches!(err, PipelineError::Inference(msg) if msg.contains("2048")));
    }
}
