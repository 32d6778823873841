//! Probabilistic classifier over feature-extractor embeddings.
//!
//! The production model is a multi-layer perceptron exported to JSON:
//! per-layer coefficient matrices (`n_in x n_out`) and intercept vectors,
//! a hidden activation, and a softmax output over the three tissue classes.
//! Layers are evaluated in `f64`, the precision the artifact is exported in.

use ndarray::{Array1, Array2, ArrayView1};
use serde::{Deserialize, Serialize};
use shared::UltrasoundClass;
use std::path::Path;

use crate::error::PipelineError;

pub trait Classifier: Send + Sync {
    /// Width of the embedding the classifier expects.
    fn input_size(&self) -> usize;

    fn predict_proba(&self, embedding: &[f32]) -> Result<Vec<f64>, PipelineError>;

    /// Index of the most probable class; the first one wins on ties.
    fn predict(&self, embedding: &[f32]) -> Result<usize, PipelineError> {
        let probabilities = self.predict_proba(embedding)?;
        argmax(&probabilities)
            .ok_or_else(|| PipelineError::Inference("empty probability distribution".to_string()))
    }
}

pub fn argmax(values: &[f64]) -> Option<usize> {
    values
        .iter()
        .enumerate()
        .fold(None, |best: Option<(usize, f64)>, (i, &v)| match best {
            Some((_, best_v)) if best_v >= v => best,
            _ => Some((i, v)),
        })
        .map(|(i, _)| i)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Activation {
    Identity,
    Logistic,
    Tanh,
    Relu,
}

impl Activation {
    fn apply(self, x: f64) -> f64 {
        match self {
            Activation::Identity => x,
            Activation::Logistic => 1.0 / (1.0 + (-x).exp()),
            Activation::Tanh => x.tanh(),
            Activation::Relu => x.max(0.0),
        }
    }
}

fn default_out_activation() -> String {
    "softmax".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MlpArtifact {
    pub classes: Vec<String>,
    pub activation: Activation,
    #[serde(default = "default_out_activation")]
    pub out_activation: String,
    pub coefs: Vec<Vec<Vec<f64>>>,
    pub intercepts: Vec<Vec<f64>>,
}

#[derive(Debug)]
struct Layer {
    weights: Array2<f64>,
    bias: Array1<f64>,
}

#[derive(Debug)]
pub struct MlpClassifier {
    activation: Activation,
    layers: Vec<Layer>,
}

impl MlpClassifier {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, PipelineError> {
        let path = path.as_ref();
        let data = std::fs::read(path).map_err(|e| {
            PipelineError::ModelLoad(format!(
                "failed to read classifier artifact {}: {e}",
                path.display()
            ))
        })?;
        let classifier = Self::from_slice(&data)?;
        log::info!(
            "Loaded classifier from {} ({} layers, input {})",
            path.display(),
            classifier.layers.len(),
            classifier.input_size()
        );
        Ok(classifier)
    }

    pub fn from_slice(data: &[u8]) -> Result<Self, PipelineError> {
        let artifact: MlpArtifact = serde_json::from_slice(data)
            .map_err(|e| PipelineError::ModelLoad(format!("invalid classifier artifact: {e}")))?;
        Self::from_artifact(artifact)
    }

    pub fn from_artifact(artifact: MlpArtifact) -> Result<Self, PipelineError> {
        let expected = UltrasoundClass::labels();
        if artifact.classes != expected {
            return Err(PipelineError::ModelLoad(format!(
                "classifier classes {:?} do not match {:?}",
                artifact.classes, expected
            )));
        }
        if artifact.out_activation != "softmax" {
            return Err(PipelineError::ModelLoad(format!(
                "unsupported output activation '{}'",
                artifact.out_activation
            )));
        }
        if artifact.coefs.is_empty() || artifact.coefs.len() != artifact.intercepts.len() {
            return Err(PipelineError::ModelLoad(format!(
                "classifier has {} coefficient matrices and {} intercept vectors",
                artifact.coefs.len(),
                artifact.intercepts.len()
            )));
        }

        let mut layers: Vec<Layer> = Vec::with_capacity(artifact.coefs.len());
        for (i, (coefs, intercepts)) in artifact
            .coefs
            .into_iter()
            .zip(artifact.intercepts)
            .enumerate()
        {
            let layer = build_layer(i, coefs, intercepts)?;
            if let Some(previous) = layers.last() {
                if previous.bias.len() != layer.weights.nrows() {
                    return Err(PipelineError::ModelLoad(format!(
                        "layer {i} expects {} inputs but layer {} produces {}",
                        layer.weights.nrows(),
                        i - 1,
                        previous.bias.len()
                    )));
                }
            }
            layers.push(layer);
        }

        let outputs = layers.last().map(|l| l.bias.len()).unwrap_or_default();
        if outputs != UltrasoundClass::COUNT {
            return Err(PipelineError::ModelLoad(format!(
                "classifier produces {outputs} outputs, expected {}",
                UltrasoundClass::COUNT
            )));
        }

        Ok(Self {
            activation: artifact.activation,
            layers,
        })
    }

    fn forward(&self, embedding: ArrayView1<f32>) -> Array1<f64> {
        let last = self.layers.len() - 1;
        let mut x = embedding.mapv(f64::from);
        for (i, layer) in self.layers.iter().enumerate() {
            x = x.dot(&layer.weights) + &layer.bias;
            if i != last {
                x.mapv_inplace(|v| self.activation.apply(v));
            }
        }
        softmax(x)
    }
}

fn build_layer(index: usize, coefs: Vec<Vec<f64>>, intercepts: Vec<f64>) -> Result<Layer, PipelineError> {
    let n_in = coefs.len();
    let n_out = intercepts.len();
    if n_in == 0 || n_out == 0 {
        return Err(PipelineError::ModelLoad(format!("layer {index} is empty")));
    }
    if let Some(row) = coefs.iter().position(|row| row.len() != n_out) {
        return Err(PipelineError::ModelLoad(format!(
            "layer {index} row {row} has {} columns, expected {n_out}",
            coefs[row].len()
        )));
    }

    let flat: Vec<f64> = coefs.into_iter().flatten().collect();
    let weights = Array2::from_shape_vec((n_in, n_out), flat)
        .map_err(|e| PipelineError::ModelLoad(format!("layer {index}: {e}")))?;
    Ok(Layer {
        weights,
        bias: Array1::from(intercepts),
    })
}

fn softmax(mut logits: Array1<f64>) -> Array1<f64> {
    let max = logits.fold(f64::NEG_INFINITY, |acc, &v| acc.max(v));
    logits.mapv_inplace(|v| (v - max).exp());
    let sum = logits.sum();
    logits / sum
}

impl Classifier for MlpClassifier {
    fn input_size(&self) -> usize {
        self.layers[0].weights.nrows()
    }

    fn predict_proba(&self, embedding: &[f32]) -> Result<Vec<f64>, PipelineError> {
        if embedding.len() != self.input_size() {
            return Err(PipelineError::Inference(format!(
                "embedding has {} values, classifier expects {}",
                embedding.len(),
                self.input_size()
            )));
        }

        let probabilities = self.forward(ArrayView1::from(embedding));
        if probabilities.iter().any(|p| !p.is_finite()) {
            return Err(PipelineError::Inference(
                "classifier produced non-finite probabilities".to_string(),
            ));
        }
        Ok(probabilities.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;

    fn fixed_distribution_artifact(probabilities: [f64; 3]) -> serde_json::Value {
        json!({
            "classes": ["benign", "malignant", "normal"],
            "activation": "relu",
            "coefs": [[[0.0], [0.0]], [[0.0, 0.0, 0.0]]],
            "intercepts": [[0.0], probabilities.map(f64::ln)],
        })
    }

    fn load(value: serde_json::Value) -> Result<MlpClassifier, PipelineError> {
        MlpClassifier::from_slice(value.to_string().as_bytes())
    }

    #[test]
    fn reproduces_distribution_from_output_intercepts() {
        let classifier = load(fixed_distribution_artifact([0.7, 0.1, 0.2])).unwrap();
        let probabilities = classifier.predict_proba(&[3.0, -1.0]).unwrap();

        for (got, want) in probabilities.iter().zip([0.7, 0.1, 0.2]) {
            assert!((got - want).abs() < 1e-5, "{probabilities:?}");
        }
        assert!((probabilities.iter().sum::<f64>() - 1.0).abs() < 1e-5);
        assert_eq!(classifier.predict(&[3.0, -1.0]).unwrap(), 0);
    }

    #[test]
    fn hidden_activation_is_applied() {
        // One hidden unit fed straight from the single input, routed to class 2.
        let artifact = json!({
            "classes": ["benign", "malignant", "normal"],
            "activation": "relu",
            "coefs": [[[1.0]], [[0.0, 0.0, 1.0]]],
            "intercepts": [[0.0], [0.0, 0.0, 0.0]],
        });
        let classifier = load(artifact).unwrap();

        // Negative inputs are clipped to zero, so all classes tie and index 0 wins.
        assert_eq!(classifier.predict(&[-5.0]).unwrap(), 0);
        let tied = classifier.predict_proba(&[-5.0]).unwrap();
        assert!(tied.iter().all(|p| (p - 1.0 / 3.0).abs() < 1e-6));

        assert_eq!(classifier.predict(&[5.0]).unwrap(), 2);
    }

    #[test]
    fn predict_agrees_with_argmax_of_probabilities() {
        let artifact = json!({
            "classes": ["benign", "malignant", "normal"],
            "activation": "tanh",
            "coefs": [
                [[0.5, -1.0], [1.5, 0.25], [-0.75, 2.0]],
                [[1.0, -2.0, 0.5], [-1.0, 0.5, 1.5]]
            ],
            "intercepts": [[0.1, -0.2], [0.0, 0.3, -0.1]],
        });
        let classifier = load(artifact).unwrap();

        for embedding in [[0.0, 0.0, 0.0], [1.0, 2.0, 3.0], [-3.0, 0.5, 1.0], [4.0, -4.0, 0.0]] {
            let probabilities = classifier.predict_proba(&embedding).unwrap();
            let predicted = classifier.predict(&embedding).unwrap();
            assert_eq!(Some(predicted), argmax(&probabilities));
            assert!(probabilities.iter().all(|&p| p >= 0.0));
            assert!((probabilities.iter().sum::<f64>() - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn large_logits_do_not_overflow() {
        let artifact = json!({
            "classes": ["benign", "malignant", "normal"],
            "activation": "identity",
            "coefs": [[[1000.0, 0.0, -1000.0]]],
            "intercepts": [[0.0, 0.0, 0.0]],
        });
        let classifier = load(artifact).unwrap();
        let probabilities = classifier.predict_proba(&[1.0]).unwrap();
        assert!((probabilities[0] - 1.0).abs() < 1e-6);
        assert_eq!(classifier.predict(&[1.0]).unwrap(), 0);
    }

    #[test]
    fn keeps_double_precision_near_the_threshold() {
        let classifier =
            load(fixed_distribution_artifact([0.399_999_999, 0.200_000_001, 0.4])).unwrap();
        let probabilities = classifier.predict_proba(&[0.0, 0.0]).unwrap();

        assert!(probabilities[1] > 0.2, "{probabilities:?}");
        assert!((probabilities[1] - 0.200_000_001).abs() < 1e-12);
    }

    #[test]
    fn wrong_embedding_width_is_an_inference_error() {
        let classifier = load(fixed_distribution_artifact([0.7, 0.1, 0.2])).unwrap();
        let err = classifier.predict_proba(&[1.0, 2.0, 3.0]).unwrap_err();
        assert!(matches!(err, PipelineError::Inference(_)));
    }

    #[test]
    fn rejects_wrong_class_order() {
        let mut artifact = fixed_distribution_artifact([0.7, 0.1, 0.2]);
        artifact["classes"] = json!(["malignant", "benign", "normal"]);
        assert!(matches!(load(artifact), Err(PipelineError::ModelLoad(_))));
    }

    #[test]
    fn rejects_mismatched_layer_dimensions() {
        let artifact = json!({
            "classes": ["benign", "malignant", "normal"],
            "activation": "relu",
            "coefs": [[[0.0, 0.0]], [[0.0, 0.0, 0.0]]],
            "intercepts": [[0.0, 0.0], [0.0, 0.0, 0.0]],
        });
        assert!(matches!(load(artifact), Err(PipelineError::ModelLoad(_))));
    }

    #[test]
    fn rejects_ragged_coefficients() {
        let artifact = json!({
            "classes": ["benign", "malignant", "normal"],
            "activation": "relu",
            "coefs": [[[0.0, 0.0, 0.0], [0.0, 0.0]]],
            "intercepts": [[0.0, 0.0, 0.0]],
        });
        assert!(matches!(load(artifact), Err(PipelineError::ModelLoad(_))));
    }

    #[test]
    fn rejects_wrong_output_width() {
        let artifact = json!({
            "classes": ["benign", "malignant", "normal"],
            "activation": "relu",
            "coefs": [[[0.0, 0.0]]],
            "intercepts": [[0.0, 0.0]],
        });
        assert!(matches!(load(artifact), Err(PipelineError::ModelLoad(_))));
    }

    #[test]
    fn rejects_non_softmax_output() {
        let mut artifact = fixed_distribution_artifact([0.7, 0.1, 0.2]);
        artifact["out_activation"] = json!("logistic");
        assert!(matches!(load(artifact), Err(PipelineError::ModelLoad(_))));
    }

    #[test]
    fn corrupt_artifact_is_a_load_error() {
        let err = MlpClassifier::from_slice(b"\x80\x04pickle").unwrap_err();
        assert!(matches!(err, PipelineError::ModelLoad(_)));
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(fixed_distribution_artifact([0.1, 0.3, 0.6]).to_string().as_bytes())
            .unwrap();

        let classifier = MlpClassifier::from_file(file.path()).unwrap();
        assert_eq!(classifier.input_size(), 2);
        assert_eq!(classifier.predict(&[0.0, 0.0]).unwrap(), 2);
    }

    #[test]
    fn missing_file_is_a_load_error() {
        let err = MlpClassifier::from_file("/nonexistent/mlp.json").unwrap_err();
        assert!(matches!(err, PipelineError::ModelLoad(_)));
    }

    #[test]
    fn argmax_prefers_first_maximum() {
        assert_eq!(argmax(&[0.2, 0.4, 0.4]), Some(1));
        assert_eq!(argmax(&[0.5]), Some(0));
        assert_eq!(argmax(&[]), None);
    }
}
