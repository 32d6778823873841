use sha2::{Digest, Sha256};
use shared::{InferenceResponse, UltrasoundClass};
use std::path::Path;
use std::time::Instant;
use uuid::Uuid;

use super::classifier::{Classifier, MlpClassifier};
use super::features::{FeatureExtractor, ResNetExtractor};
use super::policy::{Decision, DecisionPolicy};
use super::preprocess::ImagePreprocessor;
use super::Prediction;
use crate::config::AppConfig;
use crate::error::PipelineError;

/// Outcome of classifying one uploaded image.
#[derive(Debug, Clone, PartialEq)]
pub struct Assessment {
    pub image_hash: String,
    pub prediction: Prediction,
    pub decision: Decision,
    pub threshold: f64,
}

impl Assessment {
    pub fn into_response(self, id: Uuid) -> InferenceResponse {
        InferenceResponse {
            id,
            image_hash: self.image_hash,
            predicted_class: self.prediction.class,
            class_labels: UltrasoundClass::labels(),
            confidence: self.prediction.confidence(),
            malignant_probability: self.prediction.malignant_probability(),
            predictions: self.prediction.probabilities,
            final_label: self.decision.label.to_string(),
            referral: self.decision.referral,
            threshold: self.threshold,
        }
    }
}

pub fn image_hash(image: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(image);
    hex::encode(hasher.finalize())
}

/// Long-lived inference service. Built once at startup and shared read-only
/// by every request.
pub struct Pipeline {
    preprocessor: ImagePreprocessor,
    extractor: Box<dyn FeatureExtractor>,
    classifier: Box<dyn Classifier>,
    policy: DecisionPolicy,
}

impl Pipeline {
    pub fn new(
        preprocessor: ImagePreprocessor,
        extractor: Box<dyn FeatureExtractor>,
        classifier: Box<dyn Classifier>,
        policy: DecisionPolicy,
    ) -> Result<Self, PipelineError> {
        if extractor.embedding_size() != classifier.input_size() {
            return Err(PipelineError::ModelLoad(format!(
                "feature extractor emits {} values but classifier expects {}",
                extractor.embedding_size(),
                classifier.input_size()
            )));
        }

        Ok(Self {
            preprocessor,
            extractor,
            classifier,
            policy,
        })
    }

    pub fn load(config: &AppConfig, weights_path: &Path) -> Result<Self, PipelineError> {
        let extractor = ResNetExtractor::load(weights_path, config.models.embedding_size)?;
        let classifier = MlpClassifier::from_file(&config.models.classifier_path)?;

        Self::new(
            ImagePreprocessor::from_config(config),
            Box::new(extractor),
            Box::new(classifier),
            DecisionPolicy::new(config.policy.threshold),
        )
    }

    pub fn preprocessor(&self) -> &ImagePreprocessor {
        &self.preprocessor
    }

    pub fn embedding_size(&self) -> usize {
        self.extractor.embedding_size()
    }

    pub fn threshold(&self) -> f64 {
        self.policy.threshold()
    }

    pub fn classify(&self, image: &[u8]) -> Result<Assessment, PipelineError> {
        let started = Instant::now();
        let image_hash = image_hash(image);

        let tensor = self.preprocessor.preprocess(image)?;
        let preprocessed = started.elapsed();

        let embedding = self.extractor.extract(&tensor)?;
        let extracted = started.elapsed();

        let index = self.classifier.predict(&embedding)?;
        let probabilities = self.classifier.predict_proba(&embedding)?;
        if probabilities.len() != UltrasoundClass::COUNT {
            return Err(PipelineError::Inference(format!(
                "classifier returned {} probabilities, expected {}",
                probabilities.len(),
                UltrasoundClass::COUNT
            )));
        }
        let class = UltrasoundClass::from_index(index).ok_or_else(|| {
            PipelineError::Inference(format!("classifier predicted unknown class index {index}"))
        })?;

        let prediction = Prediction {
            class,
            probabilities,
        };
        let decision = self.policy.decide(&prediction);

        log::debug!(
            "Image {image_hash}: preprocess {:?}, features {:?}, total {:?}, probabilities {:?}",
            preprocessed,
            extracted - preprocessed,
            started.elapsed(),
            prediction.probabilities
        );
        log::info!(
            "Image {image_hash}: predicted {} ({:.3}), malignant {:.3}, final label {}, referral {}",
            prediction.class,
            prediction.confidence(),
            prediction.malignant_probability(),
            decision.label,
            decision.referral
        );

        Ok(Assessment {
            image_hash,
            prediction,
            decision,
            threshold: self.policy.threshold(),
        })
    }
}
