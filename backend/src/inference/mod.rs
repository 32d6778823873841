//! Ultrasound inference: preprocessing, ResNet-50 features, MLP classifier
//! and the suspicious-override decision policy.

pub mod classifier;
pub mod features;
pub mod pipeline;
pub mod policy;
pub mod preprocess;
pub mod weights;

use shared::UltrasoundClass;

pub use classifier::{Classifier, MlpClassifier};
pub use features::{FeatureExtractor, ResNetExtractor};
pub use pipeline::{Assessment, Pipeline};
pub use policy::{Decision, DecisionPolicy, FinalLabel};
pub use preprocess::{ImagePreprocessor, Normalization};

/// Raw classifier output for one image.
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub class: UltrasoundClass,
    pub probabilities: Vec<f64>,
}

impl Prediction {
    /// Probability of the predicted class.
    pub fn confidence(&self) -> f64 {
        self.probability_of(self.class)
    }

    pub fn malignant_probability(&self) -> f64 {
        self.probability_of(UltrasoundClass::Malignant)
    }

    fn probability_of(&self, class: UltrasoundClass) -> f64 {
        self.probabilities.get(class.index()).copied().unwrap_or(0.0)
    }
}
