//! ONNX model backend (tract)
//!
//! Loads a local ONNX export of the habitat network. Fetching weights from
//! a model hub is left to deployment tooling.

use super::{Classifier, ImageTensor, InferenceError, INPUT_SIZE};
use std::path::Path;
use tract_onnx::prelude::*;
use tracing::info;

/// Classifier running an optimized tract plan
pub struct OnnxClassifier {
    plan: TypedSimplePlan<TypedModel>,
    version: String,
}

impl OnnxClassifier {
    /// Load and optimize the model at `path` for a 1×3×384×384 input
    pub fn load(path: &Path, version: impl Into<String>) -> Result<Self, InferenceError> {
        let edge = INPUT_SIZE as usize;
        let plan = tract_onnx::onnx()
            .model_for_path(path)
            .and_then(|model| model.with_input_fact(0, f32::fact([1, 3, edge, edge]).into()))
            .and_then(|model| model.into_optimized())
            .and_then(|model| model.into_runnable())
            .map_err(|e| InferenceError::Load(format!("{}: {}", path.display(), e)))?;

        let version = version.into();
        info!("Loaded ONNX model {} (version {})", path.display(), version);
        Ok(Self { plan, version })
    }
}

impl Classifier for OnnxClassifier {
    fn version(&self) -> &str {
        &self.version
    }

    fn logits(&self, image: &ImageTensor) -> Result<Vec<f32>, InferenceError> {
        let shape = (1, 3, image.height as usize, image.width as usize);
        let input: Tensor = tract_ndarray::Array4::from_shape_vec(shape, image.data.clone())
            .map_err(|e| InferenceError::Run(format!("input tensor: {}", e)))?
            .into();

        let outputs = self
            .plan
            .run(tvec!(input.into()))
            .map_err(|e| InferenceError::Run(e.to_string()))?;

        let scores = outputs[0]
            .to_array_view::<f32>()
            .map_err(|e| InferenceError::Run(format!("output tensor: {}", e)))?;

        Ok(scores.iter().copied().collect())
    }
}
