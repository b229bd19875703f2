//! Inference adapter
//!
//! Wraps the loaded classification network behind the [`Classifier`] trait
//! and guards its one-time loading with [`ModelHandle`].
//!
//! Contract consumed by the prediction assembler: `classify` returns one
//! probability per entry of the label table, non-negative and summing to 1,
//! deterministic for a given model and input.

pub mod preprocess;

#[cfg(feature = "onnx")]
pub mod onnx;

pub use preprocess::{preprocess, ImageTensor, INPUT_SIZE};

use serde::Serialize;
use std::path::Path;
use std::sync::{Arc, RwLock};
use thiserror::Error;
use tokio::sync::OnceCell;
use tracing::{error, info};

/// Inference errors
#[derive(Debug, Error)]
pub enum InferenceError {
    /// Model has not finished loading (retriable)
    #[error("Model is not loaded")]
    NotReady,

    /// Model could not be loaded
    #[error("Model load failed: {0}")]
    Load(String),

    /// Forward pass failed
    #[error("Inference failed: {0}")]
    Run(String),

    /// Model output does not match the label table
    #[error("Model returned {actual} scores, expected {expected}")]
    OutputShape { expected: usize, actual: usize },
}

/// A loaded image classification network
///
/// Implementations must be safe for concurrent read-only inference.
pub trait Classifier: Send + Sync {
    /// Version string reported in prediction responses
    fn version(&self) -> &str;

    /// Raw class scores for one preprocessed image
    fn logits(&self, image: &ImageTensor) -> Result<Vec<f32>, InferenceError>;

    /// Class probabilities for one preprocessed image
    fn classify(&self, image: &ImageTensor) -> Result<Vec<f32>, InferenceError> {
        let logits = self.logits(image)?;
        if logits.iter().any(|v| !v.is_finite()) {
            return Err(InferenceError::Run(
                "model produced non-finite scores".to_string(),
            ));
        }
        Ok(softmax(&logits))
    }
}

/// Normalized exponential over raw scores
///
/// Shifts by the maximum before exponentiating so large logits don't
/// overflow. Equal logits give equal probabilities.
pub fn softmax(logits: &[f32]) -> Vec<f32> {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = logits.iter().map(|&v| (v - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    exps.into_iter().map(|v| v / sum).collect()
}

/// Model readiness as seen by callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelState {
    Loading,
    Ready,
    Failed,
}

/// Single-initialization slot for the loaded model
///
/// Callers see either "not loaded yet" or a fully loaded model, never a
/// partial one. Concurrent load triggers share one in-flight load. A failed
/// load leaves the slot empty and records the error; the service triggers a
/// single load at startup, so the handle then reports `Failed` until restart.
pub struct ModelHandle {
    model: OnceCell<Arc<dyn Classifier>>,
    last_error: RwLock<Option<String>>,
}

impl ModelHandle {
    /// Empty handle; `get` fails with `NotReady` until a load succeeds
    pub fn new() -> Self {
        Self {
            model: OnceCell::new(),
            last_error: RwLock::new(None),
        }
    }

    /// Handle holding an already-loaded model
    pub fn with_model(model: Arc<dyn Classifier>) -> Self {
        Self {
            model: OnceCell::new_with(Some(model)),
            last_error: RwLock::new(None),
        }
    }

    /// Load the model on the blocking pool, at most once
    ///
    /// Returns immediately if a model is already loaded; waits on the
    /// in-flight load if another caller started one.
    pub async fn load_with<F>(&self, loader: F) -> Result<(), InferenceError>
    where
        F: FnOnce() -> Result<Arc<dyn Classifier>, InferenceError> + Send + 'static,
    {
        let result = self
            .model
            .get_or_try_init(|| async move {
                tokio::task::spawn_blocking(loader)
                    .await
                    .map_err(|e| InferenceError::Load(format!("model load task failed: {}", e)))?
            })
            .await;

        match result {
            Ok(model) => {
                info!("Model ready (version {})", model.version());
                self.set_last_error(None);
                Ok(())
            }
            Err(e) => {
                error!("{}", e);
                self.set_last_error(Some(e.to_string()));
                Err(e)
            }
        }
    }

    /// The loaded model, or `NotReady`
    pub fn get(&self) -> Result<Arc<dyn Classifier>, InferenceError> {
        self.model.get().cloned().ok_or(InferenceError::NotReady)
    }

    /// Class probabilities from the loaded model
    pub fn is_ready(&self) -> bool {
        self.model.initialized()
    }

    pub fn state(&self) -> ModelState {
        if self.is_ready() {
            ModelState::Ready
        } else if self.last_error().is_some() {
            ModelState::Failed
        } else {
            ModelState::Loading
        }
    }

    /// Version of the loaded model, if any
    pub fn version(&self) -> Option<String> {
        self.model.get().map(|m| m.version().to_string())
    }

    /// Message from the most recent failed load
    pub fn last_error(&self) -> Option<String> {
        self.last_error
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn set_last_error(&self, message: Option<String>) {
        *self
            .last_error
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = message;
    }
}

impl Default for ModelHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// Open the configured model with whichever backend this build carries
pub fn open_model(
    path: Option<&Path>,
    version: &str,
) -> Result<Arc<dyn Classifier>, InferenceError> {
    #[cfg(feature = "onnx")]
    {
        let path = path.ok_or_else(|| {
            InferenceError::Load("no model path configured (set AIHAB_MODEL_PATH)".to_string())
        })?;
        let model = onnx::OnnxClassifier::load(path, version)?;
        Ok(Arc::new(model))
    }

    #[cfg(not(feature = "onnx"))]
    {
        let _ = (path, version);
        Err(InferenceError::Load(
            "built without a model backend; rebuild with the `onnx` feature".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct ConstantClassifier {
        logits: Vec<f32>,
    }

    impl Classifier for ConstantClassifier {
        fn version(&self) -> &str {
            "test-v1"
        }

        fn logits(&self, _image: &ImageTensor) -> Result<Vec<f32>, InferenceError> {
            Ok(self.logits.clone())
        }
    }

    fn blank_image() -> ImageTensor {
        ImageTensor::from_chw(2, 2, vec![0.0; 12])
    }

    #[test]
    fn test_softmax_is_distribution() {
        let probs = softmax(&[2.0, 1.0, 0.1, -3.0]);

        let sum: f32 = probs.iter().sum();
        assert!((sum - 1.0).abs() < 1e-5);
        assert!(probs.iter().all(|&p| p >= 0.0));
        assert!(probs[0] > probs[1] && probs[1] > probs[2] && probs[2] > probs[3]);
    }

    #[test]
    fn test_softmax_large_logits_do_not_overflow() {
        let probs = softmax(&[1000.0, 1000.0]);
        assert_eq!(probs, vec![0.5, 0.5]);
    }

    #[test]
    fn test_classify_rejects_non_finite_scores() {
        let model = ConstantClassifier {
            logits: vec![1.0, f32::NAN],
        };
        assert!(matches!(
            model.classify(&blank_image()),
            Err(InferenceError::Run(_))
        ));
    }

    #[test]
    fn test_empty_handle_is_not_ready() {
        let handle = ModelHandle::new();

        assert!(!handle.is_ready());
        assert_eq!(handle.state(), ModelState::Loading);
        assert!(handle.version().is_none());
        assert!(matches!(handle.get(), Err(InferenceError::NotReady)));
    }

    #[tokio::test]
    async fn test_load_with_marks_ready() {
        let handle = ModelHandle::new();
        handle
            .load_with(|| {
                Ok(Arc::new(ConstantClassifier {
                    logits: vec![0.0, 1.0],
                }) as Arc<dyn Classifier>)
            })
            .await
            .unwrap();

        assert_eq!(handle.state(), ModelState::Ready);
        assert_eq!(handle.version().as_deref(), Some("test-v1"));
        let model = handle.get().unwrap();
        assert_eq!(model.classify(&blank_image()).unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_failed_load_is_reported_and_retriable() {
        let handle = ModelHandle::new();
        let result = handle
            .load_with(|| Err(InferenceError::Load("weights missing".to_string())))
            .await;

        assert!(result.is_err());
        assert_eq!(handle.state(), ModelState::Failed);
        assert!(handle.last_error().unwrap().contains("weights missing"));

        handle
            .load_with(|| {
                Ok(Arc::new(ConstantClassifier { logits: vec![1.0] }) as Arc<dyn Classifier>)
            })
            .await
            .unwrap();
        assert_eq!(handle.state(), ModelState::Ready);
        assert!(handle.last_error().is_none());
    }

    #[tokio::test]
    async fn test_concurrent_loads_run_loader_once() {
        let handle = Arc::new(ModelHandle::new());
        let calls = Arc::new(AtomicUsize::new(0));

        let mut tasks = Vec::new();
        for _ in 0..8 {
            let handle = handle.clone();
            let calls = calls.clone();
            tasks.push(tokio::spawn(async move {
                handle
                    .load_with(move || {
                        calls.fetch_add(1, Ordering::SeqCst);
                        std::thread::sleep(std::time::Duration::from_millis(20));
                        Ok(Arc::new(ConstantClassifier { logits: vec![1.0] })
                            as Arc<dyn Classifier>)
                    })
                    .await
            }));
        }
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(handle.is_ready());
    }

    #[cfg(not(feature = "onnx"))]
    #[test]
    fn test_open_model_without_backend_fails() {
        let result = open_model(None, "default");
        assert!(matches!(result, Err(InferenceError::Load(_))));
    }
}
