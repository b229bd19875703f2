//! Prediction assembler
//!
//! Turns raw image bytes and request parameters into a ranked, hierarchy-
//! enriched response:
//!
//! 1. Validate parameters (before any decoding or inference)
//! 2. Decode + normalize the image, run the classifier
//! 3. Select the top-N probabilities (stable on ties)
//! 4. Resolve each label's ancestor chain
//! 5. Attach secondary codes when requested
//! 6. Rank by descending confidence
//! 7. Attach the visualization overlay when requested (best effort)
//! 8. Stamp timing, model version and the resolved request
//!
//! The assembler holds no per-request state; concurrent calls share only the
//! read-only taxonomy, label table and loaded model.

use crate::inference::{preprocess, Classifier, ImageTensor, InferenceError, ModelHandle};
use crate::labels::LabelTable;
use crate::types::{
    HabitatResults, HabitatScheme, PredictParams, PredictRequest, PredictionCandidate,
    PredictionResponse, SecondaryCode,
};
use crate::visualization::{encode_for_transport, Explainer, PlaceholderExplainer};
use aihab_common::{HierarchyResolver, TaxonomyError, TaxonomyStore, MAX_HIERARCHY_LEVEL};
use chrono::Utc;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Defaults applied to omitted request parameters
pub const DEFAULT_TOP_N: usize = 3;
pub const DEFAULT_PREDICTED_LEVEL: u32 = 3;

/// Prediction errors
#[derive(Debug, Error)]
pub enum PredictError {
    /// Scheme outside the recognized enumeration (malformed request)
    #[error("Invalid habitat classification type '{0}'. Must be 'ukhab' or 'eunis'.")]
    InvalidScheme(String),

    /// Recognized scheme that is not implemented yet
    #[error("UK-Hab is the only habitat classification supported currently; '{0}' is not yet available.")]
    UnsupportedScheme(String),

    #[error("top_n must be between 1 and {max}, got {value}")]
    InvalidTopN { value: i64, max: usize },

    #[error("ukhab_predicted_level must be between 1 and {max}, got {value}")]
    InvalidLevel { value: i64, max: u32 },

    #[error("Invalid parameter '{name}': {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    #[error("Could not decode image: {0}")]
    ImageDecode(String),

    /// Model still loading (retriable)
    #[error("Model is not loaded yet, retry shortly")]
    ModelNotReady,

    #[error("Inference error: {0}")]
    Inference(InferenceError),

    /// Taxonomy and label table disagree (our data is broken)
    #[error("Taxonomy integrity error: {0}")]
    Taxonomy(#[from] TaxonomyError),
}

impl From<InferenceError> for PredictError {
    fn from(err: InferenceError) -> Self {
        match err {
            InferenceError::NotReady => PredictError::ModelNotReady,
            other => PredictError::Inference(other),
        }
    }
}

impl PredictError {
    /// Caller sent something invalid; retrying the same request cannot succeed
    pub fn is_input_fault(&self) -> bool {
        matches!(
            self,
            PredictError::InvalidScheme(_)
                | PredictError::UnsupportedScheme(_)
                | PredictError::InvalidTopN { .. }
                | PredictError::InvalidLevel { .. }
                | PredictError::InvalidParameter { .. }
                | PredictError::ImageDecode(_)
        )
    }

    /// Caller may retry the same request later
    pub fn is_retriable(&self) -> bool {
        matches!(self, PredictError::ModelNotReady)
    }

    /// Fault in the taxonomy data rather than the request
    pub fn is_data_integrity_fault(&self) -> bool {
        matches!(self, PredictError::Taxonomy(_))
    }
}

/// Source of secondary (modifier) codes for a primary habitat
pub trait SecondaryCodeSource: Send + Sync {
    fn secondary_codes(&self, primary_code: &str, image: &ImageTensor) -> Vec<SecondaryCode>;
}

/// No secondary code model available: always empty
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSecondaryCodes;

impl SecondaryCodeSource for NoSecondaryCodes {
    fn secondary_codes(&self, _primary_code: &str, _image: &ImageTensor) -> Vec<SecondaryCode> {
        Vec::new()
    }
}

/// Response-level settings
#[derive(Debug, Clone)]
pub struct PredictorSettings {
    /// Reported as `ukhab_version` on every candidate
    pub taxonomy_version: String,
    pub user_message: Option<String>,
}

impl Default for PredictorSettings {
    fn default() -> Self {
        Self {
            taxonomy_version: "2.01".to_string(),
            user_message: Some("In development, use with caution.".to_string()),
        }
    }
}

/// Stateless prediction pipeline over shared read-only resources
pub struct Predictor {
    taxonomy: Arc<TaxonomyStore>,
    labels: Arc<LabelTable>,
    model: Arc<ModelHandle>,
    explainer: Arc<dyn Explainer>,
    secondary: Arc<dyn SecondaryCodeSource>,
    settings: PredictorSettings,
}

impl Predictor {
    pub fn new(taxonomy: Arc<TaxonomyStore>, labels: Arc<LabelTable>, model: Arc<ModelHandle>) -> Self {
        Self {
            taxonomy,
            labels,
            model,
            explainer: Arc::new(PlaceholderExplainer),
            secondary: Arc::new(NoSecondaryCodes),
            settings: PredictorSettings::default(),
        }
    }

    pub fn with_explainer(mut self, explainer: Arc<dyn Explainer>) -> Self {
        self.explainer = explainer;
        self
    }

    pub fn with_secondary_codes(mut self, source: Arc<dyn SecondaryCodeSource>) -> Self {
        self.secondary = source;
        self
    }

    pub fn with_settings(mut self, settings: PredictorSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn model(&self) -> &Arc<ModelHandle> {
        &self.model
    }

    pub fn taxonomy(&self) -> &TaxonomyStore {
        &self.taxonomy
    }

    pub fn labels(&self) -> &LabelTable {
        &self.labels
    }

    /// Check parameters and resolve defaults
    ///
    /// Scheme is checked first: an unknown value is `InvalidScheme`, a
    /// recognized but unimplemented one is `UnsupportedScheme`.
    pub fn validate(&self, params: PredictParams) -> Result<PredictRequest, PredictError> {
        let scheme: HabitatScheme = params
            .habitat_classifications
            .as_deref()
            .unwrap_or(HabitatScheme::Ukhab.as_str())
            .parse()?;
        if !scheme.is_supported() {
            return Err(PredictError::UnsupportedScheme(scheme.as_str().to_string()));
        }

        let max_top_n = self.labels.len();
        let top_n = match params.top_n {
            None => DEFAULT_TOP_N.min(max_top_n),
            Some(value) if value >= 1 && value as u64 <= max_top_n as u64 => value as usize,
            Some(value) => return Err(PredictError::InvalidTopN { value, max: max_top_n }),
        };

        let ukhab_predicted_level = match params.ukhab_predicted_level {
            None => DEFAULT_PREDICTED_LEVEL,
            Some(value) if (1..=MAX_HIERARCHY_LEVEL as i64).contains(&value) => value as u32,
            Some(value) => {
                return Err(PredictError::InvalidLevel {
                    value,
                    max: MAX_HIERARCHY_LEVEL,
                })
            }
        };

        if let Some(latitude) = params.latitude {
            if !(-90.0..=90.0).contains(&latitude) {
                return Err(PredictError::InvalidParameter {
                    name: "latitude",
                    reason: format!("must be between -90 and 90, got {}", latitude),
                });
            }
        }
        if let Some(longitude) = params.longitude {
            if !(-180.0..=180.0).contains(&longitude) {
                return Err(PredictError::InvalidParameter {
                    name: "longitude",
                    reason: format!("must be between -180 and 180, got {}", longitude),
                });
            }
        }

        let model_version = params
            .model_version
            .or_else(|| self.model.version())
            .unwrap_or_else(|| "default".to_string());

        Ok(PredictRequest {
            habitat_classifications: scheme,
            date_time: params.date_time,
            sensor_type: params.sensor_type,
            top_n,
            latitude: params.latitude,
            longitude: params.longitude,
            species_list: params.species_list,
            model_version,
            ukhab_predicted_level,
            ukhab_secondary_codes: params.ukhab_secondary_codes.unwrap_or(false),
            gradcam: params.gradcam.unwrap_or(false),
        })
    }

    /// Classify one image
    pub fn predict(
        &self,
        image_bytes: &[u8],
        params: PredictParams,
    ) -> Result<PredictionResponse, PredictError> {
        let started = Instant::now();

        let request = self.validate(params)?;
        let model = self.model.get()?;

        let image =
            preprocess(image_bytes).map_err(|e| PredictError::ImageDecode(e.to_string()))?;
        let probabilities = model.classify(&image)?;
        if probabilities.len() != self.labels.len() {
            return Err(InferenceError::OutputShape {
                expected: self.labels.len(),
                actual: probabilities.len(),
            }
            .into());
        }

        let selected = select_top_n(&probabilities, request.top_n);
        let resolver = HierarchyResolver::new(&self.taxonomy);

        let mut candidates = Vec::with_capacity(selected.len());
        for (index, confidence) in selected {
            let code = self.labels.code(index).ok_or(InferenceError::OutputShape {
                expected: self.labels.len(),
                actual: probabilities.len(),
            })?;

            let hierarchy = resolver.resolve(code).map_err(|e| {
                error!("Taxonomy cannot resolve label '{}': {}", code, e);
                e
            })?;
            let leaf = match hierarchy.last() {
                Some(leaf) => leaf.clone(),
                None => return Err(TaxonomyError::UnknownCode(code.to_string()).into()),
            };

            let secondary_codes = if request.ukhab_secondary_codes {
                self.secondary.secondary_codes(code, &image)
            } else {
                Vec::new()
            };

            candidates.push(PredictionCandidate {
                predicted_level: request.ukhab_predicted_level,
                confidence,
                rank: 0,
                code: leaf.code,
                name: leaf.name,
                definition: leaf.definition,
                hierarchy,
                secondary_codes,
                taxonomy_version: self.settings.taxonomy_version.clone(),
            });
        }

        rank_candidates(&mut candidates);

        let visualization = if request.gradcam {
            self.visualize(model.as_ref(), &image)
        } else {
            None
        };

        let inference_time_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        if let Some(top) = candidates.first() {
            info!(
                "Predicted {} ({:.3}) among {} candidates in {} ms",
                top.code,
                top.confidence,
                candidates.len(),
                inference_time_ms
            );
        }

        Ok(PredictionResponse {
            results: HabitatResults { ukhab: candidates },
            timestamp: Utc::now(),
            inference_time_ms,
            model_version: model.version().to_string(),
            user_message: self.settings.user_message.clone(),
            visualization,
            request_metadata: request,
        })
    }

    /// Best-effort overlay; failures are logged and dropped
    fn visualize(&self, model: &dyn Classifier, image: &ImageTensor) -> Option<String> {
        match self.explainer.explain(model, image) {
            Ok(png) => {
                debug!("Attached {} byte visualization overlay", png.len());
                Some(encode_for_transport(&png))
            }
            Err(e) => {
                warn!("Visualization skipped: {}", e);
                None
            }
        }
    }
}

/// Indices and probabilities of the `n` highest entries
///
/// Equal probabilities keep label-table order.
pub fn select_top_n(probabilities: &[f32], n: usize) -> Vec<(usize, f32)> {
    let mut indexed: Vec<(usize, f32)> = probabilities.iter().copied().enumerate().collect();
    indexed.sort_by(|a, b| b.1.total_cmp(&a.1));
    indexed.truncate(n);
    indexed
}

/// Order by descending confidence and assign dense 1-based ranks
///
/// Stable: equal confidences keep their incoming order.
pub fn rank_candidates(candidates: &mut [PredictionCandidate]) {
    candidates.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
    for (idx, candidate) in candidates.iter_mut().enumerate() {
        candidate.rank = idx + 1;
    }
}
