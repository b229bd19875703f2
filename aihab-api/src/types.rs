//! Prediction request and response types
//!
//! Field names on the wire follow the published AI-Hab response format
//! (`results.ukhab`, `primary_habitat_hierarchy`, `gradcam_image`, ...).

use crate::predict::PredictError;
use aihab_common::HierarchyLevel;
use chrono::{DateTime, Utc};
use serde::{de, Deserialize, Deserializer, Serialize};
use std::str::FromStr;

// ========================================
// Request Types
// ========================================

/// Habitat classification schemes the API recognizes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HabitatScheme {
    /// UK Habitat Classification (supported)
    Ukhab,
    /// EUNIS (reserved, not implemented)
    Eunis,
}

impl HabitatScheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            HabitatScheme::Ukhab => "ukhab",
            HabitatScheme::Eunis => "eunis",
        }
    }

    pub fn is_supported(&self) -> bool {
        matches!(self, HabitatScheme::Ukhab)
    }
}

impl FromStr for HabitatScheme {
    type Err = PredictError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ukhab" => Ok(HabitatScheme::Ukhab),
            "eunis" => Ok(HabitatScheme::Eunis),
            other => Err(PredictError::InvalidScheme(other.to_string())),
        }
    }
}

/// Prediction parameters as submitted (HTTP query string)
///
/// Everything is optional; [`crate::predict::Predictor::validate`] fills
/// defaults and range-checks into a [`PredictRequest`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PredictParams {
    pub habitat_classifications: Option<String>,
    pub top_n: Option<i64>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    /// Comma-separated species names
    pub species_list: Option<String>,
    /// Capture time of the photograph
    pub date_time: Option<String>,
    pub sensor_type: Option<String>,
    pub model_version: Option<String>,
    pub ukhab_predicted_level: Option<i64>,
    #[serde(default, deserialize_with = "lenient_flag")]
    pub ukhab_secondary_codes: Option<bool>,
    #[serde(default, deserialize_with = "lenient_flag")]
    pub gradcam: Option<bool>,
}

/// Boolean query flag accepting `true/false`, `1/0`, `yes/no`, `on/off`,
/// `t/f`, `y/n` in any case
fn lenient_flag<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Text(String),
    }

    match Option::<Flag>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Flag::Bool(value)) => Ok(Some(value)),
        Some(Flag::Text(text)) => match text.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "on" | "t" | "y" => Ok(Some(true)),
            "false" | "0" | "no" | "off" | "f" | "n" => Ok(Some(false)),
            other => Err(de::Error::custom(format!(
                "expected a boolean flag, got '{}'",
                other
            ))),
        },
    }
}

/// Validated request with defaults resolved
///
/// Echoed verbatim as `request_metadata` in the response.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictRequest {
    pub habitat_classifications: HabitatScheme,
    pub date_time: Option<String>,
    pub sensor_type: Option<String>,
    pub top_n: usize,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub species_list: Option<String>,
    pub model_version: String,
    pub ukhab_predicted_level: u32,
    pub ukhab_secondary_codes: bool,
    pub gradcam: bool,
}

// ========================================
// Response Types
// ========================================

/// Modifier classification attached to a primary habitat
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SecondaryCode {
    pub name: String,
    pub code: String,
    pub confidence: Option<f32>,
}

/// One ranked classification result
///
/// `code`, `name` and `definition` repeat the last entry of `hierarchy`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionCandidate {
    /// Level the prediction was requested at
    pub predicted_level: u32,
    /// Probability assigned by the model (0.0-1.0)
    pub confidence: f32,
    /// 1-based position by descending confidence (ties keep input order)
    pub rank: usize,
    pub code: String,
    pub name: String,
    pub definition: String,
    /// Ancestor chain, root first
    #[serde(rename = "primary_habitat_hierarchy")]
    pub hierarchy: Vec<HierarchyLevel>,
    /// Always present; empty when not requested
    pub secondary_codes: Vec<SecondaryCode>,
    #[serde(rename = "ukhab_version")]
    pub taxonomy_version: String,
}

/// Candidates grouped by classification scheme
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HabitatResults {
    pub ukhab: Vec<PredictionCandidate>,
}

/// Full prediction response envelope
#[derive(Debug, Clone, Serialize)]
pub struct PredictionResponse {
    pub results: HabitatResults,
    pub timestamp: DateTime<Utc>,
    pub inference_time_ms: u64,
    pub model_version: String,
    pub user_message: Option<String>,
    /// Base64 PNG attention overlay
    #[serde(rename = "gradcam_image")]
    pub visualization: Option<String>,
    pub request_metadata: PredictRequest,
}

impl PredictionResponse {
    /// Ranked candidates
    pub fn candidates(&self) -> &[PredictionCandidate] {
        &self.results.ukhab
    }
}
