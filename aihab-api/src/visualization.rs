//! Visualization adapter
//!
//! Produces an attention overlay for a prediction. The overlay is always a
//! 384×384 PNG regardless of the submitted image size, and is shipped to the
//! client base64-encoded. Failures here never fail a prediction; the caller
//! drops the field instead.

use crate::inference::{Classifier, ImageTensor};
use base64::{engine::general_purpose::STANDARD, Engine};
use image::{ImageFormat, Rgb, RgbImage};
use std::io::Cursor;
use thiserror::Error;

/// Edge length of every overlay image
pub const OVERLAY_SIZE: u32 = 384;

/// Fill colour of the placeholder overlay
const PLACEHOLDER_COLOR: [u8; 3] = [200, 200, 200];

/// Visualization errors
#[derive(Debug, Error)]
pub enum VisualizationError {
    /// PNG encoding failed
    #[error("Image encoding error: {0}")]
    Encode(#[from] image::ImageError),

    /// The explainer cannot produce an overlay for this model or input
    #[error("Visualization unavailable: {0}")]
    Unavailable(String),
}

/// Attention-map renderer
pub trait Explainer: Send + Sync {
    /// PNG bytes of an `OVERLAY_SIZE`×`OVERLAY_SIZE` overlay
    fn explain(
        &self,
        model: &dyn Classifier,
        image: &ImageTensor,
    ) -> Result<Vec<u8>, VisualizationError>;
}

/// Uniform grey overlay standing in for a real attention map
#[derive(Debug, Clone, Copy, Default)]
pub struct PlaceholderExplainer;

impl Explainer for PlaceholderExplainer {
    fn explain(
        &self,
        _model: &dyn Classifier,
        _image: &ImageTensor,
    ) -> Result<Vec<u8>, VisualizationError> {
        let overlay = RgbImage::from_pixel(OVERLAY_SIZE, OVERLAY_SIZE, Rgb(PLACEHOLDER_COLOR));
        let mut buf = Cursor::new(Vec::new());
        overlay.write_to(&mut buf, ImageFormat::Png)?;
        Ok(buf.into_inner())
    }
}

/// Standard base64 for the JSON response
pub fn encode_for_transport(png: &[u8]) -> String {
    STANDARD.encode(png)
}
