//! Image preprocessing
//!
//! Fixed transform matching the network's training pipeline: decode, RGB,
//! bilinear resize to 384×384, scale to [0, 1], normalize with ImageNet
//! statistics, planar CHW layout.

use image::imageops::{self, FilterType};

/// Square input edge expected by the network
pub const INPUT_SIZE: u32 = 384;

const MEAN: [f32; 3] = [0.485, 0.456, 0.406];
const STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Decoded, normalized image in CHW layout (3 channels)
#[derive(Debug, Clone, PartialEq)]
pub struct ImageTensor {
    pub width: u32,
    pub height: u32,
    pub data: Vec<f32>,
}

impl ImageTensor {
    /// Wrap planar CHW data
    ///
    /// # Panics
    /// If `data.len() != 3 * width * height`
    pub fn from_chw(width: u32, height: u32, data: Vec<f32>) -> Self {
        assert_eq!(
            data.len(),
            3 * width as usize * height as usize,
            "CHW buffer size does not match dimensions"
        );
        Self {
            width,
            height,
            data,
        }
    }

    /// Values of one channel plane
    #[cfg(test)]
    pub fn channel(&self, c: usize) -> &[f32] {
        let plane = self.width as usize * self.height as usize;
        &self.data[c * plane..(c + 1) * plane]
    }
}

/// Decode raw image bytes into the network's input tensor
pub fn preprocess(bytes: &[u8]) -> Result<ImageTensor, image::ImageError> {
    let rgb = image::load_from_memory(bytes)?.to_rgb8();
    let resized = imageops::resize(&rgb, INPUT_SIZE, INPUT_SIZE, FilterType::Triangle);

    let plane = (INPUT_SIZE * INPUT_SIZE) as usize;
    let mut data = vec![0.0f32; 3 * plane];
    for (x, y, pixel) in resized.enumerate_pixels() {
        let idx = (y * INPUT_SIZE + x) as usize;
        for c in 0..3 {
            data[c * plane + idx] = (pixel[c] as f32 / 255.0 - MEAN[c]) / STD[c];
        }
    }

    Ok(ImageTensor::from_chw(INPUT_SIZE, INPUT_SIZE, data))
}
