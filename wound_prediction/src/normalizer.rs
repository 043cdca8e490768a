use crate::error::PredictionError;
use image::imageops::FilterType;
use ndarray::{Array4, ArrayView4};
use std::io::Cursor;

pub const INPUT_HEIGHT: usize = 224;
pub const INPUT_WIDTH: usize = 224;
pub const INPUT_CHANNELS: usize = 3;

/// A single-image NHWC batch of raw `0..=255` intensities.
#[derive(Debug, Clone)]
pub struct ImageTensor(Array4<f32>);

impl ImageTensor {
    pub const SHAPE: [usize; 4] = [1, INPUT_HEIGHT, INPUT_WIDTH, INPUT_CHANNELS];

    pub fn from_array(array: Array4<f32>) -> Result<Self, PredictionError> {
        if array.shape() != Self::SHAPE {
            return Err(PredictionError::Shape(format!(
                "expected image tensor of shape {:?}, got {:?}",
                Self::SHAPE,
                array.shape()
            )));
        }
        Ok(Self(array))
    }

    pub fn zeros() -> Self {
        Self(Array4::zeros((1, INPUT_HEIGHT, INPUT_WIDTH, INPUT_CHANNELS)))
    }

    pub fn shape(&self) -> &[usize] {
        self.0.shape()
    }

    pub fn view(&self) -> ArrayView4<'_, f32> {
        self.0.view()
    }
}

pub fn normalize(raw_bytes: &[u8]) -> Result<ImageTensor, PredictionError> {
    let image_reader = image::ImageReader::new(Cursor::new(raw_bytes))
        .with_guessed_format()
        .map_err(|e| PredictionError::Decode(e.to_string()))?;

    let original_img = image_reader.decode()?;

    let rgb = original_img
        .resize_exact(INPUT_WIDTH as u32, INPUT_HEIGHT as u32, FilterType::Nearest)
        .to_rgb8();

    // RgbImage stores rows top to bottom with interleaved channels, which is
    // already HWC order.
    let data: Vec<f32> = rgb.into_raw().into_iter().map(f32::from).collect();
    let array = Array4::from_shape_vec((1, INPUT_HEIGHT, INPUT_WIDTH, INPUT_CHANNELS), data)
        .map_err(|e| PredictionError::Shape(e.to_string()))?;

    ImageTensor::from_array(array)
}

/// Runs [`normalize`] on the blocking thread pool.
pub async fn normalize_on_pool(raw_bytes: Vec<u8>) -> Result<ImageTensor, PredictionError> {
    tokio::task::spawn_blocking(move || normalize(&raw_bytes))
        .await
        .map_err(|e| PredictionError::Decode(format!("decode task failed: {}", e)))?
}
