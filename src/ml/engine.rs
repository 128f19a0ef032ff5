use std::path::Path;

use image::DynamicImage;
use ort::session::Session;
use ort::value::Tensor;

use crate::error::{Error, Result};
use crate::ml::pipeline;

/// Side length of the square input the quality model expects.
pub const DEFAULT_INPUT_SIZE: u32 = 224;

/// A no-reference image quality model served by ONNX Runtime.
///
/// The model takes a `1x3xSxS` RGB tensor in `[0, 1]` and its first output
/// value is read as a BRISQUE-style raw score (lower is better).
pub struct OnnxQuality {
    session: Session,
    input_size: u32,
}

impl OnnxQuality {
    pub fn new(model_path: &Path) -> Result<Self> {
        Self::with_input_size(model_path, DEFAULT_INPUT_SIZE)
    }

    pub fn with_input_size(model_path: &Path, input_size: u32) -> Result<Self> {
        // Re-committing an already initialized environment is harmless.
        let _ = ort::init().with_name("screenpick-quality").commit();

        let session = Session::builder()?
            .with_intra_threads(1)?
            .commit_from_file(model_path)?;

        Ok(Self {
            session,
            input_size,
        })
    }

    pub fn predict(&self, image: &DynamicImage) -> Result<f64> {
        let input = pipeline::normalize_for_quality_model(image, self.input_size);
        let tensor = Tensor::from_array(input)?;
        let outputs = self.session.run(ort::inputs![tensor]?)?;

        let scores = outputs[0].try_extract_tensor::<f32>()?;
        let score = scores
            .iter()
            .next()
            .copied()
            .ok_or_else(|| Error::ModelOutput("empty output tensor".to_string()))?;

        Ok(score as f64)
    }
}
