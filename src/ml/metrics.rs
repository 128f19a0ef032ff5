use std::path::Path;

use image::DynamicImage;
use tracing::info;

use crate::error::Result;
use crate::ml::engine::OnnxQuality;
use crate::ml::naturalness::NaturalnessQuality;
use crate::ml::pipeline::LumaPlane;
use crate::ml::sharpness::DomSharpness;

/// The two image metrics the selector needs.
///
/// Implementations must be callable from several scoring workers at once.
pub trait ImageMetrics: Send + Sync {
    /// No-reference quality, lower is better. Expected in `[0, 100]`.
    fn score_quality(&self, image: &DynamicImage) -> Result<f64>;

    /// Edge sharpness, higher is better. Expected in `[0, sqrt(2)]`.
    fn score_sharpness(&self, image: &DynamicImage) -> Result<f64>;
}

pub enum QualityBackend {
    Naturalness(NaturalnessQuality),
    Onnx(OnnxQuality),
}

pub struct AnalysisMetrics {
    quality: QualityBackend,
    sharpness: DomSharpness,
}

impl AnalysisMetrics {
    pub fn builtin() -> Self {
        Self {
            quality: QualityBackend::Naturalness(NaturalnessQuality::default()),
            sharpness: DomSharpness::default(),
        }
    }

    /// Uses the ONNX quality model when a path is given.
    pub fn from_model(model_path: Option<&Path>) -> Result<Self> {
        let Some(path) = model_path else {
            info!("no quality model configured, using the built-in estimator");
            return Ok(Self::builtin());
        };

        info!("loading quality model from {:?}", path);
        Ok(Self {
            quality: QualityBackend::Onnx(OnnxQuality::new(path)?),
            sharpness: DomSharpness::default(),
        })
    }
}

impl ImageMetrics for AnalysisMetrics {
    fn score_quality(&self, image: &DynamicImage) -> Result<f64> {
        match &self.quality {
            QualityBackend::Naturalness(estimator) => {
                Ok(estimator.score(&LumaPlane::from_image(image)))
            }
            QualityBackend::Onnx(model) => model.predict(image),
        }
    }

    fn score_sharpness(&self, image: &DynamicImage) -> Result<f64> {
        Ok(self.sharpness.estimate(&LumaPlane::from_image(image)))
    }
}
