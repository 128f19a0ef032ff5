use std::path::Path;

use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView};
use ndarray::{Array, Array2, Array4};

use crate::error::Result;

/// Images wider than this are downscaled before quality scoring.
pub const MAX_ANALYSIS_WIDTH: u32 = 1280;

/// A single-channel image with samples in `[0, 1]`, indexed `[[y, x]]`.
#[derive(Debug, Clone, PartialEq)]
pub struct LumaPlane {
    pub data: Array2<f32>,
}

impl LumaPlane {
    pub fn from_image(image: &DynamicImage) -> Self {
        let gray = image.to_luma8();
        let (width, height) = gray.dimensions();
        let data = Array2::from_shape_fn((height as usize, width as usize), |(y, x)| {
            gray.get_pixel(x as u32, y as u32)[0] as f32 / 255.0
        });
        Self { data }
    }

    pub fn width(&self) -> usize {
        self.data.ncols()
    }

    pub fn height(&self) -> usize {
        self.data.nrows()
    }
}

/// Opens a screenshot as 8-bit RGB, dropping any alpha channel.
pub fn load_rgb(path: &Path) -> Result<DynamicImage> {
    let image = image::open(path)?;
    Ok(DynamicImage::ImageRgb8(image.to_rgb8()))
}

/// Shrinks to [`MAX_ANALYSIS_WIDTH`] keeping the aspect ratio. Narrower
/// images are returned as-is.
pub fn downscale_for_quality(image: &DynamicImage) -> DynamicImage {
    let (width, height) = image.dimensions();
    if width <= MAX_ANALYSIS_WIDTH {
        return image.clone();
    }
    let new_height = (height as f64 * (MAX_ANALYSIS_WIDTH as f64 / width as f64)) as u32;
    image.resize_exact(MAX_ANALYSIS_WIDTH, new_height.max(1), FilterType::Lanczos3)
}

/// NCHW tensor scaled to `[0, 1]` for the ONNX quality model.
pub fn normalize_for_quality_model(image: &DynamicImage, size: u32) -> Array4<f32> {
    let resized = image.resize_exact(size, size, FilterType::Lanczos3);
    let side = size as usize;
    let mut array = Array::zeros((1, 3, side, side));

    for (x, y, pixel) in resized.pixels() {
        let (x, y) = (x as usize, y as usize);
        array[[0, 0, y, x]] = pixel[0] as f32 / 255.0;
        array[[0, 1, y, x]] = pixel[1] as f32 / 255.0;
        array[[0, 2, y, x]] = pixel[2] as f32 / 255.0;
    }

    array
}
