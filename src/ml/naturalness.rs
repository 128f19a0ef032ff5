//! Built-in no-reference quality estimate from natural scene statistics.
//!
//! Undistorted photographs have mean-subtracted contrast-normalized (MSCN)
//! luminance coefficients that follow a roughly Gaussian distribution. Blur,
//! blocking and noise push the fitted generalized Gaussian shape and the
//! coefficient variance away from that reference. The distance is mapped to
//! `[0, 100]` where 0 means "looks pristine", matching the orientation of
//! BRISQUE-style scores.

use std::f64::consts::PI;

use ndarray::{Array2, Zip};

use crate::ml::pipeline::LumaPlane;

/// Raw score given to images without any local contrast.
pub const WORST_QUALITY: f64 = 100.0;

const GAUSSIAN_TAPS: usize = 7;
const GAUSSIAN_SIGMA: f64 = 7.0 / 6.0;
/// Stabilizes the divisive normalization on 8-bit luminance.
const MSCN_C: f64 = 1.0;

#[derive(Debug, Clone)]
pub struct NaturalnessQuality {
    reference_shape: f64,
    reference_variance: f64,
    shape_table: Vec<(f64, f64)>,
}

impl Default for NaturalnessQuality {
    fn default() -> Self {
        Self::new(2.0, 0.5)
    }
}

impl NaturalnessQuality {
    pub fn new(reference_shape: f64, reference_variance: f64) -> Self {
        // Generalized Gaussian shape → ratio E[x²] / E[|x|]², sampled densely
        // so the moment-matching fit is a table lookup.
        let shape_table = (200..=10_000)
            .map(|i| {
                let alpha = i as f64 / 1000.0;
                (alpha, ggd_ratio(alpha))
            })
            .collect();

        Self {
            reference_shape,
            reference_variance,
            shape_table,
        }
    }

    /// Raw metric in `[0, 100]`, lower is better.
    pub fn score(&self, plane: &LumaPlane) -> f64 {
        let mscn = mscn_coefficients(plane);
        let n = mscn.len() as f64;
        if mscn.is_empty() {
            return WORST_QUALITY;
        }

        let variance = mscn.iter().map(|v| v * v).sum::<f64>() / n;
        let mean_abs = mscn.iter().map(|v| v.abs()).sum::<f64>() / n;
        if variance <= f64::EPSILON || mean_abs <= f64::EPSILON {
            return WORST_QUALITY;
        }

        let shape = self.shape_for_ratio(variance / (mean_abs * mean_abs));
        let distortion = (shape / self.reference_shape).ln().abs()
            + 0.5 * (variance / self.reference_variance).ln().abs();

        (WORST_QUALITY * (1.0 - (-distortion).exp())).clamp(0.0, WORST_QUALITY)
    }

    fn shape_for_ratio(&self, ratio: f64) -> f64 {
        self.shape_table
            .iter()
            .min_by(|a, b| (a.1 - ratio).abs().total_cmp(&(b.1 - ratio).abs()))
            .map(|(alpha, _)| *alpha)
            .unwrap_or(self.reference_shape)
    }
}

fn ggd_ratio(alpha: f64) -> f64 {
    (ln_gamma(1.0 / alpha) + ln_gamma(3.0 / alpha) - 2.0 * ln_gamma(2.0 / alpha)).exp()
}

fn mscn_coefficients(plane: &LumaPlane) -> Array2<f64> {
    if plane.data.is_empty() {
        return Array2::zeros((0, 0));
    }

    let luma = plane.data.mapv(|v| v as f64 * 255.0);
    let squared = luma.mapv(|v| v * v);
    let kernel = gaussian_kernel();

    let mu = separable_blur(&luma, &kernel);
    let mu_sq = separable_blur(&squared, &kernel);

    Zip::from(&luma)
        .and(&mu)
        .and(&mu_sq)
        .map_collect(|&i, &m, &m2| {
            let sigma = (m2 - m * m).abs().sqrt();
            (i - m) / (sigma + MSCN_C)
        })
}

fn gaussian_kernel() -> [f64; GAUSSIAN_TAPS] {
    let half = (GAUSSIAN_TAPS / 2) as f64;
    let mut kernel = [0.0; GAUSSIAN_TAPS];
    for (i, k) in kernel.iter_mut().enumerate() {
        let d = i as f64 - half;
        *k = (-(d * d) / (2.0 * GAUSSIAN_SIGMA * GAUSSIAN_SIGMA)).exp();
    }
    let sum: f64 = kernel.iter().sum();
    kernel.iter_mut().for_each(|k| *k /= sum);
    kernel
}

fn separable_blur(data: &Array2<f64>, kernel: &[f64]) -> Array2<f64> {
    let (h, w) = data.dim();
    let half = (kernel.len() / 2) as isize;
    let clamp = |v: isize, len: usize| v.clamp(0, len as isize - 1) as usize;

    let rows = Array2::from_shape_fn((h, w), |(y, x)| {
        kernel
            .iter()
            .enumerate()
            .map(|(k, weight)| weight * data[[y, clamp(x as isize + k as isize - half, w)]])
            .sum::<f64>()
    });

    Array2::from_shape_fn((h, w), |(y, x)| {
        kernel
            .iter()
            .enumerate()
            .map(|(k, weight)| weight * rows[[clamp(y as isize + k as isize - half, h), x]])
            .sum::<f64>()
    })
}

/// Lanczos approximation of `ln Γ(x)` for `x > 0`.
fn ln_gamma(x: f64) -> f64 {
    const G: f64 = 7.0;
    const COEF: [f64; 9] = [
        0.999_999_999_999_809_9,
        676.520_368_121_885_1,
        -1_259.139_216_722_402_8,
        771.323_428_777_653_1,
        -176.615_029_162_140_6,
        12.507_343_278_686_905,
        -0.138_571_095_265_720_12,
        9.984_369_578_019_572e-6,
        1.505_632_735_149_311_6e-7,
    ];

    if x < 0.5 {
        return (PI / (PI * x).sin()).ln() - ln_gamma(1.0 - x);
    }

    let x = x - 1.0;
    let t = x + G + 0.5;
    let a = COEF
        .iter()
        .enumerate()
        .skip(1)
        .fold(COEF[0], |acc, (i, c)| acc + c / (x + i as f64));
    0.5 * (2.0 * PI).ln() + (x + 0.5) * t.ln() - t + a.ln()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, GrayImage, Luma};

    fn noise_image(size: u32, seed: u32) -> DynamicImage {
        let mut state = seed;
        DynamicImage::ImageLuma8(GrayImage::from_fn(size, size, |_, _| {
            state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
            Luma([(state >> 24) as u8])
        }))
    }

    #[test]
    fn test_ln_gamma_known_values() {
        assert!((ln_gamma(5.0) - 24f64.ln()).abs() < 1e-9);
        assert!((ln_gamma(0.5) - PI.sqrt().ln()).abs() < 1e-9);
        assert!((ln_gamma(0.1) - 9.513_507_698_668_732f64.ln()).abs() < 1e-8);
    }

    #[test]
    fn test_shape_fit_recovers_gaussian_and_laplacian() {
        let quality = NaturalnessQuality::default();
        assert!((quality.shape_for_ratio(PI / 2.0) - 2.0).abs() < 0.01);
        assert!((quality.shape_for_ratio(2.0) - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_flat_image_is_worst() {
        let flat = DynamicImage::ImageLuma8(GrayImage::from_pixel(32, 32, Luma([90])));
        let score = NaturalnessQuality::default().score(&LumaPlane::from_image(&flat));
        assert_eq!(score, WORST_QUALITY);
    }

    #[test]
    fn test_textured_image_scores_in_range() {
        let quality = NaturalnessQuality::default();
        for seed in [1, 7, 42] {
            let score = quality.score(&LumaPlane::from_image(&noise_image(48, seed)));
            assert!(score.is_finite());
            assert!((0.0..WORST_QUALITY).contains(&score));
        }
    }
}
