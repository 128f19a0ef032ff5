use std::f64::consts::SQRT_2;

use ndarray::Array2;

use crate::ml::pipeline::LumaPlane;

/// Upper bound of [`DomSharpness::estimate`].
pub const MAX_SHARPNESS: f64 = SQRT_2;

/// Difference-of-differences (DOM) sharpness estimator.
///
/// For every edge pixel along an axis, the sum of absolute second differences
/// (lag 2) inside a `2 * width + 1` window is compared with the sum of first
/// differences in the same window. Edges whose ratio reaches `threshold` are
/// counted as sharp. The per-axis sharp-edge fractions `Sx` and `Sy` are
/// combined as `sqrt(Sx² + Sy²)`, which is bounded by `sqrt(2)`.
#[derive(Debug, Clone, Copy)]
pub struct DomSharpness {
    pub width: usize,
    pub threshold: f32,
    pub edge_threshold: f32,
}

impl Default for DomSharpness {
    fn default() -> Self {
        Self {
            width: 2,
            threshold: 2.0,
            edge_threshold: 0.02,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Axis {
    X,
    Y,
}

impl DomSharpness {
    pub fn estimate(&self, plane: &LumaPlane) -> f64 {
        let smoothed = median3x3(plane);
        let sx = self.axis_sharpness(&smoothed, Axis::X);
        let sy = self.axis_sharpness(&smoothed, Axis::Y);
        (sx * sx + sy * sy).sqrt().min(MAX_SHARPNESS)
    }

    fn axis_sharpness(&self, plane: &LumaPlane, axis: Axis) -> f64 {
        let (len, lanes) = match axis {
            Axis::X => (plane.width(), plane.data.rows()),
            Axis::Y => (plane.height(), plane.data.columns()),
        };
        let margin = self.width + 2;
        if len <= 2 * margin {
            return 0.0;
        }

        let mut line = Vec::with_capacity(len);
        let mut dom = vec![0f32; len];
        let mut contrast = vec![0f32; len];
        let mut edges = 0u64;
        let mut sharp = 0u64;

        for lane in lanes {
            line.clear();
            line.extend(lane.iter().copied());

            for (i, w) in line.windows(5).enumerate() {
                dom[i + 2] = (w[4] - 2.0 * w[2] + w[0]).abs();
            }
            for (i, w) in line.windows(2).enumerate() {
                contrast[i + 1] = (w[1] - w[0]).abs();
            }

            for i in margin..len - margin {
                if contrast[i] <= self.edge_threshold {
                    continue;
                }
                edges += 1;

                let window = i - self.width..=i + self.width;
                let dom_sum: f32 = dom[window.clone()].iter().sum();
                let contrast_sum: f32 = contrast[window].iter().sum();
                if contrast_sum > 0.0 && dom_sum / contrast_sum >= self.threshold {
                    sharp += 1;
                }
            }
        }

        if edges == 0 {
            0.0
        } else {
            sharp as f64 / edges as f64
        }
    }
}

/// 3x3 median filter with edge pixels replicated.
fn median3x3(plane: &LumaPlane) -> LumaPlane {
    let (h, w) = plane.data.dim();
    let mut window = [0f32; 9];

    let data = Array2::from_shape_fn((h, w), |(y, x)| {
        let mut n = 0;
        for dy in [-1isize, 0, 1] {
            for dx in [-1isize, 0, 1] {
                let sx = (x as isize + dx).clamp(0, w as isize - 1) as usize;
                let sy = (y as isize + dy).clamp(0, h as isize - 1) as usize;
                window[n] = plane.data[[sy, sx]];
                n += 1;
            }
        }
        window.sort_unstable_by(|a, b| a.total_cmp(b));
        window[4]
    });

    LumaPlane { data }
}
