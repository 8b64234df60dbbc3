//! Trilinear sampling over 3-D grids.

use freshet_core::{Array3, Size3};
use glam::Vec3;

/// Grid node indices and trilinear weights covering the point `pt`.
///
/// Indices are clamped to the valid range, so querying outside the data
/// extent degenerates to the edge value. The PIC transfer scatters through
/// exactly these eight nodes and weights.
pub fn linear_coordinates_and_weights(
    size: Size3,
    origin: Vec3,
    spacing: Vec3,
    pt: Vec3,
) -> ([(usize, usize, usize); 8], [f32; 8]) {
    let normalized = (pt - origin) / spacing;

    let i_size = size.x as isize;
    let j_size = size.y as isize;
    let k_size = size.z as isize;

    let clamp_axis = |coord: f32, n: isize| -> (usize, f32) {
        let mut idx = coord.floor() as isize;
        let mut frac = coord - idx as f32;
        if idx < 0 {
            idx = 0;
            frac = 0.0;
        } else if idx > n - 2 {
            idx = (n - 2).max(0);
            frac = if n > 1 { (coord - idx as f32).clamp(0.0, 1.0) } else { 0.0 };
        }
        (idx as usize, frac)
    };

    let (i, fx) = clamp_axis(normalized.x, i_size);
    let (j, fy) = clamp_axis(normalized.y, j_size);
    let (k, fz) = clamp_axis(normalized.z, k_size);

    let ip1 = (i + 1).min(size.x - 1);
    let jp1 = (j + 1).min(size.y - 1);
    let kp1 = (k + 1).min(size.z - 1);

    let indices = [
        (i, j, k),
        (ip1, j, k),
        (i, jp1, k),
        (ip1, jp1, k),
        (i, j, kp1),
        (ip1, j, kp1),
        (i, jp1, kp1),
        (ip1, jp1, kp1),
    ];
    let weights = [
        (1.0 - fx) * (1.0 - fy) * (1.0 - fz),
        fx * (1.0 - fy) * (1.0 - fz),
        (1.0 - fx) * fy * (1.0 - fz),
        fx * fy * (1.0 - fz),
        (1.0 - fx) * (1.0 - fy) * fz,
        fx * (1.0 - fy) * fz,
        (1.0 - fx) * fy * fz,
        fx * fy * fz,
    ];
    (indices, weights)
}

/// Trilinear sample of `data` at world point `pt`.
pub fn sample(data: &Array3<f32>, origin: Vec3, spacing: Vec3, pt: Vec3) -> f32 {
    let (indices, weights) = linear_coordinates_and_weights(data.size(), origin, spacing, pt);
    indices
        .iter()
        .zip(weights)
        .map(|(&idx, w)| w * data[idx])
        .sum()
}

/// Trilinear sample of vector `data` at world point `pt`.
pub fn sample_vec(data: &Array3<Vec3>, origin: Vec3, spacing: Vec3, pt: Vec3) -> Vec3 {
    let (indices, weights) = linear_coordinates_and_weights(data.size(), origin, spacing, pt);
    indices
        .iter()
        .zip(weights)
        .map(|(&idx, w)| w * data[idx])
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_weights_sum_to_one() {
        let (_, w) = linear_coordinates_and_weights(
            Size3::new(4, 4, 4),
            Vec3::ZERO,
            Vec3::ONE,
            Vec3::new(1.3, 2.7, 0.4),
        );
        assert!((w.iter().sum::<f32>() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_sample_at_node_is_exact() {
        use approx::assert_relative_eq;

        let mut data = Array3::with_size(Size3::new(3, 3, 3), 0.0f32);
        data[(1, 1, 1)] = 5.0;
        let v = sample(&data, Vec3::ZERO, Vec3::ONE, Vec3::new(1.0, 1.0, 1.0));
        assert_relative_eq!(v, 5.0, epsilon = 1e-6);
    }

    #[test]
    fn test_sample_clamps_outside() {
        let data = Array3::with_size(Size3::new(2, 2, 2), 7.0f32);
        let v = sample(&data, Vec3::ZERO, Vec3::ONE, Vec3::splat(-10.0));
        assert!((v - 7.0).abs() < 1e-6);
    }
}
