//! Bilinear sampling over 2-D grids.

use freshet_core::{Array2, Size2};
use glam::Vec2;

/// Grid node indices and bilinear weights covering the point `pt`.
///
/// Indices are clamped to the valid range, so querying outside the data
/// extent degenerates to the edge value.
pub fn linear_coordinates_and_weights(
    size: Size2,
    origin: Vec2,
    spacing: Vec2,
    pt: Vec2,
) -> ([(usize, usize); 4], [f32; 4]) {
    let normalized = (pt - origin) / spacing;

    let i_size = size.x as isize;
    let j_size = size.y as isize;

    let mut i = normalized.x.floor() as isize;
    let mut j = normalized.y.floor() as isize;
    let mut fx = normalized.x - i as f32;
    let mut fy = normalized.y - j as f32;

    if i < 0 {
        i = 0;
        fx = 0.0;
    } else if i > i_size - 2 {
        i = (i_size - 2).max(0);
        fx = if i_size > 1 { (normalized.x - i as f32).clamp(0.0, 1.0) } else { 0.0 };
    }
    if j < 0 {
        j = 0;
        fy = 0.0;
    } else if j > j_size - 2 {
        j = (j_size - 2).max(0);
        fy = if j_size > 1 { (normalized.y - j as f32).clamp(0.0, 1.0) } else { 0.0 };
    }

    let i = i as usize;
    let j = j as usize;
    let ip1 = (i + 1).min(size.x - 1);
    let jp1 = (j + 1).min(size.y - 1);

    let indices = [(i, j), (ip1, j), (i, jp1), (ip1, jp1)];
    let weights = [
        (1.0 - fx) * (1.0 - fy),
        fx * (1.0 - fy),
        (1.0 - fx) * fy,
        fx * fy,
    ];
    (indices, weights)
}

/// Bilinear sample of `data` at world point `pt`.
pub fn sample(data: &Array2<f32>, origin: Vec2, spacing: Vec2, pt: Vec2) -> f32 {
    let (indices, weights) = linear_coordinates_and_weights(data.size(), origin, spacing, pt);
    indices
        .iter()
        .zip(weights)
        .map(|(&idx, w)| w * data[idx])
        .sum()
}

/// Bilinear sample of vector `data` at world point `pt`.
pub fn sample_vec(data: &Array2<Vec2>, origin: Vec2, spacing: Vec2, pt: Vec2) -> Vec2 {
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
        let (_, w) =
            linear_coordinates_and_weights(Size2::new(4, 4), Vec2::ZERO, Vec2::ONE, Vec2::new(1.3, 2.7));
        assert!((w.iter().sum::<f32>() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_sample_at_node_is_exact() {
        let mut data = Array2::with_size(Size2::new(3, 3), 0.0f32);
        data[(1, 1)] = 5.0;
        let v = sample(&data, Vec2::ZERO, Vec2::ONE, Vec2::new(1.0, 1.0));
        assert!((v - 5.0).abs() < 1e-6);
    }

    #[test]
    fn test_sample_clamps_outside() {
        let mut data = Array2::with_size(Size2::new(2, 2), 1.0f32);
        data[(0, 0)] = 1.0;
        let v = sample(&data, Vec2::ZERO, Vec2::ONE, Vec2::new(-5.0, -5.0));
        assert!((v - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_midpoint_interpolation() {
        use approx::assert_relative_eq;

        let mut data = Array2::with_size(Size2::new(2, 1), 0.0f32);
        data[(0, 0)] = 0.0;
        data[(1, 0)] = 2.0;
        let v = sample(&data, Vec2::ZERO, Vec2::ONE, Vec2::new(0.5, 0.0));
        assert_relative_eq!(v, 1.0, epsilon = 1e-6);
    }
}
