//! Grid utility kernels.

use crate::size::Size3;
use crate::view::{ArrayView3, ArrayViewMut3};
use crate::Array3;

/// Extrapolates `input` from the valid (1) region into the invalid (0)
/// region by iterative nearest-valid-neighbor averaging.
///
/// Each sweep, every invalid cell with at least one valid 6-neighbor takes
/// the mean of those neighbors and becomes valid, so values propagate at
/// most `number_of_iterations` cells. `input` and `valid` must be
/// collocated with `output`; shape mismatch panics.
pub fn extrapolate_to_region(
    input: ArrayView3<'_, f32>,
    valid: ArrayView3<'_, u8>,
    number_of_iterations: usize,
    output: &mut ArrayViewMut3<'_, f32>,
) {
    let size: Size3 = input.size();
    assert_eq!(size, valid.size(), "valid mask shape mismatch");
    assert_eq!(size, output.size(), "output shape mismatch");

    let mut valid0 = Array3::with_size(size, 0u8);
    let mut valid1 = Array3::with_size(size, 0u8);

    for k in 0..size.z {
        for j in 0..size.y {
            for i in 0..size.x {
                valid0[(i, j, k)] = valid[(i, j, k)];
                output[(i, j, k)] = input[(i, j, k)];
            }
        }
    }

    for _ in 0..number_of_iterations {
        for k in 0..size.z {
            for j in 0..size.y {
                for i in 0..size.x {
                    if valid0[(i, j, k)] == 1 {
                        valid1[(i, j, k)] = 1;
                        continue;
                    }

                    let mut sum = 0.0f32;
                    let mut count = 0u32;

                    if i + 1 < size.x && valid0[(i + 1, j, k)] == 1 {
                        sum += output[(i + 1, j, k)];
                        count += 1;
                    }
                    if i > 0 && valid0[(i - 1, j, k)] == 1 {
                        sum += output[(i - 1, j, k)];
                        count += 1;
                    }
                    if j + 1 < size.y && valid0[(i, j + 1, k)] == 1 {
                        sum += output[(i, j + 1, k)];
                        count += 1;
                    }
                    if j > 0 && valid0[(i, j - 1, k)] == 1 {
                        sum += output[(i, j - 1, k)];
                        count += 1;
                    }
                    if k + 1 < size.z && valid0[(i, j, k + 1)] == 1 {
                        sum += output[(i, j, k + 1)];
                        count += 1;
                    }
                    if k > 0 && valid0[(i, j, k - 1)] == 1 {
                        sum += output[(i, j, k - 1)];
                        count += 1;
                    }

                    if count > 0 {
                        output[(i, j, k)] = sum / count as f32;
                        valid1[(i, j, k)] = 1;
                    } else {
                        valid1[(i, j, k)] = 0;
                    }
                }
            }
        }

        valid0.swap(&mut valid1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_seed_propagates() {
        let size = Size3::new(5, 1, 1);
        let mut input = Array3::with_size(size, 0.0f32);
        let mut valid = Array3::with_size(size, 0u8);
        input[(2, 0, 0)] = 3.0;
        valid[(2, 0, 0)] = 1;

        let mut output = Array3::with_size(size, 0.0f32);
        extrapolate_to_region(input.view(), valid.view(), 2, &mut output.view_mut());

        assert_eq!(output[(2, 0, 0)], 3.0);
        assert_eq!(output[(1, 0, 0)], 3.0);
        assert_eq!(output[(3, 0, 0)], 3.0);
        assert_eq!(output[(0, 0, 0)], 3.0);
        assert_eq!(output[(4, 0, 0)], 3.0);
    }

    #[test]
    fn test_propagation_depth_is_bounded() {
        let size = Size3::new(5, 1, 1);
        let mut input = Array3::with_size(size, 0.0f32);
        let mut valid = Array3::with_size(size, 0u8);
        input[(0, 0, 0)] = 1.0;
        valid[(0, 0, 0)] = 1;

        let mut output = Array3::with_size(size, 0.0f32);
        extrapolate_to_region(input.view(), valid.view(), 1, &mut output.view_mut());

        assert_eq!(output[(1, 0, 0)], 1.0);
        // Cell 2 is beyond the single-iteration reach.
        assert_eq!(output[(2, 0, 0)], 0.0);
    }

    #[test]
    #[should_panic(expected = "valid mask shape mismatch")]
    fn test_shape_mismatch_panics() {
        let input = Array3::with_size(Size3::new(2, 2, 2), 0.0f32);
        let valid = Array3::with_size(Size3::new(3, 2, 2), 0u8);
        let mut output = Array3::with_size(Size3::new(2, 2, 2), 0.0f32);
        extrapolate_to_region(input.view(), valid.view(), 1, &mut output.view_mut());
    }
}
