//! 3-D dense array.

use std::ops::{Index, IndexMut};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::size::Size3;
use crate::view::{ArrayView3, ArrayViewMut3};

/// Flat 3-D array, linear index `i = x + w * (y + h * z)`.
///
/// The buffer length always equals `size.product()`; a zero extent along
/// any axis leaves the buffer empty.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Array3<T> {
    size: Size3,
    data: Vec<T>,
}

impl<T: Clone + Default> Array3<T> {
    /// Creates an empty array.
    pub fn new() -> Self {
        Self {
            size: Size3::default(),
            data: Vec::new(),
        }
    }

    /// Creates an array of the given size filled with `init`.
    pub fn with_size(size: Size3, init: T) -> Self {
        Self {
            size,
            data: vec![init; size.product()],
        }
    }

    pub fn size(&self) -> Size3 {
        self.size
    }

    pub fn width(&self) -> usize {
        self.size.x
    }

    pub fn height(&self) -> usize {
        self.size.y
    }

    pub fn depth(&self) -> usize {
        self.size.z
    }

    #[inline]
    pub fn linear_index(&self, i: usize, j: usize, k: usize) -> usize {
        debug_assert!(i < self.size.x && j < self.size.y && k < self.size.z);
        i + self.size.x * (j + self.size.y * k)
    }

    /// Resizes to `size`. Values at indices valid under both the old and the
    /// new size are preserved; every other slot takes `init`.
    pub fn resize(&mut self, size: Size3, init: T) {
        let mut grown = vec![init; size.product()];
        let nx = size.x.min(self.size.x);
        let ny = size.y.min(self.size.y);
        let nz = size.z.min(self.size.z);
        for k in 0..nz {
            for j in 0..ny {
                for i in 0..nx {
                    grown[i + size.x * (j + size.y * k)] =
                        self.data[i + self.size.x * (j + self.size.y * k)].clone();
                }
            }
        }
        self.data = grown;
        self.size = size;
    }

    /// Drops all contents and resets the size to zero.
    pub fn clear(&mut self) {
        self.size = Size3::default();
        self.data.clear();
    }

    pub fn fill(&mut self, value: T) {
        self.data.fill(value);
    }

    /// Copies contents from `other`, resizing to match.
    pub fn set_from(&mut self, other: &Self) {
        self.size = other.size;
        self.data.clear();
        self.data.extend_from_slice(&other.data);
    }

    /// O(1) buffer and size exchange.
    pub fn swap(&mut self, other: &mut Self) {
        std::mem::swap(&mut self.size, &mut other.size);
        std::mem::swap(&mut self.data, &mut other.data);
    }

    /// Serial iteration, i-fastest deterministic order.
    pub fn for_each_index<F: FnMut(usize, usize, usize)>(&self, mut f: F) {
        for k in 0..self.size.z {
            for j in 0..self.size.y {
                for i in 0..self.size.x {
                    f(i, j, k);
                }
            }
        }
    }

    /// Parallel iteration over indices. No visitation-order guarantee; the
    /// callback must only touch disjoint state per index.
    pub fn par_for_each_index<F: Fn(usize, usize, usize) + Sync>(&self, f: F) {
        let (w, h) = (self.size.x, self.size.y);
        (0..self.size.z).into_par_iter().for_each(|k| {
            for j in 0..h {
                for i in 0..w {
                    f(i, j, k);
                }
            }
        });
    }

    /// Recomputes every cell in parallel from its index.
    pub fn par_fill_with<F: Fn(usize, usize, usize) -> T + Sync>(&mut self, f: F)
    where
        T: Send,
    {
        let (w, h) = (self.size.x, self.size.y);
        let slab = (w * h).max(1);
        self.data.par_chunks_mut(slab).enumerate().for_each(|(k, plane)| {
            for (n, cell) in plane.iter_mut().enumerate() {
                *cell = f(n % w, n / w, k);
            }
        });
    }

    /// Mutable parallel visit; z-slabs are distributed across workers.
    pub fn par_for_each_mut<F: Fn(usize, usize, usize, &mut T) + Sync>(&mut self, f: F)
    where
        T: Send,
    {
        let (w, h) = (self.size.x, self.size.y);
        let slab = (w * h).max(1);
        self.data.par_chunks_mut(slab).enumerate().for_each(|(k, plane)| {
            for (n, cell) in plane.iter_mut().enumerate() {
                f(n % w, n / w, k, cell);
            }
        });
    }

    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.data
    }

    pub fn view(&self) -> ArrayView3<'_, T> {
        ArrayView3::new(self.size, &self.data)
    }

    pub fn view_mut(&mut self) -> ArrayViewMut3<'_, T> {
        ArrayViewMut3::new(self.size, &mut self.data)
    }
}

impl<T> Index<(usize, usize, usize)> for Array3<T> {
    type Output = T;

    #[inline]
    fn index(&self, (i, j, k): (usize, usize, usize)) -> &T {
        &self.data[i + self.size.x * (j + self.size.y * k)]
    }
}

impl<T> IndexMut<(usize, usize, usize)> for Array3<T> {
    #[inline]
    fn index_mut(&mut self, (i, j, k): (usize, usize, usize)) -> &mut T {
        &mut self.data[i + self.size.x * (j + self.size.y * k)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linear_index_order() {
        let a = Array3::with_size(Size3::new(4, 5, 6), 0.0f32);
        assert_eq!(a.linear_index(0, 0, 0), 0);
        assert_eq!(a.linear_index(1, 0, 0), 1);
        assert_eq!(a.linear_index(0, 1, 0), 4);
        assert_eq!(a.linear_index(0, 0, 1), 20);
        assert_eq!(a.linear_index(3, 4, 5), 5 * 20 + 4 * 4 + 3);
    }

    #[test]
    fn test_resize_preserves_overlap() {
        let mut a = Array3::with_size(Size3::new(3, 3, 3), 0i32);
        for k in 0..3 {
            for j in 0..3 {
                for i in 0..3 {
                    a[(i, j, k)] = (i + 10 * j + 100 * k) as i32;
                }
            }
        }
        a.resize(Size3::new(2, 4, 3), -1);
        for k in 0..3 {
            for j in 0..3 {
                for i in 0..2 {
                    assert_eq!(a[(i, j, k)], (i + 10 * j + 100 * k) as i32);
                }
            }
            for i in 0..2 {
                assert_eq!(a[(i, 3, k)], -1);
            }
        }
    }

    #[test]
    fn test_swap_round_trip() {
        // Fill (4,4,4) with i + 4j + 16k, swap with an empty array, and
        // verify the buffer migrated while the source reports zero size.
        let size = Size3::new(4, 4, 4);
        let mut a = Array3::with_size(size, 0usize);
        for k in 0..4 {
            for j in 0..4 {
                for i in 0..4 {
                    a[(i, j, k)] = i + 4 * j + 16 * k;
                }
            }
        }

        let mut b = Array3::new();
        a.swap(&mut b);

        assert_eq!(a.size(), Size3::new(0, 0, 0));
        assert!(a.as_slice().is_empty());
        assert_eq!(b.size(), size);
        for k in 0..4 {
            for j in 0..4 {
                for i in 0..4 {
                    assert_eq!(b[(i, j, k)], i + 4 * j + 16 * k);
                }
            }
        }
    }

    #[test]
    fn test_par_fill_with() {
        let mut a = Array3::with_size(Size3::new(8, 8, 8), 0usize);
        a.par_fill_with(|i, j, k| i + 8 * j + 64 * k);
        a.for_each_index(|i, j, k| {
            assert_eq!(a[(i, j, k)], i + 8 * j + 64 * k);
        });
    }

    #[test]
    fn test_par_for_each_index_visits_everything_once() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let a = Array3::with_size(Size3::new(4, 4, 4), 0u8);
        let hits: Vec<AtomicUsize> = (0..64).map(|_| AtomicUsize::new(0)).collect();
        a.par_for_each_index(|i, j, k| {
            hits[a.linear_index(i, j, k)].fetch_add(1, Ordering::Relaxed);
        });
        assert!(hits.iter().all(|h| h.load(Ordering::Relaxed) == 1));
    }
}
