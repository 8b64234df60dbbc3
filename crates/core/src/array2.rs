//! 2-D dense array.

use std::ops::{Index, IndexMut};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::size::Size2;
use crate::view::{ArrayView2, ArrayViewMut2};

/// Flat 2-D array, linear index `i = x + w * y`.
///
/// The buffer length always equals `size.product()`; a zero extent along
/// either axis leaves the buffer empty.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Array2<T> {
    size: Size2,
    data: Vec<T>,
}

impl<T: Clone + Default> Array2<T> {
    /// Creates an empty array.
    pub fn new() -> Self {
        Self {
            size: Size2::default(),
            data: Vec::new(),
        }
    }

    /// Creates an array of the given size filled with `init`.
    pub fn with_size(size: Size2, init: T) -> Self {
        Self {
            size,
            data: vec![init; size.product()],
        }
    }

    pub fn size(&self) -> Size2 {
        self.size
    }

    pub fn width(&self) -> usize {
        self.size.x
    }

    pub fn height(&self) -> usize {
        self.size.y
    }

    #[inline]
    pub fn linear_index(&self, i: usize, j: usize) -> usize {
        debug_assert!(i < self.size.x && j < self.size.y);
        i + self.size.x * j
    }

    /// Resizes to `size`. Values at indices valid under both the old and the
    /// new size are preserved; every other slot takes `init`.
    pub fn resize(&mut self, size: Size2, init: T) {
        let mut grown = vec![init; size.product()];
        let nx = size.x.min(self.size.x);
        let ny = size.y.min(self.size.y);
        for j in 0..ny {
            for i in 0..nx {
                grown[i + size.x * j] = self.data[i + self.size.x * j].clone();
            }
        }
        self.data = grown;
        self.size = size;
    }

    /// Drops all contents and resets the size to zero.
    pub fn clear(&mut self) {
        self.size = Size2::default();
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
    pub fn for_each_index<F: FnMut(usize, usize)>(&self, mut f: F) {
        for j in 0..self.size.y {
            for i in 0..self.size.x {
                f(i, j);
            }
        }
    }

    /// Parallel iteration over indices. No visitation-order guarantee; the
    /// callback must only touch disjoint state per index.
    pub fn par_for_each_index<F: Fn(usize, usize) + Sync>(&self, f: F) {
        let w = self.size.x;
        (0..self.size.y).into_par_iter().for_each(|j| {
            for i in 0..w {
                f(i, j);
            }
        });
    }

    /// Recomputes every cell in parallel from its index.
    pub fn par_fill_with<F: Fn(usize, usize) -> T + Sync>(&mut self, f: F)
    where
        T: Send,
    {
        let w = self.size.x;
        self.data
            .par_chunks_mut(w.max(1))
            .enumerate()
            .for_each(|(j, row)| {
                for (i, cell) in row.iter_mut().enumerate() {
                    *cell = f(i, j);
                }
            });
    }

    /// Mutable parallel visit; rows are distributed across workers.
    pub fn par_for_each_mut<F: Fn(usize, usize, &mut T) + Sync>(&mut self, f: F)
    where
        T: Send,
    {
        let w = self.size.x;
        self.data
            .par_chunks_mut(w.max(1))
            .enumerate()
            .for_each(|(j, row)| {
                for (i, cell) in row.iter_mut().enumerate() {
                    f(i, j, cell);
                }
            });
    }

    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.data
    }

    pub fn view(&self) -> ArrayView2<'_, T> {
        ArrayView2::new(self.size, &self.data)
    }

    pub fn view_mut(&mut self) -> ArrayViewMut2<'_, T> {
        ArrayViewMut2::new(self.size, &mut self.data)
    }
}

impl<T> Index<(usize, usize)> for Array2<T> {
    type Output = T;

    #[inline]
    fn index(&self, (i, j): (usize, usize)) -> &T {
        &self.data[i + self.size.x * j]
    }
}

impl<T> IndexMut<(usize, usize)> for Array2<T> {
    #[inline]
    fn index_mut(&mut self, (i, j): (usize, usize)) -> &mut T {
        &mut self.data[i + self.size.x * j]
    }
}
