//! Borrowed array views.
//!
//! Non-owning {size, slice} pairs with the same indexing contract as the
//! owning arrays. Algorithms take views so callers can hand out sub-state
//! (an input buffer, a validity mask, an output buffer) without copies; the
//! borrow checker enforces that a view never outlives its owner.

use std::ops::{Index, IndexMut};

use crate::size::{Size2, Size3};

/// Read-only view of a 1-D array.
#[derive(Clone, Copy, Debug)]
pub struct ArrayView1<'a, T> {
    data: &'a [T],
}

impl<'a, T> ArrayView1<'a, T> {
    pub fn new(data: &'a [T]) -> Self {
        Self { data }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_slice(&self) -> &[T] {
        self.data
    }
}

impl<T> Index<usize> for ArrayView1<'_, T> {
    type Output = T;

    #[inline]
    fn index(&self, i: usize) -> &T {
        &self.data[i]
    }
}

/// Mutable view of a 1-D array.
#[derive(Debug)]
pub struct ArrayViewMut1<'a, T> {
    data: &'a mut [T],
}

impl<'a, T> ArrayViewMut1<'a, T> {
    pub fn new(data: &'a mut [T]) -> Self {
        Self { data }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl<T> Index<usize> for ArrayViewMut1<'_, T> {
    type Output = T;

    #[inline]
    fn index(&self, i: usize) -> &T {
        &self.data[i]
    }
}

impl<T> IndexMut<usize> for ArrayViewMut1<'_, T> {
    #[inline]
    fn index_mut(&mut self, i: usize) -> &mut T {
        &mut self.data[i]
    }
}

/// Read-only view of a 2-D array.
#[derive(Clone, Copy, Debug)]
pub struct ArrayView2<'a, T> {
    size: Size2,
    data: &'a [T],
}

impl<'a, T> ArrayView2<'a, T> {
    pub fn new(size: Size2, data: &'a [T]) -> Self {
        debug_assert_eq!(data.len(), size.product());
        Self { size, data }
    }

    pub fn size(&self) -> Size2 {
        self.size
    }
}

impl<T> Index<(usize, usize)> for ArrayView2<'_, T> {
    type Output = T;

    #[inline]
    fn index(&self, (i, j): (usize, usize)) -> &T {
        &self.data[i + self.size.x * j]
    }
}

/// Mutable view of a 2-D array.
#[derive(Debug)]
pub struct ArrayViewMut2<'a, T> {
    size: Size2,
    data: &'a mut [T],
}

impl<'a, T> ArrayViewMut2<'a, T> {
    pub fn new(size: Size2, data: &'a mut [T]) -> Self {
        debug_assert_eq!(data.len(), size.product());
        Self { size, data }
    }

    pub fn size(&self) -> Size2 {
        self.size
    }
}

impl<T> Index<(usize, usize)> for ArrayViewMut2<'_, T> {
    type Output = T;

    #[inline]
    fn index(&self, (i, j): (usize, usize)) -> &T {
        &self.data[i + self.size.x * j]
    }
}

impl<T> IndexMut<(usize, usize)> for ArrayViewMut2<'_, T> {
    #[inline]
    fn index_mut(&mut self, (i, j): (usize, usize)) -> &mut T {
        &mut self.data[i + self.size.x * j]
    }
}

/// Read-only view of a 3-D array.
#[derive(Clone, Copy, Debug)]
pub struct ArrayView3<'a, T> {
    size: Size3,
    data: &'a [T],
}

impl<'a, T> ArrayView3<'a, T> {
    pub fn new(size: Size3, data: &'a [T]) -> Self {
        debug_assert_eq!(data.len(), size.product());
        Self { size, data }
    }

    pub fn size(&self) -> Size3 {
        self.size
    }
}

impl<T> Index<(usize, usize, usize)> for ArrayView3<'_, T> {
    type Output = T;

    #[inline]
    fn index(&self, (i, j, k): (usize, usize, usize)) -> &T {
        &self.data[i + self.size.x * (j + self.size.y * k)]
    }
}

/// Mutable view of a 3-D array.
#[derive(Debug)]
pub struct ArrayViewMut3<'a, T> {
    size: Size3,
    data: &'a mut [T],
}

impl<'a, T> ArrayViewMut3<'a, T> {
    pub fn new(size: Size3, data: &'a mut [T]) -> Self {
        debug_assert_eq!(data.len(), size.product());
        Self { size, data }
    }

    pub fn size(&self) -> Size3 {
        self.size
    }
}

impl<T> Index<(usize, usize, usize)> for ArrayViewMut3<'_, T> {
    type Output = T;

    #[inline]
    fn index(&self, (i, j, k): (usize, usize, usize)) -> &T {
        &self.data[i + self.size.x * (j + self.size.y * k)]
    }
}

impl<T> IndexMut<(usize, usize, usize)> for ArrayViewMut3<'_, T> {
    #[inline]
    fn index_mut(&mut self, (i, j, k): (usize, usize, usize)) -> &mut T {
        &mut self.data[i + self.size.x * (j + self.size.y * k)]
    }
}
